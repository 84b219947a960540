use rand::distributions::WeightedError;
use thiserror::Error;

/// Errors produced when configuring or sampling a replay memory
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MemoryError {
    /// A memory was configured to hold nothing
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// The warm-up threshold can never be reached
    #[error("warm-up threshold {size_min} exceeds capacity {capacity}")]
    WarmUpExceedsCapacity { size_min: usize, capacity: usize },

    /// A hyperparameter fell outside its valid interval
    #[error("invalid value for `{name}`: {value}, must be in the interval [{min}, {max}]")]
    OutOfInterval {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// A schedule was constructed with inconsistent parameters
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    /// A batch of zero samples was requested
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    /// Sampling was attempted while no priority mass is stored
    #[error("cannot sample from an empty memory")]
    Empty,

    /// Experiences are stored but their priorities do not add up to a positive, finite mass
    #[error("total priority mass {0} is not a positive finite number")]
    InvalidMass(f32),

    /// The stored priorities do not form a valid distribution
    #[error("invalid sampling weights: {0}")]
    InvalidWeights(#[from] WeightedError),
}
