mod base;
mod exp;
mod prioritized;

pub use base::{ReplayMemory, ReplayMemoryConfig, PRIORITY_FLOOR};
pub use exp::*;
pub use prioritized::{PrioritizedReplayMemory, PrioritizedReplayMemoryConfig};

use crate::MemoryError;

/// Largest priority a memory of the given capacity stores, so that the sum over every slot,
/// including rounding, stays finite
pub(crate) fn priority_ceiling(capacity: usize) -> f32 {
    f32::MAX / (2.0 * capacity as f32)
}

/// An opaque reference to a stored experience, returned on insertion and sampling
///
/// Pass it back to `update_priorities` along with the computed TD error. Every insertion gets
/// a fresh handle, so a handle whose experience has since been evicted is recognized as stale
/// and ignored instead of touching whichever experience took its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// The insertion sequence number this handle refers to
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A batch of sampled experiences
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    /// The sampled experiences
    pub samples: Vec<T>,
    /// Handles of the sampled experiences, aligned with `samples`
    pub handles: Vec<Handle>,
    /// Importance sampling weights, only produced by a [`PrioritizedReplayMemory`]
    pub weights: Option<Vec<f32>>,
}

impl<T> Batch<T> {
    /// A batch with nothing in it
    pub fn empty() -> Self {
        Self {
            samples: Vec::new(),
            handles: Vec::new(),
            weights: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Either kind of replay memory behind one interface
pub enum Memory<T> {
    Base(ReplayMemory<T>),
    Prioritized(PrioritizedReplayMemory<T>),
}

impl<T: Clone> Memory<T> {
    /// Add an experience
    ///
    /// `priority` is the raw priority for a [`ReplayMemory`] and the TD error for a
    /// [`PrioritizedReplayMemory`]
    pub fn add_sample(&mut self, sample: T, priority: f32) -> Handle {
        match self {
            Self::Base(memory) => memory.add_sample(sample, priority),
            Self::Prioritized(memory) => memory.add_sample(sample, priority),
        }
    }

    /// Sample a batch of up to `n` experiences
    pub fn get_samples(&mut self, n: usize) -> Result<Batch<T>, MemoryError> {
        match self {
            Self::Base(memory) => memory.get_samples(n),
            Self::Prioritized(memory) => memory.get_samples(n),
        }
    }

    /// Update the priorities of previously sampled experiences from their TD errors
    ///
    /// **Panics** if `handles` and `errors` do not have the same length
    pub fn update_priorities(&mut self, handles: &[Handle], errors: &[f32]) {
        match self {
            Self::Base(memory) => memory.update_priorities(handles, errors),
            Self::Prioritized(memory) => memory.update_priorities(handles, errors),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Base(memory) => memory.len(),
            Self::Prioritized(memory) => memory.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match self {
            Self::Base(memory) => memory.capacity(),
            Self::Prioritized(memory) => memory.capacity(),
        }
    }
}

impl<T> From<ReplayMemory<T>> for Memory<T> {
    fn from(memory: ReplayMemory<T>) -> Self {
        Self::Base(memory)
    }
}

impl<T> From<PrioritizedReplayMemory<T>> for Memory<T> {
    fn from(memory: PrioritizedReplayMemory<T>) -> Self {
        Self::Prioritized(memory)
    }
}
