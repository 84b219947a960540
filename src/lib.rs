//! Fixed-capacity experience replay memories for reinforcement learning.
//!
//! [`memory::ReplayMemory`] keeps experiences in insertion order and samples them uniformly or
//! proportionally to their priority. [`memory::PrioritizedReplayMemory`] keeps them in the slots
//! of a [`ds::SumTree`] and returns stratified prioritized batches with importance sampling
//! weights.

/// Data structures
pub mod ds;

/// Experience replay
pub mod memory;

/// Strategies for time-varying hyperparameters
pub mod schedule;

mod error;
mod util;

pub use error::MemoryError;
