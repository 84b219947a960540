use log::{debug, trace};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    ds::SumTree,
    schedule::{self, Schedule},
    util::ensure_interval,
    MemoryError,
};

use super::{priority_ceiling, Batch, Handle};

/// Configuration for the [`PrioritizedReplayMemory`]
#[derive(Debug, Clone, PartialEq)]
pub struct PrioritizedReplayMemoryConfig {
    /// The number of slots in the memory, the oldest experience is overwritten beyond this
    pub capacity: usize,
    /// Below this many stored experiences, batches are shrunk to the stored count
    pub size_min: usize,
    /// How much prioritization is used, from 0 (uniform) to 1 (fully proportional)
    pub alpha: f32,
    /// Initial importance sampling exponent
    pub beta_0: f32,
    /// Amount added to the importance sampling exponent on every sampling call, until it reaches 1
    pub beta_increment: f32,
    /// Added to the magnitude of every TD error so no priority is zero
    pub epsilon: f32,
    /// Seed for the sampling RNG, drawn from entropy if `None`
    pub seed: Option<u64>,
}

impl Default for PrioritizedReplayMemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 50000,
            size_min: 600,
            alpha: 0.6,
            beta_0: 0.4,
            beta_increment: 1e-3,
            epsilon: 0.01,
            seed: None,
        }
    }
}

impl PrioritizedReplayMemoryConfig {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn size_min(mut self, size_min: usize) -> Self {
        self.size_min = size_min;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn beta_0(mut self, beta_0: f32) -> Self {
        self.beta_0 = beta_0;
        self
    }

    pub fn beta_increment(mut self, beta_increment: f32) -> Self {
        self.beta_increment = beta_increment;
        self
    }

    pub fn epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// An experience tagged with the sequence number of its insertion
#[derive(Debug, Clone)]
struct Stored<T> {
    id: u64,
    sample: T,
}

/// A prioritized replay memory, as described in [this paper](https://arxiv.org/abs/1511.05952)
///
/// An improvement over the base replay memory, this implementation prioritizes "surprising" or "valuable" experiences,
/// where the amount of surprise is approximated by the temporal difference error. Experiences live in the slots of a
/// [`SumTree`], so insertion, sampling and priority updates all take logarithmic time in the capacity.
///
/// ### Type Parameters:
/// - `T`: The stored experience, typically an [`Exp`](super::Exp)
/// - `S`: The [`Schedule`] of the importance sampling exponent `beta`, evaluated at the number of batches sampled
pub struct PrioritizedReplayMemory<T, S: Schedule = schedule::Linear> {
    memory: SumTree<Stored<T>>,
    size_min: usize,
    alpha: f32,
    epsilon: f32,
    /// Largest priority stored, so the total over a full memory stays finite
    ceiling: f32,
    beta: S,
    steps: u32,
    next_id: u64,
    rng: StdRng,
}

impl<T> PrioritizedReplayMemory<T> {
    /// Initialize an empty `PrioritizedReplayMemory` whose `beta` rises linearly from `beta_0` by
    /// `beta_increment` per sampled batch, capped at 1
    ///
    /// ### Errors
    /// Everything [`with_schedule`](PrioritizedReplayMemory::with_schedule) rejects, and
    /// - [`MemoryError::OutOfInterval`] if `beta_0` is not in `[0, 1]`
    /// - [`MemoryError::InvalidSchedule`] if `beta_increment` is negative or not finite
    pub fn new(config: PrioritizedReplayMemoryConfig) -> Result<Self, MemoryError> {
        let PrioritizedReplayMemoryConfig {
            beta_0,
            beta_increment,
            ..
        } = config;
        ensure_interval!(beta_0, 0.0, 1.0);
        let beta = schedule::Linear::new(beta_increment, beta_0, 1.0)?;
        Self::with_schedule(config, beta)
    }
}

impl<T, S: Schedule> PrioritizedReplayMemory<T, S> {
    /// Initialize an empty `PrioritizedReplayMemory` with a custom `beta` schedule, ignoring
    /// `beta_0` and `beta_increment`
    ///
    /// ### Errors
    /// - [`MemoryError::ZeroCapacity`] if `capacity` is zero
    /// - [`MemoryError::WarmUpExceedsCapacity`] if `size_min` is greater than `capacity`
    /// - [`MemoryError::OutOfInterval`] if `alpha` is not in `[0, 1]` or `epsilon` is not positive
    pub fn with_schedule(
        config: PrioritizedReplayMemoryConfig,
        beta: S,
    ) -> Result<Self, MemoryError> {
        let PrioritizedReplayMemoryConfig {
            capacity,
            size_min,
            alpha,
            epsilon,
            seed,
            ..
        } = config;

        if capacity == 0 {
            return Err(MemoryError::ZeroCapacity);
        }
        if size_min > capacity {
            return Err(MemoryError::WarmUpExceedsCapacity { size_min, capacity });
        }
        ensure_interval!(alpha, 0.0, 1.0);
        ensure_interval!(epsilon, f32::MIN_POSITIVE, f32::MAX);

        Ok(Self {
            memory: SumTree::new(capacity),
            size_min,
            alpha,
            epsilon,
            ceiling: priority_ceiling(capacity),
            beta,
            steps: 0,
            next_id: 0,
            rng: seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64),
        })
    }

    /// Returns the number of stored experiences
    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    pub fn size_min(&self) -> usize {
        self.size_min
    }

    /// Sum of the priorities of all stored experiences
    pub fn total(&self) -> f32 {
        self.memory.total()
    }

    /// The importance sampling exponent that was used for the latest batch
    pub fn beta(&self) -> f32 {
        self.beta.evaluate(self.steps as f32)
    }

    /// Priority of an experience with a given TD error: (|error| + epsilon)<sup>alpha</sup>
    ///
    /// A non-finite error is treated as zero, and priorities too large for the total of a full
    /// memory to stay finite are capped.
    pub fn priority_from_error(&self, error: f32) -> f32 {
        let error = if error.is_finite() { error.abs() } else { 0.0 };
        (error + self.epsilon).powf(self.alpha).min(self.ceiling)
    }

    /// Add a new experience with a priority derived from its TD error, overwriting the oldest
    /// experience if the memory is full
    pub fn add_sample(&mut self, sample: T, error: f32) -> Handle {
        let priority = self.priority_from_error(error);
        self.insert(sample, priority)
    }

    /// Add a new experience at the highest priority currently stored, so that it is likely to be
    /// sampled at least once before its TD error is known
    pub fn push(&mut self, sample: T) -> Handle {
        let priority = match self.memory.max() {
            max if max > 0.0 => max,
            _ => self.epsilon.powf(self.alpha),
        };
        self.insert(sample, priority)
    }

    fn insert(&mut self, sample: T, priority: f32) -> Handle {
        let id = self.next_id;
        self.next_id += 1;

        let (ix, displaced) = self.memory.add(priority, Stored { id, sample });
        if let Some(old) = displaced {
            debug!("slot {ix}: evicted experience {} for {id}", old.id);
        }

        Handle::new(id)
    }

    /// Slot holding the experience a handle refers to, if it has not been overwritten
    fn slot(&self, handle: Handle) -> Option<usize> {
        let ix = (handle.id() % self.memory.capacity() as u64) as usize;
        self.memory
            .get(ix)
            .is_some_and(|stored| stored.id == handle.id())
            .then_some(ix)
    }

    /// Get the priority of a stored experience, or `None` if the handle is stale
    pub fn priority(&self, handle: Handle) -> Option<f32> {
        self.slot(handle).map(|ix| self.memory.priority(ix))
    }

    /// Iterate over stored experiences in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Handle, f32, &T)> {
        self.memory
            .iter()
            .map(|(_, priority, stored)| (Handle::new(stored.id), priority, &stored.sample))
    }

    /// Compute the importance sampling weights for each experience's probability, normalized
    /// so the largest weight in the batch is 1
    fn compute_weights(&self, beta: f32, probs: Vec<f32>) -> Vec<f32> {
        let n = self.memory.len() as f32;

        let weights = probs.into_iter().map(|p| (n * p).powf(-beta));
        let w_max = weights.clone().fold(0.0, f32::max);
        weights.map(|w| w / w_max).collect()
    }

    /// Update the priorities of sampled experiences from their new TD errors
    ///
    /// Handles of experiences that have been overwritten since sampling are skipped.
    ///
    /// **Panics** if `handles` and `errors` do not have the same length
    pub fn update_priorities(&mut self, handles: &[Handle], errors: &[f32]) {
        assert_eq!(
            handles.len(),
            errors.len(),
            "`handles` and `errors` are the same length"
        );

        for (&handle, &error) in handles.iter().zip(errors) {
            match self.slot(handle) {
                Some(ix) => {
                    let priority = self.priority_from_error(error);
                    self.memory.update(ix, priority);
                }
                None => debug!("skipping stale handle {}", handle.id()),
            }
        }
    }
}

impl<T: Clone, S: Schedule> PrioritizedReplayMemory<T, S> {
    /// Sample a random batch of prioritized experiences from the memory and compute the IS weights for each
    ///
    /// The total priority is split into `n` equal segments and one experience is drawn from each, so a batch
    /// covers the whole distribution. Each call advances the `beta` schedule by one step.
    ///
    /// ### Returns
    /// A batch of `n` experiences, or of `min(n, len)` while fewer than `size_min` are stored
    /// - `samples`: the sampled experiences
    /// - `handles`: hold on to these and pass them back to
    ///   [`update_priorities`](PrioritizedReplayMemory::update_priorities) along with the computed TD errors
    /// - `weights`: the importance sampling weights
    ///
    /// ### Errors
    /// - [`MemoryError::ZeroBatchSize`] if `n` is zero
    /// - [`MemoryError::Empty`] if nothing is stored
    /// - [`MemoryError::InvalidMass`] if the stored priorities do not sum to a positive, finite value
    pub fn get_samples(&mut self, n: usize) -> Result<Batch<T>, MemoryError> {
        if n == 0 {
            return Err(MemoryError::ZeroBatchSize);
        }
        let len = self.memory.len();
        if len == 0 {
            return Err(MemoryError::Empty);
        }
        let total = self.memory.total();
        if !(total.is_finite() && total > 0.0) {
            return Err(MemoryError::InvalidMass(total));
        }
        let n = if len < self.size_min { n.min(len) } else { n };

        self.steps = self.steps.saturating_add(1);
        let beta = self.beta();
        let segment = total / n as f32;

        let mut samples = Vec::with_capacity(n);
        let mut handles = Vec::with_capacity(n);
        let mut probs = Vec::with_capacity(n);
        for i in 0..n {
            let value = segment * (i as f32 + self.rng.gen::<f32>());
            let ix = self.memory.retrieve(value);
            let stored = self.memory.get(ix).ok_or(MemoryError::InvalidMass(total))?;
            samples.push(stored.sample.clone());
            handles.push(Handle::new(stored.id));
            probs.push(self.memory.priority(ix) / total);
        }

        let weights = self.compute_weights(beta, probs);
        trace!("sampled {n} experiences with beta {beta}");

        Ok(Batch {
            samples,
            handles,
            weights: Some(weights),
        })
    }
}
