use std::collections::VecDeque;

use log::debug;
use rand::{
    distributions::{Distribution, WeightedIndex},
    rngs::StdRng,
    Rng, SeedableRng,
};

use crate::{util::ensure_interval, MemoryError};

use super::{priority_ceiling, Batch, Handle};

/// The smallest priority a [`ReplayMemory`] will store
///
/// Zero, negative and non-finite priorities are replaced with this value so that every stored
/// experience keeps a nonzero probability of being sampled.
pub const PRIORITY_FLOOR: f32 = 1e-6;

fn clamp_priority(priority: f32, ceiling: f32) -> f32 {
    if priority.is_finite() && priority > 0.0 {
        priority.min(ceiling)
    } else {
        PRIORITY_FLOOR
    }
}

/// Configuration for the [`ReplayMemory`]
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayMemoryConfig {
    /// The maximum number of experiences held, the oldest is evicted beyond this
    pub capacity: usize,
    /// The number of experiences required before sampling yields anything
    pub size_min: usize,
    /// Sample proportionally to priority instead of uniformly
    pub prioritized: bool,
    /// How much prioritization is used, from 0 (uniform) to 1 (fully proportional)
    pub alpha: f32,
    /// Seed for the sampling RNG, drawn from entropy if `None`
    pub seed: Option<u64>,
}

impl Default for ReplayMemoryConfig {
    fn default() -> Self {
        Self {
            capacity: 50000,
            size_min: 600,
            prioritized: true,
            alpha: 0.8,
            seed: None,
        }
    }
}

impl ReplayMemoryConfig {
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn size_min(mut self, size_min: usize) -> Self {
        self.size_min = size_min;
        self
    }

    pub fn prioritized(mut self, prioritized: bool) -> Self {
        self.prioritized = prioritized;
        self
    }

    pub fn alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    sample: T,
    priority: f32,
}

/// A fixed-size memory storage for reinforcement learning experiences
///
/// Experiences are kept in insertion order alongside a priority each. Once the capacity is
/// exceeded, the oldest experience is evicted. Sampling draws with replacement, either
/// uniformly or with probability proportional to priority<sup>alpha</sup>, normalized over the
/// whole memory.
///
/// ### Type Parameters:
/// - `T`: The stored experience, typically an [`Exp`](super::Exp)
pub struct ReplayMemory<T> {
    memory: VecDeque<Entry<T>>,
    /// Sequence number of the oldest stored experience
    front: u64,
    capacity: usize,
    size_min: usize,
    prioritized: bool,
    alpha: f32,
    /// Largest priority stored, so the total over a full memory stays finite
    ceiling: f32,
    rng: StdRng,
}

impl<T> ReplayMemory<T> {
    /// Initialize an empty `ReplayMemory`
    ///
    /// ### Errors
    /// - [`MemoryError::ZeroCapacity`] if `capacity` is zero
    /// - [`MemoryError::WarmUpExceedsCapacity`] if `size_min` is greater than `capacity`
    /// - [`MemoryError::OutOfInterval`] if `alpha` is not in `[0, 1]`
    pub fn new(config: ReplayMemoryConfig) -> Result<Self, MemoryError> {
        let ReplayMemoryConfig {
            capacity,
            size_min,
            prioritized,
            alpha,
            seed,
        } = config;

        if capacity == 0 {
            return Err(MemoryError::ZeroCapacity);
        }
        if size_min > capacity {
            return Err(MemoryError::WarmUpExceedsCapacity { size_min, capacity });
        }
        ensure_interval!(alpha, 0.0, 1.0);

        Ok(Self {
            memory: VecDeque::with_capacity(capacity),
            front: 0,
            capacity,
            size_min,
            prioritized,
            alpha,
            ceiling: priority_ceiling(capacity),
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
        self.capacity
    }

    pub fn size_min(&self) -> usize {
        self.size_min
    }

    pub fn is_prioritized(&self) -> bool {
        self.prioritized
    }

    /// Add a new experience to the memory with the default priority of 1
    pub fn push(&mut self, sample: T) -> Handle {
        self.add_sample(sample, 1.0)
    }

    /// Add a new experience to the memory with a given priority, evicting the oldest
    /// experience if the memory is over capacity
    ///
    /// Priorities that are not strictly positive are replaced with [`PRIORITY_FLOOR`], and
    /// priorities too large for the total of a full memory to stay finite are capped.
    pub fn add_sample(&mut self, sample: T, priority: f32) -> Handle {
        let handle = Handle::new(self.front + self.memory.len() as u64);
        self.memory.push_back(Entry {
            sample,
            priority: clamp_priority(priority, self.ceiling),
        });

        if self.memory.len() > self.capacity {
            self.memory.pop_front();
            debug!("evicted experience {}", self.front);
            self.front += 1;
        }

        handle
    }

    /// Position in the memory of the experience a handle refers to, if it is still stored
    fn position(&self, handle: Handle) -> Option<usize> {
        handle
            .id()
            .checked_sub(self.front)
            .map(|ix| ix as usize)
            .filter(|&ix| ix < self.memory.len())
    }

    /// Get the priority of a stored experience, or `None` if the handle is stale
    pub fn priority(&self, handle: Handle) -> Option<f32> {
        self.position(handle).map(|ix| self.memory[ix].priority)
    }

    /// Iterate over stored experiences from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = (Handle, f32, &T)> {
        self.memory
            .iter()
            .enumerate()
            .map(|(ix, entry)| {
                let handle = Handle::new(self.front + ix as u64);
                (handle, entry.priority, &entry.sample)
            })
    }

    /// Update the priorities of sampled experiences to the magnitude of their TD errors
    ///
    /// Has no effect if the memory is not prioritized. Handles of experiences that have been
    /// evicted since sampling are skipped.
    ///
    /// **Panics** if `handles` and `errors` do not have the same length
    pub fn update_priorities(&mut self, handles: &[Handle], errors: &[f32]) {
        assert_eq!(
            handles.len(),
            errors.len(),
            "`handles` and `errors` are the same length"
        );

        if !self.prioritized {
            return;
        }

        for (&handle, &error) in handles.iter().zip(errors) {
            match self.position(handle) {
                Some(ix) => self.memory[ix].priority = clamp_priority(error.abs(), self.ceiling),
                None => debug!("skipping stale handle {}", handle.id()),
            }
        }
    }
}

impl<T: Clone> ReplayMemory<T> {
    /// Sample a random batch of experiences from the memory, with replacement
    ///
    /// ### Returns
    /// - an empty batch if fewer than `size_min` experiences are stored
    /// - otherwise `min(n, len)` experiences and their handles; no weights are computed
    ///
    /// ### Errors
    /// - [`MemoryError::ZeroBatchSize`] if `n` is zero
    /// - [`MemoryError::Empty`] if nothing is stored and no warm-up threshold applies
    /// - [`MemoryError::InvalidMass`] if the weighted priorities do not sum to a positive,
    ///   finite value
    pub fn get_samples(&mut self, n: usize) -> Result<Batch<T>, MemoryError> {
        if n == 0 {
            return Err(MemoryError::ZeroBatchSize);
        }
        let len = self.memory.len();
        if len < self.size_min {
            return Ok(Batch::empty());
        }
        if len == 0 {
            return Err(MemoryError::Empty);
        }

        let n = n.min(len);
        let indices: Vec<usize> = if self.prioritized {
            let alpha = self.alpha;
            let weights: Vec<f32> = self.memory.iter().map(|e| e.priority.powf(alpha)).collect();
            let mass: f32 = weights.iter().sum();
            if !(mass.is_finite() && mass > 0.0) {
                return Err(MemoryError::InvalidMass(mass));
            }
            let dist = WeightedIndex::new(weights)?;
            (0..n).map(|_| dist.sample(&mut self.rng)).collect()
        } else {
            (0..n).map(|_| self.rng.gen_range(0..len)).collect()
        };

        let samples = indices
            .iter()
            .map(|&ix| self.memory[ix].sample.clone())
            .collect();
        let handles = indices
            .iter()
            .map(|&ix| Handle::new(self.front + ix as u64))
            .collect();

        Ok(Batch {
            samples,
            handles,
            weights: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use statrs::distribution::{ChiSquared, ContinuousCDF};

    use super::*;

    fn new_memory(
        capacity: usize,
        size_min: usize,
        prioritized: bool,
        alpha: f32,
    ) -> ReplayMemory<u32> {
        let config = ReplayMemoryConfig::default()
            .capacity(capacity)
            .size_min(size_min)
            .prioritized(prioritized)
            .alpha(alpha)
            .seed(42);
        ReplayMemory::new(config).unwrap()
    }

    /// Memory holding `[0, 1, 2, 3]` at priorities `[1, 1, 1, 100]`
    fn skewed_memory(prioritized: bool, alpha: f32) -> ReplayMemory<u32> {
        let mut memory = new_memory(4, 1, prioritized, alpha);
        for (i, priority) in [1.0, 1.0, 1.0, 100.0].into_iter().enumerate() {
            memory.add_sample(i as u32, priority);
        }
        memory
    }

    /// Frequency at which the last experience is drawn over `draws` samples
    fn last_frequency(memory: &mut ReplayMemory<u32>, draws: usize) -> f32 {
        let hits: usize = (0..draws / 4)
            .map(|_| memory.get_samples(4).unwrap())
            .map(|b| b.samples.iter().filter(|&&s| s == 3).count())
            .sum();
        hits as f32 / draws as f32
    }

    /// Chi-square statistic of the sample counts against a uniform draw, and its critical value
    fn uniform_chi_square(memory: &mut ReplayMemory<u32>) -> (f64, f64) {
        let draws = 4000 * 4;
        let mut counts = [0f64; 4];
        for _ in 0..draws / 4 {
            for s in memory.get_samples(4).unwrap().samples {
                counts[s as usize] += 1.0;
            }
        }

        let expected = draws as f64 / 4.0;
        let chi2: f64 = counts
            .iter()
            .map(|&c| (c - expected).powi(2) / expected)
            .sum();
        let critical = ChiSquared::new(3.0).unwrap().inverse_cdf(0.999);
        (chi2, critical)
    }

    fn stored(memory: &ReplayMemory<u32>) -> Vec<u32> {
        memory.iter().map(|(_, _, &s)| s).collect()
    }

    #[test]
    fn replay_memory_config_validated() {
        let config = ReplayMemoryConfig::default();
        assert_eq!(
            ReplayMemory::<u32>::new(config.clone().capacity(0)).err(),
            Some(MemoryError::ZeroCapacity)
        );
        assert_eq!(
            ReplayMemory::<u32>::new(config.clone().capacity(4).size_min(5)).err(),
            Some(MemoryError::WarmUpExceedsCapacity {
                size_min: 5,
                capacity: 4
            })
        );
        assert!(matches!(
            ReplayMemory::<u32>::new(config.alpha(1.5)),
            Err(MemoryError::OutOfInterval { name: "alpha", .. })
        ));
    }

    #[test]
    fn replay_memory_evicts_oldest() {
        let mut memory = new_memory(3, 1, true, 1.0);
        let first = memory.push(1);
        for i in 2..=5 {
            memory.push(i);
        }

        assert_eq!(memory.len(), 3, "length capped at capacity");
        assert_eq!(stored(&memory), [3, 4, 5], "oldest evicted first");
        assert_eq!(memory.priority(first), None, "handle of evicted experience is stale");
    }

    #[test]
    fn replay_memory_warm_up() {
        let mut memory = new_memory(8, 3, true, 1.0);
        memory.push(1);
        memory.push(2);

        let batch = memory.get_samples(2).unwrap();
        assert!(batch.is_empty(), "nothing sampled before warm-up");

        memory.push(3);
        let batch = memory.get_samples(10).unwrap();
        assert_eq!(batch.len(), 3, "batch clamped to the stored count");
        assert!(batch.weights.is_none());
        for (handle, sample) in batch.handles.iter().zip(&batch.samples) {
            assert_eq!(*sample as u64, handle.id() + 1, "handles line up with samples");
        }
    }

    #[test]
    fn replay_memory_invalid_requests() {
        let mut memory = new_memory(4, 0, false, 1.0);
        assert_eq!(memory.get_samples(1), Err(MemoryError::Empty));
        memory.push(1);
        assert_eq!(memory.get_samples(0), Err(MemoryError::ZeroBatchSize));
    }

    #[test]
    fn replay_memory_priority_floor() {
        let mut memory = new_memory(4, 1, true, 1.0);
        let zero = memory.add_sample(1, 0.0);
        let negative = memory.add_sample(2, -3.0);
        let nan = memory.add_sample(3, f32::NAN);
        let positive = memory.add_sample(4, 2.5);

        assert_eq!(memory.priority(zero), Some(PRIORITY_FLOOR));
        assert_eq!(memory.priority(negative), Some(PRIORITY_FLOOR));
        assert_eq!(memory.priority(nan), Some(PRIORITY_FLOOR));
        assert_eq!(memory.priority(positive), Some(2.5));

        memory.update_priorities(&[zero, negative, positive], &[-4.0, 0.0, 0.5]);
        assert_eq!(memory.priority(zero), Some(4.0), "magnitude of the error");
        assert_eq!(memory.priority(negative), Some(PRIORITY_FLOOR));
        assert_eq!(memory.priority(positive), Some(0.5));
    }

    #[test]
    fn replay_memory_update_skips_stale_and_unprioritized() {
        let mut memory = new_memory(2, 1, true, 1.0);
        let stale = memory.push(1);
        let live = memory.push(2);
        memory.push(3);

        memory.update_priorities(&[stale, live], &[7.0, 9.0]);
        assert_eq!(memory.priority(live), Some(9.0));
        assert!(
            memory.iter().all(|(h, p, _)| h == live || p == 1.0),
            "the experience that replaced the stale one is untouched"
        );

        let mut uniform = new_memory(2, 1, false, 1.0);
        let handle = uniform.push(1);
        uniform.update_priorities(&[handle], &[5.0]);
        assert_eq!(uniform.priority(handle), Some(1.0), "no effect without priority mode");
    }

    #[test]
    fn replay_memory_prioritized_sampling_bias() {
        let mut memory = skewed_memory(true, 1.0);
        let batch = memory.get_samples(4).unwrap();
        assert_eq!(batch.len(), 4);

        let freq = last_frequency(&mut memory, 20000);
        assert!(
            (freq - 100.0 / 103.0).abs() < 0.01,
            "high priority experience drawn with frequency {freq}"
        );
    }

    #[test]
    fn replay_memory_alpha_tempers_priorities() {
        let mut memory = skewed_memory(true, 0.5);
        let freq = last_frequency(&mut memory, 20000);
        assert!(
            (freq - 10.0 / 13.0).abs() < 0.015,
            "sampled in proportion to priority^alpha, got frequency {freq}"
        );
    }

    #[test]
    fn replay_memory_alpha_zero_samples_uniformly() {
        let mut memory = skewed_memory(true, 0.0);
        let (chi2, critical) = uniform_chi_square(&mut memory);
        assert!(
            chi2 < critical,
            "alpha of zero flattens priorities (chi2 {chi2} >= {critical})"
        );
    }

    #[test]
    fn replay_memory_uniform_sampling_goodness_of_fit() {
        let mut memory = skewed_memory(false, 1.0);
        let (chi2, critical) = uniform_chi_square(&mut memory);
        assert!(
            chi2 < critical,
            "priorities ignored when not prioritized (chi2 {chi2} >= {critical})"
        );
    }

    #[test]
    fn replay_memory_huge_priorities_stay_sampleable() {
        let mut memory = new_memory(4, 1, true, 1.0);
        let huge: Vec<_> = (0..3).map(|i| memory.add_sample(i, f32::MAX)).collect();
        let infinite = memory.add_sample(3, f32::INFINITY);

        let ceiling = priority_ceiling(4);
        for &handle in &huge {
            assert_eq!(memory.priority(handle), Some(ceiling), "priority capped");
        }
        assert_eq!(memory.priority(infinite), Some(PRIORITY_FLOOR));

        memory.update_priorities(&[infinite], &[-f32::MAX]);
        assert_eq!(memory.priority(infinite), Some(ceiling));

        let batch = memory.get_samples(4).unwrap();
        assert_eq!(batch.len(), 4, "a full memory of capped priorities can be sampled");
    }
}
