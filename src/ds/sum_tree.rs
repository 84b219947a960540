use segment_tree::{ops::MaxIgnoreNaN, SegmentPoint};

use super::RingBuffer;

/// A binary tree data structure where each parent node is the sum of its child nodes,
/// with a circular payload slot attached to every leaf
///
/// The tree is stored as a flat array of `2 * capacity - 1` values. Leaves occupy the last
/// `capacity` entries, the children of node `i` are `2i + 1` and `2i + 2`, and the root holds
/// the total priority mass. A parallel max tree tracks the largest priority currently stored.
#[derive(Debug)]
pub struct SumTree<T> {
    tree: Vec<f32>,
    max_tree: SegmentPoint<f32, MaxIgnoreNaN>,
    data: RingBuffer<T>,
    capacity: usize,
}

impl<T> SumTree<T> {
    /// Initialize a new `SumTree` with a given capacity
    ///
    /// **Panics** if `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "`capacity` must be greater than zero");
        Self {
            tree: vec![0.0; 2 * capacity - 1],
            max_tree: SegmentPoint::build(vec![0.0; capacity], MaxIgnoreNaN),
            data: RingBuffer::new(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.is_full()
    }

    /// Update the priority at a provided slot and refresh every ancestor up to the root
    ///
    /// **Panics** if `ix` is not less than the capacity
    pub fn update(&mut self, ix: usize, priority: f32) {
        assert!(ix < self.capacity, "slot {ix} out of range");
        self.max_tree.modify(ix, priority);
        let mut ix = ix + self.capacity - 1;
        self.tree[ix] = priority;

        while ix > 0 {
            ix = (ix - 1) / 2;
            self.tree[ix] = self.tree[2 * ix + 1] + self.tree[2 * ix + 2];
        }
    }

    /// Find the slot whose cumulative priority range contains `value`
    ///
    /// Descends left while `value` is within the left subtree's sum, otherwise subtracts that
    /// sum and descends right. A subtree with no mass is never entered while its sibling has
    /// some, so as long as [`total`](SumTree::total) is positive the returned slot has a
    /// positive priority.
    pub fn retrieve(&self, value: f32) -> usize {
        let mut ix = 0;
        let mut val = value;
        while ix < self.capacity - 1 {
            let left = 2 * ix + 1;
            let right = left + 1;
            let (left_sum, right_sum) = (self.tree[left], self.tree[right]);
            ix = if right_sum <= 0.0 || (left_sum > 0.0 && val <= left_sum) {
                left
            } else {
                val -= left_sum;
                right
            }
        }

        ix - (self.capacity - 1)
    }

    /// Get the sum of all priorities stored
    pub fn total(&self) -> f32 {
        self.tree[0]
    }

    /// Get the priority stored at a slot
    pub fn priority(&self, ix: usize) -> f32 {
        self.tree[ix + self.capacity - 1]
    }

    /// Get the largest priority currently stored, or zero if the tree is empty
    pub fn max(&self) -> f32 {
        self.max_tree.query(0, self.max_tree.len())
    }

    /// Get the payload stored at a slot, if occupied
    pub fn get(&self, ix: usize) -> Option<&T> {
        self.data.get(ix)
    }

    /// Write a payload with a priority at the write cursor and advance it, overwriting the
    /// oldest entry if the tree is full
    ///
    /// **Returns** the slot written and the displaced payload, if any
    pub fn add(&mut self, priority: f32, payload: T) -> (usize, Option<T>) {
        let (ix, displaced) = self.data.push(payload);
        self.update(ix, priority);
        (ix, displaced)
    }

    /// Evict the entry at the write cursor, zeroing its priority
    ///
    /// Once the tree is full this is the oldest entry. The cursor does not move, so the next
    /// [`add`](SumTree::add) refills the freed slot.
    pub fn pop(&mut self) -> Option<T> {
        let ix = self.data.cursor();
        let payload = self.data.pop()?;
        self.update(ix, 0.0);
        Some(payload)
    }

    /// Iterate over occupied slots as `(index, priority, payload)`
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32, &T)> {
        self.data
            .iter()
            .map(|(ix, payload)| (ix, self.priority(ix), payload))
    }
}
