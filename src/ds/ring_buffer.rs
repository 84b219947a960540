use std::ops::Index;

/// A fixed-size ringbuffer of slots that are filled in circular order
///
/// The write cursor always points at the next slot to be written, which is the oldest
/// occupied slot once the buffer is full.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buffer: Vec<Option<T>>,
    ix: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Initialize an empty `RingBuffer` with a given capacity
    ///
    /// **Panics** if `capacity` is zero
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "`capacity` must be greater than zero");
        Self {
            buffer: std::iter::repeat_with(|| None).take(capacity).collect(),
            ix: 0,
            len: 0,
        }
    }

    /// Returns the number of occupied slots
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The slot the next [`push`](RingBuffer::push) will write to
    pub fn cursor(&self) -> usize {
        self.ix
    }

    /// Insert an element at the cursor, overwriting the oldest element if the buffer is full
    ///
    /// **Returns** the write index and the displaced element, if any
    pub fn push(&mut self, item: T) -> (usize, Option<T>) {
        let ix = self.ix;
        let displaced = self.buffer[ix].replace(item);
        if displaced.is_none() {
            self.len += 1;
        }
        self.ix = (ix + 1) % self.capacity();
        (ix, displaced)
    }

    /// Remove the element at the cursor without advancing it
    pub fn pop(&mut self) -> Option<T> {
        let item = self.buffer[self.ix].take();
        if item.is_some() {
            self.len -= 1;
        }
        item
    }

    /// Get the element stored in a slot, if occupied
    pub fn get(&self, ix: usize) -> Option<&T> {
        self.buffer.get(ix).and_then(Option::as_ref)
    }

    /// Iterate over the occupied slots as `(index, element)` pairs in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.buffer
            .iter()
            .enumerate()
            .filter_map(|(ix, slot)| slot.as_ref().map(|item| (ix, item)))
    }
}

impl<T> Index<usize> for RingBuffer<T> {
    type Output = T;

    /// **Panics** if the slot is empty
    fn index(&self, index: usize) -> &Self::Output {
        self.buffer[index]
            .as_ref()
            .expect("indexed slot is occupied")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(buf: &RingBuffer<i32>) -> Vec<i32> {
        buf.iter().map(|(_, x)| *x).collect()
    }

    #[test]
    fn ringbuffer_functional() {
        let mut buf = RingBuffer::new(4);
        assert_eq!(buf.len(), 0, "initialized empty");

        for i in 0..4 {
            buf.push(i * 2);
        }

        assert_eq!(buf.len(), 4, "length correct");
        assert_eq!(contents(&buf), [0, 2, 4, 6], "contents correct");

        buf.push(1);
        let (ix, displaced) = buf.push(3);
        assert_eq!(ix, 1, "write index is correct");
        assert_eq!(displaced, Some(2), "oldest element displaced");
        assert_eq!(buf.len(), 4, "length unchanged");
        assert_eq!(contents(&buf), [1, 3, 4, 6], "contents overwritten correctly");
        assert_eq!(buf[2], 4);
    }

    #[test]
    fn ringbuffer_pop() {
        let mut buf = RingBuffer::new(3);
        assert_eq!(buf.pop(), None, "pop on empty slot is a no-op");

        for i in 0..3 {
            buf.push(i);
        }
        assert!(buf.is_full());
        assert_eq!(buf.cursor(), 0, "cursor wrapped to oldest slot");

        assert_eq!(buf.pop(), Some(0), "pop removes the oldest element");
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.get(0), None);
        assert_eq!(buf.pop(), None, "cursor does not advance on pop");

        let (ix, displaced) = buf.push(7);
        assert_eq!((ix, displaced), (0, None), "push refills the popped slot");
        assert_eq!(buf.len(), 3);
        assert_eq!(contents(&buf), [7, 1, 2]);
    }
}
