//! Ring Buffer - Fixed-capacity circular sample history
//!
//! Backs the probability smoothing window and the occupancy-rate window.
//! Storage is allocated once; when full, each push overwrites the oldest
//! slot and advances `head`.

/// Circular buffer of samples. `head` indexes the oldest sample once full.
#[derive(Debug, Clone, PartialEq)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Build from stored samples (oldest first), keeping only the newest
    /// `capacity`
    pub fn from_vec(mut samples: Vec<T>, capacity: usize) -> Self {
        if samples.len() > capacity {
            samples.drain(..samples.len() - capacity);
        }
        samples.reserve_exact(capacity - samples.len());
        Self {
            slots: samples,
            head: 0,
            capacity,
        }
    }

    /// Push a sample, overwriting the oldest when full
    pub fn push(&mut self, value: T) {
        if self.capacity == 0 {
            return;
        }
        if self.slots.len() < self.capacity {
            self.slots.push(value);
            return;
        }
        self.slots[self.head] = value;
        self.head = (self.head + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Newest sample
    pub fn last(&self) -> Option<&T> {
        if self.slots.is_empty() {
            return None;
        }
        self.slots.get((self.head + self.slots.len() - 1) % self.slots.len())
    }

    /// Oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Samples oldest to newest
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = RingBuffer::new(3);
        assert!(buffer.is_empty());
        assert_eq!(buffer.last(), None);

        for i in 0..5 {
            buffer.push(i);
        }

        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.to_vec(), vec![2, 3, 4]);
        assert_eq!(buffer.last(), Some(&4));
    }

    #[test]
    fn test_wraps_repeatedly() {
        let mut buffer = RingBuffer::new(4);
        for i in 0..11 {
            buffer.push(i);
            assert_eq!(buffer.last(), Some(&i));
        }
        // Slots were overwritten in place, head sits mid-vector
        assert_eq!(buffer.head, 3);
        assert_eq!(buffer.slots, vec![8, 9, 10, 7]);
        assert_eq!(buffer.to_vec(), vec![7, 8, 9, 10]);
        assert_eq!(buffer.iter().count(), 4);
    }

    #[test]
    fn test_from_vec_keeps_newest() {
        let mut buffer = RingBuffer::from_vec((0..20).collect(), 12);
        assert_eq!(buffer.len(), 12);
        assert_eq!(buffer.to_vec(), (8..20).collect::<Vec<_>>());

        buffer.push(20);
        assert_eq!(buffer.to_vec(), (9..21).collect::<Vec<_>>());
        assert_eq!(buffer.last(), Some(&20));

        let mut partial = RingBuffer::from_vec(vec![1, 2], 3);
        partial.push(3);
        partial.push(4);
        assert_eq!(partial.to_vec(), vec![2, 3, 4]);
    }

    #[test]
    fn test_zero_capacity_stays_empty() {
        let mut buffer = RingBuffer::new(0);
        buffer.push(1.0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.last(), None);
        assert!(RingBuffer::<u8>::from_vec(vec![1, 2], 0).is_empty());
    }
}
