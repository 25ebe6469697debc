//! Fixed-capacity circular (ring) buffer.
//!
//! When the buffer is full, a new item **overwrites** the oldest one so that
//! the most recent `capacity` items are always available in arrival order.
//! The chart histories use it as a FIFO-evicting window of pitch points.
//!
//! # Example
//!
//! ```rust
//! use pitch_practice::audio::RingBuffer;
//!
//! let mut buf = RingBuffer::new(4);
//! for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
//!     buf.push(x); // capacity 4: the 5th push drops 1.0
//! }
//! assert_eq!(buf.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0, 5.0]);
//! ```

// ---------------------------------------------------------------------------
// RingBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity circular buffer.
///
/// The backing storage is allocated once in [`new`](Self::new) and never
/// grows.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the *next* write position (wraps around `capacity`).
    write_pos: usize,
    /// Number of valid items currently stored (≤ `capacity`).
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            buf: vec![T::default(); capacity],
            capacity,
            write_pos: 0,
            len: 0,
        }
    }

    /// Append one item, evicting the oldest when full.
    ///
    /// Returns the evicted item, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.len == self.capacity {
            Some(self.buf[self.write_pos])
        } else {
            self.len += 1;
            None
        };
        self.buf[self.write_pos] = item;
        self.write_pos = (self.write_pos + 1) % self.capacity;
        evicted
    }

    /// Index of the oldest stored item in `buf`.
    fn read_pos(&self) -> usize {
        if self.len < self.capacity {
            0
        } else {
            self.write_pos
        }
    }

    /// Iterate over the stored items from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let start = self.read_pos();
        (0..self.len).map(move |i| self.buf[(start + i) % self.capacity])
    }

    /// The most recently pushed item.
    pub fn last(&self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        Some(self.buf[(self.write_pos + self.capacity - 1) % self.capacity])
    }

    /// Discard all items and reset the write position.
    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.len = 0;
    }

    /// Number of valid items currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the buffer contains no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of items the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn filled<T: Copy + Default>(capacity: usize, items: &[T]) -> RingBuffer<T> {
        let mut buf = RingBuffer::new(capacity);
        for &item in items {
            buf.push(item);
        }
        buf
    }

    fn contents<T: Copy + Default>(buf: &RingBuffer<T>) -> Vec<T> {
        buf.iter().collect()
    }

    // ---- Basic push / read -------------------------------------------------

    #[test]
    fn push_within_capacity_keeps_order() {
        let buf = filled(8, &[1.0_f32, 2.0, 3.0]);
        assert_eq!(buf.len(), 3);
        assert_eq!(contents(&buf), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn last_returns_newest_item() {
        let mut buf = RingBuffer::new(3);
        assert_eq!(buf.last(), None::<u32>);
        for i in 1..=4_u32 {
            buf.push(i);
        }
        assert_eq!(buf.last(), Some(4));
    }

    // ---- Overflow (oldest item discarded) ----------------------------------

    #[test]
    fn push_into_full_buffer_evicts_exactly_the_oldest() {
        let mut buf = filled(4, &[1_u32, 2, 3, 4]);
        assert_eq!(buf.len(), buf.capacity());

        assert_eq!(buf.push(5), Some(1));
        assert_eq!(buf.len(), 4);
        assert_eq!(contents(&buf), vec![2, 3, 4, 5]);
    }

    #[test]
    fn long_stream_never_exceeds_capacity() {
        let mut buf = RingBuffer::new(50);
        for i in 0..1_000_u32 {
            buf.push(i);
            assert!(buf.len() <= 50);
        }
        let items = contents(&buf);
        assert_eq!(items.first(), Some(&950));
        assert_eq!(items.last(), Some(&999));
    }

    #[test]
    fn multiple_overflows_in_separate_calls() {
        let mut buf = filled(3, &[1.0_f32, 2.0, 3.0]);
        buf.push(4.0);
        buf.push(5.0);
        assert_eq!(contents(&buf), vec![3.0, 4.0, 5.0]);
    }

    // ---- Clear semantics ---------------------------------------------------

    #[test]
    fn clear_then_reuse() {
        let mut buf = filled(4, &[1.0_f32, 2.0, 3.0, 4.0, 5.0]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.last(), None);

        buf.push(9.0_f32);
        assert_eq!(contents(&buf), vec![9.0]);
    }

    #[test]
    fn tuples_are_supported() {
        let mut buf: RingBuffer<(f32, f32)> = RingBuffer::new(2);
        buf.push((0.9, 220.0));
        buf.push((0.3, 300.0));
        buf.push((0.9, 440.0));
        assert_eq!(contents(&buf), vec![(0.3, 300.0), (0.9, 440.0)]);
    }

    // ---- Panic guard -------------------------------------------------------

    #[test]
    #[should_panic(expected = "RingBuffer capacity must be > 0")]
    fn zero_capacity_panics() {
        let _buf: RingBuffer<f32> = RingBuffer::new(0);
    }
}
