use std::num::NonZeroUsize;

/// Moving sum over the last `capacity` samples.
///
/// `average()` is the sum of the held samples, not divided by their count.
/// Divide by `len()` where a true mean is wanted.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    samples: Box<[u16]>,
    sum: i64,
    len: usize,
    index: usize,
}

impl MovingAverage {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            samples: vec![0; capacity.get()].into_boxed_slice(),
            sum: 0,
            len: 0,
            index: 0,
        }
    }
    pub fn reset(&mut self) {
        self.index = 0;
        self.len = 0;
        self.sum = 0;
    }
    pub fn add(&mut self, value: u16) {
        // slots past `len` hold stale data from before a reset
        let evicted = if self.len < self.capacity() {
            self.len += 1;
            0
        } else {
            self.samples[self.index]
        };
        self.samples[self.index] = value;
        self.index = (self.index + 1) % self.capacity();
        self.sum += i64::from(value) - i64::from(evicted);
    }
    pub fn average(&self) -> u64 {
        self.sum as u64
    }
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }
}
