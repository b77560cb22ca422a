#[cfg(test)]
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use std::time::Instant;

/// A wrapping millisecond counter. Callers compute elapsed time with
/// `wrapping_sub`, so rolling over `u32::MAX` needs no special case.
pub trait Clock {
    fn millis(&self) -> u32;
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    fn millis(&self) -> u32 {
        // truncation is the rollover
        self.origin.elapsed().as_millis() as u32
    }
}

/// Settable clock, shared between clones.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU32>);

#[cfg(test)]
impl ManualClock {
    pub fn starting_at(ms: u32) -> Self {
        Self(Arc::new(AtomicU32::new(ms)))
    }
    pub fn set(&self, ms: u32) {
        self.0.store(ms, Ordering::Relaxed);
    }
    pub fn advance(&self, ms: u32) {
        let now = self.0.load(Ordering::Relaxed);
        self.0.store(now.wrapping_add(ms), Ordering::Relaxed);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn millis(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }
}
