use std::sync::atomic::{AtomicU32, Ordering};

/// Pulses waiting to be picked up by the polling loop. Event sources add
/// from any task; the loop takes everything with `drain`.
#[derive(Debug, Default)]
pub struct PulseCounter(AtomicU32);

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }
    /// Saturates at `u32::MAX` rather than wrapping.
    pub fn add(&self, n: u32) {
        // the closure never returns None, so this cannot fail
        _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |x| Some(x.saturating_add(n)));
    }
    pub fn drain(&self) -> u32 {
        self.0.swap(0, Ordering::AcqRel)
    }
}
