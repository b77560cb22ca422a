/// Fires once per period when polled from a loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopTimer {
    prev: u32,
}

impl LoopTimer {
    pub fn new(now: u32) -> Self {
        Self { prev: now }
    }
    /// Makes the next `expired(_, period_ms)` return true.
    pub fn force_expired(&mut self, period_ms: u32) {
        self.prev = self.prev.wrapping_sub(period_ms);
    }
    /// True if `period_ms` has passed since the last expiry. Re-arms at `now`,
    /// so a late poll delays the following period too.
    pub fn expired(&mut self, now: u32, period_ms: u32) -> bool {
        let fired = now.wrapping_sub(self.prev) >= period_ms;
        if fired {
            self.prev = now;
        }
        fired
    }
}

#[cfg(test)]
mod checks {
    use super::*;
    #[test]
    fn check_period() {
        let mut t = LoopTimer::new(100);
        assert!(!t.expired(599, 500));
        assert!(t.expired(600, 500));
        assert!(!t.expired(600, 500));
        assert!(!t.expired(1099, 500));
        assert!(t.expired(1150, 500));
        assert!(!t.expired(1600, 500));
    }
    #[test]
    fn check_force_expired() {
        let mut t = LoopTimer::new(1000);
        t.force_expired(250);
        assert!(t.expired(1000, 250));
        assert!(!t.expired(1001, 250));
    }
    #[test]
    fn check_rollover() {
        let mut t = LoopTimer::new(u32::MAX - 10);
        assert!(!t.expired(5, 100));
        assert!(t.expired(89, 100));
    }
}
