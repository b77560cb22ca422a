/// Something switched on for a fixed duration, then off again by polling.
#[derive(Debug, Clone, Default)]
pub struct TimedAction {
    active: bool,
    duration_ms: u32,
    started_at: u32,
}

impl TimedAction {
    pub fn new() -> Self {
        Self::default()
    }
    /// Switches on, restarting the duration if already on.
    pub fn start(&mut self, now: u32, duration_ms: u32) {
        self.active = true;
        self.duration_ms = duration_ms;
        self.started_at = now;
    }
    /// Returns true on the poll that switches the action off.
    pub fn update(&mut self, now: u32) -> bool {
        if self.active && now.wrapping_sub(self.started_at) >= self.duration_ms {
            self.active = false;
            return true;
        }
        false
    }
    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod checks {
    use super::*;
    #[test]
    fn check_stops_once() {
        let mut a = TimedAction::new();
        assert!(!a.update(0));
        a.start(100, 20);
        assert!(a.is_active());
        assert!(!a.update(119));
        assert!(a.update(120));
        assert!(!a.is_active());
        assert!(!a.update(500));
    }
    #[test]
    fn check_restart_extends() {
        let mut a = TimedAction::new();
        a.start(0, 20);
        a.start(15, 20);
        assert!(!a.update(30));
        assert!(a.update(35));
    }
}
