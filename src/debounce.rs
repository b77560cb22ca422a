/// Raw level of a button input wired with a pull-up: `High` is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    KeyUp,
    KeyDown,
}

impl From<Level> for ButtonEvent {
    fn from(level: Level) -> Self {
        match level {
            Level::High => ButtonEvent::KeyUp,
            Level::Low => ButtonEvent::KeyDown,
        }
    }
}

/// Filters contact bounce: a level must hold for `delay_ms` before it is
/// reported, and each state is reported once.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay_ms: u32,
    previous: Level,
    last: ButtonEvent,
    changed_at: u32,
}

impl Debouncer {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            previous: Level::High,
            last: ButtonEvent::KeyUp,
            changed_at: 0,
        }
    }
    /// Unfiltered state for `level`.
    pub fn status(level: Level) -> ButtonEvent {
        level.into()
    }
    /// Feeds one sample, returning the debounced transition if one happened.
    pub fn update(&mut self, level: Level, now: u32) -> Option<ButtonEvent> {
        let mut event = None;
        if level != self.previous {
            self.changed_at = now;
        } else if now.wrapping_sub(self.changed_at) >= self.delay_ms {
            let state = ButtonEvent::from(level);
            if state != self.last {
                event = Some(state);
            }
            self.last = state;
        }
        self.previous = level;
        event
    }
}
