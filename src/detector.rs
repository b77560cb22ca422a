use std::sync::Arc;

use serde::Serialize;
use tokio::{
    select,
    sync::{broadcast, mpsc::UnboundedReceiver, watch},
    time::{Duration, MissedTickBehavior},
};

use crate::clock::Clock;
use crate::commands::DetectorCommand;
use crate::debounce::{ButtonEvent, Debouncer, Level};
use crate::geiger::{ConfigError, Geiger, GeigerConfig, Rate};
use crate::loop_timer::LoopTimer;
use crate::pulse::PulseCounter;
use crate::timed_action::TimedAction;
use crate::*;

/// Which estimator the reports lead with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Average,
    Timer,
}

impl DisplayMode {
    pub fn toggle(self) -> Self {
        match self {
            Self::Average => Self::Timer,
            Self::Timer => Self::Average,
        }
    }
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Average => write!(f, "moving average"),
            Self::Timer => write!(f, "timer"),
        }
    }
}

/// Cadences of the polling loop, all in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    /// How often pending pulses are handed to the estimator. Must stay below
    /// the estimator's sample interval.
    pub sample_ms: u32,
    pub report_ms: u32,
    pub click_ms: u32,
    pub debounce_ms: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            sample_ms: 1000,
            report_ms: 2000,
            click_ms: 30,
            debounce_ms: 50,
        }
    }
}

/// One reading of both estimators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub mode: DisplayMode,
    pub timer: Rate,
    pub average: Rate,
    pub total_count: u64,
    pub elapsed_secs: u32,
    pub samples: usize,
    pub clicking: bool,
}

impl Snapshot {
    pub fn selected(&self) -> Rate {
        match self.mode {
            DisplayMode::Average => self.average,
            DisplayMode::Timer => self.timer,
        }
    }
}

pub struct Detector<C> {
    geiger: Geiger<C>,
    clock: C,
    settings: LoopSettings,
    pulses: Arc<PulseCounter>,
    button: Debouncer,
    button_level: Level,
    click: TimedAction,
    sample_timer: LoopTimer,
    report_timer: LoopTimer,
    mode: DisplayMode,
}

impl<C: Clock + Clone> Detector<C> {
    pub fn new(
        config: GeigerConfig,
        settings: LoopSettings,
        clock: C,
        pulses: Arc<PulseCounter>,
    ) -> Result<Self, ConfigError> {
        if settings.sample_ms >= config.sample_interval_ms {
            warn!(
                "sampling every {} ms is not faster than the {} ms interval, readings will lag",
                settings.sample_ms, config.sample_interval_ms
            );
        }
        let geiger = Geiger::new(config, clock.clone())?;
        let now = clock.millis();
        Ok(Self {
            geiger,
            clock,
            settings,
            pulses,
            button: Debouncer::new(settings.debounce_ms),
            button_level: Level::High,
            click: TimedAction::new(),
            sample_timer: LoopTimer::new(now),
            report_timer: LoopTimer::new(now),
            mode: DisplayMode::default(),
        })
    }

    /// One pass of the polling loop. Returns a snapshot when a report is due.
    pub fn tick(&mut self) -> Option<Snapshot> {
        let now = self.clock.millis();
        if self.click.update(now) {
            trace!("click off");
        }
        if self.sample_timer.expired(now, self.settings.sample_ms) {
            let pending = self.pulses.drain();
            let num = u16::try_from(pending).unwrap_or_else(|_| {
                warn!("{pending} pulses in one sample, clamping to {}", u16::MAX);
                u16::MAX
            });
            self.geiger.add_count(num);
            if num > 0 {
                trace!("click on, {num} pulses");
                self.click.start(now, self.settings.click_ms);
            }
        }
        if let Some(ButtonEvent::KeyDown) = self.button.update(self.button_level, now) {
            self.mode = self.mode.toggle();
            info!("Display mode is now {}", self.mode);
        }
        if self.report_timer.expired(now, self.settings.report_ms) {
            Some(self.snapshot())
        } else {
            None
        }
    }

    pub fn handle(&mut self, cmd: DetectorCommand) {
        match cmd {
            DetectorCommand::Reset => {
                info!("Starting a new measurement epoch");
                self.geiger.reset_count();
                self.report_timer.force_expired(self.settings.report_ms);
            }
            DetectorCommand::Button(level) => {
                trace!("raw button state {:?}", Debouncer::status(level));
                self.button_level = level;
            }
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.mode,
            timer: self.geiger.rate_timer(),
            average: self.geiger.rate_average(),
            total_count: self.geiger.total_count(),
            elapsed_secs: self.geiger.elapsed_ms() / 1000,
            samples: self.geiger.samples(),
            clicking: self.click.is_active(),
        }
    }
}

fn report(s: &Snapshot) {
    let r = s.selected();
    info!("{} CPM, {} ({})", r.cpm, humanize_dose(r.dose), s.mode);
    debug!(
        "timer {:?}, average {:?}, {} counts in {} s, {} samples",
        s.timer, s.average, s.total_count, s.elapsed_secs, s.samples
    );
}

/// Drives `detector` every `tick` until the command channel closes.
pub async fn run<C: Clock + Clone>(
    mut detector: Detector<C>,
    mut cmd_rx: UnboundedReceiver<DetectorCommand>,
    status_tx: watch::Sender<Snapshot>,
    update_tx: broadcast::Sender<Snapshot>,
    tick: Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Entering detector loop");
    loop {
        select! {
            _ = ticker.tick() => {
                if let Some(snapshot) = detector.tick() {
                    report(&snapshot);
                    status_tx.send_replace(snapshot.clone());
                    // no web clients is fine
                    _ = update_tx.send(snapshot);
                }
            },
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    error!("command channel dropped");
                    break;
                };
                debug!("Command received: {cmd:?}");
                detector.handle(cmd);
            },
        }
    }
}

#[cfg(test)]
mod checks {
    use super::*;
    use crate::clock::ManualClock;

    fn detector() -> (Detector<ManualClock>, ManualClock, Arc<PulseCounter>) {
        let clock = ManualClock::starting_at(500);
        let pulses = Arc::new(PulseCounter::new());
        let d = Detector::new(
            GeigerConfig::sbm20(),
            LoopSettings::default(),
            clock.clone(),
            pulses.clone(),
        )
        .unwrap();
        (d, clock, pulses)
    }

    #[test]
    fn check_pulses_reach_estimator() {
        let (mut d, clock, pulses) = detector();
        let mut reports = Vec::new();
        for _ in 0..6 {
            pulses.add(5);
            clock.advance(1000);
            reports.extend(d.tick());
        }
        assert_eq!(reports.len(), 3);
        let last = reports.last().unwrap();
        assert_eq!(last.total_count, 30);
        assert_eq!(last.elapsed_secs, 6);
        assert_eq!(last.timer.cpm, 300);
        // flushed at 3000 and 6000 ms: 10 then 15
        assert_eq!(last.samples, 2);
        assert_eq!(last.average.cpm, 250);
        assert_eq!(last.selected(), last.average);
    }
    #[test]
    fn check_reset_forces_report() {
        let (mut d, clock, pulses) = detector();
        pulses.add(9);
        clock.advance(1000);
        assert!(d.tick().is_none());
        d.handle(DetectorCommand::Reset);
        let s = d.tick().unwrap();
        assert_eq!(s.total_count, 0);
        assert_eq!(s.elapsed_secs, 0);
        assert_eq!(s.timer, Rate::default());
    }
    #[test]
    fn check_button_toggles_mode() {
        let (mut d, clock, _) = detector();
        d.handle(DetectorCommand::Button(Level::Low));
        d.tick();
        clock.advance(60);
        d.tick();
        assert_eq!(d.snapshot().mode, DisplayMode::Timer);
        d.handle(DetectorCommand::Button(Level::High));
        d.tick();
        clock.advance(60);
        d.tick();
        assert_eq!(d.snapshot().mode, DisplayMode::Timer);
        d.handle(DetectorCommand::Button(Level::Low));
        d.tick();
        clock.advance(60);
        d.tick();
        assert_eq!(d.snapshot().mode, DisplayMode::Average);
    }
    #[test]
    fn check_click_follows_pulses() {
        let (mut d, clock, pulses) = detector();
        clock.advance(1000);
        d.tick();
        assert!(!d.snapshot().clicking);
        pulses.add(1);
        clock.advance(1000);
        d.tick();
        assert!(d.snapshot().clicking);
        clock.advance(30);
        d.tick();
        assert!(!d.snapshot().clicking);
    }
    #[test]
    fn check_backlog_is_clamped() {
        let (mut d, clock, pulses) = detector();
        pulses.add(100_000);
        clock.advance(1000);
        d.tick();
        assert_eq!(d.snapshot().total_count, u64::from(u16::MAX));
    }
    #[test]
    fn check_mode_serializes_lowercase() {
        let s = Snapshot {
            mode: DisplayMode::Timer,
            ..Default::default()
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["mode"], "timer");
        assert_eq!(v["average"]["cpm"], 0);
    }

    #[tokio::test]
    async fn check_run_publishes() {
        let clock = ManualClock::starting_at(0);
        let pulses = Arc::new(PulseCounter::new());
        let settings = LoopSettings {
            report_ms: 0,
            ..Default::default()
        };
        let d = Detector::new(GeigerConfig::sbm20(), settings, clock, pulses).unwrap();
        let (cmd_tx, cmd_rx) = tokio::sync::mpsc::unbounded_channel();
        let (status_tx, mut status_rx) = watch::channel(Snapshot::default());
        let (update_tx, mut update_rx) = broadcast::channel(8);
        let task = tokio::spawn(run(d, cmd_rx, status_tx, update_tx, Duration::from_millis(10)));
        let s = update_rx.recv().await.unwrap();
        assert_eq!(s.mode, DisplayMode::Average);
        status_rx.changed().await.unwrap();
        drop(cmd_tx);
        task.await.unwrap();
    }
}
