use crate::detector::{DisplayMode, Snapshot};
use crate::*;
use askama::Template;

/// Live reading fragment pushed to the web page over SSE.
#[derive(Template, Default)]
#[template(path = "sse_update.html")]
pub struct Tracker {
    pub mode: String,
    pub cpm: u64,
    pub dose_h: String,
    pub other_mode: String,
    pub other_cpm: u64,
    pub other_dose_h: String,
    pub total_count: u64,
    pub elapsed_h: String,
    pub warming_up: bool,
    pub clicking: bool,
    capacity: usize,
}

impl Tracker {
    pub fn new(capacity: usize) -> Self {
        let mut x = Self::default();
        x.capacity = capacity;
        x.update(&Snapshot::default());
        x
    }
    pub fn update(&mut self, s: &Snapshot) {
        let other = s.mode.toggle();
        let selected = s.selected();
        let alternate = if other == DisplayMode::Average { s.average } else { s.timer };
        self.mode = s.mode.to_string();
        self.cpm = selected.cpm;
        self.dose_h = humanize_dose(selected.dose);
        self.other_mode = other.to_string();
        self.other_cpm = alternate.cpm;
        self.other_dose_h = humanize_dose(alternate.dose);
        self.total_count = s.total_count;
        self.elapsed_h = humanize_secs(s.elapsed_secs);
        self.warming_up = s.samples < self.capacity;
        self.clicking = s.clicking;
    }
}

fn humanize_secs(secs: u32) -> String {
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}

#[cfg(test)]
mod checks {
    use super::*;
    use crate::geiger::Rate;
    #[test]
    fn check_secs() {
        assert_eq!(humanize_secs(59), "0m 59s");
        assert_eq!(humanize_secs(3725), "1h 02m 05s");
    }
    #[test]
    fn check_render() {
        let mut t = Tracker::new(10);
        t.update(&Snapshot {
            mode: DisplayMode::Timer,
            timer: Rate { cpm: 31, dose: 177 },
            average: Rate { cpm: 28, dose: 160 },
            total_count: 93,
            elapsed_secs: 180,
            samples: 10,
            clicking: false,
        });
        assert_eq!(t.other_mode, "moving average");
        assert!(!t.warming_up);
        let html = t.render().unwrap();
        assert!(html.contains("31 CPM"));
        assert!(html.contains("0.18 µSv"));
        assert!(html.contains("28 CPM"));
        assert!(!html.contains("warming up"));
    }
}
