use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    sync::{broadcast, mpsc::unbounded_channel, watch},
    time::Duration,
};
mod clock;
use clock::MonotonicClock;
mod moving_average;
mod geiger;
use geiger::GeigerConfig;
mod loop_timer;
mod debounce;
mod timed_action;
mod pulse;
use pulse::PulseCounter;
mod detector;
use detector::{Detector, LoopSettings, Snapshot};

mod unixsocket;
mod commands;
mod webapp;

mod tracker;

pub use tracing::{debug, error, info, trace, warn};

type Anything<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(clap::Parser, Debug)]
struct Config {
    #[clap(short = 'p', long = "port", env = "GEIGERD_PORT", default_value = "3000")]
    port: u16,
    #[clap(short = 's', long = "socket", env = "GEIGERD_SOCKET")]
    socket: Option<std::path::PathBuf>,
    #[clap(short = 'v', action = clap::ArgAction::Count)]
    verbosity: u8,
    /// Width of one moving average bucket
    #[clap(long, env = "GEIGERD_INTERVAL_MS", default_value = "3000")]
    interval_ms: u32,
    /// Number of buckets in the moving average
    #[clap(long, env = "GEIGERD_BUFFER_SIZE", default_value = "10")]
    buffer_size: usize,
    /// Dose rate per CPM. Readings are displayed as nSv/h, so the factor
    /// must convert CPM to nSv/h (SBM-20 by default)
    #[clap(long, env = "GEIGERD_CPM_TO_DOSE", default_value = "5.7002793")]
    cpm_to_dose: f32,
    /// How often pending pulses are handed to the estimator
    #[clap(long, env = "GEIGERD_SAMPLE_MS", default_value = "1000")]
    sample_ms: u32,
    #[clap(long, env = "GEIGERD_REPORT_MS", default_value = "2000")]
    report_ms: u32,
    #[clap(long, env = "GEIGERD_CLICK_MS", default_value = "30")]
    click_ms: u32,
    #[clap(long, env = "GEIGERD_DEBOUNCE_MS", default_value = "50")]
    debounce_ms: u32,
    /// Polling loop period
    #[clap(long, env = "GEIGERD_TICK_MS", default_value = "10")]
    tick_ms: u64,
}

impl Config {
    fn geiger(&self) -> GeigerConfig {
        GeigerConfig {
            sample_interval_ms: self.interval_ms,
            buffer_size: self.buffer_size,
            cpm_to_dose: self.cpm_to_dose,
        }
    }
    fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            sample_ms: self.sample_ms,
            report_ms: self.report_ms,
            click_ms: self.click_ms,
            debounce_ms: self.debounce_ms,
        }
    }
}

fn setup(config: &Config) -> Anything<()> {
    let loglevel = match config.verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(loglevel)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn get_socket_path(config: &Config) -> Result<PathBuf, String> {
    if let Some(p) = config.socket.clone() {
        return Ok(p)
    }
    if let Ok(d) = std::env::var("XDG_RUNTIME_DIR") {
        let mut socket_path = PathBuf::new();
        socket_path.push(d);
        socket_path.push("geigerd");
        debug!("Using default socket path");
        Ok(socket_path)
    } else {
        error!("Socket path must be specified");
        Err("No socket path".into())
    }
}

use tokio::net::UnixListener;
async fn start_unix_socket(socket_path: impl AsRef<Path>) -> std::io::Result<UnixListener> {
    // attempt to remove the socket, if it exists already
    if let Ok(true) = tokio::fs::try_exists(&socket_path).await {
        unixsocket::prep_socket_path(&socket_path).await;
    }
    UnixListener::bind(socket_path)
}

#[tokio::main]
async fn main() -> Anything<()> {
    let c: Config = clap::Parser::parse();
    setup(&c)?;
    let geiger_config = c.geiger();
    let pulses = Arc::new(PulseCounter::new());
    let detector = Detector::new(
        geiger_config,
        c.loop_settings(),
        MonotonicClock::new(),
        pulses.clone(),
    )?;
    info!("Tube calibration: {geiger_config:?}");
    // figure out the path for the unix socket
    let socket_path = get_socket_path(&c)?;
    info!("Socket path is: {:?}", socket_path);
    let socket = start_unix_socket(socket_path).await?;
    // set up app channels
    let (cmd_tx, cmd_rx) = unbounded_channel();
    let (status_tx, status_rx) = watch::channel(Snapshot::default());
    let (update_tx, update_rx) = broadcast::channel(1024);
    let web_ui = webapp::server(
        webapp::WebLinks {
            updates: update_rx,
            status: status_rx.clone(),
            commands: cmd_tx.clone(),
            capacity: geiger_config.buffer_size,
        },
        c.port,
    );
    let endpoints = unixsocket::Endpoints {
        commands: cmd_tx,
        pulses,
        status: status_rx,
    };
    let unix_socket = unixsocket::server(socket, endpoints);
    let tick = Duration::from_millis(c.tick_ms.max(1));
    let main_thr = detector::run(detector, cmd_rx, status_tx, update_tx, tick);
    let (_, _, socket_result) = tokio::join!(web_ui, main_thr, unix_socket);
    socket_result?;
    Ok(())
}

/// Formats a dose rate given in nSv/h.
pub fn humanize_dose(nsv_h: u64) -> String {
    if nsv_h < 1_000_000 {
        format!("{:.2} µSv/h", nsv_h as f64 / 1000.0)
    } else {
        format!("{:.2} mSv/h", nsv_h as f64 / 1_000_000.0)
    }
}
