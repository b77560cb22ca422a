use std::{net::SocketAddr, convert::Infallible};
use askama::Template;
use tokio::{
    select,
    sync::{broadcast, mpsc, watch},
};
use warp::{sse::Event, Filter};
use tokio_stream::{
    Stream,
    StreamExt,
    wrappers::BroadcastStream,
};
use std::sync::{Arc, Mutex};

use crate::commands::DetectorCommand;
use crate::detector::Snapshot;
use crate::tracker::Tracker;
use crate::*;

#[derive(Template)]
#[template(path = "root.html")]
struct Root { }

#[derive(Clone)]
struct UpdateChan<T>(Arc<Mutex<broadcast::Sender<T>>>);
impl<T: Clone> UpdateChan<T> {
    fn new() -> Self {
        let (ch, _) = broadcast::channel(32);
        Self(Arc::new(Mutex::new(ch)))
    }
    fn subscribe(&self) -> broadcast::Receiver<T> {
        match self.0.lock() {
            Ok(ch) => ch.subscribe(),
            Err(poisoned) => poisoned.into_inner().subscribe(),
        }
    }
    fn send(&self, msg: T) -> Result<usize, broadcast::error::SendError<T>> {
        match self.0.lock() {
            Ok(ch) => ch.send(msg),
            Err(poisoned) => poisoned.into_inner().send(msg),
        }
    }
}

/// Everything the routes need from the rest of the daemon.
pub struct WebLinks {
    pub updates: broadcast::Receiver<Snapshot>,
    pub status: watch::Receiver<Snapshot>,
    pub commands: mpsc::UnboundedSender<DetectorCommand>,
    pub capacity: usize,
}

pub async fn server(links: WebLinks, port: u16) {
    let update_chan = UpdateChan::new();
    info!("Starting web server");
    let (kick_tx, kick_rx) = mpsc::channel(1);
    tokio::task::spawn(statemonitor(links.updates, update_chan.clone(), kick_rx, links.capacity));
    let root_route = warp::path!("root")
        .and(warp::get())
        // and_then requires a fn that returns a TryFuture, whose
        // error type is warp::Rejection
        .and_then(root);
    let sse_route = warp::path("sse")
        .and(warp::get())
        .map(move || update_chan.subscribe())
        .map(move |a| {
            warp::sse::reply(warp::sse::keep_alive().stream(sse_stream(a)))
        });
    let sse_kick = warp::path("sse")
        .and(warp::post())
        .map(move || kick_tx.clone())
        .and_then(kick);
    let status = links.status;
    let rate_route = warp::path!("rate")
        .and(warp::get())
        .map(move || warp::reply::json(&*status.borrow()));
    let commands = links.commands;
    let reset_route = warp::path!("reset")
        .and(warp::post())
        .map(move || {
            let code = if commands.send(DetectorCommand::Reset).is_ok() {
                warp::http::StatusCode::OK
            } else {
                warp::http::StatusCode::SERVICE_UNAVAILABLE
            };
            warp::reply::with_status(warp::reply(), code)
        });
    let routes = root_route
        .or(sse_kick)
        .or(sse_route)
        .or(rate_route)
        .or(reset_route);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    warp::serve(routes).run(addr).await;
}

/// keeps the reading tracker in a dedicated task and manages the update
/// broadcast channel
async fn statemonitor(
    mut update_rx: broadcast::Receiver<Snapshot>,
    chan: UpdateChan<String>,
    mut kick_chan: mpsc::Receiver<()>,
    capacity: usize,
) {
    debug!("statemonitor started");
    let mut tracker = Tracker::new(capacity);
    loop {
        select! {
            msg = update_rx.recv() => match msg {
                Ok(snapshot) => tracker.update(&snapshot),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!("statemonitor skipped {n} readings");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            Some(()) = kick_chan.recv() => {},
            else => break,
        }
        match tracker.render() {
            // nobody listening is fine
            Ok(html) => {
                _ = chan.send(html);
            }
            Err(e) => error!("Could not construct HTML update: {e}"),
        }
    }
    debug!("statemonitor finished");
}

/// Initiates resending the latest SSE message to all connected clients
async fn kick(kick_chan: mpsc::Sender<()>) -> Result<impl warp::Reply, Infallible> {
    _ = kick_chan.send(()).await;
    Ok(warp::reply::with_status(warp::reply(), warp::http::StatusCode::OK))
}

async fn root() -> Result<impl warp::Reply, Infallible> {
    let reply = Root { }.render().unwrap_or_else(|e| {
        error!("Could not render root page: {e}");
        String::from("render error")
    });
    Ok(warp::reply::html(reply))
}

fn sse_stream(chan: broadcast::Receiver<String>) -> impl Stream<Item = Result<Event, Infallible>> {
    // a lagging client just misses a few frames
    BroadcastStream::new(chan).filter_map(|item| item.ok().map(|html| Ok(Event::default().data(html))))
}
