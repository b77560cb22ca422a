use crate::commands::{DetectorCommand, SocketRequest};
use crate::detector::Snapshot;
use crate::pulse::PulseCounter;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::UnixListener,
    sync::{mpsc::UnboundedSender, watch},
};
use tracing::{debug, trace, warn};
mod parser;

/// Handles attached to every client connection.
#[derive(Clone)]
pub struct Endpoints {
    pub commands: UnboundedSender<DetectorCommand>,
    pub pulses: Arc<PulseCounter>,
    pub status: watch::Receiver<Snapshot>,
}

pub async fn server(socket: UnixListener, endpoints: Endpoints) -> Result<(), std::io::Error> {
    loop {
        let (stream, _) = socket.accept().await?;
        debug!("client connected");
        let endpoints = endpoints.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_stream(stream, endpoints).await {
                warn!("client connection failed: {e}");
            }
        });
    }
}

pub async fn handle_stream(
    stream: impl AsyncRead + AsyncWrite,
    endpoints: Endpoints,
) -> Result<(), std::io::Error> {
    let (read, mut write) = tokio::io::split(stream);
    let mut client = BufReader::new(read).lines();
    while let Some(line) = client.next_line().await? {
        // ignore lines that cannot be parsed
        let Ok(request) = SocketRequest::from_str(&line) else {
            trace!("ignoring line {line:?}");
            continue;
        };
        match request {
            SocketRequest::Pulse(n) => endpoints.pulses.add(n),
            SocketRequest::Status => {
                let snapshot = endpoints.status.borrow().clone();
                let mut reply = serde_json::to_string(&snapshot)?;
                reply.push('\n');
                write.write_all(reply.as_bytes()).await?;
            }
            SocketRequest::Command(cmd) => {
                if endpoints.commands.send(cmd).is_err() {
                    break;
                }
            }
        }
    }
    Ok(())
}

pub async fn prep_socket_path(path: impl AsRef<Path>) {
    _ = tokio::fs::remove_file(path).await;
}

#[cfg(test)]
mod checks {
    use super::*;
    use crate::debounce::Level;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn check_session() {
        let (cmd_tx, mut cmd_rx) = unbounded_channel();
        let pulses = Arc::new(PulseCounter::new());
        let mut snapshot = Snapshot::default();
        snapshot.total_count = 42;
        let (_status_tx, status_rx) = watch::channel(snapshot);
        let endpoints = Endpoints {
            commands: cmd_tx,
            pulses: pulses.clone(),
            status: status_rx,
        };
        let (client, server) = tokio::io::duplex(1024);
        let task = tokio::spawn(handle_stream(server, endpoints));

        let (read, mut write) = tokio::io::split(client);
        write
            .write_all(b"pulse 3\npulse\nnonsense\nbutton down\nreset\nstatus\n")
            .await
            .unwrap();
        let mut replies = BufReader::new(read).lines();
        let line = replies.next_line().await.unwrap().unwrap();
        let reply: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(reply["total_count"], 42);

        write.shutdown().await.unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(pulses.drain(), 4);
        assert_eq!(cmd_rx.recv().await, Some(DetectorCommand::Button(Level::Low)));
        assert_eq!(cmd_rx.recv().await, Some(DetectorCommand::Reset));
    }
}
