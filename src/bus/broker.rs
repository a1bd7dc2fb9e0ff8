use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use super::BusError;

const FANOUT_BUFFER_SIZE: usize = 256;

/// A minimal in-process broker. One broadcast channel fans every published
/// message out to the per-client tasks, which filter on their subscription
/// sets before writing.
pub struct Broker {
    listener: TcpListener,
    fanout: broadcast::Sender<(String, String)>,
}

impl Broker {
    pub async fn bind(addr: &str) -> Result<Self, BusError> {
        let listener = TcpListener::bind(addr).await?;
        let (fanout, _) = broadcast::channel(FANOUT_BUFFER_SIZE);
        info!(%addr, "bus broker listening");
        Ok(Self { listener, fanout })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, BusError> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> Result<(), BusError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!(%addr, "bus client connected");
                    let fanout = self.fanout.clone();
                    let inbox = self.fanout.subscribe();
                    tokio::spawn(async move {
                        if let Err(err) = handle_client(stream, fanout, inbox).await {
                            warn!(%addr, error = %err, "bus client failed");
                        }
                        info!(%addr, "bus client disconnected");
                    });
                }
                Err(err) => error!(error = %err, "failed to accept bus connection"),
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    fanout: broadcast::Sender<(String, String)>,
    mut inbox: broadcast::Receiver<(String, String)>,
) -> Result<(), BusError> {
    let (reader, writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let writer = Arc::new(Mutex::new(writer));
    let subscriptions = Arc::new(Mutex::new(HashSet::<String>::new()));

    let forward_writer = Arc::clone(&writer);
    let forward_subscriptions = Arc::clone(&subscriptions);
    let forwarder = tokio::spawn(async move {
        while let Ok((topic, payload)) = inbox.recv().await {
            if !forward_subscriptions.lock().await.contains(&topic) {
                continue;
            }
            let line = format!("MSG {topic} {payload}\n");
            let mut writer = forward_writer.lock().await;
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(topic) = line.strip_prefix("SUB ") {
            subscriptions.lock().await.insert(topic.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("PUB ") {
            match rest.split_once(' ') {
                Some((topic, payload)) => {
                    let _ = fanout.send((topic.to_string(), payload.to_string()));
                }
                None => warn!(line = rest, "publish without payload"),
            }
        } else if line == "PING" {
            writer.lock().await.write_all(b"PONG\n").await?;
        } else {
            warn!(%line, "unrecognized bus line");
        }
    }

    forwarder.abort();
    Ok(())
}
