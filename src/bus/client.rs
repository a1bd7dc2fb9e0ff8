use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::info;

use super::{validate_topic, BusError};

/// Client side of the bus. An unreachable broker is fatal at connect time;
/// once connected, the keepalive interval bounds liveness.
pub struct BusClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    keepalive: Interval,
}

impl BusClient {
    pub async fn connect(host: &str, port: u16, keepalive: Duration) -> Result<Self, BusError> {
        let stream = TcpStream::connect((host, port)).await?;
        info!(host, port, "connected to bus");
        let (reader, writer) = stream.into_split();
        let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self {
            lines: BufReader::new(reader).lines(),
            writer,
            keepalive: ticker,
        })
    }

    pub async fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        validate_topic(topic)?;
        self.send_line(&format!("SUB {topic}")).await
    }

    pub async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BusError> {
        validate_topic(topic)?;
        if payload.contains('\n') {
            return Err(BusError::MalformedLine(payload.to_string()));
        }
        self.send_line(&format!("PUB {topic} {payload}")).await
    }

    /// Waits for the next published message, transparently servicing
    /// keepalive pings. `None` means the broker closed the stream.
    pub async fn next_message(&mut self) -> Result<Option<(String, String)>, BusError> {
        loop {
            tokio::select! {
                _ = self.keepalive.tick() => {
                    self.send_line("PING").await?;
                }
                line = self.lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(None);
                    };
                    let line = line.trim();
                    if line.is_empty() || line == "PONG" {
                        continue;
                    }
                    let Some(rest) = line.strip_prefix("MSG ") else {
                        return Err(BusError::MalformedLine(line.to_string()));
                    };
                    let Some((topic, payload)) = rest.split_once(' ') else {
                        return Err(BusError::MalformedLine(line.to_string()));
                    };
                    return Ok(Some((topic.to_string(), payload.to_string())));
                }
            }
        }
    }

    async fn send_line(&mut self, line: &str) -> Result<(), BusError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        Ok(())
    }
}
