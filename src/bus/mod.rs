//! Line-oriented TCP publish/subscribe bus.
//!
//! Clients speak three verbs, one per line: `SUB <topic>`, `PUB <topic>
//! <payload>` and `PING`. The broker fans published messages out as
//! `MSG <topic> <payload>` lines to every subscriber of that exact topic
//! and answers pings with `PONG`. Topics are hierarchical slash-separated
//! paths (`<root>/<location>/<device>/<qualifier>`) and must not contain
//! whitespace; payloads run to the end of the line.

pub mod broker;
pub mod client;

pub use broker::Broker;
pub use client::BusClient;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed bus line `{0}`")]
    MalformedLine(String),

    #[error("invalid topic `{0}`: {1}")]
    InvalidTopic(String, &'static str),
}

pub fn validate_topic(topic: &str) -> Result<(), BusError> {
    if topic.is_empty() {
        return Err(BusError::InvalidTopic(topic.to_string(), "empty"));
    }
    if topic.contains(char::is_whitespace) {
        return Err(BusError::InvalidTopic(
            topic.to_string(),
            "whitespace is not allowed",
        ));
    }
    Ok(())
}
