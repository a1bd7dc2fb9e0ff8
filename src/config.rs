//! JSON configuration for bus-connected programs.
//!
//! One document configures the whole facility, with a section per role:
//!
//! ```json
//! {
//!   "carpark": {
//!     "host": "127.0.0.1", "port": 1883,
//!     "topic-root": "moondaloop-park", "location": "L306",
//!     "name": "CarPark", "topic-qualifier": "na",
//!     "total-spaces": 5, "policy": "random",
//!     "record-log": "logs/cars.txt"
//!   },
//!   "sensor": { "...": "..." },
//!   "display": { "...": "..." }
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::bays::BayId;
use crate::center::{ManagementCenter, SelectionPolicy};
use crate::error::ParkError;

pub const DEFAULT_KEEPALIVE_SECS: u64 = 60;

fn default_qualifier() -> String {
    "na".to_string()
}

fn default_keepalive() -> u64 {
    DEFAULT_KEEPALIVE_SECS
}

/// Connection parameters shared by every device on the bus.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub topic_root: String,
    pub location: String,
    pub name: String,
    #[serde(default = "default_qualifier")]
    pub topic_qualifier: String,
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,
}

impl ConnectionConfig {
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive.max(1))
    }

    /// `<topic-root>/<location>/<name>/<topic-qualifier>`
    pub fn topic_address(&self) -> String {
        self.topic(&self.location, &self.name, &self.topic_qualifier)
    }

    /// This device's address with a different trailing qualifier.
    pub fn topic_with_qualifier(&self, qualifier: &str) -> String {
        self.topic(&self.location, &self.name, qualifier)
    }

    /// An arbitrary address under this device's topic root. The root itself
    /// is never overridden.
    pub fn topic(&self, location: &str, name: &str, qualifier: &str) -> String {
        format!("{}/{location}/{name}/{qualifier}", self.topic_root)
    }

    pub fn quit_topic(&self) -> String {
        self.topic_with_qualifier("quit")
    }

    pub fn validate(&self) -> Result<(), ParkError> {
        for segment in [
            &self.topic_root,
            &self.location,
            &self.name,
            &self.topic_qualifier,
        ] {
            if segment.is_empty()
                || segment.contains(char::is_whitespace)
                || segment.contains('/')
            {
                return Err(ParkError::Validation(format!(
                    "invalid topic segment `{segment}`"
                )));
            }
        }
        Ok(())
    }
}

/// Coordinator-side configuration: the connection plus the facility layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CarParkConfig {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub total_spaces: Option<usize>,
    #[serde(default)]
    pub bays: Option<Vec<String>>,
    #[serde(default)]
    pub policy: SelectionPolicy,
    #[serde(default)]
    pub record_log: Option<String>,
    #[serde(default)]
    pub sensor_topics: Vec<String>,
}

impl CarParkConfig {
    /// Builds the management center from either explicit bay names or a
    /// bare `total-spaces` count.
    pub fn build_center(&self) -> Result<ManagementCenter, ParkError> {
        match (&self.bays, self.total_spaces) {
            (Some(names), _) => ManagementCenter::with_bays(
                names.iter().map(|name| BayId::new(name.clone())),
                self.policy,
            ),
            (None, Some(count)) => ManagementCenter::new(count, self.policy),
            (None, None) => Err(ParkError::Validation(
                "carpark config needs `bays` or `total-spaces`".to_string(),
            )),
        }
    }

    /// Topic on which park/unpark requests arrive.
    pub fn bay_events_topic(&self) -> String {
        self.connection
            .topic(&self.connection.location, "bays", &self.connection.topic_qualifier)
    }

    /// Topic on which status summaries leave for displays.
    pub fn display_topic(&self) -> String {
        self.connection.topic_with_qualifier("display")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub carpark: CarParkConfig,
    pub sensor: ConnectionConfig,
    pub display: ConnectionConfig,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ParkError> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|err| {
            ParkError::Validation(format!(
                "cannot read config `{}`: {err}",
                path.as_ref().display()
            ))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ParkError> {
        let config: Config = serde_json::from_str(raw)
            .map_err(|err| ParkError::Validation(format!("malformed config: {err}")))?;
        config.carpark.connection.validate()?;
        config.sensor.validate()?;
        config.display.validate()?;
        Ok(config)
    }
}
