//! Console display subscriber.

use colored::Colorize;
use tracing::warn;

use crate::bus::{BusClient, BusError};
use crate::car::TIMESTAMP_FORMAT;
use crate::codec::{self, DisplayUpdate};

/// Renders facility summaries published on the display topic.
pub struct ConsoleDisplay {
    topic: String,
}

impl ConsoleDisplay {
    pub fn new(topic: String) -> Self {
        Self { topic }
    }

    pub async fn run(&self, client: &mut BusClient) -> Result<(), BusError> {
        client.subscribe(&self.topic).await?;
        while let Some((_, payload)) = client.next_message().await? {
            match codec::decode_display(&payload) {
                Ok(update) => render(&update),
                Err(err) => warn!(error = %err, "undisplayable payload"),
            }
        }
        Ok(())
    }
}

fn render(update: &DisplayUpdate) {
    let spaces = if update.available_bays == 0 {
        "FULL".bright_red().bold().to_string()
    } else {
        update.available_bays.to_string().bright_green().to_string()
    };
    let temperature = update
        .temperature
        .map(|t| format!("{t:.2}°C"))
        .unwrap_or_else(|| "--".to_string());
    let timestamp = update
        .timestamp
        .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| "--".to_string());
    println!(
        "🚗 {} {} | {} {} | {} {}",
        "SPACES:".bright_white(),
        spaces,
        "TEMP:".bright_white(),
        temperature,
        "LAST EVENT:".bright_white(),
        timestamp
    );
}
