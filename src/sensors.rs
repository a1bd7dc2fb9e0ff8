//! Thin producers: detectors and bay sensors that emit wire payloads.
//!
//! Device variants are a tagged union selected at construction, not an
//! inheritance chain, and none of them tracks occupancy itself; the
//! management center is the single source of truth for facility state.
//! Temperature is an opaque numeric reading drawn at detection time.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use rand::Rng;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::bays::BayId;
use crate::bus::{BusClient, BusError};
use crate::car::Car;
use crate::codec::{self, BusEvent, CodecError, EventKind};

#[derive(Debug, Error)]
pub enum SensorError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("sensor i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

/// How a detector produces entry/exit events.
#[derive(Debug, Clone)]
pub enum DetectorKind {
    /// Interactive stdin driver: `e` enters a car, `x` exits one, `p`
    /// requests a bay allocation, `q` quits the facility.
    Console,
    /// Timer-driven random traffic.
    Random { period: Duration },
    /// Replays `<Enter|Exit>,<temperature>` lines from a file.
    Replay { path: PathBuf },
}

/// An entry/exit detector at the facility gate.
pub struct Detector {
    kind: DetectorKind,
    sensor_topic: String,
    bay_events_topic: String,
}

impl Detector {
    pub fn new(kind: DetectorKind, sensor_topic: String, bay_events_topic: String) -> Self {
        Self {
            kind,
            sensor_topic,
            bay_events_topic,
        }
    }

    pub async fn start_sensing(&self, client: &mut BusClient) -> Result<(), SensorError> {
        match &self.kind {
            DetectorKind::Console => self.sense_console(client).await,
            DetectorKind::Random { period } => self.sense_random(client, *period).await,
            DetectorKind::Replay { path } => self.sense_replay(client, path.clone()).await,
        }
    }

    async fn sense_console(&self, client: &mut BusClient) -> Result<(), SensorError> {
        println!("e = car entry, x = car exit, p = park a car, q = quit");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match line.trim() {
                "e" => {
                    self.publish_detection(client, EventKind::Enter).await?;
                    println!("Car Entered");
                }
                "x" => {
                    self.publish_detection(client, EventKind::Exit).await?;
                    println!("Car Exited");
                }
                "p" => {
                    let payload =
                        codec::encode_bay_request(EventKind::Parked, read_temperature(), now())?;
                    client.publish(&self.bay_events_topic, &payload).await?;
                    println!("Parking Requested");
                }
                "q" => {
                    client
                        .publish(&self.sensor_topic, EventKind::Quit.as_str())
                        .await?;
                    break;
                }
                _ => continue,
            }
        }
        Ok(())
    }

    async fn sense_random(&self, client: &mut BusClient, period: Duration) -> Result<(), SensorError> {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let kind = if rand::thread_rng().gen_bool(0.5) {
                EventKind::Enter
            } else {
                EventKind::Exit
            };
            self.publish_detection(client, kind).await?;
            info!(event = kind.as_str(), "random detection");
        }
    }

    async fn sense_replay(&self, client: &mut BusClient, path: PathBuf) -> Result<(), SensorError> {
        let contents = tokio::fs::read_to_string(&path).await?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.splitn(3, ',');
            let kind = fields.next().and_then(EventKind::from_token);
            let temperature = fields.next().map(str::trim).and_then(|raw| raw.parse::<f64>().ok());
            match (kind, temperature) {
                (Some(kind @ (EventKind::Enter | EventKind::Exit)), Some(temperature)) => {
                    let payload = codec::encode_sensor_event(kind, temperature, now())?;
                    client.publish(&self.sensor_topic, &payload).await?;
                }
                _ => warn!(%line, "skipping unreplayable line"),
            }
        }
        Ok(())
    }

    async fn publish_detection(
        &self,
        client: &mut BusClient,
        kind: EventKind,
    ) -> Result<(), SensorError> {
        let payload = codec::encode_sensor_event(kind, read_temperature(), now())?;
        client.publish(&self.sensor_topic, &payload).await?;
        Ok(())
    }
}

/// Simulates one bay's occupancy sensor. It listens for assignments to its
/// own bay and can release them, echoing the assigned car back to the
/// coordinator. Occupancy lives in this instance, never in shared state.
pub struct BaySensor {
    bay: BayId,
    assignment_topic: String,
    bay_events_topic: String,
    occupant: Option<Car>,
}

impl BaySensor {
    pub fn new(bay: BayId, assignment_topic: String, bay_events_topic: String) -> Self {
        Self {
            bay,
            assignment_topic,
            bay_events_topic,
            occupant: None,
        }
    }

    pub fn occupant(&self) -> Option<&Car> {
        self.occupant.as_ref()
    }

    pub async fn start_sensing(&mut self, client: &mut BusClient) -> Result<(), SensorError> {
        client.subscribe(&self.assignment_topic).await?;
        println!("p = request parking, u = release this bay, q = quit");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                message = client.next_message() => {
                    let Some((_, payload)) = message? else {
                        break;
                    };
                    self.on_assignment(&payload);
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        break;
                    };
                    match line.trim() {
                        "p" => {
                            let payload = codec::encode_bay_request(
                                EventKind::Parked,
                                read_temperature(),
                                now(),
                            )?;
                            client.publish(&self.bay_events_topic, &payload).await?;
                        }
                        "u" => {
                            let Some(car) = self.occupant.take() else {
                                println!("bay {} is empty", self.bay);
                                continue;
                            };
                            let payload = codec::encode_bay_event(
                                EventKind::Unparked,
                                &self.bay,
                                Some(read_temperature()),
                                Some(now()),
                                Some(&car),
                            )?;
                            client.publish(&self.bay_events_topic, &payload).await?;
                        }
                        "q" => {
                            client
                                .publish(&self.bay_events_topic, EventKind::Quit.as_str())
                                .await?;
                            break;
                        }
                        _ => continue,
                    }
                }
            }
        }
        Ok(())
    }

    /// Remembers the car assigned to this bay by the coordinator.
    pub fn on_assignment(&mut self, payload: &str) {
        match codec::decode_event(payload) {
            Ok(BusEvent::Parked(event)) => {
                if event.bay.as_ref() == Some(&self.bay) {
                    if let Some(car) = &event.car {
                        println!("bay {} occupied by {}", self.bay, car.license_plate());
                    }
                    self.occupant = event.car;
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "ignoring unreadable assignment"),
        }
    }
}

fn read_temperature() -> f64 {
    rand::thread_rng().gen_range(10.0..30.0)
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
