//! The bridge between the message bus and the management center.
//!
//! One inbound handler decodes each payload's leading event token,
//! dispatches to the matching center operation, and republishes the
//! outcome: a display summary on every state change, plus a bay
//! assignment/release addressed to the affected bay on park and unpark.
//! Operations with no eligible candidate publish nothing; malformed or
//! conflicting messages are logged and dropped, never fatal.

use chrono::NaiveDateTime;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::bays::BayId;
use crate::bus::{BusClient, BusError};
use crate::car::Car;
use crate::center::ManagementCenter;
use crate::codec::{self, BayEvent, BusEvent, CodecError, DisplayUpdate, EventKind, SensorReading};
use crate::config::CarParkConfig;
use crate::error::ParkError;
use crate::records::RecordLog;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Park(#[from] ParkError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("record log failure: {0}")]
    Records(#[from] std::io::Error),

    #[error("bay event is missing its `{0}`")]
    IncompleteBayEvent(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Stopped,
    Running,
}

/// Whether the subscription loop keeps consuming after a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// An outbound publication produced by handling one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub topic: String,
    pub payload: String,
}

/// The topic fan-in/fan-out of one coordinator.
#[derive(Debug, Clone)]
pub struct BridgeTopics {
    pub sensor_topics: Vec<String>,
    pub bay_events_topic: String,
    pub display_topic: String,
    topic_root: String,
    location: String,
}

impl BridgeTopics {
    pub fn from_config(config: &CarParkConfig) -> Self {
        Self {
            sensor_topics: config.sensor_topics.clone(),
            bay_events_topic: config.bay_events_topic(),
            display_topic: config.display_topic(),
            topic_root: config.connection.topic_root.clone(),
            location: config.connection.location.clone(),
        }
    }

    pub fn new(
        sensor_topics: Vec<String>,
        bay_events_topic: String,
        display_topic: String,
        topic_root: String,
        location: String,
    ) -> Self {
        Self {
            sensor_topics,
            bay_events_topic,
            display_topic,
            topic_root,
            location,
        }
    }

    /// Address of one bay's assignment/release topic.
    pub fn bay_topic(&self, bay: &BayId, kind: EventKind) -> String {
        let qualifier = match kind {
            EventKind::Unparked => "unparked",
            _ => "parked",
        };
        format!("{}/{}/{bay}/{qualifier}", self.topic_root, self.location)
    }
}

pub struct CarParkBridge {
    center: ManagementCenter,
    topics: BridgeTopics,
    records: Option<RecordLog>,
    last_temperature: Option<f64>,
    state: BridgeState,
}

impl CarParkBridge {
    pub fn new(center: ManagementCenter, topics: BridgeTopics) -> Self {
        Self {
            center,
            topics,
            records: None,
            last_temperature: None,
            state: BridgeState::Stopped,
        }
    }

    pub fn with_record_log(mut self, records: RecordLog) -> Self {
        self.records = Some(records);
        self
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn center(&self) -> &ManagementCenter {
        &self.center
    }

    /// Handles one inbound payload: decode, dispatch, compose outbound
    /// messages. This is the only place center state is mutated, and each
    /// call is one atomic mutation with no suspension points.
    pub fn handle_payload(&mut self, payload: &str) -> Result<(Flow, Vec<Outbound>), BridgeError> {
        let event = codec::decode_event(payload)?;
        if let Some(temperature) = event.temperature() {
            self.last_temperature = Some(temperature);
        }
        match event {
            BusEvent::Enter(reading) => self.on_enter(reading),
            BusEvent::Exit(reading) => self.on_exit(reading),
            BusEvent::Parked(event) => self.on_parked(&event),
            BusEvent::Unparked(event) => self.on_unparked(event),
            BusEvent::Quit => {
                info!("quit event received, stopping bridge");
                Ok((Flow::Stop, Vec::new()))
            }
        }
    }

    fn on_enter(&mut self, reading: SensorReading) -> Result<(Flow, Vec<Outbound>), BridgeError> {
        // entry detections carry no plate; fabricate an identity, retrying
        // the rare collision with a car already inside
        let mut car = Car::random();
        for _ in 0..3 {
            if !self.center.contains_plate(car.license_plate()) {
                break;
            }
            car = Car::random();
        }
        car.enter(reading.temperature, reading.timestamp)?;
        let plate = car.license_plate().to_string();
        self.center.enter_car(car)?;
        info!(%plate, temperature = reading.temperature, "car entered");
        Ok((Flow::Continue, vec![self.display_update()?]))
    }

    fn on_exit(&mut self, reading: SensorReading) -> Result<(Flow, Vec<Outbound>), BridgeError> {
        let Some(car) = self.center.exit_car(reading.temperature, reading.timestamp) else {
            // nothing to do: no unparked car is eligible to leave
            return Ok((Flow::Continue, Vec::new()));
        };
        if let Some(records) = &self.records {
            records.append(&codec::encode_car_json(&car)?)?;
        }
        info!(plate = car.license_plate(), "car exited");
        Ok((Flow::Continue, vec![self.display_update()?]))
    }

    fn on_parked(&mut self, event: &BayEvent) -> Result<(Flow, Vec<Outbound>), BridgeError> {
        let Some((bay, car)) = self.center.car_parked() else {
            return Ok((Flow::Continue, Vec::new()));
        };
        info!(%bay, plate = car.license_plate(), "car parked");
        let assignment = Outbound {
            topic: self.topics.bay_topic(&bay, EventKind::Parked),
            payload: codec::encode_bay_event(
                EventKind::Parked,
                &bay,
                self.last_temperature,
                Some(event.timestamp.unwrap_or_else(now)),
                Some(&car),
            )?,
        };
        Ok((Flow::Continue, vec![assignment, self.display_update()?]))
    }

    fn on_unparked(&mut self, event: BayEvent) -> Result<(Flow, Vec<Outbound>), BridgeError> {
        let bay = event.bay.ok_or(BridgeError::IncompleteBayEvent("bay"))?;
        let car = event.car.ok_or(BridgeError::IncompleteBayEvent("car"))?;
        let released = self.center.car_unparked(&bay, car.license_plate())?;
        info!(%bay, plate = released.license_plate(), "car unparked");
        let release = Outbound {
            topic: self.topics.bay_topic(&bay, EventKind::Unparked),
            payload: codec::encode_bay_event(
                EventKind::Unparked,
                &bay,
                self.last_temperature,
                Some(event.timestamp.unwrap_or_else(now)),
                Some(&released),
            )?,
        };
        Ok((Flow::Continue, vec![release, self.display_update()?]))
    }

    fn display_update(&self) -> Result<Outbound, BridgeError> {
        let update = DisplayUpdate {
            available_bays: self.center.num_available_bays(),
            temperature: self.last_temperature,
            timestamp: self.center.entry_exit_time(),
        };
        Ok(Outbound {
            topic: self.topics.display_topic.clone(),
            payload: codec::encode_display(&update)?.to_string(),
        })
    }

    /// Consumes the subscription until a `Quit` event, a closed connection,
    /// or the shutdown signal (closing the sender also counts).
    pub async fn start_serving(
        &mut self,
        client: &mut BusClient,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), BridgeError> {
        for topic in &self.topics.sensor_topics {
            client.subscribe(topic).await?;
        }
        client.subscribe(&self.topics.bay_events_topic).await?;
        self.state = BridgeState::Running;
        info!(
            sensors = self.topics.sensor_topics.len(),
            bays = %self.topics.bay_events_topic,
            "bridge serving"
        );

        loop {
            let message = tokio::select! {
                _ = shutdown.changed() => {
                    info!("shutdown signal received, stopping bridge");
                    break;
                }
                message = client.next_message() => message?,
            };
            let Some((topic, payload)) = message else {
                warn!("bus connection closed");
                break;
            };
            match self.handle_payload(&payload) {
                Ok((flow, outbound)) => {
                    for message in outbound {
                        client.publish(&message.topic, &message.payload).await?;
                    }
                    if flow == Flow::Stop {
                        break;
                    }
                }
                Err(err) => warn!(%topic, error = %err, "dropping message"),
            }
        }

        self.state = BridgeState::Stopped;
        Ok(())
    }
}

fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}
