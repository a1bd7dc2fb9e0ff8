//! Pure parse/format functions for the wire strings exchanged over topics.
//!
//! Three payload shapes travel the bus:
//!
//! - sensor events: `"<Enter|Exit>,<temperature>,<timestamp>"`
//! - bay events: `"<Parked|Unparked>,<bay>,<temperature>,<timestamp>;<car>"`
//! - display updates: `"<available-bays>;<temperature>;<timestamp>"`
//!
//! Temperatures format with two decimal places, timestamps as
//! `YYYY-MM-DD HH:MM:SS`, and absent optional fields as the literal `null`.
//! Car records additionally round-trip through JSON and CSV forms.

use std::fmt::{self, Write as _};

use arrayvec::ArrayString;
use chrono::NaiveDateTime;
use thiserror::Error;

use crate::bays::BayId;
use crate::car::{round_temperature, Car, TIMESTAMP_FORMAT};

pub const MAX_PAYLOAD_LEN: usize = 512;
pub const NULL_TOKEN: &str = "null";

pub type PayloadBuffer = ArrayString<MAX_PAYLOAD_LEN>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty payload")]
    EmptyPayload,
    #[error("unknown event token `{0}`")]
    UnknownEvent(String),
    #[error("payload exceeds {MAX_PAYLOAD_LEN} bytes")]
    PayloadTooLarge,
    #[error("missing `{0}` field")]
    MissingField(&'static str),
    #[error("invalid temperature `{0}`")]
    InvalidTemperature(String),
    #[error("invalid timestamp `{0}`")]
    InvalidTimestamp(String),
    #[error("invalid available-bays count `{0}`")]
    InvalidBayCount(String),
    #[error("invalid boolean `{0}`")]
    InvalidBool(String),
    #[error("invalid car record: {0}")]
    InvalidCar(String),
}

/// Leading token of every bus payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Enter,
    Exit,
    Parked,
    Unparked,
    Quit,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Enter => "Enter",
            EventKind::Exit => "Exit",
            EventKind::Parked => "Parked",
            EventKind::Unparked => "Unparked",
            EventKind::Quit => "Quit",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "Enter" => Some(EventKind::Enter),
            "Exit" => Some(EventKind::Exit),
            "Parked" => Some(EventKind::Parked),
            "Unparked" => Some(EventKind::Unparked),
            "Quit" => Some(EventKind::Quit),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    Enter(SensorReading),
    Exit(SensorReading),
    Parked(BayEvent),
    Unparked(BayEvent),
    Quit,
}

impl BusEvent {
    /// Temperature observation carried by the event, if any.
    pub fn temperature(&self) -> Option<f64> {
        match self {
            BusEvent::Enter(reading) | BusEvent::Exit(reading) => Some(reading.temperature),
            BusEvent::Parked(event) | BusEvent::Unparked(event) => event.temperature,
            BusEvent::Quit => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f64,
    pub timestamp: NaiveDateTime,
}

/// Bay event body. Park requests may leave every field `null` (the center
/// selects its own candidates); outbound assignments carry all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct BayEvent {
    pub bay: Option<BayId>,
    pub temperature: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
    pub car: Option<Car>,
}

/// Body of a display update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayUpdate {
    pub available_bays: usize,
    pub temperature: Option<f64>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Decodes any inbound payload by its leading event-kind token.
pub fn decode_event(payload: &str) -> Result<BusEvent, CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge);
    }
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    let token = payload.split(',').next().unwrap_or(payload);
    let kind = EventKind::from_token(token)
        .ok_or_else(|| CodecError::UnknownEvent(token.trim().to_string()))?;
    match kind {
        EventKind::Enter => Ok(BusEvent::Enter(decode_sensor_reading(payload)?)),
        EventKind::Exit => Ok(BusEvent::Exit(decode_sensor_reading(payload)?)),
        EventKind::Parked => Ok(BusEvent::Parked(decode_bay_event(payload)?)),
        EventKind::Unparked => Ok(BusEvent::Unparked(decode_bay_event(payload)?)),
        EventKind::Quit => Ok(BusEvent::Quit),
    }
}

fn decode_sensor_reading(payload: &str) -> Result<SensorReading, CodecError> {
    let mut parts = payload.splitn(3, ',');
    let _kind = parts.next();
    let temperature = parts.next().ok_or(CodecError::MissingField("temperature"))?;
    let timestamp = parts.next().ok_or(CodecError::MissingField("timestamp"))?;
    Ok(SensorReading {
        temperature: parse_temperature(temperature)?,
        timestamp: parse_timestamp(timestamp)?,
    })
}

fn decode_bay_event(payload: &str) -> Result<BayEvent, CodecError> {
    let (head, car_part) = match payload.split_once(';') {
        Some((head, car)) => (head, Some(car)),
        None => (payload, None),
    };
    let mut parts = head.splitn(4, ',');
    let _kind = parts.next();
    let bay = parts.next().ok_or(CodecError::MissingField("bay"))?;
    let temperature = parts.next().ok_or(CodecError::MissingField("temperature"))?;
    let timestamp = parts.next().ok_or(CodecError::MissingField("timestamp"))?;

    let car = match car_part.map(str::trim) {
        Some(raw) if raw.is_empty() || raw == NULL_TOKEN => None,
        Some(raw) => Some(decode_car_json(raw)?),
        None => None,
    };
    Ok(BayEvent {
        bay: opt_token(bay).map(BayId::from),
        temperature: opt_token(temperature).map(parse_temperature).transpose()?,
        timestamp: opt_token(timestamp).map(parse_timestamp).transpose()?,
        car,
    })
}

/// Encodes an `Enter`/`Exit` sensor detection.
pub fn encode_sensor_event(
    kind: EventKind,
    temperature: f64,
    timestamp: NaiveDateTime,
) -> Result<PayloadBuffer, CodecError> {
    debug_assert!(
        matches!(kind, EventKind::Enter | EventKind::Exit),
        "sensor events are Enter or Exit"
    );
    let mut buffer = PayloadBuffer::new();
    write!(
        buffer,
        "{},{:.2},{}",
        kind,
        round_temperature(temperature),
        timestamp.format(TIMESTAMP_FORMAT)
    )
    .map_err(|_| CodecError::PayloadTooLarge)?;
    Ok(buffer)
}

/// Encodes a bay assignment or release with its full body.
pub fn encode_bay_event(
    kind: EventKind,
    bay: &BayId,
    temperature: Option<f64>,
    timestamp: Option<NaiveDateTime>,
    car: Option<&Car>,
) -> Result<String, CodecError> {
    debug_assert!(
        matches!(kind, EventKind::Parked | EventKind::Unparked),
        "bay events are Parked or Unparked"
    );
    let car_json = match car {
        Some(car) => encode_car_json(car)?,
        None => NULL_TOKEN.to_string(),
    };
    let payload = format!(
        "{},{},{},{};{}",
        kind,
        bay,
        fmt_opt_temperature(temperature),
        fmt_opt_timestamp(timestamp),
        car_json
    );
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge);
    }
    Ok(payload)
}

/// Encodes a park/unpark request that leaves candidate selection to the
/// coordinator (`bay` and `car` stay `null`).
pub fn encode_bay_request(
    kind: EventKind,
    temperature: f64,
    timestamp: NaiveDateTime,
) -> Result<PayloadBuffer, CodecError> {
    debug_assert!(
        matches!(kind, EventKind::Parked | EventKind::Unparked),
        "bay requests are Parked or Unparked"
    );
    let mut buffer = PayloadBuffer::new();
    write!(
        buffer,
        "{},{},{:.2},{};{}",
        kind,
        NULL_TOKEN,
        round_temperature(temperature),
        timestamp.format(TIMESTAMP_FORMAT),
        NULL_TOKEN
    )
    .map_err(|_| CodecError::PayloadTooLarge)?;
    Ok(buffer)
}

pub fn encode_display(update: &DisplayUpdate) -> Result<PayloadBuffer, CodecError> {
    let mut buffer = PayloadBuffer::new();
    write!(
        buffer,
        "{};{};{}",
        update.available_bays,
        fmt_opt_temperature(update.temperature),
        fmt_opt_timestamp(update.timestamp)
    )
    .map_err(|_| CodecError::PayloadTooLarge)?;
    Ok(buffer)
}

pub fn decode_display(payload: &str) -> Result<DisplayUpdate, CodecError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(CodecError::EmptyPayload);
    }
    let mut parts = payload.splitn(3, ';');
    let available = parts.next().ok_or(CodecError::MissingField("available-bays"))?;
    let temperature = parts.next().ok_or(CodecError::MissingField("temperature"))?;
    let timestamp = parts.next().ok_or(CodecError::MissingField("timestamp"))?;
    Ok(DisplayUpdate {
        available_bays: available
            .trim()
            .parse()
            .map_err(|_| CodecError::InvalidBayCount(available.trim().to_string()))?,
        temperature: opt_token(temperature).map(parse_temperature).transpose()?,
        timestamp: opt_token(timestamp).map(parse_timestamp).transpose()?,
    })
}

/// JSON car record, the form carried inside bay events and record logs.
pub fn encode_car_json(car: &Car) -> Result<String, CodecError> {
    serde_json::to_string(car).map_err(|err| CodecError::InvalidCar(err.to_string()))
}

pub fn decode_car_json(raw: &str) -> Result<Car, CodecError> {
    serde_json::from_str(raw.trim()).map_err(|err| CodecError::InvalidCar(err.to_string()))
}

/// CSV car record: the JSON fields comma-joined in declaration order, with
/// `null` for absent optionals and `True`/`False` for the parked flag.
pub fn encode_car_csv(car: &Car) -> String {
    format!(
        "{},{},{},{},{},{},{}",
        car.license_plate(),
        car.car_model(),
        fmt_opt_timestamp(car.entry_time()),
        fmt_opt_timestamp(car.exit_time()),
        fmt_opt_temperature(car.entry_temperature()),
        fmt_opt_temperature(car.exit_temperature()),
        if car.is_parked() { "True" } else { "False" }
    )
}

pub fn decode_car_csv(raw: &str) -> Result<Car, CodecError> {
    let fields: Vec<&str> = raw.trim().split(',').collect();
    if fields.len() != 7 {
        return Err(CodecError::InvalidCar(format!(
            "expected 7 fields, got {}",
            fields.len()
        )));
    }
    let is_parked = match fields[6].trim() {
        "True" => true,
        "False" => false,
        other => return Err(CodecError::InvalidBool(other.to_string())),
    };
    Ok(Car::from_parts(
        fields[0].trim().to_string(),
        fields[1].trim().to_string(),
        opt_token(fields[2]).map(parse_timestamp).transpose()?,
        opt_token(fields[3]).map(parse_timestamp).transpose()?,
        opt_token(fields[4]).map(parse_temperature).transpose()?,
        opt_token(fields[5]).map(parse_temperature).transpose()?,
        is_parked,
    ))
}

fn opt_token(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    if raw.is_empty() || raw == NULL_TOKEN {
        None
    } else {
        Some(raw)
    }
}

fn parse_temperature(raw: &str) -> Result<f64, CodecError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| CodecError::InvalidTemperature(raw.trim().to_string()))?;
    if !value.is_finite() {
        return Err(CodecError::InvalidTemperature(raw.trim().to_string()));
    }
    Ok(round_temperature(value))
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, CodecError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| CodecError::InvalidTimestamp(raw.trim().to_string()))
}

fn fmt_opt_temperature(value: Option<f64>) -> String {
    match value {
        Some(temperature) => format!("{temperature:.2}"),
        None => NULL_TOKEN.to_string(),
    }
}

fn fmt_opt_timestamp(value: Option<NaiveDateTime>) -> String {
    match value {
        Some(timestamp) => timestamp.format(TIMESTAMP_FORMAT).to_string(),
        None => NULL_TOKEN.to_string(),
    }
}
