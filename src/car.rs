use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ParkError;

/// Wall-clock format used for every timestamp that crosses the wire.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const PLATE_TEMPLATES: [&str; 6] = [
    "LLL-NNN",
    "NLL-NNN",
    "NLLL-NNN",
    "LL-NNNN",
    "TAXI-NNNN",
    "LLL-NNNN",
];

const CAR_MODELS: [&str; 5] = ["ModelA", "ModelB", "ModelC", "ModelD", "ModelE"];

/// Temperatures are carried with two-decimal precision end to end.
pub(crate) fn round_temperature(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A car inside (or about to be inside) the facility.
///
/// The lifecycle is `Created -> {Unparked, Parked} -> Exited`. A freshly
/// constructed car has no entry time and is not observable outside the
/// roster; `enter` moves it to Unparked, `park`/`unpark` toggle the parked
/// flag, and `exit` stamps the exit fields. Every invalid transition is a
/// `StateConflict`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Car {
    license_plate: String,
    car_model: String,
    #[serde(with = "wall_clock", default)]
    entry_time: Option<NaiveDateTime>,
    #[serde(with = "wall_clock", default)]
    exit_time: Option<NaiveDateTime>,
    entry_temperature: Option<f64>,
    exit_temperature: Option<f64>,
    is_parked: bool,
}

impl Car {
    pub fn new(license_plate: impl Into<String>, car_model: impl Into<String>) -> Self {
        Self {
            license_plate: license_plate.into(),
            car_model: car_model.into(),
            entry_time: None,
            exit_time: None,
            entry_temperature: None,
            exit_temperature: None,
            is_parked: false,
        }
    }

    /// Fabricates a car identity for detections that carry no plate.
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let model = CAR_MODELS[rng.gen_range(0..CAR_MODELS.len())];
        Self::new(random_plate(&mut rng), model)
    }

    pub(crate) fn from_parts(
        license_plate: String,
        car_model: String,
        entry_time: Option<NaiveDateTime>,
        exit_time: Option<NaiveDateTime>,
        entry_temperature: Option<f64>,
        exit_temperature: Option<f64>,
        is_parked: bool,
    ) -> Self {
        Self {
            license_plate,
            car_model,
            entry_time,
            exit_time,
            entry_temperature: entry_temperature.map(round_temperature),
            exit_temperature: exit_temperature.map(round_temperature),
            is_parked,
        }
    }

    pub fn license_plate(&self) -> &str {
        &self.license_plate
    }

    pub fn car_model(&self) -> &str {
        &self.car_model
    }

    pub fn entry_time(&self) -> Option<NaiveDateTime> {
        self.entry_time
    }

    pub fn exit_time(&self) -> Option<NaiveDateTime> {
        self.exit_time
    }

    pub fn entry_temperature(&self) -> Option<f64> {
        self.entry_temperature
    }

    pub fn exit_temperature(&self) -> Option<f64> {
        self.exit_temperature
    }

    pub fn is_parked(&self) -> bool {
        self.is_parked
    }

    /// Time spent in the facility, known once the car has exited.
    pub fn duration_in_carpark(&self) -> Option<chrono::Duration> {
        Some(self.exit_time? - self.entry_time?)
    }

    /// Records the entry detection. Valid only before the lifecycle starts.
    pub fn enter(&mut self, temperature: f64, at: NaiveDateTime) -> Result<(), ParkError> {
        if self.entry_time.is_some() {
            return Err(ParkError::StateConflict(format!(
                "car `{}` has already entered",
                self.license_plate
            )));
        }
        self.entry_time = Some(at);
        self.entry_temperature = Some(round_temperature(temperature));
        self.is_parked = false;
        Ok(())
    }

    pub fn park(&mut self) -> Result<(), ParkError> {
        if self.entry_time.is_none() {
            return Err(ParkError::StateConflict(format!(
                "car `{}` cannot park before entering",
                self.license_plate
            )));
        }
        if self.is_parked {
            return Err(ParkError::StateConflict(format!(
                "car `{}` is already parked",
                self.license_plate
            )));
        }
        self.is_parked = true;
        Ok(())
    }

    pub fn unpark(&mut self) -> Result<(), ParkError> {
        if !self.is_parked {
            return Err(ParkError::StateConflict(format!(
                "car `{}` is not parked",
                self.license_plate
            )));
        }
        self.is_parked = false;
        Ok(())
    }

    /// Records the exit detection. A parked car must unpark first.
    pub fn exit(&mut self, temperature: f64, at: NaiveDateTime) -> Result<(), ParkError> {
        if self.entry_time.is_none() {
            return Err(ParkError::StateConflict(format!(
                "car `{}` has not entered",
                self.license_plate
            )));
        }
        if self.is_parked {
            return Err(ParkError::StateConflict(format!(
                "car `{}` must unpark before exiting",
                self.license_plate
            )));
        }
        if self.exit_time.is_some() {
            return Err(ParkError::StateConflict(format!(
                "car `{}` has already exited",
                self.license_plate
            )));
        }
        self.exit_time = Some(at);
        self.exit_temperature = Some(round_temperature(temperature));
        Ok(())
    }
}

fn random_plate<R: Rng>(rng: &mut R) -> String {
    let template = PLATE_TEMPLATES[rng.gen_range(0..PLATE_TEMPLATES.len())];
    template
        .chars()
        .map(|c| match c {
            'L' => char::from(rng.gen_range(b'A'..=b'Z')),
            'N' => char::from(rng.gen_range(b'0'..=b'9')),
            other => other,
        })
        .collect()
}

/// Serde adapter for optional `YYYY-MM-DD HH:MM:SS` timestamps.
pub(crate) mod wall_clock {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(timestamp) => {
                serializer.serialize_str(&timestamp.format(TIMESTAMP_FORMAT).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
