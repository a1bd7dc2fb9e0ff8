use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParkError;

/// Opaque bay identifier. Facilities may name bays (`"north-3"`) or number
/// them (`bay_1`); either way the key is fixed at configuration time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BayId(String);

impl BayId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn numbered(n: usize) -> Self {
        Self(format!("bay_{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BayId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for BayId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single parking slot. The occupant is a back-reference into the roster
/// (the occupying car's plate), never an owning handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bay {
    id: BayId,
    occupant: Option<String>,
}

impl Bay {
    fn vacant(id: BayId) -> Self {
        Self { id, occupant: None }
    }

    pub fn id(&self) -> &BayId {
        &self.id
    }

    pub fn occupant(&self) -> Option<&str> {
        self.occupant.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Insertion-ordered map from bay identifier to optional occupant.
#[derive(Debug, Clone, Default)]
pub struct BayRegistry {
    bays: Vec<Bay>,
}

impl BayRegistry {
    /// Builds a registry from explicit bay identifiers. Duplicate or
    /// malformed identifiers are a `Validation` error.
    pub fn new<I, T>(ids: I) -> Result<Self, ParkError>
    where
        I: IntoIterator<Item = T>,
        T: Into<BayId>,
    {
        let mut registry = Self::default();
        for id in ids {
            registry.add(id.into())?;
        }
        Ok(registry)
    }

    /// Builds `bay_1 .. bay_count`.
    pub fn numbered(count: usize) -> Self {
        Self {
            bays: (1..=count).map(|n| Bay::vacant(BayId::numbered(n))).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.bays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bays.is_empty()
    }

    pub fn contains(&self, id: &BayId) -> bool {
        self.bays.iter().any(|bay| bay.id == *id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bay> {
        self.bays.iter()
    }

    pub fn available(&self) -> impl Iterator<Item = &Bay> {
        self.bays.iter().filter(|bay| bay.is_available())
    }

    pub fn occupied(&self) -> impl Iterator<Item = &Bay> {
        self.bays.iter().filter(|bay| !bay.is_available())
    }

    /// Occupant of the given bay; `NotFound` when the bay is unknown.
    pub fn occupant_of(&self, id: &BayId) -> Result<Option<&str>, ParkError> {
        self.bays
            .iter()
            .find(|bay| bay.id == *id)
            .map(|bay| bay.occupant())
            .ok_or_else(|| ParkError::NotFound(format!("unknown bay `{id}`")))
    }

    pub fn occupy(&mut self, id: &BayId, plate: &str) -> Result<(), ParkError> {
        let bay = self
            .bays
            .iter_mut()
            .find(|bay| bay.id == *id)
            .ok_or_else(|| ParkError::NotFound(format!("unknown bay `{id}`")))?;
        if let Some(occupant) = &bay.occupant {
            return Err(ParkError::StateConflict(format!(
                "bay `{id}` is already occupied by `{occupant}`"
            )));
        }
        bay.occupant = Some(plate.to_string());
        Ok(())
    }

    pub fn vacate(&mut self, id: &BayId) -> Result<String, ParkError> {
        let bay = self
            .bays
            .iter_mut()
            .find(|bay| bay.id == *id)
            .ok_or_else(|| ParkError::NotFound(format!("unknown bay `{id}`")))?;
        bay.occupant
            .take()
            .ok_or_else(|| ParkError::NotFound(format!("bay `{id}` is vacant")))
    }

    /// Appends a fresh vacant bay. Bay identifiers are never reused, so a
    /// duplicate is a `Validation` error; so are identifiers that would not
    /// survive a topic path.
    pub fn add(&mut self, id: BayId) -> Result<(), ParkError> {
        if id.as_str().is_empty()
            || id.as_str().contains(char::is_whitespace)
            || id.as_str().contains('/')
        {
            return Err(ParkError::Validation(format!("invalid bay identifier `{id}`")));
        }
        if self.contains(&id) {
            return Err(ParkError::Validation(format!("duplicate bay `{id}`")));
        }
        self.bays.push(Bay::vacant(id));
        Ok(())
    }

    /// Removes up to `count` vacant bays, newest first. Occupied bays are
    /// never removed; the removed count is returned.
    pub fn remove_available(&mut self, count: usize) -> usize {
        let mut removed = 0;
        let mut index = self.bays.len();
        while removed < count && index > 0 {
            index -= 1;
            if self.bays[index].is_available() {
                self.bays.remove(index);
                removed += 1;
            }
        }
        removed
    }
}
