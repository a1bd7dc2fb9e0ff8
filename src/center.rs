use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bays::{BayId, BayRegistry};
use crate::car::Car;
use crate::error::ParkError;

/// How the center picks among eligible candidates (which unparked car
/// exits or parks, which free bay is assigned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// Uniform random among eligible candidates.
    #[default]
    Random,
    /// Oldest eligible car and first free bay in configuration order.
    FirstAvailable,
}

/// The management center owns the authoritative facility state: the roster
/// of cars currently inside (insertion order preserved) and the bay map.
///
/// Every public operation is a single atomic mutation; queries are for
/// external reporting and never feed back into allocation decisions.
#[derive(Debug, Clone)]
pub struct ManagementCenter {
    roster: Vec<Car>,
    bays: BayRegistry,
    policy: SelectionPolicy,
    entry_exit_time: Option<NaiveDateTime>,
    bay_counter: usize,
}

/// Point-in-time snapshot for external reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParkStatus {
    pub total_bays: usize,
    pub available_bays: usize,
    pub cars_in_park: usize,
    pub parked_cars: usize,
    pub unparked_cars: usize,
    #[serde(with = "crate::car::wall_clock")]
    pub entry_exit_time: Option<NaiveDateTime>,
    pub bays: Vec<BayOccupancy>,
    pub cars: Vec<CarStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BayOccupancy {
    pub bay: BayId,
    pub occupant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarStatus {
    pub license_plate: String,
    pub car_model: String,
    pub is_parked: bool,
}

impl ManagementCenter {
    /// Opens a facility with `num_bays` auto-named bays (`bay_1..`).
    pub fn new(num_bays: usize, policy: SelectionPolicy) -> Result<Self, ParkError> {
        if num_bays == 0 {
            return Err(ParkError::Validation(
                "a car park needs at least one parking bay".to_string(),
            ));
        }
        Ok(Self {
            roster: Vec::new(),
            bays: BayRegistry::numbered(num_bays),
            policy,
            entry_exit_time: None,
            bay_counter: num_bays,
        })
    }

    /// Opens a facility with explicitly named bays.
    pub fn with_bays<I, T>(ids: I, policy: SelectionPolicy) -> Result<Self, ParkError>
    where
        I: IntoIterator<Item = T>,
        T: Into<BayId>,
    {
        let bays = BayRegistry::new(ids)?;
        if bays.is_empty() {
            return Err(ParkError::Validation(
                "a car park needs at least one parking bay".to_string(),
            ));
        }
        let bay_counter = bays.len();
        Ok(Self {
            roster: Vec::new(),
            bays,
            policy,
            entry_exit_time: None,
            bay_counter,
        })
    }

    /// Admits an entered car into the roster.
    pub fn enter_car(&mut self, car: Car) -> Result<(), ParkError> {
        let Some(entry_time) = car.entry_time() else {
            return Err(ParkError::StateConflict(format!(
                "car `{}` has not entered yet",
                car.license_plate()
            )));
        };
        if self.contains_plate(car.license_plate()) {
            return Err(ParkError::DuplicateCar(car.license_plate().to_string()));
        }
        debug!(plate = car.license_plate(), "car admitted to roster");
        self.entry_exit_time = Some(entry_time);
        self.roster.push(car);
        self.check_consistency();
        Ok(())
    }

    /// Assigns one eligible unparked car to one free bay. Returns `None`
    /// without mutating anything when either set is empty.
    pub fn car_parked(&mut self) -> Option<(BayId, Car)> {
        let candidates: Vec<usize> = self
            .roster
            .iter()
            .enumerate()
            .filter(|(_, car)| !car.is_parked())
            .map(|(index, _)| index)
            .collect();
        let free: Vec<BayId> = self.bays.available().map(|bay| bay.id().clone()).collect();
        if candidates.is_empty() || free.is_empty() {
            return None;
        }

        let car_index = candidates[self.pick(candidates.len())];
        let bay_id = free[self.pick(free.len())].clone();
        let plate = self.roster[car_index].license_plate().to_string();

        if let Err(err) = self.bays.occupy(&bay_id, &plate) {
            debug_assert!(false, "free bay rejected occupancy: {err}");
            return None;
        }
        if let Err(err) = self.roster[car_index].park() {
            debug_assert!(false, "unparked car rejected parking: {err}");
            let _ = self.bays.vacate(&bay_id);
            return None;
        }
        debug!(%bay_id, %plate, "bay assigned");
        self.check_consistency();
        Some((bay_id, self.roster[car_index].clone()))
    }

    /// Releases `bay`, verifying its occupant is `plate`. The preconditions
    /// are checked in order and nothing is mutated on failure.
    pub fn car_unparked(&mut self, bay: &BayId, plate: &str) -> Result<Car, ParkError> {
        let occupant = self
            .bays
            .occupant_of(bay)?
            .ok_or_else(|| ParkError::NotFound(format!("bay `{bay}` is vacant")))?;
        if occupant != plate {
            return Err(ParkError::NotFound(format!(
                "bay `{bay}` is occupied by `{occupant}`, not `{plate}`"
            )));
        }
        let car_index = self
            .roster
            .iter()
            .position(|car| car.license_plate() == plate)
            .ok_or_else(|| ParkError::NotFound(format!("car `{plate}` is not in the roster")))?;

        self.bays.vacate(bay)?;
        if let Err(err) = self.roster[car_index].unpark() {
            // restore the occupancy so the failed call leaves no trace
            let _ = self.bays.occupy(bay, plate);
            return Err(err);
        }
        debug!(%bay, %plate, "bay released");
        self.check_consistency();
        Ok(self.roster[car_index].clone())
    }

    /// Lets one eligible unparked car leave the facility. A parked car is
    /// never eligible; it must unpark first.
    pub fn exit_car(&mut self, temperature: f64, at: NaiveDateTime) -> Option<Car> {
        let candidates: Vec<usize> = self
            .roster
            .iter()
            .enumerate()
            .filter(|(_, car)| !car.is_parked())
            .map(|(index, _)| index)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let index = candidates[self.pick(candidates.len())];
        let mut car = self.roster.remove(index);
        if let Err(err) = car.exit(temperature, at) {
            debug_assert!(false, "unparked roster car rejected exit: {err}");
            self.roster.insert(index, car);
            return None;
        }
        debug!(plate = car.license_plate(), "car left the facility");
        self.entry_exit_time = car.exit_time();
        self.check_consistency();
        Some(car)
    }

    pub fn contains_plate(&self, plate: &str) -> bool {
        self.roster.iter().any(|car| car.license_plate() == plate)
    }

    pub fn available_bays(&self) -> Vec<&BayId> {
        self.bays.available().map(|bay| bay.id()).collect()
    }

    pub fn unavailable_bays(&self) -> Vec<&BayId> {
        self.bays.occupied().map(|bay| bay.id()).collect()
    }

    pub fn num_available_bays(&self) -> usize {
        self.bays.available().count()
    }

    pub fn num_bays(&self) -> usize {
        self.bays.len()
    }

    pub fn parked_cars(&self) -> Vec<&Car> {
        self.roster.iter().filter(|car| car.is_parked()).collect()
    }

    pub fn unparked_cars(&self) -> Vec<&Car> {
        self.roster.iter().filter(|car| !car.is_parked()).collect()
    }

    pub fn num_cars_in_park(&self) -> usize {
        self.roster.len()
    }

    /// Timestamp of the most recently completed entry or exit operation.
    pub fn entry_exit_time(&self) -> Option<NaiveDateTime> {
        self.entry_exit_time
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Snapshot for external reporting. Internal decisions always re-derive
    /// from the roster and bay map instead of consulting this.
    pub fn get_status(&self) -> ParkStatus {
        ParkStatus {
            total_bays: self.bays.len(),
            available_bays: self.num_available_bays(),
            cars_in_park: self.roster.len(),
            parked_cars: self.parked_cars().len(),
            unparked_cars: self.unparked_cars().len(),
            entry_exit_time: self.entry_exit_time,
            bays: self
                .bays
                .iter()
                .map(|bay| BayOccupancy {
                    bay: bay.id().clone(),
                    occupant: bay.occupant().map(str::to_string),
                })
                .collect(),
            cars: self
                .roster
                .iter()
                .map(|car| CarStatus {
                    license_plate: car.license_plate().to_string(),
                    car_model: car.car_model().to_string(),
                    is_parked: car.is_parked(),
                })
                .collect(),
        }
    }

    /// Adds `num_bays` fresh auto-named bays; returns their identifiers.
    pub fn add_capacity(&mut self, num_bays: usize) -> Vec<BayId> {
        let mut added = Vec::with_capacity(num_bays);
        for _ in 0..num_bays {
            let id = self.next_bay_id();
            if self.bays.add(id.clone()).is_ok() {
                added.push(id);
            }
        }
        added
    }

    /// Removes up to `num_bays` vacant bays; capacity clamps at zero and
    /// occupied bays are never removed. Returns how many were removed.
    pub fn remove_capacity(&mut self, num_bays: usize) -> usize {
        let removed = self.bays.remove_available(num_bays);
        self.check_consistency();
        removed
    }

    fn next_bay_id(&mut self) -> BayId {
        loop {
            self.bay_counter += 1;
            let id = BayId::numbered(self.bay_counter);
            if !self.bays.contains(&id) {
                return id;
            }
        }
    }

    fn pick(&self, len: usize) -> usize {
        match self.policy {
            SelectionPolicy::FirstAvailable => 0,
            SelectionPolicy::Random => rand::thread_rng().gen_range(0..len),
        }
    }

    fn check_consistency(&self) {
        debug_assert_eq!(
            self.parked_cars().len(),
            self.bays.occupied().count(),
            "parked roster and occupied bays diverged"
        );
        debug_assert!(
            self.bays.occupied().all(|bay| {
                bay.occupant()
                    .and_then(|plate| self.roster.iter().find(|car| car.license_plate() == plate))
                    .is_some_and(Car::is_parked)
            }),
            "a bay occupant is missing from the roster or not parked"
        );
        debug_assert!(
            self.roster.iter().enumerate().all(|(index, car)| {
                self.roster[index + 1..]
                    .iter()
                    .all(|other| other.license_plate() != car.license_plate())
            }),
            "duplicate license plate in the roster"
        );
    }
}
