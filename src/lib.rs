//! # Smart Parking Facility Simulator
//!
//! A smart parking facility simulation library providing the car lifecycle
//! state machine, bay allocation, and the message bridge that ties both to
//! a hierarchical topic-based publish/subscribe bus.
//!
//! ## Features
//!
//! - **Car lifecycle**: enter, park, unpark, exit with typed state conflicts
//! - **Bay allocation**: random or first-available selection policies
//! - **Wire codec**: compact event payloads with JSON/CSV car records
//! - **Message bridge**: decodes bus events into coordinator operations and
//!   republishes outcomes to display and bay topics
//! - **Line-based bus**: a small TCP publish/subscribe broker and client
//!
//! ## Quick Start
//!
//! ```rust
//! use smartpark::{Car, ManagementCenter, SelectionPolicy};
//!
//! let mut center = ManagementCenter::new(2, SelectionPolicy::FirstAvailable).unwrap();
//!
//! let mut car = Car::new("QLD-042", "ModelA");
//! car.enter(21.5, chrono::Local::now().naive_local()).unwrap();
//! center.enter_car(car).unwrap();
//!
//! let (_bay, _parked) = center.car_parked().unwrap();
//! assert_eq!(center.num_available_bays(), 1);
//! ```
//!
//! ## Architecture
//!
//! - [`car`] - Car entity and lifecycle state machine
//! - [`bays`] - Bay registry
//! - [`center`] - Management center owning the roster and bay map
//! - [`codec`] - Wire payload parse/format functions
//! - [`bridge`] - Bus-driven coordinator
//! - [`bus`] - TCP publish/subscribe transport
//! - [`config`] - Connection and facility configuration
//! - [`records`] - Capped record log for exited cars
//! - [`sensors`] - Detector and bay sensor simulators
//! - [`display`] - Console display subscriber

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bays;
pub mod bridge;
pub mod bus;
pub mod car;
pub mod center;
pub mod codec;
pub mod config;
pub mod display;
pub mod error;
pub mod records;
pub mod sensors;

pub use bays::{Bay, BayId, BayRegistry};
pub use bridge::CarParkBridge;
pub use car::Car;
pub use center::{ManagementCenter, ParkStatus, SelectionPolicy};
pub use error::ParkError;
