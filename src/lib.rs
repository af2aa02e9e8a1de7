//! Household energy grid coordinator.
//!
//! Batteries charge from whichever energy sources are active, devices draw
//! power from a battery, and a [`controller::Coordinator`] keeps one
//! supervising task per charging battery and per powered device while the
//! set of active sources and devices changes underneath it.

pub mod config;
pub mod controller;
pub mod domain;
pub mod error;
pub mod events;
pub mod house;
pub mod registry;
pub mod telemetry;

pub use controller::{Coordinator, GridContext, StartOutcome};
pub use error::GridError;
