//! `hcm-hal` – Actuation Boundary
//!
//! Everything the HCM does to the physical robot goes through one trait.
//!
//! # Modules
//!
//! - [`actuation`] – [`Actuation`][actuation::Actuation]: plays and cancels
//!   animations, switches motor power and stops the walking engine.
//!   [`AnimationId`][actuation::AnimationId] names the animations the
//!   decision tree may request.
//! - [`sim`] – [`SimActuation`][sim::SimActuation] and
//!   [`SimSensorFeed`][sim::SimSensorFeed]: an in-process stand-in for the
//!   motor/animation stack and the sensor drivers, so the full control loop
//!   runs headless in tests and on a desk.

pub mod actuation;
pub mod sim;

pub use actuation::{Actuation, AnimationId};
pub use sim::{ActuationCommand, CommandLog, SimActuation, SimPlant, SimSensorFeed};
