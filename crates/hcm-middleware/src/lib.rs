//! `hcm-middleware` – Output Bus
//!
//! Carries what the HCM publishes to the rest of the robot without caring
//! who listens.
//!
//! # Modules
//!
//! - [`bus`] – Topic-based publish/subscribe event bus built on Tokio
//!   broadcast channels.  The control loop publishes state changes and fault
//!   alerts; monitoring, telemetry and behavior layers subscribe.

pub mod bus;

pub use bus::{EventBus, Topic, TopicReceiver};
