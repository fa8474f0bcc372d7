//! `hcm-kernel` – Shared State & Timing
//!
//! The single shared mutable resource of the HCM.  Sensor and motor drivers
//! write into it from their own threads; the control loop reads a consistent
//! snapshot once per tick and commits the published state label back.
//!
//! # Modules
//!
//! - [`heartbeat`] – [`Heartbeat`][heartbeat::Heartbeat]: tracks the last
//!   arrival time of a periodic message stream (IMU samples, motor state,
//!   motion goals) and reports whether it has timed out.
//! - [`blackboard`] – [`Blackboard`][blackboard::Blackboard]: the
//!   lock-protected record of flags, predicates and heartbeats, plus the
//!   per-tick [`Snapshot`][blackboard::Snapshot] that decisions read and
//!   label.

pub mod blackboard;
pub mod heartbeat;

pub use blackboard::{Blackboard, BlackboardConfig, BlackboardState, Commit, Snapshot};
pub use heartbeat::{Heartbeat, HeartbeatHealth};
