//! `hcm-runtime` – The Arbitration Loop
//!
//! Decides, once per control tick, which single safety-relevant action the
//! robot performs and which state label it publishes.
//!
//! # Modules
//!
//! - [`dsd`] – [`Engine`][dsd::Engine]: a generic dynamic stack decider.
//!   Walks a tree of decisions from the root every tick, diffs the resulting
//!   path against the previous one, tears down abandoned nodes and executes
//!   exactly one action.  Sequence leaves keep a cursor while they stay on
//!   the path.
//! - [`decisions`] – [`HcmDecision`][decisions::HcmDecision]: the strict
//!   priority chain from shutdown and sensor checks down to the controllable
//!   state.
//! - [`actions`] – [`HcmAction`][actions::HcmAction] and
//!   [`ActionRunner`][actions::ActionRunner]: map leaf steps onto
//!   [`Actuation`][hcm_hal::Actuation] calls.
//! - [`hcm`] – [`Hcm`][hcm::Hcm]: binds the tree to the blackboard and the
//!   event bus; one call to `tick` is one control cycle.
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: runs the
//!   HCM at a fixed rate until shutdown.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: initialises
//!   the global `tracing` subscriber with an optional OTLP span exporter.

pub mod actions;
pub mod control_loop;
pub mod decisions;
pub mod dsd;
pub mod hcm;
pub mod telemetry;

pub use actions::{ActionRunner, HcmAction};
pub use control_loop::ControlLoop;
pub use decisions::HcmDecision;
pub use hcm::{DEFAULT_MAX_HOPS, Hcm, HcmDomain, HcmReport, HcmTick};
