//! [`Hcm`] – the Hardware Control Manager facade.
//!
//! Owns the decision engine running the HCM tree and ties it to the
//! [`Blackboard`] and, optionally, the [`EventBus`].  One call to
//! [`Hcm::tick`] is one control cycle:
//!
//! 1. Snapshot the blackboard.
//! 2. Run the engine over the snapshot (exactly one action executes).
//! 3. Commit the state label and the consumed animation request.
//! 4. Log and publish label changes and fault transitions.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use hcm_hal::SimActuation;
//! use hcm_kernel::{Blackboard, BlackboardConfig};
//! use hcm_runtime::{Hcm, HcmAction, DEFAULT_MAX_HOPS};
//! use hcm_types::RobotState;
//!
//! let bb = Blackboard::new(BlackboardConfig::default());
//! let mut hcm = Hcm::new(bb, Box::new(SimActuation::new()), DEFAULT_MAX_HOPS)
//!     .expect("the HCM tree is well formed");
//!
//! // No IMU sample yet: the robot is still starting up.
//! let tick = hcm.tick_at(Instant::now()).expect("tick");
//! assert_eq!(tick.state, Some(RobotState::Startup));
//! assert_eq!(tick.report.action, HcmAction::WaitForImu);
//! ```

use std::time::{Duration, Instant};

use hcm_hal::Actuation;
use hcm_kernel::{Blackboard, Commit, Snapshot};
use hcm_middleware::{EventBus, Topic};
use hcm_types::{Event, EventPayload, Fault, HcmError, RobotState};
use tracing::{info, warn};

use crate::actions::{ActionRunner, HcmAction};
use crate::decisions::{self, HcmBranch, HcmDecision, MOTOR_OFF_SEQUENCE};
use crate::dsd::{ActionStatus, Branch, Domain, DsdError, Engine, TickReport, Visit};

/// Upper bound on decisions per tick.  The HCM chain needs 12.
pub const DEFAULT_MAX_HOPS: usize = 32;

const MOTOR_OFF_WARNING_PERIOD: Duration = Duration::from_secs(5);

const EVENT_SOURCE: &str = "hcm-runtime::hcm";

pub type HcmReport = TickReport<HcmDecision, HcmAction>;

impl From<DsdError> for HcmError {
    fn from(e: DsdError) -> Self {
        HcmError::MalformedTree(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Domain
// ─────────────────────────────────────────────────────────────────────────────

/// The HCM tree bound to an actuation backend.
pub struct HcmDomain {
    runner: ActionRunner,
    last_motor_off_warning: Option<Instant>,
}

impl HcmDomain {
    pub fn new(actuation: Box<dyn Actuation>) -> Self {
        Self {
            runner: ActionRunner::new(actuation),
            last_motor_off_warning: None,
        }
    }

    fn warn_motor_off(&mut self, snap: &Snapshot) {
        let now = snap.now();
        let due = self
            .last_motor_off_warning
            .is_none_or(|last| now.saturating_duration_since(last) >= MOTOR_OFF_WARNING_PERIOD);
        if due {
            warn!(
                motor_off_secs = snap.motor_off_time().as_secs(),
                "No motion goals received for the motor-off time, switching motors off"
            );
            self.last_motor_off_warning = Some(now);
        }
    }
}

impl Domain for HcmDomain {
    type Decision = HcmDecision;
    type Action = HcmAction;
    type Context = Snapshot;

    fn root(&self) -> HcmDecision {
        HcmDecision::StartHcm
    }

    fn successors(&self, decision: HcmDecision) -> Vec<HcmBranch> {
        decisions::successors(decision)
    }

    fn decide(&mut self, decision: HcmDecision, visit: Visit, snap: &mut Snapshot) -> HcmBranch {
        let branch = decisions::decide(decision, visit, snap);
        if decision == HcmDecision::MotorOffTimer && branch == Branch::sequence(&MOTOR_OFF_SEQUENCE)
        {
            self.warn_motor_off(snap);
        }
        branch
    }

    fn enter(&mut self, action: HcmAction, _snap: &mut Snapshot) {
        self.runner.enter(action);
    }

    fn execute(&mut self, action: HcmAction, _snap: &mut Snapshot) -> ActionStatus {
        self.runner.execute(action)
    }

    fn exit(&mut self, action: HcmAction, _snap: &mut Snapshot) {
        self.runner.exit(action);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Facade
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of one [`Hcm::tick`].
#[derive(Debug, Clone)]
pub struct HcmTick {
    pub report: HcmReport,
    /// Published label after the commit.
    pub state: Option<RobotState>,
    pub commit: Commit,
    /// Fault that routed this tick, if any.
    pub fault: Option<Fault>,
}

impl HcmTick {
    /// The shutdown sequence has reached its final, holding step.
    pub fn is_shut_down(&self) -> bool {
        self.state == Some(RobotState::ShutDown) && self.report.action == HcmAction::StayShutDown
    }
}

pub struct Hcm {
    blackboard: Blackboard,
    engine: Engine<HcmDomain>,
    bus: Option<EventBus>,
    last_fault: Option<Fault>,
}

impl Hcm {
    /// Build the HCM over `blackboard`, driving `actuation`.
    ///
    /// # Errors
    ///
    /// Returns [`HcmError::MalformedTree`] when the tree fails validation
    /// against `max_hops`.
    pub fn new(
        blackboard: Blackboard,
        actuation: Box<dyn Actuation>,
        max_hops: usize,
    ) -> Result<Self, HcmError> {
        let engine = Engine::new(HcmDomain::new(actuation), max_hops)?;
        Ok(Self {
            blackboard,
            engine,
            bus: None,
            last_fault: None,
        })
    }

    /// Publish state changes and fault alerts on `bus`.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn engine(&self) -> &Engine<HcmDomain> {
        &self.engine
    }

    pub fn tick(&mut self) -> Result<HcmTick, HcmError> {
        self.tick_at(Instant::now())
    }

    /// Run one control cycle with every time-based predicate evaluated at
    /// `now`.
    pub fn tick_at(&mut self, now: Instant) -> Result<HcmTick, HcmError> {
        let mut snapshot = self.blackboard.snapshot(now);
        let report = self.engine.tick(&mut snapshot)?;
        let commit = self.blackboard.commit(&snapshot);
        let fault = snapshot.fault();

        if commit.changed()
            && let Some(to) = commit.current
        {
            info!(from = ?commit.previous, %to, tick = report.tick, action = ?report.action, "HCM state changed");
            self.publish(
                Topic::RobotState,
                EventPayload::StateChanged {
                    from: commit.previous,
                    to,
                    tick: report.tick,
                },
            );
        }
        self.track_fault(fault, commit.current, report.tick);

        Ok(HcmTick {
            report,
            state: commit.current,
            commit,
            fault,
        })
    }

    fn track_fault(&mut self, fault: Option<Fault>, state: Option<RobotState>, tick: u64) {
        if fault == self.last_fault {
            return;
        }
        if let Some(cleared) = self.last_fault {
            info!(fault = ?cleared, tick, "fault cleared");
            self.publish(
                Topic::SystemAlerts,
                EventPayload::FaultCleared {
                    fault: cleared,
                    tick,
                },
            );
        }
        if let Some(raised) = fault {
            let state = state.unwrap_or(RobotState::Startup);
            warn!(fault = ?raised, component = raised.component(), %state, tick, "fault active");
            self.publish(
                Topic::SystemAlerts,
                EventPayload::Fault {
                    fault: raised,
                    state,
                    tick,
                },
            );
        }
        self.last_fault = fault;
    }

    fn publish(&self, topic: Topic, payload: EventPayload) {
        let Some(bus) = &self.bus else { return };
        if bus.subscriber_count(topic) == 0 {
            return;
        }
        if let Err(e) = bus.publish_to(topic, Event::new(EVENT_SOURCE, payload)) {
            warn!(?topic, error = %e, "failed to publish HCM event");
        }
    }
}
