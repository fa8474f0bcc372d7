//! [`Blackboard`] – the shared state record read by every decision.
//!
//! Drivers running on their own threads write flags, predicates and
//! heartbeats through [`Blackboard::update`] and the heartbeat helpers.  The
//! control loop never reads fields one by one: at the start of every tick it
//! takes a [`Snapshot`] under the read lock, evaluates the whole decision
//! tree against that snapshot, and finally hands it back to
//! [`Blackboard::commit`] which writes the two things a tick may change:
//!
//! * the published [`RobotState`] label, and
//! * the consumed `animation_requested` flag.
//!
//! Both locks are held only for a clone or a two-field write, so a producer
//! can never stall the control loop for longer than that.

use std::sync::Arc;
use std::time::{Duration, Instant};

use hcm_types::{Fault, RobotState};
use parking_lot::RwLock;
use tracing::trace;

use crate::heartbeat::{Heartbeat, HeartbeatHealth};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Thresholds and initial switches supplied at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct BlackboardConfig {
    /// An IMU sample older than this is treated as a hardware problem.
    pub imu_timeout: Duration,
    /// Motor state messages older than this mean the motors are unavailable.
    pub motor_timeout: Duration,
    /// Without a motion goal for this long the motors are switched off.
    pub motor_off_time: Duration,
    /// Initial value of `simulation_active`.
    pub simulation_active: bool,
    /// Initial value of `is_stand_up_active`.
    pub stand_up_active: bool,
    /// Initial value of `falling_detection_active`.
    pub falling_detection_active: bool,
}

impl Default for BlackboardConfig {
    fn default() -> Self {
        Self {
            imu_timeout: Duration::from_millis(500),
            motor_timeout: Duration::from_millis(500),
            motor_off_time: Duration::from_secs(86_400),
            simulation_active: false,
            stand_up_active: true,
            falling_detection_active: true,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared record
// ────────────────────────────────────────────────────────────────────────────

/// Every field the decision tree may look at.
///
/// The boolean predicates (`picked_up`, `fallen`, …) are computed by the
/// external sensor pipeline and only stored here.
#[derive(Debug, Clone)]
pub struct BlackboardState {
    /// Last committed label; `None` until the first tick commits.
    pub current_state: Option<RobotState>,
    pub shut_down_request: bool,
    pub simulation_active: bool,
    pub penalized: bool,
    pub record_active: bool,
    pub external_animation_running: bool,
    pub animation_requested: bool,
    /// Bumped by every [`Blackboard::request_animation`].
    animation_requests: u64,
    pub is_stand_up_active: bool,
    pub falling_detection_active: bool,
    /// IMU samples.
    pub imu: Heartbeat,
    /// Motor state (joint feedback) messages.
    pub motor_state: Heartbeat,
    /// Motion goals sent to the motors by higher layers.
    pub motor_goal: Heartbeat,
    pub motors_on: bool,
    pub picked_up: bool,
    pub fallen: bool,
    pub falling: bool,
    pub walking: bool,
    pub walkready: bool,
}

impl BlackboardState {
    fn new(config: &BlackboardConfig) -> Self {
        Self {
            current_state: None,
            shut_down_request: false,
            simulation_active: config.simulation_active,
            penalized: false,
            record_active: false,
            external_animation_running: false,
            animation_requested: false,
            animation_requests: 0,
            is_stand_up_active: config.stand_up_active,
            falling_detection_active: config.falling_detection_active,
            imu: Heartbeat::new(config.imu_timeout),
            motor_state: Heartbeat::new(config.motor_timeout),
            motor_goal: Heartbeat::new(config.motor_off_time),
            motors_on: false,
            picked_up: false,
            fallen: false,
            falling: false,
            walking: false,
            walkready: false,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Blackboard
// ────────────────────────────────────────────────────────────────────────────

/// Process-lifetime shared state.  Clone it cheaply – all clones share the
/// same record.
///
/// # Example
///
/// ```
/// use std::time::Instant;
/// use hcm_kernel::{Blackboard, BlackboardConfig};
///
/// let bb = Blackboard::new(BlackboardConfig::default());
/// let driver = bb.clone();
/// driver.imu_updated(Instant::now());
/// driver.update(|s| s.penalized = true);
///
/// let snap = bb.snapshot(Instant::now());
/// assert!(snap.penalized());
/// assert!(!snap.imu_never_seen());
/// ```
#[derive(Clone)]
pub struct Blackboard {
    config: Arc<BlackboardConfig>,
    started: Instant,
    inner: Arc<RwLock<BlackboardState>>,
}

impl Blackboard {
    /// Create a blackboard whose motor-off timer starts now.
    pub fn new(config: BlackboardConfig) -> Self {
        Self::with_start(config, Instant::now())
    }

    /// Create a blackboard whose motor-off timer starts at `started`.
    pub fn with_start(config: BlackboardConfig, started: Instant) -> Self {
        let state = BlackboardState::new(&config);
        Self {
            config: Arc::new(config),
            started,
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn config(&self) -> &BlackboardConfig {
        &self.config
    }

    /// Mutate the record under the write lock.
    ///
    /// Keep `f` short; the control loop waits on this lock when it takes
    /// its snapshot.
    pub fn update<R>(&self, f: impl FnOnce(&mut BlackboardState) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// A copy of the whole record.
    pub fn read(&self) -> BlackboardState {
        self.inner.read().clone()
    }

    /// The label committed by the most recent tick.
    pub fn current_state(&self) -> Option<RobotState> {
        self.inner.read().current_state
    }

    pub fn imu_updated(&self, at: Instant) {
        self.inner.write().imu.beat(at);
    }

    pub fn motors_updated(&self, at: Instant) {
        self.inner.write().motor_state.beat(at);
    }

    pub fn motor_goal_received(&self, at: Instant) {
        self.inner.write().motor_goal.beat(at);
    }

    pub fn request_shutdown(&self) {
        self.inner.write().shut_down_request = true;
    }

    /// Ask the walking robot to stop so a behavior animation can play.
    pub fn request_animation(&self) {
        let mut inner = self.inner.write();
        inner.animation_requested = true;
        inner.animation_requests = inner.animation_requests.wrapping_add(1);
    }

    /// Take a consistent copy of the record for one tick evaluated at `now`.
    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let state = self.inner.read().clone();
        Snapshot {
            state,
            config: Arc::clone(&self.config),
            started: self.started,
            now,
            assigned: None,
            animation_request_consumed: false,
            fault: None,
        }
    }

    /// Write the outcome of a tick back into the shared record.
    ///
    /// Only the assigned label and the consumed animation request are
    /// written; every other field keeps whatever producers stored during
    /// the tick.  A request raised after the snapshot was taken stays
    /// pending for the next tick.
    pub fn commit(&self, snapshot: &Snapshot) -> Commit {
        let mut inner = self.inner.write();
        let previous = inner.current_state;
        if let Some(state) = snapshot.assigned {
            inner.current_state = Some(state);
        }
        if snapshot.animation_request_consumed
            && inner.animation_requests == snapshot.state.animation_requests
        {
            inner.animation_requested = false;
        }
        let commit = Commit {
            previous,
            current: inner.current_state,
        };
        trace!(?commit, "blackboard committed");
        commit
    }
}

/// What [`Blackboard::commit`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Commit {
    pub previous: Option<RobotState>,
    pub current: Option<RobotState>,
}

impl Commit {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Snapshot
// ────────────────────────────────────────────────────────────────────────────

/// One tick's view of the blackboard.
///
/// Reads never touch the lock.  Decisions may label the tick with
/// [`assign_state`][Self::assign_state], consume the animation request, and
/// note the fault that routed them to a wait node.
#[derive(Debug, Clone)]
pub struct Snapshot {
    state: BlackboardState,
    config: Arc<BlackboardConfig>,
    started: Instant,
    now: Instant,
    assigned: Option<RobotState>,
    animation_request_consumed: bool,
    fault: Option<Fault>,
}

impl Snapshot {
    /// The instant every time-based predicate is evaluated at.
    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn config(&self) -> &BlackboardConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Flags
    // -----------------------------------------------------------------------

    pub fn shut_down_request(&self) -> bool {
        self.state.shut_down_request
    }

    pub fn simulation_active(&self) -> bool {
        self.state.simulation_active
    }

    pub fn penalized(&self) -> bool {
        self.state.penalized
    }

    pub fn record_active(&self) -> bool {
        self.state.record_active
    }

    pub fn external_animation_running(&self) -> bool {
        self.state.external_animation_running
    }

    /// `true` while a request is pending and not yet consumed this tick.
    pub fn animation_requested(&self) -> bool {
        self.state.animation_requested && !self.animation_request_consumed
    }

    pub fn is_stand_up_active(&self) -> bool {
        self.state.is_stand_up_active
    }

    pub fn falling_detection_active(&self) -> bool {
        self.state.falling_detection_active
    }

    // -----------------------------------------------------------------------
    // Derived predicates
    // -----------------------------------------------------------------------

    /// No IMU sample has been received since startup.
    pub fn imu_never_seen(&self) -> bool {
        self.state.imu.health(self.now) == HeartbeatHealth::Never
    }

    pub fn last_imu_update_time(&self) -> Option<Instant> {
        self.state.imu.last()
    }

    pub fn is_imu_timeout(&self) -> bool {
        self.state.imu.is_timed_out(self.now)
    }

    /// No motion goal for at least `motor_off_time`.  A robot that never
    /// received a goal counts from blackboard creation.
    pub fn is_motor_off_time(&self) -> bool {
        let since = self.state.motor_goal.last().unwrap_or(self.started);
        self.now.saturating_duration_since(since) >= self.config.motor_off_time
    }

    pub fn motor_off_time(&self) -> Duration {
        self.config.motor_off_time
    }

    pub fn are_motors_on(&self) -> bool {
        self.state.motors_on
    }

    /// Motor state messages are arriving, or no real motors exist.
    pub fn are_motors_available(&self) -> bool {
        self.state.simulation_active
            || self.state.motor_state.health(self.now) == HeartbeatHealth::Healthy
    }

    pub fn is_robot_picked_up(&self) -> bool {
        self.state.picked_up
    }

    pub fn is_fallen(&self) -> bool {
        self.state.fallen
    }

    pub fn is_falling(&self) -> bool {
        self.state.falling
    }

    pub fn is_currently_walking(&self) -> bool {
        self.state.walking
    }

    pub fn is_walkready(&self) -> bool {
        self.state.walkready
    }

    // -----------------------------------------------------------------------
    // Tick outputs
    // -----------------------------------------------------------------------

    /// The label assigned this tick, or the last committed one.
    pub fn current_state(&self) -> Option<RobotState> {
        self.assigned.or(self.state.current_state)
    }

    /// The label assigned this tick only.
    pub fn assigned_state(&self) -> Option<RobotState> {
        self.assigned
    }

    /// Label the tick.  The last assignment on the winning path wins.
    pub fn assign_state(&mut self, state: RobotState) {
        self.assigned = Some(state);
    }

    /// Consume a pending animation request.  Returns whether one was pending.
    pub fn take_animation_request(&mut self) -> bool {
        let pending = self.animation_requested();
        if pending {
            self.animation_request_consumed = true;
        }
        pending
    }

    /// Record the fault that routed this tick to a wait or stay node.
    pub fn raise_fault(&mut self, fault: Fault) {
        self.fault = Some(fault);
    }

    pub fn fault(&self) -> Option<Fault> {
        self.fault
    }
}
