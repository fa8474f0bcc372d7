//! In-process simulation of the robot for headless runs and tests.
//!
//! [`SimActuation`] stands in for the animation server, the motor power
//! service and the walking engine.  It records every command, finishes an
//! animation after a fixed number of polls, and reflects its effects into a
//! shared [`SimPlant`].  [`SimSensorFeed`] plays the part of the sensor
//! drivers: it stamps IMU and motor heartbeats into the
//! [`Blackboard`] and mirrors the plant's motor power and posture.
//!
//! # Example
//!
//! ```rust
//! use hcm_hal::sim::SimActuation;
//! use hcm_hal::{Actuation, AnimationId};
//!
//! let mut act = SimActuation::new().with_animation_polls(2);
//! act.play_animation(AnimationId::Walkready).expect("sim animation must start");
//! assert!(!act.animation_finished(AnimationId::Walkready));
//! assert!(!act.animation_finished(AnimationId::Walkready));
//! assert!(act.animation_finished(AnimationId::Walkready));
//! assert!(act.plant().walkready());
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hcm_kernel::Blackboard;
use hcm_types::HcmError;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::actuation::{Actuation, AnimationId};

// ────────────────────────────────────────────────────────────────────────────
// Plant
// ────────────────────────────────────────────────────────────────────────────

/// Physical state of the simulated robot, shared between the actuation and
/// the sensor feed.
#[derive(Debug, Default)]
pub struct SimPlant {
    motor_power: AtomicBool,
    walkready: AtomicBool,
}

impl SimPlant {
    pub fn motor_power(&self) -> bool {
        self.motor_power.load(Ordering::SeqCst)
    }

    pub fn walkready(&self) -> bool {
        self.walkready.load(Ordering::SeqCst)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Command log
// ────────────────────────────────────────────────────────────────────────────

/// A command received by [`SimActuation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationCommand {
    Play(AnimationId),
    Cancel(AnimationId),
    MotorPower(bool),
    StopWalking,
}

/// Shared handle on the commands a [`SimActuation`] has received.  Stays
/// readable after the actuation itself has been boxed and moved away.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<ActuationCommand>>>);

impl CommandLog {
    pub fn commands(&self) -> Vec<ActuationCommand> {
        self.0.lock().clone()
    }

    /// Number of recorded commands equal to `command`.
    pub fn count(&self, command: ActuationCommand) -> usize {
        self.0.lock().iter().filter(|c| **c == command).count()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    fn push(&self, command: ActuationCommand) {
        self.0.lock().push(command);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimActuation
// ────────────────────────────────────────────────────────────────────────────

const DEFAULT_ANIMATION_POLLS: u32 = 10;

struct Playing {
    animation: AnimationId,
    remaining_polls: u32,
}

/// Simulated actuation.  Always succeeds unless built with
/// [`with_failing_motor_power`][Self::with_failing_motor_power].
pub struct SimActuation {
    animation_polls: u32,
    playing: Option<Playing>,
    finished: Option<AnimationId>,
    fail_motor_power: bool,
    plant: Arc<SimPlant>,
    log: CommandLog,
}

impl Default for SimActuation {
    fn default() -> Self {
        Self::new()
    }
}

impl SimActuation {
    pub fn new() -> Self {
        Self {
            animation_polls: DEFAULT_ANIMATION_POLLS,
            playing: None,
            finished: None,
            fail_motor_power: false,
            plant: Arc::new(SimPlant::default()),
            log: CommandLog::default(),
        }
    }

    /// Number of [`animation_finished`][Actuation::animation_finished] polls
    /// that report `false` before an animation completes.
    pub fn with_animation_polls(mut self, polls: u32) -> Self {
        self.animation_polls = polls;
        self
    }

    /// Make every motor power request fail with a hardware fault.
    pub fn with_failing_motor_power(mut self) -> Self {
        self.fail_motor_power = true;
        self
    }

    /// Start with motor power already on.
    pub fn with_motors_on(self) -> Self {
        self.plant.motor_power.store(true, Ordering::SeqCst);
        self
    }

    pub fn plant(&self) -> Arc<SimPlant> {
        Arc::clone(&self.plant)
    }

    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    fn complete(&mut self, animation: AnimationId) {
        match animation {
            AnimationId::Walkready | AnimationId::StandUp => {
                self.plant.walkready.store(true, Ordering::SeqCst)
            }
            AnimationId::SitDown | AnimationId::Penalty | AnimationId::Falling => {
                self.plant.walkready.store(false, Ordering::SeqCst)
            }
        }
        self.finished = Some(animation);
        debug!(%animation, "sim animation finished");
    }
}

impl Actuation for SimActuation {
    fn play_animation(&mut self, animation: AnimationId) -> Result<(), HcmError> {
        self.log.push(ActuationCommand::Play(animation));
        self.finished = None;
        self.playing = Some(Playing {
            animation,
            remaining_polls: self.animation_polls,
        });
        Ok(())
    }

    fn animation_finished(&mut self, animation: AnimationId) -> bool {
        if let Some(playing) = self.playing.as_mut()
            && playing.animation == animation
        {
            if playing.remaining_polls > 0 {
                playing.remaining_polls -= 1;
                return false;
            }
            self.playing = None;
            self.complete(animation);
        }
        self.finished == Some(animation)
    }

    fn cancel_animation(&mut self) -> Result<(), HcmError> {
        if let Some(playing) = self.playing.take() {
            self.log.push(ActuationCommand::Cancel(playing.animation));
        }
        Ok(())
    }

    fn set_motor_power(&mut self, on: bool) -> Result<(), HcmError> {
        self.log.push(ActuationCommand::MotorPower(on));
        if self.fail_motor_power {
            return Err(HcmError::HardwareFault {
                component: "motors".to_string(),
                details: "simulated power service failure".to_string(),
            });
        }
        self.plant.motor_power.store(on, Ordering::SeqCst);
        Ok(())
    }

    fn stop_walking(&mut self) -> Result<(), HcmError> {
        self.log.push(ActuationCommand::StopWalking);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimSensorFeed
// ────────────────────────────────────────────────────────────────────────────

/// Simulated sensor drivers writing into the [`Blackboard`].
pub struct SimSensorFeed {
    blackboard: Blackboard,
    plant: Arc<SimPlant>,
}

impl SimSensorFeed {
    pub fn new(blackboard: Blackboard, plant: Arc<SimPlant>) -> Self {
        Self { blackboard, plant }
    }

    /// Publish one round of sensor data stamped at `now`.
    pub fn pump(&self, now: Instant) {
        let motor_power = self.plant.motor_power();
        let walkready = self.plant.walkready();
        self.blackboard.update(|s| {
            s.imu.beat(now);
            s.motor_state.beat(now);
            s.motors_on = motor_power;
            s.walkready = walkready;
        });
    }

    /// Run [`pump`][Self::pump] every `period` on a dedicated thread until
    /// `shutdown` is set.
    pub fn spawn(self, period: Duration, shutdown: Arc<AtomicBool>) -> JoinHandle<()> {
        thread::spawn(move || {
            info!(period_ms = period.as_millis() as u64, "sim sensor feed started");
            while !shutdown.load(Ordering::SeqCst) {
                self.pump(Instant::now());
                thread::sleep(period);
            }
            info!("sim sensor feed stopped");
        })
    }
}
