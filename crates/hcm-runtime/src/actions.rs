//! HCM actions and the runner that turns them into [`Actuation`] calls.
//!
//! Actions fall into three groups:
//!
//! * `Play*` – start an animation, then poll it until it finishes.
//! * one-shot commands (`StopWalking`, `TurnMotorsOn`, `TurnMotorsOff`) –
//!   done as soon as the command was accepted.
//! * `Stay*` / `WaitFor*` – hold the robot in its current state; never done.
//!
//! A rejected command is logged and retried on the next tick.  It never
//! aborts the tick.

use hcm_hal::{Actuation, AnimationId};
use tracing::{debug, warn};

use crate::dsd::ActionStatus;

/// Every leaf step the HCM tree can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HcmAction {
    PlaySitDown,
    StayShutDown,
    WaitForImu,
    StopWalking,
    PlayPenalty,
    StayInPenalty,
    TurnMotorsOff,
    StayMotorsOff,
    TurnMotorsOn,
    WaitForMotors,
    StayRecord,
    PlayWalkready,
    StayPickedUp,
    PlayStandUp,
    PlayFalling,
    StayAnimationRunning,
    StayWalking,
    StayControlable,
}

impl HcmAction {
    /// The animation a `Play*` action plays.
    pub fn animation(&self) -> Option<AnimationId> {
        match self {
            HcmAction::PlaySitDown => Some(AnimationId::SitDown),
            HcmAction::PlayPenalty => Some(AnimationId::Penalty),
            HcmAction::PlayWalkready => Some(AnimationId::Walkready),
            HcmAction::PlayStandUp => Some(AnimationId::StandUp),
            HcmAction::PlayFalling => Some(AnimationId::Falling),
            _ => None,
        }
    }

    /// Holding actions never report done.
    pub fn is_holding(&self) -> bool {
        matches!(
            self,
            HcmAction::StayShutDown
                | HcmAction::WaitForImu
                | HcmAction::StayInPenalty
                | HcmAction::StayMotorsOff
                | HcmAction::WaitForMotors
                | HcmAction::StayRecord
                | HcmAction::StayPickedUp
                | HcmAction::StayAnimationRunning
                | HcmAction::StayWalking
                | HcmAction::StayControlable
        )
    }
}

/// Executes [`HcmAction`]s against an [`Actuation`] backend.
pub struct ActionRunner {
    actuation: Box<dyn Actuation>,
    in_flight: Option<AnimationId>,
}

impl ActionRunner {
    pub fn new(actuation: Box<dyn Actuation>) -> Self {
        Self {
            actuation,
            in_flight: None,
        }
    }

    /// Animation started by the current step and not yet finished.
    pub fn in_flight(&self) -> Option<AnimationId> {
        self.in_flight
    }

    pub fn enter(&mut self, action: HcmAction) {
        debug!(?action, "action entered");
        self.in_flight = None;
    }

    pub fn execute(&mut self, action: HcmAction) -> ActionStatus {
        if let Some(animation) = action.animation() {
            return self.play(animation);
        }
        let result = match action {
            HcmAction::StopWalking => self.actuation.stop_walking(),
            HcmAction::TurnMotorsOn => self.actuation.set_motor_power(true),
            HcmAction::TurnMotorsOff => self.actuation.set_motor_power(false),
            _ => return ActionStatus::Running,
        };
        match result {
            Ok(()) => ActionStatus::Done,
            Err(e) => {
                warn!(?action, error = %e, "command rejected, retrying next tick");
                ActionStatus::Running
            }
        }
    }

    /// Cancel the animation of a step that left the active path unfinished.
    pub fn exit(&mut self, action: HcmAction) {
        if let Some(animation) = self.in_flight.take() {
            debug!(?action, %animation, "cancelling preempted animation");
            if let Err(e) = self.actuation.cancel_animation() {
                warn!(%animation, error = %e, "animation cancel failed");
            }
        }
    }

    fn play(&mut self, animation: AnimationId) -> ActionStatus {
        if self.in_flight != Some(animation) {
            match self.actuation.play_animation(animation) {
                Ok(()) => self.in_flight = Some(animation),
                Err(e) => warn!(%animation, error = %e, "animation rejected, retrying next tick"),
            }
            return ActionStatus::Running;
        }
        if self.actuation.animation_finished(animation) {
            self.in_flight = None;
            ActionStatus::Done
        } else {
            ActionStatus::Running
        }
    }
}
