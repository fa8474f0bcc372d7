//! The [`Actuation`] trait – the only way decisions reach the hardware.
//!
//! Drivers implement this trait and hand a boxed instance to the runtime.
//! The decision tree only ever talks to the trait, so the animation server,
//! the motor power service and the walking engine can be swapped without
//! touching any arbitration logic.

use std::fmt;

use hcm_types::HcmError;
use serde::{Deserialize, Serialize};

/// Animations the HCM may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationId {
    SitDown,
    Penalty,
    Walkready,
    StandUp,
    Falling,
}

impl AnimationId {
    /// Animation file name understood by the animation server.
    pub fn name(&self) -> &'static str {
        match self {
            AnimationId::SitDown => "sit_down",
            AnimationId::Penalty => "penalty",
            AnimationId::Walkready => "walkready",
            AnimationId::StandUp => "stand_up",
            AnimationId::Falling => "falling",
        }
    }
}

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical effects available to HCM actions.
///
/// At most one animation plays at a time.  Starting a new one while another
/// is still playing replaces it.
pub trait Actuation: Send {
    /// Start playing `animation`.
    ///
    /// # Errors
    ///
    /// Returns [`HcmError::HardwareFault`] when the animation server rejects
    /// or cannot receive the request.
    fn play_animation(&mut self, animation: AnimationId) -> Result<(), HcmError>;

    /// Poll whether `animation` has finished playing.
    ///
    /// Returns `false` when a different animation (or none) was started.
    fn animation_finished(&mut self, animation: AnimationId) -> bool;

    /// Abort the animation currently playing, if any.
    fn cancel_animation(&mut self) -> Result<(), HcmError>;

    /// Switch servo power on or off.
    fn set_motor_power(&mut self, on: bool) -> Result<(), HcmError>;

    /// Command the walking engine to a standstill.
    fn stop_walking(&mut self) -> Result<(), HcmError>;
}
