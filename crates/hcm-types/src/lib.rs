use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// High-level robot state label published once per control tick.
///
/// Exactly one label is authoritative at any time.  It is written by the
/// decision on the winning path of the current tick and persists until a
/// later tick assigns a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RobotState {
    Startup,
    ShutDown,
    MotorOff,
    HardwareProblem,
    Penalty,
    PickedUp,
    Record,
    Fallen,
    Falling,
    AnimationRunning,
    Walking,
    Controlable,
    /// Reserved for external monitoring; never assigned by the decision tree.
    HcmOff,
}

impl RobotState {
    /// Stable upper-case label, e.g. `"HARDWARE_PROBLEM"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotState::Startup => "STARTUP",
            RobotState::ShutDown => "SHUT_DOWN",
            RobotState::MotorOff => "MOTOR_OFF",
            RobotState::HardwareProblem => "HARDWARE_PROBLEM",
            RobotState::Penalty => "PENALTY",
            RobotState::PickedUp => "PICKED_UP",
            RobotState::Record => "RECORD",
            RobotState::Fallen => "FALLEN",
            RobotState::Falling => "FALLING",
            RobotState::AnimationRunning => "ANIMATION_RUNNING",
            RobotState::Walking => "WALKING",
            RobotState::Controlable => "CONTROLABLE",
            RobotState::HcmOff => "HCM_OFF",
        }
    }
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recoverable fault conditions.
///
/// Faults are never thrown: the decision tree routes to a dedicated wait or
/// stay action and re-evaluates every tick, so a fault clears itself as soon
/// as the underlying condition does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fault {
    /// No IMU sample received yet, or the last one is older than the timeout.
    SensorTimeout,
    /// Motor state messages stopped arriving.
    ActuatorUnavailable,
    /// An operator asked the robot to shut down.
    ShutdownRequested,
}

impl Fault {
    /// The component name reported in alerts.
    pub fn component(&self) -> &'static str {
        match self {
            Fault::SensorTimeout => "imu",
            Fault::ActuatorUnavailable => "motors",
            Fault::ShutdownRequested => "operator",
        }
    }
}

/// Unified event wrapper for the state/alert bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "hcm-runtime::hcm"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh event stamped with the current wall-clock time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// The published robot state label changed during a tick.
    StateChanged {
        from: Option<RobotState>,
        to: RobotState,
        tick: u64,
    },
    /// A fault became active during a tick.
    Fault {
        fault: Fault,
        state: RobotState,
        tick: u64,
    },
    /// A previously active fault cleared.
    FaultCleared { fault: Fault, tick: u64 },
}

/// Global error type spanning hardware failures, configuration problems and
/// malformed decision trees.
#[derive(Error, Debug)]
pub enum HcmError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Malformed decision tree: {0}")]
    MalformedTree(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Event Bus Error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_state_serializes_as_screaming_label() {
        let json = serde_json::to_string(&RobotState::HardwareProblem).unwrap();
        assert_eq!(json, "\"HARDWARE_PROBLEM\"");
        let back: RobotState = serde_json::from_str("\"PICKED_UP\"").unwrap();
        assert_eq!(back, RobotState::PickedUp);
    }

    #[test]
    fn robot_state_display_matches_serde_label() {
        for state in [
            RobotState::Startup,
            RobotState::ShutDown,
            RobotState::AnimationRunning,
            RobotState::HcmOff,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json.trim_matches('"'), state.to_string());
        }
    }

    #[test]
    fn state_changed_event_roundtrip() {
        let event = Event::new(
            "hcm-runtime::hcm",
            EventPayload::StateChanged {
                from: Some(RobotState::Startup),
                to: RobotState::Controlable,
                tick: 7,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        match back.payload {
            EventPayload::StateChanged { from, to, tick } => {
                assert_eq!(from, Some(RobotState::Startup));
                assert_eq!(to, RobotState::Controlable);
                assert_eq!(tick, 7);
            }
            _ => panic!("unexpected variant"),
        }
    }

    #[test]
    fn fault_component_names() {
        assert_eq!(Fault::SensorTimeout.component(), "imu");
        assert_eq!(Fault::ActuatorUnavailable.component(), "motors");
    }

    #[test]
    fn hcm_error_display() {
        let err = HcmError::HardwareFault {
            component: "motors".to_string(),
            details: "power service unreachable".to_string(),
        };
        assert!(err.to_string().contains("motors"));

        let err2 = HcmError::MalformedTree("hop limit 32 exceeded".to_string());
        assert!(err2.to_string().contains("Malformed decision tree"));
    }
}
