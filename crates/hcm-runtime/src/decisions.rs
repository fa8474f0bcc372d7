//! The HCM decision tree.
//!
//! A strict priority chain evaluated from [`HcmDecision::StartHcm`] on every
//! tick.  Each decision either settles the tick on a leaf (labelling the
//! robot state on the way) or defers to the next lower priority.  Safety
//! states therefore always win over behaviour: a penalized robot that is
//! also lying on the floor reports `PENALTY`, never `FALLEN`.
//!
//! | # | Decision | Settles on |
//! |---|---|---|
//! | 1 | `StartHcm` | shutdown request → sit down and stay |
//! | 2 | `CheckImu` | no or stale IMU data → wait |
//! | 3 | `Penalty` | penalized → stop, play penalty, stay |
//! | 4 | `MotorOffTimer` | no goals for too long → sit down, motors off; motors off → power up |
//! | 5 | `CheckMotors` | motors unavailable → wait |
//! | 6 | `Record` | recording → stay |
//! | 7 | `PickedUp` | picked up → walkready, stay |
//! | 8 | `Fallen` | fallen → stand up |
//! | 9 | `Falling` | falling → falling animation |
//! | 10 | `BehaviorAnimation` | external animation → stay |
//! | 11 | `Walking` | walking → stop for a requested animation, else stay |
//! | 12 | `Controlable` | not walkready → walkready, else stay |

use hcm_kernel::Snapshot;
use hcm_types::{Fault, RobotState};

use crate::actions::HcmAction;
use crate::dsd::{Branch, Visit};

pub type HcmBranch = Branch<HcmDecision, HcmAction>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HcmDecision {
    StartHcm,
    CheckImu,
    Penalty,
    MotorOffTimer,
    CheckMotors,
    Record,
    PickedUp,
    Fallen,
    Falling,
    BehaviorAnimation,
    Walking,
    Controlable,
}

pub static SHUT_DOWN_SEQUENCE: [HcmAction; 2] = [HcmAction::PlaySitDown, HcmAction::StayShutDown];

pub static PENALTY_SEQUENCE: [HcmAction; 3] = [
    HcmAction::StopWalking,
    HcmAction::PlayPenalty,
    HcmAction::StayInPenalty,
];

pub static MOTOR_OFF_SEQUENCE: [HcmAction; 3] = [
    HcmAction::PlaySitDown,
    HcmAction::TurnMotorsOff,
    HcmAction::StayMotorsOff,
];

pub static PICKED_UP_SEQUENCE: [HcmAction; 2] = [HcmAction::PlayWalkready, HcmAction::StayPickedUp];

/// Evaluate one decision against the tick's snapshot.
///
/// May label the tick and consume the pending animation request; never
/// actuates.
pub fn decide(decision: HcmDecision, visit: Visit, snap: &mut Snapshot) -> HcmBranch {
    use HcmDecision as D;

    match decision {
        D::StartHcm => {
            if snap.shut_down_request() {
                snap.assign_state(RobotState::ShutDown);
                snap.raise_fault(Fault::ShutdownRequested);
                return Branch::sequence(&SHUT_DOWN_SEQUENCE);
            }
            if !visit.reevaluate {
                snap.assign_state(RobotState::Startup);
            }
            if snap.simulation_active() {
                Branch::Decision(D::Penalty)
            } else {
                Branch::Decision(D::CheckImu)
            }
        }
        D::CheckImu => {
            if snap.imu_never_seen() {
                snap.assign_state(RobotState::Startup);
            } else if snap.is_imu_timeout() {
                snap.assign_state(RobotState::HardwareProblem);
            } else {
                return Branch::Decision(D::Penalty);
            }
            snap.raise_fault(Fault::SensorTimeout);
            Branch::action(HcmAction::WaitForImu)
        }
        D::Penalty => {
            if snap.penalized() {
                snap.assign_state(RobotState::Penalty);
                Branch::sequence(&PENALTY_SEQUENCE)
            } else {
                Branch::Decision(D::MotorOffTimer)
            }
        }
        D::MotorOffTimer => {
            if snap.simulation_active() {
                Branch::Decision(D::Fallen)
            } else if snap.is_motor_off_time() {
                snap.assign_state(RobotState::MotorOff);
                Branch::sequence(&MOTOR_OFF_SEQUENCE)
            } else if !snap.are_motors_on() {
                Branch::action(HcmAction::TurnMotorsOn)
            } else {
                Branch::Decision(D::CheckMotors)
            }
        }
        D::CheckMotors => {
            if snap.are_motors_available() {
                return Branch::Decision(D::Record);
            }
            snap.assign_state(RobotState::HardwareProblem);
            snap.raise_fault(Fault::ActuatorUnavailable);
            Branch::action(HcmAction::WaitForMotors)
        }
        D::Record => {
            if snap.record_active() {
                snap.assign_state(RobotState::Record);
                Branch::action(HcmAction::StayRecord)
            } else {
                Branch::Decision(D::PickedUp)
            }
        }
        D::PickedUp => {
            if snap.is_robot_picked_up() {
                snap.assign_state(RobotState::PickedUp);
                Branch::sequence(&PICKED_UP_SEQUENCE)
            } else {
                Branch::Decision(D::Fallen)
            }
        }
        D::Fallen => {
            if snap.is_stand_up_active() && snap.is_fallen() {
                snap.assign_state(RobotState::Fallen);
                Branch::action(HcmAction::PlayStandUp)
            } else {
                Branch::Decision(D::Falling)
            }
        }
        D::Falling => {
            if snap.falling_detection_active() && snap.is_falling() {
                snap.assign_state(RobotState::Falling);
                Branch::action(HcmAction::PlayFalling)
            } else {
                Branch::Decision(D::BehaviorAnimation)
            }
        }
        D::BehaviorAnimation => {
            if snap.external_animation_running() {
                snap.assign_state(RobotState::AnimationRunning);
                Branch::action(HcmAction::StayAnimationRunning)
            } else {
                Branch::Decision(D::Walking)
            }
        }
        D::Walking => {
            if !snap.is_currently_walking() {
                return Branch::Decision(D::Controlable);
            }
            snap.assign_state(RobotState::Walking);
            if snap.take_animation_request() {
                Branch::action(HcmAction::StopWalking)
            } else {
                Branch::action(HcmAction::StayWalking)
            }
        }
        D::Controlable => {
            if snap.is_walkready() {
                snap.assign_state(RobotState::Controlable);
                Branch::action(HcmAction::StayControlable)
            } else {
                snap.assign_state(RobotState::AnimationRunning);
                Branch::action(HcmAction::PlayWalkready)
            }
        }
    }
}

/// Every branch `decision` can return, in priority order.
pub fn successors(decision: HcmDecision) -> Vec<HcmBranch> {
    use HcmDecision as D;

    match decision {
        D::StartHcm => vec![
            Branch::sequence(&SHUT_DOWN_SEQUENCE),
            Branch::Decision(D::Penalty),
            Branch::Decision(D::CheckImu),
        ],
        D::CheckImu => vec![
            Branch::action(HcmAction::WaitForImu),
            Branch::Decision(D::Penalty),
        ],
        D::Penalty => vec![
            Branch::sequence(&PENALTY_SEQUENCE),
            Branch::Decision(D::MotorOffTimer),
        ],
        D::MotorOffTimer => vec![
            Branch::Decision(D::Fallen),
            Branch::sequence(&MOTOR_OFF_SEQUENCE),
            Branch::action(HcmAction::TurnMotorsOn),
            Branch::Decision(D::CheckMotors),
        ],
        D::CheckMotors => vec![
            Branch::action(HcmAction::WaitForMotors),
            Branch::Decision(D::Record),
        ],
        D::Record => vec![
            Branch::action(HcmAction::StayRecord),
            Branch::Decision(D::PickedUp),
        ],
        D::PickedUp => vec![
            Branch::sequence(&PICKED_UP_SEQUENCE),
            Branch::Decision(D::Fallen),
        ],
        D::Fallen => vec![
            Branch::action(HcmAction::PlayStandUp),
            Branch::Decision(D::Falling),
        ],
        D::Falling => vec![
            Branch::action(HcmAction::PlayFalling),
            Branch::Decision(D::BehaviorAnimation),
        ],
        D::BehaviorAnimation => vec![
            Branch::action(HcmAction::StayAnimationRunning),
            Branch::Decision(D::Walking),
        ],
        D::Walking => vec![
            Branch::action(HcmAction::StopWalking),
            Branch::action(HcmAction::StayWalking),
            Branch::Decision(D::Controlable),
        ],
        D::Controlable => vec![
            Branch::action(HcmAction::PlayWalkready),
            Branch::action(HcmAction::StayControlable),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use hcm_kernel::{Blackboard, BlackboardConfig};

    const FIRST: Visit = Visit { reevaluate: false };
    const AGAIN: Visit = Visit { reevaluate: true };

    fn healthy(now: Instant) -> Blackboard {
        let bb = Blackboard::with_start(BlackboardConfig::default(), now);
        bb.imu_updated(now);
        bb.motors_updated(now);
        bb.update(|s| {
            s.motors_on = true;
            s.walkready = true;
        });
        bb
    }

    #[test]
    fn start_labels_startup_only_on_first_entry() {
        let now = Instant::now();
        let bb = healthy(now);

        let mut snap = bb.snapshot(now);
        assert_eq!(
            decide(HcmDecision::StartHcm, FIRST, &mut snap),
            Branch::Decision(HcmDecision::CheckImu)
        );
        assert_eq!(snap.assigned_state(), Some(RobotState::Startup));

        let mut snap = bb.snapshot(now);
        decide(HcmDecision::StartHcm, AGAIN, &mut snap);
        assert_eq!(snap.assigned_state(), None);
    }

    #[test]
    fn simulation_skips_imu_and_motor_checks() {
        let now = Instant::now();
        let bb = Blackboard::with_start(
            BlackboardConfig {
                simulation_active: true,
                ..BlackboardConfig::default()
            },
            now,
        );
        let mut snap = bb.snapshot(now);
        assert_eq!(
            decide(HcmDecision::StartHcm, AGAIN, &mut snap),
            Branch::Decision(HcmDecision::Penalty)
        );
        assert_eq!(
            decide(HcmDecision::MotorOffTimer, AGAIN, &mut snap),
            Branch::Decision(HcmDecision::Fallen)
        );
    }

    #[test]
    fn shutdown_request_wins() {
        let now = Instant::now();
        let bb = healthy(now);
        bb.request_shutdown();
        let mut snap = bb.snapshot(now);
        assert_eq!(
            decide(HcmDecision::StartHcm, FIRST, &mut snap),
            Branch::sequence(&SHUT_DOWN_SEQUENCE)
        );
        assert_eq!(snap.assigned_state(), Some(RobotState::ShutDown));
        assert_eq!(snap.fault(), Some(Fault::ShutdownRequested));
    }

    #[test]
    fn stale_imu_is_a_hardware_problem() {
        let now = Instant::now();
        let bb = healthy(now);
        let later = now + BlackboardConfig::default().imu_timeout;
        let mut snap = bb.snapshot(later);
        assert_eq!(
            decide(HcmDecision::CheckImu, AGAIN, &mut snap),
            Branch::action(HcmAction::WaitForImu)
        );
        assert_eq!(snap.assigned_state(), Some(RobotState::HardwareProblem));
        assert_eq!(snap.fault(), Some(Fault::SensorTimeout));
    }

    #[test]
    fn motors_off_are_powered_up_without_relabelling() {
        let now = Instant::now();
        let bb = healthy(now);
        bb.update(|s| s.motors_on = false);
        let mut snap = bb.snapshot(now);
        assert_eq!(
            decide(HcmDecision::MotorOffTimer, AGAIN, &mut snap),
            Branch::action(HcmAction::TurnMotorsOn)
        );
        assert_eq!(snap.assigned_state(), None);
    }

    #[test]
    fn motor_off_timeout_sits_down() {
        let now = Instant::now();
        let bb = healthy(now);
        let later = now + BlackboardConfig::default().motor_off_time;
        bb.imu_updated(later);
        let mut snap = bb.snapshot(later);
        assert_eq!(
            decide(HcmDecision::MotorOffTimer, AGAIN, &mut snap),
            Branch::sequence(&MOTOR_OFF_SEQUENCE)
        );
        assert_eq!(snap.assigned_state(), Some(RobotState::MotorOff));
    }

    #[test]
    fn disabled_stand_up_falls_through() {
        let now = Instant::now();
        let bb = healthy(now);
        bb.update(|s| {
            s.fallen = true;
            s.is_stand_up_active = false;
        });
        let mut snap = bb.snapshot(now);
        assert_eq!(
            decide(HcmDecision::Fallen, AGAIN, &mut snap),
            Branch::Decision(HcmDecision::Falling)
        );
    }

    #[test]
    fn walking_consumes_animation_request_once() {
        let now = Instant::now();
        let bb = healthy(now);
        bb.update(|s| s.walking = true);
        bb.request_animation();
        let mut snap = bb.snapshot(now);
        assert_eq!(
            decide(HcmDecision::Walking, AGAIN, &mut snap),
            Branch::action(HcmAction::StopWalking)
        );
        assert!(!snap.animation_requested());
        assert_eq!(
            decide(HcmDecision::Walking, AGAIN, &mut snap),
            Branch::action(HcmAction::StayWalking)
        );
    }

    #[test]
    fn every_decision_declares_what_it_returns() {
        let now = Instant::now();
        let bb = healthy(now);
        bb.update(|s| {
            s.walking = true;
            s.walkready = false;
        });
        let decisions = [
            HcmDecision::StartHcm,
            HcmDecision::CheckImu,
            HcmDecision::Penalty,
            HcmDecision::MotorOffTimer,
            HcmDecision::CheckMotors,
            HcmDecision::Record,
            HcmDecision::PickedUp,
            HcmDecision::Fallen,
            HcmDecision::Falling,
            HcmDecision::BehaviorAnimation,
            HcmDecision::Walking,
            HcmDecision::Controlable,
        ];
        for decision in decisions {
            let mut snap = bb.snapshot(now);
            let branch = decide(decision, AGAIN, &mut snap);
            assert!(
                successors(decision).contains(&branch),
                "{decision:?} returned undeclared {branch:?}"
            );
        }
    }
}
