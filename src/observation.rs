//! Observation vector, reward and termination codes.

use crate::env_error::EnvError;
use crate::kinematic_traits::Pose;
use nalgebra::{Quaternion, Vector3};
use std::fmt;

/// Observation entries that do not depend on the arm: relative gripper pose (7), planned
/// gripper velocity (3) and rotation (4), relative goal pose (7) and a legacy zero.
pub const OBS_FIXED_LEN: usize = 22;

/// Length of the observation for an arm with `joint_count` joints.
pub fn obs_dim(joint_count: usize) -> usize {
    OBS_FIXED_LEN + joint_count
}

/// Termination signal returned by every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneCode {
    Continue = 0,
    Success = 1,
    /// Too many inverse kinematics failures in this episode
    Failure = 2,
}

impl DoneCode {
    pub fn value(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for DoneCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Everything the observation is built from, all in the world frame except the joints.
#[derive(Debug, Clone, Copy)]
pub struct ObservationInput<'a> {
    pub base: &'a Pose,
    pub gripper_rel: &'a Pose,
    pub goal: &'a Pose,
    pub planned_gripper_vel_rel: &'a Vector3<f64>,
    pub planned_rotation_delta: &'a Quaternion<f64>,
    pub joints: &'a [f64],
}

fn push_vector(obs: &mut Vec<f64>, v: &Vector3<f64>) {
    obs.extend_from_slice(&[v.x, v.y, v.z]);
}

fn push_quaternion(obs: &mut Vec<f64>, q: &Quaternion<f64>) {
    obs.extend_from_slice(&[q.i, q.j, q.k, q.w]);
}

/// Assemble the observation in the order trained policies expect:
/// ```text
/// gripper rel. base (x, y, z, qx, qy, qz, qw)
/// planned gripper velocity in base frame (x, y, z)
/// planned rotation delta (qx, qy, qz, qw)
/// goal rel. base (x, y, z, qx, qy, qz, qw)
/// 0.0
/// joint values
/// ```
pub fn build_observation(input: &ObservationInput, expected_dim: usize) -> Result<Vec<f64>, EnvError> {
    let mut obs = Vec::with_capacity(expected_dim);
    push_vector(&mut obs, &input.gripper_rel.translation.vector);
    push_quaternion(&mut obs, input.gripper_rel.rotation.quaternion());

    push_vector(&mut obs, input.planned_gripper_vel_rel);
    push_quaternion(&mut obs, input.planned_rotation_delta);

    let rel_goal = input.base.inverse() * input.goal;
    push_vector(&mut obs, &rel_goal.translation.vector);
    push_quaternion(&mut obs, rel_goal.rotation.quaternion());

    // Legacy entry, trained checkpoints expect it.
    obs.push(0.0);
    obs.extend_from_slice(input.joints);

    if obs.len() != expected_dim {
        return Err(EnvError::ObservationLength { expected: expected_dim, found: obs.len() });
    }
    Ok(obs)
}

/// Penalty for the regularization, plus a flat 1.0 if the last inverse kinematics failed.
pub fn calc_reward(penalty_scaling: f64, regularization: f64, found_ik: bool) -> f64 {
    let reward = -penalty_scaling * regularization;
    if found_ik { reward } else { reward - 1.0 }
}

/// Success thresholds of an episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SuccessThresholds {
    /// Meters
    pub distance: f64,
    /// Quaternion distance, see [`crate::utils::calc_rot_dist`]
    pub rotation: f64,
}

impl Default for SuccessThresholds {
    fn default() -> Self {
        SuccessThresholds { distance: 0.02, rotation: 0.05 }
    }
}

/// Termination code. Too many IK failures end the episode regardless of how close the
/// gripper is; a failed last tick is never a success.
pub fn calc_done(
    ik_error_count: usize,
    max_allowed_ik_errors: usize,
    found_ik: bool,
    dist_to_goal: f64,
    rot_dist_to_goal: f64,
    thresholds: &SuccessThresholds,
) -> DoneCode {
    if ik_error_count > max_allowed_ik_errors {
        DoneCode::Failure
    } else if !found_ik {
        DoneCode::Continue
    } else if dist_to_goal < thresholds.distance && rot_dist_to_goal < thresholds.rotation {
        DoneCode::Success
    } else {
        DoneCode::Continue
    }
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub observation: Vec<f64>,
    pub reward: f64,
    pub done: DoneCode,
    pub ik_error_count: usize,
}

impl StepOutcome {
    /// Flat form: observation followed by `[reward, done, ik_error_count]`.
    pub fn to_vec(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(self.observation.len() + 3);
        v.extend_from_slice(&self.observation);
        v.push(self.reward);
        v.push(self.done.value() as f64);
        v.push(self.ik_error_count as f64);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::planar_pose;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion};

    #[test]
    fn test_layout() {
        let base = planar_pose(1.0, 0.0, 0.0);
        let gripper_rel = Isometry3::from_parts(Translation3::new(0.5, 0.1, 0.7), UnitQuaternion::identity());
        let goal = Isometry3::from_parts(Translation3::new(2.0, 0.0, 0.9), UnitQuaternion::identity());
        let vel = Vector3::new(0.01, 0.0, -0.01);
        let dq = Quaternion::new(0.0, 0.0, 0.0, 0.0);
        let joints = [0.1, 0.2, 0.3];
        let input = ObservationInput {
            base: &base,
            gripper_rel: &gripper_rel,
            goal: &goal,
            planned_gripper_vel_rel: &vel,
            planned_rotation_delta: &dq,
            joints: &joints,
        };
        let obs = build_observation(&input, obs_dim(3)).expect("consistent length");
        assert_eq!(obs.len(), 25);
        assert_eq!(&obs[0..3], &[0.5, 0.1, 0.7]);
        assert_eq!(obs[6], 1.0);
        assert_eq!(&obs[7..10], &[0.01, 0.0, -0.01]);
        assert_eq!(&obs[10..14], &[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(&obs[14..17], &[1.0, 0.0, 0.9]);
        assert_eq!(obs[21], 0.0);
        assert_eq!(&obs[22..], &joints);

        assert!(matches!(
            build_observation(&input, obs_dim(4)),
            Err(EnvError::ObservationLength { expected: 26, found: 25 })
        ));
    }

    #[test]
    fn test_reward() {
        assert_eq!(calc_reward(0.1, 2.0, true), -0.2);
        assert_eq!(calc_reward(0.1, 2.0, false), -1.2);
        assert_eq!(calc_reward(0.1, 0.0, true), -0.0);
    }

    #[test]
    fn test_done_codes() {
        let t = SuccessThresholds::default();
        // Failure wins over being at the goal.
        assert_eq!(calc_done(11, 10, true, 0.0, 0.0, &t), DoneCode::Failure);
        assert_eq!(calc_done(10, 10, true, 0.0, 0.0, &t), DoneCode::Success);
        assert_eq!(calc_done(3, 10, false, 0.0, 0.0, &t), DoneCode::Continue);
        assert_eq!(calc_done(0, 10, true, 0.01, 0.1, &t), DoneCode::Continue);
        assert_eq!(calc_done(0, 10, true, 0.5, 0.0, &t), DoneCode::Continue);
    }

    #[test]
    fn test_flat_outcome() {
        let outcome = StepOutcome {
            observation: vec![1.0, 2.0],
            reward: -0.5,
            done: DoneCode::Failure,
            ik_error_count: 7,
        };
        assert_eq!(outcome.to_vec(), vec![1.0, 2.0, -0.5, 2.0, 7.0]);
        assert_eq!(DoneCode::Success.to_string(), "1");
    }
}
