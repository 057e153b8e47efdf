//! Reference trajectory contract shared by the gripper planners.

use crate::kinematic_traits::Pose;
use crate::utils::norm_scale_vel;
use nalgebra::{Quaternion, Vector3};

/// Next target poses of the gripper and the base, as produced by a planner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GripperPlan {
    pub next_gripper_pose: Pose,
    pub next_base_pose: Pose,
}

/// Motion between two poses, expressed per control tick (not per second).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedVelocities {
    /// Translation expressed in the reference (base) frame.
    pub vel_in_base_frame: Vector3<f64>,
    /// Translation in the world frame.
    pub vel_in_world_frame: Vector3<f64>,
    /// Rotation from the current to the target orientation. All zero (not a valid
    /// rotation) until the first velocity has been planned.
    pub rotation_delta: Quaternion<f64>,
}

impl Default for PlannedVelocities {
    fn default() -> Self {
        PlannedVelocities {
            vel_in_base_frame: Vector3::zeros(),
            vel_in_world_frame: Vector3::zeros(),
            rotation_delta: Quaternion::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

/// Everything a planner may need to produce the next plan.
#[derive(Debug, Clone, Copy)]
pub struct PlannerQuery {
    /// Planner clock, frozen during the start pause.
    pub time: f64,
    /// Time step to plan for. Zero produces no motion.
    pub dt: f64,
    pub current_base: Pose,
    pub current_gripper: Pose,
    /// Velocities planned in the previous tick, for continuity.
    pub prev_base_vel: Vector3<f64>,
    pub prev_gripper_vel: Vector3<f64>,
    pub prev_gripper_rotation_delta: Quaternion<f64>,
    /// Speed range of the planned gripper motion, meters per second.
    pub min_speed: f64,
    pub max_speed: f64,
    /// If false, the plan is only computed and not committed as the previous plan.
    pub advance: bool,
}

/// Planner producing the reference trajectory of the gripper and the base toward the goal.
pub trait GripperPlanner {
    /// Compute the next plan. Commits it as the previous plan if `query.advance` is set.
    fn next_plan(&mut self, query: &PlannerQuery) -> GripperPlan;

    /// The last committed plan (the start poses before the first committed query).
    fn previous_plan(&self) -> GripperPlan;

    /// Final attractor of the trajectory, for planners that derive the goal from a model.
    fn final_attractor(&self) -> Option<Pose> {
        None
    }

    /// Velocity that moves `from` into `to`, with the translation expressed in the frame
    /// of `reference` and its norm capped to `rate_limit` (no cap if `rate_limit` is not positive).
    fn transform_to_velocity(&self, from: &Pose, to: &Pose, reference: &Pose, rate_limit: f64) -> PlannedVelocities {
        transform_to_velocity(from, to, reference, rate_limit)
    }
}

/// See [`GripperPlanner::transform_to_velocity`].
pub fn transform_to_velocity(from: &Pose, to: &Pose, reference: &Pose, rate_limit: f64) -> PlannedVelocities {
    let mut vel_world = to.translation.vector - from.translation.vector;
    if rate_limit > 0.0 {
        vel_world = norm_scale_vel(vel_world, 0.0, rate_limit);
    }
    let vel_rel = reference.rotation.inverse() * vel_world;
    let dq = (to.rotation * from.rotation.inverse()).into_inner();
    PlannedVelocities {
        vel_in_base_frame: vel_rel,
        vel_in_world_frame: vel_world,
        rotation_delta: dq,
    }
}

/// Move `from` toward `to` by the distance the speed range allows within `dt`. The rotation
/// follows proportionally; the target is reached exactly once it is within one step.
pub fn step_towards(from: &Pose, to: &Pose, dt: f64, min_speed: f64, max_speed: f64) -> Pose {
    if dt <= 0.0 {
        return *from;
    }
    let diff = to.translation.vector - from.translation.vector;
    let distance = diff.norm();
    let step = norm_scale_vel(diff / dt, min_speed, max_speed) * dt;
    let step_length = step.norm();

    if step_length >= distance {
        return *to;
    }
    let fraction = step_length / distance;
    let rotation = from.rotation.try_slerp(&to.rotation, fraction, 1E-9)
        .unwrap_or(to.rotation);
    Pose::from_parts((from.translation.vector + step).into(), rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{assert_pose_eq, planar_pose};
    use approx::assert_relative_eq;

    #[test]
    fn test_velocity_in_reference_frame() {
        let from = planar_pose(0.0, 0.0, 0.0);
        let to = planar_pose(1.0, 0.0, 0.0);
        // Base turned by 90 degrees: world x is the base's -y.
        let reference = planar_pose(0.0, 0.0, std::f64::consts::FRAC_PI_2);
        let vel = transform_to_velocity(&from, &to, &reference, 0.0);
        assert_relative_eq!(vel.vel_in_world_frame, Vector3::new(1.0, 0.0, 0.0), epsilon = 1E-12);
        assert_relative_eq!(vel.vel_in_base_frame, Vector3::new(0.0, -1.0, 0.0), epsilon = 1E-12);
        assert_relative_eq!(vel.rotation_delta.w, 1.0, epsilon = 1E-12);
    }

    #[test]
    fn test_velocity_rate_limit() {
        let vel = transform_to_velocity(
            &planar_pose(0.0, 0.0, 0.0), &planar_pose(3.0, 4.0, 0.0), &planar_pose(0.0, 0.0, 0.0), 0.5);
        assert_relative_eq!(vel.vel_in_world_frame.norm(), 0.5, epsilon = 1E-12);
    }

    #[test]
    fn test_step_towards() {
        let from = planar_pose(0.0, 0.0, 0.0);
        let to = planar_pose(1.0, 0.0, 1.0);
        let next = step_towards(&from, &to, 0.1, 0.001, 0.1);
        assert_relative_eq!(next.translation.x, 0.01, epsilon = 1E-12);
        // One percent of the way, one percent of the rotation.
        assert_relative_eq!(next.rotation.angle(), 0.01, epsilon = 1E-9);

        assert_pose_eq(&step_towards(&planar_pose(0.995, 0.0, 1.0), &to, 0.1, 0.001, 0.1), &to, 1E-12, 1E-12);
        assert_eq!(step_towards(&from, &to, 0.0, 0.001, 0.1), from);
    }
}
