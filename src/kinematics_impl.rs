//! Reference arm resolver used by the demo runner and the tests.

use crate::kinematic_traits::{ArmKinematics, Joints, Pose};
use crate::parameters::robot::RobotConfig;
use nalgebra::{Isometry3, Translation3, UnitQuaternion};
use rand::{Rng, RngCore};
use std::f64::consts::PI;

/// Idealized arm that can put the gripper anywhere within its reach. Joint values are the
/// gripper pose relative to the base, `[x, y, z, roll, pitch, yaw]`; further joints are
/// passive and keep their values. An arm with fewer than six joints cannot set the missing
/// coordinates, they stay zero.
///
/// The workspace is a vertical cylinder around the base axis (horizontal `reach`, height
/// band `z_min..z_max`) minus the body of the base itself, a cylinder of `body_radius` up
/// to `body_height`. Reaching into the body counts as self-collision.
#[derive(Debug, Clone)]
pub struct CartesianArm {
    joints: Joints,
    pub reach: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub body_radius: f64,
    pub body_height: f64,
}

// Compare two poses with the given tolerance.
fn compare_poses(ta: &Pose, tb: &Pose, tolerance: f64) -> bool {
    let translation_distance = (ta.translation.vector - tb.translation.vector).norm();
    let angular_distance = ta.rotation.angle_to(&tb.rotation);
    translation_distance <= tolerance && angular_distance <= tolerance
}

impl CartesianArm {
    pub fn new(joint_count: usize, reach: f64, z_min: f64, z_max: f64) -> Self {
        CartesianArm {
            joints: vec![0.0; joint_count],
            reach,
            z_min,
            z_max,
            body_radius: 0.25,
            body_height: 0.35,
        }
    }

    /// Arm covering the full height band of the robot, starting in its neutral pose.
    pub fn for_robot(config: &RobotConfig, reach: f64) -> Self {
        let mut arm = CartesianArm::new(config.joint_count(), reach, config.z_min, config.z_max);
        arm.set_joint_values(&config.neutral_pose);
        arm
    }

    fn pose_of(&self, joints: &[f64]) -> Pose {
        let j = |i: usize| joints.get(i).copied().unwrap_or(0.0);
        Isometry3::from_parts(
            Translation3::new(j(0), j(1), j(2)),
            UnitQuaternion::from_euler_angles(j(3), j(4), j(5)),
        )
    }

    fn reachable(&self, pose: &Pose) -> bool {
        let t = pose.translation.vector;
        t.xy().norm() <= self.reach && t.z >= self.z_min && t.z <= self.z_max
    }

    fn in_body(&self, pose: &Pose) -> bool {
        let t = pose.translation.vector;
        t.xy().norm() < self.body_radius && t.z < self.body_height
    }
}

impl ArmKinematics for CartesianArm {
    fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn joint_values(&self) -> Joints {
        self.joints.clone()
    }

    fn set_joint_values(&mut self, joints: &[f64]) {
        for (dst, src) in self.joints.iter_mut().zip(joints) {
            *dst = *src;
        }
    }

    fn solve(&mut self, desired: &Pose, tolerance: f64) -> bool {
        if !self.reachable(desired) {
            return false;
        }
        let (roll, pitch, yaw) = desired.rotation.euler_angles();
        let t = desired.translation.vector;
        let mut candidate = self.joints.clone();
        for (dst, src) in candidate.iter_mut().zip([t.x, t.y, t.z, roll, pitch, yaw]) {
            *dst = src;
        }
        if !compare_poses(&self.pose_of(&candidate), desired, tolerance) {
            return false;
        }
        self.joints = candidate;
        true
    }

    fn forward(&self) -> Pose {
        self.pose_of(&self.joints)
    }

    fn random_joint_values(&self, rng: &mut dyn RngCore) -> Joints {
        let radius = rng.gen_range(0.0..=self.reach);
        let azimuth = rng.gen_range(-PI..PI);
        let mut joints = vec![
            radius * azimuth.cos(),
            radius * azimuth.sin(),
            rng.gen_range(self.z_min..=self.z_max),
            rng.gen_range(-PI..PI),
            rng.gen_range(-PI / 2.0..PI / 2.0),
            rng.gen_range(-PI..PI),
        ];
        joints.resize(self.joints.len().max(6), 0.0);
        for passive in joints.iter_mut().skip(6) {
            *passive = rng.gen_range(-1.0..=1.0);
        }
        joints.truncate(self.joints.len());
        joints
    }

    fn collides(&self, _base: &Pose) -> bool {
        self.in_body(&self.forward())
    }
}
