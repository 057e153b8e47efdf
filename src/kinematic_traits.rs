//! Core types and the arm kinematics contract used by the episode controller.

extern crate nalgebra as na;

use na::Isometry3;
use rand::RngCore;

/// Pose is used for the base, the gripper and all goals. It contains both Cartesian
/// position and rotation quaternion (the quaternion is normalized by construction).
/// ```
/// extern crate nalgebra as na;
/// use na::{Isometry3, Translation3, UnitQuaternion};
///
/// type Pose = Isometry3<f64>;
///
/// let translation = Translation3::new(1.0, 0.0, 0.0);
/// let rotation = UnitQuaternion::from_quaternion(na::Quaternion::new(1.0, 0.0, 0.0, 1.0));
/// let transform = Pose::from_parts(translation, rotation);
/// ```
pub type Pose = Isometry3<f64>;

/// Arm configuration, one value per joint of the controlled joint model group.
/// Unlike the base, the number of arm joints depends on the robot model.
pub type Joints = Vec<f64>;

/// Solver tolerance passed to [`ArmKinematics::solve`] by the controller.
pub const IK_TOLERANCE: f64 = 0.05;

/// Quaternions with a smaller norm cannot be normalized into a rotation.
pub const MIN_QUATERNION_NORM: f64 = 1E-9;

/// Inverse kinematics resolver and collision checker for the arm mounted on the mobile base.
/// All poses are the controlled gripper link relative to the base.
///
/// The resolver owns the current joint configuration. The controller only reads it back
/// with [`ArmKinematics::joint_values`] and never assumes the desired pose was achieved;
/// the achieved gripper pose is always recomputed with [`ArmKinematics::forward`].
pub trait ArmKinematics {
    /// Number of joints of the controlled group (the tail of the observation vector).
    fn joint_count(&self) -> usize;

    /// Current joint configuration.
    fn joint_values(&self) -> Joints;

    /// Overwrite the joint configuration (used to place the arm at the start of an episode).
    fn set_joint_values(&mut self, joints: &[f64]);

    /// Try to reach the desired gripper pose (relative to the base) within the given
    /// tolerance. On success, the internal configuration becomes the found solution.
    /// On failure the configuration must stay as it was before the call.
    fn solve(&mut self, desired: &Pose, tolerance: f64) -> bool;

    /// Forward kinematics of the current configuration: gripper pose relative to the base.
    fn forward(&self) -> Pose;

    /// Draw a random configuration within the joint limits. All randomness must come from
    /// the passed generator so episodes are reproducible under a fixed seed.
    fn random_joint_values(&self, rng: &mut dyn RngCore) -> Joints;

    /// Checks the current configuration for self-collision, with the base at the given pose.
    fn collides(&self, _base: &Pose) -> bool {
        false
    }
}
