//! Helper functions

use crate::kinematic_traits::Pose;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use std::f64::consts::PI;

/// Rescale the velocity so that its norm lies within [min_norm, max_norm].
/// Zero velocity stays zero (it has no direction to scale along).
pub fn norm_scale_vel(vel: Vector3<f64>, min_norm: f64, max_norm: f64) -> Vector3<f64> {
    let norm = vel.norm();
    if norm == 0.0 {
        vel
    } else if norm > max_norm {
        vel * (max_norm / norm)
    } else if norm < min_norm {
        vel * (min_norm / norm)
    } else {
        vel
    }
}

pub fn clamp(value: f64, lower: f64, upper: f64) -> f64 {
    value.max(lower).min(upper)
}

/// Signed difference of two yaw angles, wrapped into [-PI, PI].
pub fn rpy_angle_diff(next: f64, prev: f64) -> f64 {
    let mut diff = next - prev;
    if diff > PI {
        diff -= 2.0 * PI;
    } else if diff < -PI {
        diff += 2.0 * PI;
    }
    diff
}

/// Yaw of the pose rotation.
pub fn yaw(rotation: &UnitQuaternion<f64>) -> f64 {
    rotation.euler_angles().2
}

/// Rotational distance 1 - <q1, q2>^2, zero for equal rotations (also if the quaternion sign differs).
pub fn calc_rot_dist(a: &Pose, b: &Pose) -> f64 {
    let inner_prod = a.rotation.coords.dot(&b.rotation.coords);
    1.0 - inner_prod.powi(2)
}

/// Transform the goal for the gripper tip into the goal for the controlled gripper link.
pub fn tip_to_gripper_goal(
    tip_goal: &Pose,
    tip_to_gripper_offset: &Vector3<f64>,
    gripper_to_base_rot_offset: &UnitQuaternion<f64>,
) -> Pose {
    // Offset is given in the gripper frame.
    let offset_world = tip_goal.rotation * tip_to_gripper_offset;
    let translation = tip_goal.translation.vector - offset_world;
    let rotation = UnitQuaternion::new_normalize(
        (tip_goal.rotation * gripper_to_base_rot_offset).into_inner(),
    );
    Isometry3::from_parts(Translation3::from(translation), rotation)
}

/// Same pose with z moved onto the ground plane.
pub fn project_to_ground(pose: &Pose) -> Pose {
    let t = pose.translation.vector;
    Isometry3::from_parts(Translation3::new(t.x, t.y, 0.0), pose.rotation)
}

/// Pose from planar coordinates and yaw, as used for the mobile base.
pub fn planar_pose(x: f64, y: f64, yaw: f64) -> Pose {
    Isometry3::from_parts(
        Translation3::new(x, y, 0.0),
        UnitQuaternion::from_euler_angles(0.0, 0.0, yaw),
    )
}

pub fn dump_pose(isometry: &Isometry3<f64>) {
    let translation = isometry.translation.vector;
    let rotation: UnitQuaternion<f64> = isometry.rotation;
    println!(
        "x: {:.5}, y: {:.5}, z: {:.5},  quat: {:.5},{:.5},{:.5},{:.5}",
        translation.x, translation.y, translation.z, rotation.i, rotation.j, rotation.k, rotation.w
    );
}

pub fn assert_pose_eq(ta: &Isometry3<f64>, tb: &Isometry3<f64>,
                 distance_tolerance: f64, angular_tolerance: f64) -> bool {
    fn bad(ta: &Isometry3<f64>, tb: &Isometry3<f64>) {
        dump_pose(ta);
        dump_pose(tb);
    }

    let translation_distance = (ta.translation.vector - tb.translation.vector).norm();
    let angular_distance = ta.rotation.angle_to(&tb.rotation);

    if translation_distance.abs() > distance_tolerance {
        bad(ta, tb);
        panic!("Poses have too different translations");
    }

    if angular_distance.abs() > angular_tolerance {
        bad(ta, tb);
        panic!("Poses have too different angles");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_norm_scale_vel_caps_and_lifts() {
        let v = norm_scale_vel(Vector3::new(3.0, 4.0, 0.0), 0.0, 1.0);
        assert_relative_eq!(v.norm(), 1.0, epsilon = 1E-12);
        assert_relative_eq!(v.x / v.y, 0.75, epsilon = 1E-12);

        let v = norm_scale_vel(Vector3::new(0.0, 0.01, 0.0), 0.1, 1.0);
        assert_relative_eq!(v.y, 0.1, epsilon = 1E-12);

        assert_eq!(norm_scale_vel(Vector3::zeros(), 0.1, 1.0), Vector3::zeros());
    }

    #[test]
    fn test_rpy_angle_diff_wraps() {
        assert_relative_eq!(rpy_angle_diff(0.5, 0.2), 0.3, epsilon = 1E-12);
        assert_relative_eq!(rpy_angle_diff(PI - 0.1, -PI + 0.1), -0.2, epsilon = 1E-12);
        assert_relative_eq!(rpy_angle_diff(-PI + 0.1, PI - 0.1), 0.2, epsilon = 1E-12);
    }

    #[test]
    fn test_rot_dist_ignores_quaternion_sign() {
        let a = planar_pose(0.0, 0.0, 1.0);
        let b = Isometry3::from_parts(
            a.translation,
            UnitQuaternion::new_unchecked(-a.rotation.into_inner()),
        );
        assert!(calc_rot_dist(&a, &b).abs() < 1E-12);
        assert!(calc_rot_dist(&a, &planar_pose(0.0, 0.0, 2.0)) > 0.1);
    }

    #[test]
    fn test_tip_to_gripper_goal_moves_back_along_gripper_axis() {
        // Tip pointing along world y: the wrist must sit behind it along y.
        let tip = Isometry3::from_parts(
            Translation3::new(1.0, 1.0, 1.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, PI / 2.0),
        );
        let wrist = tip_to_gripper_goal(&tip, &Vector3::new(0.2, 0.0, 0.0), &UnitQuaternion::identity());
        assert_pose_eq(
            &wrist,
            &Isometry3::from_parts(Translation3::new(1.0, 0.8, 1.0), tip.rotation),
            1E-9,
            1E-9,
        );
    }

    #[test]
    fn test_project_to_ground_keeps_orientation() {
        let pose = Isometry3::from_parts(
            Translation3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.3, 0.2, 0.1),
        );
        let ground = project_to_ground(&pose);
        assert_eq!(ground.translation.vector, Vector3::new(1.0, 2.0, 0.0));
        assert_eq!(ground.rotation, pose.rotation);
    }
}
