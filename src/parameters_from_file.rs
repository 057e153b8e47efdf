//! Supports reading the robot configuration from YAML file (optional)

use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::parameters::robot::RobotConfig;

fn default_rotation_offset() -> [f64; 4] { [0.0, 0.0, 0.0, 1.0] }

#[derive(Deserialize)]
struct Root {
    pub name: String,
    pub joint_model_group_name: String,
    pub joint_names: Vec<String>,
    pub gripper_link: String,
    pub velocity_limit: f64,
    pub rotation_rate_limit: f64,
    pub tip_to_gripper_offset: [f64; 3],
    /// Quaternion in [x, y, z, w] ordering
    #[serde(default = "default_rotation_offset")]
    pub gripper_to_base_rotation_offset: [f64; 4],
    pub restricted_ws_z: [f64; 2],
    pub z: [f64; 2],
    pub neutral_pose: Vec<f64>,
    pub base_command_topic: String,
    pub frame_id: String,
    #[serde(default)]
    pub collision_group_name: String,
    #[serde(default)]
    pub mixture_model_base_offset: f64,
}

impl RobotConfig {
    /// Read the robot configuration from YAML file. YAML file like this is supported:
    /// ```yaml
    /// name: pr2
    /// joint_model_group_name: right_arm_torso
    /// joint_names: [torso_lift_joint, r_shoulder_pan_joint, r_shoulder_lift_joint]
    /// gripper_link: r_wrist_roll_link
    /// velocity_limit: 0.2
    /// rotation_rate_limit: 1.0
    /// tip_to_gripper_offset: [0.18, 0.0, 0.0]
    /// gripper_to_base_rotation_offset: [0.0, 0.0, 0.0, 1.0]
    /// restricted_ws_z: [0.4, 1.1]
    /// z: [0.2, 1.4]
    /// neutral_pose: [0.1, -1.0, 0.5]
    /// base_command_topic: /base_controller/command
    /// frame_id: odom_combined
    /// ```
    /// The rotation offset, collision group and mixture model base offset are optional.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read robot configuration {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid robot configuration {}", path.display()))
    }

    /// Parse the robot configuration from YAML text, see [`RobotConfig::from_yaml_file`].
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let root: Root = serde_saphyr::from_str(contents)
            .map_err(|e| anyhow::anyhow!("Parse error: {}", e))?;

        ensure!(!root.joint_names.is_empty(), "joint_names must not be empty");
        if root.neutral_pose.len() != root.joint_names.len() {
            bail!(
                "neutral_pose has {} values but there are {} joints",
                root.neutral_pose.len(),
                root.joint_names.len()
            );
        }
        for (name, val) in [
            ("velocity_limit", root.velocity_limit),
            ("rotation_rate_limit", root.rotation_rate_limit),
        ] {
            ensure!(val.is_finite() && val > 0.0, "{} must be positive (got {})", name, val);
        }
        for (name, [lower, upper]) in [("restricted_ws_z", root.restricted_ws_z), ("z", root.z)] {
            ensure!(lower <= upper, "{}: lower {} > upper {}", name, lower, upper);
        }

        let [qx, qy, qz, qw] = root.gripper_to_base_rotation_offset;
        let quaternion = Quaternion::new(qw, qx, qy, qz);
        ensure!(quaternion.norm() > 1E-9, "gripper_to_base_rotation_offset must not be zero");

        let [ox, oy, oz] = root.tip_to_gripper_offset;
        Ok(RobotConfig {
            name: root.name,
            joint_model_group_name: root.joint_model_group_name,
            joint_names: root.joint_names,
            gripper_link: root.gripper_link,
            velocity_limit: root.velocity_limit,
            rotation_rate_limit: root.rotation_rate_limit,
            tip_to_gripper_offset: Vector3::new(ox, oy, oz),
            gripper_to_base_rotation_offset: UnitQuaternion::from_quaternion(quaternion),
            restricted_ws_z_min: root.restricted_ws_z[0],
            restricted_ws_z_max: root.restricted_ws_z[1],
            z_min: root.z[0],
            z_max: root.z[1],
            neutral_pose: root.neutral_pose,
            base_command_topic: root.base_command_topic,
            frame_id: root.frame_id,
            collision_group_name: root.collision_group_name,
            mixture_model_base_offset: root.mixture_model_base_offset,
        })
    }
}
