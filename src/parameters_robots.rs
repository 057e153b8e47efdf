//! Hardcoded configurations for the supported mobile manipulators

pub mod robot {
    use crate::parameters::robot::RobotConfig;
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f64::consts::PI;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    impl RobotConfig {
        /// Look up a preset by its model name.
        pub fn by_name(name: &str) -> Option<Self> {
            match name {
                "pr2" => Some(Self::pr2()),
                "tiago" => Some(Self::tiago()),
                "hsr" => Some(Self::hsr()),
                _ => None,
            }
        }

        /// PR2, right arm with torso.
        pub fn pr2() -> Self {
            RobotConfig {
                name: "pr2".into(),
                joint_model_group_name: "right_arm_torso".into(),
                joint_names: names(&[
                    "torso_lift_joint",
                    "r_shoulder_pan_joint",
                    "r_shoulder_lift_joint",
                    "r_upper_arm_roll_joint",
                    "r_elbow_flex_joint",
                    "r_forearm_roll_joint",
                    "r_wrist_flex_joint",
                    "r_wrist_roll_joint",
                ]),
                gripper_link: "r_wrist_roll_link".into(),
                velocity_limit: 0.2,
                rotation_rate_limit: 1.0,
                tip_to_gripper_offset: Vector3::new(0.18, 0.0, 0.0),
                gripper_to_base_rotation_offset: UnitQuaternion::identity(),
                restricted_ws_z_min: 0.4,
                restricted_ws_z_max: 1.1,
                z_min: 0.2,
                z_max: 1.4,
                neutral_pose: vec![0.1, -1.0, 0.5, -1.0, -1.4, 0.0, -0.6, 0.0],
                base_command_topic: "/base_controller/command".into(),
                frame_id: "odom_combined".into(),
                collision_group_name: "".into(),
                mixture_model_base_offset: 0.02,
            }
        }

        /// PAL TIAGo, arm with torso.
        pub fn tiago() -> Self {
            RobotConfig {
                name: "tiago".into(),
                joint_model_group_name: "arm_torso".into(),
                joint_names: names(&[
                    "torso_lift_joint",
                    "arm_1_joint",
                    "arm_2_joint",
                    "arm_3_joint",
                    "arm_4_joint",
                    "arm_5_joint",
                    "arm_6_joint",
                    "arm_7_joint",
                ]),
                gripper_link: "arm_tool_link".into(),
                velocity_limit: 0.2,
                rotation_rate_limit: 1.0,
                tip_to_gripper_offset: Vector3::new(0.2, 0.0, 0.0),
                gripper_to_base_rotation_offset: UnitQuaternion::from_euler_angles(0.0, 0.0, -PI / 2.0),
                restricted_ws_z_min: 0.4,
                restricted_ws_z_max: 1.0,
                z_min: 0.2,
                z_max: 1.3,
                neutral_pose: vec![0.25, 0.2, -1.34, -0.2, 1.94, -1.57, 1.37, 0.0],
                base_command_topic: "/mobile_base_controller/cmd_vel".into(),
                frame_id: "odom".into(),
                collision_group_name: "".into(),
                mixture_model_base_offset: 0.0,
            }
        }

        /// Toyota HSR. The lift joint is part of the controlled group.
        pub fn hsr() -> Self {
            RobotConfig {
                name: "hsr".into(),
                joint_model_group_name: "whole_body".into(),
                joint_names: names(&[
                    "arm_lift_joint",
                    "arm_flex_joint",
                    "arm_roll_joint",
                    "wrist_flex_joint",
                    "wrist_roll_joint",
                ]),
                gripper_link: "hand_palm_link".into(),
                velocity_limit: 0.15,
                rotation_rate_limit: 0.8,
                tip_to_gripper_offset: Vector3::new(0.0, 0.0, 0.08),
                gripper_to_base_rotation_offset: UnitQuaternion::from_euler_angles(0.0, PI / 2.0, 0.0),
                restricted_ws_z_min: 0.3,
                restricted_ws_z_max: 1.0,
                z_min: 0.1,
                z_max: 1.2,
                neutral_pose: vec![0.1, -0.5, 0.0, -1.0, 0.0],
                base_command_topic: "/hsrb/command_velocity".into(),
                frame_id: "odom".into(),
                collision_group_name: "".into(),
                mixture_model_base_offset: 0.0,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parameters::robot::RobotConfig;

    #[test]
    fn test_presets_are_consistent() {
        for name in ["pr2", "tiago", "hsr"] {
            let config = RobotConfig::by_name(name).expect("known preset");
            assert_eq!(config.name, name);
            assert_eq!(config.neutral_pose.len(), config.joint_count(),
                       "Neutral pose of {} does not match its joints", name);
            assert!(config.velocity_limit > 0.0);
            assert!(config.rotation_rate_limit > 0.0);
            assert!(config.z_min < config.z_max);
            assert!(config.restricted_ws_z_min < config.restricted_ws_z_max);
            assert!((config.gripper_to_base_rotation_offset.norm() - 1.0).abs() < 1E-9);
        }
        assert!(RobotConfig::by_name("r2d2").is_none());
    }

    #[test]
    fn test_z_band() {
        let config = RobotConfig::pr2();
        assert_eq!(config.z_band(true), (0.4, 1.1));
        assert_eq!(config.z_band(false), (0.2, 1.4));
    }
}
