//! Defines the per-robot configuration data structure

pub mod robot {
    use nalgebra::{UnitQuaternion, Vector3};

    /// Constants of a robot model. See [parameters_robots.rs](parameters_robots.rs) for the
    /// supported mobile manipulators. Selected once when the controller is constructed and
    /// never changed afterwards.
    #[derive(Debug, Clone)]
    pub struct RobotConfig {
        /// Robot model name, also the model name used when placing the robot into the world.
        pub name: String,

        /// Name of the controlled joint model group (arm, possibly with torso).
        pub joint_model_group_name: String,

        /// Names of the joints of the controlled group, in observation order.
        pub joint_names: Vec<String>,

        /// Name of the controlled gripper link.
        pub gripper_link: String,

        /// Maximal base velocity, meters per second.
        pub velocity_limit: f64,

        /// Maximal base rotation rate, radians per second.
        pub rotation_rate_limit: f64,

        /// Offset from the controlled gripper link to the tool tip, in the gripper frame.
        pub tip_to_gripper_offset: Vector3<f64>,

        /// Rotation between the gripper link and the base frame conventions.
        pub gripper_to_base_rotation_offset: UnitQuaternion<f64>,

        /// Height band of the restricted workspace (used for sampling goals and start poses).
        pub restricted_ws_z_min: f64,
        pub restricted_ws_z_max: f64,

        /// Height band of the full workspace.
        pub z_min: f64,
        pub z_max: f64,

        /// Neutral arm configuration, one value per entry of `joint_names`.
        pub neutral_pose: Vec<f64>,

        /// Channel the base velocity commands are sent to.
        pub base_command_topic: String,

        /// Fixed world frame of the robot.
        pub frame_id: String,

        /// Collision group checked against the scene. Empty means the whole robot.
        pub collision_group_name: String,

        /// Offset of the base behind the gripper used by mixture model planners.
        pub mixture_model_base_offset: f64,
    }

    impl RobotConfig {
        /// Number of joints of the controlled group.
        pub fn joint_count(&self) -> usize {
            self.joint_names.len()
        }

        /// Height band for the given workspace restriction.
        pub fn z_band(&self, restricted: bool) -> (f64, f64) {
            if restricted {
                (self.restricted_ws_z_min, self.restricted_ws_z_max)
            } else {
                (self.z_min, self.z_max)
            }
        }

        /// Convert to string yaml representation (quick viewing, etc).
        pub fn to_yaml(&self) -> String {
            let q = self.gripper_to_base_rotation_offset;
            format!(
                "name: {}\n\
                joint_model_group_name: {}\n\
                joint_names: [{}]\n\
                gripper_link: {}\n\
                velocity_limit: {}\n\
                rotation_rate_limit: {}\n\
                tip_to_gripper_offset: [{}, {}, {}]\n\
                gripper_to_base_rotation_offset: [{}, {}, {}, {}]\n\
                restricted_ws_z: [{}, {}]\n\
                z: [{}, {}]\n\
                neutral_pose: [{}]\n\
                base_command_topic: {}\n\
                frame_id: {}\n\
                collision_group_name: \"{}\"\n\
                mixture_model_base_offset: {}\n",
                self.name,
                self.joint_model_group_name,
                self.joint_names.join(", "),
                self.gripper_link,
                self.velocity_limit,
                self.rotation_rate_limit,
                self.tip_to_gripper_offset.x,
                self.tip_to_gripper_offset.y,
                self.tip_to_gripper_offset.z,
                q.i, q.j, q.k, q.w,
                self.restricted_ws_z_min,
                self.restricted_ws_z_max,
                self.z_min,
                self.z_max,
                self.neutral_pose.iter().map(|x| x.to_string())
                    .collect::<Vec<_>>().join(", "),
                self.base_command_topic,
                self.frame_id,
                self.collision_group_name,
                self.mixture_model_base_offset,
            )
        }
    }
}
