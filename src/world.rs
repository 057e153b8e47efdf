//! Execution backends.
//!
//! The analytical backend (`"sim"`) applies every command instantly and is what training
//! runs on. The physics simulation (`"gazebo"`) and the real robot (`"world"`) execute the
//! commands over time and report the achieved state back; both talk to the robot through a
//! [`RobotLink`] supplied by the caller.

use crate::env_error::EnvError;
use crate::kinematic_traits::{Joints, Pose};
use crate::modulation::BaseCommand;
use crate::parameters::robot::RobotConfig;
use tracing::{debug, info};

/// Capabilities of the execution backend the controller needs.
pub trait World {
    /// Backend name as accepted by [`select_world`].
    fn name(&self) -> &'static str;

    /// True if commands take effect instantly (no dynamics, no wall clock).
    fn is_analytical(&self) -> bool;

    /// Current base pose in the world frame.
    fn base_pose(&mut self) -> Pose;

    /// Current arm configuration, for backends that execute the arm commands.
    fn joint_values(&mut self) -> Option<Joints> {
        None
    }

    /// Place the robot model with its base at the given pose.
    fn set_model_pose(&mut self, model: &str, pose: &Pose, config: &RobotConfig);

    fn send_base_command(&mut self, _topic: &str, _command: &BaseCommand) {}

    /// Command the arm into the given configuration within `duration` seconds.
    fn send_arm_command(&mut self, _joints: &[f64], _duration: f64) {}

    /// Whether the last arm command has been executed successfully.
    fn arm_success(&mut self) -> bool {
        true
    }

    /// Whether the pose lies within the known part of the world (only meaningful for the real robot).
    fn is_within_bounds(&self, _pose: &Pose) -> bool {
        true
    }
}

/// Connection to a robot executing the commands, simulated or real. Implemented by the
/// middleware integration.
pub trait RobotLink {
    fn base_pose(&mut self) -> Pose;
    fn joint_values(&mut self) -> Joints;
    /// Teleport the model (simulation only).
    fn place_model(&mut self, model: &str, pose: &Pose, config: &RobotConfig);
    fn send_base_command(&mut self, topic: &str, command: &BaseCommand);
    fn send_arm_command(&mut self, joints: &[f64], duration: f64);
    fn arm_success(&mut self) -> bool;
    fn is_within_map(&self, _pose: &Pose) -> bool {
        true
    }
}

/// Analytical backend. Remembers where the model has been placed.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    base: Pose,
}

impl World for SimWorld {
    fn name(&self) -> &'static str {
        "sim"
    }

    fn is_analytical(&self) -> bool {
        true
    }

    fn base_pose(&mut self) -> Pose {
        self.base
    }

    fn set_model_pose(&mut self, _model: &str, pose: &Pose, _config: &RobotConfig) {
        self.base = *pose;
    }
}

/// Physics simulation.
pub struct GazeboWorld {
    link: Box<dyn RobotLink>,
}

impl World for GazeboWorld {
    fn name(&self) -> &'static str {
        "gazebo"
    }

    fn is_analytical(&self) -> bool {
        false
    }

    fn base_pose(&mut self) -> Pose {
        self.link.base_pose()
    }

    fn joint_values(&mut self) -> Option<Joints> {
        Some(self.link.joint_values())
    }

    fn set_model_pose(&mut self, model: &str, pose: &Pose, config: &RobotConfig) {
        // Stop the base first so it does not keep driving after being moved.
        self.link.send_base_command(&config.base_command_topic, &BaseCommand::default());
        self.link.place_model(model, pose, config);
    }

    fn send_base_command(&mut self, topic: &str, command: &BaseCommand) {
        self.link.send_base_command(topic, command);
    }

    fn send_arm_command(&mut self, joints: &[f64], duration: f64) {
        self.link.send_arm_command(joints, duration);
    }

    fn arm_success(&mut self) -> bool {
        self.link.arm_success()
    }
}

/// Real robot. The base cannot be placed, episodes start wherever the robot stands.
pub struct RealWorld {
    link: Box<dyn RobotLink>,
}

impl World for RealWorld {
    fn name(&self) -> &'static str {
        "world"
    }

    fn is_analytical(&self) -> bool {
        false
    }

    fn base_pose(&mut self) -> Pose {
        self.link.base_pose()
    }

    fn joint_values(&mut self) -> Option<Joints> {
        Some(self.link.joint_values())
    }

    fn set_model_pose(&mut self, model: &str, _pose: &Pose, config: &RobotConfig) {
        debug!("Keeping the real {} where it is", model);
        self.link.send_base_command(&config.base_command_topic, &BaseCommand::default());
    }

    fn send_base_command(&mut self, topic: &str, command: &BaseCommand) {
        self.link.send_base_command(topic, command);
    }

    fn send_arm_command(&mut self, joints: &[f64], duration: f64) {
        self.link.send_arm_command(joints, duration);
    }

    fn arm_success(&mut self) -> bool {
        self.link.arm_success()
    }

    fn is_within_bounds(&self, pose: &Pose) -> bool {
        self.link.is_within_map(pose)
    }
}

/// Create the backend by name: `"sim"`, `"gazebo"` or `"world"`. The last two execute
/// commands on a robot and need initialized controllers and the link to talk to them.
pub fn select_world(
    name: &str,
    controllers_initialized: bool,
    link: Option<Box<dyn RobotLink>>,
) -> Result<Box<dyn World>, EnvError> {
    let analytical = match name {
        "sim" => true,
        "gazebo" | "world" => false,
        _ => return Err(EnvError::UnknownBackend(name.to_string())),
    };
    if analytical {
        return Ok(Box::new(SimWorld::default()));
    }
    if !controllers_initialized {
        return Err(EnvError::ControllersRequired(name.to_string()));
    }
    let Some(link) = link else {
        return Err(EnvError::ControllersRequired(name.to_string()));
    };
    info!("Executing on {}", name);
    if name == "gazebo" {
        Ok(Box::new(GazeboWorld { link }))
    } else {
        Ok(Box::new(RealWorld { link }))
    }
}
