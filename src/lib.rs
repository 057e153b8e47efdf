//! Episode controller for reinforcement learning of mobile manipulation.
//!
//! A mobile manipulator (PR2, TIAGo, HSR) has to bring its gripper to a goal pose. A planner
//! proposes how the gripper and the base should move; the agent decides how the base actually
//! moves by choosing one of the modulation strategies' actions, and the arm follows the
//! planned gripper pose from wherever the base ends up, if inverse kinematics allows.
//! The controller exposes this as a `reset`/`step` environment.
//!
//! # Features
//!
//! - Five base modulation strategies: `modulate_ellipse` (obstacle avoidance through a
//!   dynamical system), `unmodulated`, `relvelm`, `relveld` and `dirvel`.
//! - Linear and mixture-model planners for the reference trajectory.
//! - Analytical execution for training, physics simulation or the real robot for evaluation,
//!   with the timing (wall clock, action repeat, slow down) handled by the controller.
//! - Reproducible episodes: all randomness comes from one seeded generator.
//! - Fixed observation layout (22 values plus one per arm joint), compatible with trained policies.
//! - Episode trace with planned, desired and achieved poses, exportable as JSON.
//!
//! ## Example
//!
//! ```
//! use rs_modulation_rl::controller_config::ControllerConfig;
//! use rs_modulation_rl::episode::{EpisodeController, GoalRequest, ResetRequest, StepRequest};
//! use rs_modulation_rl::kinematics_impl::CartesianArm;
//! use rs_modulation_rl::modulation::Strategy;
//! use rs_modulation_rl::parameters::robot::RobotConfig;
//! use rs_modulation_rl::world::SimWorld;
//!
//! let robot = RobotConfig::pr2();
//! let arm = CartesianArm::for_robot(&robot, 1.2);
//! let config = ControllerConfig::default().with_strategy(Strategy::DirVel);
//! let mut env = EpisodeController::new(robot, config, Box::new(SimWorld::default()), Box::new(arm));
//!
//! let request = ResetRequest {
//!     goal: GoalRequest { goal: vec![1.0, 0.0, 0.8, 0.0, 0.0, 0.0, 1.0], ..GoalRequest::default() },
//!     ..ResetRequest::default()
//! };
//! let obs = env.reset(&request).expect("reset");
//! assert_eq!(obs.len(), env.get_obs_dim());
//!
//! let outcome = env.step(&StepRequest::new([0.0, 0.0, 0.0], 100)).expect("step");
//! assert_eq!(outcome.to_vec().len(), env.get_obs_dim() + 3);
//! ```

pub mod parameters;
pub mod parameters_robots;

#[cfg(feature = "allow_filesystem")]
pub mod parameters_from_file;

pub mod controller_config;

#[path = "utils/utils.rs"]
pub mod utils;
pub mod env_error;
pub mod kinematic_traits;
pub mod kinematics_impl;

pub mod path_plan {
    pub mod planner;
    pub mod linear;
    pub mod mixture;
}

pub mod modulation;
pub mod timing;
pub mod world;
pub mod observation;
pub mod trace;
pub mod episode;

#[cfg(test)]
mod tests;
