//! Settings of the episode controller that do not depend on the robot model.

use crate::modulation::Strategy;

/// Fixed for the lifetime of a controller except for the execution settings, which
/// [`crate::episode::EpisodeController::set_real_execution`] may change.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Seed of the single random generator of the controller.
    pub seed: u64,

    /// Range of the horizontal distance of random goals from the base, meters.
    pub min_goal_dist: f64,
    pub max_goal_dist: f64,

    pub strategy: Strategy,

    /// Weight of the regularization in the reward.
    pub penalty_scaling: f64,

    /// Time step of analytical execution and of the velocities in the observation, seconds.
    pub time_step_train: f64,

    /// Duration of one step when executed on a robot, seconds.
    pub time_step_real_exec: f64,

    /// Planner time runs this many times slower when executed on a robot.
    pub slow_down_real_exec: f64,

    /// Control tick frequency when executed on a robot, Hz.
    pub tick_rate_hz: f64,

    /// Speed range of the planned gripper motion, meters per second.
    pub min_planner_velocity: f64,
    pub max_planner_velocity: f64,

    /// Attempts to place the robot at reset before giving up.
    pub start_pose_trials: usize,

    /// Random arm configurations drawn per start pose attempt before the attempt counts as failed.
    pub max_arm_samples: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            seed: 0,
            min_goal_dist: 1.0,
            max_goal_dist: 5.0,
            strategy: Strategy::RelVelM,
            penalty_scaling: 0.0,
            time_step_train: 0.1,
            time_step_real_exec: 0.1,
            slow_down_real_exec: 1.0,
            tick_rate_hz: 50.0,
            min_planner_velocity: 0.001,
            max_planner_velocity: 0.1,
            start_pose_trials: 50,
            max_arm_samples: 1000,
        }
    }
}

impl ControllerConfig {
    pub fn with_strategy(self, strategy: Strategy) -> Self {
        ControllerConfig { strategy, ..self }
    }

    pub fn with_seed(self, seed: u64) -> Self {
        ControllerConfig { seed, ..self }
    }
}
