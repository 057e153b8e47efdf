//! Episode controller: the reset/step loop of the environment.
//!
//! Each step runs one or more control ticks. In a tick the planner proposes the next gripper
//! and base poses, the modulation strategy turns the agent's action into the base motion,
//! and the arm tries to reach the planned gripper pose from the new base pose. The achieved
//! state (never the desired one) is what the next tick starts from.

use crate::controller_config::ControllerConfig;
use crate::env_error::EnvError;
use crate::kinematic_traits::{ArmKinematics, IK_TOLERANCE, Joints, MIN_QUATERNION_NORM, Pose};
use crate::modulation::{BaseAction, BaseCommand, BaseCommandCalculator, ObstacleModulation, TickInput};
use crate::observation::{
    build_observation, calc_done, calc_reward, obs_dim, DoneCode, ObservationInput, StepOutcome,
    SuccessThresholds,
};
use crate::parameters::robot::RobotConfig;
use crate::path_plan::linear::LinearPlanner;
use crate::path_plan::mixture::{MixtureModel, MixtureModelPlanner};
use crate::path_plan::planner::{GripperPlan, GripperPlanner, PlannedVelocities, PlannerQuery};
use crate::timing::{action_repeat, EpisodeClock, Rate};
use crate::trace::{EpisodeTrace, PathPoint, PoseRecord, SampleFlags, TrajectorySample};
use crate::utils::{calc_rot_dist, planar_pose, project_to_ground, tip_to_gripper_goal};
use crate::world::{select_world, RobotLink, World};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Gaussian noise below this standard deviation is treated as off.
const MIN_NOISE_STD: f64 = 0.0001;

/// Seconds the arm gets to move into the start configuration.
const START_POSE_ARM_DURATION: f64 = 5.0;

/// Seconds the arm gets to follow each tick's command.
const TICK_ARM_DURATION: f64 = 0.1;

/// Distribution of random goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalMode {
    /// Goal height anywhere in the robot's height band.
    Rnd,
    /// Goal height within the restricted workspace band.
    RestrictedWs,
    /// No longer supported, kept so that old settings fail loudly.
    Fixed,
}

impl FromStr for GoalMode {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rnd" => Ok(GoalMode::Rnd),
            "restricted_ws" => Ok(GoalMode::RestrictedWs),
            "fixed" => Ok(GoalMode::Fixed),
            _ => Err(EnvError::UnsupportedGoalMode(s.to_string())),
        }
    }
}

/// Distribution of the arm configuration at the start of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPoseMode {
    /// Neutral pose of the robot.
    Fixed,
    /// Random collision free configuration.
    Rnd,
    /// Random collision free configuration with the gripper in the restricted workspace band.
    RestrictedWs,
}

impl FromStr for StartPoseMode {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(StartPoseMode::Fixed),
            "rnd" => Ok(StartPoseMode::Rnd),
            "restricted_ws" => Ok(StartPoseMode::RestrictedWs),
            _ => Err(EnvError::UnsupportedStartPoseMode(s.to_string())),
        }
    }
}

/// Decides whether a random goal on the real robot should be used. Called only for goals
/// inside the known part of the world.
pub trait GoalAcceptance {
    fn accept(&mut self, goal: &Pose) -> bool;
}

impl<F: FnMut(&Pose) -> bool> GoalAcceptance for F {
    fn accept(&mut self, goal: &Pose) -> bool {
        self(goal)
    }
}

/// Accepts every goal.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl GoalAcceptance for AcceptAll {
    fn accept(&mut self, _goal: &Pose) -> bool {
        true
    }
}

/// Goal settings, see [`EpisodeController::set_gripper_goal`].
#[derive(Debug, Clone, PartialEq)]
pub struct GoalRequest {
    /// Goal of the gripper tip: `[x, y, z, roll, pitch, yaw]`, `[x, y, z, qx, qy, qz, qw]`,
    /// or empty for a random goal.
    pub goal: Vec<f64>,
    pub goal_mode: GoalMode,
    /// Mixture model to plan with. The linear planner is used if not given.
    pub planner_model_path: Option<String>,
    pub thresholds: SuccessThresholds,
    /// Seconds after setting the goal during which the planned poses stay put.
    pub start_pause: f64,
}

impl Default for GoalRequest {
    fn default() -> Self {
        GoalRequest {
            goal: Vec::new(),
            goal_mode: GoalMode::Rnd,
            planner_model_path: None,
            thresholds: SuccessThresholds::default(),
            start_pause: 0.0,
        }
    }
}

/// Episode settings, see [`EpisodeController::reset`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResetRequest {
    pub goal: GoalRequest,
    /// `[xmin, xmax, ymin, ymax, yawmin, yawmax]` of the base start, or empty for the origin.
    pub base_start: Vec<f64>,
    pub start_pose_mode: StartPoseMode,
    pub close_gripper: bool,
    /// Record the episode trace.
    pub verbose: bool,
}

impl Default for ResetRequest {
    fn default() -> Self {
        ResetRequest {
            goal: GoalRequest::default(),
            base_start: Vec::new(),
            start_pose_mode: StartPoseMode::Fixed,
            close_gripper: false,
            verbose: false,
        }
    }
}

/// Inputs of one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepRequest {
    pub max_allowed_ik_errors: usize,
    /// Agent action `[rotation, x, y]`, each in [-1, 1].
    pub action: [f64; 3],
    /// Standard deviation of the noise on the planned gripper position, meters.
    pub ee_noise_std: f64,
    /// Standard deviation of the noise on the base motion.
    pub base_noise_std: f64,
}

impl StepRequest {
    pub fn new(action: [f64; 3], max_allowed_ik_errors: usize) -> Self {
        StepRequest { max_allowed_ik_errors, action, ee_noise_std: 0.0, base_noise_std: 0.0 }
    }
}

/// Lifecycle of the controller. `Terminal` is informational: stepping may continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    StartPosing,
    GoalSet,
    Stepping,
    Terminal(DoneCode),
}

/// Robot and goal state of the running episode. Poses are in the world frame unless
/// named relative.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeState {
    pub base: Pose,
    pub gripper: Pose,
    pub gripper_rel: Pose,
    pub gripper_goal: Pose,
    pub base_goal: Pose,
    pub joints: Joints,
    pub ik_error_count: usize,
    pub thresholds: SuccessThresholds,
    pub planned_gripper_vel: PlannedVelocities,
    pub planned_base_vel: PlannedVelocities,
}

impl EpisodeState {
    fn new(joint_count: usize) -> Self {
        EpisodeState {
            base: Pose::identity(),
            gripper: Pose::identity(),
            gripper_rel: Pose::identity(),
            gripper_goal: Pose::identity(),
            base_goal: Pose::identity(),
            joints: vec![0.0; joint_count],
            ik_error_count: 0,
            thresholds: SuccessThresholds::default(),
            planned_gripper_vel: PlannedVelocities::default(),
            planned_base_vel: PlannedVelocities::default(),
        }
    }
}

/// Parse the goal as `[x, y, z, roll, pitch, yaw]` or `[x, y, z, qx, qy, qz, qw]`.
pub fn parse_goal(goal: &[f64]) -> Result<Pose, EnvError> {
    let rotation = match goal.len() {
        6 => UnitQuaternion::from_euler_angles(goal[3], goal[4], goal[5]),
        7 => {
            let quaternion = Quaternion::new(goal[6], goal[3], goal[4], goal[5]);
            if quaternion.norm() < MIN_QUATERNION_NORM {
                return Err(EnvError::ZeroGoalQuaternion);
            }
            UnitQuaternion::from_quaternion(quaternion)
        }
        found => return Err(EnvError::InvalidGoalFormat { found }),
    };
    Ok(Isometry3::from_parts(Translation3::new(goal[0], goal[1], goal[2]), rotation))
}

/// Uniform draw from [lower, upper]. Equal bounds are allowed and give the bound.
pub fn draw_rng(rng: &mut StdRng, lower: f64, upper: f64) -> Result<f64, EnvError> {
    if lower == upper {
        Ok(lower)
    } else if lower > upper {
        Err(EnvError::InvalidRange { lower, upper })
    } else {
        Ok(rng.gen_range(lower..upper))
    }
}

/// Summary of the ticks of one step.
struct TickSummary {
    first_plan: GripperPlan,
    found_ik: bool,
    regularization: f64,
    desired_base: Pose,
    desired_gripper_rel: Pose,
    command: BaseCommand,
    last_dt: f64,
    collision: bool,
}

/// The environment. Owns the episode state, the active planner and the random generator.
pub struct EpisodeController {
    robot: RobotConfig,
    config: ControllerConfig,
    world: Box<dyn World>,
    arm: Box<dyn ArmKinematics>,
    base_calc: BaseCommandCalculator,
    goal_acceptance: Box<dyn GoalAcceptance>,
    planner: Option<Box<dyn GripperPlanner>>,
    rng: StdRng,
    rate: Rate,
    wall_origin: Instant,
    state: EpisodeState,
    clock: EpisodeClock,
    trace: EpisodeTrace,
    phase: Phase,
    verbose: bool,
}

impl EpisodeController {
    pub fn new(
        robot: RobotConfig,
        config: ControllerConfig,
        world: Box<dyn World>,
        arm: Box<dyn ArmKinematics>,
    ) -> Self {
        let mut base_calc = BaseCommandCalculator::new(
            config.strategy, robot.velocity_limit, robot.rotation_rate_limit);
        base_calc.slow_down_factor = if world.is_analytical() { 1.0 } else { config.slow_down_real_exec };
        let joint_count = arm.joint_count();
        info!("Controller for {} with strategy {} on {}", robot.name, config.strategy, world.name());

        EpisodeController {
            rng: StdRng::seed_from_u64(config.seed),
            rate: Rate::new(config.tick_rate_hz),
            robot,
            world,
            arm,
            base_calc,
            goal_acceptance: Box::new(AcceptAll),
            planner: None,
            wall_origin: Instant::now(),
            state: EpisodeState::new(joint_count),
            clock: EpisodeClock::default(),
            trace: EpisodeTrace::default(),
            phase: Phase::Uninitialized,
            verbose: false,
            config,
        }
    }

    /// Obstacle avoidance for the `modulate_ellipse` strategy.
    pub fn with_modulation(mut self, modulation: Box<dyn ObstacleModulation>) -> Self {
        self.base_calc.modulation = modulation;
        self
    }

    /// Approval of random goals on the real robot.
    pub fn with_goal_acceptance(mut self, acceptance: Box<dyn GoalAcceptance>) -> Self {
        self.goal_acceptance = acceptance;
        self
    }

    /// Switch the execution backend, see [`select_world`]. `time_step` is the duration of
    /// one step on the robot, `slow_down` the slow down of the planner there.
    pub fn set_real_execution(
        &mut self,
        name: &str,
        time_step: f64,
        slow_down: f64,
        controllers_initialized: bool,
        link: Option<Box<dyn RobotLink>>,
    ) -> Result<(), EnvError> {
        self.world = select_world(name, controllers_initialized, link)?;
        self.config.time_step_real_exec = time_step;
        self.config.slow_down_real_exec = slow_down;
        self.base_calc.slow_down_factor = if self.world.is_analytical() { 1.0 } else { slow_down };
        Ok(())
    }

    pub fn get_obs_dim(&self) -> usize {
        obs_dim(self.arm.joint_count())
    }

    pub fn get_dist_to_goal(&self) -> f64 {
        (self.state.gripper_goal.translation.vector - self.state.gripper.translation.vector).norm()
    }

    pub fn get_rot_dist_to_goal(&self) -> f64 {
        calc_rot_dist(&self.state.gripper, &self.state.gripper_goal)
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn clock(&self) -> &EpisodeClock {
        &self.clock
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn trace(&self) -> &EpisodeTrace {
        &self.trace
    }

    pub fn robot(&self) -> &RobotConfig {
        &self.robot
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn world_name(&self) -> &'static str {
        self.world.name()
    }

    pub fn open_gripper(&mut self) -> Result<(), EnvError> {
        Err(EnvError::NotImplemented("open_gripper"))
    }

    pub fn close_gripper(&mut self) -> Result<(), EnvError> {
        Err(EnvError::NotImplemented("close_gripper"))
    }

    /// Start a new episode: place the robot, then set the goal. Returns the first observation.
    pub fn reset(&mut self, request: &ResetRequest) -> Result<Vec<f64>, EnvError> {
        if !self.world.is_analytical() {
            info!("Resetting environment");
        }
        self.phase = Phase::StartPosing;
        self.state.ik_error_count = 0;
        self.verbose = request.verbose;

        let mut placed = false;
        for trial in 0..self.config.start_pose_trials {
            if self.set_start_pose(&request.base_start, request.start_pose_mode)? {
                placed = true;
                break;
            }
            debug!("Start pose attempt {} failed", trial + 1);
        }
        if !placed {
            warn!("Could not set start pose after {} trials", self.config.start_pose_trials);
            return Err(EnvError::StartPoseUnreachable { trials: self.config.start_pose_trials });
        }

        if request.close_gripper {
            self.close_gripper()?;
        }

        let now = if self.world.is_analytical() { 0.0 } else { self.wall_time() };
        self.clock.reset(now);
        self.trace.restart();

        let obs = self.set_gripper_goal(&request.goal)?;
        if let Some(plan) = self.planner.as_ref().map(|planner| planner.previous_plan()) {
            self.record_sample(&plan, SampleFlags::INITIAL);
        }
        Ok(obs)
    }

    /// Set a new goal for the running episode and build the planner toward it. Returns the
    /// observation with zero planned velocities. Nothing is changed if the request is invalid.
    pub fn set_gripper_goal(&mut self, request: &GoalRequest) -> Result<Vec<f64>, EnvError> {
        let explicit_goal = if request.goal.is_empty() {
            if request.goal_mode == GoalMode::Fixed {
                return Err(EnvError::UnsupportedGoalMode("fixed".into()));
            }
            None
        } else {
            Some(parse_goal(&request.goal)?)
        };
        let model = match &request.planner_model_path {
            Some(path) => Some(MixtureModel::from_yaml_file(path)?),
            None => None,
        };

        let goal_input = match explicit_goal {
            Some(tip_goal) => tip_goal,
            None => self.sample_goal(request.goal_mode)?,
        };

        self.state.thresholds = request.thresholds;
        if !self.world.is_analytical() {
            self.state.base = self.world.base_pose();
            self.update_gripper_from_world();
        }
        self.state.gripper_goal = match explicit_goal {
            Some(tip_goal) => self.tip_to_gripper(&tip_goal),
            // Random goals are drawn for the gripper link directly.
            None => goal_input,
        };
        self.state.base_goal = project_to_ground(&self.state.gripper_goal);

        let planner: Box<dyn GripperPlanner> = match model {
            Some(model) => {
                let planner = MixtureModelPlanner::new(
                    &self.robot.tip_to_gripper_offset,
                    &self.robot.gripper_to_base_rotation_offset,
                    &goal_input,
                    &self.state.gripper,
                    &self.state.base,
                    &model,
                    self.robot.mixture_model_base_offset,
                );
                if let Some(attractor) = planner.final_attractor() {
                    self.state.gripper_goal = self.tip_to_gripper(&attractor);
                }
                debug!("Mixture model planner with {} attractors", planner.attractors().len());
                Box::new(planner)
            }
            None => Box::new(LinearPlanner::new(
                self.state.gripper_goal,
                self.state.gripper,
                self.state.base_goal,
                self.state.base,
            )),
        };
        self.planner = Some(planner);

        let dt = self.tick_dt();
        self.clock.start_goal(request.start_pause, dt);
        self.state.planned_gripper_vel = PlannedVelocities::default();
        self.state.planned_base_vel = PlannedVelocities::default();
        self.phase = Phase::GoalSet;
        debug!("Gripper goal {}", PoseRecord::from(&self.state.gripper_goal));

        self.build_obs_vector()
    }

    /// Run one step of `action_repeat` control ticks.
    pub fn step(&mut self, request: &StepRequest) -> Result<StepOutcome, EnvError> {
        let mut planner = self.planner.take().ok_or(EnvError::NotReady("step"))?;
        let summary = self.run_ticks(planner.as_mut(), request);
        self.planner = Some(planner);

        let reward = calc_reward(self.config.penalty_scaling, summary.regularization, summary.found_ik);
        let done = self.calc_done_ret(summary.found_ik, request.max_allowed_ik_errors);
        let observation = self.build_obs_vector()?;

        if self.verbose {
            self.trace.path_points.push(PathPoint {
                planned_gripper: PoseRecord::from(&summary.first_plan.next_gripper_pose),
                planned_base: PoseRecord::planar(&summary.first_plan.next_base_pose),
                base: PoseRecord::planar(&self.state.base),
                desired_base: PoseRecord::planar(&summary.desired_base),
                base_command: summary.command,
                gripper: PoseRecord::from(&self.state.gripper),
                gripper_rel: PoseRecord::from(&self.state.gripper_rel),
                desired_gripper_rel: PoseRecord::from(&summary.desired_gripper_rel),
                ik_fail: !summary.found_ik,
                dt: summary.last_dt,
                collision: summary.collision,
            });
        }

        self.phase = match done {
            DoneCode::Continue => Phase::Stepping,
            code => Phase::Terminal(code),
        };
        Ok(StepOutcome {
            observation,
            reward,
            done,
            ik_error_count: self.state.ik_error_count,
        })
    }

    /// Termination code for the current state, see [`calc_done`].
    pub fn calc_done_ret(&self, found_ik: bool, max_allowed_ik_errors: usize) -> DoneCode {
        let done = calc_done(
            self.state.ik_error_count,
            max_allowed_ik_errors,
            found_ik,
            self.get_dist_to_goal(),
            self.get_rot_dist_to_goal(),
            &self.state.thresholds,
        );
        if done != DoneCode::Continue && !self.world.is_analytical() {
            info!("Episode finished with done code {} and {} ik fails", done, self.state.ik_error_count);
        }
        done
    }

    /// Observation of the current state. The planned velocity in it is what the planner
    /// would do next over one training time step (none while paused); the planner does
    /// not advance.
    pub fn build_obs_vector(&mut self) -> Result<Vec<f64>, EnvError> {
        let expected = self.get_obs_dim();
        let planner = self.planner.as_mut().ok_or(EnvError::NotReady("build_obs_vector"))?;
        let slow_down = self.base_calc.slow_down_factor;
        let state = &self.state;

        let query = PlannerQuery {
            time: self.clock.planner_time / slow_down,
            dt: if self.clock.in_start_pause() { 0.0 } else { self.config.time_step_train },
            current_base: state.base,
            current_gripper: state.gripper,
            prev_base_vel: state.planned_base_vel.vel_in_world_frame,
            prev_gripper_vel: state.planned_gripper_vel.vel_in_world_frame,
            prev_gripper_rotation_delta: state.planned_gripper_vel.rotation_delta,
            min_speed: self.config.min_planner_velocity,
            max_speed: self.config.max_planner_velocity,
            advance: false,
        };
        let next = planner.next_plan(&query);
        // Unclamped: the agent sees what the planner intends.
        let planned = planner.transform_to_velocity(&state.gripper, &next.next_gripper_pose, &state.base, 0.0);

        build_observation(
            &ObservationInput {
                base: &state.base,
                gripper_rel: &state.gripper_rel,
                goal: &state.gripper_goal,
                planned_gripper_vel_rel: &planned.vel_in_base_frame,
                planned_rotation_delta: &planned.rotation_delta,
                joints: &state.joints,
            },
            expected,
        )
    }

    /// Return the trace of the episode. If `path` is not empty, also write it into
    /// `<path>_nik<ik_error_count>.json`.
    pub fn export_trace(&self, path: &str) -> anyhow::Result<&EpisodeTrace> {
        if !path.is_empty() {
            #[cfg(feature = "allow_filesystem")]
            {
                let file_name = self.trace.write_json(path, self.state.ik_error_count)?;
                info!("Episode trace written to {}", file_name);
            }
            #[cfg(not(feature = "allow_filesystem"))]
            anyhow::bail!("Cannot write {}: built without filesystem support", path);
        }
        Ok(&self.trace)
    }

    fn run_ticks(&mut self, planner: &mut dyn GripperPlanner, request: &StepRequest) -> TickSummary {
        let paused = self.clock.in_start_pause();
        let analytical = self.world.is_analytical();
        let repeat = if analytical {
            1
        } else {
            action_repeat(self.config.time_step_real_exec, self.rate.cycle_time())
        };
        let slow_down = self.base_calc.slow_down_factor;
        let action = BaseAction::from(request.action);

        let mut summary = TickSummary {
            first_plan: planner.previous_plan(),
            found_ik: true,
            regularization: 0.0,
            desired_base: self.state.base,
            desired_gripper_rel: self.state.gripper_rel,
            command: BaseCommand::default(),
            last_dt: 0.0,
            collision: false,
        };

        for i in 0..repeat {
            let dt = self.tick_dt();
            self.clock.advance(dt, paused);
            summary.last_dt = dt;

            let query = PlannerQuery {
                time: self.clock.planner_time / slow_down,
                dt: dt / slow_down,
                current_base: self.state.base,
                current_gripper: self.state.gripper,
                prev_base_vel: self.state.planned_base_vel.vel_in_world_frame,
                prev_gripper_vel: self.state.planned_gripper_vel.vel_in_world_frame,
                prev_gripper_rotation_delta: self.state.planned_gripper_vel.rotation_delta,
                min_speed: self.config.min_planner_velocity,
                max_speed: self.config.max_planner_velocity,
                advance: !paused,
            };
            let mut plan = planner.next_plan(&query);
            if request.ee_noise_std > MIN_NOISE_STD {
                if let Ok(normal) = Normal::new(0.0, request.ee_noise_std) {
                    let noise = Vector3::new(
                        normal.sample(&mut self.rng),
                        normal.sample(&mut self.rng),
                        normal.sample(&mut self.rng),
                    );
                    plan.next_gripper_pose.translation.vector += noise;
                }
            }
            if i == 0 {
                summary.first_plan = plan;
            }

            // Against the poses before this tick, limited by the base so it can still catch up.
            let limit = self.robot.velocity_limit;
            self.state.planned_gripper_vel = planner.transform_to_velocity(
                &self.state.gripper, &plan.next_gripper_pose, &self.state.base, limit);
            self.state.planned_base_vel = planner.transform_to_velocity(
                &self.state.base, &plan.next_base_pose, &self.state.base, limit);

            if paused {
                plan = planner.previous_plan();
            }
            let desired_gripper = plan.next_gripper_pose;

            let motion = self.base_calc.calc(
                &TickInput {
                    action,
                    planned_base_vel: self.state.planned_base_vel.vel_in_base_frame,
                    planned_base_rotation: plan.next_base_pose.rotation,
                    planned_gripper_vel: self.state.planned_gripper_vel.vel_in_base_frame,
                    current_base: self.state.base,
                    desired_gripper,
                    dt,
                    base_noise_std: request.base_noise_std,
                },
                &mut self.rng,
            );
            summary.regularization += motion.regularization;
            summary.desired_base = motion.desired_base;
            summary.command = motion.command;
            summary.desired_gripper_rel = motion.desired_base.inverse() * desired_gripper;

            summary.found_ik = self.arm.solve(&summary.desired_gripper_rel, IK_TOLERANCE);
            self.state.joints = self.arm.joint_values();

            if !analytical {
                self.rate.sleep();
                self.world.send_arm_command(&self.state.joints, TICK_ARM_DURATION);
                self.world.send_base_command(&self.robot.base_command_topic, &motion.command);
            }
            if !summary.found_ik {
                self.state.ik_error_count += 1;
            }

            self.state.base = if analytical { motion.desired_base } else { self.world.base_pose() };
            self.state.gripper_rel = self.arm.forward();
            self.state.gripper = self.state.base * self.state.gripper_rel;
            summary.collision |= self.arm.collides(&self.state.base);

            let mut flags = SampleFlags::NONE;
            if !summary.found_ik {
                flags |= SampleFlags::IK_FAIL;
            }
            if paused {
                flags |= SampleFlags::PAUSED;
            }
            self.record_sample(&plan, flags);
        }
        summary
    }

    /// One attempt to place the robot. False if the backend could not reach the pose.
    fn set_start_pose(&mut self, base_start: &[f64], mode: StartPoseMode) -> Result<bool, EnvError> {
        if self.world.name() == "world" {
            info!("Real world execution, starting from the current base pose");
            self.state.base = self.world.base_pose();
        } else {
            let (x, y, yaw) = match base_start.len() {
                0 => (0.0, 0.0, 0.0),
                6 => (
                    draw_rng(&mut self.rng, base_start[0], base_start[1])?,
                    draw_rng(&mut self.rng, base_start[2], base_start[3])?,
                    draw_rng(&mut self.rng, base_start[4], base_start[5])?,
                ),
                found => return Err(EnvError::InvalidBaseStart { found }),
            };
            self.state.base = planar_pose(x, y, yaw);
        }

        match mode {
            StartPoseMode::Fixed => self.arm.set_joint_values(&self.robot.neutral_pose),
            StartPoseMode::Rnd | StartPoseMode::RestrictedWs => {
                if !self.sample_arm_configuration(mode == StartPoseMode::RestrictedWs) {
                    return Ok(false);
                }
            }
        }
        self.state.gripper_rel = self.arm.forward();
        self.state.gripper = self.state.base * self.state.gripper_rel;
        self.state.joints = self.arm.joint_values();

        self.world.set_model_pose(&self.robot.name, &self.state.base, &self.robot);
        if self.world.is_analytical() {
            Ok(true)
        } else {
            self.world.send_arm_command(&self.state.joints, START_POSE_ARM_DURATION);
            Ok(self.world.arm_success())
        }
    }

    /// Rejection sampling of a collision free arm configuration.
    fn sample_arm_configuration(&mut self, restricted: bool) -> bool {
        let (z_min, z_max) = self.robot.z_band(true);
        for _ in 0..self.config.max_arm_samples {
            let joints = self.arm.random_joint_values(&mut self.rng);
            self.arm.set_joint_values(&joints);
            if self.arm.collides(&self.state.base) {
                debug!("Drawn start pose in self-collision, trying again");
                continue;
            }
            let z = self.arm.forward().translation.z;
            if restricted && (z < z_min || z > z_max) {
                debug!("Start pose outside of the restricted workspace, trying again");
                continue;
            }
            return true;
        }
        false
    }

    fn sample_goal(&mut self, mode: GoalMode) -> Result<Pose, EnvError> {
        let (z_min, z_max) = self.robot.z_band(mode == GoalMode::RestrictedWs);
        let real_world = self.world.name() == "world";
        let center = if real_world { self.world.base_pose().translation.vector } else { Vector3::zeros() };

        loop {
            let goal_dist = draw_rng(&mut self.rng, self.config.min_goal_dist, self.config.max_goal_dist)?;
            let goal_orientation = self.rng.gen_range(0.0..PI);
            let sign = if self.rng.gen_range(0..=1) == 1 { 1.0 } else { -1.0 };
            let x = center.x + goal_dist * goal_orientation.cos();
            let y = center.y + sign * goal_dist * goal_orientation.sin();
            let z = draw_rng(&mut self.rng, z_min, z_max)?;
            let roll = self.rng.gen_range(0.0..2.0 * PI);
            let pitch = self.rng.gen_range(0.0..2.0 * PI);
            let yaw = self.rng.gen_range(0.0..2.0 * PI);
            let goal = Isometry3::from_parts(
                Translation3::new(x, y, z),
                UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            );

            if !real_world {
                return Ok(goal);
            }
            if self.world.is_within_bounds(&goal) && self.goal_acceptance.accept(&goal) {
                info!("Next gripper goal in world coordinates: ({:.3}, {:.3})", x, y);
                return Ok(goal);
            }
            debug!("Random goal rejected, sampling again");
        }
    }

    fn update_gripper_from_world(&mut self) {
        if let Some(joints) = self.world.joint_values() {
            self.arm.set_joint_values(&joints);
        }
        self.state.joints = self.arm.joint_values();
        self.state.gripper_rel = self.arm.forward();
        self.state.gripper = self.state.base * self.state.gripper_rel;
    }

    fn tip_to_gripper(&self, tip: &Pose) -> Pose {
        tip_to_gripper_goal(tip, &self.robot.tip_to_gripper_offset, &self.robot.gripper_to_base_rotation_offset)
    }

    /// Time step of the next clock update.
    fn tick_dt(&self) -> f64 {
        if self.world.is_analytical() {
            self.config.time_step_train
        } else {
            self.wall_time() - self.clock.time
        }
    }

    fn wall_time(&self) -> f64 {
        self.wall_origin.elapsed().as_secs_f64()
    }

    fn record_sample(&mut self, plan: &GripperPlan, flags: SampleFlags) {
        if !self.verbose {
            return;
        }
        self.trace.trajectory.push(TrajectorySample {
            time: self.clock.episode_time(),
            planned_gripper: PoseRecord::from(&plan.next_gripper_pose),
            planned_base: PoseRecord::planar(&plan.next_base_pose),
            base: PoseRecord::planar(&self.state.base),
            joints: self.state.joints.clone(),
            flags,
        });
    }
}
