//! Blending of the planned base motion with the agent's actions.
//!
//! Every control tick, the planned gripper and base velocities are turned into a desired
//! base pose and a base velocity command by one of the [`Strategy`] variants. The strategy
//! is chosen once when the controller is built.

use crate::env_error::EnvError;
use crate::kinematic_traits::Pose;
use crate::utils::{clamp, norm_scale_vel, rpy_angle_diff, yaw};
use nalgebra::{Isometry3, SVector, Translation3, UnitQuaternion, Vector3};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use std::fmt;
use std::str::FromStr;

/// Joint pose (or speed) of gripper and base: gripper [x, y, z, qx, qy, qz, qw]
/// followed by base [x, y, z, qx, qy, qz, qw].
pub type CombinedState = SVector<f64, 14>;

/// Base rotation speed seeded into the modulation so it has a direction to deflect.
const MODULATION_BASE_ROT_SPEED: f64 = 0.0001;

/// Gain applied to the rotation returned by the modulation.
const MODULATION_ROT_GAIN: f64 = 10.0;

/// Below this time step the command is not rescaled to unit time.
const MIN_COMMAND_DT: f64 = 0.001;

/// Base noise below this standard deviation is treated as off.
const MIN_NOISE_STD: f64 = 0.0001;

/// How the base velocity is derived in each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Planner velocities deflected around obstacles by a dynamical system.
    ModulateEllipse,
    /// Planner base velocity as is.
    Unmodulated,
    /// Planned gripper velocity plus agent offset, penalizing the size of the offset.
    RelVelM,
    /// Planned gripper velocity plus agent offset, penalizing the resulting speed.
    RelVelD,
    /// Agent velocity only.
    DirVel,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::ModulateEllipse => "modulate_ellipse",
            Strategy::Unmodulated => "unmodulated",
            Strategy::RelVelM => "relvelm",
            Strategy::RelVelD => "relveld",
            Strategy::DirVel => "dirvel",
        }
    }
}

impl FromStr for Strategy {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "modulate_ellipse" => Ok(Strategy::ModulateEllipse),
            "unmodulated" => Ok(Strategy::Unmodulated),
            "relvelm" => Ok(Strategy::RelVelM),
            "relveld" => Ok(Strategy::RelVelD),
            "dirvel" => Ok(Strategy::DirVel),
            _ => Err(EnvError::UnsupportedStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Dynamical-system obstacle avoidance. Gets the combined gripper and base pose and
/// modulates the combined speed in place.
pub trait ObstacleModulation {
    fn modulate(&mut self, pose: &CombinedState, speed: &mut CombinedState);
}

/// Modulation for an empty scene: the speed is left as planned.
#[derive(Debug, Default, Clone, Copy)]
pub struct FreeSpace;

impl ObstacleModulation for FreeSpace {
    fn modulate(&mut self, _pose: &CombinedState, _speed: &mut CombinedState) {}
}

/// Agent action for the base, each component expected in [-1, 1]. Layout of the action
/// vector is [rotation, x, y].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BaseAction {
    pub rotation: f64,
    pub x: f64,
    pub y: f64,
}

impl From<[f64; 3]> for BaseAction {
    fn from(a: [f64; 3]) -> Self {
        BaseAction { rotation: a[0], x: a[1], y: a[2] }
    }
}

impl BaseAction {
    fn sum_of_squares(&self) -> f64 {
        self.rotation.powi(2) + self.x.powi(2) + self.y.powi(2)
    }
}

/// Base velocity command in the base frame, per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct BaseCommand {
    pub linear_x: f64,
    pub linear_y: f64,
    pub angular_z: f64,
}

/// Inputs of one tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInput {
    pub action: BaseAction,
    /// Planned base motion in the base frame, per tick
    pub planned_base_vel: Vector3<f64>,
    /// Orientation the planner wants the base to have
    pub planned_base_rotation: UnitQuaternion<f64>,
    /// Planned gripper motion in the base frame, per tick
    pub planned_gripper_vel: Vector3<f64>,
    pub current_base: Pose,
    pub desired_gripper: Pose,
    pub dt: f64,
    pub base_noise_std: f64,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy)]
pub struct BaseMotion {
    pub desired_base: Pose,
    pub command: BaseCommand,
    /// Regularization to add to the episode step
    pub regularization: f64,
}

/// Computes the desired base motion according to the strategy and the robot's limits.
pub struct BaseCommandCalculator {
    pub strategy: Strategy,
    /// Meters per second
    pub velocity_limit: f64,
    /// Radians per second
    pub rotation_rate_limit: f64,
    /// Planned velocities are scaled by this (1.0 if execution is analytical).
    pub slow_down_factor: f64,
    pub modulation: Box<dyn ObstacleModulation>,
}

impl fmt::Debug for BaseCommandCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseCommandCalculator")
            .field("strategy", &self.strategy)
            .field("velocity_limit", &self.velocity_limit)
            .field("rotation_rate_limit", &self.rotation_rate_limit)
            .field("slow_down_factor", &self.slow_down_factor)
            .finish()
    }
}

impl BaseCommandCalculator {
    pub fn new(strategy: Strategy, velocity_limit: f64, rotation_rate_limit: f64) -> Self {
        BaseCommandCalculator {
            strategy,
            velocity_limit,
            rotation_rate_limit,
            slow_down_factor: 1.0,
            modulation: Box::new(FreeSpace),
        }
    }

    pub fn with_modulation(mut self, modulation: Box<dyn ObstacleModulation>) -> Self {
        self.modulation = modulation;
        self
    }

    /// Desired base pose and command for this tick. Noise, if any, is drawn from `rng`.
    pub fn calc(&mut self, input: &TickInput, rng: &mut StdRng) -> BaseMotion {
        let planned_base_vel = input.planned_base_vel * self.slow_down_factor;
        let planned_gripper_vel = input.planned_gripper_vel * self.slow_down_factor;
        let current = &input.current_base;
        let action = &input.action;

        // Planner moves per tick, agent actions are per unit time.
        let rot_limit_t = input.dt * self.rotation_rate_limit;
        let vel_limit_t = input.dt * self.velocity_limit;

        let mut regularization = 0.0;
        let (mut base_vel, mut base_rotation) = match self.strategy {
            Strategy::ModulateEllipse => {
                let base_vel_wf = current.rotation * planned_base_vel;
                let gripper_vel_wf = current.rotation * planned_gripper_vel;

                let mut speed = CombinedState::zeros();
                speed[0] = gripper_vel_wf.x;
                speed[1] = gripper_vel_wf.y;
                speed[7] = base_vel_wf.x;
                speed[8] = base_vel_wf.y;
                speed[12] = MODULATION_BASE_ROT_SPEED;
                let pose = combined_pose(&input.desired_gripper, current);
                self.modulation.modulate(&pose, &mut speed);

                let base_vel_rf = current.rotation.inverse() * Vector3::new(speed[7], speed[8], 0.0);
                (
                    Vector3::new(base_vel_rf.x, base_vel_rf.y, 0.0),
                    clamp(speed[12] * MODULATION_ROT_GAIN, -rot_limit_t, rot_limit_t),
                )
            }
            Strategy::Unmodulated => {
                // Gripper z keeps the base from outrunning the gripper once the norm is capped.
                let vel = Vector3::new(planned_base_vel.x, planned_base_vel.y, planned_gripper_vel.z);
                let angle_diff = rpy_angle_diff(yaw(&input.planned_base_rotation), yaw(&current.rotation));
                (vel, clamp(angle_diff, -rot_limit_t, rot_limit_t))
            }
            Strategy::RelVelM | Strategy::RelVelD => {
                let vel = Vector3::new(
                    planned_gripper_vel.x + vel_limit_t * action.x,
                    planned_gripper_vel.y + vel_limit_t * action.y,
                    0.0,
                );
                if self.strategy == Strategy::RelVelM {
                    regularization += action.sum_of_squares();
                } else {
                    let denom = if vel_limit_t.abs() < 0.000001 { 1.0 } else { vel_limit_t };
                    regularization += action.rotation.powi(2) + (vel.norm() / denom).powi(2);
                }
                (vel, rot_limit_t * action.rotation)
            }
            Strategy::DirVel => {
                regularization += action.sum_of_squares();
                (
                    Vector3::new(vel_limit_t * action.x, vel_limit_t * action.y, 0.0),
                    rot_limit_t * action.rotation,
                )
            }
        };

        base_vel = norm_scale_vel(base_vel, 0.0, vel_limit_t);
        base_vel.z = 0.0;

        if input.base_noise_std > MIN_NOISE_STD {
            if let Ok(normal) = Normal::new(0.0, input.base_noise_std) {
                base_vel.x += normal.sample(rng);
                base_vel.y += normal.sample(rng);
                base_rotation += normal.sample(rng);
            }
        }

        let desired_base = apply_base_motion(current, &base_vel, base_rotation);
        BaseMotion {
            desired_base,
            command: base_command(current, &desired_base, input.dt),
            regularization,
        }
    }
}

/// Translate the base by the velocity (base frame) and turn it about the world z axis.
pub fn apply_base_motion(current: &Pose, base_vel: &Vector3<f64>, rotation: f64) -> Pose {
    let base_vel_world = current.rotation * base_vel;
    let turn = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), rotation);
    Isometry3::from_parts(
        Translation3::from(current.translation.vector + base_vel_world),
        turn * current.rotation,
    )
}

/// Motion from the current into the desired pose, in the current base frame and per second.
pub fn base_command(current: &Pose, desired: &Pose, dt: f64) -> BaseCommand {
    let scaling = if dt > MIN_COMMAND_DT { 1.0 / dt } else { 1.0 };
    let relative = current.inverse() * desired;
    BaseCommand {
        linear_x: relative.translation.x * scaling,
        linear_y: relative.translation.y * scaling,
        angular_z: yaw(&relative.rotation) * scaling,
    }
}

fn combined_pose(gripper: &Pose, base: &Pose) -> CombinedState {
    let mut pose = CombinedState::zeros();
    for (offset, p) in [(0, gripper), (7, base)] {
        let t = p.translation.vector;
        let q = p.rotation;
        pose[offset] = t.x;
        pose[offset + 1] = t.y;
        pose[offset + 2] = t.z;
        pose[offset + 3] = q.i;
        pose[offset + 4] = q.j;
        pose[offset + 5] = q.k;
        pose[offset + 6] = q.w;
    }
    pose
}
