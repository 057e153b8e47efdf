use anyhow::{Context, Result};
use clap::Parser;
use rs_modulation_rl::controller_config::ControllerConfig;
use rs_modulation_rl::episode::{EpisodeController, GoalMode, GoalRequest, ResetRequest, StartPoseMode, StepRequest};
use rs_modulation_rl::kinematics_impl::CartesianArm;
use rs_modulation_rl::modulation::Strategy;
use rs_modulation_rl::observation::{DoneCode, SuccessThresholds};
use rs_modulation_rl::parameters::robot::RobotConfig;
use rs_modulation_rl::world::SimWorld;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs episodes in the analytical world with a constant base action.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Robot preset (pr2, tiago, hsr)
    #[arg(long, default_value = "pr2")]
    robot: String,

    /// Robot configuration YAML file, overrides the preset
    #[arg(long)]
    robot_file: Option<String>,

    /// Base modulation strategy
    #[arg(long, default_value = "dirvel")]
    strategy: String,

    /// Goal distribution for random goals (rnd, restricted_ws)
    #[arg(long, default_value = "restricted_ws")]
    goal_mode: String,

    /// Start pose distribution (fixed, rnd, restricted_ws)
    #[arg(long, default_value = "fixed")]
    start_pose_mode: String,

    /// Explicit gripper goal, 6 (RPY) or 7 (quaternion) values
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    goal: Vec<f64>,

    /// Mixture model YAML file to plan with
    #[arg(long)]
    model: Option<String>,

    /// Constant base action [rotation, x, y]
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, default_value = "0,0,0")]
    action: Vec<f64>,

    #[arg(long, default_value_t = 3)]
    episodes: usize,

    #[arg(long, default_value_t = 600)]
    max_steps: usize,

    #[arg(long, default_value_t = 100)]
    max_ik_errors: usize,

    #[arg(long, default_value_t = 0.0)]
    start_pause: f64,

    /// Horizontal reach of the reference arm, meters
    #[arg(long, default_value_t = 1.2)]
    reach: f64,

    #[arg(long, default_value_t = 1.0)]
    min_goal_dist: f64,

    #[arg(long, default_value_t = 2.0)]
    max_goal_dist: f64,

    #[arg(long, default_value_t = 0.0)]
    penalty_scaling: f64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write the trace of each episode to <prefix>_<episode>_nik<ik errors>.json
    #[arg(long)]
    trace: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let robot = match &args.robot_file {
        Some(path) => RobotConfig::from_yaml_file(path)?,
        None => RobotConfig::by_name(&args.robot)
            .with_context(|| format!("Unknown robot preset {}", args.robot))?,
    };
    let strategy: Strategy = args.strategy.parse()?;
    let goal_mode: GoalMode = args.goal_mode.parse()?;
    let start_pose_mode: StartPoseMode = args.start_pose_mode.parse()?;
    let action: [f64; 3] = args.action.as_slice().try_into()
        .with_context(|| format!("Action needs 3 values, got {}", args.action.len()))?;

    let config = ControllerConfig {
        seed: args.seed,
        min_goal_dist: args.min_goal_dist,
        max_goal_dist: args.max_goal_dist,
        penalty_scaling: args.penalty_scaling,
        ..ControllerConfig::default()
    }
    .with_strategy(strategy);

    let arm = CartesianArm::for_robot(&robot, args.reach);
    let mut env = EpisodeController::new(robot, config, Box::new(SimWorld::default()), Box::new(arm));
    let reset = ResetRequest {
        goal: GoalRequest {
            goal: args.goal.clone(),
            goal_mode,
            planner_model_path: args.model.clone(),
            thresholds: SuccessThresholds::default(),
            start_pause: args.start_pause,
        },
        start_pose_mode,
        verbose: args.trace.is_some(),
        ..ResetRequest::default()
    };
    let step = StepRequest::new(action, args.max_ik_errors);

    for episode in 0..args.episodes {
        env.reset(&reset)?;
        let mut total_reward = 0.0;
        let mut steps = 0;
        let mut done = DoneCode::Continue;
        while steps < args.max_steps && done == DoneCode::Continue {
            let outcome = env.step(&step)?;
            total_reward += outcome.reward;
            done = outcome.done;
            steps += 1;
        }
        info!(
            "Episode {}: done {} after {} steps, {} ik errors, distance {:.3}, reward {:.3}",
            episode, done, steps, env.state().ik_error_count, env.get_dist_to_goal(), total_reward
        );
        if let Some(prefix) = &args.trace {
            env.export_trace(&format!("{}_{}", prefix, episode))?;
        }
    }
    Ok(())
}
