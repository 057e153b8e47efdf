#[cfg(test)]
mod tests {
    use crate::controller_config::ControllerConfig;
    use crate::env_error::EnvError;
    use crate::episode::{EpisodeController, GoalMode, GoalRequest, ResetRequest, StepRequest};
    use crate::kinematic_traits::Pose;
    use crate::modulation::Strategy;
    use crate::observation::SuccessThresholds;
    use crate::tests::test_utils::{reset_request, sim_controller, test_arm, test_robot, NEAR_GOAL, RESET_ERROR, STEP_ERROR};
    use crate::utils::planar_pose;
    use crate::world::select_world;
    use crate::world::tests::recording_link;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_start_pose_gives_up_after_trials() {
        let (link, log) = recording_link(0.02);
        log.borrow_mut().arm_success = false;
        let world = select_world("gazebo", true, Some(link)).expect("gazebo");
        let config = ControllerConfig::default().with_strategy(Strategy::DirVel);
        let mut env = EpisodeController::new(test_robot(), config, world, Box::new(test_arm(1.5)));

        let result = env.reset(&reset_request(&NEAR_GOAL));
        assert!(matches!(result, Err(EnvError::StartPoseUnreachable { trials: 50 })));
        let log = log.borrow();
        assert_eq!(log.placements, 50);
        assert_eq!(log.arm_commands.len(), 50);
        assert!(log.arm_commands.iter().all(|(_, duration)| *duration == 5.0));
    }

    #[test]
    fn test_gazebo_step_repeats_action() {
        let mut env = sim_controller(Strategy::DirVel, 1.5, 0);
        let (link, log) = recording_link(0.02);
        env.set_real_execution("gazebo", 0.1, 1.0, true, Some(link)).expect("gazebo");
        assert_eq!(env.world_name(), "gazebo");

        let obs = env.reset(&reset_request(&NEAR_GOAL)).expect(RESET_ERROR);
        assert_eq!(obs.len(), env.get_obs_dim());
        {
            let log = log.borrow();
            assert_eq!(log.placements, 1);
            // Stopped before placing
            assert_eq!(log.base_commands.len(), 1);
            assert_eq!(log.arm_commands.len(), 1);
        }

        // 0.1 s per step at 50 Hz ticks
        let outcome = env.step(&StepRequest::new([0.0, 1.0, 0.0], 10)).expect(STEP_ERROR);
        assert_eq!(outcome.observation.len(), env.get_obs_dim());
        assert_eq!(outcome.ik_error_count, 0);

        let log = log.borrow();
        assert_eq!(log.arm_commands.len(), 1 + 5);
        assert_eq!(log.base_commands.len(), 1 + 5);
        assert!(log.base_commands[1..].iter().all(|command| command.linear_x >= 0.0 && command.angular_z.abs() < 1E-9));
        // The achieved base comes from the robot.
        assert!(log.base.translation.x > 0.0);
        assert_eq!(env.state().base, log.base);
        assert!(env.clock().episode_time() > 0.04);
    }

    #[test]
    fn test_real_world_goals_need_approval() {
        let (link, log) = recording_link(0.02);
        log.borrow_mut().base = planar_pose(0.5, 0.0, 0.0);
        let world = select_world("world", true, Some(link)).expect("real world");
        let config = ControllerConfig { min_goal_dist: 1.0, max_goal_dist: 3.0, ..ControllerConfig::default() }
            .with_strategy(Strategy::DirVel)
            .with_seed(8);

        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut env = EpisodeController::new(test_robot(), config, world, Box::new(test_arm(1.5)))
            .with_goal_acceptance(Box::new(move |_goal: &Pose| {
                counter.set(counter.get() + 1);
                counter.get() > 2
            }));

        let request = ResetRequest {
            goal: GoalRequest { goal_mode: GoalMode::RestrictedWs, ..GoalRequest::default() },
            ..ResetRequest::default()
        };
        env.reset(&request).expect(RESET_ERROR);
        assert_eq!(calls.get(), 3);

        // The real robot stays where it is.
        assert_eq!(log.borrow().placements, 0);
        assert_eq!(env.state().base, planar_pose(0.5, 0.0, 0.0));
        let goal = env.state().gripper_goal.translation.vector;
        assert!(goal.x.abs() < 2.0);
        let horizontal = (goal.xy() - nalgebra::Vector2::new(0.5, 0.0)).norm();
        assert!((1.0..=3.0).contains(&horizontal));
    }

    #[test]
    fn test_failed_goal_sampling_keeps_state() {
        let (link, log) = recording_link(0.02);
        let world = select_world("gazebo", true, Some(link)).expect("gazebo");
        // Random goals cannot be drawn from this range.
        let config = ControllerConfig { min_goal_dist: 2.0, max_goal_dist: 1.0, ..ControllerConfig::default() }
            .with_strategy(Strategy::DirVel);
        let mut env = EpisodeController::new(test_robot(), config, world, Box::new(test_arm(1.5)));
        env.reset(&reset_request(&NEAR_GOAL)).expect(RESET_ERROR);
        let state = env.state().clone();
        let clock = *env.clock();

        // The robot has moved since, but a failed request must not pick that up.
        log.borrow_mut().base = planar_pose(1.0, 0.0, 0.0);
        let request = GoalRequest {
            thresholds: SuccessThresholds { distance: 0.1, rotation: 0.2 },
            ..GoalRequest::default()
        };
        let result = env.set_gripper_goal(&request);
        assert!(matches!(result, Err(EnvError::InvalidRange { .. })));
        assert_eq!(env.state(), &state);
        assert_eq!(env.state().base, Pose::identity());
        assert_eq!(env.state().thresholds, SuccessThresholds::default());
        assert_eq!(env.clock(), &clock);
    }
}
