#[cfg(test)]
mod tests {
    use crate::episode::{ResetRequest, StepRequest};
    use crate::modulation::Strategy;
    use crate::observation::DoneCode;
    use crate::tests::test_utils::{reset_request, run_episode, sim_controller, NEAR_GOAL, RESET_ERROR, STEP_ERROR};
    use crate::trace::SampleFlags;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    #[test]
    fn test_dirvel_reaches_goal_without_base_motion() {
        let mut env = sim_controller(Strategy::DirVel, 1.5, 0);
        env.reset(&reset_request(&NEAR_GOAL)).expect(RESET_ERROR);

        let (steps, outcome) = run_episode(&mut env, &StepRequest::new([0.0; 3], 10), 60);
        assert_eq!(outcome.done, DoneCode::Success);
        assert_eq!(outcome.ik_error_count, 0);
        // 0.2 m at 0.01 m per step, done within the 0.02 m threshold
        assert!((18..=20).contains(&steps), "{} steps", steps);
        assert_eq!(env.state().base, crate::kinematic_traits::Pose::identity());
        assert!(env.get_dist_to_goal() < 0.02);
    }

    #[test]
    fn test_dirvel_reaches_floor_goal() {
        // Tip goal on the floor 1 m ahead: the gripper travels about 0.9 m down and forward.
        let mut env = sim_controller(Strategy::DirVel, 1.5, 0);
        env.reset(&reset_request(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0])).expect(RESET_ERROR);
        assert_relative_eq!(env.state().gripper_goal.translation.vector, Vector3::new(0.82, 0.0, 0.0), epsilon = 1E-9);

        let (steps, outcome) = run_episode(&mut env, &StepRequest::new([0.0; 3], 10), 150);
        assert_eq!(outcome.done, DoneCode::Success);
        assert_eq!(outcome.ik_error_count, 0);
        assert!((85..=92).contains(&steps), "{} steps", steps);
        assert_eq!(env.state().base, crate::kinematic_traits::Pose::identity());
    }

    #[test]
    fn test_ik_failure_keeps_arm_while_base_moves() {
        let mut env = sim_controller(Strategy::DirVel, 0.35, 0);
        env.reset(&reset_request(&NEAR_GOAL)).expect(RESET_ERROR);

        let outcome = env.step(&StepRequest::new([0.0, 1.0, 0.0], 10)).expect(STEP_ERROR);
        assert_eq!(outcome.ik_error_count, 1);
        assert_eq!(outcome.done, DoneCode::Continue);

        // The arm keeps its configuration, the base drives on and carries the gripper along.
        let state = env.state();
        assert_relative_eq!(state.gripper_rel.translation.vector, Vector3::new(0.4, 0.0, 0.8), epsilon = 1E-12);
        assert_relative_eq!(state.base.translation.vector, Vector3::new(0.02, 0.0, 0.0), epsilon = 1E-9);
        assert_relative_eq!(state.gripper.translation.vector, Vector3::new(0.42, 0.0, 0.8), epsilon = 1E-9);
        let composed = state.base * state.gripper_rel;
        assert_relative_eq!(state.gripper.translation.vector, composed.translation.vector, epsilon = 1E-12);
    }

    #[test]
    fn test_relvelm_base_follows_gripper() {
        let mut env = sim_controller(Strategy::RelVelM, 1.5, 0);
        env.reset(&reset_request(&[1.78, 0.0, 0.8, 0.0, 0.0, 0.0, 1.0])).expect(RESET_ERROR);

        for _ in 0..50 {
            let outcome = env.step(&StepRequest::new([0.0; 3], 10)).expect(STEP_ERROR);
            assert_eq!(outcome.done, DoneCode::Continue);
        }
        // Without an action the base moves with the planned gripper velocity, keeping the
        // gripper where it was relative to the base.
        let state = env.state();
        assert_relative_eq!(state.base.translation.vector, Vector3::new(0.5, 0.0, 0.0), epsilon = 1E-9);
        assert_relative_eq!(state.gripper_rel.translation.vector, Vector3::new(0.4, 0.0, 0.8), epsilon = 1E-9);
        assert_eq!(state.ik_error_count, 0);
    }

    #[test]
    fn test_start_pause_freezes_reference() {
        let mut env = sim_controller(Strategy::DirVel, 1.5, 0);
        let mut request = ResetRequest { verbose: true, ..reset_request(&NEAR_GOAL) };
        request.goal.start_pause = 0.35;
        env.reset(&request).expect(RESET_ERROR);
        let initial = env.trace().trajectory[0].planned_gripper;

        for _ in 0..3 {
            env.step(&StepRequest::new([0.0; 3], 10)).expect(STEP_ERROR);
            assert_relative_eq!(env.state().gripper.translation.x, 0.4, epsilon = 1E-12);
        }
        assert_eq!(env.clock().planner_time, 0.0);
        let trajectory = &env.trace().trajectory;
        assert_eq!(trajectory.len(), 4);
        for sample in &trajectory[1..] {
            assert_eq!(sample.planned_gripper, initial);
            assert!(sample.flags.contains(SampleFlags::PAUSED));
        }

        // Pause over, the reference starts moving.
        env.step(&StepRequest::new([0.0; 3], 10)).expect(STEP_ERROR);
        let last = env.trace().trajectory.last().expect("sample recorded");
        assert!(!last.flags.contains(SampleFlags::PAUSED));
        assert_relative_eq!(last.planned_gripper.x, 0.41, epsilon = 1E-9);
        assert_relative_eq!(env.state().gripper.translation.x, 0.41, epsilon = 1E-9);
    }

    #[test]
    fn test_ik_errors_count_during_pause() {
        // Neutral gripper is 0.4 m out, beyond the reach of this arm.
        let mut env = sim_controller(Strategy::DirVel, 0.35, 0);
        let mut request = ResetRequest { verbose: true, ..reset_request(&NEAR_GOAL) };
        request.goal.start_pause = 0.35;
        env.reset(&request).expect(RESET_ERROR);

        for k in 1..=3 {
            let outcome = env.step(&StepRequest::new([0.0; 3], 10)).expect(STEP_ERROR);
            assert_eq!(outcome.ik_error_count, k);
            assert_relative_eq!(outcome.reward, -1.0);
        }
        let trajectory = &env.trace().trajectory;
        assert!(trajectory[1..].iter()
            .all(|sample| sample.flags.contains(SampleFlags::PAUSED | SampleFlags::IK_FAIL)));
        assert!(env.trace().path_points.iter().all(|point| point.ik_fail));
    }

    #[test]
    fn test_failure_only_after_too_many_ik_errors() {
        let max_allowed = 4;
        let mut env = sim_controller(Strategy::DirVel, 0.35, 0);
        env.reset(&reset_request(&NEAR_GOAL)).expect(RESET_ERROR);

        for _ in 0..8 {
            let outcome = env.step(&StepRequest::new([0.0; 3], max_allowed)).expect(STEP_ERROR);
            let expected = if outcome.ik_error_count > max_allowed { DoneCode::Failure } else { DoneCode::Continue };
            assert_eq!(outcome.done, expected, "after {} errors", outcome.ik_error_count);
        }
        assert_eq!(env.state().ik_error_count, 8);
        assert_eq!(env.calc_done_ret(true, 8), DoneCode::Continue);
        assert_eq!(env.calc_done_ret(true, 7), DoneCode::Failure);
    }

    #[test]
    fn test_new_goal_mid_episode() {
        let mut env = sim_controller(Strategy::DirVel, 1.5, 0);
        env.reset(&reset_request(&NEAR_GOAL)).expect(RESET_ERROR);
        run_episode(&mut env, &StepRequest::new([0.0; 3], 10), 60);

        // Back to the start height, keeping the IK error count of the episode.
        let obs = env.set_gripper_goal(&crate::tests::test_utils::goal_request(&[0.78, 0.0, 1.0, 0.0, 0.0, 0.0]))
            .expect("valid goal");
        assert_relative_eq!(obs[16], 1.0, epsilon = 1E-12);
        assert!(env.get_dist_to_goal() > 0.19);

        let (_, outcome) = run_episode(&mut env, &StepRequest::new([0.0; 3], 10), 60);
        assert_eq!(outcome.done, DoneCode::Success);
        assert_relative_eq!(env.state().gripper.translation.z, 1.0, epsilon = 0.02);
    }
}
