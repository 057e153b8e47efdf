use crate::kinematic_traits::Pose;
use crate::path_plan::planner::{step_towards, GripperPlan, GripperPlanner, PlannerQuery};

/// Plans straight-line motion of both the gripper and the base toward their goals, at the
/// highest speed the query allows. Each plan continues from the previous committed plan
/// rather than from the achieved pose, so IK failures do not stall the reference.
#[derive(Debug, Clone)]
pub struct LinearPlanner {
    gripper_goal: Pose,
    base_goal: Pose,
    prev_plan: GripperPlan,
}

impl LinearPlanner {
    pub fn new(gripper_goal: Pose, current_gripper: Pose, base_goal: Pose, current_base: Pose) -> Self {
        LinearPlanner {
            gripper_goal,
            base_goal,
            prev_plan: GripperPlan {
                next_gripper_pose: current_gripper,
                next_base_pose: current_base,
            },
        }
    }
}

impl GripperPlanner for LinearPlanner {
    fn next_plan(&mut self, query: &PlannerQuery) -> GripperPlan {
        let plan = GripperPlan {
            next_gripper_pose: step_towards(
                &self.prev_plan.next_gripper_pose,
                &self.gripper_goal,
                query.dt,
                query.min_speed,
                query.max_speed,
            ),
            next_base_pose: step_towards(
                &self.prev_plan.next_base_pose,
                &self.base_goal,
                query.dt,
                query.min_speed,
                query.max_speed,
            ),
        };
        if query.advance {
            self.prev_plan = plan;
        }
        plan
    }

    fn previous_plan(&self) -> GripperPlan {
        self.prev_plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::planar_pose;
    use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};

    fn query(dt: f64, advance: bool) -> PlannerQuery {
        PlannerQuery {
            time: 0.0,
            dt,
            current_base: Pose::identity(),
            current_gripper: Pose::identity(),
            prev_base_vel: Vector3::zeros(),
            prev_gripper_vel: Vector3::zeros(),
            prev_gripper_rotation_delta: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            min_speed: 0.001,
            max_speed: 0.1,
            advance,
        }
    }

    #[test]
    fn test_traverses_one_meter_in_hundred_steps() {
        let start = Isometry3::from_parts(Translation3::new(0.0, 0.0, 0.7), UnitQuaternion::identity());
        let goal = Isometry3::from_parts(Translation3::new(1.0, 0.0, 0.7), UnitQuaternion::identity());
        let mut planner = LinearPlanner::new(goal, start, planar_pose(1.0, 0.0, 0.0), Pose::identity());

        for _ in 0..99 {
            planner.next_plan(&query(0.1, true));
        }
        let almost = planner.previous_plan().next_gripper_pose;
        assert!((almost.translation.x - 0.99).abs() < 1E-9);

        let plan = planner.next_plan(&query(0.1, true));
        assert!((plan.next_gripper_pose.translation.vector - goal.translation.vector).norm() < 1E-9);
        assert!((plan.next_base_pose.translation.x - 1.0).abs() < 1E-9);
    }

    #[test]
    fn test_query_without_advance_does_not_commit() {
        let goal = planar_pose(1.0, 0.0, 0.0);
        let mut planner = LinearPlanner::new(goal, Pose::identity(), goal, Pose::identity());
        let plan = planner.next_plan(&query(0.1, false));
        assert!(plan.next_gripper_pose.translation.x > 0.0);
        assert_eq!(planner.previous_plan().next_gripper_pose, Pose::identity());
        assert_eq!(planner.final_attractor(), None);
    }
}
