//! Planner following the attractors of a learned mixture model.
//!
//! The model stores the component means ("attractors") as tool tip poses in the frame of
//! the goal object. They are placed into the world with the goal pose given to the planner
//! and visited in order. The base follows each attractor on the ground plane, kept back by
//! the configured base offset.

use crate::env_error::EnvError;
use crate::kinematic_traits::{MIN_QUATERNION_NORM, Pose};
use crate::path_plan::planner::{step_towards, GripperPlan, GripperPlanner, PlannerQuery};
use crate::utils::{project_to_ground, tip_to_gripper_goal};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};

/// Attractor counts as visited once the planned gripper is this close (meters).
const ATTRACTOR_REACHED: f64 = 1E-4;

/// Mixture model reduced to what the planner needs: the attractor of each component.
/// Built only through [`MixtureModel::new`] or [`MixtureModel::from_yaml_file`], so it
/// always has at least one attractor.
#[derive(Debug, Clone)]
pub struct MixtureModel {
    /// Attractors in the goal frame.
    attractors: Vec<Pose>,
}

#[cfg(feature = "allow_filesystem")]
#[derive(serde::Deserialize)]
struct ModelFile {
    /// Each attractor as [x, y, z, qx, qy, qz, qw]
    mus: Vec<[f64; 7]>,
}

impl MixtureModel {
    pub fn new(attractors: Vec<Pose>) -> Result<Self, EnvError> {
        if attractors.is_empty() {
            return Err(EnvError::ModelFile("model has no components".into()));
        }
        Ok(MixtureModel { attractors })
    }

    pub fn attractors(&self) -> &[Pose] {
        &self.attractors
    }

    /// Read the model from YAML file:
    /// ```yaml
    /// mus:
    ///   - [-0.3, 0.0, 0.1, 0.0, 0.0, 0.0, 1.0]
    ///   - [-0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]
    /// ```
    /// Other entries of the exported model (priors, covariances) are ignored.
    #[cfg(feature = "allow_filesystem")]
    pub fn from_yaml_file(path: &str) -> Result<Self, EnvError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EnvError::ModelFile(format!("{}: {}", path, e)))?;
        let file: ModelFile = serde_saphyr::from_str(&contents)
            .map_err(|e| EnvError::ModelFile(format!("{}: {}", path, e)))?;
        let mut attractors = Vec::with_capacity(file.mus.len());
        for (i, mu) in file.mus.iter().enumerate() {
            let quaternion = Quaternion::new(mu[6], mu[3], mu[4], mu[5]);
            if quaternion.norm() < MIN_QUATERNION_NORM {
                return Err(EnvError::ModelFile(format!("{}: component {} has a zero quaternion", path, i)));
            }
            attractors.push(Isometry3::from_parts(
                Translation3::new(mu[0], mu[1], mu[2]),
                UnitQuaternion::from_quaternion(quaternion),
            ));
        }
        Self::new(attractors)
    }

    #[cfg(not(feature = "allow_filesystem"))]
    pub fn from_yaml_file(path: &str) -> Result<Self, EnvError> {
        Err(EnvError::ModelFile(format!("{}: built without filesystem support", path)))
    }
}

#[derive(Debug, Clone)]
pub struct MixtureModelPlanner {
    /// Attractors of the controlled gripper link, in the world
    gripper_attractors: Vec<Pose>,
    base_attractors: Vec<Pose>,
    /// Last attractor as tool tip pose in the world
    final_tip_attractor: Pose,
    current: usize,
    prev_plan: GripperPlan,
}

impl MixtureModelPlanner {
    /// The `tip_goal` is the pose of the goal object (tool tip frame, before conversion
    /// into the gripper link frame).
    pub fn new(
        tip_to_gripper_offset: &Vector3<f64>,
        gripper_to_base_rot_offset: &UnitQuaternion<f64>,
        tip_goal: &Pose,
        current_gripper: &Pose,
        current_base: &Pose,
        model: &MixtureModel,
        base_offset: f64,
    ) -> Self {
        let tip_attractors: Vec<Pose> = model.attractors().iter().map(|mu| tip_goal * mu).collect();
        let gripper_attractors: Vec<Pose> = tip_attractors.iter()
            .map(|tip| tip_to_gripper_goal(tip, tip_to_gripper_offset, gripper_to_base_rot_offset))
            .collect();
        let base_attractors = gripper_attractors.iter().map(|gripper| {
            let ground = project_to_ground(gripper);
            ground * Translation3::new(-base_offset, 0.0, 0.0)
        }).collect();

        MixtureModelPlanner {
            final_tip_attractor: *tip_attractors.last().unwrap_or(tip_goal),
            gripper_attractors,
            base_attractors,
            current: 0,
            prev_plan: GripperPlan {
                next_gripper_pose: *current_gripper,
                next_base_pose: *current_base,
            },
        }
    }

    pub fn attractors(&self) -> &[Pose] {
        &self.gripper_attractors
    }
}

impl GripperPlanner for MixtureModelPlanner {
    fn next_plan(&mut self, query: &PlannerQuery) -> GripperPlan {
        let last = self.gripper_attractors.len() - 1;
        let mut current = self.current;
        let from = self.prev_plan.next_gripper_pose;
        while current < last
            && (self.gripper_attractors[current].translation.vector - from.translation.vector).norm()
                < ATTRACTOR_REACHED
        {
            current += 1;
        }

        let plan = GripperPlan {
            next_gripper_pose: step_towards(
                &from, &self.gripper_attractors[current], query.dt, query.min_speed, query.max_speed),
            next_base_pose: step_towards(
                &self.prev_plan.next_base_pose, &self.base_attractors[current],
                query.dt, query.min_speed, query.max_speed),
        };
        if query.advance {
            self.current = current;
            self.prev_plan = plan;
        }
        plan
    }

    fn previous_plan(&self) -> GripperPlan {
        self.prev_plan
    }

    fn final_attractor(&self) -> Option<Pose> {
        Some(self.final_tip_attractor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{assert_pose_eq, planar_pose};

    fn query() -> PlannerQuery {
        PlannerQuery {
            time: 0.0,
            dt: 0.1,
            current_base: Pose::identity(),
            current_gripper: Pose::identity(),
            prev_base_vel: Vector3::zeros(),
            prev_gripper_vel: Vector3::zeros(),
            prev_gripper_rotation_delta: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            min_speed: 0.001,
            max_speed: 0.1,
            advance: true,
        }
    }

    fn two_step_model() -> MixtureModel {
        MixtureModel::new(vec![
            Isometry3::from_parts(Translation3::new(-0.2, 0.0, 0.2), UnitQuaternion::identity()),
            Pose::identity(),
        ]).expect("valid model")
    }

    #[test]
    fn test_rejects_empty_model() {
        assert!(matches!(MixtureModel::new(vec![]), Err(EnvError::ModelFile(_))));
        assert_eq!(two_step_model().attractors().len(), 2);
    }

    #[test]
    fn test_visits_attractors_in_order() {
        let goal = Isometry3::from_parts(Translation3::new(1.0, 0.0, 0.5), UnitQuaternion::identity());
        let start = Isometry3::from_parts(Translation3::new(0.8, 0.0, 0.7), UnitQuaternion::identity());
        let mut planner = MixtureModelPlanner::new(
            &Vector3::zeros(), &UnitQuaternion::identity(), &goal, &start,
            &Pose::identity(), &two_step_model(), 0.0);

        // Starts right at the first attractor, so heads for the second one immediately.
        let plan = planner.next_plan(&query());
        assert!(plan.next_gripper_pose.translation.x > 0.8);
        assert!(plan.next_gripper_pose.translation.z < 0.7);

        for _ in 0..100 {
            planner.next_plan(&query());
        }
        assert_pose_eq(&planner.previous_plan().next_gripper_pose, &goal, 1E-9, 1E-9);
        assert_pose_eq(&planner.final_attractor().expect("has attractor"), &goal, 1E-12, 1E-12);
    }

    #[test]
    fn test_base_stays_behind_gripper() {
        let goal = Isometry3::from_parts(Translation3::new(1.0, 0.0, 0.5), UnitQuaternion::identity());
        let model = MixtureModel::new(vec![Pose::identity()]).expect("valid model");
        let planner = MixtureModelPlanner::new(
            &Vector3::zeros(), &UnitQuaternion::identity(), &goal, &Pose::identity(),
            &planar_pose(0.0, 0.0, 0.0), &model, 0.3);
        assert_pose_eq(&planner.base_attractors[0], &planar_pose(0.7, 0.0, 0.0), 1E-12, 1E-12);
        assert_eq!(planner.attractors().len(), 1);
    }
}
