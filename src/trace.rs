//! Episode trace: one [`PathPoint`] per step and one [`TrajectorySample`] per control tick.
//! Only recorded in verbose mode.

use crate::kinematic_traits::{Joints, Pose};
use crate::modulation::BaseCommand;
use bitflags::bitflags;
use serde::{Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Flags of the trajectory samples
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SampleFlags: u32 {
        const NONE = 0b0000_0000;

        /// First sample of the episode, recorded at reset before any step.
        const INITIAL = 0b0000_0001;

        /// The inverse kinematics failed in this tick; the arm kept its joints.
        const IK_FAIL = 0b0000_0010;

        /// The tick happened within the start pause, setpoints were frozen.
        const PAUSED = 0b0000_0100;
    }
}

fn serialize_flags<S: Serializer>(flags: &SampleFlags, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u32(flags.bits())
}

/// Pose flattened as [x, y, z, qx, qy, qz, qw].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PoseRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub qw: f64,
}

impl PoseRecord {
    /// Base poses are recorded on the ground plane.
    pub fn planar(pose: &Pose) -> Self {
        PoseRecord { z: 0.0, ..PoseRecord::from(pose) }
    }
}

impl From<&Pose> for PoseRecord {
    fn from(pose: &Pose) -> Self {
        let t = pose.translation.vector;
        let q = pose.rotation;
        PoseRecord { x: t.x, y: t.y, z: t.z, qx: q.i, qy: q.j, qz: q.k, qw: q.w }
    }
}

impl fmt::Display for PoseRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.4}, {:.4}, {:.4}] quat [{:.4}, {:.4}, {:.4}, {:.4}]",
               self.x, self.y, self.z, self.qx, self.qy, self.qz, self.qw)
    }
}

/// Summary of one `step` call.
#[derive(Debug, Clone, Serialize)]
pub struct PathPoint {
    /// Plan of the first tick of the step
    pub planned_gripper: PoseRecord,
    pub planned_base: PoseRecord,
    /// Achieved after the last tick
    pub base: PoseRecord,
    pub desired_base: PoseRecord,
    /// Velocity command of the last tick
    pub base_command: BaseCommand,
    pub gripper: PoseRecord,
    pub gripper_rel: PoseRecord,
    pub desired_gripper_rel: PoseRecord,
    pub ik_fail: bool,
    pub dt: f64,
    pub collision: bool,
}

/// Robot state after a control tick.
#[derive(Debug, Clone, Serialize)]
pub struct TrajectorySample {
    /// Seconds since the episode was reset
    pub time: f64,
    pub planned_gripper: PoseRecord,
    pub planned_base: PoseRecord,
    pub base: PoseRecord,
    pub joints: Joints,
    #[serde(serialize_with = "serialize_flags")]
    pub flags: SampleFlags,
}

/// Trace of the current episode. `marker` cycles 0..=3 over episodes so that consecutive
/// episodes can be told apart when displayed together.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeTrace {
    pub marker: u32,
    pub path_points: Vec<PathPoint>,
    pub trajectory: Vec<TrajectorySample>,
}

/// Highest marker value before it wraps around to 0.
pub const MAX_MARKER: u32 = 3;

impl EpisodeTrace {
    /// Drop the recorded data and advance the marker.
    pub fn restart(&mut self) {
        self.path_points.clear();
        self.trajectory.clear();
        self.marker = if self.marker >= MAX_MARKER { 0 } else { self.marker + 1 };
    }

    /// Write the trace as JSON into `<prefix>_nik<ik_error_count>.json` and return the file name.
    #[cfg(feature = "allow_filesystem")]
    pub fn write_json(&self, prefix: &str, ik_error_count: usize) -> anyhow::Result<String> {
        use anyhow::Context;
        let file_name = format!("{}_nik{}.json", prefix, ik_error_count);
        let file = std::fs::File::create(&file_name)
            .with_context(|| format!("Cannot create trace file {}", file_name))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), self)
            .with_context(|| format!("Cannot write trace file {}", file_name))?;
        Ok(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::planar_pose;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion};

    #[test]
    fn test_marker_cycles() {
        let mut trace = EpisodeTrace::default();
        let markers: Vec<u32> = (0..6).map(|_| {
            trace.restart();
            trace.marker
        }).collect();
        assert_eq!(markers, vec![1, 2, 3, 0, 1, 2]);
    }

    #[test]
    fn test_planar_record_drops_height() {
        let pose = Isometry3::from_parts(Translation3::new(1.0, 2.0, 0.3), UnitQuaternion::identity());
        let record = PoseRecord::planar(&pose);
        assert_eq!(record.z, 0.0);
        assert_eq!(record.qw, 1.0);
        assert_eq!(PoseRecord::from(&planar_pose(1.0, 2.0, 0.0)), record);
    }

    #[cfg(feature = "allow_filesystem")]
    #[test]
    fn test_json_export() {
        let mut trace = EpisodeTrace::default();
        trace.trajectory.push(TrajectorySample {
            time: 0.1,
            planned_gripper: PoseRecord::from(&Pose::identity()),
            planned_base: PoseRecord::from(&Pose::identity()),
            base: PoseRecord::from(&Pose::identity()),
            joints: vec![0.5, 0.25],
            flags: SampleFlags::IK_FAIL | SampleFlags::PAUSED,
        });
        let prefix = std::env::temp_dir().join("modulation_trace_test");
        let prefix = prefix.to_string_lossy();
        let file_name = trace.write_json(&prefix, 3).expect("trace written");
        assert!(file_name.ends_with("_nik3.json"));

        let contents = std::fs::read_to_string(&file_name).expect("trace readable");
        let value: serde_json::Value = serde_json::from_str(&contents).expect("valid json");
        assert_eq!(value["trajectory"][0]["flags"], 6);
        assert_eq!(value["trajectory"][0]["joints"][1], 0.25);
        let _ = std::fs::remove_file(&file_name);
    }
}
