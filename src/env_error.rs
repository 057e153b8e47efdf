//! Error handling for the episode controller

/// Unified error for configuration and programming errors of the controller.
/// IK failures during an episode are not errors; they are counted and reported
/// through the done code.
#[derive(Debug)]
pub enum EnvError {
    /// Explicit goal must be [x, y, z, roll, pitch, yaw] or [x, y, z, qx, qy, qz, qw]
    InvalidGoalFormat { found: usize },
    /// Explicit goal quaternion with (near) zero norm
    ZeroGoalQuaternion,
    /// Base start range must be [xmin, xmax, ymin, ymax, yawmin, yawmax] or empty
    InvalidBaseStart { found: usize },
    UnsupportedStrategy(String),
    UnsupportedGoalMode(String),
    UnsupportedStartPoseMode(String),
    /// Sampling range with lower > upper
    InvalidRange { lower: f64, upper: f64 },
    ObservationLength { expected: usize, found: usize },
    StartPoseUnreachable { trials: usize },
    UnknownBackend(String),
    ControllersRequired(String),
    NotImplemented(&'static str),
    /// Operation requires a goal (and planner) to be set first
    NotReady(&'static str),
    ModelFile(String),
}

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            EnvError::InvalidGoalFormat { found } =>
                write!(f, "Invalid gripper goal: expected 6 (RPY) or 7 (quaternion) values, found {}", found),
            EnvError::ZeroGoalQuaternion =>
                write!(f, "Invalid gripper goal: quaternion has zero norm"),
            EnvError::InvalidBaseStart { found } =>
                write!(f, "Invalid base start range: expected 6 values, found {}", found),
            EnvError::UnsupportedStrategy(ref name) =>
                write!(f, "Unsupported modulation strategy: {}", name),
            EnvError::UnsupportedGoalMode(ref name) =>
                write!(f, "Unsupported gripper goal distribution: {}", name),
            EnvError::UnsupportedStartPoseMode(ref name) =>
                write!(f, "Unsupported start pose distribution: {}", name),
            EnvError::InvalidRange { lower, upper } =>
                write!(f, "Invalid sampling range: lower {} > upper {}", lower, upper),
            EnvError::ObservationLength { expected, found } =>
                write!(f, "Observation length mismatch: expected {}, found {}", expected, found),
            EnvError::StartPoseUnreachable { trials } =>
                write!(f, "Could not set start pose after {} trials", trials),
            EnvError::UnknownBackend(ref name) =>
                write!(f, "Unknown execution backend: {}", name),
            EnvError::ControllersRequired(ref name) =>
                write!(f, "Backend {} requires initialised controllers", name),
            EnvError::NotImplemented(what) =>
                write!(f, "Not implemented: {}", what),
            EnvError::NotReady(what) =>
                write!(f, "No gripper goal set before {}", what),
            EnvError::ModelFile(ref msg) =>
                write!(f, "Model file error: {}", msg),
        }
    }
}

impl std::error::Error for EnvError {}
