use thiserror::Error;

/// Main error type for the blackbox bridge.
///
/// Every variant is fatal at the bridge layer: nothing is retried, and a run
/// that hits one of these terminates with the error as its cause.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Evaluation of point {index} failed: {message}")]
    PointEvaluation { index: usize, message: String },

    #[error("Worker pool failure: {message}")]
    WorkerPool { message: String },

    #[error("Recorder failure: {message}")]
    Recorder { message: String },

    #[error("Configuration mismatch: expected dimension {expected}, got {actual}")]
    ConfigurationMismatch { expected: usize, actual: usize },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Evaluator returned {actual} outcomes for a block of {expected} points")]
    OutcomeCountMismatch { expected: usize, actual: usize },

    #[error("Engine submitted an empty block")]
    EmptyBlock,

    #[error("Run aborted after an earlier block failure")]
    RunAborted,

    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether the failure came from a single blackbox evaluation, as opposed
    /// to the machinery around it (pool, recorder, configuration).
    pub fn is_point_failure(&self) -> bool {
        matches!(self, BridgeError::PointEvaluation { .. })
    }
}

/// Result type alias for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! invalid_config {
    ($($arg:tt)*) => {
        $crate::BridgeError::InvalidConfig { message: format!($($arg)*) }
    };
}

/// Macro for creating engine errors
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {
        $crate::BridgeError::Engine { message: format!($($arg)*) }
    };
}
