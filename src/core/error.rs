use thiserror::Error;

/// Configuration and programmer errors. These cross the library boundary and
/// are never retried.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("no content grid registered under the name '{0}'")]
    UnknownGrid(String),
    #[error("a content grid named '{0}' is already registered")]
    DuplicateGrid(String),
    #[error("invalid setting '{field}': {reason}")]
    InvalidSetting { field: String, reason: String },
    #[error("grid '{grid}' has no property '{key}'")]
    UnknownProperty { grid: String, key: String },
    #[error("property '{key}' expects a {expected} value")]
    PropertyType { key: String, expected: &'static str },
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse world config: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("failed to serialize world config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl WorldError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        WorldError::InvalidSetting {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Failures inside a generation task. Caught at the worker boundary; the cell
/// falls back to unloaded and is retried on a later tick.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GenerationError {
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("noise field produced a non-finite sample at ({x}, {z})")]
    NonFiniteSample { x: f32, z: f32 },
    #[error("cell would hold {count} instances (limit {limit})")]
    TooManyInstances { count: usize, limit: usize },
    #[error("generation task panicked: {0}")]
    Panicked(String),
}

pub type WorldResult<T> = Result<T, WorldError>;
