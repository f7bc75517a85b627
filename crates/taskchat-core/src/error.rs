use thiserror::Error;

/// Top-level error type for the taskchat system.
///
/// Subsystem crates define their own error types and implement
/// `From<TaskChatError>` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for TaskChatError {
    fn from(err: toml::de::Error) -> Self {
        TaskChatError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for TaskChatError {
    fn from(err: serde_json::Error) -> Self {
        TaskChatError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for taskchat operations.
pub type Result<T> = std::result::Result<T, TaskChatError>;
