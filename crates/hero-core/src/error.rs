use thiserror::Error;

/// A convenience `Result` alias using [`HeroError`].
pub type HeroResult<T> = Result<T, HeroError>;

/// Top-level error type for the Hero coordinator.
///
/// Each variant corresponds to a failure class that can cross a crate
/// boundary. "No agent can take this task yet" is deliberately absent: that
/// is a queued state, not an error.
#[derive(Error, Debug)]
pub enum HeroError {
    /// A submission or request was malformed (empty name, blank capability, bad priority).
    #[error("Validation error: {0}")]
    Validation(String),

    /// An agent or task id is not known to the coordinator.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A snapshot could not be written or read back.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration could not be parsed or is inconsistent.
    #[error("Config error: {0}")]
    Config(String),

    /// The inbound message bridge rejected a message.
    #[error("Bridge error: {0}")]
    Bridge(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HeroError {
    /// Whether the error stems from caller input rather than the coordinator itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HeroError::Validation(_) | HeroError::NotFound(_) | HeroError::Json(_)
        )
    }
}
