/// Result alias that carries the custom [`VectorScopeError`] type.
pub type Result<T> = std::result::Result<T, VectorScopeError>;

/// Common error type for the core crate.
///
/// Numeric degeneracy and "no audio yet" are not errors: both are
/// handled in place and degrade to a neutral value or an empty frame.
#[derive(Debug, thiserror::Error)]
pub enum VectorScopeError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// A configuration value was rejected at the boundary. The previously
    /// applied configuration stays in effect.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A shared lock was poisoned by a thread that panicked while holding it.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around configuration (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl VectorScopeError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for VectorScopeError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VectorScopeError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
