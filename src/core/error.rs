use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Path '{path}' does not resolve: {reason}")]
    PathResolution { path: String, reason: String },

    #[error("Unknown [modify_ai] action: '{0}'")]
    UnknownAction(String),

    #[error("Lifecycle order error: {0}")]
    LifecycleOrder(&'static str),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AiError {
    pub fn path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AiError::PathResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AiError>;
