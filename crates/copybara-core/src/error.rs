use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid author '{0}': expected 'Name <email>'")]
    InvalidAuthor(String),

    #[error("{0}")]
    InvalidAuthoring(String),

    #[error("label name '{0}' is not valid")]
    InvalidLabelName(String),

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("invalid identity template '{template}': {reason}")]
    InvalidIdentityTemplate { template: String, reason: String },
}
