use copybara_core::error::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    /// User or configuration problem. Never retried.
    #[error("{0}")]
    Validation(String),

    #[error("Workflow '{workflow}' is not reversible:\n{diff}")]
    NotReversible { workflow: String, diff: String },

    #[error("{0}")]
    NonReversibleTransform(String),

    #[error("{0}")]
    NotADestinationFile(String),

    /// Origin or destination failure.
    #[error("{0}")]
    Repo(String),

    #[error("{message}")]
    CannotResolveRevision {
        message: String,
        #[source]
        source: Option<Box<WorkflowError>>,
    },

    /// The migration would not change the destination.
    #[error("{0}")]
    EmptyChange(String),

    #[error("{0}")]
    CommandLine(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("io error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Broad error classes, used to pick a process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Repository,
    NoOp,
    CommandLine,
    Environment,
    Internal,
}

impl WorkflowError {
    pub fn cannot_resolve(message: impl Into<String>) -> Self {
        Self::CannotResolveRevision {
            message: message.into(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_)
            | Self::NotReversible { .. }
            | Self::NonReversibleTransform(_)
            | Self::NotADestinationFile(_)
            | Self::Core(_) => ErrorKind::Configuration,
            Self::Repo(_) | Self::CannotResolveRevision { .. } => ErrorKind::Repository,
            Self::EmptyChange(_) => ErrorKind::NoOp,
            Self::CommandLine(_) => ErrorKind::CommandLine,
            Self::Io(_) | Self::Walk(_) => ErrorKind::Environment,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Errors caused by the user rather than the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::CommandLine)
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
