use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConcordError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Invalid arguments for stage '{stage}': {reason}")]
    InvalidStageArgs { stage: String, reason: String },

    #[error("Stage '{0}' is already configured on this engine")]
    DuplicateStage(String),

    #[error("Stage '{stage}' requires a {collaborator} but none was provided")]
    MissingCollaborator { stage: String, collaborator: &'static str },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),

    #[error("Collaborator call timed out after {0} ms")]
    Timeout(u64),

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConcordError {
    /// True for errors raised while building a pipeline, as opposed to
    /// failures absorbed at a stage boundary during `reconcile`.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ConcordError::UnknownStage(_)
                | ConcordError::InvalidStageArgs { .. }
                | ConcordError::DuplicateStage(_)
                | ConcordError::MissingCollaborator { .. }
                | ConcordError::Config(_)
        )
    }

    pub fn invalid_args(stage: &str, reason: impl Into<String>) -> Self {
        ConcordError::InvalidStageArgs {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConcordError>;
