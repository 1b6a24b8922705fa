use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::services::orchestration::PipelineStage;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(#[from] ConfigError),
    #[error("Workspace Error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("Job Error: {0}")]
    Job(#[from] JobError),
    #[error("Failed to join job task: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Fatal errors: the only failures a job caller ever sees.
#[derive(Error, Debug, Clone)]
pub enum JobError {
    #[error("{0}")]
    Acquisition(#[from] AcquisitionError),
    #[error("Background removal fallback exhausted: {0}")]
    FallbackExhausted(#[from] RemoverUnavailable),
    #[error("Product identification failed: {0}")]
    Identification(ServiceError),
    #[error("{0}")]
    State(#[from] StateError),
    #[error("{0}")]
    Workspace(String),
}

#[derive(Error, Debug, Clone)]
pub enum AcquisitionError {
    #[error("Video duration {duration_seconds:.0}s exceeds limit of {limit_seconds}s.")]
    DurationExceeded {
        duration_seconds: f64,
        limit_seconds: u64,
    },
    #[error("Unable to download video after {attempts} attempts: {reason}")]
    DownloadFailed { attempts: u32, reason: String },
    #[error("Unable to sample frames from video: {0}")]
    SamplingFailed(String),
    #[error("No frames extracted from video")]
    NoFramesProduced,
}

/// How the reasoning client classifies a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    RateLimited,
    Transient,
    InvalidResponse,
}

impl ServiceErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceErrorKind::RateLimited | ServiceErrorKind::Transient)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceErrorKind::RateLimited => "rate limited",
            ServiceErrorKind::Transient => "transient failure",
            ServiceErrorKind::InvalidResponse => "invalid response",
        }
    }
}

impl std::fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Reasoning service {kind}: {message}")]
pub struct ServiceError {
    pub kind: ServiceErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(kind: ServiceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::InvalidResponse, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ServiceErrorKind::Transient, message)
    }
}

#[derive(Error, Debug, Clone)]
#[error("Local background remover unavailable: {0}")]
pub struct RemoverUnavailable(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Stage {writer:?} attempted to write `{field}`, which is owned by stage {owner:?}")]
    OwnershipViolation {
        field: &'static str,
        owner: PipelineStage,
        writer: PipelineStage,
    },
    #[error("`{0}` is immutable once produced")]
    Frozen(&'static str),
    #[error("Stage {stage:?} requires `{field}`, which has not been produced")]
    MissingInput {
        field: &'static str,
        stage: PipelineStage,
    },
}

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to create workspace directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Artifact {path} is outside the static directory {static_dir}")]
    OutsideStaticDir { path: PathBuf, static_dir: PathBuf },
    #[error("Failed to resolve {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<WorkspaceError> for JobError {
    fn from(error: WorkspaceError) -> Self {
        JobError::Workspace(error.to_string())
    }
}
