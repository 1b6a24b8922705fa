pub mod config;
pub mod coordinator;
pub mod error;
pub mod pipeline;

pub use config::Settings;
pub use coordinator::{CoordinatorBuilder, JobCoordinator};
pub use error::{AppError, JobError};
pub use pipeline::{JobResponse, PipelineConfiguration};
