pub mod services;
pub mod types;
pub mod workspace;

pub use services::{PipelineConfiguration, PipelineFactory, ProcessingPipeline};
pub use types::{ImageRef, Job, JobId, JobResponse, JobStatus, ProductLabel, WorkflowState};
pub use workspace::{JobWorkspace, WorkspaceManager};
