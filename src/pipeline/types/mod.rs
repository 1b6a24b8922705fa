mod image_ref;
mod job;
mod job_response;
mod product_label;
mod workflow_state;

pub use image_ref::ImageRef;
pub use job::{Job, JobId, JobStatus};
pub use job_response::JobResponse;
pub use product_label::{ProductLabel, UNKNOWN_PRODUCT};
pub use workflow_state::{StageField, WorkflowState};
