pub mod configuration;
pub mod pipeline_factory;

pub use configuration::{PipelineConfiguration, RetryPolicy};
pub use pipeline_factory::{PipelineDependencies, PipelineFactory};
