pub mod acquisition;
pub mod artifacts;
pub mod fallback;
pub mod prompts;
pub mod reasoning;
pub mod segmentation;

pub mod factory;
pub mod orchestration;
pub mod steps;

pub use factory::{PipelineConfiguration, PipelineDependencies, PipelineFactory};
pub use orchestration::{JobContext, ProcessingPipeline};
