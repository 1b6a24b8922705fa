pub mod job_context;
pub mod metrics;
pub mod pipeline_stage;
pub mod processing_step;
pub mod stage_timings;

pub use job_context::JobContext;
pub use metrics::{
    ObserverSet, RecordingObserver, StageEvent, StageObserver, StageOutcome, TracingObserver,
};
pub use pipeline_stage::{PipelineStage, PipelineState};
pub use processing_step::{ProcessingPipeline, ProcessingPipelineBuilder, ProcessingStep, StepResult};
pub use stage_timings::StageTimings;
