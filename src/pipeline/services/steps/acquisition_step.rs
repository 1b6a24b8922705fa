use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::error::AcquisitionError;
use crate::pipeline::services::acquisition::{FrameSource, SamplingOptions};
use crate::pipeline::services::orchestration::{JobContext, PipelineStage, ProcessingStep, StepResult};

/// Stage 1: download the source and sample frames. Every failure is fatal.
pub struct AcquisitionStep {
    source: Arc<dyn FrameSource>,
    sampling: SamplingOptions,
}

impl AcquisitionStep {
    pub fn new(source: Arc<dyn FrameSource>, sampling: SamplingOptions) -> Self {
        Self { source, sampling }
    }
}

#[async_trait]
impl ProcessingStep for AcquisitionStep {
    async fn process(&self, context: &mut JobContext) -> StepResult {
        let frames = match self
            .source
            .acquire_and_sample(
                context.state.source(),
                &context.workspace.frames_dir,
                &self.sampling,
            )
            .await
        {
            Ok(frames) => frames,
            Err(e) => return StepResult::Fatal(e.into()),
        };

        // later stages require at least one frame
        if frames.is_empty() {
            return StepResult::Fatal(AcquisitionError::NoFramesProduced.into());
        }

        info!("{} produced {} frames", self.source.name(), frames.len());
        context
            .state
            .set_sampled_frames(PipelineStage::Acquire, frames)
            .into()
    }

    fn stage(&self) -> PipelineStage {
        PipelineStage::Acquire
    }

    fn name(&self) -> &'static str {
        "AcquisitionStep"
    }
}
