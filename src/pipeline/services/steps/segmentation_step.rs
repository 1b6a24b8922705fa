use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{JobError, ServiceError};
use crate::pipeline::services::artifacts::save_png;
use crate::pipeline::services::orchestration::{JobContext, PipelineStage, ProcessingStep, StepResult};
use crate::pipeline::services::prompts::segmentation_instruction;
use crate::pipeline::services::reasoning::{
    ExpectedShape, ReasoningAnswer, ReasoningRequest, VisualReasoner,
};
use crate::pipeline::services::segmentation::BackgroundRemover;
use crate::pipeline::types::{ImageRef, UNKNOWN_PRODUCT};

/// Stage 5: cut the product out of the best frame.
///
/// The generation service is tried first; any failure there hands the same
/// frame to the local remover, which writes the same destination. Only an
/// unavailable local remover fails the job.
pub struct SegmentationStep {
    reasoner: Arc<dyn VisualReasoner>,
    remover: Arc<dyn BackgroundRemover>,
}

impl SegmentationStep {
    pub fn new(reasoner: Arc<dyn VisualReasoner>, remover: Arc<dyn BackgroundRemover>) -> Self {
        Self { reasoner, remover }
    }

    async fn segment_remotely(
        &self,
        frame: &ImageRef,
        product_name: &str,
        destination: &std::path::Path,
    ) -> Result<ImageRef, ServiceError> {
        let request = ReasoningRequest::new(
            vec![frame.clone()],
            segmentation_instruction(product_name),
            ExpectedShape::Image,
        );

        match self.reasoner.ask(request).await? {
            ReasoningAnswer::Image(image) => save_png(image, destination)
                .await
                .map_err(ServiceError::invalid_response),
            other => Err(ServiceError::invalid_response(format!(
                "expected an image, got {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl ProcessingStep for SegmentationStep {
    async fn process(&self, context: &mut JobContext) -> StepResult {
        let frame = match context.state.require_best_frame(PipelineStage::Segment) {
            Ok(frame) => frame.clone(),
            Err(e) => return StepResult::Fatal(e.into()),
        };
        let product_name = context
            .state
            .product_label()
            .map(|label| label.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());
        let destination = context.workspace.segmented_image_path.clone();

        let remote_error = match self.segment_remotely(&frame, &product_name, &destination).await {
            Ok(segmented) => {
                info!("Segmented {} with the generation service", frame.path().display());
                return context
                    .state
                    .set_segmented_image(PipelineStage::Segment, segmented)
                    .into();
            }
            Err(e) => e,
        };

        warn!("Remote segmentation failed, using local remover: {}", remote_error);
        match self.remover.remove_background(&frame, &destination).await {
            Ok(segmented) => {
                if let Err(e) = context
                    .state
                    .set_segmented_image(PipelineStage::Segment, segmented)
                {
                    return StepResult::Fatal(e.into());
                }
                StepResult::Fallback(remote_error.to_string())
            }
            Err(unavailable) => StepResult::Fatal(JobError::FallbackExhausted(unavailable)),
        }
    }

    fn stage(&self) -> PipelineStage {
        PipelineStage::Segment
    }

    fn name(&self) -> &'static str {
        "SegmentationStep"
    }
}
