use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{ServiceError, StateError};
use crate::pipeline::services::fallback::best_frame_fallback;
use crate::pipeline::services::orchestration::{JobContext, PipelineStage, ProcessingStep, StepResult};
use crate::pipeline::services::prompts::best_frame_instruction;
use crate::pipeline::services::reasoning::{
    ExpectedShape, ReasoningAnswer, ReasoningRequest, VisualReasoner,
};
use crate::pipeline::types::{ImageRef, UNKNOWN_PRODUCT};

/// Stage 4: pick the single clearest shortlisted frame.
///
/// Makes up to `attempts` independent requests; each one may itself retry
/// transient failures inside the client.
pub struct BestFrameStep {
    reasoner: Arc<dyn VisualReasoner>,
    attempts: u32,
}

impl BestFrameStep {
    pub fn new(reasoner: Arc<dyn VisualReasoner>, attempts: u32) -> Self {
        Self {
            reasoner,
            attempts: attempts.max(1),
        }
    }

    async fn select(&self, shortlist: &[ImageRef], product_name: &str) -> Result<usize, ServiceError> {
        let request = ReasoningRequest::new(
            shortlist.to_vec(),
            best_frame_instruction(product_name),
            ExpectedShape::Index {
                len: shortlist.len(),
            },
        );

        match self.reasoner.ask(request).await? {
            ReasoningAnswer::Index(index) if index < shortlist.len() => Ok(index),
            other => Err(ServiceError::invalid_response(format!(
                "expected a frame index below {}, got {:?}",
                shortlist.len(),
                other
            ))),
        }
    }
}

#[async_trait]
impl ProcessingStep for BestFrameStep {
    async fn process(&self, context: &mut JobContext) -> StepResult {
        let shortlist = match context.state.require_shortlist(PipelineStage::SelectBest) {
            Ok(shortlist) => shortlist.to_vec(),
            Err(e) => return StepResult::Fatal(e.into()),
        };
        let product_name = context
            .state
            .product_label()
            .map(|label| label.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());

        let mut last_error = None;
        for attempt in 1..=self.attempts {
            match self.select(&shortlist, &product_name).await {
                Ok(index) => {
                    debug!("Best frame is shortlist index {} (attempt {})", index, attempt);
                    return context
                        .state
                        .set_best_frame(PipelineStage::SelectBest, shortlist[index].clone())
                        .into();
                }
                Err(e) => {
                    warn!("Best frame attempt {}/{} failed: {}", attempt, self.attempts, e);
                    last_error = Some(e);
                }
            }
        }

        let fallback = match shortlist.get(best_frame_fallback()) {
            Some(frame) => frame.clone(),
            None => {
                return StepResult::Fatal(
                    StateError::MissingInput {
                        field: "shortlist",
                        stage: PipelineStage::SelectBest,
                    }
                    .into(),
                )
            }
        };
        if let Err(e) = context.state.set_best_frame(PipelineStage::SelectBest, fallback) {
            return StepResult::Fatal(e.into());
        }

        StepResult::Fallback(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no selection attempts made".to_string()),
        )
    }

    fn stage(&self) -> PipelineStage {
        PipelineStage::SelectBest
    }

    fn name(&self) -> &'static str {
        "BestFrameStep"
    }
}
