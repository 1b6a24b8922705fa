use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{JobError, ServiceError};
use crate::pipeline::services::fallback::identification_fallback;
use crate::pipeline::services::orchestration::{JobContext, PipelineStage, ProcessingStep, StepResult};
use crate::pipeline::services::prompts::identification_instruction;
use crate::pipeline::services::reasoning::{
    ExpectedShape, ReasoningAnswer, ReasoningRequest, VisualReasoner,
};
use crate::pipeline::types::ProductLabel;

/// Stage 3: name the product. Soft by default; `strict` makes a failure fatal.
pub struct IdentificationStep {
    reasoner: Arc<dyn VisualReasoner>,
    strict: bool,
}

impl IdentificationStep {
    pub fn new(reasoner: Arc<dyn VisualReasoner>, strict: bool) -> Self {
        Self { reasoner, strict }
    }

    async fn identify(&self, context: &JobContext) -> Result<ProductLabel, ServiceError> {
        let shortlist = context
            .state
            .require_shortlist(PipelineStage::Identify)
            .map_err(|e| ServiceError::invalid_response(e.to_string()))?;

        let request = ReasoningRequest::new(
            shortlist.to_vec(),
            identification_instruction(),
            ExpectedShape::Text,
        );

        match self.reasoner.ask(request).await? {
            ReasoningAnswer::Text(text) => match ProductLabel::from_answer(&text) {
                ProductLabel::Unknown => Err(ServiceError::invalid_response("blank product name")),
                label => Ok(label),
            },
            other => Err(ServiceError::invalid_response(format!(
                "expected a product name, got {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl ProcessingStep for IdentificationStep {
    async fn process(&self, context: &mut JobContext) -> StepResult {
        match self.identify(context).await {
            Ok(label) => {
                info!("Identified product: {}", label);
                context
                    .state
                    .set_product_label(PipelineStage::Identify, label)
                    .into()
            }
            Err(e) if self.strict => StepResult::Fatal(JobError::Identification(e)),
            Err(e) => {
                warn!("Product identification failed: {}", e);
                if let Err(state_error) = context
                    .state
                    .set_product_label(PipelineStage::Identify, identification_fallback())
                {
                    return StepResult::Fatal(state_error.into());
                }
                StepResult::Fallback(e.to_string())
            }
        }
    }

    fn stage(&self) -> PipelineStage {
        PipelineStage::Identify
    }

    fn name(&self) -> &'static str {
        "IdentificationStep"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::services::steps::test_support::{context_with_frames, StubReasoner};

    async fn shortlisted_context(root: &std::path::Path) -> JobContext {
        let mut context = context_with_frames(root, 3).await;
        let frames = context.state.sampled_frames().to_vec();
        context
            .state
            .set_shortlist(PipelineStage::Shortlist, frames)
            .unwrap();
        context
    }

    #[tokio::test]
    async fn test_stores_identified_name() {
        let root = tempfile::tempdir().unwrap();
        let mut context = shortlisted_context(root.path()).await;
        let step = IdentificationStep::new(
            Arc::new(StubReasoner::new(|_| Ok(ReasoningAnswer::Text("\"Desk Lamp\"".into())))),
            false,
        );

        assert!(matches!(step.process(&mut context).await, StepResult::Continue));
        assert_eq!(
            context.state.product_label(),
            Some(&ProductLabel::Identified("Desk Lamp".to_string()))
        );
    }

    #[tokio::test]
    async fn test_failure_yields_unknown_label() {
        let root = tempfile::tempdir().unwrap();
        let mut context = shortlisted_context(root.path()).await;
        let step = IdentificationStep::new(Arc::new(StubReasoner::failing()), false);

        assert!(matches!(step.process(&mut context).await, StepResult::Fallback(_)));
        assert_eq!(context.state.product_label(), Some(&ProductLabel::Unknown));
    }

    #[tokio::test]
    async fn test_strict_mode_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let mut context = shortlisted_context(root.path()).await;
        let step = IdentificationStep::new(Arc::new(StubReasoner::failing()), true);

        assert!(matches!(
            step.process(&mut context).await,
            StepResult::Fatal(JobError::Identification(_))
        ));
    }
}
