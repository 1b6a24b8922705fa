use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::pipeline::services::artifacts::save_png;
use crate::pipeline::services::fallback::fill_enhancements;
use crate::pipeline::services::orchestration::{JobContext, PipelineStage, ProcessingStep, StepResult};
use crate::pipeline::services::prompts::EnhancementStyle;
use crate::pipeline::services::reasoning::{
    ExpectedShape, ReasoningAnswer, ReasoningRequest, VisualReasoner,
};
use crate::pipeline::types::{ImageRef, UNKNOWN_PRODUCT};
use crate::pipeline::workspace::JobWorkspace;

/// Stage 6: re-render the cut-out in marketing styles.
///
/// Styles are tried in order until `min_enhanced` renders exist. Short
/// results are padded from the renders that did succeed, or from the
/// segmented image. Never fails the job.
pub struct EnhancementStep {
    reasoner: Arc<dyn VisualReasoner>,
    styles: Vec<EnhancementStyle>,
    min_enhanced: usize,
}

impl EnhancementStep {
    pub fn new(
        reasoner: Arc<dyn VisualReasoner>,
        styles: Vec<EnhancementStyle>,
        min_enhanced: usize,
    ) -> Self {
        Self {
            reasoner,
            styles,
            min_enhanced,
        }
    }

    async fn render(
        &self,
        style: EnhancementStyle,
        segmented: &ImageRef,
        product_name: &str,
        workspace: &JobWorkspace,
    ) -> Result<ImageRef, ServiceError> {
        let request = ReasoningRequest::new(
            vec![segmented.clone()],
            style.prompt(product_name),
            ExpectedShape::Image,
        );

        match self.reasoner.ask(request).await? {
            ReasoningAnswer::Image(image) => save_png(image, &workspace.enhancement_path(style))
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
impl ProcessingStep for EnhancementStep {
    async fn process(&self, context: &mut JobContext) -> StepResult {
        let segmented = match context.state.require_segmented_image(PipelineStage::Enhance) {
            Ok(segmented) => segmented.clone(),
            Err(e) => return StepResult::Fatal(e.into()),
        };
        let product_name = context
            .state
            .product_label()
            .map(|label| label.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());

        let mut renders = Vec::new();
        let mut failures = Vec::new();
        for style in &self.styles {
            if renders.len() >= self.min_enhanced {
                break;
            }
            match self
                .render(*style, &segmented, &product_name, &context.workspace)
                .await
            {
                Ok(render) => {
                    info!("Rendered {} shot", style.slug());
                    renders.push(render);
                }
                Err(e) => {
                    warn!("Enhancement style {} failed: {}", style.slug(), e);
                    context.state.record_error(PipelineStage::Enhance, &e);
                    failures.push(format!("{}: {}", style.slug(), e));
                }
            }
        }

        let rendered = renders.len();
        let enhanced = fill_enhancements(renders, &segmented, self.min_enhanced);
        if let Err(e) = context
            .state
            .set_enhanced_images(PipelineStage::Enhance, enhanced)
        {
            return StepResult::Fatal(e.into());
        }

        if rendered < self.min_enhanced {
            StepResult::Fallback(format!(
                "only {} of {} required renders succeeded ({})",
                rendered,
                self.min_enhanced,
                failures.join("; ")
            ))
        } else {
            StepResult::Continue
        }
    }

    fn stage(&self) -> PipelineStage {
        PipelineStage::Enhance
    }

    fn name(&self) -> &'static str {
        "EnhancementStep"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::services::steps::test_support::{
        context_with_frames, solid_image, StubReasoner,
    };
    use std::path::Path;

    async fn segmented_context(root: &Path) -> JobContext {
        let mut context = context_with_frames(root, 1).await;
        let path = context.workspace.segmented_image_path.clone();
        solid_image([9, 9, 9]).save(&path).unwrap();
        context
            .state
            .set_segmented_image(PipelineStage::Segment, ImageRef::new(path))
            .unwrap();
        context
    }

    #[tokio::test]
    async fn test_stops_once_minimum_is_rendered() {
        let root = tempfile::tempdir().unwrap();
        let mut context = segmented_context(root.path()).await;
        let reasoner = Arc::new(StubReasoner::new(|_| Ok(ReasoningAnswer::Image(solid_image([5, 5, 5])))));
        let step = EnhancementStep::new(reasoner.clone(), EnhancementStyle::all().to_vec(), 2);

        assert!(matches!(step.process(&mut context).await, StepResult::Continue));
        let names: Vec<_> = context
            .state
            .enhanced_images()
            .iter()
            .filter_map(|image| image.file_name())
            .collect();
        assert_eq!(names, vec!["enhanced_studio.png", "enhanced_lifestyle.png"]);
        assert_eq!(reasoner.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_service_duplicates_segmented_image() {
        let root = tempfile::tempdir().unwrap();
        let mut context = segmented_context(root.path()).await;
        let reasoner = Arc::new(StubReasoner::failing());
        let step = EnhancementStep::new(reasoner.clone(), EnhancementStyle::all().to_vec(), 2);

        assert!(matches!(step.process(&mut context).await, StepResult::Fallback(_)));
        let segmented = context.state.segmented_image().unwrap().clone();
        assert_eq!(context.state.enhanced_images(), &[segmented.clone(), segmented]);
        assert_eq!(reasoner.calls(), 3);
    }

    #[tokio::test]
    async fn test_partial_success_cycles_renders() {
        let root = tempfile::tempdir().unwrap();
        let mut context = segmented_context(root.path()).await;
        let reasoner = Arc::new(StubReasoner::new(|request| {
            if request.instruction.contains("white background") {
                Ok(ReasoningAnswer::Image(solid_image([5, 5, 5])))
            } else {
                Err(ServiceError::transient("overloaded"))
            }
        }));
        let step = EnhancementStep::new(reasoner, EnhancementStyle::all().to_vec(), 2);

        assert!(matches!(step.process(&mut context).await, StepResult::Fallback(_)));
        let enhanced = context.state.enhanced_images();
        assert_eq!(enhanced.len(), 2);
        assert_eq!(enhanced[0], enhanced[1]);
        assert_eq!(enhanced[0].file_name(), Some("enhanced_studio.png"));
    }
}
