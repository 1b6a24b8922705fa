use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::pipeline::services::fallback::shortlist_fallback;
use crate::pipeline::services::orchestration::{JobContext, PipelineStage, ProcessingStep, StepResult};
use crate::pipeline::services::prompts::shortlist_instruction;
use crate::pipeline::services::reasoning::{
    ExpectedShape, ReasoningAnswer, ReasoningRequest, VisualReasoner,
};
use crate::pipeline::types::ImageRef;

/// Stage 2: narrow the sampled frames down to a few candidates.
pub struct ShortlistStep {
    reasoner: Arc<dyn VisualReasoner>,
    shortlist_size: usize,
}

impl ShortlistStep {
    pub fn new(reasoner: Arc<dyn VisualReasoner>, shortlist_size: usize) -> Self {
        Self {
            reasoner,
            shortlist_size: shortlist_size.max(1),
        }
    }

    async fn rank(&self, frames: &[ImageRef]) -> Result<Vec<ImageRef>, ServiceError> {
        let request = ReasoningRequest::new(
            frames.to_vec(),
            shortlist_instruction(frames.len(), self.shortlist_size),
            ExpectedShape::IndexList {
                len: frames.len(),
                max: self.shortlist_size,
            },
        );

        match self.reasoner.ask(request).await? {
            ReasoningAnswer::Indices(indices) => indices
                .into_iter()
                .take(self.shortlist_size)
                .map(|i| {
                    frames.get(i).cloned().ok_or_else(|| {
                        ServiceError::invalid_response(format!("frame index {} out of range", i))
                    })
                })
                .collect(),
            other => Err(ServiceError::invalid_response(format!(
                "expected frame indices, got {:?}",
                other
            ))),
        }
    }
}

#[async_trait]
impl ProcessingStep for ShortlistStep {
    async fn process(&self, context: &mut JobContext) -> StepResult {
        let frames = match context.state.require_sampled_frames(PipelineStage::Shortlist) {
            Ok(frames) => frames.to_vec(),
            Err(e) => return StepResult::Fatal(e.into()),
        };

        // Nothing to choose between
        if frames.len() <= 1 {
            return context
                .state
                .set_shortlist(PipelineStage::Shortlist, frames)
                .into();
        }

        let (shortlist, fallback) = match self.rank(&frames).await {
            Ok(shortlist) if !shortlist.is_empty() => (shortlist, None),
            Ok(_) => (
                shortlist_fallback(&frames, self.shortlist_size),
                Some("empty shortlist".to_string()),
            ),
            Err(e) => {
                warn!("Shortlisting failed, keeping the first {} frames: {}", self.shortlist_size, e);
                (shortlist_fallback(&frames, self.shortlist_size), Some(e.to_string()))
            }
        };

        debug!("Shortlisted {} of {} frames", shortlist.len(), frames.len());
        if let Err(e) = context.state.set_shortlist(PipelineStage::Shortlist, shortlist) {
            return StepResult::Fatal(e.into());
        }

        match fallback {
            Some(reason) => StepResult::Fallback(reason),
            None => StepResult::Continue,
        }
    }

    fn stage(&self) -> PipelineStage {
        PipelineStage::Shortlist
    }

    fn name(&self) -> &'static str {
        "ShortlistStep"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::services::steps::test_support::{context_with_frames, StubReasoner};

    #[tokio::test]
    async fn test_uses_ranked_indices() {
        let root = tempfile::tempdir().unwrap();
        let mut context = context_with_frames(root.path(), 12).await;
        let reasoner = Arc::new(StubReasoner::new(|_| Ok(ReasoningAnswer::Indices(vec![7, 2]))));
        let step = ShortlistStep::new(reasoner.clone(), 3);

        assert!(matches!(step.process(&mut context).await, StepResult::Continue));

        let names: Vec<_> = context.state.shortlist().iter().filter_map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["frame_007.png", "frame_002.png"]);
        assert_eq!(reasoner.calls(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_leading_frames() {
        let root = tempfile::tempdir().unwrap();
        let mut context = context_with_frames(root.path(), 12).await;
        let step = ShortlistStep::new(Arc::new(StubReasoner::failing()), 3);

        assert!(matches!(step.process(&mut context).await, StepResult::Fallback(_)));
        assert_eq!(context.state.shortlist(), &context.state.sampled_frames()[..3]);
    }

    #[tokio::test]
    async fn test_shortlist_bounds_hold_for_any_input_length() {
        for frame_count in 1..=6 {
            let root = tempfile::tempdir().unwrap();
            let mut context = context_with_frames(root.path(), frame_count).await;
            let step = ShortlistStep::new(Arc::new(StubReasoner::failing()), 3);
            step.process(&mut context).await;

            let len = context.state.shortlist().len();
            assert!(len >= 1);
            assert!(len <= frame_count.min(3));
        }
    }

    #[tokio::test]
    async fn test_single_frame_skips_the_service() {
        let root = tempfile::tempdir().unwrap();
        let mut context = context_with_frames(root.path(), 1).await;
        let reasoner = Arc::new(StubReasoner::failing());
        let step = ShortlistStep::new(reasoner.clone(), 3);

        assert!(matches!(step.process(&mut context).await, StepResult::Continue));
        assert_eq!(context.state.shortlist().len(), 1);
        assert_eq!(reasoner.calls(), 0);
    }
}
