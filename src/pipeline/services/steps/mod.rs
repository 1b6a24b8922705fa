pub mod acquisition_step;
pub mod best_frame_step;
pub mod enhancement_step;
pub mod identification_step;
pub mod segmentation_step;
pub mod shortlist_step;

pub use acquisition_step::AcquisitionStep;
pub use best_frame_step::BestFrameStep;
pub use enhancement_step::EnhancementStep;
pub use identification_step::IdentificationStep;
pub use segmentation_step::SegmentationStep;
pub use shortlist_step::ShortlistStep;

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::ServiceError;
    use crate::pipeline::services::orchestration::{JobContext, PipelineStage};
    use crate::pipeline::services::reasoning::{ReasoningAnswer, ReasoningRequest, VisualReasoner};
    use crate::pipeline::types::{ImageRef, Job, JobId};
    use crate::pipeline::workspace::WorkspaceManager;

    type Answerer = dyn Fn(&ReasoningRequest) -> Result<ReasoningAnswer, ServiceError> + Send + Sync;

    /// Reasoner whose answers come from a closure; counts calls.
    pub struct StubReasoner {
        answer: Box<Answerer>,
        calls: AtomicU32,
    }

    impl StubReasoner {
        pub fn new<F>(answer: F) -> Self
        where
            F: Fn(&ReasoningRequest) -> Result<ReasoningAnswer, ServiceError> + Send + Sync + 'static,
        {
            Self {
                answer: Box::new(answer),
                calls: AtomicU32::new(0),
            }
        }

        pub fn failing() -> Self {
            Self::new(|_| Err(ServiceError::transient("service unavailable")))
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisualReasoner for StubReasoner {
        async fn ask(&self, request: ReasoningRequest) -> Result<ReasoningAnswer, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.answer)(&request)
        }
    }

    pub fn solid_image(color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_pixel(16, 16, Rgb(color)))
    }

    /// A fresh job context in `root` with `frame_count` sampled frames on disk.
    pub async fn context_with_frames(root: &Path, frame_count: usize) -> JobContext {
        let manager = WorkspaceManager::new(root, "/static");
        let id = JobId::new();
        let workspace = manager.allocate(id).await.unwrap();
        let job = Job::new(id, "https://example.com/watch?v=demo", workspace.job_dir.clone());
        let mut context = JobContext::new(job, workspace);

        let frames: Vec<ImageRef> = (0..frame_count)
            .map(|i| {
                let path = context.workspace.frames_dir.join(format!("frame_{:03}.png", i));
                solid_image([i as u8 * 10, 120, 200]).save(&path).unwrap();
                ImageRef::new(path)
            })
            .collect();

        if frame_count > 0 {
            context
                .state
                .set_sampled_frames(PipelineStage::Acquire, frames)
                .unwrap();
        }
        context
    }
}
