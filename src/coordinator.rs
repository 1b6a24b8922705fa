use std::sync::Arc;
use tracing::{error, info};

use crate::config::Settings;
use crate::error::{ConfigError, WorkspaceError};
use crate::pipeline::services::{
    acquisition::{FrameSource, SamplingOptions, YtDlpFrameSource},
    orchestration::{JobContext, ObserverSet, PipelineState, StageObserver, TracingObserver},
    reasoning::{GeminiBackend, VisualReasoner},
    segmentation::{BackgroundRemover, BorderKeyRemover},
    PipelineDependencies, PipelineFactory, ProcessingPipeline,
};
use crate::pipeline::types::{ImageRef, Job, JobId, JobResponse, UNKNOWN_PRODUCT};
use crate::pipeline::workspace::WorkspaceManager;

/// Accepts job submissions and runs each one through the shared pipeline.
///
/// Cheap to clone; clones share the pipeline and its collaborators.
#[derive(Clone)]
pub struct JobCoordinator {
    pipeline: Arc<ProcessingPipeline>,
    workspaces: WorkspaceManager,
}

impl JobCoordinator {
    pub fn builder(settings: Settings) -> CoordinatorBuilder {
        CoordinatorBuilder::new(settings)
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Run one job to completion and return its final context.
    pub async fn run(&self, source: &str) -> Result<JobContext, WorkspaceError> {
        self.run_job(JobId::new(), source).await
    }

    async fn run_job(&self, id: JobId, source: &str) -> Result<JobContext, WorkspaceError> {
        let workspace = self.workspaces.allocate(id).await?;
        let job = Job::new(id, source, workspace.job_dir.clone());

        Ok(self.pipeline.run(JobContext::new(job, workspace)).await)
    }

    /// Run one job and project it into the caller-facing response.
    pub async fn submit(&self, source: &str) -> JobResponse {
        let job_id = JobId::new();

        let context = match self.run_job(job_id, source).await {
            Ok(context) => context,
            Err(e) => {
                error!(job = %job_id, "Unable to allocate a workspace for {}: {}", source, e);
                return JobResponse::Error {
                    job_id,
                    message: e.to_string(),
                };
            }
        };

        let response = self.respond(&context, context.started.elapsed().as_secs_f64());
        info!(
            job = %response.job_id(),
            "Job {} for {}",
            if response.is_success() { "succeeded" } else { "failed" },
            source
        );
        response
    }

    /// Submit on a fresh task.
    pub fn spawn(&self, source: String) -> tokio::task::JoinHandle<JobResponse> {
        let coordinator = self.clone();
        tokio::spawn(async move { coordinator.submit(&source).await })
    }

    fn respond(&self, context: &JobContext, elapsed_seconds: f64) -> JobResponse {
        let job_id = context.job.id;

        match context.job.state() {
            PipelineState::Done => match self.project(context, elapsed_seconds) {
                Ok(response) => response,
                Err(message) => JobResponse::Error { job_id, message },
            },
            PipelineState::Failed(_) => JobResponse::Error {
                job_id,
                message: context
                    .job
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Job failed".to_string()),
            },
            PipelineState::Running(stage) => JobResponse::Error {
                job_id,
                message: format!("Job stopped while in stage {}", stage),
            },
        }
    }

    fn project(&self, context: &JobContext, elapsed_seconds: f64) -> Result<JobResponse, String> {
        let state = &context.state;
        let url = |image: Option<&ImageRef>, field: &str| -> Result<String, String> {
            let image = image.ok_or_else(|| format!("Job finished without a {}", field))?;
            self.workspaces.public_url(image).map_err(|e| e.to_string())
        };

        let enhanced_refs = state
            .enhanced_images()
            .iter()
            .map(|image| url(Some(image), "enhanced image"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(JobResponse::Success {
            job_id: context.job.id,
            product_name: state
                .product_label()
                .map(|label| label.as_str().to_string())
                .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
            frame_ref: url(state.best_frame(), "best frame")?,
            segmented_ref: url(state.segmented_image(), "segmented image")?,
            enhanced_refs,
            elapsed_seconds: (elapsed_seconds * 100.0).round() / 100.0,
        })
    }
}

pub struct CoordinatorBuilder {
    settings: Settings,
    frame_source: Option<Arc<dyn FrameSource>>,
    reasoner: Option<Arc<dyn VisualReasoner>>,
    remover: Option<Arc<dyn BackgroundRemover>>,
    observers: ObserverSet,
}

impl CoordinatorBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            frame_source: None,
            reasoner: None,
            remover: None,
            observers: ObserverSet::new().add_observer(Arc::new(TracingObserver)),
        }
    }

    // Replaces the default yt-dlp source.
    pub fn frame_source(mut self, frame_source: Arc<dyn FrameSource>) -> Self {
        self.frame_source = Some(frame_source);
        self
    }

    // Replaces the default Gemini client. The reasoner is used as-is.
    pub fn reasoner(mut self, reasoner: Arc<dyn VisualReasoner>) -> Self {
        self.reasoner = Some(reasoner);
        self
    }

    pub fn remover(mut self, remover: Arc<dyn BackgroundRemover>) -> Self {
        self.remover = Some(remover);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observers = self.observers.add_observer(observer);
        self
    }

    pub fn build(self) -> Result<JobCoordinator, ConfigError> {
        self.settings.validate()?;

        let reasoner = match self.reasoner {
            Some(reasoner) => reasoner,
            None => PipelineFactory::create_reasoner(
                GeminiBackend::new(&self.settings)?,
                &self.settings.pipeline,
            ),
        };

        let dependencies = PipelineDependencies {
            frame_source: self
                .frame_source
                .unwrap_or_else(|| Arc::new(YtDlpFrameSource::from_settings(&self.settings))),
            reasoner,
            remover: self
                .remover
                .unwrap_or_else(|| Arc::new(BorderKeyRemover::default())),
        };

        let sampling = SamplingOptions {
            cadence_seconds: self.settings.frame_sample_rate,
            max_frames: self.settings.max_frames,
            max_duration_seconds: self.settings.max_video_duration,
        };

        let pipeline = PipelineFactory::create_standard(
            &self.settings.pipeline,
            sampling,
            dependencies,
            self.observers,
        )?;

        Ok(JobCoordinator {
            pipeline: Arc::new(pipeline),
            workspaces: WorkspaceManager::new(
                self.settings.static_dir.clone(),
                self.settings.public_url_prefix.clone(),
            ),
        })
    }
}
