use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::JobError;

use super::job_context::JobContext;
use super::metrics::{ObserverSet, StageObserver, StageOutcome};
use super::pipeline_stage::PipelineStage;

/// Step execution result
#[derive(Debug)]
pub enum StepResult {
    /// The primary method produced the stage output
    Continue,
    /// The stage output came from its fallback policy; carries the reason
    Fallback(String),
    /// The job cannot continue
    Fatal(JobError),
}

impl StepResult {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StepResult::Fatal(_))
    }
}

impl<E: Into<JobError>> From<Result<(), E>> for StepResult {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => StepResult::Continue,
            Err(e) => StepResult::Fatal(e.into()),
        }
    }
}

/// Chain of Responsibility pattern for the job pipeline.
///
/// Steps take `&self` so one pipeline can serve many concurrent jobs; all
/// per-job data lives in the [`JobContext`].
#[async_trait]
pub trait ProcessingStep: Send + Sync {
    async fn process(&self, context: &mut JobContext) -> StepResult;

    /// The stage this step implements, which is also the only stage whose
    /// state fields it may write
    fn stage(&self) -> PipelineStage;

    fn name(&self) -> &'static str;
}

/// A linear pipeline that drives a job through its stages in order
pub struct ProcessingPipeline {
    steps: Vec<Box<dyn ProcessingStep>>,
    observers: ObserverSet,
}

impl ProcessingPipeline {
    pub fn builder() -> ProcessingPipelineBuilder {
        ProcessingPipelineBuilder::default()
    }

    pub fn stages(&self) -> Vec<PipelineStage> {
        self.steps.iter().map(|step| step.stage()).collect()
    }

    /// Run every step in order. A fatal result moves the job to `FAILED` and
    /// halts; otherwise the job ends `DONE`.
    pub async fn run(&self, mut context: JobContext) -> JobContext {
        let job_id = context.job.id;
        info!(job = %job_id, "Starting pipeline for {}", context.job.source);

        for step in &self.steps {
            let stage = step.stage();
            context.job.enter(stage);
            self.observers.notify_stage_started(job_id, stage);

            let start = Instant::now();
            let result = run_step(step.as_ref(), &mut context).await;
            let elapsed = start.elapsed();
            context.timings.record(stage, elapsed);

            match result {
                StepResult::Continue => {
                    self.observers
                        .notify_stage_finished(job_id, stage, &StageOutcome::Primary, elapsed);
                }
                StepResult::Fallback(reason) => {
                    context.state.record_error(stage, &reason);
                    self.observers.notify_stage_finished(
                        job_id,
                        stage,
                        &StageOutcome::Fallback(reason),
                        elapsed,
                    );
                }
                StepResult::Fatal(e) => {
                    error!(job = %job_id, "Stage {} failed: {}", stage, e);
                    context.state.record_error(stage, &e);
                    self.observers.notify_stage_finished(
                        job_id,
                        stage,
                        &StageOutcome::Fatal(e.to_string()),
                        elapsed,
                    );
                    context.job.fail(stage, e);
                    self.observers.notify_job_finished(job_id, context.job.state());
                    return context;
                }
            }
        }

        context.job.finish();
        info!(
            job = %job_id,
            "Pipeline finished in {}ms",
            context.timings.total().as_millis()
        );
        self.observers.notify_job_finished(job_id, context.job.state());
        context
    }
}

#[instrument(skip_all, fields(stage = %step.stage(), job = %context.job.id))]
async fn run_step(step: &dyn ProcessingStep, context: &mut JobContext) -> StepResult {
    debug!("Running step: {}", step.name());
    let result = step.process(context).await;
    if let StepResult::Fallback(reason) = &result {
        warn!("Step {} fell back: {}", step.name(), reason);
    }
    result
}

#[derive(Default)]
pub struct ProcessingPipelineBuilder {
    steps: Vec<Box<dyn ProcessingStep>>,
    observers: ObserverSet,
}

impl ProcessingPipelineBuilder {
    pub fn add_step(mut self, step: Box<dyn ProcessingStep>) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_observer(mut self, observer: std::sync::Arc<dyn StageObserver>) -> Self {
        self.observers = self.observers.add_observer(observer);
        self
    }

    pub fn observers(mut self, observers: ObserverSet) -> Self {
        self.observers = observers;
        self
    }

    /// Steps must be added in strictly increasing stage order.
    pub fn build(self) -> Result<ProcessingPipeline, String> {
        if self.steps.is_empty() {
            return Err("Pipeline needs at least one step".to_string());
        }

        for pair in self.steps.windows(2) {
            if pair[1].stage() <= pair[0].stage() {
                return Err(format!(
                    "Step {} ({}) cannot run after {} ({})",
                    pair[1].name(),
                    pair[1].stage(),
                    pair[0].name(),
                    pair[0].stage()
                ));
            }
        }

        Ok(ProcessingPipeline {
            steps: self.steps,
            observers: self.observers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcquisitionError;
    use crate::pipeline::services::orchestration::metrics::{RecordingObserver, StageEvent};
    use crate::pipeline::services::orchestration::PipelineState;
    use crate::pipeline::types::{Job, JobId, JobStatus};
    use crate::pipeline::workspace::WorkspaceManager;
    use std::sync::Arc;

    struct FixedStep {
        stage: PipelineStage,
        result: fn() -> StepResult,
    }

    #[async_trait]
    impl ProcessingStep for FixedStep {
        async fn process(&self, _context: &mut JobContext) -> StepResult {
            (self.result)()
        }

        fn stage(&self) -> PipelineStage {
            self.stage
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    fn step(stage: PipelineStage, result: fn() -> StepResult) -> Box<dyn ProcessingStep> {
        Box::new(FixedStep { stage, result })
    }

    async fn context(root: &std::path::Path) -> JobContext {
        let manager = WorkspaceManager::new(root, "/static");
        let id = JobId::new();
        let workspace = manager.allocate(id).await.unwrap();
        let job = Job::new(id, "https://example.com/v", workspace.job_dir.clone());
        JobContext::new(job, workspace)
    }

    #[test]
    fn test_builder_rejects_out_of_order_steps() {
        let result = ProcessingPipeline::builder()
            .add_step(step(PipelineStage::Identify, || StepResult::Continue))
            .add_step(step(PipelineStage::Shortlist, || StepResult::Continue))
            .build();
        assert!(result.is_err());

        let result = ProcessingPipeline::builder()
            .add_step(step(PipelineStage::Acquire, || StepResult::Continue))
            .add_step(step(PipelineStage::Acquire, || StepResult::Continue))
            .build();
        assert!(result.is_err());

        assert!(ProcessingPipeline::builder().build().is_err());
    }

    #[tokio::test]
    async fn test_fallbacks_continue_and_are_recorded() {
        let root = tempfile::tempdir().unwrap();
        let pipeline = ProcessingPipeline::builder()
            .add_step(step(PipelineStage::Acquire, || StepResult::Continue))
            .add_step(step(PipelineStage::Shortlist, || {
                StepResult::Fallback("service unavailable".to_string())
            }))
            .add_step(step(PipelineStage::Identify, || StepResult::Continue))
            .build()
            .unwrap();

        let done = pipeline.run(context(root.path()).await).await;

        assert_eq!(done.job.state(), PipelineState::Done);
        assert_eq!(done.job.status(), JobStatus::Succeeded);
        assert_eq!(
            done.state.last_error(),
            Some("SHORTLIST: service unavailable")
        );
        assert_eq!(done.timings.stages().count(), 3);
    }

    #[tokio::test]
    async fn test_fatal_result_halts_pipeline() {
        let root = tempfile::tempdir().unwrap();
        let recorder = Arc::new(RecordingObserver::new());
        let pipeline = ProcessingPipeline::builder()
            .add_step(step(PipelineStage::Acquire, || {
                StepResult::Fatal(AcquisitionError::NoFramesProduced.into())
            }))
            .add_step(step(PipelineStage::Shortlist, || StepResult::Continue))
            .add_observer(recorder.clone())
            .build()
            .unwrap();

        let ctx = context(root.path()).await;
        let id = ctx.job.id;
        let failed = pipeline.run(ctx).await;

        assert_eq!(failed.job.state(), PipelineState::Failed(PipelineStage::Acquire));
        assert!(failed.job.error().is_some());
        assert_eq!(recorder.started_stages(id), vec![PipelineStage::Acquire]);
        assert!(matches!(
            recorder.events_for(id).last(),
            Some(StageEvent::JobFinished(PipelineState::Failed(PipelineStage::Acquire)))
        ));
    }
}
