use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use crate::pipeline::types::JobId;

use super::pipeline_stage::{PipelineStage, PipelineState};

/// How a stage finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Primary,
    Fallback(String),
    Fatal(String),
}

/// Observer pattern for stage lifecycle events
pub trait StageObserver: Send + Sync {
    fn on_stage_started(&self, _job: JobId, _stage: PipelineStage) {}
    fn on_stage_finished(
        &self,
        _job: JobId,
        _stage: PipelineStage,
        _outcome: &StageOutcome,
        _elapsed: Duration,
    ) {
    }
    fn on_job_finished(&self, _job: JobId, _state: PipelineState) {}
}

/// Fans events out to every registered observer
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn StageObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn notify_stage_started(&self, job: JobId, stage: PipelineStage) {
        for observer in &self.observers {
            observer.on_stage_started(job, stage);
        }
    }

    pub fn notify_stage_finished(
        &self,
        job: JobId,
        stage: PipelineStage,
        outcome: &StageOutcome,
        elapsed: Duration,
    ) {
        for observer in &self.observers {
            observer.on_stage_finished(job, stage, outcome, elapsed);
        }
    }

    pub fn notify_job_finished(&self, job: JobId, state: PipelineState) {
        for observer in &self.observers {
            observer.on_job_finished(job, state);
        }
    }
}

/// Logs stage milestones through `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn on_stage_finished(
        &self,
        job: JobId,
        stage: PipelineStage,
        outcome: &StageOutcome,
        elapsed: Duration,
    ) {
        match outcome {
            StageOutcome::Primary => {
                info!(%job, "{} completed in {}ms", stage, elapsed.as_millis())
            }
            StageOutcome::Fallback(reason) => warn!(
                %job,
                "{} completed via fallback in {}ms: {}",
                stage,
                elapsed.as_millis(),
                reason
            ),
            // the pipeline already logs fatal errors
            StageOutcome::Fatal(_) => {}
        }
    }

    fn on_job_finished(&self, job: JobId, state: PipelineState) {
        info!(%job, "Job finished in state {:?}", state);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    Started(PipelineStage),
    Finished(PipelineStage, StageOutcome),
    JobFinished(PipelineState),
}

/// Keeps every event in memory, keyed by job
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(JobId, StageEvent)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(JobId, StageEvent)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn events_for(&self, job: JobId) -> Vec<StageEvent> {
        self.events()
            .into_iter()
            .filter(|(id, _)| *id == job)
            .map(|(_, event)| event)
            .collect()
    }

    /// Stages that were entered for `job`, in order
    pub fn started_stages(&self, job: JobId) -> Vec<PipelineStage> {
        self.events_for(job)
            .into_iter()
            .filter_map(|event| match event {
                StageEvent::Started(stage) => Some(stage),
                _ => None,
            })
            .collect()
    }

    fn push(&self, job: JobId, event: StageEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((job, event));
        }
    }
}

impl StageObserver for RecordingObserver {
    fn on_stage_started(&self, job: JobId, stage: PipelineStage) {
        self.push(job, StageEvent::Started(stage));
    }

    fn on_stage_finished(
        &self,
        job: JobId,
        stage: PipelineStage,
        outcome: &StageOutcome,
        _elapsed: Duration,
    ) {
        self.push(job, StageEvent::Finished(stage, outcome.clone()));
    }

    fn on_job_finished(&self, job: JobId, state: PipelineState) {
        self.push(job, StageEvent::JobFinished(state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_filters_by_job() {
        let recorder = Arc::new(RecordingObserver::new());
        let observers = ObserverSet::new()
            .add_observer(Arc::new(TracingObserver))
            .add_observer(recorder.clone());

        let first = JobId::new();
        let second = JobId::new();
        observers.notify_stage_started(first, PipelineStage::Acquire);
        observers.notify_stage_started(second, PipelineStage::Acquire);
        observers.notify_stage_finished(
            first,
            PipelineStage::Acquire,
            &StageOutcome::Primary,
            Duration::from_millis(3),
        );
        observers.notify_job_finished(first, PipelineState::Done);

        assert_eq!(
            recorder.events_for(first),
            vec![
                StageEvent::Started(PipelineStage::Acquire),
                StageEvent::Finished(PipelineStage::Acquire, StageOutcome::Primary),
                StageEvent::JobFinished(PipelineState::Done),
            ]
        );
        assert_eq!(recorder.started_stages(second), vec![PipelineStage::Acquire]);
    }
}
