use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::JobError;
use crate::pipeline::services::orchestration::{PipelineStage, PipelineState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One end-to-end request: a source reference turned into product imagery.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub source: String,
    pub workspace: PathBuf,
    pub created_at: DateTime<Utc>,
    state: PipelineState,
    error: Option<JobError>,
}

impl Job {
    pub fn new(id: JobId, source: impl Into<String>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            id,
            source: source.into(),
            workspace: workspace.into(),
            created_at: Utc::now(),
            state: PipelineState::Running(PipelineStage::Acquire),
            error: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn status(&self) -> JobStatus {
        match self.state {
            PipelineState::Running(_) => JobStatus::Pending,
            PipelineState::Done => JobStatus::Succeeded,
            PipelineState::Failed(_) => JobStatus::Failed,
        }
    }

    pub fn current_stage(&self) -> Option<PipelineStage> {
        match self.state {
            PipelineState::Running(stage) | PipelineState::Failed(stage) => Some(stage),
            PipelineState::Done => None,
        }
    }

    pub fn error(&self) -> Option<&JobError> {
        self.error.as_ref()
    }

    pub(crate) fn enter(&mut self, stage: PipelineStage) {
        self.state = PipelineState::Running(stage);
    }

    pub(crate) fn fail(&mut self, stage: PipelineStage, error: JobError) {
        self.state = PipelineState::Failed(stage);
        self.error = Some(error);
    }

    pub(crate) fn finish(&mut self) {
        self.state = PipelineState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcquisitionError;

    #[test]
    fn test_job_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| JobId::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_status_follows_state() {
        let mut job = Job::new(JobId::new(), "https://example.com/v", "/tmp/job");
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.current_stage(), Some(PipelineStage::Acquire));

        job.fail(
            PipelineStage::Acquire,
            AcquisitionError::NoFramesProduced.into(),
        );
        assert_eq!(job.status(), JobStatus::Failed);
        assert!(job.error().is_some());

        let mut job = Job::new(JobId::new(), "https://example.com/v", "/tmp/job");
        job.enter(PipelineStage::Enhance);
        job.finish();
        assert_eq!(job.status(), JobStatus::Succeeded);
        assert_eq!(job.current_stage(), None);
    }
}
