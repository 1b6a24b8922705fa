use std::time::Instant;

use crate::pipeline::types::{Job, WorkflowState};
use crate::pipeline::workspace::JobWorkspace;

use super::stage_timings::StageTimings;

/// Everything the pipeline needs to run a single job.
///
/// Owned by exactly one pipeline run; steps borrow it mutably one at a time.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job: Job,
    pub state: WorkflowState,
    pub workspace: JobWorkspace,
    pub timings: StageTimings,
    pub started: Instant,
}

impl JobContext {
    pub fn new(job: Job, workspace: JobWorkspace) -> Self {
        let state = WorkflowState::new(job.source.clone());
        Self {
            job,
            state,
            workspace,
            timings: StageTimings::new(),
            started: Instant::now(),
        }
    }
}
