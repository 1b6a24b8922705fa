use indexmap::IndexMap;
use std::time::Duration;

use super::pipeline_stage::PipelineStage;

/// Wall-clock time spent in each stage, in execution order
#[derive(Debug, Clone, Default)]
pub struct StageTimings {
    durations: IndexMap<PipelineStage, Duration>,
}

impl StageTimings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stage: PipelineStage, duration: Duration) {
        *self.durations.entry(stage).or_default() += duration;
    }

    pub fn get(&self, stage: PipelineStage) -> Option<Duration> {
        self.durations.get(&stage).copied()
    }

    pub fn total(&self) -> Duration {
        self.durations.values().sum()
    }

    /// Stages that ran, in the order they ran
    pub fn stages(&self) -> impl Iterator<Item = PipelineStage> + '_ {
        self.durations.keys().copied()
    }
}
