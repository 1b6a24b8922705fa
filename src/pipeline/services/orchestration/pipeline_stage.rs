use serde::Serialize;

/// One step of the job state machine.
///
/// Stages execute strictly in `priority()` order; no stage revisits an earlier one.
/// Implements Ord based on priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    /// Download the source and sample frames
    Acquire,
    /// Reduce the sampled frames to a small candidate set
    Shortlist,
    /// Name the product shown in the candidates
    Identify,
    /// Pick the clearest candidate frame
    SelectBest,
    /// Cut the product out of the best frame
    Segment,
    /// Re-render the cut-out in marketing styles
    Enhance,
}

impl PipelineStage {
    pub const ORDERED: [PipelineStage; 6] = [
        PipelineStage::Acquire,
        PipelineStage::Shortlist,
        PipelineStage::Identify,
        PipelineStage::SelectBest,
        PipelineStage::Segment,
        PipelineStage::Enhance,
    ];

    /// Get display name for the stage
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Acquire => "ACQUIRE",
            PipelineStage::Shortlist => "SHORTLIST",
            PipelineStage::Identify => "IDENTIFY",
            PipelineStage::SelectBest => "SELECT_BEST",
            PipelineStage::Segment => "SEGMENT",
            PipelineStage::Enhance => "ENHANCE",
        }
    }

    /// Get the execution order priority (lower executes first)
    pub fn priority(&self) -> u8 {
        match self {
            PipelineStage::Acquire => 1,
            PipelineStage::Shortlist => 2,
            PipelineStage::Identify => 3,
            PipelineStage::SelectBest => 4,
            PipelineStage::Segment => 5,
            PipelineStage::Enhance => 6,
        }
    }

    /// The stage that follows this one, or `None` after the last stage.
    pub fn next(&self) -> Option<PipelineStage> {
        Self::ORDERED
            .iter()
            .copied()
            .find(|stage| stage.priority() == self.priority() + 1)
    }
}

impl PartialOrd for PipelineStage {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PipelineStage {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a job currently sits in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Running(PipelineStage),
    Done,
    Failed(PipelineStage),
}
