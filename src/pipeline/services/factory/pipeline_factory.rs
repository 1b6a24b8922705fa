use std::sync::Arc;

use super::configuration::PipelineConfiguration;
use crate::error::ConfigError;
use crate::pipeline::services::{
    acquisition::{FrameSource, SamplingOptions},
    orchestration::{ObserverSet, ProcessingPipeline},
    reasoning::{ReasoningBackend, ReasoningClient, VisualReasoner},
    segmentation::BackgroundRemover,
    steps::{
        AcquisitionStep, BestFrameStep, EnhancementStep, IdentificationStep, SegmentationStep,
        ShortlistStep,
    },
};

/// External collaborators shared by every job the pipeline runs
#[derive(Clone)]
pub struct PipelineDependencies {
    pub frame_source: Arc<dyn FrameSource>,
    pub reasoner: Arc<dyn VisualReasoner>,
    pub remover: Arc<dyn BackgroundRemover>,
}

/// Factory for creating configured pipeline instances
pub struct PipelineFactory;

impl PipelineFactory {
    /// Wrap a raw backend in the retrying, classifying client.
    pub fn create_reasoner<B>(backend: B, config: &PipelineConfiguration) -> Arc<dyn VisualReasoner>
    where
        B: ReasoningBackend + 'static,
    {
        Arc::new(ReasoningClient::new(
            backend,
            config.retry.clone(),
            config.attempt_timeout(),
        ))
    }

    /// Create the six-stage pipeline
    pub fn create_standard(
        config: &PipelineConfiguration,
        sampling: SamplingOptions,
        dependencies: PipelineDependencies,
        observers: ObserverSet,
    ) -> Result<ProcessingPipeline, ConfigError> {
        config.validate().map_err(ConfigError::Invalid)?;

        let PipelineDependencies {
            frame_source,
            reasoner,
            remover,
        } = dependencies;

        ProcessingPipeline::builder()
            .add_step(Box::new(AcquisitionStep::new(frame_source, sampling)))
            .add_step(Box::new(ShortlistStep::new(
                reasoner.clone(),
                config.shortlist_size,
            )))
            .add_step(Box::new(IdentificationStep::new(
                reasoner.clone(),
                config.strict_identification,
            )))
            .add_step(Box::new(BestFrameStep::new(
                reasoner.clone(),
                config.selection_attempts,
            )))
            .add_step(Box::new(SegmentationStep::new(reasoner.clone(), remover)))
            .add_step(Box::new(EnhancementStep::new(
                reasoner,
                config.enhancement_styles.clone(),
                config.min_enhanced,
            )))
            .observers(observers)
            .build()
            .map_err(ConfigError::Invalid)
    }
}
