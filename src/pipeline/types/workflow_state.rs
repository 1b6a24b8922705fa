use crate::error::StateError;
use crate::pipeline::services::orchestration::PipelineStage;
use crate::pipeline::types::{ImageRef, ProductLabel};

/// A state field that only its owning stage may write.
#[derive(Debug, Clone)]
pub struct StageField<T> {
    name: &'static str,
    owner: PipelineStage,
    write_once: bool,
    value: Option<T>,
}

impl<T> StageField<T> {
    fn new(name: &'static str, owner: PipelineStage) -> Self {
        Self {
            name,
            owner,
            write_once: false,
            value: None,
        }
    }

    fn frozen(name: &'static str, owner: PipelineStage) -> Self {
        Self {
            write_once: true,
            ..Self::new(name, owner)
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    fn set(&mut self, writer: PipelineStage, value: T) -> Result<(), StateError> {
        if writer != self.owner {
            return Err(StateError::OwnershipViolation {
                field: self.name,
                owner: self.owner,
                writer,
            });
        }
        if self.write_once && self.value.is_some() {
            return Err(StateError::Frozen(self.name));
        }
        self.value = Some(value);
        Ok(())
    }

    fn require(&self, reader: PipelineStage) -> Result<&T, StateError> {
        self.value.as_ref().ok_or(StateError::MissingInput {
            field: self.name,
            stage: reader,
        })
    }
}

/// The record threaded through every stage of one job.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    source: String,
    sampled_frames: StageField<Vec<ImageRef>>,
    shortlist: StageField<Vec<ImageRef>>,
    product_label: StageField<ProductLabel>,
    best_frame: StageField<ImageRef>,
    segmented_image: StageField<ImageRef>,
    enhanced_images: StageField<Vec<ImageRef>>,
    last_error: Option<String>,
}

impl WorkflowState {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            sampled_frames: StageField::frozen("sampled_frames", PipelineStage::Acquire),
            shortlist: StageField::new("shortlist", PipelineStage::Shortlist),
            product_label: StageField::new("product_label", PipelineStage::Identify),
            best_frame: StageField::new("best_frame", PipelineStage::SelectBest),
            segmented_image: StageField::new("segmented_image", PipelineStage::Segment),
            enhanced_images: StageField::new("enhanced_images", PipelineStage::Enhance),
            last_error: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn sampled_frames(&self) -> &[ImageRef] {
        self.sampled_frames.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn shortlist(&self) -> &[ImageRef] {
        self.shortlist.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn product_label(&self) -> Option<&ProductLabel> {
        self.product_label.get()
    }

    pub fn best_frame(&self) -> Option<&ImageRef> {
        self.best_frame.get()
    }

    pub fn segmented_image(&self) -> Option<&ImageRef> {
        self.segmented_image.get()
    }

    pub fn enhanced_images(&self) -> &[ImageRef] {
        self.enhanced_images.get().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn require_sampled_frames(&self, reader: PipelineStage) -> Result<&[ImageRef], StateError> {
        self.sampled_frames.require(reader).map(Vec::as_slice)
    }

    pub fn require_shortlist(&self, reader: PipelineStage) -> Result<&[ImageRef], StateError> {
        self.shortlist.require(reader).map(Vec::as_slice)
    }

    pub fn require_best_frame(&self, reader: PipelineStage) -> Result<&ImageRef, StateError> {
        self.best_frame.require(reader)
    }

    pub fn require_segmented_image(&self, reader: PipelineStage) -> Result<&ImageRef, StateError> {
        self.segmented_image.require(reader)
    }

    pub fn set_sampled_frames(
        &mut self,
        writer: PipelineStage,
        frames: Vec<ImageRef>,
    ) -> Result<(), StateError> {
        self.sampled_frames.set(writer, frames)
    }

    pub fn set_shortlist(
        &mut self,
        writer: PipelineStage,
        shortlist: Vec<ImageRef>,
    ) -> Result<(), StateError> {
        self.shortlist.set(writer, shortlist)
    }

    pub fn set_product_label(
        &mut self,
        writer: PipelineStage,
        label: ProductLabel,
    ) -> Result<(), StateError> {
        self.product_label.set(writer, label)
    }

    pub fn set_best_frame(&mut self, writer: PipelineStage, frame: ImageRef) -> Result<(), StateError> {
        self.best_frame.set(writer, frame)
    }

    pub fn set_segmented_image(
        &mut self,
        writer: PipelineStage,
        image: ImageRef,
    ) -> Result<(), StateError> {
        self.segmented_image.set(writer, image)
    }

    pub fn set_enhanced_images(
        &mut self,
        writer: PipelineStage,
        images: Vec<ImageRef>,
    ) -> Result<(), StateError> {
        self.enhanced_images.set(writer, images)
    }

    /// Record an absorbed failure. Any stage may write this.
    pub fn record_error(&mut self, stage: PipelineStage, error: impl std::fmt::Display) {
        self.last_error = Some(format!("{}: {}", stage, error));
    }
}
