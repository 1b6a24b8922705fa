//! Local, non-AI background removal.

mod border_key;

use async_trait::async_trait;
use std::path::Path;

use crate::error::RemoverUnavailable;
use crate::pipeline::types::ImageRef;

pub use border_key::BorderKeyRemover;

/// Cuts the subject out of `image`, writing an RGBA PNG to `destination`.
///
/// Any I/O or decode failure is reported as unavailability.
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    async fn remove_background(
        &self,
        image: &ImageRef,
        destination: &Path,
    ) -> Result<ImageRef, RemoverUnavailable>;
}
