//! Frame acquisition collaborators: turn a source reference into sampled stills.

mod directory;
mod subprocess;
mod yt_dlp;

use async_trait::async_trait;
use std::path::Path;

use crate::error::AcquisitionError;
use crate::pipeline::types::ImageRef;

pub use directory::DirectoryFrameSource;
pub use subprocess::{run_tool, ToolError, ToolOutput};
pub use yt_dlp::{normalize_source_url, YtDlpFrameSource};

/// Sampling parameters handed to a [`FrameSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingOptions {
    /// Seconds between two sampled frames
    pub cadence_seconds: u64,
    pub max_frames: usize,
    pub max_duration_seconds: u64,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            cadence_seconds: 2,
            max_frames: 15,
            max_duration_seconds: 300,
        }
    }
}

/// Produces the ordered sampled frames for one job.
///
/// Frames are written into `target_dir` and returned in chronological order.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn acquire_and_sample(
        &self,
        source: &str,
        target_dir: &Path,
        sampling: &SamplingOptions,
    ) -> Result<Vec<ImageRef>, AcquisitionError>;

    fn name(&self) -> &'static str;
}

/// Sorted `frame_*` stills in `dir`.
pub(crate) async fn collect_frames(dir: &Path) -> std::io::Result<Vec<ImageRef>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut frames = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("frame_"))
            .unwrap_or(false);
        if is_frame && path.is_file() {
            frames.push(ImageRef::new(path));
        }
    }
    frames.sort();
    Ok(frames)
}

pub(crate) fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png" | "webp"))
        .unwrap_or(false)
}
