use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::error::AcquisitionError;
use crate::pipeline::types::ImageRef;

use super::{is_still_image, FrameSource, SamplingOptions};

/// Treats a local directory of stills as an already-sampled video.
///
/// Each still stands for one sample, so the implied duration is
/// `count × cadence`. Stills are copied in file-name order into the job's
/// frames directory as `frame_NNN.{ext}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryFrameSource;

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn acquire_and_sample(
        &self,
        source: &str,
        target_dir: &Path,
        sampling: &SamplingOptions,
    ) -> Result<Vec<ImageRef>, AcquisitionError> {
        let read_failed = |e: std::io::Error| AcquisitionError::DownloadFailed {
            attempts: 1,
            reason: format!("unable to read {}: {}", source, e),
        };

        let mut entries = tokio::fs::read_dir(source).await.map_err(read_failed)?;
        let mut stills = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
            let path = entry.path();
            if path.is_file() && is_still_image(&path) {
                stills.push(path);
            }
        }
        stills.sort();

        let implied_duration = stills.len() as u64 * sampling.cadence_seconds;
        if implied_duration > sampling.max_duration_seconds {
            return Err(AcquisitionError::DurationExceeded {
                duration_seconds: implied_duration as f64,
                limit_seconds: sampling.max_duration_seconds,
            });
        }

        let mut frames = Vec::with_capacity(stills.len().min(sampling.max_frames));
        for (index, still) in stills.iter().take(sampling.max_frames).enumerate() {
            let extension = still
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_ascii_lowercase())
                .unwrap_or_else(|| "jpg".to_string());
            let destination = target_dir.join(format!("frame_{:03}.{}", index, extension));

            tokio::fs::copy(still, &destination)
                .await
                .map_err(|e| AcquisitionError::SamplingFailed(e.to_string()))?;
            frames.push(ImageRef::new(destination));
        }

        if frames.is_empty() {
            return Err(AcquisitionError::NoFramesProduced);
        }

        info!("Loaded {} frames from {}", frames.len(), source);
        Ok(frames)
    }

    fn name(&self) -> &'static str {
        "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_stills(dir: &Path, count: usize) {
        for i in 0..count {
            std::fs::write(dir.join(format!("still_{:02}.jpg", i)), [i as u8]).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), b"ignored").unwrap();
    }

    #[tokio::test]
    async fn test_copies_stills_in_order() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        write_stills(source.path(), 4);

        let frames = DirectoryFrameSource
            .acquire_and_sample(
                source.path().to_str().unwrap(),
                target.path(),
                &SamplingOptions::default(),
            )
            .await
            .unwrap();

        let names: Vec<_> = frames.iter().filter_map(|f| f.file_name()).collect();
        assert_eq!(
            names,
            vec!["frame_000.jpg", "frame_001.jpg", "frame_002.jpg", "frame_003.jpg"]
        );
        assert_eq!(std::fs::read(frames[2].path()).unwrap(), vec![2u8]);
    }

    #[tokio::test]
    async fn test_respects_max_frames() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        write_stills(source.path(), 10);

        let sampling = SamplingOptions {
            max_frames: 3,
            ..SamplingOptions::default()
        };
        let frames = DirectoryFrameSource
            .acquire_and_sample(source.path().to_str().unwrap(), target.path(), &sampling)
            .await
            .unwrap();
        assert_eq!(frames.len(), 3);
    }

    #[tokio::test]
    async fn test_long_sources_are_rejected() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        write_stills(source.path(), 6);

        let sampling = SamplingOptions {
            cadence_seconds: 60,
            max_duration_seconds: 300,
            ..SamplingOptions::default()
        };
        let err = DirectoryFrameSource
            .acquire_and_sample(source.path().to_str().unwrap(), target.path(), &sampling)
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::DurationExceeded { limit_seconds: 300, .. }));
    }

    #[tokio::test]
    async fn test_empty_directory_produces_no_frames() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();

        let err = DirectoryFrameSource
            .acquire_and_sample(
                source.path().to_str().unwrap(),
                target.path(),
                &SamplingOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::NoFramesProduced));
    }
}
