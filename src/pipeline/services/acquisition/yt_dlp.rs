use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::AcquisitionError;
use crate::pipeline::types::ImageRef;

use super::subprocess::run_tool;
use super::{collect_frames, FrameSource, SamplingOptions};

const DOWNLOAD_ATTEMPTS: u32 = 3;
const INITIAL_SOCKET_TIMEOUT_SECS: u64 = 120;
const MAX_SOCKET_TIMEOUT_SECS: u64 = 300;

/// Downloads with `yt-dlp` and samples stills with `ffmpeg`.
#[derive(Debug, Clone)]
pub struct YtDlpFrameSource {
    yt_dlp_path: String,
    ffmpeg_path: String,
    download_timeout: Duration,
    sampling_timeout: Duration,
    retry_wait_unit: Duration,
}

impl Default for YtDlpFrameSource {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            download_timeout: Duration::from_secs(900),
            sampling_timeout: Duration::from_secs(300),
            retry_wait_unit: Duration::from_secs(5),
        }
    }
}

impl YtDlpFrameSource {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            yt_dlp_path: settings.yt_dlp_path.clone(),
            ffmpeg_path: settings.ffmpeg_path.clone(),
            ..Self::default()
        }
    }

    /// Scale of the linear wait between download attempts (attempt × unit).
    pub fn with_retry_wait_unit(mut self, unit: Duration) -> Self {
        self.retry_wait_unit = unit;
        self
    }

    /// Download into `dir`, returning the media path and the reported duration.
    async fn download(&self, url: &str, dir: &Path) -> Result<(PathBuf, Option<f64>), AcquisitionError> {
        let mut socket_timeout = INITIAL_SOCKET_TIMEOUT_SECS;
        let mut last_error = String::new();

        for attempt in 1..=DOWNLOAD_ATTEMPTS {
            info!("Downloading video (attempt {}/{}): {}", attempt, DOWNLOAD_ATTEMPTS, url);

            let mut cmd = Command::new(&self.yt_dlp_path);
            cmd.arg("--no-playlist")
                .arg("--no-progress")
                .args(["-f", "worst"])
                .args(["--socket-timeout", &socket_timeout.to_string()])
                .args(["--retries", "10", "--fragment-retries", "10"])
                .args(["--print", "duration", "--print", "after_move:filepath", "--no-simulate"])
                .arg("-o")
                .arg(dir.join("video.%(ext)s"))
                .arg(url);

            match run_tool(&mut cmd, self.download_timeout).await {
                Ok(output) => {
                    for warning in output.warnings() {
                        warn!("yt-dlp: {}", warning);
                    }
                    info!("Download finished in {:.1}s", output.elapsed.as_secs_f64());
                    return parse_download_output(&output.stdout);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!("Download attempt {} failed: {}", attempt, last_error);
                }
            }

            if attempt < DOWNLOAD_ATTEMPTS {
                tokio::time::sleep(self.retry_wait_unit * attempt).await;
                socket_timeout = (socket_timeout + 30).min(MAX_SOCKET_TIMEOUT_SECS);
            }
        }

        Err(AcquisitionError::DownloadFailed {
            attempts: DOWNLOAD_ATTEMPTS,
            reason: last_error,
        })
    }

    async fn sample(
        &self,
        video: &Path,
        target_dir: &Path,
        sampling: &SamplingOptions,
    ) -> Result<Vec<ImageRef>, AcquisitionError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(video)
            .args(["-vf", &format!("fps=1/{}", sampling.cadence_seconds)])
            .args(["-frames:v", &sampling.max_frames.to_string()])
            .args(["-q:v", "2", "-start_number", "0"])
            .arg(target_dir.join("frame_%03d.jpg"));

        let output = run_tool(&mut cmd, self.sampling_timeout)
            .await
            .map_err(|e| AcquisitionError::SamplingFailed(e.to_string()))?;
        debug!("ffmpeg sampled frames in {:?}", output.elapsed);

        let mut frames = collect_frames(target_dir)
            .await
            .map_err(|e| AcquisitionError::SamplingFailed(e.to_string()))?;
        frames.truncate(sampling.max_frames);
        Ok(frames)
    }
}

#[async_trait]
impl FrameSource for YtDlpFrameSource {
    async fn acquire_and_sample(
        &self,
        source: &str,
        target_dir: &Path,
        sampling: &SamplingOptions,
    ) -> Result<Vec<ImageRef>, AcquisitionError> {
        let url = normalize_source_url(source);
        let download_dir = tempfile::tempdir()
            .map_err(|e| AcquisitionError::DownloadFailed {
                attempts: 0,
                reason: format!("unable to create download directory: {}", e),
            })?;

        let (video, duration) = self.download(&url, download_dir.path()).await?;

        if let Some(duration_seconds) = duration {
            if duration_seconds > sampling.max_duration_seconds as f64 {
                return Err(AcquisitionError::DurationExceeded {
                    duration_seconds,
                    limit_seconds: sampling.max_duration_seconds,
                });
            }
        }

        let frames = self.sample(&video, target_dir, sampling).await?;
        if frames.is_empty() {
            return Err(AcquisitionError::NoFramesProduced);
        }

        info!("Sampled {} frames from {}", frames.len(), url);
        Ok(frames)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Rewrite YouTube Shorts links to the regular watch form.
pub fn normalize_source_url(url: &str) -> String {
    match url.split_once("/shorts/") {
        Some((_, rest)) => {
            let id = rest.split(['?', '&', '/']).next().unwrap_or_default();
            format!("https://www.youtube.com/watch?v={}", id)
        }
        None => url.to_string(),
    }
}

fn parse_download_output(stdout: &str) -> Result<(PathBuf, Option<f64>), AcquisitionError> {
    let mut lines = stdout.lines().map(str::trim).filter(|line| !line.is_empty());

    let duration = lines.next().and_then(|line| line.parse::<f64>().ok());
    let path = lines
        .last()
        .map(PathBuf::from)
        .ok_or_else(|| AcquisitionError::DownloadFailed {
            attempts: 1,
            reason: "yt-dlp did not report a downloaded file".to_string(),
        })?;

    Ok((path, duration))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shorts_urls_are_normalized() {
        assert_eq!(
            normalize_source_url("https://youtube.com/shorts/abc123?feature=share"),
            "https://www.youtube.com/watch?v=abc123"
        );
        assert_eq!(
            normalize_source_url("https://www.youtube.com/watch?v=xyz"),
            "https://www.youtube.com/watch?v=xyz"
        );
    }

    #[test]
    fn test_parse_download_output() {
        let (path, duration) =
            parse_download_output("42.5\n/tmp/dl/video.mp4\n").unwrap();
        assert_eq!(path, PathBuf::from("/tmp/dl/video.mp4"));
        assert_eq!(duration, Some(42.5));

        let (_, duration) = parse_download_output("NA\n/tmp/dl/video.webm\n").unwrap();
        assert_eq!(duration, None);

        assert!(parse_download_output("").is_err());
    }

    #[tokio::test]
    async fn test_missing_downloader_fails_after_all_attempts() {
        let source = YtDlpFrameSource {
            yt_dlp_path: "definitely-not-yt-dlp-9313".to_string(),
            ..YtDlpFrameSource::default()
        }
        .with_retry_wait_unit(Duration::from_millis(1));
        let target = tempfile::tempdir().unwrap();

        let err = source
            .acquire_and_sample(
                "https://youtube.com/watch?v=x",
                target.path(),
                &SamplingOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AcquisitionError::DownloadFailed { attempts: 3, .. }));
    }
}
