use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::WorkspaceError;
use crate::pipeline::services::prompts::EnhancementStyle;
use crate::pipeline::types::{ImageRef, JobId};

/// Allocates per-job directories under the static root and projects
/// artifacts to externally fetchable references.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    static_dir: PathBuf,
    public_prefix: String,
}

impl WorkspaceManager {
    pub fn new(static_dir: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            static_dir: static_dir.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create the static root if it is missing.
    pub async fn ensure_root(&self) -> Result<(), WorkspaceError> {
        create_dir(&self.static_dir).await
    }

    /// Create the private directory tree for one job.
    pub async fn allocate(&self, job_id: JobId) -> Result<JobWorkspace, WorkspaceError> {
        let job_dir = self.static_dir.join(job_id.to_string());
        let workspace = JobWorkspace {
            frames_dir: job_dir.join("frames"),
            enhanced_dir: job_dir.join("enhanced"),
            segmented_image_path: job_dir.join("segmented.png"),
            job_dir,
        };

        create_dir(&workspace.frames_dir).await?;
        create_dir(&workspace.enhanced_dir).await?;

        debug!("Allocated workspace {}", workspace.job_dir.display());
        Ok(workspace)
    }

    /// Project an artifact to `{prefix}/{path relative to the static root}`.
    pub fn public_url(&self, image: &ImageRef) -> Result<String, WorkspaceError> {
        let root = canonical(&self.static_dir)?;
        let path = canonical(image.path())?;

        let relative = path
            .strip_prefix(&root)
            .map_err(|_| WorkspaceError::OutsideStaticDir {
                path: path.clone(),
                static_dir: root.clone(),
            })?;

        let segments: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();

        Ok(format!("{}/{}", self.public_prefix, segments.join("/")))
    }
}

/// Paths owned by a single job.
#[derive(Debug, Clone)]
pub struct JobWorkspace {
    pub job_dir: PathBuf,
    pub frames_dir: PathBuf,
    pub segmented_image_path: PathBuf,
    pub enhanced_dir: PathBuf,
}

impl JobWorkspace {
    pub fn enhancement_path(&self, style: EnhancementStyle) -> PathBuf {
        self.enhanced_dir
            .join(format!("enhanced_{}.png", style.slug()))
    }
}

async fn create_dir(path: &Path) -> Result<(), WorkspaceError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| WorkspaceError::Create {
            path: path.to_path_buf(),
            source,
        })
}

fn canonical(path: &Path) -> Result<PathBuf, WorkspaceError> {
    path.canonicalize().map_err(|source| WorkspaceError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}
