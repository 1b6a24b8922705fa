use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};

use crate::pipeline::types::ImageRef;

/// Encode `image` as PNG at `destination` on the blocking pool.
pub async fn save_png(image: DynamicImage, destination: &Path) -> Result<ImageRef, String> {
    let path: PathBuf = destination.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("unable to create {}: {}", parent.display(), e))?;
        }
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| format!("unable to write {}: {}", path.display(), e))?;
        Ok(ImageRef::new(path))
    })
    .await
    .map_err(|e| format!("png encoder task failed: {}", e))?
}
