use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use std::path::Path;
use tracing::debug;

use crate::error::RemoverUnavailable;
use crate::pipeline::services::artifacts::save_png;
use crate::pipeline::types::ImageRef;

use super::BackgroundRemover;

/// Colour-key remover keyed on the image border.
///
/// The background colour is the per-channel median of the border pixels.
/// Pixels within `tolerance` (Euclidean RGB distance) of it become fully
/// transparent; the following `feather` units ramp alpha up to opaque.
#[derive(Debug, Clone, Copy)]
pub struct BorderKeyRemover {
    pub tolerance: f32,
    pub feather: f32,
}

impl Default for BorderKeyRemover {
    fn default() -> Self {
        Self {
            tolerance: 40.0,
            feather: 30.0,
        }
    }
}

impl BorderKeyRemover {
    pub fn new(tolerance: f32, feather: f32) -> Self {
        Self { tolerance, feather }
    }

    pub fn key(&self, image: &DynamicImage) -> RgbaImage {
        let rgb = image.to_rgb8();
        let background = border_median(&rgb);
        let mut out = RgbaImage::new(rgb.width(), rgb.height());

        for (x, y, px) in rgb.enumerate_pixels() {
            let alpha = self.alpha_for(distance(px, &background));
            out.put_pixel(x, y, image::Rgba([px[0], px[1], px[2], alpha]));
        }

        out
    }

    fn alpha_for(&self, distance: f32) -> u8 {
        if distance <= self.tolerance {
            return 0;
        }
        if self.feather <= 0.0 || distance >= self.tolerance + self.feather {
            return 255;
        }
        (((distance - self.tolerance) / self.feather) * 255.0).round() as u8
    }
}

#[async_trait]
impl BackgroundRemover for BorderKeyRemover {
    async fn remove_background(
        &self,
        image: &ImageRef,
        destination: &Path,
    ) -> Result<ImageRef, RemoverUnavailable> {
        let bytes = image.read_bytes().await.map_err(|e| {
            RemoverUnavailable(format!("unable to read {}: {}", image.path().display(), e))
        })?;

        let remover = *self;
        let keyed = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|decoded| remover.key(&decoded))
        })
        .await
        .map_err(|e| RemoverUnavailable(format!("keying task failed: {}", e)))?
        .map_err(|e| RemoverUnavailable(format!("unable to decode source image: {}", e)))?;

        debug!("Keyed background of {}", image.path().display());
        save_png(DynamicImage::ImageRgba8(keyed), destination)
            .await
            .map_err(RemoverUnavailable)
    }
}

fn border_median(image: &RgbImage) -> Rgb<u8> {
    let (w, h) = image.dimensions();
    let mut channels: [Vec<u8>; 3] = Default::default();

    let mut push = |px: &Rgb<u8>| {
        for (c, values) in channels.iter_mut().enumerate() {
            values.push(px[c]);
        }
    };

    for x in 0..w {
        push(image.get_pixel(x, 0));
        if h > 1 {
            push(image.get_pixel(x, h - 1));
        }
    }
    for y in 1..h.saturating_sub(1) {
        push(image.get_pixel(0, y));
        if w > 1 {
            push(image.get_pixel(w - 1, y));
        }
    }

    let mut median = [0u8; 3];
    for (c, values) in channels.iter_mut().enumerate() {
        if values.is_empty() {
            continue;
        }
        values.sort_unstable();
        median[c] = values[values.len() / 2];
    }
    Rgb(median)
}

fn distance(a: &Rgb<u8>, b: &Rgb<u8>) -> f32 {
    let dr = a[0] as f32 - b[0] as f32;
    let dg = a[1] as f32 - b[1] as f32;
    let db = a[2] as f32 - b[2] as f32;
    (dr * dr + dg * dg + db * db).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    /// White 20×20 canvas with a red 8×8 square in the middle.
    fn product_on_white() -> DynamicImage {
        let img = ImageBuffer::from_fn(20, 20, |x, y| {
            if (6..14).contains(&x) && (6..14).contains(&y) {
                Rgb([200u8, 20, 20])
            } else {
                Rgb([250u8, 250, 250])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_border_becomes_transparent() {
        let keyed = BorderKeyRemover::default().key(&product_on_white());
        assert_eq!(keyed.get_pixel(0, 0)[3], 0);
        assert_eq!(keyed.get_pixel(19, 10)[3], 0);
        assert_eq!(keyed.get_pixel(10, 10)[3], 255);
        assert_eq!(keyed.get_pixel(10, 10)[0], 200);
    }

    #[test]
    fn test_feather_ramp() {
        let remover = BorderKeyRemover::new(10.0, 20.0);
        assert_eq!(remover.alpha_for(5.0), 0);
        assert_eq!(remover.alpha_for(20.0), 128);
        assert_eq!(remover.alpha_for(30.0), 255);
    }

    #[tokio::test]
    async fn test_writes_rgba_png() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("frame_000.png");
        product_on_white().save(&source).unwrap();
        let destination = dir.path().join("segmented.png");

        let out = BorderKeyRemover::default()
            .remove_background(&ImageRef::new(&source), &destination)
            .await
            .unwrap();

        let written = image::open(out.path()).unwrap();
        assert!(written.color().has_alpha());
    }

    #[tokio::test]
    async fn test_undecodable_input_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("frame_000.jpg");
        std::fs::write(&source, b"not an image").unwrap();

        let result = BorderKeyRemover::default()
            .remove_background(&ImageRef::new(&source), &dir.path().join("segmented.png"))
            .await;
        assert!(result.is_err());
    }
}
