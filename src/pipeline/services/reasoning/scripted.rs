use async_trait::async_trait;
use image::ImageFormat;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};

use super::client::ReasoningBackend;
use super::request::{BackendFailure, BackendReply, ExpectedShape, ReasoningRequest};

/// Deterministic offline backend.
///
/// Answers every request from its expected shape alone, so the same inputs
/// always produce the same artifacts. Used by `--offline` runs and tests.
#[derive(Debug)]
pub struct ScriptedBackend {
    product_name: String,
    best_index: usize,
    calls: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(product_name: impl Into<String>) -> Self {
        Self {
            product_name: product_name.into(),
            best_index: 0,
            calls: AtomicU32::new(0),
        }
    }

    /// Index returned for single-index questions, clamped to the candidates.
    pub fn with_best_index(mut self, index: usize) -> Self {
        self.best_index = index;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn echo_first_image(&self, request: &ReasoningRequest) -> Result<Vec<u8>, BackendFailure> {
        let first = request
            .images
            .first()
            .ok_or_else(|| BackendFailure::new(Some(400), "no image supplied"))?;

        let bytes = first.read_bytes().await.map_err(|e| {
            BackendFailure::new(None, format!("failed to read {}: {}", first.path().display(), e))
        })?;
        let decoded = image::load_from_memory(&bytes)
            .map_err(|e| BackendFailure::new(Some(400), format!("unreadable image: {}", e)))?;

        let mut png = Vec::new();
        decoded
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| BackendFailure::new(Some(500), format!("png encoding failed: {}", e)))?;
        Ok(png)
    }
}

#[async_trait]
impl ReasoningBackend for ScriptedBackend {
    async fn generate(&self, request: &ReasoningRequest) -> Result<BackendReply, BackendFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match request.expected {
            ExpectedShape::Text => Ok(BackendReply::text(self.product_name.clone())),
            ExpectedShape::Index { len } => {
                let index = self.best_index.min(len.saturating_sub(1));
                Ok(BackendReply::text(index.to_string()))
            }
            ExpectedShape::IndexList { len, max } => {
                // latest frames first
                let indices: Vec<String> = (0..len).rev().take(max).map(|i| i.to_string()).collect();
                Ok(BackendReply::text(indices.join(", ")))
            }
            ExpectedShape::Image => Ok(BackendReply::image(self.echo_first_image(request).await?)),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::services::reasoning::ReasoningAnswer;
    use crate::pipeline::types::ImageRef;
    use image::{ImageBuffer, Rgb};

    #[tokio::test]
    async fn test_index_list_prefers_latest_frames() {
        let backend = ScriptedBackend::new("Desk Lamp");
        let request = ReasoningRequest::new(
            Vec::new(),
            "shortlist",
            ExpectedShape::IndexList { len: 12, max: 3 },
        );

        let reply = backend.generate(&request).await.unwrap();
        let answer = request.expected.interpret(reply).unwrap();
        assert!(matches!(answer, ReasoningAnswer::Indices(ref v) if v == &vec![11, 10, 9]));
    }

    #[tokio::test]
    async fn test_index_is_clamped() {
        let backend = ScriptedBackend::new("Desk Lamp").with_best_index(7);
        let request = ReasoningRequest::new(Vec::new(), "best", ExpectedShape::Index { len: 3 });
        let reply = backend.generate(&request).await.unwrap();
        assert_eq!(reply.text.as_deref(), Some("2"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_image_echo_is_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame_000.jpg");
        ImageBuffer::from_pixel(8, 8, Rgb([200u8, 10, 10]))
            .save(&path)
            .unwrap();

        let backend = ScriptedBackend::new("Desk Lamp");
        let request = ReasoningRequest::new(vec![ImageRef::new(&path)], "cut", ExpectedShape::Image);
        let reply = backend.generate(&request).await.unwrap();

        let bytes = reply.image.unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }
}
