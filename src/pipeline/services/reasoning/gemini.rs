//! Google Generative Language REST backend.
//!
//! Requests go through a tower stack so that every job in the process shares
//! one cap on in-flight HTTP calls.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{limit::ConcurrencyLimit, Service, ServiceBuilder, ServiceExt};
use tracing::debug;

use crate::config::Settings;
use crate::error::ConfigError;

use super::client::ReasoningBackend;
use super::request::{BackendFailure, BackendReply, ExpectedShape, ReasoningRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "inline_data")]
    inline_data: Option<Blob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    #[serde(alias = "mime_type")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn inline(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(Blob {
                mime_type: mime_type.to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(bytes),
            }),
        }
    }
}

impl GenerateContentResponse {
    /// Concatenate text parts and take the first decodable inline image.
    fn into_reply(self) -> BackendReply {
        let mut texts = Vec::new();
        let mut image = None;

        for part in self.candidates.into_iter().flat_map(|c| c.content.parts) {
            if let Some(text) = part.text {
                texts.push(text);
            }
            if image.is_none() {
                if let Some(blob) = part.inline_data {
                    image = base64::engine::general_purpose::STANDARD
                        .decode(blob.data.as_bytes())
                        .ok();
                }
            }
        }

        BackendReply {
            text: if texts.is_empty() {
                None
            } else {
                Some(texts.join(""))
            },
            image,
        }
    }
}

struct GenerateCall {
    model: String,
    body: GenerateContentRequest,
}

/// HTTP transport for `models/{model}:generateContent`.
#[derive(Clone)]
struct GeminiTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl From<reqwest::Error> for BackendFailure {
    fn from(error: reqwest::Error) -> Self {
        let status = error.status().map(|s| s.as_u16());
        let message = if error.is_timeout() {
            format!("request timed out: {}", error)
        } else if error.is_connect() {
            format!("connection failed: {}", error)
        } else {
            error.to_string()
        };
        BackendFailure::new(status, message)
    }
}

impl Service<GenerateCall> for GeminiTransport {
    type Response = GenerateContentResponse;
    type Error = BackendFailure;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: GenerateCall) -> Self::Future {
        let client = self.client.clone();
        let url = format!("{}/models/{}:generateContent", self.endpoint, call.model);
        let api_key = self.api_key.clone();

        Box::pin(async move {
            let response = client
                .post(url)
                .header("x-goog-api-key", api_key)
                .json(&call.body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                return Err(BackendFailure::http(status.as_u16(), body));
            }

            response
                .json::<GenerateContentResponse>()
                .await
                .map_err(|e| BackendFailure::new(None, format!("malformed response body: {}", e)))
        })
    }
}

/// Multimodal backend for the Gemini API.
pub struct GeminiBackend {
    service: ConcurrencyLimit<GeminiTransport>,
    text_model: String,
    image_model: String,
}

impl GeminiBackend {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(settings.pipeline.attempt_timeout())
            .build()?;

        let transport = GeminiTransport {
            client,
            endpoint: settings.gemini_endpoint.trim_end_matches('/').to_string(),
            api_key: settings.require_api_key()?.to_string(),
        };

        let service = ServiceBuilder::new()
            .concurrency_limit(settings.pipeline.max_concurrent_requests)
            .service(transport);

        Ok(Self {
            service,
            text_model: settings.text_vision_model.clone(),
            image_model: settings.image_model.clone(),
        })
    }

    async fn build_call(&self, request: &ReasoningRequest) -> Result<GenerateCall, BackendFailure> {
        let mut parts = Vec::with_capacity(request.images.len() + 1);
        for image in &request.images {
            let bytes = image.read_bytes().await.map_err(|e| {
                BackendFailure::new(
                    None,
                    format!("failed to read image {}: {}", image.path().display(), e),
                )
            })?;
            parts.push(Part::inline(image.mime_type(), &bytes));
        }
        parts.push(Part::text(request.instruction.clone()));

        let (model, generation_config) = match request.expected {
            ExpectedShape::Image => (
                self.image_model.clone(),
                Some(GenerationConfig {
                    response_modalities: vec!["TEXT", "IMAGE"],
                }),
            ),
            _ => (self.text_model.clone(), None),
        };

        Ok(GenerateCall {
            model,
            body: GenerateContentRequest {
                contents: vec![Content { parts }],
                generation_config,
            },
        })
    }
}

#[async_trait]
impl ReasoningBackend for GeminiBackend {
    async fn generate(&self, request: &ReasoningRequest) -> Result<BackendReply, BackendFailure> {
        let call = self.build_call(request).await?;
        debug!("Calling Gemini model {}", call.model);

        let response = self.service.clone().oneshot(call).await?;
        Ok(response.into_reply())
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::ImageRef;

    #[test]
    fn test_reply_collects_text_and_image() {
        let body = serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is "},
                        {"text": "the image"},
                        {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
                    ]
                }
            }]
        });
        let response: GenerateContentResponse = serde_json::from_value(body).unwrap();
        let reply = response.into_reply();

        assert_eq!(reply.text.as_deref(), Some("Here is the image"));
        assert_eq!(reply.image.as_deref(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_reply_accepts_snake_case_inline_data() {
        let body = serde_json::json!({
            "candidates": [{"content": {"parts": [
                {"inline_data": {"mime_type": "image/png", "data": "aGk="}}
            ]}}]
        });
        let response: GenerateContentResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.into_reply().image.as_deref(), Some(&b"hi"[..]));
    }

    #[test]
    fn test_empty_response_has_no_content() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        let reply = response.into_reply();
        assert!(reply.text.is_none());
        assert!(reply.image.is_none());
    }

    #[tokio::test]
    async fn test_image_requests_use_image_model() {
        let dir = tempfile::tempdir().unwrap();
        let frame = dir.path().join("frame_000.jpg");
        std::fs::write(&frame, b"jpeg").unwrap();

        let settings = Settings {
            gemini_api_key: "test-key".to_string(),
            ..Settings::default()
        };
        let backend = GeminiBackend::new(&settings).unwrap();
        let request = ReasoningRequest::new(
            vec![ImageRef::new(&frame)],
            "remove the background",
            ExpectedShape::Image,
        );

        let call = backend.build_call(&request).await.unwrap();
        assert_eq!(call.model, settings.image_model);

        let json = serde_json::to_value(&call.body).unwrap();
        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "anBlZw==");
        assert_eq!(parts[1]["text"], "remove the background");
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["TEXT", "IMAGE"])
        );
    }

    #[tokio::test]
    async fn test_missing_image_fails_before_network() {
        let settings = Settings {
            gemini_api_key: "test-key".to_string(),
            ..Settings::default()
        };
        let backend = GeminiBackend::new(&settings).unwrap();
        let request = ReasoningRequest::new(
            vec![ImageRef::new("/nonexistent/frame.jpg")],
            "name it",
            ExpectedShape::Text,
        );

        let failure = backend.generate(&request).await.unwrap_err();
        assert!(failure.message.contains("failed to read image"));
    }
}
