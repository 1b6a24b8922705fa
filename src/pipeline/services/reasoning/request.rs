use image::DynamicImage;

use crate::error::ServiceError;
use crate::pipeline::types::ImageRef;

/// Shape the caller expects back from the reasoning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedShape {
    /// A short, non-empty string
    Text,
    /// A single zero-based index into `len` images
    Index { len: usize },
    /// Up to `max` distinct zero-based indices into `len` images, best first
    IndexList { len: usize, max: usize },
    /// An image decodable by the `image` crate
    Image,
}

#[derive(Debug, Clone)]
pub struct ReasoningRequest {
    pub images: Vec<ImageRef>,
    pub instruction: String,
    pub expected: ExpectedShape,
}

impl ReasoningRequest {
    pub fn new(images: Vec<ImageRef>, instruction: impl Into<String>, expected: ExpectedShape) -> Self {
        Self {
            images,
            instruction: instruction.into(),
            expected,
        }
    }
}

/// A validated answer, already in the expected shape.
#[derive(Debug, Clone)]
pub enum ReasoningAnswer {
    Text(String),
    Index(usize),
    Indices(Vec<usize>),
    Image(DynamicImage),
}

/// Raw output of one backend call, before shape validation.
#[derive(Debug, Clone, Default)]
pub struct BackendReply {
    pub text: Option<String>,
    pub image: Option<Vec<u8>>,
}

impl BackendReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
        }
    }

    pub fn image(bytes: Vec<u8>) -> Self {
        Self {
            text: None,
            image: Some(bytes),
        }
    }
}

/// Opaque failure reported by a backend. Classified in one place by
/// [`classify`](super::classify).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl BackendFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::new(Some(status), body)
    }
}

impl std::fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "({}) {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl ExpectedShape {
    /// Validate a reply against this shape. Anything that does not fit is an
    /// `InvalidResponse`.
    pub fn interpret(&self, reply: BackendReply) -> Result<ReasoningAnswer, ServiceError> {
        match *self {
            ExpectedShape::Text => {
                let text = reply.text.unwrap_or_default();
                let text = text.trim();
                if text.is_empty() {
                    return Err(ServiceError::invalid_response("empty text answer"));
                }
                Ok(ReasoningAnswer::Text(text.to_string()))
            }
            ExpectedShape::Index { len } => {
                let text = reply.text.unwrap_or_default();
                let index = integers(&text)
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        ServiceError::invalid_response(format!(
                            "unable to parse frame index from answer: {:?}",
                            text.trim()
                        ))
                    })?;
                Ok(ReasoningAnswer::Index(in_range(index, len)?))
            }
            ExpectedShape::IndexList { len, max } => {
                let text = reply.text.unwrap_or_default();
                let mut indices = Vec::new();
                for value in integers(&text) {
                    let index = in_range(value, len)?;
                    if !indices.contains(&index) {
                        indices.push(index);
                    }
                }
                indices.truncate(max);
                if indices.is_empty() {
                    return Err(ServiceError::invalid_response(format!(
                        "no frame indices in answer: {:?}",
                        text.trim()
                    )));
                }
                Ok(ReasoningAnswer::Indices(indices))
            }
            ExpectedShape::Image => {
                let bytes = reply
                    .image
                    .ok_or_else(|| ServiceError::invalid_response("no image data in response"))?;
                image::load_from_memory(&bytes)
                    .map(ReasoningAnswer::Image)
                    .map_err(|e| {
                        ServiceError::invalid_response(format!("undecodable image data: {}", e))
                    })
            }
        }
    }
}

fn in_range(value: i64, len: usize) -> Result<usize, ServiceError> {
    if value < 0 || value as u64 >= len as u64 {
        return Err(ServiceError::invalid_response(format!(
            "frame index {} out of range (0-{})",
            value,
            len as i64 - 1
        )));
    }
    Ok(value as usize)
}

/// Every integer in `text`, in order of appearance.
///
/// A `-` is a sign only at the start of the text or after whitespace;
/// elsewhere (`2-4`, `frame-3`) it separates numbers.
fn integers(text: &str) -> Vec<i64> {
    let mut values = Vec::new();
    let mut digits = String::new();
    let mut negative = false;
    let mut previous = ' ';
    let mut before_previous = ' ';

    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            if digits.is_empty() {
                negative = previous == '-' && before_previous.is_whitespace();
            }
            digits.push(c);
        } else if !digits.is_empty() {
            if let Ok(value) = digits.parse::<i64>() {
                values.push(if negative { -value } else { value });
            }
            digits.clear();
        }
        before_previous = previous;
        previous = c;
    }

    values
}
