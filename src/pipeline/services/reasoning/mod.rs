//! Uniform access to the external visual-reasoning service.

mod classifier;
mod client;
mod gemini;
mod request;
mod scripted;

pub use classifier::classify;
pub use client::{ReasoningBackend, ReasoningClient, VisualReasoner};
pub use gemini::GeminiBackend;
pub use request::{BackendFailure, BackendReply, ExpectedShape, ReasoningAnswer, ReasoningRequest};
pub use scripted::ScriptedBackend;
