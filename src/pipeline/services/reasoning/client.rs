use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ServiceError;
use crate::pipeline::services::factory::RetryPolicy;

use super::classifier::classify;
use super::request::{BackendFailure, BackendReply, ReasoningAnswer, ReasoningRequest};

/// Uniform call surface the stages use to talk to the reasoning service.
#[async_trait]
pub trait VisualReasoner: Send + Sync {
    async fn ask(&self, request: ReasoningRequest) -> Result<ReasoningAnswer, ServiceError>;
}

/// A single, unretried call to a concrete service.
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    async fn generate(&self, request: &ReasoningRequest) -> Result<BackendReply, BackendFailure>;

    fn name(&self) -> &'static str;
}

#[async_trait]
impl<B: ReasoningBackend + ?Sized> ReasoningBackend for std::sync::Arc<B> {
    async fn generate(&self, request: &ReasoningRequest) -> Result<BackendReply, BackendFailure> {
        (**self).generate(request).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Wraps a backend with a per-attempt timeout, failure classification and
/// exponential backoff on rate-limited or transient failures.
pub struct ReasoningClient<B> {
    backend: B,
    retry: RetryPolicy,
    attempt_timeout: Duration,
}

impl<B: ReasoningBackend> ReasoningClient<B> {
    pub fn new(backend: B, retry: RetryPolicy, attempt_timeout: Duration) -> Self {
        Self {
            backend,
            retry,
            attempt_timeout,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn attempt(&self, request: &ReasoningRequest) -> Result<BackendReply, ServiceError> {
        match tokio::time::timeout(self.attempt_timeout, self.backend.generate(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(failure)) => Err(ServiceError::new(classify(&failure), failure.to_string())),
            Err(_) => Err(ServiceError::transient(format!(
                "attempt timed out after {}ms",
                self.attempt_timeout.as_millis()
            ))),
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        let jitter = if self.retry.jitter_ms > 0 {
            rand::rng().random_range(0..=self.retry.jitter_ms)
        } else {
            0
        };
        self.retry.backoff(attempt) + Duration::from_millis(jitter)
    }
}

#[async_trait]
impl<B: ReasoningBackend> VisualReasoner for ReasoningClient<B> {
    async fn ask(&self, request: ReasoningRequest) -> Result<ReasoningAnswer, ServiceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(
                "{} attempt {}/{} with {} images",
                self.backend.name(),
                attempt,
                self.retry.max_attempts,
                request.images.len()
            );

            let error = match self.attempt(&request).await {
                // Shape violations are handed straight back to the stage
                Ok(reply) => return request.expected.interpret(reply),
                Err(error) => error,
            };

            if !error.kind.is_retryable() || attempt >= self.retry.max_attempts {
                return Err(error);
            }

            let delay = self.delay_after(attempt);
            warn!(
                "{} call failed ({}), retrying in {}ms",
                self.backend.name(),
                error,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}
