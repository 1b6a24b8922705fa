use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::pipeline::services::prompts::EnhancementStyle;

/// Configuration options for the product extraction pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfiguration {
    /// Maximum number of frames kept by the shortlisting stage
    pub shortlist_size: usize,
    /// Independent attempts the best frame stage makes before falling back
    pub selection_attempts: u32,
    /// Minimum number of enhanced images every successful job returns
    pub min_enhanced: usize,
    /// Enhancement styles in priority order
    pub enhancement_styles: Vec<EnhancementStyle>,
    /// Escalate identification failures to a fatal job error
    pub strict_identification: bool,
    /// Retry budget applied to every reasoning service call
    pub retry: RetryPolicy,
    /// Upper bound on a single reasoning service attempt
    pub attempt_timeout_ms: u64,
    /// Process-wide cap on in-flight requests to the generation service
    pub max_concurrent_requests: usize,
}

impl Default for PipelineConfiguration {
    fn default() -> Self {
        Self {
            shortlist_size: 3,
            selection_attempts: 3,
            min_enhanced: 2,
            enhancement_styles: EnhancementStyle::all().to_vec(),
            strict_identification: false,
            retry: RetryPolicy::default(),
            attempt_timeout_ms: 60_000,
            max_concurrent_requests: 4,
        }
    }
}

impl PipelineConfiguration {
    /// Create configuration that never waits between attempts.
    /// Intended for offline runs against deterministic backends.
    pub fn immediate() -> Self {
        Self {
            retry: RetryPolicy::immediate(3),
            attempt_timeout_ms: 5_000,
            ..Self::default()
        }
    }

    /// Create configuration for deployments where the product name is mandatory
    pub fn strict() -> Self {
        Self {
            strict_identification: true,
            ..Self::default()
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.shortlist_size == 0 {
            return Err("Shortlist size must be greater than 0".to_string());
        }

        if self.selection_attempts == 0 {
            return Err("Selection attempts must be greater than 0".to_string());
        }

        if self.min_enhanced == 0 {
            return Err("Minimum enhanced count must be greater than 0".to_string());
        }

        if self.enhancement_styles.is_empty() {
            return Err("At least one enhancement style is required".to_string());
        }

        if self.attempt_timeout_ms == 0 {
            return Err("Attempt timeout must be greater than 0".to_string());
        }

        if self.max_concurrent_requests == 0 {
            return Err("Max concurrent requests must be greater than 0".to_string());
        }

        self.retry.validate()
    }
}

/// Exponential backoff applied to rate-limited and transient failures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Random extra delay in `[0, jitter_ms]` added to every backoff
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 8_000,
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
        }
    }

    /// Delay before the retry that follows `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("Retry max attempts must be greater than 0".to_string());
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err("Retry base delay must not exceed the max delay".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_valid() {
        assert!(PipelineConfiguration::default().validate().is_ok());
        assert!(PipelineConfiguration::immediate().validate().is_ok());
        assert!(PipelineConfiguration::strict().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_styles() {
        let config = PipelineConfiguration {
            enhancement_styles: Vec::new(),
            ..PipelineConfiguration::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 3_000,
            jitter_ms: 0,
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(4), Duration::from_millis(3_000));
        assert_eq!(policy.backoff(40), Duration::from_millis(3_000));
    }

    #[test]
    fn test_immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff(1), Duration::ZERO);
        assert_eq!(policy.backoff(3), Duration::ZERO);
    }
}
