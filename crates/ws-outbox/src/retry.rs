// retry.rs — Exponential backoff for outbox delivery.
//
// delay(n) = base · 2^(n-1), capped at max, where n is the retry count after
// the failure being scheduled (1 for the first failure). Once `max_attempts`
// deliveries have failed the event is dead-lettered instead.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::OutboxError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_secs() -> u64 {
    30
}

fn default_max_delay_secs() -> u64 {
    3600
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), OutboxError> {
        if self.max_attempts == 0 {
            return Err(OutboxError::InvalidPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay_secs > self.max_delay_secs {
            return Err(OutboxError::InvalidPolicy(format!(
                "base_delay_secs ({}) exceeds max_delay_secs ({})",
                self.base_delay_secs, self.max_delay_secs
            )));
        }
        Ok(())
    }

    /// Delay before the next attempt after `retry_count` failures.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(32);
        let factor = 1u64 << exponent;
        let secs = self
            .base_delay_secs
            .saturating_mul(factor)
            .min(self.max_delay_secs);
        Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1000))
    }

    /// Whether `retry_count` failures exhaust the policy.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_then_caps() {
        let policy = RetryPolicy {
            base_delay_secs: 10,
            max_delay_secs: 60,
            max_attempts: 10,
        };
        assert_eq!(policy.delay_for(1), Duration::seconds(10));
        assert_eq!(policy.delay_for(2), Duration::seconds(20));
        assert_eq!(policy.delay_for(3), Duration::seconds(40));
        assert_eq!(policy.delay_for(4), Duration::seconds(60));
        assert_eq!(policy.delay_for(40), Duration::seconds(60));
    }

    #[test]
    fn exhaustion() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(4));
        assert!(policy.is_exhausted(5));
    }

    #[test]
    fn validation() {
        assert!(RetryPolicy::default().validate().is_ok());
        let zero = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(zero.validate().is_err());
    }
}
