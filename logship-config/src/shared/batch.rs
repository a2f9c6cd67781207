use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Batching knobs consumed by the host-side batching driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Maximum number of events handed to the sink in one batch.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
    /// Interval, in milliseconds, after which a partially filled batch is flushed.
    #[serde(default = "default_batch_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// Maximum number of events buffered before new events are dropped.
    #[serde(default = "default_batch_queue_limit")]
    pub queue_limit: usize,
}

impl BatchConfig {
    pub const DEFAULT_MAX_SIZE: usize = 10_000;

    pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 2_000;

    pub const DEFAULT_QUEUE_LIMIT: usize = 100_000;

    /// Validates batch configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.max_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.flush_interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.flush_interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.queue_limit < self.max_size {
            return Err(ValidationError::InvalidFieldValue {
                field: "batch.queue_limit".to_string(),
                constraint: "must be at least `batch.max_size`".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
            flush_interval_ms: default_batch_flush_interval_ms(),
            queue_limit: default_batch_queue_limit(),
        }
    }
}

fn default_batch_max_size() -> usize {
    BatchConfig::DEFAULT_MAX_SIZE
}

fn default_batch_flush_interval_ms() -> u64 {
    BatchConfig::DEFAULT_FLUSH_INTERVAL_MS
}

fn default_batch_queue_limit() -> usize {
    BatchConfig::DEFAULT_QUEUE_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(BatchConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_max_size_is_rejected() {
        let config = BatchConfig {
            max_size: 0,
            ..BatchConfig::default()
        };

        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidFieldValue {
                field: "batch.max_size".to_string(),
                constraint: "must be greater than 0".to_string(),
            })
        );
    }

    #[test]
    fn queue_smaller_than_batch_is_rejected() {
        let config = BatchConfig {
            max_size: 100,
            flush_interval_ms: 10,
            queue_limit: 10,
        };

        assert!(config.validate().is_err());
    }
}
