//! Image storage configuration.
//!
//! All settings are passed explicitly to the coordinator and backend at
//! construction; nothing here is process-global.

use std::time::Duration;

use crate::retry::FixedBackoff;

/// What a restore leaves behind when the local store rejects a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestoreFailurePolicy {
    /// Keep the records applied before the failure (default).
    ///
    /// Safe to follow with another restore: writes are keyed by id, so a
    /// replay only duplicates work.
    #[default]
    LeavePartial,
    /// Undo this restore's writes before reporting the failure: ids it
    /// added are removed and ids it overwrote get their previous value back
    RemoveApplied,
}

/// Image storage configuration parameters.
#[derive(Debug, Clone)]
pub struct ImageStorageConfig {
    /// Folder (object name prefix) holding images and signatures (default: "images").
    pub folder: String,

    /// Delay between retries of a failed save/load (default: 5s).
    pub retry_interval: Duration,

    /// Maximum attempts per operation (default: unbounded).
    ///
    /// `None` retries until success or cancellation.
    pub max_attempts: Option<u32>,

    /// Maximum concurrent backend requests (default: 8 × available parallelism).
    pub connection_limit: usize,

    /// Per-request execution time limit (default: none).
    pub request_timeout: Option<Duration>,

    /// Restore behavior on a fatal local store rejection.
    pub restore_failure_policy: RestoreFailurePolicy,
}

/// Default connection limit: eight connections per available core
pub fn default_connection_limit() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        * 8
}

impl Default for ImageStorageConfig {
    fn default() -> Self {
        ImageStorageConfig {
            folder: "images".to_string(),
            retry_interval: Duration::from_secs(5),
            max_attempts: None,
            connection_limit: default_connection_limit(),
            request_timeout: None,
            restore_failure_policy: RestoreFailurePolicy::LeavePartial,
        }
    }
}

impl ImageStorageConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the object folder (builder pattern).
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    /// Set the retry interval (builder pattern).
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Cap the number of attempts per operation (builder pattern).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the backend connection limit (builder pattern).
    pub fn with_connection_limit(mut self, limit: usize) -> Self {
        self.connection_limit = limit;
        self
    }

    /// Set the per-request time limit (builder pattern).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the restore failure policy (builder pattern).
    pub fn with_restore_failure_policy(mut self, policy: RestoreFailurePolicy) -> Self {
        self.restore_failure_policy = policy;
        self
    }

    /// The retry policy these settings describe
    pub fn retry_policy(&self) -> FixedBackoff {
        FixedBackoff {
            interval: self.retry_interval,
            max_attempts: self.max_attempts,
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection_limit == 0 {
            return Err(ConfigError::ZeroConnectionLimit);
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if self.request_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        Ok(())
    }

    /// Create a configuration for tests (millisecond retries, small pool).
    pub fn for_testing() -> Self {
        ImageStorageConfig {
            folder: "images".to_string(),
            retry_interval: Duration::from_millis(1),
            max_attempts: None,
            connection_limit: 4,
            request_timeout: None,
            restore_failure_policy: RestoreFailurePolicy::LeavePartial,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No backend requests could ever be issued.
    #[error("Connection limit must be at least 1")]
    ZeroConnectionLimit,

    /// No attempt would ever be made.
    #[error("Max attempts must be at least 1")]
    ZeroMaxAttempts,

    /// Every request would time out immediately.
    #[error("Request timeout must be greater than zero")]
    ZeroRequestTimeout,
}
