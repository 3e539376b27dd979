// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use courier_config::{BackoffConfig, Strategy};

use crate::errors::CallError;

/// Decides whether and when a failed call is attempted again.
pub trait RetryPolicy: Send + Sync {
    /// Delays between attempts. An empty schedule means a single attempt.
    fn backoff(&self) -> Box<dyn Iterator<Item = Duration> + Send>;

    fn should_retry(&self, error: &CallError) -> bool {
        error.is_retryable()
    }

    /// Upper bound applied to a delay requested by the server. `None` honours
    /// the server as is.
    fn max_delay(&self) -> Option<Duration> {
        None
    }

    /// Delay before the next attempt: the server's request, capped, or the
    /// scheduled delay.
    fn next_delay(&self, error: &CallError, scheduled: Duration) -> Duration {
        match (error.retry_after(), self.max_delay()) {
            (Some(requested), Some(cap)) => requested.min(cap),
            (Some(requested), None) => requested,
            (None, _) => scheduled,
        }
    }
}

/// Exactly one attempt, whatever the failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverRetry;

impl RetryPolicy for NeverRetry {
    fn backoff(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        Box::new(std::iter::empty())
    }

    fn should_retry(&self, _error: &CallError) -> bool {
        false
    }
}

/// Retries retryable failures following a backoff schedule.
#[derive(Debug, Clone, Default)]
pub struct BackoffRetry {
    config: BackoffConfig,
}

impl BackoffRetry {
    pub fn new(config: BackoffConfig) -> Self {
        BackoffRetry { config }
    }
}

impl RetryPolicy for BackoffRetry {
    fn backoff(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        self.config.get_strategy()
    }

    fn max_delay(&self) -> Option<Duration> {
        Some(self.config.max_delay())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{RemoteError, TransportError};

    fn unavailable(retry_after: Option<Duration>) -> CallError {
        CallError::Remote(RemoteError {
            status: 503,
            method_key: "Remote#call".to_string(),
            headers: Default::default(),
            body: Default::default(),
            retry_after,
        })
    }

    #[test]
    fn test_server_delay_is_capped_by_max_delay() {
        let policy = BackoffRetry::new(BackoffConfig::new_exponential(
            Duration::from_millis(1),
            2,
            Duration::from_millis(10),
            1,
            false,
        ));
        let scheduled = Duration::from_millis(1);

        let err = unavailable(Some(Duration::from_secs(3600)));
        assert_eq!(policy.next_delay(&err, scheduled), Duration::from_millis(10));

        let err = unavailable(Some(Duration::from_millis(5)));
        assert_eq!(policy.next_delay(&err, scheduled), Duration::from_millis(5));

        let err = unavailable(None);
        assert_eq!(policy.next_delay(&err, scheduled), scheduled);
    }

    #[test]
    fn test_never_retry() {
        let err = CallError::from(TransportError::Connect("refused".into()));
        assert_eq!(NeverRetry.backoff().count(), 0);
        assert!(!NeverRetry.should_retry(&err));
    }

    #[test]
    fn test_backoff_retry_follows_schedule() {
        let policy = BackoffRetry::new(BackoffConfig::new_fixed_interval(
            Duration::from_millis(5),
            2,
        ));
        let err = CallError::from(TransportError::Connect("refused".into()));
        assert!(policy.should_retry(&err));
        assert_eq!(
            policy.backoff().collect::<Vec<_>>(),
            vec![Duration::from_millis(5); 2]
        );
    }
}
