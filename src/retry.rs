// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Probe Retry Policy
 * Bounded retries with error-class driven waits
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::config::{DEFAULT_RETRY_COUNT, DEFAULT_RETRY_WAIT_SECS};
use crate::errors::{BackoffTier, CallError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Receives one record per attempted call.
pub trait CallRecorder {
    fn record_success(&self);
    fn record_error(&self);
}

/// Retry configuration with three wait tiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts per call
    pub max_attempts: u32,

    /// Wait after a premature EOF (target not ready yet)
    pub not_ready_wait: Duration,

    /// Wait after any other network-level error
    pub web_error_wait: Duration,

    /// Wait after a non-network error
    pub other_error_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(0, 0)
    }
}

impl RetryPolicy {
    /// Build the policy from the configured retry count and wait (0 = defaults).
    pub fn from_config(retry_count: u32, retry_wait_secs: u64) -> Self {
        let max_attempts = if retry_count > 0 {
            retry_count
        } else {
            DEFAULT_RETRY_COUNT
        };

        let wait = if retry_wait_secs > 0 {
            retry_wait_secs
        } else {
            DEFAULT_RETRY_WAIT_SECS
        };

        Self::with_base_wait(max_attempts, Duration::from_secs(wait))
    }

    /// Derive all tiers from the web-error wait: not-ready `2W`, other `W/2`.
    pub fn with_base_wait(max_attempts: u32, web_error_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            not_ready_wait: web_error_wait * 2,
            web_error_wait,
            other_error_wait: web_error_wait / 2,
        }
    }

    pub fn wait_for(&self, tier: BackoffTier) -> Duration {
        match tier {
            BackoffTier::NotReady => self.not_ready_wait,
            BackoffTier::WebError => self.web_error_wait,
            BackoffTier::Other => self.other_error_wait,
        }
    }

    /// Run `operation` up to `max_attempts` times, stopping at the first success.
    ///
    /// Each attempt is recorded on `recorder`. There is no wait after the final
    /// attempt; exhausting the attempts is not an error.
    pub async fn run<F, Fut, T, R>(
        &self,
        operation_name: &str,
        recorder: &R,
        mut operation: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, CallError>>,
        R: CallRecorder + ?Sized,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.max_attempts {
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => {
                    recorder.record_success();

                    debug!(
                        attempt = attempt,
                        operation = operation_name,
                        "Call succeeded"
                    );

                    return RetryOutcome {
                        attempts: attempt,
                        success: Some(value),
                        last_error: None,
                    };
                }
                Err(err) => {
                    recorder.record_error();

                    let tier = err.tier();

                    if attempt < self.max_attempts {
                        let backoff = self.wait_for(tier);

                        debug!(
                            attempt = attempt,
                            max_attempts = self.max_attempts,
                            operation = operation_name,
                            tier = ?tier,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %err,
                            "Call failed, retrying later"
                        );

                        tokio::time::sleep(backoff).await;
                    } else {
                        debug!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %err,
                            "Max call attempts reached"
                        );
                    }

                    last_error = Some(err);
                }
            }
        }

        RetryOutcome {
            attempts: attempt,
            success: None,
            last_error,
        }
    }
}

/// Result of a retry loop.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub attempts: u32,
    pub success: Option<T>,
    pub last_error: Option<CallError>,
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.success.is_some()
    }
}
