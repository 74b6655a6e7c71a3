// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::retry::CallRecorder;

/// Consistent view of the call counters: `ok + errors == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CallStats {
    pub total: u64,
    pub errors: u64,
    pub ok: u64,
}

/// Call counters shared by the main loop and API-spec probing.
#[derive(Debug, Default)]
pub struct CallCounters {
    stats: Mutex<CallStats>,
}

impl CallCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CallStats {
        *self.stats.lock()
    }
}

impl CallRecorder for CallCounters {
    fn record_success(&self) {
        let mut stats = self.stats.lock();
        stats.total += 1;
        stats.ok += 1;
    }

    fn record_error(&self) {
        let mut stats = self.stats.lock();
        stats.total += 1;
        stats.errors += 1;
    }
}

/// End-of-run totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeSummary {
    pub total: u64,
    pub failures: u64,
    pub successful: u64,
}

impl From<CallStats> for ProbeSummary {
    fn from(stats: CallStats) -> Self {
        Self {
            total: stats.total,
            failures: stats.errors,
            successful: stats.ok,
        }
    }
}

impl ProbeSummary {
    pub fn warning(&self) -> Option<&'static str> {
        if self.total == 0 {
            Some("no.calls")
        } else if self.successful == 0 {
            Some("no.successful.calls")
        } else {
            None
        }
    }

    /// Calls were made, none succeeded and the run is configured to fail on that.
    pub fn is_failure(&self, exit_on_failure: bool) -> bool {
        exit_on_failure && self.total > 0 && self.successful == 0
    }
}

/// Fires once every registered unit of work has finished.
///
/// Starts with one pending unit owned by the main loop.
#[derive(Debug)]
pub struct CompletionSignal {
    pending: AtomicUsize,
    done_tx: watch::Sender<bool>,
}

impl Default for CompletionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionSignal {
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);
        Self {
            pending: AtomicUsize::new(1),
            done_tx,
        }
    }

    /// Register one more unit of work; dropping the guard releases it.
    pub fn track(self: &Arc<Self>) -> PendingWork {
        self.pending.fetch_add(1, Ordering::AcqRel);
        PendingWork {
            signal: self.clone(),
        }
    }

    /// Release one unit. The caller that releases the last unit fires the signal.
    pub fn release(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 {
            debug!("All probe work finished");
            self.done_tx.send_replace(true);
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub fn is_done(&self) -> bool {
        *self.done_tx.borrow()
    }

    pub async fn wait(&self) {
        let mut done_rx = self.done_tx.subscribe();
        // the sender lives as long as `self`
        let _ = done_rx.wait_for(|done| *done).await;
    }
}

/// A registered unit of work.
#[derive(Debug)]
pub struct PendingWork {
    signal: Arc<CompletionSignal>,
}

impl Drop for PendingWork {
    fn drop(&mut self) {
        self.signal.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_counters_stay_consistent() {
        let counters = CallCounters::new();
        counters.record_error();
        counters.record_error();
        counters.record_success();

        let stats = counters.snapshot();
        assert_eq!(stats, CallStats { total: 3, errors: 2, ok: 1 });
        assert_eq!(stats.ok + stats.errors, stats.total);
    }

    #[test]
    fn test_summary_warnings() {
        let none = ProbeSummary::default();
        assert_eq!(none.warning(), Some("no.calls"));
        assert!(!none.is_failure(true));

        let failed = ProbeSummary { total: 5, failures: 5, successful: 0 };
        assert_eq!(failed.warning(), Some("no.successful.calls"));
        assert!(failed.is_failure(true));
        assert!(!failed.is_failure(false));

        let ok = ProbeSummary { total: 2, failures: 1, successful: 1 };
        assert_eq!(ok.warning(), None);
        assert!(!ok.is_failure(true));
    }

    #[tokio::test]
    async fn test_completion_waits_for_tracked_work() {
        let signal = Arc::new(CompletionSignal::new());
        let work = signal.track();
        assert_eq!(signal.pending(), 2);

        signal.release();
        assert!(!signal.is_done());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.wait().await })
        };

        drop(work);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_done());
    }
}
