//! Concurrency-bounded dispatch of resolutions
//!
//! The scheduler runs resolutions for an ordered candidate list with at most
//! `concurrency` in flight at any instant, handing each `(id, resolution)`
//! pair to the caller as soon as it completes. Completion order is not
//! submission order; the store's dedup-by-key makes that irrelevant.
//!
//! On cancellation the scheduler stops issuing new resolutions, lets
//! in-flight work drain (bounded by its own retry/backoff timeouts), and
//! returns once the last task finishes.

use crate::harvester::retry::{resolve, RetryPolicy};
use crate::model::{CandidateId, Resolution};
use crate::Result;
use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// How often to log a progress line, in completions
const PROGRESS_INTERVAL: usize = 100;

/// Completion counters for one scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub completed: usize,
    pub found: usize,
    pub absent: usize,
    pub failed: usize,
}

/// Dispatches resolutions with a fixed concurrency bound
pub struct Scheduler {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    concurrency: usize,
    cancel: watch::Receiver<bool>,
}

impl Scheduler {
    /// Creates a scheduler over the given client and retry policy
    pub fn new(
        client: Client,
        base_url: String,
        policy: RetryPolicy,
        concurrency: usize,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            base_url,
            policy,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Runs resolutions for every candidate ID, streaming completions
    ///
    /// `on_complete` is invoked inline from this task for each finished
    /// resolution, so all store writes stay serialized through the caller.
    /// Returns the completion counters; a cancelled run returns normally
    /// after draining, with `completed` short of the candidate count.
    ///
    /// # Errors
    ///
    /// Propagates `on_complete` errors and worker panics; per-ID fetch
    /// failures are terminal resolutions, not errors.
    pub async fn run<F>(&self, ids: Vec<CandidateId>, mut on_complete: F) -> Result<RunStats>
    where
        F: FnMut(CandidateId, &Resolution) -> Result<()>,
    {
        let total = ids.len();
        let mut stats = RunStats::default();
        let mut pending = ids.into_iter();
        let mut in_flight: JoinSet<(CandidateId, Resolution)> = JoinSet::new();
        let start = std::time::Instant::now();

        loop {
            // Top up to the concurrency bound, unless draining.
            if !*self.cancel.borrow() {
                while in_flight.len() < self.concurrency {
                    let Some(id) = pending.next() else { break };
                    let client = self.client.clone();
                    let base_url = self.base_url.clone();
                    let policy = self.policy.clone();
                    let cancel = self.cancel.clone();
                    in_flight.spawn(async move {
                        let resolution = resolve(&client, &base_url, id, &policy, cancel).await;
                        (id, resolution)
                    });
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                // Nothing in flight and nothing spawned: done or drained.
                break;
            };

            let (id, resolution) = joined?;
            stats.completed += 1;
            match &resolution {
                Resolution::Found(_) => stats.found += 1,
                Resolution::Absent => stats.absent += 1,
                Resolution::Failed { reason } => {
                    stats.failed += 1;
                    tracing::warn!("ID {} failed permanently: {}", id, reason);
                }
            }

            on_complete(id, &resolution)?;

            if stats.completed % PROGRESS_INTERVAL == 0 {
                let rate = stats.completed as f64 / start.elapsed().as_secs_f64();
                tracing::info!(
                    "Progress: {}/{} resolved ({} found), {:.1} IDs/sec",
                    stats.completed,
                    total,
                    stats.found,
                    rate
                );
            }
        }

        if *self.cancel.borrow() && stats.completed < total {
            tracing::info!(
                "Drained after cancellation: {}/{} resolved, {} never dispatched",
                stats.completed,
                total,
                total - stats.completed
            );
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarvesterConfig;

    fn test_scheduler(concurrency: usize) -> (Scheduler, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let client = reqwest::Client::new();
        let policy = RetryPolicy::from_config(&HarvesterConfig::default());
        let scheduler = Scheduler::new(
            client,
            // Unroutable; only used by tests that dispatch nothing.
            "http://127.0.0.1:1".to_string(),
            policy,
            concurrency,
            rx,
        );
        (scheduler, tx)
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let (scheduler, _tx) = test_scheduler(5);
        let stats = scheduler.run(vec![], |_, _| Ok(())).await.unwrap();
        assert_eq!(stats, RunStats::default());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_dispatches_nothing() {
        let (scheduler, tx) = test_scheduler(5);
        tx.send(true).unwrap();
        let mut calls = 0;
        let stats = scheduler
            .run(vec![1, 2, 3], |_, _| {
                calls += 1;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(stats.completed, 0);
        assert_eq!(calls, 0);
    }

    // Bounded concurrency and completion streaming are exercised against
    // mock servers in the integration tests.
}
