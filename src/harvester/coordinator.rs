//! Harvest coordinator - main run orchestration logic
//!
//! This module contains the run loop that ties the other pieces together:
//! - opening the store and recovering previous state
//! - building the candidate list from the requested ranges
//! - driving the scheduler and recording every completion
//! - handling the interrupt signal and the final durable flush

use crate::config::Config;
use crate::discovery::{discover_bounds, DiscoveredBlock};
use crate::harvester::fetcher::build_http_client;
use crate::harvester::retry::{resolve, RetryPolicy};
use crate::harvester::scheduler::{RunStats, Scheduler};
use crate::model::{CandidateId, RangeDescriptor, Resolution};
use crate::ranges::{candidate_ids, discovery_candidates};
use crate::store::{HarvestStore, StoreError};
use crate::{Result, SweepError};
use reqwest::Client;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Outcome of one harvest run
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    /// Completion counters for this run only
    pub stats: RunStats,

    /// Total records in the table after the run, all runs included
    pub records_total: usize,

    /// Total IDs with a terminal outcome after the run
    pub resolved_total: usize,

    /// Whether the run was cut short by the interrupt signal
    pub cancelled: bool,
}

/// Main harvest coordinator structure
///
/// Owns the store outright; scheduler completions are recorded through a
/// closure running on the coordinator's task, so the store needs no lock.
#[derive(Debug)]
pub struct Coordinator {
    config: Config,
    client: Client,
    store: HarvestStore,
    cancel: Arc<watch::Sender<bool>>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// Opens the store (recovering any previous state from the table,
    /// backup, and checkpoint) and builds the shared HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SweepError::OutputUnwritable`] if the output location
    /// cannot be prepared, or another [`SweepError`] if the store state is
    /// malformed or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let store = HarvestStore::open(
            Path::new(&config.output.table_path),
            config.harvester.flush_every,
        )
        .map_err(|e| match e {
            StoreError::Io(io) => {
                SweepError::OutputUnwritable(format!("{}: {}", config.output.table_path, io))
            }
            other => SweepError::Store(other),
        })?;
        let client = build_http_client(&config.endpoint)?;
        let (cancel, _) = watch::channel(false);

        Ok(Self {
            config,
            client,
            store,
            cancel: Arc::new(cancel),
        })
    }

    /// Runs a harvest over the given ranges
    ///
    /// IDs that already carry a terminal outcome are skipped unless
    /// `rescrape` is set, in which case every ID in range is probed again
    /// and its stored outcome overwritten.
    ///
    /// An interrupt (Ctrl-C) switches the run into drain mode: no new IDs
    /// are dispatched, in-flight resolutions finish and are recorded, and
    /// the store is flushed before returning.
    pub async fn run(&mut self, ranges: &[RangeDescriptor], rescrape: bool) -> Result<HarvestSummary> {
        let already_resolved = if rescrape {
            HashSet::new()
        } else {
            self.store.already_resolved()
        };

        let ids = candidate_ids(ranges, &already_resolved);
        let total_span: u64 = ranges.iter().map(RangeDescriptor::len).sum();
        tracing::info!(
            "Starting harvest: {} ranges, {} candidate IDs ({} already resolved)",
            ranges.len(),
            ids.len(),
            total_span.saturating_sub(ids.len() as u64)
        );
        for range in ranges {
            tracing::debug!("Range: {}", range);
        }

        let interrupt = self.spawn_interrupt_watcher();
        let start = std::time::Instant::now();

        let scheduler = Scheduler::new(
            self.client.clone(),
            self.config.endpoint.base_url.clone(),
            RetryPolicy::from_config(&self.config.harvester),
            self.config.harvester.concurrency,
            self.cancel.subscribe(),
        );

        let store = &mut self.store;
        let stats = scheduler
            .run(ids, |id: CandidateId, resolution: &Resolution| {
                store.record(id, resolution)?;
                Ok(())
            })
            .await?;

        interrupt.abort();
        self.store.flush()?;

        let cancelled = *self.cancel.borrow();
        tracing::info!(
            "Harvest {} in {:?}: {} resolved ({} found, {} absent, {} failed), {} records total",
            if cancelled { "interrupted" } else { "completed" },
            start.elapsed(),
            stats.completed,
            stats.found,
            stats.absent,
            stats.failed,
            self.store.found_count()
        );

        Ok(HarvestSummary {
            stats,
            records_total: self.store.found_count(),
            resolved_total: self.store.resolved_count(),
            cancelled,
        })
    }

    /// Probes for live ID blocks outside the known catalog
    ///
    /// Each plausible block shape is sampled once; answering blocks have
    /// their live cluster bounds located by binary search. Nothing is
    /// written to the store: the returned ranges are input for a later
    /// harvest run over exactly those bounds.
    pub async fn discover(&self, current_year: i32) -> Result<Vec<DiscoveredBlock>> {
        let policy = RetryPolicy::from_config(&self.config.harvester);
        let interrupt = self.spawn_interrupt_watcher();
        let mut blocks = Vec::new();

        for (block, sample) in discovery_candidates(current_year) {
            if *self.cancel.borrow() {
                tracing::info!("Discovery interrupted; reporting blocks found so far");
                break;
            }

            tracing::info!("Probing block {} (sample {})", block, sample);
            let found = discover_bounds(&block, sample, |id| {
                let client = self.client.clone();
                let base_url = self.config.endpoint.base_url.clone();
                let policy = policy.clone();
                let cancel = self.cancel.subscribe();
                async move {
                    matches!(
                        resolve(&client, &base_url, id, &policy, cancel).await,
                        Resolution::Found(_)
                    )
                }
            })
            .await;

            match found {
                Some(discovered) => blocks.push(discovered),
                None => tracing::debug!("Block {} has no live IDs", block.name),
            }
        }

        interrupt.abort();
        Ok(blocks)
    }

    /// Flips the coordinator into drain mode, as the interrupt watcher does
    ///
    /// Takes effect even before any worker has subscribed to the signal;
    /// receivers created afterwards observe the flipped value immediately.
    pub fn request_shutdown(&self) {
        self.cancel.send_replace(true);
    }

    /// Installs the Ctrl-C handler that flips the run into drain mode
    fn spawn_interrupt_watcher(&self) -> tokio::task::JoinHandle<()> {
        let cancel = Arc::clone(&self.cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received; draining in-flight work");
                // send_replace updates the value even when no receiver is
                // currently alive, e.g. between two discovery probes.
                cancel.send_replace(true);
            }
        })
    }

    /// The store backing this coordinator
    pub fn store(&self) -> &HarvestStore {
        &self.store
    }
}

/// Runs a complete harvest over the given ranges
///
/// This is the main library entry point. It will:
/// 1. Open the store and recover previous state
/// 2. Build the candidate list, skipping already-resolved IDs
/// 3. Resolve every candidate to a terminal outcome
/// 4. Flush the table and checkpoint durably
///
/// # Example
///
/// ```no_run
/// use certsweep::config::Config;
/// use certsweep::harvester::harvest;
/// use certsweep::model::RangeDescriptor;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let ranges = vec![RangeDescriptor::new("2024 legacy", 2024101, 2024999)];
/// let summary = harvest(config, &ranges, false).await?;
/// println!("{} records found", summary.stats.found);
/// # Ok(())
/// # }
/// ```
pub async fn harvest(
    config: Config,
    ranges: &[RangeDescriptor],
    rescrape: bool,
) -> Result<HarvestSummary> {
    let mut coordinator = Coordinator::new(config)?;
    coordinator.run(ranges, rescrape).await
}
