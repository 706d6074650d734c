//! Harvester module for record fetching and resolution
//!
//! This module contains the core harvesting logic, including:
//! - HTTP fetching and outcome classification
//! - Certificate page parsing
//! - Retry with exponential backoff
//! - Concurrency-bounded scheduling and overall run coordination

mod coordinator;
mod fetcher;
mod parser;
mod retry;
mod scheduler;

pub use coordinator::{harvest, Coordinator, HarvestSummary};
pub use fetcher::{build_http_client, fetch, record_url};
pub use parser::{parse_certificate, CertificateFields};
pub use retry::{resolve, RetryPolicy, REASON_RETRIES_EXHAUSTED, REASON_SHUTDOWN};
pub use scheduler::{RunStats, Scheduler};
