//! Checkpoint snapshot of the resolved set
//!
//! The checkpoint lets a resumed run skip already-resolved IDs without
//! re-deriving them from the record table, and carries the integrity data
//! (row count and checksum) used to validate the canonical table on load.

use crate::model::{CandidateId, OutcomeKind};
use crate::store::table::write_bytes_atomic;
use crate::store::StoreResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Persisted snapshot of which IDs have reached a terminal outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Terminal outcome kind per resolved candidate ID
    pub resolved: BTreeMap<CandidateId, OutcomeKind>,

    /// Count of resolved IDs, redundant with `resolved` for quick sanity logs
    pub total_resolved: u64,

    /// Count of stored records at snapshot time
    pub total_found: u64,

    /// RFC 3339 timestamp of the snapshot
    pub last_save: String,

    /// Row count of the canonical table as of this snapshot
    pub table_rows: u64,

    /// SHA-256 of the canonical table as of this snapshot (hex), empty
    /// before the first table flush
    pub table_checksum: String,
}

impl Checkpoint {
    /// Builds a snapshot of the given resolved set
    pub fn new(
        resolved: BTreeMap<CandidateId, OutcomeKind>,
        table_rows: u64,
        table_checksum: String,
    ) -> Self {
        let total_resolved = resolved.len() as u64;
        let total_found = resolved.values().filter(|k| k.is_found()).count() as u64;
        Self {
            resolved,
            total_resolved,
            total_found,
            last_save: Utc::now().to_rfc3339(),
            table_rows,
            table_checksum,
        }
    }

    /// Returns true if the given table row count and checksum match this
    /// snapshot
    ///
    /// An empty stored checksum (pre-first-flush snapshot) only matches an
    /// absent table.
    pub fn matches_table(&self, rows: u64, checksum: &str) -> bool {
        self.table_rows == rows && self.table_checksum == checksum
    }
}

/// Reads a checkpoint from disk
///
/// Returns `Ok(None)` if no checkpoint file exists; a present-but-corrupt
/// checkpoint is an error the caller downgrades to a warning and an empty
/// resolved set.
pub fn read_checkpoint(path: &Path) -> StoreResult<Option<Checkpoint>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read(path)?;
    let checkpoint: Checkpoint = serde_json::from_slice(&content)?;
    Ok(Some(checkpoint))
}

/// Writes a checkpoint atomically via a sibling temp file
pub fn write_checkpoint(path: &Path, temp_path: &Path, checkpoint: &Checkpoint) -> StoreResult<()> {
    let bytes = serde_json::to_vec_pretty(checkpoint)?;
    write_bytes_atomic(path, temp_path, &bytes)
}
