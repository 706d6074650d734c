//! Durable store of harvested records and the resolution checkpoint
//!
//! The store owns deduplication, atomic commit, backup rotation, and the
//! checkpoint of already-resolved IDs. It is the single shared mutable
//! resource of a run; all writes go through one owning task (the
//! coordinator), so no internal locking is needed.

mod checkpoint;
pub mod table;

pub use checkpoint::{read_checkpoint, write_checkpoint, Checkpoint};

use crate::model::{CandidateId, OutcomeKind, Record, Resolution};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Checkpoint serialization error: {0}")]
    Checkpoint(#[from] serde_json::Error),

    #[error("Table path has no parent directory: {0}")]
    BadTablePath(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// The durable table of found records plus the resolved-ID checkpoint
///
/// Invariants maintained:
/// - at most one record row per candidate ID (last write wins)
/// - every `Found` entry in the resolved set has exactly one record row,
///   and no record row exists for an ID outside the resolved set
#[derive(Debug)]
pub struct HarvestStore {
    table_path: PathBuf,
    backup_path: PathBuf,
    checkpoint_path: PathBuf,
    temp_table_path: PathBuf,
    temp_checkpoint_path: PathBuf,

    records: BTreeMap<CandidateId, Record>,
    resolved: BTreeMap<CandidateId, OutcomeKind>,

    /// Completions recorded since the last flush
    pending: usize,

    /// Flush after this many completions
    flush_every: usize,
}

impl HarvestStore {
    /// Opens a store rooted at the given table path, recovering previous
    /// state from the canonical table, its backup, and the checkpoint
    ///
    /// Sibling files are derived from the table filename the way the
    /// upstream data layout expects: for `data/certificates.csv` these are
    /// `data/certificates_backup.csv`, `data/.certificates_checkpoint.json`,
    /// and hidden temp files for atomic replacement.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the parent directory cannot be created.
    /// Unreadable previous state is recovered from, not an error.
    pub fn open(table_path: &Path, flush_every: usize) -> StoreResult<Self> {
        let parent = table_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&parent)?;

        let stem = table_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| StoreError::BadTablePath(table_path.display().to_string()))?
            .to_string();

        let mut store = Self {
            table_path: table_path.to_path_buf(),
            backup_path: parent.join(format!("{stem}_backup.csv")),
            checkpoint_path: parent.join(format!(".{stem}_checkpoint.json")),
            temp_table_path: parent.join(format!(".{stem}_temp.csv")),
            temp_checkpoint_path: parent.join(format!(".{stem}_checkpoint_temp.json")),
            records: BTreeMap::new(),
            resolved: BTreeMap::new(),
            pending: 0,
            flush_every: flush_every.max(1),
        };

        store.load();
        Ok(store)
    }

    /// Recovers the last-known-good state from disk
    ///
    /// Recovery ladder:
    /// 1. canonical table, if it parses and matches the checkpoint's row
    ///    count and checksum
    /// 2. backup table, if the canonical is unreadable or fails the
    ///    integrity check and the backup passes it
    /// 3. empty state, only if both files are unreadable
    ///
    /// The resolved set comes from the checkpoint and is reconciled against
    /// the loaded table so the Found/row invariant holds from the start.
    fn load(&mut self) {
        let checkpoint = match read_checkpoint(&self.checkpoint_path) {
            Ok(cp) => cp,
            Err(e) => {
                tracing::warn!(
                    "Checkpoint {} unreadable ({}); resolved set will be rebuilt from the table",
                    self.checkpoint_path.display(),
                    e
                );
                None
            }
        };

        self.records = self.load_table(checkpoint.as_ref());

        if let Some(cp) = checkpoint {
            self.resolved = cp.resolved;
        }

        // Reconcile: every loaded row is a Found resolution; a Found entry
        // with no row gets re-probed next run.
        for id in self.records.keys() {
            self.resolved.insert(*id, OutcomeKind::Found);
        }
        let records = &self.records;
        self.resolved
            .retain(|id, kind| !kind.is_found() || records.contains_key(id));

        if !self.resolved.is_empty() {
            tracing::info!(
                "Recovered {} resolved IDs ({} records) from previous runs",
                self.resolved.len(),
                self.records.len()
            );
        }
    }

    fn load_table(&self, checkpoint: Option<&Checkpoint>) -> BTreeMap<CandidateId, Record> {
        let canonical = if self.table_path.exists() {
            match table::read_table(&self.table_path) {
                Ok(records) => Some(records),
                Err(e) => {
                    tracing::warn!(
                        "Canonical table {} unreadable: {}",
                        self.table_path.display(),
                        e
                    );
                    None
                }
            }
        } else {
            None
        };

        // Integrity check against the checkpoint, when both exist.
        if let (Some(records), Some(cp)) = (&canonical, checkpoint) {
            let checksum = table::table_checksum(&self.table_path).unwrap_or_default();
            if !cp.matches_table(records.len() as u64, &checksum) {
                tracing::warn!(
                    "Canonical table fails integrity check ({} rows vs {} checkpointed); \
                     trying backup",
                    records.len(),
                    cp.table_rows
                );
                if let Some(backup) = self.load_backup(Some(cp)) {
                    return backup;
                }
                tracing::warn!("Backup did not pass the check either; keeping canonical table");
                return canonical.unwrap_or_default();
            }
        }

        match canonical {
            Some(records) => records,
            None => {
                if self.table_path.exists() {
                    // Canonical exists but is unreadable; the backup needs no
                    // checkpoint match to be preferable to nothing.
                    self.load_backup(None).unwrap_or_default()
                } else {
                    BTreeMap::new()
                }
            }
        }
    }

    fn load_backup(&self, checkpoint: Option<&Checkpoint>) -> Option<BTreeMap<CandidateId, Record>> {
        if !self.backup_path.exists() {
            return None;
        }

        let records = match table::read_table(&self.backup_path) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Backup table {} unreadable: {}", self.backup_path.display(), e);
                return None;
            }
        };

        if let Some(cp) = checkpoint {
            let checksum = table::table_checksum(&self.backup_path).unwrap_or_default();
            if !cp.matches_table(records.len() as u64, &checksum) {
                return None;
            }
        }

        tracing::info!(
            "Recovered {} records from backup {}",
            records.len(),
            self.backup_path.display()
        );
        Some(records)
    }

    /// Records the terminal outcome for one candidate ID
    ///
    /// Idempotent and last-write-wins: re-recording an ID overwrites its
    /// prior outcome (this is how forced re-scrapes work). A non-Found
    /// outcome removes any stale record row so the Found/row invariant
    /// holds.
    ///
    /// Flushes durably every `flush_every` completions. A failed periodic
    /// flush is logged, not propagated: the completions stay pending and
    /// the next cadence retries, so a transient disk error cannot abort a
    /// run mid-flight. Only the explicit shutdown [`flush`](Self::flush)
    /// surfaces persistence errors.
    pub fn record(&mut self, id: CandidateId, resolution: &Resolution) -> StoreResult<()> {
        match resolution {
            Resolution::Found(record) => {
                self.records.insert(id, record.clone());
            }
            Resolution::Absent | Resolution::Failed { .. } => {
                self.records.remove(&id);
            }
        }
        self.resolved.insert(id, resolution.kind());

        self.pending += 1;
        if self.pending >= self.flush_every {
            if let Err(e) = self.flush() {
                tracing::warn!(
                    "Periodic flush failed ({}); {} completions stay pending for the next cadence",
                    e,
                    self.pending
                );
            }
        }
        Ok(())
    }

    /// Durably flushes the table and checkpoint to disk
    ///
    /// Both files are replaced atomically; the previous canonical table is
    /// copied to the backup path first.
    pub fn flush(&mut self) -> StoreResult<()> {
        table::write_table_atomic(
            &self.table_path,
            &self.temp_table_path,
            &self.backup_path,
            &self.records,
        )?;

        let checksum = table::table_checksum(&self.table_path)?;
        let checkpoint = Checkpoint::new(self.resolved.clone(), self.records.len() as u64, checksum);
        write_checkpoint(&self.checkpoint_path, &self.temp_checkpoint_path, &checkpoint)?;

        self.pending = 0;
        tracing::debug!(
            "Flushed store: {} records, {} resolved IDs",
            self.records.len(),
            self.resolved.len()
        );
        Ok(())
    }

    /// Returns the set of IDs that already have a terminal outcome
    ///
    /// Consulted once at run start to build the candidate list; never
    /// during execution.
    pub fn already_resolved(&self) -> HashSet<CandidateId> {
        self.resolved.keys().copied().collect()
    }

    /// Returns the stored records, keyed by certificate ID
    pub fn records(&self) -> &BTreeMap<CandidateId, Record> {
        &self.records
    }

    /// Number of stored records
    pub fn found_count(&self) -> usize {
        self.records.len()
    }

    /// Number of IDs with any terminal outcome
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Counts of resolved IDs by outcome kind: (found, absent, failed)
    pub fn counts_by_kind(&self) -> (usize, usize, usize) {
        let mut found = 0;
        let mut absent = 0;
        let mut failed = 0;
        for kind in self.resolved.values() {
            match kind {
                OutcomeKind::Found => found += 1,
                OutcomeKind::Absent => absent += 1,
                OutcomeKind::Failed => failed += 1,
            }
        }
        (found, absent, failed)
    }

    /// Path of the canonical table file
    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    /// Path of the backup table file
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Path of the checkpoint file
    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }
}
