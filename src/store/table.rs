//! CSV record table encoding and atomic file replacement
//!
//! The canonical table is only ever replaced via write-temp, fsync, then
//! rename, so a kill at any point leaves either the old or the new file on
//! disk, never a partial one. The previous canonical file is copied to the
//! backup path before each replacement.

use crate::model::{CandidateId, Record};
use crate::store::StoreResult;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Reads a record table from disk, deduplicating by certificate ID
///
/// Later rows win on duplicate IDs, matching the store's last-write-wins
/// semantics.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be read or a row fails to
/// deserialize.
pub fn read_table(path: &Path) -> StoreResult<BTreeMap<CandidateId, Record>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = BTreeMap::new();

    for row in reader.deserialize() {
        let record: Record = row?;
        records.insert(record.certificate_id, record);
    }

    Ok(records)
}

/// Atomically replaces the canonical table with the given records
///
/// Write order:
/// 1. Serialize all rows to `temp_path` and fsync it
/// 2. Copy the existing canonical file to `backup_path`
/// 3. Rename `temp_path` over `path`
///
/// Rows are written in ascending ID order; within one process lifetime that
/// preserves write order for auditability since IDs are only ever appended.
pub fn write_table_atomic(
    path: &Path,
    temp_path: &Path,
    backup_path: &Path,
    records: &BTreeMap<CandidateId, Record>,
) -> StoreResult<()> {
    {
        let file = File::create(temp_path)?;
        let mut writer = csv::Writer::from_writer(&file);
        for record in records.values() {
            writer.serialize(record)?;
        }
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
    }

    if path.exists() {
        fs::copy(path, backup_path)?;
    }

    fs::rename(temp_path, path)?;
    Ok(())
}

/// Computes the SHA-256 checksum of a table file, hex-encoded
///
/// Returns an empty string if the file does not exist, matching the
/// checksum stored in a checkpoint taken before the first flush.
pub fn table_checksum(path: &Path) -> StoreResult<String> {
    if !path.exists() {
        return Ok(String::new());
    }

    let content = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Writes raw bytes to a path atomically via a sibling temp file
///
/// Used for the checkpoint file, which shares the table's crash-safety
/// requirements.
pub fn write_bytes_atomic(path: &Path, temp_path: &Path, bytes: &[u8]) -> StoreResult<()> {
    {
        let mut file = File::create(temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record(id: CandidateId, course: &str) -> Record {
        Record::new(
            id,
            course.to_string(),
            "Tural Garayev".to_string(),
            "30 Dekabr 2023".to_string(),
            "3 ay".to_string(),
            format!("https://example.com/verified/{}/", id),
            0,
        )
    }

    #[test]
    fn test_write_and_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        let temp = dir.path().join(".table_temp.csv");
        let backup = dir.path().join("table_backup.csv");

        let mut records = BTreeMap::new();
        records.insert(20241, sample_record(20241, "Oracle Database SQL"));
        records.insert(20242, sample_record(20242, "Data Analitikası"));

        write_table_atomic(&path, &temp, &backup, &records).unwrap();
        assert!(path.exists());
        assert!(!temp.exists());

        let loaded = read_table(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&20241].course_name, "Oracle Database SQL");
        assert_eq!(loaded[&20241].status, Record::STATUS_SUCCESS);
    }

    #[test]
    fn test_header_matches_contract() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        let temp = dir.path().join(".table_temp.csv");
        let backup = dir.path().join("table_backup.csv");

        let mut records = BTreeMap::new();
        records.insert(1, sample_record(1, "Course"));
        write_table_atomic(&path, &temp, &backup, &records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header = content.lines().next().unwrap();
        assert_eq!(
            header,
            "CertificateID,CourseName,StudentName,CompletionDate,Duration,\
             VerificationURL,Status,ScrapedAt,RetryCount"
        );
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        let temp = dir.path().join(".table_temp.csv");
        let backup = dir.path().join("table_backup.csv");

        let mut records = BTreeMap::new();
        records.insert(7, sample_record(7, "SQL, PL/SQL and More"));
        write_table_atomic(&path, &temp, &backup, &records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"SQL, PL/SQL and More\""));

        let loaded = read_table(&path).unwrap();
        assert_eq!(loaded[&7].course_name, "SQL, PL/SQL and More");
    }

    #[test]
    fn test_backup_preserves_previous_generation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        let temp = dir.path().join(".table_temp.csv");
        let backup = dir.path().join("table_backup.csv");

        let mut records = BTreeMap::new();
        records.insert(1, sample_record(1, "First"));
        write_table_atomic(&path, &temp, &backup, &records).unwrap();
        let first_generation = fs::read_to_string(&path).unwrap();

        records.insert(2, sample_record(2, "Second"));
        write_table_atomic(&path, &temp, &backup, &records).unwrap();

        let backup_content = fs::read_to_string(&backup).unwrap();
        assert_eq!(backup_content, first_generation);

        let loaded = read_table(&path).unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_duplicate_rows_last_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");

        // Hand-build a file with a duplicated ID, as a crashed pre-dedup
        // writer could have left behind.
        let mut writer = csv::Writer::from_path(&path).unwrap();
        writer.serialize(sample_record(5, "Old Name")).unwrap();
        writer.serialize(sample_record(5, "New Name")).unwrap();
        writer.flush().unwrap();
        drop(writer);

        let loaded = read_table(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[&5].course_name, "New Name");
    }

    #[test]
    fn test_checksum_changes_with_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("table.csv");
        let temp = dir.path().join(".table_temp.csv");
        let backup = dir.path().join("table_backup.csv");

        assert_eq!(table_checksum(&path).unwrap(), "");

        let mut records = BTreeMap::new();
        records.insert(1, sample_record(1, "First"));
        write_table_atomic(&path, &temp, &backup, &records).unwrap();
        let checksum_one = table_checksum(&path).unwrap();
        assert_eq!(checksum_one.len(), 64);

        records.insert(2, sample_record(2, "Second"));
        write_table_atomic(&path, &temp, &backup, &records).unwrap();
        let checksum_two = table_checksum(&path).unwrap();
        assert_ne!(checksum_one, checksum_two);
    }
}
