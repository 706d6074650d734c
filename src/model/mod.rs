//! Core data model for the harvester
//!
//! This module defines the identifier, outcome, and record types shared by
//! the fetch, scheduling, and persistence layers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A positive integer identifying one possible record upstream.
///
/// No uniqueness constraint applies a priori; uniqueness is enforced only
/// among resolved IDs in the store.
pub type CandidateId = u64;

/// The kind of terminal outcome recorded for a resolved candidate ID
///
/// A terminal outcome will not change on retry within the same run. IDs with
/// a recorded terminal outcome are skipped by subsequent runs unless the
/// caller forces a re-scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// The endpoint returned a valid record for this ID
    Found,

    /// The endpoint definitively reports no record exists
    Absent,

    /// Non-retryable failure (malformed success body, retry budget exhausted)
    Failed,
}

impl OutcomeKind {
    /// Returns true if this outcome produced a stored record
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found)
    }

    /// Converts the outcome kind to its checkpoint string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Absent => "absent",
            Self::Failed => "failed",
        }
    }

    /// Parses an outcome kind from its checkpoint string representation
    ///
    /// Returns None if the string doesn't match any known kind.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "found" => Some(Self::Found),
            "absent" => Some(Self::Absent),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single probe against one candidate ID
///
/// `Transient` is only visible inside the retry layer; everything above it
/// sees terminal [`Resolution`]s.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The endpoint returned a valid, parseable record
    Found(Record),

    /// Definitive "no record exists" response
    Absent,

    /// Retryable condition: timeout, connection reset, 429, 5xx
    Transient {
        /// Error description
        reason: String,
        /// Whether this was an explicit rate-limit signal (HTTP 429)
        rate_limited: bool,
    },

    /// Non-retryable condition: structurally unparseable 2xx body,
    /// or a 4xx status other than the not-found signature
    Permanent {
        /// Error description
        reason: String,
    },
}

/// Terminal outcome of resolving one candidate ID through the retry layer
#[derive(Debug, Clone)]
pub enum Resolution {
    /// A valid record was fetched
    Found(Record),

    /// The ID definitively has no record
    Absent,

    /// The ID could not be resolved to a record
    Failed {
        /// Reason string, logged for later manual re-scrape
        reason: String,
    },
}

impl Resolution {
    /// Returns the outcome kind recorded in the checkpoint for this resolution
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Found(_) => OutcomeKind::Found,
            Self::Absent => OutcomeKind::Absent,
            Self::Failed { .. } => OutcomeKind::Failed,
        }
    }
}

/// One harvested certificate record
///
/// Attributes beyond the ID are opaque strings passed through as scraped;
/// no semantic validation of date or duration format is performed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "CertificateID")]
    pub certificate_id: CandidateId,

    #[serde(rename = "CourseName")]
    pub course_name: String,

    #[serde(rename = "StudentName")]
    pub student_name: String,

    /// Completion date as printed on the page (free text, locale-specific)
    #[serde(rename = "CompletionDate")]
    pub completion_date: String,

    /// Course duration as printed on the page (free text)
    #[serde(rename = "Duration")]
    pub duration: String,

    #[serde(rename = "VerificationURL")]
    pub verification_url: String,

    #[serde(rename = "Status")]
    pub status: String,

    /// RFC 3339 timestamp of when this record was scraped
    #[serde(rename = "ScrapedAt")]
    pub scraped_at: String,

    /// How many retries the successful fetch needed
    #[serde(rename = "RetryCount")]
    pub retry_count: u32,
}

impl Record {
    /// Status value for a successfully parsed record
    pub const STATUS_SUCCESS: &'static str = "Success";

    /// Creates a record from fields extracted off a verification page
    pub fn new(
        certificate_id: CandidateId,
        course_name: String,
        student_name: String,
        completion_date: String,
        duration: String,
        verification_url: String,
        retry_count: u32,
    ) -> Self {
        Self {
            certificate_id,
            course_name,
            student_name,
            completion_date,
            duration,
            verification_url,
            status: Self::STATUS_SUCCESS.to_string(),
            scraped_at: Utc::now().to_rfc3339(),
            retry_count,
        }
    }
}

/// Inclusive `[start, end]` bounds defining a contiguous candidate space
///
/// Ranges may overlap across descriptors; the store's dedup-by-key keeps
/// overlapping coverage correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeDescriptor {
    /// Human-readable pattern name (e.g. "2024 legacy")
    pub name: String,

    /// First candidate ID, inclusive
    pub start: CandidateId,

    /// Last candidate ID, inclusive
    pub end: CandidateId,
}

impl RangeDescriptor {
    /// Creates a new range descriptor
    pub fn new(name: impl Into<String>, start: CandidateId, end: CandidateId) -> Self {
        Self {
            name: name.into(),
            start,
            end,
        }
    }

    /// Number of candidate IDs covered by this range, zero when inverted
    pub fn len(&self) -> u64 {
        if self.start > self.end {
            return 0;
        }
        self.end - self.start + 1
    }

    /// Returns true if the range covers no IDs (start > end)
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Returns true if the given ID falls within this range
    pub fn contains(&self, id: CandidateId) -> bool {
        id >= self.start && id <= self.end
    }
}

impl fmt::Display for RangeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} - {}]", self.name, self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_kind_round_trip() {
        for kind in [OutcomeKind::Found, OutcomeKind::Absent, OutcomeKind::Failed] {
            assert_eq!(OutcomeKind::from_str_opt(kind.as_str()), Some(kind));
        }
        assert_eq!(OutcomeKind::from_str_opt("bogus"), None);
    }

    #[test]
    fn test_resolution_kind() {
        let record = Record::new(
            20241,
            "Oracle Database SQL".to_string(),
            "Tural Garayev".to_string(),
            "30 Dekabr 2023".to_string(),
            "3 ay".to_string(),
            "https://example.com/verified/20241/".to_string(),
            0,
        );
        assert_eq!(Resolution::Found(record).kind(), OutcomeKind::Found);
        assert_eq!(Resolution::Absent.kind(), OutcomeKind::Absent);
        assert_eq!(
            Resolution::Failed {
                reason: "retries_exhausted".to_string()
            }
            .kind(),
            OutcomeKind::Failed
        );
    }

    #[test]
    fn test_range_descriptor_len_and_contains() {
        let range = RangeDescriptor::new("2024 legacy", 2024101, 2024999);
        assert_eq!(range.len(), 899);
        assert!(range.contains(2024101));
        assert!(range.contains(2024999));
        assert!(!range.contains(2025000));
        assert!(!range.is_empty());
    }

    #[test]
    fn test_single_id_range() {
        let range = RangeDescriptor::new("single", 42, 42);
        assert_eq!(range.len(), 1);
        assert!(range.contains(42));
    }

    #[test]
    fn test_inverted_range_is_empty_with_zero_len() {
        let range = RangeDescriptor::new("inverted", 10, 5);
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
        assert!(!range.contains(7));
    }
}
