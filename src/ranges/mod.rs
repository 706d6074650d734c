//! Candidate ID pattern catalog and candidate list generation
//!
//! The upstream ID space is sparse and has shifted shape over the years:
//! seven-digit year-prefixed blocks for the legacy system, five- and
//! six-digit blocks for the newer one. This module holds the observed
//! pattern catalog, derives future-year blocks arithmetically, and turns a
//! set of ranges into the deduplicated candidate list a run will probe.

use crate::config::Config;
use crate::model::{CandidateId, RangeDescriptor};
use std::collections::HashSet;

/// Which slice of the pattern catalog a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestMode {
    /// Every catalog pattern plus derived future-year blocks
    Auto,
    /// Seven-digit year-prefixed blocks only
    Legacy,
    /// Five- and six-digit blocks only
    New,
    /// Derived blocks for upcoming years only
    Future,
}

impl HarvestMode {
    /// Parses a mode name as given on the command line
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "legacy" => Some(Self::Legacy),
            "new" => Some(Self::New),
            "future" => Some(Self::Future),
            _ => None,
        }
    }
}

/// Seven-digit blocks observed per graduation year
///
/// Bounds come from the live record clusters seen in each year's block, not
/// from the full theoretical span.
const LEGACY_PATTERNS: &[(&str, CandidateId, CandidateId)] = &[
    ("2020 legacy", 2011101, 2011994),
    ("2021 legacy", 2103599, 2103717),
    ("2022 legacy", 2022001, 2022995),
    ("2023 legacy", 2023101, 2023999),
    ("2024 legacy", 2024101, 2024999),
];

/// Five- and six-digit blocks from the newer issuing system
const NEW_SYSTEM_PATTERNS: &[(&str, CandidateId, CandidateId)] = &[
    ("5-digit", 20000, 20999),
    ("6-digit 202XXX", 202000, 202999),
    ("6-digit 203XXX", 203000, 203999),
];

/// Blocks confirmed live by discovery runs, outside the regular catalog
const DISCOVERED_PATTERNS: &[(&str, CandidateId, CandidateId)] = &[("confirmed cluster", 2021763, 2021929)];

/// How many upcoming years beyond the current one get derived blocks
const FUTURE_YEARS_AHEAD: i32 = 2;

fn catalog(patterns: &[(&str, CandidateId, CandidateId)]) -> Vec<RangeDescriptor> {
    patterns
        .iter()
        .map(|(name, start, end)| RangeDescriptor::new(*name, *start, *end))
        .collect()
}

/// Derives the seven-digit block for a graduation year
///
/// The year-YY blocks follow `2_0YY_101 ..= 2_0YY_999`, e.g. 2025 maps to
/// `[2025101, 2025999]`.
pub fn year_pattern(year: i32) -> RangeDescriptor {
    let base = 2_000_000 + (year.rem_euclid(100) as CandidateId) * 1000;
    RangeDescriptor::new(format!("{year} derived"), base + 101, base + 999)
}

/// Derived blocks for the current year and the next few
pub fn future_patterns(current_year: i32) -> Vec<RangeDescriptor> {
    (current_year..=current_year + FUTURE_YEARS_AHEAD)
        .map(year_pattern)
        .collect()
}

/// Resolves the ranges a run will cover
///
/// Config-file patterns, when present, replace the built-in catalog for the
/// `Auto` mode; the narrower modes always use their built-in slice so a
/// partial override cannot silently empty them.
pub fn patterns_for_mode(mode: HarvestMode, config: &Config, current_year: i32) -> Vec<RangeDescriptor> {
    match mode {
        HarvestMode::Auto => {
            if !config.patterns.is_empty() {
                return config
                    .patterns
                    .iter()
                    .map(|p| RangeDescriptor::new(p.name.clone(), p.start, p.end))
                    .collect();
            }
            let mut ranges = catalog(LEGACY_PATTERNS);
            ranges.extend(catalog(NEW_SYSTEM_PATTERNS));
            ranges.extend(catalog(DISCOVERED_PATTERNS));
            ranges.extend(future_patterns(current_year));
            ranges
        }
        HarvestMode::Legacy => {
            let mut ranges = catalog(LEGACY_PATTERNS);
            ranges.extend(catalog(DISCOVERED_PATTERNS));
            ranges
        }
        HarvestMode::New => catalog(NEW_SYSTEM_PATTERNS),
        HarvestMode::Future => future_patterns(current_year),
    }
}

/// Flattens ranges into the ordered, deduplicated candidate list
///
/// Overlapping ranges contribute each ID once (first range wins the slot),
/// and IDs already carrying a terminal outcome are skipped entirely, so a
/// resumed run never re-probes settled IDs.
pub fn candidate_ids(
    ranges: &[RangeDescriptor],
    already_resolved: &HashSet<CandidateId>,
) -> Vec<CandidateId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for range in ranges {
        if range.is_empty() {
            tracing::warn!("Skipping empty range {}", range);
            continue;
        }
        for id in range.start..=range.end {
            if !already_resolved.contains(&id) && seen.insert(id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Ranges worth probing when searching for unknown live blocks
///
/// Each entry brackets one plausible block shape: upcoming year blocks plus
/// the unexplored five- and six-digit prefixes. Discovery probes a sample ID
/// inside each and only sweeps blocks that answer.
pub fn discovery_candidates(current_year: i32) -> Vec<(RangeDescriptor, CandidateId)> {
    let mut candidates = Vec::new();

    for year in current_year..=current_year + 4 {
        let range = year_pattern(year);
        let sample = range.start;
        candidates.push((range, sample));
    }

    for prefix in [20u64, 21, 22] {
        let start = prefix * 1000;
        let range = RangeDescriptor::new(format!("5-digit {prefix}XXX"), start, start + 999);
        candidates.push((range, start + 241));
    }

    for prefix in [202u64, 203, 204, 205] {
        let start = prefix * 1000;
        let range = RangeDescriptor::new(format!("6-digit {prefix}XXX"), start, start + 999);
        candidates.push((range, start + 410));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PatternEntry;

    #[test]
    fn test_year_pattern_derivation() {
        let range = year_pattern(2025);
        assert_eq!(range.start, 2025101);
        assert_eq!(range.end, 2025999);

        let range = year_pattern(2030);
        assert_eq!(range.start, 2030101);
        assert_eq!(range.end, 2030999);
    }

    #[test]
    fn test_future_patterns_span() {
        let ranges = future_patterns(2025);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].start, 2025101);
        assert_eq!(ranges[2].start, 2027101);
    }

    #[test]
    fn test_auto_mode_includes_all_catalogs() {
        let config = Config::default();
        let ranges = patterns_for_mode(HarvestMode::Auto, &config, 2025);
        assert!(ranges.iter().any(|r| r.name == "2024 legacy"));
        assert!(ranges.iter().any(|r| r.name == "5-digit"));
        assert!(ranges.iter().any(|r| r.name == "confirmed cluster"));
        assert!(ranges.iter().any(|r| r.name == "2026 derived"));
    }

    #[test]
    fn test_config_patterns_override_auto() {
        let mut config = Config::default();
        config.patterns = vec![PatternEntry {
            name: "custom".to_string(),
            start: 100,
            end: 200,
        }];
        let ranges = patterns_for_mode(HarvestMode::Auto, &config, 2025);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].name, "custom");

        // Narrow modes keep their built-in slice regardless.
        let legacy = patterns_for_mode(HarvestMode::Legacy, &config, 2025);
        assert!(legacy.iter().any(|r| r.name == "2024 legacy"));
    }

    #[test]
    fn test_candidate_ids_dedup_overlap() {
        let ranges = vec![
            RangeDescriptor::new("a", 10, 15),
            RangeDescriptor::new("b", 13, 18),
        ];
        let ids = candidate_ids(&ranges, &HashSet::new());
        assert_eq!(ids, vec![10, 11, 12, 13, 14, 15, 16, 17, 18]);
    }

    #[test]
    fn test_candidate_ids_skip_resolved() {
        let ranges = vec![RangeDescriptor::new("a", 1, 5)];
        let resolved: HashSet<CandidateId> = [2, 4].into_iter().collect();
        let ids = candidate_ids(&ranges, &resolved);
        assert_eq!(ids, vec![1, 3, 5]);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(HarvestMode::from_str_opt("auto"), Some(HarvestMode::Auto));
        assert_eq!(HarvestMode::from_str_opt("legacy"), Some(HarvestMode::Legacy));
        assert_eq!(HarvestMode::from_str_opt("new"), Some(HarvestMode::New));
        assert_eq!(HarvestMode::from_str_opt("future"), Some(HarvestMode::Future));
        assert_eq!(HarvestMode::from_str_opt("bogus"), None);
    }

    #[test]
    fn test_discovery_candidates_shapes() {
        let candidates = discovery_candidates(2025);
        // 5 year blocks + 3 five-digit prefixes + 4 six-digit prefixes.
        assert_eq!(candidates.len(), 12);
        for (range, sample) in &candidates {
            assert!(range.contains(*sample), "sample outside {range}");
        }
    }
}
