//! Adaptive range discovery
//!
//! Sweeping a candidate block exhaustively costs one request per ID; a block
//! of a thousand IDs with a dozen live records wastes most of that. When the
//! live records cluster contiguously, the cluster's bounds can be located in
//! O(log n) probes instead: find any live anchor with an exponential sweep,
//! then binary-search the first and last live IDs around it.
//!
//! The contiguity assumption is heuristic. Discovery therefore reports a
//! candidate range for a subsequent full harvest rather than feeding the
//! record table directly; a hole inside the cluster costs nothing, and live
//! IDs outside it are missed only by discovery, not by a catalog sweep.

use crate::model::{CandidateId, RangeDescriptor};
use std::collections::HashMap;
use std::future::Future;

/// Bounds located for one candidate block, with the probe cost paid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBlock {
    /// First and last live ID found, named after the probed block
    pub range: RangeDescriptor,

    /// Total probes spent, counting the anchor sweep
    pub probes: usize,
}

/// Memoizes probe answers so binary search never re-asks
struct ProbeCache<F> {
    probe: F,
    answers: HashMap<CandidateId, bool>,
    probes: usize,
}

impl<F, Fut> ProbeCache<F>
where
    F: FnMut(CandidateId) -> Fut,
    Fut: Future<Output = bool>,
{
    fn new(probe: F) -> Self {
        Self {
            probe,
            answers: HashMap::new(),
            probes: 0,
        }
    }

    async fn is_live(&mut self, id: CandidateId) -> bool {
        if let Some(&answer) = self.answers.get(&id) {
            return answer;
        }
        let answer = (self.probe)(id).await;
        self.answers.insert(id, answer);
        self.probes += 1;
        tracing::trace!(
            "Probe {}: {}",
            id,
            if answer { "live" } else { "absent" }
        );
        answer
    }
}

/// Locates the live cluster inside one candidate block
///
/// `sample` is the first ID probed (a known-plausible spot inside the
/// block). If it is dead, an exponential sweep from the block start (offsets
/// 0, 1, 2, 4, 8, ...) looks for any live anchor; a block with no answering
/// probe yields `None`.
///
/// A probe that cannot be resolved counts as absent. That is the
/// conservative direction: a flaky block shrinks or vanishes from the
/// discovery report instead of inflating it.
pub async fn discover_bounds<F, Fut>(
    block: &RangeDescriptor,
    sample: CandidateId,
    probe: F,
) -> Option<DiscoveredBlock>
where
    F: FnMut(CandidateId) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut cache = ProbeCache::new(probe);

    let anchor = find_anchor(block, sample, &mut cache).await?;
    let first = first_live(block.start, anchor, &mut cache).await;
    let last = last_live(anchor, block.end, &mut cache).await;

    tracing::info!(
        "Block {}: live cluster [{} - {}] located in {} probes",
        block.name,
        first,
        last,
        cache.probes
    );

    Some(DiscoveredBlock {
        range: RangeDescriptor::new(block.name.clone(), first, last),
        probes: cache.probes,
    })
}

/// Finds any live ID in the block, or `None` if the sweep exhausts it
async fn find_anchor<F, Fut>(
    block: &RangeDescriptor,
    sample: CandidateId,
    cache: &mut ProbeCache<F>,
) -> Option<CandidateId>
where
    F: FnMut(CandidateId) -> Fut,
    Fut: Future<Output = bool>,
{
    if block.contains(sample) && cache.is_live(sample).await {
        return Some(sample);
    }

    let mut offset: u64 = 0;
    loop {
        let id = block.start.checked_add(offset)?;
        if !block.contains(id) {
            return None;
        }
        if cache.is_live(id).await {
            return Some(id);
        }
        offset = if offset == 0 { 1 } else { offset.saturating_mul(2) };
    }
}

/// Binary-searches the earliest live ID in `[lo, anchor]`
async fn first_live<F, Fut>(
    mut lo: CandidateId,
    mut hi: CandidateId,
    cache: &mut ProbeCache<F>,
) -> CandidateId
where
    F: FnMut(CandidateId) -> Fut,
    Fut: Future<Output = bool>,
{
    // Invariant: hi is live.
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if cache.is_live(mid).await {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    hi
}

/// Binary-searches the latest live ID in `[anchor, hi]`
async fn last_live<F, Fut>(
    mut lo: CandidateId,
    mut hi: CandidateId,
    cache: &mut ProbeCache<F>,
) -> CandidateId
where
    F: FnMut(CandidateId) -> Fut,
    Fut: Future<Output = bool>,
{
    // Invariant: lo is live.
    while lo < hi {
        let mid = lo + (hi - lo).div_ceil(2);
        if cache.is_live(mid).await {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}
