//! Coalescing of raw extents.
//!
//! The merge is a single left-to-right pass that compares every incoming
//! extent only with the *pending* extent (the most recent one, possibly
//! already grown). Adjacency or overlap with anything further back is not
//! detected, and the pass must stay that way: the overlap diagnostics are
//! defined in terms of the pending extent.
//!
//! For input in ascending physical order no two consecutive output extents
//! touch or overlap. Unordered input can leave adjacent neighbours behind:
//! `[100:10, 115:5, 110:5]` merges to `[100:10, 110:10]`, which a second
//! pass would fuse further.

use fv_types::Extent;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// An incoming extent that overlapped the pending extent and was fused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlapEvent {
    pub pending: Extent,
    pub incoming: Extent,
    pub fused: Extent,
}

/// Result of [`merge_extents`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub extents: Vec<Extent>,
    pub input_count: usize,
    pub input_sectors: u64,
    pub merged_sectors: u64,
    pub overlaps: Vec<OverlapEvent>,
}

impl MergeOutcome {
    #[must_use]
    pub fn merged_count(&self) -> usize {
        self.extents.len()
    }

    /// The merged sector total no longer matches the reported total.
    ///
    /// Only overlaps cause this. The merged figure cannot be trusted as the
    /// file's size in sectors once it is set.
    #[must_use]
    pub fn sector_total_mismatch(&self) -> bool {
        self.input_sectors != self.merged_sectors
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }
}

enum Relation {
    Follows,
    Precedes,
    Overlaps,
    Gap,
}

fn relate(pending: Extent, incoming: Extent) -> Relation {
    if pending.directly_precedes(incoming) {
        Relation::Follows
    } else if incoming.directly_precedes(pending) {
        Relation::Precedes
    } else if (pending.start <= incoming.start && incoming.start < pending.end())
        || (pending.start < incoming.end() && incoming.end() <= pending.end())
    {
        Relation::Overlaps
    } else {
        // Includes an incoming extent that strictly contains the pending one.
        Relation::Gap
    }
}

/// Merge `raw` into a coalesced extent list.
#[must_use]
pub fn merge_extents(raw: &[Extent]) -> MergeOutcome {
    let input_sectors = raw.iter().map(|e| e.length).fold(0_u64, u64::saturating_add);
    let mut extents = Vec::new();
    let mut overlaps = Vec::new();
    let mut merged_sectors = 0_u64;

    let mut iter = raw.iter().copied();
    if let Some(mut pending) = iter.next() {
        for incoming in iter {
            match relate(pending, incoming) {
                Relation::Follows => pending.length = pending.length.saturating_add(incoming.length),
                Relation::Precedes => {
                    pending.start = incoming.start;
                    pending.length = pending.length.saturating_add(incoming.length);
                }
                Relation::Overlaps => {
                    let start = pending.start.min(incoming.start);
                    let end = pending.end().max(incoming.end());
                    let fused = Extent {
                        start,
                        length: end - start,
                    };
                    warn!(
                        pending = %pending,
                        incoming = %incoming,
                        fused = %fused,
                        "overlap found"
                    );
                    overlaps.push(OverlapEvent {
                        pending,
                        incoming,
                        fused,
                    });
                    pending = fused;
                }
                Relation::Gap => {
                    merged_sectors = merged_sectors.saturating_add(pending.length);
                    extents.push(pending);
                    pending = incoming;
                }
            }
        }
        merged_sectors = merged_sectors.saturating_add(pending.length);
        extents.push(pending);
    }

    let outcome = MergeOutcome {
        extents,
        input_count: raw.len(),
        input_sectors,
        merged_sectors,
        overlaps,
    };

    info!(
        before_count = outcome.input_count,
        before_sectors = outcome.input_sectors,
        after_count = outcome.merged_count(),
        after_sectors = outcome.merged_sectors,
        "merged extents"
    );
    if outcome.sector_total_mismatch() {
        warn!(
            reported_sectors = outcome.input_sectors,
            merged_sectors = outcome.merged_sectors,
            overlaps = outcome.overlaps.len(),
            "merged sector total differs from reported total; overlapping extents make it ambiguous"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ext(start: u64, length: u64) -> Extent {
        Extent::new(start, length).unwrap()
    }

    fn exts(pairs: &[(u64, u64)]) -> Vec<Extent> {
        pairs.iter().map(|&(s, l)| ext(s, l)).collect()
    }

    #[test]
    fn empty_input_merges_to_empty() {
        let out = merge_extents(&[]);
        assert!(out.is_empty());
        assert_eq!(out.input_count, 0);
        assert_eq!(out.merged_sectors, 0);
        assert!(!out.sector_total_mismatch());
    }

    #[test]
    fn forward_adjacency_fuses() {
        let out = merge_extents(&exts(&[(100, 10), (110, 5)]));
        assert_eq!(out.extents, exts(&[(100, 15)]));
        assert!(out.overlaps.is_empty());
        assert!(!out.sector_total_mismatch());
    }

    #[test]
    fn backward_adjacency_fuses() {
        let out = merge_extents(&exts(&[(110, 5), (100, 10)]));
        assert_eq!(out.extents, exts(&[(100, 15)]));
        assert_eq!(out.merged_sectors, 15);
    }

    #[test]
    fn gap_is_preserved() {
        let out = merge_extents(&exts(&[(100, 10), (200, 5)]));
        assert_eq!(out.extents, exts(&[(100, 10), (200, 5)]));
        assert_eq!(out.merged_sectors, 15);
        assert_eq!(out.input_count, 2);
    }

    #[test]
    fn overlap_fuses_into_union_and_flags_totals() {
        let out = merge_extents(&exts(&[(100, 10), (105, 20)]));
        assert_eq!(out.extents, exts(&[(100, 25)]));
        assert_eq!(out.input_sectors, 30);
        assert_eq!(out.merged_sectors, 25);
        assert!(out.sector_total_mismatch());
        assert_eq!(
            out.overlaps,
            vec![OverlapEvent {
                pending: ext(100, 10),
                incoming: ext(105, 20),
                fused: ext(100, 25),
            }]
        );
    }

    #[test]
    fn overlap_from_below_uses_union_end() {
        // Incoming end falls inside the pending span.
        let out = merge_extents(&exts(&[(100, 10), (95, 10)]));
        assert_eq!(out.extents, exts(&[(95, 15)]));
        assert_eq!(out.overlaps.len(), 1);
    }

    #[test]
    fn duplicate_extent_is_an_overlap() {
        let out = merge_extents(&exts(&[(100, 10), (100, 10)]));
        assert_eq!(out.extents, exts(&[(100, 10)]));
        assert_eq!(out.overlaps.len(), 1);
        assert!(out.sector_total_mismatch());
    }

    #[test]
    fn incoming_that_contains_pending_is_treated_as_gap() {
        let out = merge_extents(&exts(&[(100, 10), (90, 30)]));
        assert_eq!(out.extents, exts(&[(100, 10), (90, 30)]));
        assert!(out.overlaps.is_empty());
    }

    #[test]
    fn only_the_pending_extent_is_compared() {
        // (110, 5) is adjacent to (100, 10) but (200, 5) sits in between.
        let out = merge_extents(&exts(&[(100, 10), (200, 5), (110, 5)]));
        assert_eq!(out.extents, exts(&[(100, 10), (200, 5), (110, 5)]));

        // Overlap with an extent two steps back goes unnoticed.
        let out = merge_extents(&exts(&[(100, 10), (200, 5), (105, 2)]));
        assert_eq!(out.extents.len(), 3);
        assert!(out.overlaps.is_empty());
        assert!(!out.sector_total_mismatch());
    }

    #[test]
    fn unordered_input_can_leave_adjacent_neighbours() {
        let once = merge_extents(&exts(&[(100, 10), (115, 5), (110, 5)]));
        assert_eq!(once.extents, exts(&[(100, 10), (110, 10)]));
        assert!(!once.sector_total_mismatch());

        // Not idempotent on such input: a second pass joins the pair.
        let twice = merge_extents(&once.extents);
        assert_eq!(twice.extents, exts(&[(100, 20)]));
    }

    #[test]
    fn fused_pending_keeps_growing() {
        let out = merge_extents(&exts(&[(100, 10), (110, 5), (115, 5), (90, 10), (300, 1)]));
        assert_eq!(out.extents, exts(&[(90, 30), (300, 1)]));
        assert_eq!(out.merged_count(), 2);
        assert_eq!(out.merged_sectors, out.input_sectors);
    }

    /// Extents in ascending physical order, each separated by `gap >= 0`.
    fn ordered_extents() -> impl Strategy<Value = Vec<Extent>> {
        proptest::collection::vec((0_u64..4, 1_u64..64), 0..40).prop_map(|steps| {
            let mut next = 1_000_u64;
            steps
                .into_iter()
                .map(|(gap, length)| {
                    let e = ext(next + gap, length);
                    next = e.end();
                    e
                })
                .collect()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn merging_ordered_reports_is_idempotent(raw in ordered_extents()) {
            let once = merge_extents(&raw);
            let twice = merge_extents(&once.extents);
            prop_assert_eq!(&twice.extents, &once.extents);
            prop_assert!(twice.overlaps.is_empty());
        }

        #[test]
        fn non_overlapping_input_conserves_sectors(
            shuffled in ordered_extents().prop_shuffle(),
        ) {
            let out = merge_extents(&shuffled);
            prop_assert_eq!(out.merged_sectors, out.input_sectors);
            prop_assert!(out.merged_count() <= out.input_count);
            prop_assert!(out.overlaps.is_empty());
            prop_assert!(out.extents.iter().all(|e| e.length > 0));
        }
    }
}
