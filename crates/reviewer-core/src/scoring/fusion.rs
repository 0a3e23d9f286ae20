//! Rank fusion: per-signal competition ranks summed per contributor.
//!
//! Lower totals are better. A contributor absent from a signal gets no rank
//! for it rather than a penalty.

use indexmap::IndexMap;

use crate::models::{RankMap, RankedContributor, ScoreMap};

/// Relative tolerance under which two scores count as tied. Scores are sums
/// of fractions, so equal ownership can differ in the last few bits.
const TIE_TOLERANCE: f64 = 1e-9;

fn same_score(a: f64, b: f64) -> bool {
    (a - b).abs() <= TIE_TOLERANCE * a.abs().max(b.abs())
}

/// Competition ("1224") ranking: the best score ranks 1, ties share a rank,
/// and the next distinct score skips past the tied positions.
pub fn competition_rank(scores: &ScoreMap) -> RankMap {
    let mut ordered: Vec<(&String, f64)> = scores.iter().map(|(c, s)| (c, *s)).collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    // Each tie group is anchored at its highest score so that a run of
    // near-equal values cannot drift into one group.
    let mut ranked: Vec<(&String, u32)> = Vec::with_capacity(ordered.len());
    let mut group: Option<(f64, u32)> = None;
    for (position, (contributor, score)) in ordered.into_iter().enumerate() {
        let rank = match group {
            Some((anchor, rank)) if same_score(anchor, score) => rank,
            _ => {
                let rank = position as u32 + 1;
                group = Some((score, rank));
                rank
            }
        };
        ranked.push((contributor, rank));
    }
    ranked.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .map(|(contributor, rank)| (contributor.clone(), rank))
        .collect()
}

/// Sum ranks across signals and order ascending; equal sums are ordered by
/// contributor so the output is deterministic.
pub fn fuse(rank_maps: &[RankMap]) -> Vec<RankedContributor> {
    let mut totals: IndexMap<&str, u32> = IndexMap::new();
    for ranks in rank_maps {
        for (contributor, rank) in ranks {
            *totals.entry(contributor.as_str()).or_insert(0) += rank;
        }
    }

    let mut fused: Vec<RankedContributor> = totals
        .into_iter()
        .map(|(contributor, total_rank)| RankedContributor {
            contributor: contributor.to_string(),
            total_rank,
        })
        .collect();
    fused.sort_by(|a, b| {
        a.total_rank
            .cmp(&b.total_rank)
            .then_with(|| a.contributor.cmp(&b.contributor))
    });
    fused
}
