//! Contributor scoring and rank fusion.
//!
//! Each signal is a pure function over a [`ScoringSnapshot`] returning a
//! normalized [`ScoreMap`]. Scores become competition ranks, and ranks are
//! summed across signals by [`fusion::fuse`].

pub mod api;
pub mod fusion;
pub mod modified;
pub mod related;
pub mod snapshot;

use tracing::debug;

use crate::errors::ReviewerError;
use crate::models::{ScoreMap, Signal};

pub use api::api_usage_scores;
pub use fusion::{competition_rank, fuse};
pub use modified::modified_code_scores;
pub use related::related_code_scores;
pub use snapshot::ScoringSnapshot;

/// Scale `raw` so its values sum to 1, dropping non-positive entries.
///
/// A zero total yields an empty map; it is reported at debug level and is
/// not an error for the caller.
pub fn normalize(raw: ScoreMap, signal: &str) -> ScoreMap {
    let total: f64 = raw.values().filter(|v| **v > 0.0).sum();
    if total <= 0.0 {
        let err = ReviewerError::ZeroTotal {
            signal: signal.to_string(),
        };
        debug!("{err}");
        return ScoreMap::new();
    }
    raw.into_iter()
        .filter(|(_, v)| *v > 0.0)
        .map(|(contributor, v)| (contributor, v / total))
        .collect()
}

/// Add `fractions` scaled by `weight` into `into`.
pub(crate) fn accumulate(into: &mut ScoreMap, fractions: &ScoreMap, weight: f64) {
    for (contributor, value) in fractions {
        *into.entry(contributor.clone()).or_insert(0.0) += value * weight;
    }
}

/// Compute one signal's normalized scores.
pub fn score_signal(signal: Signal, snapshot: &ScoringSnapshot) -> ScoreMap {
    match signal {
        Signal::ModifiedCode => modified_code_scores(snapshot),
        Signal::RelatedCode => related_code_scores(snapshot),
        Signal::ApiUsage => api_usage_scores(snapshot),
    }
}
