//! Line ownership from historical blame.
//!
//! Blame arrives as consecutive `(contributor, lines)` records. They are
//! coalesced into per-file intervals, which the scorers later intersect with
//! entity ranges to get per-contributor ownership fractions.

use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::errors::{ReviewerError, ReviewerResult};
use crate::indexer::pipeline::parallel_map;
use crate::models::{overlap, BlameEntry, LineRange, OwnershipInterval, ScoreMap, SourceFile};
use crate::store::Store;

/// Produces blame for one file at a reference. Implementations wrap the
/// repository collaborator; they are called from worker threads.
pub trait BlameSource: Sync {
    fn blame(&self, file: &SourceFile, reference: &str) -> ReviewerResult<Vec<BlameEntry>>;
}

/// Blame computed ahead of time, keyed by repo-relative path.
#[derive(Clone, Debug, Default)]
pub struct PrecomputedBlame {
    entries: HashMap<String, Vec<BlameEntry>>,
}

impl PrecomputedBlame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, relative_path: impl Into<String>, entries: Vec<BlameEntry>) {
        self.entries.insert(relative_path.into(), entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Vec<BlameEntry>)> for PrecomputedBlame {
    fn from_iter<I: IntoIterator<Item = (String, Vec<BlameEntry>)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl BlameSource for PrecomputedBlame {
    fn blame(&self, file: &SourceFile, reference: &str) -> ReviewerResult<Vec<BlameEntry>> {
        self.entries
            .get(&file.relative_path)
            .cloned()
            .ok_or_else(|| ReviewerError::BlameUnavailable {
                file: file.relative_path.clone(),
                reference: reference.to_string(),
                reason: "no blame recorded".to_string(),
            })
    }
}

/// Coalesce blame records into contiguous intervals.
///
/// Adjacent records by the same contributor extend the open interval; the
/// line cursor starts at 1. Records covering no lines are ignored.
pub fn coalesce_blame(file: &str, entries: &[BlameEntry]) -> Vec<OwnershipInterval> {
    let mut intervals: Vec<OwnershipInterval> = Vec::new();
    let mut cursor: u32 = 1;
    for entry in entries {
        let count = entry.lines.len() as u32;
        if count == 0 {
            continue;
        }
        let end = cursor + count - 1;
        match intervals.last_mut() {
            Some(open) if open.contributor == entry.contributor => open.end_line = end,
            _ => intervals.push(OwnershipInterval {
                contributor: entry.contributor.clone(),
                file: file.to_string(),
                start_line: cursor,
                end_line: end,
            }),
        }
        cursor = end + 1;
    }
    intervals
}

/// Fraction of `range` owned by each contributor. Only strictly positive
/// fractions are returned.
pub fn ownership_fractions(intervals: &[OwnershipInterval], range: LineRange) -> ScoreMap {
    let length = f64::from(range.line_count());
    let mut fractions = ScoreMap::new();
    for interval in intervals {
        let shared = overlap(&interval.range(), &range);
        if shared == 0 {
            continue;
        }
        *fractions.entry(interval.contributor.clone()).or_insert(0.0) +=
            f64::from(shared) / length;
    }
    fractions.retain(|_, v| *v > 0.0);
    fractions
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipStats {
    pub files_seen: usize,
    pub files_attributed: usize,
    pub files_skipped: usize,
    pub intervals: usize,
    pub elapsed_ms: u64,
}

/// Run blame for every file in parallel and store the coalesced intervals,
/// replacing any earlier attribution of the same file. A file whose blame is
/// unavailable keeps whatever it had before.
pub fn attribute_ownership(
    store: &dyn Store,
    files: &[SourceFile],
    reference: &str,
    blame: &dyn BlameSource,
    config: &EngineConfig,
) -> ReviewerResult<OwnershipStats> {
    let started = Instant::now();
    let results = parallel_map(files, config.workers, |file| {
        match blame.blame(file, reference) {
            Ok(entries) => Ok(Some(coalesce_blame(&file.relative_path, &entries))),
            Err(err) if err.is_recoverable() => {
                debug!("no ownership for {}: {err}", file.relative_path);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    });

    let mut stats = OwnershipStats {
        files_seen: files.len(),
        ..OwnershipStats::default()
    };
    for (file, result) in files.iter().zip(results) {
        let Some(intervals) = result? else {
            stats.files_skipped += 1;
            continue;
        };
        store.replace_ownership(&file.relative_path, &intervals)?;
        stats.files_attributed += 1;
        stats.intervals += intervals.len();
    }
    stats.elapsed_ms = started.elapsed().as_millis() as u64;

    info!(
        "attributed {} of {} files at {reference} ({} intervals)",
        stats.files_attributed, stats.files_seen, stats.intervals
    );
    Ok(stats)
}
