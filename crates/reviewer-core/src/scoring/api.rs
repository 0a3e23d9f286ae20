//! API-Usage signal: who historically wrote the calls the change makes.

use std::collections::HashMap;

use crate::models::{CallSite, ScoreMap, Signal};
use crate::scoring::{accumulate, normalize, ScoringSnapshot};

/// For each modified `(base, name)` with diff count `n`, every base call site
/// with the same pair adds `n` times its span's ownership fractions.
pub fn api_usage_scores(snapshot: &ScoringSnapshot) -> ScoreMap {
    if snapshot.modified_calls.is_empty() {
        return ScoreMap::new();
    }

    let mut sites: HashMap<(&str, &str), Vec<&CallSite>> = HashMap::new();
    for site in &snapshot.call_sites {
        sites
            .entry((site.base.as_str(), site.name.as_str()))
            .or_default()
            .push(site);
    }

    let mut raw = ScoreMap::new();
    for call in &snapshot.modified_calls {
        let Some(matches) = sites.get(&(call.base.as_str(), call.name.as_str())) else {
            continue;
        };
        for site in matches {
            let fractions = snapshot.fractions(&site.file, site.range());
            accumulate(&mut raw, &fractions, call.count as f64);
        }
    }
    normalize(raw, Signal::ApiUsage.as_str())
}
