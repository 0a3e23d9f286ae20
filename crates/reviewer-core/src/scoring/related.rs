//! Related-Code signal: owners of the callers and callees of modified
//! functions.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{Entity, EntityId, ScoreMap, Signal};
use crate::scoring::{accumulate, normalize, ScoringSnapshot};

pub fn related_code_scores(snapshot: &ScoringSnapshot) -> ScoreMap {
    let modified: HashSet<EntityId> = snapshot
        .modified_functions
        .iter()
        .flat_map(|record| snapshot.matching(record))
        .map(|entity| entity.id)
        .collect();
    if modified.is_empty() {
        return ScoreMap::new();
    }

    let mut callers: BTreeSet<EntityId> = BTreeSet::new();
    let mut callees: BTreeSet<EntityId> = BTreeSet::new();
    for edge in &snapshot.edges {
        if modified.contains(&edge.callee) && !modified.contains(&edge.caller) {
            callers.insert(edge.caller);
        }
        if modified.contains(&edge.caller) && !modified.contains(&edge.callee) {
            callees.insert(edge.callee);
        }
    }

    let by_id: HashMap<EntityId, &Entity> =
        snapshot.functions.iter().map(|e| (e.id, e)).collect();
    let mut raw = ScoreMap::new();
    for id in callers.iter().chain(callees.iter()) {
        if let Some(entity) = by_id.get(id) {
            let fractions = snapshot.fractions(&entity.definition.file, entity.definition.range());
            accumulate(&mut raw, &fractions, 1.0);
        }
    }
    normalize(raw, Signal::RelatedCode.as_str())
}
