//! Call graph linking over stored call sites and function definitions.
//!
//! A call site links every function in its own file that encloses it to
//! every function with the called name in a file whose basename is the
//! call's base plus the source extension. Resolution is by name only, so a
//! base shared by several files links to all of them.

use std::collections::HashMap;
use std::time::Instant;

use indexmap::IndexSet;
use tracing::info;

use crate::errors::ReviewerResult;
use crate::models::{DefinitionKind, Entity, EntityId, RelatedEdge};
use crate::store::Store;

/// Build caller → callee edges for every stored call site and write them to
/// the store. Returns the number of distinct edges produced.
pub fn link_call_graph(store: &dyn Store, source_extension: &str) -> ReviewerResult<usize> {
    let started = Instant::now();
    let call_sites = store.call_sites()?;

    let mut callee_cache: HashMap<(String, String), Vec<EntityId>> = HashMap::new();
    let mut edges: IndexSet<RelatedEdge> = IndexSet::new();

    for call in &call_sites {
        let callers = store.definitions_containing(
            DefinitionKind::Function,
            &call.file,
            call.start_line,
            call.end_line,
        )?;
        if callers.is_empty() {
            continue;
        }

        let key = (call.base.clone(), call.name.clone());
        if !callee_cache.contains_key(&key) {
            let target_basename = format!("{}{source_extension}", call.base);
            let found: Vec<EntityId> = store
                .definitions_named(DefinitionKind::Function, &target_basename, &call.name)?
                .iter()
                .map(|e: &Entity| e.id)
                .collect();
            callee_cache.insert(key.clone(), found);
        }
        let callees = callee_cache.get(&key).map(Vec::as_slice).unwrap_or(&[]);

        for caller in &callers {
            for callee in callees {
                edges.insert(RelatedEdge {
                    caller: caller.id,
                    callee: *callee,
                });
            }
        }
    }

    let edges: Vec<RelatedEdge> = edges.into_iter().collect();
    store.insert_related_edges(&edges)?;

    info!(
        "linked {} call sites into {} edges in {} ms",
        call_sites.len(),
        edges.len(),
        started.elapsed().as_millis()
    );
    Ok(edges.len())
}
