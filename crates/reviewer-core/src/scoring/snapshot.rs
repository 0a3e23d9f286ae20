//! Immutable view of the store consumed by the scorers.

use std::collections::HashMap;

use crate::errors::ReviewerResult;
use crate::models::{
    CallSite, DefinitionKind, Entity, LineRange, ModifiedCallCount, ModifiedEntity, ModifiedFile,
    OwnershipInterval, RelatedEdge, ScoreMap,
};
use crate::ownership::ownership_fractions;
use crate::store::Store;

#[derive(Clone, Debug, Default)]
pub struct ScoringSnapshot {
    pub functions: Vec<Entity>,
    pub classes: Vec<Entity>,
    pub call_sites: Vec<CallSite>,
    /// Ownership intervals per repo-relative file, ordered by start line.
    pub ownership: HashMap<String, Vec<OwnershipInterval>>,
    pub edges: Vec<RelatedEdge>,
    pub modified_functions: Vec<ModifiedEntity>,
    pub modified_classes: Vec<ModifiedEntity>,
    pub modified_files: Vec<ModifiedFile>,
    pub modified_calls: Vec<ModifiedCallCount>,
}

impl ScoringSnapshot {
    pub fn load(store: &dyn Store) -> ReviewerResult<Self> {
        let mut ownership: HashMap<String, Vec<OwnershipInterval>> = HashMap::new();
        for interval in store.all_ownership()? {
            ownership
                .entry(interval.file.clone())
                .or_default()
                .push(interval);
        }
        Ok(Self {
            functions: store.definitions(DefinitionKind::Function)?,
            classes: store.definitions(DefinitionKind::Class)?,
            call_sites: store.call_sites()?,
            ownership,
            edges: store.related_edges()?,
            modified_functions: store.modified_entities(DefinitionKind::Function)?,
            modified_classes: store.modified_entities(DefinitionKind::Class)?,
            modified_files: store.modified_files()?,
            modified_calls: store.modified_calls()?,
        })
    }

    pub fn intervals(&self, file: &str) -> &[OwnershipInterval] {
        self.ownership.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ownership fractions of `range` in `file`.
    pub fn fractions(&self, file: &str, range: LineRange) -> ScoreMap {
        ownership_fractions(self.intervals(file), range)
    }

    /// Base entities of `kind` matching a modified record by file and name.
    pub fn matching<'a>(
        &'a self,
        modified: &'a ModifiedEntity,
    ) -> impl Iterator<Item = &'a Entity> + 'a {
        let pool = match modified.kind {
            DefinitionKind::Function => &self.functions,
            DefinitionKind::Class => &self.classes,
        };
        pool.iter().filter(move |e| {
            e.definition.file == modified.old_file && e.definition.name == modified.old_name
        })
    }
}
