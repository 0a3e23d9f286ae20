//! In-memory [`Store`] implementation.

use std::collections::{BTreeMap, HashMap};

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use crate::errors::ReviewerResult;
use crate::models::{
    CallSite, Definition, DefinitionKind, Entity, EntityId, ImportMapping, LineRange,
    ModifiedCallCount, ModifiedEntity, ModifiedFile, OwnershipInterval, RelatedEdge, SourceFile,
};
use crate::store::Store;

type DefinitionKey = (DefinitionKind, String, String, u32);

#[derive(Default)]
struct Tables {
    files: IndexMap<String, SourceFile>,
    entities: Vec<Entity>,
    entity_keys: HashMap<DefinitionKey, EntityId>,
    call_sites: Vec<CallSite>,
    imports: HashMap<String, ImportMapping>,
    ownership: BTreeMap<String, Vec<OwnershipInterval>>,
    edges: IndexSet<RelatedEdge>,
    modified_entities: IndexSet<ModifiedEntity>,
    modified_files: IndexSet<ModifiedFile>,
    modified_calls: IndexMap<(String, String), u64>,
}

/// Volatile store backed by locked tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn insert_source_file(&self, file: &SourceFile) -> ReviewerResult<()> {
        let mut tables = self.tables.write();
        tables
            .files
            .entry(file.relative_path.clone())
            .or_insert_with(|| file.clone());
        Ok(())
    }

    fn insert_definitions(&self, definitions: &[Definition]) -> ReviewerResult<()> {
        let mut tables = self.tables.write();
        for definition in definitions {
            let key = (
                definition.kind,
                definition.file.clone(),
                definition.name.clone(),
                definition.start_line,
            );
            if tables.entity_keys.contains_key(&key) {
                continue;
            }
            let id = EntityId(tables.entities.len() as i64 + 1);
            tables.entity_keys.insert(key, id);
            tables.entities.push(Entity {
                id,
                definition: definition.clone(),
            });
        }
        Ok(())
    }

    fn replace_call_sites(&self, file: &str, call_sites: &[CallSite]) -> ReviewerResult<()> {
        let mut tables = self.tables.write();
        tables.call_sites.retain(|c| c.file != file);
        tables.call_sites.extend_from_slice(call_sites);
        Ok(())
    }

    fn insert_import_mapping(&self, file: &str, mapping: &ImportMapping) -> ReviewerResult<()> {
        let mut tables = self.tables.write();
        let stored = tables.imports.entry(file.to_string()).or_default();
        for (alias, target) in mapping.iter() {
            stored.insert(alias, target);
        }
        Ok(())
    }

    fn replace_ownership(
        &self,
        file: &str,
        intervals: &[OwnershipInterval],
    ) -> ReviewerResult<()> {
        let mut stored: Vec<OwnershipInterval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            if !stored.contains(interval) {
                stored.push(interval.clone());
            }
        }
        stored.sort_by_key(|i| (i.start_line, i.end_line));

        let mut tables = self.tables.write();
        if stored.is_empty() {
            tables.ownership.remove(file);
        } else {
            tables.ownership.insert(file.to_string(), stored);
        }
        Ok(())
    }

    fn insert_related_edges(&self, edges: &[RelatedEdge]) -> ReviewerResult<()> {
        self.tables.write().edges.extend(edges.iter().copied());
        Ok(())
    }

    fn source_files(&self) -> ReviewerResult<Vec<SourceFile>> {
        Ok(self.tables.read().files.values().cloned().collect())
    }

    fn definitions(&self, kind: DefinitionKind) -> ReviewerResult<Vec<Entity>> {
        Ok(self
            .tables
            .read()
            .entities
            .iter()
            .filter(|e| e.definition.kind == kind)
            .cloned()
            .collect())
    }

    fn definitions_containing(
        &self,
        kind: DefinitionKind,
        file: &str,
        start: u32,
        end: u32,
    ) -> ReviewerResult<Vec<Entity>> {
        let target = LineRange::new(start, end);
        Ok(self
            .tables
            .read()
            .entities
            .iter()
            .filter(|e| {
                e.definition.kind == kind
                    && e.definition.file == file
                    && e.definition.range().contains(&target)
            })
            .cloned()
            .collect())
    }

    fn definitions_named(
        &self,
        kind: DefinitionKind,
        basename: &str,
        name: &str,
    ) -> ReviewerResult<Vec<Entity>> {
        Ok(self
            .tables
            .read()
            .entities
            .iter()
            .filter(|e| {
                e.definition.kind == kind
                    && e.definition.basename == basename
                    && e.definition.name == name
            })
            .cloned()
            .collect())
    }

    fn call_sites(&self) -> ReviewerResult<Vec<CallSite>> {
        Ok(self.tables.read().call_sites.clone())
    }

    fn import_mapping(&self, file: &str) -> ReviewerResult<ImportMapping> {
        Ok(self
            .tables
            .read()
            .imports
            .get(file)
            .cloned()
            .unwrap_or_default())
    }

    fn ownership(&self, file: &str) -> ReviewerResult<Vec<OwnershipInterval>> {
        Ok(self
            .tables
            .read()
            .ownership
            .get(file)
            .cloned()
            .unwrap_or_default())
    }

    fn all_ownership(&self) -> ReviewerResult<Vec<OwnershipInterval>> {
        Ok(self
            .tables
            .read()
            .ownership
            .values()
            .flatten()
            .cloned()
            .collect())
    }

    fn related_edges(&self) -> ReviewerResult<Vec<RelatedEdge>> {
        Ok(self.tables.read().edges.iter().copied().collect())
    }

    fn upsert_modified_entity(&self, entity: &ModifiedEntity) -> ReviewerResult<()> {
        self.tables.write().modified_entities.insert(entity.clone());
        Ok(())
    }

    fn upsert_modified_file(&self, file: &ModifiedFile) -> ReviewerResult<()> {
        self.tables.write().modified_files.insert(file.clone());
        Ok(())
    }

    fn increment_modified_call(&self, base: &str, name: &str, by: u64) -> ReviewerResult<()> {
        *self
            .tables
            .write()
            .modified_calls
            .entry((base.to_string(), name.to_string()))
            .or_insert(0) += by;
        Ok(())
    }

    fn modified_entities(&self, kind: DefinitionKind) -> ReviewerResult<Vec<ModifiedEntity>> {
        Ok(self
            .tables
            .read()
            .modified_entities
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect())
    }

    fn modified_files(&self) -> ReviewerResult<Vec<ModifiedFile>> {
        Ok(self.tables.read().modified_files.iter().cloned().collect())
    }

    fn modified_calls(&self) -> ReviewerResult<Vec<ModifiedCallCount>> {
        Ok(self
            .tables
            .read()
            .modified_calls
            .iter()
            .map(|((base, name), count)| ModifiedCallCount {
                base: base.clone(),
                name: name.clone(),
                count: *count,
            })
            .collect())
    }

    fn clear_changes(&self) -> ReviewerResult<()> {
        let mut tables = self.tables.write();
        tables.modified_entities.clear();
        tables.modified_files.clear();
        tables.modified_calls.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn definitions_are_idempotent() {
        contract::definitions_are_idempotent(&MemoryStore::new());
    }

    #[test]
    fn range_and_name_queries() {
        contract::range_and_name_queries(&MemoryStore::new());
    }

    #[test]
    fn modified_calls_accumulate() {
        contract::modified_calls_accumulate(&MemoryStore::new());
    }

    #[test]
    fn change_records_dedupe_and_clear() {
        contract::change_records_dedupe_and_clear(&MemoryStore::new());
    }

    #[test]
    fn ownership_and_edges_round_trip() {
        contract::ownership_and_edges_round_trip(&MemoryStore::new());
    }

    #[test]
    fn files_calls_and_imports_round_trip() {
        contract::files_calls_and_imports_round_trip(&MemoryStore::new());
    }

    #[test]
    fn call_sites_are_replaced_per_file() {
        contract::call_sites_are_replaced_per_file(&MemoryStore::new());
    }

    #[test]
    fn ownership_is_replaced_per_file() {
        contract::ownership_is_replaced_per_file(&MemoryStore::new());
    }

    #[test]
    fn absent_file_queries_are_empty() {
        let store = MemoryStore::new();
        assert!(store.ownership("missing.py").unwrap().is_empty());
        assert!(store
            .definitions_containing(DefinitionKind::Function, "missing.py", 1, 1)
            .unwrap()
            .is_empty());
    }
}
