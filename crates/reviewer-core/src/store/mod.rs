//! Storage capability used by every pipeline stage.
//!
//! Components receive a `&dyn Store` and never hold a connection of their
//! own. Two implementations ship with the crate: [`sqlite::SqliteStore`] for
//! durable indexes and [`memory::MemoryStore`] for tests and one-shot runs.

pub mod memory;
pub mod schema;
pub mod sqlite;

use crate::errors::ReviewerResult;
use crate::models::{
    CallSite, Definition, DefinitionKind, Entity, ImportMapping, ModifiedCallCount,
    ModifiedEntity, ModifiedFile, OwnershipInterval, RelatedEdge, SourceFile,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistence contract for snapshot, ownership and change records.
///
/// Writes of an identity that already exists are no-ops, except
/// [`Store::increment_modified_call`] which adds to the stored count. Call
/// sites and ownership intervals have no identity of their own; they are
/// written per file and a second write for the same file replaces the first.
pub trait Store: Send + Sync {
    // -- snapshot records ---------------------------------------------------

    fn insert_source_file(&self, file: &SourceFile) -> ReviewerResult<()>;

    /// Insert definitions; identity is (kind, file, name, start_line).
    fn insert_definitions(&self, definitions: &[Definition]) -> ReviewerResult<()>;

    /// Replace every call site recorded for `file`.
    fn replace_call_sites(&self, file: &str, call_sites: &[CallSite]) -> ReviewerResult<()>;

    fn insert_import_mapping(&self, file: &str, mapping: &ImportMapping) -> ReviewerResult<()>;

    /// Replace every ownership interval recorded for `file`.
    fn replace_ownership(
        &self,
        file: &str,
        intervals: &[OwnershipInterval],
    ) -> ReviewerResult<()>;

    fn insert_related_edges(&self, edges: &[RelatedEdge]) -> ReviewerResult<()>;

    fn source_files(&self) -> ReviewerResult<Vec<SourceFile>>;

    fn definitions(&self, kind: DefinitionKind) -> ReviewerResult<Vec<Entity>>;

    /// Definitions of `kind` in `file` whose range contains `[start, end]`.
    fn definitions_containing(
        &self,
        kind: DefinitionKind,
        file: &str,
        start: u32,
        end: u32,
    ) -> ReviewerResult<Vec<Entity>>;

    /// Definitions of `kind` called `name` in any file with this basename.
    fn definitions_named(
        &self,
        kind: DefinitionKind,
        basename: &str,
        name: &str,
    ) -> ReviewerResult<Vec<Entity>>;

    fn call_sites(&self) -> ReviewerResult<Vec<CallSite>>;

    fn import_mapping(&self, file: &str) -> ReviewerResult<ImportMapping>;

    fn ownership(&self, file: &str) -> ReviewerResult<Vec<OwnershipInterval>>;

    fn all_ownership(&self) -> ReviewerResult<Vec<OwnershipInterval>>;

    fn related_edges(&self) -> ReviewerResult<Vec<RelatedEdge>>;

    // -- change records -----------------------------------------------------

    fn upsert_modified_entity(&self, entity: &ModifiedEntity) -> ReviewerResult<()>;

    fn upsert_modified_file(&self, file: &ModifiedFile) -> ReviewerResult<()>;

    fn increment_modified_call(&self, base: &str, name: &str, by: u64) -> ReviewerResult<()>;

    fn modified_entities(&self, kind: DefinitionKind) -> ReviewerResult<Vec<ModifiedEntity>>;

    fn modified_files(&self) -> ReviewerResult<Vec<ModifiedFile>>;

    fn modified_calls(&self) -> ReviewerResult<Vec<ModifiedCallCount>>;

    /// Drop every change record so a new request starts clean.
    fn clear_changes(&self) -> ReviewerResult<()>;
}
