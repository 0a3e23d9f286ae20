//! SQLite-backed [`Store`].
//!
//! One connection is opened per store and serialised behind a mutex; batch
//! writes run inside a single transaction.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};

use crate::errors::{ReviewerError, ReviewerResult};
use crate::models::{
    CallSite, Definition, DefinitionKind, Entity, EntityId, ImportMapping, ModifiedCallCount,
    ModifiedEntity, ModifiedFile, OwnershipInterval, RelatedEdge, SourceFile,
};
use crate::store::{schema, Store};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw == "~" || raw.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if raw.len() > 2 {
                expanded.push(&raw[2..]);
            }
            return expanded;
        }
    }
    path.to_path_buf()
}

const ENTITY_COLUMNS: &str = "id, kind, file, basename, name, start_line, end_line";

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let kind: String = row.get(1)?;
    let kind = DefinitionKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown definition kind '{kind}'").into(),
        )
    })?;
    Ok(Entity {
        id: EntityId(row.get(0)?),
        definition: Definition {
            kind,
            file: row.get(2)?,
            basename: row.get(3)?,
            name: row.get(4)?,
            start_line: row.get(5)?,
            end_line: row.get(6)?,
        },
    })
}

fn interval_from_row(row: &Row<'_>) -> rusqlite::Result<OwnershipInterval> {
    Ok(OwnershipInterval {
        contributor: row.get(0)?,
        file: row.get(1)?,
        start_line: row.get(2)?,
        end_line: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file. Parent directories are created and
    /// the schema is initialised before the store is returned.
    pub fn open(path: impl AsRef<Path>) -> ReviewerResult<Self> {
        let resolved = expand_tilde(path.as_ref());
        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&resolved)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> ReviewerResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ReviewerResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_entities(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> ReviewerResult<Vec<Entity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, entity_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl Store for SqliteStore {
    fn insert_source_file(&self, file: &SourceFile) -> ReviewerResult<()> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO files (relative_path, full_path, basename) \
             VALUES (?1, ?2, ?3);",
            params![file.relative_path, file.full_path, file.basename],
        )?;
        Ok(())
    }

    fn insert_definitions(&self, definitions: &[Definition]) -> ReviewerResult<()> {
        if definitions.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO definitions \
                 (kind, file, basename, name, start_line, end_line) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            )?;
            for d in definitions {
                stmt.execute(params![
                    d.kind.as_str(),
                    d.file,
                    d.basename,
                    d.name,
                    d.start_line,
                    d.end_line
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_call_sites(&self, file: &str, call_sites: &[CallSite]) -> ReviewerResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM call_sites WHERE file = ?1;", params![file])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO call_sites (file, base, name, start_line, end_line) \
                 VALUES (?1, ?2, ?3, ?4, ?5);",
            )?;
            for c in call_sites {
                stmt.execute(params![c.file, c.base, c.name, c.start_line, c.end_line])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_import_mapping(&self, file: &str, mapping: &ImportMapping) -> ReviewerResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let start: i64 = tx.query_row(
                "SELECT COUNT(*) FROM import_mappings WHERE file = ?1;",
                params![file],
                |row| row.get(0),
            )?;
            let mut stmt = tx.prepare(
                "INSERT INTO import_mappings (file, alias, target, position) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(file, alias) DO UPDATE SET target = excluded.target;",
            )?;
            for (offset, (alias, target)) in mapping.iter().enumerate() {
                stmt.execute(params![file, alias, target, start + offset as i64])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn replace_ownership(
        &self,
        file: &str,
        intervals: &[OwnershipInterval],
    ) -> ReviewerResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM ownership WHERE file = ?1;", params![file])?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO ownership (contributor, file, start_line, end_line) \
                 VALUES (?1, ?2, ?3, ?4);",
            )?;
            for i in intervals {
                stmt.execute(params![i.contributor, i.file, i.start_line, i.end_line])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_related_edges(&self, edges: &[RelatedEdge]) -> ReviewerResult<()> {
        if edges.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO related_edges (caller_id, callee_id) VALUES (?1, ?2);",
            )?;
            for e in edges {
                stmt.execute(params![e.caller.0, e.callee.0])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn source_files(&self) -> ReviewerResult<Vec<SourceFile>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT full_path, relative_path, basename FROM files ORDER BY rowid;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SourceFile {
                full_path: row.get(0)?,
                relative_path: row.get(1)?,
                basename: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn definitions(&self, kind: DefinitionKind) -> ReviewerResult<Vec<Entity>> {
        self.query_entities(
            &format!("SELECT {ENTITY_COLUMNS} FROM definitions WHERE kind = ?1 ORDER BY id;"),
            params![kind.as_str()],
        )
    }

    fn definitions_containing(
        &self,
        kind: DefinitionKind,
        file: &str,
        start: u32,
        end: u32,
    ) -> ReviewerResult<Vec<Entity>> {
        self.query_entities(
            &format!(
                "SELECT {ENTITY_COLUMNS} FROM definitions \
                 WHERE kind = ?1 AND file = ?2 AND start_line <= ?3 AND end_line >= ?4 \
                 ORDER BY id;"
            ),
            params![kind.as_str(), file, start, end],
        )
    }

    fn definitions_named(
        &self,
        kind: DefinitionKind,
        basename: &str,
        name: &str,
    ) -> ReviewerResult<Vec<Entity>> {
        self.query_entities(
            &format!(
                "SELECT {ENTITY_COLUMNS} FROM definitions \
                 WHERE kind = ?1 AND basename = ?2 AND name = ?3 ORDER BY id;"
            ),
            params![kind.as_str(), basename, name],
        )
    }

    fn call_sites(&self) -> ReviewerResult<Vec<CallSite>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT file, base, name, start_line, end_line FROM call_sites ORDER BY id;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CallSite {
                file: row.get(0)?,
                base: row.get(1)?,
                name: row.get(2)?,
                start_line: row.get(3)?,
                end_line: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn import_mapping(&self, file: &str) -> ReviewerResult<ImportMapping> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT alias, target FROM import_mappings WHERE file = ?1 ORDER BY position;",
        )?;
        let rows = stmt.query_map(params![file], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut mapping = ImportMapping::new();
        for row in rows {
            let (alias, target) = row?;
            mapping.insert(alias, target);
        }
        Ok(mapping)
    }

    fn ownership(&self, file: &str) -> ReviewerResult<Vec<OwnershipInterval>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT contributor, file, start_line, end_line FROM ownership \
             WHERE file = ?1 ORDER BY start_line, end_line, id;",
        )?;
        let rows = stmt.query_map(params![file], interval_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn all_ownership(&self) -> ReviewerResult<Vec<OwnershipInterval>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT contributor, file, start_line, end_line FROM ownership \
             ORDER BY file, start_line, end_line, id;",
        )?;
        let rows = stmt.query_map([], interval_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn related_edges(&self) -> ReviewerResult<Vec<RelatedEdge>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT caller_id, callee_id FROM related_edges ORDER BY rowid;")?;
        let rows = stmt.query_map([], |row| {
            Ok(RelatedEdge {
                caller: EntityId(row.get(0)?),
                callee: EntityId(row.get(1)?),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn upsert_modified_entity(&self, entity: &ModifiedEntity) -> ReviewerResult<()> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO modified_entities (kind, old_file, old_name) \
             VALUES (?1, ?2, ?3);",
            params![entity.kind.as_str(), entity.old_file, entity.old_name],
        )?;
        Ok(())
    }

    fn upsert_modified_file(&self, file: &ModifiedFile) -> ReviewerResult<()> {
        self.conn.lock().execute(
            "INSERT OR IGNORE INTO modified_files (old_file, old_basename) VALUES (?1, ?2);",
            params![file.old_file, file.old_basename],
        )?;
        Ok(())
    }

    fn increment_modified_call(&self, base: &str, name: &str, by: u64) -> ReviewerResult<()> {
        let by = i64::try_from(by)
            .map_err(|_| ReviewerError::Store(format!("call count {by} out of range")))?;
        self.conn.lock().execute(
            "INSERT INTO modified_calls (base, name, count) VALUES (?1, ?2, ?3) \
             ON CONFLICT(base, name) DO UPDATE SET count = count + excluded.count;",
            params![base, name, by],
        )?;
        Ok(())
    }

    fn modified_entities(&self, kind: DefinitionKind) -> ReviewerResult<Vec<ModifiedEntity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT old_file, old_name FROM modified_entities WHERE kind = ?1 ORDER BY id;",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], |row| {
            Ok(ModifiedEntity {
                kind,
                old_file: row.get(0)?,
                old_name: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn modified_files(&self) -> ReviewerResult<Vec<ModifiedFile>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT old_file, old_basename FROM modified_files ORDER BY id;")?;
        let rows = stmt.query_map([], |row| {
            Ok(ModifiedFile {
                old_file: row.get(0)?,
                old_basename: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn modified_calls(&self) -> ReviewerResult<Vec<ModifiedCallCount>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT base, name, count FROM modified_calls ORDER BY id;")?;
        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(2)?;
            Ok(ModifiedCallCount {
                base: row.get(0)?,
                name: row.get(1)?,
                count: count.max(0) as u64,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn clear_changes(&self) -> ReviewerResult<()> {
        self.conn.lock().execute_batch(
            "DELETE FROM modified_entities; \
             DELETE FROM modified_files; \
             DELETE FROM modified_calls;",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    #[test]
    fn definitions_are_idempotent() {
        contract::definitions_are_idempotent(&store());
    }

    #[test]
    fn range_and_name_queries() {
        contract::range_and_name_queries(&store());
    }

    #[test]
    fn modified_calls_accumulate() {
        contract::modified_calls_accumulate(&store());
    }

    #[test]
    fn change_records_dedupe_and_clear() {
        contract::change_records_dedupe_and_clear(&store());
    }

    #[test]
    fn ownership_and_edges_round_trip() {
        contract::ownership_and_edges_round_trip(&store());
    }

    #[test]
    fn files_calls_and_imports_round_trip() {
        contract::files_calls_and_imports_round_trip(&store());
    }

    #[test]
    fn call_sites_are_replaced_per_file() {
        contract::call_sites_are_replaced_per_file(&store());
    }

    #[test]
    fn ownership_is_replaced_per_file() {
        contract::ownership_is_replaced_per_file(&store());
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .insert_source_file(&SourceFile::new("/r/a.py", "a.py"))
                .unwrap();
        }
        assert!(path.exists());

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.source_files().unwrap().len(), 1);
    }

    #[test]
    fn expand_tilde_leaves_plain_paths() {
        assert_eq!(
            expand_tilde(Path::new("/tmp/index.db")),
            PathBuf::from("/tmp/index.db")
        );
    }
}
