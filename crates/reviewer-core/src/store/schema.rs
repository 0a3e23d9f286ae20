//! SQLite tables for the snapshot index and change records, plus versioned
//! migrations recorded in `migration_history`.

use rusqlite::Connection;

use crate::errors::ReviewerResult;

/// Version a fully migrated database reports in `repo_meta`.
pub const SCHEMA_VERSION: i32 = 2;

/// Baseline DDL (11 tables, 5 indexes). Every statement is `IF NOT EXISTS`.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (11) ─────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS repo_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS files (
        relative_path TEXT PRIMARY KEY,
        full_path TEXT NOT NULL,
        basename TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS definitions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        file TEXT NOT NULL,
        basename TEXT NOT NULL,
        name TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        UNIQUE(kind, file, name, start_line)
    );",
    "CREATE TABLE IF NOT EXISTS call_sites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file TEXT NOT NULL,
        base TEXT NOT NULL,
        name TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS import_mappings (
        file TEXT NOT NULL,
        alias TEXT NOT NULL,
        target TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY(file, alias)
    );",
    "CREATE TABLE IF NOT EXISTS ownership (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contributor TEXT NOT NULL,
        file TEXT NOT NULL,
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL,
        UNIQUE(file, start_line, end_line, contributor)
    );",
    "CREATE TABLE IF NOT EXISTS related_edges (
        caller_id INTEGER NOT NULL REFERENCES definitions(id),
        callee_id INTEGER NOT NULL REFERENCES definitions(id),
        PRIMARY KEY(caller_id, callee_id)
    );",
    "CREATE TABLE IF NOT EXISTS modified_entities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        old_file TEXT NOT NULL,
        old_name TEXT NOT NULL,
        UNIQUE(kind, old_file, old_name)
    );",
    "CREATE TABLE IF NOT EXISTS modified_files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        old_file TEXT NOT NULL UNIQUE,
        old_basename TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS modified_calls (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        base TEXT NOT NULL,
        name TEXT NOT NULL,
        count INTEGER NOT NULL DEFAULT 0,
        UNIQUE(base, name)
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    // ── indexes (5) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_definitions_file ON definitions(kind, file, start_line);",
    "CREATE INDEX IF NOT EXISTS idx_definitions_basename_name ON definitions(kind, basename, name);",
    "CREATE INDEX IF NOT EXISTS idx_call_sites_file ON call_sites(file, start_line);",
    "CREATE INDEX IF NOT EXISTS idx_ownership_file ON ownership(file, start_line);",
    "CREATE INDEX IF NOT EXISTS idx_related_edges_callee ON related_edges(callee_id);",
];

/// Apply the baseline DDL and bring the database to [`SCHEMA_VERSION`].
pub fn init_schema(conn: &Connection) -> ReviewerResult<()> {
    for ddl in SCHEMA_STATEMENTS {
        conn.execute_batch(ddl)?;
    }
    migrate_schema(conn)
}

type MigrationStep = fn(&Connection) -> ReviewerResult<()>;

/// Step that moves the database to version `n` is at index `n - 1`.
const MIGRATIONS: [MigrationStep; SCHEMA_VERSION as usize] = [baseline, add_call_site_lookup];

/// Version 1 is the baseline DDL itself.
fn baseline(_conn: &Connection) -> ReviewerResult<()> {
    Ok(())
}

/// Version 2: API-usage scoring looks call sites up by (base, name).
fn add_call_site_lookup(conn: &Connection) -> ReviewerResult<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_call_sites_base_name ON call_sites(base, name);",
    )?;
    Ok(())
}

/// Apply every step above the stored version, one savepoint per step. A
/// failing step is rolled back, logged to `migration_history`, and returned.
pub fn migrate_schema(conn: &Connection) -> ReviewerResult<()> {
    let stored = get_schema_version(conn).max(0);
    for target in (stored + 1)..=SCHEMA_VERSION {
        let step = MIGRATIONS[(target - 1) as usize];
        conn.execute_batch("SAVEPOINT reviewer_migrate_step;")?;
        match apply_step(conn, step, target) {
            Ok(()) => conn.execute_batch("RELEASE SAVEPOINT reviewer_migrate_step;")?,
            Err(err) => {
                let _ = conn.execute_batch(
                    "ROLLBACK TO SAVEPOINT reviewer_migrate_step; \
                     RELEASE SAVEPOINT reviewer_migrate_step;",
                );
                let _ = log_step(conn, target - 1, target, "failed", Some(&err.to_string()));
                return Err(err);
            }
        }
    }
    Ok(())
}

fn apply_step(conn: &Connection, step: MigrationStep, target: i32) -> ReviewerResult<()> {
    step(conn)?;
    conn.execute(
        "INSERT INTO repo_meta (key, value) VALUES ('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = ?1;",
        rusqlite::params![target.to_string()],
    )?;
    log_step(conn, target - 1, target, "success", None)
}

/// Stored schema version; 0 for a database that has never been migrated.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT value FROM repo_meta WHERE key = 'schema_version';",
        [],
        |row| row.get::<_, String>(0),
    )
    .ok()
    .and_then(|raw| raw.parse().ok())
    .unwrap_or(0)
}

fn log_step(
    conn: &Connection,
    from: i32,
    to: i32,
    status: &str,
    message: Option<&str>,
) -> ReviewerResult<()> {
    conn.execute(
        "INSERT INTO migration_history (from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from, to, status, message],
    )?;
    Ok(())
}
