//! Change classification: which base entities and calls a diff touches.
//!
//! Each diffed file's current content is re-indexed under its old path and
//! everything overlapping a touched range becomes a modified record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::ReviewerResult;
use crate::indexer::symbols::index_source;
use crate::models::{DefinitionKind, FileDiff, LineRange, ModifiedEntity, ModifiedFile};
use crate::store::Store;

/// Supplies the PR snapshot's content for a new-side path.
pub trait SourceProvider {
    fn read(&self, new_path: &str) -> Option<String>;
}

impl SourceProvider for HashMap<String, String> {
    fn read(&self, new_path: &str) -> Option<String> {
        self.get(new_path).cloned()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStats {
    pub files_in_diff: usize,
    pub modified_files: usize,
    pub files_reindexed: usize,
    pub files_skipped: usize,
    pub modified_entities: usize,
    pub modified_calls: u64,
}

fn touches(hunks: &[LineRange], range: &LineRange) -> bool {
    hunks.iter().any(|hunk| hunk.overlaps(range))
}

/// Record the modified files, entities and call counts for one diff.
///
/// Previously recorded changes are cleared first. Files added by the diff
/// have no old path and contribute nothing.
pub fn classify_changes(
    store: &dyn Store,
    diffs: &[FileDiff],
    sources: &dyn SourceProvider,
    config: &EngineConfig,
) -> ReviewerResult<ChangeStats> {
    store.clear_changes()?;
    let mut stats = ChangeStats {
        files_in_diff: diffs.len(),
        ..ChangeStats::default()
    };

    for diff in diffs {
        let (Some(old_path), Some(old_basename)) = (&diff.old_path, &diff.old_basename) else {
            debug!(
                "no old side for {}, skipping",
                diff.new_path.as_deref().unwrap_or("<unknown>")
            );
            continue;
        };
        store.upsert_modified_file(&ModifiedFile {
            old_file: old_path.clone(),
            old_basename: old_basename.clone(),
        })?;
        stats.modified_files += 1;

        let Some(new_path) = &diff.new_path else {
            continue;
        };
        if diff.hunks.is_empty() || !new_path.ends_with(&config.source_extension) {
            continue;
        }
        let Some(source) = sources.read(new_path) else {
            debug!("no content for {new_path}, skipping");
            stats.files_skipped += 1;
            continue;
        };
        let index = match index_source(old_path, source, config.max_chain_depth) {
            Ok(index) => index,
            Err(err) if err.is_recoverable() => {
                warn!("skipping changed file {new_path}: {err}");
                stats.files_skipped += 1;
                continue;
            }
            Err(err) => return Err(err),
        };
        stats.files_reindexed += 1;

        for definition in &index.definitions {
            if touches(&diff.hunks, &definition.range()) {
                store.upsert_modified_entity(&ModifiedEntity {
                    kind: definition.kind,
                    old_file: old_path.clone(),
                    old_name: definition.name.clone(),
                })?;
            }
        }
        for call in &index.call_sites {
            if touches(&diff.hunks, &call.range()) {
                store.increment_modified_call(&call.base, &call.name, 1)?;
                stats.modified_calls += 1;
            }
        }
    }

    stats.modified_entities = store.modified_entities(DefinitionKind::Function)?.len()
        + store.modified_entities(DefinitionKind::Class)?.len();

    info!(
        "classified {} diffed files: {} modified entities, {} modified calls",
        stats.files_in_diff, stats.modified_entities, stats.modified_calls
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::parse_unified_diff;
    use crate::store::MemoryStore;

    const NEW_SOURCE: &str = "\
import json


def encode(value):
    return json.dumps(value)


class Codec:
    def decode(self, raw):
        return json.loads(raw)
";

    fn sources(path: &str, body: &str) -> HashMap<String, String> {
        HashMap::from([(path.to_string(), body.to_string())])
    }

    #[test]
    fn overlapping_entities_and_calls_are_recorded() {
        let diff = parse_unified_diff(
            "--- a/codec.py\n+++ b/codec.py\n@@ -5,1 +5,1 @@\n-    return json.dumps(value, indent=2)\n+    return json.dumps(value)\n",
        );
        let store = MemoryStore::new();
        let stats = classify_changes(
            &store,
            &diff,
            &sources("codec.py", NEW_SOURCE),
            &EngineConfig::default(),
        )
        .unwrap();

        assert_eq!(stats.modified_files, 1);
        assert_eq!(stats.files_reindexed, 1);
        let functions = store.modified_entities(DefinitionKind::Function).unwrap();
        let names: Vec<&str> = functions.iter().map(|e| e.old_name.as_str()).collect();
        assert_eq!(names, vec!["encode"]);
        assert!(store.modified_entities(DefinitionKind::Class).unwrap().is_empty());

        let calls = store.modified_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            (calls[0].base.as_str(), calls[0].name.as_str(), calls[0].count),
            ("json", "dumps", 1)
        );
    }

    #[test]
    fn entities_are_keyed_by_old_path() {
        let diff = parse_unified_diff(
            "diff --git a/old_codec.py b/codec.py\nrename from old_codec.py\nrename to codec.py\n--- a/old_codec.py\n+++ b/codec.py\n@@ -9,2 +9,2 @@\n-    def decode(self, raw):\n-        return raw\n+    def decode(self, raw):\n+        return json.loads(raw)\n",
        );
        let store = MemoryStore::new();
        classify_changes(
            &store,
            &diff,
            &sources("codec.py", NEW_SOURCE),
            &EngineConfig::default(),
        )
        .unwrap();

        let classes = store.modified_entities(DefinitionKind::Class).unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].old_file, "old_codec.py");
        assert_eq!(
            store.modified_files().unwrap()[0].old_basename,
            "old_codec.py"
        );
        let methods = store.modified_entities(DefinitionKind::Function).unwrap();
        assert_eq!(methods[0].old_name, "decode");
    }

    #[test]
    fn new_file_only_records_nothing() {
        let diff = parse_unified_diff(
            "diff --git a/fresh.py b/fresh.py\nnew file mode 100644\n--- /dev/null\n+++ b/fresh.py\n@@ -0,0 +1,2 @@\n+def f():\n+    pass\n",
        );
        let store = MemoryStore::new();
        let stats = classify_changes(
            &store,
            &diff,
            &sources("fresh.py", "def f():\n    pass\n"),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(stats.modified_files, 0);
        assert_eq!(stats.modified_entities, 0);
        assert!(store.modified_files().unwrap().is_empty());
        assert!(store.modified_calls().unwrap().is_empty());
    }

    #[test]
    fn unparsable_content_still_counts_the_file() {
        let diff = parse_unified_diff("--- a/x.py\n+++ b/x.py\n@@ -1,1 +1,1 @@\n-a\n+def (:\n");
        let store = MemoryStore::new();
        let stats = classify_changes(
            &store,
            &diff,
            &sources("x.py", "def (:\n"),
            &EngineConfig::default(),
        )
        .unwrap();
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(store.modified_files().unwrap().len(), 1);
    }

    #[test]
    fn repeated_calls_accumulate_and_previous_request_is_cleared() {
        let body = "import os\n\ndef f():\n    os.getcwd()\n    os.getcwd()\n";
        let diff = parse_unified_diff("--- a/f.py\n+++ b/f.py\n@@ -4,2 +4,2 @@\n-x\n-y\n+    os.getcwd()\n+    os.getcwd()\n");
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        let provider = sources("f.py", body);

        classify_changes(&store, &diff, &provider, &config).unwrap();
        classify_changes(&store, &diff, &provider, &config).unwrap();

        let calls = store.modified_calls().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].count, 2);
    }
}
