//! Indexing pipeline orchestration with Rayon-based parallelism.

use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::errors::ReviewerResult;
use crate::indexer::filesystem::has_extension;
use crate::indexer::symbols::{index_source, FileIndex};
use crate::models::SourceFile;
use crate::store::Store;

/// Map `items` on a pool of `workers` threads, preserving input order.
/// Falls back to sequential execution if the pool cannot be built.
pub fn parallel_map<T, R, F>(items: &[T], workers: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    if items.is_empty() {
        return vec![];
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build();

    match pool {
        Ok(pool) => pool.install(|| items.par_iter().map(&f).collect()),
        Err(err) => {
            debug!("thread pool unavailable, running sequentially: {err}");
            items.iter().map(&f).collect()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub files_seen: usize,
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub definitions_indexed: usize,
    pub call_sites_indexed: usize,
    pub calls_skipped: usize,
    /// Filled in once the call graph has been linked.
    pub edges_linked: usize,
    pub elapsed_ms: u64,
}

/// `Ok(None)` for a file that is unreadable or fails to parse; anything
/// else the indexer reports is returned to the caller.
fn extract_file_worker(
    file: &SourceFile,
    max_chain_depth: usize,
) -> ReviewerResult<Option<FileIndex>> {
    let source = match std::fs::read_to_string(Path::new(&file.full_path)) {
        Ok(s) => s,
        Err(err) => {
            debug!("skipping unreadable file {}: {err}", file.relative_path);
            return Ok(None);
        }
    };
    match index_source(&file.relative_path, source, max_chain_depth) {
        Ok(index) => Ok(Some(index)),
        Err(err) if err.is_recoverable() => {
            debug!("skipping {}: {err}", file.relative_path);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Parse every indexable file in parallel, then write definitions, call
/// sites and import mappings to the store. Re-indexing a file replaces its
/// call sites.
pub fn index_snapshot(
    store: &dyn Store,
    files: &[SourceFile],
    config: &EngineConfig,
) -> ReviewerResult<IndexStats> {
    let started = Instant::now();
    let indexable: Vec<&SourceFile> = files
        .iter()
        .filter(|f| has_extension(Path::new(&f.relative_path), &config.source_extension))
        .collect();

    let max_chain_depth = config.max_chain_depth;
    let results = parallel_map(&indexable, config.workers, |file| {
        extract_file_worker(file, max_chain_depth)
    });

    let mut stats = IndexStats {
        files_seen: files.len(),
        ..IndexStats::default()
    };
    for (file, result) in indexable.iter().zip(results) {
        let Some(index) = result? else {
            stats.files_skipped += 1;
            continue;
        };
        store.insert_source_file(file)?;
        store.insert_definitions(&index.definitions)?;
        store.replace_call_sites(&index.file, &index.call_sites)?;
        store.insert_import_mapping(&index.file, &index.imports)?;
        stats.files_indexed += 1;
        stats.definitions_indexed += index.definitions.len();
        stats.call_sites_indexed += index.call_sites.len();
        stats.calls_skipped += index.skipped_calls;
    }
    stats.elapsed_ms = started.elapsed().as_millis() as u64;

    info!(
        "indexed {} of {} files ({} definitions, {} call sites) in {} ms",
        stats.files_indexed,
        stats.files_seen,
        stats.definitions_indexed,
        stats.call_sites_indexed,
        stats.elapsed_ms
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DefinitionKind;
    use crate::store::MemoryStore;

    fn write(root: &Path, rel: &str, body: &str) -> SourceFile {
        let full = root.join(rel);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&full, body).unwrap();
        SourceFile::new(full.to_string_lossy(), rel)
    }

    #[test]
    fn parallel_map_preserves_order() {
        let items: Vec<u32> = (0..100).collect();
        let doubled = parallel_map(&items, 4, |x| x * 2);
        assert_eq!(doubled, (0..100).map(|x| x * 2).collect::<Vec<_>>());
        assert!(parallel_map(&Vec::<u32>::new(), 4, |x| *x).is_empty());
    }

    #[test]
    fn index_snapshot_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![
            write(root, "a.py", "import b\n\ndef f():\n    b.g()\n"),
            write(root, "b.py", "def g():\n    return 1\n"),
            write(root, "broken.py", "def f(:\n"),
            write(root, "README.md", "# docs\n"),
            SourceFile::new(root.join("gone.py").to_string_lossy(), "gone.py"),
        ];

        let store = MemoryStore::new();
        let stats = index_snapshot(&store, &files, &EngineConfig::default()).unwrap();

        assert_eq!(stats.files_seen, 5);
        assert_eq!(stats.files_indexed, 2);
        assert_eq!(stats.files_skipped, 2);
        assert_eq!(stats.definitions_indexed, 2);
        assert_eq!(stats.call_sites_indexed, 1);

        let stored: Vec<String> = store
            .source_files()
            .unwrap()
            .into_iter()
            .map(|f| f.relative_path)
            .collect();
        assert_eq!(stored, vec!["a.py".to_string(), "b.py".to_string()]);
        assert_eq!(store.definitions(DefinitionKind::Function).unwrap().len(), 2);
        assert_eq!(store.import_mapping("a.py").unwrap().resolve("b"), Some("b"));
    }

    #[test]
    fn reindexing_does_not_duplicate_records() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![
            write(
                dir.path(),
                "m.py",
                "import json\n\nclass C:\n    def run(self):\n        return json.dumps(1)\n",
            ),
            write(dir.path(), "n.py", "import os\n\nos.getcwd()\n"),
        ];
        let store = MemoryStore::new();
        let config = EngineConfig::default();
        index_snapshot(&store, &files, &config).unwrap();
        index_snapshot(&store, &files[..1], &config).unwrap();
        assert_eq!(store.definitions(DefinitionKind::Class).unwrap().len(), 1);
        assert_eq!(store.definitions(DefinitionKind::Function).unwrap().len(), 1);
        assert_eq!(store.call_sites().unwrap().len(), 2);
    }
}
