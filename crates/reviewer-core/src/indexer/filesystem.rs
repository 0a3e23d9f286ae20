//! Filesystem scanning helpers for indexing passes.

use std::path::Path;

use ignore::WalkBuilder;
use tracing::debug;

use crate::models::SourceFile;

const IMPLICIT_IGNORED_DIRS: &[&str] = &[".git", "__pycache__", ".venv", ".tox"];

/// List indexable files under `repo_root`, honouring `.gitignore`.
///
/// Only files ending in `extension` are returned, sorted by relative path.
pub fn scan_source_files(repo_root: &Path, extension: &str) -> Vec<SourceFile> {
    let walker = WalkBuilder::new(repo_root)
        .hidden(false)
        .git_ignore(true)
        .git_exclude(true)
        .git_global(false)
        .require_git(false)
        .follow_links(false)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|t| t.is_dir())
                && IMPLICIT_IGNORED_DIRS.contains(&name.as_ref()))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!("skipping unreadable entry: {err}");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if !has_extension(path, extension) {
            continue;
        }
        let rel_path = path
            .strip_prefix(repo_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        files.push(SourceFile::new(path.to_string_lossy(), rel_path));
    }
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    files
}

/// Case-sensitive suffix match; `extension` includes the dot.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.file_name()
        .map(|name| {
            let name = name.to_string_lossy();
            name.len() > extension.len() && name.ends_with(extension)
        })
        .unwrap_or(false)
}
