//! Python bindings, compiled with the `python` feature.
//!
//! Python collaborators do the git and hosting work and hand the engine plain
//! data: file lists as `(full_path, relative_path)` tuples, blame as
//! `{relative_path: [(contributor, [line, ...]), ...]}`, and PR sources as
//! `{new_path: text}`. No Python callbacks run on worker threads.

use std::collections::HashMap;
use std::path::Path;

use pyo3::prelude::*;
use pyo3::types::PyDict;
use pyo3::wrap_pyfunction;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::diff::parse_unified_diff;
use crate::engine::Engine;
use crate::errors::ReviewerResult;
use crate::guards;
use crate::indexer::filesystem::scan_source_files;
use crate::models::{BlameEntry, SourceFile};
use crate::ownership::PrecomputedBlame;

type PyBlame = HashMap<String, Vec<(String, Vec<String>)>>;

fn to_source_files(files: Vec<(String, String)>) -> Vec<SourceFile> {
    files
        .into_iter()
        .map(|(full_path, relative_path)| SourceFile::new(full_path, relative_path))
        .collect()
}

/// Flat stats struct → dict of ints.
fn stats_dict<'py, T: Serialize>(py: Python<'py>, stats: &T) -> PyResult<Bound<'py, PyDict>> {
    let value = serde_json::to_value(stats).map_err(crate::errors::ReviewerError::from)?;
    let dict = PyDict::new(py);
    if let serde_json::Value::Object(fields) = value {
        for (key, field) in fields {
            dict.set_item(key, field.as_u64().unwrap_or(0))?;
        }
    }
    Ok(dict)
}

#[pyclass(name = "Engine")]
pub struct PyEngine {
    inner: Engine,
}

#[pymethods]
impl PyEngine {
    /// In-memory engine unless `db_path` is given. Unset limits fall back to
    /// the `REVIEWER_*` environment, then to defaults.
    #[new]
    #[pyo3(signature = (db_path=None, workers=None, max_chain_depth=None))]
    fn new(
        db_path: Option<std::path::PathBuf>,
        workers: Option<usize>,
        max_chain_depth: Option<usize>,
    ) -> PyResult<Self> {
        let mut config = EngineConfig::from_env();
        if let Some(workers) = workers {
            config.workers = workers;
        }
        if let Some(depth) = max_chain_depth {
            config.max_chain_depth = depth;
        }
        let inner = match db_path {
            Some(path) => Engine::open(path, config)?,
            None => Engine::in_memory(config),
        };
        Ok(Self { inner })
    }

    #[getter]
    fn workers(&self) -> usize {
        self.inner.config().workers
    }

    fn index_snapshot<'py>(
        &mut self,
        py: Python<'py>,
        files: Vec<(String, String)>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let files = to_source_files(files);
        let stats = py.allow_threads(|| self.inner.index_snapshot(&files))?;
        stats_dict(py, &stats)
    }

    fn attribute_ownership<'py>(
        &mut self,
        py: Python<'py>,
        files: Vec<(String, String)>,
        reference: &str,
        blame: PyBlame,
    ) -> PyResult<Bound<'py, PyDict>> {
        let files = to_source_files(files);
        let blame: PrecomputedBlame = blame
            .into_iter()
            .map(|(path, entries)| {
                let entries = entries
                    .into_iter()
                    .map(|(who, lines)| BlameEntry::new(who, lines))
                    .collect();
                (path, entries)
            })
            .collect();
        let stats = py.allow_threads(|| self.inner.attribute_ownership(&files, reference, &blame))?;
        stats_dict(py, &stats)
    }

    fn classify_changes<'py>(
        &mut self,
        py: Python<'py>,
        diff: &str,
        sources: HashMap<String, String>,
    ) -> PyResult<Bound<'py, PyDict>> {
        let stats = self.inner.classify_changes(diff, &sources)?;
        stats_dict(py, &stats)
    }

    /// Ordered `(contributor, total_rank)` pairs, lowest total first.
    fn score_and_rank(&self) -> PyResult<Vec<(String, u32)>> {
        Ok(self
            .inner
            .score_and_rank()?
            .into_iter()
            .map(|r| (r.contributor, r.total_rank))
            .collect())
    }

    /// Full report with per-signal scores and ranks, as JSON.
    fn recommend_json(&self) -> PyResult<String> {
        let report: ReviewerResult<String> = self.inner.recommend().and_then(|r| r.to_json());
        Ok(report?)
    }
}

/// `(old_path, new_path, [(start, end), ...])` per file section.
#[pyfunction]
fn parse_diff(text: &str) -> Vec<(Option<String>, Option<String>, Vec<(u32, u32)>)> {
    parse_unified_diff(text)
        .into_iter()
        .map(|d| {
            let hunks = d.hunks.iter().map(|h| (h.start, h.end)).collect();
            (d.old_path, d.new_path, hunks)
        })
        .collect()
}

/// `(full_path, relative_path)` for every `.py` file under `repo_root`.
#[pyfunction]
fn scan_files(repo_root: &str) -> Vec<(String, String)> {
    scan_source_files(Path::new(repo_root), &EngineConfig::default().source_extension)
        .into_iter()
        .map(|f| (f.full_path, f.relative_path))
        .collect()
}

#[pymodule]
fn _reviewer_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyEngine>()?;

    m.add("DEFAULT_WORKERS", guards::DEFAULT_WORKERS)?;
    m.add("MAX_WORKERS", guards::MAX_WORKERS)?;
    m.add("DEFAULT_MAX_CHAIN_DEPTH", guards::DEFAULT_MAX_CHAIN_DEPTH)?;
    m.add("MAX_CHAIN_DEPTH", guards::MAX_CHAIN_DEPTH)?;

    m.add_function(wrap_pyfunction!(parse_diff, m)?)?;
    m.add_function(wrap_pyfunction!(scan_files, m)?)?;
    Ok(())
}
