//! Reviewer core library: pull request reviewer recommendation.
//!
//! The crate indexes a Python snapshot (definitions, call sites, imports),
//! attributes line ownership from blame, maps a unified diff onto the indexed
//! entities, and ranks contributors by three signals: ownership of modified
//! code, ownership of related code, and historical use of the same APIs.
//! With the `python` feature it is also built as the `_reviewer_core`
//! extension module via PyO3.

pub mod changes;
pub mod config;
pub mod diff;
pub mod engine;
pub mod errors;
pub mod guards;
pub mod indexer;
pub mod models;
pub mod ownership;
pub mod scoring;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use changes::SourceProvider;
pub use config::EngineConfig;
pub use engine::{Engine, Recommendation};
pub use errors::{ReviewerError, ReviewerResult};
pub use ownership::{BlameSource, PrecomputedBlame};
pub use store::{MemoryStore, SqliteStore, Store};
