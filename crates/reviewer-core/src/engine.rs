//! Reviewer recommendation engine.
//!
//! The engine owns a [`Store`] and an [`EngineConfig`] and runs the stages in
//! order: index the base snapshot (which also links the call graph), attribute
//! ownership, classify a diff, then score and rank. Ownership may be
//! attributed at any point before scoring.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::changes::{classify_changes, ChangeStats, SourceProvider};
use crate::config::EngineConfig;
use crate::diff::parse_unified_diff;
use crate::errors::{ReviewerError, ReviewerResult};
use crate::indexer::callgraph::link_call_graph;
use crate::indexer::pipeline::{index_snapshot, IndexStats};
use crate::models::{RankMap, RankedContributor, ScoreMap, Signal, SourceFile};
use crate::ownership::{attribute_ownership, BlameSource, OwnershipStats};
use crate::scoring::{competition_rank, fuse, score_signal, ScoringSnapshot};
use crate::store::{MemoryStore, SqliteStore, Store};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Empty,
    Indexed,
    Classified,
}

/// Full output of one recommendation request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Contributors ordered by ascending total rank.
    pub ranking: Vec<RankedContributor>,
    pub scores: IndexMap<Signal, ScoreMap>,
    pub ranks: IndexMap<Signal, RankMap>,
}

impl Recommendation {
    pub fn top(&self, k: usize) -> &[RankedContributor] {
        &self.ranking[..k.min(self.ranking.len())]
    }

    pub fn to_json(&self) -> ReviewerResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub struct Engine {
    store: Box<dyn Store>,
    config: EngineConfig,
    stage: Stage,
}

impl Engine {
    pub fn new(store: Box<dyn Store>, config: EngineConfig) -> Self {
        Self {
            store,
            config: config.normalized(),
            stage: Stage::Empty,
        }
    }

    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Box::new(MemoryStore::new()), config)
    }

    /// Engine backed by a SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>, config: EngineConfig) -> ReviewerResult<Self> {
        Ok(Self::new(Box::new(SqliteStore::open(path)?), config))
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn require(&self, stage: Stage, operation: &str) -> ReviewerResult<()> {
        if self.stage < stage {
            return Err(ReviewerError::Pipeline(format!(
                "{operation} called before {}",
                match stage {
                    Stage::Empty => "initialisation",
                    Stage::Indexed => "index_snapshot",
                    Stage::Classified => "classify_changes",
                }
            )));
        }
        Ok(())
    }

    /// Index the base snapshot and link its call graph.
    pub fn index_snapshot(&mut self, files: &[SourceFile]) -> ReviewerResult<IndexStats> {
        let mut stats = index_snapshot(self.store(), files, &self.config)?;
        stats.edges_linked = link_call_graph(self.store(), &self.config.source_extension)?;
        self.stage = Stage::Indexed;
        Ok(stats)
    }

    pub fn attribute_ownership(
        &mut self,
        files: &[SourceFile],
        reference: &str,
        blame: &dyn BlameSource,
    ) -> ReviewerResult<OwnershipStats> {
        attribute_ownership(self.store(), files, reference, blame, &self.config)
    }

    /// Parse `diff` and record what it modifies in the indexed snapshot.
    pub fn classify_changes(
        &mut self,
        diff: &str,
        sources: &dyn SourceProvider,
    ) -> ReviewerResult<ChangeStats> {
        self.require(Stage::Indexed, "classify_changes")?;
        let diffs = parse_unified_diff(diff);
        let stats = classify_changes(self.store(), &diffs, sources, &self.config)?;
        self.stage = Stage::Classified;
        Ok(stats)
    }

    /// Score every signal, rank, and fuse.
    pub fn recommend(&self) -> ReviewerResult<Recommendation> {
        self.require(Stage::Classified, "score_and_rank")?;
        let snapshot = ScoringSnapshot::load(self.store())?;

        let mut recommendation = Recommendation::default();
        for signal in Signal::ALL {
            let scores = score_signal(signal, &snapshot);
            recommendation
                .ranks
                .insert(signal, competition_rank(&scores));
            recommendation.scores.insert(signal, scores);
        }
        let rank_maps: Vec<RankMap> = recommendation.ranks.values().cloned().collect();
        recommendation.ranking = fuse(&rank_maps);

        info!(
            "ranked {} contributors (modified: {}, related: {}, api: {})",
            recommendation.ranking.len(),
            recommendation.scores[&Signal::ModifiedCode].len(),
            recommendation.scores[&Signal::RelatedCode].len(),
            recommendation.scores[&Signal::ApiUsage].len()
        );
        Ok(recommendation)
    }

    pub fn score_and_rank(&self) -> ReviewerResult<Vec<RankedContributor>> {
        Ok(self.recommend()?.ranking)
    }
}
