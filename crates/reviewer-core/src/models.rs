//! Shared typed models used across indexing, storage, and scoring layers.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Contributor → score, in first-seen order.
pub type ScoreMap = IndexMap<String, f64>;

/// Contributor → competition rank (1 is best).
pub type RankMap = IndexMap<String, u32>;

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Final component of a `/`-separated path.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Name a module is imported by: the basename minus its extension.
pub fn import_name(basename: &str) -> &str {
    match basename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => basename,
    }
}

// ---------------------------------------------------------------------------
// 1. LineRange
// ---------------------------------------------------------------------------

/// An inclusive, 1-based line range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of lines covered, never less than one.
    pub fn line_count(&self) -> u32 {
        self.end.saturating_sub(self.start) + 1
    }

    pub fn contains(&self, other: &LineRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn overlaps(&self, other: &LineRange) -> bool {
        overlap(self, other) > 0
    }
}

/// `max(0, min(end_a, end_b) - max(start_a, start_b) + 1)`.
pub fn overlap(a: &LineRange, b: &LineRange) -> u32 {
    let lo = a.start.max(b.start);
    let hi = a.end.min(b.end);
    if hi < lo {
        0
    } else {
        hi - lo + 1
    }
}

// ---------------------------------------------------------------------------
// 2. SourceFile
// ---------------------------------------------------------------------------

/// One file of a snapshot, as listed by the repository collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceFile {
    pub full_path: String,
    pub relative_path: String,
    pub basename: String,
}

impl SourceFile {
    pub fn new(full_path: impl Into<String>, relative_path: impl Into<String>) -> Self {
        let relative_path = relative_path.into().replace('\\', "/");
        let basename = basename(&relative_path).to_string();
        Self {
            full_path: full_path.into(),
            relative_path,
            basename,
        }
    }

    pub fn import_name(&self) -> &str {
        import_name(&self.basename)
    }
}

// ---------------------------------------------------------------------------
// 3. Definitions and entities
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    Function,
    Class,
}

impl DefinitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Function => "function",
            DefinitionKind::Class => "class",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "function" => Some(DefinitionKind::Function),
            "class" => Some(DefinitionKind::Class),
            _ => None,
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function or class definition found in one file.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Definition {
    pub kind: DefinitionKind,
    pub file: String,
    pub basename: String,
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl Definition {
    pub fn range(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }
}

/// Store-assigned identifier of a definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

/// A stored definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub definition: Definition,
}

// ---------------------------------------------------------------------------
// 4. Calls and imports
// ---------------------------------------------------------------------------

/// A call expression with its resolved base module or object name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    pub file: String,
    pub base: String,
    pub name: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl CallSite {
    pub fn range(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }
}

/// Per-file alias → resolved module name. Only final dotted segments are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMapping {
    aliases: IndexMap<String, String>,
}

impl ImportMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.aliases.get(alias).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, t)| (a.as_str(), t.as_str()))
    }
}

// ---------------------------------------------------------------------------
// 5. Ownership
// ---------------------------------------------------------------------------

/// One blame record: a contributor and the consecutive lines attributed to them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameEntry {
    pub contributor: String,
    pub lines: Vec<String>,
}

impl BlameEntry {
    pub fn new(contributor: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            contributor: contributor.into(),
            lines,
        }
    }
}

/// Contiguous lines of a file last touched by one contributor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnershipInterval {
    pub contributor: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl OwnershipInterval {
    pub fn range(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }
}

// ---------------------------------------------------------------------------
// 6. Diff and change records
// ---------------------------------------------------------------------------

/// One file section of a unified diff.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub old_basename: Option<String>,
    /// Touched ranges in new-file coordinates.
    pub hunks: Vec<LineRange>,
}

/// A definition overlapping a diff hunk, keyed without line numbers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModifiedEntity {
    pub kind: DefinitionKind,
    pub old_file: String,
    pub old_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModifiedFile {
    pub old_file: String,
    pub old_basename: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModifiedCallCount {
    pub base: String,
    pub name: String,
    pub count: u64,
}

/// Caller → callee edge between two stored function definitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelatedEdge {
    pub caller: EntityId,
    pub callee: EntityId,
}

// ---------------------------------------------------------------------------
// 7. Ranking output
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    ModifiedCode,
    RelatedCode,
    ApiUsage,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::ModifiedCode, Signal::RelatedCode, Signal::ApiUsage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::ModifiedCode => "modified_code",
            Signal::RelatedCode => "related_code",
            Signal::ApiUsage => "api_usage",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedContributor {
    pub contributor: String,
    pub total_rank: u32,
}
