//! Modified-Code signal: who owns what the change touches.

use crate::models::{ModifiedEntity, ScoreMap, Signal};
use crate::scoring::{accumulate, normalize, ScoringSnapshot};

const SUB_SIGNAL_WEIGHT: f64 = 1.0 / 3.0;

fn entity_scores(snapshot: &ScoringSnapshot, modified: &[ModifiedEntity]) -> ScoreMap {
    let mut raw = ScoreMap::new();
    for record in modified {
        for entity in snapshot.matching(record) {
            let fractions = snapshot.fractions(&entity.definition.file, entity.definition.range());
            accumulate(&mut raw, &fractions, 1.0);
        }
    }
    raw
}

/// Whole-file ownership of every modified file. A file's length is the total
/// length of its intervals.
fn file_scores(snapshot: &ScoringSnapshot) -> ScoreMap {
    let mut raw = ScoreMap::new();
    for file in &snapshot.modified_files {
        let intervals = snapshot.intervals(&file.old_file);
        let length: u32 = intervals.iter().map(|i| i.range().line_count()).sum();
        if length == 0 {
            continue;
        }
        for interval in intervals {
            *raw.entry(interval.contributor.clone()).or_insert(0.0) +=
                f64::from(interval.range().line_count()) / f64::from(length);
        }
    }
    raw
}

/// Average of the independently normalized function, class and file
/// sub-signals, each weighted 1/3.
pub fn modified_code_scores(snapshot: &ScoringSnapshot) -> ScoreMap {
    let signal = Signal::ModifiedCode.as_str();
    let parts = [
        normalize(entity_scores(snapshot, &snapshot.modified_functions), signal),
        normalize(entity_scores(snapshot, &snapshot.modified_classes), signal),
        normalize(file_scores(snapshot), signal),
    ];

    let mut combined = ScoreMap::new();
    for part in &parts {
        accumulate(&mut combined, part, SUB_SIGNAL_WEIGHT);
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        basename, Definition, DefinitionKind, Entity, EntityId, ModifiedFile, OwnershipInterval,
    };
    use crate::scoring::competition_rank;

    fn interval(who: &str, file: &str, start: u32, end: u32) -> OwnershipInterval {
        OwnershipInterval {
            contributor: who.to_string(),
            file: file.to_string(),
            start_line: start,
            end_line: end,
        }
    }

    fn entity(id: i64, kind: DefinitionKind, file: &str, name: &str, start: u32, end: u32) -> Entity {
        Entity {
            id: EntityId(id),
            definition: Definition {
                kind,
                file: file.to_string(),
                basename: basename(file).to_string(),
                name: name.to_string(),
                start_line: start,
                end_line: end,
            },
        }
    }

    fn modified(kind: DefinitionKind, file: &str, name: &str) -> ModifiedEntity {
        ModifiedEntity {
            kind,
            old_file: file.to_string(),
            old_name: name.to_string(),
        }
    }

    fn snapshot() -> ScoringSnapshot {
        let mut snapshot = ScoringSnapshot {
            functions: vec![entity(1, DefinitionKind::Function, "a.py", "f", 1, 4)],
            classes: vec![entity(2, DefinitionKind::Class, "a.py", "C", 5, 8)],
            ..ScoringSnapshot::default()
        };
        snapshot.ownership.insert(
            "a.py".to_string(),
            vec![interval("ana", "a.py", 1, 4), interval("bo", "a.py", 5, 8)],
        );
        snapshot
    }

    #[test]
    fn functions_only_gets_a_third() {
        let mut snapshot = snapshot();
        snapshot.modified_functions = vec![modified(DefinitionKind::Function, "a.py", "f")];

        let scores = modified_code_scores(&snapshot);
        assert_eq!(scores.len(), 1);
        assert!((scores["ana"] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn sub_signals_are_averaged() {
        let mut snapshot = snapshot();
        snapshot.modified_functions = vec![modified(DefinitionKind::Function, "a.py", "f")];
        snapshot.modified_classes = vec![modified(DefinitionKind::Class, "a.py", "C")];
        snapshot.modified_files = vec![ModifiedFile {
            old_file: "a.py".to_string(),
            old_basename: "a.py".to_string(),
        }];

        let scores = modified_code_scores(&snapshot);
        // ana: 1/3 (function) + 1/6 (half the file); bo: 1/3 (class) + 1/6.
        assert!((scores["ana"] - 0.5).abs() < 1e-12);
        assert!((scores["bo"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn equal_ownership_summed_in_different_order_ties() {
        // x owns 1, 2 and 3 lines of three 10-line functions; y owns 3, 2, 1.
        let mut snapshot = ScoringSnapshot {
            functions: vec![
                entity(1, DefinitionKind::Function, "m.py", "f1", 1, 10),
                entity(2, DefinitionKind::Function, "m.py", "f2", 11, 20),
                entity(3, DefinitionKind::Function, "m.py", "f3", 21, 30),
            ],
            ..ScoringSnapshot::default()
        };
        snapshot.ownership.insert(
            "m.py".to_string(),
            vec![
                interval("x", "m.py", 1, 1),
                interval("y", "m.py", 2, 4),
                interval("z", "m.py", 5, 10),
                interval("x", "m.py", 11, 12),
                interval("y", "m.py", 13, 14),
                interval("z", "m.py", 15, 20),
                interval("x", "m.py", 21, 23),
                interval("y", "m.py", 24, 24),
                interval("z", "m.py", 25, 30),
            ],
        );
        snapshot.modified_functions = ["f1", "f2", "f3"]
            .iter()
            .map(|name| modified(DefinitionKind::Function, "m.py", name))
            .collect();

        let scores = modified_code_scores(&snapshot);
        let ranks = competition_rank(&scores);
        assert_eq!(ranks["z"], 1);
        assert_eq!(ranks["x"], 2);
        assert_eq!(ranks["y"], 2);
    }

    #[test]
    fn unknown_entities_score_nothing() {
        let mut snapshot = snapshot();
        snapshot.modified_functions = vec![modified(DefinitionKind::Function, "a.py", "gone")];
        snapshot.modified_files = vec![ModifiedFile {
            old_file: "unblamed.py".to_string(),
            old_basename: "unblamed.py".to_string(),
        }];
        assert!(modified_code_scores(&snapshot).is_empty());
    }
}
