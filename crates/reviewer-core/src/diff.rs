//! Unified diff parsing.
//!
//! Produces one [`FileDiff`] per file section with the touched line ranges in
//! new-file coordinates. The touched range of a hunk `@@ -a,b +c,d @@` is
//! `(c, c + d)`, and when `d` is omitted it defaults to `c`. Hunk bodies are
//! still consumed with git's real counts so that a body line beginning with
//! `---` or `+++` is never read as a header.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::errors::ReviewerError;
use crate::models::{basename, FileDiff, LineRange};

static HUNK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").unwrap()
});

const DEV_NULL: &str = "/dev/null";

/// Strip the `a/` or `b/` prefix and any tab-separated timestamp.
/// Returns `None` for `/dev/null`.
fn clean_path(raw: &str, prefix: &str) -> Option<String> {
    let path = raw.split('\t').next().unwrap_or(raw).trim_end();
    if path == DEV_NULL {
        return None;
    }
    let path = path.strip_prefix(prefix).unwrap_or(path);
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// Paths from `diff --git a/x b/y`. Ambiguous when paths contain `" b/"`;
/// the `---`/`+++` headers that follow take precedence.
fn git_header_paths(rest: &str) -> (Option<String>, Option<String>) {
    match rest.find(" b/") {
        Some(split) => (
            clean_path(&rest[..split], "a/"),
            clean_path(&rest[split + 1..], "b/"),
        ),
        None => (None, None),
    }
}

struct HunkHeader {
    touched: LineRange,
    old_lines: u32,
    new_lines: u32,
}

fn parse_hunk_header(line: &str, line_no: usize) -> Result<HunkHeader, ReviewerError> {
    let caps = HUNK_RE.captures(line).ok_or_else(|| ReviewerError::DiffMalformed {
        line: line_no,
        reason: format!("unparsable hunk header '{line}'"),
    })?;
    let number = |idx: usize| -> Option<u32> { caps.get(idx).and_then(|m| m.as_str().parse().ok()) };

    let start = number(3).ok_or_else(|| ReviewerError::DiffMalformed {
        line: line_no,
        reason: "hunk start out of range".to_string(),
    })?;
    let new_count = number(4);
    let span = new_count.unwrap_or(start);

    Ok(HunkHeader {
        touched: LineRange::new(start, start.saturating_add(span)),
        old_lines: caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok()).unwrap_or(1),
        new_lines: new_count.unwrap_or(1),
    })
}

#[derive(Default)]
struct DiffParser {
    files: Vec<FileDiff>,
    current: Option<FileDiff>,
    /// Set once `+++` is seen for the current section.
    saw_new_header: bool,
    old_remaining: u32,
    new_remaining: u32,
}

impl DiffParser {
    fn in_hunk_body(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    fn start_file(&mut self, diff: FileDiff) {
        self.finish_file();
        self.current = Some(diff);
        self.saw_new_header = false;
    }

    fn finish_file(&mut self) {
        if let Some(mut diff) = self.current.take() {
            diff.old_basename = diff.old_path.as_deref().map(|p| basename(p).to_string());
            if diff.old_path.is_some() || diff.new_path.is_some() {
                self.files.push(diff);
            }
        }
    }

    fn current(&mut self) -> &mut FileDiff {
        self.current.get_or_insert_with(FileDiff::default)
    }

    fn consume_body_line(&mut self, line: &str) {
        match line.as_bytes().first() {
            Some(b'+') => self.new_remaining = self.new_remaining.saturating_sub(1),
            Some(b'-') => self.old_remaining = self.old_remaining.saturating_sub(1),
            Some(b'\\') => {}
            // Context, including blank lines whose leading space was stripped.
            _ => {
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
        }
    }

    fn consume_header_line(&mut self, line: &str, line_no: usize) {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            // Ends a truncated hunk of the previous section too.
            self.old_remaining = 0;
            self.new_remaining = 0;
            let (old_path, new_path) = git_header_paths(rest);
            self.start_file(FileDiff {
                old_path,
                new_path,
                ..FileDiff::default()
            });
        } else if let Some(rest) = line.strip_prefix("--- ") {
            // A bare `---` pair without `diff --git` starts a new section.
            let starts_section = match &self.current {
                None => true,
                Some(diff) => self.saw_new_header || !diff.hunks.is_empty(),
            };
            if starts_section {
                self.start_file(FileDiff::default());
            }
            self.current().old_path = clean_path(rest, "a/");
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            self.saw_new_header = true;
            self.current().new_path = clean_path(rest, "b/");
        } else if line.starts_with("new file mode") {
            self.current().old_path = None;
        } else if line.starts_with("deleted file mode") {
            self.current().new_path = None;
        } else if let Some(rest) = line.strip_prefix("rename from ") {
            self.current().old_path = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("rename to ") {
            self.current().new_path = Some(rest.to_string());
        } else if line.starts_with("@@") {
            match parse_hunk_header(line, line_no) {
                Ok(header) => {
                    self.current().hunks.push(header.touched);
                    self.old_remaining = header.old_lines;
                    self.new_remaining = header.new_lines;
                }
                Err(err) => warn!("skipping hunk: {err}"),
            }
        }
    }
}

/// Parse unified diff text into per-file sections, in input order.
///
/// Malformed hunk headers are logged and skipped; parsing never fails.
pub fn parse_unified_diff(text: &str) -> Vec<FileDiff> {
    let mut parser = DiffParser::default();
    for (idx, line) in text.lines().enumerate() {
        if parser.in_hunk_body() && !line.starts_with("diff --git ") {
            parser.consume_body_line(line);
        } else {
            parser.consume_header_line(line, idx + 1);
        }
    }
    parser.finish_file();
    parser.files
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODIFY: &str = "\
diff --git a/pkg/util.py b/pkg/util.py
index 83db48f..bf269f4 100644
--- a/pkg/util.py
+++ b/pkg/util.py
@@ -10,1 +10,1 @@ def helper():
-    return 1
+    return 2
";

    #[test]
    fn hunk_with_count() {
        let diffs = parse_unified_diff(MODIFY);
        assert_eq!(diffs.len(), 1);
        let diff = &diffs[0];
        assert_eq!(diff.old_path.as_deref(), Some("pkg/util.py"));
        assert_eq!(diff.new_path.as_deref(), Some("pkg/util.py"));
        assert_eq!(diff.old_basename.as_deref(), Some("util.py"));
        assert_eq!(diff.hunks, vec![LineRange::new(10, 11)]);
    }

    #[test]
    fn omitted_count_defaults_to_start() {
        let text = "\
--- a/m.py
+++ b/m.py
@@ -7 +7 @@
-x = 1
+x = 2
";
        let diffs = parse_unified_diff(text);
        assert_eq!(diffs[0].hunks, vec![LineRange::new(7, 14)]);
    }

    #[test]
    fn new_file_has_no_old_side() {
        let text = "\
diff --git a/fresh.py b/fresh.py
new file mode 100644
index 0000000..e69de29
--- /dev/null
+++ b/fresh.py
@@ -0,0 +1,2 @@
+def f():
+    pass
";
        let diffs = parse_unified_diff(text);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].old_path, None);
        assert_eq!(diffs[0].old_basename, None);
        assert_eq!(diffs[0].new_path.as_deref(), Some("fresh.py"));
        assert_eq!(diffs[0].hunks, vec![LineRange::new(1, 3)]);
    }

    #[test]
    fn deleted_file_has_no_new_side() {
        let text = "\
diff --git a/old.py b/old.py
deleted file mode 100644
--- a/old.py
+++ /dev/null
@@ -1,1 +0,0 @@
-x = 1
";
        let diffs = parse_unified_diff(text);
        assert_eq!(diffs[0].old_path.as_deref(), Some("old.py"));
        assert_eq!(diffs[0].new_path, None);
    }

    #[test]
    fn rename_keeps_both_paths() {
        let text = "\
diff --git a/src/before.py b/src/after.py
similarity index 90%
rename from src/before.py
rename to src/after.py
--- a/src/before.py
+++ b/src/after.py
@@ -3,2 +3,2 @@
 a = 1
-b = 2
+b = 3
";
        let diffs = parse_unified_diff(text);
        assert_eq!(diffs[0].old_path.as_deref(), Some("src/before.py"));
        assert_eq!(diffs[0].new_path.as_deref(), Some("src/after.py"));
        assert_eq!(diffs[0].old_basename.as_deref(), Some("before.py"));
    }

    #[test]
    fn pure_rename_without_hunks() {
        let text = "\
diff --git a/a.py b/b.py
similarity index 100%
rename from a.py
rename to b.py
";
        let diffs = parse_unified_diff(text);
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].hunks.is_empty());
        assert_eq!(diffs[0].new_path.as_deref(), Some("b.py"));
    }

    #[test]
    fn body_lines_that_look_like_headers() {
        let text = "\
--- a/doc.py
+++ b/doc.py
@@ -1,2 +1,2 @@
---- old banner
++++ new banner
 tail
@@ -20,1 +20,1 @@
-y
+z
--- a/other.py\t2024-01-01 00:00:00
+++ b/other.py\t2024-01-02 00:00:00
@@ -5,3 +5,4 @@
 a
+b
 c
 d
";
        let diffs = parse_unified_diff(text);
        assert_eq!(diffs.len(), 2);
        assert_eq!(
            diffs[0].hunks,
            vec![LineRange::new(1, 3), LineRange::new(20, 21)]
        );
        assert_eq!(diffs[1].old_path.as_deref(), Some("other.py"));
        assert_eq!(diffs[1].hunks, vec![LineRange::new(5, 9)]);
    }

    #[test]
    fn malformed_hunk_is_skipped() {
        let text = "\
--- a/m.py
+++ b/m.py
@@ -1,1 +x,y @@
@@ -4,1 +4,1 @@
-a
+b
";
        let diffs = parse_unified_diff(text);
        assert_eq!(diffs[0].hunks, vec![LineRange::new(4, 5)]);
    }

    #[test]
    fn multiple_git_sections() {
        let text = format!("{MODIFY}diff --git a/b.py b/b.py\n--- a/b.py\n+++ b/b.py\n@@ -1 +1,3 @@\n-x\n+x\n+y\n+z\n");
        let diffs = parse_unified_diff(&text);
        let paths: Vec<_> = diffs.iter().map(|d| d.new_path.clone().unwrap()).collect();
        assert_eq!(paths, vec!["pkg/util.py".to_string(), "b.py".to_string()]);
        assert_eq!(diffs[1].hunks, vec![LineRange::new(1, 4)]);
    }

    #[test]
    fn truncated_hunk_stops_at_next_git_header() {
        let text = "\
diff --git a/a.py b/a.py
--- a/a.py
+++ b/a.py
@@ -1,5 +1,5 @@
-x
+y
diff --git a/b.py b/b.py
--- a/b.py
+++ b/b.py
@@ -7,2 +7,2 @@
-p
+q
 r
";
        let diffs = parse_unified_diff(text);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].hunks, vec![LineRange::new(1, 6)]);
        assert_eq!(diffs[1].new_path.as_deref(), Some("b.py"));
        assert_eq!(diffs[1].hunks, vec![LineRange::new(7, 9)]);
    }

    #[test]
    fn empty_input() {
        assert!(parse_unified_diff("").is_empty());
    }
}
