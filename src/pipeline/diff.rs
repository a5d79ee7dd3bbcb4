//! Unified diffs between snapshot bodies.
//!
//! Lines are compared with all whitespace removed (the equivalent of
//! `git diff -w`), so reformatting alone never produces hunks. Output holds
//! only hunk headers and `+`/`-`/` ` lines; there are no file headers.
//!
//! ```text
//! @@ -1,3 +1,3 @@
//!  line 1
//! -line 2
//! +line 2 modified
//!  line 3
//! ```

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp, DiffTag, capture_diff_slices, group_diff_ops};

/// Context lines around each change.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@(.*)$")
        .expect("hunk header pattern is valid")
});

/// One parsed hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
    /// Body lines, prefixes included
    pub lines: Vec<String>,
}

/// Whitespace-insensitive line differ.
#[derive(Debug, Clone)]
pub struct DiffEngine {
    context_lines: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffEngine {
    pub fn new() -> Self {
        Self::with_context(DEFAULT_CONTEXT_LINES)
    }

    pub fn with_context(context_lines: usize) -> Self {
        Self { context_lines }
    }

    /// Diff `old` against `new`. Identical input yields an empty string.
    pub fn diff(&self, old: &str, new: &str) -> String {
        let old_lines: Vec<&str> = old.lines().collect();
        let new_lines: Vec<&str> = new.lines().collect();

        let old_keys: Vec<String> = old_lines.iter().map(|l| comparison_key(l)).collect();
        let new_keys: Vec<String> = new_lines.iter().map(|l| comparison_key(l)).collect();

        let ops = capture_diff_slices(Algorithm::Myers, &old_keys, &new_keys);
        if ops.iter().all(|op| op.tag() == DiffTag::Equal) {
            return String::new();
        }

        let mut out = Vec::new();
        for group in group_diff_ops(ops, self.context_lines) {
            let (Some(first), Some(last)) = (group.first(), group.last()) else {
                continue;
            };

            let old_start = first.old_range().start;
            let old_len = last.old_range().end - old_start;
            let new_start = first.new_range().start;
            let new_len = last.new_range().end - new_start;
            out.push(format!(
                "@@ -{} +{} @@",
                header_range(old_start, old_len),
                header_range(new_start, new_len)
            ));

            for op in &group {
                render_op(op, &old_lines, &new_lines, &mut out);
            }
        }
        out.join("\n")
    }
}

/// Convenience wrapper around [`DiffEngine::diff`].
pub fn unified_diff(old: &str, new: &str, context_lines: usize) -> String {
    DiffEngine::with_context(context_lines).diff(old, new)
}

/// Invert a diff: swap `+`/`-` lines and the old/new ranges of every header.
pub fn reverse_diff(diff: &str) -> String {
    diff.split('\n')
        .map(|line| {
            if let Some(caps) = HUNK_HEADER.captures(line) {
                format!(
                    "@@ -{} +{} @@{}",
                    raw_range(&caps, 3, 4),
                    raw_range(&caps, 1, 2),
                    &caps[5]
                )
            } else if let Some(rest) = line.strip_prefix('+') {
                format!("-{rest}")
            } else if let Some(rest) = line.strip_prefix('-') {
                format!("+{rest}")
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split a diff into hunks, in order. Lines before the first header are ignored.
pub fn parse_hunks(diff: &str) -> Vec<Hunk> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for line in diff.lines() {
        if let Some(caps) = HUNK_HEADER.captures(line) {
            hunks.push(Hunk {
                old_start: number(&caps, 1).unwrap_or(0),
                old_len: number(&caps, 2).unwrap_or(1),
                new_start: number(&caps, 3).unwrap_or(0),
                new_len: number(&caps, 4).unwrap_or(1),
                lines: Vec::new(),
            });
        } else if let Some(hunk) = hunks.last_mut() {
            if !line.is_empty() {
                hunk.lines.push(line.to_string());
            }
        }
    }
    hunks
}

/// An empty diff is valid; otherwise it needs a hunk header and only
/// `@@`, `+`, `-` or ` ` prefixed lines.
pub fn validate_diff(diff: &str) -> bool {
    if diff.trim().is_empty() {
        return true;
    }

    let mut has_header = false;
    for line in diff.lines().filter(|l| !l.is_empty()) {
        if line.starts_with("@@") {
            has_header |= HUNK_HEADER.is_match(line);
        } else if !(line.starts_with('+') || line.starts_with('-') || line.starts_with(' ')) {
            return false;
        }
    }
    has_header
}

fn comparison_key(line: &str) -> String {
    line.split_whitespace().collect()
}

fn header_range(start: usize, len: usize) -> String {
    // Empty ranges point at the line before the change.
    let start = if len == 0 { start } else { start + 1 };
    format!("{start},{len}")
}

fn render_op(op: &DiffOp, old_lines: &[&str], new_lines: &[&str], out: &mut Vec<String>) {
    let (tag, old_range, new_range) = op.as_tag_tuple();
    match tag {
        DiffTag::Equal => out.extend(new_range.map(|i| format!(" {}", new_lines[i]))),
        DiffTag::Delete => out.extend(old_range.map(|i| format!("-{}", old_lines[i]))),
        DiffTag::Insert => out.extend(new_range.map(|i| format!("+{}", new_lines[i]))),
        DiffTag::Replace => {
            out.extend(old_range.map(|i| format!("-{}", old_lines[i])));
            out.extend(new_range.map(|i| format!("+{}", new_lines[i])));
        }
    }
}

fn raw_range(caps: &Captures<'_>, start: usize, len: usize) -> String {
    match caps.get(len) {
        Some(len) => format!("{},{}", &caps[start], len.as_str()),
        None => caps[start].to_string(),
    }
}

fn number(caps: &Captures<'_>, group: usize) -> Option<usize> {
    caps.get(group).and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize, changed: &[usize]) -> String {
        (1..=count)
            .map(|i| {
                if changed.contains(&i) {
                    format!("line {i} changed")
                } else {
                    format!("line {i}")
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_identical_is_empty() {
        assert_eq!(unified_diff("a\nb\nc", "a\nb\nc", 3), "");
        assert_eq!(unified_diff("", "", 3), "");
    }

    #[test]
    fn test_whitespace_only_changes_are_ignored() {
        assert_eq!(unified_diff("a  b\n\tc", "a b\nc  ", 3), "");
    }

    #[test]
    fn test_simple_replacement() {
        let diff = unified_diff("Hello", "Hello World", 3);
        assert_eq!(diff, "@@ -1,1 +1,1 @@\n-Hello\n+Hello World");
        assert!(validate_diff(&diff));
    }

    #[test]
    fn test_no_file_headers() {
        let diff = unified_diff("line 1\nline 2\nline 3", "line 1\nline 2 modified\nline 3", 3);
        assert_eq!(
            diff,
            "@@ -1,3 +1,3 @@\n line 1\n-line 2\n+line 2 modified\n line 3"
        );
        assert!(!diff.contains("---"));
        assert!(!diff.contains("+++"));
    }

    #[test]
    fn test_insert_into_empty() {
        let diff = unified_diff("", "first", 3);
        assert_eq!(diff, "@@ -0,0 +1,1 @@\n+first");
    }

    #[test]
    fn test_context_window() {
        let diff = unified_diff(&numbered(20, &[]), &numbered(20, &[10]), 3);
        let hunks = parse_hunks(&diff);
        assert_eq!(hunks.len(), 1);
        assert_eq!((hunks[0].new_start, hunks[0].new_len), (7, 7));
        assert!(diff.starts_with("@@ -7,7 +7,7 @@"));
    }

    #[test]
    fn test_distant_changes_split_into_hunks() {
        let diff = unified_diff(&numbered(20, &[]), &numbered(20, &[2, 18]), 3);
        let hunks = parse_hunks(&diff);
        assert_eq!(hunks.len(), 2);
        assert_eq!((hunks[0].new_start, hunks[0].new_len), (1, 5));
        assert_eq!((hunks[1].new_start, hunks[1].new_len), (15, 6));
        assert_eq!(
            hunks[0].lines,
            vec![" line 1", "-line 2", "+line 2 changed", " line 3", " line 4", " line 5"]
        );
    }

    #[test]
    fn test_reverse_swaps_lines_and_ranges() {
        let diff = "@@ -1,3 +1,4 @@\n a\n-b\n+B\n+C\n c";
        let reversed = reverse_diff(diff);
        assert_eq!(reversed, "@@ -1,4 +1,3 @@\n a\n+b\n-B\n-C\n c");
        assert!(validate_diff(&reversed));
    }

    #[test]
    fn test_reverse_is_an_involution() {
        let diff = unified_diff(&numbered(30, &[]), &numbered(30, &[3, 4, 25]), 3);
        assert_eq!(reverse_diff(&reverse_diff(&diff)), diff);

        let terse = "@@ -5 +5,2 @@ section\n-x\n+y\n+z\n";
        assert_eq!(reverse_diff(terse), "@@ -5,2 +5 @@ section\n+x\n-y\n-z\n");
        assert_eq!(reverse_diff(&reverse_diff(terse)), terse);
    }

    #[test]
    fn test_reverse_matches_diff_in_other_direction() {
        let old = "alpha\nbeta\ngamma";
        let new = "alpha\nBETA\ngamma\ndelta";
        let forward = unified_diff(old, new, 3);
        let back = parse_hunks(&reverse_diff(&forward));
        let expected = parse_hunks(&unified_diff(new, old, 3));

        assert_eq!(back.len(), expected.len());
        assert_eq!(back[0].new_start, expected[0].new_start);
        assert_eq!(back[0].new_len, expected[0].new_len);
    }

    #[test]
    fn test_parse_hunks_defaults_missing_lengths() {
        let hunks = parse_hunks("@@ -3 +4 @@\n-x\n+y");
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].old_start, 3);
        assert_eq!(hunks[0].new_start, 4);
        assert_eq!(hunks[0].new_len, 1);
        assert_eq!(hunks[0].lines, vec!["-x", "+y"]);
    }

    #[test]
    fn test_validate() {
        assert!(validate_diff(""));
        assert!(validate_diff("\n"));
        assert!(validate_diff("@@ -1,1 +1,1 @@\n-a\n+b\n"));
        assert!(!validate_diff("-a\n+b"));
        assert!(!validate_diff("@@ -1,1 +1,1 @@\n-a\nplain text"));
        assert!(!validate_diff("diff --git a/x b/x\n@@ -1,1 +1,1 @@\n-a\n+b"));
    }
}
