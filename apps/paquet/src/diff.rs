//! Unified diffs of planned changes, for `--diff` previews.

use crate::models::{FileKind, TransformResult};
use serde::Serialize;
use similar::TextDiff;

/// Preview of one changed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub source: String,
    pub target: String,
    /// Unified diff of the text; `None` for binaries, which only move.
    pub unified: Option<String>,
}

/// Diff every changed file of a sorted result set.
pub fn collect(results: &[TransformResult]) -> Vec<FileDiff> {
    results
        .iter()
        .filter(|r| r.changed())
        .map(file_diff)
        .collect()
}

fn file_diff(r: &TransformResult) -> FileDiff {
    let unified = match r.kind {
        FileKind::Binary => None,
        FileKind::Text | FileKind::Template => {
            let old = String::from_utf8_lossy(&r.original);
            let new = String::from_utf8_lossy(&r.output);
            if old == new {
                None
            } else {
                Some(unified(&old, &new, &r.source, &r.target))
            }
        }
    };
    FileDiff {
        source: r.source.clone(),
        target: r.target.clone(),
        unified,
    }
}

/// `a/<source>` → `b/<target>` unified diff with three lines of context.
pub fn unified(old: &str, new: &str, source: &str, target: &str) -> String {
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{source}"), &format!("b/{target}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RuleHit;

    fn result(kind: FileKind, source: &str, target: &str, old: &str, new: &str) -> TransformResult {
        TransformResult {
            source: source.into(),
            target: target.into(),
            kind,
            original: old.as_bytes().to_vec(),
            output: new.as_bytes().to_vec(),
            hits: vec![RuleHit { rule: 0, matches: 1 }],
            error: None,
            target_exists: false,
        }
    }

    #[test]
    fn test_unified_diff_has_headers_and_lines() {
        let d = unified("import blog\n", "import news\n", "blog/a.py", "news/a.py");
        assert!(d.starts_with("--- a/blog/a.py\n+++ b/news/a.py\n"));
        assert!(d.contains("-import blog\n"));
        assert!(d.contains("+import news\n"));
    }

    #[test]
    fn test_collect_skips_unchanged_and_binary_text() {
        let results = vec![
            result(FileKind::Text, "a.py", "a.py", "same\n", "same\n"),
            result(FileKind::Binary, "logo.png", "brand.png", "\u{1}", "\u{1}"),
            result(FileKind::Text, "b.py", "b.py", "blog\n", "news\n"),
        ];
        let diffs = collect(&results);
        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs[0].target, "brand.png");
        assert!(diffs[0].unified.is_none());
        assert!(diffs[1].unified.as_deref().unwrap_or("").contains("+news"));
    }
}
