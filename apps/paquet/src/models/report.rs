//! Run report: the aggregate printed by the output layer.
//!
//! The report has the same shape for dry runs and real runs; only
//! `written` and `summary.written` differ.

use super::{FileKind, RuleHit, TransformResult};
use crate::models::rule::{Rule, Scope};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub source: String,
    pub target: String,
    pub kind: FileKind,
    pub changed: bool,
    pub renamed: bool,
    pub hits: Vec<RuleHit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
/// Per-rule totals across the tree; `matches == 0` marks a dead rule.
pub struct RuleStats {
    pub index: usize,
    pub origin: usize,
    pub search: String,
    pub replace: String,
    pub scope: Scope,
    /// Files the rule was tried on (its glob admitted them).
    pub applications: usize,
    /// Files where it matched at least once.
    pub files_matched: usize,
    pub matches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub visited: usize,
    pub changed: usize,
    pub errors: usize,
    pub written: usize,
    pub skipped_templates: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub written: bool,
    pub summary: Summary,
    pub files: Vec<FileReport>,
    pub rules: Vec<RuleStats>,
    pub skipped_templates: Vec<String>,
    pub errors: Vec<Failure>,
}

impl RunReport {
    /// Build the report for computed results, before any write.
    pub fn from_results(
        results: &[TransformResult],
        rules: &[Rule],
        skipped_templates: Vec<String>,
        walk_errors: Vec<Failure>,
    ) -> Self {
        let mut stats: Vec<RuleStats> = rules
            .iter()
            .map(|r| RuleStats {
                index: r.index,
                origin: r.origin,
                search: r.search.clone(),
                replace: r.replace.clone(),
                scope: r.scope,
                applications: 0,
                files_matched: 0,
                matches: 0,
            })
            .collect();
        let mut files = Vec::with_capacity(results.len());
        let mut errors = walk_errors;
        for res in results {
            for hit in &res.hits {
                if let Some(s) = stats.get_mut(hit.rule) {
                    s.applications += 1;
                    s.matches += hit.matches;
                    if hit.matches > 0 {
                        s.files_matched += 1;
                    }
                }
            }
            if let Some(err) = &res.error {
                errors.push(Failure {
                    path: res.source.clone(),
                    message: err.to_string(),
                });
            }
            files.push(FileReport {
                source: res.source.clone(),
                target: res.target.clone(),
                kind: res.kind,
                changed: res.changed(),
                renamed: res.error.is_none() && res.renamed(),
                hits: res.hits.clone(),
            });
        }
        errors.sort_by(|a, b| a.path.cmp(&b.path));
        let summary = Summary {
            visited: files.len(),
            changed: files.iter().filter(|f| f.changed).count(),
            errors: errors.len(),
            written: 0,
            skipped_templates: skipped_templates.len(),
        };
        RunReport {
            written: false,
            summary,
            files,
            rules: stats,
            skipped_templates,
            errors,
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Rules that never matched anywhere in the tree.
    pub fn dead_rules(&self) -> impl Iterator<Item = &RuleStats> {
        self.rules.iter().filter(|r| r.matches == 0)
    }

    pub fn changed_files(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.changed)
    }
}
