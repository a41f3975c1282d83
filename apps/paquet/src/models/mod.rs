//! Shared data models: rules, per-file jobs and results, and the run report.

pub mod report;
pub mod rule;

use crate::error::JobError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
/// How a file was handled.
pub enum FileKind {
    /// Decoded as UTF-8; path and content rules applied.
    Text,
    /// Not decodable (or not a configured text extension); path rules only.
    Binary,
    /// Rendered through the template renderer.
    Template,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
/// One rule application on one file. Rules skipped by their `file_glob`
/// produce no hit at all.
pub struct RuleHit {
    pub rule: usize,
    pub matches: usize,
}

/// Immutable input of one transformation.
pub struct TransformJob {
    pub rel_path: String,
    pub bytes: Vec<u8>,
}

/// Output of one job. Nothing here has touched the filesystem yet.
#[derive(Debug)]
pub struct TransformResult {
    pub source: String,
    pub target: String,
    pub kind: FileKind,
    pub original: Vec<u8>,
    pub output: Vec<u8>,
    pub hits: Vec<RuleHit>,
    pub error: Option<JobError>,
    /// A rendered template found its target already in the tree; `original`
    /// then holds that file's bytes instead of the template's.
    pub target_exists: bool,
}

impl TransformResult {
    /// A job that could not produce output; the file keeps its path.
    pub fn failed(source: String, kind: FileKind, error: JobError) -> Self {
        Self {
            target: source.clone(),
            source,
            kind,
            original: Vec::new(),
            output: Vec::new(),
            hits: Vec::new(),
            error: Some(error),
            target_exists: false,
        }
    }

    pub fn renamed(&self) -> bool {
        self.source != self.target
    }

    pub fn content_changed(&self) -> bool {
        self.original != self.output
    }

    /// Whether writing this result alters the tree. A template whose
    /// target already holds the rendered bytes is unchanged.
    pub fn changed(&self) -> bool {
        if self.error.is_some() {
            return false;
        }
        match self.kind {
            FileKind::Template if self.target_exists => self.content_changed(),
            _ => self.renamed() || self.content_changed(),
        }
    }
}
