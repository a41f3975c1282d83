//! Placeholder expansion and template rendering.
//!
//! Placeholders are written `{name}` where `name` is an identifier. Two forms
//! are never treated as references: doubled braces (`{{name}}`, format-string
//! escapes and Django/Jinja tags) and `${name}` (regex replacement groups and
//! shell/JS interpolation). Any other brace text, such as `{ct.app_label}` or
//! a regex quantifier `{2,3}`, is copied verbatim.
//!
//! Template files are recognised by a marker in their file name:
//! `apps.template.py` renders to `apps.py` and `README.md.template` to
//! `README.md`. Rendering is a pure function of the text and the placeholder
//! set, and fails on the first name without a value.

use crate::config::Config;
use crate::error::PlaceholderError;
use crate::models::{FileKind, TransformJob, TransformResult};
use crate::utils;
use glob::Pattern;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Resolved placeholder values plus names that templates may leave as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    values: BTreeMap<String, String>,
    passthrough: BTreeSet<String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Mark `name` as literal text: `{name}` is copied through unchanged.
    pub fn allow_passthrough(&mut self, name: impl Into<String>) {
        self.passthrough.insert(name.into());
    }

    /// Copy with one more value, used for per-app rule expansion.
    pub fn with(&self, name: &str, value: &str) -> Self {
        let mut out = self.clone();
        out.insert(name, value);
        out
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// One piece of scanned text.
enum Token<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

/// Split `text` into literal runs and placeholder references.
fn scan(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => i += 2,
            b'$' if bytes.get(i + 1) == Some(&b'{') => i += 2,
            b'{' => {
                let rest = &text[i + 1..];
                match rest.find('}') {
                    Some(end) if is_identifier(&rest[..end]) => {
                        if start < i {
                            tokens.push(Token::Text(&text[start..i]));
                        }
                        tokens.push(Token::Placeholder(&rest[..end]));
                        i += end + 2;
                        start = i;
                    }
                    _ => i += 1,
                }
            }
            _ => i += 1,
        }
    }
    if start < text.len() {
        tokens.push(Token::Text(&text[start..]));
    }
    tokens
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Names referenced by `text`, in order of appearance.
pub fn references(text: &str) -> Vec<&str> {
    scan(text)
        .into_iter()
        .filter_map(|t| match t {
            Token::Placeholder(name) => Some(name),
            Token::Text(_) => None,
        })
        .collect()
}

/// Substitute every placeholder in `text`.
///
/// Passthrough names are emitted unchanged with their braces; any other
/// unknown name is an error.
pub fn render(text: &str, placeholders: &Placeholders) -> Result<String, PlaceholderError> {
    let mut out = String::with_capacity(text.len());
    for token in scan(text) {
        match token {
            Token::Text(s) => out.push_str(s),
            Token::Placeholder(name) => {
                if let Some(value) = placeholders.get(name) {
                    out.push_str(value);
                } else if placeholders.passthrough.contains(name) {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                } else {
                    return Err(PlaceholderError {
                        name: name.to_string(),
                        file: None,
                    });
                }
            }
        }
    }
    Ok(out)
}

/// A template that is only rendered when `feature` is enabled.
#[derive(Debug, Clone)]
pub struct FeatureGate {
    pub glob: Pattern,
    pub feature: String,
}

/// How template files are recognised and gated.
#[derive(Debug, Clone)]
pub struct TemplateSettings {
    pub marker: String,
    pub gates: Vec<FeatureGate>,
}

impl Default for TemplateSettings {
    fn default() -> Self {
        Self {
            marker: "template".to_string(),
            gates: Vec::new(),
        }
    }
}

impl TemplateSettings {
    pub fn is_template(&self, rel: &str) -> bool {
        self.target_path(rel).is_some()
    }

    /// Path of the rendered file with the marker removed, or `None` when
    /// `rel` is not a template.
    pub fn target_path(&self, rel: &str) -> Option<String> {
        let (dir, name) = match rel.rsplit_once('/') {
            Some((d, n)) => (Some(d), n),
            None => (None, rel),
        };
        let infix = format!(".{}.", self.marker);
        let suffix = format!(".{}", self.marker);
        let rendered = if let Some(pos) = name.find(&infix).filter(|p| *p > 0) {
            format!("{}{}", &name[..pos], &name[pos + suffix.len()..])
        } else if name.len() > suffix.len() && name.ends_with(&suffix) {
            name[..name.len() - suffix.len()].to_string()
        } else {
            return None;
        };
        Some(match dir {
            Some(d) => format!("{d}/{rendered}"),
            None => rendered,
        })
    }

    /// The gate that disables `rel` under `features`, if any.
    ///
    /// Absent flags count as disabled.
    pub fn disabled_by<'a>(
        &'a self,
        rel: &str,
        features: &BTreeMap<String, bool>,
    ) -> Option<&'a FeatureGate> {
        self.gates.iter().find(|g| {
            utils::glob_matches(&g.glob, rel) && !features.get(&g.feature).copied().unwrap_or(false)
        })
    }
}

/// Render a template job: the marker is dropped from the path and both the
/// path and the content go through [`render`]. Rules never apply here.
pub fn render_job(job: TransformJob, config: &Config) -> TransformResult {
    let rendered = render_parts(&job, config);
    match rendered {
        Ok((target, text)) => TransformResult {
            source: job.rel_path,
            target,
            kind: FileKind::Template,
            original: job.bytes,
            output: text.into_bytes(),
            hits: Vec::new(),
            error: None,
            target_exists: false,
        },
        Err(e) => TransformResult::failed(job.rel_path, FileKind::Template, e.into()),
    }
}

fn render_parts(job: &TransformJob, config: &Config) -> Result<(String, String), PlaceholderError> {
    let rel = job.rel_path.as_str();
    let stripped = config
        .templates
        .target_path(rel)
        .unwrap_or_else(|| rel.to_string());
    let target = render(&stripped, &config.placeholders).map_err(|e| e.in_file(rel))?;
    let text = String::from_utf8_lossy(&job.bytes);
    if matches!(text, Cow::Owned(_)) {
        warn!("{rel}: template is not valid UTF-8; invalid bytes were replaced with U+FFFD");
    }
    let output = render(&text, &config.placeholders).map_err(|e| e.in_file(rel))?;
    Ok((target, output))
}
