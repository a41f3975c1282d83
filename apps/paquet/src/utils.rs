//! Small shared helpers: glob matching, path display and message prefixes.

use glob::{MatchOptions, Pattern};
use owo_colors::OwoColorize;
use std::path::{Component, Path};

/// `*` stays inside one path segment, `**` crosses segments.
pub const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

pub fn glob_matches(pattern: &Pattern, rel: &str) -> bool {
    pattern.matches_with(rel, GLOB_OPTIONS)
}

/// Whether `rel` stays inside the directory it is joined to: non-empty,
/// relative, and made only of plain names.
pub fn is_contained(rel: &str) -> bool {
    !rel.is_empty()
        && !rel.starts_with('/')
        && Path::new(rel)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// Display `p` relative to the working directory when possible.
pub fn rel_to_wd(p: &Path) -> String {
    let shown = std::env::current_dir()
        .ok()
        .and_then(|cwd| pathdiff::diff_paths(p, cwd))
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| p.to_path_buf());
    shown.to_string_lossy().to_string()
}

pub fn use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

pub fn error_prefix() -> String {
    if use_colors() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn warn_prefix() -> String {
    if use_colors() {
        "warning:".yellow().bold().to_string()
    } else {
        "warning:".to_string()
    }
}

pub fn note_prefix() -> String {
    if use_colors() {
        "note:".blue().bold().to_string()
    } else {
        "note:".to_string()
    }
}
