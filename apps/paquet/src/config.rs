//! Configuration loading, placeholder expansion and validation.
//!
//! The rule file is read from `-c PATH`, or else from the first of
//! `search-and-replace.{yml,yaml,toml,json}` found in the working
//! directory. The format follows the file extension.
//!
//! Precedence: CLI overrides > config file > defaults. Defaults:
//! - `package_verbose_name`: title-cased `package_name`
//! - `included_apps`: every declared app
//! - rule `scope`: content; rule `literal`: false (regex)
//! - `templates.marker`: `template`
//! - `exclude`: version-control metadata, caches, lock files (extended,
//!   never replaced, by the configured list)
//!
//! Every placeholder in rule `search`/`replace` strings is resolved here,
//! so the engine only ever sees concrete rules.

use crate::error::ConfigError;
use crate::models::rule::{RawRule, Rule, RuleSource, Scope};
use crate::template::{self, FeatureGate, Placeholders, TemplateSettings};
use glob::Pattern;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIG_NAMES: &[&str] = &[
    "search-and-replace.yml",
    "search-and-replace.yaml",
    "search-and-replace.toml",
    "search-and-replace.json",
];

pub const DEFAULT_EXCLUDE: &[&str] = &[
    "**/.git",
    "**/.hg",
    "**/.svn",
    "**/__pycache__",
    "**/node_modules",
    "**/.venv",
    "**/.tox",
    "**/*.egg-info",
    "**/*.pyc",
    "**/*.lock",
    "**/package-lock.json",
];

/// Names computed from the package identity; user placeholders cannot
/// shadow them.
pub const BUILTIN_PLACEHOLDERS: &[&str] = &[
    "package_name",
    "package_name_upper",
    "package_name_kebab",
    "package_name_title",
    "PackageName",
    "package_verbose_name",
    "version",
    "app",
];

#[derive(Debug, Default, Deserialize, Clone)]
/// Template section under `templates`.
pub struct RawTemplates {
    pub marker: Option<String>,
    #[serde(default)]
    pub passthrough: Vec<String>,
    #[serde(default)]
    pub gates: Vec<RawGate>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct RawGate {
    pub glob: String,
    pub feature: String,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration as written on disk.
pub struct RawConfig {
    pub package_name: Option<String>,
    pub package_verbose_name: Option<String>,
    #[serde(default)]
    pub apps: Vec<String>,
    #[serde(default)]
    pub included_apps: Option<Vec<String>>,
    #[serde(default)]
    pub rules: Vec<RawRule>,
    pub source_repo_url: Option<String>,
    #[serde(rename = "ref", alias = "tag")]
    pub reference: Option<String>,
    #[serde(default)]
    pub placeholders: BTreeMap<String, String>,
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub text_extensions: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub templates: RawTemplates,
}

#[derive(Debug, Default, Clone)]
/// Values supplied on the command line, applied over the file.
pub struct Overrides {
    pub package_name: Option<String>,
    pub reference: Option<String>,
    pub repo_url: Option<String>,
}

#[derive(Debug, Clone)]
/// Validated, immutable run configuration.
pub struct Config {
    pub package_name: String,
    pub package_verbose_name: String,
    pub apps: Vec<String>,
    pub included_apps: Vec<String>,
    pub excluded_apps: BTreeSet<String>,
    pub rules: Vec<Rule>,
    pub source_repo_url: Option<String>,
    pub reference: Option<String>,
    /// Values and passthrough names available to templates.
    pub placeholders: Placeholders,
    pub features: BTreeMap<String, bool>,
    pub text_extensions: Option<BTreeSet<String>>,
    pub exclude: Vec<Pattern>,
    pub templates: TemplateSettings,
}

impl Config {
    /// Whether content rules may run on a file with this relative path.
    pub fn is_text_candidate(&self, rel: &str) -> bool {
        let Some(exts) = self.text_extensions.as_ref() else {
            return true;
        };
        let name = rel.rsplit('/').next().unwrap_or(rel);
        match name.rfind('.') {
            Some(pos) if pos > 0 => exts.contains(&name[pos..]),
            _ => false,
        }
    }
}

/// Pick the config path: the CLI value, else the first default name that
/// exists under `cwd`, else the primary default (reported as unreadable).
pub fn resolve_config_path(cli: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(p) = cli {
        return p.to_path_buf();
    }
    DEFAULT_CONFIG_NAMES
        .iter()
        .map(|n| cwd.join(n))
        .find(|p| p.is_file())
        .unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_NAMES[0]))
}

/// Read and validate the config at `path`.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<Config, ConfigError> {
    info!("loading rules from {}", path.display());
    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let raw = parse_raw(&text, path)?;
    from_raw(raw, overrides)
}

/// Parse the on-disk representation, choosing the format by extension.
pub fn parse_raw(text: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let parse_err = |format: &'static str, message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        format,
        message,
    };
    match ext.as_str() {
        "yml" | "yaml" => {
            // An empty YAML document is an empty config.
            if text.trim().is_empty() {
                return Ok(RawConfig::default());
            }
            serde_yaml::from_str(text).map_err(|e| parse_err("YAML", e.to_string()))
        }
        "toml" => toml::from_str(text).map_err(|e| parse_err("TOML", e.to_string())),
        "json" => serde_json::from_str(text).map_err(|e| parse_err("JSON", e.to_string())),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Check the namespace convention for `package_name`.
pub fn validate_package_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("contains a path separator");
    }
    if name.chars().any(char::is_whitespace) {
        return Err("contains whitespace");
    }
    if !template::is_identifier(name) {
        return Err("must start with a letter or underscore and contain only ASCII letters, digits and underscores");
    }
    Ok(())
}

/// Placeholders derived from the package identity.
pub fn builtin_placeholders(
    package_name: &str,
    verbose_name: &str,
    reference: Option<&str>,
) -> Placeholders {
    let words: Vec<&str> = package_name.split('_').filter(|w| !w.is_empty()).collect();
    let mut p = Placeholders::new();
    p.insert("package_name", package_name);
    p.insert("package_name_upper", package_name.to_uppercase().replace('-', "_"));
    p.insert("package_name_kebab", package_name.replace('_', "-"));
    p.insert(
        "package_name_title",
        words.iter().map(|w| capitalize(w)).collect::<Vec<_>>().join(" "),
    );
    p.insert(
        "PackageName",
        words.iter().map(|w| capitalize(w)).collect::<String>(),
    );
    p.insert("package_verbose_name", verbose_name);
    if let Some(r) = reference {
        p.insert("version", r.strip_prefix('v').unwrap_or(r));
    }
    p
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn resolve(text: &str, placeholders: &Placeholders, field: String) -> Result<String, ConfigError> {
    template::render(text, placeholders).map_err(|e| ConfigError::UnknownPlaceholder {
        field,
        name: e.name,
    })
}

/// Apply overrides, expand placeholders and compile rules.
pub fn from_raw(raw: RawConfig, overrides: &Overrides) -> Result<Config, ConfigError> {
    let package_name = overrides
        .package_name
        .clone()
        .or(raw.package_name)
        .ok_or_else(|| ConfigError::missing("package_name"))?;
    validate_package_name(&package_name).map_err(|reason| ConfigError::InvalidPackageName {
        field: "package_name".into(),
        value: package_name.clone(),
        reason,
    })?;
    let reference = overrides.reference.clone().or(raw.reference);
    let source_repo_url = overrides.repo_url.clone().or(raw.source_repo_url);

    let defaults = builtin_placeholders(&package_name, "", reference.as_deref());
    let package_verbose_name = raw
        .package_verbose_name
        .unwrap_or_else(|| defaults.get("package_name_title").unwrap_or_default().to_string());
    let mut placeholders =
        builtin_placeholders(&package_name, &package_verbose_name, reference.as_deref());
    for (name, value) in &raw.placeholders {
        let field = format!("placeholders.{name}");
        if BUILTIN_PLACEHOLDERS.contains(&name.as_str()) {
            return Err(ConfigError::ReservedPlaceholder {
                field,
                name: name.clone(),
            });
        }
        if !template::is_identifier(name) {
            return Err(ConfigError::invalid(field, "placeholder names must be identifiers"));
        }
        placeholders.insert(name.clone(), value.clone());
    }

    // Apps: declared set, retained subset, and the excluded remainder.
    let mut seen = BTreeSet::new();
    for (i, app) in raw.apps.iter().enumerate() {
        if app.is_empty() || app.contains('/') || !seen.insert(app.clone()) {
            return Err(ConfigError::invalid(
                format!("apps[{i}]"),
                format!("invalid or duplicate app {app:?}"),
            ));
        }
    }
    let included_apps = match raw.included_apps {
        Some(list) => {
            for (i, app) in list.iter().enumerate() {
                if !raw.apps.is_empty() && !seen.contains(app) {
                    return Err(ConfigError::UnknownApp {
                        field: format!("included_apps[{i}]"),
                        name: app.clone(),
                    });
                }
            }
            list
        }
        None => raw.apps.clone(),
    };
    let excluded_apps: BTreeSet<String> = raw
        .apps
        .iter()
        .filter(|a| !included_apps.contains(a))
        .cloned()
        .collect();

    let rules = expand_rules(&raw.rules, &placeholders, &included_apps)?;
    info!(
        "expanded {} rule(s) into {} concrete rule(s)",
        raw.rules.len(),
        rules.len()
    );

    let text_extensions = raw.text_extensions.map(|exts| {
        exts.into_iter()
            .map(|e| if e.starts_with('.') { e } else { format!(".{e}") })
            .collect::<BTreeSet<_>>()
    });
    if let Some(exts) = &text_extensions {
        debug!("text extensions: {:?}", exts);
    }

    let mut exclude = Vec::new();
    for (i, g) in DEFAULT_EXCLUDE
        .iter()
        .map(|s| s.to_string())
        .chain(raw.exclude.iter().cloned())
        .enumerate()
    {
        let field = format!("exclude[{}]", i.saturating_sub(DEFAULT_EXCLUDE.len()));
        exclude.push(compile_glob(&g, field)?);
    }

    let marker = raw.templates.marker.unwrap_or_else(|| "template".to_string());
    if marker.is_empty() || marker.contains('/') || marker.contains('.') {
        return Err(ConfigError::invalid(
            "templates.marker",
            "must be a non-empty name without dots or slashes",
        ));
    }
    for name in &raw.templates.passthrough {
        placeholders.allow_passthrough(name.clone());
    }
    let mut gates = Vec::new();
    for (i, g) in raw.templates.gates.iter().enumerate() {
        if !raw.features.contains_key(&g.feature) {
            warn!(
                "templates.gates[{i}]: feature {:?} is not declared; its templates are skipped",
                g.feature
            );
        }
        gates.push(FeatureGate {
            glob: compile_glob(&g.glob, format!("templates.gates[{i}].glob"))?,
            feature: g.feature.clone(),
        });
    }

    Ok(Config {
        package_name,
        package_verbose_name,
        apps: raw.apps,
        included_apps,
        excluded_apps,
        rules,
        source_repo_url,
        reference,
        placeholders,
        features: raw.features,
        text_extensions,
        exclude,
        templates: TemplateSettings { marker, gates },
    })
}

fn compile_glob(pattern: &str, field: String) -> Result<Pattern, ConfigError> {
    Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlob {
        field,
        pattern: pattern.to_string(),
        source: e,
    })
}

/// Resolve placeholders and `{app}` in declaration order.
///
/// A rule mentioning `{app}` becomes one rule per retained app, in app
/// order, at the position of the original entry.
fn expand_rules(
    raw: &[RawRule],
    placeholders: &Placeholders,
    apps: &[String],
) -> Result<Vec<Rule>, ConfigError> {
    let mut rules = Vec::new();
    for (origin, r) in raw.iter().enumerate() {
        let search = r
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ConfigError::missing(format!("rules[{origin}].search")))?;
        let replace = r
            .replace
            .as_deref()
            .ok_or_else(|| ConfigError::missing(format!("rules[{origin}].replace")))?;
        let per_app = template::references(search)
            .into_iter()
            .chain(template::references(replace))
            .any(|n| n == "app");
        let contexts: Vec<Placeholders> = if per_app && !apps.is_empty() {
            apps.iter().map(|a| placeholders.with("app", a)).collect()
        } else {
            vec![placeholders.clone()]
        };
        for ctx in contexts {
            let rule = Rule::compile(RuleSource {
                index: rules.len(),
                origin,
                search: resolve(search, &ctx, format!("rules[{origin}].search"))?,
                replace: resolve(replace, &ctx, format!("rules[{origin}].replace"))?,
                scope: r.scope.unwrap_or(Scope::Content),
                literal: r.literal,
                file_glob: r.file_glob.as_deref(),
                filter: r.filter.as_deref(),
            })?;
            rules.push(rule);
        }
    }
    Ok(rules)
}
