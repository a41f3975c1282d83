//! Error taxonomy for configuration, rendering, collisions and per-file I/O.

use std::path::PathBuf;

/// Result alias for whole-run operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal configuration problems, always raised before any file is read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {format} config {path}: {message}")]
    Parse {
        path: PathBuf,
        format: &'static str,
        message: String,
    },

    #[error("unsupported config extension for {path} (expected .yml, .yaml, .toml or .json)")]
    UnsupportedFormat { path: PathBuf },

    #[error("{field}: missing required value")]
    Missing { field: String },

    #[error("{field}: invalid package name {value:?} ({reason})")]
    InvalidPackageName {
        field: String,
        value: String,
        reason: &'static str,
    },

    #[error("{field}: unknown placeholder {{{name}}}")]
    UnknownPlaceholder { field: String, name: String },

    #[error("{field}: placeholder {{{name}}} is built in and cannot be redefined")]
    ReservedPlaceholder { field: String, name: String },

    #[error("{field}: invalid regex: {source}")]
    InvalidRegex {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("{field}: invalid glob {pattern:?}: {source}")]
    InvalidGlob {
        field: String,
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("{field}: app {name:?} is not declared in `apps`")]
    UnknownApp { field: String, name: String },

    #[error("{field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A template referenced a placeholder that has no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}undefined placeholder {{{name}}}", .file.as_deref().map(|f| format!("{f}: ")).unwrap_or_default())]
pub struct PlaceholderError {
    pub name: String,
    pub file: Option<String>,
}

impl PlaceholderError {
    pub fn in_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// Several source files resolved to the same output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub target: String,
    pub sources: Vec<String>,
}

impl std::fmt::Display for Collision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <- {}", self.target, self.sources.join(", "))
    }
}

/// I/O failure isolated to one file; sibling jobs keep running.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot list directory {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot remove {path}: {source}")]
    Remove {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FileError {
    /// Relative path the failure belongs to.
    pub fn path(&self) -> &str {
        match self {
            Self::Read { path, .. }
            | Self::Walk { path, .. }
            | Self::Write { path, .. }
            | Self::Remove { path, .. } => path,
        }
    }
}

/// Why a single job produced no output.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    #[error("{file}: rewritten path {target:?} leaves the output root")]
    UnsafeTarget { file: String, target: String },
}

/// Run-level failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{} template placeholder error(s): {}", .0.len(), join(.0))]
    Placeholder(Vec<PlaceholderError>),

    #[error("{} output path collision(s): {}", .0.len(), join(.0))]
    PathCollision(Vec<Collision>),

    #[error("source root {path} is not a directory")]
    SourceRoot { path: PathBuf },

    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Process exit code for the binary: 2 for setup problems, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Placeholder(_) | Self::SourceRoot { .. } | Self::Pool(_) => 2,
            Self::PathCollision(_) => 1,
        }
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
