//! paquet core library.
//!
//! This crate repackages an upstream source tree under a new namespace:
//! ordered search/replace rules rewrite paths and contents, template files
//! are rendered with package placeholders, and the result is written
//! atomically or reported as a dry run.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Rule file loading, placeholder expansion and validation.
//! - `walk`: Lazy, sorted source tree enumeration with exclusions.
//! - `engine`: Rule application on a single file.
//! - `template`: Placeholder rendering and template gating.
//! - `executor`: Parallel planning, collision and placeholder checks.
//! - `writer`: Dry-run reporting and atomic writes.
//! - `run`: One `apply` invocation end to end.
//! - `diff`: Unified diff previews.
//! - `models`: Rules, jobs, results and the run report.
//! - `output`: Human/JSON printers.
//! - `error`: Error taxonomy and exit codes.
//! - `logging`: `tracing` subscriber setup.
//! - `utils`: Supporting helpers.
pub mod cli;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod run;
pub mod template;
pub mod utils;
pub mod walk;
pub mod writer;
