//! One `apply` invocation: plan in parallel, then report or write.

use crate::config::Config;
use crate::diff::{self, FileDiff};
use crate::error::Result;
use crate::executor::Executor;
use crate::models::report::RunReport;
use crate::writer::{self, Destination};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub source: PathBuf,
    /// `None` rewrites the source tree in place.
    pub out: Option<PathBuf>,
    pub dry_run: bool,
    pub jobs: Option<usize>,
    pub diffs: bool,
}

#[derive(Debug)]
pub struct RunOutput {
    pub report: RunReport,
    /// Filled only when diffs were requested.
    pub diffs: Vec<FileDiff>,
}

/// Plan the whole tree, then either report (dry run) or write.
///
/// Fatal errors (placeholders, collisions, bad root) are returned before
/// anything is written; per-file failures end up in the report.
pub fn run(config: &Config, opts: &RunOptions) -> Result<RunOutput> {
    let executor = Executor::new(opts.jobs)?;
    let plan = executor.plan_into(&opts.source, config, opts.out.as_deref())?;
    let diffs = if opts.diffs {
        diff::collect(&plan.results)
    } else {
        Vec::new()
    };

    let report = if opts.dry_run {
        writer::dry_run(&plan, config)
    } else {
        let dest = match &opts.out {
            Some(dir) => Destination::Directory(dir.clone()),
            None => Destination::InPlace,
        };
        writer::write(&plan, config, &opts.source, &dest, &executor)
    };
    info!(
        "{} visited, {} changed, {} error(s)",
        report.summary.visited, report.summary.changed, report.summary.errors
    );
    Ok(RunOutput { report, diffs })
}
