//! Parallel planning of a run.
//!
//! Every file is transformed on a dedicated `rayon` pool of `N` workers.
//! Jobs own their input and produce a self-contained [`TransformResult`];
//! nothing is written here. After all jobs finish, results are sorted by
//! source path, template placeholder errors abort the run, and output-path
//! collisions are detected on the complete result set so that every
//! colliding group is reported at once.
//!
//! A rendered template owns its target path: a plain file already sitting
//! there (typically the output of an earlier in-place run) is replaced by
//! the template rather than reported as a collision.

use crate::config::Config;
use crate::engine;
use crate::error::{Collision, Error, FileError, JobError, PlaceholderError, Result};
use crate::models::report::{Failure, RunReport};
use crate::models::{FileKind, TransformJob, TransformResult};
use crate::template;
use crate::utils;
use crate::walk::{SourceFile, TreeWalker};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Computed results of a run, ready for the dry-run reporter or the writer.
#[derive(Debug)]
pub struct Plan {
    pub results: Vec<TransformResult>,
    pub skipped_templates: Vec<String>,
    pub walk_errors: Vec<Failure>,
}

impl Plan {
    pub fn report(&self, config: &Config) -> RunReport {
        RunReport::from_results(
            &self.results,
            &config.rules,
            self.skipped_templates.clone(),
            self.walk_errors.clone(),
        )
    }
}

/// Fixed-size worker pool shared by planning and writing.
pub struct Executor {
    pool: rayon::ThreadPool,
}

impl Executor {
    /// `jobs = None` uses the available parallelism.
    pub fn new(jobs: Option<usize>) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.unwrap_or(0))
            .thread_name(|i| format!("paquet-worker-{i}"))
            .build()?;
        debug!("worker pool ready with {} thread(s)", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` inside the pool so its parallel iterators use these workers.
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.pool.install(f)
    }

    /// Walk `root` and transform every file without writing anything.
    pub fn plan(&self, root: &Path, config: &Config) -> Result<Plan> {
        self.plan_into(root, config, None)
    }

    /// Like [`Executor::plan`], leaving out an output directory `out` that
    /// lives inside `root`.
    pub fn plan_into(&self, root: &Path, config: &Config, out: Option<&Path>) -> Result<Plan> {
        if !root.is_dir() {
            return Err(Error::SourceRoot {
                path: root.to_path_buf(),
            });
        }
        let mut walker = TreeWalker::new(root, config);
        if let Some(out) = out {
            walker = walker.skip_output(out);
        }
        let mut files: Vec<SourceFile> = Vec::new();
        let mut skipped_templates = Vec::new();
        let mut walk_errors = Vec::new();
        for item in walker.files() {
            match item {
                Ok(f) => {
                    if f.is_template {
                        if let Some(gate) = config.templates.disabled_by(&f.rel_path, &config.features) {
                            debug!("skipping {} (feature {:?} is off)", f.rel_path, gate.feature);
                            skipped_templates.push(f.rel_path);
                            continue;
                        }
                    }
                    files.push(f);
                }
                Err(e) => {
                    warn!("{e}");
                    walk_errors.push(Failure {
                        path: e.path().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        info!(
            "found {} file(s) to process with {} worker(s)",
            files.len(),
            self.threads()
        );

        let mut results: Vec<TransformResult> = self.install(|| {
            files
                .par_iter()
                .map(|f| process(f, config))
                .collect()
        });
        results.sort_by(|a, b| a.source.cmp(&b.source));
        let results = supersede_template_targets(results);

        let placeholder_errors: Vec<PlaceholderError> = results
            .iter()
            .filter_map(|r| match &r.error {
                Some(JobError::Placeholder(e)) => Some(e.clone()),
                _ => None,
            })
            .collect();
        if !placeholder_errors.is_empty() {
            return Err(Error::Placeholder(placeholder_errors));
        }

        let collisions = find_collisions(&results);
        if !collisions.is_empty() {
            return Err(Error::PathCollision(collisions));
        }

        Ok(Plan {
            results,
            skipped_templates,
            walk_errors,
        })
    }
}

fn process(file: &SourceFile, config: &Config) -> TransformResult {
    let kind = if file.is_template {
        FileKind::Template
    } else {
        FileKind::Text
    };
    let bytes = match fs::read(&file.abs_path) {
        Ok(b) => b,
        Err(e) => {
            let err = FileError::Read {
                path: file.rel_path.clone(),
                source: e,
            };
            warn!("{err}");
            return TransformResult::failed(file.rel_path.clone(), kind, err.into());
        }
    };
    let job = TransformJob {
        rel_path: file.rel_path.clone(),
        bytes,
    };
    let result = if file.is_template {
        template::render_job(job, config)
    } else {
        engine::apply(job, config)
    };
    if result.error.is_none() && !utils::is_contained(&result.target) {
        let err = JobError::UnsafeTarget {
            file: result.source.clone(),
            target: result.target.clone(),
        };
        warn!("{err}");
        return TransformResult::failed(result.source, result.kind, err);
    }
    result
}

/// Drop plain files sitting at a rendered template's target and hand their
/// bytes to the template, so re-rendering an unchanged template is a no-op.
fn supersede_template_targets(results: Vec<TransformResult>) -> Vec<TransformResult> {
    let rendered: BTreeSet<String> = results
        .iter()
        .filter(|r| r.kind == FileKind::Template && r.error.is_none())
        .map(|r| r.target.clone())
        .collect();
    if rendered.is_empty() {
        return results;
    }
    let mut existing: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let mut kept = Vec::with_capacity(results.len());
    for r in results {
        if r.kind != FileKind::Template && r.error.is_none() && rendered.contains(&r.source) {
            debug!("{} is rendered from a template; its current copy is replaced", r.source);
            existing.insert(r.source, r.original);
        } else {
            kept.push(r);
        }
    }
    for r in kept.iter_mut().filter(|r| r.kind == FileKind::Template) {
        if let Some(bytes) = existing.remove(&r.target) {
            r.original = bytes;
            r.target_exists = true;
        }
    }
    kept
}

/// Groups of sources sharing one target, ordered by target path.
pub fn find_collisions(results: &[TransformResult]) -> Vec<Collision> {
    let mut by_target: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for r in results {
        by_target
            .entry(r.target.as_str())
            .or_default()
            .push(r.source.as_str());
    }
    by_target
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(target, sources)| {
            let mut sources: Vec<String> = sources.into_iter().map(str::to_string).collect();
            sources.sort();
            Collision {
                target: target.to_string(),
                sources,
            }
        })
        .collect()
}
