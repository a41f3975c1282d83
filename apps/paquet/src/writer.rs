//! Effectful end of a run: the dry-run reporter and the atomic writer.
//!
//! Both consume a [`Plan`] and return a report of the same shape. The dry
//! run never touches the filesystem. The writer replaces each output with a
//! temp-file-then-rename, so an interrupted run never leaves a partial file.

use crate::config::Config;
use crate::error::FileError;
use crate::executor::{Executor, Plan};
use crate::models::report::{Failure, RunReport};
use crate::models::FileKind;
use crate::utils;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Rewrite the source tree: changed files are replaced and renamed
    /// sources (other than templates) are removed.
    InPlace,
    /// Emit the full transformed tree under this directory.
    Directory(PathBuf),
}

/// Report what a real run would do, without any side effect.
pub fn dry_run(plan: &Plan, config: &Config) -> RunReport {
    let report = plan.report(config);
    info!(
        "dry run: {} of {} file(s) would change",
        report.summary.changed, report.summary.visited
    );
    report
}

/// Write the plan and report the outcome. Per-file failures are recorded
/// and never stop other writes.
pub fn write(
    plan: &Plan,
    config: &Config,
    source_root: &Path,
    dest: &Destination,
    executor: &Executor,
) -> RunReport {
    let mut report = plan.report(config);
    let (out_root, in_place) = match dest {
        Destination::InPlace => (source_root, true),
        Destination::Directory(dir) => (dir.as_path(), same_dir(dir, source_root)),
    };

    let pending: Vec<_> = plan
        .results
        .iter()
        .filter(|r| r.error.is_none() && (r.changed() || !in_place))
        .collect();
    let outcomes: Vec<(String, Result<(), FileError>)> = executor.install(|| {
        pending
            .par_iter()
            .map(|r| {
                let dst = out_root.join(&r.target);
                let perms = fs::metadata(source_root.join(&r.source))
                    .ok()
                    .map(|m| m.permissions());
                let res = write_atomic(&dst, &r.output, perms).map_err(|e| FileError::Write {
                    path: r.target.clone(),
                    source: e,
                });
                (r.source.clone(), res)
            })
            .collect()
    });

    let mut written: BTreeSet<&str> = BTreeSet::new();
    let mut failures = Vec::new();
    for (source, res) in &outcomes {
        match res {
            Ok(()) => {
                written.insert(source.as_str());
            }
            Err(e) => {
                warn!("{e}");
                failures.push(Failure {
                    path: e.path().to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    if in_place {
        let targets: BTreeSet<&str> = plan.results.iter().map(|r| r.target.as_str()).collect();
        // Templates are inputs; their sources stay next to the rendered file.
        let moved = plan
            .results
            .iter()
            .filter(|r| r.renamed() && r.kind != FileKind::Template);
        for r in moved {
            if !written.contains(r.source.as_str()) || targets.contains(r.source.as_str()) {
                continue;
            }
            let old = source_root.join(&r.source);
            match fs::remove_file(&old) {
                Ok(()) => {
                    debug!("removed {}", r.source);
                    remove_empty_parents(&old, source_root);
                }
                Err(e) => {
                    let err = FileError::Remove {
                        path: r.source.clone(),
                        source: e,
                    };
                    warn!("{err}");
                    failures.push(Failure {
                        path: err.path().to_string(),
                        message: err.to_string(),
                    });
                }
            }
        }
    }

    report.written = true;
    report.summary.written = written.len();
    report.errors.extend(failures);
    report.errors.sort_by(|a, b| a.path.cmp(&b.path));
    report.summary.errors = report.errors.len();
    info!(
        "wrote {} file(s) to {}",
        report.summary.written,
        utils::rel_to_wd(out_root)
    );
    report
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Replace `path` with `bytes` through a sibling temp file and a rename.
/// Parent directories are created on demand.
pub fn write_atomic(
    path: &Path,
    bytes: &[u8],
    permissions: Option<fs::Permissions>,
) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    if let Some(perms) = permissions {
        tmp.as_file().set_permissions(perms)?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove directories left empty by a rename, stopping at `root`.
fn remove_empty_parents(file: &Path, root: &Path) {
    let mut dir = file.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        // Fails (and stops) as soon as a directory is not empty.
        if fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{from_raw, parse_raw, Overrides};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn config(yaml: &str) -> Config {
        let raw = parse_raw(yaml, Path::new("c.yml")).unwrap();
        from_raw(raw, &Overrides::default()).unwrap()
    }

    fn touch(root: &Path, rel: &str, body: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    const RENAME: &str = "package_name: wagtail_dsfr\nrules:\n  - search: '^blog/'\n    replace: '{package_name}/blog/'\n    scope: path\n  - search: '\\bblog\\b'\n    replace: '{package_name}_blog'\n";

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() {
        let tmp = tempdir().unwrap();
        let p = tmp.path().join("a/b/c.txt");
        write_atomic(&p, b"one", None).unwrap();
        write_atomic(&p, b"two", None).unwrap();
        assert_eq!(fs::read_to_string(&p).unwrap(), "two");
        let leftovers: Vec<_> = fs::read_dir(p.parent().unwrap()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_in_place_rename_moves_file_and_prunes_dir() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(root, "blog/models.py", "import blog\n");
        touch(root, "README.md", "nothing\n");
        let cfg = config(RENAME);
        let exec = Executor::new(Some(2)).unwrap();
        let plan = exec.plan(root, &cfg).unwrap();
        let report = write(&plan, &cfg, root, &Destination::InPlace, &exec);
        assert!(report.written);
        assert!(!report.has_errors());
        assert_eq!(report.summary.written, 1);
        assert_eq!(
            fs::read_to_string(root.join("wagtail_dsfr/blog/models.py")).unwrap(),
            "import wagtail_dsfr_blog\n"
        );
        assert!(!root.join("blog").exists());
        assert_eq!(fs::read_to_string(root.join("README.md")).unwrap(), "nothing\n");
    }

    #[test]
    fn test_in_place_keeps_template_sources() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(root, "templates/apps.template.py", "name = '{package_name}'\n");
        let cfg = config("package_name: wagtail_dsfr\n");
        let exec = Executor::new(Some(1)).unwrap();
        let plan = exec.plan(root, &cfg).unwrap();
        let report = write(&plan, &cfg, root, &Destination::InPlace, &exec);
        assert_eq!(report.summary.written, 1);
        assert!(root.join("templates/apps.template.py").is_file());
        assert_eq!(
            fs::read_to_string(root.join("templates/apps.py")).unwrap(),
            "name = 'wagtail_dsfr'\n"
        );
    }

    #[test]
    fn test_directory_destination_copies_everything() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("src");
        let out = tmp.path().join("out");
        touch(&src, "blog/models.py", "import blog\n");
        touch(&src, "docs/index.md", "unchanged\n");
        let cfg = config(RENAME);
        let exec = Executor::new(Some(2)).unwrap();
        let plan = exec.plan(&src, &cfg).unwrap();
        let report = write(&plan, &cfg, &src, &Destination::Directory(out.clone()), &exec);
        assert_eq!(report.summary.written, 2);
        assert!(out.join("wagtail_dsfr/blog/models.py").is_file());
        assert_eq!(fs::read_to_string(out.join("docs/index.md")).unwrap(), "unchanged\n");
        // Source tree untouched.
        assert_eq!(
            fs::read_to_string(src.join("blog/models.py")).unwrap(),
            "import blog\n"
        );
    }

    #[test]
    fn test_dry_run_has_no_side_effects_and_same_shape() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(root, "blog/models.py", "import blog\n");
        let cfg = config(RENAME);
        let exec = Executor::new(Some(1)).unwrap();
        let plan = exec.plan(root, &cfg).unwrap();
        let dry = dry_run(&plan, &cfg);
        assert!(!dry.written);
        assert!(root.join("blog/models.py").is_file());
        assert!(!root.join("wagtail_dsfr").exists());

        let real = write(&plan, &cfg, root, &Destination::InPlace, &exec);
        assert_eq!(dry.files, real.files);
        assert_eq!(dry.rules, real.rules);
        assert_eq!(dry.summary.changed, real.summary.changed);
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_are_preserved() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(root, "bin/run.sh", "echo blog\n");
        fs::set_permissions(root.join("bin/run.sh"), fs::Permissions::from_mode(0o755)).unwrap();
        let cfg = config("package_name: p\nrules:\n  - search: blog\n    replace: news\n");
        let exec = Executor::new(Some(1)).unwrap();
        let plan = exec.plan(root, &cfg).unwrap();
        write(&plan, &cfg, root, &Destination::InPlace, &exec);
        let mode = fs::metadata(root.join("bin/run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
