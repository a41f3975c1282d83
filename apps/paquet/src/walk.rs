//! Source tree enumeration.
//!
//! Yields regular files in lexicographic order of their forward-slash
//! relative path. Directories are read lazily as the walk reaches them.
//! Symlinks are never followed and, like other non-regular entries, never
//! yielded. Excluded directories (exclusion globs, excluded apps, or an
//! output directory nested in the source) are pruned without being read.

use crate::config::Config;
use crate::error::FileError;
use crate::utils;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub is_template: bool,
}

/// A restartable walk over `root`: every call to [`TreeWalker::files`]
/// starts a fresh pass.
pub struct TreeWalker<'a> {
    root: PathBuf,
    config: &'a Config,
    /// Relative path of an output directory that lives inside `root`.
    output_rel: Option<String>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(root: impl Into<PathBuf>, config: &'a Config) -> Self {
        Self {
            root: root.into(),
            config,
            output_rel: None,
        }
    }

    /// Never descend into `out` when it sits strictly inside the root, so a
    /// previous run's output is not transformed again.
    pub fn skip_output(mut self, out: &Path) -> Self {
        let (Ok(root), Ok(out)) = (self.root.canonicalize(), out.canonicalize()) else {
            return self;
        };
        if let Ok(rel) = out.strip_prefix(&root) {
            let rel: Vec<String> = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            if !rel.is_empty() {
                self.output_rel = Some(rel.join("/"));
            }
        }
        self
    }

    pub fn files(&self) -> Files<'_, 'a> {
        Files {
            walker: self,
            stack: Vec::new(),
            started: false,
        }
    }

    fn prune_dir(&self, rel: &str) -> bool {
        if self.output_rel.as_deref() == Some(rel) {
            debug!("skipping output directory {rel}");
            return true;
        }
        if !rel.contains('/') && self.config.excluded_apps.contains(rel) {
            debug!("skipping excluded app {rel}");
            return true;
        }
        self.is_excluded(rel)
    }

    fn is_excluded(&self, rel: &str) -> bool {
        let hit = self
            .config
            .exclude
            .iter()
            .any(|p| utils::glob_matches(p, rel));
        if hit {
            debug!("excluded {rel}");
        }
        hit
    }
}

struct Entry {
    name: String,
    path: PathBuf,
    is_dir: bool,
}

struct Frame {
    dir_rel: String,
    entries: std::vec::IntoIter<Entry>,
}

/// Lazy iterator over one pass of a [`TreeWalker`].
pub struct Files<'w, 'a> {
    walker: &'w TreeWalker<'a>,
    stack: Vec<Frame>,
    started: bool,
}

/// Read the regular files and directories of `dir`, sorted so that a
/// depth-first walk emits full relative paths in lexicographic order.
fn read_sorted(dir: &Path) -> std::io::Result<Vec<Entry>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        // DirEntry::file_type does not follow symlinks.
        let ft = entry.file_type()?;
        if !(ft.is_dir() || ft.is_file()) {
            continue;
        }
        out.push(Entry {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.path(),
            is_dir: ft.is_dir(),
        });
    }
    // A directory sorts as "name/" so "a.txt" precedes "a/b".
    out.sort_by_cached_key(|e| {
        if e.is_dir {
            format!("{}/", e.name)
        } else {
            e.name.clone()
        }
    });
    Ok(out)
}

impl Iterator for Files<'_, '_> {
    type Item = Result<SourceFile, FileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.started {
            self.started = true;
            match read_sorted(&self.walker.root) {
                Ok(entries) => self.stack.push(Frame {
                    dir_rel: String::new(),
                    entries: entries.into_iter(),
                }),
                Err(e) => {
                    return Some(Err(FileError::Walk {
                        path: ".".into(),
                        source: e,
                    }))
                }
            }
        }
        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.next() else {
                self.stack.pop();
                continue;
            };
            let rel = if frame.dir_rel.is_empty() {
                entry.name.clone()
            } else {
                format!("{}/{}", frame.dir_rel, entry.name)
            };
            if entry.is_dir {
                if self.walker.prune_dir(&rel) {
                    continue;
                }
                match read_sorted(&entry.path) {
                    Ok(entries) => self.stack.push(Frame {
                        dir_rel: rel,
                        entries: entries.into_iter(),
                    }),
                    Err(e) => return Some(Err(FileError::Walk { path: rel, source: e })),
                }
                continue;
            }
            if self.walker.is_excluded(&rel) {
                continue;
            }
            let is_template = self.walker.config.templates.is_template(&rel);
            return Some(Ok(SourceFile {
                rel_path: rel,
                abs_path: entry.path,
                is_template,
            }));
        }
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

    fn touch(root: &Path, rel: &str) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, rel).unwrap();
    }

    #[test]
    fn test_walk_is_lexicographic_and_skips_excluded() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        for rel in [
            "a/b.py",
            "a.txt",
            "blog/models.py",
            "blog/__pycache__/models.cpython-312.pyc",
            ".git/HEAD",
            "uv.lock",
            "forms/views.py",
            "templates/apps.template.py",
        ] {
            touch(root, rel);
        }
        let cfg = config("package_name: p\napps: [blog, forms]\nincluded_apps: [blog]\n");
        let walker = TreeWalker::new(root, &cfg);
        let files: Vec<(String, bool)> = walker
            .files()
            .map(|f| f.unwrap())
            .map(|f| (f.rel_path, f.is_template))
            .collect();
        assert_eq!(
            files,
            vec![
                ("a.txt".to_string(), false),
                ("a/b.py".to_string(), false),
                ("blog/models.py".to_string(), false),
                ("templates/apps.template.py".to_string(), true),
            ]
        );
        // A second pass yields the same sequence.
        assert_eq!(walker.files().count(), 4);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_not_followed() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().join("src");
        touch(&root, "real/file.py");
        let outside = tmp.path().join("outside");
        touch(&outside, "secret.py");
        std::os::unix::fs::symlink(&outside, root.join("escape")).unwrap();
        std::os::unix::fs::symlink(root.join("real/file.py"), root.join("alias.py")).unwrap();
        let cfg = config("package_name: p\n");
        let rels: Vec<String> = TreeWalker::new(&root, &cfg)
            .files()
            .map(|f| f.unwrap().rel_path)
            .collect();
        assert_eq!(rels, vec!["real/file.py".to_string()]);
    }

    #[test]
    fn test_nested_output_directory_is_pruned() {
        let tmp = tempdir().unwrap();
        let root = tmp.path();
        touch(root, "a.py");
        touch(root, "build/a.py");
        touch(root, "buildings/b.py");
        let cfg = config("package_name: p\n");
        let rels: Vec<String> = TreeWalker::new(root, &cfg)
            .skip_output(&root.join("build"))
            .files()
            .map(|f| f.unwrap().rel_path)
            .collect();
        assert_eq!(rels, vec!["a.py".to_string(), "buildings/b.py".to_string()]);

        // An output root outside the tree, or not created yet, prunes nothing.
        let n = TreeWalker::new(root, &cfg)
            .skip_output(&tmp.path().join("missing"))
            .files()
            .count();
        assert_eq!(n, 3);
    }

    #[test]
    fn test_missing_root_reports_walk_error() {
        let tmp = tempdir().unwrap();
        let cfg = config("package_name: p\n");
        let walker = TreeWalker::new(tmp.path().join("nope"), &cfg);
        let items: Vec<_> = walker.files().collect();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(FileError::Walk { .. })));
    }
}
