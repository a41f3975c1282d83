//! Rule application on one file.
//!
//! Path-scope rules rewrite the relative path string, content-scope rules
//! the decoded text, and `both` rules each of them independently. Rules run
//! in declaration order, so later rules see earlier rewrites. A rule whose
//! `file_glob` rejects the source path is skipped and leaves no hit.

use crate::config::Config;
use crate::models::rule::Rule;
use crate::models::{FileKind, RuleHit, TransformJob, TransformResult};
use std::borrow::Cow;
use tracing::debug;

/// Transform a plain (non-template) file.
pub fn apply(job: TransformJob, config: &Config) -> TransformResult {
    let rel = job.rel_path.as_str();
    let text = if config.is_text_candidate(rel) {
        std::str::from_utf8(&job.bytes).ok()
    } else {
        None
    };
    let kind = if text.is_some() {
        FileKind::Text
    } else {
        FileKind::Binary
    };

    let mut path: Cow<'_, str> = Cow::Borrowed(rel);
    let mut content: Option<Cow<'_, str>> = text.map(Cow::Borrowed);
    let mut hits = Vec::new();

    for rule in config.rules.iter().filter(|r| r.applies_to(rel)) {
        let on_path = rule.scope.touches_path();
        let on_content = rule.scope.touches_content() && content.is_some();
        if !on_path && !on_content {
            continue;
        }
        let mut matches = 0;
        if on_path {
            matches += rewrite(rule, &mut path);
        }
        if let (true, Some(c)) = (on_content, content.as_mut()) {
            matches += rewrite(rule, c);
        }
        hits.push(RuleHit {
            rule: rule.index,
            matches,
        });
    }

    let target = path.into_owned();
    let output = match content {
        Some(Cow::Owned(s)) => s.into_bytes(),
        _ => job.bytes.clone(),
    };
    if target != job.rel_path || output != job.bytes {
        debug!(
            "{} -> {} ({} rule hit(s))",
            job.rel_path,
            target,
            hits.iter().filter(|h| h.matches > 0).count()
        );
    }
    TransformResult {
        source: job.rel_path,
        target,
        kind,
        original: job.bytes,
        output,
        hits,
        error: None,
        target_exists: false,
    }
}

fn rewrite(rule: &Rule, unit: &mut Cow<'_, str>) -> usize {
    let (next, n) = rule.apply(unit);
    if n > 0 {
        let owned = next.into_owned();
        *unit = Cow::Owned(owned);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{from_raw, parse_raw, Overrides};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn config(yaml: &str) -> Config {
        let raw = parse_raw(yaml, Path::new("c.yml")).unwrap();
        from_raw(raw, &Overrides::default()).unwrap()
    }

    fn job(rel: &str, bytes: &[u8]) -> TransformJob {
        TransformJob {
            rel_path: rel.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn test_global_replacement_and_count() {
        let cfg = config(
            "package_name: wagtail_dsfr\nrules:\n  - search: blog\n    replace: '{package_name}_blog'\n",
        );
        let res = apply(job("blog/views.py", b"import blog\nblog.x = blog\n"), &cfg);
        assert_eq!(
            String::from_utf8(res.output).unwrap(),
            "import wagtail_dsfr_blog\nwagtail_dsfr_blog.x = wagtail_dsfr_blog\n"
        );
        assert_eq!(res.hits, vec![RuleHit { rule: 0, matches: 3 }]);
        // Content scope leaves the path alone.
        assert_eq!(res.target, "blog/views.py");
        assert_eq!(res.kind, FileKind::Text);
    }

    #[test]
    fn test_path_scope_never_touches_content() {
        let cfg = config(
            "package_name: wagtail_dsfr\nrules:\n  - search: '^blog/'\n    replace: '{package_name}/blog/'\n    scope: path\n",
        );
        let res = apply(job("blog/models.py", b"from blog import x\n"), &cfg);
        assert_eq!(res.target, "wagtail_dsfr/blog/models.py");
        assert_eq!(res.output, b"from blog import x\n".to_vec());
        assert!(res.renamed());
        assert!(!res.content_changed());
    }

    #[test]
    fn test_both_scope_sums_matches() {
        let cfg = config("package_name: p\nrules:\n  - search: old\n    replace: new\n    scope: both\n");
        let res = apply(job("old/old.txt", b"old"), &cfg);
        assert_eq!(res.target, "new/new.txt");
        assert_eq!(res.output, b"new".to_vec());
        assert_eq!(res.hits, vec![RuleHit { rule: 0, matches: 3 }]);
    }

    #[test]
    fn test_glob_restricted_rule_records_nothing_elsewhere() {
        let cfg = config(
            "package_name: p\nrules:\n  - search: name\n    replace: label\n    file_glob: '*/apps.py'\n  - search: zzz\n    replace: y\n",
        );
        let other = apply(job("blog/models.py", b"name"), &cfg);
        assert_eq!(other.hits, vec![RuleHit { rule: 1, matches: 0 }]);
        assert_eq!(other.output, b"name".to_vec());
        let apps = apply(job("blog/apps.py", b"name"), &cfg);
        assert_eq!(
            apps.hits,
            vec![RuleHit { rule: 0, matches: 1 }, RuleHit { rule: 1, matches: 0 }]
        );
    }

    #[test]
    fn test_rules_chain_in_order() {
        let cfg = config(
            "package_name: p\nrules:\n  - search: a\n    replace: b\n  - search: b\n    replace: c\n",
        );
        let res = apply(job("f.txt", b"ab"), &cfg);
        assert_eq!(res.output, b"cc".to_vec());
        assert_eq!(
            res.hits,
            vec![RuleHit { rule: 0, matches: 1 }, RuleHit { rule: 1, matches: 2 }]
        );
    }

    #[test]
    fn test_binary_gets_path_rules_only() {
        let cfg = config(
            "package_name: p\nrules:\n  - search: logo\n    replace: brand\n  - search: logo\n    replace: brand\n    scope: path\n",
        );
        let bytes = [0xff, 0xfe, b'l', b'o', b'g', b'o'];
        let res = apply(job("static/logo.png", &bytes), &cfg);
        assert_eq!(res.kind, FileKind::Binary);
        assert_eq!(res.output, bytes.to_vec());
        assert_eq!(res.target, "static/brand.png");
        // The content-only rule was not applied, so it has no hit.
        assert_eq!(res.hits, vec![RuleHit { rule: 1, matches: 1 }]);
    }

    #[test]
    fn test_text_extensions_limit_content_rules() {
        let cfg = config(
            "package_name: p\ntext_extensions: ['.py']\nrules:\n  - search: blog\n    replace: news\n",
        );
        let res = apply(job("README.md", b"blog"), &cfg);
        assert_eq!(res.kind, FileKind::Binary);
        assert!(!res.changed());
    }
}
