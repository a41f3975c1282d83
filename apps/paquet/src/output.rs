//! Output rendering for `apply` and `rules`.
//!
//! Supports `human` (default) and `json` outputs. The JSON form is the
//! serialized run report plus optional diffs; human output lists changed
//! files, errors, dead rules and a closing summary line.

use crate::config::Config;
use crate::diff::FileDiff;
use crate::models::report::RunReport;
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;

fn use_colors(output: &str) -> bool {
    output != "json" && crate::utils::use_colors()
}

fn print_json(value: &JsonVal) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("{} cannot serialize output: {e}", crate::utils::error_prefix()),
    }
}

/// Print an `apply` report (and diffs, if any) in the requested format.
pub fn print_report(report: &RunReport, diffs: &[FileDiff], output: &str) {
    if output == "json" {
        print_json(&compose_report_json(report, diffs));
        return;
    }
    let color = use_colors(output);
    let verb = if report.written { "wrote" } else { "would write" };

    for f in report.changed_files() {
        let what = if f.renamed {
            format!("{} -> {}", f.source, f.target)
        } else {
            f.source.clone()
        };
        if color {
            println!("{} {}", format!("{verb}:").green().bold(), what.bold());
        } else {
            println!("{verb}: {what}");
        }
    }

    for d in diffs {
        match &d.unified {
            Some(text) => print!("{}", colorize_diff(text, color)),
            None if color => println!(
                "{} {} -> {}",
                "binary:".cyan().bold(),
                d.source,
                d.target
            ),
            None => println!("binary: {} -> {}", d.source, d.target),
        }
    }

    for t in &report.skipped_templates {
        if color {
            println!("{} {}", "skipped template:".bright_black(), t);
        } else {
            println!("skipped template: {t}");
        }
    }

    for r in report.dead_rules() {
        eprintln!(
            "{} rule #{} ({:?} -> {:?}) matched nothing",
            crate::utils::warn_prefix(),
            r.index,
            r.search,
            r.replace
        );
    }

    for e in &report.errors {
        eprintln!("{} {}", crate::utils::error_prefix(), e.message);
    }

    let s = &report.summary;
    let summary = if report.written {
        format!(
            "Summary: visited={} changed={} written={} errors={} skipped_templates={}",
            s.visited, s.changed, s.written, s.errors, s.skipped_templates
        )
    } else {
        format!(
            "Summary (dry run): visited={} changed={} errors={} skipped_templates={}",
            s.visited, s.changed, s.errors, s.skipped_templates
        )
    };
    if color {
        println!("{}", summary.bold());
    } else {
        println!("{summary}");
    }
}

fn colorize_diff(text: &str, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    for line in text.split_inclusive('\n') {
        let painted = if line.starts_with("+++") || line.starts_with("---") {
            line.bold().to_string()
        } else if line.starts_with('+') {
            line.green().to_string()
        } else if line.starts_with('-') {
            line.red().to_string()
        } else if line.starts_with("@@") {
            line.cyan().to_string()
        } else {
            line.to_string()
        };
        out.push_str(&painted);
    }
    out
}

/// Compose the `apply` JSON object (pure) for testing/snapshot purposes.
pub fn compose_report_json(report: &RunReport, diffs: &[FileDiff]) -> JsonVal {
    let mut out = serde_json::to_value(report).unwrap_or(JsonVal::Null);
    if !diffs.is_empty() {
        if let Some(obj) = out.as_object_mut() {
            obj.insert(
                "diffs".into(),
                serde_json::to_value(diffs).unwrap_or(JsonVal::Null),
            );
        }
    }
    out
}

/// Print the concrete rule list and placeholder table of `config`.
pub fn print_rules(config: &Config, output: &str) {
    if output == "json" {
        print_json(&compose_rules_json(config));
        return;
    }
    let color = use_colors(output);
    let header = format!(
        "{} ({})",
        config.package_name, config.package_verbose_name
    );
    if color {
        println!("{}", header.bold());
    } else {
        println!("{header}");
    }
    if !config.excluded_apps.is_empty() {
        let dropped: Vec<&str> = config.excluded_apps.iter().map(String::as_str).collect();
        println!("excluded apps: {}", dropped.join(", "));
    }
    for r in &config.rules {
        let mut line = format!(
            "#{} [{}] {:?} -> {:?}",
            r.index,
            r.scope.label(),
            r.search,
            r.replace
        );
        if r.literal {
            line.push_str(" literal");
        }
        if let Some(g) = &r.file_glob {
            line.push_str(&format!(" glob={}", g.as_str()));
        }
        if let Some(f) = &r.filter {
            line.push_str(&format!(" filter={:?}", f.as_str()));
        }
        println!("{line}");
    }
    for (name, value) in config.placeholders.iter() {
        if color {
            println!("{} = {}", format!("{{{name}}}").cyan(), value);
        } else {
            println!("{{{name}}} = {value}");
        }
    }
}

/// Compose the `rules` JSON object (pure).
pub fn compose_rules_json(config: &Config) -> JsonVal {
    let rules: Vec<_> = config
        .rules
        .iter()
        .map(|r| {
            json!({
                "index": r.index,
                "origin": r.origin,
                "search": r.search,
                "replace": r.replace,
                "scope": r.scope,
                "literal": r.literal,
                "file_glob": r.file_glob.as_ref().map(|g| g.as_str()),
                "filter": r.filter.as_ref().map(|f| f.as_str()),
            })
        })
        .collect();
    let placeholders: serde_json::Map<String, JsonVal> = config
        .placeholders
        .iter()
        .map(|(k, v)| (k.to_string(), JsonVal::String(v.to_string())))
        .collect();
    json!({
        "package_name": config.package_name,
        "package_verbose_name": config.package_verbose_name,
        "included_apps": config.included_apps,
        "excluded_apps": config.excluded_apps,
        "rules": rules,
        "placeholders": placeholders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{from_raw, parse_raw, Overrides};
    use crate::models::report::{Failure, FileReport, RuleStats, Summary};
    use crate::models::rule::Scope;
    use crate::models::{FileKind, RuleHit};
    use std::path::Path;

    fn report() -> RunReport {
        RunReport {
            written: false,
            summary: Summary {
                visited: 2,
                changed: 1,
                errors: 1,
                written: 0,
                skipped_templates: 0,
            },
            files: vec![FileReport {
                source: "blog/a.py".into(),
                target: "pkg/blog/a.py".into(),
                kind: FileKind::Text,
                changed: true,
                renamed: true,
                hits: vec![RuleHit { rule: 0, matches: 1 }],
            }],
            rules: vec![RuleStats {
                index: 0,
                origin: 0,
                search: "^blog/".into(),
                replace: "pkg/blog/".into(),
                scope: Scope::Path,
                applications: 2,
                files_matched: 1,
                matches: 1,
            }],
            skipped_templates: vec![],
            errors: vec![Failure {
                path: "b.py".into(),
                message: "cannot read b.py".into(),
            }],
        }
    }

    #[test]
    fn test_compose_report_json_shape() {
        let out = compose_report_json(&report(), &[]);
        assert_eq!(out["written"], false);
        assert_eq!(out["summary"]["changed"], 1);
        assert_eq!(out["files"][0]["kind"], "text");
        assert_eq!(out["rules"][0]["scope"], "path");
        assert_eq!(out["errors"][0]["path"], "b.py");
        assert!(out.get("diffs").is_none());
    }

    #[test]
    fn test_compose_report_json_with_diffs() {
        let diffs = vec![FileDiff {
            source: "blog/a.py".into(),
            target: "pkg/blog/a.py".into(),
            unified: None,
        }];
        let out = compose_report_json(&report(), &diffs);
        assert_eq!(out["diffs"][0]["target"], "pkg/blog/a.py");
        assert!(out["diffs"][0]["unified"].is_null());
    }

    #[test]
    fn test_colorize_diff_is_identity_without_color() {
        let text = "--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n";
        assert_eq!(colorize_diff(text, false), text);
    }

    #[test]
    fn test_compose_rules_json_lists_expanded_rules() {
        let raw = parse_raw(
            "package_name: wagtail_dsfr\napps: [blog, events]\nrules:\n  - search: '{app}'\n    replace: '{package_name}_{app}'\n",
            Path::new("c.yml"),
        )
        .unwrap();
        let cfg = from_raw(raw, &Overrides::default()).unwrap();
        let out = compose_rules_json(&cfg);
        assert_eq!(out["rules"][0]["replace"], "wagtail_dsfr_blog");
        assert_eq!(out["rules"][1]["replace"], "wagtail_dsfr_events");
        assert_eq!(out["rules"][1]["origin"], 0);
        assert_eq!(out["placeholders"]["package_name_upper"], "WAGTAIL_DSFR");
    }
}
