//! Rule schema: the raw form read from configuration and the compiled form
//! the engine applies.

use crate::error::ConfigError;
use crate::utils;
use glob::Pattern;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// What part of a file a rule rewrites.
pub enum Scope {
    #[default]
    #[serde(alias = "file-content")]
    Content,
    #[serde(alias = "file-path")]
    Path,
    Both,
}

impl Scope {
    pub fn touches_path(self) -> bool {
        matches!(self, Scope::Path | Scope::Both)
    }

    pub fn touches_content(self) -> bool {
        matches!(self, Scope::Content | Scope::Both)
    }

    pub fn label(self) -> &'static str {
        match self {
            Scope::Content => "content",
            Scope::Path => "path",
            Scope::Both => "both",
        }
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
/// A rule entry as written in the configuration file.
pub struct RawRule {
    pub search: Option<String>,
    pub replace: Option<String>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default, alias = "path_glob")]
    pub file_glob: Option<String>,
    /// Plain substring search instead of a regex.
    #[serde(default)]
    pub literal: bool,
    /// Regex selecting the regions the replacement is confined to.
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone)]
enum Matcher {
    Literal(String),
    Regex(Regex),
}

#[derive(Debug, Clone)]
/// A fully concrete rule: placeholders resolved and patterns compiled.
pub struct Rule {
    /// Position in the expanded rule list; the key used in statistics.
    pub index: usize,
    /// Position of the configuration entry this rule was expanded from.
    pub origin: usize,
    pub search: String,
    pub replace: String,
    pub scope: Scope,
    pub literal: bool,
    pub file_glob: Option<Pattern>,
    pub filter: Option<Regex>,
    matcher: Matcher,
}

/// Resolved pieces of one rule, before compilation.
pub struct RuleSource<'a> {
    pub index: usize,
    pub origin: usize,
    pub search: String,
    pub replace: String,
    pub scope: Scope,
    pub literal: bool,
    pub file_glob: Option<&'a str>,
    pub filter: Option<&'a str>,
}

impl Rule {
    /// Compile a rule. Invalid regexes and globs are configuration errors.
    pub fn compile(src: RuleSource<'_>) -> Result<Rule, ConfigError> {
        let field = |name: &str| format!("rules[{}].{}", src.origin, name);
        if src.search.is_empty() {
            return Err(ConfigError::missing(field("search")));
        }
        let matcher = if src.literal {
            Matcher::Literal(src.search.clone())
        } else {
            Matcher::Regex(Regex::new(&src.search).map_err(|e| ConfigError::InvalidRegex {
                field: field("search"),
                source: e,
            })?)
        };
        let file_glob = src
            .file_glob
            .map(|g| {
                Pattern::new(g).map_err(|e| ConfigError::InvalidGlob {
                    field: field("file_glob"),
                    pattern: g.to_string(),
                    source: e,
                })
            })
            .transpose()?;
        let filter = src
            .filter
            .map(|f| {
                // Filter regions may span lines: `.` also matches `\n`.
                RegexBuilder::new(f)
                    .dot_matches_new_line(true)
                    .build()
                    .map_err(|e| ConfigError::InvalidRegex {
                        field: field("filter"),
                        source: e,
                    })
            })
            .transpose()?;
        Ok(Rule {
            index: src.index,
            origin: src.origin,
            search: src.search,
            replace: src.replace,
            scope: src.scope,
            literal: src.literal,
            file_glob,
            filter,
            matcher,
        })
    }

    /// Whether the rule's glob admits the file at `rel` (source path).
    pub fn applies_to(&self, rel: &str) -> bool {
        self.file_glob
            .as_ref()
            .map_or(true, |g| utils::glob_matches(g, rel))
    }

    /// Replace every match in `text`, returning the new text and the number
    /// of replacements made.
    pub fn apply<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        let Some(filter) = self.filter.as_ref() else {
            return self.replace_all(text);
        };
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut total = 0;
        for region in filter.find_iter(text) {
            out.push_str(&text[last..region.start()]);
            let (replaced, n) = self.replace_all(region.as_str());
            out.push_str(&replaced);
            total += n;
            last = region.end();
        }
        if total == 0 {
            return (Cow::Borrowed(text), 0);
        }
        out.push_str(&text[last..]);
        (Cow::Owned(out), total)
    }

    fn replace_all<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        match &self.matcher {
            Matcher::Literal(needle) => {
                let n = text.matches(needle.as_str()).count();
                if n == 0 {
                    (Cow::Borrowed(text), 0)
                } else {
                    (Cow::Owned(text.replace(needle.as_str(), &self.replace)), n)
                }
            }
            Matcher::Regex(re) => {
                let n = re.find_iter(text).count();
                if n == 0 {
                    (Cow::Borrowed(text), 0)
                } else {
                    (re.replace_all(text, self.replace.as_str()), n)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule(search: &str, replace: &str, literal: bool) -> Rule {
        Rule::compile(RuleSource {
            index: 0,
            origin: 0,
            search: search.into(),
            replace: replace.into(),
            scope: Scope::Content,
            literal,
            file_glob: None,
            filter: None,
        })
        .unwrap()
    }

    #[test]
    fn test_global_replacement_counts_every_match() {
        let r = rule("blog", "wagtail_dsfr_blog", false);
        let (out, n) = r.apply("blog/ blog.models blog");
        assert_eq!(n, 3);
        assert_eq!(out, "wagtail_dsfr_blog/ wagtail_dsfr_blog.models wagtail_dsfr_blog");
    }

    #[test]
    fn test_literal_does_not_interpret_regex() {
        let r = rule("a.b", "$1", true);
        let (out, n) = r.apply("a.b axb");
        assert_eq!(n, 1);
        assert_eq!(out, "$1 axb");
    }

    #[test]
    fn test_regex_group_references() {
        let r = rule(r#"from (\w+)\.models"#, "from wagtail_dsfr.${1}.models", false);
        let (out, _) = r.apply("from blog.models import X");
        assert_eq!(out, "from wagtail_dsfr.blog.models import X");
    }

    #[test]
    fn test_no_match_borrows_input() {
        let r = rule("absent", "x", false);
        let (out, n) = r.apply("nothing here");
        assert_eq!(n, 0);
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn test_filter_confines_replacement() {
        let mut r = rule("blog", "news", true);
        r.filter = Some(Regex::new(r"INSTALLED_APPS = \[[^\]]*\]").unwrap());
        let text = "blog = 1\nINSTALLED_APPS = [\"blog\", \"events\"]\n";
        let (out, n) = r.apply(text);
        assert_eq!(n, 1);
        assert_eq!(out, "blog = 1\nINSTALLED_APPS = [\"news\", \"events\"]\n");
    }

    #[test]
    fn test_filter_region_spans_lines() {
        let r = Rule::compile(RuleSource {
            index: 0,
            origin: 0,
            search: "blog_".into(),
            replace: "p_blog_".into(),
            scope: Scope::Content,
            literal: true,
            file_glob: None,
            filter: Some(r"class Meta:.*db_table[^\n]*"),
        })
        .unwrap();
        let text = "blog_id = 1\nclass Meta:\n    db_table = 'blog_x'\n";
        let (out, n) = r.apply(text);
        assert_eq!(n, 1);
        assert_eq!(out, "blog_id = 1\nclass Meta:\n    db_table = 'p_blog_x'\n");
    }

    #[test]
    fn test_invalid_regex_names_field() {
        let err = Rule::compile(RuleSource {
            index: 4,
            origin: 2,
            search: "(unclosed".into(),
            replace: String::new(),
            scope: Scope::Content,
            literal: false,
            file_glob: None,
            filter: None,
        })
        .unwrap_err();
        assert!(err.to_string().starts_with("rules[2].search"));
    }

    #[test]
    fn test_scope_aliases_deserialize() {
        let s: Scope = serde_yaml::from_str("file-path").unwrap();
        assert_eq!(s, Scope::Path);
        let s: Scope = serde_yaml::from_str("both").unwrap();
        assert!(s.touches_content() && s.touches_path());
    }
}
