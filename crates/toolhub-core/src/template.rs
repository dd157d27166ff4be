//! Placeholder substitution for server command lines and environments.
//!
//! Two placeholder forms are recognised inside a template string:
//!
//! - `{{name}}` is replaced by the value bound to `name`, or by nothing when
//!   `name` is unbound.
//! - `{{?name:literal}}` is replaced by `literal` when the value bound to
//!   `name` equals `"true"` ignoring ASCII case, and by nothing otherwise.
//!
//! Names are `[A-Za-z0-9_]+`. Placeholders do not nest. A conditional's
//! literal ends at the first `}}`, so single braces inside it pass through.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{(?:\?([A-Za-z0-9_]+):((?s:.*?))|([A-Za-z0-9_]+))\}\}")
        .expect("placeholder pattern is a valid regex")
});

/// Outcome of a schema or template check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    /// A result with no errors.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    /// Valid exactly when `errors` is empty.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Append another result's errors, keeping order.
    pub fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
    }
}

/// Resolves templates against one immutable set of parameter bindings.
#[derive(Debug, Clone, Default)]
pub struct TemplateResolver {
    bindings: BTreeMap<String, String>,
}

impl TemplateResolver {
    pub fn new(bindings: BTreeMap<String, String>) -> Self {
        Self { bindings }
    }

    /// Substitute every placeholder in `template`.
    pub fn resolve(&self, template: &str) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures<'_>| {
                if let Some(name) = caps.get(3) {
                    return self.value(name.as_str()).to_string();
                }
                let name = caps.get(1).map_or("", |m| m.as_str());
                if is_truthy(self.value(name)) {
                    caps.get(2).map_or("", |m| m.as_str()).to_string()
                } else {
                    String::new()
                }
            })
            .into_owned()
    }

    /// Resolve each template and drop the ones that come out blank.
    ///
    /// Optional command-line flags written as templates disappear from the
    /// argument list instead of turning into empty arguments.
    pub fn resolve_list(&self, templates: &[String]) -> Vec<String> {
        templates
            .iter()
            .map(|template| self.resolve(template))
            .filter(|value| !value.trim().is_empty())
            .collect()
    }

    /// Resolve a map of templates (typically environment variables).
    ///
    /// Blank results are dropped. A result containing a comma is read as
    /// `KEY=value` pairs separated by commas; those pairs replace the
    /// original key. Segments without `=` or with a blank key are skipped;
    /// `KEY=` keeps `KEY` with an empty value.
    pub fn resolve_map(&self, templates: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut resolved = BTreeMap::new();
        for (key, template) in templates {
            let value = self.resolve(template);
            if value.trim().is_empty() {
                continue;
            }
            if !value.contains(',') {
                resolved.insert(key.clone(), value);
                continue;
            }
            for segment in value.split(',') {
                let Some((pair_key, pair_value)) = segment.split_once('=') else {
                    tracing::debug!(key = %key, segment, "skipping env segment without '='");
                    continue;
                };
                let (pair_key, pair_value) = (pair_key.trim(), pair_value.trim());
                if pair_key.is_empty() {
                    continue;
                }
                resolved.insert(pair_key.to_string(), pair_value.to_string());
            }
        }
        resolved
    }

    /// Check brace structure without resolving anything.
    pub fn validate(template: &str) -> ValidationResult {
        let bytes = template.as_bytes();
        let mut open = 0usize;
        let mut stray_closes = 0usize;
        let mut empty = false;
        let mut i = 0;
        while i + 1 < bytes.len() {
            match (bytes[i], bytes[i + 1]) {
                (b'{', b'{') => {
                    if bytes[i + 2..].starts_with(b"}}") {
                        empty = true;
                    }
                    open += 1;
                    i += 2;
                }
                (b'}', b'}') => {
                    if open > 0 {
                        open -= 1;
                    } else {
                        stray_closes += 1;
                    }
                    i += 2;
                }
                _ => i += 1,
            }
        }

        let mut errors = Vec::new();
        if open > 0 {
            errors.push(format!("Unmatched opening braces '{{{{' ({open})"));
        }
        if stray_closes > 0 {
            errors.push(format!("Unmatched closing braces '}}}}' ({stray_closes})"));
        }
        if empty {
            errors.push("Empty placeholder '{{}}'".to_string());
        }
        ValidationResult::from_errors(errors)
    }

    /// Names referenced by simple and conditional placeholders.
    pub fn extract_parameters(template: &str) -> BTreeSet<String> {
        PLACEHOLDER
            .captures_iter(template)
            .filter_map(|caps| caps.get(3).or_else(|| caps.get(1)))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn value(&self, name: &str) -> &str {
        self.bindings.get(name).map_or("", String::as_str)
    }
}

/// Only the literal `true` (any ASCII case) counts; `"1"` or `"yes"` do not.
fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(pairs: &[(&str, &str)]) -> TemplateResolver {
        TemplateResolver::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_simple_placeholder() {
        assert_eq!(resolver(&[("name", "John")]).resolve("Hello {{name}}"), "Hello John");
        assert_eq!(resolver(&[]).resolve("Hello {{name}}"), "Hello ");
    }

    #[test]
    fn test_repeated_placeholder_resolves_each_occurrence() {
        let r = resolver(&[("a", "x")]);
        assert_eq!(r.resolve("{{a}}-{{a}}"), "x-x");
        assert_eq!(r.resolve("{{a}}-{{a}}"), r.resolve("{{a}}-{{a}}"));
    }

    #[test]
    fn test_conditional_is_case_insensitive_true_only() {
        for value in ["true", "TRUE", "True", "tRuE"] {
            assert_eq!(
                resolver(&[("flag", value)]).resolve("{{?flag:--enabled}}"),
                "--enabled"
            );
        }
        for value in ["false", "yes", "1", "", " true"] {
            assert_eq!(resolver(&[("flag", value)]).resolve("{{?flag:--enabled}}"), "");
        }
        assert_eq!(resolver(&[]).resolve("{{?flag:--enabled}}"), "");
    }

    #[test]
    fn test_conditional_literal_keeps_single_braces() {
        let r = resolver(&[("json", "true")]);
        assert_eq!(r.resolve("{{?json:--format={value} x}}"), "--format={value} x");
    }

    #[test]
    fn test_unrecognised_forms_pass_through() {
        let r = resolver(&[("a", "x")]);
        assert_eq!(r.resolve("{{ a }} {{a-b}} {a}"), "{{ a }} {{a-b}} {a}");
    }

    #[test]
    fn test_resolve_list_drops_blank_entries() {
        let r = resolver(&[("a", "x"), ("flag", "no")]);
        let templates = vec![
            "{{a}}".to_string(),
            "{{missing}}".to_string(),
            "{{?flag:--verbose}}".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(r.resolve_list(&templates), vec!["x"]);
    }

    #[test]
    fn test_resolve_map_expands_comma_pairs() {
        let r = resolver(&[("a", "1"), ("b", "2")]);
        let templates = BTreeMap::from([("ENV".to_string(), "KEY1={{a}},KEY2={{b}}".to_string())]);
        let resolved = r.resolve_map(&templates);
        assert_eq!(
            resolved,
            BTreeMap::from([
                ("KEY1".to_string(), "1".to_string()),
                ("KEY2".to_string(), "2".to_string()),
            ])
        );
    }

    #[test]
    fn test_resolve_map_drops_blank_and_keeps_plain() {
        let r = resolver(&[("token", "abc")]);
        let templates = BTreeMap::from([
            ("TOKEN".to_string(), "{{token}}".to_string()),
            ("UNSET".to_string(), "{{nothing}}".to_string()),
            ("PAIRS".to_string(), " A = 1 , junk, =2".to_string()),
        ]);
        let resolved = r.resolve_map(&templates);
        assert_eq!(resolved.get("TOKEN").map(String::as_str), Some("abc"));
        assert_eq!(resolved.get("A").map(String::as_str), Some("1"));
        assert!(!resolved.contains_key("UNSET"));
        assert!(!resolved.contains_key("PAIRS"));
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_resolve_map_keeps_empty_pair_values() {
        let r = resolver(&[("a", ""), ("b", "2")]);
        let templates = BTreeMap::from([(
            "ENV".to_string(),
            "KEY1={{a}},KEY2={{b}}".to_string(),
        )]);
        let resolved = r.resolve_map(&templates);
        assert_eq!(resolved.get("KEY1").map(String::as_str), Some(""));
        assert_eq!(resolved.get("KEY2").map(String::as_str), Some("2"));
        assert!(!resolved.contains_key("ENV"));
    }

    #[test]
    fn test_validate_reports_brace_problems() {
        let open = TemplateResolver::validate("{{name");
        assert!(!open.is_valid);
        assert!(open.errors[0].contains("Unmatched opening braces"));

        let close = TemplateResolver::validate("name}}");
        assert!(!close.is_valid);
        assert!(close.errors[0].contains("Unmatched closing braces"));

        let empty = TemplateResolver::validate("{{}}");
        assert!(!empty.is_valid);
        assert!(empty.errors.iter().any(|e| e.contains("Empty placeholder")));

        assert!(TemplateResolver::validate("").is_valid);
        assert!(TemplateResolver::validate("{{?a:{value}}}").is_valid);
        assert!(TemplateResolver::validate("--root={{root}} {{?ro:--read-only}}").is_valid);
    }

    #[test]
    fn test_extract_parameters_collapses_duplicates() {
        let names = TemplateResolver::extract_parameters("{{a}} {{a}} {{?b:x}}");
        assert_eq!(names, BTreeSet::from(["a".to_string(), "b".to_string()]));
        assert!(TemplateResolver::extract_parameters("plain").is_empty());
    }

    #[test]
    fn test_validation_result_merge() {
        let mut result = ValidationResult::valid();
        result.merge(ValidationResult::from_errors(vec!["bad".to_string()]));
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["bad"]);
    }
}
