use apicov_core::DeclaredOperation;
use regex::Regex;
use std::sync::Arc;
use tracing::warn;

use crate::SpecCatalog;

/// A compiled path template.
///
/// `{name}` placeholders match one non-empty run of characters other than
/// `/`; everything else is literal and case-sensitive. Matching is anchored
/// at both ends.
#[derive(Debug, Clone)]
pub struct PathTemplate {
    template: String,
    pattern: TemplatePattern,
}

#[derive(Debug, Clone)]
enum TemplatePattern {
    Regex(Regex),
    Exact,
}

impl PathTemplate {
    pub fn compile(template: &str) -> Self {
        let pattern = match Regex::new(&template_regex(template)) {
            Ok(re) => TemplatePattern::Regex(re),
            Err(e) => {
                warn!(template, error = %e, "Falling back to exact match for path template");
                TemplatePattern::Exact
            }
        };
        Self {
            template: template.to_string(),
            pattern,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn matches(&self, path: &str) -> bool {
        match &self.pattern {
            TemplatePattern::Regex(re) => re.is_match(path),
            TemplatePattern::Exact => self.template == path,
        }
    }
}

/// Translate a template into an anchored regular expression.
fn template_regex(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    out.push('^');
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|c| open + c) else {
            break;
        };
        let name = &rest[open + 1..close];
        if name.is_empty() || name.contains('/') {
            out.push_str(&regex::escape(&rest[..=open]));
            rest = &rest[open + 1..];
            continue;
        }
        out.push_str(&regex::escape(&rest[..open]));
        out.push_str("[^/]+");
        rest = &rest[close + 1..];
    }
    out.push_str(&regex::escape(rest));
    out.push('$');
    out
}

/// Match concrete request paths against every template of a catalog.
///
/// Templates are compiled once; matching only reads immutable state and is
/// safe to share across threads.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    catalog: Arc<SpecCatalog>,
    templates: Vec<PathTemplate>,
}

impl PathMatcher {
    pub fn new(catalog: Arc<SpecCatalog>) -> Self {
        let templates = catalog
            .list_operations()
            .iter()
            .map(|op| PathTemplate::compile(&op.path_template))
            .collect();
        Self { catalog, templates }
    }

    pub fn catalog(&self) -> &Arc<SpecCatalog> {
        &self.catalog
    }

    /// Every declared operation (any method) whose template matches `path`,
    /// in catalog order.
    pub fn match_path(&self, path: &str) -> Vec<&DeclaredOperation> {
        self.catalog
            .list_operations()
            .iter()
            .zip(&self.templates)
            .filter(|(_, template)| template.matches(path))
            .map(|(op, _)| op)
            .collect()
    }

    /// First operation in catalog order matching both `method` and `path`.
    pub fn match_operation(&self, method: &str, path: &str) -> Option<&DeclaredOperation> {
        let method = method.trim().to_ascii_uppercase();
        self.catalog
            .list_operations()
            .iter()
            .zip(&self.templates)
            .find(|(op, template)| op.method.as_str() == method && template.matches(path))
            .map(|(op, _)| op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apicov_core::HttpMethod;

    fn matches(template: &str, path: &str) -> bool {
        PathTemplate::compile(template).matches(path)
    }

    #[test]
    fn single_parameter_matches_exactly_one_segment() {
        assert!(matches("/users/{id}", "/users/123"));
        assert!(!matches("/users/{id}", "/users"));
        assert!(!matches("/users/{id}", "/users/"));
        assert!(!matches("/users/{id}", "/users/123/posts"));
    }

    #[test]
    fn root_matches_only_root() {
        assert!(matches("/", "/"));
        assert!(!matches("/", "/users"));
        assert!(!matches("/", ""));
    }

    #[test]
    fn literals_are_case_sensitive_and_regex_safe() {
        assert!(!matches("/Users", "/users"));
        assert!(matches("/v1.0/items", "/v1.0/items"));
        assert!(!matches("/v1.0/items", "/v1x0/items"));
        assert!(matches("/search+all", "/search+all"));
    }

    #[test]
    fn parameters_inside_segments() {
        assert!(matches("/files/{name}.json", "/files/report.json"));
        assert!(!matches("/files/{name}.json", "/files/.json"));
        assert!(matches("/a/{x}-{y}", "/a/1-2"));
    }

    #[test]
    fn unbalanced_braces_stay_literal() {
        assert!(matches("/odd/{id", "/odd/{id"));
        assert!(matches("/odd/{}", "/odd/{}"));
    }

    #[test]
    fn match_path_returns_all_methods_in_catalog_order() {
        let catalog = Arc::new(SpecCatalog::from_operations(vec![
            DeclaredOperation::new(HttpMethod::Get, "/users/{id}"),
            DeclaredOperation::new(HttpMethod::Get, "/users/me"),
            DeclaredOperation::new(HttpMethod::Delete, "/users/{id}"),
        ]));
        let matcher = PathMatcher::new(catalog);

        let found: Vec<String> = matcher
            .match_path("/users/me")
            .iter()
            .map(|op| op.to_string())
            .collect();
        assert_eq!(
            found,
            vec!["GET /users/{id}", "GET /users/me", "DELETE /users/{id}"]
        );
        assert!(matcher.match_path("/accounts").is_empty());

        let first = matcher.match_operation("get", "/users/me").unwrap();
        assert_eq!(first.path_template, "/users/{id}");
        assert!(matcher.match_operation("PUT", "/users/me").is_none());
    }
}
