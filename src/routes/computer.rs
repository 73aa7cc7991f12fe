use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use regex::{Captures, Regex};
use tracing::debug;
use super::options::{ActionParam, ControllerSpecs, RouteOptions};

/// Placeholder names carrying this marker survive expansion verbatim.
pub const FUZZ_MARKER: &str = "_FUZZ_";
/// Controllers or actions carrying this marker are accepted without lookup.
pub const FUZZABLE_MARKER: &str = "_FUZZ_FUZZABLE_";

const OPTIONAL_SUFFIX: &str = "~optional~";

// 1-9: a named group `(?:/?(?P<name>body))?`, 10: leading `#^`,
// 11: trailing `[/]*$#`, 12: the whole-root form `/*$#`.
static ROUTE_SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\(\?:)(/?)(\(\?P<)([^>]*)(>)(([^|)]*\|?)*)(\){2})(\??)|(#\^)|(\[/\]\*\$#)|(/\*\$#)")
        .expect("route syntax pattern is valid")
});

/// Turns a route regex into a placeholder path, e.g.
/// `#^/(?:(?P<controller>[^/]+))[/]*$#` becomes `/~controller~/`.
pub fn normalize(pattern: &str) -> String {
    ROUTE_SYNTAX
        .replace_all(pattern, |caps: &Captures| {
            let mut out = String::new();
            if let Some(slash) = caps.get(2) {
                out.push_str(slash.as_str());
            }

            let body = caps.get(6).map(|m| m.as_str());
            match (body, caps.get(4)) {
                (Some(body), _) if body.contains('|') && !body.contains('{') => {
                    out.push('~');
                    out.push_str(body);
                    out.push('~');
                }
                (_, Some(name)) => {
                    out.push('~');
                    out.push_str(name.as_str().trim_matches('_'));
                    out.push('~');
                }
                _ => {}
            }

            if caps.get(9).map(|m| m.as_str()) == Some("?") {
                out.push_str("optional~");
            }
            if caps.get(11).is_some() || caps.get(12).is_some() {
                out.push('/');
            }
            out
        })
        .into_owned()
}

/// Expands every placeholder of a normalized path into concrete values.
///
/// Only the leftmost placeholder is resolved per call; the rest is handled by
/// recursion on each substituted path.
pub fn expand(path: &str, options: &RouteOptions) -> Vec<String> {
    let mut segments: Vec<String> = path.split('/').map(String::from).collect();
    if !segments.iter().any(|s| s.contains('~')) {
        return vec![path.to_string()];
    }
    let Some(index) = segments.iter().position(|s| s.starts_with('~')) else {
        return Vec::new();
    };

    let section = segments[index].clone();
    let mut paths = Vec::new();

    if let Some(required) = section.strip_suffix(OPTIONAL_SUFFIX) {
        let mut omitted = segments[..index].to_vec();
        omitted.push(String::new());
        paths.extend(expand(&omitted.join("/"), options));

        segments[index] = required.to_string();
        paths.extend(expand(&segments.join("/"), options));
        return paths;
    }

    let name = section.trim_matches('~');
    if name.contains('|') {
        for alternative in name.split('|') {
            segments[index] = alternative.to_string();
            paths.extend(expand(&segments.join("/"), options));
        }
    } else if let Some(option) = options.get(name) {
        let narrows_action = name == "controller"
            && segments.get(index + 1).map(String::as_str) == Some("~action~");
        for value in option.values() {
            let next: Cow<RouteOptions> = if narrows_action {
                Cow::Owned(options.narrowed_to(&value))
            } else {
                Cow::Borrowed(options)
            };
            segments[index] = value;
            paths.extend(expand(&segments.join("/"), &next));
        }
    } else if name.contains(FUZZ_MARKER) {
        segments[index] = name.to_string();
        paths.extend(expand(&segments.join("/"), options));
    } else {
        debug!(placeholder = %name, path = %path, "Dropping path with unresolved placeholder");
    }

    paths
}

/// Number of leading parameters that must be present.
fn required_arguments(params: &[ActionParam]) -> usize {
    params.iter().take_while(|p| !p.optional).count()
}

/// Whether `/controller/action/args...` can reach an existing action with
/// enough arguments.
pub fn is_path_possible(path: &str, specs: &ControllerSpecs) -> bool {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 3 {
        return false;
    }
    let (controller, action) = (parts[1], parts[2]);
    let arguments = parts[3..].iter().filter(|s| !s.is_empty()).count();

    if controller.contains(FUZZABLE_MARKER) {
        return true;
    }
    let Some(actions) = specs.get(controller) else {
        return false;
    };
    if action.contains(FUZZABLE_MARKER) {
        return true;
    }
    let Some(params) = actions.get(action) else {
        return false;
    };
    arguments >= required_arguments(params)
}

pub struct RouteComputer {
    options: RouteOptions,
    specs: ControllerSpecs,
}

impl RouteComputer {
    pub fn new(options: RouteOptions) -> Self {
        let specs = options.effective_specs();
        Self { options, specs }
    }

    pub fn parse_single(&self, pattern: &str) -> Vec<String> {
        let normalized = normalize(pattern);
        expand(&normalized, &self.options)
            .into_iter()
            .filter(|path| is_path_possible(path, &self.specs))
            .collect()
    }

    /// Deduplicated set of concrete paths reachable from all `patterns`.
    pub fn parse_all<S: AsRef<str>>(&self, patterns: &[S]) -> Vec<String> {
        let mut all = BTreeSet::new();
        for pattern in patterns {
            let paths = self.parse_single(pattern.as_ref());
            debug!(pattern = %pattern.as_ref(), paths = paths.len(), "Expanded route");
            all.extend(paths);
        }
        all.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::options::RouteOption;
    use std::collections::BTreeMap;

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize("#^/*$#"), "/");
    }

    #[test]
    fn test_normalize_literal_path() {
        assert_eq!(normalize("#^/events[/]*$#"), "/events/");
    }

    #[test]
    fn test_normalize_named_group() {
        assert_eq!(normalize("#^/(?:(?P<controller>[^/]+))[/]*$#"), "/~controller~/");
    }

    #[test]
    fn test_normalize_alternation_and_optional_args() {
        let pattern = "#^/admin(?:/(?P<plugin>aad_auth|sys_log))/(?:(?P<controller>[^/]+))/(?:(?P<action>[^/]+))(?:/(?P<_args_>.*))?[/]*$#";
        assert_eq!(
            normalize(pattern),
            "/admin/~aad_auth|sys_log~/~controller~/~action~/~args~optional~/"
        );
    }

    #[test]
    fn test_expand_static() {
        assert_eq!(expand("/", &RouteOptions::new()), vec!["/"]);
    }

    #[test]
    fn test_expand_unresolved_placeholder_dropped() {
        assert!(expand("/~controller~/", &RouteOptions::new()).is_empty());
    }

    #[test]
    fn test_expand_values() {
        let options = RouteOptions::new().with_values("controller", &["c1", "c2"]);
        assert_eq!(expand("/~controller~/", &options), vec!["/c1/", "/c2/"]);
    }

    #[test]
    fn test_expand_narrows_actions_per_controller() {
        let options = RouteOptions::new()
            .with_values("controller", &["c1", "c2"])
            .with_actions(&[("c1", &["a1", "a2"]), ("c2", &["a3", "a4"])]);
        let mut paths = expand("/admin/~controller~/~action~/~args~optional~/", &options);
        paths.sort();
        assert_eq!(
            paths,
            vec!["/admin/c1/a1/", "/admin/c1/a2/", "/admin/c2/a3/", "/admin/c2/a4/"]
        );
    }

    #[test]
    fn test_expand_alternation() {
        let paths = expand("/~a|b~/x", &RouteOptions::new());
        assert_eq!(paths, vec!["/a/x", "/b/x"]);
    }

    #[test]
    fn test_expand_keeps_fuzz_marker_placeholder() {
        let paths = expand("/~_FUZZ_FUZZABLE_0_~/", &RouteOptions::new());
        assert_eq!(paths, vec!["/_FUZZ_FUZZABLE_0_/"]);
    }

    #[test]
    fn test_expand_optional_fuzzable_args() {
        let mut options = RouteOptions::new();
        options.groups.insert(
            "args".to_string(),
            RouteOption::Values(vec!["~_FUZZ_FUZZABLE_1_~optional~/1/2".to_string()]),
        );
        let mut paths = expand("/c/a/~args~optional~", &options);
        paths.sort();
        assert_eq!(paths, vec!["/c/a/", "/c/a/", "/c/a/_FUZZ_FUZZABLE_1_/1/2"]);
    }

    #[test]
    fn test_required_arguments_stop_at_first_optional() {
        let params = vec![
            ActionParam { name: "id".into(), optional: false },
            ActionParam { name: "slug".into(), optional: true },
            ActionParam { name: "page".into(), optional: false },
        ];
        assert_eq!(required_arguments(&params), 1);
    }

    #[test]
    fn test_pruning() {
        let mut specs = ControllerSpecs::new();
        let mut actions = BTreeMap::new();
        actions.insert(
            "view".to_string(),
            vec![ActionParam { name: "id".into(), optional: false }],
        );
        specs.insert("Posts".to_string(), actions);

        assert!(!is_path_possible("/", &specs));
        assert!(!is_path_possible("/Posts/view/", &specs));
        assert!(is_path_possible("/Posts/view/1", &specs));
        assert!(!is_path_possible("/Posts/edit/1", &specs));
        assert!(!is_path_possible("/Ghost/view/1", &specs));
        assert!(is_path_possible("/Posts/_FUZZ_FUZZABLE_0_/", &specs));
        assert!(is_path_possible("/_FUZZ_FUZZABLE_0_/x/", &specs));
    }

    #[test]
    fn test_parse_all_controller_action() {
        let options = RouteOptions::new()
            .with_values("controller", &["Users"])
            .with_actions(&[("Users", &["login"])]);
        let computer = RouteComputer::new(options);
        let paths = computer.parse_all(&[
            "#^/(?:(?P<controller>[^/]+))/(?:(?P<action>[^/]+))[/]*$#",
            "#^/(?:(?P<controller>[^/]+))/(?:(?P<action>[^/]+))[/]*$#",
        ]);
        assert_eq!(paths, vec!["/Users/login/"]);
    }
}
