//! Search parameter matching.
//!
//! Leaf stores resolve `_id` themselves and hand every other parameter to a
//! [`ResourceMatcher`]. The matcher decides what a parameter name and its
//! values mean for a given resource; the stores only combine the answers
//! with AND.

use serde_json::Value;

use crate::types::{Resource, SearchQuery};

/// Decides whether a resource satisfies one search parameter.
pub trait ResourceMatcher: Send + Sync {
    /// Returns `true` if `resource` matches parameter `name` with any of
    /// `values`.
    fn matches(&self, name: &str, values: &[String], resource: &Resource) -> bool;
}

/// Returns `true` if the resource matches every non-`_id` parameter.
pub fn matches_all<M>(matcher: &M, query: &SearchQuery, resource: &Resource) -> bool
where
    M: ResourceMatcher + ?Sized,
{
    query
        .filters()
        .all(|param| matcher.matches(&param.name, &param.values, resource))
}

/// Default matcher treating the parameter name as a dotted element path.
///
/// `name.family=smith` matches a resource when any primitive found under
/// `name.family` equals `smith`. Arrays along the path are flattened and
/// string comparison ignores ASCII case. A parameter without values matches
/// when the element is present at all.
///
/// # Examples
///
/// ```
/// use helios_repository::core::{ElementMatcher, ResourceMatcher};
/// use helios_repository::types::Resource;
/// use serde_json::json;
///
/// let patient = Resource::new("Patient", json!({
///     "name": [{"family": "Smith", "given": ["Ann", "Marie"]}],
///     "active": true
/// }));
///
/// let m = ElementMatcher;
/// assert!(m.matches("name.given", &["marie".into()], &patient));
/// assert!(m.matches("active", &["true".into()], &patient));
/// assert!(!m.matches("name.family", &["Jones".into()], &patient));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementMatcher;

impl ResourceMatcher for ElementMatcher {
    fn matches(&self, name: &str, values: &[String], resource: &Resource) -> bool {
        let mut leaves = Vec::new();
        collect_at_path(resource.content(), &name.split('.').collect::<Vec<_>>(), &mut leaves);

        if values.is_empty() {
            return !leaves.is_empty();
        }

        leaves
            .iter()
            .any(|leaf| values.iter().any(|v| primitive_eq(leaf, v)))
    }
}

fn collect_at_path<'a>(value: &'a Value, path: &[&str], out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_at_path(item, path, out);
            }
        }
        _ => match path.split_first() {
            None => collect_primitives(value, out),
            Some((head, rest)) => {
                if let Some(child) = value.get(*head) {
                    collect_at_path(child, rest, out);
                }
            }
        },
    }
}

fn collect_primitives<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Null => {}
        Value::Array(items) => items.iter().for_each(|v| collect_primitives(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_primitives(v, out)),
        _ => out.push(value),
    }
}

fn primitive_eq(leaf: &Value, expected: &str) -> bool {
    match leaf {
        Value::String(s) => s.eq_ignore_ascii_case(expected),
        Value::Bool(b) => expected.eq_ignore_ascii_case(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            n.to_string() == expected
                || matches!(
                    (n.as_f64(), expected.parse::<f64>()),
                    (Some(a), Ok(b)) if a == b
                )
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn observation() -> Resource {
        Resource::new(
            "Observation",
            json!({
                "status": "final",
                "code": {"coding": [
                    {"system": "http://loinc.org", "code": "1234-5"},
                    {"system": "http://snomed.info/sct", "code": "999"}
                ]},
                "valueQuantity": {"value": 7.0, "unit": "mmol/L"}
            }),
        )
    }

    #[test]
    fn test_top_level_string() {
        let obs = observation();
        assert!(ElementMatcher.matches("status", &["FINAL".into()], &obs));
        assert!(!ElementMatcher.matches("status", &["amended".into()], &obs));
    }

    #[test]
    fn test_nested_array_path() {
        let obs = observation();
        assert!(ElementMatcher.matches("code.coding.code", &["999".into()], &obs));
        // any value of the parameter is enough
        assert!(ElementMatcher.matches(
            "code.coding.code",
            &["nope".into(), "1234-5".into()],
            &obs
        ));
    }

    #[test]
    fn test_object_leaf_searches_descendants() {
        let obs = observation();
        assert!(ElementMatcher.matches("code", &["http://loinc.org".into()], &obs));
    }

    #[test]
    fn test_numbers() {
        let obs = observation();
        assert!(ElementMatcher.matches("valueQuantity.value", &["7".into()], &obs));
        assert!(ElementMatcher.matches("valueQuantity.value", &["7.0".into()], &obs));
    }

    #[test]
    fn test_missing_element() {
        let obs = observation();
        assert!(!ElementMatcher.matches("subject", &["x".into()], &obs));
        assert!(!ElementMatcher.matches("subject", &[], &obs));
        assert!(ElementMatcher.matches("status", &[], &obs));
    }

    #[test]
    fn test_matches_all_ignores_id() {
        let obs = observation().with_id("o1");
        let query = SearchQuery::new()
            .with_ids(["other"])
            .with_parameter("status", ["final"]);
        assert!(matches_all(&ElementMatcher, &query, &obs));

        let query = query.with_parameter("code.coding.system", ["http://acme.org"]);
        assert!(!matches_all(&ElementMatcher, &query, &obs));
    }
}
