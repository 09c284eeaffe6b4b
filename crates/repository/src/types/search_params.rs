//! Declarative search parameter maps.
//!
//! A [`SearchQuery`] is an ordered list of `(name, values)` pairs. Parameters
//! are combined with AND; the values of one parameter are alternatives whose
//! interpretation belongs to the [`ResourceMatcher`](crate::core::ResourceMatcher).
//!
//! The reserved `_id` parameter is never handed to a matcher. Stores resolve
//! it directly against their identity map.

use serde::{Deserialize, Serialize};

/// One search parameter and its matcher values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParameter {
    /// Parameter name (e.g. `name`, `code`, `_id`).
    pub name: String,
    /// Matcher values; a resource matches the parameter if it matches any.
    pub values: Vec<String>,
}

impl SearchParameter {
    /// Creates a parameter.
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses `name=value1,value2`.
    ///
    /// Returns `None` when there is no `=` or the name is empty.
    pub fn parse(pair: &str) -> Option<Self> {
        let (name, values) = pair.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let values = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        Some(Self {
            name: name.to_string(),
            values,
        })
    }

    /// Returns `true` if this is the reserved identifier parameter.
    pub fn is_id(&self) -> bool {
        self.name == SearchQuery::ID_PARAM
    }
}

/// An ordered search parameter map.
///
/// # Examples
///
/// ```
/// use helios_repository::types::SearchQuery;
///
/// let query = SearchQuery::new()
///     .with_parameter("family", ["Smith"])
///     .with_ids(["p1", "p2"]);
///
/// assert_eq!(query.id_values(), Some(vec!["p1", "p2"]));
/// assert_eq!(query.filters().count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    parameters: Vec<SearchParameter>,
}

impl SearchQuery {
    /// The reserved identifier parameter.
    pub const ID_PARAM: &'static str = "_id";

    /// Creates an empty query, which matches every resource of a type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn with_parameter<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.parameters.push(SearchParameter::new(name, values));
        self
    }

    /// Appends an `_id` parameter.
    pub fn with_ids<I, V>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.with_parameter(Self::ID_PARAM, ids)
    }

    /// Parses `name=value` pairs into a query, skipping malformed pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            parameters: pairs.into_iter().filter_map(SearchParameter::parse).collect(),
        }
    }

    /// Returns `true` if the query has no parameters.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Returns all parameters in order.
    pub fn parameters(&self) -> &[SearchParameter] {
        &self.parameters
    }

    /// Returns the `_id` values, or `None` if the query has no `_id`
    /// parameter. Multiple `_id` parameters are flattened.
    pub fn id_values(&self) -> Option<Vec<&str>> {
        let mut found = false;
        let mut ids = Vec::new();
        for param in self.parameters.iter().filter(|p| p.is_id()) {
            found = true;
            ids.extend(param.values.iter().map(String::as_str));
        }
        found.then_some(ids)
    }

    /// Returns every parameter except `_id`.
    pub fn filters(&self) -> impl Iterator<Item = &SearchParameter> {
        self.parameters.iter().filter(|p| !p.is_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair() {
        let param = SearchParameter::parse("code=a, b,,c").unwrap();
        assert_eq!(param.name, "code");
        assert_eq!(param.values, vec!["a", "b", "c"]);

        assert!(SearchParameter::parse("novalue").is_none());
        assert!(SearchParameter::parse("=x").is_none());
    }

    #[test]
    fn test_id_values_absent_vs_empty() {
        assert!(SearchQuery::new().id_values().is_none());

        let query = SearchQuery::new().with_ids(Vec::<String>::new());
        assert_eq!(query.id_values(), Some(vec![]));
    }

    #[test]
    fn test_from_pairs_keeps_order() {
        let query = SearchQuery::from_pairs(["_id=1,2", "bad", "family=Smith", "_id=3"]);
        assert_eq!(query.parameters().len(), 3);
        assert_eq!(query.id_values(), Some(vec!["1", "2", "3"]));
        let names: Vec<_> = query.filters().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["family"]);
    }
}
