//! Bundle types for search results and transactions.
//!
//! A [`Bundle`] is an ordered collection of entries tagged with a
//! [`BundleType`]. Search results are `searchset` bundles; transactions are
//! submitted as `transaction` (or `batch`) bundles and answered with the
//! matching `-response` type.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{RepositoryError, RepositoryResult};

use super::resource::Resource;

/// The kind of a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleType {
    /// Results of a search.
    Searchset,
    /// An arbitrary collection of resources.
    Collection,
    /// A set of writes to apply.
    Transaction,
    /// The answer to a transaction.
    TransactionResponse,
    /// A set of independent writes.
    Batch,
    /// The answer to a batch.
    BatchResponse,
    /// Versions of resources over time.
    History,
}

impl BundleType {
    /// Returns the FHIR code for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleType::Searchset => "searchset",
            BundleType::Collection => "collection",
            BundleType::Transaction => "transaction",
            BundleType::TransactionResponse => "transaction-response",
            BundleType::Batch => "batch",
            BundleType::BatchResponse => "batch-response",
            BundleType::History => "history",
        }
    }

    /// Parses a FHIR bundle type code.
    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "searchset" => Some(BundleType::Searchset),
            "collection" => Some(BundleType::Collection),
            "transaction" => Some(BundleType::Transaction),
            "transaction-response" => Some(BundleType::TransactionResponse),
            "batch" => Some(BundleType::Batch),
            "batch-response" => Some(BundleType::BatchResponse),
            "history" => Some(BundleType::History),
            _ => None,
        }
    }

    /// Returns the response type that answers this bundle type.
    pub fn response_type(&self) -> Self {
        match self {
            BundleType::Batch => BundleType::BatchResponse,
            _ => BundleType::TransactionResponse,
        }
    }
}

impl std::fmt::Display for BundleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP verb of a transaction entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[allow(missing_docs)]
pub enum BundleMethod {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl BundleMethod {
    /// Returns the verb as written in a bundle.
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleMethod::Get => "GET",
            BundleMethod::Head => "HEAD",
            BundleMethod::Post => "POST",
            BundleMethod::Put => "PUT",
            BundleMethod::Patch => "PATCH",
            BundleMethod::Delete => "DELETE",
        }
    }

    /// Parses a verb, ignoring case.
    pub fn parse(method: &str) -> Option<Self> {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Some(BundleMethod::Get),
            "HEAD" => Some(BundleMethod::Head),
            "POST" => Some(BundleMethod::Post),
            "PUT" => Some(BundleMethod::Put),
            "PATCH" => Some(BundleMethod::Patch),
            "DELETE" => Some(BundleMethod::Delete),
            _ => None,
        }
    }
}

/// The request half of a transaction entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleRequest {
    /// HTTP verb.
    pub method: BundleMethod,
    /// Target, relative to the store (e.g. `Patient/p1`).
    pub url: String,
}

/// The response half of a transaction-response entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleResponse {
    /// HTTP status line, e.g. `201 Created`.
    pub status: String,
    /// Location of the written resource.
    pub location: Option<String>,
    /// An `OperationOutcome` describing the result, if any.
    pub outcome: Option<Value>,
}

/// A single bundle entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BundleEntry {
    /// The entry's resource.
    pub resource: Option<Resource>,
    /// What to do with the resource in a transaction.
    pub request: Option<BundleRequest>,
    /// What happened to it.
    pub response: Option<BundleResponse>,
}

impl BundleEntry {
    /// An entry holding only a resource.
    pub fn resource(resource: Resource) -> Self {
        Self {
            resource: Some(resource),
            ..Default::default()
        }
    }

    /// A transaction entry.
    pub fn request(method: BundleMethod, url: impl Into<String>, resource: Option<Resource>) -> Self {
        Self {
            resource,
            request: Some(BundleRequest {
                method,
                url: url.into(),
            }),
            response: None,
        }
    }
}

/// A navigation link such as `next` on a paged search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLink {
    /// Link relation, e.g. `next`.
    pub relation: String,
    /// Target of the link.
    pub url: String,
}

/// An ordered collection of entries.
///
/// # Examples
///
/// ```
/// use helios_repository::types::{Bundle, BundleType, Resource};
/// use serde_json::json;
///
/// let bundle = Bundle::searchset(vec![
///     Resource::new("Patient", json!({"id": "a"})),
///     Resource::new("Patient", json!({"id": "b"})),
/// ]);
///
/// assert_eq!(bundle.bundle_type, BundleType::Searchset);
/// assert_eq!(bundle.len(), 2);
/// assert_eq!(bundle.to_json()["type"], "searchset");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    /// Kind of bundle.
    pub bundle_type: BundleType,
    /// Entries in order.
    pub entries: Vec<BundleEntry>,
    /// Navigation links.
    pub links: Vec<BundleLink>,
}

impl Bundle {
    /// Creates an empty bundle.
    pub fn new(bundle_type: BundleType) -> Self {
        Self {
            bundle_type,
            entries: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Creates a search result bundle.
    pub fn searchset(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut bundle = Self::new(BundleType::Searchset);
        bundle
            .entries
            .extend(resources.into_iter().map(BundleEntry::resource));
        bundle
    }

    /// Appends an entry.
    pub fn with_entry(mut self, entry: BundleEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Adds a navigation link.
    pub fn with_link(mut self, relation: impl Into<String>, url: impl Into<String>) -> Self {
        self.links.push(BundleLink {
            relation: relation.into(),
            url: url.into(),
        });
        self
    }

    /// Returns the URL of the `next` link, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if at least one entry carries a resource.
    pub fn has_resources(&self) -> bool {
        self.entries.iter().any(|e| e.resource.is_some())
    }

    /// Iterates over the resources of all entries.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entries.iter().filter_map(|e| e.resource.as_ref())
    }

    /// Consumes the bundle, returning the entry resources in order.
    pub fn into_resources(self) -> Vec<Resource> {
        self.entries.into_iter().filter_map(|e| e.resource).collect()
    }

    /// Renders the bundle as a FHIR `Bundle` JSON resource.
    pub fn to_json(&self) -> Value {
        let mut bundle = Map::new();
        bundle.insert("resourceType".to_string(), json!("Bundle"));
        bundle.insert("type".to_string(), json!(self.bundle_type.as_str()));
        if self.bundle_type == BundleType::Searchset {
            bundle.insert("total".to_string(), json!(self.len()));
        }
        if !self.links.is_empty() {
            let links: Vec<Value> = self
                .links
                .iter()
                .map(|l| json!({"relation": l.relation, "url": l.url}))
                .collect();
            bundle.insert("link".to_string(), Value::Array(links));
        }
        if !self.entries.is_empty() {
            let entries: Vec<Value> = self.entries.iter().map(entry_to_json).collect();
            bundle.insert("entry".to_string(), Value::Array(entries));
        }
        Value::Object(bundle)
    }

    /// Parses a FHIR `Bundle` JSON resource.
    pub fn from_json(value: &Value) -> RepositoryResult<Self> {
        if value.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
            return Err(invalid("payload is not a Bundle"));
        }
        let bundle_type = value
            .get("type")
            .and_then(Value::as_str)
            .and_then(BundleType::parse)
            .ok_or_else(|| invalid("Bundle has no valid type"))?;

        let mut bundle = Bundle::new(bundle_type);

        if let Some(links) = value.get("link").and_then(Value::as_array) {
            for link in links {
                if let (Some(relation), Some(url)) = (
                    link.get("relation").and_then(Value::as_str),
                    link.get("url").and_then(Value::as_str),
                ) {
                    bundle = bundle.with_link(relation, url);
                }
            }
        }

        if let Some(entries) = value.get("entry").and_then(Value::as_array) {
            for (index, entry) in entries.iter().enumerate() {
                bundle.entries.push(entry_from_json(index, entry)?);
            }
        }

        Ok(bundle)
    }
}

fn entry_to_json(entry: &BundleEntry) -> Value {
    let mut out = Map::new();
    if let Some(resource) = &entry.resource {
        if let Some(id) = resource.id() {
            out.insert("fullUrl".to_string(), json!(id.url()));
        }
        out.insert("resource".to_string(), resource.content().clone());
    }
    if let Some(request) = &entry.request {
        out.insert(
            "request".to_string(),
            json!({"method": request.method.as_str(), "url": request.url}),
        );
    }
    if let Some(response) = &entry.response {
        let mut r = Map::new();
        r.insert("status".to_string(), json!(response.status));
        if let Some(location) = &response.location {
            r.insert("location".to_string(), json!(location));
        }
        if let Some(outcome) = &response.outcome {
            r.insert("outcome".to_string(), outcome.clone());
        }
        out.insert("response".to_string(), Value::Object(r));
    }
    Value::Object(out)
}

fn entry_from_json(index: usize, entry: &Value) -> RepositoryResult<BundleEntry> {
    let resource = match entry.get("resource") {
        Some(content) => Some(Resource::from_json(content.clone()).map_err(|e| {
            invalid(format!("entry {}: {}", index, e))
        })?),
        None => None,
    };

    let request = match entry.get("request") {
        Some(request) => {
            let method = request
                .get("method")
                .and_then(Value::as_str)
                .and_then(BundleMethod::parse)
                .ok_or_else(|| invalid(format!("entry {}: missing request method", index)))?;
            let url = request
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(BundleRequest { method, url })
        }
        None => None,
    };

    let response = entry.get("response").and_then(|response| {
        let status = response.get("status").and_then(Value::as_str)?;
        Some(BundleResponse {
            status: status.to_string(),
            location: response
                .get("location")
                .and_then(Value::as_str)
                .map(str::to_string),
            outcome: response.get("outcome").cloned(),
        })
    });

    Ok(BundleEntry {
        resource,
        request,
        response,
    })
}

fn invalid(message: impl Into<String>) -> RepositoryError {
    RepositoryError::InvalidResource {
        message: message.into(),
    }
}
