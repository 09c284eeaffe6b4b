//! Resource identity and payload types.
//!
//! A [`Resource`] is an opaque JSON payload tagged with its type and logical
//! id. The repository layer never interprets payload fields beyond
//! `resourceType`, `id` and `meta.versionId`.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RepositoryError, RepositoryResult};

/// Separator between a logical id and its version in FHIR URLs.
const HISTORY_SEGMENT: &str = "_history";

/// Address of a resource: type, logical id and an optional version.
///
/// Equality and hashing only consider the type and the id. Two identifiers
/// that differ only in version address the same record, which is what every
/// store uses as its map key.
///
/// # Examples
///
/// ```
/// use helios_repository::types::ResourceId;
///
/// let plain = ResourceId::new("Patient", "123");
/// let versioned = ResourceId::new("Patient", "123/_history/2");
///
/// assert_eq!(plain, versioned);
/// assert_eq!(versioned.version(), Some("2"));
/// assert_eq!(versioned.id(), "123");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceId {
    resource_type: String,
    id: String,
    version: Option<String>,
}

impl ResourceId {
    /// Creates an identifier, splitting off a `/_history/{version}` suffix
    /// if the id carries one.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        let id = id.into();
        let (id, version) = split_version(&id);
        Self {
            resource_type: resource_type.into(),
            id,
            version,
        }
    }

    /// Parses `Type/id` or `Type/id/_history/version`.
    ///
    /// Leading path segments (such as a server base URL) are ignored.
    pub fn parse(reference: &str) -> Option<Self> {
        let segments: Vec<&str> = reference
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let n = segments.len();

        if n >= 4 && segments[n - 2] == HISTORY_SEGMENT {
            return Some(Self {
                resource_type: segments[n - 4].to_string(),
                id: segments[n - 3].to_string(),
                version: Some(segments[n - 1].to_string()),
            });
        }

        if n >= 2 && segments[n - 1] != HISTORY_SEGMENT {
            return Some(Self {
                resource_type: segments[n - 2].to_string(),
                id: segments[n - 1].to_string(),
                version: None,
            });
        }

        None
    }

    /// Returns a copy of this identifier with the given version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Returns the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the logical id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the version, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Returns this identifier without its version.
    pub fn to_versionless(&self) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            id: self.id.clone(),
            version: None,
        }
    }

    /// Returns the relative URL (e.g. `Patient/123`).
    pub fn url(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.resource_type == other.resource_type && self.id == other.id
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resource_type.hash(state);
        self.id.hash(state);
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(
                f,
                "{}/{}/{}/{}",
                self.resource_type, self.id, HISTORY_SEGMENT, v
            ),
            None => write!(f, "{}/{}", self.resource_type, self.id),
        }
    }
}

fn split_version(id: &str) -> (String, Option<String>) {
    let marker = format!("/{}/", HISTORY_SEGMENT);
    match id.find(&marker) {
        Some(pos) => {
            let version = &id[pos + marker.len()..];
            let version = (!version.is_empty()).then(|| version.to_string());
            (id[..pos].to_string(), version)
        }
        None => (id.to_string(), None),
    }
}

/// An opaque, typed resource payload.
///
/// The type is fixed at construction. The logical id may be absent until a
/// store assigns one on create; assigning it also writes the payload's `id`
/// element so the two never diverge.
///
/// # Examples
///
/// ```
/// use helios_repository::types::Resource;
/// use serde_json::json;
///
/// let patient = Resource::new("Patient", json!({"name": [{"family": "Smith"}]}));
/// assert_eq!(patient.resource_type(), "Patient");
/// assert!(patient.id().is_none());
///
/// let patient = patient.with_id("p1");
/// assert_eq!(patient.id().unwrap().url(), "Patient/p1");
/// assert_eq!(patient.content()["id"], "p1");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    resource_type: String,
    id: Option<String>,
    content: Value,
}

impl Resource {
    /// Wraps a payload as a resource of the given type.
    ///
    /// The payload's `resourceType` is set to `resource_type`; an existing
    /// `id` element becomes the resource's logical id.
    pub fn new(resource_type: impl Into<String>, content: Value) -> Self {
        let resource_type = resource_type.into();
        let mut content = match content {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(serde_json::Map::new()),
        };
        content["resourceType"] = Value::String(resource_type.clone());
        let id = content
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        Self {
            resource_type,
            id,
            content,
        }
    }

    /// Builds a resource from a payload that declares its own `resourceType`.
    pub fn from_json(content: Value) -> RepositoryResult<Self> {
        let resource_type = content
            .get("resourceType")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| RepositoryError::InvalidResource {
                message: "payload has no resourceType".to_string(),
            })?;
        Ok(Self::new(resource_type, content))
    }

    /// Returns this resource with the given logical id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    /// Assigns the logical id, updating the payload.
    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        self.content["id"] = Value::String(id.clone());
        self.id = Some(id);
    }

    /// Returns the resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the logical id without the type.
    pub fn id_part(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the full identifier, including `meta.versionId` if present.
    pub fn id(&self) -> Option<ResourceId> {
        let id = self.id.as_ref()?;
        let rid = ResourceId::new(self.resource_type.clone(), id.clone());
        match self.version_id() {
            Some(version) => Some(rid.with_version(version)),
            None => Some(rid),
        }
    }

    /// Returns `meta.versionId`, if the payload carries one.
    pub fn version_id(&self) -> Option<&str> {
        self.content
            .get("meta")
            .and_then(|meta| meta.get("versionId"))
            .and_then(Value::as_str)
    }

    /// Returns the payload.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Mutable access to the payload for side-content merging.
    ///
    /// Identity elements must not be changed through this reference.
    pub(crate) fn content_mut(&mut self) -> &mut Value {
        &mut self.content
    }

    /// Consumes the resource, returning the payload.
    pub fn into_content(self) -> Value {
        self.content
    }
}
