//! Write and operation outcomes.

use serde_json::Value;

use super::resource::{Resource, ResourceId};

/// Operation parameters, passed through to handlers untouched.
pub type Parameters = Value;

/// Result of a create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Identifier of the written resource.
    pub id: ResourceId,
    /// `true` if no record existed before the write.
    pub created: bool,
}

impl WriteOutcome {
    /// Outcome of a write that created a new record.
    pub fn created(id: ResourceId) -> Self {
        Self { id, created: true }
    }

    /// Outcome of a write that replaced an existing record.
    pub fn updated(id: ResourceId) -> Self {
        Self { id, created: false }
    }

    /// HTTP status line used in transaction responses.
    pub fn status(&self) -> &'static str {
        if self.created { "201 Created" } else { "200 OK" }
    }
}

/// Return value of an operation invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    /// The operation produced a resource.
    Resource(Resource),
    /// The operation wrote something.
    Outcome(WriteOutcome),
}

/// Level at which an operation or history request applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationTarget {
    /// The whole store.
    System,
    /// Every resource of a type.
    Type(String),
    /// One resource.
    Instance(ResourceId),
}

impl OperationTarget {
    /// Returns the resource type, or `None` at system level.
    pub fn resource_type(&self) -> Option<&str> {
        match self {
            OperationTarget::System => None,
            OperationTarget::Type(t) => Some(t),
            OperationTarget::Instance(id) => Some(id.resource_type()),
        }
    }
}

impl std::fmt::Display for OperationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationTarget::System => f.write_str("system"),
            OperationTarget::Type(t) => f.write_str(t),
            OperationTarget::Instance(id) => write!(f, "{}", id),
        }
    }
}
