//! Patient compartment assignment for directory stores.
//!
//! In a per-compartment tree every data resource that references a patient
//! is filed under that patient's directory. The assignment is derived from
//! the resource content alone, so it can be recomputed on every write.

use serde_json::Value;

use crate::types::{Category, Resource, ResourceId};

use super::path::PathResolver;

/// Resource type that owns compartments.
pub const COMPARTMENT_TYPE: &str = "Patient";

/// Reference elements checked for compartment membership, most specific
/// first.
const REFERENCE_PRIORITY: [&str; 7] = [
    "subject",
    "patient",
    "beneficiary",
    "member",
    "individual",
    "encounter",
    "episodeOfCare",
];

/// Where a resource lives relative to patient compartments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompartmentAssignment {
    /// Outside every compartment.
    Shared,
    /// Inside the compartment of the patient with this id.
    Member(String),
}

impl CompartmentAssignment {
    /// Assigns a resource from its content.
    ///
    /// - Non-data resources are shared.
    /// - A patient is the owner of its own compartment.
    /// - Otherwise the first of `subject`, `patient`, `beneficiary`, `member`,
    ///   `individual`, `encounter` and `episodeOfCare` that
    ///   references a patient decides; with no such reference the resource
    ///   is shared.
    ///
    /// Ids that cannot name a directory never produce a membership.
    ///
    /// # Examples
    ///
    /// ```
    /// use serde_json::json;
    /// use helios_repository::directory::CompartmentAssignment;
    /// use helios_repository::types::Resource;
    ///
    /// let observation = Resource::new(
    ///     "Observation",
    ///     json!({"id": "o1", "subject": {"reference": "Patient/p1"}}),
    /// );
    /// assert_eq!(
    ///     CompartmentAssignment::for_resource(&observation),
    ///     CompartmentAssignment::Member("p1".to_string())
    /// );
    /// ```
    pub fn for_resource(resource: &Resource) -> Self {
        let resource_type = resource.resource_type();
        if Category::for_type(resource_type) != Category::Data {
            return CompartmentAssignment::Shared;
        }

        if resource_type == COMPARTMENT_TYPE {
            return resource
                .id_part()
                .map(Self::member)
                .unwrap_or(CompartmentAssignment::Shared);
        }

        REFERENCE_PRIORITY
            .iter()
            .filter_map(|element| resource.content().get(*element))
            .find_map(patient_reference)
            .map(|id| Self::member(&id))
            .unwrap_or(CompartmentAssignment::Shared)
    }

    /// Membership in a patient's compartment, or shared for an id that is
    /// not a valid directory name.
    pub fn member(id: &str) -> Self {
        if PathResolver::is_valid_id(id) {
            CompartmentAssignment::Member(id.to_string())
        } else {
            CompartmentAssignment::Shared
        }
    }

    /// Returns the patient id for a membership.
    pub fn compartment_id(&self) -> Option<&str> {
        match self {
            CompartmentAssignment::Shared => None,
            CompartmentAssignment::Member(id) => Some(id),
        }
    }
}

/// The patient id referenced by a reference element or a list of them.
fn patient_reference(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(patient_reference),
        Value::Object(_) => value
            .get("reference")
            .and_then(Value::as_str)
            .and_then(ResourceId::parse)
            .filter(|rid| rid.resource_type() == COMPARTMENT_TYPE)
            .map(|rid| rid.id().to_string()),
        _ => None,
    }
}
