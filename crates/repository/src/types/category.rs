//! Static classification of resource types.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static TERMINOLOGY_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "CodeSystem",
        "ValueSet",
        "ConceptMap",
        "NamingSystem",
        "TerminologyCapabilities",
    ]
    .into_iter()
    .collect()
});

static CONTENT_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // knowledge artifacts
        "Library",
        "Measure",
        "PlanDefinition",
        "ActivityDefinition",
        "Questionnaire",
        "EventDefinition",
        "EvidenceVariable",
        "ArtifactAssessment",
        "ChargeItemDefinition",
        "ObservationDefinition",
        "SpecimenDefinition",
        "DeviceDefinition",
        // conformance
        "StructureDefinition",
        "StructureMap",
        "CapabilityStatement",
        "ImplementationGuide",
        "SearchParameter",
        "OperationDefinition",
        "CompartmentDefinition",
        "GraphDefinition",
        "MessageDefinition",
        "ExampleScenario",
    ]
    .into_iter()
    .collect()
});

/// Storage category of a resource type.
///
/// Categories partition resource types into reference vocabularies,
/// authored knowledge and conformance artifacts, and everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Code systems, value sets and concept maps.
    Terminology,
    /// Knowledge and conformance artifacts.
    Content,
    /// Patient and operational data.
    Data,
}

impl Category {
    /// All categories, in routing fallback order.
    pub const ALL: [Category; 3] = [Category::Data, Category::Content, Category::Terminology];

    /// Classifies a resource type. Unknown types are [`Category::Data`].
    ///
    /// ```
    /// use helios_repository::types::Category;
    ///
    /// assert_eq!(Category::for_type("ValueSet"), Category::Terminology);
    /// assert_eq!(Category::for_type("Library"), Category::Content);
    /// assert_eq!(Category::for_type("Patient"), Category::Data);
    /// ```
    pub fn for_type(resource_type: &str) -> Self {
        if TERMINOLOGY_TYPES.contains(resource_type) {
            Category::Terminology
        } else if CONTENT_TYPES.contains(resource_type) {
            Category::Content
        } else {
            Category::Data
        }
    }

    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Terminology => "terminology",
            Category::Content => "content",
            Category::Data => "data",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminology_types() {
        for t in ["CodeSystem", "ValueSet", "ConceptMap", "NamingSystem"] {
            assert_eq!(Category::for_type(t), Category::Terminology, "{}", t);
        }
    }

    #[test]
    fn test_content_types() {
        for t in ["Library", "Measure", "PlanDefinition", "StructureDefinition"] {
            assert_eq!(Category::for_type(t), Category::Content, "{}", t);
        }
    }

    #[test]
    fn test_unknown_is_data() {
        assert_eq!(Category::for_type("Patient"), Category::Data);
        assert_eq!(Category::for_type("Observation"), Category::Data);
        assert_eq!(Category::for_type("NotARealType"), Category::Data);
        // classification is case-sensitive
        assert_eq!(Category::for_type("library"), Category::Data);
    }

    #[test]
    fn test_for_type_is_stable() {
        for _ in 0..3 {
            assert_eq!(Category::for_type("Library"), Category::Content);
        }
    }
}
