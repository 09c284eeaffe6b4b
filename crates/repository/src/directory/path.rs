//! Path resolution for directory stores.

use std::path::{Path, PathBuf};

use crate::types::{Category, Resource};

use super::compartment::{COMPARTMENT_TYPE, CompartmentAssignment};
use super::conventions::{
    CategoryLayout, CompartmentLayout, DirectoryConventions, FilenameMode, TypeLayout,
    has_extension, sorted_entries,
};

/// Longest id accepted as a file name component.
const MAX_ID_LENGTH: usize = 64;

/// Maps `(type, id)` to file locations under a root.
///
/// The preferred location of a resource is a pure function of the root, the
/// conventions and the arguments, so reads and writes agree on where a
/// resource lives. With per-compartment directories the lookups that cannot
/// know the compartment ([`candidate_paths`](Self::candidate_paths) and
/// [`search_dirs`](Self::search_dirs)) also list the compartments on disk.
///
/// Callers check [`is_valid_type`](Self::is_valid_type) and
/// [`is_valid_id`](Self::is_valid_id) before resolving; other values can
/// name paths outside the root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use helios_repository::directory::{DirectoryConventions, PathResolver};
///
/// let standard = PathResolver::new("/ig", DirectoryConventions::STANDARD);
/// assert_eq!(
///     standard.path_for("Library", "lib-1"),
///     Path::new("/ig/resources/library/lib-1.json")
/// );
///
/// let flat = PathResolver::new("/ig", DirectoryConventions::FLAT);
/// assert_eq!(
///     flat.path_for("ValueSet", "vs-1"),
///     Path::new("/ig/ValueSet-vs-1.json")
/// );
///
/// assert!(!PathResolver::is_valid_id("../escape"));
/// ```
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    conventions: DirectoryConventions,
}

impl PathResolver {
    /// Creates a resolver for a root directory.
    pub fn new(root: impl Into<PathBuf>, conventions: DirectoryConventions) -> Self {
        Self {
            root: root.into(),
            conventions,
        }
    }

    /// Returns `true` for a FHIR id: 1 to 64 of `[A-Za-z0-9-.]`, other than
    /// `.` and `..`.
    pub fn is_valid_id(id: &str) -> bool {
        (1..=MAX_ID_LENGTH).contains(&id.len())
            && id != "."
            && id != ".."
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    }

    /// Returns `true` for a resource type name usable as a single path
    /// component: an ASCII letter followed by letters and digits.
    pub fn is_valid_type(resource_type: &str) -> bool {
        let mut chars = resource_type.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric())
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the conventions in use.
    pub fn conventions(&self) -> &DirectoryConventions {
        &self.conventions
    }

    /// Directory holding every resource of a category.
    pub fn category_dir(&self, category: Category) -> PathBuf {
        match self.conventions.category_layout {
            CategoryLayout::Flat => self.root.clone(),
            CategoryLayout::DirectoryPerCategory => self
                .root
                .join(DirectoryConventions::category_directory(category)),
        }
    }

    fn apply_type_layout(&self, dir: PathBuf, resource_type: &str) -> PathBuf {
        match self.conventions.type_layout {
            TypeLayout::Flat => dir,
            TypeLayout::DirectoryPerType => dir.join(resource_type.to_lowercase()),
        }
    }

    /// Shared directory holding the resources of a type that are outside
    /// every compartment.
    pub fn type_dir(&self, resource_type: &str) -> PathBuf {
        let dir = self.category_dir(Category::for_type(resource_type));
        self.apply_type_layout(dir, resource_type)
    }

    /// Returns `true` if resources of the type can live in compartments.
    pub fn uses_compartments(&self, resource_type: &str) -> bool {
        self.conventions.compartment_layout == CompartmentLayout::DirectoryPerCompartment
            && Category::for_type(resource_type) == Category::Data
    }

    /// Parent of the compartment directories, e.g. `tests/patient`.
    pub fn compartment_root(&self) -> PathBuf {
        self.category_dir(Category::Data)
            .join(COMPARTMENT_TYPE.to_lowercase())
    }

    /// Directory of a type inside one compartment.
    pub fn compartment_type_dir(&self, compartment_id: &str, resource_type: &str) -> PathBuf {
        self.apply_type_layout(self.compartment_root().join(compartment_id), resource_type)
    }

    /// Directory for a type under an assignment.
    pub fn directory_for(&self, resource_type: &str, assignment: &CompartmentAssignment) -> PathBuf {
        match assignment.compartment_id() {
            Some(compartment) if self.uses_compartments(resource_type) => {
                self.compartment_type_dir(compartment, resource_type)
            }
            _ => self.type_dir(resource_type),
        }
    }

    /// File name of a resource, without any directory.
    pub fn file_name(&self, resource_type: &str, id: &str) -> String {
        let extension = self.conventions.encoding.extension();
        match self.conventions.filename_mode {
            FilenameMode::IdOnly => format!("{}.{}", id, extension),
            FilenameMode::TypeAndId => format!("{}-{}.{}", resource_type, id, extension),
        }
    }

    /// Preferred path of a resource known only by type and id.
    ///
    /// A patient goes to its own compartment; anything else whose compartment
    /// depends on content resolves to the shared directory.
    pub fn path_for(&self, resource_type: &str, id: &str) -> PathBuf {
        let assignment = if resource_type == COMPARTMENT_TYPE {
            CompartmentAssignment::member(id)
        } else {
            CompartmentAssignment::Shared
        };
        self.directory_for(resource_type, &assignment)
            .join(self.file_name(resource_type, id))
    }

    /// Path a resource is written to, following its compartment assignment.
    pub fn path_for_resource(&self, resource: &Resource, id: &str) -> PathBuf {
        let resource_type = resource.resource_type();
        let assignment = CompartmentAssignment::for_resource(resource);
        self.directory_for(resource_type, &assignment)
            .join(self.file_name(resource_type, id))
    }

    /// Existing compartment directories in name order.
    pub fn compartment_dirs(&self) -> Vec<PathBuf> {
        if self.conventions.compartment_layout != CompartmentLayout::DirectoryPerCompartment {
            return Vec::new();
        }
        sorted_entries(&self.compartment_root())
            .into_iter()
            .filter(|p| p.is_dir())
            .collect()
    }

    /// Every path that may hold a resource, preferred path first.
    pub fn candidate_paths(&self, resource_type: &str, id: &str) -> Vec<PathBuf> {
        let preferred = self.path_for(resource_type, id);
        let mut paths = vec![preferred.clone()];
        if self.uses_compartments(resource_type) {
            let file_name = self.file_name(resource_type, id);
            let shared = self.type_dir(resource_type).join(&file_name);
            if shared != preferred {
                paths.push(shared);
            }
            for dir in self.compartment_dirs() {
                let path = self.apply_type_layout(dir, resource_type).join(&file_name);
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    /// Directories searched for a type: each compartment, then the shared
    /// directory.
    pub fn search_dirs(&self, resource_type: &str) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        if self.uses_compartments(resource_type) {
            for dir in self.compartment_dirs() {
                dirs.push(self.apply_type_layout(dir, resource_type));
            }
        }
        dirs.push(self.type_dir(resource_type));
        dirs
    }

    /// Returns `true` if a file in the type directory may hold a resource of
    /// the type. Content still has to be checked after decoding.
    pub fn is_candidate_file(&self, resource_type: &str, path: &Path) -> bool {
        if !has_extension(path, self.conventions.encoding.extension()) {
            return false;
        }
        match self.conventions.filename_mode {
            FilenameMode::IdOnly => true,
            FilenameMode::TypeAndId => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&format!("{}-", resource_type))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn compartments() -> DirectoryConventions {
        DirectoryConventions::STANDARD
            .with_compartment_layout(CompartmentLayout::DirectoryPerCompartment)
    }

    #[test]
    fn test_terminology_goes_to_vocabulary() {
        let resolver = PathResolver::new("/root", DirectoryConventions::STANDARD);
        assert_eq!(
            resolver.path_for("ValueSet", "vs"),
            Path::new("/root/vocabulary/valueset/vs.json")
        );
        assert_eq!(
            resolver.path_for("Patient", "p"),
            Path::new("/root/tests/patient/p.json")
        );
    }

    #[test]
    fn test_mixed_layout() {
        let conventions = DirectoryConventions::new(
            CategoryLayout::DirectoryPerCategory,
            TypeLayout::Flat,
            FilenameMode::TypeAndId,
        );
        let resolver = PathResolver::new("/root", conventions);
        assert_eq!(
            resolver.path_for("Measure", "m1"),
            Path::new("/root/resources/Measure-m1.json")
        );
    }

    #[test]
    fn test_candidate_files() {
        let flat = PathResolver::new("/root", DirectoryConventions::FLAT);
        assert!(flat.is_candidate_file("Library", Path::new("/root/Library-a.json")));
        assert!(!flat.is_candidate_file("Library", Path::new("/root/Measure-a.json")));
        assert!(!flat.is_candidate_file("Library", Path::new("/root/Library-a.cql")));

        let standard = PathResolver::new("/root", DirectoryConventions::STANDARD);
        assert!(standard.is_candidate_file("Library", Path::new("x/anything.JSON")));
    }

    #[test]
    fn test_valid_ids() {
        assert!(PathResolver::is_valid_id("lib-1"));
        assert!(PathResolver::is_valid_id("1.2.840"));
        assert!(PathResolver::is_valid_id(&"a".repeat(64)));

        assert!(!PathResolver::is_valid_id(""));
        assert!(!PathResolver::is_valid_id("."));
        assert!(!PathResolver::is_valid_id(".."));
        assert!(!PathResolver::is_valid_id("../../../escaped"));
        assert!(!PathResolver::is_valid_id("a/b"));
        assert!(!PathResolver::is_valid_id("a\\b"));
        assert!(!PathResolver::is_valid_id("under_score"));
        assert!(!PathResolver::is_valid_id(&"a".repeat(65)));
    }

    #[test]
    fn test_valid_types() {
        assert!(PathResolver::is_valid_type("Library"));
        assert!(PathResolver::is_valid_type("Observation2"));

        assert!(!PathResolver::is_valid_type(""));
        assert!(!PathResolver::is_valid_type(".."));
        assert!(!PathResolver::is_valid_type("../Library"));
        assert!(!PathResolver::is_valid_type("1Library"));
    }

    #[test]
    fn test_compartment_paths() {
        let resolver = PathResolver::new("/root", compartments());
        assert_eq!(resolver.compartment_root(), Path::new("/root/tests/patient"));

        // a patient is filed in its own compartment
        assert_eq!(
            resolver.path_for("Patient", "p1"),
            Path::new("/root/tests/patient/p1/patient/p1.json")
        );

        let observation = Resource::new(
            "Observation",
            json!({"id": "o1", "subject": {"reference": "Patient/p1"}}),
        );
        assert_eq!(
            resolver.path_for_resource(&observation, "o1"),
            Path::new("/root/tests/patient/p1/observation/o1.json")
        );

        let unowned = Resource::new("Observation", json!({"id": "o2"}));
        assert_eq!(
            resolver.path_for_resource(&unowned, "o2"),
            Path::new("/root/tests/observation/o2.json")
        );

        // content is never compartmentalized
        assert_eq!(
            resolver.path_for("Library", "l1"),
            Path::new("/root/resources/library/l1.json")
        );
    }

    #[test]
    fn test_compartment_search_dirs() {
        let dir = TempDir::new().unwrap();
        let resolver = PathResolver::new(dir.path(), compartments());
        fs::create_dir_all(dir.path().join("tests/patient/p2")).unwrap();
        fs::create_dir_all(dir.path().join("tests/patient/p1")).unwrap();

        assert_eq!(
            resolver.search_dirs("Observation"),
            vec![
                dir.path().join("tests/patient/p1/observation"),
                dir.path().join("tests/patient/p2/observation"),
                dir.path().join("tests/observation"),
            ]
        );
        assert_eq!(
            resolver.candidate_paths("Observation", "o1"),
            vec![
                dir.path().join("tests/observation/o1.json"),
                dir.path().join("tests/patient/p1/observation/o1.json"),
                dir.path().join("tests/patient/p2/observation/o1.json"),
            ]
        );
        assert_eq!(
            resolver.search_dirs("Library"),
            vec![dir.path().join("resources/library")]
        );
    }
}
