//! On-disk layout conventions.
//!
//! A directory tree can group files by category, by resource type, both, or
//! neither, and can name files `{id}.json` or `{Type}-{id}.json`. The
//! [`DirectoryConventions`] value fixes one combination; [`PathResolver`]
//! turns it into concrete paths.
//!
//! [`PathResolver`]: super::PathResolver

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::types::Category;

use super::compartment::COMPARTMENT_TYPE;

/// Whether files are grouped under per-category directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryLayout {
    /// All categories share the root.
    Flat,
    /// `vocabulary/`, `resources/` and `tests/` under the root.
    DirectoryPerCategory,
}

/// Whether files are grouped under per-type directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeLayout {
    /// All types share the category directory.
    Flat,
    /// A lower-case directory per type, e.g. `library/`.
    DirectoryPerType,
}

/// Whether data resources are grouped by patient compartment.
///
/// With per-compartment directories, a data resource that belongs to a
/// patient lives under `tests/patient/{patient id}/`, laid out by type as
/// usual; everything else stays in the shared type directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompartmentLayout {
    /// No compartment directories.
    #[default]
    Flat,
    /// A directory per patient compartment.
    DirectoryPerCompartment,
}

/// How resource files are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilenameMode {
    /// `{id}.{ext}`
    IdOnly,
    /// `{Type}-{id}.{ext}`
    TypeAndId,
}

/// Serialization format of resource files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// Pretty-printed JSON.
    #[default]
    Json,
}

impl Encoding {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Encoding::Json => "json",
        }
    }
}

macro_rules! layout_from_str {
    ($ty:ident { $($text:literal => $variant:ident),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().replace('-', "_").as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    )),
                }
            }
        }
    };
}

layout_from_str!(CategoryLayout {
    "flat" => Flat,
    "directory_per_category" => DirectoryPerCategory,
});
layout_from_str!(TypeLayout {
    "flat" => Flat,
    "directory_per_type" => DirectoryPerType,
});
layout_from_str!(CompartmentLayout {
    "flat" => Flat,
    "directory_per_compartment" => DirectoryPerCompartment,
});
layout_from_str!(FilenameMode {
    "id_only" => IdOnly,
    "type_and_id" => TypeAndId,
});

/// A complete directory layout.
///
/// # Examples
///
/// ```
/// use helios_repository::directory::{CategoryLayout, DirectoryConventions, FilenameMode};
///
/// let standard = DirectoryConventions::STANDARD;
/// assert_eq!(standard.category_layout, CategoryLayout::DirectoryPerCategory);
/// assert_eq!(standard.filename_mode, FilenameMode::IdOnly);
///
/// let json = serde_json::to_value(DirectoryConventions::FLAT).unwrap();
/// assert_eq!(json["filename_mode"], "type_and_id");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectoryConventions {
    /// Grouping by category.
    pub category_layout: CategoryLayout,
    /// Grouping by resource type.
    pub type_layout: TypeLayout,
    /// Grouping of data by patient compartment.
    #[serde(default)]
    pub compartment_layout: CompartmentLayout,
    /// File naming.
    pub filename_mode: FilenameMode,
    /// File format.
    #[serde(default)]
    pub encoding: Encoding,
}

impl Default for DirectoryConventions {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl fmt::Display for DirectoryConventions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?}/{:?}/{:?}/{:?}",
            self.category_layout,
            self.type_layout,
            self.compartment_layout,
            self.filename_mode,
            self.encoding
        )
    }
}

/// Directory names checked, in order, when detecting a category layout.
const CATEGORY_DETECTION_ORDER: [Category; 3] =
    [Category::Data, Category::Terminology, Category::Content];

impl DirectoryConventions {
    /// Per-category and per-type directories with `{id}.json` files.
    pub const STANDARD: Self = Self {
        category_layout: CategoryLayout::DirectoryPerCategory,
        type_layout: TypeLayout::DirectoryPerType,
        compartment_layout: CompartmentLayout::Flat,
        filename_mode: FilenameMode::IdOnly,
        encoding: Encoding::Json,
    };

    /// Every file in the root, named `{Type}-{id}.json`.
    pub const FLAT: Self = Self {
        category_layout: CategoryLayout::Flat,
        type_layout: TypeLayout::Flat,
        compartment_layout: CompartmentLayout::Flat,
        filename_mode: FilenameMode::TypeAndId,
        encoding: Encoding::Json,
    };

    /// Creates a conventions value from its parts with JSON encoding and no
    /// compartment directories.
    pub fn new(
        category_layout: CategoryLayout,
        type_layout: TypeLayout,
        filename_mode: FilenameMode,
    ) -> Self {
        Self {
            category_layout,
            type_layout,
            compartment_layout: CompartmentLayout::Flat,
            filename_mode,
            encoding: Encoding::Json,
        }
    }

    /// Returns these conventions with the given compartment layout.
    pub const fn with_compartment_layout(mut self, compartment_layout: CompartmentLayout) -> Self {
        self.compartment_layout = compartment_layout;
        self
    }

    /// Returns the directory name for a category.
    pub fn category_directory(category: Category) -> &'static str {
        match category {
            Category::Terminology => "vocabulary",
            Category::Content => "resources",
            Category::Data => "tests",
        }
    }

    /// Infers the conventions of an existing tree.
    ///
    /// - The category layout is per-category if any of `tests`, `vocabulary`
    ///   or `resources` exists under the root.
    /// - The compartment layout is per-compartment if the category layout is
    ///   per-category and `tests/patient` holds a subdirectory that is not a
    ///   type directory. Type and filename detection then look inside the
    ///   first such compartment.
    /// - The type layout is per-type if the first category directory found
    ///   holds a subdirectory named after the type its files declare.
    /// - The filename mode is type-and-id if any file there is named
    ///   `{Type}-...` and declares that type.
    ///
    /// A missing root yields [`DirectoryConventions::STANDARD`].
    pub fn auto_detect(root: &Path) -> Self {
        if !root.is_dir() {
            debug!(root = %root.display(), "Root missing, using standard conventions");
            return Self::STANDARD;
        }

        let category_path = CATEGORY_DETECTION_ORDER
            .iter()
            .map(|c| root.join(Self::category_directory(*c)))
            .find(|p| p.is_dir());
        let has_category_directory = category_path.is_some();
        let category_path = category_path.unwrap_or_else(|| root.to_path_buf());

        let compartment_path = if has_category_directory {
            first_compartment(root)
        } else {
            None
        };
        let has_compartment_directory = compartment_path.is_some();
        let category_path = compartment_path.unwrap_or(category_path);

        let type_path = sorted_entries(&category_path)
            .into_iter()
            .filter(|p| p.is_dir())
            .find(|dir| is_type_directory(dir));
        let has_type_directory = type_path.is_some();
        let file_path = type_path.unwrap_or(category_path);

        let has_type_filename = sorted_entries(&file_path)
            .into_iter()
            .filter(|p| p.is_file() && has_extension(p, Encoding::Json.extension()))
            .any(|file| file_claims_declared_type(&file));

        let conventions = Self::new(
            if has_category_directory {
                CategoryLayout::DirectoryPerCategory
            } else {
                CategoryLayout::Flat
            },
            if has_type_directory {
                TypeLayout::DirectoryPerType
            } else {
                TypeLayout::Flat
            },
            if has_type_filename {
                FilenameMode::TypeAndId
            } else {
                FilenameMode::IdOnly
            },
        )
        .with_compartment_layout(if has_compartment_directory {
            CompartmentLayout::DirectoryPerCompartment
        } else {
            CompartmentLayout::Flat
        });

        info!(root = %root.display(), conventions = %conventions, "Auto-detected directory conventions");
        conventions
    }
}

/// The first subdirectory of `tests/patient` that is not a type directory.
fn first_compartment(root: &Path) -> Option<PathBuf> {
    let compartment_root = root
        .join(DirectoryConventions::category_directory(Category::Data))
        .join(COMPARTMENT_TYPE.to_lowercase());
    sorted_entries(&compartment_root)
        .into_iter()
        .filter(|p| p.is_dir())
        .find(|dir| !is_type_directory(dir))
}

pub(crate) fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(|e| e.ok().map(|e| e.path())).collect(),
        Err(_) => Vec::new(),
    };
    entries.sort();
    entries
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

fn declared_type(file: &Path) -> Option<String> {
    let text = fs::read_to_string(file).ok()?;
    let value: Value = serde_json::from_str(&text).ok()?;
    value
        .get("resourceType")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// A directory is a type directory if a file inside declares a type whose
/// lower-case name is the directory name.
fn is_type_directory(dir: &Path) -> bool {
    let Some(name) = dir.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    sorted_entries(dir)
        .into_iter()
        .filter(|p| p.is_file() && has_extension(p, Encoding::Json.extension()))
        .filter_map(|p| declared_type(&p))
        .any(|t| t.to_lowercase() == name.to_lowercase())
}

fn file_claims_declared_type(file: &Path) -> bool {
    let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    let Some((claimed, _)) = stem.split_once('-') else {
        return false;
    };
    declared_type(file).is_some_and(|declared| declared == claimed)
}
