//! Command line configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `REPO_ROOT` | . | Root of the primary directory store |
//! | `REPO_LOG_LEVEL` | info | Log level |
//!
//! Layout flags override the auto-detected conventions of the root one part
//! at a time; parts that are not given keep their detected value.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use helios_repository::directory::{
    CategoryLayout, CompartmentLayout, DirectoryConventions, FilenameMode, TypeLayout,
};
use helios_repository::types::SearchParameter;

/// Configuration for the `fhir-repo` tool.
#[derive(Debug, Clone, Parser)]
#[command(name = "fhir-repo")]
#[command(about = "Read and search FHIR resources in directory-backed repositories")]
pub struct CliConfig {
    /// Root directory of the primary store.
    #[arg(long, env = "REPO_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Read-only fallback directories, consulted in order after the root.
    #[arg(long = "fallback", value_name = "DIR")]
    pub fallbacks: Vec<PathBuf>,

    /// Category layout of the root (flat, directory-per-category).
    #[arg(long)]
    pub category_layout: Option<CategoryLayout>,

    /// Type layout of the root (flat, directory-per-type).
    #[arg(long)]
    pub type_layout: Option<TypeLayout>,

    /// Compartment layout of the root (flat, directory-per-compartment).
    #[arg(long)]
    pub compartment_layout: Option<CompartmentLayout>,

    /// Filename mode of the root (id-only, type-and-id).
    #[arg(long)]
    pub filename_mode: Option<FilenameMode>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "REPO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Commands understood by the tool.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the conventions detected for the root as JSON.
    Detect,

    /// Print a single resource.
    Read {
        /// Resource type, e.g. `Library`.
        resource_type: String,
        /// Logical id, optionally with `/_history/{version}`.
        id: String,
    },

    /// Print a searchset bundle.
    Search {
        /// Resource type, e.g. `Library`.
        resource_type: String,
        /// Search parameters as `name=value[,value]`.
        params: Vec<String>,
    },
}

impl CliConfig {
    /// Returns the conventions for the root: detected, then overridden by flags.
    pub fn conventions(&self) -> DirectoryConventions {
        let detected = DirectoryConventions::auto_detect(&self.root);
        self.apply_overrides(detected)
    }

    fn apply_overrides(&self, mut conventions: DirectoryConventions) -> DirectoryConventions {
        if let Some(layout) = self.category_layout {
            conventions.category_layout = layout;
        }
        if let Some(layout) = self.type_layout {
            conventions.type_layout = layout;
        }
        if let Some(layout) = self.compartment_layout {
            conventions.compartment_layout = layout;
        }
        if let Some(mode) = self.filename_mode {
            conventions.filename_mode = mode;
        }
        conventions
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.root.exists() && !self.root.is_dir() {
            errors.push(format!("Root {} is not a directory", self.root.display()));
        }

        for fallback in &self.fallbacks {
            if !fallback.is_dir() {
                errors.push(format!(
                    "Fallback {} is not a directory",
                    fallback.display()
                ));
            }
        }

        if let Command::Search { params, .. } = &self.command {
            for param in params {
                if SearchParameter::parse(param).is_none() {
                    errors.push(format!("Search parameter '{}' is not name=value", param));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
