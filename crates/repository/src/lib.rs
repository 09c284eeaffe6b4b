//! Helios FHIR Repository Layer
//!
//! This crate provides a uniform abstraction for reading, writing, searching and
//! invoking operations on FHIR resources, while letting the actual storage be split
//! across independent stores combined by composition.
//!
//! # Features
//!
//! - **One contract**: every store and composite implements [`Repository`]
//! - **Category routing**: terminology, content and data kept in separate stores
//! - **Federation**: a local store with fallbacks, searched in parallel
//! - **Directory stores**: implementation guide source trees read and written in place
//! - **Degraded results**: partial federated searches are reported, never hidden
//!
//! # Architecture
//!
//! - [`types`] - Resource identity, payloads, search queries and bundles
//! - [`error`] - Error types for all operations
//! - [`core`] - The repository contract, search matching and operation dispatch
//! - [`memory`] - In-process store
//! - [`directory`] - Filesystem store and its layout conventions
//! - [`composite`] - Router, federator and ordered proxy
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use helios_repository::{CategoryRouter, DirectoryStore, Federator, InMemoryStore, Repository};
//! use helios_repository::directory::DirectoryConventions;
//! use helios_repository::types::SearchQuery;
//!
//! # #[tokio::main]
//! # async fn main() -> helios_repository::RepositoryResult<()> {
//! // Knowledge artifacts from an IG checked out on disk, with a shared
//! // read-only package as fallback
//! let content = Federator::new(Arc::new(DirectoryStore::new(
//!     "ig/input",
//!     DirectoryConventions::STANDARD,
//! )))
//! .with_secondary(Arc::new(
//!     DirectoryStore::auto_detect("packages/common").read_only(),
//! ));
//!
//! // Patient data in memory
//! let repo = CategoryRouter::new(Arc::new(InMemoryStore::new()))
//!     .with_content(Arc::new(content));
//!
//! let libraries = repo.search("Library", &SearchQuery::new()).await?;
//! println!("{} libraries", libraries.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod composite;
pub mod core;
pub mod directory;
pub mod error;
pub mod memory;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{RepositoryError, RepositoryResult, StoreFailure};
pub use types::{Bundle, Resource, ResourceId, SearchQuery};

// Re-export the contract
pub use core::{DynRepository, Repository};

// Re-export stores and composites
pub use composite::{CategoryRouter, Federator, OrderedProxy};
pub use directory::DirectoryStore;
pub use memory::InMemoryStore;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
