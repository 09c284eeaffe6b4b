//! Core traits and collaborators.
//!
//! - [`Repository`] - the contract every store and composite implements
//! - [`ResourceMatcher`] - evaluates search parameters against a resource
//! - [`OperationRegistry`] - dispatches named operations to handlers
//!
//! Leaf stores resolve a search in two steps. The `_id` parameter narrows the
//! candidates to the listed identifiers, in the order listed (every resource
//! of the type when absent), then every other parameter is applied as an AND
//! filter through the matcher.

mod matcher;
mod operations;
mod repository;

pub use matcher::{ElementMatcher, ResourceMatcher, matches_all};
pub use operations::{OperationHandler, OperationRegistry};
pub use repository::{DynRepository, Repository};

pub(crate) use operations::{UnknownOperation, invoke_with};
pub(crate) use repository::apply_writes;
