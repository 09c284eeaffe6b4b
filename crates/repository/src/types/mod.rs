//! Core types for the repository layer.

mod bundle;
mod category;
mod outcome;
mod resource;
mod search_params;

pub use bundle::{
    Bundle, BundleEntry, BundleLink, BundleMethod, BundleRequest, BundleResponse, BundleType,
};
pub use category::Category;
pub use outcome::{OperationResult, OperationTarget, Parameters, WriteOutcome};
pub use resource::{Resource, ResourceId};
pub use search_params::{SearchParameter, SearchQuery};
