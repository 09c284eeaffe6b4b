//! Composite repositories.
//!
//! Composites implement [`Repository`](crate::Repository) by delegating to
//! other repositories and hold no resources of their own:
//!
//! - [`CategoryRouter`] - one delegate per resource category
//! - [`Federator`] - local store plus fallbacks, parallel search
//! - [`OrderedProxy`] - delegates tried one after another
//!
//! Composites nest freely, e.g. a router whose content delegate is a
//! federation of a local directory and a remote store.

mod federator;
mod ordered;
mod router;

pub use federator::Federator;
pub use ordered::OrderedProxy;
pub use router::CategoryRouter;
