//! In-memory store.
//!
//! [`InMemoryStore`] keeps every resource in a process-local map. It is the
//! usual local store of a federation and the store of choice for tests.

mod id;
mod store;

pub use id::{IdGenerator, SequenceGenerator, UuidGenerator};
pub use store::InMemoryStore;
