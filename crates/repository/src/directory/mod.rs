//! Directory-tree store.
//!
//! [`DirectoryStore`] maps each resource to one file under a root directory,
//! the layout used by implementation guide source trees:
//!
//! ```text
//! input/
//! ├── resources/          content (Library, Measure, ...)
//! │   └── library/
//! │       ├── lib-1.json
//! │       └── lib-1.cql   side content of lib-1
//! ├── tests/              data (Patient, Observation, ...)
//! │   └── patient/        patients, or one directory per patient compartment
//! └── vocabulary/         terminology (ValueSet, CodeSystem, ...)
//!     └── valueset/
//! ```
//!
//! Other layouts are described by [`DirectoryConventions`] and can be
//! detected from an existing tree with [`DirectoryConventions::auto_detect`].

mod codec;
mod compartment;
mod conventions;
mod path;
mod side_content;
mod store;

pub use codec::{JsonCodec, ResourceCodec};
pub use compartment::{COMPARTMENT_TYPE, CompartmentAssignment};
pub use conventions::{
    CategoryLayout, CompartmentLayout, DirectoryConventions, Encoding, FilenameMode, TypeLayout,
};
pub use path::PathResolver;
pub use store::DirectoryStore;
