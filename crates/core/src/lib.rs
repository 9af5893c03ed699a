//! codemap-core: the note engine behind codemap.
//!
//! One structured text file holds a forest of atomic, addressable notes
//! attached to source-code locations. This crate owns everything that
//! must get byte-level format handling and graph consistency right: the
//! two-dialect parser, the in-memory model, the backlink graph, the
//! canonical writer, and the id generator. The [`store::NoteStore`]
//! façade is the sole boundary collaborators (CLI, editors, servers)
//! are expected to use.

#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod errors;
pub mod format;
pub mod ids;
pub mod links;
pub mod model;
pub mod store;

pub use errors::StoreError;
pub use store::NoteStore;

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
