//! Filesystem backend for the rekey document store.
//!
//! A store is a single directory; its documents are the `*.xml` files
//! directly inside it. Subdirectories are ignored.

mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::FsStore;
