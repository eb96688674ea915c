//! Core types for the rekey fiscal-document pipeline.
//!
//! Holds the access-key codec, the operation-category tables, the
//! substitution profile and the [`store::DocumentStore`] seam. This crate is
//! free of XML and filesystem dependencies; every other crate depends on it.

pub mod config;
pub mod error;
pub mod key;
pub mod operation;
pub mod store;

pub use error::{Error, Result};
pub use key::{AccessKey, KeyFields, RangeId};
pub use operation::OperationKind;
