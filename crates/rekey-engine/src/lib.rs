//! The rekey pipeline: classify a batch of fiscal documents, derive the new
//! access keys, then rewrite every document against the finished mapping.
//!
//! Entry points are [`batch::edit_batch`] for the two-pass edit and
//! [`rename::rename_batch`] for the renaming stage that precedes it. Both run
//! over any [`rekey_core::store::DocumentStore`].

pub mod batch;
pub mod classify;
pub mod error;
pub mod fiscal;
pub mod mapping;
pub mod mutate;
pub mod rename;
pub mod report;

pub use batch::{BatchOptions, edit_batch};
pub use classify::{DocumentFacts, DocumentKind, classify};
pub use error::{Error, Result};
pub use mapping::{KeySubstitution, Mappings, ScannedDocument};
pub use mutate::{ChangeLog, Mutator};
pub use rename::{RenamePlan, RenameReport, plan_renames, rename_batch};
pub use report::{BatchReport, Counts, DocumentOutcome, Warning};

#[cfg(test)]
mod tests;
