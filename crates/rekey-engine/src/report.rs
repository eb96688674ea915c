//! Batch outcomes and non-fatal warnings.

use std::fmt;

use serde::Serialize;

use crate::classify::DocumentKind;

// ─── Warnings ────────────────────────────────────────────────────────────────

/// A condition worth reporting that never stops the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
  /// The `Id` attribute is too short to hold an access key.
  MalformedIdentifier { document: String, id: String },
  /// A new key could not be derived; the document keeps its old key.
  KeyLengthMismatch { document: String, reason: String },
  /// No replacement could be found for a reference.
  UnresolvedReference { document: String, reference: String },
  /// More than one document follows the sale naming convention.
  AmbiguousSale { kept: String, ignored: String },
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MalformedIdentifier { document, id } => {
        write!(f, "{document}: malformed identifier {id:?}, not mapped")
      }
      Self::KeyLengthMismatch { document, reason } => {
        write!(f, "{document}: new key not derived ({reason}), original kept")
      }
      Self::UnresolvedReference {
        document,
        reference,
      } => {
        write!(f, "{document}: no replacement found for reference {reference}")
      }
      Self::AmbiguousSale { kept, ignored } => {
        write!(f, "{ignored}: another sale document ({kept}) is already used")
      }
    }
  }
}

// ─── Per-document outcome ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DocumentOutcome {
  /// The document's own key (or its cancelled key) was rewritten.
  IdentityChanged,
  /// Only field values changed.
  FieldChanged,
  /// Nothing to change; not written.
  Skipped,
  /// Unreadable, or a mutation failed; left untouched.
  Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
  pub name:    String,
  pub kind:    DocumentKind,
  pub outcome: DocumentOutcome,
  /// Sorted, de-duplicated change descriptions.
  pub changes: Vec<String>,
}

// ─── Batch ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
  pub identity_changed: usize,
  pub field_changed:    usize,
  pub skipped:          usize,
  pub failed:           usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
  pub documents: Vec<DocumentReport>,
  pub warnings:  Vec<Warning>,
  pub dry_run:   bool,
}

impl BatchReport {
  pub fn counts(&self) -> Counts {
    let mut counts = Counts::default();
    for doc in &self.documents {
      match doc.outcome {
        DocumentOutcome::IdentityChanged => counts.identity_changed += 1,
        DocumentOutcome::FieldChanged => counts.field_changed += 1,
        DocumentOutcome::Skipped => counts.skipped += 1,
        DocumentOutcome::Failed(_) => counts.failed += 1,
      }
    }
    counts
  }

  pub fn document(&self, name: &str) -> Option<&DocumentReport> {
    self.documents.iter().find(|d| d.name == name)
  }
}
