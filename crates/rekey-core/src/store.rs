//! The `DocumentStore` trait and an in-memory implementation.
//!
//! The trait is implemented by storage backends (e.g. `rekey-store-fs`).
//! The batch engine depends on this abstraction, not on any concrete backend.

use std::collections::BTreeMap;

use crate::error::Error;

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A flat collection of named XML documents.
///
/// Names are bare file names (`"123 - Venda.xml"`), never paths.
pub trait DocumentStore {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Names of every XML document in the store, in name order.
  fn list(&self) -> Result<Vec<String>, Self::Error>;

  /// Raw bytes of the named document.
  fn read(&self, name: &str) -> Result<Vec<u8>, Self::Error>;

  /// Replace the named document's contents, creating it if absent.
  fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), Self::Error>;

  fn exists(&self, name: &str) -> Result<bool, Self::Error>;

  /// Rename a document. Fails if `to` already exists.
  fn rename(&mut self, from: &str, to: &str) -> Result<(), Self::Error>;
}

// ─── In-memory store ─────────────────────────────────────────────────────────

/// A [`DocumentStore`] held entirely in memory. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  documents: BTreeMap<String, Vec<u8>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Builder-style insert.
  pub fn with(mut self, name: &str, contents: impl Into<Vec<u8>>) -> Self {
    self.documents.insert(name.to_string(), contents.into());
    self
  }

  pub fn get(&self, name: &str) -> Option<&[u8]> {
    self.documents.get(name).map(Vec::as_slice)
  }

  /// The named document as UTF-8 text, if present and valid.
  pub fn text(&self, name: &str) -> Option<&str> {
    self.get(name).and_then(|b| std::str::from_utf8(b).ok())
  }

  pub fn names(&self) -> impl Iterator<Item = &str> {
    self.documents.keys().map(String::as_str)
  }
}

fn is_xml(name: &str) -> bool {
  name
    .rsplit_once('.')
    .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("xml"))
}

impl DocumentStore for MemoryStore {
  type Error = Error;

  fn list(&self) -> Result<Vec<String>, Error> {
    Ok(
      self
        .documents
        .keys()
        .filter(|n| is_xml(n))
        .cloned()
        .collect(),
    )
  }

  fn read(&self, name: &str) -> Result<Vec<u8>, Error> {
    self
      .documents
      .get(name)
      .cloned()
      .ok_or_else(|| Error::DocumentNotFound(name.to_string()))
  }

  fn write(&mut self, name: &str, bytes: &[u8]) -> Result<(), Error> {
    self.documents.insert(name.to_string(), bytes.to_vec());
    Ok(())
  }

  fn exists(&self, name: &str) -> Result<bool, Error> {
    Ok(self.documents.contains_key(name))
  }

  fn rename(&mut self, from: &str, to: &str) -> Result<(), Error> {
    if from == to {
      return Ok(());
    }
    if self.documents.contains_key(to) {
      return Err(Error::DocumentExists(to.to_string()));
    }
    let bytes = self
      .documents
      .remove(from)
      .ok_or_else(|| Error::DocumentNotFound(from.to_string()))?;
    self.documents.insert(to.to_string(), bytes);
    Ok(())
  }
}
