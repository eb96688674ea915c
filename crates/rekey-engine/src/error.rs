//! Error types for `rekey-engine`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("xml error: {0}")]
  Xml(#[from] rekey_xml::Error),

  #[error("key error: {0}")]
  Key(#[from] rekey_core::Error),

  #[error("invalid decimal in <{field}>: {value:?}")]
  InvalidDecimal { field: String, value: String },

  #[error("missing node: {0}")]
  MissingNode(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
