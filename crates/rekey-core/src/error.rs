//! Error types for `rekey-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("expected {expected} characters, got {actual}")]
  InvalidLength { expected: usize, actual: usize },

  #[error("non-digit character in {0:?}")]
  NonDigit(String),

  #[error("{field} value {value:?} does not fit in {width} digits")]
  FieldTooLong {
    field: &'static str,
    width: usize,
    value: String,
  },

  #[error("invalid date {0:?}, expected dd/mm/yyyy")]
  InvalidDate(String),

  #[error("invalid decimal in {field}: {value:?}")]
  InvalidDecimal { field: &'static str, value: String },

  #[error("document not found: {0}")]
  DocumentNotFound(String),

  #[error("document already exists: {0}")]
  DocumentExists(String),

  #[error("profile error: {0}")]
  Profile(String),

  #[error("toml error: {0}")]
  Toml(#[from] toml::de::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
