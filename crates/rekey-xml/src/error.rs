//! Error types for `rekey-xml`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("xml parse error: {0}")]
  Parse(String),

  #[error("document has no root element")]
  Empty,

  #[error("xml write error: {0}")]
  Write(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
