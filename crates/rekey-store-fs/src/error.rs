//! Error type for `rekey-store-fs`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("not a directory: {0}")]
  NotADirectory(PathBuf),

  /// A rename would have replaced an existing document.
  #[error("target already exists: {0}")]
  TargetExists(String),

  #[error("invalid document name: {0:?}")]
  InvalidName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
