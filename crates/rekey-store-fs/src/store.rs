//! [`FsStore`]: the directory implementation of [`DocumentStore`].

use std::{
  fs,
  path::{Path, PathBuf},
};

use rekey_core::store::DocumentStore;
use tracing::debug;

use crate::{Error, Result};

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FsStore {
  root: PathBuf,
}

impl FsStore {
  /// Open an existing directory.
  pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
    let root = dir.as_ref().to_path_buf();
    if !fs::metadata(&root)?.is_dir() {
      return Err(Error::NotADirectory(root));
    }
    Ok(Self { root })
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Full path of a document. Names are bare file names; anything that
  /// would escape the directory is refused.
  fn path(&self, name: &str) -> Result<PathBuf> {
    let bare = Path::new(name)
      .file_name()
      .is_some_and(|f| f == std::ffi::OsStr::new(name));
    if !bare || name.is_empty() {
      return Err(Error::InvalidName(name.to_string()));
    }
    Ok(self.root.join(name))
  }
}

fn is_xml(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for FsStore {
  type Error = Error;

  fn list(&self) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(&self.root)? {
      let entry = entry?;
      let path = entry.path();
      if !entry.file_type()?.is_file() || !is_xml(&path) {
        continue;
      }
      match entry.file_name().into_string() {
        Ok(name) => names.push(name),
        Err(raw) => debug!(name = ?raw, "skipping non-UTF-8 file name"),
      }
    }
    names.sort();
    Ok(names)
  }

  fn read(&self, name: &str) -> Result<Vec<u8>> {
    Ok(fs::read(self.path(name)?)?)
  }

  fn write(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
    let path = self.path(name)?;
    fs::write(&path, bytes)?;
    debug!(path = %path.display(), bytes = bytes.len(), "document written");
    Ok(())
  }

  fn exists(&self, name: &str) -> Result<bool> {
    Ok(self.path(name)?.try_exists()?)
  }

  fn rename(&mut self, from: &str, to: &str) -> Result<()> {
    if from == to {
      return Ok(());
    }
    let source = self.path(from)?;
    let target = self.path(to)?;
    if target.try_exists()? {
      return Err(Error::TargetExists(to.to_string()));
    }
    fs::rename(&source, &target)?;
    debug!(from, to, "document renamed");
    Ok(())
  }
}
