//! Run settings and profile loading.

use std::{
  collections::BTreeMap,
  io::{BufRead, Write},
  path::{Path, PathBuf},
};

use anyhow::{Context as _, Result, bail};
use rekey_core::config::{Profile, ProfileFormat, parse_profiles};
use serde::Deserialize;

/// Settings read from `rekey.toml` and `REKEY_*` variables. Command-line
/// flags are applied on top by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// Folder holding the documents.
  pub input_dir: Option<PathBuf>,
  /// Profiles file, `.toml` or `.json`.
  pub profiles:  Option<PathBuf>,
  /// Profile to apply. Asked for on stdin when absent.
  pub profile:   Option<String>,
  pub dry_run:   bool,
}

impl Settings {
  pub fn load(path: &Path) -> Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("REKEY"))
      .build()
      .context("failed to read settings")?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn input_dir(&self) -> PathBuf {
    self.input_dir.clone().unwrap_or_else(|| PathBuf::from("."))
  }

  pub fn profiles_path(&self) -> PathBuf {
    self
      .profiles
      .clone()
      .unwrap_or_else(|| PathBuf::from("profiles.toml"))
  }
}

// ─── Profiles ────────────────────────────────────────────────────────────────

pub fn load_profiles(path: &Path) -> Result<BTreeMap<String, Profile>> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("reading profiles file {}", path.display()))?;
  let format = ProfileFormat::from_extension(path.extension().and_then(|e| e.to_str()));
  parse_profiles(&text, format)
    .with_context(|| format!("parsing profiles file {}", path.display()))
}

/// Pick the named profile, or ask on stdin when no name was given.
pub fn select_profile(
  mut profiles: BTreeMap<String, Profile>,
  name: Option<&str>,
) -> Result<(String, Profile)> {
  if profiles.is_empty() {
    bail!("the profiles file defines no profiles");
  }
  let name = match name {
    Some(name) => name.to_string(),
    None => prompt(&profiles)?,
  };
  match profiles.remove(&name) {
    Some(profile) => Ok((name, profile)),
    None => bail!(
      "unknown profile {name:?} (available: {})",
      profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    ),
  }
}

fn prompt(profiles: &BTreeMap<String, Profile>) -> Result<String> {
  let names: Vec<&String> = profiles.keys().collect();
  let mut out = std::io::stdout().lock();
  writeln!(out, "Profiles:")?;
  for (i, name) in names.iter().enumerate() {
    writeln!(out, "  {}. {name}", i + 1)?;
  }
  write!(out, "Choose a profile (number or name): ")?;
  out.flush()?;

  let mut line = String::new();
  std::io::stdin().lock().read_line(&mut line)?;
  let choice = line.trim();
  let picked = match choice.parse::<usize>() {
    Ok(n) if (1..=names.len()).contains(&n) => names[n - 1].clone(),
    Ok(n) => bail!("no profile number {n}"),
    Err(_) => choice.to_string(),
  };
  Ok(picked)
}
