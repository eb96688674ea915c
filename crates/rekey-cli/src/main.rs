//! `rekey`: rename and rekey a folder of fiscal XML documents.
//!
//! # Usage
//!
//! ```
//! rekey --input-dir ./xmls --profiles profiles.toml --profile ACME run
//! rekey --dry-run edit
//! ```
//!
//! Settings come from `rekey.toml` (or `--config`) and `REKEY_*` variables;
//! flags override both.

mod output;
mod settings;

use std::{
  io::{self, Write as _},
  path::PathBuf,
};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use rekey_engine::{BatchOptions, edit_batch, rename_batch};
use rekey_store_fs::FsStore;
use settings::{Settings, load_profiles, select_profile};
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "rekey", version, about = "Rekey fiscal XML documents")]
struct Cli {
  /// Settings file.
  #[arg(short, long, global = true, default_value = "rekey.toml")]
  config: PathBuf,

  /// Folder holding the XML documents.
  #[arg(short, long, global = true)]
  input_dir: Option<PathBuf>,

  /// Profiles file (`.toml` or `.json`).
  #[arg(long, global = true)]
  profiles: Option<PathBuf>,

  /// Profile to apply; asked for interactively when omitted.
  #[arg(short, long, global = true)]
  profile: Option<String>,

  /// Compute and print the report without touching any file.
  #[arg(long, global = true)]
  dry_run: bool,

  /// Print reports as JSON.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
  /// Give every document its canonical file name.
  Rename,
  /// Rekey and rewrite every document with the selected profile.
  Edit,
  /// Rename, then edit.
  Run,
}

// ─── Entry point ─────────────────────────────────────────────────────────────

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let mut settings = Settings::load(&cli.config)?;
  if cli.input_dir.is_some() {
    settings.input_dir = cli.input_dir.clone();
  }
  if cli.profiles.is_some() {
    settings.profiles = cli.profiles.clone();
  }
  if cli.profile.is_some() {
    settings.profile = cli.profile.clone();
  }
  settings.dry_run |= cli.dry_run;

  let dir = settings.input_dir();
  let mut store = FsStore::open(&dir)
    .with_context(|| format!("failed to open input folder {}", dir.display()))?;

  if matches!(cli.command, Command::Rename | Command::Run) {
    rename(&mut store, &settings, cli.json)?;
  }
  if matches!(cli.command, Command::Edit | Command::Run) {
    edit(&mut store, &settings, cli.json)?;
  }
  Ok(())
}

fn rename(store: &mut FsStore, settings: &Settings, json: bool) -> Result<()> {
  info!(dir = %store.root().display(), dry_run = settings.dry_run, "renaming");
  let report = rename_batch(store, settings.dry_run).context("renaming failed")?;
  let mut out = io::stdout().lock();
  if json {
    serde_json::to_writer_pretty(&mut out, &report)?;
    writeln!(out)?;
  } else {
    output::print_rename(&mut out, &report)?;
  }
  Ok(())
}

fn edit(store: &mut FsStore, settings: &Settings, json: bool) -> Result<()> {
  let profiles = load_profiles(&settings.profiles_path())?;
  let (name, profile) = select_profile(profiles, settings.profile.as_deref())?;
  info!(profile = %name, dry_run = settings.dry_run, "editing");

  let opts = BatchOptions {
    dry_run: settings.dry_run,
    time:    chrono::Local::now().time(),
  };
  let report = edit_batch(store, &profile, &opts).context("editing failed")?;
  let mut out = io::stdout().lock();
  if json {
    serde_json::to_writer_pretty(&mut out, &report)?;
    writeln!(out)?;
  } else {
    output::print_batch(&mut out, &report)?;
  }
  Ok(())
}
