//! The batch orchestrator: load, classify, map, then mutate and persist.
//!
//! Mapping completes over the whole batch before any document is mutated.
//! Only listing the store is fatal; every per-document problem becomes a
//! [`DocumentOutcome::Failed`] entry and the batch moves on.

use chrono::NaiveTime;
use rekey_core::{config::Profile, store::DocumentStore};
use rekey_xml::{Element, Serializer, parse_lenient};
use tracing::{debug, info, warn};

use crate::{
  classify::{DocumentFacts, DocumentKind, classify},
  error::{Error, Result},
  mapping::{self, ScannedDocument},
  mutate::Mutator,
  report::{BatchReport, DocumentOutcome, DocumentReport},
};

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
  /// Compute the report without writing anything back.
  pub dry_run: bool,
  /// Time of day for every rewritten timestamp in this run.
  pub time:    NaiveTime,
}

/// One listed document: its parsed tree, or why it could not be read.
pub(crate) struct Loaded {
  pub name: String,
  pub root: Result<Element, String>,
}

impl Loaded {
  pub fn facts(&self) -> DocumentFacts {
    match &self.root {
      Ok(root) => classify(root),
      Err(_) => DocumentFacts::unrecognized(),
    }
  }
}

/// Read and parse every document in the store, in listing order.
pub(crate) fn load<S: DocumentStore>(store: &S) -> Result<Vec<Loaded>> {
  let names = store.list().map_err(Error::store)?;
  let mut out = Vec::with_capacity(names.len());
  for name in names {
    let root = store
      .read(&name)
      .map_err(|e| format!("read failed: {e}"))
      .and_then(|bytes| {
        parse_lenient(&bytes).map_err(|e| format!("unreadable: {e}"))
      });
    if let Err(reason) = &root {
      warn!(document = %name, %reason, "document not loaded");
    }
    out.push(Loaded { name, root });
  }
  Ok(out)
}

/// Rekey and rewrite every document in `store` according to `profile`.
pub fn edit_batch<S: DocumentStore>(
  store: &mut S,
  profile: &Profile,
  opts: &BatchOptions,
) -> Result<BatchReport> {
  let mut loaded = load(store)?;

  let scanned: Vec<ScannedDocument> = loaded
    .iter()
    .map(|doc| ScannedDocument {
      name:  doc.name.clone(),
      facts: doc.facts(),
    })
    .collect();
  let mappings = mapping::build(profile, &scanned)?;
  info!(
    documents = scanned.len(),
    mapped = mappings.keys.len(),
    "mapping complete"
  );
  let mutator = Mutator::new(profile, &mappings, opts.time)?;

  let mut report = BatchReport {
    warnings: mappings.warnings.clone(),
    dry_run: opts.dry_run,
    ..Default::default()
  };
  let serializer = Serializer::new();

  for (doc, scan) in loaded.iter_mut().zip(&scanned) {
    let kind = scan.facts.kind;
    let root = match &mut doc.root {
      Ok(root) => root,
      Err(reason) => {
        report.documents.push(failed(&doc.name, kind, reason.clone()));
        continue;
      }
    };
    if kind == DocumentKind::Unrecognized {
      debug!(document = %doc.name, "unrecognized, skipped");
      report.documents.push(DocumentReport {
        name: doc.name.clone(),
        kind,
        outcome: DocumentOutcome::Skipped,
        changes: Vec::new(),
      });
      continue;
    }

    let log = match mutator.apply(&doc.name, root, &scan.facts) {
      Ok(log) => log,
      Err(e) => {
        warn!(document = %doc.name, error = %e, "mutation failed");
        report.documents.push(failed(&doc.name, kind, e.to_string()));
        continue;
      }
    };
    report.warnings.extend(log.warnings().iter().cloned());

    if log.is_empty() {
      debug!(document = %doc.name, "no changes");
      report.documents.push(DocumentReport {
        name: doc.name.clone(),
        kind,
        outcome: DocumentOutcome::Skipped,
        changes: Vec::new(),
      });
      continue;
    }

    if !opts.dry_run {
      let written = serializer
        .to_bytes(root)
        .map_err(Error::from)
        .and_then(|bytes| store.write(&doc.name, &bytes).map_err(Error::store));
      if let Err(e) = written {
        warn!(document = %doc.name, error = %e, "write failed");
        report.documents.push(failed(&doc.name, kind, e.to_string()));
        continue;
      }
    }

    let outcome = if log.identity_changed() {
      DocumentOutcome::IdentityChanged
    } else {
      DocumentOutcome::FieldChanged
    };
    let changes = log.descriptions();
    info!(document = %doc.name, %kind, changes = changes.len(), "document rewritten");
    report.documents.push(DocumentReport {
      name: doc.name.clone(),
      kind,
      outcome,
      changes,
    });
  }

  let counts = report.counts();
  info!(
    identity_changed = counts.identity_changed,
    field_changed = counts.field_changed,
    skipped = counts.skipped,
    failed = counts.failed,
    dry_run = opts.dry_run,
    "batch complete"
  );
  Ok(report)
}

fn failed(name: &str, kind: DocumentKind, reason: String) -> DocumentReport {
  DocumentReport {
    name: name.to_string(),
    kind,
    outcome: DocumentOutcome::Failed(reason),
    changes: Vec::new(),
  }
}
