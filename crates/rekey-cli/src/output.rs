//! Human-readable report printing.

use std::io::{self, Write};

use rekey_engine::{BatchReport, DocumentOutcome, RenameReport};

pub fn print_rename(out: &mut impl Write, report: &RenameReport) -> io::Result<()> {
  let verb = if report.dry_run { "would rename" } else { "renamed" };
  for plan in &report.renamed {
    writeln!(out, "  [OK] {} -> {}", plan.from, plan.to)?;
  }
  for plan in &report.skipped {
    writeln!(out, "  [SKIPPED] {} -> {} (target exists)", plan.from, plan.to)?;
  }
  for (name, reason) in &report.failed {
    writeln!(out, "  [ERROR] {name}: {reason}")?;
  }
  writeln!(
    out,
    "\n{} {verb}, {} skipped, {} errors.",
    report.renamed.len(),
    report.skipped.len(),
    report.failed.len()
  )
}

pub fn print_batch(out: &mut impl Write, report: &BatchReport) -> io::Result<()> {
  for doc in &report.documents {
    match &doc.outcome {
      DocumentOutcome::Skipped => continue,
      DocumentOutcome::Failed(reason) => {
        writeln!(out, "  [ERROR] {}: {reason}", doc.name)?;
        continue;
      }
      DocumentOutcome::IdentityChanged | DocumentOutcome::FieldChanged => {}
    }
    writeln!(out, "  [EDITED] {} ({})", doc.name, doc.kind)?;
    for change in &doc.changes {
      writeln!(out, "      - {change}")?;
    }
  }

  if !report.warnings.is_empty() {
    writeln!(out, "\nWarnings:")?;
    for warning in &report.warnings {
      writeln!(out, "  {warning}")?;
    }
  }

  let c = report.counts();
  let suffix = if report.dry_run { " (dry run, nothing written)" } else { "" };
  writeln!(
    out,
    "\n{} rekeyed, {} edited, {} unchanged, {} errors.{suffix}",
    c.identity_changed, c.field_changed, c.skipped, c.failed
  )
}
