//! Canonical file naming, the stage that runs before editing.
//!
//! Names carry the document's sequence number and, for documents tied to
//! another invoice, that invoice's number. The edit stage relies on the sale
//! convention to find the batch's canonical sale ([`is_sale_file_name`]).

use std::collections::{BTreeMap, BTreeSet};

use rekey_core::{OperationKind, key::referenced_sequence, store::DocumentStore};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
  batch::load,
  classify::DocumentKind,
  error::{Error, Result},
  fiscal::{CANCELLATION_EVENT, trim_zeros},
  mapping::ScannedDocument,
};

const SALE_SUFFIX: &str = " - Venda.xml";

/// Whether `name` follows the sale naming convention.
pub fn is_sale_file_name(name: &str) -> bool { name.ends_with("Venda.xml") }

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenamePlan {
  pub from: String,
  pub to:   String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenameReport {
  pub renamed: Vec<RenamePlan>,
  /// Target already taken by another document.
  pub skipped: Vec<RenamePlan>,
  /// Name and reason.
  pub failed:  Vec<(String, String)>,
  pub dry_run: bool,
}

// ─── Naming rules ────────────────────────────────────────────────────────────

fn invoice_name(doc: &ScannedDocument) -> Option<String> {
  let f = &doc.facts;
  let n = trim_zeros(f.sequence.as_deref()?);
  let referenced = f.reference.as_deref().and_then(referenced_sequence);
  let nature = f.nature.as_deref().unwrap_or_default();
  let note = f.annotation.as_deref().unwrap_or_default();

  match (f.operation()?, referenced) {
    (OperationKind::Devolution, Some(r)) => match nature {
      "Retorno de mercadoria nao entregue" => {
        Some(format!("{n} - Insucesso de entrega da venda {r}.xml"))
      }
      "Devolucao de mercadorias"
        if note.contains("DEVOLUTION_PLACES") || note.contains("SALE_DEVOLUTION") =>
      {
        Some(format!("{n} - Devoluçao pro Mercado Livre da venda - {r}.xml"))
      }
      "Devolucao de mercadorias" if note.contains("DEVOLUTION_devolution") => {
        Some(format!("{n} - Devolucao da venda {r}.xml"))
      }
      _ => None,
    },
    (OperationKind::Sale, _) => Some(format!("{n}{SALE_SUFFIX}")),
    (OperationKind::Return, Some(r)) => match nature {
      "Outras Entradas - Retorno Simbolico de Deposito Temporario" => {
        Some(format!("{n} - Retorno da remessa {r}.xml"))
      }
      "Outras Entradas - Retorno de Deposito Temporario" => {
        Some(format!("{n} - Retorno Efetivo da remessa {r}.xml"))
      }
      _ => None,
    },
    (OperationKind::Shipment, Some(r)) => {
      Some(format!("{n} - Remessa simbólica da venda {r}.xml"))
    }
    (OperationKind::Shipment, None) => Some(format!("{n} - Remessa.xml")),
    _ => None,
  }
}

/// Propose canonical names. Invoices come first, then cancellation events of
/// invoices present in the batch. Documents already correctly named are left
/// out.
pub fn plan_renames(documents: &[ScannedDocument]) -> Vec<RenamePlan> {
  let invoices: Vec<&ScannedDocument> = documents
    .iter()
    .filter(|d| d.facts.kind == DocumentKind::PrimaryInvoice)
    .collect();
  let numbers: BTreeMap<&str, &str> = invoices
    .iter()
    .filter_map(|d| {
      let key = d.facts.key.as_ref()?;
      Some((key.as_str(), d.facts.sequence.as_deref()?))
    })
    .collect();

  let mut plans: Vec<RenamePlan> = invoices
    .iter()
    .filter_map(|d| {
      invoice_name(d).map(|to| RenamePlan {
        from: d.name.clone(),
        to,
      })
    })
    .collect();

  plans.extend(documents.iter().filter_map(|d| {
    let f = &d.facts;
    if f.kind != DocumentKind::VoidNotice
      || f.event_type.as_deref() != Some(CANCELLATION_EVENT)
    {
      return None;
    }
    let n = numbers.get(f.key.as_ref()?.as_str())?;
    Some(RenamePlan {
      from: d.name.clone(),
      to:   format!("CAN-{}.xml", trim_zeros(n)),
    })
  }));

  plans.retain(|p| p.from != p.to);
  plans
}

// ─── Execution ───────────────────────────────────────────────────────────────

/// Rename every document in `store` to its canonical name. Existing files are
/// never overwritten; in a dry run the renames are only simulated.
pub fn rename_batch<S: DocumentStore>(
  store: &mut S,
  dry_run: bool,
) -> Result<RenameReport> {
  let loaded = load(store)?;
  let mut report = RenameReport {
    dry_run,
    ..Default::default()
  };
  let mut names: BTreeSet<String> = BTreeSet::new();
  let mut scanned = Vec::with_capacity(loaded.len());
  for doc in &loaded {
    names.insert(doc.name.clone());
    if let Err(reason) = &doc.root {
      report.failed.push((doc.name.clone(), reason.clone()));
      continue;
    }
    scanned.push(ScannedDocument {
      name:  doc.name.clone(),
      facts: doc.facts(),
    });
  }

  for plan in plan_renames(&scanned) {
    if names.contains(&plan.to) {
      warn!(from = %plan.from, to = %plan.to, "target exists, not renamed");
      report.skipped.push(plan);
      continue;
    }
    if !dry_run {
      if let Err(e) = store.rename(&plan.from, &plan.to).map_err(Error::store) {
        warn!(from = %plan.from, error = %e, "rename failed");
        report.failed.push((plan.from.clone(), e.to_string()));
        continue;
      }
    }
    info!(from = %plan.from, to = %plan.to, "renamed");
    names.remove(&plan.from);
    names.insert(plan.to.clone());
    report.renamed.push(plan);
  }

  Ok(report)
}

#[cfg(test)]
mod tests {
  use rekey_core::AccessKey;

  use super::*;
  use crate::classify::DocumentFacts;

  fn invoice(name: &str, seq: &str, cfop: &str) -> ScannedDocument {
    let mut facts = DocumentFacts::unrecognized();
    facts.kind = DocumentKind::PrimaryInvoice;
    let key = format!("3524011234567800019955001{seq:0>9}1000000010");
    facts.key = AccessKey::parse(&key).ok();
    facts.sequence = Some(seq.into());
    facts.cfop = Some(cfop.into());
    ScannedDocument {
      name: name.into(),
      facts,
    }
  }

  fn with_reference(mut doc: ScannedDocument, nature: &str, note: &str) -> ScannedDocument {
    doc.facts.reference = Some("35240112345678000199550010000000771000000015".into());
    doc.facts.nature = Some(nature.into());
    doc.facts.annotation = Some(note.into()).filter(|n: &String| !n.is_empty());
    doc
  }

  fn target(doc: ScannedDocument) -> Option<String> {
    plan_renames(&[doc]).pop().map(|p| p.to)
  }

  #[test]
  fn sale_and_shipment_names() {
    assert_eq!(target(invoice("a.xml", "123", "5102")).as_deref(), Some("123 - Venda.xml"));
    assert_eq!(target(invoice("b.xml", "124", "5949")).as_deref(), Some("124 - Remessa.xml"));
    let symbolic = with_reference(invoice("c.xml", "125", "5949"), "Remessa", "");
    assert_eq!(
      target(symbolic).as_deref(),
      Some("125 - Remessa simbólica da venda 77.xml")
    );
  }

  #[test]
  fn devolution_names_depend_on_nature_and_note() {
    let failed = with_reference(
      invoice("a.xml", "9", "1202"),
      "Retorno de mercadoria nao entregue",
      "",
    );
    assert_eq!(
      target(failed).as_deref(),
      Some("9 - Insucesso de entrega da venda 77.xml")
    );
    let marketplace = with_reference(
      invoice("b.xml", "10", "1202"),
      "Devolucao de mercadorias",
      "ref SALE_DEVOLUTION 1",
    );
    assert_eq!(
      target(marketplace).as_deref(),
      Some("10 - Devoluçao pro Mercado Livre da venda - 77.xml")
    );
    let plain = with_reference(
      invoice("c.xml", "11", "1202"),
      "Devolucao de mercadorias",
      "DEVOLUTION_devolution",
    );
    assert_eq!(target(plain).as_deref(), Some("11 - Devolucao da venda 77.xml"));
    let unknown = with_reference(invoice("d.xml", "12", "1202"), "Outra", "");
    assert_eq!(target(unknown), None);
    // no reference, no name
    assert_eq!(target(invoice("e.xml", "13", "1202")), None);
  }

  #[test]
  fn return_names() {
    let symbolic = with_reference(
      invoice("a.xml", "20", "1949"),
      "Outras Entradas - Retorno Simbolico de Deposito Temporario",
      "",
    );
    assert_eq!(target(symbolic).as_deref(), Some("20 - Retorno da remessa 77.xml"));
    let effective = with_reference(
      invoice("b.xml", "21", "1949"),
      "Outras Entradas - Retorno de Deposito Temporario",
      "",
    );
    assert_eq!(
      target(effective).as_deref(),
      Some("21 - Retorno Efetivo da remessa 77.xml")
    );
  }

  #[test]
  fn cancellation_of_known_invoice() {
    let sale = invoice("sale.xml", "123", "5102");
    let mut facts = DocumentFacts::unrecognized();
    facts.kind = DocumentKind::VoidNotice;
    facts.key = sale.facts.key.clone();
    facts.event_type = Some(CANCELLATION_EVENT.into());
    let event = ScannedDocument {
      name: "evt.xml".into(),
      facts,
    };
    let mut orphan = event.clone();
    orphan.name = "orphan.xml".into();
    orphan.facts.key = AccessKey::parse(&"0".repeat(44)).ok();

    let plans = plan_renames(&[sale, event, orphan]);
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[1].to, "CAN-123.xml");
  }

  #[test]
  fn correctly_named_documents_are_left_alone() {
    assert!(plan_renames(&[invoice("123 - Venda.xml", "123", "5102")]).is_empty());
    assert!(is_sale_file_name("123 - Venda.xml"));
    assert!(!is_sale_file_name("123 - Remessa.xml"));
  }
}
