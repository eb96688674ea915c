//! Primary invoice rewriting.

use rekey_core::{AccessKey, OperationKind, config::TaxComponent};
use rekey_xml::Element;
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
  classify::{DocumentFacts, locate_invoice},
  error::{Error, Result},
  fiscal::RESOLVER,
  mutate::{
    ChangeLog, Mutator,
    fields::{AddressBlock, apply_party, set_existing, set_existing_deep},
    tax::{self, ItemReform},
  },
};

pub(super) fn apply(
  m: &Mutator<'_>,
  root: &mut Element,
  facts: &DocumentFacts,
  log: &mut ChangeLog,
) -> Result<()> {
  let idx = locate_invoice(root).ok_or_else(|| Error::MissingNode("infNFe".into()))?;
  let inf = root
    .at_mut(&idx)
    .ok_or_else(|| Error::MissingNode("infNFe".into()))?;
  let profile = m.profile;

  // identification
  if let Some(ide) = RESOLVER.find_mut(inf, "ide") {
    if let Some(j) = profile.jurisdiction() {
      if set_existing(ide, "cUF", j) {
        log.record("identification: <cUF> updated");
      }
    }
    if let Some(s) = profile.series() {
      if set_existing(ide, "serie", s) {
        log.record("identification: <serie> updated");
      }
    }
  }

  if let Some(issuer) = profile.issuer() {
    apply_party(inf, AddressBlock::Issuer, issuer, log);
  }

  if let Some(addressee) = profile.addressee() {
    match facts.operation() {
      Some(OperationKind::Sale) => {
        apply_party(inf, AddressBlock::Pickup, addressee, log)
      }
      Some(OperationKind::Shipment | OperationKind::Return) => {
        apply_party(inf, AddressBlock::Recipient, addressee, log)
      }
      _ => {}
    }
  }

  items(m, inf, log)?;

  if let Some(ts) = &m.timestamp {
    if let Some(ide) = RESOLVER.find_mut(inf, "ide") {
      for tag in ["dhEmi", "dhSaiEnt"] {
        if set_existing(ide, tag, ts) {
          log.record(format!("date: <{tag}> updated"));
        }
      }
    }
  }

  // identity and protocol echo
  let old_key = facts.key.as_ref();
  let new_key = old_key.and_then(|k| m.mappings.keys.get(k));
  if let Some(new) = new_key {
    inf.set_attr("Id", format!("NFe{new}"));
    log.record_identity(format!("access key changed to {new}"));
  }

  if profile.rewrites_references() {
    let target = old_key
      .and_then(|k| m.mappings.references.get(k))
      .and_then(|referenced| m.mappings.keys.get(referenced));
    if let Some(new_ref) = target {
      if set_existing_deep(inf, "ide/NFref/refNFe", new_ref.as_str()) {
        log.record(format!("referenced key changed to {new_ref}"));
      }
    }
  }

  protocol(m, root, new_key, log);
  Ok(())
}

/// Product, tax, tax-code, zeroing and new-regime edits over every line item.
fn items(m: &Mutator<'_>, inf: &mut Element, log: &mut ChangeLog) -> Result<()> {
  let profile = m.profile;
  let mut removed: Vec<(TaxComponent, Decimal)> = Vec::new();
  let mut reform_sums = ItemReform::default();

  for idx in RESOLVER.locate_all(inf, "det") {
    let Some(det) = inf.at_mut(&idx) else { continue };
    let operation = RESOLVER
      .text(det, "prod/CFOP")
      .and_then(OperationKind::from_cfop);

    if let Some(product) = profile.product() {
      for (tag, value) in product.entries() {
        if set_existing(det, &format!("prod/{tag}"), value) {
          log.record(format!("product: <{tag}> updated"));
        }
      }
    }

    if let Some(imposto) = RESOLVER.find_mut(det, "imposto") {
      if let Some(taxes) = profile.taxes() {
        for (tag, value) in taxes.entries() {
          if set_existing_deep(imposto, tag, value) {
            log.record(format!("tax: <{tag}> updated"));
          }
        }
      }

      if let Some(rule) = operation.and_then(|op| profile.tax_code_rule(op)) {
        for (group, code) in rule.entries() {
          let Some(g) = RESOLVER.find_mut(imposto, group) else { continue };
          if set_existing_deep(g, "CST", code) {
            log.record(format!("tax code: <{group}> CST set to {code}"));
          }
        }
      }

      if let Some(op) = operation {
        for rule in profile.zero_rules() {
          if !rule.operations.contains(&op) {
            continue;
          }
          let Some(amount) = tax::zero_component(imposto, rule.component)? else {
            continue;
          };
          debug!(component = rule.component.tag(), %op, %amount, "component zeroed");
          log.record(format!("tax: {} zeroed for {op}", rule.component.tag()));
          match removed.iter_mut().find(|(c, _)| *c == rule.component) {
            Some((_, total)) => *total += amount,
            None => removed.push((rule.component, amount)),
          }
        }
      }
    }

    if let Some((reform, rates)) = &m.reform {
      if let Some(item) = tax::synthesize_item(det, reform, rates, log)? {
        reform_sums += item;
      }
    }
  }

  if !removed.is_empty() {
    tax::recompute_totals(inf, &removed, log)?;
  }
  if let Some((reform, _)) = &m.reform {
    tax::synthesize_totals(inf, reform, &reform_sums, log);
  }
  Ok(())
}

/// Keep `protNFe/infProt` in step with the rewritten block.
fn protocol(
  m: &Mutator<'_>,
  root: &mut Element,
  new_key: Option<&AccessKey>,
  log: &mut ChangeLog,
) {
  let Some(prot) = RESOLVER.find_deep_mut(root, "protNFe/infProt") else {
    return;
  };
  if let Some(new) = new_key {
    if set_existing(prot, "chNFe", new.as_str()) {
      log.record_identity("protocol: <chNFe> synchronized");
    }
  }
  if let Some(ts) = &m.timestamp {
    if set_existing(prot, "dhRecbto", ts) {
      log.record("protocol: <dhRecbto> updated");
    }
  }
}
