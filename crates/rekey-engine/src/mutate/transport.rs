//! Transport document rewriting.

use rekey_xml::Element;
use tracing::warn;

use crate::{
  classify::{DocumentFacts, locate_transport},
  error::{Error, Result},
  fiscal::RESOLVER,
  mutate::{
    ChangeLog, Mutator,
    fields::{AddressBlock, apply_party, set_existing},
  },
  report::Warning,
};

pub(super) fn apply(
  m: &Mutator<'_>,
  name: &str,
  root: &mut Element,
  facts: &DocumentFacts,
  log: &mut ChangeLog,
) -> Result<()> {
  let idx = locate_transport(root).ok_or_else(|| Error::MissingNode("infCte".into()))?;
  let inf = root
    .at_mut(&idx)
    .ok_or_else(|| Error::MissingNode("infCte".into()))?;

  if let Some(new) = facts.key.as_ref().and_then(|k| m.mappings.keys.get(k)) {
    inf.set_attr("Id", format!("CTe{new}"));
    log.record_identity(format!("access key changed to {new}"));
  }

  if let Some(ide) = RESOLVER.find_mut(inf, "ide") {
    if let Some(j) = m.profile.jurisdiction() {
      if set_existing(ide, "cUF", j) {
        log.record("identification: <cUF> updated");
      }
    }
    if let Some(ts) = &m.timestamp {
      if set_existing(ide, "dhEmi", ts) {
        log.record("date: <dhEmi> updated");
      }
    }
  }

  invoice_reference(m, name, inf, log);

  if let Some(issuer) = m.profile.issuer() {
    apply_party(inf, AddressBlock::Sender, issuer, log);
  }

  let id = inf
    .attr("Id")
    .and_then(|id| id.strip_prefix("CTe"))
    .map(str::to_string);
  if let Some(prot) = RESOLVER.find_deep_mut(root, "protCTe/infProt") {
    if let Some(id) = id {
      if set_existing(prot, "chCTe", &id) {
        log.record_identity("protocol: <chCTe> synchronized");
      }
    }
    if let Some(ts) = &m.timestamp {
      if set_existing(prot, "dhRecbto", ts) {
        log.record("protocol: <dhRecbto> updated");
      }
    }
  }
  Ok(())
}

/// Point the embedded invoice key at its new value: a mapping hit (direct or
/// through the sequence number it carries), else the batch's sale key.
fn invoice_reference(
  m: &Mutator<'_>,
  name: &str,
  inf: &mut Element,
  log: &mut ChangeLog,
) {
  let Some(doc) = RESOLVER.find_deep_mut(inf, "infCTeNorm/infDoc") else {
    return;
  };
  let Some(chave) = RESOLVER.find_deep_mut(doc, "infNFe/chave") else {
    return;
  };
  let current = chave.text().trim().to_string();

  if let Some(new) = m.mappings.resolve_reference(&current) {
    if new.as_str() != current {
      chave.set_text(new.as_str());
      log.record(format!("invoice reference changed to {new}"));
    }
    return;
  }
  match &m.mappings.sale_key {
    Some(sale) if sale.as_str() != current => {
      chave.set_text(sale.as_str());
      log.record(format!("invoice reference forced to sale key {sale}"));
    }
    Some(_) => {}
    None => {
      warn!(document = name, reference = %current, "no replacement for invoice reference");
      log.warn(Warning::UnresolvedReference {
        document:  name.to_string(),
        reference: current,
      });
    }
  }
}
