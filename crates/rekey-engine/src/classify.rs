//! Document classification and fact extraction.
//!
//! Classification order, first match wins: an `infNFe` block whose `Id` starts
//! with `NFe`; an `infCte` block whose `Id` starts with `CTe`; a root naming a
//! cancellation event wrapper; a root naming a void-range registration.
//! Anything else is [`DocumentKind::Unrecognized`].

use rekey_core::{AccessKey, OperationKind};
use rekey_xml::Element;
use serde::Serialize;
use strum::Display;

use crate::fiscal::RESOLVER;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentKind {
  PrimaryInvoice,
  TransportDocument,
  VoidNotice,
  VoidRegistration,
  Unrecognized,
}

/// What the mapping pass and the renaming planner need from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFacts {
  pub kind:         DocumentKind,
  /// Own access key with check digit. For a void notice, the cancelled key.
  pub key:          Option<AccessKey>,
  /// Raw `Id` attribute of an invoice or transport document that does not
  /// carry a 44-digit key. Such documents classify as unrecognized.
  pub malformed_id: Option<String>,
  pub issuer_id:    Option<String>,
  pub sequence:     Option<String>,
  /// Referenced access key (`refNFe` on invoices, `chave` on transport).
  pub reference:    Option<String>,
  /// Free text used to tell return sub-kinds apart (`xTexto`).
  pub annotation:   Option<String>,
  /// Operation code of the first line item.
  pub cfop:         Option<String>,
  /// Nature-of-operation text (`natOp`).
  pub nature:       Option<String>,
  /// Event type code of a void notice (`tpEvento`).
  pub event_type:   Option<String>,
}

impl DocumentFacts {
  fn new(kind: DocumentKind) -> Self {
    Self {
      kind,
      key: None,
      malformed_id: None,
      issuer_id: None,
      sequence: None,
      reference: None,
      annotation: None,
      cfop: None,
      nature: None,
      event_type: None,
    }
  }

  pub fn unrecognized() -> Self { Self::new(DocumentKind::Unrecognized) }

  /// Operation category of the first line item, if its code is known.
  pub fn operation(&self) -> Option<OperationKind> {
    self.cfop.as_deref().and_then(OperationKind::from_cfop)
  }
}

/// Index path of the main info block: `<wrapper>/<info>` below the root, or
/// `<info>` directly when the root is the wrapper itself.
pub fn locate_info(root: &Element, wrapper: &str, info: &str) -> Option<Vec<usize>> {
  if root.local() == wrapper {
    RESOLVER.locate(root, info)
  } else {
    RESOLVER.locate(root, &format!("{wrapper}/{info}"))
  }
}

/// Index path of the invoice info block, if the document is an invoice.
pub fn locate_invoice(root: &Element) -> Option<Vec<usize>> {
  locate_prefixed(root, "NFe", "infNFe", "NFe")
}

/// Index path of the transport info block, if the document is one.
pub fn locate_transport(root: &Element) -> Option<Vec<usize>> {
  locate_prefixed(root, "CTe", "infCte", "CTe")
}

fn locate_prefixed(
  root: &Element,
  wrapper: &str,
  info: &str,
  prefix: &str,
) -> Option<Vec<usize>> {
  let idx = locate_info(root, wrapper, info)?;
  let id = root.at(&idx)?.attr("Id")?;
  id.starts_with(prefix).then_some(idx)
}

pub fn is_void_notice(root: &Element) -> bool {
  let local = root.local();
  local.contains("procEventoNFe") || local == "evento"
}

pub fn is_void_registration(root: &Element) -> bool {
  root.local().contains("InutNFe")
}

pub fn classify(root: &Element) -> DocumentFacts {
  if let Some(info) = locate_invoice(root).and_then(|idx| root.at(&idx)) {
    return keyed(invoice_facts(info));
  }
  if let Some(info) = locate_transport(root).and_then(|idx| root.at(&idx)) {
    return keyed(transport_facts(info));
  }
  if is_void_notice(root) {
    return void_notice_facts(root);
  }
  if is_void_registration(root) {
    return void_registration_facts(root);
  }
  DocumentFacts::unrecognized()
}

/// A keyed document whose `Id` cannot carry a key is left out entirely.
fn keyed(facts: DocumentFacts) -> DocumentFacts {
  match facts.malformed_id {
    Some(id) => DocumentFacts {
      malformed_id: Some(id),
      ..DocumentFacts::unrecognized()
    },
    None => facts,
  }
}

fn owned(text: Option<&str>) -> Option<String> {
  text.filter(|t| !t.is_empty()).map(str::to_string)
}

/// Split the `Id` attribute into a key, or keep it as malformed.
fn read_id(facts: &mut DocumentFacts, info: &Element) {
  let Some(id) = info.attr("Id") else { return };
  match AccessKey::parse(id.get(3..).unwrap_or_default().trim()) {
    Ok(key) => facts.key = Some(key),
    Err(_) => facts.malformed_id = Some(id.to_string()),
  }
}

fn invoice_facts(info: &Element) -> DocumentFacts {
  let mut facts = DocumentFacts::new(DocumentKind::PrimaryInvoice);
  read_id(&mut facts, info);
  facts.issuer_id = owned(RESOLVER.text(info, "emit/CNPJ"));
  if let Some(ide) = RESOLVER.find(info, "ide") {
    facts.sequence = owned(RESOLVER.text(ide, "nNF"));
    facts.nature = owned(RESOLVER.text(ide, "natOp"));
    facts.reference =
      owned(RESOLVER.find_deep(ide, "NFref/refNFe").map(|e| e.text().trim()));
  }
  facts.cfop =
    owned(RESOLVER.find_deep(info, "det/prod/CFOP").map(|e| e.text().trim()));
  facts.annotation = owned(
    RESOLVER
      .find_deep(info, "infAdic/obsCont/xTexto")
      .map(|e| e.text().trim()),
  );
  facts
}

fn transport_facts(info: &Element) -> DocumentFacts {
  let mut facts = DocumentFacts::new(DocumentKind::TransportDocument);
  read_id(&mut facts, info);
  facts.issuer_id = owned(RESOLVER.text(info, "emit/CNPJ"));
  facts.sequence = owned(RESOLVER.text(info, "ide/nCT"));
  facts.reference = owned(
    RESOLVER
      .find_deep(info, "infDoc/infNFe/chave")
      .map(|e| e.text().trim()),
  );
  facts
}

fn void_notice_facts(root: &Element) -> DocumentFacts {
  let mut facts = DocumentFacts::new(DocumentKind::VoidNotice);
  let event = if root.local() == "evento" {
    RESOLVER.find(root, "infEvento")
  } else {
    RESOLVER.find_deep(root, "evento/infEvento")
  };
  if let Some(event) = event {
    facts.key = RESOLVER
      .text(event, "chNFe")
      .and_then(|t| AccessKey::parse(t).ok());
    facts.event_type = owned(RESOLVER.text(event, "tpEvento"));
    facts.issuer_id = owned(RESOLVER.text(event, "CNPJ"));
  }
  facts
}

fn void_registration_facts(root: &Element) -> DocumentFacts {
  let mut facts = DocumentFacts::new(DocumentKind::VoidRegistration);
  if let Some(inut) = range_block(root) {
    facts.issuer_id = owned(RESOLVER.text(inut, "CNPJ"));
  }
  facts
}

/// The request-side `infInut` block, falling back to the response echo.
pub fn range_block(root: &Element) -> Option<&Element> {
  if root.local() == "inutNFe" {
    return RESOLVER.find(root, "infInut");
  }
  RESOLVER
    .find_deep(root, "inutNFe/infInut")
    .or_else(|| RESOLVER.find_deep(root, "retInutNFe/infInut"))
}
