//! Void-range registration rewriting.

use rekey_core::key::RangeId;
use rekey_xml::Element;
use tracing::warn;

use crate::{
  error::Result,
  fiscal::RESOLVER,
  mapping::KeySubstitution,
  mutate::{ChangeLog, Mutator, fields::set_existing},
  report::Warning,
};

/// Request block and its acknowledgment echo, relative to the root. The flag
/// marks the request side, the only one whose `Id` carries the range.
fn blocks(root: &Element) -> Vec<(Vec<usize>, bool)> {
  match root.local() {
    "inutNFe" | "retInutNFe" => RESOLVER
      .locate(root, "infInut")
      .map(|idx| (idx, root.local() == "inutNFe"))
      .into_iter()
      .collect(),
    _ => [("inutNFe/infInut", true), ("retInutNFe/infInut", false)]
      .into_iter()
      .filter_map(|(path, request)| {
        RESOLVER.locate_deep(root, path).map(|idx| (idx, request))
      })
      .collect(),
  }
}

pub(super) fn apply(
  m: &Mutator<'_>,
  name: &str,
  root: &mut Element,
  log: &mut ChangeLog,
) -> Result<()> {
  let subst = &m.subst;
  let year = subst.date.map(|d| d.format("%y").to_string());
  let fields = [
    ("CNPJ", subst.issuer_id.as_deref()),
    ("ano", year.as_deref()),
    ("cUF", subst.jurisdiction.as_deref()),
    ("serie", subst.series.as_deref()),
  ];
  let blocks = blocks(root);

  // The Id is rendered before any field moves, so the two never disagree.
  let mut new_id = None;
  let mut rewrite = true;
  let request_id = blocks
    .iter()
    .find(|(_, request)| *request)
    .and_then(|(idx, _)| root.at(idx))
    .and_then(|inf| inf.attr("Id"))
    .map(str::to_string);
  if let Some(id) = request_id.filter(|_| subst.is_active()) {
    match rebuild(subst, year.as_deref(), name, &id) {
      Ok(rebuilt) => new_id = Some(rebuilt).filter(|r| *r != id),
      Err(warning) => {
        log.warn(warning);
        rewrite = false;
      }
    }
  }

  for (idx, request) in blocks.into_iter().filter(|_| rewrite) {
    let Some(inf) = root.at_mut(&idx) else { continue };
    for (tag, value) in fields {
      let Some(value) = value else { continue };
      if set_existing(inf, tag, value) {
        log.record(format!("range: <{tag}> updated"));
      }
    }
    if let Some(rebuilt) = new_id.as_ref().filter(|_| request) {
      inf.set_attr("Id", rebuilt.clone());
      log.record_identity(format!("range Id changed to {rebuilt}"));
    }
  }

  if let Some(ts) = &m.timestamp {
    let echo = if root.local() == "retInutNFe" {
      RESOLVER.find_mut(root, "infInut")
    } else {
      RESOLVER.find_deep_mut(root, "retInutNFe/infInut")
    };
    if let Some(echo) = echo {
      if set_existing(echo, "dhRecbto", ts) {
        log.record("date: <dhRecbto> updated");
      }
    }
  }
  Ok(())
}

/// Apply the substitution to a request `Id`.
fn rebuild(
  subst: &KeySubstitution,
  year: Option<&str>,
  name: &str,
  id: &str,
) -> Result<String, Warning> {
  let Ok(mut range) = RangeId::parse(id) else {
    warn!(document = name, %id, "malformed range identifier");
    return Err(Warning::MalformedIdentifier {
      document: name.to_string(),
      id:       id.to_string(),
    });
  };
  if let Some(v) = &subst.issuer_id {
    range.issuer_id = v.clone();
  }
  if let Some(v) = year {
    range.year = v.to_string();
  }
  if let Some(v) = &subst.jurisdiction {
    range.jurisdiction = v.trim().to_string();
  }
  if let Some(v) = &subst.series {
    range.series = v.trim().to_string();
  }
  range.render().map_err(|e| {
    warn!(document = name, error = %e, "range identifier not rebuilt");
    Warning::KeyLengthMismatch {
      document: name.to_string(),
      reason:   e.to_string(),
    }
  })
}
