//! The mapping pass: old key → new key for every document whose identity
//! changes, plus the reference graph and the fallback sale key.
//!
//! The pass runs over the whole batch before any document is rewritten and
//! its result is read-only afterwards.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rekey_core::{AccessKey, config::Profile, key};
use tracing::{debug, warn};

use crate::{
  classify::{DocumentFacts, DocumentKind},
  error::Result,
  fiscal::trim_zeros,
  rename::is_sale_file_name,
  report::Warning,
};

/// A classified document, by name.
#[derive(Debug, Clone)]
pub struct ScannedDocument {
  pub name:  String,
  pub facts: DocumentFacts,
}

// ─── Substitution ────────────────────────────────────────────────────────────

/// The key fields a profile replaces. Everything else is copied verbatim
/// from the original body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySubstitution {
  /// Digits only.
  pub issuer_id:    Option<String>,
  pub date:         Option<NaiveDate>,
  pub jurisdiction: Option<String>,
  pub series:       Option<String>,
}

impl KeySubstitution {
  pub fn from_profile(profile: &Profile) -> Result<Self> {
    Ok(Self {
      issuer_id:    profile.issuer_id(),
      date:         profile.new_date()?,
      jurisdiction: profile.jurisdiction().map(str::to_string),
      series:       profile.series().map(str::to_string),
    })
  }

  pub fn is_active(&self) -> bool {
    self.issuer_id.is_some()
      || self.date.is_some()
      || self.jurisdiction.is_some()
      || self.series.is_some()
  }

  /// Derive the new key from an old one. The check digit is recomputed.
  pub fn derive(&self, old: &AccessKey) -> rekey_core::Result<AccessKey> {
    let mut fields = key::decompose(old.body())?;
    if let Some(issuer) = &self.issuer_id {
      fields.issuer_id = issuer.clone();
    }
    if let Some(date) = self.date {
      fields.year_month = date.format("%y%m").to_string();
    }
    if let Some(j) = &self.jurisdiction {
      fields.jurisdiction = j.trim().to_string();
    }
    if let Some(s) = &self.series {
      fields.series = s.trim().to_string();
    }
    AccessKey::from_body(&key::recompose(&fields)?)
  }
}

// ─── Mappings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Mappings {
  /// Old key → new key, only where the key actually changes.
  pub keys:       BTreeMap<AccessKey, AccessKey>,
  /// Invoice's own old key → old key of the invoice it references.
  pub references: BTreeMap<AccessKey, AccessKey>,
  /// Invoice sequence number (no leading zeros) → old key.
  pub sequences:  BTreeMap<String, AccessKey>,
  /// New key of the canonical sale document.
  pub sale_key:   Option<AccessKey>,
  pub warnings:   Vec<Warning>,
}

impl Mappings {
  pub fn new_key(&self, old: &str) -> Option<&AccessKey> {
    self.keys.get(old.trim())
  }

  /// Resolve a key-shaped reference: a direct hit first, then through the
  /// sequence number it embeds.
  pub fn resolve_reference(&self, reference: &str) -> Option<&AccessKey> {
    if let Some(new) = self.new_key(reference) {
      return Some(new);
    }
    let seq = key::referenced_sequence(reference.trim())?;
    let old = self.sequences.get(seq)?;
    self.keys.get(old)
  }
}

/// Build the mappings for a whole batch. Documents are visited in the
/// given order; the first sale document wins.
pub fn build(profile: &Profile, documents: &[ScannedDocument]) -> Result<Mappings> {
  let subst = KeySubstitution::from_profile(profile)?;
  let mut out = Mappings::default();
  let mut sale_name: Option<&str> = None;

  for doc in documents {
    let f = &doc.facts;
    if f.kind != DocumentKind::PrimaryInvoice {
      continue;
    }
    if let (Some(key), Some(seq)) = (&f.key, &f.sequence) {
      out.sequences.insert(trim_zeros(seq).to_string(), key.clone());
    }
  }

  for doc in documents {
    let f = &doc.facts;
    if let Some(id) = &f.malformed_id {
      warn!(document = %doc.name, %id, "malformed identifier");
      out.warnings.push(Warning::MalformedIdentifier {
        document: doc.name.clone(),
        id:       id.clone(),
      });
      continue;
    }
    if !matches!(
      f.kind,
      DocumentKind::PrimaryInvoice | DocumentKind::TransportDocument
    ) {
      continue;
    }
    let Some(old) = &f.key else { continue };

    if f.kind == DocumentKind::PrimaryInvoice {
      let target = f
        .reference
        .as_deref()
        .and_then(key::referenced_sequence)
        .and_then(|seq| out.sequences.get(seq));
      if let Some(target) = target {
        out.references.insert(old.clone(), target.clone());
      }
    }

    if !subst.is_active() {
      continue;
    }
    let new = match subst.derive(old) {
      Ok(new) => new,
      Err(e) => {
        warn!(document = %doc.name, error = %e, "key not derived");
        out.warnings.push(Warning::KeyLengthMismatch {
          document: doc.name.clone(),
          reason:   e.to_string(),
        });
        continue;
      }
    };
    debug!(document = %doc.name, %old, %new, "key derived");

    if f.kind == DocumentKind::PrimaryInvoice && is_sale_file_name(&doc.name) {
      match sale_name {
        None => {
          sale_name = Some(&doc.name);
          out.sale_key = Some(new.clone());
        }
        Some(kept) => out.warnings.push(Warning::AmbiguousSale {
          kept:    kept.to_string(),
          ignored: doc.name.clone(),
        }),
      }
    }
    if &new != old {
      out.keys.insert(old.clone(), new);
    }
  }

  Ok(out)
}

#[cfg(test)]
mod tests {
  use super::*;

  const KEY: &str = "35240112345678000199550010000001231000000019";

  fn old() -> AccessKey { AccessKey::parse(KEY).unwrap() }

  #[test]
  fn derive_replaces_only_configured_fields() {
    let subst = KeySubstitution {
      issuer_id: Some("11222333000181".into()),
      ..Default::default()
    };
    let new = subst.derive(&old()).unwrap();
    let new = new.as_str();
    assert_eq!(new.len(), 44);
    assert_eq!(&new[..6], &KEY[..6]);
    assert_eq!(&new[6..20], "11222333000181");
    assert_eq!(&new[20..43], &KEY[20..43]);
    let digit = key::checksum(&new[..43]).unwrap();
    assert!(new.ends_with(digit));
  }

  #[test]
  fn derive_pads_short_values() {
    let subst = KeySubstitution {
      date: NaiveDate::from_ymd_opt(2025, 7, 1),
      jurisdiction: Some("5".into()),
      series: Some("2".into()),
      ..Default::default()
    };
    let new = subst.derive(&old()).unwrap();
    assert_eq!(&new.as_str()[..6], "052507");
    assert_eq!(&new.as_str()[22..25], "002");
    assert!(new.is_consistent());
  }

  #[test]
  fn derive_rejects_values_that_do_not_fit() {
    let subst = KeySubstitution {
      series: Some("1234".into()),
      ..Default::default()
    };
    assert!(subst.derive(&old()).is_err());
  }

  #[test]
  fn resolve_reference_falls_back_to_sequence() {
    let new = AccessKey::parse("35240111222333000181550010000001231000000010").unwrap();
    let mut m = Mappings::default();
    m.keys.insert(old(), new.clone());
    m.sequences.insert("123".into(), old());
    assert_eq!(m.resolve_reference(KEY), Some(&new));
    // another key carrying sequence 123
    let other = "35240199999999000199550010000001239999999990";
    assert_eq!(m.resolve_reference(other), Some(&new));
    assert_eq!(m.resolve_reference("123"), None);
  }
}
