//! The mutation pass: rewrite one document against the finished mappings.
//!
//! A [`Mutator`] is built once per batch from the profile and the mappings
//! and applied to each parsed document in turn. It edits the tree in memory
//! and returns a [`ChangeLog`]; persisting is the caller's decision, so a
//! failed mutation never reaches the store.

mod cancel;
mod fields;
mod invoice;
mod range;
mod tax;
mod transport;

pub use fields::AddressBlock;
pub use tax::{ItemReform, reform_amount};

use chrono::NaiveTime;
use rekey_core::config::{Profile, ReformRates, TaxReform};
use rekey_xml::Element;

use crate::{
  classify::{DocumentFacts, DocumentKind},
  error::Result,
  fiscal::timestamp,
  mapping::{KeySubstitution, Mappings},
  report::Warning,
};

// ─── Change log ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
  entries:          Vec<String>,
  identity_changed: bool,
  warnings:         Vec<Warning>,
}

impl ChangeLog {
  pub fn record(&mut self, entry: impl Into<String>) {
    self.entries.push(entry.into());
  }

  /// Record a change to the document's identity (its own or cancelled key).
  pub fn record_identity(&mut self, entry: impl Into<String>) {
    self.identity_changed = true;
    self.record(entry);
  }

  pub fn warn(&mut self, warning: Warning) { self.warnings.push(warning); }

  /// True when nothing was changed. Warnings alone do not count.
  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  pub fn identity_changed(&self) -> bool { self.identity_changed }

  pub fn warnings(&self) -> &[Warning] { &self.warnings }

  /// Sorted, de-duplicated change descriptions.
  pub fn descriptions(&self) -> Vec<String> {
    let mut out = self.entries.clone();
    out.sort();
    out.dedup();
    out
  }
}

// ─── Mutator ─────────────────────────────────────────────────────────────────

pub struct Mutator<'a> {
  pub(crate) profile:   &'a Profile,
  pub(crate) mappings:  &'a Mappings,
  pub(crate) subst:     KeySubstitution,
  /// Replacement timestamp, when the date group is active.
  pub(crate) timestamp: Option<String>,
  pub(crate) reform:    Option<(&'a TaxReform, ReformRates)>,
}

impl<'a> Mutator<'a> {
  /// `time` is the time of day used for every rewritten timestamp.
  pub fn new(
    profile: &'a Profile,
    mappings: &'a Mappings,
    time: NaiveTime,
  ) -> Result<Self> {
    let subst = KeySubstitution::from_profile(profile)?;
    let timestamp = subst.date.map(|d| timestamp(d, time));
    let reform = match profile.tax_reform() {
      Some(r) => Some((r, r.rates()?)),
      None => None,
    };
    Ok(Self {
      profile,
      mappings,
      subst,
      timestamp,
      reform,
    })
  }

  pub fn apply(
    &self,
    name: &str,
    root: &mut Element,
    facts: &DocumentFacts,
  ) -> Result<ChangeLog> {
    let mut log = ChangeLog::default();
    match facts.kind {
      DocumentKind::PrimaryInvoice => {
        invoice::apply(self, root, facts, &mut log)?
      }
      DocumentKind::TransportDocument => {
        transport::apply(self, name, root, facts, &mut log)?
      }
      DocumentKind::VoidNotice => cancel::apply(self, root, &mut log),
      DocumentKind::VoidRegistration => range::apply(self, name, root, &mut log)?,
      DocumentKind::Unrecognized => {}
    }
    Ok(log)
  }
}
