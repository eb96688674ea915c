//! Tax zeroing, total recomputation and new-regime block synthesis.

use rekey_core::config::{ReformRates, TaxComponent, TaxReform};
use rekey_xml::Element;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
  error::Result,
  fiscal::{RESOLVER, decimal_at, money, parse_decimal, sibling_name},
  mutate::{ChangeLog, fields::set_existing, fields::set_existing_deep},
};

// ─── Zeroing ─────────────────────────────────────────────────────────────────

/// Zero one tax group inside an item's `imposto`. Returns the amount that was
/// removed, or `None` when nothing changed.
pub fn zero_component(
  imposto: &mut Element,
  component: TaxComponent,
) -> Result<Option<Decimal>> {
  let removed = group_amount(imposto, component.tag(), component.amount_field())?;
  let Some(group) = RESOLVER.find_mut(imposto, component.tag()) else {
    return Ok(None);
  };
  let mut changed = false;
  for field in component.amount_fields() {
    changed |= set_existing_deep(group, field, "0.00");
  }
  changed |= set_existing_deep(group, component.rate_field(), "0.0000");
  Ok(changed.then_some(removed))
}

/// Amount `field` anywhere inside group `tag` of `imposto`.
fn group_amount(imposto: &Element, tag: &str, field: &str) -> Result<Decimal> {
  let Some(group) = RESOLVER.find(imposto, tag) else {
    return Ok(Decimal::ZERO);
  };
  match RESOLVER.find_deep(group, field).map(|e| e.text().trim()) {
    None | Some("") => Ok(Decimal::ZERO),
    Some(text) => parse_decimal(field, text),
  }
}

/// Bring `total/ICMSTot` in line with the zeroed items.
///
/// Each zeroed component's total becomes the sum of its line amounts. `vNF`
/// keeps its declared value minus the removed amounts of the components that
/// are added on top of the product value; no other term is touched.
pub fn recompute_totals(
  inf: &mut Element,
  removed: &[(TaxComponent, Decimal)],
  log: &mut ChangeLog,
) -> Result<()> {
  let Some(tot_idx) = RESOLVER.locate(inf, "total/ICMSTot") else {
    return Ok(());
  };

  let mut sums = vec![Decimal::ZERO; removed.len()];
  for det in RESOLVER.find_all(inf, "det") {
    if let Some(imposto) = RESOLVER.find(det, "imposto") {
      for (sum, (c, _)) in sums.iter_mut().zip(removed) {
        *sum += group_amount(imposto, c.tag(), c.amount_field())?;
      }
    }
  }

  let Some(tot) = inf.at_mut(&tot_idx) else {
    return Ok(());
  };
  for (sum, (c, _)) in sums.iter().zip(removed) {
    if set_existing(tot, c.amount_field(), &money(*sum)) {
      log.record(format!("totals: <{}> recomputed", c.amount_field()));
    }
  }

  let dropped: Decimal = removed
    .iter()
    .filter(|(c, _)| c.adds_to_invoice_total())
    .map(|(_, amount)| *amount)
    .sum();
  if dropped.is_zero() || RESOLVER.find(tot, "vNF").is_none() {
    return Ok(());
  }
  let v_nf = decimal_at(tot, "vNF")? - dropped;
  if set_existing(tot, "vNF", &money(v_nf)) {
    log.record("totals: <vNF> recomputed");
  }
  Ok(())
}

// ─── New tax regime ──────────────────────────────────────────────────────────

/// Per-item amounts of the synthesized block, also used as running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemReform {
  pub base:      Decimal,
  pub state:     Decimal,
  pub city:      Decimal,
  pub federal:   Decimal,
  pub deduction: Decimal,
}

impl std::ops::AddAssign for ItemReform {
  fn add_assign(&mut self, rhs: Self) {
    self.base += rhs.base;
    self.state += rhs.state;
    self.city += rhs.city;
    self.federal += rhs.federal;
    self.deduction += rhs.deduction;
  }
}

/// `base * rate / 100`, rounded half-up to cents.
pub fn reform_amount(base: Decimal, rate: Decimal) -> Decimal {
  (base * rate / Decimal::ONE_HUNDRED)
    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn leaf<'a>(parent: &'a mut Element, local: &str, text: impl Into<String>) -> &'a mut Element {
  let mut el = Element::new(sibling_name(parent, local));
  el.set_text(text);
  parent.push_child(el)
}

fn group<'a>(parent: &'a mut Element, local: &str) -> &'a mut Element {
  let el = Element::new(sibling_name(parent, local));
  parent.push_child(el)
}

fn is_tag(local: &'static str) -> impl Fn(&Element) -> bool {
  move |e| e.local() == local
}

/// Replace the item's `imposto/IBSCBS` block. Items without a product value
/// lose any existing block and get none.
pub fn synthesize_item(
  det: &mut Element,
  reform: &TaxReform,
  rates: &ReformRates,
  log: &mut ChangeLog,
) -> Result<Option<ItemReform>> {
  let base = RESOLVER
    .text(det, "prod/vProd")
    .filter(|t| !t.is_empty())
    .map(|t| parse_decimal("vProd", t))
    .transpose()?;
  let Some(imposto) = RESOLVER.find_mut(det, "imposto") else {
    return Ok(None);
  };
  if imposto.remove_children(is_tag("IBSCBS")) > 0 {
    log.record("tax reform: existing <IBSCBS> replaced");
  }
  let Some(base) = base else {
    return Ok(None);
  };

  let item = ItemReform {
    base,
    state: reform_amount(base, rates.state),
    city: reform_amount(base, rates.city),
    federal: reform_amount(base, rates.federal),
    deduction: rates.deduction,
  };

  let block = group(imposto, "IBSCBS");
  leaf(block, "CST", reform.cst.as_str());
  leaf(block, "cClassTrib", reform.class_code.as_str());
  let g = group(block, "gIBSCBS");
  leaf(g, "vBC", money(base));

  let uf = group(g, "gIBSUF");
  leaf(uf, "pIBSUF", money(rates.state));
  leaf(group(uf, "gDevTrib"), "vDevTrib", money(rates.deduction));
  leaf(uf, "vIBSUF", money(item.state));

  let mun = group(g, "gIBSMun");
  leaf(mun, "pIBSMun", money(rates.city));
  leaf(group(mun, "gDevTrib"), "vDevTrib", "0.00");
  leaf(mun, "vIBSMun", money(item.city));

  let cbs = group(g, "gCBS");
  leaf(cbs, "pCBS", money(rates.federal));
  leaf(group(cbs, "gDevTrib"), "vDevTrib", "0.00");
  leaf(cbs, "vCBS", money(item.federal));

  log.record("tax reform: <IBSCBS> added to item");
  Ok(Some(item))
}

/// Replace `total/IBSCBSTot` with the plain sums of the item blocks.
pub fn synthesize_totals(
  inf: &mut Element,
  reform: &TaxReform,
  sums: &ItemReform,
  log: &mut ChangeLog,
) {
  let Some(total) = RESOLVER.find_mut(inf, "total") else {
    return;
  };
  total.remove_children(is_tag("IBSCBSTot"));
  let t = &reform.totals;

  let tot = group(total, "IBSCBSTot");
  leaf(tot, "vBCIBSCBS", money(sums.base));

  let ibs = group(tot, "gIBS");
  let uf = group(ibs, "gIBSUF");
  leaf(uf, "vDif", t.deferred.as_str());
  leaf(uf, "vDevTrib", money(sums.deduction));
  leaf(uf, "vIBSUF", money(sums.state));
  let mun = group(ibs, "gIBSMun");
  leaf(mun, "vDif", t.deferred.as_str());
  leaf(mun, "vDevTrib", "0.00");
  leaf(mun, "vIBSMun", money(sums.city));
  leaf(ibs, "vIBS", money(sums.state + sums.city));
  leaf(ibs, "vCredPres", t.presumed_credit.as_str());
  leaf(ibs, "vCredPresCondSus", t.presumed_credit_suspended.as_str());

  let cbs = group(tot, "gCBS");
  leaf(cbs, "vDif", t.deferred.as_str());
  leaf(cbs, "vDevTrib", "0.00");
  leaf(cbs, "vCBS", money(sums.federal));
  leaf(cbs, "vCredPres", t.presumed_credit.as_str());
  leaf(cbs, "vCredPresCondSus", t.presumed_credit_suspended.as_str());

  log.record("tax reform: <IBSCBSTot> added to totals");
}
