//! Namespaces, the shared path resolver and value formatting for the fiscal
//! document schemas.

use chrono::{NaiveDate, NaiveTime};
use rekey_xml::{Element, Name, Resolver};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};

pub const NFE_NS: &str = "http://www.portalfiscal.inf.br/nfe";
pub const CTE_NS: &str = "http://www.portalfiscal.inf.br/cte";
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Primary-document namespace first, then transport, then unqualified.
pub static RESOLVER: Resolver = Resolver::new(&[NFE_NS, CTE_NS]);

/// Offset appended to every rewritten timestamp.
pub const UTC_OFFSET: &str = "-03:00";

/// Cancellation event type code.
pub const CANCELLATION_EVENT: &str = "110111";

/// `YYYY-MM-DDThh:mm:ss-03:00`.
pub fn timestamp(date: NaiveDate, time: NaiveTime) -> String {
  format!("{}T{}{UTC_OFFSET}", date.format("%Y-%m-%d"), time.format("%H:%M:%S"))
}

/// A new element in the same namespace as `parent`.
pub fn sibling_name(parent: &Element, local: &str) -> Name {
  Name::new(parent.ns(), local)
}

/// Text of `path` below `node` as a decimal; absent or empty is zero.
pub fn decimal_at(node: &Element, path: &str) -> Result<Decimal> {
  match RESOLVER.text(node, path) {
    None | Some("") => Ok(Decimal::ZERO),
    Some(text) => parse_decimal(path, text),
  }
}

pub fn parse_decimal(field: &str, text: &str) -> Result<Decimal> {
  text.trim().parse::<Decimal>().map_err(|_| Error::InvalidDecimal {
    field: field.to_string(),
    value: text.to_string(),
  })
}

/// Round half away from zero to `dp` places and pad to exactly `dp`.
pub fn fixed(value: Decimal, dp: u32) -> String {
  let mut v = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
  v.rescale(dp);
  v.to_string()
}

pub fn money(value: Decimal) -> String { fixed(value, 2) }

/// Strip leading zeros, keeping a lone `0`.
pub fn trim_zeros(s: &str) -> &str {
  let t = s.trim().trim_start_matches('0');
  if t.is_empty() && !s.trim().is_empty() { "0" } else { t }
}
