//! Operation categories, derived from a line item's fiscal operation code
//! (CFOP).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

const SALE: &[&str] = &[
  "5404", "6404", "5108", "6108", "5405", "6405", "5102", "6102", "5105",
  "6105", "5106", "6106", "5551",
];
const DEVOLUTION: &[&str] =
  &["1201", "2201", "1202", "1410", "2410", "2102", "2202", "2411"];
const RETURN: &[&str] = &["1949", "2949", "5902", "6902"];
const SHIPMENT: &[&str] =
  &["5949", "5156", "6152", "6949", "6905", "5901", "6901"];

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
  /// Outbound sale.
  Sale,
  /// Goods sent back by the buyer.
  Devolution,
  /// Goods coming back from temporary deposit.
  Return,
  /// Outbound shipment that is not a sale (consignment, deposit).
  Shipment,
}

impl OperationKind {
  pub fn from_cfop(code: &str) -> Option<Self> {
    let code = code.trim();
    if SALE.contains(&code) {
      Some(Self::Sale)
    } else if DEVOLUTION.contains(&code) {
      Some(Self::Devolution)
    } else if RETURN.contains(&code) {
      Some(Self::Return)
    } else if SHIPMENT.contains(&code) {
      Some(Self::Shipment)
    } else {
      None
    }
  }
}
