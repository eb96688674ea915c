//! Substitution profiles.
//!
//! A profile is the closed set of substitutions applied to one batch. Every
//! group has an on/off toggle under `enabled` plus its replacement values.
//! Field-group structs are keyed by the document tag they overwrite, so a
//! profile reads like the documents it edits. Unknown keys are rejected when
//! the profile is loaded.

use std::{collections::BTreeMap, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
  error::{Error, Result},
  operation::OperationKind,
};

/// Date format used for the replacement emission date.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Address sub-fields; these live in the address container of a party block.
pub const ADDRESS_FIELDS: &[&str] = &[
  "xLgr", "nro", "xCpl", "xBairro", "cMun", "xMun", "UF", "CEP", "cPais",
  "xPais", "fone",
];

// ─── Toggles ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Toggles {
  pub issuer:       bool,
  pub products:     bool,
  pub taxes:        bool,
  pub date:         bool,
  pub references:   bool,
  pub tax_codes:    bool,
  pub addressee:    bool,
  pub jurisdiction: bool,
  pub series:       bool,
  pub tax_reform:   bool,
}

// ─── Field groups ────────────────────────────────────────────────────────────

/// Replacement values for a party block (issuer, sender or addressee).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartyFields {
  #[serde(rename = "CNPJ")]
  pub cnpj:          Option<String>,
  #[serde(rename = "CPF")]
  pub cpf:           Option<String>,
  #[serde(rename = "xNome")]
  pub name:          Option<String>,
  #[serde(rename = "xFant")]
  pub trade_name:    Option<String>,
  #[serde(rename = "IE")]
  pub state_reg:     Option<String>,
  #[serde(rename = "indIEDest")]
  pub state_reg_ind: Option<String>,
  #[serde(rename = "CRT")]
  pub tax_regime:    Option<String>,
  #[serde(rename = "email")]
  pub email:         Option<String>,
  #[serde(rename = "xLgr")]
  pub street:        Option<String>,
  #[serde(rename = "nro")]
  pub number:        Option<String>,
  #[serde(rename = "xCpl")]
  pub complement:    Option<String>,
  #[serde(rename = "xBairro")]
  pub district:      Option<String>,
  #[serde(rename = "cMun")]
  pub city_code:     Option<String>,
  #[serde(rename = "xMun")]
  pub city:          Option<String>,
  #[serde(rename = "UF")]
  pub state:         Option<String>,
  #[serde(rename = "CEP")]
  pub postal_code:   Option<String>,
  #[serde(rename = "cPais")]
  pub country_code:  Option<String>,
  #[serde(rename = "xPais")]
  pub country:       Option<String>,
  #[serde(rename = "fone")]
  pub phone:         Option<String>,
}

impl PartyFields {
  /// Configured `(tag, value)` pairs in schema order.
  pub fn entries(&self) -> Vec<(&'static str, &str)> {
    present([
      ("CNPJ", &self.cnpj),
      ("CPF", &self.cpf),
      ("xNome", &self.name),
      ("xFant", &self.trade_name),
      ("xLgr", &self.street),
      ("nro", &self.number),
      ("xCpl", &self.complement),
      ("xBairro", &self.district),
      ("cMun", &self.city_code),
      ("xMun", &self.city),
      ("UF", &self.state),
      ("CEP", &self.postal_code),
      ("cPais", &self.country_code),
      ("xPais", &self.country),
      ("fone", &self.phone),
      ("indIEDest", &self.state_reg_ind),
      ("IE", &self.state_reg),
      ("CRT", &self.tax_regime),
      ("email", &self.email),
    ])
  }
}

/// Replacement values for each line item's product block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductFields {
  #[serde(rename = "cProd")]
  pub code:       Option<String>,
  #[serde(rename = "cEAN")]
  pub ean:        Option<String>,
  #[serde(rename = "xProd")]
  pub name:       Option<String>,
  #[serde(rename = "NCM")]
  pub ncm:        Option<String>,
  #[serde(rename = "CEST")]
  pub cest:       Option<String>,
  #[serde(rename = "uCom")]
  pub unit:       Option<String>,
  #[serde(rename = "cEANTrib")]
  pub tax_ean:    Option<String>,
  #[serde(rename = "uTrib")]
  pub tax_unit:   Option<String>,
}

impl ProductFields {
  pub fn entries(&self) -> Vec<(&'static str, &str)> {
    present([
      ("cProd", &self.code),
      ("cEAN", &self.ean),
      ("xProd", &self.name),
      ("NCM", &self.ncm),
      ("CEST", &self.cest),
      ("uCom", &self.unit),
      ("cEANTrib", &self.tax_ean),
      ("uTrib", &self.tax_unit),
    ])
  }
}

/// Replacement values for tags anywhere inside a line item's tax block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxFields {
  pub orig:    Option<String>,
  #[serde(rename = "CSOSN")]
  pub csosn:   Option<String>,
  #[serde(rename = "modBC")]
  pub mod_bc:  Option<String>,
  #[serde(rename = "pICMS")]
  pub p_icms:  Option<String>,
  #[serde(rename = "pRedBC")]
  pub p_red:   Option<String>,
  #[serde(rename = "pMVAST")]
  pub p_mvast: Option<String>,
  #[serde(rename = "pICMSST")]
  pub p_st:    Option<String>,
  #[serde(rename = "pFCP")]
  pub p_fcp:   Option<String>,
  #[serde(rename = "cEnq")]
  pub c_enq:   Option<String>,
  #[serde(rename = "pIPI")]
  pub p_ipi:   Option<String>,
  #[serde(rename = "pPIS")]
  pub p_pis:   Option<String>,
  #[serde(rename = "pCOFINS")]
  pub p_cof:   Option<String>,
}

impl TaxFields {
  pub fn entries(&self) -> Vec<(&'static str, &str)> {
    present([
      ("orig", &self.orig),
      ("CSOSN", &self.csosn),
      ("modBC", &self.mod_bc),
      ("pICMS", &self.p_icms),
      ("pRedBC", &self.p_red),
      ("pMVAST", &self.p_mvast),
      ("pICMSST", &self.p_st),
      ("pFCP", &self.p_fcp),
      ("cEnq", &self.c_enq),
      ("pIPI", &self.p_ipi),
      ("pPIS", &self.p_pis),
      ("pCOFINS", &self.p_cof),
    ])
  }
}

fn present<'a, const N: usize>(
  pairs: [(&'static str, &'a Option<String>); N],
) -> Vec<(&'static str, &'a str)> {
  pairs
    .into_iter()
    .filter_map(|(tag, value)| value.as_deref().map(|v| (tag, v)))
    .collect()
}

/// Jurisdiction and series replacements.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Identification {
  pub jurisdiction: Option<String>,
  pub series:       Option<String>,
}

/// Situation codes to force per tax group, for one operation category.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxCodeRule {
  #[serde(rename = "ICMS")]
  pub icms:   Option<String>,
  #[serde(rename = "IPI")]
  pub ipi:    Option<String>,
  #[serde(rename = "PIS")]
  pub pis:    Option<String>,
  #[serde(rename = "COFINS")]
  pub cofins: Option<String>,
}

impl TaxCodeRule {
  /// `(tax group tag, situation code)` pairs.
  pub fn entries(&self) -> Vec<(&'static str, &str)> {
    present([
      ("ICMS", &self.icms),
      ("IPI", &self.ipi),
      ("PIS", &self.pis),
      ("COFINS", &self.cofins),
    ])
  }
}

// ─── Zeroing ─────────────────────────────────────────────────────────────────

/// A tax group whose values a [`ZeroRule`] can clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaxComponent {
  Icms,
  Ipi,
  Pis,
  Cofins,
}

impl TaxComponent {
  /// Tag of the group inside a line item's tax block.
  pub fn tag(self) -> &'static str {
    match self {
      Self::Icms => "ICMS",
      Self::Ipi => "IPI",
      Self::Pis => "PIS",
      Self::Cofins => "COFINS",
    }
  }

  /// Currency fields (base and amount), zeroed to `0.00`.
  pub fn amount_fields(self) -> [&'static str; 2] {
    [self.amount_field(), "vBC"]
  }

  /// The computed amount; also the tag of the document-level total.
  pub fn amount_field(self) -> &'static str {
    match self {
      Self::Icms => "vICMS",
      Self::Ipi => "vIPI",
      Self::Pis => "vPIS",
      Self::Cofins => "vCOFINS",
    }
  }

  /// Whether the amount is charged on top of the product value, and so is
  /// part of the invoice total.
  pub fn adds_to_invoice_total(self) -> bool { matches!(self, Self::Ipi) }

  /// Rate field, zeroed to `0.0000`.
  pub fn rate_field(self) -> &'static str {
    match self {
      Self::Icms => "pICMS",
      Self::Ipi => "pIPI",
      Self::Pis => "pPIS",
      Self::Cofins => "pCOFINS",
    }
  }
}

/// Zero out `component` on every line item whose operation falls in
/// `operations`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZeroRule {
  pub component:  TaxComponent,
  pub operations: Vec<OperationKind>,
}

// ─── Tax reform ──────────────────────────────────────────────────────────────

fn default_cst() -> String { "000".into() }
fn default_class_code() -> String { "000001".into() }
fn zero() -> String { "0.00".into() }

/// Rates for the synthesized new-regime tax blocks. Percentages.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaxReform {
  #[serde(default = "default_cst")]
  pub cst:          String,
  #[serde(default = "default_class_code")]
  pub class_code:   String,
  #[serde(default = "zero")]
  pub state_rate:   String,
  #[serde(default = "zero")]
  pub city_rate:    String,
  #[serde(default = "zero")]
  pub federal_rate: String,
  /// Declared credit/deduction carried on each item.
  #[serde(default = "zero")]
  pub deduction:    String,
  #[serde(default)]
  pub totals:       ReformTotals,
}

/// Fixed values copied into the document-level totals block.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReformTotals {
  pub deferred:                  String,
  pub presumed_credit:           String,
  pub presumed_credit_suspended: String,
}

impl Default for ReformTotals {
  fn default() -> Self {
    Self {
      deferred:                  zero(),
      presumed_credit:           zero(),
      presumed_credit_suspended: zero(),
    }
  }
}

/// Parsed percentages of a [`TaxReform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReformRates {
  pub state:     Decimal,
  pub city:      Decimal,
  pub federal:   Decimal,
  pub deduction: Decimal,
}

impl TaxReform {
  pub fn rates(&self) -> Result<ReformRates> {
    Ok(ReformRates {
      state:     decimal("state_rate", &self.state_rate)?,
      city:      decimal("city_rate", &self.city_rate)?,
      federal:   decimal("federal_rate", &self.federal_rate)?,
      deduction: decimal("deduction", &self.deduction)?,
    })
  }
}

fn decimal(field: &'static str, value: &str) -> Result<Decimal> {
  Decimal::from_str(value.trim()).map_err(|_| Error::InvalidDecimal {
    field,
    value: value.to_string(),
  })
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// The full substitution configuration for one batch run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
  #[serde(default)]
  pub enabled:        Toggles,
  pub issuer:         Option<PartyFields>,
  pub addressee:      Option<PartyFields>,
  pub product:        Option<ProductFields>,
  pub taxes:          Option<TaxFields>,
  /// Replacement emission date, `dd/mm/yyyy`.
  pub date:           Option<String>,
  pub identification: Option<Identification>,
  /// Keyed by operation category name (`sale`, `devolution`, ...).
  #[serde(default)]
  pub tax_codes:      BTreeMap<String, TaxCodeRule>,
  #[serde(default)]
  pub zeroing:        Vec<ZeroRule>,
  pub tax_reform:     Option<TaxReform>,
}

fn active<T>(on: bool, value: &Option<T>) -> Option<&T> {
  if on { value.as_ref() } else { None }
}

impl Profile {
  /// Check everything that can be checked before a batch starts.
  pub fn validate(&self) -> Result<()> {
    if let Some(date) = &self.date {
      parse_date(date)?;
    }
    for name in self.tax_codes.keys() {
      OperationKind::from_str(name).map_err(|_| {
        Error::Profile(format!("unknown operation category {name:?}"))
      })?;
    }
    if let Some(reform) = &self.tax_reform {
      reform.rates()?;
    }
    Ok(())
  }

  pub fn issuer(&self) -> Option<&PartyFields> {
    active(self.enabled.issuer, &self.issuer)
  }

  /// The new issuer tax id, digits only, when the issuer group is active.
  pub fn issuer_id(&self) -> Option<String> {
    self
      .issuer()
      .and_then(|p| p.cnpj.as_deref())
      .map(crate::key::digits)
  }

  pub fn addressee(&self) -> Option<&PartyFields> {
    active(self.enabled.addressee, &self.addressee)
  }

  pub fn product(&self) -> Option<&ProductFields> {
    active(self.enabled.products, &self.product)
  }

  pub fn taxes(&self) -> Option<&TaxFields> {
    active(self.enabled.taxes, &self.taxes)
  }

  /// The replacement date when the date group is active.
  pub fn new_date(&self) -> Result<Option<NaiveDate>> {
    active(self.enabled.date, &self.date)
      .map(|d| parse_date(d))
      .transpose()
  }

  pub fn jurisdiction(&self) -> Option<&str> {
    active(self.enabled.jurisdiction, &self.identification)
      .and_then(|i| i.jurisdiction.as_deref())
  }

  pub fn series(&self) -> Option<&str> {
    active(self.enabled.series, &self.identification)
      .and_then(|i| i.series.as_deref())
  }

  pub fn rewrites_references(&self) -> bool { self.enabled.references }

  pub fn tax_code_rule(&self, kind: OperationKind) -> Option<&TaxCodeRule> {
    if !self.enabled.tax_codes {
      return None;
    }
    self.tax_codes.get(&kind.to_string())
  }

  pub fn zero_rules(&self) -> &[ZeroRule] { &self.zeroing }

  pub fn tax_reform(&self) -> Option<&TaxReform> {
    active(self.enabled.tax_reform, &self.tax_reform)
  }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
    .map_err(|_| Error::InvalidDate(s.to_string()))
}

// ─── Profiles file ───────────────────────────────────────────────────────────

/// On-disk encodings of a profiles file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileFormat {
  Toml,
  Json,
}

impl ProfileFormat {
  /// Pick a format from a file extension; anything but `json` is TOML.
  pub fn from_extension(ext: Option<&str>) -> Self {
    match ext {
      Some(e) if e.eq_ignore_ascii_case("json") => Self::Json,
      _ => Self::Toml,
    }
  }
}

/// Decode and validate a profiles file: a table of profile name to profile.
pub fn parse_profiles(
  text: &str,
  format: ProfileFormat,
) -> Result<BTreeMap<String, Profile>> {
  let profiles: BTreeMap<String, Profile> = match format {
    ProfileFormat::Toml => toml::from_str(text)?,
    ProfileFormat::Json => serde_json::from_str(text)?,
  };
  for (name, profile) in &profiles {
    profile
      .validate()
      .map_err(|e| Error::Profile(format!("{name}: {e}")))?;
  }
  Ok(profiles)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
