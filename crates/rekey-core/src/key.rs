//! Access-key codec.
//!
//! An access key is 44 digits: a 43-digit body followed by a modulus-11 check
//! digit. The body is a fixed-width concatenation of:
//!
//! | field           | width |
//! |-----------------|-------|
//! | jurisdiction    | 2     |
//! | year-month      | 4     |
//! | issuer tax id   | 14    |
//! | model           | 2     |
//! | series          | 3     |
//! | sequence number | 9     |
//! | emission type   | 1     |
//! | control code    | 8     |

use std::{borrow::Borrow, fmt};

use crate::error::{Error, Result};

pub const BODY_LEN: usize = 43;
pub const KEY_LEN: usize = 44;

/// Field boundaries inside the body.
const OFFSETS: [usize; 9] = [0, 2, 6, 20, 22, 25, 34, 35, 43];

const FIELD_NAMES: [&str; 8] = [
  "jurisdiction",
  "year_month",
  "issuer_id",
  "model",
  "series",
  "sequence",
  "emission_type",
  "control_code",
];

// ─── Check digit ─────────────────────────────────────────────────────────────

/// Compute the check digit of a 43-digit body.
///
/// Weights cycle 2..=9 starting from the last character. A result of 0, 1,
/// 10 or 11 collapses to `'0'`.
pub fn checksum(body: &str) -> Result<char> {
  if body.len() != BODY_LEN {
    return Err(Error::InvalidLength {
      expected: BODY_LEN,
      actual:   body.len(),
    });
  }

  let mut sum = 0u32;
  let mut weight = 2u32;
  for c in body.chars().rev() {
    let digit = c.to_digit(10).ok_or_else(|| Error::NonDigit(body.to_string()))?;
    sum += digit * weight;
    weight = if weight == 9 { 2 } else { weight + 1 };
  }

  let check = 11 - sum % 11;
  Ok(match check {
    0 | 1 | 10 | 11 => '0',
    d => char::from_digit(d, 10).unwrap_or('0'),
  })
}

// ─── Field layout ────────────────────────────────────────────────────────────

/// The eight fields of a key body, in layout order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFields {
  pub jurisdiction:  String,
  pub year_month:    String,
  pub issuer_id:     String,
  pub model:         String,
  pub series:        String,
  pub sequence:      String,
  pub emission_type: String,
  pub control_code:  String,
}

impl KeyFields {
  fn values(&self) -> [&str; 8] {
    [
      &self.jurisdiction,
      &self.year_month,
      &self.issuer_id,
      &self.model,
      &self.series,
      &self.sequence,
      &self.emission_type,
      &self.control_code,
    ]
  }
}

/// Slice a 43-character body at the fixed offsets.
pub fn decompose(body: &str) -> Result<KeyFields> {
  if body.len() != BODY_LEN || !body.is_ascii() {
    return Err(Error::InvalidLength {
      expected: BODY_LEN,
      actual:   body.chars().count(),
    });
  }
  let part = |i: usize| body[OFFSETS[i]..OFFSETS[i + 1]].to_string();
  Ok(KeyFields {
    jurisdiction:  part(0),
    year_month:    part(1),
    issuer_id:     part(2),
    model:         part(3),
    series:        part(4),
    sequence:      part(5),
    emission_type: part(6),
    control_code:  part(7),
  })
}

/// Concatenate `fields` back into a body, zero-padding each on the left.
pub fn recompose(fields: &KeyFields) -> Result<String> {
  let mut body = String::with_capacity(BODY_LEN);
  for (i, value) in fields.values().into_iter().enumerate() {
    let width = OFFSETS[i + 1] - OFFSETS[i];
    body.push_str(&pad(FIELD_NAMES[i], value, width)?);
  }
  Ok(body)
}

/// Left-pad `value` with zeros to `width`.
pub fn pad(field: &'static str, value: &str, width: usize) -> Result<String> {
  let len = value.chars().count();
  if len > width {
    return Err(Error::FieldTooLong {
      field,
      width,
      value: value.to_string(),
    });
  }
  Ok(format!("{}{value}", "0".repeat(width - len)))
}

/// Keep only the ASCII digits of `s` (strips tax-id punctuation).
pub fn digits(s: &str) -> String {
  s.chars().filter(char::is_ascii_digit).collect()
}

// ─── AccessKey ───────────────────────────────────────────────────────────────

/// A complete 44-digit access key.
///
/// Immutable: substitutions build a new key through [`AccessKey::from_body`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccessKey(String);

impl AccessKey {
  /// Mint a key from a 43-digit body, appending its check digit.
  pub fn from_body(body: &str) -> Result<Self> {
    let check = checksum(body)?;
    Ok(Self(format!("{body}{check}")))
  }

  /// Accept an existing 44-digit key as found in a document.
  ///
  /// The check digit is not verified; see [`AccessKey::is_consistent`].
  pub fn parse(s: &str) -> Result<Self> {
    if s.len() != KEY_LEN {
      return Err(Error::InvalidLength {
        expected: KEY_LEN,
        actual:   s.chars().count(),
      });
    }
    if !s.chars().all(|c| c.is_ascii_digit()) {
      return Err(Error::NonDigit(s.to_string()));
    }
    Ok(Self(s.to_string()))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn body(&self) -> &str { &self.0[..BODY_LEN] }

  pub fn check_digit(&self) -> char {
    self.0.chars().last().unwrap_or('0')
  }

  /// True when the stored check digit matches the body.
  pub fn is_consistent(&self) -> bool {
    checksum(self.body()).is_ok_and(|c| c == self.check_digit())
  }
}

/// Lets maps keyed by [`AccessKey`] be queried with the raw text of a
/// document field.
impl Borrow<str> for AccessKey {
  fn borrow(&self) -> &str { &self.0 }
}

impl fmt::Display for AccessKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// The sequence number embedded in any key-shaped reference, without leading
/// zeros. Returns `None` when `reference` is too short to carry one.
pub fn referenced_sequence(reference: &str) -> Option<&str> {
  reference
    .get(OFFSETS[5]..OFFSETS[6])
    .map(|s| s.trim_start_matches('0'))
}

// ─── Number-range identifier ─────────────────────────────────────────────────

/// Identifier of a void-range registration: `ID` + jurisdiction(2) + year(2)
/// + issuer(14) + model(2) + series(3) + first number(9) + last number(9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeId {
  pub jurisdiction: String,
  pub year:         String,
  pub issuer_id:    String,
  pub model:        String,
  pub series:       String,
  pub first:        String,
  pub last:         String,
}

const RANGE_OFFSETS: [usize; 8] = [2, 4, 6, 20, 22, 25, 34, 43];
pub const RANGE_ID_LEN: usize = 43;

impl RangeId {
  pub fn parse(id: &str) -> Result<Self> {
    if id.len() != RANGE_ID_LEN || !id.is_ascii() || !id.starts_with("ID") {
      return Err(Error::InvalidLength {
        expected: RANGE_ID_LEN,
        actual:   id.chars().count(),
      });
    }
    let part = |i: usize| id[RANGE_OFFSETS[i]..RANGE_OFFSETS[i + 1]].to_string();
    Ok(Self {
      jurisdiction: part(0),
      year:         part(1),
      issuer_id:    part(2),
      model:        part(3),
      series:       part(4),
      first:        part(5),
      last:         part(6),
    })
  }

  pub fn render(&self) -> Result<String> {
    Ok(format!(
      "ID{}{}{}{}{}{}{}",
      pad("jurisdiction", &self.jurisdiction, 2)?,
      pad("year", &self.year, 2)?,
      pad("issuer_id", &self.issuer_id, 14)?,
      pad("model", &self.model, 2)?,
      pad("series", &self.series, 3)?,
      pad("first", &self.first, 9)?,
      pad("last", &self.last, 9)?,
    ))
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
