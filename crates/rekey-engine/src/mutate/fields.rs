//! Field writes and the node-creation policy.
//!
//! Only party blocks named by [`AddressBlock`] may gain nodes that are not
//! already in the document. Everything else (identification, line items,
//! tax groups, protocol blocks) goes through [`set_existing`], which never
//! creates.

use rekey_core::{config::ADDRESS_FIELDS, config::PartyFields, key::digits};
use rekey_xml::Element;
use tracing::debug;

use crate::{
  fiscal::{RESOLVER, sibling_name},
  mutate::ChangeLog,
};

/// Party blocks that accept created fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressBlock {
  /// `emit` / `enderEmit` on invoices.
  Issuer,
  /// `rem` / `enderReme` on transport documents.
  Sender,
  /// `dest` / `enderDest`.
  Recipient,
  /// `retirada`, which holds its address fields directly.
  Pickup,
}

impl AddressBlock {
  pub fn tag(self) -> &'static str {
    match self {
      Self::Issuer => "emit",
      Self::Sender => "rem",
      Self::Recipient => "dest",
      Self::Pickup => "retirada",
    }
  }

  /// Container for address sub-fields, `None` when they sit in the block.
  pub fn address_tag(self) -> Option<&'static str> {
    match self {
      Self::Issuer => Some("enderEmit"),
      Self::Sender => Some("enderReme"),
      Self::Recipient => Some("enderDest"),
      Self::Pickup => None,
    }
  }

  /// Whether the block itself may be created when missing.
  pub fn may_create_block(self) -> bool {
    matches!(self, Self::Recipient | Self::Pickup)
  }

  fn label(self) -> &'static str {
    match self {
      Self::Issuer => "issuer",
      Self::Sender => "sender",
      Self::Recipient => "recipient",
      Self::Pickup => "pickup",
    }
  }
}

/// Set the text of an existing node. Returns whether the text changed.
pub fn set_existing(node: &mut Element, path: &str, value: &str) -> bool {
  match RESOLVER.find_mut(node, path) {
    Some(el) => set_text(el, value),
    None => false,
  }
}

/// Like [`set_existing`], searching at any depth.
pub fn set_existing_deep(node: &mut Element, path: &str, value: &str) -> bool {
  match RESOLVER.find_deep_mut(node, path) {
    Some(el) => set_text(el, value),
    None => false,
  }
}

fn set_text(el: &mut Element, value: &str) -> bool {
  if el.text().trim() == value {
    return false;
  }
  el.set_text(value);
  true
}

/// Direct child `local`, appended in the parent's namespace when missing.
fn child_or_create<'a>(parent: &'a mut Element, local: &str) -> &'a mut Element {
  let name = sibling_name(parent, local);
  match RESOLVER.locate(parent, local).and_then(|idx| idx.first().copied()) {
    Some(i) => &mut parent.children[i],
    None => parent.push_child(Element::new(name)),
  }
}

/// Write party fields into `block` under `parent`, routing address
/// sub-fields into the block's address container.
pub fn apply_party(
  parent: &mut Element,
  block: AddressBlock,
  fields: &PartyFields,
  log: &mut ChangeLog,
) {
  let exists = RESOLVER.locate(parent, block.tag()).is_some();
  if !exists && !block.may_create_block() {
    debug!(block = block.tag(), "party block missing, not created");
    return;
  }
  let target = child_or_create(parent, block.tag());

  for (tag, value) in fields.entries() {
    let value = match tag {
      "CNPJ" | "CPF" => digits(value),
      _ => value.to_string(),
    };
    let holder = match block.address_tag() {
      Some(ender) if ADDRESS_FIELDS.contains(&tag) => {
        child_or_create(target, ender)
      }
      _ => &mut *target,
    };
    if set_text(child_or_create(holder, tag), &value) {
      log.record(format!("{}: <{tag}> updated", block.label()));
    }
  }
}
