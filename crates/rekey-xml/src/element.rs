//! The owned element tree.

use std::fmt;

/// A namespace-resolved element name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
  /// Namespace URI, `None` for unqualified elements.
  pub ns:    Option<String>,
  pub local: String,
}

impl Name {
  pub fn new(ns: Option<&str>, local: &str) -> Self {
    Self {
      ns:    ns.map(str::to_string),
      local: local.to_string(),
    }
  }

  pub fn is(&self, ns: Option<&str>, local: &str) -> bool {
    self.local == local && self.ns.as_deref() == ns
  }
}

impl fmt::Display for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.ns {
      Some(ns) => write!(f, "{{{ns}}}{}", self.local),
      None => f.write_str(&self.local),
    }
  }
}

/// An element with its attributes, text and child elements.
///
/// Fiscal documents carry no mixed content, so an element holds one text
/// run (possibly empty) and an ordered list of children. Namespace
/// declarations are not kept as attributes; the serializer re-creates them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
  pub name:       Name,
  pub attributes: Vec<(String, String)>,
  pub text:       String,
  pub children:   Vec<Element>,
}

impl Element {
  pub fn new(name: Name) -> Self {
    Self {
      name,
      attributes: Vec::new(),
      text: String::new(),
      children: Vec::new(),
    }
  }

  /// A new element in `ns` carrying `text`.
  pub fn leaf(ns: Option<&str>, local: &str, text: impl Into<String>) -> Self {
    let mut el = Self::new(Name::new(ns, local));
    el.text = text.into();
    el
  }

  pub fn local(&self) -> &str { &self.name.local }

  pub fn ns(&self) -> Option<&str> { self.name.ns.as_deref() }

  pub fn is(&self, ns: Option<&str>, local: &str) -> bool {
    self.name.is(ns, local)
  }

  // ── Attributes ────────────────────────────────────────────────────────

  pub fn attr(&self, key: &str) -> Option<&str> {
    self
      .attributes
      .iter()
      .find(|(k, _)| k == key)
      .map(|(_, v)| v.as_str())
  }

  pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
    let value = value.into();
    match self.attributes.iter_mut().find(|(k, _)| k == key) {
      Some((_, v)) => *v = value,
      None => self.attributes.push((key.to_string(), value)),
    }
  }

  // ── Text ──────────────────────────────────────────────────────────────

  pub fn text(&self) -> &str { &self.text }

  pub fn set_text(&mut self, text: impl Into<String>) { self.text = text.into(); }

  // ── Children ──────────────────────────────────────────────────────────

  pub fn child(&self, ns: Option<&str>, local: &str) -> Option<&Element> {
    self.children.iter().find(|c| c.is(ns, local))
  }

  /// Append `child` and return a handle to it.
  pub fn push_child(&mut self, child: Element) -> &mut Element {
    self.children.push(child);
    let last = self.children.len() - 1;
    &mut self.children[last]
  }

  /// Drop every direct child matching `pred`, returning how many went.
  pub fn remove_children(&mut self, pred: impl Fn(&Element) -> bool) -> usize {
    let before = self.children.len();
    self.children.retain(|c| !pred(c));
    before - self.children.len()
  }

  /// Follow a chain of child indices from this element.
  pub fn at(&self, indices: &[usize]) -> Option<&Element> {
    indices
      .iter()
      .try_fold(self, |el, &i| el.children.get(i))
  }

  pub fn at_mut(&mut self, indices: &[usize]) -> Option<&mut Element> {
    indices
      .iter()
      .try_fold(self, |el, &i| el.children.get_mut(i))
  }

  // ── Traversal ─────────────────────────────────────────────────────────

  /// Pre-order visit of this element and all descendants.
  pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
    f(self);
    for child in &self.children {
      child.walk(f);
    }
  }

  pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
    f(self);
    for child in &mut self.children {
      child.walk_mut(f);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Element {
    let mut root = Element::new(Name::new(Some("urn:a"), "root"));
    let ide = root.push_child(Element::new(Name::new(Some("urn:a"), "ide")));
    ide.push_child(Element::leaf(Some("urn:a"), "nNF", "42"));
    root.push_child(Element::leaf(None, "loose", "x"));
    root
  }

  #[test]
  fn attributes_are_replaced_in_place() {
    let mut el = Element::new(Name::new(None, "infNFe"));
    el.set_attr("Id", "NFe1");
    el.set_attr("versao", "4.00");
    el.set_attr("Id", "NFe2");
    assert_eq!(el.attr("Id"), Some("NFe2"));
    assert_eq!(el.attributes.len(), 2);
  }

  #[test]
  fn index_paths_follow_children() {
    let mut root = sample();
    assert_eq!(root.at(&[0, 0]).map(Element::text), Some("42"));
    assert!(root.at(&[3]).is_none());
    root.at_mut(&[0, 0]).unwrap().set_text("43");
    assert_eq!(root.at(&[0, 0]).unwrap().text(), "43");
  }

  #[test]
  fn walk_is_preorder() {
    let root = sample();
    let mut seen = Vec::new();
    root.walk(&mut |e| seen.push(e.local().to_string()));
    assert_eq!(seen, ["root", "ide", "nNF", "loose"]);
  }

  #[test]
  fn remove_children_counts() {
    let mut root = sample();
    assert_eq!(root.remove_children(|c| c.local() == "loose"), 1);
    assert_eq!(root.children.len(), 1);
  }

  #[test]
  fn name_display_uses_clark_notation() {
    assert_eq!(Name::new(Some("urn:a"), "x").to_string(), "{urn:a}x");
    assert_eq!(Name::new(None, "x").to_string(), "x");
  }
}
