//! Namespace-tolerant path lookup.
//!
//! A path is a slash-separated list of local names (`"ide/nNF"`). Every
//! segment is matched in the same namespace. A [`Resolver`] tries the path in
//! each of its namespaces in order and finally unqualified, and the first
//! namespace that yields a match wins. Lookups never fail; a missing node is
//! `None` or an empty list.
//!
//! Mutable lookups go through index paths: [`Resolver::locate`] finds the
//! chain of child indices immutably and [`Element::at_mut`] follows it.

use crate::element::Element;

#[derive(Debug, Clone, Copy)]
pub struct Resolver {
  namespaces: &'static [&'static str],
}

impl Resolver {
  pub const fn new(namespaces: &'static [&'static str]) -> Self {
    Self { namespaces }
  }

  fn candidates(&self) -> impl Iterator<Item = Option<&'static str>> + '_ {
    self
      .namespaces
      .iter()
      .map(|ns| Some(*ns))
      .chain(std::iter::once(None))
  }

  // ── Shallow ───────────────────────────────────────────────────────────

  /// Index path of the first match for `path` below `node`.
  pub fn locate(&self, node: &Element, path: &str) -> Option<Vec<usize>> {
    self
      .candidates()
      .find_map(|ns| descend(node, ns, &segments(path)))
  }

  pub fn find<'a>(&self, node: &'a Element, path: &str) -> Option<&'a Element> {
    self.locate(node, path).and_then(|idx| node.at(&idx))
  }

  pub fn find_mut<'a>(
    &self,
    node: &'a mut Element,
    path: &str,
  ) -> Option<&'a mut Element> {
    let idx = self.locate(node, path)?;
    node.at_mut(&idx)
  }

  /// Trimmed text of the first match, if the match exists.
  pub fn text<'a>(&self, node: &'a Element, path: &str) -> Option<&'a str> {
    self.find(node, path).map(|el| el.text().trim())
  }

  // ── Deep ──────────────────────────────────────────────────────────────

  /// Like [`Resolver::locate`], but the first segment may sit at any depth
  /// below `node`. Descendants are searched in document order.
  pub fn locate_deep(&self, node: &Element, path: &str) -> Option<Vec<usize>> {
    let segs = segments(path);
    if segs.is_empty() {
      return None;
    }
    self.candidates().find_map(|ns| {
      let mut found = None;
      search_deep(node, ns, &segs, &mut Vec::new(), &mut found);
      found
    })
  }

  pub fn find_deep<'a>(
    &self,
    node: &'a Element,
    path: &str,
  ) -> Option<&'a Element> {
    self.locate_deep(node, path).and_then(|idx| node.at(&idx))
  }

  pub fn find_deep_mut<'a>(
    &self,
    node: &'a mut Element,
    path: &str,
  ) -> Option<&'a mut Element> {
    let idx = self.locate_deep(node, path)?;
    node.at_mut(&idx)
  }

  // ── Multi-match ───────────────────────────────────────────────────────

  /// Every match for `path`, from the first namespace yielding any.
  pub fn locate_all(&self, node: &Element, path: &str) -> Vec<Vec<usize>> {
    let segs = segments(path);
    self
      .candidates()
      .map(|ns| {
        let mut out = Vec::new();
        collect(node, ns, &segs, &mut Vec::new(), &mut out);
        out
      })
      .find(|out| !out.is_empty())
      .unwrap_or_default()
  }

  pub fn find_all<'a>(&self, node: &'a Element, path: &str) -> Vec<&'a Element> {
    self
      .locate_all(node, path)
      .iter()
      .filter_map(|idx| node.at(idx))
      .collect()
  }
}

fn segments(path: &str) -> Vec<&str> {
  path.split('/').filter(|s| !s.is_empty()).collect()
}

fn descend(node: &Element, ns: Option<&str>, segs: &[&str]) -> Option<Vec<usize>> {
  let mut idx = Vec::with_capacity(segs.len());
  let mut current = node;
  for seg in segs {
    let i = current.children.iter().position(|c| c.is(ns, seg))?;
    idx.push(i);
    current = &current.children[i];
  }
  Some(idx)
}

fn search_deep(
  node: &Element,
  ns: Option<&str>,
  segs: &[&str],
  prefix: &mut Vec<usize>,
  found: &mut Option<Vec<usize>>,
) {
  for (i, child) in node.children.iter().enumerate() {
    if found.is_some() {
      return;
    }
    prefix.push(i);
    if child.is(ns, segs[0]) {
      if let Some(rest) = descend(child, ns, &segs[1..]) {
        let mut idx = prefix.clone();
        idx.extend(rest);
        *found = Some(idx);
        prefix.pop();
        return;
      }
    }
    search_deep(child, ns, segs, prefix, found);
    prefix.pop();
  }
}

fn collect(
  node: &Element,
  ns: Option<&str>,
  segs: &[&str],
  prefix: &mut Vec<usize>,
  out: &mut Vec<Vec<usize>>,
) {
  let Some((first, rest)) = segs.split_first() else {
    out.push(prefix.clone());
    return;
  };
  for (i, child) in node.children.iter().enumerate() {
    if child.is(ns, first) {
      prefix.push(i);
      collect(child, ns, rest, prefix, out);
      prefix.pop();
    }
  }
}
