//! Writing [`Element`] trees back to text.
//!
//! Namespace declarations are produced from the tree itself, not copied from
//! the source: an element whose namespace differs from the default in scope
//! declares its own default namespace. Namespaces bound to a prefix with
//! [`Serializer::bind`] are declared once on the root and written prefixed
//! instead.

use quick_xml::{
  Writer,
  escape::partial_escape,
  events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{
  element::Element,
  error::{Error, Result},
};

#[derive(Debug, Clone)]
pub struct Serializer {
  declaration: bool,
  bindings:    Vec<(String, String)>,
}

impl Default for Serializer {
  fn default() -> Self { Self::new() }
}

impl Serializer {
  /// A serializer emitting an XML declaration and no prefixes.
  pub fn new() -> Self {
    Self {
      declaration: true,
      bindings:    Vec::new(),
    }
  }

  pub fn declaration(mut self, on: bool) -> Self {
    self.declaration = on;
    self
  }

  /// Write elements in `uri` as `prefix:local`.
  pub fn bind(mut self, prefix: &str, uri: &str) -> Self {
    self.bindings.push((prefix.to_string(), uri.to_string()));
    self
  }

  fn prefix_for(&self, uri: &str) -> Option<&str> {
    self
      .bindings
      .iter()
      .find(|(_, u)| u == uri)
      .map(|(p, _)| p.as_str())
  }

  pub fn to_bytes(&self, root: &Element) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    if self.declaration {
      writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(write_err)?;
    }
    self.write(&mut writer, root, None, true)?;
    Ok(writer.into_inner())
  }

  pub fn to_string(&self, root: &Element) -> Result<String> {
    let bytes = self.to_bytes(root)?;
    String::from_utf8(bytes).map_err(write_err)
  }

  fn write(
    &self,
    w: &mut Writer<Vec<u8>>,
    el: &Element,
    default_ns: Option<&str>,
    is_root: bool,
  ) -> Result<()> {
    let ns = el.ns();
    let prefix = ns.and_then(|uri| self.prefix_for(uri));

    let tag = match prefix {
      Some(p) => format!("{p}:{}", el.local()),
      None => el.local().to_string(),
    };
    let mut start = BytesStart::new(tag.as_str());

    // the default namespace only changes for unprefixed elements
    let mut scope = default_ns;
    if prefix.is_none() && ns != default_ns {
      start.push_attribute(("xmlns", ns.unwrap_or("")));
      scope = ns;
    }
    if is_root {
      for (p, uri) in &self.bindings {
        let key = format!("xmlns:{p}");
        start.push_attribute((key.as_str(), uri.as_str()));
      }
    }
    for (k, v) in &el.attributes {
      start.push_attribute((k.as_str(), v.as_str()));
    }

    if el.children.is_empty() && el.text.is_empty() {
      return w.write_event(Event::Empty(start)).map_err(write_err);
    }

    w.write_event(Event::Start(start)).map_err(write_err)?;
    if !el.text.is_empty() {
      let text = BytesText::from_escaped(partial_escape(&el.text));
      w.write_event(Event::Text(text)).map_err(write_err)?;
    }
    for child in &el.children {
      self.write(w, child, scope, false)?;
    }
    w.write_event(Event::End(BytesEnd::new(tag.as_str())))
      .map_err(write_err)
  }
}

fn write_err(e: impl std::fmt::Display) -> Error { Error::Write(e.to_string()) }
