//! Reading documents into [`Element`] trees.
//!
//! Uses `quick-xml`'s namespace-aware reader so every element name is stored
//! with its resolved namespace URI rather than its source prefix. Attributes
//! keep their prefix, so an element with a prefixed attribute also keeps the
//! `xmlns:` declaration it relies on. Comments and processing instructions
//! are dropped, whitespace between tags is trimmed.

use quick_xml::{
  NsReader,
  events::{BytesStart, Event},
  name::{Namespace, ResolveResult},
};
use tracing::debug;

use crate::{
  element::{Element, Name},
  error::{Error, Result},
};

fn parse_err(e: impl std::fmt::Display) -> Error { Error::Parse(e.to_string()) }

/// Prefix declarations made by one open element.
type Scope = Vec<(String, String)>;

/// Parse a complete document.
pub fn parse(xml: &[u8]) -> Result<Element> {
  let mut reader = NsReader::from_reader(xml);
  reader.config_mut().trim_text(true);

  let mut stack: Vec<Element> = Vec::new();
  let mut scopes: Vec<Scope> = Vec::new();
  let mut root: Option<Element> = None;
  let mut buf = Vec::new();

  loop {
    match reader.read_resolved_event_into(&mut buf).map_err(parse_err)? {
      (ns, Event::Start(ref e)) => {
        let (el, scope) = open(ns, e, &scopes)?;
        stack.push(el);
        scopes.push(scope);
      }
      (ns, Event::Empty(ref e)) => {
        let (el, _) = open(ns, e, &scopes)?;
        attach(&mut stack, &mut root, el)?;
      }
      (_, Event::End(_)) => {
        let el = stack
          .pop()
          .ok_or_else(|| Error::Parse("unbalanced end tag".into()))?;
        scopes.pop();
        attach(&mut stack, &mut root, el)?;
      }
      (_, Event::Text(ref e)) => {
        let text = e.unescape().map_err(parse_err)?;
        match stack.last_mut() {
          Some(top) => top.text.push_str(&text),
          None if text.trim().is_empty() => {}
          None => return Err(Error::Parse("text outside root element".into())),
        }
      }
      (_, Event::CData(ref e)) => {
        if let Some(top) = stack.last_mut() {
          top.text.push_str(&String::from_utf8_lossy(e));
        }
      }
      (_, Event::Eof) => break,
      _ => {}
    }
    buf.clear();
  }

  if !stack.is_empty() {
    return Err(Error::Parse("unexpected end of document".into()));
  }
  root.ok_or(Error::Empty)
}

/// Parse a document, retrying once without whatever precedes the first `<`
/// (byte-order marks, stray bytes left by hand edits or broken exports).
pub fn parse_lenient(xml: &[u8]) -> Result<Element> {
  match parse(xml) {
    Ok(root) => Ok(root),
    Err(first) => match xml.iter().position(|&b| b == b'<') {
      Some(start) if start > 0 => {
        debug!(skipped = start, "retrying parse without leading bytes");
        parse(&xml[start..])
      }
      _ => Err(first),
    },
  }
}

fn open(
  ns: ResolveResult<'_>,
  e: &BytesStart<'_>,
  scopes: &[Scope],
) -> Result<(Element, Scope)> {
  let ns = match ns {
    ResolveResult::Bound(Namespace(uri)) => {
      Some(String::from_utf8_lossy(uri).into_owned())
    }
    ResolveResult::Unbound => None,
    ResolveResult::Unknown(prefix) => {
      return Err(Error::Parse(format!(
        "unknown namespace prefix {:?}",
        String::from_utf8_lossy(&prefix)
      )));
    }
  };
  let local_name = e.local_name();
  let local = std::str::from_utf8(local_name.as_ref()).map_err(parse_err)?;

  let mut el = Element::new(Name {
    ns,
    local: local.to_string(),
  });
  let mut declared: Scope = Vec::new();
  let mut attributes = Vec::new();
  for attr in e.attributes() {
    let attr = attr.map_err(parse_err)?;
    let key = std::str::from_utf8(attr.key.as_ref()).map_err(parse_err)?;
    let value = attr.unescape_value().map_err(parse_err)?.into_owned();
    if key == "xmlns" {
      continue;
    }
    match key.strip_prefix("xmlns:") {
      Some(prefix) => declared.push((prefix.to_string(), value)),
      None => attributes.push((key.to_string(), value)),
    }
  }

  for (key, _) in &attributes {
    let Some((prefix, _)) = key.split_once(':') else { continue };
    let decl = format!("xmlns:{prefix}");
    if prefix == "xml" || el.attr(&decl).is_some() {
      continue;
    }
    let uri = declared
      .iter()
      .chain(scopes.iter().rev().flatten())
      .find(|(p, _)| p == prefix)
      .map(|(_, uri)| uri.clone());
    if let Some(uri) = uri {
      el.attributes.push((decl, uri));
    }
  }
  el.attributes.extend(attributes);
  Ok((el, declared))
}

fn attach(
  stack: &mut [Element],
  root: &mut Option<Element>,
  el: Element,
) -> Result<()> {
  match stack.last_mut() {
    Some(parent) => parent.children.push(el),
    None if root.is_none() => *root = Some(el),
    None => return Err(Error::Parse("multiple root elements".into())),
  }
  Ok(())
}
