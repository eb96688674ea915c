//! Cancellation event rewriting.
//!
//! The cancelled key appears in the event itself and again in the
//! registration echo (`retEvento`), so every element whose local name ends in
//! `chNFe` is remapped, not just the first.

use rekey_core::key::KEY_LEN;
use rekey_xml::Element;

use crate::{
  fiscal::RESOLVER,
  mutate::{ChangeLog, Mutator, fields::set_existing_deep},
};

/// `ID` + event type(6), ahead of the target key in an event `Id`.
const EVENT_ID_HEAD: usize = 8;

pub(super) fn apply(m: &Mutator<'_>, root: &mut Element, log: &mut ChangeLog) {
  let mut rekeyed: Vec<String> = Vec::new();
  root.walk_mut(&mut |el| {
    if !el.local().ends_with("chNFe") {
      return;
    }
    if let Some(new) = m.mappings.new_key(el.text()) {
      el.set_text(new.as_str());
      rekeyed.push(new.to_string());
    }
  });
  for new in &rekeyed {
    log.record_identity(format!("<chNFe> changed to {new}"));
  }

  if let Some(new) = rekeyed.first() {
    let event = if root.local() == "evento" {
      RESOLVER.find_mut(root, "infEvento")
    } else {
      RESOLVER.find_deep_mut(root, "evento/infEvento")
    };
    if let Some(event) = event {
      rebuild_event_id(event, new, log);
    }
  }

  if let Some(ts) = &m.timestamp {
    for path in [
      "evento/infEvento/dhEvento",
      "retEvento/infEvento/dhRecbto",
      "retEvento/infEvento/dhRegEvento",
    ] {
      if set_existing_deep(root, path, ts) {
        let tag = path.rsplit('/').next().unwrap_or(path);
        log.record(format!("date: <{tag}> updated"));
      }
    }
  }
}

/// Swap the key inside `ID<type><key><seq>`, keeping head and tail.
fn rebuild_event_id(event: &mut Element, new: &str, log: &mut ChangeLog) {
  let Some(id) = event.attr("Id") else { return };
  let tail_at = EVENT_ID_HEAD + KEY_LEN;
  let (Some(head), Some(tail)) = (id.get(..EVENT_ID_HEAD), id.get(tail_at..)) else {
    return;
  };
  let rebuilt = format!("{head}{new}{tail}");
  if rebuilt != id {
    event.set_attr("Id", rebuilt.clone());
    log.record_identity(format!("event Id changed to {rebuilt}"));
  }
}
