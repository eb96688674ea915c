//! A small owned XML tree over `quick-xml`.
//!
//! Fiscal documents are read into [`Element`] trees with every element name
//! resolved to its namespace URI, edited in place, and written back by a
//! [`Serializer`] configured with the namespaces to declare. Lookups go
//! through a [`Resolver`], which tries each known namespace in turn and then
//! the unqualified name, so hand-edited documents with missing or mixed
//! namespaces still resolve.

mod element;
mod parse;
mod path;
mod serialize;

pub mod error;

pub use element::{Element, Name};
pub use error::{Error, Result};
pub use parse::{parse, parse_lenient};
pub use path::Resolver;
pub use serialize::Serializer;
