//! Records: arbitrarily nested JSON values and the tools to walk them.
//!
//! - `path`: structural positions and the `FieldSelector` inclusion/exclusion rules
//! - `locator`: collects translatable leaves and rebuilds records with translations

mod locator;
mod path;

pub use locator::{LocatedText, TextLocator, DEFAULT_MAX_DEPTH, DEFAULT_RESERVED_PREFIX};
pub use path::{FieldPath, FieldSelector, PathSegment};

/// A record is any JSON value.
pub type Record = serde_json::Value;
