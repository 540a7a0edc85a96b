//! Text locator: finds translatable leaf strings in a record and rebuilds the
//! record with translations applied.
//!
//! Both directions share one traversal, so a leaf is visited at the same
//! position in the same order whether it is being collected or replaced.

use crate::error::StructuralError;
use crate::filter::is_identifier;
use crate::record::path::{FieldPath, FieldSelector, PathSegment};
use serde_json::Value;
use std::collections::HashMap;

/// Default marker for internal/system fields (`_id`, `__v`, ...).
pub const DEFAULT_RESERVED_PREFIX: &str = "_";

/// Default nesting limit for a record.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// A candidate string and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedText {
    pub path: FieldPath,
    pub text: String,
}

/// Walks records in pre-order: mappings in key order, sequences in index order.
#[derive(Debug, Clone)]
pub struct TextLocator {
    reserved_prefix: String,
    max_depth: usize,
}

impl Default for TextLocator {
    fn default() -> Self {
        Self::new(DEFAULT_RESERVED_PREFIX, DEFAULT_MAX_DEPTH)
    }
}

impl TextLocator {
    /// An empty `reserved_prefix` disables reserved-key skipping.
    pub fn new(reserved_prefix: impl Into<String>, max_depth: usize) -> Self {
        Self {
            reserved_prefix: reserved_prefix.into(),
            max_depth,
        }
    }

    fn is_reserved(&self, key: &str) -> bool {
        !self.reserved_prefix.is_empty() && key.starts_with(&self.reserved_prefix)
    }

    /// A leaf string is a candidate when it has non-blank content and is not
    /// a document identifier.
    fn is_candidate(text: &str) -> bool {
        !text.trim().is_empty() && !is_identifier(text)
    }

    /// Collect every candidate string the selector allows, in traversal order.
    pub fn locate(
        &self,
        record: &Value,
        selector: &FieldSelector,
    ) -> Result<Vec<LocatedText>, StructuralError> {
        let mut found = Vec::new();
        // Explicit work stack; children are pushed in reverse to pop in order.
        let mut stack: Vec<(&Value, FieldPath)> = vec![(record, FieldPath::root())];

        while let Some((node, path)) = stack.pop() {
            if path.len() > self.max_depth {
                return Err(StructuralError::DepthExceeded {
                    limit: self.max_depth,
                });
            }
            // Every descendant of an excluded path is excluded too
            if selector.is_excluded(&path) {
                continue;
            }

            match node {
                Value::String(text) => {
                    if Self::is_candidate(text) && selector.is_included(&path) {
                        found.push(LocatedText {
                            path,
                            text: text.clone(),
                        });
                    }
                }
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate().rev() {
                        stack.push((item, path.child_index(index)));
                    }
                }
                Value::Object(map) => {
                    for (key, child) in map.iter().rev() {
                        if !self.is_reserved(key) {
                            stack.push((child, path.child_key(key)));
                        }
                    }
                }
                Value::Null | Value::Bool(_) | Value::Number(_) => {}
            }
        }

        Ok(found)
    }

    /// Build a new record where each located leaf whose text has an entry in
    /// `translations` is replaced by that entry. The input is left untouched.
    pub fn reconstruct(
        &self,
        record: &Value,
        translations: &HashMap<String, String>,
        selector: &FieldSelector,
    ) -> Result<Value, StructuralError> {
        let located = self.locate(record, selector)?;
        let mut rebuilt = record.clone();

        for LocatedText { path, text } in located {
            let Some(translated) = translations.get(&text) else {
                continue;
            };
            let slot = value_at_mut(&mut rebuilt, &path)
                .ok_or_else(|| StructuralError::PathMismatch(path.to_string()))?;
            *slot = Value::String(translated.clone());
        }

        Ok(rebuilt)
    }
}

fn value_at_mut<'a>(root: &'a mut Value, path: &FieldPath) -> Option<&'a mut Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| match (node, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get_mut(key),
            (Value::Array(items), PathSegment::Index(index)) => items.get_mut(*index),
            _ => None,
        })
}
