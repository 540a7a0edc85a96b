//! Structural positions inside a record and the field selector built on them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One step from a container to one of its children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// Segment-wise comparison used by selectors.
    ///
    /// Selector text cannot tell `items.0` (index) from a map key named `"0"`,
    /// so a numeric segment matches both.
    fn matches(&self, other: &PathSegment) -> bool {
        match (self, other) {
            (PathSegment::Key(a), PathSegment::Key(b)) => a == b,
            (PathSegment::Index(a), PathSegment::Index(b)) => a == b,
            (PathSegment::Index(i), PathSegment::Key(k))
            | (PathSegment::Key(k), PathSegment::Index(i)) => k.parse::<usize>().ok() == Some(*i),
        }
    }
}

/// Position of a value within a record, root first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted or indexed path: `a.b.0.c` and `a.b[0].c` are equal.
    pub fn parse(text: &str) -> Self {
        let normalized = text.replace('[', ".").replace(']', "");
        let segments = normalized
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| match s.parse::<usize>() {
                Ok(index) => PathSegment::Index(index),
                Err(_) => PathSegment::Key(s.to_string()),
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child_key(&self, key: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Key(key.to_string()));
        Self { segments }
    }

    pub fn child_index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Index(index));
        Self { segments }
    }

    /// Whether `self` is a (non-strict) segment-wise prefix of `other`.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        self.segments.len() <= other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a.matches(b))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                PathSegment::Key(key) => f.write_str(key)?,
                PathSegment::Index(index) => write!(f, "{}", index)?,
            }
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ok(Self::parse(&text))
    }
}

/// Inclusion/exclusion rules deciding which leaves may be translated.
///
/// An empty `fields` list includes everything. A path is excluded when any
/// `exclude_fields` entry is a prefix of it, even if it is also included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelector {
    #[serde(default)]
    pub fields: Vec<FieldPath>,
    #[serde(default, alias = "excludeFields")]
    pub exclude_fields: Vec<FieldPath>,
}

impl FieldSelector {
    /// Selects every leaf.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn include(mut self, path: &str) -> Self {
        self.fields.push(FieldPath::parse(path));
        self
    }

    pub fn exclude(mut self, path: &str) -> Self {
        self.exclude_fields.push(FieldPath::parse(path));
        self
    }

    pub fn is_excluded(&self, path: &FieldPath) -> bool {
        self.exclude_fields.iter().any(|p| p.is_prefix_of(path))
    }

    pub fn is_included(&self, path: &FieldPath) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|p| p.is_prefix_of(path))
    }

    /// Whether a leaf at `path` qualifies. Exclusion wins.
    pub fn allows(&self, path: &FieldPath) -> bool {
        !self.is_excluded(path) && self.is_included(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== FieldPath ====================

    #[test]
    fn test_parse_dotted_and_indexed_forms_agree() {
        assert_eq!(FieldPath::parse("a.b.0.c"), FieldPath::parse("a.b[0].c"));
        assert_eq!(FieldPath::parse("items[2]").len(), 2);
    }

    #[test]
    fn test_parse_ignores_empty_segments() {
        assert_eq!(FieldPath::parse("a..b."), FieldPath::parse("a.b"));
        assert!(FieldPath::parse("").is_empty());
    }

    #[test]
    fn test_display_round_trips_dotted_form() {
        let path = FieldPath::root().child_key("items").child_index(3).child_key("title");
        assert_eq!(path.to_string(), "items.3.title");
        assert_eq!(FieldPath::parse(&path.to_string()), path);
    }

    #[test]
    fn test_prefix_is_segment_wise() {
        let a = FieldPath::parse("a");
        assert!(a.is_prefix_of(&FieldPath::parse("a")));
        assert!(a.is_prefix_of(&FieldPath::parse("a.b")));
        assert!(!a.is_prefix_of(&FieldPath::parse("ab")));
        assert!(!FieldPath::parse("a.b").is_prefix_of(&a));
    }

    #[test]
    fn test_root_is_prefix_of_everything() {
        assert!(FieldPath::root().is_prefix_of(&FieldPath::parse("x.y")));
    }

    #[test]
    fn test_numeric_selector_matches_numeric_key() {
        let selector_path = FieldPath::parse("translations.0");
        let key_path = FieldPath::root().child_key("translations").child_key("0");
        assert!(selector_path.is_prefix_of(&key_path));
    }

    // ==================== FieldSelector ====================

    #[test]
    fn test_empty_selector_allows_everything() {
        let selector = FieldSelector::all();
        assert!(selector.allows(&FieldPath::parse("anything.at.all")));
        assert!(selector.allows(&FieldPath::root()));
    }

    #[test]
    fn test_exclusion_takes_precedence() {
        let selector = FieldSelector::all().include("a").exclude("a.b");

        assert!(!selector.allows(&FieldPath::parse("a.b.c")));
        assert!(!selector.allows(&FieldPath::parse("a.b")));
        assert!(selector.allows(&FieldPath::parse("a.c")));
        assert!(!selector.allows(&FieldPath::parse("z")));
    }

    #[test]
    fn test_same_path_included_and_excluded_is_excluded() {
        let selector = FieldSelector::all().include("title").exclude("title");
        assert!(!selector.allows(&FieldPath::parse("title")));
    }

    #[test]
    fn test_deserialize_accepts_camel_case_exclusions() {
        let selector: FieldSelector =
            serde_json::from_str(r#"{"fields":["a"],"excludeFields":["a[0]"]}"#).unwrap();

        assert_eq!(selector.fields, vec![FieldPath::parse("a")]);
        assert_eq!(selector.exclude_fields, vec![FieldPath::parse("a.0")]);
    }

    #[test]
    fn test_deserialize_defaults_to_all() {
        let selector: FieldSelector = serde_json::from_str("{}").unwrap();
        assert_eq!(selector, FieldSelector::all());
    }
}
