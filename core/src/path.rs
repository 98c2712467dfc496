//! Addressing of (possibly nested) options.

use std::fmt;

use serde::{Serialize, Serializer};

/// Ordered, immutable sequence of option names from the schema root.
///
/// # Examples
///
/// ```
/// use option_schema_core::OptionPath;
///
/// let path = OptionPath::of("source").add("string");
/// assert_eq!(path.to_string(), "source.string");
/// assert_eq!(path.len(), 2);
/// assert_eq!(path.last(), Some("string"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OptionPath {
    segments: Vec<String>,
}

impl OptionPath {
    /// The path of the schema root.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single-segment path.
    pub fn of(segment: impl Into<String>) -> Self {
        Self::empty().add(segment)
    }

    /// Returns a new path extended by `segment`; `self` is left untouched.
    pub fn add(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Renders the segments joined by `separator`.
    pub fn join(&self, separator: &str) -> String {
        self.segments.join(separator)
    }
}

impl fmt::Display for OptionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("."))
    }
}

impl Serialize for OptionPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<S: Into<String>> FromIterator<S> for OptionPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}
