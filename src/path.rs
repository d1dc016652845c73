//! Logical source paths.
//!
//! Every file the compiler touches is addressed by an ordered sequence of
//! segments, never by a joined string. Two paths are equal when their segments
//! are pairwise equal, which is exactly what the derived `Eq`/`Hash` give us, so
//! `SourcePath` is used directly as the key of every path-addressed cache.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A path relative to the document root, as an ordered list of segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourcePath(Vec<String>);

impl SourcePath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the vector graphic drawn for a background.
    pub fn background(normalized: &str) -> Self {
        Self(vec!["backgrounds".into(), format!("{}.svg", normalized)])
    }

    /// Path of the vector graphic drawn for one emote of one character.
    pub fn emote(character: &str, emote: &str) -> Self {
        Self(vec![
            "characters".into(),
            character.to_string(),
            "emotes".into(),
            format!("{}.svg", emote),
        ])
    }
}

impl<const N: usize> From<[&str; N]> for SourcePath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for SourcePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}
