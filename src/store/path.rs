//! Slash-delimited node paths.

use crate::error::StoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const RESERVED: [char; 5] = ['.', '#', '$', '[', ']'];

/// Location of a node in the remote store.
///
/// Stored in normalized form: no leading, trailing or repeated slashes. The
/// empty path is the store root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(String);

impl NodePath {
    /// Parse and normalize a path.
    pub fn new(raw: &str) -> Result<Self, StoreError> {
        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            validate_segment(segment, raw)?;
            segments.push(segment);
        }
        Ok(Self(segments.join("/")))
    }

    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append one segment.
    pub fn child(&self, segment: &str) -> Result<Self, StoreError> {
        if segment.is_empty() || segment.contains('/') {
            return Err(StoreError::InvalidPath(format!(
                "'{}' is not a single path segment",
                segment
            )));
        }
        validate_segment(segment, segment)?;
        if self.is_root() {
            Ok(Self(segment.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, segment)))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Last segment, `None` for the root.
    pub fn key(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Whether `other` lies strictly below this path.
    pub fn is_ancestor_of(&self, other: &NodePath) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate_segment(segment: &str, raw: &str) -> Result<(), StoreError> {
    if let Some(c) = segment.chars().find(|c| RESERVED.contains(c) || c.is_control()) {
        return Err(StoreError::InvalidPath(format!(
            "'{}' contains reserved character {:?}",
            raw, c
        )));
    }
    Ok(())
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl Serialize for NodePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NodePath::new(&raw).map_err(serde::de::Error::custom)
    }
}
