//! Core identifiers: feature paths, slice keys, feature types and feature values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Label reported in place of a bytes value that is not valid UTF-8.
pub const INVALID_STRING: &str = "__BYTES_VALUE__";

/// Name of the implicit whole-dataset slice when slicing is enabled.
pub const DEFAULT_SLICE_KEY: &str = "All Examples";

/// Ordered sequence of steps identifying a (possibly nested) column.
///
/// Equality, ordering and hashing all follow the step sequence, so a path can key any
/// per-feature map.
///
/// ```
/// use ironstats::FeaturePath;
///
/// let p = FeaturePath::from_name("user").child("age");
/// assert_eq!(p.to_string(), "user.age");
/// assert_eq!(p.parent(), Some(FeaturePath::from_name("user")));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeaturePath(Vec<String>);

impl FeaturePath {
    pub fn new<I, S>(steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(steps.into_iter().map(Into::into).collect())
    }

    /// A one-step path.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    #[must_use]
    pub fn steps(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The path without its last step, or `None` for a one-step (or empty) path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.len() <= 1 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    #[must_use]
    pub fn child(&self, step: impl Into<String>) -> Self {
        let mut steps = self.0.clone();
        steps.push(step.into());
        Self(steps)
    }

    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for FeaturePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for FeaturePath {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// Partition identifier under which statistics are computed separately.
///
/// The absent key is the single implicit whole-dataset slice used when slicing is off.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SliceKey(Option<String>);

impl SliceKey {
    #[must_use]
    pub const fn whole_dataset() -> Self {
        Self(None)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self(Some(name.into()))
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl fmt::Display for SliceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_deref().unwrap_or(""))
    }
}

/// Logical type of a feature as reported in the statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureType {
    Int,
    Float,
    String,
    Struct,
}

/// A categorical feature value: bytes/strings or categorical integers.
///
/// Values are totally ordered (`Int` before `Bytes`, bytes lexicographically) so that
/// top-k ties break the same way on every run.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FeatureValue {
    Int(i64),
    Bytes(Vec<u8>),
}

impl FeatureValue {
    /// Human-readable label, or `None` when the bytes are not valid UTF-8.
    #[must_use]
    pub fn try_label(&self) -> Option<String> {
        match self {
            Self::Int(v) => Some(v.to_string()),
            Self::Bytes(b) => std::str::from_utf8(b).ok().map(str::to_owned),
        }
    }

    /// Label with undecodable bytes replaced by [`INVALID_STRING`].
    #[must_use]
    pub fn label(&self) -> String {
        self.try_label()
            .unwrap_or_else(|| INVALID_STRING.to_string())
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        Self::Bytes(s.as_bytes().to_vec())
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}
