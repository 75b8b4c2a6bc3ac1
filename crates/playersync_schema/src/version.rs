//! # Schema Versions
//!
//! Semantic version identity for the shape of persisted data. Every record
//! written by the PlayerSync codecs carries a [`SchemaVersion`] so readers on
//! other servers can decide whether they understand the payload directly or
//! need to run it through a migration path first.
//!
//! ## Ordering
//!
//! Versions are ordered by `major`, `minor`, `patch` and finally the
//! pre-release tag. A release always sorts after any pre-release sharing its
//! numeric triple, so `1.2.3-alpha < 1.2.3`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing a [`SchemaVersion`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    /// The input was empty or only whitespace
    #[error("schema version is empty")]
    Empty,
    /// The input did not match `N[.N[.N]][-prerelease]`
    #[error("invalid schema version '{input}': {reason}")]
    InvalidFormat { input: String, reason: String },
}

impl VersionParseError {
    fn invalid(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// A `major.minor.patch[-prerelease]` schema version.
///
/// `SchemaVersion` is an immutable value type. It serializes as its text form
/// (`"2.1.0"`, `"3.0.0-beta"`) so it can live inside JSON documents and TOML
/// configuration files.
///
/// # Examples
///
/// ```rust
/// use playersync_schema::SchemaVersion;
///
/// let stored = SchemaVersion::parse("1.4")?;
/// let reader = SchemaVersion::of(1, 6, 0);
///
/// assert!(reader.is_compatible_with(&stored));
/// assert!(!stored.is_compatible_with(&reader));
/// assert_eq!(stored.to_string(), "1.4.0");
/// # Ok::<(), playersync_schema::VersionParseError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    major: u32,
    minor: u32,
    patch: u32,
    pre_release: Option<String>,
}

impl SchemaVersion {
    /// Creates a release version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            pre_release: None,
        }
    }

    /// Shorthand for [`SchemaVersion::new`].
    pub const fn of(major: u32, minor: u32, patch: u32) -> Self {
        Self::new(major, minor, patch)
    }

    /// The schema version new data is written with when nothing else is
    /// configured.
    pub const fn current() -> Self {
        Self::new(1, 0, 0)
    }

    /// Returns a copy of this version carrying the given pre-release tag.
    ///
    /// An empty tag clears the pre-release marker.
    pub fn with_pre_release(&self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        Self {
            pre_release: (!tag.is_empty()).then_some(tag),
            ..self.clone()
        }
    }

    /// Parses `N`, `N.N`, `N.N.N` with an optional `-prerelease` suffix.
    ///
    /// Missing components default to zero. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] when a component is not a non-negative
    /// integer, when there are more than three components, or when the
    /// pre-release suffix is empty.
    pub fn parse(text: &str) -> Result<Self, VersionParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let (core, pre_release) = match trimmed.split_once('-') {
            Some((_, "")) => {
                return Err(VersionParseError::invalid(text, "pre-release tag is empty"));
            }
            Some((core, tag)) => (core, Some(tag.to_string())),
            None => (trimmed, None),
        };

        let mut components = [0u32; 3];
        for (index, part) in core.split('.').enumerate() {
            if index >= components.len() {
                return Err(VersionParseError::invalid(
                    text,
                    "expected at most three numeric components",
                ));
            }
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionParseError::invalid(
                    text,
                    format!("component '{part}' is not a non-negative integer"),
                ));
            }
            components[index] = part.parse().map_err(|_| {
                VersionParseError::invalid(text, format!("component '{part}' is out of range"))
            })?;
        }

        let [major, minor, patch] = components;
        Ok(Self {
            major,
            minor,
            patch,
            pre_release,
        })
    }

    /// Like [`SchemaVersion::parse`] but returns `None` for malformed input.
    pub fn try_parse(text: &str) -> Option<Self> {
        Self::parse(text).ok()
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> u32 {
        self.patch
    }

    pub fn pre_release(&self) -> Option<&str> {
        self.pre_release.as_deref()
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }

    /// Returns `true` when a reader at this version can consume data written
    /// at `other`: same major version and `other` is not newer than `self`.
    pub fn is_compatible_with(&self, other: &SchemaVersion) -> bool {
        self.major == other.major && self >= other
    }

    /// Returns `true` when the major versions differ.
    ///
    /// Used as a cheap gate before asking the migration engine for a path.
    pub fn requires_migration_from(&self, other: &SchemaVersion) -> bool {
        self.major != other.major
    }

    pub fn next_major(&self) -> Self {
        Self::new(self.major.saturating_add(1), 0, 0)
    }

    pub fn next_minor(&self) -> Self {
        Self::new(self.major, self.minor.saturating_add(1), 0)
    }

    pub fn next_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch.saturating_add(1))
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(left), Some(right)) => left.cmp(right),
            })
    }
}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(tag) = &self.pre_release {
            write!(f, "-{tag}")?;
        }
        Ok(())
    }
}

impl FromStr for SchemaVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = VersionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SchemaVersion> for String {
    fn from(version: SchemaVersion) -> Self {
        version.to_string()
    }
}
