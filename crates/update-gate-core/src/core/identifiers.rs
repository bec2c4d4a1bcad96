// crates/update-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Update Gate Identifiers
// Description: Canonical identifiers for updates, assets, scopes, and runtimes.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Update identifiers are UUIDs taken from the manifest `id` field. Their
//! ordering matches the lexicographic ordering of the lowercase hyphenated
//! string form, which the launch selector relies on for tie-breaking. The
//! remaining identifiers are opaque strings validated at manifest and
//! configuration boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when parsing identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    /// Update identifier was not a UUID.
    #[error("invalid update id {value}: {reason}")]
    InvalidUpdateId {
        /// Rejected input.
        value: String,
        /// Parser failure detail.
        reason: String,
    },
}

// ============================================================================
// SECTION: Update Identifier
// ============================================================================

/// Update identifier (manifest UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdateId(Uuid);

impl UpdateId {
    /// Wraps an existing UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generates a random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses an identifier from its string form.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::InvalidUpdateId`] when the input is not a UUID.
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        Uuid::parse_str(value).map(Self).map_err(|err| IdentifierError::InvalidUpdateId {
            value: value.to_string(),
            reason: err.to_string(),
        })
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

// ============================================================================
// SECTION: String Identifiers
// ============================================================================

/// Asset key (content-derived identifier declared by the manifest).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    /// Creates a new asset key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for AssetKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for AssetKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Scope key identifying the application an update belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeKey(String);

impl ScopeKey {
    /// Creates a new scope key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ScopeKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ScopeKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Runtime version tag an update is built against.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeVersion(String);

impl RuntimeVersion {
    /// Creates a new runtime version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Returns the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the leading dot-separated component, used for major-version matching.
    #[must_use]
    pub fn major_component(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RuntimeVersion {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RuntimeVersion {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
