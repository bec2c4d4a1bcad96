// crates/update-gate-core/src/core/manifest.rs
// ============================================================================
// Module: Update Gate Manifests
// Description: Manifest envelope, manifest body schema, and manifest filters.
// Purpose: Materialize trusted manifest bytes into the update/asset graph.
// Dependencies: serde, serde_json, crate::core
// ============================================================================

//! ## Overview
//! A [`ManifestEnvelope`] carries the raw body and headers of one fetch. Once
//! the trust gate has verified the body, [`UpdateManifest::into_update`] turns
//! it into an [`Update`] with owned [`Asset`] records. [`ManifestFilters`] are
//! server-declared metadata constraints that an update must satisfy to be
//! admitted or launched.
//!
//! Security posture: manifest bodies are untrusted until the gate verifies
//! them; parsing rejects unknown identifiers and timestamps rather than
//! defaulting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::identifiers::AssetKey;
use crate::core::identifiers::RuntimeVersion;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::model::Asset;
use crate::core::model::AssetStatus;
use crate::core::model::Update;
use crate::core::model::UpdateStatus;
use crate::core::structured_headers::HeaderError;
use crate::core::structured_headers::StructuredItem;
use crate::core::structured_headers::parse_dictionary;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted manifest body size in bytes.
pub const MAX_MANIFEST_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing manifests or filters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// Body exceeded [`MAX_MANIFEST_BYTES`].
    #[error("manifest exceeds {MAX_MANIFEST_BYTES} bytes")]
    TooLarge,
    /// Body was not valid manifest JSON.
    #[error("manifest json invalid: {0}")]
    Json(String),
    /// A field held an invalid value.
    #[error("manifest field {field} invalid: {reason}")]
    Field {
        /// Field name.
        field: &'static str,
        /// Failure detail.
        reason: String,
    },
    /// Manifest filter header was malformed.
    #[error("manifest filters invalid: {0}")]
    Filters(#[from] HeaderError),
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Raw manifest body plus the headers delivered with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestEnvelope {
    /// Manifest body bytes exactly as received.
    pub body: Vec<u8>,
    /// Signature header (`sig`, `keyid`, `alg` dictionary).
    pub signature: Option<String>,
    /// PEM certificate chain delivered with the manifest (leaf first).
    pub certificate_chain: Option<String>,
    /// Per-manifest signing algorithm hint.
    pub algorithm_hint: Option<String>,
    /// Manifest filters header.
    pub manifest_filters: Option<String>,
}

impl ManifestEnvelope {
    /// Creates an envelope with only a body.
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }
}

// ============================================================================
// SECTION: Manifest Schema
// ============================================================================

/// Manifest body schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateManifest {
    /// Update UUID.
    pub id: String,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Runtime version the update targets.
    pub runtime_version: String,
    /// Bundle entry point.
    pub launch_asset: ManifestAsset,
    /// Remaining assets.
    #[serde(default)]
    pub assets: Vec<ManifestAsset>,
    /// Free-form metadata used for manifest filters.
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, Value>>,
    /// Scope and project declarations.
    #[serde(default)]
    pub extra: Option<ManifestExtra>,
}

/// Asset entry in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAsset {
    /// Content-derived key.
    pub key: String,
    /// Download URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Content type.
    #[serde(default)]
    pub content_type: Option<String>,
    /// File extension.
    #[serde(default)]
    pub file_extension: Option<String>,
    /// Base64url SHA-256 of the content.
    #[serde(default)]
    pub hash: Option<String>,
    /// Bundle file name when the asset ships in the build.
    #[serde(default)]
    pub embedded_asset_filename: Option<String>,
    /// Resource folder when the asset ships as a density-qualified resource.
    #[serde(default)]
    pub resources_folder: Option<String>,
    /// Resource file name when the asset ships as a density-qualified resource.
    #[serde(default)]
    pub resources_filename: Option<String>,
    /// Density scale factor.
    #[serde(default)]
    pub scale: Option<f64>,
}

/// `extra` section of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestExtra {
    /// Declared scope key.
    #[serde(default)]
    pub scope_key: Option<String>,
    /// Hosting-service section.
    #[serde(default)]
    pub eas: Option<ManifestEas>,
}

/// `extra.eas` section of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEas {
    /// Declared project identifier.
    #[serde(default)]
    pub project_id: Option<String>,
}

impl ManifestAsset {
    /// Converts into an asset record.
    fn into_asset(self, is_launch_asset: bool, embedded: bool) -> Asset {
        Asset {
            key: AssetKey::new(self.key),
            url: self.url,
            content_type: self.content_type,
            file_extension: self.file_extension,
            expected_hash: self.hash,
            is_launch_asset,
            embedded,
            embedded_asset_filename: self.embedded_asset_filename,
            resources_folder: self.resources_folder,
            resources_filename: self.resources_filename,
            scale: self.scale,
            status: if embedded { AssetStatus::Resolved } else { AssetStatus::Unresolved },
            relative_path: None,
            download_time: None,
        }
    }
}

impl UpdateManifest {
    /// Parses manifest body bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] when the body is too large or not manifest JSON.
    pub fn parse(body: &[u8]) -> Result<(Self, Value), ManifestError> {
        if body.len() > MAX_MANIFEST_BYTES {
            return Err(ManifestError::TooLarge);
        }
        let raw: Value =
            serde_json::from_slice(body).map_err(|err| ManifestError::Json(err.to_string()))?;
        let manifest: Self = serde_json::from_value(raw.clone())
            .map_err(|err| ManifestError::Json(err.to_string()))?;
        Ok((manifest, raw))
    }

    /// Returns the declared scope key.
    #[must_use]
    pub fn declared_scope_key(&self) -> Option<&str> {
        self.extra.as_ref().and_then(|extra| extra.scope_key.as_deref())
    }

    /// Returns the declared project identifier.
    #[must_use]
    pub fn declared_project_id(&self) -> Option<&str> {
        self.extra
            .as_ref()
            .and_then(|extra| extra.eas.as_ref())
            .and_then(|eas| eas.project_id.as_deref())
    }

    /// Materializes the update/asset graph.
    ///
    /// The scope key is the manifest's declared scope, else `default_scope_key`.
    /// Assets of the embedded update start resolved. Assets of any other update
    /// start unresolved, including those that declare an embedded location.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Field`] for an invalid id, timestamp, runtime
    /// version, or duplicate asset key.
    pub fn into_update(
        self,
        raw: Value,
        default_scope_key: &ScopeKey,
        status: UpdateStatus,
        is_verified: bool,
    ) -> Result<Update, ManifestError> {
        let id = UpdateId::parse(&self.id).map_err(|err| ManifestError::Field {
            field: "id",
            reason: err.to_string(),
        })?;
        let created_at =
            Timestamp::parse_rfc3339(&self.created_at).map_err(|err| ManifestError::Field {
                field: "createdAt",
                reason: err.to_string(),
            })?;
        if self.runtime_version.trim().is_empty() {
            return Err(ManifestError::Field {
                field: "runtimeVersion",
                reason: "must be non-empty".to_string(),
            });
        }
        let scope_key = self
            .declared_scope_key()
            .map_or_else(|| default_scope_key.clone(), ScopeKey::from);
        let project_id = self.declared_project_id().map(str::to_string);
        let embedded_update = status == UpdateStatus::Embedded;

        let mut assets = Vec::with_capacity(self.assets.len() + 1);
        assets.push(self.launch_asset.into_asset(true, embedded_update));
        for entry in self.assets {
            let asset = entry.into_asset(false, embedded_update);
            if assets.iter().any(|existing: &Asset| existing.key == asset.key) {
                return Err(ManifestError::Field {
                    field: "assets",
                    reason: format!("duplicate asset key {}", asset.key),
                });
            }
            assets.push(asset);
        }

        Ok(Update {
            id,
            scope_key,
            project_id,
            runtime_version: RuntimeVersion::new(self.runtime_version),
            created_at,
            manifest: raw,
            status,
            is_verified,
            successful_launch_count: 0,
            failed_launch_count: 0,
            consecutive_failed_launch_count: 0,
            ineligible: false,
            last_accessed: None,
            assets,
        })
    }
}

/// Parses the manifest bundled with the application into the embedded update.
///
/// # Errors
///
/// Returns [`ManifestError`] when the manifest is malformed.
pub fn parse_embedded_manifest(body: &[u8], scope_key: &ScopeKey) -> Result<Update, ManifestError> {
    let (manifest, raw) = UpdateManifest::parse(body)?;
    manifest.into_update(raw, scope_key, UpdateStatus::Embedded, false)
}

// ============================================================================
// SECTION: Manifest Filters
// ============================================================================

/// Server-declared metadata constraints.
///
/// # Invariants
/// - Values are stored in plain-text form for comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestFilters(BTreeMap<String, String>);

impl ManifestFilters {
    /// Parses a structured-dictionary filter header.
    ///
    /// Inner-list members have no comparable value and are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Filters`] when the header is malformed.
    pub fn parse_header(header: &str) -> Result<Self, ManifestError> {
        let dictionary = parse_dictionary(header)?;
        Ok(Self(
            dictionary
                .into_iter()
                .filter_map(|(key, item): (String, StructuredItem)| {
                    item.to_plain_text().map(|value| (key, value))
                })
                .collect(),
        ))
    }

    /// Builds filters from plain key/value pairs.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }

    /// Returns true when no filters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates filter entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns true when the update satisfies every filter its metadata mentions.
    ///
    /// Filter keys absent from the manifest metadata do not exclude the update.
    #[must_use]
    pub fn matches(&self, update: &Update) -> bool {
        let Some(metadata) = update.manifest_metadata() else {
            return true;
        };
        self.0.iter().all(|(key, expected)| {
            metadata.get(key).is_none_or(|actual| match actual {
                Value::String(value) => value == expected,
                Value::Number(value) => &value.to_string() == expected,
                Value::Bool(value) => &value.to_string() == expected,
                _ => false,
            })
        })
    }
}
