// crates/update-gate-core/src/runtime/assets.rs
// ============================================================================
// Module: Update Gate Asset Resolution
// Description: Embedded resource references and the local asset cache.
// Purpose: Turn asset records into concrete loadable references at launch time.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Embedded assets resolve to platform references, reproduced exactly:
//! - `file:///android_asset/<filename>` for bundle files.
//! - `file:///android_res/<folder>-<density>/<name>.<ext>` for
//!   density-qualified resources, where the density qualifier is derived from
//!   the scale factor (`0.75 -> ldpi` through `4 -> xxxhdpi`).
//!
//! Forms that cannot be expressed return no embedded reference and fall
//! through to the cache. Cached assets live at `<cache>/<key><.ext>`.
//!
//! Security posture: asset keys come from manifests; cache file names are
//! validated so they can never escape the cache directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::core::hashing::asset_content_hash;
use crate::core::hashing::asset_hash_matches;
use crate::core::identifiers::AssetKey;
use crate::core::model::Asset;
use crate::interfaces::EmbeddedResources;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix for bundle asset references.
pub const ANDROID_ASSET_URL_PREFIX: &str = "file:///android_asset/";
/// Prefix for native resource references.
pub const ANDROID_RES_URL_PREFIX: &str = "file:///android_res/";

/// Scale factor to density qualifier table.
const DENSITY_QUALIFIERS: [(f64, &str); 6] = [
    (0.75, "ldpi"),
    (1.0, "mdpi"),
    (1.5, "hdpi"),
    (2.0, "xhdpi"),
    (3.0, "xxhdpi"),
    (4.0, "xxxhdpi"),
];

// ============================================================================
// SECTION: Embedded References
// ============================================================================

/// Returns the density qualifier for a scale factor.
#[must_use]
pub fn density_qualifier(scale: f64) -> Option<&'static str> {
    DENSITY_QUALIFIERS
        .iter()
        .find(|(candidate, _)| (candidate - scale).abs() < f64::EPSILON)
        .map(|(_, qualifier)| *qualifier)
}

/// Returns the platform reference for an embedded asset, if it has one.
///
/// A bundle file name wins over resource fields. Resources need a folder, a
/// name, an extension, and a known scale.
#[must_use]
pub fn embedded_reference(asset: &Asset) -> Option<String> {
    if let Some(filename) = asset.embedded_asset_filename.as_deref()
        && !filename.is_empty()
    {
        return Some(format!("{ANDROID_ASSET_URL_PREFIX}{filename}"));
    }
    let folder = asset.resources_folder.as_deref().filter(|value| !value.is_empty())?;
    let name = asset.resources_filename.as_deref().filter(|value| !value.is_empty())?;
    let extension = asset.extension()?;
    let qualifier = density_qualifier(asset.scale?)?;
    Some(format!("{ANDROID_RES_URL_PREFIX}{folder}-{qualifier}/{name}.{extension}"))
}

/// Fixed set of references present in the application bundle.
#[derive(Debug, Clone, Default)]
pub struct BundledResources {
    /// Known references.
    references: BTreeSet<String>,
}

impl BundledResources {
    /// Creates a set from references.
    #[must_use]
    pub fn new<I, S>(references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            references: references.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a set containing every embedded reference of the given assets.
    #[must_use]
    pub fn from_assets<'a>(assets: impl IntoIterator<Item = &'a Asset>) -> Self {
        Self {
            references: assets.into_iter().filter_map(embedded_reference).collect(),
        }
    }
}

impl EmbeddedResources for BundledResources {
    fn contains(&self, reference: &str) -> bool {
        self.references.contains(reference)
    }
}

// ============================================================================
// SECTION: Asset Cache
// ============================================================================

/// Errors raised by the asset cache.
#[derive(Debug, Error)]
pub enum AssetCacheError {
    /// Filesystem failure.
    #[error("asset cache io error: {0}")]
    Io(String),
    /// Downloaded bytes do not match the declared hash.
    #[error("asset {key} hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Asset key.
        key: AssetKey,
        /// Declared hash.
        expected: String,
        /// Computed hash.
        actual: String,
    },
    /// Cache file name would escape the cache directory.
    #[error("asset cache file name invalid: {0}")]
    InvalidFileName(String),
}

/// Directory of downloaded assets addressed by key.
#[derive(Debug, Clone)]
pub struct AssetCache {
    /// Cache directory.
    root: PathBuf,
}

impl AssetCache {
    /// Creates a cache rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the cache file name for an asset: its resolved path when set,
    /// else `<key><.ext>`.
    #[must_use]
    pub fn file_name_for(asset: &Asset) -> String {
        asset.relative_path.clone().unwrap_or_else(|| asset.cache_file_name())
    }

    /// Returns the cache path for an asset when its file name is safe.
    #[must_use]
    pub fn path_for(&self, asset: &Asset) -> Option<PathBuf> {
        let name = Self::file_name_for(asset);
        is_safe_file_name(&name).then(|| self.root.join(name))
    }

    /// Returns true when the asset's cache file exists.
    #[must_use]
    pub fn contains(&self, asset: &Asset) -> bool {
        self.path_for(asset).is_some_and(|path| path.is_file())
    }

    /// Verifies downloaded bytes against the declared hash and writes them.
    ///
    /// Returns the cache file name to record as the asset's resolved path.
    ///
    /// # Errors
    ///
    /// Returns [`AssetCacheError`] on hash mismatch, unsafe names, or I/O failure.
    pub fn store_verified(&self, asset: &Asset, bytes: &[u8]) -> Result<String, AssetCacheError> {
        if let Some(expected) = asset.expected_hash.as_deref()
            && !asset_hash_matches(bytes, expected)
        {
            return Err(AssetCacheError::HashMismatch {
                key: asset.key.clone(),
                expected: expected.to_string(),
                actual: asset_content_hash(bytes),
            });
        }
        let name = asset.cache_file_name();
        if !is_safe_file_name(&name) {
            return Err(AssetCacheError::InvalidFileName(name));
        }
        fs::create_dir_all(&self.root).map_err(|err| AssetCacheError::Io(err.to_string()))?;
        let target = self.root.join(&name);
        let staging = self.root.join(format!(".{name}.download"));
        fs::write(&staging, bytes).map_err(|err| AssetCacheError::Io(err.to_string()))?;
        fs::rename(&staging, &target).map_err(|err| AssetCacheError::Io(err.to_string()))?;
        Ok(name)
    }

    /// Removes a cache file by name; returns true when a file was removed.
    ///
    /// # Errors
    ///
    /// Returns [`AssetCacheError`] for unsafe names or I/O failure.
    pub fn remove(&self, name: &str) -> Result<bool, AssetCacheError> {
        if !is_safe_file_name(name) {
            return Err(AssetCacheError::InvalidFileName(name.to_string()));
        }
        match fs::remove_file(self.root.join(name)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(AssetCacheError::Io(err.to_string())),
        }
    }

    /// Lists cache file names, skipping in-progress downloads.
    ///
    /// # Errors
    ///
    /// Returns [`AssetCacheError::Io`] when the directory cannot be read.
    pub fn file_names(&self) -> Result<Vec<String>, AssetCacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(AssetCacheError::Io(err.to_string())),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| AssetCacheError::Io(err.to_string()))?;
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
                && entry.path().is_file()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Returns true when `name` is a plain file name inside the cache directory.
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name().is_some_and(|file_name| file_name == name)
}

// ============================================================================
// SECTION: Locator
// ============================================================================

/// Concrete loadable reference for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetLocation {
    /// Native bundle or resource reference.
    Embedded {
        /// `file:///android_asset/...` or `file:///android_res/...`.
        reference: String,
    },
    /// Downloaded file in the cache.
    Cached {
        /// Absolute or cache-rooted file path.
        path: PathBuf,
    },
}

/// Resolves assets against the bundle first, then the cache.
#[derive(Clone)]
pub struct AssetLocator {
    /// Download cache.
    cache: AssetCache,
    /// Bundle lookup.
    embedded: Arc<dyn EmbeddedResources>,
}

impl AssetLocator {
    /// Creates a locator.
    #[must_use]
    pub fn new(cache: AssetCache, embedded: Arc<dyn EmbeddedResources>) -> Self {
        Self {
            cache,
            embedded,
        }
    }

    /// Returns the download cache.
    #[must_use]
    pub const fn cache(&self) -> &AssetCache {
        &self.cache
    }

    /// Returns true when the application bundle holds `reference`.
    #[must_use]
    pub fn is_bundled(&self, reference: &str) -> bool {
        self.embedded.contains(reference)
    }

    /// Resolves one asset, or `None` when it cannot be loaded.
    #[must_use]
    pub fn locate(&self, asset: &Asset) -> Option<AssetLocation> {
        if asset.embedded
            && let Some(reference) = embedded_reference(asset)
            && self.embedded.contains(&reference)
        {
            return Some(AssetLocation::Embedded {
                reference,
            });
        }
        if self.cache.contains(asset) {
            return self.cache.path_for(asset).map(|path| AssetLocation::Cached {
                path,
            });
        }
        None
    }
}
