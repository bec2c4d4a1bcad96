// crates/update-gate-core/tests/assets.rs
// ============================================================================
// Module: Asset Location Tests
// Description: Embedded references, cache verification, and asset lookup.
// ============================================================================
//! ## Overview
//! Covers density-qualified resource references, hash-verified cache writes,
//! cache file name safety, and the embedded-then-cache lookup order.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::fs;
use std::sync::Arc;

use tempfile::TempDir;
use update_gate_core::Asset;
use update_gate_core::AssetCache;
use update_gate_core::AssetLocation;
use update_gate_core::AssetLocator;
use update_gate_core::BundledResources;
use update_gate_core::EmbeddedResources;
use update_gate_core::core::hashing::asset_content_hash;
use update_gate_core::runtime::AssetCacheError;
use update_gate_core::runtime::density_qualifier;
use update_gate_core::runtime::embedded_reference;

const LOGO_REFERENCE: &str = "file:///android_res/drawable-xhdpi/logo.png";

fn bundle_asset() -> Asset {
    let mut asset = Asset::new("app-bundle");
    asset.file_extension = Some(".bundle".to_string());
    asset.embedded = true;
    asset.embedded_asset_filename = Some("app.bundle".to_string());
    asset
}

fn logo_asset(scale: Option<f64>) -> Asset {
    let mut asset = Asset::new("logo");
    asset.file_extension = Some(".png".to_string());
    asset.embedded = true;
    asset.resources_folder = Some("drawable".to_string());
    asset.resources_filename = Some("logo".to_string());
    asset.scale = scale;
    asset
}

fn remote_asset(key: &str, bytes: &[u8]) -> Asset {
    let mut asset = Asset::new(key);
    asset.file_extension = Some("png".to_string());
    asset.url = Some(format!("https://updates.example.test/{key}"));
    asset.expected_hash = Some(asset_content_hash(bytes));
    asset
}

#[test]
fn density_scales_map_to_resource_qualifiers() {
    assert_eq!(density_qualifier(0.75), Some("ldpi"));
    assert_eq!(density_qualifier(1.0), Some("mdpi"));
    assert_eq!(density_qualifier(1.5), Some("hdpi"));
    assert_eq!(density_qualifier(2.0), Some("xhdpi"));
    assert_eq!(density_qualifier(3.0), Some("xxhdpi"));
    assert_eq!(density_qualifier(4.0), Some("xxxhdpi"));
    assert_eq!(density_qualifier(2.5), None);
}

#[test]
fn embedded_references_use_asset_or_resource_urls() {
    assert_eq!(
        embedded_reference(&bundle_asset()).as_deref(),
        Some("file:///android_asset/app.bundle")
    );
    assert_eq!(embedded_reference(&logo_asset(Some(2.0))).as_deref(), Some(LOGO_REFERENCE));
    assert_eq!(embedded_reference(&logo_asset(None)), None);
    assert_eq!(embedded_reference(&logo_asset(Some(2.5))), None);
    assert_eq!(embedded_reference(&remote_asset("img-1", b"x")), None);
}

#[test]
fn bundled_resources_collect_asset_references() {
    let bundle = BundledResources::from_assets([&bundle_asset(), &logo_asset(Some(2.0))]);
    assert!(bundle.contains("file:///android_asset/app.bundle"));
    assert!(bundle.contains(LOGO_REFERENCE));
    assert!(!bundle.contains("file:///android_res/drawable-mdpi/logo.png"));
}

#[test]
fn verified_bytes_land_under_cache_file_name() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().join("assets"));
    let asset = remote_asset("img-1", b"pixels");

    let name = cache.store_verified(&asset, b"pixels").unwrap();
    assert_eq!(name, "img-1.png");
    assert_eq!(fs::read(cache.root().join(&name)).unwrap(), b"pixels");
    assert!(cache.contains(&asset));
    assert_eq!(cache.file_names().unwrap(), vec!["img-1.png".to_string()]);
}

#[test]
fn padded_expected_hash_is_accepted() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path());
    let mut asset = remote_asset("img-1", b"pixels");
    asset.expected_hash = Some(format!("{}=", asset_content_hash(b"pixels")));
    assert!(cache.store_verified(&asset, b"pixels").is_ok());
}

#[test]
fn hash_mismatch_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path());
    let asset = remote_asset("img-1", b"pixels");
    let err = cache.store_verified(&asset, b"other pixels").unwrap_err();
    assert!(matches!(err, AssetCacheError::HashMismatch { .. }), "{err:?}");
    assert!(cache.file_names().unwrap().is_empty());
}

#[test]
fn unsafe_file_names_are_refused() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().join("assets"));
    let mut asset = Asset::new("../escape");
    asset.file_extension = Some("png".to_string());

    let err = cache.store_verified(&asset, b"pixels").unwrap_err();
    assert!(matches!(err, AssetCacheError::InvalidFileName(_)), "{err:?}");
    assert!(cache.path_for(&asset).is_none());
    assert!(matches!(cache.remove("../escape.png"), Err(AssetCacheError::InvalidFileName(_))));
    assert!(matches!(cache.remove(".hidden"), Err(AssetCacheError::InvalidFileName(_))));
}

#[test]
fn remove_reports_whether_a_file_existed() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path());
    let asset = remote_asset("img-1", b"pixels");
    cache.store_verified(&asset, b"pixels").unwrap();
    assert!(cache.remove("img-1.png").unwrap());
    assert!(!cache.remove("img-1.png").unwrap());
}

#[test]
fn missing_cache_directory_lists_nothing() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path().join("never-created"));
    assert!(cache.file_names().unwrap().is_empty());
}

#[test]
fn locator_prefers_bundle_then_cache() {
    let dir = TempDir::new().unwrap();
    let cache = AssetCache::new(dir.path());
    let bundle: Arc<dyn EmbeddedResources> = Arc::new(BundledResources::new([LOGO_REFERENCE]));
    let locator = AssetLocator::new(cache.clone(), bundle);

    assert_eq!(
        locator.locate(&logo_asset(Some(2.0))),
        Some(AssetLocation::Embedded {
            reference: LOGO_REFERENCE.to_string(),
        })
    );
    assert_eq!(locator.locate(&logo_asset(Some(3.0))), None);

    let remote = remote_asset("img-1", b"pixels");
    assert_eq!(locator.locate(&remote), None);
    cache.store_verified(&remote, b"pixels").unwrap();
    assert_eq!(
        locator.locate(&remote),
        Some(AssetLocation::Cached {
            path: dir.path().join("img-1.png"),
        })
    );
}
