// crates/update-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Update Gate Test Fixtures
// Description: Ephemeral RSA certificate chains, signed manifests, and fakes.
// Purpose: Avoid committing private keys while covering code signing paths.
// Dependencies: rcgen, rsa, rand, serde_json
// ============================================================================

//! ## Overview
//! RSA keys are generated once per test binary and reused across fixtures.
//! Certificates are issued per test with rcgen, valid from 2020 through 2040.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test fixtures fail loudly."
)]

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::OnceLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rcgen::BasicConstraints;
use rcgen::Certificate;
use rcgen::CertificateParams;
use rcgen::CustomExtension;
use rcgen::DistinguishedName;
use rcgen::DnType;
use rcgen::ExtendedKeyUsagePurpose;
use rcgen::IsCa;
use rcgen::Issuer;
use rcgen::KeyPair;
use rcgen::KeyUsagePurpose;
use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::EncodePrivateKey;
use rsa::pkcs8::LineEnding;
use rsa::signature::SignatureEncoding;
use rsa::signature::Signer;
use serde_json::Value;
use serde_json::json;
use sha2::Sha256;
use update_gate_core::Asset;
use update_gate_core::AssetFetcher;
use update_gate_core::AssetKey;
use update_gate_core::AssetCache;
use update_gate_core::AssetResolution;
use update_gate_core::EmbeddedResources;
use update_gate_core::ManifestEnvelope;
use update_gate_core::ManifestSource;
use update_gate_core::ScopeKey;
use update_gate_core::Timestamp;
use update_gate_core::TransportError;
use update_gate_core::Update;
use update_gate_core::UpdateManifest;
use update_gate_core::UpdateStatus;
use update_gate_core::UpdateStore;
use update_gate_core::core::hashing::asset_content_hash;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Project id carried by test certificates and manifests.
pub const PROJECT_ID: &str = "285dc9ca-a25d-4f60-93be-36dc312266d7";
/// Scope key carried by test certificates and manifests.
pub const SCOPE_KEY: &str = "@test/app";
/// Project information extension OID arcs.
pub const PROJECT_INFORMATION_ARCS: [u64; 16] =
    [1, 2, 840, 113_556, 1, 8000, 2554, 43437, 254, 128, 102, 157, 7_894_389, 20439, 2, 1];

/// Key slot for roots.
pub const ROOT_KEY: usize = 0;
/// Key slot for intermediates.
pub const INTERMEDIATE_KEY: usize = 1;
/// Key slot for leaves.
pub const LEAF_KEY: usize = 2;
/// Key slot for unrelated signers.
pub const OTHER_KEY: usize = 3;

// ============================================================================
// SECTION: Keys
// ============================================================================

/// RSA key shared by rcgen (issuing) and rsa (manifest signing).
pub struct TestKey {
    /// Private key for manifest signatures.
    pub private: RsaPrivateKey,
    /// PKCS#8 PEM for rcgen.
    pub pem: String,
}

/// Returns a cached 2048-bit key.
pub fn test_key(slot: usize) -> &'static TestKey {
    static KEYS: OnceLock<Vec<TestKey>> = OnceLock::new();
    let keys = KEYS.get_or_init(|| {
        (0 .. 4)
            .map(|_| {
                let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
                let pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().as_str().to_string();
                TestKey {
                    private,
                    pem,
                }
            })
            .collect()
    });
    &keys[slot]
}

/// Returns the rcgen key pair for a slot.
pub fn key_pair(slot: usize) -> KeyPair {
    KeyPair::from_pem_and_sign_algo(&test_key(slot).pem, &rcgen::PKCS_RSA_SHA256).unwrap()
}

/// Signs a manifest body with a slot key, returning base64.
pub fn sign_body(slot: usize, body: &[u8]) -> String {
    let signing_key = SigningKey::<Sha256>::new(test_key(slot).private.clone());
    STANDARD.encode(signing_key.sign(body).to_bytes())
}

/// Returns a `sig`/`keyid` signature header for a body.
pub fn signature_header(slot: usize, body: &[u8], key_id: &str) -> String {
    format!("sig=\"{}\", keyid=\"{key_id}\"", sign_body(slot, body))
}

// ============================================================================
// SECTION: Certificates
// ============================================================================

/// Fixed validation time inside every fixture's validity window.
pub fn test_time() -> Timestamp {
    Timestamp::parse_rfc3339("2026-06-01T00:00:00Z").unwrap()
}

/// Distinguished name with one common name.
fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut name = DistinguishedName::new();
    name.push(DnType::CommonName, common_name);
    name
}

/// Project information extension with the `<projectId>,<scopeKey>` value.
pub fn project_extension(project_id: &str, scope_key: &str) -> CustomExtension {
    CustomExtension::from_oid_content(
        &PROJECT_INFORMATION_ARCS,
        format!("{project_id},{scope_key}").into_bytes(),
    )
}

/// Base parameters valid 2020-01-01 through 2040-01-01.
fn base_params(common_name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.distinguished_name = distinguished_name(common_name);
    params.not_before = rcgen::date_time_ymd(2020, 1, 1);
    params.not_after = rcgen::date_time_ymd(2040, 1, 1);
    params
}

/// Certificate authority parameters.
pub fn ca_params(common_name: &str, path_len: Option<u8>) -> CertificateParams {
    let mut params = base_params(common_name);
    params.is_ca = IsCa::Ca(
        path_len.map_or(BasicConstraints::Unconstrained, BasicConstraints::Constrained),
    );
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params
}

/// Code signing leaf parameters.
pub fn leaf_params(common_name: &str) -> CertificateParams {
    let mut params = base_params(common_name);
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::CodeSigning];
    params
}

/// Adds the project information extension.
pub fn with_project(
    mut params: CertificateParams,
    project_id: &str,
    scope_key: &str,
) -> CertificateParams {
    params.custom_extensions.push(project_extension(project_id, scope_key));
    params
}

/// Issued certificate plus the issuer handle for its children.
pub struct TestCa {
    /// Certificate.
    pub cert: Certificate,
    /// Issuer for child certificates.
    pub issuer: Issuer<'static, KeyPair>,
}

/// Self-signs CA parameters.
pub fn self_signed_ca(params: CertificateParams, slot: usize) -> TestCa {
    let key = key_pair(slot);
    let cert = params.self_signed(&key).unwrap();
    TestCa {
        cert,
        issuer: Issuer::new(params, key),
    }
}

/// Issues CA parameters under a parent.
pub fn issue_ca(params: CertificateParams, slot: usize, parent: &TestCa) -> TestCa {
    let key = key_pair(slot);
    let cert = params.signed_by(&key, &parent.issuer).unwrap();
    TestCa {
        cert,
        issuer: Issuer::new(params, key),
    }
}

/// Issues a certificate under a parent.
pub fn issue(params: &CertificateParams, slot: usize, parent: &TestCa) -> Certificate {
    params.signed_by(&key_pair(slot), &parent.issuer).unwrap()
}

/// Self-signs parameters.
pub fn self_signed(params: &CertificateParams, slot: usize) -> Certificate {
    params.self_signed(&key_pair(slot)).unwrap()
}

/// Returns DER buffers for certificates.
pub fn ders(certificates: &[&Certificate]) -> Vec<Vec<u8>> {
    certificates.iter().map(|cert| cert.der().to_vec()).collect()
}

/// Concatenates PEM encodings.
pub fn pem_chain(certificates: &[&Certificate]) -> String {
    certificates.iter().map(|cert| cert.pem()).collect()
}

/// Leaf, intermediate, and root sharing one project claim below the root.
pub struct StandardChain {
    /// Code signing leaf (key [`LEAF_KEY`]).
    pub leaf: Certificate,
    /// Intermediate CA.
    pub intermediate: TestCa,
    /// Root CA.
    pub root: TestCa,
}

impl StandardChain {
    /// Builds a chain whose leaf and intermediate carry the test project claim.
    pub fn new() -> Self {
        let root = self_signed_ca(ca_params("Update Gate Test Root", None), ROOT_KEY);
        let intermediate = issue_ca(
            with_project(
                ca_params("Update Gate Test Intermediate", Some(0)),
                PROJECT_ID,
                SCOPE_KEY,
            ),
            INTERMEDIATE_KEY,
            &root,
        );
        let leaf = issue(
            &with_project(leaf_params("Update Gate Test Leaf"), PROJECT_ID, SCOPE_KEY),
            LEAF_KEY,
            &intermediate,
        );
        Self {
            leaf,
            intermediate,
            root,
        }
    }

    /// Returns DER buffers, leaf first.
    pub fn ders(&self) -> Vec<Vec<u8>> {
        ders(&[&self.leaf, &self.intermediate.cert, &self.root.cert])
    }

    /// Returns leaf and intermediate PEM (the response chain).
    pub fn response_pem(&self) -> String {
        pem_chain(&[&self.leaf, &self.intermediate.cert])
    }

    /// Returns the root PEM (the embedded anchor).
    pub fn root_pem(&self) -> String {
        self.root.cert.pem()
    }
}

// ============================================================================
// SECTION: Manifests
// ============================================================================

/// Deterministic asset bytes for a key.
pub fn asset_bytes(key: &str) -> Vec<u8> {
    format!("contents of asset {key}").into_bytes()
}

/// Manifest JSON builder.
#[derive(Clone)]
pub struct ManifestBuilder {
    /// Update id.
    id: String,
    /// Creation time.
    created_at: String,
    /// Runtime version.
    runtime_version: String,
    /// Declared project claim.
    project: Option<(String, String)>,
    /// Metadata object.
    metadata: Option<Value>,
    /// Launch asset entry.
    launch_asset: Value,
    /// Other asset entries.
    assets: Vec<Value>,
}

impl ManifestBuilder {
    /// Starts a manifest with one remote launch asset.
    pub fn new(id: &str) -> Self {
        let launch_key = format!("bundle-{}", &id[.. 8]);
        Self {
            id: id.to_string(),
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            runtime_version: "1.0.0".to_string(),
            project: Some((PROJECT_ID.to_string(), SCOPE_KEY.to_string())),
            metadata: None,
            launch_asset: remote_asset(&launch_key, ".bundle"),
            assets: Vec::new(),
        }
    }

    /// Sets the creation time.
    pub fn created_at(mut self, created_at: &str) -> Self {
        self.created_at = created_at.to_string();
        self
    }

    /// Sets the runtime version.
    pub fn runtime_version(mut self, runtime_version: &str) -> Self {
        self.runtime_version = runtime_version.to_string();
        self
    }

    /// Sets or clears the declared project claim.
    pub fn project(mut self, project: Option<(&str, &str)>) -> Self {
        self.project = project.map(|(id, scope)| (id.to_string(), scope.to_string()));
        self
    }

    /// Sets the metadata object.
    pub fn metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Replaces the launch asset with an embedded bundle file.
    pub fn embedded_launch_asset(mut self, key: &str, filename: &str) -> Self {
        self.launch_asset = json!({
            "key": key,
            "fileExtension": ".bundle",
            "embeddedAssetFilename": filename,
        });
        self
    }

    /// Sets the declared hash of the launch asset.
    pub fn launch_hash(mut self, hash: &str) -> Self {
        self.launch_asset["hash"] = Value::String(hash.to_string());
        self
    }

    /// Adds a remote asset.
    pub fn asset(mut self, key: &str, extension: &str) -> Self {
        self.assets.push(remote_asset(key, extension));
        self
    }

    /// Adds an embedded density-qualified resource.
    pub fn resource_asset(mut self, key: &str, folder: &str, name: &str, scale: f64) -> Self {
        self.assets.push(json!({
            "key": key,
            "fileExtension": ".png",
            "resourcesFolder": folder,
            "resourcesFilename": name,
            "scale": scale,
        }));
        self
    }

    /// Returns the launch asset key.
    pub fn launch_key(&self) -> String {
        self.launch_asset["key"].as_str().unwrap_or_default().to_string()
    }

    /// Renders the manifest JSON.
    pub fn build(&self) -> String {
        let mut manifest = json!({
            "id": self.id,
            "createdAt": self.created_at,
            "runtimeVersion": self.runtime_version,
            "launchAsset": self.launch_asset,
            "assets": self.assets,
        });
        if let Some(metadata) = &self.metadata {
            manifest["metadata"] = metadata.clone();
        }
        if let Some((project_id, scope_key)) = &self.project {
            manifest["extra"] = json!({
                "scopeKey": scope_key,
                "eas": { "projectId": project_id },
            });
        }
        manifest.to_string()
    }

    /// Renders the manifest JSON as bytes.
    pub fn body(&self) -> Vec<u8> {
        self.build().into_bytes()
    }
}

/// Remote asset entry with a hash of [`asset_bytes`].
fn remote_asset(key: &str, extension: &str) -> Value {
    json!({
        "key": key,
        "url": format!("https://updates.example.test/assets/{key}"),
        "fileExtension": extension,
        "contentType": "application/octet-stream",
        "hash": asset_content_hash(&asset_bytes(key)),
    })
}

/// Materializes a manifest into an update with the given status.
pub fn update_from(builder: &ManifestBuilder, status: UpdateStatus) -> Update {
    let (manifest, raw) = UpdateManifest::parse(&builder.body()).unwrap();
    manifest.into_update(raw, &ScopeKey::new(SCOPE_KEY), status, true).unwrap()
}

/// Resolution pointing at the default cache file of an asset.
pub fn resolved(file_name: &str) -> AssetResolution {
    AssetResolution::Resolved {
        relative_path: file_name.to_string(),
        download_time: test_time(),
    }
}

/// Marks every unresolved asset of a stored update as resolved to its cache name.
pub fn resolve_all(store: &dyn UpdateStore, update: &Update) -> Update {
    let mut current = update.clone();
    for asset in update.assets.iter().filter(|asset| !asset.is_resolved()) {
        current = store
            .mark_asset_resolved(&update.id, &asset.key, resolved(&asset.cache_file_name()))
            .unwrap();
    }
    current
}

/// Inserts a manifest and downloads every remote asset into the cache.
pub fn install_cached(
    store: &dyn UpdateStore,
    cache: &AssetCache,
    builder: &ManifestBuilder,
) -> Update {
    let mut current =
        store.insert(update_from(builder, UpdateStatus::Pending)).unwrap().update().clone();
    let pending: Vec<Asset> =
        current.assets.iter().filter(|asset| !asset.is_resolved()).cloned().collect();
    for asset in pending {
        let name = cache.store_verified(&asset, &asset_bytes(asset.key.as_str())).unwrap();
        current = store.mark_asset_resolved(&current.id, &asset.key, resolved(&name)).unwrap();
    }
    current
}

/// Returns an asset key.
pub fn key(value: &str) -> AssetKey {
    AssetKey::new(value)
}

/// Envelope signed by the leaf key and delivered with the response chain.
pub fn signed_envelope(body: Vec<u8>, chain: &StandardChain) -> ManifestEnvelope {
    ManifestEnvelope {
        signature: Some(signature_header(LEAF_KEY, &body, "root")),
        certificate_chain: Some(chain.response_pem()),
        body,
        ..ManifestEnvelope::default()
    }
}

// ============================================================================
// SECTION: Fakes
// ============================================================================

/// Manifest source returning one fixed envelope.
pub struct StaticSource(pub Option<ManifestEnvelope>);

impl ManifestSource for StaticSource {
    fn fetch_manifest(&self) -> Result<Option<ManifestEnvelope>, TransportError> {
        Ok(self.0.clone())
    }
}

/// Asset fetcher serving [`asset_bytes`] unless a key is overridden.
#[derive(Default)]
pub struct FakeFetcher {
    /// Per-key overrides.
    overrides: Mutex<BTreeMap<String, Result<Vec<u8>, TransportError>>>,
    /// Keys requested, in order.
    requested: Mutex<Vec<String>>,
}

impl FakeFetcher {
    /// Overrides the response for a key.
    pub fn set(&self, key: &str, response: Result<Vec<u8>, TransportError>) {
        self.overrides.lock().unwrap().insert(key.to_string(), response);
    }

    /// Returns requested keys.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl AssetFetcher for FakeFetcher {
    fn fetch_asset(&self, asset: &Asset) -> Result<Vec<u8>, TransportError> {
        let key = asset.key.as_str().to_string();
        self.requested.lock().unwrap().push(key.clone());
        self.overrides.lock().unwrap().get(&key).cloned().unwrap_or_else(|| Ok(asset_bytes(&key)))
    }
}

/// Bundle lookup that reports nothing present.
pub struct EmptyBundle;

impl EmbeddedResources for EmptyBundle {
    fn contains(&self, _reference: &str) -> bool {
        false
    }
}
