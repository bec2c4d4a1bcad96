// crates/update-gate-core/src/runtime/gate.rs
// ============================================================================
// Module: Manifest Trust Gate
// Description: Admission decision for fetched manifests.
// Purpose: Combine chain validation, signature checks, and scope matching.
// Dependencies: crate::audit, crate::codesigning, crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The trust gate is the single place where a fetched manifest becomes
//! trusted. Given an envelope it:
//! 1. Admits unconditionally when no code signing is configured.
//! 2. Requires a signature header unless unsigned manifests are allowed.
//! 3. Builds the verifying chain (response chain prepended when enabled,
//!    otherwise the header keyid must match the embedded key).
//! 4. Validates the chain and verifies the signature over the exact body bytes.
//! 5. Matches the chain's project claim and the delivered manifest filters.
//!
//! Every decision is written to the audit sink. A rejection never touches the
//! store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::audit::AdmissionAuditEvent;
use crate::audit::AdmissionAuditEventParams;
use crate::audit::AdmissionOutcome;
use crate::audit::LifecycleAction;
use crate::audit::LifecycleAuditEvent;
use crate::audit::UpdatesAuditSink;
use crate::codesigning::chain::CertificateChainValidator;
use crate::codesigning::config::CodeSigningConfiguration;
use crate::codesigning::config::SignatureHeader;
use crate::codesigning::error::SignatureError;
use crate::codesigning::error::TrustError;
use crate::codesigning::extensions::ProjectInformation;
use crate::codesigning::signature::SignatureVerifier;
use crate::core::identifiers::ScopeKey;
use crate::core::identifiers::UpdateId;
use crate::core::manifest::ManifestEnvelope;
use crate::core::manifest::ManifestFilters;
use crate::core::manifest::UpdateManifest;
use crate::core::model::Update;
use crate::core::model::UpdateStatus;
use crate::core::time::Timestamp;
use crate::interfaces::InsertOutcome;
use crate::interfaces::StoreError;
use crate::interfaces::UpdateStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reasons a manifest is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RejectionError {
    /// Certificate chain is untrusted.
    #[error(transparent)]
    Trust(#[from] TrustError),
    /// Signature could not be evaluated.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// Signature does not match the body.
    #[error("manifest signature does not match the body")]
    SignatureMismatch,
    /// Certificate project claim differs from the manifest's declaration.
    #[error("manifest project {actual} does not match certificate project {expected}")]
    ManifestProjectMismatch {
        /// Claim from the certificate chain.
        expected: String,
        /// Declaration from the manifest.
        actual: String,
    },
    /// Signature header missing while unsigned manifests are refused.
    #[error("manifest signature header missing")]
    SignatureHeaderMissing,
    /// Signature header could not be parsed.
    #[error("manifest signature header invalid: {0}")]
    SignatureHeaderInvalid(String),
    /// Header keyid does not name the embedded certificate.
    #[error("signature keyid {0} not found")]
    KeyIdNotFound(String),
    /// Manifest body or filter header is malformed.
    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),
    /// Manifest metadata does not satisfy the delivered filters.
    #[error("manifest does not match manifest filters")]
    ManifestFiltersMismatch,
}

impl RejectionError {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Trust(err) => err.kind(),
            Self::Signature(err) => err.kind(),
            Self::SignatureMismatch => "signature_mismatch",
            Self::ManifestProjectMismatch {
                ..
            } => "manifest_project_mismatch",
            Self::SignatureHeaderMissing => "signature_header_missing",
            Self::SignatureHeaderInvalid(_) => "signature_header_invalid",
            Self::KeyIdNotFound(_) => "key_id_not_found",
            Self::ManifestInvalid(_) => "manifest_invalid",
            Self::ManifestFiltersMismatch => "manifest_filters_mismatch",
        }
    }
}

/// Errors raised by [`ManifestTrustGate::admit_into`].
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The gate refused the manifest.
    #[error(transparent)]
    Rejected(#[from] RejectionError),
    /// The store refused the admitted update.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// A manifest that passed the gate, ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmittedUpdate {
    /// Materialized update in `Pending` status.
    pub update: Update,
    /// Project claim from the certificate chain, when verified and present.
    pub project_information: Option<ProjectInformation>,
    /// Filters delivered with the manifest.
    pub manifest_filters: Option<ManifestFilters>,
}

/// Admission gate for fetched manifests.
pub struct ManifestTrustGate {
    /// Code signing policy; `None` admits every well-formed manifest.
    code_signing: Option<CodeSigningConfiguration>,
    /// Scope applied to manifests that declare none.
    scope_key: ScopeKey,
    /// Decision log.
    audit: Arc<dyn UpdatesAuditSink>,
}

// ============================================================================
// SECTION: Gate
// ============================================================================

impl ManifestTrustGate {
    /// Creates a gate.
    #[must_use]
    pub fn new(
        code_signing: Option<CodeSigningConfiguration>,
        scope_key: ScopeKey,
        audit: Arc<dyn UpdatesAuditSink>,
    ) -> Self {
        Self {
            code_signing,
            scope_key,
            audit,
        }
    }

    /// Returns the code signing policy.
    #[must_use]
    pub const fn code_signing(&self) -> Option<&CodeSigningConfiguration> {
        self.code_signing.as_ref()
    }

    /// Returns the gate's scope key.
    #[must_use]
    pub const fn scope_key(&self) -> &ScopeKey {
        &self.scope_key
    }

    /// Decides whether the envelope's manifest may be admitted at time `at`.
    ///
    /// # Errors
    ///
    /// Returns [`RejectionError`] describing the first failed check.
    pub fn admit(
        &self,
        envelope: &ManifestEnvelope,
        at: Timestamp,
    ) -> Result<AdmittedUpdate, RejectionError> {
        let result = self.evaluate(envelope, at);
        let event = match &result {
            Ok(admitted) => AdmissionAuditEvent::new(AdmissionAuditEventParams {
                at,
                update_id: Some(admitted.update.id),
                outcome: if admitted.update.is_verified {
                    AdmissionOutcome::AdmittedVerified
                } else {
                    AdmissionOutcome::AdmittedUnverified
                },
                error_kind: None,
                message: None,
                certificate_scope_key: admitted
                    .project_information
                    .as_ref()
                    .map(|info| info.scope_key.clone()),
                certificate_project_id: admitted
                    .project_information
                    .as_ref()
                    .map(|info| info.project_id.clone()),
            }),
            Err(err) => AdmissionAuditEvent::new(AdmissionAuditEventParams {
                at,
                update_id: declared_update_id(&envelope.body),
                outcome: AdmissionOutcome::Rejected,
                error_kind: Some(err.kind()),
                message: Some(err.to_string()),
                certificate_scope_key: None,
                certificate_project_id: None,
            }),
        };
        self.audit.record_admission(&event);
        result
    }

    /// Admits the envelope and inserts the update with one store call.
    ///
    /// Filters delivered with an admitted manifest are saved for the gate's scope.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError`] on rejection or store failure.
    pub fn admit_into(
        &self,
        envelope: &ManifestEnvelope,
        at: Timestamp,
        store: &dyn UpdateStore,
    ) -> Result<InsertOutcome, AdmissionError> {
        let admitted = self.admit(envelope, at)?;
        let outcome = store.insert(admitted.update)?;
        if let Some(filters) = &admitted.manifest_filters {
            store.set_manifest_filters(&self.scope_key, filters, at)?;
        }
        let action = if outcome.is_inserted() {
            LifecycleAction::Inserted
        } else {
            LifecycleAction::AlreadyExists
        };
        let stored = outcome.update();
        self.audit.record_lifecycle(
            &LifecycleAuditEvent::new(at, &stored.id, action).with_status(stored.status.as_str()),
        );
        Ok(outcome)
    }

    /// Runs the admission checks.
    fn evaluate(
        &self,
        envelope: &ManifestEnvelope,
        at: Timestamp,
    ) -> Result<AdmittedUpdate, RejectionError> {
        let filters = envelope
            .manifest_filters
            .as_deref()
            .map(ManifestFilters::parse_header)
            .transpose()
            .map_err(|err| RejectionError::ManifestInvalid(err.to_string()))?;
        let Some(config) = self.code_signing.as_ref() else {
            return self.materialize(envelope, filters, None, false);
        };
        let Some(raw_header) = envelope.signature.as_deref() else {
            if config.allows_unsigned_manifests() {
                return self.materialize(envelope, filters, None, false);
            }
            return Err(RejectionError::SignatureHeaderMissing);
        };
        let header = SignatureHeader::parse(raw_header)
            .map_err(|err| RejectionError::SignatureHeaderInvalid(err.to_string()))?;
        if !config.includes_manifest_response_certificate_chain()
            && header.key_id != config.key_id()
        {
            return Err(RejectionError::KeyIdNotFound(header.key_id));
        }

        let chain = config.resolve_chain(envelope.certificate_chain.as_deref())?;
        let validated = CertificateChainValidator::validate(&chain, at)?;
        let declared = envelope.algorithm_hint.as_deref().or(header.algorithm.as_deref());
        let algorithm = match declared {
            Some(value) => SignatureVerifier::algorithm_from_header(Some(value))?,
            None => config.algorithm(),
        };
        if !SignatureVerifier::verify(
            &envelope.body,
            &header.signature,
            algorithm,
            validated.leaf.public_key(),
        )? {
            return Err(RejectionError::SignatureMismatch);
        }
        self.materialize(envelope, filters, validated.project_information, true)
    }

    /// Parses the trusted body and applies the project and filter checks.
    fn materialize(
        &self,
        envelope: &ManifestEnvelope,
        manifest_filters: Option<ManifestFilters>,
        project_information: Option<ProjectInformation>,
        is_verified: bool,
    ) -> Result<AdmittedUpdate, RejectionError> {
        let (manifest, raw) = UpdateManifest::parse(&envelope.body)
            .map_err(|err| RejectionError::ManifestInvalid(err.to_string()))?;
        if let Some(info) = &project_information {
            let scope_key = manifest.declared_scope_key();
            let project_id = manifest.declared_project_id();
            if scope_key != Some(info.scope_key.as_str())
                || project_id != Some(info.project_id.as_str())
            {
                return Err(RejectionError::ManifestProjectMismatch {
                    expected: format!("{}/{}", info.scope_key, info.project_id),
                    actual: format!(
                        "{}/{}",
                        scope_key.unwrap_or("<none>"),
                        project_id.unwrap_or("<none>")
                    ),
                });
            }
        }
        let update = manifest
            .into_update(raw, &self.scope_key, UpdateStatus::Pending, is_verified)
            .map_err(|err| RejectionError::ManifestInvalid(err.to_string()))?;
        if let Some(filters) = &manifest_filters
            && !filters.matches(&update)
        {
            return Err(RejectionError::ManifestFiltersMismatch);
        }
        Ok(AdmittedUpdate {
            update,
            project_information,
            manifest_filters,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Best-effort manifest id for rejection audit events.
fn declared_update_id(body: &[u8]) -> Option<UpdateId> {
    let (manifest, _) = UpdateManifest::parse(body).ok()?;
    UpdateId::parse(&manifest.id).ok()
}
