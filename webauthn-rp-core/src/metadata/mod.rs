//! The FIDO Metadata Service processor: per-entry decoding ([MODULE C6])
//! and JWS/registry construction ([MODULE C7]).

pub mod jws;
pub mod registry;

use base64::{engine::general_purpose, Engine as _};
use openssl::x509;
use serde::Deserialize;

use crate::error::WebauthnError;
use crate::proto::credential::{parse_subject_key_identifier_hex, AuthenticatorIdentifier};

/// Lenient-base64 compatibility switch: real-world MDS blobs sometimes
/// carry non-standard base64
/// (missing padding, stray whitespace) in icon/root-certificate fields.
/// Default is lenient, logging a `debug!` line whenever the lenient path
/// actually fires so operators can see how often it's needed.
#[derive(Debug, Clone, Copy)]
pub struct MetadataDecodeOptions {
    pub strict_base64: bool,
}

impl Default for MetadataDecodeOptions {
    fn default() -> Self {
        MetadataDecodeOptions {
            strict_base64: false,
        }
    }
}

fn decode_base64_entry(label: &str, s: &str, opts: MetadataDecodeOptions) -> Result<Vec<u8>, WebauthnError> {
    let trimmed = s.trim();
    match general_purpose::STANDARD.decode(trimmed) {
        Ok(v) => Ok(v),
        Err(strict_err) => {
            if opts.strict_base64 {
                Err(WebauthnError::MetadataDecodeError(format!(
                    "{label}: {strict_err}"
                )))
            } else {
                debug!(field = label, "falling back to lenient base64 decoding");
                general_purpose::STANDARD_NO_PAD
                    .decode(trimmed.trim_end_matches('='))
                    .map_err(|e| WebauthnError::MetadataDecodeError(format!("{label}: {e}")))
            }
        }
    }
}

/// Subset of `AuthenticatorAttestationType` this RP actually trusts.
/// Anything else (surrogate basic, etc.) causes the entry to be
/// dropped - "skip, not error".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorAttestationType {
    BasicFull,
    AttCA,
}

impl AuthenticatorAttestationType {
    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "basic_full" => Some(AuthenticatorAttestationType::BasicFull),
            "attca" => Some(AuthenticatorAttestationType::AttCA),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusReport {
    pub status: String,
    #[serde(default)]
    pub effective_date: Option<String>,
}

/// A decoded, WebAuthn-compatible metadata entry.
#[derive(Debug, Clone)]
pub struct MetadataEntry {
    pub identifier: AuthenticatorIdentifier,
    pub attestation_root_certificates: Vec<x509::X509>,
    pub description: String,
    pub attestation_types: Vec<AuthenticatorAttestationType>,
    pub status_reports: Vec<StatusReport>,
}

/// Only this metadata statement schema version is understood; anything
/// else is rejected rather than decoded best-effort.
const SUPPORTED_METADATA_SCHEMA: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
struct MetadataStatementOnWire {
    schema: u32,
    #[serde(default)]
    aaguid: Option<String>,
    #[serde(default)]
    attestation_certificate_key_identifiers: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    attestation_types: Vec<String>,
    #[serde(default)]
    attestation_root_certificates: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataBLOBPayloadEntry {
    #[serde(default)]
    metadata_statement: Option<MetadataStatementOnWire>,
    #[serde(default)]
    status_reports: Vec<StatusReport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataBLOBPayload {
    #[serde(default)]
    pub legal_header: Option<String>,
    pub no: u64,
    pub next_update: String,
    pub entries: Vec<MetadataBLOBPayloadEntry>,
}

/// Outcome of decoding one `MetadataBLOBPayloadEntry` - a three-state
/// result distinguishing "no WebAuthn-usable attestation type" (skip)
/// from a hard decode error.
pub enum DecodeOutcome {
    Ok(Vec<MetadataEntry>),
    Skip,
    Err(WebauthnError),
}

/// Decode one payload entry into zero or more [`MetadataEntry`] values
/// (an AAGUID entry yields one; a U2F entry may carry several SKIs, one
/// per configured identifier).
pub fn decode_entry(entry: &MetadataBLOBPayloadEntry, opts: MetadataDecodeOptions) -> DecodeOutcome {
    let stmt = match &entry.metadata_statement {
        Some(s) => s,
        None => return DecodeOutcome::Skip,
    };

    if stmt.schema != SUPPORTED_METADATA_SCHEMA {
        return DecodeOutcome::Err(WebauthnError::MetadataDecodeError(format!(
            "unsupported metadata statement schema version {} (expected {SUPPORTED_METADATA_SCHEMA})",
            stmt.schema
        )));
    }

    let attestation_types: Vec<AuthenticatorAttestationType> = stmt
        .attestation_types
        .iter()
        .filter_map(|s| AuthenticatorAttestationType::from_wire(s))
        .collect();
    if attestation_types.is_empty() {
        return DecodeOutcome::Skip;
    }

    let mut identifiers = Vec::new();
    if let Some(aaguid_str) = &stmt.aaguid {
        match uuid::Uuid::parse_str(aaguid_str) {
            Ok(u) => identifiers.push(AuthenticatorIdentifier::aaguid_from_uuid(u)),
            Err(e) => return DecodeOutcome::Err(WebauthnError::MetadataDecodeError(e.to_string())),
        }
    }
    for ski_hex in &stmt.attestation_certificate_key_identifiers {
        match parse_subject_key_identifier_hex(ski_hex) {
            Ok(digest) => identifiers.push(AuthenticatorIdentifier::ski_from_sha1(digest)),
            Err(e) => return DecodeOutcome::Err(e),
        }
    }
    if identifiers.is_empty() {
        return DecodeOutcome::Err(WebauthnError::MetadataDecodeError(
            "entry has neither an aaguid nor any attestationCertificateKeyIdentifiers".into(),
        ));
    }

    let mut attestation_root_certificates = Vec::with_capacity(stmt.attestation_root_certificates.len());
    for b64 in &stmt.attestation_root_certificates {
        let der = match decode_base64_entry("attestationRootCertificates", b64, opts) {
            Ok(d) => d,
            Err(e) => return DecodeOutcome::Err(e),
        };
        match x509::X509::from_der(&der) {
            Ok(cert) => attestation_root_certificates.push(cert),
            Err(e) => return DecodeOutcome::Err(WebauthnError::OpenSSLError(e)),
        }
    }

    let entries = identifiers
        .into_iter()
        .map(|identifier| MetadataEntry {
            identifier,
            attestation_root_certificates: attestation_root_certificates.clone(),
            description: stmt.description.clone(),
            attestation_types: attestation_types.clone(),
            status_reports: entry.status_reports.clone(),
        })
        .collect();

    DecodeOutcome::Ok(entries)
}
