//! Pluggable attestation statement verification, one module per `fmt`
//! string. [MODULE C3].
//!
//! A format is anything implementing [`AttestationFormat`]: it knows how
//! to read its own `attStmt` CBOR map and how to turn that, plus the
//! authenticator data and client-data hash, into an [`AttestationChain`].
//! [`SupportedFormats`] is the fixed registry a caller builds once and
//! hands to the registration verifier - no global mutable table.

pub mod android_key;
pub mod android_safetynet;
pub mod apple;
pub mod fidou2f;
pub mod none;
pub mod packed;
pub mod tpm;

use der_parser::oid::Oid;
use openssl::x509;

use crate::error::WebauthnResult;
use crate::proto::auth_data::AuthenticatorData;
use crate::proto::cose::PublicKey;

/// An X.509 extension this crate knows how to look for by OID.
pub(crate) trait AttestationX509Extension {
    const OID: Oid<'static>;
}

/// `id-fido-gen-ce-aaguid`, the AAGUID-in-certificate extension used by
/// the `packed` and `android-key` attestation statement formats.
pub(crate) struct FidoGenCeAaguid;

impl AttestationX509Extension for FidoGenCeAaguid {
    const OID: Oid<'static> = der_parser::oid!(1.3.6 .1 .4 .1 .45724 .1 .1 .4);
}

/// The result of verifying an attestation statement: a classification of
/// how much the RP should trust the attestation, plus whatever trust
/// path backs that classification.
#[derive(Debug, Clone)]
pub enum AttestationChain {
    /// The statement was signed by the credential's own key. Trust
    /// depends entirely on the credential key, which is not itself a
    /// trust anchor.
    SelfAttestation,
    /// The statement was signed by the first certificate in `chain`; the
    /// remainder is a path toward a root that must be cross-checked
    /// against the metadata registry.
    BasicX5C { chain: Vec<x509::X509> },
    /// Same shape as `BasicX5C` but the root is operated as an
    /// Attestation CA - a distinct trust policy label, same mechanics.
    AttCAX5C { chain: Vec<x509::X509> },
    /// An anonymization CA attestation with RP-visible fields
    /// intentionally constrained to avoid tracking.
    AnonCA,
    /// No trust is asserted - `none` format, or a chain the verifier
    /// declines to resolve further.
    Uncertain,
}

/// A single attestation statement format: `packed`, `fido-u2f`, etc.
pub trait AttestationFormat {
    /// The short ASCII identifier used in the attestation object's `fmt`.
    fn identifier(&self) -> &'static str;

    /// Verify `att_stmt` (the raw CBOR `attStmt` value) against
    /// `auth_data` and `client_data_hash`, given the already-checked
    /// credential public key parsed out of `auth_data`.
    fn verify(
        &self,
        att_stmt: &serde_cbor_2::Value,
        auth_data: &AuthenticatorData,
        credential_public_key: &PublicKey,
        client_data_hash: &[u8; 32],
    ) -> WebauthnResult<AttestationChain>;
}

/// The fixed set of attestation formats a verifier call is willing to
/// dispatch to, built once by the caller and passed into [MODULE C4].
pub struct SupportedFormats {
    formats: Vec<Box<dyn AttestationFormat + Send + Sync>>,
}

impl SupportedFormats {
    /// The seven standard attestation statement formats: packed,
    /// fido-u2f, android-key, android-safetynet, tpm, apple, none.
    pub fn all() -> Self {
        SupportedFormats {
            formats: vec![
                Box::new(packed::Packed),
                Box::new(fidou2f::FidoU2f),
                Box::new(android_key::AndroidKey),
                Box::new(android_safetynet::AndroidSafetyNet),
                Box::new(tpm::Tpm),
                Box::new(apple::Apple),
                Box::new(none::None_),
            ],
        }
    }

    /// Build a registry from an explicit subset - useful for tests that
    /// want to pin down exactly which formats are reachable.
    pub fn of(formats: Vec<Box<dyn AttestationFormat + Send + Sync>>) -> Self {
        SupportedFormats { formats }
    }

    pub fn get(&self, fmt: &str) -> Option<&(dyn AttestationFormat + Send + Sync)> {
        self.formats
            .iter()
            .map(|b| b.as_ref())
            .find(|f| f.identifier() == fmt)
    }
}
