//! `android-safetynet` attestation statement format.
//! <https://www.w3.org/TR/webauthn-2/#sctn-android-safetynet-attestation>
//!
//! `attStmt = {ver, response}`, where `response` is a compact JWS. The
//! payload's `nonce` must equal `sha256(authData || clientDataHash)` and
//! `ctsProfileMatch` must be `true`. Reuses the JWS primitive §7 builds
//! for the MDS blob rather than a second implementation.

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

use crate::attestation::{AttestationChain, AttestationFormat};
use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};
use crate::internals::{cbor_try_bytes, cbor_try_map};
use crate::metadata::jws::verify_compact_jws;
use crate::proto::auth_data::AuthenticatorData;
use crate::proto::cose::PublicKey;

#[derive(Debug, Deserialize)]
struct SafetyNetPayload {
    nonce: String,
    #[serde(rename = "ctsProfileMatch")]
    cts_profile_match: bool,
}

pub struct AndroidSafetyNet;

impl AttestationFormat for AndroidSafetyNet {
    fn identifier(&self) -> &'static str {
        "android-safetynet"
    }

    fn verify(
        &self,
        att_stmt: &serde_cbor_2::Value,
        auth_data: &AuthenticatorData,
        _credential_public_key: &PublicKey,
        client_data_hash: &[u8; 32],
    ) -> WebauthnResult<AttestationChain> {
        let m = cbor_try_map!(att_stmt).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "android-safetynet",
                reason: "attStmt is not a CBOR map".into(),
            }
        })?;

        let response_value = m
            .get(&serde_cbor_2::Value::Text("response".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "android-safetynet",
                reason: "missing response".into(),
            })?;
        let response_bytes = cbor_try_bytes!(response_value).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "android-safetynet",
                reason: "response is not a byte string".into(),
            }
        })?;
        let response = std::str::from_utf8(response_bytes).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "android-safetynet",
                reason: "response is not UTF-8".into(),
            }
        })?;

        let verified = verify_compact_jws(response)?;
        let payload: SafetyNetPayload = serde_json::from_slice(&verified.payload).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "android-safetynet",
                reason: "response payload does not match the expected SafetyNet shape".into(),
            }
        })?;

        if !payload.cts_profile_match {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "android-safetynet",
                reason: "ctsProfileMatch is false".into(),
            });
        }

        let mut to_hash = auth_data.raw.clone();
        to_hash.extend_from_slice(client_data_hash);
        let expected_nonce = general_purpose::STANDARD.encode(crypto::compute_sha256(&to_hash));
        if payload.nonce != expected_nonce {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "android-safetynet",
                reason: "nonce does not match hash(authData || clientDataHash)".into(),
            });
        }

        let leaf_der = verified.chain[0].to_der().map_err(WebauthnError::OpenSSLError)?;
        let (_, leaf_cert) = x509_parser::parse_x509_certificate(&leaf_der)
            .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
        let cn = leaf_cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|a| a.attr_value().as_str().ok())
            .unwrap_or_default();
        if cn != "attest.android.com" {
            return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
        }

        Ok(AttestationChain::BasicX5C {
            chain: verified.chain,
        })
    }
}
