//! `apple` anonymous attestation statement format.
//! <https://www.w3.org/TR/webauthn-2/#sctn-apple-anonymous-attestation>
//!
//! `attStmt = {x5c}`. The leaf certificate carries a nonce extension
//! (OID `1.2.840.113635.100.8.2`) whose value must equal
//! `sha256(authData || clientDataHash)`; the leaf's public key must
//! equal the credential public key (Apple's anonymization CA issues a
//! fresh certificate per attestation, signed by a CA out of scope for
//! this core to validate).

use openssl::x509;

use crate::attestation::{AttestationChain, AttestationFormat};
use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};
use crate::internals::{cbor_try_bytes, cbor_try_map};
use crate::proto::auth_data::AuthenticatorData;
use crate::proto::cose::PublicKey;

const APPLE_NONCE_EXTENSION_OID_RAW: &[u8] = &der_parser::oid!(raw 1.2.840 .113635 .100 .8 .2);

pub struct Apple;

impl AttestationFormat for Apple {
    fn identifier(&self) -> &'static str {
        "apple"
    }

    fn verify(
        &self,
        att_stmt: &serde_cbor_2::Value,
        auth_data: &AuthenticatorData,
        credential_public_key: &PublicKey,
        client_data_hash: &[u8; 32],
    ) -> WebauthnResult<AttestationChain> {
        let m = cbor_try_map!(att_stmt).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "apple",
                reason: "attStmt is not a CBOR map".into(),
            }
        })?;

        let x5c_value = m
            .get(&serde_cbor_2::Value::Text("x5c".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "apple",
                reason: "missing x5c".into(),
            })?;
        let x5c_array = match x5c_value {
            serde_cbor_2::Value::Array(a) if !a.is_empty() => a,
            _ => return Err(WebauthnError::AttestationStatementX5CInvalid),
        };
        let chain = x5c_array
            .iter()
            .map(|v| {
                let der = cbor_try_bytes!(v).map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
                x509::X509::from_der(der).map_err(WebauthnError::OpenSSLError)
            })
            .collect::<WebauthnResult<Vec<_>>>()?;
        let leaf = &chain[0];

        let mut to_hash = auth_data.raw.clone();
        to_hash.extend_from_slice(client_data_hash);
        let expected_nonce = crypto::compute_sha256(&to_hash);

        let der_bytes = leaf.to_der().map_err(WebauthnError::OpenSSLError)?;
        let (_, x509_cert) = x509_parser::parse_x509_certificate(&der_bytes)
            .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
        let extension = x509_cert
            .extensions()
            .iter()
            .find(|e| e.oid.as_bytes() == APPLE_NONCE_EXTENSION_OID_RAW)
            .ok_or(WebauthnError::AttestationCertificateRequirementsNotMet)?;
        if !extension.value.windows(32).any(|w| w == expected_nonce) {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "apple",
                reason: "nonce extension does not match hash(authData || clientDataHash)".into(),
            });
        }

        // Apple attestation credentials are EC (P-256); the leaf's public
        // key must be byte-identical to the credential's.
        let x962 = credential_public_key.get_alg_key_ecc_x962_raw().map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "apple",
                reason: "credential public key is not EC-shaped".into(),
            }
        })?;
        let leaf_pkey = leaf.public_key().map_err(WebauthnError::OpenSSLError)?;
        let leaf_pub_der = leaf_pkey
            .public_key_to_der()
            .map_err(WebauthnError::OpenSSLError)?;
        if !leaf_pub_der.windows(x962.len()).any(|w| w == x962.as_slice()) {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "apple",
                reason: "leaf certificate public key does not match the credential key".into(),
            });
        }

        Ok(AttestationChain::AnonCA)
    }
}
