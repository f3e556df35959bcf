//! `fido-u2f` attestation statement format - the legacy U2F message
//! shape, carried forward into WebAuthn for backwards compatibility.
//! <https://fidoalliance.org/specs/fido-u2f-v1.2-ps-20170411/fido-u2f-raw-message-formats-v1.2-ps-20170411.html#registration-messages>
//!
//! Grounded on the `kvnallsn-auth-rs` FIDO-U2F attestation handler: a
//! single leaf certificate signs `0x00 || rpIdHash || clientDataHash ||
//! credentialId || credPubKey(x962)`, ECDSA P-256 only.

use openssl::x509;

use crate::attestation::{AttestationChain, AttestationFormat};
use crate::crypto;
use crate::error::WebauthnError;
use crate::error::WebauthnResult;
use crate::internals::{cbor_try_bytes, cbor_try_map};
use crate::proto::auth_data::AuthenticatorData;
use crate::proto::cose::{COSEAlgorithm, PublicKey};

pub struct FidoU2f;

impl AttestationFormat for FidoU2f {
    fn identifier(&self) -> &'static str {
        "fido-u2f"
    }

    fn verify(
        &self,
        att_stmt: &serde_cbor_2::Value,
        auth_data: &AuthenticatorData,
        credential_public_key: &PublicKey,
        client_data_hash: &[u8; 32],
    ) -> WebauthnResult<AttestationChain> {
        if credential_public_key.algorithm() != COSEAlgorithm::ES256 {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "fido-u2f",
                reason: "fido-u2f only supports ECDSA P-256 credential keys".into(),
            });
        }

        let m = cbor_try_map!(att_stmt).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "fido-u2f",
                reason: "attStmt is not a CBOR map".into(),
            }
        })?;

        let x5c_value = m
            .get(&serde_cbor_2::Value::Text("x5c".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "fido-u2f",
                reason: "missing x5c".into(),
            })?;
        let x5c_array = match x5c_value {
            serde_cbor_2::Value::Array(a) => a,
            _ => return Err(WebauthnError::AttestationStatementX5CInvalid),
        };
        // "Check that x5c has exactly one element" - §4.3.
        if x5c_array.len() != 1 {
            return Err(WebauthnError::AttestationStatementX5CInvalid);
        }
        let leaf_der =
            cbor_try_bytes!(&x5c_array[0]).map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
        let leaf = x509::X509::from_der(leaf_der).map_err(WebauthnError::OpenSSLError)?;

        let sig_value = m
            .get(&serde_cbor_2::Value::Text("sig".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "fido-u2f",
                reason: "missing sig".into(),
            })?;
        let sig = cbor_try_bytes!(sig_value).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "fido-u2f",
                reason: "sig is not a byte string".into(),
            }
        })?;

        let acd = auth_data.attested_credential_data.as_ref().ok_or(
            WebauthnError::AttestedCredentialDataMissing,
        )?;

        // Raw ANSI X9.62 public key format, ALG_KEY_ECC_X962_RAW.
        let pubkey_u2f = credential_public_key.get_alg_key_ecc_x962_raw()?;

        let mut verification_data = vec![0x00u8];
        verification_data.extend_from_slice(&auth_data.rp_id_hash);
        verification_data.extend_from_slice(client_data_hash);
        verification_data.extend_from_slice(&acd.credential_id);
        verification_data.extend_from_slice(&pubkey_u2f);

        let ok = crypto::verify_signature(COSEAlgorithm::ES256, &leaf, sig, &verification_data)?;
        if !ok {
            return Err(WebauthnError::SignatureInvalid);
        }

        Ok(AttestationChain::BasicX5C { chain: vec![leaf] })
    }
}
