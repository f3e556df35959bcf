//! `packed` attestation statement format.
//! <https://www.w3.org/TR/webauthn-2/#sctn-packed-attestation>
//!
//! `attStmt = {alg, sig, x5c?}`. Without `x5c` the statement is signed by
//! the credential's own key (self attestation); with `x5c` the leaf
//! certificate signs, and must additionally satisfy the packed
//! certificate profile checked by [`crate::crypto::assert_packed_attest_req`].

use core::convert::TryFrom;
use openssl::x509;

use crate::attestation::{AttestationChain, AttestationFormat};
use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};
use crate::internals::{cbor_try_bytes, cbor_try_i128, cbor_try_map};
use crate::proto::auth_data::AuthenticatorData;
use crate::proto::cose::{COSEAlgorithm, PublicKey};

pub struct Packed;

fn verification_data(auth_data: &AuthenticatorData, client_data_hash: &[u8; 32]) -> Vec<u8> {
    auth_data
        .raw
        .iter()
        .chain(client_data_hash.iter())
        .copied()
        .collect()
}

impl AttestationFormat for Packed {
    fn identifier(&self) -> &'static str {
        "packed"
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
                format: "packed",
                reason: "attStmt is not a CBOR map".into(),
            }
        })?;

        let alg_value = m
            .get(&serde_cbor_2::Value::Text("alg".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "packed",
                reason: "missing alg".into(),
            })?;
        let alg = COSEAlgorithm::try_from(cbor_try_i128!(alg_value).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "packed",
                reason: "alg is not an integer".into(),
            }
        })?)
        .map_err(|_| WebauthnError::AttestationStatementVerificationError {
            format: "packed",
            reason: "alg is not a known COSE algorithm".into(),
        })?;

        if alg != credential_public_key.algorithm() {
            trace!("packed: attStmt alg does not match credential key alg");
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "packed",
                reason: "attStmt alg does not match the credential public key's algorithm".into(),
            });
        }

        let sig_value = m
            .get(&serde_cbor_2::Value::Text("sig".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "packed",
                reason: "missing sig".into(),
            })?;
        let sig = cbor_try_bytes!(sig_value).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "packed",
                reason: "sig is not a byte string".into(),
            }
        })?;

        let verification_data = verification_data(auth_data, client_data_hash);

        match m.get(&serde_cbor_2::Value::Text("x5c".into())) {
            None => {
                trace!("packed: self attestation path");
                let ok = credential_public_key.verify_signature(sig, &verification_data)?;
                if !ok {
                    return Err(WebauthnError::SignatureInvalid);
                }
                Ok(AttestationChain::SelfAttestation)
            }
            Some(x5c_value) => {
                trace!("packed: x5c attestation path");
                let x5c_array = match x5c_value {
                    serde_cbor_2::Value::Array(a) => a,
                    _ => {
                        return Err(WebauthnError::AttestationStatementX5CInvalid);
                    }
                };
                if x5c_array.is_empty() {
                    return Err(WebauthnError::AttestationStatementX5CInvalid);
                }

                let chain = x5c_array
                    .iter()
                    .map(|v| {
                        let der = cbor_try_bytes!(v)
                            .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?;
                        x509::X509::from_der(der).map_err(WebauthnError::OpenSSLError)
                    })
                    .collect::<WebauthnResult<Vec<_>>>()?;

                let leaf = &chain[0];
                crypto::assert_packed_attest_req(leaf)?;

                let ok = crypto::verify_signature(alg, leaf, sig, &verification_data)?;
                if !ok {
                    return Err(WebauthnError::SignatureInvalid);
                }

                Ok(AttestationChain::BasicX5C { chain })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::cose::{COSEKey, COSEKeyType, COSEOKPKey, EDDSACurve};

    #[test]
    fn rejects_non_map_att_stmt() {
        let packed = Packed;
        let key = COSEKey {
            type_: COSEAlgorithm::EDDSA,
            key: COSEKeyType::EC_OKP(COSEOKPKey {
                curve: EDDSACurve::ED25519,
                x: vec![0u8; 32].into(),
            }),
        }
        .check()
        .unwrap();

        let mut raw = vec![0x55; 32];
        raw.push(0);
        raw.extend_from_slice(&[0, 0, 0, 0]);
        let auth_data = AuthenticatorData::parse(&raw).unwrap();

        let result = packed.verify(
            &serde_cbor_2::Value::Null,
            &auth_data,
            &key,
            &[0u8; 32],
        );
        assert!(result.is_err());
    }
}
