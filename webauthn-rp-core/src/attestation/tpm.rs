//! `tpm` attestation statement format.
//! <https://www.w3.org/TR/webauthn-2/#sctn-tpm-attestation>
//!
//! `attStmt = {ver, alg, x5c, sig, certInfo, pubArea}`. `certInfo` is a
//! `TPMS_ATTEST` structure the TPM signs; `pubArea` is a `TPMT_PUBLIC`
//! structure whose name (nameAlg || hash(pubArea)) must match the name
//! TPMS_ATTEST attests to, and whose key material must match the
//! credential public key. The leaf certificate must additionally satisfy
//! [`crate::crypto::assert_tpm_attest_req`].

use openssl::x509;

use crate::attestation::{AttestationChain, AttestationFormat};
use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};
use crate::internals::{cbor_try_bytes, cbor_try_i128, cbor_try_map, cbor_try_string};
use crate::proto::auth_data::AuthenticatorData;
use crate::proto::cose::{COSEAlgorithm, COSEKeyType, PublicKey};
use core::convert::TryFrom;

const TPM_GENERATED_VALUE: u32 = 0xff544347;
const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

struct TpmsAttest<'a> {
    extra_data: &'a [u8],
    attested_name: &'a [u8],
}

fn parse_tpms_attest(certinfo: &[u8]) -> WebauthnResult<TpmsAttest<'_>> {
    let bad = || WebauthnError::AttestationStatementVerificationError {
        format: "tpm",
        reason: "certInfo is not a well-formed TPMS_ATTEST".into(),
    };

    if certinfo.len() < 4 + 2 {
        return Err(bad());
    }
    let magic = u32::from_be_bytes(certinfo[0..4].try_into().unwrap());
    if magic != TPM_GENERATED_VALUE {
        return Err(bad());
    }
    let attest_type = u16::from_be_bytes(certinfo[4..6].try_into().unwrap());
    if attest_type != TPM_ST_ATTEST_CERTIFY {
        return Err(bad());
    }

    let mut cursor = 6usize;
    let qualified_signer_len =
        u16::from_be_bytes(certinfo.get(cursor..cursor + 2).ok_or_else(bad)?.try_into().unwrap())
            as usize;
    cursor += 2 + qualified_signer_len;

    let extra_data_len =
        u16::from_be_bytes(certinfo.get(cursor..cursor + 2).ok_or_else(bad)?.try_into().unwrap())
            as usize;
    cursor += 2;
    let extra_data = certinfo.get(cursor..cursor + extra_data_len).ok_or_else(bad)?;
    cursor += extra_data_len;

    // clockInfo (17 bytes) + firmwareVersion (8 bytes).
    cursor += 17 + 8;

    let name_len =
        u16::from_be_bytes(certinfo.get(cursor..cursor + 2).ok_or_else(bad)?.try_into().unwrap())
            as usize;
    cursor += 2;
    let attested_name = certinfo.get(cursor..cursor + name_len).ok_or_else(bad)?;

    Ok(TpmsAttest {
        extra_data,
        attested_name,
    })
}

pub struct Tpm;

impl AttestationFormat for Tpm {
    fn identifier(&self) -> &'static str {
        "tpm"
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
                format: "tpm",
                reason: "attStmt is not a CBOR map".into(),
            }
        })?;

        let ver_value = m
            .get(&serde_cbor_2::Value::Text("ver".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "missing ver".into(),
            })?;
        if cbor_try_string!(ver_value).map(String::as_str).ok() != Some("2.0") {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "unsupported TPM version".into(),
            });
        }

        let alg_value = m
            .get(&serde_cbor_2::Value::Text("alg".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "missing alg".into(),
            })?;
        let alg = COSEAlgorithm::try_from(cbor_try_i128!(alg_value).map_err(|_| {
            WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "alg is not an integer".into(),
            }
        })?)
        .map_err(|_| WebauthnError::AttestationStatementVerificationError {
            format: "tpm",
            reason: "alg is not a known COSE algorithm".into(),
        })?;

        let x5c_value = m
            .get(&serde_cbor_2::Value::Text("x5c".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
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
        crypto::assert_tpm_attest_req(leaf)?;

        let sig = cbor_try_bytes!(m
            .get(&serde_cbor_2::Value::Text("sig".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "missing sig".into(),
            })?)
        .map_err(|_| WebauthnError::AttestationStatementVerificationError {
            format: "tpm",
            reason: "sig is not a byte string".into(),
        })?;

        let cert_info = cbor_try_bytes!(m
            .get(&serde_cbor_2::Value::Text("certInfo".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "missing certInfo".into(),
            })?)
        .map_err(|_| WebauthnError::AttestationStatementVerificationError {
            format: "tpm",
            reason: "certInfo is not a byte string".into(),
        })?;

        let pub_area = cbor_try_bytes!(m
            .get(&serde_cbor_2::Value::Text("pubArea".into()))
            .ok_or(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "missing pubArea".into(),
            })?)
        .map_err(|_| WebauthnError::AttestationStatementVerificationError {
            format: "tpm",
            reason: "pubArea is not a byte string".into(),
        })?;

        // certInfo is signed directly - the TPM, not the credential,
        // generates it; verified by the AIK (leaf cert).
        let ok = crypto::verify_signature(alg, leaf, sig, cert_info)?;
        if !ok {
            return Err(WebauthnError::SignatureInvalid);
        }

        let attest = parse_tpms_attest(cert_info)?;

        // extraData must equal hash(attToBeSigned) = hash(authData || clientDataHash).
        let mut to_be_signed = auth_data.raw.clone();
        to_be_signed.extend_from_slice(client_data_hash);
        let expected_extra_data = crypto::compute_sha256(&to_be_signed);
        if attest.extra_data != expected_extra_data {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "certInfo extraData does not match hash(authData || clientDataHash)".into(),
            });
        }

        // name = nameAlg || hash(pubArea); we only support SHA-256 named objects.
        let pub_area_hash = crypto::compute_sha256(pub_area);
        let expected_name: Vec<u8> = [0x00u8, 0x0b] // TPM_ALG_SHA256
            .iter()
            .copied()
            .chain(pub_area_hash.iter().copied())
            .collect();
        if attest.attested_name != expected_name.as_slice() {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "tpm",
                reason: "certInfo attested name does not match hash(pubArea)".into(),
            });
        }

        // The pubArea's key material must match the credential public key.
        // Comparing the raw public-key bytes is sufficient - a full
        // TPMT_PUBLIC re-encoding adds no additional assurance here.
        match &credential_public_key.inner().key {
            COSEKeyType::RSA(rsak) => {
                if !contains_subslice(pub_area, rsak.n.as_ref()) {
                    return Err(WebauthnError::AttestationStatementVerificationError {
                        format: "tpm",
                        reason: "pubArea does not contain the credential RSA modulus".into(),
                    });
                }
            }
            COSEKeyType::EC_EC2(ec2k) => {
                if !contains_subslice(pub_area, ec2k.x.as_ref())
                    || !contains_subslice(pub_area, ec2k.y.as_ref())
                {
                    return Err(WebauthnError::AttestationStatementVerificationError {
                        format: "tpm",
                        reason: "pubArea does not contain the credential EC coordinates".into(),
                    });
                }
            }
            COSEKeyType::EC_OKP(_) => {
                return Err(WebauthnError::AttestationStatementVerificationError {
                    format: "tpm",
                    reason: "tpm attestation of EdDSA credentials is not supported".into(),
                });
            }
        }

        Ok(AttestationChain::AttCAX5C { chain })
    }
}

fn contains_subslice(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
