//! Compact JWS verification, shared by the MDS blob processor ([MODULE
//! C7]) and the `android-safetynet` attestation format, which both need
//! to validate a three-part base64url `header.payload.signature` token
//! signed with an X.509 leaf certificate.

use base64::{engine::general_purpose, Engine as _};
use openssl::x509;
use serde::Deserialize;

use crate::crypto;
use crate::error::{WebauthnError, WebauthnResult};
use crate::proto::cose::COSEAlgorithm;

#[derive(Debug, Deserialize)]
struct JwsHeader {
    alg: String,
    #[serde(default)]
    x5c: Vec<String>,
}

/// A verified JWS: the signing chain (leaf first) and the decoded
/// payload bytes.
pub struct VerifiedJws {
    pub chain: Vec<x509::X509>,
    pub payload: Vec<u8>,
}

fn alg_from_jws_name(name: &str) -> WebauthnResult<COSEAlgorithm> {
    match name {
        "RS256" => Ok(COSEAlgorithm::RS256),
        "ES256" => Ok(COSEAlgorithm::ES256),
        _ => Err(WebauthnError::JwsSignatureInvalid),
    }
}

/// Verify a compact-serialization JWS. The header's `x5c` chain is
/// decoded and its leaf used to verify `header.payload`; only RS256 and
/// ES256 are accepted, matching both MDS and safetynet requirements.
///
/// Certificate validity against `now` and chaining to a pinned root are
/// the caller's responsibility - this function only checks the
/// signature itself, since the two call sites pin different roots (the
/// FIDO Alliance MDS root vs. none, for safetynet).
pub fn verify_compact_jws(jws: &str) -> WebauthnResult<VerifiedJws> {
    let mut parts = jws.split('.');
    let header_b64 = parts.next().ok_or(WebauthnError::JwsSignatureInvalid)?;
    let payload_b64 = parts.next().ok_or(WebauthnError::JwsSignatureInvalid)?;
    let signature_b64 = parts.next().ok_or(WebauthnError::JwsSignatureInvalid)?;
    if parts.next().is_some() {
        return Err(WebauthnError::JwsSignatureInvalid);
    }

    let header_bytes = general_purpose::URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| WebauthnError::JwsSignatureInvalid)?;
    let header: JwsHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| WebauthnError::JwsSignatureInvalid)?;
    let alg = alg_from_jws_name(&header.alg)?;

    if header.x5c.is_empty() {
        return Err(WebauthnError::JwsSignatureInvalid);
    }
    let chain = header
        .x5c
        .iter()
        .map(|b64| {
            let der = general_purpose::STANDARD
                .decode(b64)
                .map_err(|_| WebauthnError::JwsSignatureInvalid)?;
            x509::X509::from_der(&der).map_err(WebauthnError::OpenSSLError)
        })
        .collect::<WebauthnResult<Vec<_>>>()?;

    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| WebauthnError::JwsSignatureInvalid)?;

    // JWS ECDSA signatures are raw r||s, unlike WebAuthn's DER SEQUENCE(r,s);
    // re-encode to DER before handing to the shared verifier.
    let signature = match alg {
        COSEAlgorithm::ES256 => jws_ecdsa_to_der(&signature)?,
        _ => signature,
    };

    let signing_input = format!("{header_b64}.{payload_b64}");
    let leaf = &chain[0];
    let ok = crypto::verify_signature(alg, leaf, &signature, signing_input.as_bytes())?;
    if !ok {
        return Err(WebauthnError::JwsSignatureInvalid);
    }

    let payload = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| WebauthnError::JwsSignatureInvalid)?;

    Ok(VerifiedJws { chain, payload })
}

fn jws_ecdsa_to_der(raw: &[u8]) -> WebauthnResult<Vec<u8>> {
    if raw.len() % 2 != 0 {
        return Err(WebauthnError::JwsSignatureInvalid);
    }
    let half = raw.len() / 2;
    let r = openssl::bn::BigNum::from_slice(&raw[..half]).map_err(WebauthnError::OpenSSLError)?;
    let s = openssl::bn::BigNum::from_slice(&raw[half..]).map_err(WebauthnError::OpenSSLError)?;
    let sig = openssl::ecdsa::EcdsaSig::from_private_components(r, s)
        .map_err(WebauthnError::OpenSSLError)?;
    sig.to_der().map_err(WebauthnError::OpenSSLError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_compact_serialization() {
        assert!(verify_compact_jws("only-one-part").is_err());
        assert!(verify_compact_jws("a.b.c.d").is_err());
    }

    #[test]
    fn rejects_unknown_algorithm() {
        assert!(alg_from_jws_name("HS256").is_err());
        assert!(alg_from_jws_name("RS256").is_ok());
    }
}
