//! The inbound browser JSON envelope (§6) and the records the RP stores
//! per credential (§3).

use base64urlsafedata::Base64UrlSafeData;
use serde::{Deserialize, Serialize};

use crate::error::{WebauthnError, WebauthnResult};

/// Either an AAGUID (FIDO2) or a SHA-1 Subject Key Identifier
/// (FIDO-U2F) - exactly one variant identifies a given credential's
/// authenticator model in the metadata registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthenticatorIdentifier {
    Aaguid([u8; 16]),
    SubjectKeyIdentifier([u8; 20]),
}

impl AuthenticatorIdentifier {
    pub fn aaguid_from_uuid(u: uuid::Uuid) -> Self {
        AuthenticatorIdentifier::Aaguid(*u.as_bytes())
    }

    pub fn ski_from_sha1(digest: [u8; 20]) -> Self {
        AuthenticatorIdentifier::SubjectKeyIdentifier(digest)
    }
}

/// `AuthenticatorTransport`. Values outside this closed set are kept
/// verbatim in `Unknown` rather than rejected - a future WebAuthn
/// revision may add transports, and an unrecognised value here is not
/// treated as an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticatorTransport {
    Usb,
    Nfc,
    Ble,
    Internal,
    Hybrid,
    #[serde(other)]
    Unknown,
}

/// The record an RP stores per registered credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialEntry {
    pub credential_id: Vec<u8>,
    pub user_handle: Vec<u8>,
    /// The exact COSE_Key CBOR bytes captured at registration - never
    /// re-encoded, so later re-verification is byte-for-byte faithful.
    pub raw_public_key_bytes: Vec<u8>,
    pub sign_count: u32,
    pub transports: Vec<AuthenticatorTransport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatorAttestationResponseRaw {
    pub client_data_json: Base64UrlSafeData,
    pub attestation_object: Base64UrlSafeData,
    #[serde(default)]
    pub transports: Vec<AuthenticatorTransport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterPublicKeyCredential {
    pub id: String,
    pub raw_id: Base64UrlSafeData,
    pub response: AuthenticatorAttestationResponseRaw,
    #[serde(default)]
    pub client_extension_results: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatorAssertionResponseRaw {
    pub authenticator_data: Base64UrlSafeData,
    pub client_data_json: Base64UrlSafeData,
    pub signature: Base64UrlSafeData,
    #[serde(default)]
    pub user_handle: Option<Base64UrlSafeData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicKeyCredential {
    pub id: String,
    pub raw_id: Base64UrlSafeData,
    pub response: AuthenticatorAssertionResponseRaw,
    #[serde(default)]
    pub client_extension_results: serde_json::Value,
}

/// Parse the 20-byte SHA-1 Subject Key Identifier encoded as hex, as
/// carried by `attestationCertificateKeyIdentifiers` in MDS entries.
pub fn parse_subject_key_identifier_hex(s: &str) -> WebauthnResult<[u8; 20]> {
    let bytes = hex::decode(s)
        .map_err(|e| WebauthnError::MetadataDecodeError(format!("bad SKI hex: {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        WebauthnError::MetadataDecodeError(format!(
            "SKI must be 20 bytes, got {}",
            v.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_transport_is_stored_not_rejected() {
        let t: AuthenticatorTransport = serde_json::from_str("\"smart-card\"").unwrap();
        assert_eq!(t, AuthenticatorTransport::Unknown);
    }

    #[test]
    fn ski_hex_must_be_twenty_bytes() {
        assert!(parse_subject_key_identifier_hex("aabb").is_err());
        let good = "00".repeat(20);
        assert!(parse_subject_key_identifier_hex(&good).is_ok());
    }
}
