//! Authenticator data: the 37-byte-plus-variable structure every
//! authenticator response carries, [MODULE C2].
//!
//! Layout: `rpIdHash(32) || flags(1) || signCount(4) || [attestedCredentialData]
//! || [extensions]`. The exact byte span is retained on [`AuthenticatorData`]
//! because it is itself part of what gets signed (directly on assertion,
//! concatenated with the client-data hash on registration for some
//! attestation formats).

use core::convert::TryFrom;

use crate::error::{WebauthnError, WebauthnResult};
use crate::proto::cose::COSEKey;

bitflags::bitflags! {
    /// The single flags byte of authenticator data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AuthenticatorDataFlags: u8 {
        /// User Present.
        const USER_PRESENT = 0b0000_0001;
        /// User Verified.
        const USER_VERIFIED = 0b0000_0100;
        /// Attested credential data included.
        const ATTESTED_CREDENTIAL_DATA = 0b0100_0000;
        /// Extension data included.
        const EXTENSION_DATA = 0b1000_0000;
    }
}

/// `aaguid || credentialIdLen || credentialId || credentialPublicKey`,
/// present only on registration responses.
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    pub aaguid: [u8; 16],
    pub credential_id: Vec<u8>,
    pub credential_public_key: COSEKey,
    /// The exact CBOR bytes the key was decoded from - required so the
    /// stored `CredentialEntry` can be re-verified byte-for-byte later.
    pub credential_public_key_bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    pub rp_id_hash: [u8; 32],
    pub flags: AuthenticatorDataFlags,
    pub sign_count: u32,
    pub attested_credential_data: Option<AttestedCredentialData>,
    /// Raw CBOR bytes of the extensions map, uninterpreted - client
    /// extensions are out of scope.
    pub extensions: Option<Vec<u8>>,
    pub raw: Vec<u8>,
}

impl AuthenticatorData {
    pub fn user_present(&self) -> bool {
        self.flags.contains(AuthenticatorDataFlags::USER_PRESENT)
    }

    pub fn user_verified(&self) -> bool {
        self.flags.contains(AuthenticatorDataFlags::USER_VERIFIED)
    }

    /// Parse the 37-plus-variable-byte authenticator data structure,
    /// retaining `raw` as the exact input slice.
    pub fn parse(raw: &[u8]) -> WebauthnResult<Self> {
        if raw.len() < 37 {
            return Err(WebauthnError::AuthenticatorDataDecodeError(
                "authenticator data shorter than the fixed 37-byte prefix".into(),
            ));
        }

        let mut rp_id_hash = [0u8; 32];
        rp_id_hash.copy_from_slice(&raw[0..32]);

        let flags = AuthenticatorDataFlags::from_bits_truncate(raw[32]);

        let mut sign_count_bytes = [0u8; 4];
        sign_count_bytes.copy_from_slice(&raw[33..37]);
        let sign_count = u32::from_be_bytes(sign_count_bytes);

        let mut cursor = 37usize;

        let attested_credential_data = if flags.contains(AuthenticatorDataFlags::ATTESTED_CREDENTIAL_DATA) {
            if raw.len() < cursor + 16 + 2 {
                return Err(WebauthnError::AuthenticatorDataDecodeError(
                    "truncated before attestedCredentialData AAGUID/length".into(),
                ));
            }
            let mut aaguid = [0u8; 16];
            aaguid.copy_from_slice(&raw[cursor..cursor + 16]);
            cursor += 16;

            let cred_id_len = u16::from_be_bytes([raw[cursor], raw[cursor + 1]]) as usize;
            cursor += 2;
            if cred_id_len > 1023 {
                return Err(WebauthnError::AuthenticatorDataDecodeError(
                    "credentialIdLen exceeds the 1023-byte maximum".into(),
                ));
            }
            if raw.len() < cursor + cred_id_len {
                return Err(WebauthnError::AuthenticatorDataDecodeError(
                    "truncated before end of credentialId".into(),
                ));
            }
            let credential_id = raw[cursor..cursor + cred_id_len].to_vec();
            cursor += cred_id_len;

            let remaining = &raw[cursor..];
            let mut deserializer = serde_cbor_2::Deserializer::from_slice(remaining);
            let value: serde_cbor_2::Value = serde::Deserialize::deserialize(&mut deserializer)
                .map_err(|e| WebauthnError::AuthenticatorDataDecodeError(e.to_string()))?;
            let consumed = deserializer.byte_offset();
            let credential_public_key_bytes = remaining[..consumed].to_vec();
            let credential_public_key = COSEKey::try_from(&value)?;
            cursor += consumed;

            Some(AttestedCredentialData {
                aaguid,
                credential_id,
                credential_public_key,
                credential_public_key_bytes,
            })
        } else {
            None
        };

        let extensions = if flags.contains(AuthenticatorDataFlags::EXTENSION_DATA) {
            if cursor >= raw.len() {
                return Err(WebauthnError::AuthenticatorDataDecodeError(
                    "ED flag set but no extension bytes remain".into(),
                ));
            }
            let remaining = &raw[cursor..];
            let mut deserializer = serde_cbor_2::Deserializer::from_slice(remaining);
            let _value: serde_cbor_2::Value = serde::Deserialize::deserialize(&mut deserializer)
                .map_err(|e| WebauthnError::AuthenticatorDataDecodeError(e.to_string()))?;
            let consumed = deserializer.byte_offset();
            let ext_bytes = remaining[..consumed].to_vec();
            cursor += consumed;
            Some(ext_bytes)
        } else {
            None
        };

        if cursor != raw.len() {
            debug!(
                trailing = raw.len() - cursor,
                "authenticator data has trailing bytes after the parsed structure"
            );
        }

        Ok(AuthenticatorData {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
            raw: raw.to_vec(),
        })
    }

    /// Reconstruct the byte layout from the parsed fields, independent of
    /// `raw` - used to test that decode/encode round-trips.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.raw.len());
        out.extend_from_slice(&self.rp_id_hash);
        out.push(self.flags.bits());
        out.extend_from_slice(&self.sign_count.to_be_bytes());
        if let Some(acd) = &self.attested_credential_data {
            out.extend_from_slice(&acd.aaguid);
            out.extend_from_slice(&(acd.credential_id.len() as u16).to_be_bytes());
            out.extend_from_slice(&acd.credential_id);
            out.extend_from_slice(&acd.credential_public_key_bytes);
        }
        if let Some(ext) = &self.extensions {
            out.extend_from_slice(ext);
        }
        out
    }
}
