//! `none` attestation statement format - the RP asked for no attestation
//! and the authenticator complied. `attStmt` must be empty.
//! <https://www.w3.org/TR/webauthn-2/#sctn-none-attestation>

use crate::attestation::{AttestationChain, AttestationFormat};
use crate::error::{WebauthnError, WebauthnResult};
use crate::proto::auth_data::AuthenticatorData;
use crate::proto::cose::PublicKey;

pub struct None_;

impl AttestationFormat for None_ {
    fn identifier(&self) -> &'static str {
        "none"
    }

    fn verify(
        &self,
        att_stmt: &serde_cbor_2::Value,
        _auth_data: &AuthenticatorData,
        _credential_public_key: &PublicKey,
        _client_data_hash: &[u8; 32],
    ) -> WebauthnResult<AttestationChain> {
        let is_empty = match att_stmt {
            serde_cbor_2::Value::Map(m) => m.is_empty(),
            serde_cbor_2::Value::Null => true,
            _ => false,
        };
        if !is_empty {
            return Err(WebauthnError::AttestationStatementVerificationError {
                format: "none",
                reason: "attStmt must be empty for the none format".into(),
            });
        }
        Ok(AttestationChain::Uncertain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_data() -> AuthenticatorData {
        let mut raw = vec![0x11; 32];
        raw.push(0);
        raw.extend_from_slice(&[0, 0, 0, 0]);
        AuthenticatorData::parse(&raw).unwrap()
    }

    #[test]
    fn empty_map_is_accepted() {
        use crate::proto::cose::{COSEAlgorithm, COSEKey, COSEKeyType, COSEOKPKey, EDDSACurve};
        let key = COSEKey {
            type_: COSEAlgorithm::EDDSA,
            key: COSEKeyType::EC_OKP(COSEOKPKey {
                curve: EDDSACurve::ED25519,
                x: vec![0u8; 32].into(),
            }),
        }
        .check()
        .unwrap();
        let none_fmt = None_;
        let result = none_fmt.verify(
            &serde_cbor_2::Value::Map(Default::default()),
            &auth_data(),
            &key,
            &[0u8; 32],
        );
        assert!(matches!(result, Ok(AttestationChain::Uncertain)));
    }
}
