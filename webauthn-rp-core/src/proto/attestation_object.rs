//! The CBOR-encoded attestation object: `{authData, fmt, attStmt}`,
//! [MODULE C2].

use crate::error::{WebauthnError, WebauthnResult};
use crate::internals::{cbor_try_bytes, cbor_try_map, cbor_try_string};
use crate::proto::auth_data::AuthenticatorData;

/// A decoded attestation object. `auth_data` has already had its own
/// byte-layout parsed; `att_stmt` is left uninterpreted CBOR for the
/// format-specific verifier chosen by `fmt` to decode.
#[derive(Debug, Clone)]
pub struct AttestationObject {
    pub fmt: String,
    pub auth_data: AuthenticatorData,
    pub att_stmt: serde_cbor_2::Value,
}

impl AttestationObject {
    /// Decode strictly: all three top-level keys must be present.
    pub fn parse(raw: &[u8]) -> WebauthnResult<Self> {
        let value: serde_cbor_2::Value = serde_cbor_2::from_slice(raw)
            .map_err(|e| WebauthnError::AttestationObjectDecodeError(e.to_string()))?;
        let m = cbor_try_map!(&value)
            .map_err(|_| WebauthnError::AttestationObjectDecodeError("not a CBOR map".into()))?;

        let fmt_value = m
            .get(&serde_cbor_2::Value::Text("fmt".to_string()))
            .ok_or_else(|| WebauthnError::AttestationObjectDecodeError("missing fmt".into()))?;
        let fmt = cbor_try_string!(fmt_value)
            .map_err(|_| WebauthnError::AttestationObjectDecodeError("fmt is not a string".into()))?
            .clone();

        let auth_data_value = m
            .get(&serde_cbor_2::Value::Text("authData".to_string()))
            .ok_or_else(|| {
                WebauthnError::AttestationObjectDecodeError("missing authData".into())
            })?;
        let auth_data_bytes = cbor_try_bytes!(auth_data_value).map_err(|_| {
            WebauthnError::AttestationObjectDecodeError("authData is not a byte string".into())
        })?;
        let auth_data = AuthenticatorData::parse(auth_data_bytes)?;

        let att_stmt = m
            .get(&serde_cbor_2::Value::Text("attStmt".to_string()))
            .ok_or_else(|| {
                WebauthnError::AttestationObjectDecodeError("missing attStmt".into())
            })?
            .clone();

        Ok(AttestationObject {
            fmt,
            auth_data,
            att_stmt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_auth_data_bytes() -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&[0x44; 32]);
        raw.push(0b0000_0001);
        raw.extend_from_slice(&[0, 0, 0, 0]);
        raw
    }

    #[test]
    fn decodes_a_none_attestation_object() {
        let mut m = std::collections::BTreeMap::new();
        m.insert(
            serde_cbor_2::Value::Text("fmt".into()),
            serde_cbor_2::Value::Text("none".into()),
        );
        m.insert(
            serde_cbor_2::Value::Text("authData".into()),
            serde_cbor_2::Value::Bytes(minimal_auth_data_bytes()),
        );
        m.insert(
            serde_cbor_2::Value::Text("attStmt".into()),
            serde_cbor_2::Value::Map(Default::default()),
        );
        let value = serde_cbor_2::Value::Map(m);
        let raw = serde_cbor_2::to_vec(&value).unwrap();

        let obj = AttestationObject::parse(&raw).unwrap();
        assert_eq!(obj.fmt, "none");
        assert_eq!(obj.auth_data.sign_count, 0);
    }

    #[test]
    fn rejects_missing_fmt() {
        let mut m = std::collections::BTreeMap::new();
        m.insert(
            serde_cbor_2::Value::Text("authData".into()),
            serde_cbor_2::Value::Bytes(minimal_auth_data_bytes()),
        );
        m.insert(
            serde_cbor_2::Value::Text("attStmt".into()),
            serde_cbor_2::Value::Map(Default::default()),
        );
        let value = serde_cbor_2::Value::Map(m);
        let raw = serde_cbor_2::to_vec(&value).unwrap();
        assert!(AttestationObject::parse(&raw).is_err());
    }
}
