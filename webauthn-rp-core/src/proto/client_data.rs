//! `CollectedClientData`, the JSON object the browser produces and the
//! authenticator signs over, [MODULE C2].
//!
//! The raw input bytes are kept alongside the parsed fields because
//! WebAuthn signs the client-data bytes as received, not a canonical
//! re-encoding of them.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{WebauthnError, WebauthnResult};

/// `type` field of client-data: which ceremony produced this response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CeremonyKind {
    #[serde(rename = "webauthn.create")]
    Create,
    #[serde(rename = "webauthn.get")]
    Get,
}

impl CeremonyKind {
    fn as_str(self) -> &'static str {
        match self {
            CeremonyKind::Create => "webauthn.create",
            CeremonyKind::Get => "webauthn.get",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ClientDataOnWire {
    #[serde(rename = "type")]
    type_: CeremonyKind,
    challenge: String,
    origin: String,
    #[serde(default)]
    cross_origin: bool,
    // tokenBinding is accepted but ignored - out of scope.
}

/// A decoded `CollectedClientData`, paired with the exact bytes it was
/// parsed from.
#[derive(Debug, Clone)]
pub struct CollectedClientData {
    pub type_: CeremonyKind,
    pub challenge: Vec<u8>,
    pub origin: Url,
    pub cross_origin: bool,
    pub raw: Vec<u8>,
}

impl CollectedClientData {
    /// Parse client-data JSON, retaining the exact input bytes in `raw`.
    pub fn parse(raw: &[u8]) -> WebauthnResult<Self> {
        let on_wire: ClientDataOnWire = serde_json::from_slice(raw)
            .map_err(|e| WebauthnError::ClientDataDecodeError(e.to_string()))?;

        let challenge = general_purpose::URL_SAFE_NO_PAD
            .decode(&on_wire.challenge)
            .or_else(|_| general_purpose::URL_SAFE.decode(&on_wire.challenge))
            .map_err(|e| WebauthnError::ClientDataDecodeError(format!("challenge: {e}")))?;

        let origin = Url::parse(&on_wire.origin)
            .map_err(|e| WebauthnError::ClientDataDecodeError(format!("origin: {e}")))?;

        Ok(CollectedClientData {
            type_: on_wire.type_,
            challenge,
            origin,
            cross_origin: on_wire.cross_origin,
            raw: raw.to_vec(),
        })
    }

    /// Re-encode in the canonical field order `type, challenge, origin,
    /// crossOrigin` - used for round-trip testing, never for verification
    /// (verification always uses `raw`).
    pub fn to_json_bytes(&self) -> Vec<u8> {
        #[derive(Serialize)]
        struct ClientDataOnWireOut<'a> {
            #[serde(rename = "type")]
            type_: &'a str,
            challenge: String,
            origin: &'a str,
            #[serde(rename = "crossOrigin")]
            cross_origin: bool,
        }

        let out = ClientDataOnWireOut {
            type_: self.type_.as_str(),
            challenge: general_purpose::URL_SAFE_NO_PAD.encode(&self.challenge),
            origin: self.origin.as_str(),
            cross_origin: self.cross_origin,
        };
        serde_json::to_vec(&out).expect("ClientDataOnWireOut always serializes")
    }
}
