//! Outbound ceremony options, mirroring W3C
//! `PublicKeyCredentialCreationOptions` / `PublicKeyCredentialRequestOptions`
//! (§6). These are produced by the pending-challenge collaborator, not the
//! verification core itself, but the core's C4/C5 verifiers consume them
//! as input, so their shape lives here.

use base64urlsafedata::Base64UrlSafeData;
use serde::{Deserialize, Serialize};

use crate::proto::cose::COSEAlgorithm;
use crate::proto::credential::AuthenticatorTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationPolicy {
    Required,
    Preferred,
    Discouraged,
}

impl Default for UserVerificationPolicy {
    fn default() -> Self {
        UserVerificationPolicy::Preferred
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationConveyancePreference {
    None,
    Indirect,
    Direct,
    Enterprise,
}

impl Default for AttestationConveyancePreference {
    fn default() -> Self {
        AttestationConveyancePreference::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidentKeyRequirement {
    Discouraged,
    Preferred,
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Base64UrlSafeData,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PubKeyCredParam {
    #[serde(rename = "type", skip_deserializing, default = "public_key_type")]
    pub type_: &'static str,
    pub alg: i128,
}

fn public_key_type() -> &'static str {
    "public-key"
}

impl From<COSEAlgorithm> for PubKeyCredParam {
    fn from(alg: COSEAlgorithm) -> Self {
        PubKeyCredParam {
            type_: "public-key",
            alg: alg.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyCredentialDescriptor {
    #[serde(rename = "type", skip_deserializing, default = "public_key_type")]
    pub type_: &'static str,
    pub id: Base64UrlSafeData,
    #[serde(default)]
    pub transports: Vec<AuthenticatorTransport>,
}

/// The options a registration ceremony was started with - held by the
/// pending-challenge collaborator and handed back to [MODULE C4] at
/// `finish`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyCredentialCreationOptions {
    pub rp: RelyingParty,
    pub user: User,
    pub challenge: Base64UrlSafeData,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    #[serde(default)]
    pub exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(default)]
    pub attestation: AttestationConveyancePreference,
    #[serde(default)]
    pub user_verification: UserVerificationPolicy,
    pub resident_key: Option<ResidentKeyRequirement>,
}

impl PublicKeyCredentialCreationOptions {
    /// `requireResidentKey` is only emitted when `residentKey == required`,
    /// matching the legacy boolean field browsers still read.
    pub fn require_resident_key(&self) -> bool {
        matches!(self.resident_key, Some(ResidentKeyRequirement::Required))
    }
}

/// The options an authentication ceremony was started with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyCredentialRequestOptions {
    pub rp_id: String,
    pub challenge: Base64UrlSafeData,
    #[serde(default)]
    pub allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    #[serde(default)]
    pub user_verification: UserVerificationPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationChallengeResponse {
    pub public_key: PublicKeyCredentialCreationOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestChallengeResponse {
    pub public_key: PublicKeyCredentialRequestOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_resident_key_only_true_when_required() {
        let mut opts = PublicKeyCredentialCreationOptions {
            rp: RelyingParty {
                id: "example.com".into(),
                name: "Example".into(),
            },
            user: User {
                id: vec![1, 2, 3].into(),
                name: "alice".into(),
                display_name: "Alice".into(),
            },
            challenge: vec![0; 32].into(),
            pub_key_cred_params: vec![COSEAlgorithm::ES256.into()],
            exclude_credentials: vec![],
            attestation: AttestationConveyancePreference::None,
            user_verification: UserVerificationPolicy::Preferred,
            resident_key: Some(ResidentKeyRequirement::Discouraged),
        };
        assert!(!opts.require_resident_key());
        opts.resident_key = Some(ResidentKeyRequirement::Required);
        assert!(opts.require_resident_key());
    }
}
