//! # webauthn-rp
//!
//! An ergonomic, stateful-by-convention wrapper around `webauthn-rp-core`:
//! [`WebauthnBuilder`] validates an rp_id/rp_origin pair once at startup,
//! and the resulting [`Webauthn`] issues ceremony options and hands
//! finished browser responses to the core's registration and assertion
//! verifiers.
//!
//! This crate owns none of a deployment's state - who a pending
//! challenge belongs to, where credential records live, how the
//! metadata registry is refreshed - it only supplies the pieces that
//! state needs: [`pending::PendingChallengeStore`] and
//! [`metadata_service::MetadataService`].

#![warn(missing_docs)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unreachable)]

#[macro_use]
extern crate tracing;

pub mod metadata_service;
pub mod pending;

use rand::RngCore;
use url::Url;

use webauthn_rp_core::attestation::SupportedFormats;
use webauthn_rp_core::ceremony::{
    verify_assertion_response, verify_registration_response, AttestationResult,
    SignatureCounterResult,
};
use webauthn_rp_core::crypto::compute_sha256;
use webauthn_rp_core::error::{WebauthnError, WebauthnResult};
use webauthn_rp_core::metadata::registry::MetadataRegistry;
use webauthn_rp_core::proto::client_data::CollectedClientData;
use webauthn_rp_core::proto::cose::COSEAlgorithm;
use webauthn_rp_core::proto::credential::{
    CredentialEntry, PublicKeyCredential, RegisterPublicKeyCredential,
};
use webauthn_rp_core::proto::options::{
    AttestationConveyancePreference, CreationChallengeResponse, PubKeyCredParam,
    PublicKeyCredentialCreationOptions, PublicKeyCredentialDescriptor,
    PublicKeyCredentialRequestOptions, RelyingParty, RequestChallengeResponse, User,
    UserVerificationPolicy,
};

pub use metadata_service::{MetadataFetchError, MetadataService, MetadataServiceConfig};
pub use pending::{InMemoryPendingChallengeStore, PendingCeremony, PendingChallengeStore};

const CHALLENGE_BYTES: usize = 32;

fn generate_challenge() -> Vec<u8> {
    let mut bytes = vec![0u8; CHALLENGE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

fn origin_matches(candidate: &Url, allowed: &Url, allow_subdomains: bool, allow_any_port: bool) -> bool {
    if candidate.scheme() != allowed.scheme() {
        return false;
    }
    let host_ok = match (candidate.host_str(), allowed.host_str()) {
        (Some(c), Some(a)) => c == a || (allow_subdomains && c.ends_with(&format!(".{a}"))),
        _ => false,
    };
    if !host_ok {
        return false;
    }
    allow_any_port || candidate.port_or_known_default() == allowed.port_or_known_default()
}

/// Builds a [`Webauthn`] instance, validating the rp_id/rp_origin
/// relationship up front. An authenticator binds its credential to
/// rp_id, so a configuration mistake here can't be corrected later
/// without breaking every credential issued under it.
pub struct WebauthnBuilder<'a> {
    rp_name: Option<&'a str>,
    rp_id: &'a str,
    allowed_origins: Vec<Url>,
    allow_subdomains: bool,
    allow_any_port: bool,
    algorithms: Vec<COSEAlgorithm>,
}

impl<'a> WebauthnBuilder<'a> {
    /// `rp_id` must be an effective domain of `rp_origin`: hosting
    /// `https://idm.example.com` allows an rp_id of `idm.example.com`,
    /// `example.com`, or `com`.
    pub fn new(rp_id: &'a str, rp_origin: &'a Url) -> WebauthnResult<Self> {
        let valid = rp_origin
            .domain()
            .map(|effective_domain| {
                effective_domain.ends_with(&format!(".{rp_id}")) || effective_domain == rp_id
            })
            .unwrap_or(false);

        if !valid {
            error!("rp_id is not an effective domain of rp_origin");
            return Err(WebauthnError::Configuration);
        }

        Ok(WebauthnBuilder {
            rp_name: None,
            rp_id,
            allowed_origins: vec![rp_origin.to_owned()],
            allow_subdomains: false,
            allow_any_port: false,
            algorithms: COSEAlgorithm::secure_algs(),
        })
    }

    /// Allow subdomains of `rp_origin`'s host to satisfy origin checks -
    /// for example accepting `au.idm.example.com` when the configured
    /// origin is `idm.example.com`. Defaults to `false`.
    pub fn allow_subdomains(mut self, allow: bool) -> Self {
        self.allow_subdomains = allow;
        self
    }

    /// Skip the port comparison when matching an incoming origin.
    pub fn allow_any_port(mut self, allow: bool) -> Self {
        self.allow_any_port = allow;
        self
    }

    /// Register an additional origin as valid - for native app clients
    /// (iOS, Android) that present an app-specific origin rather than a
    /// browser's.
    pub fn append_allowed_origin(mut self, origin: &Url) -> Self {
        self.allowed_origins.push(origin.to_owned());
        self
    }

    /// The relying party name shown to users. Defaults to `rp_id` and,
    /// unlike `rp_id`, can be changed later without affecting existing
    /// credentials.
    pub fn rp_name(mut self, rp_name: &'a str) -> Self {
        self.rp_name = Some(rp_name);
        self
    }

    /// Finish construction.
    pub fn build(self) -> WebauthnResult<Webauthn> {
        Ok(Webauthn {
            rp_name: self.rp_name.unwrap_or(self.rp_id).to_owned(),
            rp_id: self.rp_id.to_owned(),
            allowed_origins: self.allowed_origins,
            allow_subdomains: self.allow_subdomains,
            allow_any_port: self.allow_any_port,
            algorithms: self.algorithms,
            formats: SupportedFormats::all(),
        })
    }
}

/// An instance of a relying party. Issues ceremony options and verifies
/// the browser responses that come back, delegating the actual check
/// list to `webauthn-rp-core`.
pub struct Webauthn {
    rp_name: String,
    rp_id: String,
    allowed_origins: Vec<Url>,
    allow_subdomains: bool,
    allow_any_port: bool,
    algorithms: Vec<COSEAlgorithm>,
    formats: SupportedFormats,
}

impl Webauthn {
    /// The origins this instance currently accepts.
    pub fn get_allowed_origins(&self) -> &[Url] {
        &self.allowed_origins
    }

    /// Match `candidate` against the configured origin policy, returning
    /// it unchanged if it is allowed. Cloning and handing back the
    /// candidate (rather than the matched allow-listed origin) lets the
    /// core verifiers do their own origin equality check against
    /// whatever the client actually sent.
    fn resolve_origin(&self, candidate: &Url) -> Option<Url> {
        self.allowed_origins
            .iter()
            .any(|allowed| origin_matches(candidate, allowed, self.allow_subdomains, self.allow_any_port))
            .then(|| candidate.clone())
    }

    /// Start a registration ceremony for `user_unique_id`. Returns the
    /// wire response to send to the browser and the options a caller
    /// must hold onto (typically via a [`PendingChallengeStore`]) until
    /// [`Webauthn::finish_registration`] is called.
    pub fn start_registration(
        &self,
        user_unique_id: uuid::Uuid,
        user_name: &str,
        user_display_name: &str,
        exclude_credentials: Vec<PublicKeyCredentialDescriptor>,
        attestation: AttestationConveyancePreference,
    ) -> (CreationChallengeResponse, PublicKeyCredentialCreationOptions) {
        let options = PublicKeyCredentialCreationOptions {
            rp: RelyingParty {
                id: self.rp_id.clone(),
                name: self.rp_name.clone(),
            },
            user: User {
                id: user_unique_id.as_bytes().to_vec().into(),
                name: user_name.to_owned(),
                display_name: user_display_name.to_owned(),
            },
            challenge: generate_challenge().into(),
            pub_key_cred_params: self.algorithms.iter().copied().map(PubKeyCredParam::from).collect(),
            exclude_credentials,
            attestation,
            user_verification: UserVerificationPolicy::Preferred,
            resident_key: None,
        };
        (
            CreationChallengeResponse {
                public_key: options.clone(),
            },
            options,
        )
    }

    /// Verify a completed registration ceremony against the options it
    /// was started with.
    pub fn finish_registration(
        &self,
        options: &PublicKeyCredentialCreationOptions,
        credential: &RegisterPublicKeyCredential,
        registry: &MetadataRegistry,
        now_unix: i64,
    ) -> Result<AttestationResult, Vec<WebauthnError>> {
        let client_data = CollectedClientData::parse(credential.response.client_data_json.as_ref())
            .map_err(|e| vec![e])?;
        let origin = self
            .resolve_origin(&client_data.origin)
            .ok_or_else(|| vec![WebauthnError::OriginMismatch])?;
        let rp_id_hash = compute_sha256(self.rp_id.as_bytes());
        verify_registration_response(
            &origin,
            &rp_id_hash,
            registry,
            now_unix,
            options,
            credential,
            &self.formats,
        )
    }

    /// Start an authentication ceremony, optionally scoped to a list of
    /// known credentials (empty means any resident credential for
    /// `rp_id` may respond).
    pub fn start_authentication(
        &self,
        allow_credentials: Vec<PublicKeyCredentialDescriptor>,
    ) -> (RequestChallengeResponse, PublicKeyCredentialRequestOptions) {
        let options = PublicKeyCredentialRequestOptions {
            rp_id: self.rp_id.clone(),
            challenge: generate_challenge().into(),
            allow_credentials,
            user_verification: UserVerificationPolicy::Preferred,
        };
        (
            RequestChallengeResponse {
                public_key: options.clone(),
            },
            options,
        )
    }

    /// Verify a completed authentication ceremony against the stored
    /// credential record `entry` and the options it was started with.
    /// `identified_user` is the user handle the caller already believes
    /// it is authenticating (e.g. from a username typed before the
    /// ceremony began), or `None` for a fully discoverable flow.
    pub fn finish_authentication(
        &self,
        options: &PublicKeyCredentialRequestOptions,
        credential: &PublicKeyCredential,
        identified_user: Option<&[u8]>,
        entry: &CredentialEntry,
    ) -> Result<SignatureCounterResult, Vec<WebauthnError>> {
        let client_data = CollectedClientData::parse(credential.response.client_data_json.as_ref())
            .map_err(|e| vec![e])?;
        let origin = self
            .resolve_origin(&client_data.origin)
            .ok_or_else(|| vec![WebauthnError::OriginMismatch])?;
        let rp_id_hash = compute_sha256(self.rp_id.as_bytes());
        verify_assertion_response(&origin, &rp_id_hash, identified_user, entry, options, credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn builder_rejects_rp_id_not_effective_domain_of_origin() {
        let origin = url("https://idm.different.com");
        assert!(WebauthnBuilder::new("example.com", &origin).is_err());
    }

    #[test]
    fn builder_accepts_matching_rp_id() {
        let origin = url("https://idm.example.com");
        assert!(WebauthnBuilder::new("example.com", &origin).is_ok());
        assert!(WebauthnBuilder::new("idm.example.com", &origin).is_ok());
    }

    #[test]
    fn origin_matches_respects_subdomain_and_port_flags() {
        let allowed = url("https://idm.example.com");
        let subdomain = url("https://au.idm.example.com");
        let different_port = url("https://idm.example.com:8443");

        assert!(!origin_matches(&subdomain, &allowed, false, false));
        assert!(origin_matches(&subdomain, &allowed, true, false));
        assert!(!origin_matches(&different_port, &allowed, false, false));
        assert!(origin_matches(&different_port, &allowed, false, true));
    }

    #[test]
    fn start_registration_uses_configured_rp_and_algorithms() {
        let origin = url("https://idm.example.com");
        let webauthn = WebauthnBuilder::new("example.com", &origin)
            .unwrap()
            .rp_name("Example Corp")
            .build()
            .unwrap();

        let (response, options) = webauthn.start_registration(
            uuid::Uuid::new_v4(),
            "alice",
            "Alice",
            vec![],
            AttestationConveyancePreference::None,
        );
        assert_eq!(response.public_key.rp.id, "example.com");
        assert_eq!(response.public_key.rp.name, "Example Corp");
        assert_eq!(options.challenge.as_ref().len(), CHALLENGE_BYTES);
        assert!(!options.pub_key_cred_params.is_empty());
    }
}
