//! The registration ([MODULE C4]) and assertion ([MODULE C5]) verifiers:
//! the two WebAuthn ceremony state machines that orchestrate everything
//! else in this crate.

use openssl::asn1::Asn1Time;
use openssl::memcmp;
use openssl::x509;
use url::Url;

use crate::attestation::{AttestationChain, SupportedFormats};
use crate::crypto::compute_sha256;
use crate::error::WebauthnError;
use crate::metadata::registry::MetadataRegistry;
use crate::metadata::MetadataEntry;
use crate::proto::client_data::{CeremonyKind, CollectedClientData};
use crate::proto::cose::COSEKey;
use crate::proto::credential::{
    AuthenticatorIdentifier, CredentialEntry, PublicKeyCredential, RegisterPublicKeyCredential,
};
use crate::proto::options::{
    PublicKeyCredentialCreationOptions, PublicKeyCredentialRequestOptions, UserVerificationPolicy,
};

/// Accumulates every validation failure instead of stopping at the
/// first, so tests (and callers) can see the complete error set for a
/// rejected ceremony. Not a general-purpose validation crate - just
/// enough structure for C4/C5.
#[derive(Default)]
struct Accumulator {
    errors: Vec<WebauthnError>,
}

impl Accumulator {
    fn push(&mut self, err: WebauthnError) {
        self.errors.push(err);
    }

    fn push_if_err<T>(&mut self, result: Result<T, WebauthnError>) -> Option<T> {
        match result {
            Ok(v) => Some(v),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn into_result<T>(self, ok: T) -> Result<T, Vec<WebauthnError>> {
        if self.errors.is_empty() {
            Ok(ok)
        } else {
            Err(self.errors)
        }
    }
}

/// How much the RP should trust a successfully-verified attestation.
#[derive(Debug, Clone)]
pub enum TrustType {
    /// Self/anonymous/uncertain attestation - no anchor to check.
    NoTrustworthy,
    /// The chain's root matched an entry's `attestationRootCertificates`.
    Trusted { metadata_entry: MetadataEntry },
    /// A chain was presented but its root is not in the registry.
    UnknownTrust,
}

#[derive(Debug, Clone)]
pub struct AttestationResult {
    pub credential_entry: CredentialEntry,
    pub trust: TrustType,
}

/// Classification of a received signature counter relative to the
/// stored one. `PotentiallyCloned` is a successful return value, not an
/// error - the caller decides policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCounterResult {
    Zero,
    Updated { received: u32 },
    PotentiallyCloned,
}

fn check_chain_validity(chain: &[x509::X509], now_unix: i64) -> Result<(), WebauthnError> {
    let now = Asn1Time::from_unix(now_unix).map_err(WebauthnError::OpenSSLError)?;
    for cert in chain {
        let after_start = cert
            .not_before()
            .compare(&now)
            .map_err(WebauthnError::OpenSSLError)?
            != std::cmp::Ordering::Greater;
        let before_end = cert
            .not_after()
            .compare(&now)
            .map_err(WebauthnError::OpenSSLError)?
            != std::cmp::Ordering::Less;
        if !(after_start && before_end) {
            return Err(WebauthnError::CertificateChainInvalid);
        }
    }
    Ok(())
}

fn leaf_subject_key_identifier(leaf: &x509::X509) -> Result<[u8; 20], WebauthnError> {
    let pkey = leaf.public_key().map_err(WebauthnError::OpenSSLError)?;
    let der = pkey.public_key_to_der().map_err(WebauthnError::OpenSSLError)?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&crate::crypto::compute_sha1(&der));
    Ok(out)
}

fn classify_trust(
    chain_result: &AttestationChain,
    auth_data_aaguid: Option<[u8; 16]>,
    registry: &MetadataRegistry,
) -> TrustType {
    let chain = match chain_result {
        AttestationChain::SelfAttestation | AttestationChain::Uncertain | AttestationChain::AnonCA => {
            return TrustType::NoTrustworthy;
        }
        AttestationChain::BasicX5C { chain } | AttestationChain::AttCAX5C { chain } => chain,
    };

    let identifier = match auth_data_aaguid {
        Some(aaguid) if aaguid != [0u8; 16] => AuthenticatorIdentifier::Aaguid(aaguid),
        _ => match leaf_subject_key_identifier(&chain[0]) {
            Ok(ski) => AuthenticatorIdentifier::SubjectKeyIdentifier(ski),
            Err(_) => return TrustType::UnknownTrust,
        },
    };

    let entry = match registry.lookup(&identifier) {
        Some(e) => e,
        None => return TrustType::UnknownTrust,
    };

    let root = match chain.last() {
        Some(r) => r,
        None => return TrustType::UnknownTrust,
    };
    let root_der = match root.to_der() {
        Ok(d) => d,
        Err(_) => return TrustType::UnknownTrust,
    };

    let matches = entry.attestation_root_certificates.iter().any(|candidate| {
        candidate
            .to_der()
            .map(|d| d == root_der)
            .unwrap_or(false)
    });

    if matches {
        TrustType::Trusted {
            metadata_entry: entry.clone(),
        }
    } else {
        TrustType::UnknownTrust
    }
}

/// [MODULE C4]: the registration (attestation) ceremony verifier. Runs
/// the full ordered check list against a freshly-received credential
/// and, on success, classifies the attestation's trust level against
/// the metadata registry.
#[allow(clippy::too_many_arguments)]
pub fn verify_registration_response(
    origin: &Url,
    rp_id_hash: &[u8; 32],
    registry: &MetadataRegistry,
    now_unix: i64,
    options: &PublicKeyCredentialCreationOptions,
    credential: &RegisterPublicKeyCredential,
    formats: &SupportedFormats,
) -> Result<AttestationResult, Vec<WebauthnError>> {
    let mut acc = Accumulator::default();

    let client_data = acc.push_if_err(CollectedClientData::parse(
        credential.response.client_data_json.as_ref(),
    ));

    if let Some(cd) = &client_data {
        if cd.type_ != CeremonyKind::Create {
            acc.push(WebauthnError::InvalidClientDataType);
        }
        if !memcmp::eq(&cd.challenge, options.challenge.as_ref()) {
            acc.push(WebauthnError::ChallengeMismatch);
        }
        if &cd.origin != origin {
            acc.push(WebauthnError::OriginMismatch);
        }
    }

    let attestation_object = acc.push_if_err(
        crate::proto::attestation_object::AttestationObject::parse(
            credential.response.attestation_object.as_ref(),
        ),
    );

    let auth_data = attestation_object.as_ref().map(|o| &o.auth_data);

    if let Some(ad) = auth_data {
        if &ad.rp_id_hash != rp_id_hash {
            acc.push(WebauthnError::RpIdHashMismatch);
        }
        if !ad.user_present() {
            acc.push(WebauthnError::UserNotPresent);
        }
        if options.user_verification == UserVerificationPolicy::Required && !ad.user_verified() {
            acc.push(WebauthnError::UserNotVerified);
        }
        if ad.attested_credential_data.is_none() {
            acc.push(WebauthnError::AttestedCredentialDataMissing);
        }
    }

    let acd = auth_data.and_then(|ad| ad.attested_credential_data.as_ref());

    let checked_key = acd.and_then(|acd| {
        acc.push_if_err(acd.credential_public_key.clone().check())
    });

    if let Some(key) = &checked_key {
        let allowed = options
            .pub_key_cred_params
            .iter()
            .any(|p| p.alg == key.algorithm().into());
        if !allowed {
            acc.push(WebauthnError::AlgorithmNotAllowed);
        }
    }

    let client_data_hash = client_data.as_ref().map(|cd| compute_sha256(&cd.raw));

    let trust = match (auth_data, &checked_key, &client_data_hash, &attestation_object) {
        (Some(ad), Some(key), Some(cdh), Some(obj)) => {
            let fmt = formats.get(&obj.fmt);
            match fmt {
                None => {
                    acc.push(WebauthnError::AttestationFormatUnknown(obj.fmt.clone()));
                    None
                }
                Some(f) => match f.verify(&obj.att_stmt, ad, key, cdh) {
                    Ok(chain) => {
                        if let AttestationChain::BasicX5C { chain } | AttestationChain::AttCAX5C { chain } = &chain {
                            if let Err(e) = check_chain_validity(chain, now_unix) {
                                acc.push(e);
                            }
                        }
                        let aaguid = acd.map(|a| a.aaguid);
                        Some(classify_trust(&chain, aaguid, registry))
                    }
                    Err(e) => {
                        acc.push(e);
                        None
                    }
                },
            }
        }
        _ => None,
    };

    let credential_entry = match (acd, &checked_key) {
        (Some(acd), Some(_)) => Some(CredentialEntry {
            credential_id: acd.credential_id.clone(),
            user_handle: options.user.id.as_ref().to_vec(),
            raw_public_key_bytes: acd.credential_public_key_bytes.clone(),
            sign_count: auth_data.map(|a| a.sign_count).unwrap_or(0),
            transports: credential.response.transports.clone(),
        }),
        _ => None,
    };

    match (credential_entry, trust) {
        (Some(credential_entry), Some(trust)) => acc.into_result(AttestationResult {
            credential_entry,
            trust,
        }),
        _ => {
            if acc.errors.is_empty() {
                acc.push(WebauthnError::AttestedCredentialDataMissing);
            }
            Err(acc.errors)
        }
    }
}

/// [MODULE C5]: the assertion (authentication) ceremony verifier. Runs
/// the full ordered check list and, on success, classifies the
/// received signature counter relative to the stored one.
#[allow(clippy::too_many_arguments)]
pub fn verify_assertion_response(
    origin: &Url,
    rp_id_hash: &[u8; 32],
    identified_user: Option<&[u8]>,
    entry: &CredentialEntry,
    options: &PublicKeyCredentialRequestOptions,
    credential: &PublicKeyCredential,
) -> Result<SignatureCounterResult, Vec<WebauthnError>> {
    let mut acc = Accumulator::default();

    if !options.allow_credentials.is_empty() {
        let allowed = options
            .allow_credentials
            .iter()
            .any(|d| d.id.as_ref() == credential.raw_id.as_ref());
        if !allowed {
            acc.push(WebauthnError::DisallowedCredential);
        }
    }

    let response_user_handle = credential.response.user_handle.as_ref().map(|h| h.as_ref());
    match (identified_user, response_user_handle) {
        (None, None) => acc.push(WebauthnError::CannotVerifyUserHandle),
        (Some(iu), Some(ru)) => {
            if iu != entry.user_handle.as_slice() || ru != entry.user_handle.as_slice() {
                acc.push(WebauthnError::IdentifiedUserHandleMismatch);
            }
        }
        (Some(iu), None) => {
            if iu != entry.user_handle.as_slice() {
                acc.push(WebauthnError::IdentifiedUserHandleMismatch);
            }
        }
        (None, Some(ru)) => {
            if ru != entry.user_handle.as_slice() {
                acc.push(WebauthnError::CredentialUserHandleMismatch);
            }
        }
    }

    let client_data = acc.push_if_err(CollectedClientData::parse(
        credential.response.client_data_json.as_ref(),
    ));
    if let Some(cd) = &client_data {
        if cd.type_ != CeremonyKind::Get {
            acc.push(WebauthnError::InvalidClientDataType);
        }
        if !memcmp::eq(&cd.challenge, options.challenge.as_ref()) {
            acc.push(WebauthnError::ChallengeMismatch);
        }
        if &cd.origin != origin {
            acc.push(WebauthnError::OriginMismatch);
        }
    }

    let auth_data = acc.push_if_err(crate::proto::auth_data::AuthenticatorData::parse(
        credential.response.authenticator_data.as_ref(),
    ));
    if let Some(ad) = &auth_data {
        if &ad.rp_id_hash != rp_id_hash {
            acc.push(WebauthnError::RpIdHashMismatch);
        }
        if !ad.user_present() {
            acc.push(WebauthnError::UserNotPresent);
        }
        if options.user_verification == UserVerificationPolicy::Required && !ad.user_verified() {
            acc.push(WebauthnError::UserNotVerified);
        }
    }

    let cose_value: Option<serde_cbor_2::Value> =
        acc.push_if_err(serde_cbor_2::from_slice(&entry.raw_public_key_bytes).map_err(|e| {
            WebauthnError::CoseKeyDecodeError(e.to_string())
        }));
    let checked_key = cose_value.and_then(|v| {
        acc.push_if_err(COSEKey::try_from(&v).and_then(COSEKey::check))
    });

    let signature_ok = match (&auth_data, &client_data, &checked_key) {
        (Some(ad), Some(cd), Some(key)) => {
            let client_data_hash = compute_sha256(&cd.raw);
            let mut verification_data = ad.raw.clone();
            verification_data.extend_from_slice(&client_data_hash);
            match key.verify_signature(credential.response.signature.as_ref(), &verification_data) {
                Ok(true) => true,
                Ok(false) => {
                    acc.push(WebauthnError::SignatureInvalid);
                    false
                }
                Err(e) => {
                    acc.push(e);
                    false
                }
            }
        }
        _ => false,
    };

    if !signature_ok {
        return Err(if acc.errors.is_empty() {
            vec![WebauthnError::SignatureInvalid]
        } else {
            acc.errors
        });
    }

    let received = auth_data.as_ref().map(|a| a.sign_count).unwrap_or(0);
    let counter_result = match (entry.sign_count, received) {
        (0, 0) => SignatureCounterResult::Zero,
        (stored, received) if received > stored => SignatureCounterResult::Updated { received },
        _ => SignatureCounterResult::PotentiallyCloned,
    };

    acc.into_result(counter_result)
}
