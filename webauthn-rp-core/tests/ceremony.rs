//! End-to-end registration/assertion scenarios driven directly at the
//! verifier level, bypassing any particular wrapper. Fixtures are built
//! by hand (CBOR maps, authenticator data byte layout, client-data JSON)
//! rather than captured off real hardware, with signatures produced at
//! runtime against a throwaway keypair so every assertion is a genuine
//! cryptographic check rather than a replay of a fixed byte string.

use std::collections::BTreeMap;

use base64::{engine::general_purpose, Engine as _};
use openssl::hash::MessageDigest;
use openssl::x509::extension::BasicConstraints;
use openssl::{asn1, bn, ec, nid, pkey, sign, x509};
use serde_cbor_2::Value as Cbor;
use url::Url;

use webauthn_rp_core::attestation::SupportedFormats;
use webauthn_rp_core::ceremony::{
    verify_assertion_response, verify_registration_response, SignatureCounterResult, TrustType,
};
use webauthn_rp_core::crypto::{compute_sha1, compute_sha256};
use webauthn_rp_core::metadata::registry::MetadataRegistry;
use webauthn_rp_core::metadata::{AuthenticatorAttestationType, MetadataEntry, StatusReport};
use webauthn_rp_core::proto::credential::{
    AuthenticatorAssertionResponseRaw, AuthenticatorAttestationResponseRaw, AuthenticatorIdentifier,
    CredentialEntry, PublicKeyCredential, RegisterPublicKeyCredential,
};
use webauthn_rp_core::proto::options::{
    AttestationConveyancePreference, PubKeyCredParam, PublicKeyCredentialCreationOptions,
    PublicKeyCredentialRequestOptions, RelyingParty, User, UserVerificationPolicy,
};

const RP_ID: &str = "example.com";
const ORIGIN: &str = "https://example.com";
const NOW_UNIX: i64 = 1_700_000_000;

fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

fn rp_id_hash() -> [u8; 32] {
    compute_sha256(RP_ID.as_bytes())
}

struct Es256Credential {
    key: ec::EcKey<pkey::Private>,
    cose_key_bytes: Vec<u8>,
}

fn generate_es256_credential() -> Es256Credential {
    let group = ec::EcGroup::from_curve_name(nid::Nid::X9_62_PRIME256V1).unwrap();
    let key = ec::EcKey::generate(&group).unwrap();

    let mut ctx = bn::BigNumContext::new().unwrap();
    let mut x = bn::BigNum::new().unwrap();
    let mut y = bn::BigNum::new().unwrap();
    key.public_key()
        .affine_coordinates_gfp(&group, &mut x, &mut y, &mut ctx)
        .unwrap();
    let x_bytes = x.to_vec_padded(32).unwrap();
    let y_bytes = y.to_vec_padded(32).unwrap();

    let mut m = BTreeMap::new();
    m.insert(Cbor::Integer(1), Cbor::Integer(2)); // kty: EC2
    m.insert(Cbor::Integer(3), Cbor::Integer(-7)); // alg: ES256
    m.insert(Cbor::Integer(-1), Cbor::Integer(1)); // crv: P-256
    m.insert(Cbor::Integer(-2), Cbor::Bytes(x_bytes));
    m.insert(Cbor::Integer(-3), Cbor::Bytes(y_bytes));
    let cose_key_bytes = serde_cbor_2::to_vec(&Cbor::Map(m)).unwrap();

    Es256Credential { key, cose_key_bytes }
}

fn sign_es256(key: &ec::EcKey<pkey::Private>, data: &[u8]) -> Vec<u8> {
    let pkey = pkey::PKey::from_ec_key(key.clone()).unwrap();
    let mut signer = sign::Signer::new(MessageDigest::sha256(), &pkey).unwrap();
    signer.update(data).unwrap();
    signer.sign_to_vec().unwrap()
}

/// Raw ANSI X9.62 point encoding (`0x04 || x || y`) for a P-256 key,
/// exactly what `attestation_object`-embedded COSE keys decode to.
fn x962_raw(key: &ec::EcKey<pkey::Private>) -> Vec<u8> {
    let group = ec::EcGroup::from_curve_name(nid::Nid::X9_62_PRIME256V1).unwrap();
    let mut ctx = bn::BigNumContext::new().unwrap();
    key.public_key()
        .to_bytes(&group, openssl::ec::PointConversionForm::UNCOMPRESSED, &mut ctx)
        .unwrap()
}

/// A self-signed leaf certificate meeting the packed/fido-u2f attestation
/// certificate profile: v3, subject C/O/OU="Authenticator Attestation"/CN,
/// non-CA basicConstraints.
fn build_attestation_cert(key: &ec::EcKey<pkey::Private>) -> x509::X509 {
    let pkey = pkey::PKey::from_ec_key(key.clone()).unwrap();

    let mut name_builder = x509::X509NameBuilder::new().unwrap();
    name_builder.append_entry_by_text("C", "US").unwrap();
    name_builder
        .append_entry_by_text("O", "Example Authenticator Vendor")
        .unwrap();
    name_builder
        .append_entry_by_text("OU", "Authenticator Attestation")
        .unwrap();
    name_builder.append_entry_by_text("CN", "Example Authenticator").unwrap();
    let name = name_builder.build();

    let mut builder = x509::X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    builder
        .set_serial_number(&bn::BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&pkey).unwrap();
    builder
        .set_not_before(&asn1::Asn1Time::from_unix(NOW_UNIX - 3600).unwrap())
        .unwrap();
    builder
        .set_not_after(&asn1::Asn1Time::from_unix(NOW_UNIX + 3600).unwrap())
        .unwrap();
    builder
        .append_extension(BasicConstraints::new().build().unwrap())
        .unwrap();
    builder.sign(&pkey, MessageDigest::sha256()).unwrap();
    builder.build()
}

fn auth_data_bytes(
    flags: u8,
    sign_count: u32,
    attested: Option<(&[u8; 16], &[u8], &[u8])>,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&rp_id_hash());
    out.push(flags);
    out.extend_from_slice(&sign_count.to_be_bytes());
    if let Some((aaguid, credential_id, cose_key_bytes)) = attested {
        out.extend_from_slice(aaguid);
        out.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        out.extend_from_slice(credential_id);
        out.extend_from_slice(cose_key_bytes);
    }
    out
}

fn attestation_object_bytes(fmt: &str, auth_data: &[u8], att_stmt: Cbor) -> Vec<u8> {
    let mut m = BTreeMap::new();
    m.insert(Cbor::Text("fmt".into()), Cbor::Text(fmt.into()));
    m.insert(Cbor::Text("authData".into()), Cbor::Bytes(auth_data.to_vec()));
    m.insert(Cbor::Text("attStmt".into()), att_stmt);
    serde_cbor_2::to_vec(&Cbor::Map(m)).unwrap()
}

fn client_data_json(ceremony_type: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    let challenge_b64 = general_purpose::URL_SAFE_NO_PAD.encode(challenge);
    serde_json::to_vec(&serde_json::json!({
        "type": ceremony_type,
        "challenge": challenge_b64,
        "origin": origin,
        "crossOrigin": false,
    }))
    .unwrap()
}

fn creation_options(challenge: &[u8]) -> PublicKeyCredentialCreationOptions {
    PublicKeyCredentialCreationOptions {
        rp: RelyingParty {
            id: RP_ID.into(),
            name: "Example".into(),
        },
        user: User {
            id: vec![9, 9, 9].into(),
            name: "alice".into(),
            display_name: "Alice".into(),
        },
        challenge: challenge.to_vec().into(),
        pub_key_cred_params: vec![PubKeyCredParam {
            type_: "public-key",
            alg: -7,
        }],
        exclude_credentials: vec![],
        attestation: AttestationConveyancePreference::None,
        user_verification: UserVerificationPolicy::Preferred,
        resident_key: None,
    }
}

fn request_options(challenge: &[u8]) -> PublicKeyCredentialRequestOptions {
    PublicKeyCredentialRequestOptions {
        rp_id: RP_ID.into(),
        challenge: challenge.to_vec().into(),
        allow_credentials: vec![],
        user_verification: UserVerificationPolicy::Preferred,
    }
}

const UP: u8 = 0b0000_0001;
const UV: u8 = 0b0000_0100;
const AT: u8 = 0b0100_0000;

#[test]
fn registration_with_none_attestation_succeeds_and_is_untrusted() {
    let cred = generate_es256_credential();
    let credential_id = vec![1, 2, 3, 4];
    let challenge = vec![7u8; 32];

    let auth_data = auth_data_bytes(
        UP | UV | AT,
        0,
        Some((&[0u8; 16], &credential_id, &cred.cose_key_bytes)),
    );
    let attestation_object = attestation_object_bytes("none", &auth_data, Cbor::Map(Default::default()));
    let client_data = client_data_json("webauthn.create", &challenge, ORIGIN);

    let request = RegisterPublicKeyCredential {
        id: "cred".into(),
        raw_id: credential_id.clone().into(),
        response: AuthenticatorAttestationResponseRaw {
            client_data_json: client_data.into(),
            attestation_object: attestation_object.into(),
            transports: vec![],
        },
        client_extension_results: serde_json::Value::Null,
    };

    let options = creation_options(&challenge);
    let registry = MetadataRegistry::default();
    let formats = SupportedFormats::all();

    let result = verify_registration_response(
        &origin(),
        &rp_id_hash(),
        &registry,
        NOW_UNIX,
        &options,
        &request,
        &formats,
    )
    .expect("registration should verify");

    assert_eq!(result.credential_entry.credential_id, credential_id);
    assert!(matches!(result.trust, TrustType::NoTrustworthy));
}

#[test]
fn registration_with_packed_self_attestation_succeeds() {
    let cred = generate_es256_credential();
    let credential_id = vec![5, 6, 7, 8];
    let challenge = vec![11u8; 32];

    let auth_data = auth_data_bytes(
        UP | UV | AT,
        0,
        Some((&[0u8; 16], &credential_id, &cred.cose_key_bytes)),
    );
    let client_data = client_data_json("webauthn.create", &challenge, ORIGIN);
    let client_data_hash = compute_sha256(&client_data);

    let mut verification_data = auth_data.clone();
    verification_data.extend_from_slice(&client_data_hash);
    let sig = sign_es256(&cred.key, &verification_data);

    let mut att_stmt = BTreeMap::new();
    att_stmt.insert(Cbor::Text("alg".into()), Cbor::Integer(-7));
    att_stmt.insert(Cbor::Text("sig".into()), Cbor::Bytes(sig));
    let attestation_object = attestation_object_bytes("packed", &auth_data, Cbor::Map(att_stmt));

    let request = RegisterPublicKeyCredential {
        id: "cred".into(),
        raw_id: credential_id.clone().into(),
        response: AuthenticatorAttestationResponseRaw {
            client_data_json: client_data.into(),
            attestation_object: attestation_object.into(),
            transports: vec![],
        },
        client_extension_results: serde_json::Value::Null,
    };

    let options = creation_options(&challenge);
    let registry = MetadataRegistry::default();
    let formats = SupportedFormats::all();

    let result = verify_registration_response(
        &origin(),
        &rp_id_hash(),
        &registry,
        NOW_UNIX,
        &options,
        &request,
        &formats,
    )
    .expect("self-attested packed registration should verify");

    assert!(matches!(result.trust, TrustType::NoTrustworthy));
}

#[test]
fn registration_with_packed_x5c_attestation_resolves_trusted_metadata() {
    let cred = generate_es256_credential();
    let attestation_key = {
        let group = ec::EcGroup::from_curve_name(nid::Nid::X9_62_PRIME256V1).unwrap();
        ec::EcKey::generate(&group).unwrap()
    };
    let leaf = build_attestation_cert(&attestation_key);
    let leaf_der = leaf.to_der().unwrap();

    let credential_id = vec![21, 22, 23, 24];
    let challenge = vec![13u8; 32];

    let auth_data = auth_data_bytes(
        UP | UV | AT,
        0,
        Some((&[0u8; 16], &credential_id, &cred.cose_key_bytes)),
    );
    let client_data = client_data_json("webauthn.create", &challenge, ORIGIN);
    let client_data_hash = compute_sha256(&client_data);

    let mut verification_data = auth_data.clone();
    verification_data.extend_from_slice(&client_data_hash);
    let sig = sign_es256(&attestation_key, &verification_data);

    let mut att_stmt = BTreeMap::new();
    att_stmt.insert(Cbor::Text("alg".into()), Cbor::Integer(-7));
    att_stmt.insert(Cbor::Text("sig".into()), Cbor::Bytes(sig));
    att_stmt.insert(
        Cbor::Text("x5c".into()),
        Cbor::Array(vec![Cbor::Bytes(leaf_der.clone())]),
    );
    let attestation_object = attestation_object_bytes("packed", &auth_data, Cbor::Map(att_stmt));

    let request = RegisterPublicKeyCredential {
        id: "cred".into(),
        raw_id: credential_id.clone().into(),
        response: AuthenticatorAttestationResponseRaw {
            client_data_json: client_data.into(),
            attestation_object: attestation_object.into(),
            transports: vec![],
        },
        client_extension_results: serde_json::Value::Null,
    };

    let leaf_pub_der = leaf.public_key().unwrap().public_key_to_der().unwrap();
    let leaf_ski = compute_sha1(&leaf_pub_der);
    let registry = MetadataRegistry::build(vec![MetadataEntry {
        identifier: AuthenticatorIdentifier::SubjectKeyIdentifier(leaf_ski),
        attestation_root_certificates: vec![leaf],
        description: "Example Authenticator".into(),
        attestation_types: vec![AuthenticatorAttestationType::BasicFull],
        status_reports: vec![StatusReport {
            status: "FIDO_CERTIFIED".into(),
            effective_date: None,
        }],
    }]);

    let options = creation_options(&challenge);
    let formats = SupportedFormats::all();

    let result = verify_registration_response(
        &origin(),
        &rp_id_hash(),
        &registry,
        NOW_UNIX,
        &options,
        &request,
        &formats,
    )
    .expect("x5c packed registration against a known root should verify");

    match result.trust {
        TrustType::Trusted { metadata_entry } => {
            assert_eq!(metadata_entry.description, "Example Authenticator");
        }
        other => panic!("expected Trusted, got {other:?}"),
    }
}

#[test]
fn registration_with_fido_u2f_attestation_succeeds() {
    let cred = generate_es256_credential();
    let attestation_key = {
        let group = ec::EcGroup::from_curve_name(nid::Nid::X9_62_PRIME256V1).unwrap();
        ec::EcKey::generate(&group).unwrap()
    };
    let leaf = build_attestation_cert(&attestation_key);
    let leaf_der = leaf.to_der().unwrap();

    let credential_id = vec![31, 32, 33, 34];
    let challenge = vec![17u8; 32];

    let auth_data = auth_data_bytes(
        UP | UV | AT,
        0,
        Some((&[0u8; 16], &credential_id, &cred.cose_key_bytes)),
    );
    let client_data = client_data_json("webauthn.create", &challenge, ORIGIN);
    let client_data_hash = compute_sha256(&client_data);

    let mut verification_data = vec![0x00u8];
    verification_data.extend_from_slice(&rp_id_hash());
    verification_data.extend_from_slice(&client_data_hash);
    verification_data.extend_from_slice(&credential_id);
    verification_data.extend_from_slice(&x962_raw(&cred.key));
    let sig = sign_es256(&attestation_key, &verification_data);

    let mut att_stmt = BTreeMap::new();
    att_stmt.insert(
        Cbor::Text("x5c".into()),
        Cbor::Array(vec![Cbor::Bytes(leaf_der)]),
    );
    att_stmt.insert(Cbor::Text("sig".into()), Cbor::Bytes(sig));
    let attestation_object = attestation_object_bytes("fido-u2f", &auth_data, Cbor::Map(att_stmt));

    let request = RegisterPublicKeyCredential {
        id: "cred".into(),
        raw_id: credential_id.clone().into(),
        response: AuthenticatorAttestationResponseRaw {
            client_data_json: client_data.into(),
            attestation_object: attestation_object.into(),
            transports: vec![],
        },
        client_extension_results: serde_json::Value::Null,
    };

    let options = creation_options(&challenge);
    let registry = MetadataRegistry::default();
    let formats = SupportedFormats::all();

    let result = verify_registration_response(
        &origin(),
        &rp_id_hash(),
        &registry,
        NOW_UNIX,
        &options,
        &request,
        &formats,
    )
    .expect("fido-u2f registration should verify");

    assert_eq!(result.credential_entry.credential_id, credential_id);
    assert!(matches!(result.trust, TrustType::UnknownTrust));
}

#[test]
fn registration_rejects_challenge_mismatch() {
    let cred = generate_es256_credential();
    let credential_id = vec![1, 1, 1, 1];
    let challenge = vec![1u8; 32];
    let wrong_challenge = vec![2u8; 32];

    let auth_data = auth_data_bytes(
        UP | UV | AT,
        0,
        Some((&[0u8; 16], &credential_id, &cred.cose_key_bytes)),
    );
    let attestation_object = attestation_object_bytes("none", &auth_data, Cbor::Map(Default::default()));
    let client_data = client_data_json("webauthn.create", &challenge, ORIGIN);

    let request = RegisterPublicKeyCredential {
        id: "cred".into(),
        raw_id: credential_id.into(),
        response: AuthenticatorAttestationResponseRaw {
            client_data_json: client_data.into(),
            attestation_object: attestation_object.into(),
            transports: vec![],
        },
        client_extension_results: serde_json::Value::Null,
    };

    let options = creation_options(&wrong_challenge);
    let registry = MetadataRegistry::default();
    let formats = SupportedFormats::all();

    let errors = verify_registration_response(
        &origin(),
        &rp_id_hash(),
        &registry,
        NOW_UNIX,
        &options,
        &request,
        &formats,
    )
    .expect_err("mismatched challenge must be rejected");

    assert!(errors
        .iter()
        .any(|e| matches!(e, webauthn_rp_core::error::WebauthnError::ChallengeMismatch)));
}

fn registered_entry(cred: &Es256Credential, credential_id: &[u8], sign_count: u32) -> CredentialEntry {
    CredentialEntry {
        credential_id: credential_id.to_vec(),
        user_handle: vec![9, 9, 9],
        raw_public_key_bytes: cred.cose_key_bytes.clone(),
        sign_count,
        transports: vec![],
    }
}

#[test]
fn assertion_round_trip_updates_sign_count() {
    let cred = generate_es256_credential();
    let credential_id = vec![2, 2, 2, 2];
    let challenge = vec![3u8; 32];
    let entry = registered_entry(&cred, &credential_id, 4);

    let auth_data = auth_data_bytes(UP | UV, 5, None);
    let client_data = client_data_json("webauthn.get", &challenge, ORIGIN);
    let client_data_hash = compute_sha256(&client_data);

    let mut verification_data = auth_data.clone();
    verification_data.extend_from_slice(&client_data_hash);
    let sig = sign_es256(&cred.key, &verification_data);

    let request = PublicKeyCredential {
        id: "cred".into(),
        raw_id: credential_id.into(),
        response: AuthenticatorAssertionResponseRaw {
            authenticator_data: auth_data.into(),
            client_data_json: client_data.into(),
            signature: sig.into(),
            user_handle: Some(vec![9, 9, 9].into()),
        },
        client_extension_results: serde_json::Value::Null,
    };

    let options = request_options(&challenge);

    let result = verify_assertion_response(
        &origin(),
        &rp_id_hash(),
        Some(&[9, 9, 9]),
        &entry,
        &options,
        &request,
    )
    .expect("valid assertion should verify");

    assert_eq!(result, SignatureCounterResult::Updated { received: 5 });
}

#[test]
fn assertion_flags_a_non_incrementing_counter_as_potentially_cloned() {
    let cred = generate_es256_credential();
    let credential_id = vec![4, 4, 4, 4];
    let challenge = vec![6u8; 32];
    let entry = registered_entry(&cred, &credential_id, 10);

    // received (3) is lower than stored (10) - a classic cloned-token signal.
    let auth_data = auth_data_bytes(UP | UV, 3, None);
    let client_data = client_data_json("webauthn.get", &challenge, ORIGIN);
    let client_data_hash = compute_sha256(&client_data);

    let mut verification_data = auth_data.clone();
    verification_data.extend_from_slice(&client_data_hash);
    let sig = sign_es256(&cred.key, &verification_data);

    let request = PublicKeyCredential {
        id: "cred".into(),
        raw_id: credential_id.into(),
        response: AuthenticatorAssertionResponseRaw {
            authenticator_data: auth_data.into(),
            client_data_json: client_data.into(),
            signature: sig.into(),
            user_handle: Some(vec![9, 9, 9].into()),
        },
        client_extension_results: serde_json::Value::Null,
    };

    let options = request_options(&challenge);

    let result = verify_assertion_response(
        &origin(),
        &rp_id_hash(),
        Some(&[9, 9, 9]),
        &entry,
        &options,
        &request,
    )
    .expect("signature itself is valid, only the counter is suspicious");

    assert_eq!(result, SignatureCounterResult::PotentiallyCloned);
}

#[test]
fn assertion_rejects_tampered_signature() {
    let cred = generate_es256_credential();
    let credential_id = vec![8, 8, 8, 8];
    let challenge = vec![9u8; 32];
    let entry = registered_entry(&cred, &credential_id, 0);

    let auth_data = auth_data_bytes(UP | UV, 1, None);
    let client_data = client_data_json("webauthn.get", &challenge, ORIGIN);
    let client_data_hash = compute_sha256(&client_data);

    let mut verification_data = auth_data.clone();
    verification_data.extend_from_slice(&client_data_hash);
    let mut sig = sign_es256(&cred.key, &verification_data);
    let last = sig.len() - 1;
    sig[last] ^= 0xFF;

    let request = PublicKeyCredential {
        id: "cred".into(),
        raw_id: credential_id.into(),
        response: AuthenticatorAssertionResponseRaw {
            authenticator_data: auth_data.into(),
            client_data_json: client_data.into(),
            signature: sig.into(),
            user_handle: Some(vec![9, 9, 9].into()),
        },
        client_extension_results: serde_json::Value::Null,
    };

    let options = request_options(&challenge);

    let errors = verify_assertion_response(
        &origin(),
        &rp_id_hash(),
        Some(&[9, 9, 9]),
        &entry,
        &options,
        &request,
    )
    .expect_err("tampered signature must be rejected");

    assert!(errors
        .iter()
        .any(|e| matches!(e, webauthn_rp_core::error::WebauthnError::SignatureInvalid)));
}
