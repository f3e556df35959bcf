//! COSE key and algorithm identifiers (RFC 8152), and the unchecked/checked
//! public key split described for [MODULE C1].
//!
//! An [`UncheckedPublicKey`] is whatever shape was decoded off the wire. It
//! becomes a [`PublicKey`] only after [`UncheckedPublicKey::check`] confirms
//! the key is structurally sound for its curve/modulus size - only a
//! [`PublicKey`] may be handed to [`crate::crypto::verify_signature`].

use core::convert::TryFrom;
use serde::{Deserialize, Serialize};

use crate::error::WebauthnError;

/// A COSE signature algorithm identifier (`alg`, label 3).
///
/// This carries both the signature scheme and the hash used alongside the
/// key; callers never need to separately pick a hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(non_camel_case_types)]
pub enum COSEAlgorithm {
    /// EdDSA over Ed25519.
    EDDSA,
    /// ECDSA over P-256 with SHA-256.
    ES256,
    /// ECDSA over P-384 with SHA-384.
    ES384,
    /// ECDSA over P-521 with SHA-512.
    ES512,
    /// RSASSA-PSS with SHA-256.
    PS256,
    /// RSASSA-PSS with SHA-384.
    PS384,
    /// RSASSA-PSS with SHA-512.
    PS512,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    RS256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    RS384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    RS512,
    /// RSASSA-PKCS1-v1_5 with SHA-1. Never accepted for verification;
    /// kept only so we can reject it with a specific error.
    INSECURE_RS1,
}

impl COSEAlgorithm {
    /// The set of algorithms this crate considers acceptable to *offer* in
    /// `pubKeyCredParams` during registration. `INSECURE_RS1` is never
    /// included.
    pub fn secure_algs() -> Vec<COSEAlgorithm> {
        vec![
            COSEAlgorithm::ES256,
            COSEAlgorithm::ES384,
            COSEAlgorithm::ES512,
            COSEAlgorithm::EDDSA,
            COSEAlgorithm::PS256,
            COSEAlgorithm::PS384,
            COSEAlgorithm::PS512,
            COSEAlgorithm::RS256,
            COSEAlgorithm::RS384,
            COSEAlgorithm::RS512,
        ]
    }
}

impl TryFrom<i128> for COSEAlgorithm {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            -8 => Ok(COSEAlgorithm::EDDSA),
            -7 => Ok(COSEAlgorithm::ES256),
            -35 => Ok(COSEAlgorithm::ES384),
            -36 => Ok(COSEAlgorithm::ES512),
            -37 => Ok(COSEAlgorithm::PS256),
            -38 => Ok(COSEAlgorithm::PS384),
            -39 => Ok(COSEAlgorithm::PS512),
            -257 => Ok(COSEAlgorithm::RS256),
            -258 => Ok(COSEAlgorithm::RS384),
            -259 => Ok(COSEAlgorithm::RS512),
            -65535 => Ok(COSEAlgorithm::INSECURE_RS1),
            _ => Err(WebauthnError::COSEKeyInvalidAlgorithm),
        }
    }
}

impl From<COSEAlgorithm> for i128 {
    fn from(a: COSEAlgorithm) -> i128 {
        match a {
            COSEAlgorithm::EDDSA => -8,
            COSEAlgorithm::ES256 => -7,
            COSEAlgorithm::ES384 => -35,
            COSEAlgorithm::ES512 => -36,
            COSEAlgorithm::PS256 => -37,
            COSEAlgorithm::PS384 => -38,
            COSEAlgorithm::PS512 => -39,
            COSEAlgorithm::RS256 => -257,
            COSEAlgorithm::RS384 => -258,
            COSEAlgorithm::RS512 => -259,
            COSEAlgorithm::INSECURE_RS1 => -65535,
        }
    }
}

/// COSE key type identifier (`kty`, label 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum COSEKeyTypeId {
    /// Octet key pair - used for EdDSA.
    EC_OKP = 1,
    /// Elliptic curve key with x/y coordinates - used for ECDSA.
    EC_EC2 = 2,
    /// RSA key with modulus/exponent.
    EC_RSA = 3,
}

/// Named ECDSA curves this crate accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ECDSACurve {
    SECP256R1,
    SECP384R1,
    SECP521R1,
}

impl ECDSACurve {
    /// Coordinate byte length for this curve.
    pub fn coordinate_size(&self) -> usize {
        match self {
            ECDSACurve::SECP256R1 => 32,
            ECDSACurve::SECP384R1 => 48,
            ECDSACurve::SECP521R1 => 66,
        }
    }
}

impl TryFrom<i128> for ECDSACurve {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            1 => Ok(ECDSACurve::SECP256R1),
            2 => Ok(ECDSACurve::SECP384R1),
            3 => Ok(ECDSACurve::SECP521R1),
            _ => Err(WebauthnError::COSEKeyInvalidCBORValue),
        }
    }
}

/// Named EdDSA curves this crate accepts. Only Ed25519 is in real use on
/// the web today; Ed448 is listed for completeness but never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EDDSACurve {
    ED25519,
    ED448,
}

impl EDDSACurve {
    /// Expected public-key byte length for this curve.
    pub fn key_size(&self) -> usize {
        match self {
            EDDSACurve::ED25519 => 32,
            EDDSACurve::ED448 => 57,
        }
    }
}

impl TryFrom<i128> for EDDSACurve {
    type Error = WebauthnError;
    fn try_from(i: i128) -> Result<Self, Self::Error> {
        match i {
            6 => Ok(EDDSACurve::ED25519),
            7 => Ok(EDDSACurve::ED448),
            _ => Err(WebauthnError::COSEKeyInvalidCBORValue),
        }
    }
}

/// A byte buffer that compares/clones cheaply and serialises as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoseBytes(#[serde(with = "serde_bytes")] pub Vec<u8>);

impl From<Vec<u8>> for CoseBytes {
    fn from(v: Vec<u8>) -> Self {
        CoseBytes(v)
    }
}

impl AsRef<[u8]> for CoseBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// `kty = EC2` key material: x/y big-endian unsigned coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEEC2Key {
    pub curve: ECDSACurve,
    pub x: CoseBytes,
    pub y: CoseBytes,
}

/// `kty = OKP` key material: raw Ed25519/Ed448 public key bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEOKPKey {
    pub curve: EDDSACurve,
    pub x: CoseBytes,
}

/// `kty = RSA` key material: big-endian unsigned modulus/exponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSERSAKey {
    pub n: CoseBytes,
    pub e: CoseBytes,
}

/// The decoded COSE key body, tagged by key type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum COSEKeyType {
    EC_EC2(COSEEC2Key),
    EC_OKP(COSEOKPKey),
    RSA(COSERSAKey),
}

/// A COSE_Key as decoded off the wire - not yet structurally validated.
///
/// This may describe a point not on its curve, an RSA modulus below the
/// minimum bit length, or an EdDSA key of the wrong length. Call
/// [`COSEKey::check`] before using it for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct COSEKey {
    pub type_: COSEAlgorithm,
    pub key: COSEKeyType,
}

/// A [`COSEKey`] that has passed [`COSEKey::check`]. Only this type may be
/// used to verify a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(pub(crate) COSEKey);

impl PublicKey {
    /// The algorithm this key was checked for.
    pub fn algorithm(&self) -> COSEAlgorithm {
        self.0.type_
    }

    /// Borrow the checked key's inner representation.
    pub fn inner(&self) -> &COSEKey {
        &self.0
    }
}
