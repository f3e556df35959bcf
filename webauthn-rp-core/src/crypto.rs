//! Cryptographic operation wrapper for the verification core. This module
//! exists to allow ease of auditing, safe operation wrappers, and
//! cryptographic provider abstraction. This module currently uses OpenSSL
//! as the cryptographic primitive provider.

#![allow(non_camel_case_types)]

use core::convert::TryFrom;
use openssl::{bn, ec, hash, nid, pkey, rsa, sha, sign, x509};
use x509_parser::x509::X509Version;

use crate::attestation::{AttestationX509Extension, FidoGenCeAaguid};
use crate::error::{WebauthnError, WebauthnResult};
use crate::internals::{
    cbor_try_bytes, cbor_try_i128, cbor_try_map, tpm_device_attribute_parser, TpmVendor,
};
use crate::proto::cose::{
    COSEAlgorithm, COSEEC2Key, COSEKey, COSEKeyType, COSEKeyTypeId, COSEOKPKey, COSERSAKey,
    ECDSACurve, EDDSACurve, PublicKey,
};

// Why OpenSSL over another rust crate?
// - it lets us reconstruct a public key directly from x/y affine
//   coordinates, which is exactly the shape COSE_Key EC2 keys arrive in.
//   Most pure-rust ECDSA crates want a pre-packaged SEC1/PKCS8 structure
//   instead, which would mean an extra re-encoding step per verification.

fn openssl_digest(alg: COSEAlgorithm) -> WebauthnResult<hash::MessageDigest> {
    match alg {
        COSEAlgorithm::ES256 | COSEAlgorithm::RS256 | COSEAlgorithm::PS256 => {
            Ok(hash::MessageDigest::sha256())
        }
        COSEAlgorithm::ES384 | COSEAlgorithm::RS384 | COSEAlgorithm::PS384 => {
            Ok(hash::MessageDigest::sha384())
        }
        COSEAlgorithm::ES512 | COSEAlgorithm::RS512 | COSEAlgorithm::PS512 => {
            Ok(hash::MessageDigest::sha512())
        }
        COSEAlgorithm::EDDSA => {
            // EdDSA (pure Ed25519) applies SHA-512 internally as part of
            // the signing equation; openssl's EdDSA verifier takes no
            // digest at all and must not be given one.
            Err(WebauthnError::COSEKeyInvalidType)
        }
        COSEAlgorithm::INSECURE_RS1 => {
            warn!("INSECURE SHA1 USAGE DETECTED");
            Err(WebauthnError::CredentialInsecureCryptography)
        }
    }
}

fn pkey_verify_signature(
    pkey: &pkey::PKeyRef<pkey::Public>,
    stype: COSEAlgorithm,
    signature: &[u8],
    verification_data: &[u8],
) -> WebauthnResult<bool> {
    if stype == COSEAlgorithm::EDDSA {
        let mut verifier =
            sign::Verifier::new_without_digest(pkey).map_err(WebauthnError::OpenSSLError)?;
        return verifier
            .verify_oneshot(signature, verification_data)
            .map_err(WebauthnError::OpenSSLError);
    }

    let digest = openssl_digest(stype)?;
    let mut verifier = sign::Verifier::new(digest, pkey).map_err(WebauthnError::OpenSSLError)?;

    match stype {
        COSEAlgorithm::PS256 | COSEAlgorithm::PS384 | COSEAlgorithm::PS512 => {
            verifier
                .set_rsa_padding(rsa::Padding::PKCS1_PSS)
                .map_err(WebauthnError::OpenSSLError)?;
            verifier
                .set_rsa_pss_saltlen(sign::RsaPssSaltlen::custom(digest.size() as i32))
                .map_err(WebauthnError::OpenSSLError)?;
        }
        COSEAlgorithm::RS256 | COSEAlgorithm::RS384 | COSEAlgorithm::RS512 => {
            verifier
                .set_rsa_padding(rsa::Padding::PKCS1)
                .map_err(WebauthnError::OpenSSLError)?;
        }
        _ => {}
    }

    verifier
        .update(verification_data)
        .map_err(WebauthnError::OpenSSLError)?;
    verifier
        .verify(signature)
        .map_err(WebauthnError::OpenSSLError)
}

/// Validate an x509-certificate-carried signature against the supplied data.
/// Used by every attestation format that signs via a leaf certificate
/// (packed x5c, fido-u2f, android-key, apple) rather than a bare COSE key.
pub fn verify_signature(
    alg: COSEAlgorithm,
    pubk: &x509::X509,
    signature: &[u8],
    verification_data: &[u8],
) -> WebauthnResult<bool> {
    let pkey = pubk.public_key().map_err(WebauthnError::OpenSSLError)?;
    pkey_verify_signature(&pkey, alg, signature, verification_data)
}

fn check_extension<T, F>(
    extension: &Result<Option<T>, x509_parser::error::X509Error>,
    must_be_present: bool,
    f: F,
) -> WebauthnResult<()>
where
    F: Fn(&T) -> bool,
{
    match extension {
        Ok(Some(extension)) => {
            if f(extension) {
                Ok(())
            } else {
                trace!("custom extension check failed");
                Err(WebauthnError::AttestationCertificateRequirementsNotMet)
            }
        }
        Ok(None) => {
            if must_be_present {
                trace!("extension not present");
                Err(WebauthnError::AttestationCertificateRequirementsNotMet)
            } else {
                Ok(())
            }
        }
        Err(_) => {
            debug!("extension present multiple times or invalid");
            Err(WebauthnError::AttestationCertificateRequirementsNotMet)
        }
    }
}

struct TpmSanData<'a> {
    pub manufacturer: &'a str,
    pub _model: &'a str,
    pub _version: &'a str,
}

#[derive(Default)]
struct TpmSanDataBuilder<'a> {
    manufacturer: Option<&'a str>,
    model: Option<&'a str>,
    version: Option<&'a str>,
}

impl<'a> TpmSanDataBuilder<'a> {
    pub(crate) fn new() -> Self {
        Default::default()
    }

    pub(crate) fn manufacturer(mut self, value: &'a str) -> Self {
        self.manufacturer = Some(value);
        self
    }

    pub(crate) fn model(mut self, value: &'a str) -> Self {
        self.model = Some(value);
        self
    }

    pub(crate) fn version(mut self, value: &'a str) -> Self {
        self.version = Some(value);
        self
    }

    pub(crate) fn build(self) -> WebauthnResult<TpmSanData<'a>> {
        self.manufacturer
            .zip(self.model)
            .zip(self.version)
            .map(|((manufacturer, model), version)| TpmSanData {
                manufacturer,
                _model: model,
                _version: version,
            })
            .ok_or(WebauthnError::AttestationCertificateRequirementsNotMet)
    }
}

pub(crate) const TCG_AT_TPM_MANUFACTURER_RAW: &[u8] = &der_parser::oid!(raw 2.23.133 .2 .1);
pub(crate) const TCG_AT_TPM_MODEL_RAW: &[u8] = &der_parser::oid!(raw 2.23.133 .2 .2);
pub(crate) const TCG_AT_TPM_VERSION_RAW: &[u8] = &der_parser::oid!(raw 2.23.133 .2 .3);

impl<'a> TryFrom<&'a x509_parser::x509::X509Name<'a>> for TpmSanData<'a> {
    type Error = WebauthnError;

    fn try_from(x509_name: &'a x509_parser::x509::X509Name<'a>) -> Result<Self, Self::Error> {
        x509_name
            .iter_attributes()
            .try_fold(TpmSanDataBuilder::new(), |builder, attribute| {
                Ok(match attribute.attr_type().as_bytes() {
                    TCG_AT_TPM_MANUFACTURER_RAW => {
                        builder.manufacturer(attribute.attr_value().as_str()?)
                    }
                    TCG_AT_TPM_MODEL_RAW => builder.model(attribute.attr_value().as_str()?),
                    TCG_AT_TPM_VERSION_RAW => builder.version(attribute.attr_value().as_str()?),
                    _ => builder,
                })
            })
            .map_err(|_: der_parser::error::Error| WebauthnError::ParseNOMFailure)
            .and_then(TpmSanDataBuilder::build)
    }
}

/// Verify that `attestnCert` meets the requirements of the TPM attestation
/// statement format's certificate profile.
pub(crate) fn assert_tpm_attest_req(x509: &x509::X509) -> WebauthnResult<()> {
    let der_bytes = x509.to_der().map_err(WebauthnError::OpenSSLError)?;
    let x509_cert = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?
        .1;

    if x509_cert.version != X509Version::V3 {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    let subject_name_ref = x509.subject_name();
    if subject_name_ref.entries().count() != 0 {
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    check_extension(
        &x509_cert.subject_alternative_name(),
        true,
        |subject_alternative_name| {
            if !subject_alternative_name.critical {
                return false;
            };

            subject_alternative_name
                .value
                .general_names
                .iter()
                .any(|general_name| {
                    if let x509_parser::extensions::GeneralName::DirectoryName(x509_name) =
                        general_name
                    {
                        TpmSanData::try_from(x509_name)
                            .and_then(|san_data| {
                                tpm_device_attribute_parser(san_data.manufacturer.as_bytes())
                            })
                            .and_then(|manufacturer_bytes| {
                                TpmVendor::try_from(manufacturer_bytes.as_slice())
                            })
                            .is_ok()
                    } else {
                        false
                    }
                })
        },
    )?;

    check_extension(
        &x509_cert.extended_key_usage(),
        true,
        |extended_key_usage| {
            extended_key_usage
                .value
                .other
                .contains(&der_parser::oid!(2.23.133 .8 .3))
        },
    )?;

    check_extension(&x509_cert.basic_constraints(), true, |basic_constraints| {
        !basic_constraints.value.ca
    })?;

    Ok(())
}

/// Verify that `attestnCert` meets the requirements in [§ 8.2.1 Packed
/// Attestation Statement Certificate Requirements][0].
///
/// [0]: https://www.w3.org/TR/webauthn-2/#sctn-packed-attestation-cert-requirements
pub(crate) fn assert_packed_attest_req(pubk: &x509::X509) -> WebauthnResult<()> {
    let der_bytes = pubk.to_der().map_err(WebauthnError::OpenSSLError)?;
    let x509_cert = x509_parser::parse_x509_certificate(&der_bytes)
        .map_err(|_| WebauthnError::AttestationStatementX5CInvalid)?
        .1;

    if x509_cert.version != X509Version::V3 {
        trace!("x509 version != v3");
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    let subject = &x509_cert.subject;

    let subject_c = subject.iter_country().take(1).next();
    let subject_o = subject.iter_organization().take(1).next();
    let subject_ou = subject.iter_organizational_unit().take(1).next();
    let subject_cn = subject.iter_common_name().take(1).next();

    if subject_c.is_none() || subject_o.is_none() || subject_cn.is_none() {
        trace!("invalid subject details");
        return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
    }

    match subject_ou {
        Some(ou) => match ou.attr_value().as_str() {
            Ok(ou_d) => {
                if ou_d != "Authenticator Attestation" {
                    trace!("ou != Authenticator Attestation");
                    return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
                }
            }
            Err(_) => {
                trace!("ou invalid");
                return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
            }
        },
        None => {
            trace!("ou not found");
            return Err(WebauthnError::AttestationCertificateRequirementsNotMet);
        }
    }

    // If the attestation root is shared by multiple authenticator models,
    // id-fido-gen-ce-aaguid MUST be present but MUST NOT be critical. The
    // AAGUID value itself is cross-checked against authData elsewhere.
    check_extension(
        &x509_cert.get_extension_unique(&FidoGenCeAaguid::OID),
        false,
        |fido_gen_ce_aaguid| !fido_gen_ce_aaguid.critical,
    )?;

    check_extension(&x509_cert.basic_constraints(), true, |basic_constraints| {
        !basic_constraints.value.ca
    })?;

    Ok(())
}

impl TryFrom<nid::Nid> for ECDSACurve {
    type Error = WebauthnError;
    fn try_from(nid: nid::Nid) -> Result<Self, Self::Error> {
        match nid {
            nid::Nid::X9_62_PRIME256V1 => Ok(ECDSACurve::SECP256R1),
            nid::Nid::SECP384R1 => Ok(ECDSACurve::SECP384R1),
            nid::Nid::SECP521R1 => Ok(ECDSACurve::SECP521R1),
            _ => Err(WebauthnError::ECDSACurveInvalidNid),
        }
    }
}

impl ECDSACurve {
    fn to_openssl_nid(self) -> nid::Nid {
        match self {
            ECDSACurve::SECP256R1 => nid::Nid::X9_62_PRIME256V1,
            ECDSACurve::SECP384R1 => nid::Nid::SECP384R1,
            ECDSACurve::SECP521R1 => nid::Nid::SECP521R1,
        }
    }
}

impl TryFrom<&serde_cbor_2::Value> for COSEKey {
    type Error = WebauthnError;
    fn try_from(d: &serde_cbor_2::Value) -> Result<COSEKey, Self::Error> {
        let m = cbor_try_map!(d)?;

        // See also https://tools.ietf.org/html/rfc8152#section-3.1
        let key_type_value = m
            .get(&serde_cbor_2::Value::Integer(1))
            .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
        let key_type = cbor_try_i128!(key_type_value)?;

        let content_type_value = m
            .get(&serde_cbor_2::Value::Integer(3))
            .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
        let content_type = cbor_try_i128!(content_type_value)?;

        let type_ = COSEAlgorithm::try_from(content_type)
            .map_err(|_| WebauthnError::COSEKeyInvalidAlgorithm)?;

        if key_type == (COSEKeyTypeId::EC_EC2 as i128)
            && matches!(
                type_,
                COSEAlgorithm::ES256 | COSEAlgorithm::ES384 | COSEAlgorithm::ES512
            )
        {
            let curve_type_value = m
                .get(&serde_cbor_2::Value::Integer(-1))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let curve_type = cbor_try_i128!(curve_type_value)?;
            let curve = ECDSACurve::try_from(curve_type)?;

            let x_value = m
                .get(&serde_cbor_2::Value::Integer(-2))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let x = cbor_try_bytes!(x_value)?;

            let y_value = m
                .get(&serde_cbor_2::Value::Integer(-3))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let y = cbor_try_bytes!(y_value)?;

            let coord_len = curve.coordinate_size();
            if x.len() != coord_len || y.len() != coord_len {
                return Err(WebauthnError::COSEKeyECDSAXYInvalid);
            }

            Ok(COSEKey {
                type_,
                key: COSEKeyType::EC_EC2(COSEEC2Key {
                    curve,
                    x: x.to_vec().into(),
                    y: y.to_vec().into(),
                }),
            })
        } else if key_type == (COSEKeyTypeId::EC_RSA as i128)
            && matches!(
                type_,
                COSEAlgorithm::RS256
                    | COSEAlgorithm::RS384
                    | COSEAlgorithm::RS512
                    | COSEAlgorithm::PS256
                    | COSEAlgorithm::PS384
                    | COSEAlgorithm::PS512
            )
        {
            let n_value = m
                .get(&serde_cbor_2::Value::Integer(-1))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let n = cbor_try_bytes!(n_value)?;

            let e_value = m
                .get(&serde_cbor_2::Value::Integer(-2))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let e = cbor_try_bytes!(e_value)?;

            Ok(COSEKey {
                type_,
                key: COSEKeyType::RSA(COSERSAKey {
                    n: n.to_vec().into(),
                    e: e.to_vec().into(),
                }),
            })
        } else if key_type == (COSEKeyTypeId::EC_OKP as i128) && type_ == COSEAlgorithm::EDDSA {
            let curve_type_value = m
                .get(&serde_cbor_2::Value::Integer(-1))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let curve_type = cbor_try_i128!(curve_type_value)?;
            let curve = EDDSACurve::try_from(curve_type)?;

            let x_value = m
                .get(&serde_cbor_2::Value::Integer(-2))
                .ok_or(WebauthnError::COSEKeyInvalidCBORValue)?;
            let x = cbor_try_bytes!(x_value)?;

            Ok(COSEKey {
                type_,
                key: COSEKeyType::EC_OKP(COSEOKPKey {
                    curve,
                    x: x.to_vec().into(),
                }),
            })
        } else {
            debug!(?key_type, "COSE key type/algorithm combination is invalid");
            Err(WebauthnError::COSEKeyInvalidType)
        }
    }
}

impl COSEKey {
    /// Structurally validate this key and, if sound, return the
    /// [`PublicKey`] wrapper that permits signature verification.
    ///
    /// - EdDSA: `|x|` must equal the curve's expected public key size.
    /// - ECDSA: `(x, y)` must be a valid point on the named curve.
    /// - RSA: modulus must be at least 2048 bits and the exponent odd
    ///   and greater than one.
    pub fn check(self) -> WebauthnResult<PublicKey> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let curve = ec2k.curve.to_openssl_nid();
                let ec_group =
                    ec::EcGroup::from_curve_name(curve).map_err(WebauthnError::OpenSSLError)?;

                let xbn =
                    bn::BigNum::from_slice(ec2k.x.as_ref()).map_err(WebauthnError::OpenSSLError)?;
                let ybn =
                    bn::BigNum::from_slice(ec2k.y.as_ref()).map_err(WebauthnError::OpenSSLError)?;

                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)
                    .map_err(|_| WebauthnError::InvalidKeyShape {
                        reason: "point is not on the named curve".into(),
                    })?;

                ec_key
                    .check_key()
                    .map_err(|_| WebauthnError::InvalidKeyShape {
                        reason: "point is not on the named curve".into(),
                    })?;
            }
            COSEKeyType::RSA(rsak) => {
                let nbn =
                    bn::BigNum::from_slice(rsak.n.as_ref()).map_err(WebauthnError::OpenSSLError)?;
                let ebn =
                    bn::BigNum::from_slice(rsak.e.as_ref()).map_err(WebauthnError::OpenSSLError)?;

                if nbn.num_bits() < 2048 {
                    return Err(WebauthnError::InvalidKeyShape {
                        reason: "RSA modulus is below the 2048-bit minimum".into(),
                    });
                }
                let odd_and_gt_one = ebn
                    .to_dec_str()
                    .ok()
                    .and_then(|s| s.parse::<u128>().ok())
                    .map(|e| e > 1 && e % 2 == 1)
                    .unwrap_or(false);
                if !odd_and_gt_one {
                    return Err(WebauthnError::InvalidKeyShape {
                        reason: "RSA exponent must be odd and greater than one".into(),
                    });
                }

                rsa::Rsa::from_public_components(nbn, ebn).map_err(WebauthnError::OpenSSLError)?;
            }
            COSEKeyType::EC_OKP(edk) => {
                if edk.x.as_ref().len() != edk.curve.key_size() {
                    return Err(WebauthnError::InvalidKeyShape {
                        reason: "EdDSA public key length does not match the curve".into(),
                    });
                }
            }
        }
        Ok(PublicKey(self))
    }

    /// Reconstruct the 0x04||x||y ANSI X9.62 uncompressed point encoding
    /// used by the `fido-u2f` attestation format's signed bytes.
    pub(crate) fn get_alg_key_ecc_x962_raw(&self) -> WebauthnResult<Vec<u8>> {
        match &self.key {
            COSEKeyType::EC_EC2(ecpk) => {
                let r: [u8; 1] = [0x04];
                Ok(r.iter()
                    .chain(ecpk.x.0.iter())
                    .chain(ecpk.y.0.iter())
                    .copied()
                    .collect())
            }
            _ => {
                debug!("get_alg_key_ecc_x962_raw called on a non-EC2 key");
                Err(WebauthnError::COSEKeyInvalidType)
            }
        }
    }

    fn get_openssl_pkey(&self) -> WebauthnResult<pkey::PKey<pkey::Public>> {
        match &self.key {
            COSEKeyType::EC_EC2(ec2k) => {
                let curve = ec2k.curve.to_openssl_nid();
                let ec_group =
                    ec::EcGroup::from_curve_name(curve).map_err(WebauthnError::OpenSSLError)?;
                let xbn =
                    bn::BigNum::from_slice(ec2k.x.as_ref()).map_err(WebauthnError::OpenSSLError)?;
                let ybn =
                    bn::BigNum::from_slice(ec2k.y.as_ref()).map_err(WebauthnError::OpenSSLError)?;
                let ec_key = ec::EcKey::from_public_key_affine_coordinates(&ec_group, &xbn, &ybn)
                    .map_err(WebauthnError::OpenSSLError)?;
                ec_key.check_key().map_err(WebauthnError::OpenSSLError)?;
                pkey::PKey::from_ec_key(ec_key).map_err(WebauthnError::OpenSSLError)
            }
            COSEKeyType::RSA(rsak) => {
                let nbn =
                    bn::BigNum::from_slice(rsak.n.as_ref()).map_err(WebauthnError::OpenSSLError)?;
                let ebn =
                    bn::BigNum::from_slice(rsak.e.as_ref()).map_err(WebauthnError::OpenSSLError)?;
                let rsa_key = rsa::Rsa::from_public_components(nbn, ebn)
                    .map_err(WebauthnError::OpenSSLError)?;
                pkey::PKey::from_rsa(rsa_key).map_err(WebauthnError::OpenSSLError)
            }
            COSEKeyType::EC_OKP(edk) => {
                pkey::PKey::public_key_from_raw_bytes(edk.x.as_ref(), pkey::Id::ED25519)
                    .map_err(WebauthnError::OpenSSLError)
            }
        }
    }
}

impl PublicKey {
    /// Reconstruct the ANSI X9.62 uncompressed-point encoding of this key
    /// (fido-u2f signed bytes only make sense for EC2 keys).
    pub fn get_alg_key_ecc_x962_raw(&self) -> WebauthnResult<Vec<u8>> {
        self.0.get_alg_key_ecc_x962_raw()
    }

    /// Verify that `signature` is a valid signature by this key over
    /// `verification_data`. Never raises on a bad signature - returns
    /// `Ok(false)`.
    pub fn verify_signature(
        &self,
        signature: &[u8],
        verification_data: &[u8],
    ) -> WebauthnResult<bool> {
        let pkey = self.0.get_openssl_pkey()?;
        pkey_verify_signature(&pkey, self.0.type_, signature, verification_data)
    }
}

/// Compute the SHA-256 of a slice of data.
pub fn compute_sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = sha::Sha256::new();
    hasher.update(data);
    hasher.finish()
}

/// Compute the SHA-1 of a slice of data - used only for the FIDO-U2F
/// Subject Key Identifier authenticator-identifier form.
pub fn compute_sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = sha::Sha1::new();
    hasher.update(data);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use super::*;
    use crate::proto::cose::COSEKeyType;
    use hex_literal::hex;
    use serde_cbor_2::Value;

    #[test]
    fn nid_to_curve() {
        assert_eq!(
            ECDSACurve::try_from(nid::Nid::X9_62_PRIME256V1).unwrap(),
            ECDSACurve::SECP256R1
        );
    }

    #[test]
    fn cbor_es256() {
        let hex_data = hex!(
            "
                A5
                01 02
                03 26
                20 01
                21 58 20   65eda5a12577c2bae829437fe338701a10aaa375e1bb5b5de108de439c08551d
                22 58 20   1e52ed75701163f7f9e40ddf9f341b3dc9ba860af7e0ca7ca7e9eecd0084d19c"
        );

        let val: Value = serde_cbor_2::from_slice(&hex_data).unwrap();
        let key = COSEKey::try_from(&val).unwrap();

        assert_eq!(key.type_, COSEAlgorithm::ES256);
        match key.key {
            COSEKeyType::EC_EC2(pkey) => {
                assert_eq!(pkey.curve, ECDSACurve::SECP256R1);
                assert_eq!(pkey.x.as_ref().len(), 32);
            }
            _ => panic!("key should be parsed as an EC2 key"),
        }
    }

    fn generated_ec2_key(alg: COSEAlgorithm, curve: ECDSACurve, nid: nid::Nid) -> COSEKey {
        let group = ec::EcGroup::from_curve_name(nid).unwrap();
        let ec_key = ec::EcKey::generate(&group).unwrap();
        let mut ctx = bn::BigNumContext::new().unwrap();
        let mut x = bn::BigNum::new().unwrap();
        let mut y = bn::BigNum::new().unwrap();
        ec_key
            .public_key()
            .affine_coordinates_gfp(&group, &mut x, &mut y, &mut ctx)
            .unwrap();
        let coord_len = curve.coordinate_size();
        COSEKey {
            type_: alg,
            key: COSEKeyType::EC_EC2(COSEEC2Key {
                curve,
                x: x.to_vec_padded(coord_len as i32).unwrap().into(),
                y: y.to_vec_padded(coord_len as i32).unwrap().into(),
            }),
        }
    }

    #[test]
    fn cose_es384_check_roundtrip() {
        let key = generated_ec2_key(COSEAlgorithm::ES384, ECDSACurve::SECP384R1, nid::Nid::SECP384R1);
        let checked = key.check().expect("a generated P-384 point should check");
        assert_eq!(checked.algorithm(), COSEAlgorithm::ES384);
    }

    #[test]
    fn cose_es512_check_roundtrip() {
        let key = generated_ec2_key(COSEAlgorithm::ES512, ECDSACurve::SECP521R1, nid::Nid::SECP521R1);
        let checked = key.check().expect("a generated P-521 point should check");
        assert_eq!(checked.algorithm(), COSEAlgorithm::ES512);
    }

    #[test]
    fn cose_ed25519_check_roundtrip() {
        let key = COSEKey {
            type_: COSEAlgorithm::EDDSA,
            key: COSEKeyType::EC_OKP(COSEOKPKey {
                curve: EDDSACurve::ED25519,
                x: vec![0u8; 32].into(),
            }),
        };
        let checked = key.check().expect("32-byte Ed25519 key should check");
        assert_eq!(checked.algorithm(), COSEAlgorithm::EDDSA);
    }

    #[test]
    fn cose_ed25519_wrong_length_rejected() {
        let key = COSEKey {
            type_: COSEAlgorithm::EDDSA,
            key: COSEKeyType::EC_OKP(COSEOKPKey {
                curve: EDDSACurve::ED25519,
                x: vec![0u8; 31].into(),
            }),
        };
        assert!(key.check().is_err());
    }

    #[test]
    fn cose_rsa_below_2048_bits_rejected() {
        let n = vec![0xffu8; 64]; // 512 bits
        let key = COSEKey {
            type_: COSEAlgorithm::RS256,
            key: COSEKeyType::RSA(COSERSAKey {
                n: n.into(),
                e: vec![0x01, 0x00, 0x01].into(),
            }),
        };
        assert!(key.check().is_err());
    }
}
