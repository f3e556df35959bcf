//! The error taxonomy for the verification core.
//!
//! Every failure mode named anywhere in the core surfaces as a variant
//! here. Callers match on variants rather than strings; translating this
//! into HTTP status codes or log lines is the caller's job, not ours.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type WebauthnResult<T> = Result<T, WebauthnError>;

/// The full error taxonomy of the relying-party verification core.
#[derive(Debug, Error)]
pub enum WebauthnError {
    // -- Decoding --
    #[error("client data could not be decoded: {0}")]
    ClientDataDecodeError(String),

    #[error("authenticator data could not be decoded: {0}")]
    AuthenticatorDataDecodeError(String),

    #[error("attestation object could not be decoded: {0}")]
    AttestationObjectDecodeError(String),

    #[error("COSE key could not be decoded: {0}")]
    CoseKeyDecodeError(String),

    #[error("metadata entry could not be decoded: {0}")]
    MetadataDecodeError(String),

    // -- COSE/CBOR structural --
    #[error("COSE key has an unexpected or unsupported key type")]
    COSEKeyInvalidType,

    #[error("COSE key CBOR map is missing a required value")]
    COSEKeyInvalidCBORValue,

    #[error("COSE key algorithm identifier is not recognised")]
    COSEKeyInvalidAlgorithm,

    #[error("COSE EC2 key x/y coordinate length does not match the curve")]
    COSEKeyECDSAXYInvalid,

    #[error("COSE RSA key n/e length is invalid")]
    COSEKeyRSANEInvalid,

    #[error("COSE OKP (EdDSA) key x length is invalid")]
    COSEKeyEDDSAXInvalid,

    #[error("ED25519/ED448 keys are not supported in this context")]
    COSEKeyEDUnsupported,

    #[error("public key shape is invalid: {reason}")]
    InvalidKeyShape { reason: String },

    #[error("openssl NID does not map to a known ECDSA curve")]
    ECDSACurveInvalidNid,

    #[error("a cryptographic operation used an algorithm known to be insecure")]
    CredentialInsecureCryptography,

    // -- Policy --
    #[error("client data ceremony type is incorrect")]
    InvalidClientDataType,

    #[error("the challenge in client data does not match the expected challenge")]
    ChallengeMismatch,

    #[error("the origin in client data is not an allowed origin")]
    OriginMismatch,

    #[error("authenticator data rpIdHash does not match the expected RP ID")]
    RpIdHashMismatch,

    #[error("user presence flag was not set")]
    UserNotPresent,

    #[error("user verification flag was not set but is required")]
    UserNotVerified,

    #[error("attested credential data was required but absent")]
    AttestedCredentialDataMissing,

    #[error("credential id is not a member of the allowed credentials list")]
    DisallowedCredential,

    #[error("identified user handle does not match the credential's stored user handle")]
    IdentifiedUserHandleMismatch,

    #[error("response user handle does not match the credential's stored user handle")]
    CredentialUserHandleMismatch,

    #[error("no user handle was available to verify the credential owner")]
    CannotVerifyUserHandle,

    #[error("credential public key algorithm is not among the allowed algorithms")]
    AlgorithmNotAllowed,

    #[error("credential id exceeds the maximum permitted length")]
    CredentialIdTooLong,

    // -- Cryptographic --
    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("certificate chain is invalid or empty")]
    CertificateChainInvalid,

    #[error("attestation certificate did not meet structural requirements")]
    AttestationCertificateRequirementsNotMet,

    #[error("attestation statement x5c is invalid")]
    AttestationStatementX5CInvalid,

    #[error("key shape is invalid")]
    KeyShapeInvalid,

    #[error("openssl operation failed: {0}")]
    OpenSSLError(#[from] openssl::error::ErrorStack),

    #[error("x509 parser operation did not find a curve name for this group")]
    OpenSSLErrorNoCurveName,

    // -- Attestation format specific --
    #[error("attestation statement verification failed for format {format}: {reason}")]
    AttestationStatementVerificationError { format: &'static str, reason: String },

    #[error("attestation format '{0}' is not recognised")]
    AttestationFormatUnknown(String),

    // -- Metadata / MDS --
    #[error("MDS JWS signature is invalid")]
    JwsSignatureInvalid,

    #[error("MDS payload does not match the expected schema")]
    PayloadSchemaMismatch,

    #[error("{0} of {1} metadata entries failed to decode")]
    PartialDecodeErrors(usize, usize),

    #[error("MDS signing certificate chain did not validate to the pinned root")]
    MdsCertificateChainInvalid,

    // -- Parsing internals --
    #[error("DER/NOM parsing failure")]
    ParseNOMFailure,

    #[error("configuration is invalid")]
    Configuration,

    #[error("attestation CA list was required but empty or absent")]
    MissingAttestationCaList,

    #[error("user unique id was invalid")]
    InvalidUserUniqueId,
}
