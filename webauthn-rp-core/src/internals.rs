//! Small parsing helpers shared by the CBOR decoders and the TPM attestation
//! format. Kept separate from `crypto.rs` so the macros are available to
//! every decoder without a wildcard glob import.

use crate::error::WebauthnError;

/// Pull a CBOR map out of a `serde_cbor_2::Value`, or fail with
/// [`WebauthnError::COSEKeyInvalidCBORValue`].
macro_rules! cbor_try_map {
    ($v:expr) => {
        match $v {
            serde_cbor_2::Value::Map(m) => Ok(m),
            _ => Err(WebauthnError::COSEKeyInvalidCBORValue),
        }
    };
}

/// Pull an integer out of a `serde_cbor_2::Value`.
macro_rules! cbor_try_i128 {
    ($v:expr) => {
        match $v {
            serde_cbor_2::Value::Integer(i) => Ok(*i),
            _ => Err(WebauthnError::COSEKeyInvalidCBORValue),
        }
    };
}

/// Pull a byte string out of a `serde_cbor_2::Value`.
macro_rules! cbor_try_bytes {
    ($v:expr) => {
        match $v {
            serde_cbor_2::Value::Bytes(b) => Ok(b),
            _ => Err(WebauthnError::COSEKeyInvalidCBORValue),
        }
    };
}

/// Pull a UTF-8 string out of a `serde_cbor_2::Value`.
macro_rules! cbor_try_string {
    ($v:expr) => {
        match $v {
            serde_cbor_2::Value::Text(s) => Ok(s),
            _ => Err(WebauthnError::COSEKeyInvalidCBORValue),
        }
    };
}

pub(crate) use cbor_try_bytes;
pub(crate) use cbor_try_i128;
pub(crate) use cbor_try_map;
pub(crate) use cbor_try_string;

/// TPM manufacturer vendor IDs, per the TCG "Vendor ID Registry". Only the
/// handful of vendors actually seen in the wild are enumerated; anything
/// else still round-trips through `check_extension` as "present" without
/// us needing to name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmVendor {
    Amd,
    Atmel,
    Broadcom,
    Ibm,
    Infineon,
    Intel,
    Lenovo,
    Microsoft,
    Nationz,
    Nuvoton,
    Qualcomm,
    StMicro,
}

impl TryFrom<&[u8]> for TpmVendor {
    type Error = WebauthnError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        match raw {
            b"AMD" => Ok(TpmVendor::Amd),
            b"ATML" => Ok(TpmVendor::Atmel),
            b"BRCM" => Ok(TpmVendor::Broadcom),
            b"IBM" => Ok(TpmVendor::Ibm),
            b"IFX" => Ok(TpmVendor::Infineon),
            b"INTC" => Ok(TpmVendor::Intel),
            b"LEN" => Ok(TpmVendor::Lenovo),
            b"MSFT" => Ok(TpmVendor::Microsoft),
            b"NTZ" => Ok(TpmVendor::Nationz),
            b"NTC" => Ok(TpmVendor::Nuvoton),
            b"QCOM" => Ok(TpmVendor::Qualcomm),
            b"STM" => Ok(TpmVendor::StMicro),
            _ => Err(WebauthnError::AttestationCertificateRequirementsNotMet),
        }
    }
}

/// Parse a TPM SAN directoryName manufacturer attribute of the form
/// `id:4E544300` (`"id:" <hex vendor id>`) down to the raw vendor bytes,
/// per [TPMv2-EK-Profile] section 3.2.9.
pub(crate) fn tpm_device_attribute_parser(input: &[u8]) -> Result<Vec<u8>, WebauthnError> {
    let rest = input
        .strip_prefix(b"id:")
        .ok_or(WebauthnError::ParseNOMFailure)?;
    // The remainder is the manufacturer id hex-encoded; we only need the
    // ASCII vendor tag out of it, which is ASCII-hex of the vendor string.
    let hex_str = std::str::from_utf8(rest).map_err(|_| WebauthnError::ParseNOMFailure)?;
    hex::decode(hex_str.trim_end_matches(char::from(0))).map_err(|_| WebauthnError::ParseNOMFailure)
}
