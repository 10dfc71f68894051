//! TPM 2.0 wire structures: `TPMS_ATTEST` and `TPMT_PUBLIC`.
//!
//! Both structures keep their original byte buffer alongside the parsed
//! fields. Signatures and name digests are computed over those bytes; the
//! structures are never re-serialized.

use num_bigint::BigUint;
use sha2::Digest;

use super::reader::{Reader, WireError};
use crate::cose::{EcCurve, PublicKey};

/// TPM_GENERATED_VALUE, marks a structure as TPM-originated.
pub const TPM_GENERATED_VALUE: u32 = 0xFF54_4347;
/// TPM_ST_ATTEST_CERTIFY
pub const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

/// TPM_ALG_RSA
pub const TPM_ALG_RSA: u16 = 0x0001;
/// TPM_ALG_SHA1
pub const TPM_ALG_SHA1: u16 = 0x0004;
/// TPM_ALG_SHA256
pub const TPM_ALG_SHA256: u16 = 0x000B;
/// TPM_ALG_ECC
pub const TPM_ALG_ECC: u16 = 0x0023;

/// TPM_ECC_NIST_P256
pub const TPM_ECC_NIST_P256: u16 = 0x0003;
/// TPM_ECC_NIST_P384
pub const TPM_ECC_NIST_P384: u16 = 0x0004;
/// TPM_ECC_NIST_P521
pub const TPM_ECC_NIST_P521: u16 = 0x0005;

/// Name algorithm of a public area. Only SHA-1 and SHA-256 are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameAlg {
    Sha1,
    Sha256,
}

/// TPMS_CLOCK_INFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    /// Decoded as `byte == 1`; any other encoding reads as `false`.
    pub safe: bool,
}

/// TPMS_CERTIFY_INFO
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertifyInfo {
    pub name: Vec<u8>,
    pub qualified_name: Vec<u8>,
}

/// Parsed TPMS_ATTEST together with its original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmsAttest {
    /// Original wire bytes, verbatim; the attestation signature covers these
    pub raw: Vec<u8>,
    pub magic: u32,
    pub attestation_type: u16,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub clock_info: ClockInfo,
    pub firmware_version: u64,
    pub attested: CertifyInfo,
}

/// Asymmetric parameters and unique field of a TPMT_PUBLIC, joined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsymmetricKey {
    Rsa {
        symmetric: u16,
        scheme: u16,
        key_bits: u16,
        /// Wire value 0 is substituted with 65537 at parse time
        exponent: u32,
        modulus: BigUint,
    },
    Ecc {
        symmetric: u16,
        scheme: u16,
        curve: EcCurve,
        kdf: u16,
        x: BigUint,
        y: BigUint,
    },
}

/// Parsed TPMT_PUBLIC together with its original bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmtPublic {
    /// Original wire bytes, verbatim; the object name digest covers these
    pub raw: Vec<u8>,
    pub name_alg: NameAlg,
    pub name_alg_raw: u16,
    pub object_attributes: u32,
    pub auth_policy: Vec<u8>,
    pub key: AsymmetricKey,
}

impl TpmtPublic {
    /// The credential public key this area describes, in canonical form.
    pub fn public_key(&self) -> PublicKey {
        match &self.key {
            AsymmetricKey::Rsa { modulus, exponent, .. } => PublicKey::Rsa {
                modulus: modulus.clone(),
                exponent: BigUint::from(*exponent),
            },
            AsymmetricKey::Ecc { curve, x, y, .. } => {
                PublicKey::Ec { curve: *curve, x: x.clone(), y: y.clone() }
            }
        }
    }

    /// The TPM object name: `u16be(nameAlg) || H_nameAlg(raw)`.
    pub fn name(&self) -> Vec<u8> {
        let mut out = self.name_alg_raw.to_be_bytes().to_vec();
        match self.name_alg {
            NameAlg::Sha1 => out.extend_from_slice(&sha1::Sha1::digest(&self.raw)),
            NameAlg::Sha256 => out.extend_from_slice(&sha2::Sha256::digest(&self.raw)),
        }
        out
    }
}

/// Parses a TPMS_ATTEST blob, requiring full consumption.
///
/// The magic value is recorded but not checked here; the verifier owns that
/// decision.
pub fn parse_tpms_attest(data: &[u8]) -> Result<TpmsAttest, WireError> {
    let mut reader = Reader::new(data);

    let magic = reader.read_u32("magic")?;
    let attestation_type = reader.read_u16("type")?;
    let qualified_signer = reader.read_sized("qualifiedSigner")?.to_vec();
    let extra_data = reader.read_sized("extraData")?.to_vec();
    let clock_info = ClockInfo {
        clock: reader.read_u64("clockInfo.clock")?,
        reset_count: reader.read_u32("clockInfo.resetCount")?,
        restart_count: reader.read_u32("clockInfo.restartCount")?,
        safe: reader.read_u8("clockInfo.safe")? == 1,
    };
    let firmware_version = reader.read_u64("firmwareVersion")?;
    let attested = CertifyInfo {
        name: reader.read_sized("attested.name")?.to_vec(),
        qualified_name: reader.read_sized("attested.qualifiedName")?.to_vec(),
    };
    reader.finish("TPMS_ATTEST")?;

    Ok(TpmsAttest {
        raw: data.to_vec(),
        magic,
        attestation_type,
        qualified_signer,
        extra_data,
        clock_info,
        firmware_version,
        attested,
    })
}

/// Parses a TPMT_PUBLIC blob, requiring full consumption.
pub fn parse_tpmt_public(data: &[u8]) -> Result<TpmtPublic, WireError> {
    let mut reader = Reader::new(data);

    let key_type = reader.read_u16("type")?;
    let name_alg_raw = reader.read_u16("nameAlg")?;
    let name_alg = match name_alg_raw {
        TPM_ALG_SHA1 => NameAlg::Sha1,
        TPM_ALG_SHA256 => NameAlg::Sha256,
        other => {
            return Err(WireError {
                position: 2,
                detail: format!("unsupported nameAlg {other:#06x}"),
            })
        }
    };
    let object_attributes = reader.read_u32("objectAttributes")?;
    let auth_policy = reader.read_sized("authPolicy")?.to_vec();

    let key = match key_type {
        TPM_ALG_RSA => {
            let symmetric = reader.read_u16("parameters.symmetric")?;
            let scheme = reader.read_u16("parameters.scheme")?;
            let key_bits = reader.read_u16("parameters.keyBits")?;
            let exponent = match reader.read_u32("parameters.exponent")? {
                0 => 65537,
                value => value,
            };
            let modulus = BigUint::from_bytes_be(reader.read_sized("unique.rsa")?);
            AsymmetricKey::Rsa { symmetric, scheme, key_bits, exponent, modulus }
        }
        TPM_ALG_ECC => {
            let symmetric = reader.read_u16("parameters.symmetric")?;
            let scheme = reader.read_u16("parameters.scheme")?;
            let curve_id = reader.read_u16("parameters.curveID")?;
            let curve = match curve_id {
                TPM_ECC_NIST_P256 => EcCurve::P256,
                TPM_ECC_NIST_P384 => EcCurve::P384,
                TPM_ECC_NIST_P521 => EcCurve::P521,
                other => {
                    return Err(WireError {
                        position: 14 + auth_policy.len(),
                        detail: format!("unsupported curve {other:#06x}"),
                    })
                }
            };
            let kdf = reader.read_u16("parameters.kdf")?;
            let x = BigUint::from_bytes_be(reader.read_sized("unique.x")?);
            let y = BigUint::from_bytes_be(reader.read_sized("unique.y")?);
            AsymmetricKey::Ecc { symmetric, scheme, curve, kdf, x, y }
        }
        other => {
            return Err(WireError {
                position: 0,
                detail: format!("unsupported key type {other:#06x}"),
            })
        }
    };
    reader.finish("TPMT_PUBLIC")?;

    Ok(TpmtPublic {
        raw: data.to_vec(),
        name_alg,
        name_alg_raw,
        object_attributes,
        auth_policy,
        key,
    })
}
