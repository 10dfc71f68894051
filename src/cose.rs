//! COSE signature algorithms and a uniform public-key representation.
//!
//! Attestation verification compares the same key across three encodings:
//! the credential COSE key in authenticator data, an X.509
//! SubjectPublicKeyInfo, and (for TPM) a reconstructed `TPMT_PUBLIC` key.
//! [`PublicKey`] normalizes all three to canonical key material so equality
//! is meaningful regardless of encoding.

use coset::{AsCborValue, CoseKey, KeyType, Label};
use der_parser::ber::BerObjectContent;
use num_bigint::BigUint;
use sha2::Digest;

use crate::der_util;

const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";
const OID_CURVE_P521: &str = "1.3.132.0.35";

/// Supported COSE signature algorithm identifiers.
///
/// ES512 and EdDSA are deliberately absent; statements using them are
/// rejected at decode time with an unknown-algorithm error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseAlgorithm {
    /// ECDSA P-256 with SHA-256 (-7)
    Es256,
    /// ECDSA P-384 with SHA-384 (-35)
    Es384,
    /// RSASSA-PKCS1-v1_5 with SHA-1 (-65535), emitted by older TPMs
    Rs1,
    /// RSASSA-PKCS1-v1_5 with SHA-256 (-257)
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384 (-258)
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512 (-259)
    Rs512,
}

impl CoseAlgorithm {
    /// Recognizes a registered COSE algorithm identifier.
    pub fn from_identifier(identifier: i32) -> Option<Self> {
        match identifier {
            -7 => Some(CoseAlgorithm::Es256),
            -35 => Some(CoseAlgorithm::Es384),
            -257 => Some(CoseAlgorithm::Rs256),
            -258 => Some(CoseAlgorithm::Rs384),
            -259 => Some(CoseAlgorithm::Rs512),
            -65535 => Some(CoseAlgorithm::Rs1),
            _ => None,
        }
    }

    /// The registered identifier for this algorithm.
    pub fn identifier(self) -> i32 {
        match self {
            CoseAlgorithm::Es256 => -7,
            CoseAlgorithm::Es384 => -35,
            CoseAlgorithm::Rs256 => -257,
            CoseAlgorithm::Rs384 => -258,
            CoseAlgorithm::Rs512 => -259,
            CoseAlgorithm::Rs1 => -65535,
        }
    }

    /// Hashes `message` with the digest this algorithm pairs with, or `None`
    /// when the algorithm has no single digest.
    pub fn digest(self, message: &[u8]) -> Option<Vec<u8>> {
        match self {
            CoseAlgorithm::Es256 | CoseAlgorithm::Rs256 => {
                Some(sha2::Sha256::digest(message).to_vec())
            }
            CoseAlgorithm::Es384 | CoseAlgorithm::Rs384 => {
                Some(sha2::Sha384::digest(message).to_vec())
            }
            CoseAlgorithm::Rs512 => Some(sha2::Sha512::digest(message).to_vec()),
            CoseAlgorithm::Rs1 => Some(sha1::Sha1::digest(message).to_vec()),
        }
    }
}

/// NIST curves carried by the supported key encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    /// Width of one affine coordinate in bytes.
    pub fn coordinate_size(self) -> usize {
        match self {
            EcCurve::P256 => 32,
            EcCurve::P384 => 48,
            EcCurve::P521 => 66,
        }
    }
}

/// A verification key reduced to its canonical material.
///
/// Equality compares modulus/exponent (RSA) or curve/x/y (EC) as big
/// integers, never encoded bytes, so different encodings of the same key
/// compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Rsa { modulus: BigUint, exponent: BigUint },
    Ec { curve: EcCurve, x: BigUint, y: BigUint },
}

impl PublicKey {
    /// Converts an X.509 SubjectPublicKeyInfo (full DER) to a [`PublicKey`].
    ///
    /// Returns `None` for key algorithms outside RSA and the three NIST
    /// curves, and for malformed encodings.
    pub fn from_x509_spki(spki: &[u8]) -> Option<PublicKey> {
        let obj = der_util::parse_one(spki).ok()?;
        let fields = der_util::as_sequence(&obj).ok()?;
        if fields.len() != 2 {
            return None;
        }
        let algorithm = der_util::as_sequence(&fields[0]).ok()?;
        let algorithm_oid = match &algorithm.first()?.content {
            BerObjectContent::OID(oid) => oid.to_id_string(),
            _ => return None,
        };
        let key_bits = match &fields[1].content {
            BerObjectContent::BitString(_, bits) => bits.data,
            _ => return None,
        };

        match algorithm_oid.as_str() {
            OID_RSA_ENCRYPTION => {
                let key = der_util::parse_one(key_bits).ok()?;
                let numbers = der_util::as_sequence(&key).ok()?;
                if numbers.len() != 2 {
                    return None;
                }
                let modulus = integer_bytes(&numbers[0])?;
                let exponent = integer_bytes(&numbers[1])?;
                Some(PublicKey::Rsa {
                    modulus: BigUint::from_bytes_be(modulus),
                    exponent: BigUint::from_bytes_be(exponent),
                })
            }
            OID_EC_PUBLIC_KEY => {
                let curve_oid = match &algorithm.get(1)?.content {
                    BerObjectContent::OID(oid) => oid.to_id_string(),
                    _ => return None,
                };
                let curve = match curve_oid.as_str() {
                    OID_CURVE_P256 => EcCurve::P256,
                    OID_CURVE_P384 => EcCurve::P384,
                    OID_CURVE_P521 => EcCurve::P521,
                    _ => return None,
                };
                let (first, point) = key_bits.split_first()?;
                if *first != 0x04 || point.len() != 2 * curve.coordinate_size() {
                    return None;
                }
                let (x, y) = point.split_at(curve.coordinate_size());
                Some(PublicKey::Ec {
                    curve,
                    x: BigUint::from_bytes_be(x),
                    y: BigUint::from_bytes_be(y),
                })
            }
            _ => None,
        }
    }

    /// Converts a CBOR-encoded COSE key to a [`PublicKey`].
    ///
    /// Bytes after the key value (authenticator-data extensions) are
    /// tolerated.
    pub fn from_cose_bytes(data: &[u8]) -> Result<PublicKey, String> {
        let value: ciborium::Value =
            ciborium::from_reader(data).map_err(|e| format!("invalid CBOR: {e}"))?;
        let key =
            CoseKey::from_cbor_value(value).map_err(|e| format!("invalid COSE key: {e}"))?;

        if key.kty == KeyType::Assigned(coset::iana::KeyType::EC2) {
            let curve = match cose_int_param(&key, -1).ok_or("missing curve parameter")? {
                1 => EcCurve::P256,
                2 => EcCurve::P384,
                3 => EcCurve::P521,
                other => return Err(format!("unsupported COSE curve {other}")),
            };
            let x = cose_bytes_param(&key, -2).ok_or("missing x coordinate")?;
            let y = cose_bytes_param(&key, -3).ok_or("missing y coordinate")?;
            Ok(PublicKey::Ec {
                curve,
                x: BigUint::from_bytes_be(x),
                y: BigUint::from_bytes_be(y),
            })
        } else if key.kty == KeyType::Assigned(coset::iana::KeyType::RSA) {
            let n = cose_bytes_param(&key, -1).ok_or("missing RSA modulus")?;
            let e = cose_bytes_param(&key, -2).ok_or("missing RSA exponent")?;
            Ok(PublicKey::Rsa {
                modulus: BigUint::from_bytes_be(n),
                exponent: BigUint::from_bytes_be(e),
            })
        } else {
            Err(format!("unsupported COSE key type {:?}", key.kty))
        }
    }

    /// Verifies `signature` over `message` with this key under `alg`.
    ///
    /// The algorithm and the key material must agree; a P-256 key only
    /// verifies ES256, an RSA key only the RS* family.
    pub fn verify(
        &self,
        alg: CoseAlgorithm,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), String> {
        use rsa::signature::Verifier;

        match (self, alg) {
            (PublicKey::Ec { curve: EcCurve::P256, .. }, CoseAlgorithm::Es256) => {
                let key = p256::ecdsa::VerifyingKey::from_sec1_bytes(&self.ec_sec1_bytes()?)
                    .map_err(|e| format!("invalid P-256 key: {e}"))?;
                let signature = p256::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("invalid ECDSA signature encoding: {e}"))?;
                key.verify(message, &signature)
                    .map_err(|e| format!("signature verification failed: {e}"))
            }
            (PublicKey::Ec { curve: EcCurve::P384, .. }, CoseAlgorithm::Es384) => {
                let key = p384::ecdsa::VerifyingKey::from_sec1_bytes(&self.ec_sec1_bytes()?)
                    .map_err(|e| format!("invalid P-384 key: {e}"))?;
                let signature = p384::ecdsa::Signature::from_der(signature)
                    .map_err(|e| format!("invalid ECDSA signature encoding: {e}"))?;
                key.verify(message, &signature)
                    .map_err(|e| format!("signature verification failed: {e}"))
            }
            (PublicKey::Ec { curve: EcCurve::P521, .. }, _) => {
                Err("P-521 signature verification is not supported".to_string())
            }
            (PublicKey::Rsa { .. }, CoseAlgorithm::Rs1) => {
                let key = rsa::pkcs1v15::VerifyingKey::<sha1::Sha1>::new(self.rsa_key()?);
                key.verify(message, &rsa_signature(signature)?)
                    .map_err(|e| format!("signature verification failed: {e}"))
            }
            (PublicKey::Rsa { .. }, CoseAlgorithm::Rs256) => {
                let key = rsa::pkcs1v15::VerifyingKey::<sha2::Sha256>::new(self.rsa_key()?);
                key.verify(message, &rsa_signature(signature)?)
                    .map_err(|e| format!("signature verification failed: {e}"))
            }
            (PublicKey::Rsa { .. }, CoseAlgorithm::Rs384) => {
                let key = rsa::pkcs1v15::VerifyingKey::<sha2::Sha384>::new(self.rsa_key()?);
                key.verify(message, &rsa_signature(signature)?)
                    .map_err(|e| format!("signature verification failed: {e}"))
            }
            (PublicKey::Rsa { .. }, CoseAlgorithm::Rs512) => {
                let key = rsa::pkcs1v15::VerifyingKey::<sha2::Sha512>::new(self.rsa_key()?);
                key.verify(message, &rsa_signature(signature)?)
                    .map_err(|e| format!("signature verification failed: {e}"))
            }
            (key, alg) => Err(format!("key {key:?} cannot verify {alg:?} signatures")),
        }
    }

    /// Uncompressed SEC1 point for an EC key, coordinates padded to curve
    /// width.
    fn ec_sec1_bytes(&self) -> Result<Vec<u8>, String> {
        match self {
            PublicKey::Ec { curve, x, y } => {
                let size = curve.coordinate_size();
                let mut out = Vec::with_capacity(1 + 2 * size);
                out.push(0x04);
                out.extend_from_slice(&left_pad(x, size)?);
                out.extend_from_slice(&left_pad(y, size)?);
                Ok(out)
            }
            PublicKey::Rsa { .. } => Err("not an EC key".to_string()),
        }
    }

    fn rsa_key(&self) -> Result<rsa::RsaPublicKey, String> {
        match self {
            PublicKey::Rsa { modulus, exponent } => rsa::RsaPublicKey::new(
                rsa::BigUint::from_bytes_be(&modulus.to_bytes_be()),
                rsa::BigUint::from_bytes_be(&exponent.to_bytes_be()),
            )
            .map_err(|e| format!("invalid RSA public key: {e}")),
            PublicKey::Ec { .. } => Err("not an RSA key".to_string()),
        }
    }
}

fn rsa_signature(bytes: &[u8]) -> Result<rsa::pkcs1v15::Signature, String> {
    rsa::pkcs1v15::Signature::try_from(bytes)
        .map_err(|e| format!("invalid RSA signature encoding: {e}"))
}

fn left_pad(value: &BigUint, width: usize) -> Result<Vec<u8>, String> {
    let raw = value.to_bytes_be();
    if raw.len() > width {
        return Err(format!("coordinate of {} bytes exceeds width {width}", raw.len()));
    }
    let mut out = vec![0u8; width - raw.len()];
    out.extend_from_slice(&raw);
    Ok(out)
}

fn integer_bytes<'a>(obj: &der_parser::ber::BerObject<'a>) -> Option<&'a [u8]> {
    match &obj.content {
        BerObjectContent::Integer(bytes) => Some(bytes),
        _ => None,
    }
}

fn cose_int_param(key: &CoseKey, label: i64) -> Option<i64> {
    key.params
        .iter()
        .find(|(l, _)| *l == Label::Int(label))
        .and_then(|(_, v)| v.as_integer())
        .and_then(|i| i.try_into().ok())
}

fn cose_bytes_param<'a>(key: &'a CoseKey, label: i64) -> Option<&'a [u8]> {
    key.params
        .iter()
        .find(|(l, _)| *l == Label::Int(label))
        .and_then(|(_, v)| v.as_bytes())
        .map(|v| v.as_slice())
}
