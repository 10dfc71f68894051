//! TPM attestation statement verification.
//!
//! The `tpm` format carries an Attestation Identity Key certificate chain in
//! `x5c`, a signed `TPMS_ATTEST` blob (`certInfo`) and the `TPMT_PUBLIC`
//! area of the credential key (`pubArea`). The AIK signs `certInfo`, which
//! in turn binds the hash of the ceremony data and the name of the public
//! area, closing the loop between the credential key and the TPM.
//!
//! Reference: TCG EK Credential Profile and TPM 2.0 Part 2 (structures).

mod reader;
mod san;
mod structures;
mod vendors;

pub use reader::WireError;
pub use san::SubjectAlternativeName;
pub use structures::{
    AsymmetricKey, CertifyInfo, ClockInfo, NameAlg, TpmsAttest, TpmtPublic, parse_tpms_attest,
    parse_tpmt_public, TPM_ALG_ECC, TPM_ALG_RSA, TPM_ALG_SHA1, TPM_ALG_SHA256,
    TPM_ECC_NIST_P256, TPM_ECC_NIST_P384, TPM_ECC_NIST_P521, TPM_GENERATED_VALUE,
    TPM_ST_ATTEST_CERTIFY,
};
pub use vendors::{is_known_manufacturer, TPM_MANUFACTURERS};

use ciborium::Value;
use der_parser::oid::Oid;
use x509_parser::prelude::*;

use crate::cbor_util;
use crate::cose::{CoseAlgorithm, PublicKey};
use crate::der_util;
use crate::types::{AttestationType, VerifiedAttestation};

/// X.509 Subject Alternative Name: 2.5.29.17
const SUBJECT_ALTERNATIVE_NAME_OID: &[u64] = &[2, 5, 29, 17];
/// id-fido-gen-ce-aaguid: 1.3.6.1.4.1.45724.1.1.4
const FIDO_GEN_CE_AAGUID_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 45724, 1, 1, 4];
/// tcg-kp-AIKCertificate: 2.23.133.8.3
const TCG_KP_AIK_CERTIFICATE_OID: &str = "2.23.133.8.3";

// ============================================================================
// Error Types
// ============================================================================

/// Errors from decoding a tpm attestation statement.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The CBOR map is missing a key or carries a wrong-typed value
    UnexpectedCborStructure(Value),
    /// The AIK certificate does not parse as DER X.509
    Certificate(String),
    /// The `alg` identifier is not a supported COSE signature algorithm
    UnknownAlgorithmIdentifier(i32),
    /// A TPM wire structure failed to parse at the given byte offset
    Tpm(usize, String),
    /// A required AIK certificate extension is absent
    CertificateExtensionMissing,
    /// An AIK certificate extension is present but malformed
    CertificateExtension(String),
    /// The AIK certificate's subject public key is unsupported
    ExtractingPublicKey,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnexpectedCborStructure(_) => {
                write!(f, "unexpected CBOR structure for tpm statement")
            }
            DecodeError::Certificate(detail) => write!(f, "invalid certificate: {detail}"),
            DecodeError::UnknownAlgorithmIdentifier(id) => {
                write!(f, "unknown COSE algorithm identifier {id}")
            }
            DecodeError::Tpm(position, detail) => {
                write!(f, "TPM structure invalid at byte {position}: {detail}")
            }
            DecodeError::CertificateExtensionMissing => {
                write!(f, "required AIK certificate extension missing")
            }
            DecodeError::CertificateExtension(detail) => {
                write!(f, "invalid AIK certificate extension: {detail}")
            }
            DecodeError::ExtractingPublicKey => {
                write!(f, "unsupported AIK certificate public key")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors from verifying a tpm attestation statement.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyError {
    /// Credential key in authenticator data differs from the public area key
    CredentialKeyMismatch,
    /// `certInfo.magic` is not TPM_GENERATED_VALUE
    InvalidMagicNumber(u32),
    /// `certInfo.type` is not TPM_ST_ATTEST_CERTIFY
    InvalidType(u16),
    /// The public area's name algorithm is outside SHA-1/SHA-256
    InvalidNameAlgorithm,
    /// `certInfo.attested.name` differs from the computed object name
    InvalidName { expected: Vec<u8>, received: Vec<u8> },
    /// The credential public key could not be interpreted
    InvalidPublicKey,
    /// The AIK certificate is not X.509 v3
    CertificateVersion { expected: u32, received: u32 },
    /// The attestation signature does not verify under the AIK key
    VerificationFailure,
    /// The AIK certificate's subject is not empty
    NonEmptySubjectField,
    /// The SAN manufacturer is not a registered TPM vendor
    UnknownVendor,
    /// Extended Key Usage lacks the AIK certificate purpose
    ExtKeyOidMissing,
    /// The AIK certificate claims to be a CA
    BasicConstraintsTrue,
    /// The certificate AAGUID differs from the authenticator data AAGUID
    CertificateAaguidMismatch,
    /// Authenticator data could not be parsed
    Asn1Error(String),
    /// Authenticator data carries no attested credential data
    CredentialAaguidMissing,
    /// The signature algorithm has no associated digest
    UnknownHashFunction,
    /// `certInfo.extraData` differs from the hash of the signed data
    HashMismatch { calculated: Vec<u8>, received: Vec<u8> },
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::CredentialKeyMismatch => {
                write!(f, "credential public key does not match public area key")
            }
            VerifyError::InvalidMagicNumber(magic) => {
                write!(f, "certInfo magic {magic:#010x} is not TPM_GENERATED_VALUE")
            }
            VerifyError::InvalidType(attestation_type) => {
                write!(f, "certInfo type {attestation_type:#06x} is not TPM_ST_ATTEST_CERTIFY")
            }
            VerifyError::InvalidNameAlgorithm => write!(f, "unsupported object name algorithm"),
            VerifyError::InvalidName { .. } => {
                write!(f, "attested name does not match public area name")
            }
            VerifyError::InvalidPublicKey => write!(f, "credential public key invalid"),
            VerifyError::CertificateVersion { expected, received } => {
                write!(f, "AIK certificate version {received}, expected {expected}")
            }
            VerifyError::VerificationFailure => write!(f, "attestation signature invalid"),
            VerifyError::NonEmptySubjectField => {
                write!(f, "AIK certificate subject is not empty")
            }
            VerifyError::UnknownVendor => write!(f, "unknown TPM manufacturer"),
            VerifyError::ExtKeyOidMissing => {
                write!(f, "AIK certificate purpose missing from extended key usage")
            }
            VerifyError::BasicConstraintsTrue => {
                write!(f, "AIK certificate basic constraints CA is true")
            }
            VerifyError::CertificateAaguidMismatch => {
                write!(f, "certificate AAGUID does not match authenticator data")
            }
            VerifyError::Asn1Error(detail) => write!(f, "structure error: {detail}"),
            VerifyError::CredentialAaguidMissing => {
                write!(f, "authenticator data carries no attested credential")
            }
            VerifyError::UnknownHashFunction => {
                write!(f, "no digest associated with signature algorithm")
            }
            VerifyError::HashMismatch { .. } => {
                write!(f, "extraData does not match hash of signed data")
            }
        }
    }
}

impl std::error::Error for VerifyError {}

// ============================================================================
// Data Structures
// ============================================================================

/// Fields of the AIK certificate the verifier consults, extracted at decode
/// time so the statement owns its data.
#[derive(Debug, Clone, PartialEq)]
pub struct AikCertificate {
    /// Raw X.509 version field; 2 encodes v3
    pub version: u32,
    /// Whether the subject DN carries no RDNs
    pub subject_is_empty: bool,
    /// TCG device triple from the SAN extension
    pub subject_alternative_name: SubjectAlternativeName,
    /// AAGUID from the id-fido-gen-ce-aaguid extension, when present
    pub aaguid: Option<[u8; 16]>,
    /// Extended key usage purposes, dotted-decimal
    pub extended_key_usage: Vec<String>,
    /// Basic constraints CA flag
    pub basic_constraints_ca: bool,
    /// Subject public key; verifies the attestation signature
    pub public_key: PublicKey,
}

/// Decoded tpm attestation statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// COSE signature algorithm for `sig`
    pub alg: CoseAlgorithm,
    /// AIK certificate chain, DER, AIK first
    pub x5c: Vec<Vec<u8>>,
    /// Signature over `certInfo` by the AIK
    pub sig: Vec<u8>,
    /// Parsed TPMS_ATTEST with its raw bytes
    pub cert_info: TpmsAttest,
    /// Parsed TPMT_PUBLIC with its raw bytes
    pub pub_area: TpmtPublic,
    /// Credential public key reconstructed from `pub_area`
    pub pub_area_key: PublicKey,
    /// AIK certificate fields, broken out of `x5c[0]`
    pub aik: AikCertificate,
}

impl Statement {
    /// Re-encodes the transport fields of this statement as a CBOR map.
    pub fn to_cbor_value(&self) -> Value {
        Value::Map(vec![
            (Value::Text("ver".to_string()), Value::Text("2.0".to_string())),
            (
                Value::Text("alg".to_string()),
                Value::Integer(i64::from(self.alg.identifier()).into()),
            ),
            (
                Value::Text("x5c".to_string()),
                Value::Array(self.x5c.iter().map(|c| Value::Bytes(c.clone())).collect()),
            ),
            (Value::Text("sig".to_string()), Value::Bytes(self.sig.clone())),
            (
                Value::Text("certInfo".to_string()),
                Value::Bytes(self.cert_info.raw.clone()),
            ),
            (
                Value::Text("pubArea".to_string()),
                Value::Bytes(self.pub_area.raw.clone()),
            ),
        ])
    }
}

// ============================================================================
// Statement Decoding
// ============================================================================

/// Decodes a tpm attestation statement from its CBOR map.
pub fn decode_statement(statement: &Value) -> Result<Statement, DecodeError> {
    let unexpected = || DecodeError::UnexpectedCborStructure(statement.clone());

    let map = statement.as_map().ok_or_else(unexpected)?;

    let ver = cbor_util::find_text(map, "ver").ok_or_else(unexpected)?;
    if ver != "2.0" {
        return Err(unexpected());
    }

    let alg_id = cbor_util::find_integer(map, "alg")
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(unexpected)?;
    let alg = CoseAlgorithm::from_identifier(alg_id)
        .ok_or(DecodeError::UnknownAlgorithmIdentifier(alg_id))?;

    let x5c = cbor_util::find_array(map, "x5c")
        .and_then(cbor_util::byte_string_array)
        .ok_or_else(unexpected)?;
    if x5c.is_empty() {
        return Err(unexpected());
    }

    let sig = cbor_util::find_bytes(map, "sig").ok_or_else(unexpected)?.to_vec();
    let cert_info_raw = cbor_util::find_bytes(map, "certInfo").ok_or_else(unexpected)?;
    let pub_area_raw = cbor_util::find_bytes(map, "pubArea").ok_or_else(unexpected)?;

    let pub_area = parse_tpmt_public(pub_area_raw)
        .map_err(|e| DecodeError::Tpm(e.position, e.detail))?;
    let cert_info = parse_tpms_attest(cert_info_raw)
        .map_err(|e| DecodeError::Tpm(e.position, e.detail))?;
    let pub_area_key = pub_area.public_key();

    let aik = decode_aik_certificate(&x5c[0])?;

    Ok(Statement { alg, x5c, sig, cert_info, pub_area, pub_area_key, aik })
}

/// Extracts the verifier-relevant fields from the AIK certificate.
fn decode_aik_certificate(der: &[u8]) -> Result<AikCertificate, DecodeError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| DecodeError::Certificate(format!("{e:?}")))?;

    let version = cert.version.0;
    let subject_is_empty = cert.subject().iter_attributes().count() == 0;

    let san_oid =
        Oid::from(SUBJECT_ALTERNATIVE_NAME_OID).expect("invalid subject alternative name OID");
    let san_ext = cert
        .extensions()
        .iter()
        .find(|ext| ext.oid == san_oid)
        .ok_or(DecodeError::CertificateExtensionMissing)?;
    let subject_alternative_name =
        san::parse_tpm_san(san_ext.value).map_err(DecodeError::CertificateExtension)?;

    let aaguid_oid = Oid::from(FIDO_GEN_CE_AAGUID_OID).expect("invalid AAGUID extension OID");
    let aaguid = match cert.extensions().iter().find(|ext| ext.oid == aaguid_oid) {
        Some(ext) => {
            Some(parse_aaguid_extension(ext.value).map_err(DecodeError::CertificateExtension)?)
        }
        None => None,
    };

    let extended_key_usage = cert
        .extended_key_usage()
        .map_err(|e| DecodeError::CertificateExtension(format!("{e:?}")))?
        .ok_or(DecodeError::CertificateExtensionMissing)?
        .value
        .other
        .iter()
        .map(|oid| oid.to_id_string())
        .collect();

    let basic_constraints_ca = cert
        .basic_constraints()
        .map_err(|e| DecodeError::CertificateExtension(format!("{e:?}")))?
        .ok_or(DecodeError::CertificateExtensionMissing)?
        .value
        .ca;

    let public_key = PublicKey::from_x509_spki(cert.public_key().raw)
        .ok_or(DecodeError::ExtractingPublicKey)?;

    Ok(AikCertificate {
        version,
        subject_is_empty,
        subject_alternative_name,
        aaguid,
        extended_key_usage,
        basic_constraints_ca,
        public_key,
    })
}

/// The extension payload is an OCTET STRING holding the 16-byte AAGUID.
fn parse_aaguid_extension(data: &[u8]) -> Result<[u8; 16], String> {
    let obj = der_util::parse_one(data)?;
    let bytes = der_util::as_octets(&obj)?;
    <[u8; 16]>::try_from(bytes)
        .map_err(|_| format!("AAGUID must be 16 bytes, got {}", bytes.len()))
}

// ============================================================================
// Verification
// ============================================================================

/// Verifies a tpm attestation statement.
///
/// Steps, each with its own error kind:
/// 1. Verify the public area key equals the credential key in authenticator
///    data, by canonical key material.
/// 2. Let `attToBeSigned = authenticator_data || client_data_hash`.
/// 3. Verify `certInfo.magic` is TPM_GENERATED_VALUE.
/// 4. Verify `certInfo.type` is TPM_ST_ATTEST_CERTIFY.
/// 5. Verify `certInfo.extraData` is the `alg` digest of `attToBeSigned`.
/// 6. Verify `certInfo.attested.name` is the object name of `pubArea`.
/// 7. Verify `sig` over the raw `certInfo` bytes with the AIK key.
/// 8. Verify the AIK certificate: v3, empty subject, registered vendor,
///    AIK purpose in extended key usage, not a CA.
/// 9. When the certificate carries an AAGUID, verify it matches the
///    authenticator data.
pub fn verify_statement(
    statement: &Statement,
    authenticator_data: &[u8],
    client_data_hash: &[u8; 32],
) -> Result<VerifiedAttestation, VerifyError> {
    let auth_data = crate::authenticator_data::parse_authenticator_data(authenticator_data)
        .map_err(|e| VerifyError::Asn1Error(e.to_string()))?;
    let attested = auth_data
        .attested_credential
        .as_ref()
        .ok_or(VerifyError::CredentialAaguidMissing)?;
    let credential_key = PublicKey::from_cose_bytes(&attested.public_key_cbor)
        .map_err(|_| VerifyError::InvalidPublicKey)?;
    if statement.pub_area_key != credential_key {
        tracing::warn!(step = "credential_key", "tpm verification failed");
        return Err(VerifyError::CredentialKeyMismatch);
    }
    tracing::debug!(step = "credential_key", "credential key matches public area");

    let mut att_to_be_signed =
        Vec::with_capacity(authenticator_data.len() + client_data_hash.len());
    att_to_be_signed.extend_from_slice(authenticator_data);
    att_to_be_signed.extend_from_slice(client_data_hash);

    if statement.cert_info.magic != TPM_GENERATED_VALUE {
        tracing::warn!(step = "magic", magic = statement.cert_info.magic, "tpm verification failed");
        return Err(VerifyError::InvalidMagicNumber(statement.cert_info.magic));
    }
    if statement.cert_info.attestation_type != TPM_ST_ATTEST_CERTIFY {
        tracing::warn!(step = "type", "tpm verification failed");
        return Err(VerifyError::InvalidType(statement.cert_info.attestation_type));
    }

    let att_hash = statement
        .alg
        .digest(&att_to_be_signed)
        .ok_or(VerifyError::UnknownHashFunction)?;
    if att_hash != statement.cert_info.extra_data {
        tracing::warn!(step = "extra_data", "tpm verification failed");
        return Err(VerifyError::HashMismatch {
            calculated: att_hash,
            received: statement.cert_info.extra_data.clone(),
        });
    }
    tracing::debug!(step = "extra_data", "extraData matches attToBeSigned hash");

    if statement.pub_area.name_alg_raw != TPM_ALG_SHA1
        && statement.pub_area.name_alg_raw != TPM_ALG_SHA256
    {
        return Err(VerifyError::InvalidNameAlgorithm);
    }
    let expected_name = statement.pub_area.name();
    if statement.cert_info.attested.name != expected_name {
        tracing::warn!(step = "name", "tpm verification failed");
        return Err(VerifyError::InvalidName {
            expected: expected_name,
            received: statement.cert_info.attested.name.clone(),
        });
    }
    tracing::debug!(step = "name", "attested name matches public area");

    if statement
        .aik
        .public_key
        .verify(statement.alg, &statement.cert_info.raw, &statement.sig)
        .is_err()
    {
        tracing::warn!(step = "signature", "tpm verification failed");
        return Err(VerifyError::VerificationFailure);
    }
    tracing::debug!(step = "signature", "attestation signature verified");

    if statement.aik.version != 2 {
        return Err(VerifyError::CertificateVersion {
            expected: 2,
            received: statement.aik.version,
        });
    }
    if !statement.aik.subject_is_empty {
        return Err(VerifyError::NonEmptySubjectField);
    }
    if !is_known_manufacturer(&statement.aik.subject_alternative_name.manufacturer) {
        tracing::warn!(
            step = "vendor",
            manufacturer = %statement.aik.subject_alternative_name.manufacturer,
            "tpm verification failed"
        );
        return Err(VerifyError::UnknownVendor);
    }
    if !statement
        .aik
        .extended_key_usage
        .iter()
        .any(|oid| oid == TCG_KP_AIK_CERTIFICATE_OID)
    {
        return Err(VerifyError::ExtKeyOidMissing);
    }
    if statement.aik.basic_constraints_ca {
        return Err(VerifyError::BasicConstraintsTrue);
    }
    tracing::debug!(step = "aik_certificate", "AIK certificate requirements met");

    if let Some(aaguid) = statement.aik.aaguid {
        if aaguid != attested.aaguid {
            tracing::warn!(step = "aaguid", "tpm verification failed");
            return Err(VerifyError::CertificateAaguidMismatch);
        }
    }

    Ok(VerifiedAttestation {
        attestation_type: AttestationType::Uncertain,
        trust_path: statement.x5c.clone(),
    })
}

// ============================================================================
// Unit Tests
// ============================================================================
