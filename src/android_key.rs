//! Android Key attestation statement verification.
//!
//! The `android-key` format carries the credential certificate chain in
//! `x5c`; the first certificate holds the credential public key and the
//! Android keystore attestation extension (OID 1.3.6.1.4.1.11129.2.1.17).
//! The statement signature is made with the credential private key over the
//! authenticator data and the client-data hash.
//!
//! Reference: https://developer.android.com/privacy-and-security/security-key-attestation

use std::collections::BTreeSet;

use ciborium::Value;
use der_parser::ber::BerObject;
use der_parser::oid::Oid;
use x509_parser::prelude::*;

use crate::cbor_util;
use crate::cose::{CoseAlgorithm, PublicKey};
use crate::der_util;
use crate::types::{AttestationType, TrustLevel, VerifiedAttestation};

/// Android keystore attestation extension: 1.3.6.1.4.1.11129.2.1.17
const KEY_ATTESTATION_EXTENSION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 11129, 2, 1, 17];

/// Keymaster: key was generated on the device.
pub const KM_ORIGIN_GENERATED: i64 = 0;
/// Keymaster: key may be used for signing.
pub const KM_PURPOSE_SIGN: i64 = 2;

/// Context tags an AuthorizationList may contain, in encoding order.
/// A tag outside this enumeration, or out of order, is a decoding error.
const AUTHORIZATION_TAGS: &[u32] = &[
    1, 2, 3, 5, 6, 10, 200, 303, 400, 401, 402, 503, 504, 505, 506, 507, 508, 509, 600, 601,
    701, 702, 703, 704, 705, 706, 709, 710, 711, 712, 713, 714, 715, 716, 717, 718, 719,
];

// ============================================================================
// Error Types
// ============================================================================

/// Errors from decoding an android-key attestation statement.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// The CBOR map is missing a key or carries a wrong-typed value
    UnexpectedCborStructure(Value),
    /// The `alg` identifier is not a supported COSE signature algorithm
    UnknownAlgorithmIdentifier(i32),
    /// The credential certificate does not parse as DER X.509
    Certificate(String),
    /// The credential certificate has no attestation extension
    CertificateExtensionMissing,
    /// The attestation extension is present but malformed
    CertificateExtension(String),
    /// The credential certificate's subject public key is unsupported
    PublicKey(Vec<u8>),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::UnexpectedCborStructure(_) => {
                write!(f, "unexpected CBOR structure for android-key statement")
            }
            DecodeError::UnknownAlgorithmIdentifier(id) => {
                write!(f, "unknown COSE algorithm identifier {id}")
            }
            DecodeError::Certificate(detail) => write!(f, "invalid certificate: {detail}"),
            DecodeError::CertificateExtensionMissing => {
                write!(f, "attestation extension not found in credential certificate")
            }
            DecodeError::CertificateExtension(detail) => {
                write!(f, "invalid attestation extension: {detail}")
            }
            DecodeError::PublicKey(_) => {
                write!(f, "unsupported credential certificate public key")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Errors from verifying an android-key attestation statement.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifyError {
    /// Credential key in authenticator data differs from the certificate key
    CredentialKeyMismatch,
    /// Attestation challenge differs from the client-data hash
    ClientDataHashMismatch,
    /// An authorization list carries the allApplications field
    AllApplicationsFieldFound,
    /// Key origin is not "generated on device" in the required list
    OriginFieldInvalid,
    /// Key purpose is not exactly "sign" in the required list
    PurposeFieldInvalid,
    /// Signature or structural verification failed
    VerificationFailure(String),
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerifyError::CredentialKeyMismatch => {
                write!(f, "credential public key does not match certificate key")
            }
            VerifyError::ClientDataHashMismatch => {
                write!(f, "attestation challenge does not match client data hash")
            }
            VerifyError::AllApplicationsFieldFound => {
                write!(f, "allApplications field present in authorization list")
            }
            VerifyError::OriginFieldInvalid => write!(f, "key origin field invalid"),
            VerifyError::PurposeFieldInvalid => write!(f, "key purpose field invalid"),
            VerifyError::VerificationFailure(detail) => {
                write!(f, "verification failure: {detail}")
            }
        }
    }
}

impl std::error::Error for VerifyError {}

// ============================================================================
// Data Structures
// ============================================================================

/// Authorization list from the attestation extension.
///
/// Only the fields the verifier consults are retained; the remaining tags
/// are walked and discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationList {
    /// Key purposes (tag 1), collected as a set
    pub purpose: Option<BTreeSet<i64>>,
    /// allApplications marker (tag 600), presence only
    pub all_applications: Option<()>,
    /// Key origin (tag 702)
    pub origin: Option<i64>,
}

/// Parsed Android keystore attestation extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationExtension {
    /// Challenge bound into the attestation; 32 bytes
    pub attestation_challenge: Vec<u8>,
    /// Properties enforced by the Android system
    pub software_enforced: AuthorizationList,
    /// Properties enforced by the trusted execution environment
    pub tee_enforced: AuthorizationList,
}

/// Decoded android-key attestation statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// COSE signature algorithm for `sig`
    pub alg: CoseAlgorithm,
    /// Signature over authenticator data and client-data hash
    pub sig: Vec<u8>,
    /// Credential certificate chain, DER, leaf first
    pub x5c: Vec<Vec<u8>>,
    /// Subject public key of `x5c[0]`
    pub credential_certificate_key: PublicKey,
    /// Attestation extension of `x5c[0]`
    pub attestation_extension: AttestationExtension,
}

impl Statement {
    /// Re-encodes the transport fields of this statement as a CBOR map.
    pub fn to_cbor_value(&self) -> Value {
        Value::Map(vec![
            (
                Value::Text("alg".to_string()),
                Value::Integer(i64::from(self.alg.identifier()).into()),
            ),
            (Value::Text("sig".to_string()), Value::Bytes(self.sig.clone())),
            (
                Value::Text("x5c".to_string()),
                Value::Array(self.x5c.iter().map(|c| Value::Bytes(c.clone())).collect()),
            ),
        ])
    }
}

// ============================================================================
// Statement Decoding
// ============================================================================

/// Decodes an android-key attestation statement from its CBOR map.
pub fn decode_statement(statement: &Value) -> Result<Statement, DecodeError> {
    let unexpected = || DecodeError::UnexpectedCborStructure(statement.clone());

    let map = statement.as_map().ok_or_else(unexpected)?;

    let alg_id = cbor_util::find_integer(map, "alg")
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(unexpected)?;
    let alg = CoseAlgorithm::from_identifier(alg_id)
        .ok_or(DecodeError::UnknownAlgorithmIdentifier(alg_id))?;

    let sig = cbor_util::find_bytes(map, "sig").ok_or_else(unexpected)?.to_vec();

    let x5c = cbor_util::find_array(map, "x5c")
        .and_then(cbor_util::byte_string_array)
        .ok_or_else(unexpected)?;
    if x5c.is_empty() {
        return Err(unexpected());
    }

    let (_, leaf) = X509Certificate::from_der(&x5c[0])
        .map_err(|e| DecodeError::Certificate(format!("{e:?}")))?;

    let attestation_oid =
        Oid::from(KEY_ATTESTATION_EXTENSION_OID).expect("invalid attestation extension OID constant");
    let extension = leaf
        .extensions()
        .iter()
        .find(|ext| ext.oid == attestation_oid)
        .ok_or(DecodeError::CertificateExtensionMissing)?;
    let attestation_extension =
        parse_attestation_extension(extension.value).map_err(DecodeError::CertificateExtension)?;

    let spki = leaf.public_key();
    let credential_certificate_key = PublicKey::from_x509_spki(spki.raw)
        .ok_or_else(|| DecodeError::PublicKey(spki.raw.to_vec()))?;

    Ok(Statement { alg, sig, x5c, credential_certificate_key, attestation_extension })
}

// ============================================================================
// Attestation Extension Parsing
// ============================================================================

/// Parses the KeyDescription structure from the extension payload.
///
/// ASN.1 Structure:
/// ```asn1
/// KeyDescription ::= SEQUENCE {
///     attestationVersion         INTEGER,
///     attestationSecurityLevel   SecurityLevel,
///     keymasterVersion           INTEGER,
///     keymasterSecurityLevel     SecurityLevel,
///     attestationChallenge       OCTET STRING,
///     uniqueId                   OCTET STRING,
///     softwareEnforced           AuthorizationList,
///     teeEnforced                AuthorizationList,
/// }
/// ```
fn parse_attestation_extension(data: &[u8]) -> Result<AttestationExtension, String> {
    let root = der_util::parse_one(data)?;
    let fields = der_util::as_sequence(&root)?;
    if fields.len() < 8 {
        return Err(format!("KeyDescription requires 8 fields, got {}", fields.len()));
    }

    der_util::as_i64(&fields[0])?; // attestationVersion
    der_util::as_i64(&fields[1])?; // attestationSecurityLevel
    der_util::as_i64(&fields[2])?; // keymasterVersion
    der_util::as_i64(&fields[3])?; // keymasterSecurityLevel

    let challenge = der_util::as_octets(&fields[4])?;
    if challenge.len() != 32 {
        return Err(format!(
            "attestation challenge must be a 32-byte digest, got {} bytes",
            challenge.len()
        ));
    }

    // fields[5] is uniqueId: exactly one element, skipped without inspection

    let software_enforced = parse_authorization_list(&fields[6])?;
    let tee_enforced = parse_authorization_list(&fields[7])?;

    Ok(AttestationExtension {
        attestation_challenge: challenge.to_vec(),
        software_enforced,
        tee_enforced,
    })
}

/// Walks an AuthorizationList, enforcing the declared tag order.
fn parse_authorization_list(obj: &BerObject) -> Result<AuthorizationList, String> {
    let items = der_util::as_sequence(obj)?;
    let mut list = AuthorizationList::default();
    let mut allowed = AUTHORIZATION_TAGS;

    for item in items {
        let tag = item.tag().0;
        let position = allowed
            .iter()
            .position(|&t| t == tag)
            .ok_or_else(|| format!("unexpected tag [{tag}] in authorization list"))?;
        allowed = &allowed[position + 1..];

        match tag {
            1 => {
                let inner = der_util::explicit_inner(item)?;
                let mut purpose = BTreeSet::new();
                for value in der_util::as_set(&inner)? {
                    purpose.insert(der_util::as_i64(value)?);
                }
                list.purpose = Some(purpose);
            }
            600 => {
                list.all_applications = Some(());
            }
            702 => {
                let inner = der_util::explicit_inner(item)?;
                list.origin = Some(der_util::as_i64(&inner)?);
            }
            _ => {}
        }
    }

    Ok(list)
}

// ============================================================================
// Verification
// ============================================================================

/// Verifies an android-key attestation statement.
///
/// Steps, each with its own error kind:
/// 1. Verify `sig` over `authenticator_data || client_data_hash` with the
///    credential certificate key.
/// 2. Verify the credential key in authenticator data equals the
///    certificate key, by canonical key material.
/// 3. Verify the attestation challenge equals the client-data hash.
/// 4. Reject statements whose authorization lists scope the key to all
///    applications.
/// 5. Verify key origin and purpose in the list(s) selected by
///    `required_trust_level`.
pub fn verify_statement(
    statement: &Statement,
    authenticator_data: &[u8],
    client_data_hash: &[u8; 32],
    required_trust_level: TrustLevel,
) -> Result<VerifiedAttestation, VerifyError> {
    let mut message = Vec::with_capacity(authenticator_data.len() + client_data_hash.len());
    message.extend_from_slice(authenticator_data);
    message.extend_from_slice(client_data_hash);

    statement
        .credential_certificate_key
        .verify(statement.alg, &message, &statement.sig)
        .map_err(|detail| {
            tracing::warn!(step = "signature", %detail, "android-key verification failed");
            VerifyError::VerificationFailure(detail)
        })?;
    tracing::debug!(step = "signature", "attestation signature verified");

    let auth_data = crate::authenticator_data::parse_authenticator_data(authenticator_data)
        .map_err(|e| VerifyError::VerificationFailure(e.to_string()))?;
    let attested = auth_data.attested_credential.as_ref().ok_or_else(|| {
        VerifyError::VerificationFailure(
            "authenticator data carries no attested credential".to_string(),
        )
    })?;
    let credential_key = PublicKey::from_cose_bytes(&attested.public_key_cbor)
        .map_err(VerifyError::VerificationFailure)?;
    if credential_key != statement.credential_certificate_key {
        tracing::warn!(step = "credential_key", "android-key verification failed");
        return Err(VerifyError::CredentialKeyMismatch);
    }
    tracing::debug!(step = "credential_key", "credential key matches certificate key");

    if statement.attestation_extension.attestation_challenge != client_data_hash {
        tracing::warn!(step = "challenge", "android-key verification failed");
        return Err(VerifyError::ClientDataHashMismatch);
    }
    tracing::debug!(step = "challenge", "attestation challenge matches client data hash");

    let software = &statement.attestation_extension.software_enforced;
    let tee = &statement.attestation_extension.tee_enforced;

    if software.all_applications.is_some() || tee.all_applications.is_some() {
        tracing::warn!(step = "all_applications", "android-key verification failed");
        return Err(VerifyError::AllApplicationsFieldFound);
    }

    let expected_purpose = BTreeSet::from([KM_PURPOSE_SIGN]);
    match required_trust_level {
        TrustLevel::TeeEnforced => {
            if tee.origin != Some(KM_ORIGIN_GENERATED) {
                tracing::warn!(step = "origin", "android-key verification failed");
                return Err(VerifyError::OriginFieldInvalid);
            }
            if tee.purpose.as_ref() != Some(&expected_purpose) {
                tracing::warn!(step = "purpose", "android-key verification failed");
                return Err(VerifyError::PurposeFieldInvalid);
            }
        }
        TrustLevel::SoftwareEnforced => {
            if software.origin != Some(KM_ORIGIN_GENERATED)
                && tee.origin != Some(KM_ORIGIN_GENERATED)
            {
                tracing::warn!(step = "origin", "android-key verification failed");
                return Err(VerifyError::OriginFieldInvalid);
            }
            if software.purpose.as_ref() != Some(&expected_purpose)
                && tee.purpose.as_ref() != Some(&expected_purpose)
            {
                tracing::warn!(step = "purpose", "android-key verification failed");
                return Err(VerifyError::PurposeFieldInvalid);
            }
        }
    }
    tracing::debug!(
        step = "authorization",
        trust_level = %required_trust_level,
        "authorization lists accepted"
    );

    Ok(VerifiedAttestation {
        attestation_type: AttestationType::Basic,
        trust_path: statement.x5c.clone(),
    })
}

// ============================================================================
// Unit Tests
// ============================================================================
