//! Shared fixture builders for end-to-end attestation tests.
//!
//! Statements are assembled from scratch: DER certificates, TPM wire blobs
//! and authenticator data are constructed byte by byte, and signatures are
//! produced with freshly generated keys. Certificates carry placeholder
//! outer signatures; statement verification never checks them (chain
//! validation is the caller's job).

#![allow(dead_code)]

use ciborium::Value;

// ============================================================================
// DER building blocks
// ============================================================================

pub fn len_bytes(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else if len < 0x100 {
        vec![0x81, len as u8]
    } else {
        vec![0x82, (len >> 8) as u8, len as u8]
    }
}

pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    out.extend_from_slice(&len_bytes(content.len()));
    out.extend_from_slice(content);
    out
}

pub fn seq(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

pub fn set(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x31, &parts.concat())
}

pub fn int(value: i64) -> Vec<u8> {
    let mut bytes = value.to_be_bytes().to_vec();
    while bytes.len() > 1
        && ((bytes[0] == 0x00 && bytes[1] & 0x80 == 0)
            || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0))
    {
        bytes.remove(0);
    }
    tlv(0x02, &bytes)
}

/// INTEGER from unsigned magnitude bytes, sign byte added when needed.
pub fn uint_bytes(magnitude: &[u8]) -> Vec<u8> {
    let mut content = magnitude.to_vec();
    while content.len() > 1 && content[0] == 0 && content[1] & 0x80 == 0 {
        content.remove(0);
    }
    if content.first().is_some_and(|b| b & 0x80 != 0) {
        content.insert(0, 0x00);
    }
    tlv(0x02, &content)
}

pub fn enumerated(value: i64) -> Vec<u8> {
    let mut encoded = int(value);
    encoded[0] = 0x0A;
    encoded
}

pub fn octet(content: &[u8]) -> Vec<u8> {
    tlv(0x04, content)
}

pub fn null() -> Vec<u8> {
    vec![0x05, 0x00]
}

pub fn boolean(value: bool) -> Vec<u8> {
    tlv(0x01, &[if value { 0xFF } else { 0x00 }])
}

pub fn utf8(text: &str) -> Vec<u8> {
    tlv(0x0C, text.as_bytes())
}

pub fn utc_time(text: &str) -> Vec<u8> {
    tlv(0x17, text.as_bytes())
}

pub fn bit_string(data: &[u8]) -> Vec<u8> {
    let mut content = vec![0x00];
    content.extend_from_slice(data);
    tlv(0x03, &content)
}

fn base128(mut value: u64) -> Vec<u8> {
    let mut out = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        out.insert(0, 0x80 | (value & 0x7F) as u8);
        value >>= 7;
    }
    out
}

pub fn oid(components: &[u64]) -> Vec<u8> {
    let mut content = vec![(components[0] * 40 + components[1]) as u8];
    for &component in &components[2..] {
        content.extend_from_slice(&base128(component));
    }
    tlv(0x06, &content)
}

/// `[n]` constructed context tag, high tag numbers included.
pub fn ctx(number: u32, content: &[u8]) -> Vec<u8> {
    if number < 31 {
        tlv(0xA0 | number as u8, content)
    } else {
        let mut out = vec![0xBF];
        out.extend_from_slice(&base128(u64::from(number)));
        out.extend_from_slice(&len_bytes(content.len()));
        out.extend_from_slice(content);
        out
    }
}

// ============================================================================
// Certificates
// ============================================================================

pub fn name_with_cn(common_name: &str) -> Vec<u8> {
    seq(&[set(&[seq(&[oid(&[2, 5, 4, 3]), utf8(common_name)])])])
}

pub fn empty_name() -> Vec<u8> {
    seq(&[])
}

fn algorithm_ecdsa_sha256() -> Vec<u8> {
    seq(&[oid(&[1, 2, 840, 10045, 4, 3, 2])])
}

pub fn ec_p256_spki(x: &[u8; 32], y: &[u8; 32]) -> Vec<u8> {
    let mut point = vec![0x04];
    point.extend_from_slice(x);
    point.extend_from_slice(y);
    seq(&[
        seq(&[oid(&[1, 2, 840, 10045, 2, 1]), oid(&[1, 2, 840, 10045, 3, 1, 7])]),
        bit_string(&point),
    ])
}

pub fn rsa_spki(modulus: &[u8], exponent: &[u8]) -> Vec<u8> {
    seq(&[
        seq(&[oid(&[1, 2, 840, 113549, 1, 1, 1]), null()]),
        bit_string(&seq(&[uint_bytes(modulus), uint_bytes(exponent)])),
    ])
}

pub fn extension(extension_oid: &[u64], critical: Option<bool>, value: &[u8]) -> Vec<u8> {
    let mut parts = vec![oid(extension_oid)];
    if let Some(critical) = critical {
        parts.push(boolean(critical));
    }
    parts.push(octet(value));
    seq(&parts)
}

/// A v3 certificate with a placeholder outer signature.
pub fn certificate(subject: &[u8], spki: &[u8], extensions: &[Vec<u8>]) -> Vec<u8> {
    let tbs = seq(&[
        ctx(0, &int(2)),
        int(0x1001),
        algorithm_ecdsa_sha256(),
        name_with_cn("Attestation Test CA"),
        seq(&[utc_time("250101000000Z"), utc_time("350101000000Z")]),
        subject.to_vec(),
        spki.to_vec(),
        ctx(3, &seq(extensions)),
    ]);
    seq(&[tbs, algorithm_ecdsa_sha256(), bit_string(&[0u8; 8])])
}

// ============================================================================
// Android attestation extension
// ============================================================================

pub const ANDROID_KEY_ATTESTATION_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 11129, 2, 1, 17];

pub fn purpose_field(values: &[i64]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = values.iter().map(|&v| int(v)).collect();
    ctx(1, &set(&encoded))
}

pub fn origin_field(value: i64) -> Vec<u8> {
    ctx(702, &int(value))
}

pub fn all_applications_field() -> Vec<u8> {
    ctx(600, &null())
}

pub fn key_description(
    challenge: &[u8; 32],
    software_enforced: &[Vec<u8>],
    tee_enforced: &[Vec<u8>],
) -> Vec<u8> {
    seq(&[
        int(3),
        enumerated(1),
        int(4),
        enumerated(1),
        octet(challenge),
        octet(&[]),
        seq(software_enforced),
        seq(tee_enforced),
    ])
}

// ============================================================================
// AIK certificate extensions
// ============================================================================

pub const FIDO_GEN_CE_AAGUID_OID: &[u64] = &[1, 3, 6, 1, 4, 1, 45724, 1, 1, 4];

pub fn tpm_san_extension(manufacturer: &str, model: &str, version: &str) -> Vec<u8> {
    let attribute = |attribute_oid: &[u64], value: &str| {
        set(&[seq(&[oid(attribute_oid), utf8(value)])])
    };
    let name = seq(&[
        attribute(&[2, 23, 133, 2, 1], manufacturer),
        attribute(&[2, 23, 133, 2, 2], model),
        attribute(&[2, 23, 133, 2, 3], version),
    ]);
    extension(&[2, 5, 29, 17], Some(true), &seq(&[ctx(4, &name)]))
}

pub fn aik_eku_extension() -> Vec<u8> {
    extension(&[2, 5, 29, 37], None, &seq(&[oid(&[2, 23, 133, 8, 3])]))
}

pub fn basic_constraints_extension(ca: bool) -> Vec<u8> {
    let content = if ca { seq(&[boolean(true)]) } else { seq(&[]) };
    extension(&[2, 5, 29, 19], Some(true), &content)
}

pub fn aaguid_extension(aaguid: &[u8; 16]) -> Vec<u8> {
    extension(FIDO_GEN_CE_AAGUID_OID, None, &octet(aaguid))
}

// ============================================================================
// Authenticator data and COSE keys
// ============================================================================

pub fn ec2_cose_key(x: &[u8; 32], y: &[u8; 32]) -> Vec<u8> {
    encode_cbor(&Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer(2.into())),
        (Value::Integer(3.into()), Value::Integer((-7).into())),
        (Value::Integer((-1).into()), Value::Integer(1.into())),
        (Value::Integer((-2).into()), Value::Bytes(x.to_vec())),
        (Value::Integer((-3).into()), Value::Bytes(y.to_vec())),
    ]))
}

pub fn rsa_cose_key(n: &[u8], e: &[u8]) -> Vec<u8> {
    encode_cbor(&Value::Map(vec![
        (Value::Integer(1.into()), Value::Integer(3.into())),
        (Value::Integer(3.into()), Value::Integer((-257).into())),
        (Value::Integer((-1).into()), Value::Bytes(n.to_vec())),
        (Value::Integer((-2).into()), Value::Bytes(e.to_vec())),
    ]))
}

pub fn authenticator_data(
    aaguid: &[u8; 16],
    credential_id: &[u8],
    public_key_cbor: &[u8],
) -> Vec<u8> {
    let mut out = vec![0u8; 32]; // rpIdHash
    out.push(0x41); // AT | UP
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(aaguid);
    out.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
    out.extend_from_slice(credential_id);
    out.extend_from_slice(public_key_cbor);
    out
}

pub fn encode_cbor(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::into_writer(value, &mut out).expect("CBOR encoding");
    out
}

// ============================================================================
// TPM wire blobs
// ============================================================================

pub fn sized(bytes: &[u8]) -> Vec<u8> {
    let mut out = (bytes.len() as u16).to_be_bytes().to_vec();
    out.extend_from_slice(bytes);
    out
}

pub fn tpm_attest_blob(magic: u32, attestation_type: u16, extra_data: &[u8], name: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&magic.to_be_bytes());
    out.extend_from_slice(&attestation_type.to_be_bytes());
    out.extend_from_slice(&sized(b"qualified-signer"));
    out.extend_from_slice(&sized(extra_data));
    out.extend_from_slice(&1000u64.to_be_bytes()); // clock
    out.extend_from_slice(&1u32.to_be_bytes()); // resetCount
    out.extend_from_slice(&0u32.to_be_bytes()); // restartCount
    out.push(1); // safe
    out.extend_from_slice(&0x2020_0001u64.to_be_bytes()); // firmwareVersion
    out.extend_from_slice(&sized(name));
    out.extend_from_slice(&sized(b"qualified-name"));
    out
}

pub fn tpm_ecc_public_blob(name_alg: u16, x: &[u8; 32], y: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x0023u16.to_be_bytes()); // TPM_ALG_ECC
    out.extend_from_slice(&name_alg.to_be_bytes());
    out.extend_from_slice(&0x0004_0072u32.to_be_bytes()); // objectAttributes
    out.extend_from_slice(&sized(&[])); // authPolicy
    out.extend_from_slice(&0x0010u16.to_be_bytes()); // symmetric: TPM_ALG_NULL
    out.extend_from_slice(&0x0010u16.to_be_bytes()); // scheme: TPM_ALG_NULL
    out.extend_from_slice(&0x0003u16.to_be_bytes()); // TPM_ECC_NIST_P256
    out.extend_from_slice(&0x0010u16.to_be_bytes()); // kdf: TPM_ALG_NULL
    out.extend_from_slice(&sized(x));
    out.extend_from_slice(&sized(y));
    out
}

pub fn tpm_rsa_public_blob(name_alg: u16, exponent: u32, modulus: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&0x0001u16.to_be_bytes()); // TPM_ALG_RSA
    out.extend_from_slice(&name_alg.to_be_bytes());
    out.extend_from_slice(&0x0004_0072u32.to_be_bytes());
    out.extend_from_slice(&sized(&[]));
    out.extend_from_slice(&0x0010u16.to_be_bytes()); // symmetric
    out.extend_from_slice(&0x0010u16.to_be_bytes()); // scheme
    out.extend_from_slice(&2048u16.to_be_bytes()); // keyBits
    out.extend_from_slice(&exponent.to_be_bytes());
    out.extend_from_slice(&sized(modulus));
    out
}

// ============================================================================
// Statement maps
// ============================================================================

pub fn android_key_statement_map(alg: i64, sig: &[u8], x5c: &[Vec<u8>]) -> Value {
    Value::Map(vec![
        (Value::Text("alg".to_string()), Value::Integer(alg.into())),
        (Value::Text("sig".to_string()), Value::Bytes(sig.to_vec())),
        (
            Value::Text("x5c".to_string()),
            Value::Array(x5c.iter().map(|c| Value::Bytes(c.clone())).collect()),
        ),
    ])
}

pub fn tpm_statement_map(
    alg: i64,
    x5c: &[Vec<u8>],
    sig: &[u8],
    cert_info: &[u8],
    pub_area: &[u8],
) -> Value {
    Value::Map(vec![
        (Value::Text("ver".to_string()), Value::Text("2.0".to_string())),
        (Value::Text("alg".to_string()), Value::Integer(alg.into())),
        (
            Value::Text("x5c".to_string()),
            Value::Array(x5c.iter().map(|c| Value::Bytes(c.clone())).collect()),
        ),
        (Value::Text("sig".to_string()), Value::Bytes(sig.to_vec())),
        (Value::Text("certInfo".to_string()), Value::Bytes(cert_info.to_vec())),
        (Value::Text("pubArea".to_string()), Value::Bytes(pub_area.to_vec())),
    ])
}
