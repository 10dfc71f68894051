//! Minimal view of the WebAuthn authenticator-data structure.
//!
//! Attestation verification needs three things from authenticator data: the
//! raw bytes (they are part of the signed message), the AAGUID, and the
//! credential public key. Everything else is the registration ceremony's
//! concern.

/// Attested credential data is present.
pub const FLAG_ATTESTED_CREDENTIAL_DATA: u8 = 0x40;
/// Extension data follows the credential public key.
pub const FLAG_EXTENSION_DATA: u8 = 0x80;

/// Parsed authenticator data.
///
/// AuthData layout:
/// | Offset | Length | Field                    |
/// |--------|--------|--------------------------|
/// | 0      | 32     | RP ID Hash (SHA256)      |
/// | 32     | 1      | Flags                    |
/// | 33     | 4      | Counter (big-endian u32) |
/// | 37     | 16     | AAGUID                   |
/// | 53     | 2      | Credential ID Length (L) |
/// | 55     | L      | Credential ID            |
/// | 55+L   | var    | COSE Public Key (CBOR)   |
///
/// Fields from offset 37 on are only present when the AT flag is set.
#[derive(Debug, Clone)]
pub struct AuthenticatorData {
    /// RP ID Hash (SHA256 of the relying party identifier)
    pub rp_id_hash: [u8; 32],
    /// Flags byte
    pub flags: u8,
    /// Signature counter
    pub counter: u32,
    /// Attested credential data, present when the AT flag is set
    pub attested_credential: Option<AttestedCredentialData>,
}

/// The attested credential data block.
#[derive(Debug, Clone)]
pub struct AttestedCredentialData {
    /// Authenticator model identifier
    pub aaguid: [u8; 16],
    /// Credential ID (key identifier)
    pub credential_id: Vec<u8>,
    /// Credential public key and any trailing extension bytes, CBOR-encoded
    pub public_key_cbor: Vec<u8>,
}

/// Errors from parsing authenticator data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDataError {
    /// Data shorter than the fixed header or the declared credential ID
    TooShort { len: usize, expected: usize },
    /// AT flag set but no public key bytes follow the credential ID
    MissingPublicKey,
}

impl std::fmt::Display for AuthDataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthDataError::TooShort { len, expected } => {
                write!(f, "authenticator data too short: {len} bytes, expected at least {expected}")
            }
            AuthDataError::MissingPublicKey => {
                write!(f, "attested credential data carries no public key")
            }
        }
    }
}

impl std::error::Error for AuthDataError {}

/// Parses the binary authenticator-data structure.
pub fn parse_authenticator_data(data: &[u8]) -> Result<AuthenticatorData, AuthDataError> {
    if data.len() < 37 {
        return Err(AuthDataError::TooShort { len: data.len(), expected: 37 });
    }

    let mut rp_id_hash = [0u8; 32];
    rp_id_hash.copy_from_slice(&data[0..32]);

    let flags = data[32];

    let mut counter_bytes = [0u8; 4];
    counter_bytes.copy_from_slice(&data[33..37]);
    let counter = u32::from_be_bytes(counter_bytes);

    let attested_credential = if flags & FLAG_ATTESTED_CREDENTIAL_DATA != 0 {
        if data.len() < 55 {
            return Err(AuthDataError::TooShort { len: data.len(), expected: 55 });
        }

        let mut aaguid = [0u8; 16];
        aaguid.copy_from_slice(&data[37..53]);

        let mut id_len_bytes = [0u8; 2];
        id_len_bytes.copy_from_slice(&data[53..55]);
        let cred_id_len = usize::from(u16::from_be_bytes(id_len_bytes));

        if data.len() < 55 + cred_id_len {
            return Err(AuthDataError::TooShort {
                len: data.len(),
                expected: 55 + cred_id_len,
            });
        }

        let credential_id = data[55..55 + cred_id_len].to_vec();
        let public_key_cbor = data[55 + cred_id_len..].to_vec();

        if public_key_cbor.is_empty() {
            return Err(AuthDataError::MissingPublicKey);
        }

        Some(AttestedCredentialData { aaguid, credential_id, public_key_cbor })
    } else {
        None
    };

    Ok(AuthenticatorData { rp_id_hash, flags, counter, attested_credential })
}
