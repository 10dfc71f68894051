//! Shared policy and result types.

use serde::{Deserialize, Serialize};

/// How strongly a successful verification binds the credential to hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestationType {
    /// The authenticator proved possession of an attestation key pair; the
    /// caller decides how far to trust the chain (android-key).
    Basic,
    /// Verifiable attestation whose exact kind is left to the caller's
    /// chain validation and metadata policy (tpm).
    Uncertain,
}

impl std::fmt::Display for AttestationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttestationType::Basic => write!(f, "basic"),
            AttestationType::Uncertain => write!(f, "uncertain"),
        }
    }
}

/// Policy choice for android-key attestation: which authorization list must
/// vouch for key origin and purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Accept software-enforced authorization lists as well.
    SoftwareEnforced,
    /// Require the TEE-enforced authorization list.
    TeeEnforced,
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrustLevel::SoftwareEnforced => write!(f, "software_enforced"),
            TrustLevel::TeeEnforced => write!(f, "tee_enforced"),
        }
    }
}

/// Result of a successful statement verification.
///
/// `trust_path` is the statement's `x5c` in original order; the caller is
/// expected to validate it against a trust anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAttestation {
    pub attestation_type: AttestationType,
    pub trust_path: Vec<Vec<u8>>,
}
