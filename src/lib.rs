//! Verification of hardware-rooted WebAuthn attestation statements.
//!
//! This crate decides whether an attestation statement produced during a
//! WebAuthn registration ceremony cryptographically binds the new credential
//! to a genuine hardware keystore. Two formats are supported:
//!
//! - `android-key`: the credential certificate carries the Android keystore
//!   attestation extension (OID 1.3.6.1.4.1.11129.2.1.17) and the statement
//!   signature is made with the credential key itself.
//! - `tpm`: an Attestation Identity Key on a TPM 2.0 signs a `TPMS_ATTEST`
//!   structure over the ceremony data, certifying the credential key held in
//!   a `TPMT_PUBLIC` area.
//!
//! Each format exposes a `decode_statement` function (CBOR map to statement)
//! and a `verify_statement` function (statement + authenticator data +
//! client-data hash to an accept/reject decision). Certificate chain
//! validation to a trust anchor is the caller's job; the verified trust path
//! is returned in certificate order together with the embedded TPM root
//! store in [`tpm_roots`].
//!
//! All operations are pure and synchronous: no I/O, no globals beyond the
//! lazily parsed root store, no mutation of inputs.

pub mod android_key;
pub mod authenticator_data;
mod cbor_util;
pub mod cose;
mod der_util;
pub mod tpm;
pub mod tpm_roots;
pub mod types;

pub use types::{AttestationType, TrustLevel, VerifiedAttestation};
