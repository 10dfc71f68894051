//! Embedded TPM root-certificate store.
//!
//! The DER files under `root-certs/tpm/` are compiled into the binary. The
//! tag of each anchor is the vendor directory it was packaged under. The
//! store itself does not walk chains; callers validate a statement's trust
//! path against these anchors after verification.

use std::sync::OnceLock;

use thiserror::Error;
use x509_parser::prelude::*;

/// One embedded trust anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrustAnchor {
    /// Vendor directory the certificate was packaged under
    pub tag: &'static str,
    /// File name within the vendor directory
    pub name: &'static str,
    /// DER-encoded X.509 certificate
    pub der: &'static [u8],
}

/// Embedded files: (vendor tag, file name, DER bytes).
const EMBEDDED: &[TrustAnchor] = &[
    TrustAnchor {
        tag: "Infineon",
        name: "infineon-optiga-root-ca.der",
        der: include_bytes!("../root-certs/tpm/Infineon/infineon-optiga-root-ca.der"),
    },
    TrustAnchor {
        tag: "Microsoft",
        name: "microsoft-tpm-root-ca-2014.der",
        der: include_bytes!("../root-certs/tpm/Microsoft/microsoft-tpm-root-ca-2014.der"),
    },
    TrustAnchor {
        tag: "NationZ",
        name: "nationz-tpm-root-01.der",
        der: include_bytes!("../root-certs/tpm/NationZ/nationz-tpm-root-01.der"),
    },
    TrustAnchor {
        tag: "Nuvoton",
        name: "nuvoton-tpm-root-ca-2110.der",
        der: include_bytes!("../root-certs/tpm/Nuvoton/nuvoton-tpm-root-ca-2110.der"),
    },
    TrustAnchor {
        tag: "STMicroelectronics",
        name: "stm-tpm-ek-root-ca.der",
        der: include_bytes!("../root-certs/tpm/STMicroelectronics/stm-tpm-ek-root-ca.der"),
    },
];

/// Errors from constructing the root store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RootStoreError {
    #[error("root certificate {tag}/{name} is not valid DER X.509: {detail}")]
    InvalidCertificate { tag: &'static str, name: &'static str, detail: String },
}

/// The parsed, immutable TPM root store.
#[derive(Debug, Clone)]
pub struct TpmRootStore {
    anchors: Vec<TrustAnchor>,
}

impl TpmRootStore {
    /// Parses every embedded certificate; any failure fails construction.
    pub fn load() -> Result<Self, RootStoreError> {
        let mut anchors = Vec::with_capacity(EMBEDDED.len());
        for anchor in EMBEDDED {
            X509Certificate::from_der(anchor.der).map_err(|e| {
                RootStoreError::InvalidCertificate {
                    tag: anchor.tag,
                    name: anchor.name,
                    detail: format!("{e:?}"),
                }
            })?;
            anchors.push(*anchor);
        }
        Ok(TpmRootStore { anchors })
    }

    /// Every anchor, in packaging order.
    pub fn anchors(&self) -> &[TrustAnchor] {
        &self.anchors
    }

    /// Anchors packaged under the given vendor tag.
    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a TrustAnchor> {
        self.anchors.iter().filter(move |anchor| anchor.tag == tag)
    }
}

/// The process-wide store, constructed on first use and never reloaded.
pub fn global() -> Result<&'static TpmRootStore, &'static RootStoreError> {
    static STORE: OnceLock<Result<TpmRootStore, RootStoreError>> = OnceLock::new();
    STORE.get_or_init(TpmRootStore::load).as_ref()
}
