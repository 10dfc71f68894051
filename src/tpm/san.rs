//! TPM Subject Alternative Name extension.
//!
//! The TCG EK credential profile puts the device triple (manufacturer,
//! model, version) into a directoryName, but real TPMs disagree on whether
//! the surrounding structure is a set of sequences or a sequence of sets.
//! The walk below is structure-agnostic: it collects every
//! `(OID, DirectoryString)` pair at any nesting depth and only then looks
//! for the three TCG attributes.

use der_parser::ber::{BerObject, BerObjectContent};

const TCG_AT_TPM_MANUFACTURER: &str = "2.23.133.2.1";
const TCG_AT_TPM_MODEL: &str = "2.23.133.2.2";
const TCG_AT_TPM_VERSION: &str = "2.23.133.2.3";

/// The TCG device triple from an AIK certificate's SAN extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAlternativeName {
    /// Vendor identifier, `id:XXXXXXXX`
    pub manufacturer: String,
    /// Device model
    pub model: String,
    /// Firmware version
    pub version: String,
}

/// Parses the extension payload into the TCG device triple.
///
/// The error string names the first missing attribute.
pub fn parse_tpm_san(data: &[u8]) -> Result<SubjectAlternativeName, String> {
    let objects = crate::der_util::parse_all(data)?;
    let mut pairs = Vec::new();
    for obj in &objects {
        collect_directory_pairs(obj, &mut pairs);
    }

    let lookup = |oid: &str, what: &str| {
        pairs
            .iter()
            .find(|(o, _)| o == oid)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| format!("subject alternative name carries no {what}"))
    };

    Ok(SubjectAlternativeName {
        manufacturer: lookup(TCG_AT_TPM_MANUFACTURER, "tpmManufacturer")?,
        model: lookup(TCG_AT_TPM_MODEL, "tpmModel")?,
        version: lookup(TCG_AT_TPM_VERSION, "tpmVersion")?,
    })
}

/// Collects `(OID, DirectoryString)` pairs regardless of nesting shape.
fn collect_directory_pairs(obj: &BerObject, out: &mut Vec<(String, String)>) {
    match &obj.content {
        BerObjectContent::Sequence(items) => {
            if items.len() == 2 {
                if let BerObjectContent::OID(oid) = &items[0].content {
                    if let Ok(text) = items[1].as_str() {
                        out.push((oid.to_id_string(), text.to_string()));
                        return;
                    }
                }
            }
            for item in items {
                collect_directory_pairs(item, out);
            }
        }
        BerObjectContent::Set(items) => {
            for item in items {
                collect_directory_pairs(item, out);
            }
        }
        BerObjectContent::Unknown(any) => {
            // context tags ([4] directoryName and friends): walk the inner
            // encoding when there is one, skip silently when there is not
            let mut remaining = any.data;
            while !remaining.is_empty() {
                match der_parser::parse_der(remaining) {
                    Ok((rest, inner)) => {
                        collect_directory_pairs(&inner, out);
                        remaining = rest;
                    }
                    Err(_) => break,
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::der_util::build;

    fn attribute(oid: &[u64], value: &str) -> Vec<u8> {
        build::seq(&[build::oid(oid), build::utf8(value)])
    }

    /// RFC 5280 shape: GeneralNames -> [4] -> RDNSequence of SETs.
    fn rfc5280_san() -> Vec<u8> {
        let name = build::seq(&[
            build::set(&[attribute(&[2, 23, 133, 2, 1], "id:FFFFF1D0")]),
            build::set(&[attribute(&[2, 23, 133, 2, 2], "NPCT6xx")]),
            build::set(&[attribute(&[2, 23, 133, 2, 3], "id:13")]),
        ]);
        build::seq(&[build::ctx(4, &name)])
    }

    /// Vendor variant: one SET holding a SEQUENCE of attributes.
    fn inverted_san() -> Vec<u8> {
        let name = build::set(&[build::seq(&[
            attribute(&[2, 23, 133, 2, 1], "id:53544D20"),
            attribute(&[2, 23, 133, 2, 2], "ST33HTPH"),
            attribute(&[2, 23, 133, 2, 3], "id:42"),
        ])]);
        build::seq(&[build::ctx(4, &name)])
    }

    #[test]
    fn rfc5280_nesting_parses() {
        let san = parse_tpm_san(&rfc5280_san()).expect("parse");
        assert_eq!(san.manufacturer, "id:FFFFF1D0");
        assert_eq!(san.model, "NPCT6xx");
        assert_eq!(san.version, "id:13");
    }

    #[test]
    fn inverted_nesting_parses() {
        let san = parse_tpm_san(&inverted_san()).expect("parse");
        assert_eq!(san.manufacturer, "id:53544D20");
        assert_eq!(san.model, "ST33HTPH");
        assert_eq!(san.version, "id:42");
    }

    #[test]
    fn missing_attribute_named_in_error() {
        let name = build::seq(&[
            build::set(&[attribute(&[2, 23, 133, 2, 1], "id:FFFFF1D0")]),
            build::set(&[attribute(&[2, 23, 133, 2, 3], "id:13")]),
        ]);
        let der = build::seq(&[build::ctx(4, &name)]);
        let err = parse_tpm_san(&der).expect_err("missing model");
        assert!(err.contains("tpmModel"));
    }

    #[test]
    fn unrelated_general_names_are_skipped() {
        // a [2] dNSName (primitive, not DER inside) before the directoryName
        let mut general_names = build::tlv(0x82, b"tpm.example.com");
        let name = build::seq(&[build::set(&[attribute(&[2, 23, 133, 2, 1], "id:494E5443")])]);
        general_names.extend_from_slice(&build::ctx(4, &name));
        let der = build::seq(&[general_names]);

        // only the manufacturer is present, so the triple is incomplete
        let err = parse_tpm_san(&der).expect_err("incomplete");
        assert!(err.contains("tpmModel"));
    }

    #[test]
    fn printable_strings_accepted() {
        let name = build::seq(&[
            build::set(&[build::seq(&[
                build::oid(&[2, 23, 133, 2, 1]),
                build::tlv(0x13, b"id:49424D00"), // PrintableString
            ])]),
            build::set(&[attribute(&[2, 23, 133, 2, 2], "IBM SW TPM")]),
            build::set(&[attribute(&[2, 23, 133, 2, 3], "id:2.0")]),
        ]);
        let der = build::seq(&[build::ctx(4, &name)]);
        let san = parse_tpm_san(&der).expect("parse");
        assert_eq!(san.manufacturer, "id:49424D00");
    }
}
