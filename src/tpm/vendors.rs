//! Registered TPM vendor identifiers.
//!
//! The TCG vendor ID registry packs each vendor's four ASCII bytes into the
//! hex portion of an `id:XXXXXXXX` manufacturer string. The FIDO conformance
//! test vendor is included alongside the hardware vendors.

/// Hex portions of the accepted `id:XXXXXXXX` manufacturer strings.
pub const TPM_MANUFACTURERS: &[&str] = &[
    "FFFFF1D0", // FIDO conformance testing
    "414D4400", // AMD
    "41544D4C", // Atmel
    "4252434D", // Broadcom
    "4353434F", // Cisco
    "464C5953", // Flysight
    "474F4F47", // Google
    "48504500", // HPE
    "49424D00", // IBM
    "49465800", // Infineon
    "494E5443", // Intel
    "4C454E00", // Lenovo
    "4D534654", // Microsoft
    "4E534D20", // National Semiconductor
    "4E545A00", // Nationz
    "4E544300", // Nuvoton
    "51434F4D", // Qualcomm
    "524F4343", // Fuzhou Rockchip
    "534D5343", // SMSC
    "534D534E", // Samsung
    "534E5300", // Sinosun
    "53544D20", // STMicroelectronics
    "54584E00", // Texas Instruments
    "57454300", // Winbond
];

/// Whether a SAN manufacturer value names a registered vendor.
///
/// The hex portion compares case-insensitively.
pub fn is_known_manufacturer(value: &str) -> bool {
    value
        .strip_prefix("id:")
        .is_some_and(|hex| TPM_MANUFACTURERS.iter().any(|known| known.eq_ignore_ascii_case(hex)))
}
