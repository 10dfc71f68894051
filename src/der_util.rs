//! Small helpers for walking raw DER with `der_parser`.
//!
//! Certificate bodies are handled by `x509-parser`; these helpers cover the
//! vendor extension payloads that have to be traversed by hand.

use der_parser::ber::{BerObject, BerObjectContent};

/// Parses exactly one DER object from `data`; trailing bytes are an error.
pub(crate) fn parse_one(data: &[u8]) -> Result<BerObject<'_>, String> {
    let (rest, obj) =
        der_parser::parse_der(data).map_err(|e| format!("invalid DER: {e:?}"))?;
    if !rest.is_empty() {
        return Err(format!("{} trailing bytes after DER object", rest.len()));
    }
    Ok(obj)
}

/// Parses every DER object in `data`, in order.
pub(crate) fn parse_all(data: &[u8]) -> Result<Vec<BerObject<'_>>, String> {
    let mut objects = Vec::new();
    let mut remaining = data;
    while !remaining.is_empty() {
        let (rest, obj) =
            der_parser::parse_der(remaining).map_err(|e| format!("invalid DER: {e:?}"))?;
        objects.push(obj);
        remaining = rest;
    }
    Ok(objects)
}

/// Unwraps an `[n] EXPLICIT` context tag and parses the single object inside.
pub(crate) fn explicit_inner<'a>(obj: &BerObject<'a>) -> Result<BerObject<'a>, String> {
    match &obj.content {
        BerObjectContent::Unknown(any) => parse_one(any.data),
        other => Err(format!("expected context-specific tag, got {other:?}")),
    }
}

/// Reads an INTEGER or ENUMERATED as `i64`, two's complement.
pub(crate) fn as_i64(obj: &BerObject) -> Result<i64, String> {
    match &obj.content {
        BerObjectContent::Integer(bytes) => {
            if bytes.is_empty() {
                return Ok(0);
            }
            if bytes.len() > 8 {
                return Err(format!("INTEGER of {} bytes does not fit i64", bytes.len()));
            }
            let negative = (bytes[0] & 0x80) != 0;
            let mut value: i64 = if negative { -1 } else { 0 };
            for &byte in *bytes {
                value = (value << 8) | i64::from(byte);
            }
            Ok(value)
        }
        BerObjectContent::Enum(value) => {
            i64::try_from(*value).map_err(|_| format!("ENUMERATED {value} does not fit i64"))
        }
        other => Err(format!("expected INTEGER, got {other:?}")),
    }
}

/// Reads an OCTET STRING.
pub(crate) fn as_octets<'a>(obj: &BerObject<'a>) -> Result<&'a [u8], String> {
    match &obj.content {
        BerObjectContent::OctetString(bytes) => Ok(bytes),
        other => Err(format!("expected OCTET STRING, got {other:?}")),
    }
}

/// Reads the elements of a SEQUENCE.
pub(crate) fn as_sequence<'a, 'b>(
    obj: &'b BerObject<'a>,
) -> Result<&'b [BerObject<'a>], String> {
    match &obj.content {
        BerObjectContent::Sequence(items) => Ok(items),
        other => Err(format!("expected SEQUENCE, got {other:?}")),
    }
}

/// Reads the elements of a SET.
pub(crate) fn as_set<'a, 'b>(obj: &'b BerObject<'a>) -> Result<&'b [BerObject<'a>], String> {
    match &obj.content {
        BerObjectContent::Set(items) => Ok(items),
        other => Err(format!("expected SET, got {other:?}")),
    }
}
