//! Field extraction from decoded CBOR maps.

use ciborium::Value;

pub(crate) fn find_value<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter().find(|(k, _)| k.as_text() == Some(key)).map(|(_, v)| v)
}

pub(crate) fn find_text<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a str> {
    find_value(map, key).and_then(|v| v.as_text())
}

pub(crate) fn find_bytes<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a [u8]> {
    find_value(map, key).and_then(|v| v.as_bytes()).map(|v| v.as_slice())
}

pub(crate) fn find_array<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a [Value]> {
    find_value(map, key).and_then(|v| v.as_array()).map(|v| v.as_slice())
}

pub(crate) fn find_integer(map: &[(Value, Value)], key: &str) -> Option<i64> {
    find_value(map, key)
        .and_then(|v| v.as_integer())
        .and_then(|i| i.try_into().ok())
}

/// Collects an array of byte strings; `None` if any element is not bytes.
pub(crate) fn byte_string_array(values: &[Value]) -> Option<Vec<Vec<u8>>> {
    values.iter().map(|v| v.as_bytes().map(|b| b.to_vec())).collect()
}
