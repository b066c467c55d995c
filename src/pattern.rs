//! Pattern Codec: turns a pattern string plus an encoding tag into a byte
//! vector with a parallel must-match mask, and runs the mask-aware search.

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{EngineError, Result};

/// How a pattern string is interpreted before scanning.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueEncoding {
    /// Whitespace-separated hex bytes; `?`, `??` and `**` are wildcards.
    Hex,
    /// Signed 32-bit integer, little-endian.
    Int32,
    /// Signed 64-bit integer, little-endian.
    Int64,
    /// IEEE-754 single precision, little-endian.
    Float,
    /// IEEE-754 double precision, little-endian.
    Double,
    /// UTF-8 bytes of the text, verbatim.
    String,
}

/// Compiled search pattern. `mask[i] == false` marks a wildcard position
/// whose byte value is ignored during comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    pub bytes: Vec<u8>,
    pub mask: Vec<bool>,
}

impl PatternSpec {
    fn exact(bytes: Vec<u8>) -> Self {
        let mask = vec![true; bytes.len()];
        Self { bytes, mask }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Builds a [`PatternSpec`] from pattern text and its encoding tag.
///
/// A pattern that decodes to zero bytes is rejected here so the scanner never
/// runs an empty search.
pub fn build_pattern(text: &str, encoding: ValueEncoding) -> Result<PatternSpec> {
    let spec = match encoding {
        ValueEncoding::Hex => parse_hex_pattern(text),
        ValueEncoding::Int32 => {
            let value: i32 = text.trim().parse().map_err(|_| {
                EngineError::InvalidPattern(format!("'{}' is not a valid int32", text.trim()))
            })?;
            PatternSpec::exact(value.to_le_bytes().to_vec())
        }
        ValueEncoding::Int64 => {
            let value: i64 = text.trim().parse().map_err(|_| {
                EngineError::InvalidPattern(format!("'{}' is not a valid int64", text.trim()))
            })?;
            PatternSpec::exact(value.to_le_bytes().to_vec())
        }
        ValueEncoding::Float => {
            let value: f32 = text.trim().parse().map_err(|_| {
                EngineError::InvalidPattern(format!("'{}' is not a valid float", text.trim()))
            })?;
            PatternSpec::exact(value.to_le_bytes().to_vec())
        }
        ValueEncoding::Double => {
            let value: f64 = text.trim().parse().map_err(|_| {
                EngineError::InvalidPattern(format!("'{}' is not a valid double", text.trim()))
            })?;
            PatternSpec::exact(value.to_le_bytes().to_vec())
        }
        ValueEncoding::String => PatternSpec::exact(text.as_bytes().to_vec()),
    };

    if spec.bytes.is_empty() {
        return Err(EngineError::InvalidPattern(
            "pattern decoded to zero bytes".into(),
        ));
    }

    Ok(spec)
}

fn parse_hex_pattern(text: &str) -> PatternSpec {
    let mut bytes = Vec::new();
    let mut mask = Vec::new();

    for token in text.split_whitespace() {
        if token == "?" || token == "??" || token == "**" {
            bytes.push(0);
            mask.push(false);
            continue;
        }

        // Tokens that fail to parse are dropped, not rejected.
        if let Ok(value) = u8::from_str_radix(token, 16) {
            bytes.push(value);
            mask.push(true);
        }
    }

    PatternSpec { bytes, mask }
}

/// Scans `haystack` for `spec`, appending `base + offset` for every match in
/// ascending offset order. Returns true once `out` holds `max_results`
/// addresses, signalling the caller to stop feeding buffers.
pub fn find_in_slice(
    spec: &PatternSpec,
    haystack: &[u8],
    base: u64,
    max_results: usize,
    out: &mut Vec<u64>,
) -> bool {
    let plen = spec.bytes.len();
    if plen == 0 || haystack.len() < plen {
        return out.len() >= max_results;
    }

    for offset in 0..=(haystack.len() - plen) {
        if matches_at(spec, &haystack[offset..offset + plen]) {
            out.push(base + offset as u64);
            if out.len() >= max_results {
                return true;
            }
        }
    }

    false
}

fn matches_at(spec: &PatternSpec, window: &[u8]) -> bool {
    for (i, &required) in spec.mask.iter().enumerate() {
        if required && window[i] != spec.bytes[i] {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(text: &str) -> PatternSpec {
        build_pattern(text, ValueEncoding::Hex).expect("pattern should build")
    }

    fn find_all(spec: &PatternSpec, haystack: &[u8]) -> Vec<u64> {
        let mut out = Vec::new();
        find_in_slice(spec, haystack, 0, usize::MAX, &mut out);
        out
    }

    #[test]
    fn wildcard_matches_any_byte_at_its_position() {
        let spec = hex("DE ?? BE EF");
        assert_eq!(spec.len(), 4);
        assert_eq!(find_all(&spec, &[0xDE, 0x00, 0xBE, 0xEF]), vec![0]);
        assert_eq!(find_all(&spec, &[0xDE, 0xFF, 0xBE, 0xEF]), vec![0]);
        assert!(find_all(&spec, &[0xDE, 0xBE, 0xEF, 0x00]).is_empty());
    }

    #[test]
    fn all_wildcard_token_forms_are_equivalent() {
        for token in ["?", "??", "**"] {
            let spec = hex(&format!("AA {} BB", token));
            assert_eq!(spec.mask, vec![true, false, true]);
            assert_eq!(find_all(&spec, &[0xAA, 0x42, 0xBB]), vec![0]);
        }
    }

    #[test]
    fn hex_tokens_that_fail_to_parse_are_dropped() {
        // Lenient parsing, kept as-is: a bad token shortens the pattern
        // instead of failing the scan.
        let spec = hex("ZZ DE AD 1FF");
        assert_eq!(spec.bytes, vec![0xDE, 0xAD]);
        assert_eq!(spec.mask, vec![true, true]);
    }

    #[test]
    fn single_digit_hex_tokens_parse() {
        let spec = hex("f 0 A");
        assert_eq!(spec.bytes, vec![0x0F, 0x00, 0x0A]);
    }

    #[test]
    fn pattern_of_only_bad_tokens_is_rejected() {
        let err = build_pattern("XX YY", ValueEncoding::Hex).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPattern(_)));
    }

    #[test]
    fn empty_text_is_rejected() {
        for encoding in [ValueEncoding::Hex, ValueEncoding::String] {
            let err = build_pattern("", encoding).unwrap_err();
            assert!(matches!(err, EngineError::InvalidPattern(_)));
        }
    }

    #[test]
    fn int32_encodes_little_endian() {
        let spec = build_pattern("305419896", ValueEncoding::Int32).unwrap();
        assert_eq!(spec.bytes, vec![0x78, 0x56, 0x34, 0x12]);
        assert_eq!(spec.mask, vec![true; 4]);
        assert_eq!(i32::from_le_bytes(spec.bytes.try_into().unwrap()), 0x12345678);
    }

    #[test]
    fn negative_integers_encode_twos_complement() {
        let spec = build_pattern("-1", ValueEncoding::Int32).unwrap();
        assert_eq!(spec.bytes, vec![0xFF; 4]);

        let spec = build_pattern("-1", ValueEncoding::Int64).unwrap();
        assert_eq!(spec.bytes, vec![0xFF; 8]);
        assert_eq!(i64::from_le_bytes(spec.bytes.try_into().unwrap()), -1);
    }

    #[test]
    fn float_encodes_ieee754_single() {
        let spec = build_pattern("1.5", ValueEncoding::Float).unwrap();
        assert_eq!(spec.bytes, vec![0x00, 0x00, 0xC0, 0x3F]);
        assert_eq!(f32::from_le_bytes(spec.bytes.try_into().unwrap()), 1.5);
    }

    #[test]
    fn double_encodes_ieee754_double() {
        let spec = build_pattern("-2.25", ValueEncoding::Double).unwrap();
        assert_eq!(spec.len(), 8);
        assert_eq!(f64::from_le_bytes(spec.bytes.try_into().unwrap()), -2.25);
    }

    #[test]
    fn string_encodes_utf8_verbatim() {
        let spec = build_pattern("héllo", ValueEncoding::String).unwrap();
        assert_eq!(spec.bytes, "héllo".as_bytes());
        assert_eq!(spec.mask, vec![true; spec.bytes.len()]);
    }

    #[test]
    fn non_numeric_int_text_is_rejected() {
        let err = build_pattern("abc", ValueEncoding::Int32).unwrap_err();
        assert!(matches!(err, EngineError::InvalidPattern(_)));
    }

    #[test]
    fn matches_are_reported_in_ascending_order() {
        let spec = hex("AB CD");
        let hay = [0xAB, 0xCD, 0x00, 0xAB, 0xCD, 0xAB, 0xCD];
        assert_eq!(find_all(&spec, &hay), vec![0, 3, 5]);
    }

    #[test]
    fn overlapping_matches_are_all_reported() {
        let spec = hex("AA AA");
        assert_eq!(find_all(&spec, &[0xAA, 0xAA, 0xAA]), vec![0, 1]);
    }

    #[test]
    fn result_cap_stops_the_search() {
        let spec = hex("AA");
        let hay = [0xAA; 8];
        let mut out = Vec::new();
        let capped = find_in_slice(&spec, &hay, 0x1000, 3, &mut out);
        assert!(capped);
        assert_eq!(out, vec![0x1000, 0x1001, 0x1002]);
    }

    #[test]
    fn base_offset_is_applied_to_match_addresses() {
        let spec = hex("42");
        let hay = [0x00, 0x42, 0x00, 0x42];
        assert_eq!(find_all(&spec, &hay), vec![1, 3]);
        let mut out = Vec::new();
        find_in_slice(&spec, &hay, 0x7FF0_0000, usize::MAX, &mut out);
        assert_eq!(out, vec![0x7FF0_0001, 0x7FF0_0003]);
    }
}
