//! Boundary codecs: addresses travel as `0x`-prefixed uppercase hex strings,
//! byte payloads as hex or base64 text selected by an explicit encoding tag.

use clap::ValueEnum;
use serde::Serialize;

use crate::error::{EngineError, Result};

/// Wire encoding for byte payloads crossing the CLI boundary.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    Hex,
    Base64,
}

/// Parses an address string, accepting an optional `0x`/`0X` prefix.
pub fn parse_address(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u64::from_str_radix(digits, 16)
        .map_err(|_| EngineError::Validation(format!("'{}' is not a valid address", trimmed)))
}

/// Renders an address the way every report and error message carries it.
pub fn format_address(address: u64) -> String {
    format!("{:#X}", address)
}

/// Decodes a payload string. Zero decoded bytes are rejected so writes and
/// injections never reach a process with nothing to do.
pub fn decode_payload(text: &str, encoding: PayloadEncoding) -> Result<Vec<u8>> {
    let bytes = match encoding {
        PayloadEncoding::Hex => decode_hex(text)?,
        PayloadEncoding::Base64 => decode_base64(text)?,
    };
    if bytes.is_empty() {
        return Err(EngineError::Validation(
            "payload decoded to zero bytes".into(),
        ));
    }
    Ok(bytes)
}

pub fn encode_payload(data: &[u8], encoding: PayloadEncoding) -> String {
    match encoding {
        PayloadEncoding::Hex => hex::encode(data),
        PayloadEncoding::Base64 => encode_base64(data),
    }
}

fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&cleaned)
        .map_err(|e| EngineError::Validation(format!("invalid hex payload: {}", e)))
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn encode_base64(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() + 2) / 3 * 4);

    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        out.push(BASE64_ALPHABET[(triple >> 18) as usize & 0x3F] as char);
        out.push(BASE64_ALPHABET[(triple >> 12) as usize & 0x3F] as char);
        if chunk.len() > 1 {
            out.push(BASE64_ALPHABET[(triple >> 6) as usize & 0x3F] as char);
        } else {
            out.push('=');
        }
        if chunk.len() > 2 {
            out.push(BASE64_ALPHABET[triple as usize & 0x3F] as char);
        } else {
            out.push('=');
        }
    }

    out
}

fn decode_base64(input: &str) -> Result<Vec<u8>> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.trim_end_matches('=');

    let mut out = Vec::with_capacity(cleaned.len() * 3 / 4);
    let mut buffer: u32 = 0;
    let mut bits_collected: u32 = 0;

    for c in cleaned.chars() {
        let value = decode_base64_char(c)
            .ok_or_else(|| EngineError::Validation(format!("invalid base64 character '{}'", c)))?;
        buffer = (buffer << 6) | value as u32;
        bits_collected += 6;
        if bits_collected >= 8 {
            bits_collected -= 8;
            out.push((buffer >> bits_collected) as u8);
        }
    }

    Ok(out)
}

fn decode_base64_char(c: char) -> Option<u8> {
    match c {
        'A'..='Z' => Some(c as u8 - b'A'),
        'a'..='z' => Some(c as u8 - b'a' + 26),
        '0'..='9' => Some(c as u8 - b'0' + 52),
        '+' => Some(62),
        '/' => Some(63),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_parses_with_and_without_prefix() {
        assert_eq!(parse_address("0x7FF612340000").unwrap(), 0x7FF6_1234_0000);
        assert_eq!(parse_address("0XDEADBEEF").unwrap(), 0xDEAD_BEEF);
        assert_eq!(parse_address("deadbeef").unwrap(), 0xDEAD_BEEF);
        assert_eq!(parse_address(" 0x10 ").unwrap(), 0x10);
    }

    #[test]
    fn bad_address_text_is_rejected() {
        for text in ["", "0x", "wat", "0xGG", "-1"] {
            assert!(matches!(
                parse_address(text),
                Err(EngineError::Validation(_))
            ));
        }
    }

    #[test]
    fn addresses_format_as_uppercase_hex_with_prefix() {
        assert_eq!(format_address(0xDEAD_BEEF), "0xDEADBEEF");
        assert_eq!(format_address(0x7FFF_FFFF_FFFF), "0x7FFFFFFFFFFF");
        assert_eq!(format_address(0), "0x0");
    }

    #[test]
    fn formatted_addresses_parse_back() {
        for addr in [0x1000u64, 0x7FF6_4D2A_0000, u64::MAX] {
            assert_eq!(parse_address(&format_address(addr)).unwrap(), addr);
        }
    }

    #[test]
    fn hex_payload_ignores_whitespace() {
        assert_eq!(
            decode_payload("48 8B C4", PayloadEncoding::Hex).unwrap(),
            vec![0x48, 0x8B, 0xC4]
        );
        assert_eq!(
            decode_payload("9090c3", PayloadEncoding::Hex).unwrap(),
            vec![0x90, 0x90, 0xC3]
        );
    }

    #[test]
    fn malformed_hex_payload_is_rejected() {
        assert!(decode_payload("ABC", PayloadEncoding::Hex).is_err());
        assert!(decode_payload("ZZ", PayloadEncoding::Hex).is_err());
    }

    #[test]
    fn base64_decodes_rfc4648_vectors() {
        let cases = [
            ("Zg==", "f"),
            ("Zm8=", "fo"),
            ("Zm9v", "foo"),
            ("Zm9vYg==", "foob"),
            ("Zm9vYmFy", "foobar"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                decode_payload(input, PayloadEncoding::Base64).unwrap(),
                expected.as_bytes()
            );
        }
    }

    #[test]
    fn base64_tolerates_missing_padding_and_whitespace() {
        assert_eq!(
            decode_payload("Zm9vYg", PayloadEncoding::Base64).unwrap(),
            b"foob"
        );
        assert_eq!(
            decode_payload("Zm9v\nYmFy", PayloadEncoding::Base64).unwrap(),
            b"foobar"
        );
    }

    #[test]
    fn base64_rejects_invalid_characters() {
        assert!(decode_payload("Zm!v", PayloadEncoding::Base64).is_err());
    }

    #[test]
    fn base64_encodes_rfc4648_vectors() {
        let cases = [
            ("f", "Zg=="),
            ("fo", "Zm8="),
            ("foo", "Zm9v"),
            ("foobar", "Zm9vYmFy"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                encode_payload(input.as_bytes(), PayloadEncoding::Base64),
                expected
            );
        }
    }

    #[test]
    fn hex_encoding_is_lowercase() {
        assert_eq!(
            encode_payload(&[0xDE, 0xAD, 0xBE, 0xEF], PayloadEncoding::Hex),
            "deadbeef"
        );
    }

    #[test]
    fn empty_payloads_are_rejected() {
        assert!(decode_payload("", PayloadEncoding::Hex).is_err());
        assert!(decode_payload("  ", PayloadEncoding::Hex).is_err());
        assert!(decode_payload("====", PayloadEncoding::Base64).is_err());
    }

    #[test]
    fn payloads_roundtrip_through_both_encodings() {
        let data: Vec<u8> = (0..=255).collect();
        for encoding in [PayloadEncoding::Hex, PayloadEncoding::Base64] {
            let text = encode_payload(&data, encoding);
            assert_eq!(decode_payload(&text, encoding).unwrap(), data);
        }
    }
}
