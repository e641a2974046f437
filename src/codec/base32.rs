//! Bit-level base32
//!
//! The core pair (`encode` / `decode`) works on whole 5-bit groups only and
//! never emits or accepts padding. That is all service IDs need: a v2 ID is
//! 80 bits (16 symbols), a v3 ID is 280 bits (56 symbols).
//!
//! `encode_padded` / `decode_padded` implement the full RFC 4648 form for
//! arbitrary lengths.

use crate::error::{AuthError, Result};

/// RFC 4648 alphabet, lowercase as used in onion addresses
pub const ALPHABET: &[u8; 32] = b"abcdefghijklmnopqrstuvwxyz234567";

const PAD: char = '=';

/// Encode bytes whose bit length is a multiple of 5.
pub fn encode(data: &[u8]) -> Result<String> {
    let nbits = data.len() * 8;
    if nbits % 5 != 0 {
        return Err(AuthError::Encoding(format!(
            "base32 input of {} bits is not a multiple of 5",
            nbits
        )));
    }
    Ok(encode_bits(data))
}

/// Encode any byte string in RFC 4648 form, padded with `=` to a multiple
/// of 8 symbols.
pub fn encode_padded(data: &[u8]) -> String {
    let mut out = encode_bits(data);
    while out.len() % 8 != 0 {
        out.push(PAD);
    }
    out
}

/// Decode a string whose symbol count times 5 is a whole number of bytes.
///
/// Input is case-insensitive. Symbols outside the alphabet (including `=`)
/// are rejected.
pub fn decode(encoded: &str) -> Result<Vec<u8>> {
    let nbits = encoded.len() * 5;
    if nbits % 8 != 0 {
        return Err(AuthError::Encoding(format!(
            "base32 input of {} symbols does not decode to whole bytes",
            encoded.len()
        )));
    }
    decode_bits(encoded.as_bytes())
}

/// Decode RFC 4648 base32, with or without trailing `=` padding.
pub fn decode_padded(encoded: &str) -> Result<Vec<u8>> {
    let symbols = encoded.trim_end_matches(PAD);
    // A final quantum can only hold 2, 4, 5 or 7 symbols.
    if !matches!(symbols.len() % 8, 0 | 2 | 4 | 5 | 7) {
        return Err(AuthError::Encoding(format!(
            "base32 input has an impossible length of {} symbols",
            symbols.len()
        )));
    }
    decode_bits(symbols.as_bytes())
}

/// Check that every symbol is in the (case-insensitive) alphabet
pub fn is_valid(encoded: &str) -> bool {
    encoded.bytes().all(|c| symbol_value(c).is_some())
}

fn symbol_value(c: u8) -> Option<u8> {
    match c {
        b'a'..=b'z' => Some(c - b'a'),
        b'A'..=b'Z' => Some(c - b'A'),
        b'2'..=b'7' => Some(c - b'2' + 26),
        _ => None,
    }
}

fn encode_bits(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
        buffer &= (1 << bits) - 1;
    }

    // Zero-fill the last partial group
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }

    out
}

fn decode_bits(symbols: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(symbols.len() * 5 / 8);
    let mut buffer: u32 = 0;
    let mut bits = 0u32;

    for (pos, &c) in symbols.iter().enumerate() {
        let value = symbol_value(c).ok_or_else(|| {
            AuthError::Encoding(format!(
                "invalid base32 symbol {:?} at position {}",
                c as char, pos
            ))
        })?;

        buffer = (buffer << 5) | u32::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((buffer >> bits) as u8);
            buffer &= (1 << bits) - 1;
        }
    }

    // Any leftover (< 8) bits belong to the padding of the last quantum.
    Ok(out)
}
