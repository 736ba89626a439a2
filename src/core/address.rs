//! Banano account codec
//!
//! An account is `ban_` followed by 60 base32 characters:
//!
//! | Chars | Bits | Content |
//! |-------|------|---------|
//! | 52 | 260 | 4 zero pad bits + 32-byte ed25519 public key |
//! | 8 | 40 | blake2b-40 checksum of the key, byte-reversed |
//!
//! The alphabet omits `0`, `2`, `l` and `v` to avoid visual ambiguity.

use blake2::digest::consts::U5;
use blake2::{Blake2b, Digest};

use crate::core::constants::account::{NAME_SUFFIXES, PREFIX};

const ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";
const KEY_CHARS: usize = 52;
const CHECKSUM_CHARS: usize = 8;
const KEY_PAD_BITS: usize = 4;

type Blake2b40 = Blake2b<U5>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with 'ban_'")]
    InvalidPrefix,
    #[error("address has {0} characters after the prefix, expected 60")]
    InvalidLength(usize),
    #[error("invalid base32 character '{0}'")]
    InvalidCharacter(char),
    #[error("non-zero padding bits")]
    InvalidPadding,
    #[error("checksum mismatch")]
    ChecksumMismatch,
    #[error("public key must be 32 bytes of hex: {0}")]
    InvalidPublicKey(String),
}

/// Encode a raw 32-byte public key as a `ban_` account.
pub fn public_key_to_address(public_key: &[u8; 32]) -> String {
    let mut out = String::with_capacity(PREFIX.len() + KEY_CHARS + CHECKSUM_CHARS);
    out.push_str(PREFIX);
    out.push_str(&encode(public_key, KEY_PAD_BITS));
    out.push_str(&encode(&checksum(public_key), 0));
    out
}

/// Decode a `ban_` account into its raw public key, validating the checksum.
pub fn address_to_public_key(address: &str) -> Result<[u8; 32], AddressError> {
    let body = address.strip_prefix(PREFIX).ok_or(AddressError::InvalidPrefix)?;
    if body.len() != KEY_CHARS + CHECKSUM_CHARS || !body.is_ascii() {
        return Err(AddressError::InvalidLength(body.chars().count()));
    }
    let (key_part, check_part) = body.split_at(KEY_CHARS);

    let key_bytes = decode(key_part, KEY_PAD_BITS, 32)?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&key_bytes);

    if decode(check_part, 0, 5)? != checksum(&key) {
        return Err(AddressError::ChecksumMismatch);
    }
    Ok(key)
}

pub fn is_address(value: &str) -> bool {
    address_to_public_key(value).is_ok()
}

/// True for human-readable names (e.g. `monkey.ban`) that need resolution before use.
pub fn is_name(value: &str) -> bool {
    if is_address(value) {
        return false;
    }
    let lower = value.trim().to_ascii_lowercase();
    NAME_SUFFIXES.iter().any(|suffix| lower.contains(suffix))
}

/// Accept either a `ban_` account or a 64-char hex key.
pub fn parse_public_key(value: &str) -> Result<[u8; 32], AddressError> {
    let value = value.trim();
    if value.starts_with(PREFIX) {
        return address_to_public_key(value);
    }
    let bytes = hex::decode(value).map_err(|e| AddressError::InvalidPublicKey(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| AddressError::InvalidPublicKey(format!("got {} bytes", b.len())))
}

fn checksum(public_key: &[u8; 32]) -> Vec<u8> {
    let mut digest = Blake2b40::digest(public_key).to_vec();
    digest.reverse();
    digest
}

fn encode(bytes: &[u8], pad_bits: usize) -> String {
    let total = bytes.len() * 8 + pad_bits;
    let bit = |i: usize| -> u8 {
        if i < pad_bits {
            return 0;
        }
        let j = i - pad_bits;
        (bytes[j / 8] >> (7 - j % 8)) & 1
    };
    (0..total / 5)
        .map(|c| {
            let v = (0..5).fold(0u8, |acc, k| (acc << 1) | bit(c * 5 + k));
            ALPHABET[v as usize] as char
        })
        .collect()
}

fn decode(chars: &str, pad_bits: usize, len: usize) -> Result<Vec<u8>, AddressError> {
    let mut out = vec![0u8; len];
    for (c, ch) in chars.bytes().enumerate() {
        let v = ALPHABET
            .iter()
            .position(|&a| a == ch)
            .ok_or(AddressError::InvalidCharacter(ch as char))? as u8;
        for k in 0..5 {
            let i = c * 5 + k;
            let b = (v >> (4 - k)) & 1;
            if i < pad_bits {
                if b != 0 {
                    return Err(AddressError::InvalidPadding);
                }
                continue;
            }
            let j = i - pad_bits;
            out[j / 8] |= b << (7 - j % 8);
        }
    }
    Ok(out)
}
