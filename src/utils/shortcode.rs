// src/utils/shortcode.rs

//! Short code to media id decoding.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Longest prefix that encodes the media id; private posts append more.
const ID_CHARS: usize = 11;

/// Decode the numeric media id encoded in a post short code.
///
/// Short codes are the media id written in a base-64 alphabet. Returns `None`
/// for characters outside that alphabet.
pub fn media_id(shortcode: &str) -> Option<String> {
    let code = shortcode.trim();
    if code.is_empty() {
        return None;
    }

    let mut id: u128 = 0;
    for ch in code.chars().take(ID_CHARS) {
        let digit = ALPHABET.iter().position(|&c| char::from(c) == ch)?;
        id = id.checked_mul(64)?.checked_add(digit as u128)?;
    }
    Some(id.to_string())
}
