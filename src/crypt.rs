//! Salted XOR obfuscation over a 16-byte key.
//!
//! Two random salt bytes `s0, s1` are drawn from `[1, 255]` per frame.
//! Byte `i` of the payload is XORed with `key[(s0 + i) % 16] ^ s1`, and the
//! salt pair is prepended in the clear:
//!
//! ```text
//! out = s0 | s1 | transform(data)
//! ```
//!
//! `decrypt(encrypt(x, k), k) == x` for every input. Salt bytes exclude
//! zero so short payloads always get at least one non-identity key tap.
//! This is obfuscation, not encryption; integrity comes from the CRC.

use crate::types::{KEY_SIZE, Key};
use rand::Rng;

/// Number of salt bytes prepended to every frame.
pub const SALT_SIZE: usize = 2;

fn transform(data: &[u8], key: &Key, s0: u8, s1: u8) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, &byte)| byte ^ key[(s0 as usize + i) % KEY_SIZE] ^ s1)
        .collect()
}

/// Obfuscate `data` under `key` with a fresh random salt.
pub fn encrypt(data: &[u8], key: &Key) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let s0: u8 = rng.gen_range(1..=255);
    let s1: u8 = rng.gen_range(1..=255);

    let mut out = Vec::with_capacity(SALT_SIZE + data.len());
    out.push(s0);
    out.push(s1);
    out.extend(transform(data, key, s0, s1));
    out
}

/// Strip the salt prefix of `data` and undo the XOR transform.
///
/// Inputs shorter than the salt prefix decode to an empty buffer; the
/// packet layer rejects them by size before anything is interpreted.
pub fn decrypt(data: &[u8], key: &Key) -> Vec<u8> {
    match data {
        [s0, s1, body @ ..] => transform(body, key, *s0, *s1),
        _ => Vec::new(),
    }
}
