//! NEA — 5G NAS ciphering algorithms
//!
//! - NEA1: SNOW3G-based (128-EEA1, the UEA2 f8 mode)
//! - NEA2: AES-128 in CTR mode
//!
//! Both are keystream XORs, so encryption and decryption are the same
//! operation. NEA0 (null ciphering) needs no code path here.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::snow3g;

/// Ciphering key size in bytes (128 bits)
pub const KEY_SIZE: usize = 16;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// NEA1 — SNOW3G-based ciphering, in place.
pub fn nea1_apply(count: u32, bearer: u8, direction: u8, key: &[u8; KEY_SIZE], data: &mut [u8]) {
    snow3g::f8(
        key,
        count,
        bearer as u32 & 0x1F,
        direction as u32 & 0x01,
        data,
    );
}

/// NEA2 — AES-CTR ciphering, in place.
///
/// IV: COUNT (32 bits) ‖ BEARER (5) ‖ DIRECTION (1) ‖ zeros (90).
pub fn nea2_apply(count: u32, bearer: u8, direction: u8, key: &[u8; KEY_SIZE], data: &mut [u8]) {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&count.to_be_bytes());
    iv[4] = ((bearer & 0x1F) << 3) | ((direction & 0x01) << 2);

    Aes128Ctr::new(key.into(), &iv.into()).apply_keystream(data);
}
