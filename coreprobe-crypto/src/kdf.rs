//! Key derivation for the 5G key hierarchy
//!
//! Generic KDF of 3GPP TS 33.220 Annex B.2 (HMAC-SHA256 over
//! FC ‖ P0 ‖ L0 ‖ … ‖ Pn ‖ Ln) and the specific derivations of
//! TS 33.501 Annex A used on the UE side:
//! Kausf → Kseaf → Kamf → KNASenc/KNASint, plus RES*.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;

/// Size of a derived key / HMAC-SHA256 output in bytes
pub const KEY_256_SIZE: usize = 32;

/// Size of a truncated 128-bit key in bytes
pub const KEY_128_SIZE: usize = 16;

/// FC values from 3GPP TS 33.501 Annex A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Fc {
    /// A.2 — Kausf from CK ‖ IK
    Kausf = 0x6A,
    /// A.4 — RES* from CK ‖ IK
    ResStar = 0x6B,
    /// A.6 — Kseaf from Kausf
    Kseaf = 0x6C,
    /// A.7 — Kamf from Kseaf
    Kamf = 0x6D,
    /// A.8 — algorithm keys from Kamf
    AlgKey = 0x69,
}

/// Algorithm type distinguishers for Annex A.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlgType {
    /// N-NAS-enc-alg
    NasEnc = 0x01,
    /// N-NAS-int-alg
    NasInt = 0x02,
}

/// Computes HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], input: &[u8]) -> [u8; KEY_256_SIZE] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any size"));
    mac.update(input);
    let mut out = [0u8; KEY_256_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// TS 33.220 KDF: S = FC ‖ P0 ‖ L0 ‖ … ‖ Pn ‖ Ln, lengths as two
/// big-endian octets.
pub fn kdf(key: &[u8], fc: Fc, params: &[&[u8]]) -> [u8; KEY_256_SIZE] {
    let mut s = Vec::with_capacity(1 + params.iter().map(|p| p.len() + 2).sum::<usize>());
    s.push(fc as u8);
    for p in params {
        s.extend_from_slice(p);
        s.extend_from_slice(&(p.len() as u16).to_be_bytes());
    }
    hmac_sha256(key, &s)
}

/// Encodes a character string for KDF input (TS 33.501 Annex B.2.1.2):
/// NFKC normalization, then UTF-8 octets.
pub fn encode_string(s: &str) -> Vec<u8> {
    s.nfkc().collect::<String>().into_bytes()
}

/// Kausf = KDF(CK ‖ IK, 0x6A, SNN, SQN ⊕ AK) — Annex A.2.
pub fn derive_kausf(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    snn: &str,
    sqn_xor_ak: &[u8; 6],
) -> [u8; KEY_256_SIZE] {
    let mut key = [0u8; KEY_256_SIZE];
    key[..KEY_128_SIZE].copy_from_slice(ck);
    key[KEY_128_SIZE..].copy_from_slice(ik);
    kdf(&key, Fc::Kausf, &[&encode_string(snn), sqn_xor_ak])
}

/// Kseaf = KDF(Kausf, 0x6C, SNN) — Annex A.6.
pub fn derive_kseaf(kausf: &[u8; KEY_256_SIZE], snn: &str) -> [u8; KEY_256_SIZE] {
    kdf(kausf, Fc::Kseaf, &[&encode_string(snn)])
}

/// Kamf = KDF(Kseaf, 0x6D, SUPI digits, ABBA) — Annex A.7.
pub fn derive_kamf(kseaf: &[u8; KEY_256_SIZE], supi_digits: &str, abba: &[u8]) -> [u8; KEY_256_SIZE] {
    kdf(kseaf, Fc::Kamf, &[supi_digits.as_bytes(), abba])
}

/// RES* = low half of KDF(CK ‖ IK, 0x6B, SNN, RAND, RES) — Annex A.4.
pub fn derive_res_star(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    snn: &str,
    rand: &[u8; 16],
    res: &[u8],
) -> [u8; KEY_128_SIZE] {
    let mut key = [0u8; KEY_256_SIZE];
    key[..KEY_128_SIZE].copy_from_slice(ck);
    key[KEY_128_SIZE..].copy_from_slice(ik);
    let out = kdf(&key, Fc::ResStar, &[&encode_string(snn), rand, res]);
    out[KEY_128_SIZE..].try_into().unwrap()
}

/// Algorithm key = low half of KDF(Kamf, 0x69, type, id) — Annex A.8.
pub fn derive_alg_key(
    kamf: &[u8; KEY_256_SIZE],
    alg_type: AlgType,
    alg_id: u8,
) -> [u8; KEY_128_SIZE] {
    let out = kdf(kamf, Fc::AlgKey, &[&[alg_type as u8], &[alg_id]]);
    out[KEY_128_SIZE..].try_into().unwrap()
}
