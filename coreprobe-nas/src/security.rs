//! Security-protected NAS framing (TS 24.501 §9.1)
//!
//! A protected NAS message is EPD ‖ security header type ‖ MAC (4) ‖
//! sequence number (1) ‖ payload. The MAC covers the sequence number
//! and the (possibly ciphered) payload, keyed by the NAS COUNT in use
//! for that direction; ciphering covers the payload only.

use coreprobe_crypto::{CipheringAlg, IntegrityAlg};

use crate::codec::CodecError;
use crate::enums::{SecurityHeaderType, EPD_5GMM};

/// NAS connection identifier used as the bearer input.
pub const BEARER_NAS: u8 = 0;

/// Offset of the payload within a protected message:
/// EPD (1) + SHT (1) + MAC (4) + SEQ (1).
pub const PROTECTED_HEADER_LEN: usize = 7;

/// Direction bit for the integrity and ciphering inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Uplink = 0,
    Downlink = 1,
}

/// NAS COUNT: a 24-bit overflow counter and an 8-bit sequence number.
///
/// The 32-bit COUNT value fed to the algorithms is `overflow ‖ sqn`;
/// only the sequence number travels on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NasCount {
    overflow: u32,
    sqn: u8,
}

impl NasCount {
    pub fn new() -> Self {
        Self::default()
    }

    /// The 32-bit COUNT value: overflow in bits 8..32, SQN in bits 0..8.
    pub fn value(&self) -> u32 {
        ((self.overflow & 0x00FF_FFFF) << 8) | self.sqn as u32
    }

    /// Current sequence number (the transmitted low byte).
    pub fn sqn(&self) -> u8 {
        self.sqn
    }

    /// Advances the count by one message, carrying into the overflow
    /// counter when the sequence number wraps.
    pub fn increment(&mut self) {
        let (sqn, wrapped) = self.sqn.overflowing_add(1);
        self.sqn = sqn;
        if wrapped {
            self.overflow = (self.overflow + 1) & 0x00FF_FFFF;
        }
    }

    /// Aligns the count with a received sequence number, detecting a
    /// wrap when the new number is lower than the current one.
    pub fn sync(&mut self, seq: u8) {
        if seq < self.sqn {
            self.overflow = (self.overflow + 1) & 0x00FF_FFFF;
        }
        self.sqn = seq;
    }
}

/// True when the buffer looks like a security-protected 5GMM message.
pub fn is_protected(octets: &[u8]) -> bool {
    octets.len() > PROTECTED_HEADER_LEN && octets[0] == EPD_5GMM && octets[1] & 0x0F != 0
}

/// Protects a plain NAS message for transmission and advances the count.
///
/// The count in use is the sender's current value; its low byte becomes
/// the transmitted sequence number.
#[allow(clippy::too_many_arguments)]
pub fn protect(
    plain: &[u8],
    header_type: SecurityHeaderType,
    direction: Direction,
    count: &mut NasCount,
    integrity: IntegrityAlg,
    knas_int: &[u8; 16],
    ciphering: CipheringAlg,
    knas_enc: &[u8; 16],
) -> Vec<u8> {
    let mut payload = plain.to_vec();
    if header_type.is_ciphered() {
        ciphering.apply(
            count.value(),
            BEARER_NAS,
            direction as u8,
            knas_enc,
            &mut payload,
        );
    }

    let mut mac_input = Vec::with_capacity(1 + payload.len());
    mac_input.push(count.sqn());
    mac_input.extend_from_slice(&payload);
    let mac = integrity.compute_mac(
        count.value(),
        BEARER_NAS,
        direction as u8,
        knas_int,
        &mac_input,
    );

    let mut out = Vec::with_capacity(PROTECTED_HEADER_LEN + payload.len());
    out.push(EPD_5GMM);
    out.push(header_type as u8);
    out.extend_from_slice(&mac);
    out.push(count.sqn());
    out.extend_from_slice(&payload);

    count.increment();
    out
}

/// Verifies and strips the protection of a received NAS message,
/// returning the plain inner octets. The count is synchronized to the
/// received sequence number before the MAC check.
pub fn unprotect(
    octets: &[u8],
    direction: Direction,
    count: &mut NasCount,
    integrity: IntegrityAlg,
    knas_int: &[u8; 16],
    ciphering: CipheringAlg,
    knas_enc: &[u8; 16],
) -> Result<Vec<u8>, CodecError> {
    if octets.len() < PROTECTED_HEADER_LEN {
        return Err(CodecError::Truncated);
    }
    if octets[0] != EPD_5GMM {
        return Err(CodecError::Invalid("protected message must be 5GMM".into()));
    }
    let header_type = SecurityHeaderType::try_from(octets[1])?;
    if !header_type.is_protected() {
        return Err(CodecError::Invalid("message is not protected".into()));
    }

    let mac: [u8; 4] = octets[2..6].try_into().unwrap();
    let seq = octets[6];
    let payload = &octets[PROTECTED_HEADER_LEN..];

    count.sync(seq);

    let mut mac_input = Vec::with_capacity(1 + payload.len());
    mac_input.push(seq);
    mac_input.extend_from_slice(payload);
    let expected = integrity.compute_mac(
        count.value(),
        BEARER_NAS,
        direction as u8,
        knas_int,
        &mac_input,
    );
    if expected != mac {
        return Err(CodecError::IntegrityFailure);
    }

    let mut plain = payload.to_vec();
    if header_type.is_ciphered() {
        ciphering.apply(
            count.value(),
            BEARER_NAS,
            direction as u8,
            knas_enc,
            &mut plain,
        );
    }
    Ok(plain)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNAS_INT: [u8; 16] = [0x11; 16];
    const KNAS_ENC: [u8; 16] = [0x22; 16];

    fn protect_one(
        plain: &[u8],
        header_type: SecurityHeaderType,
        count: &mut NasCount,
    ) -> Vec<u8> {
        protect(
            plain,
            header_type,
            Direction::Uplink,
            count,
            IntegrityAlg::Nia2,
            &KNAS_INT,
            CipheringAlg::Nea2,
            &KNAS_ENC,
        )
    }

    #[test]
    fn test_protect_unprotect_roundtrip() {
        let plain = b"\x7e\x00\x43"; // registration complete
        let mut ul = NasCount::new();
        let protected = protect_one(plain, SecurityHeaderType::IntegrityProtectedAndCiphered, &mut ul);

        assert!(is_protected(&protected));
        assert_eq!(ul.value(), 1);

        let mut peer = NasCount::new();
        let recovered = unprotect(
            &protected,
            Direction::Uplink,
            &mut peer,
            IntegrityAlg::Nia2,
            &KNAS_INT,
            CipheringAlg::Nea2,
            &KNAS_ENC,
        )
        .unwrap();
        assert_eq!(recovered, plain);
    }

    #[test]
    fn test_ciphered_payload_differs_from_plain() {
        let plain = b"\x7e\x00\x43";
        let mut count = NasCount::new();
        let protected = protect_one(plain, SecurityHeaderType::IntegrityProtectedAndCiphered, &mut count);
        assert_ne!(&protected[PROTECTED_HEADER_LEN..], plain.as_slice());

        let mut count = NasCount::new();
        let protected = protect_one(plain, SecurityHeaderType::IntegrityProtected, &mut count);
        assert_eq!(&protected[PROTECTED_HEADER_LEN..], plain.as_slice());
    }

    #[test]
    fn test_tampered_mac_rejected() {
        let plain = b"\x7e\x00\x43";
        let mut count = NasCount::new();
        let mut protected =
            protect_one(plain, SecurityHeaderType::IntegrityProtected, &mut count);
        protected[2] ^= 0x01;

        let mut peer = NasCount::new();
        let result = unprotect(
            &protected,
            Direction::Uplink,
            &mut peer,
            IntegrityAlg::Nia2,
            &KNAS_INT,
            CipheringAlg::Nea2,
            &KNAS_ENC,
        );
        assert!(matches!(result, Err(CodecError::IntegrityFailure)));
    }

    #[test]
    fn test_sequence_number_is_count_low_byte() {
        let mut count = NasCount::new();
        for expected_seq in 0..3u8 {
            let protected =
                protect_one(b"x", SecurityHeaderType::IntegrityProtected, &mut count);
            assert_eq!(protected[6], expected_seq);
        }
        assert_eq!(count.value(), 3);
    }

    #[test]
    fn test_count_overflow_carry() {
        let mut count = NasCount::new();
        for _ in 0..=u8::MAX {
            count.increment();
        }
        // 256 increments: sqn wrapped to 0, overflow carried.
        assert_eq!(count.sqn(), 0);
        assert_eq!(count.value(), 0x100);
    }

    #[test]
    fn test_receiver_sync_tracks_wrap() {
        let mut count = NasCount::new();
        count.sync(0xFF);
        assert_eq!(count.value(), 0xFF);
        count.sync(0x00);
        assert_eq!(count.value(), 0x100);
    }

    #[test]
    fn test_unprotect_rejects_plain() {
        let plain = b"\x7e\x00\x43";
        let mut count = NasCount::new();
        assert!(unprotect(
            plain,
            Direction::Uplink,
            &mut count,
            IntegrityAlg::Nia2,
            &KNAS_INT,
            CipheringAlg::Nea0,
            &KNAS_ENC,
        )
        .is_err());
    }
}
