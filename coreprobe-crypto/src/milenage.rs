//! Milenage algorithm (3GPP TS 35.206)
//!
//! The authentication and key generation kernel used by 5G-AKA:
//! - f1 / f1*: network authentication MAC-A and re-synchronization MAC-S
//! - f2: user response RES
//! - f3 / f4: cipher and integrity keys CK, IK
//! - f5 / f5*: anonymity keys AK and AK* (re-synchronization)

use crate::aes::{xor_block, Aes128Block, BLOCK_SIZE};

/// K / OP / OPc / RAND size in bytes (128 bits)
pub const KEY_SIZE: usize = 16;

/// SQN size in bytes (48 bits)
pub const SQN_SIZE: usize = 6;

/// AMF size in bytes (16 bits)
pub const AMF_SIZE: usize = 2;

/// MAC-A / MAC-S / RES size in bytes (64 bits)
pub const MAC_SIZE: usize = 8;

/// AK size in bytes (48 bits)
pub const AK_SIZE: usize = 6;

/// Per-output rotation amount and c-constant low byte, from TS 35.206 §4.1.
/// c1..c5 are all-zero blocks apart from the final byte; r1..r5 are the
/// rotation amounts in bits.
const ROUNDS: [(usize, u8); 5] = [(64, 0x00), (0, 0x01), (32, 0x02), (64, 0x04), (96, 0x08)];

/// Rotate a 128-bit block left by `bits` positions.
fn rotl(block: &[u8; BLOCK_SIZE], bits: usize) -> [u8; BLOCK_SIZE] {
    if bits == 0 {
        return *block;
    }
    let byte_shift = bits / 8;
    let bit_shift = bits % 8;
    let mut out = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        let hi = block[(i + byte_shift) % BLOCK_SIZE];
        let lo = block[(i + byte_shift + 1) % BLOCK_SIZE];
        out[i] = if bit_shift == 0 {
            hi
        } else {
            (hi << bit_shift) | (lo >> (8 - bit_shift))
        };
    }
    out
}

/// Compute OPc = OP XOR E_K(OP).
pub fn compute_opc(k: &[u8; KEY_SIZE], op: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut opc = Aes128Block::new(k).encrypt_block_copy(op);
    xor_block(&mut opc, op);
    opc
}

/// Milenage context holding the keyed cipher and OPc.
pub struct Milenage {
    cipher: Aes128Block,
    opc: [u8; KEY_SIZE],
}

impl Milenage {
    /// Creates a Milenage instance from K and a pre-derived OPc.
    pub fn new(k: &[u8; KEY_SIZE], opc: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes128Block::new(k),
            opc: *opc,
        }
    }

    /// Creates a Milenage instance from K and OP, deriving OPc.
    pub fn new_with_op(k: &[u8; KEY_SIZE], op: &[u8; KEY_SIZE]) -> Self {
        Self::new(k, &compute_opc(k, op))
    }

    /// TEMP = E_K(RAND XOR OPc)
    fn temp(&self, rand: &[u8; KEY_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut t = *rand;
        xor_block(&mut t, &self.opc);
        self.cipher.encrypt_block(&mut t);
        t
    }

    /// OUT1 = E_K(TEMP XOR rot(IN1 XOR OPc, r1) XOR c1) XOR OPc
    /// with IN1 = SQN ‖ AMF ‖ SQN ‖ AMF.
    fn out1(&self, rand: &[u8; KEY_SIZE], sqn: &[u8; SQN_SIZE], amf: &[u8; AMF_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut in1 = [0u8; BLOCK_SIZE];
        in1[0..6].copy_from_slice(sqn);
        in1[6..8].copy_from_slice(amf);
        in1[8..14].copy_from_slice(sqn);
        in1[14..16].copy_from_slice(amf);
        xor_block(&mut in1, &self.opc);

        let (r1, c1) = ROUNDS[0];
        let mut block = rotl(&in1, r1);
        xor_block(&mut block, &self.temp(rand));
        block[BLOCK_SIZE - 1] ^= c1;
        self.cipher.encrypt_block(&mut block);
        xor_block(&mut block, &self.opc);
        block
    }

    /// OUTn = E_K(rot(TEMP XOR OPc, rn) XOR cn) XOR OPc, for n in 2..=5.
    fn out_n(&self, rand: &[u8; KEY_SIZE], n: usize) -> [u8; BLOCK_SIZE] {
        let (rot, c) = ROUNDS[n - 1];
        let mut block = self.temp(rand);
        xor_block(&mut block, &self.opc);
        let mut block = rotl(&block, rot);
        block[BLOCK_SIZE - 1] ^= c;
        self.cipher.encrypt_block(&mut block);
        xor_block(&mut block, &self.opc);
        block
    }

    /// f1: MAC-A (network authentication).
    pub fn f1(&self, rand: &[u8; KEY_SIZE], sqn: &[u8; SQN_SIZE], amf: &[u8; AMF_SIZE]) -> [u8; MAC_SIZE] {
        self.out1(rand, sqn, amf)[0..8].try_into().unwrap()
    }

    /// f1*: MAC-S (re-synchronization authentication).
    pub fn f1_star(&self, rand: &[u8; KEY_SIZE], sqn: &[u8; SQN_SIZE], amf: &[u8; AMF_SIZE]) -> [u8; MAC_SIZE] {
        self.out1(rand, sqn, amf)[8..16].try_into().unwrap()
    }

    /// f2: RES (user authentication response).
    pub fn f2(&self, rand: &[u8; KEY_SIZE]) -> [u8; MAC_SIZE] {
        self.out_n(rand, 2)[8..16].try_into().unwrap()
    }

    /// f3: CK (cipher key).
    pub fn f3(&self, rand: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
        self.out_n(rand, 3)
    }

    /// f4: IK (integrity key).
    pub fn f4(&self, rand: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
        self.out_n(rand, 4)
    }

    /// f5: AK (anonymity key).
    pub fn f5(&self, rand: &[u8; KEY_SIZE]) -> [u8; AK_SIZE] {
        self.out_n(rand, 2)[0..6].try_into().unwrap()
    }

    /// f5*: AK for re-synchronization (AUTS).
    pub fn f5_star(&self, rand: &[u8; KEY_SIZE]) -> [u8; AK_SIZE] {
        self.out_n(rand, 5)[0..6].try_into().unwrap()
    }

    /// f2, f3, f4, f5 and f5* in one call, as a challenge needs them all.
    pub fn f2345(
        &self,
        rand: &[u8; KEY_SIZE],
    ) -> ([u8; MAC_SIZE], [u8; KEY_SIZE], [u8; KEY_SIZE], [u8; AK_SIZE], [u8; AK_SIZE]) {
        (
            self.f2(rand),
            self.f3(rand),
            self.f4(rand),
            self.f5(rand),
            self.f5_star(rand),
        )
    }
}
