//! SNOW 3G stream cipher
//!
//! Word-oriented stream cipher behind the 3GPP confidentiality and
//! integrity algorithms UEA2/UIA2, reused as NEA1/NIA1 in 5G.
//!
//! Reference: ETSI TS 135 201 / TS 135 202

/// Rijndael S-box, used by the S1 FSM transformation.
const SR: [u8; 256] = [
    0x63, 0x7C, 0x77, 0x7B, 0xF2, 0x6B, 0x6F, 0xC5, 0x30, 0x01, 0x67, 0x2B, 0xFE, 0xD7, 0xAB, 0x76,
    0xCA, 0x82, 0xC9, 0x7D, 0xFA, 0x59, 0x47, 0xF0, 0xAD, 0xD4, 0xA2, 0xAF, 0x9C, 0xA4, 0x72, 0xC0,
    0xB7, 0xFD, 0x93, 0x26, 0x36, 0x3F, 0xF7, 0xCC, 0x34, 0xA5, 0xE5, 0xF1, 0x71, 0xD8, 0x31, 0x15,
    0x04, 0xC7, 0x23, 0xC3, 0x18, 0x96, 0x05, 0x9A, 0x07, 0x12, 0x80, 0xE2, 0xEB, 0x27, 0xB2, 0x75,
    0x09, 0x83, 0x2C, 0x1A, 0x1B, 0x6E, 0x5A, 0xA0, 0x52, 0x3B, 0xD6, 0xB3, 0x29, 0xE3, 0x2F, 0x84,
    0x53, 0xD1, 0x00, 0xED, 0x20, 0xFC, 0xB1, 0x5B, 0x6A, 0xCB, 0xBE, 0x39, 0x4A, 0x4C, 0x58, 0xCF,
    0xD0, 0xEF, 0xAA, 0xFB, 0x43, 0x4D, 0x33, 0x85, 0x45, 0xF9, 0x02, 0x7F, 0x50, 0x3C, 0x9F, 0xA8,
    0x51, 0xA3, 0x40, 0x8F, 0x92, 0x9D, 0x38, 0xF5, 0xBC, 0xB6, 0xDA, 0x21, 0x10, 0xFF, 0xF3, 0xD2,
    0xCD, 0x0C, 0x13, 0xEC, 0x5F, 0x97, 0x44, 0x17, 0xC4, 0xA7, 0x7E, 0x3D, 0x64, 0x5D, 0x19, 0x73,
    0x60, 0x81, 0x4F, 0xDC, 0x22, 0x2A, 0x90, 0x88, 0x46, 0xEE, 0xB8, 0x14, 0xDE, 0x5E, 0x0B, 0xDB,
    0xE0, 0x32, 0x3A, 0x0A, 0x49, 0x06, 0x24, 0x5C, 0xC2, 0xD3, 0xAC, 0x62, 0x91, 0x95, 0xE4, 0x79,
    0xE7, 0xC8, 0x37, 0x6D, 0x8D, 0xD5, 0x4E, 0xA9, 0x6C, 0x56, 0xF4, 0xEA, 0x65, 0x7A, 0xAE, 0x08,
    0xBA, 0x78, 0x25, 0x2E, 0x1C, 0xA6, 0xB4, 0xC6, 0xE8, 0xDD, 0x74, 0x1F, 0x4B, 0xBD, 0x8B, 0x8A,
    0x70, 0x3E, 0xB5, 0x66, 0x48, 0x03, 0xF6, 0x0E, 0x61, 0x35, 0x57, 0xB9, 0x86, 0xC1, 0x1D, 0x9E,
    0xE1, 0xF8, 0x98, 0x11, 0x69, 0xD9, 0x8E, 0x94, 0x9B, 0x1E, 0x87, 0xE9, 0xCE, 0x55, 0x28, 0xDF,
    0x8C, 0xA1, 0x89, 0x0D, 0xBF, 0xE6, 0x42, 0x68, 0x41, 0x99, 0x2D, 0x0F, 0xB0, 0x54, 0xBB, 0x16,
];

/// S2 S-box (based on the Dickson polynomial construction).
const SQ: [u8; 256] = [
    0x25, 0x24, 0x73, 0x67, 0xD7, 0xAE, 0x5C, 0x30, 0xA4, 0xEE, 0x6E, 0xCB, 0x7D, 0xB5, 0x82, 0xDB,
    0xE4, 0x8E, 0x48, 0x49, 0x4F, 0x5D, 0x6A, 0x78, 0x70, 0x88, 0xE8, 0x5F, 0x5E, 0x84, 0x65, 0xE2,
    0xD8, 0xE9, 0xCC, 0xED, 0x40, 0x2F, 0x11, 0x28, 0x57, 0xD2, 0xAC, 0xE3, 0x4A, 0x15, 0x1B, 0xB9,
    0xB2, 0x80, 0x85, 0xA6, 0x2E, 0x02, 0x47, 0x29, 0x07, 0x4B, 0x0E, 0xC1, 0x51, 0xAA, 0x89, 0xD4,
    0xCA, 0x01, 0x46, 0xB3, 0xEF, 0xDD, 0x44, 0x7B, 0xC2, 0x7F, 0xBE, 0xC3, 0x9F, 0x20, 0x4C, 0x64,
    0x83, 0xA2, 0x68, 0x42, 0x13, 0xB4, 0x41, 0xCD, 0xBA, 0xC6, 0xBB, 0x6D, 0x4D, 0x71, 0x21, 0xF4,
    0x8D, 0xB0, 0xE5, 0x93, 0xFE, 0x8F, 0xE6, 0xCF, 0x43, 0x45, 0x31, 0x22, 0x37, 0x36, 0x96, 0xFA,
    0xBC, 0x0F, 0x08, 0x52, 0x1D, 0x55, 0x1A, 0xC5, 0x4E, 0x23, 0x69, 0x7A, 0x92, 0xFF, 0x5B, 0x5A,
    0xEB, 0x9A, 0x1C, 0xA9, 0xD1, 0x7E, 0x0D, 0xFC, 0x50, 0x8A, 0xB6, 0x62, 0xF5, 0x0A, 0xF8, 0xDC,
    0x03, 0x3C, 0x0C, 0x39, 0xF1, 0xB8, 0xF3, 0x3D, 0xF2, 0xD5, 0x97, 0x66, 0x81, 0x32, 0xA0, 0x00,
    0x06, 0xCE, 0xF6, 0xEA, 0xB7, 0x17, 0xF7, 0x8C, 0x79, 0xD6, 0xA7, 0xBF, 0x8B, 0x3F, 0x1F, 0x53,
    0x63, 0x75, 0x35, 0x2C, 0x60, 0xFD, 0x27, 0xD3, 0x94, 0xA5, 0x7C, 0xA1, 0x05, 0x58, 0x2D, 0xBD,
    0xD9, 0xC7, 0xAF, 0x6B, 0x54, 0x0B, 0xE0, 0x38, 0x04, 0xC8, 0x9D, 0xE7, 0x14, 0xB1, 0x87, 0x9C,
    0xDF, 0x6F, 0xF9, 0xDA, 0x2A, 0xC4, 0x59, 0x16, 0x74, 0x91, 0xAB, 0x26, 0x61, 0x76, 0x34, 0x2B,
    0xAD, 0x99, 0xFB, 0x72, 0xEC, 0x33, 0x12, 0xDE, 0x98, 0x3B, 0xC0, 0x9B, 0x3E, 0x18, 0x10, 0x3A,
    0x56, 0xE1, 0x77, 0xC9, 0x1E, 0x9E, 0x95, 0xA3, 0x90, 0x19, 0xA8, 0x6C, 0x09, 0xD0, 0xF0, 0x86,
];

/// Multiply by x in GF(2^8) with the given reduction constant.
#[inline]
fn mulx(v: u8, c: u8) -> u8 {
    if v & 0x80 != 0 {
        (v << 1) ^ c
    } else {
        v << 1
    }
}

/// Repeated multiplication by x.
fn mulx_pow(v: u8, n: u8, c: u8) -> u8 {
    (0..n).fold(v, |acc, _| mulx(acc, c))
}

/// MULalpha from the LFSR feedback polynomial.
#[inline]
fn mul_alpha(c: u8) -> u32 {
    u32::from_be_bytes([
        mulx_pow(c, 23, 0xa9),
        mulx_pow(c, 245, 0xa9),
        mulx_pow(c, 48, 0xa9),
        mulx_pow(c, 239, 0xa9),
    ])
}

/// DIValpha from the LFSR feedback polynomial.
#[inline]
fn div_alpha(c: u8) -> u32 {
    u32::from_be_bytes([
        mulx_pow(c, 16, 0xa9),
        mulx_pow(c, 39, 0xa9),
        mulx_pow(c, 6, 0xa9),
        mulx_pow(c, 64, 0xa9),
    ])
}

/// 32-bit S-box layer: byte-wise substitution followed by the MixColumn
/// style diffusion with reduction constant `c`.
fn sbox32(w: u32, table: &[u8; 256], c: u8) -> u32 {
    let b: [u8; 4] = w.to_be_bytes().map(|x| table[x as usize]);
    let r0 = mulx(b[0], c) ^ b[1] ^ b[2] ^ mulx(b[3], c) ^ b[3];
    let r1 = mulx(b[0], c) ^ b[0] ^ mulx(b[1], c) ^ b[2] ^ b[3];
    let r2 = b[0] ^ mulx(b[1], c) ^ b[1] ^ mulx(b[2], c) ^ b[3];
    let r3 = b[0] ^ b[1] ^ mulx(b[2], c) ^ b[2] ^ mulx(b[3], c);
    u32::from_be_bytes([r0, r1, r2, r3])
}

/// SNOW 3G keystream generator: 16-word LFSR plus 3-register FSM.
pub struct Snow3g {
    lfsr: [u32; 16],
    fsm: [u32; 3],
}

impl Snow3g {
    /// Initializes the generator with a key and IV, both as four 32-bit
    /// words in the layout of TS 135 201 §4.2.
    pub fn new(key: &[u32; 4], iv: &[u32; 4]) -> Self {
        let mut s = Self {
            lfsr: [
                key[0] ^ 0xffffffff,
                key[1] ^ 0xffffffff,
                key[2] ^ 0xffffffff,
                key[3] ^ 0xffffffff,
                key[0],
                key[1],
                key[2],
                key[3],
                key[0] ^ 0xffffffff,
                key[1] ^ 0xffffffff ^ iv[3],
                key[2] ^ 0xffffffff ^ iv[2],
                key[3] ^ 0xffffffff,
                key[0] ^ iv[1],
                key[1],
                key[2],
                key[3] ^ iv[0],
            ],
            fsm: [0; 3],
        };
        for _ in 0..32 {
            let f = s.clock_fsm();
            s.clock_lfsr(f);
        }
        s
    }

    /// Clocks the LFSR; `feedback` is the FSM output during the 32
    /// initialization rounds and 0 in keystream mode.
    fn clock_lfsr(&mut self, feedback: u32) {
        let v = ((self.lfsr[0] << 8) & 0xffffff00)
            ^ mul_alpha((self.lfsr[0] >> 24) as u8)
            ^ self.lfsr[2]
            ^ ((self.lfsr[11] >> 8) & 0x00ffffff)
            ^ div_alpha((self.lfsr[11] & 0xff) as u8)
            ^ feedback;
        self.lfsr.copy_within(1.., 0);
        self.lfsr[15] = v;
    }

    /// Clocks the FSM and returns its output word F.
    fn clock_fsm(&mut self) -> u32 {
        let f = self.lfsr[15].wrapping_add(self.fsm[0]) ^ self.fsm[1];
        let r = self.fsm[1].wrapping_add(self.fsm[2] ^ self.lfsr[5]);
        self.fsm[2] = sbox32(self.fsm[1], &SQ, 0x69);
        self.fsm[1] = sbox32(self.fsm[0], &SR, 0x1b);
        self.fsm[0] = r;
        f
    }

    /// Produces `out.len()` keystream words.
    pub fn keystream(&mut self, out: &mut [u32]) {
        self.clock_fsm();
        self.clock_lfsr(0);
        for word in out.iter_mut() {
            let f = self.clock_fsm();
            *word = f ^ self.lfsr[0];
            self.clock_lfsr(0);
        }
    }
}

/// Builds the key word layout shared by f8 and f9: K3..K0 big-endian.
fn key_words(key: &[u8; 16]) -> [u32; 4] {
    [
        u32::from_be_bytes(key[12..16].try_into().unwrap()),
        u32::from_be_bytes(key[8..12].try_into().unwrap()),
        u32::from_be_bytes(key[4..8].try_into().unwrap()),
        u32::from_be_bytes(key[0..4].try_into().unwrap()),
    ]
}

/// f8 confidentiality mode (UEA2): XORs the keystream over `data`.
pub fn f8(key: &[u8; 16], count: u32, bearer: u32, direction: u32, data: &mut [u8]) {
    let word = (bearer << 27) | ((direction & 0x1) << 26);
    let iv = [word, count, word, count];

    let words = data.len().div_ceil(4);
    let mut ks = vec![0u32; words];
    Snow3g::new(&key_words(key), &iv).keystream(&mut ks);

    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= ks[i / 4].to_be_bytes()[i % 4];
    }
}

/// Multiply by x in GF(2^64).
#[inline]
fn mulx64(v: u64, c: u64) -> u64 {
    if v & 0x8000000000000000 != 0 {
        (v << 1) ^ c
    } else {
        v << 1
    }
}

/// GF(2^64) product used by the f9 universal hash.
fn mul64(mut v: u64, p: u64, c: u64) -> u64 {
    let mut acc = 0u64;
    for i in 0..64 {
        if (p >> i) & 1 != 0 {
            acc ^= v;
        }
        v = mulx64(v, c);
    }
    acc
}

/// f9 integrity mode (UIA2): 32-bit MAC over `length_bits` of `data`.
pub fn f9(key: &[u8; 16], count: u32, fresh: u32, direction: u32, data: &[u8], length_bits: u64) -> u32 {
    let iv = [
        fresh ^ (direction << 15),
        count ^ (direction << 31),
        fresh,
        count,
    ];

    let mut z = [0u32; 5];
    Snow3g::new(&key_words(key), &iv).keystream(&mut z);

    let p = ((z[0] as u64) << 32) | z[1] as u64;
    let q = ((z[2] as u64) << 32) | z[3] as u64;
    const C: u64 = 0x1b;

    // D blocks of 64 bits, the last holding the remaining bits.
    let d = (length_bits / 64 + if length_bits % 64 == 0 { 1 } else { 2 }) as usize;

    let block = |i: usize| -> u64 {
        let mut m = 0u64;
        for j in 0..8 {
            if let Some(&byte) = data.get(i * 8 + j) {
                m |= (byte as u64) << (56 - j * 8);
            }
        }
        m
    };

    let mut eval = 0u64;
    for i in 0..d - 2 {
        eval = mul64(eval ^ block(i), p, C);
    }

    // Last block, masked down to the remaining bit count.
    let rem = match length_bits % 64 {
        0 => 64,
        r => r,
    };
    let mask = if rem == 64 { u64::MAX } else { !0u64 << (64 - rem) };
    eval = mul64(eval ^ (block(d - 2) & mask), p, C);

    eval ^= length_bits;
    eval = mul64(eval, q, C);

    ((eval >> 32) as u32) ^ z[4]
}
