//! AES-128 block cipher wrapper
//!
//! Single-block AES-128 (the Milenage kernel) and AES-128 CMAC (NIA2),
//! wrapping the RustCrypto implementations.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use cmac::{Cmac, Mac};

/// AES-128 block size in bytes
pub const BLOCK_SIZE: usize = 16;

/// AES-128 key size in bytes
pub const KEY_SIZE: usize = 16;

/// AES-128 CMAC size in bytes
pub const CMAC_SIZE: usize = 16;

/// AES-128 block cipher for single-block operations.
#[derive(Clone)]
pub struct Aes128Block {
    cipher: Aes128,
}

impl Aes128Block {
    /// Creates a new AES-128 block cipher with the given key.
    pub fn new(key: &[u8; KEY_SIZE]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Encrypts a single 16-byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        let mut buf = GenericArray::clone_from_slice(block);
        self.cipher.encrypt_block(&mut buf);
        block.copy_from_slice(&buf);
    }

    /// Encrypts a single 16-byte block, returning the result.
    pub fn encrypt_block_copy(&self, block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut out = *block;
        self.encrypt_block(&mut out);
        out
    }
}

/// XOR two 16-byte blocks in place.
#[inline]
pub fn xor_block(a: &mut [u8; BLOCK_SIZE], b: &[u8; BLOCK_SIZE]) {
    for i in 0..BLOCK_SIZE {
        a[i] ^= b[i];
    }
}

/// Computes AES-128 CMAC (RFC 4493) over a message.
pub fn aes128_cmac(key: &[u8; KEY_SIZE], message: &[u8]) -> [u8; CMAC_SIZE] {
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("CMAC accepts 16-byte keys"));
    mac.update(message);
    let mut out = [0u8; CMAC_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}
