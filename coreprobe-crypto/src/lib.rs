//! Cryptographic algorithms for coreprobe
//!
//! Implements the 5G security primitives the simulated UE needs:
//! - Milenage (5G-AKA challenge computation)
//! - The 5G-AKA round itself (RES*/AUTS derivation, key hierarchy)
//! - SNOW3G (NEA1/NIA1)
//! - AES-based NEA2/NIA2
//! - TS 33.220 key derivation
//!
//! All functions are pure over byte slices; failures surface as
//! [`CryptoError`] values, never panics.

pub mod aes;
pub mod auth;
pub mod kdf;
pub mod milenage;
pub mod nea;
pub mod nia;
pub mod snow3g;

pub use auth::{
    run_aka, select_algorithms, AkaOutcome, AuthSubscription, CipheringAlg, IntegrityAlg,
};

use thiserror::Error;

/// Failures inside the crypto engine.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key or parameter decode failure (bad hex, wrong length).
    #[error("decode error: {0}")]
    Decode(String),

    /// Unexpected internal condition.
    #[error("internal error: {0}")]
    Internal(String),
}
