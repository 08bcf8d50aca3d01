//! 5G NAS layer for coreprobe
//!
//! Typed 5GMM/5GSM message values with their plain-NAS wire encoding
//! (TS 24.501 §8), the mobile identity IEs (SUCI/GUTI BCD coding), and
//! the security-protected framing (header type, MAC, sequence number,
//! ciphering) of §4.4 / TS 24.501 §9.1.
//!
//! Only the messages this tester drives are modeled; the engine hands
//! decoded values around, never raw IE soup.

pub mod codec;
pub mod enums;
pub mod ies;
pub mod messages;
pub mod security;

pub use codec::CodecError;
pub use enums::{Cause5Gmm, MessageType, SecurityHeaderType, SmMessageType};
pub use ies::{Guti5G, MobileIdentity5Gs, Suci, UeSecurityCapability};
pub use messages::{MmMessage, NasMessage, SmMessage};
pub use security::{Direction, NasCount};
