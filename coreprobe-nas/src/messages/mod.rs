//! Typed NAS messages with their plain wire encoding
//!
//! The engine passes these values between actors; the encode/decode pair
//! is the byte form the security framing and the gNB transport carry.

pub mod mm;
pub mod sm;

pub use mm::*;
pub use sm::*;

use crate::codec::{CodecError, Reader};
use crate::enums::{EPD_5GMM, EPD_5GSM};

/// A decoded plain NAS message, 5GMM or 5GSM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasMessage {
    /// Mobility management (N1 outer layer)
    Mm(MmMessage),
    /// Session management (carried inside NAS transport containers)
    Sm(SmMessage),
}

impl NasMessage {
    /// Encodes the message into plain NAS octets.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            NasMessage::Mm(msg) => msg.encode(),
            NasMessage::Sm(msg) => msg.encode(),
        }
    }

    /// Decodes a plain NAS message, dispatching on the extended protocol
    /// discriminator.
    pub fn decode(octets: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(octets);
        match r.u8()? {
            EPD_5GMM => Ok(NasMessage::Mm(MmMessage::decode_body(&mut r)?)),
            EPD_5GSM => Ok(NasMessage::Sm(SmMessage::decode_body(&mut r)?)),
            other => Err(CodecError::Invalid(format!(
                "extended protocol discriminator {other:#04x}"
            ))),
        }
    }
}
