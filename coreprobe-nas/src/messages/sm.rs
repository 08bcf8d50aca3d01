//! 5GSM messages (TS 24.501 §8.3)
//!
//! Session management messages ride inside the payload container of
//! UL/DL NAS Transport. The 5GSM header is EPD, PDU session identity,
//! procedure transaction identity, message type.

use std::net::Ipv4Addr;

use crate::codec::{CodecError, Reader, Writer};
use crate::enums::{SmMessageType, EPD_5GSM};

const IEI_PDU_ADDRESS: u8 = 0x29;

/// PDU session type value: IPv4.
pub const PDU_SESSION_TYPE_IPV4: u8 = 0x01;

/// PDU Session Establishment Request (§8.3.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentRequest {
    /// PDU session identity (1..16)
    pub pdu_session_id: u8,
    /// Procedure transaction identity
    pub pti: u8,
    /// Requested PDU session type
    pub session_type: u8,
}

/// PDU Session Establishment Accept (§8.3.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentAccept {
    /// PDU session identity (1..16)
    pub pdu_session_id: u8,
    /// Procedure transaction identity
    pub pti: u8,
    /// Selected PDU session type
    pub session_type: u8,
    /// Assigned IPv4 address
    pub pdu_address: Option<Ipv4Addr>,
}

/// PDU Session Release Request (§8.3.12).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionReleaseRequest {
    pub pdu_session_id: u8,
    pub pti: u8,
}

/// PDU Session Release Command (§8.3.14).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionReleaseCommand {
    pub pdu_session_id: u8,
    pub pti: u8,
    /// 5GSM cause (regular deactivation = 0x24)
    pub cause: u8,
}

/// PDU Session Release Complete (§8.3.15).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionReleaseComplete {
    pub pdu_session_id: u8,
    pub pti: u8,
}

/// A 5GSM message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmMessage {
    EstablishmentRequest(PduSessionEstablishmentRequest),
    EstablishmentAccept(PduSessionEstablishmentAccept),
    ReleaseRequest(PduSessionReleaseRequest),
    ReleaseCommand(PduSessionReleaseCommand),
    ReleaseComplete(PduSessionReleaseComplete),
}

impl SmMessage {
    /// Message type octet.
    pub fn message_type(&self) -> SmMessageType {
        match self {
            SmMessage::EstablishmentRequest(_) => SmMessageType::PduSessionEstablishmentRequest,
            SmMessage::EstablishmentAccept(_) => SmMessageType::PduSessionEstablishmentAccept,
            SmMessage::ReleaseRequest(_) => SmMessageType::PduSessionReleaseRequest,
            SmMessage::ReleaseCommand(_) => SmMessageType::PduSessionReleaseCommand,
            SmMessage::ReleaseComplete(_) => SmMessageType::PduSessionReleaseComplete,
        }
    }

    /// The PDU session identity in the 5GSM header.
    pub fn pdu_session_id(&self) -> u8 {
        match self {
            SmMessage::EstablishmentRequest(m) => m.pdu_session_id,
            SmMessage::EstablishmentAccept(m) => m.pdu_session_id,
            SmMessage::ReleaseRequest(m) => m.pdu_session_id,
            SmMessage::ReleaseCommand(m) => m.pdu_session_id,
            SmMessage::ReleaseComplete(m) => m.pdu_session_id,
        }
    }

    fn pti(&self) -> u8 {
        match self {
            SmMessage::EstablishmentRequest(m) => m.pti,
            SmMessage::EstablishmentAccept(m) => m.pti,
            SmMessage::ReleaseRequest(m) => m.pti,
            SmMessage::ReleaseCommand(m) => m.pti,
            SmMessage::ReleaseComplete(m) => m.pti,
        }
    }

    /// Encodes as a 5GSM message for a NAS transport payload container.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(EPD_5GSM);
        w.u8(self.pdu_session_id());
        w.u8(self.pti());
        w.u8(self.message_type() as u8);
        match self {
            SmMessage::EstablishmentRequest(m) => {
                // Integrity protection maximum data rate: full rate.
                w.bytes(&[0xFF, 0xFF]);
                w.u8(0x90 | (m.session_type & 0x07));
            }
            SmMessage::EstablishmentAccept(m) => {
                w.u8(m.session_type & 0x0F);
                if let Some(addr) = m.pdu_address {
                    let mut value = Vec::with_capacity(5);
                    value.push(PDU_SESSION_TYPE_IPV4);
                    value.extend_from_slice(&addr.octets());
                    w.tlv(IEI_PDU_ADDRESS, &value);
                }
            }
            SmMessage::ReleaseRequest(_) | SmMessage::ReleaseComplete(_) => {}
            SmMessage::ReleaseCommand(m) => w.u8(m.cause),
        }
        w.finish()
    }

    /// Decodes the body of a 5GSM message; the reader is positioned
    /// after the EPD octet.
    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let pdu_session_id = r.u8()?;
        let pti = r.u8()?;
        let msg_type = SmMessageType::try_from(r.u8()?)?;
        match msg_type {
            SmMessageType::PduSessionEstablishmentRequest => {
                let _max_rate = r.take(2)?;
                let mut session_type = PDU_SESSION_TYPE_IPV4;
                while !r.is_empty() {
                    let tag = r.u8()?;
                    if tag & 0xF0 == 0x90 {
                        session_type = tag & 0x07;
                    } else {
                        let _ = r.lv()?;
                    }
                }
                Ok(SmMessage::EstablishmentRequest(PduSessionEstablishmentRequest {
                    pdu_session_id,
                    pti,
                    session_type,
                }))
            }
            SmMessageType::PduSessionEstablishmentAccept => {
                let session_type = r.u8()? & 0x0F;
                let mut pdu_address = None;
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_PDU_ADDRESS => {
                            let value = r.lv()?;
                            if value.len() < 5 || value[0] != PDU_SESSION_TYPE_IPV4 {
                                return Err(CodecError::Invalid(
                                    "PDU address is not an IPv4 address".into(),
                                ));
                            }
                            pdu_address = Some(Ipv4Addr::new(
                                value[1], value[2], value[3], value[4],
                            ));
                        }
                        _ => {
                            let _ = r.lv()?;
                        }
                    }
                }
                Ok(SmMessage::EstablishmentAccept(PduSessionEstablishmentAccept {
                    pdu_session_id,
                    pti,
                    session_type,
                    pdu_address,
                }))
            }
            SmMessageType::PduSessionReleaseRequest => {
                Ok(SmMessage::ReleaseRequest(PduSessionReleaseRequest {
                    pdu_session_id,
                    pti,
                }))
            }
            SmMessageType::PduSessionReleaseCommand => {
                let cause = r.u8()?;
                Ok(SmMessage::ReleaseCommand(PduSessionReleaseCommand {
                    pdu_session_id,
                    pti,
                    cause,
                }))
            }
            SmMessageType::PduSessionReleaseComplete => {
                Ok(SmMessage::ReleaseComplete(PduSessionReleaseComplete {
                    pdu_session_id,
                    pti,
                }))
            }
            other => Err(CodecError::UnknownMessageType(other as u8)),
        }
    }
}
