//! 5GMM messages (TS 24.501 §8.2)

use coreprobe_crypto::{CipheringAlg, IntegrityAlg};

use coreprobe_common::types::SNssai;

use crate::codec::{CodecError, Reader, Writer};
use crate::enums::{Cause5Gmm, MessageType, EPD_5GMM};
use crate::ies::{Guti5G, MobileIdentity5Gs, UeSecurityCapability};

// IE tags used by the messages below.
const IEI_RAND: u8 = 0x21;
const IEI_AUTN: u8 = 0x20;
const IEI_AUTH_RESPONSE_PARAM: u8 = 0x2D;
const IEI_AUTS: u8 = 0x30;
const IEI_UE_SECURITY_CAPABILITY: u8 = 0x2E;
const IEI_ADDITIONAL_SECURITY_INFO: u8 = 0x36;
const IEI_NAS_MESSAGE_CONTAINER: u8 = 0x71;
const IEI_GUTI: u8 = 0x77;
const IEI_ALLOWED_NSSAI: u8 = 0x15;
const IEI_PDU_SESSION_ID: u8 = 0x12;
const IEI_SNSSAI: u8 = 0x22;
const IEI_DNN: u8 = 0x25;

/// Payload container type: N1 SM information.
pub const CONTAINER_N1_SM: u8 = 0x01;

/// 5GS registration type: initial registration, follow-on request pending.
pub const REGISTRATION_TYPE_INITIAL: u8 = 0x09;

/// ngKSI value meaning "no key is available".
pub const NGKSI_NO_KEY: u8 = 0x07;

/// Registration Request (§8.2.6), sent plain before security exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    /// 5GS registration type (low nibble of octet 3)
    pub registration_type: u8,
    /// ngKSI (high nibble of octet 3)
    pub ngksi: u8,
    /// SUCI on initial registration, GUTI afterwards
    pub mobile_identity: MobileIdentity5Gs,
    /// Advertised security capability
    pub capability: Option<UeSecurityCapability>,
}

/// Authentication Request (§8.2.1), the 5G-AKA challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    /// ngKSI assigned by the AMF
    pub ngksi: u8,
    /// ABBA parameter
    pub abba: Vec<u8>,
    /// 128-bit random challenge
    pub rand: [u8; 16],
    /// Authentication token (SQN ⊕ AK ‖ AMF ‖ MAC-A)
    pub autn: Vec<u8>,
}

/// Authentication Response (§8.2.2) carrying RES*.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResponse {
    /// RES* (16 bytes for 5G-AKA)
    pub res_star: Vec<u8>,
}

/// Authentication Failure (§8.2.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationFailure {
    /// Failure cause (MAC failure / synch failure)
    pub cause: Cause5Gmm,
    /// AUTS re-synchronization parameter, synch failure only
    pub auts: Option<Vec<u8>>,
}

/// Security Mode Command (§8.2.25), network-selected algorithms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityModeCommand {
    /// Selected ciphering algorithm
    pub ciphering: CipheringAlg,
    /// Selected integrity algorithm
    pub integrity: IntegrityAlg,
    /// ngKSI of the context being taken into use
    pub ngksi: u8,
    /// Replayed UE security capability
    pub replayed_capability: UeSecurityCapability,
    /// Retransmission of initial NAS message requested
    pub rinmr: bool,
}

/// Security Mode Complete (§8.2.26).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityModeComplete {
    /// Replayed initial NAS message when RINMR was set
    pub nas_container: Option<Vec<u8>>,
}

/// Registration Accept (§8.2.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationAccept {
    /// 5GS registration result (3GPP access = 0x01)
    pub result: u8,
    /// Assigned 5G-GUTI
    pub guti: Option<Guti5G>,
    /// Allowed NSSAI entries
    pub allowed_nssai: Vec<SNssai>,
}

/// Deregistration Request, UE originating (§8.2.12).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregistrationRequest {
    /// Deregistration type (normal, 3GPP access = 0x01)
    pub dereg_type: u8,
    /// ngKSI in use
    pub ngksi: u8,
    /// GUTI when assigned, SUCI otherwise
    pub mobile_identity: MobileIdentity5Gs,
}

/// DL NAS Transport (§8.2.11) carrying an N1 SM payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlNasTransport {
    /// Encoded 5GSM message
    pub payload: Vec<u8>,
    /// PDU session the payload belongs to
    pub pdu_session_id: Option<u8>,
}

/// UL NAS Transport (§8.2.10) carrying an N1 SM payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlNasTransport {
    /// Encoded 5GSM message
    pub payload: Vec<u8>,
    /// PDU session the payload belongs to
    pub pdu_session_id: u8,
    /// Request type (initial request = 0x01)
    pub request_type: u8,
    /// Requested slice
    pub snssai: Option<SNssai>,
    /// Requested data network name
    pub dnn: Option<String>,
}

/// A 5GMM message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MmMessage {
    RegistrationRequest(RegistrationRequest),
    RegistrationAccept(RegistrationAccept),
    RegistrationComplete,
    AuthenticationRequest(AuthenticationRequest),
    AuthenticationResponse(AuthenticationResponse),
    AuthenticationReject,
    AuthenticationFailure(AuthenticationFailure),
    SecurityModeCommand(SecurityModeCommand),
    SecurityModeComplete(SecurityModeComplete),
    ConfigurationUpdateCommand,
    ConfigurationUpdateComplete,
    DeregistrationRequest(DeregistrationRequest),
    DeregistrationAccept,
    DlNasTransport(DlNasTransport),
    UlNasTransport(UlNasTransport),
}

impl MmMessage {
    /// Message type octet.
    pub fn message_type(&self) -> MessageType {
        match self {
            MmMessage::RegistrationRequest(_) => MessageType::RegistrationRequest,
            MmMessage::RegistrationAccept(_) => MessageType::RegistrationAccept,
            MmMessage::RegistrationComplete => MessageType::RegistrationComplete,
            MmMessage::AuthenticationRequest(_) => MessageType::AuthenticationRequest,
            MmMessage::AuthenticationResponse(_) => MessageType::AuthenticationResponse,
            MmMessage::AuthenticationReject => MessageType::AuthenticationReject,
            MmMessage::AuthenticationFailure(_) => MessageType::AuthenticationFailure,
            MmMessage::SecurityModeCommand(_) => MessageType::SecurityModeCommand,
            MmMessage::SecurityModeComplete(_) => MessageType::SecurityModeComplete,
            MmMessage::ConfigurationUpdateCommand => MessageType::ConfigurationUpdateCommand,
            MmMessage::ConfigurationUpdateComplete => MessageType::ConfigurationUpdateComplete,
            MmMessage::DeregistrationRequest(_) => MessageType::DeregistrationRequestUeOriginating,
            MmMessage::DeregistrationAccept => MessageType::DeregistrationAcceptUeOriginating,
            MmMessage::DlNasTransport(_) => MessageType::DlNasTransport,
            MmMessage::UlNasTransport(_) => MessageType::UlNasTransport,
        }
    }

    /// Encodes as a plain 5GMM message (EPD, plain security header,
    /// message type, body).
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.u8(EPD_5GMM);
        w.u8(0x00);
        w.u8(self.message_type() as u8);
        self.encode_body(&mut w);
        w.finish()
    }

    fn encode_body(&self, w: &mut Writer) {
        match self {
            MmMessage::RegistrationRequest(m) => {
                w.u8((m.ngksi << 4) | (m.registration_type & 0x0F));
                w.lv16(&m.mobile_identity.encode());
                if let Some(cap) = &m.capability {
                    w.tlv(IEI_UE_SECURITY_CAPABILITY, &cap.encode());
                }
            }
            MmMessage::RegistrationAccept(m) => {
                w.lv(&[m.result]);
                if let Some(guti) = &m.guti {
                    w.tlv16(IEI_GUTI, &MobileIdentity5Gs::Guti(*guti).encode());
                }
                if !m.allowed_nssai.is_empty() {
                    let mut list = Writer::new();
                    for slice in &m.allowed_nssai {
                        match slice.sd_octets().ok().flatten() {
                            Some(sd) => {
                                list.u8(4);
                                list.u8(slice.sst as u8);
                                list.bytes(&sd);
                            }
                            None => {
                                list.u8(1);
                                list.u8(slice.sst as u8);
                            }
                        }
                    }
                    w.tlv(IEI_ALLOWED_NSSAI, &list.finish());
                }
            }
            MmMessage::RegistrationComplete
            | MmMessage::AuthenticationReject
            | MmMessage::ConfigurationUpdateCommand
            | MmMessage::ConfigurationUpdateComplete
            | MmMessage::DeregistrationAccept => {}
            MmMessage::AuthenticationRequest(m) => {
                w.u8(m.ngksi & 0x0F);
                w.lv(&m.abba);
                w.u8(IEI_RAND);
                w.bytes(&m.rand);
                w.tlv(IEI_AUTN, &m.autn);
            }
            MmMessage::AuthenticationResponse(m) => {
                w.tlv(IEI_AUTH_RESPONSE_PARAM, &m.res_star);
            }
            MmMessage::AuthenticationFailure(m) => {
                w.u8(m.cause as u8);
                if let Some(auts) = &m.auts {
                    w.tlv(IEI_AUTS, auts);
                }
            }
            MmMessage::SecurityModeCommand(m) => {
                w.u8(((m.ciphering as u8) << 4) | (m.integrity as u8));
                w.u8(m.ngksi & 0x0F);
                w.lv(&m.replayed_capability.encode());
                if m.rinmr {
                    w.tlv(IEI_ADDITIONAL_SECURITY_INFO, &[0x02]);
                }
            }
            MmMessage::SecurityModeComplete(m) => {
                if let Some(container) = &m.nas_container {
                    w.tlv16(IEI_NAS_MESSAGE_CONTAINER, container);
                }
            }
            MmMessage::DeregistrationRequest(m) => {
                w.u8((m.ngksi << 4) | (m.dereg_type & 0x0F));
                w.lv16(&m.mobile_identity.encode());
            }
            MmMessage::DlNasTransport(m) => {
                w.u8(CONTAINER_N1_SM);
                w.lv16(&m.payload);
                if let Some(psi) = m.pdu_session_id {
                    w.u8(IEI_PDU_SESSION_ID);
                    w.u8(psi);
                }
            }
            MmMessage::UlNasTransport(m) => {
                w.u8(CONTAINER_N1_SM);
                w.lv16(&m.payload);
                w.u8(IEI_PDU_SESSION_ID);
                w.u8(m.pdu_session_id);
                w.u8(0x80 | (m.request_type & 0x07));
                if let Some(slice) = &m.snssai {
                    let mut value = Writer::new();
                    match slice.sd_octets().ok().flatten() {
                        Some(sd) => {
                            value.u8(slice.sst as u8);
                            value.bytes(&sd);
                        }
                        None => value.u8(slice.sst as u8),
                    }
                    w.tlv(IEI_SNSSAI, &value.finish());
                }
                if let Some(dnn) = &m.dnn {
                    w.tlv(IEI_DNN, dnn.as_bytes());
                }
            }
        }
    }

    /// Decodes the body of a plain 5GMM message; the reader is
    /// positioned after the EPD octet.
    pub(crate) fn decode_body(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let sht = r.u8()?;
        if sht & 0x0F != 0 {
            return Err(CodecError::Invalid(
                "protected NAS message given to the plain decoder".into(),
            ));
        }
        let msg_type = MessageType::try_from(r.u8()?)?;
        match msg_type {
            MessageType::RegistrationRequest => {
                let octet = r.u8()?;
                let mobile_identity = MobileIdentity5Gs::decode(r.lv16()?)?;
                let mut capability = None;
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_UE_SECURITY_CAPABILITY => {
                            capability = Some(UeSecurityCapability::decode(r.lv()?)?);
                        }
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::RegistrationRequest(RegistrationRequest {
                    registration_type: octet & 0x0F,
                    ngksi: octet >> 4,
                    mobile_identity,
                    capability,
                }))
            }
            MessageType::RegistrationAccept => {
                let result = *r.lv()?.first().ok_or(CodecError::Truncated)?;
                let mut guti = None;
                let mut allowed_nssai = Vec::new();
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_GUTI => match MobileIdentity5Gs::decode(r.lv16()?)? {
                            MobileIdentity5Gs::Guti(g) => guti = Some(g),
                            _ => {
                                return Err(CodecError::Invalid(
                                    "mobile identity in GUTI IE is not a GUTI".into(),
                                ))
                            }
                        },
                        IEI_ALLOWED_NSSAI => {
                            let mut list = Reader::new(r.lv()?);
                            while !list.is_empty() {
                                let entry = list.lv()?;
                                match entry.len() {
                                    1 => allowed_nssai.push(SNssai::new(entry[0] as i32)),
                                    4 => allowed_nssai.push(SNssai::with_sd(
                                        entry[0] as i32,
                                        hex::encode(&entry[1..4]),
                                    )),
                                    n => {
                                        return Err(CodecError::Invalid(format!(
                                            "S-NSSAI entry of {n} octets"
                                        )))
                                    }
                                }
                            }
                        }
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::RegistrationAccept(RegistrationAccept {
                    result,
                    guti,
                    allowed_nssai,
                }))
            }
            MessageType::RegistrationComplete => Ok(MmMessage::RegistrationComplete),
            MessageType::AuthenticationRequest => {
                let ngksi = r.u8()? & 0x0F;
                let abba = r.lv()?.to_vec();
                let mut rand = [0u8; 16];
                let mut autn = Vec::new();
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_RAND => rand.copy_from_slice(r.take(16)?),
                        IEI_AUTN => autn = r.lv()?.to_vec(),
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::AuthenticationRequest(AuthenticationRequest {
                    ngksi,
                    abba,
                    rand,
                    autn,
                }))
            }
            MessageType::AuthenticationResponse => {
                let mut res_star = Vec::new();
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_AUTH_RESPONSE_PARAM => res_star = r.lv()?.to_vec(),
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::AuthenticationResponse(AuthenticationResponse {
                    res_star,
                }))
            }
            MessageType::AuthenticationReject => Ok(MmMessage::AuthenticationReject),
            MessageType::AuthenticationFailure => {
                let cause = Cause5Gmm::try_from(r.u8()?)?;
                let mut auts = None;
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_AUTS => auts = Some(r.lv()?.to_vec()),
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::AuthenticationFailure(AuthenticationFailure {
                    cause,
                    auts,
                }))
            }
            MessageType::SecurityModeCommand => {
                let algs = r.u8()?;
                let ciphering = CipheringAlg::try_from(algs >> 4)
                    .map_err(|e| CodecError::Invalid(e.to_string()))?;
                let integrity = IntegrityAlg::try_from(algs & 0x0F)
                    .map_err(|e| CodecError::Invalid(e.to_string()))?;
                let ngksi = r.u8()? & 0x0F;
                let replayed_capability = UeSecurityCapability::decode(r.lv()?)?;
                let mut rinmr = false;
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_ADDITIONAL_SECURITY_INFO => {
                            rinmr = r.lv()?.first().is_some_and(|v| v & 0x02 != 0);
                        }
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::SecurityModeCommand(SecurityModeCommand {
                    ciphering,
                    integrity,
                    ngksi,
                    replayed_capability,
                    rinmr,
                }))
            }
            MessageType::SecurityModeComplete => {
                let mut nas_container = None;
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_NAS_MESSAGE_CONTAINER => nas_container = Some(r.lv16()?.to_vec()),
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::SecurityModeComplete(SecurityModeComplete {
                    nas_container,
                }))
            }
            MessageType::ConfigurationUpdateCommand => Ok(MmMessage::ConfigurationUpdateCommand),
            MessageType::ConfigurationUpdateComplete => Ok(MmMessage::ConfigurationUpdateComplete),
            MessageType::DeregistrationRequestUeOriginating => {
                let octet = r.u8()?;
                let mobile_identity = MobileIdentity5Gs::decode(r.lv16()?)?;
                Ok(MmMessage::DeregistrationRequest(DeregistrationRequest {
                    dereg_type: octet & 0x0F,
                    ngksi: octet >> 4,
                    mobile_identity,
                }))
            }
            MessageType::DeregistrationAcceptUeOriginating => Ok(MmMessage::DeregistrationAccept),
            MessageType::DlNasTransport => {
                let _container_type = r.u8()?;
                let payload = r.lv16()?.to_vec();
                let mut pdu_session_id = None;
                while !r.is_empty() {
                    match r.u8()? {
                        IEI_PDU_SESSION_ID => pdu_session_id = Some(r.u8()?),
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::DlNasTransport(DlNasTransport {
                    payload,
                    pdu_session_id,
                }))
            }
            MessageType::UlNasTransport => {
                let _container_type = r.u8()?;
                let payload = r.lv16()?.to_vec();
                let mut pdu_session_id = 0;
                let mut request_type = 0;
                let mut snssai = None;
                let mut dnn = None;
                while !r.is_empty() {
                    let tag = r.u8()?;
                    match tag {
                        IEI_PDU_SESSION_ID => pdu_session_id = r.u8()?,
                        IEI_SNSSAI => {
                            let value = r.lv()?;
                            snssai = Some(match value.len() {
                                1 => SNssai::new(value[0] as i32),
                                4 => SNssai::with_sd(value[0] as i32, hex::encode(&value[1..4])),
                                n => {
                                    return Err(CodecError::Invalid(format!(
                                        "S-NSSAI IE of {n} octets"
                                    )))
                                }
                            });
                        }
                        IEI_DNN => {
                            dnn = Some(
                                String::from_utf8(r.lv()?.to_vec()).map_err(|_| {
                                    CodecError::Invalid("DNN is not UTF-8".into())
                                })?,
                            );
                        }
                        t if t & 0xF0 == 0x80 => request_type = t & 0x07,
                        _ => skip_unknown_tlv(r)?,
                    }
                }
                Ok(MmMessage::UlNasTransport(UlNasTransport {
                    payload,
                    pdu_session_id,
                    request_type,
                    snssai,
                    dnn,
                }))
            }
            other => Err(CodecError::UnknownMessageType(other as u8)),
        }
    }
}

/// Skips the value of an unknown TLV IE (one-octet length assumed).
fn skip_unknown_tlv(r: &mut Reader<'_>) -> Result<(), CodecError> {
    let _ = r.lv()?;
    Ok(())
}
