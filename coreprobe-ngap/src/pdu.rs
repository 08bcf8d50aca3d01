//! NGAP PDU model (TS 38.413)
//!
//! An NGAP PDU is a tagged variant over initiating message, successful
//! outcome and unsuccessful outcome, each identified by a procedure
//! code. Only the IEs the simulated gNB consumes or produces are
//! carried.

use std::net::Ipv4Addr;

use coreprobe_common::types::{Plmn, SNssai};

/// NGAP procedure codes (TS 38.413 §9.4).
pub mod procedure_code {
    pub const AMF_CONFIGURATION_UPDATE: u8 = 0;
    pub const DOWNLINK_NAS_TRANSPORT: u8 = 4;
    pub const ERROR_INDICATION: u8 = 9;
    pub const INITIAL_CONTEXT_SETUP: u8 = 14;
    pub const INITIAL_UE_MESSAGE: u8 = 15;
    pub const NG_SETUP: u8 = 21;
    pub const PDU_SESSION_RESOURCE_RELEASE: u8 = 28;
    pub const PDU_SESSION_RESOURCE_SETUP: u8 = 29;
    pub const UE_CONTEXT_RELEASE: u8 = 41;
    pub const PATH_SWITCH_REQUEST: u8 = 43;
    pub const UPLINK_NAS_TRANSPORT: u8 = 46;
}

/// Globally Unique AMF Identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guami {
    pub plmn: Plmn,
    pub amf_region_id: u8,
    pub amf_set_id: u16,
    pub amf_pointer: u8,
}

/// RRC establishment cause for the Initial UE Message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcEstablishmentCause {
    MoSignalling,
    MoData,
    Emergency,
}

/// One entry of a PDU Session Resource Setup Request list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceSetupItem {
    /// PDU session identity (1..16)
    pub pdu_session_id: u8,
    /// NAS PDU riding on the resource setup (the establishment accept)
    pub nas_pdu: Vec<u8>,
    /// Slice the session is admitted on
    pub snssai: SNssai,
    /// UPF GTP-U endpoint for uplink traffic
    pub upf_addr: Ipv4Addr,
    /// Uplink tunnel endpoint identifier at the UPF
    pub uplink_teid: u32,
}

/// One entry of a PDU Session Resource Setup Response list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceSetupResponseItem {
    pub pdu_session_id: u8,
    /// gNB GTP-U endpoint for downlink traffic
    pub gnb_addr: Ipv4Addr,
    /// Downlink tunnel endpoint identifier at the gNB
    pub downlink_teid: u32,
}

/// NGAP initiating messages the gNB sends or receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitiatingMessage {
    /// gNB → AMF: NG Setup Request
    NgSetupRequest {
        gnb_id: u32,
        ran_node_name: String,
        plmn: Plmn,
        tac: u32,
        supported_nssai: Vec<SNssai>,
    },
    /// gNB → AMF: first uplink NAS message of a UE
    InitialUeMessage {
        ran_ue_ngap_id: u32,
        nas_pdu: Vec<u8>,
        establishment_cause: RrcEstablishmentCause,
    },
    /// gNB → AMF: subsequent uplink NAS
    UplinkNasTransport {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
        nas_pdu: Vec<u8>,
    },
    /// AMF → gNB: downlink NAS
    DownlinkNasTransport {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
        nas_pdu: Vec<u8>,
    },
    /// AMF → gNB: initial context setup
    InitialContextSetupRequest {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
        guami: Guami,
        nas_pdu: Option<Vec<u8>>,
    },
    /// AMF → gNB: PDU session resource setup
    PduSessionResourceSetupRequest {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
        items: Vec<PduSessionResourceSetupItem>,
    },
    /// AMF → gNB: PDU session resource release
    PduSessionResourceReleaseCommand {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
        pdu_session_ids: Vec<u8>,
        nas_pdu: Option<Vec<u8>>,
    },
    /// AMF → gNB: UE context release command
    UeContextReleaseCommand {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: Option<u32>,
        cause: Cause,
    },
    /// AMF → gNB: AMF configuration update
    AmfConfigurationUpdate { amf_name: Option<String> },
    /// Either direction: error indication
    ErrorIndication { cause: Cause },
}

impl InitiatingMessage {
    pub fn procedure_code(&self) -> u8 {
        use procedure_code::*;
        match self {
            InitiatingMessage::NgSetupRequest { .. } => NG_SETUP,
            InitiatingMessage::InitialUeMessage { .. } => INITIAL_UE_MESSAGE,
            InitiatingMessage::UplinkNasTransport { .. } => UPLINK_NAS_TRANSPORT,
            InitiatingMessage::DownlinkNasTransport { .. } => DOWNLINK_NAS_TRANSPORT,
            InitiatingMessage::InitialContextSetupRequest { .. } => INITIAL_CONTEXT_SETUP,
            InitiatingMessage::PduSessionResourceSetupRequest { .. } => PDU_SESSION_RESOURCE_SETUP,
            InitiatingMessage::PduSessionResourceReleaseCommand { .. } => {
                PDU_SESSION_RESOURCE_RELEASE
            }
            InitiatingMessage::UeContextReleaseCommand { .. } => UE_CONTEXT_RELEASE,
            InitiatingMessage::AmfConfigurationUpdate { .. } => AMF_CONFIGURATION_UPDATE,
            InitiatingMessage::ErrorIndication { .. } => ERROR_INDICATION,
        }
    }
}

/// NGAP successful outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuccessfulOutcome {
    /// AMF → gNB: NG Setup Response
    NgSetupResponse {
        amf_name: String,
        served_guamis: Vec<Guami>,
        relative_capacity: u8,
    },
    /// gNB → AMF: initial context setup response
    InitialContextSetupResponse {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
    },
    /// gNB → AMF: PDU session resource setup response
    PduSessionResourceSetupResponse {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
        items: Vec<PduSessionResourceSetupResponseItem>,
    },
    /// gNB → AMF: PDU session resource release response
    PduSessionResourceReleaseResponse {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
        pdu_session_ids: Vec<u8>,
    },
    /// gNB → AMF: UE context release complete
    UeContextReleaseComplete {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
    },
    /// AMF → gNB: path switch request acknowledge
    PathSwitchRequestAcknowledge {
        amf_ue_ngap_id: i64,
        ran_ue_ngap_id: u32,
    },
}

impl SuccessfulOutcome {
    pub fn procedure_code(&self) -> u8 {
        use procedure_code::*;
        match self {
            SuccessfulOutcome::NgSetupResponse { .. } => NG_SETUP,
            SuccessfulOutcome::InitialContextSetupResponse { .. } => INITIAL_CONTEXT_SETUP,
            SuccessfulOutcome::PduSessionResourceSetupResponse { .. } => {
                PDU_SESSION_RESOURCE_SETUP
            }
            SuccessfulOutcome::PduSessionResourceReleaseResponse { .. } => {
                PDU_SESSION_RESOURCE_RELEASE
            }
            SuccessfulOutcome::UeContextReleaseComplete { .. } => UE_CONTEXT_RELEASE,
            SuccessfulOutcome::PathSwitchRequestAcknowledge { .. } => PATH_SWITCH_REQUEST,
        }
    }
}

/// NGAP unsuccessful outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnsuccessfulOutcome {
    /// AMF → gNB: NG Setup Failure
    NgSetupFailure { cause: Cause },
}

impl UnsuccessfulOutcome {
    pub fn procedure_code(&self) -> u8 {
        match self {
            UnsuccessfulOutcome::NgSetupFailure { .. } => procedure_code::NG_SETUP,
        }
    }
}

/// NGAP cause groups, flattened to the values the tester observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(u8),
    Transport(u8),
    Nas(u8),
    Protocol(u8),
    Misc(u8),
}

/// A decoded NGAP PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NgapPdu {
    Initiating(InitiatingMessage),
    Successful(SuccessfulOutcome),
    Unsuccessful(UnsuccessfulOutcome),
}

impl NgapPdu {
    /// The procedure code of the nested message.
    pub fn procedure_code(&self) -> u8 {
        match self {
            NgapPdu::Initiating(m) => m.procedure_code(),
            NgapPdu::Successful(m) => m.procedure_code(),
            NgapPdu::Unsuccessful(m) => m.procedure_code(),
        }
    }
}
