//! Scripted AMF double
//!
//! Plays the network side of the N2 interface against the simulated
//! gNB: consumes uplink NGAP from the gNB's channel and injects
//! downlink PDUs through the dispatcher. Mirrors the UE's key
//! derivation so it can protect and verify NAS like a real core.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use coreprobe_common::config::UeConfig;
use coreprobe_common::types::SNssai;
use coreprobe_crypto::auth::{self, AkaOutcome, AuthSubscription};
use coreprobe_crypto::{CipheringAlg, IntegrityAlg};
use coreprobe_gnb::Gnb;
use coreprobe_nas::enums::SecurityHeaderType;
use coreprobe_nas::ies::{Guti5G, UeSecurityCapability};
use coreprobe_nas::messages::{
    AuthenticationFailure, AuthenticationRequest, DlNasTransport, MmMessage, NasMessage,
    PduSessionEstablishmentAccept, RegistrationAccept, RegistrationRequest, SecurityModeCommand,
    SecurityModeComplete, SmMessage,
};
use coreprobe_nas::security::{self, Direction, NasCount};
use coreprobe_ngap::{
    Guami, InitiatingMessage, NgapPdu, PduSessionResourceSetupItem, SuccessfulOutcome,
};
use coreprobe_ue::context::derive_snn;

use crate::test_fixtures::{build_autn, TEST_RAND};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// NAS security state on the network side.
struct NasSecurity {
    knas_int: [u8; 16],
    knas_enc: [u8; 16],
    integrity: IntegrityAlg,
    ciphering: CipheringAlg,
    ul_count: NasCount,
    dl_count: NasCount,
}

/// The AMF double.
pub struct MockAmf {
    gnb: Arc<Gnb>,
    rx: mpsc::Receiver<NgapPdu>,
    /// AMF-UE-NGAP-ID this AMF assigns to the bench UE
    pub amf_ue_ngap_id: i64,
    /// RAN id learned from the Initial UE Message
    pub ran_ue_ngap_id: u32,
    /// Kamf mirrored from the last successful authentication
    pub kamf: [u8; 32],
    security: Option<NasSecurity>,
}

impl MockAmf {
    pub fn new(gnb: Arc<Gnb>, rx: mpsc::Receiver<NgapPdu>) -> Self {
        Self {
            gnb,
            rx,
            amf_ue_ngap_id: 100,
            ran_ue_ngap_id: 0,
            kamf: [0; 32],
            security: None,
        }
    }

    /// Receives the next uplink NGAP PDU, failing the test on timeout.
    pub async fn recv(&mut self) -> NgapPdu {
        tokio::time::timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for an NGAP PDU")
            .expect("gNB closed the NGAP channel")
    }

    /// Expects the Initial UE Message opening a registration and
    /// learns the RAN-UE-NGAP-ID from it.
    pub async fn expect_initial_ue_message(&mut self) -> RegistrationRequest {
        match self.recv().await {
            NgapPdu::Initiating(InitiatingMessage::InitialUeMessage {
                ran_ue_ngap_id,
                nas_pdu,
                ..
            }) => {
                self.ran_ue_ngap_id = ran_ue_ngap_id;
                match NasMessage::decode(&nas_pdu).expect("undecodable initial NAS") {
                    NasMessage::Mm(MmMessage::RegistrationRequest(request)) => request,
                    other => panic!("expected Registration Request, got {other:?}"),
                }
            }
            other => panic!("expected Initial UE Message, got {other:?}"),
        }
    }

    /// Expects an Uplink NAS Transport and returns the raw NAS PDU.
    pub async fn expect_uplink_nas(&mut self) -> Vec<u8> {
        match self.recv().await {
            NgapPdu::Initiating(InitiatingMessage::UplinkNasTransport {
                amf_ue_ngap_id,
                nas_pdu,
                ..
            }) => {
                assert_eq!(amf_ue_ngap_id, self.amf_ue_ngap_id);
                nas_pdu
            }
            other => panic!("expected Uplink NAS Transport, got {other:?}"),
        }
    }

    /// Injects a Downlink NAS Transport through the gNB dispatcher.
    pub async fn send_downlink_nas(&mut self, nas_pdu: Vec<u8>) {
        self.gnb
            .dispatch(NgapPdu::Initiating(InitiatingMessage::DownlinkNasTransport {
                amf_ue_ngap_id: self.amf_ue_ngap_id,
                ran_ue_ngap_id: self.ran_ue_ngap_id,
                nas_pdu,
            }))
            .await;
    }

    /// Sends the 5G-AKA challenge.
    pub async fn send_authentication_request(&mut self, rand: [u8; 16], autn: [u8; 16]) {
        let request = MmMessage::AuthenticationRequest(AuthenticationRequest {
            ngksi: 0,
            abba: vec![0x00, 0x00],
            rand,
            autn: autn.to_vec(),
        });
        self.send_downlink_nas(request.encode()).await;
    }

    /// Expects a plain Authentication Response and returns RES*.
    pub async fn expect_authentication_response(&mut self) -> Vec<u8> {
        let nas = self.expect_uplink_nas().await;
        match NasMessage::decode(&nas).expect("undecodable NAS") {
            NasMessage::Mm(MmMessage::AuthenticationResponse(response)) => response.res_star,
            other => panic!("expected Authentication Response, got {other:?}"),
        }
    }

    /// Expects a plain Authentication Failure.
    pub async fn expect_authentication_failure(&mut self) -> AuthenticationFailure {
        let nas = self.expect_uplink_nas().await;
        match NasMessage::decode(&nas).expect("undecodable NAS") {
            NasMessage::Mm(MmMessage::AuthenticationFailure(failure)) => failure,
            other => panic!("expected Authentication Failure, got {other:?}"),
        }
    }

    /// Mirrors the UE's key derivation for the given challenge and
    /// installs the NAS security context on the network side. Returns
    /// the RES* this AMF expects in the Authentication Response.
    pub fn establish_security(&mut self, config: &UeConfig, rand: [u8; 16], sqn_hn: [u8; 6]) -> Vec<u8> {
        // The mirror runs the same round the USIM does, with a stale
        // local SQN so freshness always passes.
        let mut subs = AuthSubscription {
            k: config.key.clone(),
            opc: config.op.clone(),
            op: String::new(),
            amf: config.amf.clone(),
            sqn: "000000000000".into(),
        };
        let snn = derive_snn(&config.mcc, &config.mnc);
        let autn = build_autn(&config.key, &config.op, &rand, sqn_hn, [0x80, 0x00]);
        let success = match auth::run_aka(&mut subs, &rand, &snn, &autn).expect("AKA mirror failed")
        {
            AkaOutcome::Successful(success) => success,
            other_outcome => panic!(
                "AKA mirror did not succeed: {}",
                match other_outcome {
                    AkaOutcome::MacFailure { .. } => "MAC failure",
                    AkaOutcome::SqnFailure { .. } => "SQN failure",
                    AkaOutcome::Successful(_) => unreachable!(),
                }
            ),
        };

        let supi = format!("imsi-{}{}{}", config.mcc, config.mnc, config.msin);
        self.kamf = auth::derive_kamf(&success, &snn, &supi).expect("Kamf mirror failed");

        let integrity = IntegrityAlg::Nia2;
        let ciphering = CipheringAlg::Nea0;
        let (knas_enc, knas_int) = auth::derive_nas_keys(&self.kamf, ciphering, integrity);
        self.security = Some(NasSecurity {
            knas_int,
            knas_enc,
            integrity,
            ciphering,
            ul_count: NasCount::new(),
            dl_count: NasCount::new(),
        });
        success.res_star.to_vec()
    }

    /// Protects a downlink message with the network-side context.
    pub fn protect(&mut self, message: MmMessage, header_type: SecurityHeaderType) -> Vec<u8> {
        let sec = self.security.as_mut().expect("no security context yet");
        security::protect(
            &message.encode(),
            header_type,
            Direction::Downlink,
            &mut sec.dl_count,
            sec.integrity,
            &sec.knas_int,
            sec.ciphering,
            &sec.knas_enc,
        )
    }

    /// Verifies and strips protection from an uplink message.
    pub fn unprotect(&mut self, octets: &[u8]) -> NasMessage {
        let sec = self.security.as_mut().expect("no security context yet");
        let plain = security::unprotect(
            octets,
            Direction::Uplink,
            &mut sec.ul_count,
            sec.integrity,
            &sec.knas_int,
            sec.ciphering,
            &sec.knas_enc,
        )
        .expect("uplink NAS failed the integrity check");
        NasMessage::decode(&plain).expect("undecodable protected NAS")
    }

    /// Sends the Security Mode Command under the new context.
    pub async fn send_security_mode_command(&mut self, capability: UeSecurityCapability) {
        let command = MmMessage::SecurityModeCommand(SecurityModeCommand {
            ciphering: CipheringAlg::Nea0,
            integrity: IntegrityAlg::Nia2,
            ngksi: 0,
            replayed_capability: capability,
            rinmr: true,
        });
        let octets = self.protect(command, SecurityHeaderType::IntegrityProtectedNewContext);
        self.send_downlink_nas(octets).await;
    }

    /// Expects the Security Mode Complete under the new context.
    pub async fn expect_security_mode_complete(&mut self) -> SecurityModeComplete {
        let nas = self.expect_uplink_nas().await;
        match self.unprotect(&nas) {
            NasMessage::Mm(MmMessage::SecurityModeComplete(complete)) => complete,
            other => panic!("expected Security Mode Complete, got {other:?}"),
        }
    }

    /// Delivers the Registration Accept inside an Initial Context Setup
    /// Request and consumes the gNB's setup response.
    pub async fn send_registration_accept(&mut self, tmsi: [u8; 4], allowed_nssai: Vec<SNssai>) {
        let guti = Guti5G {
            plmn: self.gnb.config().plmn,
            amf_region_id: 1,
            amf_set_id: 1,
            amf_pointer: 0,
            tmsi,
        };
        let accept = MmMessage::RegistrationAccept(RegistrationAccept {
            result: 0x01,
            guti: Some(guti),
            allowed_nssai,
        });
        let octets = self.protect(accept, SecurityHeaderType::IntegrityProtectedAndCiphered);

        self.gnb
            .dispatch(NgapPdu::Initiating(InitiatingMessage::InitialContextSetupRequest {
                amf_ue_ngap_id: self.amf_ue_ngap_id,
                ran_ue_ngap_id: self.ran_ue_ngap_id,
                guami: Guami {
                    plmn: self.gnb.config().plmn,
                    amf_region_id: 1,
                    amf_set_id: 1,
                    amf_pointer: 0,
                },
                nas_pdu: Some(octets),
            }))
            .await;

        match self.recv().await {
            NgapPdu::Successful(SuccessfulOutcome::InitialContextSetupResponse { .. }) => {}
            other => panic!("expected Initial Context Setup Response, got {other:?}"),
        }
    }

    /// Expects the protected Registration Complete.
    pub async fn expect_registration_complete(&mut self) {
        let nas = self.expect_uplink_nas().await;
        match self.unprotect(&nas) {
            NasMessage::Mm(MmMessage::RegistrationComplete) => {}
            other => panic!("expected Registration Complete, got {other:?}"),
        }
    }

    /// Expects the UL NAS Transport carrying a PDU Session
    /// Establishment Request; returns (psi, pti).
    pub async fn expect_establishment_request(&mut self) -> (u8, u8) {
        let nas = self.expect_uplink_nas().await;
        let transport = match self.unprotect(&nas) {
            NasMessage::Mm(MmMessage::UlNasTransport(transport)) => transport,
            other => panic!("expected UL NAS Transport, got {other:?}"),
        };
        match NasMessage::decode(&transport.payload).expect("undecodable 5GSM payload") {
            NasMessage::Sm(SmMessage::EstablishmentRequest(request)) => {
                (request.pdu_session_id, request.pti)
            }
            other => panic!("expected Establishment Request, got {other:?}"),
        }
    }

    /// Answers an establishment with a PDU Session Resource Setup
    /// Request carrying the accept, then consumes the gNB's response.
    pub async fn send_establishment_accept(&mut self, psi: u8, pti: u8, ip: Ipv4Addr) {
        let accept = SmMessage::EstablishmentAccept(PduSessionEstablishmentAccept {
            pdu_session_id: psi,
            pti,
            session_type: 0x01,
            pdu_address: Some(ip),
        });
        let transport = MmMessage::DlNasTransport(DlNasTransport {
            payload: accept.encode(),
            pdu_session_id: Some(psi),
        });
        let octets = self.protect(transport, SecurityHeaderType::IntegrityProtectedAndCiphered);

        self.gnb
            .dispatch(NgapPdu::Initiating(
                InitiatingMessage::PduSessionResourceSetupRequest {
                    amf_ue_ngap_id: self.amf_ue_ngap_id,
                    ran_ue_ngap_id: self.ran_ue_ngap_id,
                    items: vec![PduSessionResourceSetupItem {
                        pdu_session_id: psi,
                        nas_pdu: octets,
                        snssai: SNssai::with_sd(1, "010203"),
                        upf_addr: Ipv4Addr::new(10, 100, 200, 1),
                        uplink_teid: 0x0000_1000 + psi as u32,
                    }],
                },
            ))
            .await;

        match self.recv().await {
            NgapPdu::Successful(SuccessfulOutcome::PduSessionResourceSetupResponse {
                items, ..
            }) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].pdu_session_id, psi);
            }
            other => panic!("expected PDU Session Resource Setup Response, got {other:?}"),
        }
    }

    /// Runs the complete registration exchange for the bench UE and
    /// leaves an active NAS security context on both sides.
    pub async fn run_registration(&mut self, config: &UeConfig) {
        let request = self.expect_initial_ue_message().await;
        let capability = request.capability.expect("registration without capability");

        let autn = build_autn(
            &config.key,
            &config.op,
            &TEST_RAND,
            [0, 0, 0, 0, 0, 1],
            [0x80, 0x00],
        );
        let expected_res_star = self.establish_security(config, TEST_RAND, [0, 0, 0, 0, 0, 1]);
        self.send_authentication_request(TEST_RAND, autn).await;
        let res_star = self.expect_authentication_response().await;
        assert_eq!(res_star, expected_res_star, "RES* mismatch");

        self.send_security_mode_command(capability).await;
        let complete = self.expect_security_mode_complete().await;
        assert!(complete.nas_container.is_some(), "RINMR was set, expected the replayed request");

        self.send_registration_accept([0x01, 0x02, 0x03, 0x04], vec![SNssai::with_sd(1, "010203")])
            .await;
        self.expect_registration_complete().await;
    }

    /// The gNB this AMF is scripted against.
    pub fn gnb(&self) -> &Arc<Gnb> {
        &self.gnb
    }
}
