//! 5GMM procedures (TS 24.501 §5.5, UE side)
//!
//! The MM state machine and the downlink procedure handlers. Any
//! receive that does not match the current MM state is logged and the
//! message dropped; the state never moves on unexpected input.

use std::fmt;

use tracing::{error, info, warn};

use coreprobe_crypto::auth::{self, AkaOutcome};
use coreprobe_nas::enums::SecurityHeaderType;
use coreprobe_nas::messages::{
    AuthenticationFailure, AuthenticationRequest, DeregistrationRequest, DlNasTransport,
    MmMessage, NasMessage, RegistrationAccept, RegistrationRequest, SecurityModeCommand,
    SecurityModeComplete, SmMessage, UlNasTransport, NGKSI_NO_KEY, REGISTRATION_TYPE_INITIAL,
};
use coreprobe_nas::security::{self, Direction, NasCount};
use coreprobe_nas::Cause5Gmm;

use crate::context::UeContext;
use crate::nas::sm::SmState;

/// 5GMM main states (TS 24.501 §5.1.3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MmState {
    /// 5GMM-NULL
    #[default]
    Null,
    /// 5GMM-DEREGISTERED
    Deregistered,
    /// 5GMM-REGISTERED-INITIATED
    RegisteredInitiated,
    /// 5GMM-REGISTERED
    Registered,
    /// 5GMM-SERVICE-REQUEST-INITIATED
    ServiceRequestInitiated,
    /// 5GMM-DEREGISTERED-INITIATED
    DeregisteredInitiated,
}

impl fmt::Display for MmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmState::Null => write!(f, "5GMM-NULL"),
            MmState::Deregistered => write!(f, "5GMM-DEREGISTERED"),
            MmState::RegisteredInitiated => write!(f, "5GMM-REGISTERED-INITIATED"),
            MmState::Registered => write!(f, "5GMM-REGISTERED"),
            MmState::ServiceRequestInitiated => write!(f, "5GMM-SERVICE-REQUEST-INITIATED"),
            MmState::DeregisteredInitiated => write!(f, "5GMM-DEREGISTERED-INITIATED"),
        }
    }
}

/// Deregistration type: normal, 3GPP access.
const DEREG_TYPE_NORMAL_3GPP: u8 = 0x01;

impl UeContext {
    // ========== uplink send helpers ==========

    pub(crate) async fn send_plain(&mut self, message: MmMessage) {
        self.send_to_gnb(message.encode()).await;
    }

    pub(crate) async fn send_protected(
        &mut self,
        message: MmMessage,
        header_type: SecurityHeaderType,
    ) {
        let plain = message.encode();
        let sec = &mut self.security;
        let octets = security::protect(
            &plain,
            header_type,
            Direction::Uplink,
            &mut sec.ul_count,
            sec.integrity_alg,
            &sec.knas_int,
            sec.ciphering_alg,
            &sec.knas_enc,
        );
        self.send_to_gnb(octets).await;
    }

    /// Sends ciphered when a context exists, plain before that.
    async fn send_secured_or_plain(&mut self, message: MmMessage) {
        if self.security.has_context {
            self.send_protected(message, SecurityHeaderType::IntegrityProtectedAndCiphered)
                .await;
        } else {
            self.send_plain(message).await;
        }
    }

    // ========== driver-initiated procedures ==========

    /// Starts initial registration: NULL/DEREGISTERED only.
    pub async fn start_registration(&mut self) {
        if !matches!(self.state_mm(), MmState::Null | MmState::Deregistered) {
            warn!(ue = self.id(), state = %self.state_mm(), "registration not allowed in this state");
            return;
        }
        self.set_state(MmState::Deregistered);

        let request = MmMessage::RegistrationRequest(RegistrationRequest {
            registration_type: REGISTRATION_TYPE_INITIAL,
            ngksi: NGKSI_NO_KEY,
            mobile_identity: self.security.suci.clone(),
            capability: Some(self.security.capability),
        });
        let encoded = request.encode();
        self.last_registration_request = Some(encoded.clone());
        info!(ue = self.id(), supi = %self.security.supi, "sending Registration Request");
        self.send_to_gnb(encoded).await;
    }

    /// Requests a new PDU session; returns its id for the driver's
    /// retransmission timer.
    pub async fn request_pdu_session(&mut self) -> Option<u8> {
        if self.state_mm() != MmState::Registered {
            warn!(ue = self.id(), state = %self.state_mm(), "PDU session request requires 5GMM-REGISTERED");
            return None;
        }
        let pti = self.allocate_pti();
        let pdu_session_id = match self.shared().create_session(pti) {
            Ok(id) => id,
            Err(e) => {
                warn!(ue = self.id(), %e, "cannot create PDU session");
                return None;
            }
        };
        self.shared()
            .with_session_mut(pdu_session_id, |s| s.state = SmState::ActivePending);
        self.send_establishment_request(pdu_session_id, pti).await;
        Some(pdu_session_id)
    }

    pub(crate) async fn send_establishment_request(&mut self, pdu_session_id: u8, pti: u8) {
        info!(ue = self.id(), psi = pdu_session_id, "sending PDU Session Establishment Request");
        let sm = SmMessage::EstablishmentRequest(
            coreprobe_nas::messages::PduSessionEstablishmentRequest {
                pdu_session_id,
                pti,
                session_type: coreprobe_nas::messages::PDU_SESSION_TYPE_IPV4,
            },
        );
        let transport = MmMessage::UlNasTransport(UlNasTransport {
            payload: sm.encode(),
            pdu_session_id,
            request_type: 0x01,
            snssai: Some(self.snssai.clone()),
            dnn: Some(self.dnn.clone()),
        });
        self.send_secured_or_plain(transport).await;
    }

    /// Re-sends the establishment request on T3580 expiry. Returns
    /// false once the retry budget is spent and the slot is abandoned.
    pub(crate) async fn retransmit_establishment(&mut self, pdu_session_id: u8) -> bool {
        let pending = self.shared().with_session_mut(pdu_session_id, |s| {
            if s.state != SmState::ActivePending {
                return None;
            }
            if s.t3580_retries >= crate::session::T3580_MAX_RETRIES {
                return Some(None);
            }
            s.t3580_retries += 1;
            Some(Some(s.pti))
        });
        match pending.flatten() {
            Some(Some(pti)) => {
                warn!(ue = self.id(), psi = pdu_session_id, "T3580 expired, retransmitting");
                self.send_establishment_request(pdu_session_id, pti).await;
                true
            }
            Some(None) => {
                error!(ue = self.id(), psi = pdu_session_id, "T3580 retries exhausted, abandoning session");
                self.shared().delete_session(pdu_session_id);
                false
            }
            None => false,
        }
    }

    /// Requests release of an established PDU session.
    pub async fn request_pdu_session_release(&mut self, pdu_session_id: u8) {
        if self.state_mm() != MmState::Registered {
            warn!(ue = self.id(), "session release requires 5GMM-REGISTERED");
            return;
        }
        let Some(pti) = self
            .shared()
            .with_session_mut(pdu_session_id, |s| s.pti)
        else {
            warn!(ue = self.id(), psi = pdu_session_id, "release for unknown session");
            return;
        };
        let sm = SmMessage::ReleaseRequest(coreprobe_nas::messages::PduSessionReleaseRequest {
            pdu_session_id,
            pti,
        });
        let transport = MmMessage::UlNasTransport(UlNasTransport {
            payload: sm.encode(),
            pdu_session_id,
            request_type: 0x01,
            snssai: None,
            dnn: None,
        });
        self.send_secured_or_plain(transport).await;
    }

    /// Starts UE-initiated deregistration.
    pub async fn deregister(&mut self) {
        if self.state_mm() != MmState::Registered {
            warn!(ue = self.id(), state = %self.state_mm(), "deregistration requires 5GMM-REGISTERED");
            return;
        }
        self.set_state(MmState::DeregisteredInitiated);
        let identity = match self.security.guti {
            Some(guti) => coreprobe_nas::ies::MobileIdentity5Gs::Guti(guti),
            None => self.security.suci.clone(),
        };
        let request = MmMessage::DeregistrationRequest(DeregistrationRequest {
            dereg_type: DEREG_TYPE_NORMAL_3GPP,
            ngksi: 0,
            mobile_identity: identity,
        });
        self.send_secured_or_plain(request).await;
    }

    // ========== downlink handling ==========

    /// Entry point for one downlink NAS PDU from the gNB.
    pub async fn handle_downlink_nas(&mut self, octets: &[u8]) {
        let plain = if security::is_protected(octets) {
            if !self.security.has_context {
                // The only acceptable protected message before a context
                // exists is the Security Mode Command establishing one.
                match self.accept_new_context_command(octets) {
                    Some(plain) => {
                        let message = match NasMessage::decode(&plain) {
                            Ok(NasMessage::Mm(message)) => message,
                            _ => return,
                        };
                        self.dispatch_mm(message).await;
                        return;
                    }
                    None => {
                        warn!(ue = self.id(), "protected NAS before any security context, dropped");
                        return;
                    }
                }
            }
            let sec = &mut self.security;
            match security::unprotect(
                octets,
                Direction::Downlink,
                &mut sec.dl_count,
                sec.integrity_alg,
                &sec.knas_int,
                sec.ciphering_alg,
                &sec.knas_enc,
            ) {
                Ok(plain) => plain,
                Err(e) => {
                    warn!(ue = self.id(), %e, "downlink NAS protection check failed, dropped");
                    return;
                }
            }
        } else {
            octets.to_vec()
        };

        let message = match NasMessage::decode(&plain) {
            Ok(NasMessage::Mm(message)) => message,
            Ok(NasMessage::Sm(_)) => {
                warn!(ue = self.id(), "bare 5GSM message outside a NAS transport, dropped");
                return;
            }
            Err(e) => {
                warn!(ue = self.id(), %e, "undecodable NAS message dropped");
                return;
            }
        };
        self.dispatch_mm(message).await;
    }

    /// Bootstrap for a Security Mode Command protected under a context
    /// the UE has not activated yet: the inner payload names the
    /// algorithms, so the keys it is protected with can be derived from
    /// Kamf before the MAC check.
    fn accept_new_context_command(&mut self, octets: &[u8]) -> Option<Vec<u8>> {
        let header_type = SecurityHeaderType::try_from(octets[1]).ok()?;
        if !header_type.is_new_context() || header_type.is_ciphered() {
            return None;
        }
        if self.security.kamf == [0; 32] {
            return None;
        }

        let seq = octets[6];
        let payload = &octets[security::PROTECTED_HEADER_LEN..];
        let command = match NasMessage::decode(payload) {
            Ok(NasMessage::Mm(MmMessage::SecurityModeCommand(command))) => command,
            _ => return None,
        };

        let (_, knas_int) =
            auth::derive_nas_keys(&self.security.kamf, command.ciphering, command.integrity);
        let mut mac_input = Vec::with_capacity(1 + payload.len());
        mac_input.push(seq);
        mac_input.extend_from_slice(payload);
        self.security.dl_count.sync(seq);
        let expected = command.integrity.compute_mac(
            self.security.dl_count.value(),
            security::BEARER_NAS,
            Direction::Downlink as u8,
            &knas_int,
            &mac_input,
        );
        if expected[..] != octets[2..6] {
            warn!(ue = self.id(), "Security Mode Command MAC check failed");
            return None;
        }
        Some(payload.to_vec())
    }

    async fn dispatch_mm(&mut self, message: MmMessage) {
        let state = self.state_mm();
        match message {
            MmMessage::AuthenticationRequest(m)
                if matches!(state, MmState::Deregistered | MmState::RegisteredInitiated) =>
            {
                self.handle_authentication_request(m).await;
            }
            MmMessage::AuthenticationReject => self.handle_authentication_reject(),
            MmMessage::SecurityModeCommand(m) if state == MmState::RegisteredInitiated => {
                self.handle_security_mode_command(m).await;
            }
            MmMessage::RegistrationAccept(m) if state == MmState::RegisteredInitiated => {
                self.handle_registration_accept(m).await;
            }
            MmMessage::ConfigurationUpdateCommand if state == MmState::Registered => {
                info!(ue = self.id(), "Configuration Update Command");
                self.send_secured_or_plain(MmMessage::ConfigurationUpdateComplete)
                    .await;
            }
            MmMessage::DlNasTransport(m) if state == MmState::Registered => {
                self.handle_dl_nas_transport(m).await;
            }
            MmMessage::DeregistrationAccept if state == MmState::DeregisteredInitiated => {
                info!(ue = self.id(), "deregistration accepted");
                self.set_state(MmState::Deregistered);
            }
            other => {
                warn!(
                    ue = self.id(),
                    state = %state,
                    message = ?other.message_type(),
                    "unexpected NAS message for current MM state, dropped"
                );
            }
        }
    }

    /// 5G-AKA challenge (detailed contract of the registration flow).
    async fn handle_authentication_request(&mut self, message: AuthenticationRequest) {
        let outcome = {
            let sec = &mut self.security;
            auth::run_aka(&mut sec.auth_subs, &message.rand, &sec.snn, &message.autn)
        };
        match outcome {
            Ok(AkaOutcome::Successful(success)) => {
                info!(ue = self.id(), "authentication challenge verified");
                let kamf = match auth::derive_kamf(&success, &self.security.snn, &self.security.supi)
                {
                    Ok(kamf) => kamf,
                    Err(e) => {
                        error!(ue = self.id(), %e, "Kamf derivation failed, abandoning registration");
                        self.security.clear_context();
                        self.set_state(MmState::Deregistered);
                        return;
                    }
                };
                self.security.kamf = kamf;
                let (knas_enc, knas_int) = auth::derive_nas_keys(
                    &kamf,
                    self.security.ciphering_alg,
                    self.security.integrity_alg,
                );
                self.security.knas_enc = knas_enc;
                self.security.knas_int = knas_int;

                let response =
                    MmMessage::AuthenticationResponse(coreprobe_nas::messages::AuthenticationResponse {
                        res_star: success.res_star.to_vec(),
                    });
                self.send_plain(response).await;
                self.set_state(MmState::RegisteredInitiated);
            }
            Ok(AkaOutcome::MacFailure { computed, received }) => {
                warn!(
                    ue = self.id(),
                    computed = %hex::encode(computed),
                    received = %hex::encode(received),
                    "authentication MAC failure"
                );
                let failure = MmMessage::AuthenticationFailure(AuthenticationFailure {
                    cause: Cause5Gmm::MacFailure,
                    auts: None,
                });
                self.send_plain(failure).await;
                // MM state unchanged.
            }
            Ok(AkaOutcome::SqnFailure { auts }) => {
                warn!(ue = self.id(), "authentication SQN out of range, sending AUTS");
                let failure = MmMessage::AuthenticationFailure(AuthenticationFailure {
                    cause: Cause5Gmm::SynchFailure,
                    auts: Some(auts.to_vec()),
                });
                self.send_plain(failure).await;
                // MM state unchanged.
            }
            Err(e) => {
                error!(ue = self.id(), %e, "authentication parameters undecodable, abandoning registration");
                self.security.clear_context();
                self.set_state(MmState::Deregistered);
            }
        }
    }

    fn handle_authentication_reject(&mut self) {
        warn!(ue = self.id(), "authentication rejected by the network");
        self.security.clear_context();
        self.set_state(MmState::Deregistered);
    }

    /// Accepts the network's algorithm selection, re-derives the NAS
    /// keys and answers with a Security Mode Complete protected under
    /// the new context.
    async fn handle_security_mode_command(&mut self, message: SecurityModeCommand) {
        info!(
            ue = self.id(),
            ciphering = %message.ciphering,
            integrity = %message.integrity,
            "Security Mode Command"
        );
        if message.replayed_capability != self.security.capability {
            warn!(ue = self.id(), "replayed UE security capability differs from ours");
        }

        self.security.ciphering_alg = message.ciphering;
        self.security.integrity_alg = message.integrity;
        let (knas_enc, knas_int) = auth::derive_nas_keys(
            &self.security.kamf,
            message.ciphering,
            message.integrity,
        );
        self.security.knas_enc = knas_enc;
        self.security.knas_int = knas_int;
        // New context: both counts restart at zero.
        self.security.ul_count = NasCount::new();
        self.security.dl_count = NasCount::new();
        self.security.has_context = true;

        let nas_container = if message.rinmr {
            self.last_registration_request.clone()
        } else {
            None
        };
        let complete = MmMessage::SecurityModeComplete(SecurityModeComplete { nas_container });
        self.send_protected(complete, SecurityHeaderType::IntegrityProtectedNewContext)
            .await;
    }

    /// Registration Accept: persist the GUTI and AMF identity, adopt
    /// the network slice when configured to, confirm.
    async fn handle_registration_accept(&mut self, message: RegistrationAccept) {
        if let Some(guti) = message.guti {
            self.amf_info.region_id = guti.amf_region_id;
            self.amf_info.set_id = guti.amf_set_id;
            self.amf_info.pointer = guti.amf_pointer;
            self.security.guti = Some(guti);
            info!(ue = self.id(), tmsi = %hex::encode(guti.tmsi), "5G-GUTI assigned");
        }

        if self.snssai.sst == 0 {
            if let Some(allowed) = message.allowed_nssai.first() {
                warn!(
                    ue = self.id(),
                    sst = allowed.sst,
                    sd = %allowed.sd,
                    "adopting network allowed NSSAI"
                );
                self.snssai = allowed.clone();
            }
        }

        self.set_state(MmState::Registered);
        self.send_secured_or_plain(MmMessage::RegistrationComplete).await;
    }

    /// DL NAS Transport: unwrap the 5GSM payload and dispatch it.
    async fn handle_dl_nas_transport(&mut self, message: DlNasTransport) {
        let sm = match NasMessage::decode(&message.payload) {
            Ok(NasMessage::Sm(sm)) => sm,
            Ok(NasMessage::Mm(_)) => {
                warn!(ue = self.id(), "NAS transport payload is not 5GSM, dropped");
                return;
            }
            Err(e) => {
                warn!(ue = self.id(), %e, "undecodable 5GSM payload dropped");
                return;
            }
        };
        match sm {
            SmMessage::EstablishmentAccept(accept) => {
                self.handle_establishment_accept(accept).await;
            }
            SmMessage::ReleaseCommand(command) => {
                info!(ue = self.id(), psi = command.pdu_session_id, "PDU Session Release Command");
                let complete =
                    SmMessage::ReleaseComplete(coreprobe_nas::messages::PduSessionReleaseComplete {
                        pdu_session_id: command.pdu_session_id,
                        pti: command.pti,
                    });
                let transport = MmMessage::UlNasTransport(UlNasTransport {
                    payload: complete.encode(),
                    pdu_session_id: command.pdu_session_id,
                    request_type: 0x01,
                    snssai: None,
                    dnn: None,
                });
                self.send_secured_or_plain(transport).await;
                self.shared().delete_session(command.pdu_session_id);
            }
            other => {
                warn!(
                    ue = self.id(),
                    message = ?other.message_type(),
                    "unexpected 5GSM message in DL NAS transport, dropped"
                );
            }
        }
    }

    async fn handle_establishment_accept(
        &mut self,
        accept: coreprobe_nas::messages::PduSessionEstablishmentAccept,
    ) {
        let psi = accept.pdu_session_id;
        let known = self
            .shared()
            .with_session_mut(psi, |session| {
                session.ue_ip = accept.pdu_address;
                session.state = SmState::Active;
                session.t3580_retries = 0;
            })
            .is_some();
        if !known {
            warn!(ue = self.id(), psi, "establishment accept for unknown PDU session, dropped");
            return;
        }
        info!(ue = self.id(), psi, ip = ?accept.pdu_address, "PDU session active");

        if self.tunnel_enabled {
            if let Some(address) = accept.pdu_address {
                match crate::tun::SessionDataPath::create(self.id(), psi, address).await {
                    Ok(data_path) => {
                        self.shared().with_session_mut(psi, |s| s.set_data_path(data_path));
                    }
                    Err(e) => warn!(ue = self.id(), psi, %e, "session data path setup failed"),
                }
            }
        }
    }
}
