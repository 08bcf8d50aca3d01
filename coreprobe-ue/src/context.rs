//! Per-subscriber UE context
//!
//! Identity, security state and the 16 PDU session slots of one
//! simulated subscriber. The session slots and the uplink sender are
//! the only state shared with the driver and are guarded by a single
//! per-UE mutex; everything else is owned by the UE task.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use coreprobe_common::config::{OpType, UeConfig};
use coreprobe_common::types::{SNssai, UeLinkMessage};
use coreprobe_common::Error;
use coreprobe_crypto::auth::{select_algorithms, AuthSubscription};
use coreprobe_crypto::{CipheringAlg, IntegrityAlg};
use coreprobe_nas::ies::{Guti5G, MobileIdentity5Gs, Suci, UeSecurityCapability};
use coreprobe_nas::security::NasCount;

use crate::nas::mm::MmState;
use crate::nas::sm::SmState;
use crate::scenario::ScenarioMessage;
use crate::session::UePduSession;

/// Number of PDU session slots per UE.
pub const MAX_PDU_SESSIONS: usize = 16;

/// Security state of a UE.
#[derive(Debug, Clone)]
pub struct UeSecurity {
    /// Permanent identifier, `imsi-<mcc><mnc><msin>`. Never changes.
    pub supi: String,
    pub msin: String,
    pub mcc: String,
    pub mnc: String,
    /// Uplink NAS COUNT
    pub ul_count: NasCount,
    /// Downlink NAS COUNT
    pub dl_count: NasCount,
    /// Advertised capability bitmap
    pub capability: UeSecurityCapability,
    /// Selected integrity algorithm
    pub integrity_alg: IntegrityAlg,
    /// Selected ciphering algorithm
    pub ciphering_alg: CipheringAlg,
    /// Serving network name
    pub snn: String,
    /// NAS encryption key
    pub knas_enc: [u8; 16],
    /// NAS integrity key
    pub knas_int: [u8; 16],
    /// AMF key from the 5G-AKA hierarchy
    pub kamf: [u8; 32],
    /// USIM credentials
    pub auth_subs: AuthSubscription,
    /// Concealed identity used on initial registration
    pub suci: MobileIdentity5Gs,
    pub routing_indicator: String,
    /// Temporary identity assigned by the AMF
    pub guti: Option<Guti5G>,
    /// True once NAS keys exist and uplink must be protected
    pub has_context: bool,
}

impl UeSecurity {
    fn new(config: &UeConfig) -> Self {
        let (integrity_alg, ciphering_alg) = select_algorithms(&config.algs);
        let (opc, op) = match config.op_type {
            OpType::Opc => (config.op.clone(), String::new()),
            OpType::Op => (String::new(), config.op.clone()),
        };
        Self {
            supi: format!("imsi-{}{}{}", config.mcc, config.mnc, config.msin),
            msin: config.msin.clone(),
            mcc: config.mcc.clone(),
            mnc: config.mnc.clone(),
            ul_count: NasCount::new(),
            dl_count: NasCount::new(),
            capability: UeSecurityCapability::from_supported(&config.algs),
            integrity_alg,
            ciphering_alg,
            snn: derive_snn(&config.mcc, &config.mnc),
            knas_enc: [0; 16],
            knas_int: [0; 16],
            kamf: [0; 32],
            auth_subs: AuthSubscription {
                k: config.key.clone(),
                opc,
                op,
                amf: config.amf.clone(),
                sqn: config.sqn.clone(),
            },
            suci: MobileIdentity5Gs::Suci(Suci {
                plmn: config.plmn(),
                routing_indicator: config.routing_indicator.clone(),
                msin: config.msin.clone(),
            }),
            routing_indicator: config.routing_indicator.clone(),
            guti: None,
            has_context: false,
        }
    }

    /// Drops keys and counters after an Authentication Reject.
    pub(crate) fn clear_context(&mut self) {
        self.knas_enc = [0; 16];
        self.knas_int = [0; 16];
        self.kamf = [0; 32];
        self.ul_count = NasCount::new();
        self.dl_count = NasCount::new();
        self.has_context = false;
    }
}

/// Serving network name per TS 24.501 (MNC zero-filled to 3 digits).
pub fn derive_snn(mcc: &str, mnc: &str) -> String {
    format!("5G:mnc{mnc:0>3}.mcc{mcc}.3gppnetwork.org")
}

/// AMF identity learned from the assigned GUTI.
#[derive(Debug, Clone, Copy, Default)]
pub struct AmfInfo {
    pub region_id: u8,
    pub set_id: u16,
    pub pointer: u8,
    /// AMF-UE-NGAP-ID, when the driver chooses to mirror it here
    pub ue_id: i64,
}

#[derive(Debug, Default)]
struct SharedState {
    gnb_rx: Option<mpsc::Sender<UeLinkMessage>>,
    sessions: [Option<UePduSession>; MAX_PDU_SESSIONS],
}

/// Driver-visible slice of a UE: the uplink sender and session slots,
/// behind the per-UE lock.
#[derive(Debug, Default)]
pub struct UeShared {
    inner: Mutex<SharedState>,
}

impl UeShared {
    /// SM state of a session, if the slot is occupied.
    pub fn session_state(&self, pdu_session_id: u8) -> Option<SmState> {
        self.with_session_ref(pdu_session_id, |s| s.state)
    }

    /// Core-assigned IP of a session.
    pub fn session_ip(&self, pdu_session_id: u8) -> Option<Ipv4Addr> {
        self.with_session_ref(pdu_session_id, |s| s.ue_ip).flatten()
    }

    /// gNB-side uplink endpoint of a session.
    pub fn session_gnb_ip(&self, pdu_session_id: u8) -> Option<Ipv4Addr> {
        self.with_session_ref(pdu_session_id, |s| s.ue_gnb_ip).flatten()
    }

    /// Number of occupied session slots.
    pub fn session_count(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| s.is_some())
            .count()
    }

    /// A handle that flips when the session is deleted.
    pub fn session_wait_handle(&self, pdu_session_id: u8) -> Option<watch::Receiver<bool>> {
        self.with_session_ref(pdu_session_id, |s| s.wait_handle())
    }

    /// True while the uplink towards the gNB is open.
    pub fn uplink_open(&self) -> bool {
        self.inner.lock().unwrap().gnb_rx.is_some()
    }

    /// Sends on the uplink queue under the guard: a cleared sender
    /// means the UE was terminated, and the message is dropped with a
    /// warning instead of panicking.
    pub async fn send_uplink(&self, message: UeLinkMessage) {
        let tx = self.inner.lock().unwrap().gnb_rx.clone();
        match tx {
            Some(tx) => {
                if tx.send(message).await.is_err() {
                    warn!("gNB dropped the uplink queue, NAS message discarded");
                }
            }
            None => warn!("uplink queue closed, NAS message discarded"),
        }
    }

    fn with_session_ref<R>(
        &self,
        pdu_session_id: u8,
        f: impl FnOnce(&UePduSession) -> R,
    ) -> Option<R> {
        let slot = slot_index(pdu_session_id)?;
        self.inner.lock().unwrap().sessions[slot].as_ref().map(f)
    }

    pub(crate) fn with_session_mut<R>(
        &self,
        pdu_session_id: u8,
        f: impl FnOnce(&mut UePduSession) -> R,
    ) -> Option<R> {
        let slot = slot_index(pdu_session_id)?;
        self.inner.lock().unwrap().sessions[slot].as_mut().map(f)
    }

    pub(crate) fn set_gnb_rx(&self, tx: mpsc::Sender<UeLinkMessage>) {
        self.inner.lock().unwrap().gnb_rx = Some(tx);
    }

    /// Clears the uplink sender under the lock. Idempotent.
    pub(crate) fn close_uplink(&self) {
        self.inner.lock().unwrap().gnb_rx = None;
    }

    /// Occupies the first free slot. Slot `i` holds session id `i + 1`.
    pub(crate) fn create_session(&self, pti: u8) -> Result<u8, Error> {
        let mut state = self.inner.lock().unwrap();
        let slot = state
            .sessions
            .iter()
            .position(|s| s.is_none())
            .ok_or_else(|| {
                Error::StateMachine("all 16 PDU session slots are in use".into())
            })?;
        let id = (slot + 1) as u8;
        state.sessions[slot] = Some(UePduSession::new(id, pti));
        Ok(id)
    }

    /// Deletes a session: releases its resources and clears the slot in
    /// one critical section.
    pub(crate) fn delete_session(&self, pdu_session_id: u8) -> bool {
        let Some(slot) = slot_index(pdu_session_id) else {
            return false;
        };
        let mut state = self.inner.lock().unwrap();
        match state.sessions[slot].take() {
            Some(mut session) => {
                session.release();
                true
            }
            None => false,
        }
    }

    /// Releases every session slot (terminate path).
    pub(crate) fn clear_all_sessions(&self) {
        let mut state = self.inner.lock().unwrap();
        for slot in state.sessions.iter_mut() {
            if let Some(mut session) = slot.take() {
                session.release();
            }
        }
    }
}

fn slot_index(pdu_session_id: u8) -> Option<usize> {
    if (1..=MAX_PDU_SESSIONS as u8).contains(&pdu_session_id) {
        Some(pdu_session_id as usize - 1)
    } else {
        None
    }
}

/// One simulated subscriber.
pub struct UeContext {
    id: u8,
    pub security: UeSecurity,
    state_mm: MmState,
    pub amf_info: AmfInfo,
    pub dnn: String,
    pub snssai: SNssai,
    pub tunnel_enabled: bool,
    shared: Arc<UeShared>,
    scenario_tx: Option<mpsc::UnboundedSender<ScenarioMessage>>,
    /// Encoded initial Registration Request, replayed on RINMR
    pub(crate) last_registration_request: Option<Vec<u8>>,
    next_pti: u8,
}

impl UeContext {
    /// Builds a UE from validated configuration. Starts in 5GMM-NULL.
    pub fn new(
        config: &UeConfig,
        id: u8,
        scenario_tx: mpsc::UnboundedSender<ScenarioMessage>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            id,
            security: UeSecurity::new(config),
            state_mm: MmState::Null,
            amf_info: AmfInfo::default(),
            dnn: config.dnn.clone(),
            snssai: config.snssai.clone(),
            tunnel_enabled: config.tunnel_enabled,
            shared: Arc::new(UeShared::default()),
            scenario_tx: Some(scenario_tx),
            last_registration_request: None,
            next_pti: 1,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn state_mm(&self) -> MmState {
        self.state_mm
    }

    /// The driver-visible shared handle.
    pub fn shared(&self) -> Arc<UeShared> {
        self.shared.clone()
    }

    /// Connects the uplink queue towards the serving gNB.
    pub fn set_gnb_rx(&self, tx: mpsc::Sender<UeLinkMessage>) {
        self.shared.set_gnb_rx(tx);
    }

    /// Moves to a new MM state and publishes it on the scenario stream.
    pub(crate) fn set_state(&mut self, state: MmState) {
        if self.state_mm == state {
            return;
        }
        info!(ue = self.id, from = %self.state_mm, to = %state, "MM state change");
        self.state_mm = state;
        if let Some(tx) = &self.scenario_tx {
            let _ = tx.send(ScenarioMessage::StateChange(state));
        }
    }

    pub(crate) async fn send_to_gnb(&self, octets: Vec<u8>) {
        self.shared.send_uplink(UeLinkMessage::Nas(octets)).await;
    }

    pub(crate) fn allocate_pti(&mut self) -> u8 {
        let pti = self.next_pti;
        self.next_pti = if self.next_pti == 254 { 1 } else { self.next_pti + 1 };
        pti
    }

    /// Tears the UE down: MM to NULL, all sessions released, the uplink
    /// sender cleared under the lock, and the scenario stream closed.
    /// Safe to call twice.
    pub fn terminate(&mut self) {
        self.set_state(MmState::Null);
        self.shared.clear_all_sessions();
        self.shared.close_uplink();
        self.scenario_tx = None;
        info!(ue = self.id, "UE terminated");
    }
}
