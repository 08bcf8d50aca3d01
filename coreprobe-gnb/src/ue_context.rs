//! Per-UE context held by the gNB

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::warn;

use coreprobe_common::types::{SNssai, UeLinkMessage};

/// NGAP procedure state of a UE as seen by the gNB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GnbUeState {
    /// Waiting for the first downlink answer to the Initial UE Message
    #[default]
    Initial,
    /// NGAP id pair established, context setup ongoing
    Ongoing,
    /// Initial context setup complete
    Ready,
}

/// GTP endpoints of one PDU session at the gNB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GnbPduSession {
    /// PDU session identity (1..16)
    pub pdu_session_id: u8,
    /// Admitted slice
    pub snssai: SNssai,
    /// UPF GTP-U endpoint (uplink)
    pub upf_addr: Ipv4Addr,
    /// Uplink TEID at the UPF
    pub uplink_teid: u32,
    /// Downlink TEID allocated by the gNB
    pub downlink_teid: u32,
}

#[derive(Debug, Default)]
struct GnbUeInner {
    amf_ue_ngap_id: Option<i64>,
    state: GnbUeState,
    /// Downlink queue towards the UE; `None` once the UE is released.
    gnb_tx: Option<mpsc::Sender<UeLinkMessage>>,
    pdu_sessions: HashMap<u8, GnbPduSession>,
}

/// The gNB's view of one attached UE.
///
/// The RAN-UE-NGAP-ID is fixed at attach; everything else lives behind
/// the context lock, including the downlink sender slot so a release
/// and a concurrent downlink forward cannot race.
#[derive(Debug)]
pub struct GnbUe {
    ran_ue_ngap_id: u32,
    inner: Mutex<GnbUeInner>,
}

impl GnbUe {
    pub fn new(ran_ue_ngap_id: u32, gnb_tx: mpsc::Sender<UeLinkMessage>) -> Self {
        Self {
            ran_ue_ngap_id,
            inner: Mutex::new(GnbUeInner {
                gnb_tx: Some(gnb_tx),
                ..Default::default()
            }),
        }
    }

    pub fn ran_ue_ngap_id(&self) -> u32 {
        self.ran_ue_ngap_id
    }

    pub fn amf_ue_ngap_id(&self) -> Option<i64> {
        self.inner.lock().unwrap().amf_ue_ngap_id
    }

    pub fn set_amf_ue_ngap_id(&self, id: i64) {
        self.inner.lock().unwrap().amf_ue_ngap_id = Some(id);
    }

    pub fn state(&self) -> GnbUeState {
        self.inner.lock().unwrap().state
    }

    pub fn set_state(&self, state: GnbUeState) {
        self.inner.lock().unwrap().state = state;
    }

    /// Sends a message down to the UE.
    ///
    /// The sender is cloned out under the lock; a released UE has an
    /// empty slot, which downgrades the send to a logged drop.
    pub async fn send_to_ue(&self, message: UeLinkMessage) {
        let tx = self.inner.lock().unwrap().gnb_tx.clone();
        match tx {
            Some(tx) => {
                if tx.send(message).await.is_err() {
                    warn!(
                        ran_ue_ngap_id = self.ran_ue_ngap_id,
                        "UE dropped its downlink queue, message discarded"
                    );
                }
            }
            None => warn!(
                ran_ue_ngap_id = self.ran_ue_ngap_id,
                "downlink channel closed, NAS message discarded"
            ),
        }
    }

    /// Clears the downlink sender; later sends are dropped with a
    /// warning. Idempotent.
    pub fn close_downlink(&self) {
        self.inner.lock().unwrap().gnb_tx = None;
    }

    pub fn add_pdu_session(&self, session: GnbPduSession) {
        self.inner
            .lock()
            .unwrap()
            .pdu_sessions
            .insert(session.pdu_session_id, session);
    }

    pub fn remove_pdu_session(&self, pdu_session_id: u8) -> Option<GnbPduSession> {
        self.inner.lock().unwrap().pdu_sessions.remove(&pdu_session_id)
    }

    pub fn pdu_session(&self, pdu_session_id: u8) -> Option<GnbPduSession> {
        self.inner.lock().unwrap().pdu_sessions.get(&pdu_session_id).cloned()
    }

    pub fn pdu_session_count(&self) -> usize {
        self.inner.lock().unwrap().pdu_sessions.len()
    }
}
