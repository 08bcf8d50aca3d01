//! Per-session state on the UE side

use std::net::Ipv4Addr;

use tokio::sync::watch;
use tracing::debug;

use crate::nas::sm::SmState;
use crate::tun::SessionDataPath;

/// Maximum establishment retransmissions before the attempt is
/// abandoned.
pub const T3580_MAX_RETRIES: u8 = 4;

/// One PDU session slot of a UE.
///
/// The slot owns the session's OS resources (TUN device and route);
/// deleting the session releases them best-effort. `stop` fans out a
/// shutdown to any data-path pump, `wait` flips when the session is
/// gone so a driver blocked on it unparks.
#[derive(Debug)]
pub struct UePduSession {
    /// PDU session identity (1..16); the slot index is `id - 1`
    pub id: u8,
    /// Session management state
    pub state: SmState,
    /// Address assigned by the core in the establishment accept
    pub ue_ip: Option<Ipv4Addr>,
    /// gNB-side uplink endpoint for this session's user plane
    pub ue_gnb_ip: Option<Ipv4Addr>,
    /// Procedure transaction identity of the establishment
    pub pti: u8,
    /// Establishment retransmissions performed so far
    pub t3580_retries: u8,
    data_path: Option<SessionDataPath>,
    stop_tx: watch::Sender<bool>,
    wait_tx: watch::Sender<bool>,
}

impl UePduSession {
    pub fn new(id: u8, pti: u8) -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (wait_tx, _) = watch::channel(false);
        Self {
            id,
            state: SmState::Inactive,
            ue_ip: None,
            ue_gnb_ip: None,
            pti,
            t3580_retries: 0,
            data_path: None,
            stop_tx,
            wait_tx,
        }
    }

    /// A receiver that flips to `true` when the session is deleted.
    pub fn wait_handle(&self) -> watch::Receiver<bool> {
        self.wait_tx.subscribe()
    }

    /// A receiver that flips to `true` when the session's data path
    /// must stop.
    pub fn stop_handle(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Attaches the OS resources backing this session.
    pub fn set_data_path(&mut self, data_path: SessionDataPath) {
        self.data_path = Some(data_path);
    }

    pub fn has_data_path(&self) -> bool {
        self.data_path.is_some()
    }

    /// Signals shutdown and releases OS resources. Errors on teardown
    /// are ignored; the slot is being abandoned either way.
    pub fn release(&mut self) {
        debug!(psi = self.id, "releasing PDU session resources");
        let _ = self.stop_tx.send(true);
        let _ = self.wait_tx.send(true);
        if let Some(mut data_path) = self.data_path.take() {
            data_path.release();
        }
        self.state = SmState::Inactive;
    }
}

impl Drop for UePduSession {
    fn drop(&mut self) {
        self.release();
    }
}
