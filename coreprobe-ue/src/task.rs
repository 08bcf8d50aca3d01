//! The UE actor
//!
//! One task per simulated subscriber. It suspends only on its two
//! queues (driver commands and gNB downlink) and on its timers; crypto
//! and codec work is CPU-only. The downlink queue has capacity 1, so
//! per-direction ordering is strict FIFO with implicit back-pressure.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use coreprobe_common::types::UeLinkMessage;

use crate::context::UeContext;
use crate::nas::mm::MmState;
use crate::nas::sm::SmState;

/// T3580 (PDU session establishment) retransmission interval.
pub const T3580_INTERVAL: Duration = Duration::from_secs(16);

/// Grace after Registration Complete for a trailing Configuration
/// Update Command. A timing hint, not a protocol requirement.
const CONFIG_UPDATE_GRACE: Duration = Duration::from_millis(50);

/// Driver commands cueing the next scenario step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeCommand {
    /// Start initial registration
    Register,
    /// Request a new PDU session
    EstablishPduSession,
    /// Release an established PDU session
    ReleasePduSession(u8),
    /// Start UE-initiated deregistration
    Deregister,
    /// Tear the UE down and end the task
    Terminate,
}

/// Spawns the UE task. The task ends on [`UeCommand::Terminate`], when
/// the driver drops the command sender, or when the gNB closes the
/// downlink queue; each path runs the same teardown.
pub fn spawn_ue_task(
    mut ue: UeContext,
    mut downlink_rx: mpsc::Receiver<UeLinkMessage>,
    mut cmd_rx: mpsc::Receiver<UeCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // At most one establishment in flight per UE drives T3580.
        let mut t3580: Option<(u8, Instant)> = None;

        loop {
            let deadline = t3580.map(|(_, at)| at);
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                command = cmd_rx.recv() => match command {
                    Some(UeCommand::Register) => ue.start_registration().await,
                    Some(UeCommand::EstablishPduSession) => {
                        if let Some(psi) = ue.request_pdu_session().await {
                            t3580 = Some((psi, Instant::now() + T3580_INTERVAL));
                        }
                    }
                    Some(UeCommand::ReleasePduSession(psi)) => {
                        ue.request_pdu_session_release(psi).await;
                    }
                    Some(UeCommand::Deregister) => ue.deregister().await,
                    Some(UeCommand::Terminate) | None => {
                        ue.terminate();
                        break;
                    }
                },
                message = downlink_rx.recv() => match message {
                    Some(UeLinkMessage::Nas(octets)) => {
                        let was_initiated = ue.state_mm() == MmState::RegisteredInitiated;
                        ue.handle_downlink_nas(&octets).await;
                        if was_initiated && ue.state_mm() == MmState::Registered {
                            tokio::time::sleep(CONFIG_UPDATE_GRACE).await;
                        }
                        if let Some((psi, _)) = t3580 {
                            if ue.shared().session_state(psi) != Some(SmState::ActivePending) {
                                t3580 = None;
                            }
                        }
                    }
                    Some(UeLinkMessage::DataPathReady { pdu_session_id, gnb_addr }) => {
                        ue.shared().with_session_mut(pdu_session_id, |session| {
                            session.ue_gnb_ip = Some(gnb_addr);
                        });
                    }
                    None => {
                        info!(ue = ue.id(), "gNB closed the downlink queue, terminating");
                        ue.terminate();
                        break;
                    }
                },
                _ = timer => {
                    if let Some((psi, _)) = t3580 {
                        t3580 = if ue.retransmit_establishment(psi).await {
                            Some((psi, Instant::now() + T3580_INTERVAL))
                        } else {
                            None
                        };
                    }
                }
            }
        }
    })
}
