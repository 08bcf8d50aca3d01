//! Per-UE uplink forwarding task
//!
//! Each attached UE gets one task draining its uplink queue. The first
//! NAS message travels as Initial UE Message; once the AMF has answered
//! (binding the AMF-UE-NGAP-ID), everything else goes as Uplink NAS
//! Transport. The queue has capacity 1, so an undrained gNB exerts
//! back-pressure on the UE.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use coreprobe_common::types::UeLinkMessage;

use crate::{Gnb, GnbUe};

/// Spawns the uplink task for one attached UE. The task ends when the
/// UE drops its uplink sender (terminate), detaching the context.
pub fn spawn_ue_uplink_task(
    gnb: Arc<Gnb>,
    ue: Arc<GnbUe>,
    mut uplink_rx: mpsc::Receiver<UeLinkMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = uplink_rx.recv().await {
            match message {
                UeLinkMessage::Nas(nas_pdu) => {
                    debug!(
                        ran_ue_ngap_id = ue.ran_ue_ngap_id(),
                        len = nas_pdu.len(),
                        "uplink NAS"
                    );
                    gnb.send_uplink_nas(&ue, nas_pdu).await;
                }
                UeLinkMessage::DataPathReady { .. } => {
                    // Downlink-only notification, nothing to forward up.
                }
            }
        }
        info!(
            ran_ue_ngap_id = ue.ran_ue_ngap_id(),
            "uplink queue closed, detaching UE"
        );
        ue.close_downlink();
        gnb.detach_ue(ue.ran_ue_ngap_id());
    })
}
