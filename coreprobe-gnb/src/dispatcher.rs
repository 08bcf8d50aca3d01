//! Downlink NGAP dispatch
//!
//! Demultiplexes decoded NGAP PDUs by procedure code and routes
//! UE-scoped procedures to the matching context. Unknown procedures are
//! logged and ignored; nothing here tears down the AMF association.

use std::sync::Arc;

use tracing::{error, info, warn};

use coreprobe_common::types::UeLinkMessage;
use coreprobe_ngap::{
    InitiatingMessage, NgapPdu, PduSessionResourceSetupResponseItem, SuccessfulOutcome,
    UnsuccessfulOutcome,
};

use crate::ue_context::{GnbPduSession, GnbUe, GnbUeState};
use crate::Gnb;

impl Gnb {
    /// Handles one decoded downlink NGAP PDU.
    pub async fn dispatch(&self, pdu: NgapPdu) {
        match pdu {
            NgapPdu::Initiating(message) => self.dispatch_initiating(message).await,
            NgapPdu::Successful(outcome) => self.dispatch_successful(outcome).await,
            NgapPdu::Unsuccessful(outcome) => self.dispatch_unsuccessful(outcome),
        }
    }

    async fn dispatch_initiating(&self, message: InitiatingMessage) {
        match message {
            InitiatingMessage::DownlinkNasTransport {
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                nas_pdu,
            } => {
                info!(ran_ue_ngap_id, "downlink NAS transport");
                let Some(ue) = self.resolve(ran_ue_ngap_id, amf_ue_ngap_id) else {
                    return;
                };
                // The first downlink answer binds the AMF-UE-NGAP-ID.
                if ue.amf_ue_ngap_id().is_none() {
                    ue.set_amf_ue_ngap_id(amf_ue_ngap_id);
                    ue.set_state(GnbUeState::Ongoing);
                }
                ue.send_to_ue(UeLinkMessage::Nas(nas_pdu)).await;
            }
            InitiatingMessage::InitialContextSetupRequest {
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                guami: _,
                nas_pdu,
            } => {
                info!(ran_ue_ngap_id, "initial context setup request");
                let Some(ue) = self.resolve(ran_ue_ngap_id, amf_ue_ngap_id) else {
                    return;
                };
                if ue.amf_ue_ngap_id().is_none() {
                    ue.set_amf_ue_ngap_id(amf_ue_ngap_id);
                }
                ue.set_state(GnbUeState::Ready);
                self.send_to_amf(NgapPdu::Successful(
                    SuccessfulOutcome::InitialContextSetupResponse {
                        amf_ue_ngap_id,
                        ran_ue_ngap_id,
                    },
                ))
                .await;
                if let Some(nas_pdu) = nas_pdu {
                    ue.send_to_ue(UeLinkMessage::Nas(nas_pdu)).await;
                }
            }
            InitiatingMessage::PduSessionResourceSetupRequest {
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                items,
            } => {
                info!(ran_ue_ngap_id, sessions = items.len(), "PDU session resource setup");
                let Some(ue) = self.resolve(ran_ue_ngap_id, amf_ue_ngap_id) else {
                    return;
                };
                let mut response_items = Vec::with_capacity(items.len());
                for item in items {
                    let downlink_teid = self.allocate_downlink_teid();
                    ue.add_pdu_session(GnbPduSession {
                        pdu_session_id: item.pdu_session_id,
                        snssai: item.snssai.clone(),
                        upf_addr: item.upf_addr,
                        uplink_teid: item.uplink_teid,
                        downlink_teid,
                    });
                    response_items.push(PduSessionResourceSetupResponseItem {
                        pdu_session_id: item.pdu_session_id,
                        gnb_addr: self.config().gtp_addr,
                        downlink_teid,
                    });
                    ue.send_to_ue(UeLinkMessage::Nas(item.nas_pdu)).await;
                    ue.send_to_ue(UeLinkMessage::DataPathReady {
                        pdu_session_id: item.pdu_session_id,
                        gnb_addr: self.config().gtp_addr,
                    })
                    .await;
                }
                self.send_to_amf(NgapPdu::Successful(
                    SuccessfulOutcome::PduSessionResourceSetupResponse {
                        amf_ue_ngap_id,
                        ran_ue_ngap_id,
                        items: response_items,
                    },
                ))
                .await;
            }
            InitiatingMessage::PduSessionResourceReleaseCommand {
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                pdu_session_ids,
                nas_pdu,
            } => {
                info!(ran_ue_ngap_id, ?pdu_session_ids, "PDU session resource release");
                let Some(ue) = self.resolve(ran_ue_ngap_id, amf_ue_ngap_id) else {
                    return;
                };
                for psi in &pdu_session_ids {
                    ue.remove_pdu_session(*psi);
                }
                if let Some(nas_pdu) = nas_pdu {
                    ue.send_to_ue(UeLinkMessage::Nas(nas_pdu)).await;
                }
                self.send_to_amf(NgapPdu::Successful(
                    SuccessfulOutcome::PduSessionResourceReleaseResponse {
                        amf_ue_ngap_id,
                        ran_ue_ngap_id,
                        pdu_session_ids,
                    },
                ))
                .await;
            }
            InitiatingMessage::UeContextReleaseCommand {
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                cause,
            } => {
                info!(?ran_ue_ngap_id, ?cause, "UE context release command");
                let ue = match ran_ue_ngap_id {
                    Some(ran_id) => self.find_by_ran_id(ran_id),
                    None => self.find_by_amf_id(amf_ue_ngap_id),
                };
                let Some(ue) = ue else {
                    warn!(amf_ue_ngap_id, "release for unknown UE ignored");
                    return;
                };
                ue.close_downlink();
                self.detach_ue(ue.ran_ue_ngap_id());
                self.send_to_amf(NgapPdu::Successful(
                    SuccessfulOutcome::UeContextReleaseComplete {
                        amf_ue_ngap_id,
                        ran_ue_ngap_id: ue.ran_ue_ngap_id(),
                    },
                ))
                .await;
            }
            InitiatingMessage::AmfConfigurationUpdate { amf_name } => {
                info!(?amf_name, "AMF configuration update");
            }
            InitiatingMessage::ErrorIndication { cause } => {
                error!(?cause, "error indication from AMF");
            }
            other => {
                info!(
                    procedure_code = other.procedure_code(),
                    "unhandled initiating NGAP message ignored"
                );
            }
        }
    }

    async fn dispatch_successful(&self, outcome: SuccessfulOutcome) {
        match outcome {
            SuccessfulOutcome::NgSetupResponse {
                amf_name,
                served_guamis,
                relative_capacity,
            } => {
                self.set_amf_active(amf_name, served_guamis, relative_capacity);
            }
            SuccessfulOutcome::PathSwitchRequestAcknowledge { ran_ue_ngap_id, .. } => {
                info!(ran_ue_ngap_id, "path switch request acknowledge");
            }
            other => {
                info!(
                    procedure_code = other.procedure_code(),
                    "unhandled successful outcome ignored"
                );
            }
        }
    }

    fn dispatch_unsuccessful(&self, outcome: UnsuccessfulOutcome) {
        match outcome {
            UnsuccessfulOutcome::NgSetupFailure { cause } => {
                error!(?cause, "NG Setup failed");
                self.set_amf_failed();
            }
        }
    }

    /// Resolves the target UE context by RAN id, falling back to the
    /// AMF id. Unknown targets are logged and dropped.
    fn resolve(&self, ran_ue_ngap_id: u32, amf_ue_ngap_id: i64) -> Option<Arc<GnbUe>> {
        let ue = self
            .find_by_ran_id(ran_ue_ngap_id)
            .or_else(|| self.find_by_amf_id(amf_ue_ngap_id));
        if ue.is_none() {
            warn!(
                ran_ue_ngap_id,
                amf_ue_ngap_id, "NGAP message for unknown UE dropped"
            );
        }
        ue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coreprobe_common::config::GnbConfig;
    use coreprobe_ngap::Cause;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_downlink_nas_binds_amf_id_and_forwards() {
        let (amf_tx, _amf_rx) = mpsc::channel(8);
        let gnb = Gnb::new(GnbConfig::default(), amf_tx);
        let (tx, mut rx) = mpsc::channel(1);
        let ue = gnb.attach_ue(tx);

        gnb.dispatch(NgapPdu::Initiating(InitiatingMessage::DownlinkNasTransport {
            amf_ue_ngap_id: 55,
            ran_ue_ngap_id: ue.ran_ue_ngap_id(),
            nas_pdu: vec![0x7E, 0x00, 0x56],
        }))
        .await;

        assert_eq!(ue.amf_ue_ngap_id(), Some(55));
        assert_eq!(rx.recv().await, Some(UeLinkMessage::Nas(vec![0x7E, 0x00, 0x56])));
    }

    #[tokio::test]
    async fn test_ue_context_release_detaches_and_confirms() {
        let (amf_tx, mut amf_rx) = mpsc::channel(8);
        let gnb = Gnb::new(GnbConfig::default(), amf_tx);
        let (tx, _rx) = mpsc::channel(1);
        let ue = gnb.attach_ue(tx);
        ue.set_amf_ue_ngap_id(77);

        gnb.dispatch(NgapPdu::Initiating(InitiatingMessage::UeContextReleaseCommand {
            amf_ue_ngap_id: 77,
            ran_ue_ngap_id: None,
            cause: Cause::Nas(0),
        }))
        .await;

        assert_eq!(gnb.ue_count(), 0);
        match amf_rx.recv().await.unwrap() {
            NgapPdu::Successful(SuccessfulOutcome::UeContextReleaseComplete {
                amf_ue_ngap_id,
                ..
            }) => assert_eq!(amf_ue_ngap_id, 77),
            other => panic!("expected release complete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_ue_message_is_dropped() {
        let (amf_tx, mut amf_rx) = mpsc::channel(8);
        let gnb = Gnb::new(GnbConfig::default(), amf_tx);

        gnb.dispatch(NgapPdu::Initiating(InitiatingMessage::DownlinkNasTransport {
            amf_ue_ngap_id: 1,
            ran_ue_ngap_id: 999,
            nas_pdu: vec![0x7E],
        }))
        .await;
        // No response and no panic.
        assert!(amf_rx.try_recv().is_err());
    }
}
