//! gNB state: AMF association and the UE registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{info, warn};

use coreprobe_common::config::GnbConfig;
use coreprobe_common::types::UeLinkMessage;
use coreprobe_ngap::{Guami, InitiatingMessage, NgapPdu, RrcEstablishmentCause};

/// State of the NG interface towards the AMF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AmfAssociationState {
    /// NG Setup not yet answered
    #[default]
    Pending,
    /// NG Setup Response received
    Active,
    /// NG Setup Failure received
    Failed,
}

#[derive(Debug, Default)]
struct AmfAssociation {
    state: AmfAssociationState,
    amf_name: Option<String>,
    served_guamis: Vec<Guami>,
    relative_capacity: u8,
}

/// A simulated gNB.
///
/// Owns the UE registry and the uplink half of the NG interface. The
/// downlink half feeds [`Gnb::dispatch`](crate::dispatcher) with
/// decoded PDUs.
pub struct Gnb {
    config: GnbConfig,
    amf_tx: mpsc::Sender<NgapPdu>,
    ues: Mutex<HashMap<u32, Arc<super::GnbUe>>>,
    next_ran_ue_id: AtomicU32,
    amf: Mutex<AmfAssociation>,
}

impl Gnb {
    pub fn new(config: GnbConfig, amf_tx: mpsc::Sender<NgapPdu>) -> Arc<Self> {
        Arc::new(Self {
            config,
            amf_tx,
            ues: Mutex::new(HashMap::new()),
            next_ran_ue_id: AtomicU32::new(1),
            amf: Mutex::new(AmfAssociation::default()),
        })
    }

    pub fn config(&self) -> &GnbConfig {
        &self.config
    }

    pub fn amf_state(&self) -> AmfAssociationState {
        self.amf.lock().unwrap().state
    }

    pub(crate) fn set_amf_active(
        &self,
        amf_name: String,
        served_guamis: Vec<Guami>,
        relative_capacity: u8,
    ) {
        let mut amf = self.amf.lock().unwrap();
        info!(amf_name, capacity = relative_capacity, "NG Setup complete");
        amf.state = AmfAssociationState::Active;
        amf.amf_name = Some(amf_name);
        amf.served_guamis = served_guamis;
        amf.relative_capacity = relative_capacity;
    }

    pub(crate) fn set_amf_failed(&self) {
        self.amf.lock().unwrap().state = AmfAssociationState::Failed;
    }

    /// Sends an NG Setup Request announcing this gNB to the AMF.
    pub async fn send_ng_setup(&self) {
        let request = InitiatingMessage::NgSetupRequest {
            gnb_id: self.config.gnb_id,
            ran_node_name: format!("coreprobe-gnb-{}", self.config.gnb_id),
            plmn: self.config.plmn,
            tac: self.config.tac,
            supported_nssai: self.config.nssai.clone(),
        };
        self.send_to_amf(NgapPdu::Initiating(request)).await;
    }

    /// Attaches a UE to this gNB: allocates a RAN-UE-NGAP-ID and a
    /// context holding the downlink queue towards the UE.
    pub fn attach_ue(&self, gnb_tx: mpsc::Sender<UeLinkMessage>) -> Arc<super::GnbUe> {
        let ran_ue_ngap_id = self.next_ran_ue_id.fetch_add(1, Ordering::Relaxed);
        let ue = Arc::new(super::GnbUe::new(ran_ue_ngap_id, gnb_tx));
        self.ues.lock().unwrap().insert(ran_ue_ngap_id, ue.clone());
        info!(ran_ue_ngap_id, "UE attached");
        ue
    }

    /// Removes a UE context.
    pub fn detach_ue(&self, ran_ue_ngap_id: u32) -> Option<Arc<super::GnbUe>> {
        self.ues.lock().unwrap().remove(&ran_ue_ngap_id)
    }

    pub fn find_by_ran_id(&self, ran_ue_ngap_id: u32) -> Option<Arc<super::GnbUe>> {
        self.ues.lock().unwrap().get(&ran_ue_ngap_id).cloned()
    }

    pub fn find_by_amf_id(&self, amf_ue_ngap_id: i64) -> Option<Arc<super::GnbUe>> {
        self.ues
            .lock()
            .unwrap()
            .values()
            .find(|ue| ue.amf_ue_ngap_id() == Some(amf_ue_ngap_id))
            .cloned()
    }

    pub fn ue_count(&self) -> usize {
        self.ues.lock().unwrap().len()
    }

    /// Allocates a downlink TEID for a new PDU session resource.
    pub(crate) fn allocate_downlink_teid(&self) -> u32 {
        // Reuse the RAN id counter space; TEIDs only need local uniqueness.
        self.next_ran_ue_id.fetch_add(1, Ordering::Relaxed) | 0x8000_0000
    }

    /// Pushes a PDU towards the AMF association.
    pub(crate) async fn send_to_amf(&self, pdu: NgapPdu) {
        if self.amf_tx.send(pdu).await.is_err() {
            warn!("AMF association is gone, NGAP PDU discarded");
        }
    }

    /// Sends the first or a subsequent uplink NAS PDU for a UE.
    pub async fn send_uplink_nas(&self, ue: &super::GnbUe, nas_pdu: Vec<u8>) {
        let pdu = match ue.amf_ue_ngap_id() {
            None => InitiatingMessage::InitialUeMessage {
                ran_ue_ngap_id: ue.ran_ue_ngap_id(),
                nas_pdu,
                establishment_cause: RrcEstablishmentCause::MoSignalling,
            },
            Some(amf_ue_ngap_id) => InitiatingMessage::UplinkNasTransport {
                amf_ue_ngap_id,
                ran_ue_ngap_id: ue.ran_ue_ngap_id(),
                nas_pdu,
            },
        };
        self.send_to_amf(NgapPdu::Initiating(pdu)).await;
    }
}
