//! Simulated gNB for coreprobe
//!
//! Holds one context per attached UE, forwards uplink NAS into NGAP
//! (Initial UE Message first, Uplink NAS Transport afterwards) and
//! dispatches decoded downlink NGAP PDUs by procedure code. The SCTP
//! association to the AMF is an external collaborator; this crate sees
//! it as a channel of typed PDUs.

pub mod dispatcher;
pub mod gnb;
pub mod task;
pub mod ue_context;

pub use gnb::{AmfAssociationState, Gnb};
pub use task::spawn_ue_uplink_task;
pub use ue_context::{GnbPduSession, GnbUe, GnbUeState};
