//! Typed NGAP PDUs for coreprobe
//!
//! The gNB engine works on decoded NGAP values; the ASN.1 APER wire
//! codec sits outside this crate as a collaborator that produces and
//! consumes these types. The model covers the procedures a simulated
//! gNB exchanges with a real AMF during registration, session setup and
//! release.

pub mod pdu;

pub use pdu::*;
