//! Shared types for the UE and gNB simulation crates.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Public Land Mobile Network identifier (MCC + MNC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (3 digits)
    pub mcc: u16,
    /// Mobile Network Code (2 or 3 digits)
    pub mnc: u16,
    /// True when the MNC uses 3 digits
    pub long_mnc: bool,
}

impl Plmn {
    /// Creates a new PLMN identifier.
    pub fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Encodes the PLMN into the 3-octet BCD wire format of
    /// TS 24.501 §9.11.3.4 (MCC digit 2 ‖ digit 1, filler/MNC digit 3 ‖
    /// MCC digit 3, MNC digit 2 ‖ digit 1).
    pub fn encode(&self) -> [u8; 3] {
        let mcc = [
            (self.mcc / 100 % 10) as u8,
            (self.mcc / 10 % 10) as u8,
            (self.mcc % 10) as u8,
        ];
        let mnc = if self.long_mnc {
            [
                (self.mnc / 100 % 10) as u8,
                (self.mnc / 10 % 10) as u8,
                (self.mnc % 10) as u8,
            ]
        } else {
            [0x0F, (self.mnc / 10 % 10) as u8, (self.mnc % 10) as u8]
        };
        [
            (mcc[1] << 4) | mcc[0],
            (mnc[0] << 4) | mcc[2],
            (mnc[2] << 4) | mnc[1],
        ]
    }

    /// Decodes a PLMN from its 3-octet BCD wire format.
    pub fn decode(octets: &[u8; 3]) -> Self {
        let mcc =
            (octets[0] & 0x0F) as u16 * 100 + (octets[0] >> 4) as u16 * 10 + (octets[1] & 0x0F) as u16;
        let mnc3 = octets[1] >> 4;
        let long_mnc = mnc3 != 0x0F;
        let mnc = if long_mnc {
            mnc3 as u16 * 100 + (octets[2] & 0x0F) as u16 * 10 + (octets[2] >> 4) as u16
        } else {
            (octets[2] & 0x0F) as u16 * 10 + (octets[2] >> 4) as u16
        };
        Self { mcc, mnc, long_mnc }
    }

    /// MCC as a 3-digit string.
    pub fn mcc_string(&self) -> String {
        format!("{:03}", self.mcc)
    }

    /// MNC as a 2- or 3-digit string.
    pub fn mnc_string(&self) -> String {
        if self.long_mnc {
            format!("{:03}", self.mnc)
        } else {
            format!("{:02}", self.mnc)
        }
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.mcc_string(), self.mnc_string())
    }
}

/// Single Network Slice Selection Assistance Information.
///
/// An `sst` of 0 means "adopt the network's first Allowed NSSAI entry"
/// during registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: i32,
    /// Slice Differentiator as a 6-digit hex string, empty when absent
    #[serde(default)]
    pub sd: String,
}

impl SNssai {
    /// Creates a new S-NSSAI with the given SST and no SD.
    pub fn new(sst: i32) -> Self {
        Self {
            sst,
            sd: String::new(),
        }
    }

    /// Creates a new S-NSSAI with SST and SD.
    pub fn with_sd(sst: i32, sd: impl Into<String>) -> Self {
        Self { sst, sd: sd.into() }
    }

    /// Decodes the SD hex string into its 3-octet wire form.
    pub fn sd_octets(&self) -> Result<Option<[u8; 3]>, Error> {
        if self.sd.is_empty() {
            return Ok(None);
        }
        let raw = hex::decode(&self.sd)
            .map_err(|e| Error::Config(format!("invalid SD '{}': {e}", self.sd)))?;
        let octets: [u8; 3] = raw
            .try_into()
            .map_err(|_| Error::Config(format!("SD '{}' is not 3 octets", self.sd)))?;
        Ok(Some(octets))
    }
}

/// Message carried on the two bounded queues that connect a UE with its
/// per-UE gNB context. These queues are the exclusive pathway between
/// the two actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UeLinkMessage {
    /// A NAS PDU (plain or security protected), either direction.
    Nas(Vec<u8>),
    /// Downlink notification of the gNB-side uplink endpoint for an
    /// established PDU session.
    DataPathReady {
        /// PDU session identity (1..16)
        pdu_session_id: u8,
        /// gNB GTP-U address the session's uplink traffic enters at
        gnb_addr: Ipv4Addr,
    },
}
