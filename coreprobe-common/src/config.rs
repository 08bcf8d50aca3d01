//! Configuration structures for simulated UEs and gNBs
//!
//! Configuration is loaded from YAML. Key material is hex-encoded in the
//! file and validated when the configuration is loaded; malformed values
//! are fatal at construction time.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Plmn, SNssai};

/// Operator key type for authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    /// Operator key (OP), converted to OPc with the permanent key
    Op,
    /// Pre-derived operator key (OPc), used directly
    #[default]
    Opc,
}

/// Supported NAS security algorithms.
///
/// Bitmap of the integrity and ciphering algorithms the simulated UE
/// advertises in its UE security capability IE. `nea0` steers the
/// proposed ciphering: when set, null ciphering is acceptable and
/// preferred (NAS stays observable on the bench); when cleared, the
/// strongest supported EA is proposed instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedAlgs {
    /// 5G-IA1 (SNOW3G-based integrity)
    pub nia1: bool,
    /// 5G-IA2 (AES-CMAC-based integrity)
    pub nia2: bool,
    /// 5G-EA0 (null ciphering) acceptable and preferred
    pub nea0: bool,
    /// 5G-EA1 (SNOW3G-based ciphering)
    pub nea1: bool,
    /// 5G-EA2 (AES-CTR-based ciphering)
    pub nea2: bool,
}

impl Default for SupportedAlgs {
    fn default() -> Self {
        Self {
            nia1: true,
            nia2: true,
            nea0: true,
            nea1: true,
            nea2: true,
        }
    }
}

/// UE (User Equipment) configuration.
///
/// One entry per simulated subscriber. The `sst`/`sd` pair selects the
/// slice requested at session establishment; `sst: 0` defers to the
/// network's Allowed NSSAI from the Registration Accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UeConfig {
    /// Mobile Country Code (3 digits)
    pub mcc: String,
    /// Mobile Network Code (2 or 3 digits)
    pub mnc: String,
    /// MSIN part of the IMSI (8, 9 or 10 digits)
    pub msin: String,
    /// SUCI routing indicator (1-4 digits, may be empty)
    #[serde(default)]
    pub routing_indicator: String,
    /// Permanent subscriber key K (hex, 16 bytes)
    pub key: String,
    /// Operator key OP or OPc (hex, 16 bytes)
    pub op: String,
    /// Whether `op` holds an OP or an OPc value
    #[serde(default)]
    pub op_type: OpType,
    /// Authentication Management Field (hex, 2 bytes)
    pub amf: String,
    /// Initial sequence number SQN (hex, 6 bytes)
    pub sqn: String,
    /// Data Network Name for PDU sessions
    pub dnn: String,
    /// Requested network slice
    pub snssai: SNssai,
    /// Whether established sessions own a TUN device
    #[serde(default)]
    pub tunnel_enabled: bool,
    /// Advertised security capabilities
    #[serde(default)]
    pub algs: SupportedAlgs,
}

impl UeConfig {
    /// Parses a UE configuration from YAML and validates it.
    pub fn from_yaml(text: &str) -> Result<Self, Error> {
        let config: UeConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates identity digits and hex key material.
    ///
    /// MSIN lengths other than 8, 9 or 10 digits are rejected here so the
    /// SUCI encoder only ever sees the two supported layouts.
    pub fn validate(&self) -> Result<(), Error> {
        if self.mcc.len() != 3 || !self.mcc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Config(format!("MCC '{}' must be 3 digits", self.mcc)));
        }
        if !(2..=3).contains(&self.mnc.len()) || !self.mnc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::Config(format!("MNC '{}' must be 2 or 3 digits", self.mnc)));
        }
        if !matches!(self.msin.len(), 8 | 9 | 10)
            || !self.msin.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::Config(format!(
                "MSIN '{}' must be 8, 9 or 10 digits",
                self.msin
            )));
        }
        if self.routing_indicator.len() > 4
            || !self.routing_indicator.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(Error::Config(format!(
                "routing indicator '{}' must be at most 4 digits",
                self.routing_indicator
            )));
        }
        check_hex("key", &self.key, 16)?;
        check_hex("op", &self.op, 16)?;
        check_hex("amf", &self.amf, 2)?;
        check_hex("sqn", &self.sqn, 6)?;
        Ok(())
    }

    /// The home PLMN of this subscriber.
    pub fn plmn(&self) -> Plmn {
        Plmn::new(
            self.mcc.parse().unwrap_or(0),
            self.mnc.parse().unwrap_or(0),
            self.mnc.len() == 3,
        )
    }
}

/// gNB (gNodeB) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnbConfig {
    /// gNB identity (24-bit by default)
    pub gnb_id: u32,
    /// Public Land Mobile Network identifier
    pub plmn: Plmn,
    /// Tracking Area Code (24-bit)
    pub tac: u32,
    /// Slices supported by this gNB
    pub nssai: Vec<SNssai>,
    /// GTP-U address advertised for the user plane
    #[serde(default = "default_gtp_addr")]
    pub gtp_addr: std::net::Ipv4Addr,
}

fn default_gtp_addr() -> std::net::Ipv4Addr {
    std::net::Ipv4Addr::LOCALHOST
}

impl Default for GnbConfig {
    fn default() -> Self {
        Self {
            gnb_id: 1,
            plmn: Plmn::new(1, 1, false),
            tac: 1,
            nssai: vec![SNssai::new(1)],
            gtp_addr: default_gtp_addr(),
        }
    }
}

fn check_hex(field: &str, value: &str, expected_len: usize) -> Result<(), Error> {
    let decoded = hex::decode(value)
        .map_err(|e| Error::Config(format!("{field} is not valid hex: {e}")))?;
    if decoded.len() != expected_len {
        return Err(Error::Config(format!(
            "{field} must be {expected_len} bytes, got {}",
            decoded.len()
        )));
    }
    Ok(())
}
