//! Information elements: 5GS mobile identity and UE security capability
//!
//! Mobile identity coding follows TS 24.501 §9.11.3.4: BCD digits in
//! swapped-nibble pairs, `0xF` filler for odd digit counts, routing
//! indicator filled to 4 digits with `0xF`.

use coreprobe_common::config::SupportedAlgs;
use coreprobe_common::types::Plmn;

use crate::codec::CodecError;

/// Identity type values in the first mobile identity octet.
const ID_TYPE_SUCI: u8 = 0x01;
const ID_TYPE_GUTI: u8 = 0x02;

/// Encodes decimal digits as swapped-nibble BCD, `0xF`-filling the last
/// nibble for an odd count.
fn encode_bcd(digits: &str) -> Vec<u8> {
    let d: Vec<u8> = digits.bytes().map(|b| b - b'0').collect();
    d.chunks(2)
        .map(|pair| {
            let low = pair[0];
            let high = pair.get(1).copied().unwrap_or(0x0F);
            (high << 4) | low
        })
        .collect()
}

/// Decodes swapped-nibble BCD, stopping at a `0xF` filler nibble.
fn decode_bcd(octets: &[u8]) -> String {
    let mut out = String::with_capacity(octets.len() * 2);
    for octet in octets {
        for nibble in [octet & 0x0F, octet >> 4] {
            if nibble == 0x0F {
                return out;
            }
            out.push((b'0' + nibble) as char);
        }
    }
    out
}

/// Subscription Concealed Identifier with the null protection scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suci {
    /// Home PLMN
    pub plmn: Plmn,
    /// Routing indicator digits (1-4); empty means unset and encodes as "0"
    pub routing_indicator: String,
    /// MSIN digits (8, 9 or 10)
    pub msin: String,
}

/// Octets of an unconfigured routing indicator: zeroed first pair,
/// `0xF` fill after (TS 24.501 §9.11.3.4.1 NOTE 2).
const ROUTING_INDICATOR_UNSET: [u8; 2] = [0x00, 0xF0];

impl Suci {
    /// Encodes the routing indicator, filled to four digits with `0xF`.
    /// An unset indicator gets the dedicated unconfigured coding.
    fn encode_routing_indicator(&self) -> [u8; 2] {
        if self.routing_indicator.is_empty() {
            return ROUTING_INDICATOR_UNSET;
        }
        let digits = self.routing_indicator.as_bytes();
        let nibbles: Vec<u8> = (0..4)
            .map(|i| digits.get(i).map_or(0x0F, |b| b - b'0'))
            .collect();
        [
            (nibbles[1] << 4) | nibbles[0],
            (nibbles[3] << 4) | nibbles[2],
        ]
    }

    fn decode_routing_indicator(octets: &[u8; 2]) -> String {
        if *octets == ROUTING_INDICATOR_UNSET {
            return String::new();
        }
        decode_bcd(octets)
    }
}

/// 5G-GUTI as assigned by the AMF in the Registration Accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guti5G {
    /// Serving PLMN
    pub plmn: Plmn,
    /// AMF Region ID (8 bits)
    pub amf_region_id: u8,
    /// AMF Set ID (10 bits)
    pub amf_set_id: u16,
    /// AMF Pointer (6 bits)
    pub amf_pointer: u8,
    /// 5G-TMSI
    pub tmsi: [u8; 4],
}

/// 5GS mobile identity (TS 24.501 §9.11.3.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MobileIdentity5Gs {
    /// Concealed subscriber identity used before registration
    Suci(Suci),
    /// Temporary identity used after assignment
    Guti(Guti5G),
}

impl MobileIdentity5Gs {
    /// Encodes the identity into its IE value octets. A SUCI with an
    /// 8-digit MSIN yields 12 octets, 9/10 digits yield 13.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            MobileIdentity5Gs::Suci(suci) => {
                let mut out = Vec::with_capacity(13);
                out.push(ID_TYPE_SUCI);
                out.extend_from_slice(&suci.plmn.encode());
                out.extend_from_slice(&suci.encode_routing_indicator());
                out.push(0x00); // protection scheme: null
                out.push(0x00); // home network public key id
                out.extend_from_slice(&encode_bcd(&suci.msin));
                out
            }
            MobileIdentity5Gs::Guti(guti) => {
                let mut out = Vec::with_capacity(11);
                out.push(0xF0 | ID_TYPE_GUTI);
                out.extend_from_slice(&guti.plmn.encode());
                out.push(guti.amf_region_id);
                let set_ptr = (guti.amf_set_id & 0x03FF) << 6 | (guti.amf_pointer & 0x3F) as u16;
                out.extend_from_slice(&set_ptr.to_be_bytes());
                out.extend_from_slice(&guti.tmsi);
                out
            }
        }
    }

    /// Decodes an identity from its IE value octets.
    pub fn decode(octets: &[u8]) -> Result<Self, CodecError> {
        let first = *octets.first().ok_or(CodecError::Truncated)?;
        match first & 0x07 {
            ID_TYPE_SUCI => {
                if octets.len() < 9 {
                    return Err(CodecError::Truncated);
                }
                let plmn = Plmn::decode(octets[1..4].try_into().unwrap());
                let ri = Suci::decode_routing_indicator(octets[4..6].try_into().unwrap());
                let msin = decode_bcd(&octets[8..]);
                if !matches!(msin.len(), 8 | 9 | 10) {
                    return Err(CodecError::Invalid(format!(
                        "MSIN with {} digits in SUCI",
                        msin.len()
                    )));
                }
                Ok(MobileIdentity5Gs::Suci(Suci {
                    plmn,
                    routing_indicator: ri,
                    msin,
                }))
            }
            ID_TYPE_GUTI => {
                if octets.len() < 11 {
                    return Err(CodecError::Truncated);
                }
                let plmn = Plmn::decode(octets[1..4].try_into().unwrap());
                let set_ptr = u16::from_be_bytes(octets[5..7].try_into().unwrap());
                Ok(MobileIdentity5Gs::Guti(Guti5G {
                    plmn,
                    amf_region_id: octets[4],
                    amf_set_id: set_ptr >> 6,
                    amf_pointer: (set_ptr & 0x3F) as u8,
                    tmsi: octets[7..11].try_into().unwrap(),
                }))
            }
            other => Err(CodecError::Invalid(format!("mobile identity type {other}"))),
        }
    }
}

/// UE security capability IE: one octet of EA bits, one of IA bits,
/// most significant bit first (EA0/IA0 at bit 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeSecurityCapability {
    /// 5G-EA0..EA7 bitmap
    pub ea: u8,
    /// 5G-IA0..IA7 bitmap
    pub ia: u8,
}

impl UeSecurityCapability {
    /// Builds the capability from the configured algorithm set. EA0 and
    /// IA0 are always advertised.
    pub fn from_supported(algs: &SupportedAlgs) -> Self {
        let mut ea = 0x80;
        let mut ia = 0x80;
        if algs.nea1 {
            ea |= 0x40;
        }
        if algs.nea2 {
            ea |= 0x20;
        }
        if algs.nia1 {
            ia |= 0x40;
        }
        if algs.nia2 {
            ia |= 0x20;
        }
        Self { ea, ia }
    }

    /// True when the given EA algorithm identity (0..7) is supported.
    pub fn supports_ea(&self, id: u8) -> bool {
        id < 8 && self.ea & (0x80 >> id) != 0
    }

    /// True when the given IA algorithm identity (0..7) is supported.
    pub fn supports_ia(&self, id: u8) -> bool {
        id < 8 && self.ia & (0x80 >> id) != 0
    }

    pub fn encode(&self) -> [u8; 2] {
        [self.ea, self.ia]
    }

    pub fn decode(octets: &[u8]) -> Result<Self, CodecError> {
        if octets.len() < 2 {
            return Err(CodecError::Truncated);
        }
        Ok(Self {
            ea: octets[0],
            ia: octets[1],
        })
    }
}
