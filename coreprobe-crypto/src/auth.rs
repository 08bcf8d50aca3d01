//! The 5G-AKA authentication round and key hierarchy
//!
//! UE-side processing of an Authentication Request challenge:
//! Milenage over the subscription credentials, AUTN parsing and MAC
//! verification, SQN freshness check with AUTS construction, RES*
//! derivation, and the Kausf → Kseaf → Kamf → KNASenc/KNASint chain
//! (3GPP TS 33.501 §6.1.3.2 and Annex A).

use std::fmt;

use tracing::debug;

use coreprobe_common::config::SupportedAlgs;

use crate::kdf::{self, AlgType, KEY_128_SIZE, KEY_256_SIZE};
use crate::milenage::{compute_opc, Milenage};
use crate::{nea, nia, CryptoError};

/// AUTS parameter size: SQN ⊕ AK* (6) ‖ MAC-S (8).
pub const AUTS_SIZE: usize = 14;

/// ABBA parameter for the Kamf derivation.
pub const ABBA: [u8; 2] = [0x00, 0x00];

/// AMF value used when computing MAC-S for a synchronization failure.
const AMF_SYNCH: [u8; 2] = [0x00, 0x00];

/// 5G NAS integrity algorithm identity (TS 24.501 §9.11.3.34).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum IntegrityAlg {
    /// 5G-IA0 (null integrity)
    #[default]
    Nia0 = 0x00,
    /// 128-5G-IA1 (SNOW3G)
    Nia1 = 0x01,
    /// 128-5G-IA2 (AES-CMAC)
    Nia2 = 0x02,
}

impl IntegrityAlg {
    /// Computes the 32-bit NAS MAC with this algorithm. NIA0 yields an
    /// all-zero MAC.
    pub fn compute_mac(
        self,
        count: u32,
        bearer: u8,
        direction: u8,
        key: &[u8; KEY_128_SIZE],
        data: &[u8],
    ) -> [u8; 4] {
        match self {
            IntegrityAlg::Nia0 => [0; 4],
            IntegrityAlg::Nia1 => nia::nia1_compute_mac(count, bearer, direction, key, data),
            IntegrityAlg::Nia2 => nia::nia2_compute_mac(count, bearer, direction, key, data),
        }
    }
}

impl TryFrom<u8> for IntegrityAlg {
    type Error = CryptoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(IntegrityAlg::Nia0),
            0x01 => Ok(IntegrityAlg::Nia1),
            0x02 => Ok(IntegrityAlg::Nia2),
            other => Err(CryptoError::Decode(format!(
                "unsupported integrity algorithm {other:#x}"
            ))),
        }
    }
}

impl fmt::Display for IntegrityAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityAlg::Nia0 => write!(f, "5G-IA0"),
            IntegrityAlg::Nia1 => write!(f, "128-5G-IA1"),
            IntegrityAlg::Nia2 => write!(f, "128-5G-IA2"),
        }
    }
}

/// 5G NAS ciphering algorithm identity (TS 24.501 §9.11.3.34).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CipheringAlg {
    /// 5G-EA0 (null ciphering)
    #[default]
    Nea0 = 0x00,
    /// 128-5G-EA1 (SNOW3G)
    Nea1 = 0x01,
    /// 128-5G-EA2 (AES-CTR)
    Nea2 = 0x02,
}

impl CipheringAlg {
    /// Applies the keystream in place. NEA0 leaves the data unchanged.
    pub fn apply(
        self,
        count: u32,
        bearer: u8,
        direction: u8,
        key: &[u8; KEY_128_SIZE],
        data: &mut [u8],
    ) {
        match self {
            CipheringAlg::Nea0 => {}
            CipheringAlg::Nea1 => nea::nea1_apply(count, bearer, direction, key, data),
            CipheringAlg::Nea2 => nea::nea2_apply(count, bearer, direction, key, data),
        }
    }
}

impl TryFrom<u8> for CipheringAlg {
    type Error = CryptoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(CipheringAlg::Nea0),
            0x01 => Ok(CipheringAlg::Nea1),
            0x02 => Ok(CipheringAlg::Nea2),
            other => Err(CryptoError::Decode(format!(
                "unsupported ciphering algorithm {other:#x}"
            ))),
        }
    }
}

impl fmt::Display for CipheringAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipheringAlg::Nea0 => write!(f, "5G-EA0"),
            CipheringAlg::Nea1 => write!(f, "128-5G-EA1"),
            CipheringAlg::Nea2 => write!(f, "128-5G-EA2"),
        }
    }
}

/// Selects the NAS algorithms this UE proposes.
///
/// Integrity picks the strongest supported (IA2 > IA1 > IA0). Ciphering
/// prefers null (EA0) when configured acceptable, so the exchanged NAS
/// stays observable on the bench; otherwise the strongest supported EA
/// wins (EA2 > EA1 > EA0).
pub fn select_algorithms(algs: &SupportedAlgs) -> (IntegrityAlg, CipheringAlg) {
    let integrity = if algs.nia2 {
        IntegrityAlg::Nia2
    } else if algs.nia1 {
        IntegrityAlg::Nia1
    } else {
        IntegrityAlg::Nia0
    };
    let ciphering = if algs.nea0 {
        CipheringAlg::Nea0
    } else if algs.nea2 {
        CipheringAlg::Nea2
    } else if algs.nea1 {
        CipheringAlg::Nea1
    } else {
        CipheringAlg::Nea0
    };
    (integrity, ciphering)
}

/// USIM authentication subscription, hex-encoded as configured.
///
/// `sqn` advances to the network's value after each successful round.
#[derive(Debug, Clone)]
pub struct AuthSubscription {
    /// Permanent key K (hex, 16 bytes)
    pub k: String,
    /// Pre-derived OPc (hex, 16 bytes); empty when `op` is set
    pub opc: String,
    /// Operator key OP (hex, 16 bytes); empty when `opc` is set
    pub op: String,
    /// Authentication Management Field (hex, 2 bytes)
    pub amf: String,
    /// Current sequence number (hex, 6 bytes)
    pub sqn: String,
}

impl AuthSubscription {
    fn decode(&self) -> Result<([u8; 16], [u8; 16], [u8; 2], [u8; 6]), CryptoError> {
        let k: [u8; 16] = decode_fixed("K", &self.k)?;
        let opc: [u8; 16] = if self.opc.is_empty() {
            let op: [u8; 16] = decode_fixed("OP", &self.op)?;
            compute_opc(&k, &op)
        } else {
            decode_fixed("OPc", &self.opc)?
        };
        let amf: [u8; 2] = decode_fixed("AMF", &self.amf)?;
        let sqn: [u8; 6] = decode_fixed("SQN", &self.sqn)?;
        Ok((k, opc, amf, sqn))
    }
}

fn decode_fixed<const N: usize>(field: &str, value: &str) -> Result<[u8; N], CryptoError> {
    let raw = hex::decode(value)
        .map_err(|e| CryptoError::Decode(format!("{field} is not valid hex: {e}")))?;
    raw.try_into()
        .map_err(|_| CryptoError::Decode(format!("{field} must be {N} bytes")))
}

/// Key material produced by a successful AKA round.
pub struct AkaSuccess {
    /// RES* sent back in the Authentication Response
    pub res_star: [u8; 16],
    /// Cipher key from Milenage f3
    pub ck: [u8; 16],
    /// Integrity key from Milenage f4
    pub ik: [u8; 16],
    /// Anonymity key from Milenage f5
    pub ak: [u8; 6],
    /// Network sequence number recovered from AUTN
    pub sqn_hn: [u8; 6],
}

/// Outcome of a 5G-AKA round.
pub enum AkaOutcome {
    /// Challenge verified; carries RES* and the key material for the
    /// Kamf derivation.
    Successful(AkaSuccess),
    /// The AUTN MAC did not verify. MM state must not change.
    MacFailure {
        /// Locally computed MAC-A, for diagnosis
        computed: [u8; 8],
        /// MAC-A carried in the AUTN
        received: [u8; 8],
    },
    /// The network SQN is stale; carries the AUTS re-synchronization
    /// parameter for the Authentication Failure.
    SqnFailure {
        /// SQN_ue ⊕ AK* ‖ MAC-S
        auts: [u8; AUTS_SIZE],
    },
}

/// Runs one 5G-AKA round over an Authentication Request challenge.
///
/// On success the subscription's stored SQN advances to the network's
/// value, so a replayed challenge fails the freshness check afterwards.
pub fn run_aka(
    subs: &mut AuthSubscription,
    rand: &[u8],
    snn: &str,
    autn: &[u8],
) -> Result<AkaOutcome, CryptoError> {
    let rand: [u8; 16] = rand
        .try_into()
        .map_err(|_| CryptoError::Decode("RAND must be 16 bytes".into()))?;
    let autn: [u8; 16] = autn
        .try_into()
        .map_err(|_| CryptoError::Decode("AUTN must be 16 bytes".into()))?;

    let (k, opc, amf, sqn_ue) = subs.decode()?;
    let m = Milenage::new(&k, &opc);
    let (res, ck, ik, ak, ak_star) = m.f2345(&rand);

    // AUTN = (SQN ⊕ AK)(6) || AMF(2) || MAC-A(8)
    let mut sqn_hn = [0u8; 6];
    for i in 0..6 {
        sqn_hn[i] = autn[i] ^ ak[i];
    }
    let mac_a_hn: [u8; 8] = autn[8..16].try_into().unwrap();

    let mac_a = m.f1(&rand, &sqn_hn, &amf);
    debug!(
        mac_a = %hex::encode(mac_a),
        mac_a_hn = %hex::encode(mac_a_hn),
        "authentication challenge MAC check"
    );
    if mac_a != mac_a_hn {
        return Ok(AkaOutcome::MacFailure {
            computed: mac_a,
            received: mac_a_hn,
        });
    }

    // Freshness: the home network SQN must not lag ours.
    if sqn_ue > sqn_hn {
        let mac_s = m.f1_star(&rand, &sqn_ue, &AMF_SYNCH);
        let mut auts = [0u8; AUTS_SIZE];
        for i in 0..6 {
            auts[i] = sqn_ue[i] ^ ak_star[i];
        }
        auts[6..].copy_from_slice(&mac_s);
        return Ok(AkaOutcome::SqnFailure { auts });
    }

    subs.sqn = hex::encode(sqn_hn);

    let res_star = kdf::derive_res_star(&ck, &ik, snn, &rand, &res);
    Ok(AkaOutcome::Successful(AkaSuccess {
        res_star,
        ck,
        ik,
        ak,
        sqn_hn,
    }))
}

/// Derives Kamf from a successful AKA round:
/// Kausf (A.2) → Kseaf (A.6) → Kamf (A.7) with ABBA = 0x0000.
pub fn derive_kamf(
    success: &AkaSuccess,
    snn: &str,
    supi: &str,
) -> Result<[u8; KEY_256_SIZE], CryptoError> {
    let mut sqn_xor_ak = [0u8; 6];
    for i in 0..6 {
        sqn_xor_ak[i] = success.sqn_hn[i] ^ success.ak[i];
    }

    let kausf = kdf::derive_kausf(&success.ck, &success.ik, snn, &sqn_xor_ak);
    let kseaf = kdf::derive_kseaf(&kausf, snn);

    let digits = supi
        .strip_prefix("imsi-")
        .or_else(|| supi.strip_prefix("supi-"))
        .ok_or_else(|| CryptoError::Decode(format!("SUPI '{supi}' has no imsi/supi prefix")))?;
    if !(5..=15).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CryptoError::Decode(format!("SUPI '{supi}' is malformed")));
    }

    Ok(kdf::derive_kamf(&kseaf, digits, &ABBA))
}

/// Derives the 128-bit NAS keys from Kamf for the selected algorithms
/// (Annex A.8, distinguishers enc = 0x01 / int = 0x02).
pub fn derive_nas_keys(
    kamf: &[u8; KEY_256_SIZE],
    ciphering: CipheringAlg,
    integrity: IntegrityAlg,
) -> ([u8; KEY_128_SIZE], [u8; KEY_128_SIZE]) {
    (
        kdf::derive_alg_key(kamf, AlgType::NasEnc, ciphering as u8),
        kdf::derive_alg_key(kamf, AlgType::NasInt, integrity as u8),
    )
}
