//! Test fixtures and bench wiring
//!
//! Builds a connected UE+gNB pair: two capacity-1 queues between the
//! actors, the scenario stream to the driver, and the AMF end of the
//! NGAP channel wrapped in [`MockAmf`](crate::mock_amf::MockAmf).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use coreprobe_common::config::{GnbConfig, OpType, SupportedAlgs, UeConfig};
use coreprobe_common::types::SNssai;
use coreprobe_crypto::milenage::Milenage;
use coreprobe_gnb::{spawn_ue_uplink_task, Gnb};
use coreprobe_ue::{spawn_ue_task, MmState, ScenarioMessage, UeCommand, UeContext, UeShared};

use crate::mock_amf::MockAmf;

/// Subscriber key used across the scenarios.
pub const TEST_K: &str = "8baf473f2f8fd09487cccbd7097c6862";

/// Operator key (OPc form) used across the scenarios.
pub const TEST_OPC: &str = "8e27b6af0e692e750f32667a3b14605d";

/// Network challenge used across the scenarios.
pub const TEST_RAND: [u8; 16] = [
    0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77,
    0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff,
];

/// A subscriber configuration matching the scripted AMF's records.
pub fn test_ue_config() -> UeConfig {
    UeConfig {
        mcc: "208".into(),
        mnc: "93".into(),
        msin: "0000007487".into(),
        routing_indicator: "1".into(),
        key: TEST_K.into(),
        op: TEST_OPC.into(),
        op_type: OpType::Opc,
        amf: "8000".into(),
        sqn: "000000000000".into(),
        dnn: "internet".into(),
        snssai: SNssai::with_sd(1, "010203"),
        tunnel_enabled: false,
        algs: SupportedAlgs::default(),
    }
}

/// Builds a network-side AUTN for the given SQN, as the AUSF would:
/// (SQN ⊕ AK) ‖ AMF ‖ MAC-A.
pub fn build_autn(k_hex: &str, opc_hex: &str, rand: &[u8; 16], sqn: [u8; 6], amf: [u8; 2]) -> [u8; 16] {
    let k: [u8; 16] = hex::decode(k_hex).unwrap().try_into().unwrap();
    let opc: [u8; 16] = hex::decode(opc_hex).unwrap().try_into().unwrap();
    let m = Milenage::new(&k, &opc);

    let (_, _, _, ak, _) = m.f2345(rand);
    let mac_a = m.f1(rand, &sqn, &amf);

    let mut autn = [0u8; 16];
    for i in 0..6 {
        autn[i] = sqn[i] ^ ak[i];
    }
    autn[6..8].copy_from_slice(&amf);
    autn[8..].copy_from_slice(&mac_a);
    autn
}

/// A running UE+gNB pair with the driver- and AMF-side handles.
pub struct TestBench {
    pub amf: MockAmf,
    pub cmd_tx: mpsc::Sender<UeCommand>,
    pub scenario_rx: mpsc::UnboundedReceiver<ScenarioMessage>,
    pub shared: Arc<UeShared>,
    pub ue_task: JoinHandle<()>,
    pub gnb_task: JoinHandle<()>,
}

impl TestBench {
    /// Sends a driver command to the UE.
    pub async fn command(&self, command: UeCommand) {
        self.cmd_tx.send(command).await.expect("UE task is gone");
    }

    /// Waits for the next published MM state and asserts it.
    pub async fn expect_state(&mut self, expected: MmState) {
        let event = tokio::time::timeout(Duration::from_secs(5), self.scenario_rx.recv())
            .await
            .expect("timed out waiting for a state change")
            .expect("scenario stream closed early");
        assert_eq!(event, ScenarioMessage::StateChange(expected));
    }

    /// Asserts the scenario stream is closed (UE terminated).
    pub async fn expect_scenario_closed(&mut self) {
        let event = tokio::time::timeout(Duration::from_secs(5), self.scenario_rx.recv())
            .await
            .expect("timed out waiting for the scenario stream to close");
        assert_eq!(event, None, "expected a closed scenario stream");
    }
}

/// Wires up one UE, its per-UE gNB context and the AMF channel, and
/// spawns both actor tasks.
pub async fn start_bench(config: &UeConfig) -> TestBench {
    crate::init_test_logging();

    let (amf_tx, amf_rx) = mpsc::channel(16);
    let gnb = Gnb::new(GnbConfig::default(), amf_tx);

    let (scenario_tx, scenario_rx) = mpsc::unbounded_channel();
    let ue = UeContext::new(config, 1, scenario_tx).expect("valid test configuration");
    let shared = ue.shared();

    // The two bounded queues connecting the pair, capacity 1 each.
    let (uplink_tx, uplink_rx) = mpsc::channel(1);
    let (downlink_tx, downlink_rx) = mpsc::channel(1);
    ue.set_gnb_rx(uplink_tx);
    let gnb_ue = gnb.attach_ue(downlink_tx);

    let gnb_task = spawn_ue_uplink_task(gnb.clone(), gnb_ue, uplink_rx);

    let (cmd_tx, cmd_rx) = mpsc::channel(8);
    let ue_task = spawn_ue_task(ue, downlink_rx, cmd_rx);

    TestBench {
        amf: MockAmf::new(gnb, amf_rx),
        cmd_tx,
        scenario_rx,
        shared,
        ue_task,
        gnb_task,
    }
}
