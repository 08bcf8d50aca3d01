//! 5G-AKA failure scenarios

use std::time::Duration;

use integration_tests::test_fixtures::TEST_RAND;
use integration_tests::{build_autn, start_bench, test_ue_config};

use coreprobe_nas::messages::MmMessage;
use coreprobe_nas::Cause5Gmm;
use coreprobe_ue::{MmState, UeCommand};

/// A corrupted AUTN MAC produces an Authentication Failure with cause
/// MAC failure and leaves the MM state untouched.
#[tokio::test]
async fn test_mac_failure() {
    let config = test_ue_config();
    let mut bench = start_bench(&config).await;

    bench.command(UeCommand::Register).await;
    bench.amf.expect_initial_ue_message().await;
    bench.expect_state(MmState::Deregistered).await;

    let mut autn = build_autn(&config.key, &config.op, &TEST_RAND, [0, 0, 0, 0, 0, 1], [0x80, 0x00]);
    autn[15] ^= 0xFF; // break the MAC
    bench.amf.send_authentication_request(TEST_RAND, autn).await;

    let failure = bench.amf.expect_authentication_failure().await;
    assert_eq!(failure.cause, Cause5Gmm::MacFailure);
    assert!(failure.auts.is_none());

    // No further state change was published.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(bench.scenario_rx.try_recv().is_err());

    bench.command(UeCommand::Terminate).await;
}

/// A stale network SQN produces an Authentication Failure with cause
/// synch failure carrying a 14-byte AUTS; the MM state is untouched.
#[tokio::test]
async fn test_sqn_synch_failure() {
    let mut config = test_ue_config();
    // The UE is ahead of the network.
    config.sqn = "000000000002".into();
    let mut bench = start_bench(&config).await;

    bench.command(UeCommand::Register).await;
    bench.amf.expect_initial_ue_message().await;
    bench.expect_state(MmState::Deregistered).await;

    let autn = build_autn(&config.key, &config.op, &TEST_RAND, [0, 0, 0, 0, 0, 1], [0x80, 0x00]);
    bench.amf.send_authentication_request(TEST_RAND, autn).await;

    let failure = bench.amf.expect_authentication_failure().await;
    assert_eq!(failure.cause, Cause5Gmm::SynchFailure);
    assert_eq!(failure.auts.expect("synch failure without AUTS").len(), 14);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(bench.scenario_rx.try_recv().is_err());

    bench.command(UeCommand::Terminate).await;
}

/// An Authentication Reject after a successful challenge drops the
/// security context and sends the UE back to DEREGISTERED.
#[tokio::test]
async fn test_authentication_reject() {
    let config = test_ue_config();
    let mut bench = start_bench(&config).await;

    bench.command(UeCommand::Register).await;
    bench.amf.expect_initial_ue_message().await;

    let autn = build_autn(&config.key, &config.op, &TEST_RAND, [0, 0, 0, 0, 0, 1], [0x80, 0x00]);
    bench.amf.send_authentication_request(TEST_RAND, autn).await;
    bench.amf.expect_authentication_response().await;

    bench
        .amf
        .send_downlink_nas(MmMessage::AuthenticationReject.encode())
        .await;

    bench.expect_state(MmState::Deregistered).await;
    bench.expect_state(MmState::RegisteredInitiated).await;
    bench.expect_state(MmState::Deregistered).await;

    bench.command(UeCommand::Terminate).await;
}
