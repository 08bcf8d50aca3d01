//! Teardown, deregistration and queue semantics

use std::net::Ipv4Addr;
use std::time::Duration;

use integration_tests::{start_bench, test_ue_config};

use coreprobe_common::types::UeLinkMessage;
use coreprobe_nas::ies::MobileIdentity5Gs;
use coreprobe_nas::messages::{MmMessage, NasMessage};
use coreprobe_ue::{MmState, SmState, UeCommand, UeContext};
use tokio::sync::mpsc;

/// Terminate after an established session: MM to NULL, every slot
/// cleared, the scenario stream closed, and a late uplink send degrades
/// to a logged drop instead of a panic.
#[tokio::test]
async fn test_terminate_releases_resources() {
    let config = test_ue_config();
    let mut bench = start_bench(&config).await;

    bench.command(UeCommand::Register).await;
    bench.amf.run_registration(&config).await;
    bench.expect_state(MmState::Deregistered).await;
    bench.expect_state(MmState::RegisteredInitiated).await;
    bench.expect_state(MmState::Registered).await;

    bench.command(UeCommand::EstablishPduSession).await;
    let (psi, pti) = bench.amf.expect_establishment_request().await;
    bench
        .amf
        .send_establishment_accept(psi, pti, Ipv4Addr::new(10, 45, 0, 2))
        .await;

    let mut wait_handle = bench.shared.session_wait_handle(psi).expect("live session");

    bench.command(UeCommand::Terminate).await;
    bench.expect_state(MmState::Null).await;
    bench.expect_scenario_closed().await;
    bench.ue_task.await.unwrap();

    assert_eq!(bench.shared.session_count(), 0);
    assert!(!bench.shared.uplink_open());
    wait_handle.changed().await.expect("session wait never fired");

    // Closed-queue guard: the send is dropped with a warning.
    bench
        .shared
        .send_uplink(UeLinkMessage::Nas(vec![0x7E, 0x00, 0x41]))
        .await;

    // The gNB-side task observed the closed uplink and detached the UE.
    bench.gnb_task.await.unwrap();
    assert_eq!(bench.amf.gnb().ue_count(), 0);
}

/// UE-initiated deregistration carries the assigned GUTI and ends in
/// DEREGISTERED once the network accepts.
#[tokio::test]
async fn test_deregistration() {
    let config = test_ue_config();
    let mut bench = start_bench(&config).await;

    bench.command(UeCommand::Register).await;
    bench.amf.run_registration(&config).await;
    bench.expect_state(MmState::Deregistered).await;
    bench.expect_state(MmState::RegisteredInitiated).await;
    bench.expect_state(MmState::Registered).await;

    bench.command(UeCommand::Deregister).await;
    bench.expect_state(MmState::DeregisteredInitiated).await;

    let request = bench.amf.expect_uplink_nas().await;
    match bench.amf.unprotect(&request) {
        NasMessage::Mm(MmMessage::DeregistrationRequest(request)) => {
            match request.mobile_identity {
                MobileIdentity5Gs::Guti(guti) => {
                    assert_eq!(guti.tmsi, [0x01, 0x02, 0x03, 0x04]);
                }
                other => panic!("expected the GUTI identity, got {other:?}"),
            }
        }
        other => panic!("expected Deregistration Request, got {other:?}"),
    }

    let accept = bench.amf.protect(
        MmMessage::DeregistrationAccept,
        coreprobe_nas::enums::SecurityHeaderType::IntegrityProtectedAndCiphered,
    );
    bench.amf.send_downlink_nas(accept).await;
    bench.expect_state(MmState::Deregistered).await;

    bench.command(UeCommand::Terminate).await;
}

/// With capacity-1 queues a second uplink send blocks until the gNB
/// drains the first message; nothing is lost or reordered.
#[tokio::test]
async fn test_uplink_backpressure() {
    let (scenario_tx, _scenario_rx) = mpsc::unbounded_channel();
    let ue = UeContext::new(&test_ue_config(), 1, scenario_tx).unwrap();
    let shared = ue.shared();

    let (uplink_tx, mut uplink_rx) = mpsc::channel(1);
    ue.set_gnb_rx(uplink_tx);

    shared.send_uplink(UeLinkMessage::Nas(vec![1])).await;

    // The queue is full: the second send must park until drained.
    let mut second = Box::pin(shared.send_uplink(UeLinkMessage::Nas(vec![2])));
    assert!(
        tokio::time::timeout(Duration::from_millis(100), &mut second)
            .await
            .is_err(),
        "send on a full queue completed without a consumer"
    );

    assert_eq!(uplink_rx.recv().await, Some(UeLinkMessage::Nas(vec![1])));
    second.await;
    assert_eq!(uplink_rx.recv().await, Some(UeLinkMessage::Nas(vec![2])));
}

/// A session stuck in ACTIVE-PENDING stays pending (no accept, no
/// spurious transition) while the MM layer keeps serving other traffic.
#[tokio::test]
async fn test_pending_session_does_not_block_mm() {
    let config = test_ue_config();
    let mut bench = start_bench(&config).await;

    bench.command(UeCommand::Register).await;
    bench.amf.run_registration(&config).await;
    bench.expect_state(MmState::Deregistered).await;
    bench.expect_state(MmState::RegisteredInitiated).await;
    bench.expect_state(MmState::Registered).await;

    bench.command(UeCommand::EstablishPduSession).await;
    let (psi, _pti) = bench.amf.expect_establishment_request().await;
    assert_eq!(bench.shared.session_state(psi), Some(SmState::ActivePending));

    // MM procedures still run while the accept is outstanding.
    let update = bench.amf.protect(
        MmMessage::ConfigurationUpdateCommand,
        coreprobe_nas::enums::SecurityHeaderType::IntegrityProtectedAndCiphered,
    );
    bench.amf.send_downlink_nas(update).await;
    let reply = bench.amf.expect_uplink_nas().await;
    assert!(matches!(
        bench.amf.unprotect(&reply),
        NasMessage::Mm(MmMessage::ConfigurationUpdateComplete)
    ));
    assert_eq!(bench.shared.session_state(psi), Some(SmState::ActivePending));

    bench.command(UeCommand::Terminate).await;
}
