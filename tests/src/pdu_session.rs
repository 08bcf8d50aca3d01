//! PDU session establishment and release scenarios

use std::net::Ipv4Addr;
use std::time::Duration;

use integration_tests::{start_bench, test_ue_config};

use coreprobe_nas::messages::{
    DlNasTransport, MmMessage, NasMessage, PduSessionReleaseCommand, SmMessage,
};
use coreprobe_ue::{MmState, SmState, UeCommand};

/// Polls the shared view until the condition holds or a timeout fires.
async fn wait_for(mut condition: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Registration, then session establishment: the accept assigns the IP
/// and moves the first slot to ACTIVE, with the gNB's uplink endpoint
/// recorded.
#[tokio::test]
async fn test_establishment_assigns_ip() {
    let config = test_ue_config();
    let mut bench = start_bench(&config).await;

    bench.command(UeCommand::Register).await;
    bench.amf.run_registration(&config).await;
    bench.expect_state(MmState::Deregistered).await;
    bench.expect_state(MmState::RegisteredInitiated).await;
    bench.expect_state(MmState::Registered).await;

    bench.command(UeCommand::EstablishPduSession).await;
    let (psi, pti) = bench.amf.expect_establishment_request().await;
    assert_eq!(psi, 1);
    assert_eq!(bench.shared.session_state(psi), Some(SmState::ActivePending));

    bench
        .amf
        .send_establishment_accept(psi, pti, Ipv4Addr::new(10, 45, 0, 2))
        .await;

    let shared = bench.shared.clone();
    wait_for(|| shared.session_state(psi) == Some(SmState::Active), "session active").await;
    assert_eq!(bench.shared.session_ip(psi), Some(Ipv4Addr::new(10, 45, 0, 2)));
    wait_for(|| shared.session_gnb_ip(psi).is_some(), "gNB data endpoint").await;

    bench.command(UeCommand::Terminate).await;
}

/// Network-side release: the UE confirms with Release Complete and the
/// slot is freed together with its resources.
#[tokio::test]
async fn test_release_clears_slot() {
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
        .send_establishment_accept(psi, pti, Ipv4Addr::new(10, 45, 0, 3))
        .await;
    let shared = bench.shared.clone();
    wait_for(|| shared.session_state(psi) == Some(SmState::Active), "session active").await;

    // Driver asks for release; the network answers with the command.
    bench.command(UeCommand::ReleasePduSession(psi)).await;
    let release_request = bench.amf.expect_uplink_nas().await;
    match bench.amf.unprotect(&release_request) {
        NasMessage::Mm(MmMessage::UlNasTransport(transport)) => {
            assert!(matches!(
                NasMessage::decode(&transport.payload).unwrap(),
                NasMessage::Sm(SmMessage::ReleaseRequest(_))
            ));
        }
        other => panic!("expected UL NAS Transport, got {other:?}"),
    }

    let mut wait_handle = bench.shared.session_wait_handle(psi).expect("live session");

    let command = SmMessage::ReleaseCommand(PduSessionReleaseCommand {
        pdu_session_id: psi,
        pti,
        cause: 0x24,
    });
    let transport = MmMessage::DlNasTransport(DlNasTransport {
        payload: command.encode(),
        pdu_session_id: Some(psi),
    });
    let octets = bench.amf.protect(
        transport,
        coreprobe_nas::enums::SecurityHeaderType::IntegrityProtectedAndCiphered,
    );
    bench.amf.send_downlink_nas(octets).await;

    // Release Complete comes back and the slot empties.
    let complete = bench.amf.expect_uplink_nas().await;
    match bench.amf.unprotect(&complete) {
        NasMessage::Mm(MmMessage::UlNasTransport(transport)) => {
            assert!(matches!(
                NasMessage::decode(&transport.payload).unwrap(),
                NasMessage::Sm(SmMessage::ReleaseComplete(_))
            ));
        }
        other => panic!("expected UL NAS Transport, got {other:?}"),
    }

    wait_for(|| shared.session_count() == 0, "slot cleared").await;
    wait_handle.changed().await.expect("wait handle dropped without firing");
    assert!(*wait_handle.borrow());

    bench.command(UeCommand::Terminate).await;
}

/// A second session occupies the next slot; slot ids are 1-based.
#[tokio::test]
async fn test_two_sessions_use_distinct_slots() {
    let config = test_ue_config();
    let mut bench = start_bench(&config).await;

    bench.command(UeCommand::Register).await;
    bench.amf.run_registration(&config).await;
    bench.expect_state(MmState::Deregistered).await;
    bench.expect_state(MmState::RegisteredInitiated).await;
    bench.expect_state(MmState::Registered).await;

    bench.command(UeCommand::EstablishPduSession).await;
    let (psi1, pti1) = bench.amf.expect_establishment_request().await;
    bench
        .amf
        .send_establishment_accept(psi1, pti1, Ipv4Addr::new(10, 45, 0, 2))
        .await;

    bench.command(UeCommand::EstablishPduSession).await;
    let (psi2, pti2) = bench.amf.expect_establishment_request().await;
    bench
        .amf
        .send_establishment_accept(psi2, pti2, Ipv4Addr::new(10, 45, 0, 3))
        .await;

    assert_eq!((psi1, psi2), (1, 2));
    let shared = bench.shared.clone();
    wait_for(|| shared.session_state(2) == Some(SmState::Active), "second session").await;
    assert_eq!(bench.shared.session_ip(1), Some(Ipv4Addr::new(10, 45, 0, 2)));
    assert_eq!(bench.shared.session_ip(2), Some(Ipv4Addr::new(10, 45, 0, 3)));

    bench.command(UeCommand::Terminate).await;
}
