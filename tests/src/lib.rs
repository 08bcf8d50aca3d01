//! Integration test framework for coreprobe
//!
//! Test utilities and a scripted AMF double for driving full UE+gNB
//! pairs through registration, authentication, session establishment
//! and teardown.
//!
//! The scenario tests live in sibling files wired up as test targets:
//! `registration`, `authentication`, `pdu_session`, `lifecycle`.

pub mod mock_amf;
pub mod test_fixtures;

pub use mock_amf::MockAmf;
pub use test_fixtures::{build_autn, start_bench, test_ue_config, TestBench};

use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes test logging once per process. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
