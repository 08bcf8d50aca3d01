//! Simulated UE for coreprobe
//!
//! One [`UeContext`] per subscriber, driven as an independent task. The
//! UE talks to its serving gNB exclusively through two bounded queues
//! (uplink and downlink, capacity 1) and reports every mobility state
//! change on a scenario stream the test driver observes.

pub mod context;
pub mod nas;
pub mod scenario;
pub mod session;
pub mod task;
pub mod tun;

pub use context::{AmfInfo, UeContext, UeSecurity, UeShared};
pub use nas::mm::MmState;
pub use nas::sm::SmState;
pub use scenario::ScenarioMessage;
pub use session::UePduSession;
pub use task::{spawn_ue_task, UeCommand};
