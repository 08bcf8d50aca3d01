//! Common types and utilities for coreprobe
//!
//! This crate provides the shared error type, configuration structures,
//! logging setup and the cross-actor message types used by the UE and
//! gNB simulation crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{GnbConfig, OpType, SupportedAlgs, UeConfig};
pub use error::Error;
pub use logging::{init_logging, LogLevel};
pub use types::{Plmn, SNssai, UeLinkMessage};
