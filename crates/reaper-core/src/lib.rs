//! # Reaper Core
//!
//! Core types and traits for the Reaper machine sweep.
//!
//! The provider is the single source of truth for machine state: this crate
//! only models what the CloudAPI returns and the capabilities the policy
//! engine needs from a client.

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod machine;
pub mod memory;

pub use client::CloudClient;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ReaperConfig, DEFAULT_PAUSE_SECS};
pub use error::{ReaperError, Result};
pub use machine::{format_timestamp, parse_timestamp, Machine, MachineState, ISO_8601_FORMAT};
pub use memory::{ClientCall, ClientOperation, InMemoryClient};

/// Current Reaper version for compatibility checks
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Reaper build information for telemetry and debugging
pub const BUILD_INFO: &str = concat!(
    "Reaper ",
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CARGO_PKG_NAME"),
    ")"
);

/// CloudAPI constants shared by clients
pub mod endpoints {
    pub const API_VERSION: &str = "~7.0";
    pub const MACHINES: &str = "machines";
    /// CloudAPI caps a single listing page at this many machines.
    pub const PAGE_LIMIT: usize = 1000;
}
