//! Boot-time connection session: cached-profile fast connect, discovery
//! fallback, record rebuild, and the one-shot broker publish that follows.
//!
//! Everything in here is hardware-free; the radio, flash region, clock,
//! entropy, and broker transport come in through the traits in [`hal`].

pub mod config;
pub mod diag;
pub mod hal;
pub mod orchestrator;
pub mod publish;
pub mod record;
pub mod store;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testkit;

pub use config::{ConnectStrategy, NetworkProfile, SessionConfig};
pub use diag::DiagSink;
pub use orchestrator::{ConnectPath, ConnectionOrchestrator, SessionOutcome, SlowReason};
pub use record::{ConnectionRecord, RECORD_LEN, RECORD_MAGIC};
pub use store::RecordStore;
