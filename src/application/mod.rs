//! Application layer: the bulk disbursal use case.
//!
//! `Orchestrator` drives a run through the ledger batch (`BatchCommandSubmitter`)
//! and the B2C fan-out (`TransferCoordinator`). Transfers run as independent
//! `tokio` tasks that report into one channel.

pub mod coordinator;
pub mod orchestrator;
pub mod submitter;
