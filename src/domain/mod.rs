//! Domain model of bulk loan disbursal: candidates, selections, batch rows,
//! transfers, reports, and the ports to the ledger and payment systems.

pub mod batch;
pub mod loan;
pub mod ports;
pub mod report;
pub mod selection;
pub mod transfer;
