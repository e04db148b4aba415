#![allow(dead_code)]

use loan_disbursal::application::coordinator::{TransferCoordinator, TransferSettings};
use loan_disbursal::application::orchestrator::Orchestrator;
use loan_disbursal::application::submitter::BatchCommandSubmitter;
use loan_disbursal::domain::loan::{Amount, LoanCandidate, LoanStatus};
use loan_disbursal::domain::selection::SelectionSet;
use loan_disbursal::domain::transfer::{Party, PartyIdType};
use loan_disbursal::infrastructure::in_memory::{InMemoryLedger, InMemoryPaymentHub};
use rust_decimal_macros::dec;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub fn loan(id: u64) -> LoanCandidate {
    LoanCandidate {
        id,
        account_no: format!("{id:09}"),
        client_name: format!("Client {id}"),
        product_name: "Group Loan".to_string(),
        principal: Amount::new(dec!(2500.00)).unwrap(),
        status: LoanStatus {
            waiting_for_disbursal: true,
        },
        staff_id: Some(1),
        mobile_no: Some(format!("25471100{id:04}")),
    }
}

pub fn loans(ids: &[u64]) -> Vec<LoanCandidate> {
    ids.iter().map(|&id| loan(id)).collect()
}

pub fn select_all(candidates: &[LoanCandidate]) -> SelectionSet {
    let mut selection = SelectionSet::for_candidates(candidates);
    selection.select_all(candidates);
    selection
}

pub fn transfer_settings(timeout: Duration) -> TransferSettings {
    TransferSettings {
        currency: "KES".to_string(),
        sender: Party {
            account_id: "lender-account".to_string(),
            party_id_type: PartyIdType::Msisdn,
            party_identifier: "254700000000".to_string(),
        },
        timeout,
    }
}

pub fn orchestrator(ledger: &InMemoryLedger, hub: &InMemoryPaymentHub) -> Orchestrator {
    Orchestrator::new(
        BatchCommandSubmitter::new(Box::new(ledger.clone())),
        TransferCoordinator::new(Arc::new(hub.clone()), transfer_settings(Duration::from_secs(2))),
        Box::new(ledger.clone()),
        "en",
        "dd MMMM yyyy",
    )
}

pub fn write_candidates_csv(path: &Path, rows: &[LoanCandidate]) -> Result<(), Error> {
    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record([
        "id",
        "account_no",
        "client_name",
        "product_name",
        "principal",
        "waiting_for_disbursal",
        "staff_id",
        "mobile_no",
    ])?;

    for row in rows {
        wtr.write_record([
            row.id.to_string(),
            row.account_no.clone(),
            row.client_name.clone(),
            row.product_name.clone(),
            row.principal.to_string(),
            row.status.waiting_for_disbursal.to_string(),
            row.staff_id.map(|s| s.to_string()).unwrap_or_default(),
            row.mobile_no.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
