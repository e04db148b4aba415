use chrono::{NaiveDate, Utc};
use clap::Parser;
use loan_disbursal::application::coordinator::TransferCoordinator;
use loan_disbursal::application::orchestrator::{Orchestrator, RunContext};
use loan_disbursal::application::submitter::BatchCommandSubmitter;
use loan_disbursal::config::DisbursalConfig;
use loan_disbursal::domain::loan::{LoanCandidate, LoanId, StaffId};
use loan_disbursal::domain::ports::{
    BatchCommandServiceBox, CandidateSourceBox, PaymentTransferServiceRef,
};
use loan_disbursal::infrastructure::http::{LedgerClient, PaymentHubClient};
use loan_disbursal::infrastructure::in_memory::{InMemoryLedger, InMemoryPaymentHub};
use loan_disbursal::interfaces::csv::candidate_reader::CandidateReader;
use loan_disbursal::interfaces::table::DisbursalTable;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Disburse selected loans and pay them out over B2C",
    long_about = None
)]
struct Cli {
    /// Read candidate loans from this CSV file instead of the ledger
    #[arg(long)]
    candidates: Option<PathBuf>,

    /// Loan id to disburse (repeatable)
    #[arg(long = "loan", value_name = "ID")]
    loans: Vec<LoanId>,

    /// Disburse every loan awaiting disbursal
    #[arg(long, conflicts_with = "loans")]
    all: bool,

    /// Use in-memory ledger and payment services; nothing leaves the process
    #[arg(long)]
    dry_run: bool,

    /// Disbursement date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    effective_date: Option<NaiveDate>,

    /// Staff id of the operator
    #[arg(long, env = "DISBURSAL_STAFF_ID")]
    staff_id: Option<StaffId>,

    /// Limit the listing to loans owned by the operator
    #[arg(long, requires = "staff_id")]
    loan_officer: bool,
}

fn read_candidates(path: &PathBuf) -> Result<Vec<LoanCandidate>> {
    let file = File::open(path).into_diagnostic()?;
    let mut loans = Vec::new();
    for candidate in CandidateReader::new(file).candidates() {
        match candidate {
            Ok(loan) => loans.push(loan),
            Err(e) => warn!(error = %e, "Skipping unreadable candidate row"),
        }
    }
    Ok(loans)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("loan_disbursal=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = DisbursalConfig::from_env().into_diagnostic()?;

    let now = Utc::now();
    let context = RunContext {
        staff_id: cli.staff_id,
        is_loan_officer: cli.loan_officer,
        effective_date: cli.effective_date.unwrap_or_else(|| now.date_naive()),
        dispatched_at: now,
    };

    let imported = cli.candidates.as_ref().map(read_candidates).transpose()?;

    let (ledger, source, payments) = if cli.dry_run {
        let ledger = InMemoryLedger::new().with_loans(imported.clone().unwrap_or_default());
        (
            Box::new(ledger.clone()) as BatchCommandServiceBox,
            Box::new(ledger) as CandidateSourceBox,
            Arc::new(InMemoryPaymentHub::new()) as PaymentTransferServiceRef,
        )
    } else {
        let ledger = LedgerClient::new(config.ledger.clone()).into_diagnostic()?;
        let payments = PaymentHubClient::new(config.payment.clone()).into_diagnostic()?;
        (
            Box::new(ledger.clone()) as BatchCommandServiceBox,
            Box::new(ledger) as CandidateSourceBox,
            Arc::new(payments) as PaymentTransferServiceRef,
        )
    };

    let mut orchestrator = Orchestrator::new(
        BatchCommandSubmitter::new(ledger),
        TransferCoordinator::new(payments, config.payment.transfer_settings()),
        source,
        config.locale.clone(),
        config.date_format.clone(),
    );

    let loans = match imported {
        Some(loans) => loans,
        None => orchestrator.load_candidates(&context).await.into_diagnostic()?,
    };
    let mut table = DisbursalTable::new(loans, context.officer_scope());

    if cli.all {
        table.master_toggle();
    } else {
        let matched = table.select_ids(&cli.loans);
        if matched < cli.loans.len() {
            warn!(
                requested = cli.loans.len(),
                matched, "Some requested loans are not awaiting disbursal"
            );
        }
    }

    let outcome = orchestrator
        .run(table.selection_mut(), &context)
        .await
        .into_diagnostic()?;

    for line in outcome.report.lines() {
        println!("{line}");
    }

    if let Some(refreshed) = outcome.refreshed {
        table.replace_rows(refreshed, context.officer_scope());
        println!("{} loan(s) still awaiting disbursal.", table.rows().len());
    }

    Ok(())
}
