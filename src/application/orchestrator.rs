use super::coordinator::TransferCoordinator;
use super::submitter::BatchCommandSubmitter;
use crate::domain::loan::{LoanCandidate, StaffId, eligible_candidates};
use crate::domain::ports::CandidateSourceBox;
use crate::domain::report::{OrchestrationReport, StatusAggregator};
use crate::domain::selection::SelectionSet;
use crate::error::{DisbursalError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Where a run of the bulk disbursal flow currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestrationState {
    #[default]
    Idle,
    Submitting,
    PartiallyDisbursed,
    TransferringPayments,
    Settled,
    Errored,
}

impl OrchestrationState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Errored)
    }

    /// True while a run is between submission and settlement.
    pub fn is_disbursing(self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::PartiallyDisbursed | Self::TransferringPayments
        )
    }

    fn can_move_to(self, next: Self) -> bool {
        use OrchestrationState::*;
        matches!(
            (self, next),
            (Idle, Submitting)
                | (Submitting, Errored)
                | (Submitting, PartiallyDisbursed)
                | (PartiallyDisbursed, TransferringPayments)
                | (PartiallyDisbursed, Settled)
                | (TransferringPayments, Settled)
        )
    }
}

impl fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Read-only facts about the user and moment a run starts with.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Staff id of the signed-in user, if they have one.
    pub staff_id: Option<StaffId>,
    pub is_loan_officer: bool,
    pub effective_date: NaiveDate,
    pub dispatched_at: DateTime<Utc>,
}

impl RunContext {
    /// A context for "now" and a user without loan-officer scoping.
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            staff_id: None,
            is_loan_officer: false,
            effective_date: now.date_naive(),
            dispatched_at: now,
        }
    }

    /// Staff id to scope listings by; only loan officers are scoped.
    pub fn officer_scope(&self) -> Option<StaffId> {
        if self.is_loan_officer { self.staff_id } else { None }
    }
}

/// Result of a run that got past submission.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: OrchestrationReport,
    /// Fresh candidate listing, if the post-run refresh succeeded.
    pub refreshed: Option<Vec<LoanCandidate>>,
}

/// Drives one bulk disbursal: ledger batch, B2C fan-out, report, refresh.
pub struct Orchestrator {
    submitter: BatchCommandSubmitter,
    coordinator: TransferCoordinator,
    source: CandidateSourceBox,
    locale: String,
    date_format: String,
    state: OrchestrationState,
    history: Vec<OrchestrationState>,
    progress: watch::Sender<OrchestrationState>,
}

impl Orchestrator {
    pub fn new(
        submitter: BatchCommandSubmitter,
        coordinator: TransferCoordinator,
        source: CandidateSourceBox,
        locale: impl Into<String>,
        date_format: impl Into<String>,
    ) -> Self {
        Self {
            submitter,
            coordinator,
            source,
            locale: locale.into(),
            date_format: date_format.into(),
            state: OrchestrationState::Idle,
            history: vec![OrchestrationState::Idle],
            progress: watch::Sender::new(OrchestrationState::Idle),
        }
    }

    pub fn state(&self) -> OrchestrationState {
        self.state
    }

    /// States visited by the current (or last) run, starting with `Idle`.
    pub fn history(&self) -> &[OrchestrationState] {
        &self.history
    }

    /// Whether the last run stopped part way, e.g. because its future was
    /// dropped. While `run` is in flight, watch `subscribe` instead.
    pub fn is_disbursing(&self) -> bool {
        self.state.is_disbursing()
    }

    /// Receives every state change, including those made while `run` is in
    /// flight.
    pub fn subscribe(&self) -> watch::Receiver<OrchestrationState> {
        self.progress.subscribe()
    }

    /// Loads the loans the user in `context` may disburse.
    pub async fn load_candidates(&self, context: &RunContext) -> Result<Vec<LoanCandidate>> {
        let scope = context.officer_scope();
        let loans = self.source.loans_awaiting_disbursal(scope).await?;
        Ok(eligible_candidates(loans, scope))
    }

    /// Runs the whole flow for the current selection.
    ///
    /// Fails with `EmptySelection` before any I/O when nothing is selected,
    /// and with `BatchSubmissionFailed` when the ledger call fails outright.
    /// Every other failure is reported in the returned outcome. On success
    /// the selection is cleared and re-ordered after the refreshed listing.
    pub async fn run(
        &mut self,
        selection: &mut SelectionSet,
        context: &RunContext,
    ) -> Result<RunOutcome> {
        if self.state != OrchestrationState::Idle {
            if !self.state.is_terminal() {
                warn!(state = %self.state, "Previous run was interrupted; starting over");
            }
            self.state = OrchestrationState::Idle;
            self.history = vec![OrchestrationState::Idle];
            self.progress.send_replace(OrchestrationState::Idle);
        }
        if selection.is_empty() {
            warn!("Bulk disbursal requested with no loans selected");
            return Err(DisbursalError::EmptySelection);
        }

        self.transition(OrchestrationState::Submitting)?;
        let partition = match self
            .submitter
            .submit(selection, context.effective_date, &self.locale, &self.date_format)
            .await
        {
            Ok(partition) => partition,
            Err(e) => {
                error!(error = %e, "Disbursal batch failed; no transfers attempted");
                self.transition(OrchestrationState::Errored)?;
                return Err(e);
            }
        };

        self.transition(OrchestrationState::PartiallyDisbursed)?;
        info!(
            succeeded = partition.succeeded.len(),
            failed = partition.failed.len(),
            "Ledger disbursement complete"
        );

        let mut aggregator = StatusAggregator::new(partition.succeeded.len(), &partition.failed);
        if partition.succeeded.is_empty() {
            self.transition(OrchestrationState::Settled)?;
        } else {
            self.transition(OrchestrationState::TransferringPayments)?;
            let transfers = self
                .coordinator
                .initiate_all(partition.succeeded_loans(), context.dispatched_at);
            transfers.drain_into(&mut aggregator).await;
            self.transition(OrchestrationState::Settled)?;
        }

        let report = aggregator.summary();
        if let Some(line) = &report.terminal {
            info!(summary = %line, "Bulk disbursal settled");
        }

        let refreshed = match self.load_candidates(context).await {
            Ok(loans) => {
                selection.reset(&loans);
                Some(loans)
            }
            Err(e) => {
                warn!(error = %e, "Could not refresh loans awaiting disbursal");
                selection.clear();
                None
            }
        };

        Ok(RunOutcome { report, refreshed })
    }

    fn transition(&mut self, next: OrchestrationState) -> Result<()> {
        if !self.state.can_move_to(next) {
            return Err(DisbursalError::InvalidState {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        info!(from = %self.state, to = %next, "Orchestration state change");
        self.state = next;
        self.history.push(next);
        self.progress.send_replace(next);
        Ok(())
    }
}
