use crate::domain::loan::LoanCandidate;
use crate::domain::ports::PaymentTransferServiceRef;
use crate::domain::report::StatusAggregator;
use crate::domain::transfer::{Party, TransferOutcome, TransferRequest, correlation_id};
use crate::error::DisbursalError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Transfer parameters shared by every loan in a run.
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub currency: String,
    pub sender: Party,
    /// Upper bound on a single dispatch; a timeout settles as a failure.
    pub timeout: Duration,
}

/// Counts delivered outcomes and raises the settle signal exactly once.
#[derive(Debug)]
struct Settlement {
    expected: usize,
    delivered: AtomicUsize,
    signals: AtomicUsize,
    settled: watch::Sender<bool>,
}

impl Settlement {
    fn new(expected: usize) -> (Arc<Self>, watch::Receiver<bool>) {
        let (settled, rx) = watch::channel(false);
        let settlement = Arc::new(Self {
            expected,
            delivered: AtomicUsize::new(0),
            signals: AtomicUsize::new(0),
            settled,
        });
        if expected == 0 {
            settlement.signal();
        }
        (settlement, rx)
    }

    /// Counts one outcome. Only the writer that brings the count to
    /// `expected` raises the signal.
    fn record(&self) {
        let delivered = self.delivered.fetch_add(1, Ordering::AcqRel) + 1;
        if delivered == self.expected {
            self.signal();
        }
    }

    fn signal(&self) {
        self.signals.fetch_add(1, Ordering::AcqRel);
        self.settled.send_replace(true);
    }
}

/// Delivers exactly one outcome for a loan, even if its task unwinds.
struct OutcomeSlot {
    loan: LoanCandidate,
    transaction_id: String,
    outcomes: mpsc::UnboundedSender<TransferOutcome>,
    settlement: Arc<Settlement>,
    delivered: bool,
}

impl OutcomeSlot {
    fn deliver(mut self, outcome: TransferOutcome) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: TransferOutcome) {
        if self.delivered {
            return;
        }
        self.delivered = true;
        // The receiver may be gone if the caller stopped listening; the count
        // still has to move.
        let _ = self.outcomes.send(outcome);
        self.settlement.record();
    }
}

impl Drop for OutcomeSlot {
    fn drop(&mut self) {
        if !self.delivered {
            let outcome = TransferOutcome::failed(
                &self.loan,
                self.transaction_id.clone(),
                "transfer task aborted",
            );
            self.send(outcome);
        }
    }
}

/// Handle on the transfers of one run.
///
/// Outcomes arrive in completion order through a single channel.
pub struct TransferRun {
    expected: usize,
    received: usize,
    outcomes: mpsc::UnboundedReceiver<TransferOutcome>,
    settled: watch::Receiver<bool>,
    settlement: Arc<Settlement>,
}

impl TransferRun {
    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn is_settled(&self) -> bool {
        *self.settled.borrow()
    }

    /// How many times the settle signal fired; 1 once settled.
    pub fn settle_signals(&self) -> usize {
        self.settlement.signals.load(Ordering::Acquire)
    }

    /// Next outcome to arrive, or `None` once all expected outcomes were read.
    pub async fn next_outcome(&mut self) -> Option<TransferOutcome> {
        if self.received >= self.expected {
            return None;
        }
        let outcome = self.outcomes.recv().await?;
        self.received += 1;
        Some(outcome)
    }

    /// Waits for the settle signal.
    pub async fn wait_settled(&mut self) {
        // The sender lives in `settlement`, which this handle keeps alive.
        let _ = self.settled.wait_for(|settled| *settled).await;
    }

    /// Records every outcome into `aggregator` as it arrives and returns once
    /// the run has settled.
    pub async fn drain_into(mut self, aggregator: &mut StatusAggregator) {
        while let Some(outcome) = self.next_outcome().await {
            if outcome.succeeded {
                info!(
                    loan_id = outcome.loan_id,
                    transaction_id = %outcome.transaction_id,
                    "B2C transfer initiated"
                );
            } else {
                warn!(loan_id = outcome.loan_id, error = ?outcome.error, "B2C transfer failed");
            }
            let loan_id = outcome.loan_id;
            if !aggregator.record(outcome) {
                warn!(loan_id, "Dropping transfer outcome past the expected count");
            }
        }
        self.wait_settled().await;
    }
}

/// Fans out one B2C transfer per disbursed loan.
#[derive(Clone)]
pub struct TransferCoordinator {
    service: PaymentTransferServiceRef,
    settings: TransferSettings,
}

impl TransferCoordinator {
    pub fn new(service: PaymentTransferServiceRef, settings: TransferSettings) -> Self {
        Self { service, settings }
    }

    /// Dispatches every transfer on its own task and returns immediately.
    ///
    /// Must be called from within a tokio runtime. With no loans the returned
    /// run is already settled.
    pub fn initiate_all(
        &self,
        loans: Vec<LoanCandidate>,
        dispatched_at: DateTime<Utc>,
    ) -> TransferRun {
        let expected = loans.len();
        let (settlement, settled) = Settlement::new(expected);
        let (tx, outcomes) = mpsc::unbounded_channel();

        info!(transfers = expected, "Dispatching B2C transfers");
        for loan in loans {
            let slot = OutcomeSlot {
                transaction_id: correlation_id(loan.id, dispatched_at),
                loan,
                outcomes: tx.clone(),
                settlement: Arc::clone(&settlement),
                delivered: false,
            };
            let service = Arc::clone(&self.service);
            let settings = self.settings.clone();
            tokio::spawn(async move {
                let outcome = dispatch(service, &settings, &slot.loan, dispatched_at).await;
                slot.deliver(outcome);
            });
        }

        TransferRun {
            expected,
            received: 0,
            outcomes,
            settled,
            settlement,
        }
    }
}

async fn dispatch(
    service: PaymentTransferServiceRef,
    settings: &TransferSettings,
    loan: &LoanCandidate,
    dispatched_at: DateTime<Utc>,
) -> TransferOutcome {
    let Some(request) =
        TransferRequest::for_loan(loan, &settings.sender, &settings.currency, dispatched_at)
    else {
        return TransferOutcome::failed(
            loan,
            correlation_id(loan.id, dispatched_at),
            "no mobile number on file",
        );
    };

    debug!(
        loan_id = loan.id,
        transaction_id = %request.transaction_id,
        "Initiating B2C transfer"
    );
    match tokio::time::timeout(settings.timeout, service.initiate_transfer(&request)).await {
        Ok(Ok(_receipt)) => TransferOutcome::succeeded(loan, request.transaction_id),
        Ok(Err(DisbursalError::TransferFailed { reason, .. })) => {
            TransferOutcome::failed(loan, request.transaction_id, reason)
        }
        Ok(Err(e)) => TransferOutcome::failed(loan, request.transaction_id, e.to_string()),
        Err(_) => TransferOutcome::failed(
            loan,
            request.transaction_id,
            format!("timed out after {}ms", settings.timeout.as_millis()),
        ),
    }
}
