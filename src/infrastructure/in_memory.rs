use crate::domain::batch::{BatchItemRequest, BatchItemResult, SUCCESS_STATUS};
use crate::domain::loan::{LoanCandidate, LoanId, StaffId};
use crate::domain::ports::{BatchCommandService, CandidateSource, PaymentTransferService};
use crate::domain::transfer::{TransferReceipt, TransferRequest};
use crate::error::{DisbursalError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Ledger state shared between clones.
#[derive(Default)]
struct LedgerState {
    loans: Vec<LoanCandidate>,
    disbursed: HashSet<LoanId>,
    batches: Vec<Vec<BatchItemRequest>>,
    listings: Vec<Option<StaffId>>,
}

/// A scripted, thread-safe stand-in for the core ledger.
///
/// Serves both the batch endpoint and the candidate listing. Disbursed loans
/// stop showing up as waiting for disbursal, like on the real ledger.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    failing: Arc<HashSet<LoanId>>,
    transport_error: Option<String>,
    reverse_results: bool,
}

impl InMemoryLedger {
    /// Creates an empty ledger that applies every disburse command.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loans(self, loans: Vec<LoanCandidate>) -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState {
                loans,
                ..LedgerState::default()
            })),
            ..self
        }
    }

    /// Rows for these loans come back with status 400.
    pub fn with_failing_loans(self, loans: impl IntoIterator<Item = LoanId>) -> Self {
        Self {
            failing: Arc::new(loans.into_iter().collect()),
            ..self
        }
    }

    /// Every batch call fails outright.
    pub fn with_transport_error(self, message: &str) -> Self {
        Self {
            transport_error: Some(message.to_string()),
            ..self
        }
    }

    /// Results come back in reverse request order.
    pub fn with_reversed_results(self) -> Self {
        Self {
            reverse_results: true,
            ..self
        }
    }

    pub async fn submitted_batches(&self) -> Vec<Vec<BatchItemRequest>> {
        self.state.read().await.batches.clone()
    }

    /// Staff filter passed to each listing call, oldest first.
    pub async fn listings(&self) -> Vec<Option<StaffId>> {
        self.state.read().await.listings.clone()
    }
}

#[async_trait]
impl BatchCommandService for InMemoryLedger {
    async fn submit_batch(&self, requests: &[BatchItemRequest]) -> Result<Vec<BatchItemResult>> {
        let mut state = self.state.write().await;
        state.batches.push(requests.to_vec());

        if let Some(message) = &self.transport_error {
            return Err(DisbursalError::BatchSubmissionFailed(message.clone()));
        }

        let mut results: Vec<BatchItemResult> = requests
            .iter()
            .map(|request| match request.loan_id() {
                Some(loan_id) if !self.failing.contains(&loan_id) => {
                    state.disbursed.insert(loan_id);
                    BatchItemResult {
                        request_id: request.request_id,
                        status_code: SUCCESS_STATUS.to_string(),
                        body: Some(format!(r#"{{"resourceId":{loan_id},"loanId":{loan_id}}}"#)),
                    }
                }
                _ => BatchItemResult {
                    request_id: request.request_id,
                    status_code: "400".to_string(),
                    body: Some(
                        r#"{"defaultUserMessage":"Loan cannot be disbursed"}"#.to_string(),
                    ),
                },
            })
            .collect();

        if self.reverse_results {
            results.reverse();
        }
        Ok(results)
    }
}

#[async_trait]
impl CandidateSource for InMemoryLedger {
    async fn loans_awaiting_disbursal(&self, staff: Option<StaffId>) -> Result<Vec<LoanCandidate>> {
        let mut state = self.state.write().await;
        state.listings.push(staff);
        let disbursed = &state.disbursed;
        Ok(state
            .loans
            .iter()
            .filter(|loan| staff.is_none() || loan.staff_id == staff)
            .cloned()
            .map(|mut loan| {
                if disbursed.contains(&loan.id) {
                    loan.status.waiting_for_disbursal = false;
                }
                loan
            })
            .collect())
    }
}

/// A scripted, thread-safe stand-in for the payment system.
#[derive(Default, Clone)]
pub struct InMemoryPaymentHub {
    dispatched: Arc<RwLock<Vec<TransferRequest>>>,
    failing: Arc<HashSet<LoanId>>,
    delays: Arc<HashMap<LoanId, Duration>>,
}

impl InMemoryPaymentHub {
    /// Creates a hub that accepts every transfer immediately.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_loans(self, loans: impl IntoIterator<Item = LoanId>) -> Self {
        Self {
            failing: Arc::new(loans.into_iter().collect()),
            ..self
        }
    }

    /// Holds the transfer for `loan_id` for `delay` before answering.
    pub fn with_delay(self, loan_id: LoanId, delay: Duration) -> Self {
        let mut delays = (*self.delays).clone();
        delays.insert(loan_id, delay);
        Self {
            delays: Arc::new(delays),
            ..self
        }
    }

    /// Every request received so far, in arrival order.
    pub async fn dispatched(&self) -> Vec<TransferRequest> {
        self.dispatched.read().await.clone()
    }
}

#[async_trait]
impl PaymentTransferService for InMemoryPaymentHub {
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt> {
        self.dispatched.write().await.push(request.clone());

        if let Some(delay) = self.delays.get(&request.loan_id) {
            tokio::time::sleep(*delay).await;
        }

        if self.failing.contains(&request.loan_id) {
            return Err(DisbursalError::TransferFailed {
                loan_id: request.loan_id,
                reason: "payment system rejected the transfer".to_string(),
            });
        }

        Ok(TransferReceipt {
            transaction_id: Some(request.transaction_id.clone()),
            status: Some("ACCEPTED".to_string()),
        })
    }
}
