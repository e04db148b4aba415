use crate::domain::batch::{
    BatchItemRequest, BatchPartition, DisburseCommand, RequestId, correlate,
};
use crate::domain::loan::LoanCandidate;
use crate::domain::ports::BatchCommandServiceBox;
use crate::domain::selection::SelectionSet;
use crate::error::{DisbursalError, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Requests built for one submission, keyed by request id.
#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    pub requests: Vec<BatchItemRequest>,
    pub loans: BTreeMap<RequestId, LoanCandidate>,
}

/// Turns a selection into one batched disburse call and reads back per-row
/// outcomes.
pub struct BatchCommandSubmitter {
    service: BatchCommandServiceBox,
}

impl BatchCommandSubmitter {
    pub fn new(service: BatchCommandServiceBox) -> Self {
        Self { service }
    }

    /// Builds one disburse row per selected loan.
    ///
    /// Request ids start at 1 and follow the selection's iteration order.
    pub fn plan(
        selection: &SelectionSet,
        effective_date: NaiveDate,
        locale: &str,
        date_format: &str,
    ) -> Result<BatchPlan> {
        let command = DisburseCommand::new(effective_date, locale, date_format);
        let mut plan = BatchPlan::default();
        for (request_id, loan) in (1..).zip(selection.selected()) {
            plan.requests
                .push(BatchItemRequest::disburse(request_id, loan.id, &command)?);
            plan.loans.insert(request_id, loan.clone());
        }
        Ok(plan)
    }

    /// Submits the selection as a single batch.
    ///
    /// A transport failure surfaces as `BatchSubmissionFailed`; failed rows are
    /// returned in the partition, never as an error.
    pub async fn submit(
        &self,
        selection: &SelectionSet,
        effective_date: NaiveDate,
        locale: &str,
        date_format: &str,
    ) -> Result<BatchPartition> {
        let plan = Self::plan(selection, effective_date, locale, date_format)?;
        info!(rows = plan.requests.len(), "Submitting disbursal batch");

        let results = self
            .service
            .submit_batch(&plan.requests)
            .await
            .map_err(|e| match e {
                DisbursalError::BatchSubmissionFailed(_) => e,
                other => DisbursalError::BatchSubmissionFailed(other.to_string()),
            })?;

        if results.len() != plan.requests.len() {
            warn!(
                sent = plan.requests.len(),
                received = results.len(),
                "Batch result count does not match request count"
            );
        }

        let (partition, unmatched) = correlate(&plan.loans, results);
        for stray in &unmatched {
            warn!(
                request_id = stray.request_id,
                "Ignoring batch result with unknown or duplicate request id"
            );
        }
        for failure in &partition.failed {
            warn!(error = %failure.error(), detail = ?failure.detail, "Disbursement row failed");
        }
        debug!(
            succeeded = partition.succeeded.len(),
            failed = partition.failed.len(),
            "Batch results correlated"
        );
        Ok(partition)
    }
}
