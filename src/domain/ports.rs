use super::batch::{BatchItemRequest, BatchItemResult};
use super::loan::{LoanCandidate, StaffId};
use super::transfer::{TransferReceipt, TransferRequest};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The core ledger's batch endpoint.
///
/// A call either returns one result per row or fails as a whole.
#[async_trait]
pub trait BatchCommandService: Send + Sync {
    async fn submit_batch(&self, requests: &[BatchItemRequest]) -> Result<Vec<BatchItemResult>>;
}

/// The payment system that moves money to borrowers.
#[async_trait]
pub trait PaymentTransferService: Send + Sync {
    async fn initiate_transfer(&self, request: &TransferRequest) -> Result<TransferReceipt>;
}

/// Where the list of loans awaiting disbursal comes from.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn loans_awaiting_disbursal(&self, staff: Option<StaffId>) -> Result<Vec<LoanCandidate>>;
}

pub type BatchCommandServiceBox = Box<dyn BatchCommandService>;
/// Shared so that every spawned transfer task can hold it.
pub type PaymentTransferServiceRef = Arc<dyn PaymentTransferService>;
pub type CandidateSourceBox = Box<dyn CandidateSource>;
