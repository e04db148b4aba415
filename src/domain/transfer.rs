use super::loan::{LoanCandidate, LoanId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a party is identified on the payment system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PartyIdType {
    #[default]
    Msisdn,
    AccountId,
}

/// One side of a B2C transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub account_id: String,
    pub party_id_type: PartyIdType,
    pub party_identifier: String,
}

/// A B2C money movement for one disbursed loan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    #[serde(skip)]
    pub loan_id: LoanId,
    pub amount: Decimal,
    pub currency: String,
    pub from: Party,
    pub to: Party,
    pub transaction_id: String,
    pub note: String,
}

impl TransferRequest {
    /// Builds the transfer for a disbursed loan.
    ///
    /// Returns `None` when the borrower has no mobile number to pay out to.
    pub fn for_loan(
        loan: &LoanCandidate,
        sender: &Party,
        currency: &str,
        dispatched_at: DateTime<Utc>,
    ) -> Option<Self> {
        let mobile = loan.mobile_no.as_deref().map(str::trim).filter(|m| !m.is_empty())?;
        Some(Self {
            loan_id: loan.id,
            amount: loan.principal.value(),
            currency: currency.to_string(),
            from: sender.clone(),
            to: Party {
                account_id: loan.account_no.clone(),
                party_id_type: PartyIdType::Msisdn,
                party_identifier: mobile.to_string(),
            },
            transaction_id: correlation_id(loan.id, dispatched_at),
            note: format!("Loan disbursement for loan {}", loan.id),
        })
    }
}

/// Transaction id for the transfer of `loan_id` dispatched at `dispatched_at`.
///
/// The same inputs always give the same id, so the payment system can spot a
/// retried submission.
pub fn correlation_id(loan_id: LoanId, dispatched_at: DateTime<Utc>) -> String {
    format!("disburse-{}-{}", loan_id, dispatched_at.timestamp_millis())
}

/// Acknowledgement returned by the payment system.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

const UNKNOWN_ERROR: &str = "Unknown error";

/// Settled result of one transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOutcome {
    pub loan_id: LoanId,
    pub client_name: String,
    pub transaction_id: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl TransferOutcome {
    pub fn succeeded(loan: &LoanCandidate, transaction_id: String) -> Self {
        Self {
            loan_id: loan.id,
            client_name: loan.client_name.clone(),
            transaction_id,
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(loan: &LoanCandidate, transaction_id: String, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            loan_id: loan.id,
            client_name: loan.client_name.clone(),
            transaction_id,
            succeeded: false,
            error: Some(if reason.trim().is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                reason
            }),
        }
    }

    pub fn message(&self) -> String {
        if self.succeeded {
            format!(
                "B2C transfer initiated for loan {} ({})",
                self.loan_id, self.client_name
            )
        } else {
            format!(
                "B2C transfer failed for loan {} ({}): {}",
                self.loan_id,
                self.client_name,
                self.error.as_deref().unwrap_or(UNKNOWN_ERROR)
            )
        }
    }
}
