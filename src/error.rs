use thiserror::Error;

#[derive(Error, Debug)]
pub enum DisbursalError {
    #[error("No loans selected for disbursal")]
    EmptySelection,
    #[error("Batch submission failed: {0}")]
    BatchSubmissionFailed(String),
    #[error("Disbursement failed for loan {loan_id} with status {status_code}")]
    DisbursementRowFailed { loan_id: u64, status_code: String },
    #[error("Transfer failed for loan {loan_id}: {reason}")]
    TransferFailed { loan_id: u64, reason: String },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState { from: String, to: String },
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DisbursalError>;
