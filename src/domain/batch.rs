use super::loan::{LoanCandidate, LoanId};
use crate::error::DisbursalError;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Status code the ledger uses for a row that was applied.
pub const SUCCESS_STATUS: &str = "200";

/// Correlation key of one row inside a batch.
pub type RequestId = u32;

/// The disburse command sent as the body of every batch row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisburseCommand {
    pub date_format: String,
    pub locale: String,
    pub actual_disbursement_date: String,
}

impl DisburseCommand {
    pub fn new(effective_date: NaiveDate, locale: &str, date_format: &str) -> Self {
        Self {
            date_format: date_format.to_string(),
            locale: locale.to_string(),
            actual_disbursement_date: format_ledger_date(effective_date, date_format),
        }
    }
}

/// One row of a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemRequest {
    pub request_id: RequestId,
    pub relative_url: String,
    pub method: String,
    /// JSON-encoded command, sent as a string.
    pub body: String,
}

impl BatchItemRequest {
    pub fn disburse(
        request_id: RequestId,
        loan_id: LoanId,
        command: &DisburseCommand,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            request_id,
            relative_url: format!("loans/{loan_id}?command=disburse"),
            method: "POST".to_string(),
            body: serde_json::to_string(command)?,
        })
    }

    /// Loan id encoded in a `loans/{id}?command=...` relative url.
    pub fn loan_id(&self) -> Option<LoanId> {
        self.relative_url
            .strip_prefix("loans/")?
            .split(['?', '/'])
            .next()?
            .parse()
            .ok()
    }
}

/// What the ledger reports back after applying a disburse command.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisbursementReceipt {
    #[serde(default)]
    pub resource_id: Option<u64>,
    #[serde(default)]
    pub loan_id: Option<u64>,
    #[serde(default)]
    pub changes: serde_json::Value,
}

/// One decoded row of a batch response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemResult {
    pub request_id: RequestId,
    #[serde(deserialize_with = "status_code_as_string")]
    pub status_code: String,
    #[serde(default)]
    pub body: Option<String>,
}

impl BatchItemResult {
    pub fn is_success(&self) -> bool {
        self.status_code == SUCCESS_STATUS
    }

    /// Decodes the JSON string body of a successful row.
    pub fn receipt(&self) -> Option<DisbursementReceipt> {
        if !self.is_success() {
            return None;
        }
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_str(body).ok())
    }

    /// Best-effort human detail for a failed row.
    pub fn failure_detail(&self) -> Option<String> {
        let body = self.body.as_deref()?;
        let parsed: serde_json::Value = serde_json::from_str(body).ok()?;
        parsed
            .get("defaultUserMessage")
            .or_else(|| parsed.get("developerMessage"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    }
}

// The ledger has sent the status code both as a number and as a string.
fn status_code_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Number(u64),
        Text(String),
    }

    Ok(match Code::deserialize(deserializer)? {
        Code::Number(n) => n.to_string(),
        Code::Text(s) => s,
    })
}

/// A loan whose disbursement was applied by the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct DisbursedLoan {
    pub loan: LoanCandidate,
    pub receipt: Option<DisbursementReceipt>,
}

/// A loan whose batch row did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub loan: LoanCandidate,
    pub request_id: RequestId,
    pub status_code: String,
    pub detail: Option<String>,
}

impl RowFailure {
    pub fn error(&self) -> DisbursalError {
        DisbursalError::DisbursementRowFailed {
            loan_id: self.loan.id,
            status_code: self.status_code.clone(),
        }
    }

    pub fn message(&self) -> String {
        let mut line = format!(
            "Disbursement failed for loan {} ({}): status {}",
            self.loan.id, self.loan.client_name, self.status_code
        );
        if let Some(detail) = &self.detail {
            line.push_str(" - ");
            line.push_str(detail);
        }
        line
    }
}

/// Batch results split by business outcome, each in request order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchPartition {
    pub succeeded: Vec<DisbursedLoan>,
    pub failed: Vec<RowFailure>,
}

impl BatchPartition {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn succeeded_loans(&self) -> Vec<LoanCandidate> {
        self.succeeded.iter().map(|d| d.loan.clone()).collect()
    }
}

/// Status recorded for a request the ledger returned no row for.
pub const MISSING_RESULT_STATUS: &str = "missing";

/// Matches results to the requests they answer, by request id.
///
/// `plan` maps each request id to the loan it was built for. A request without
/// a result counts as failed; results for unknown ids are returned separately.
pub fn correlate(
    plan: &BTreeMap<RequestId, LoanCandidate>,
    results: Vec<BatchItemResult>,
) -> (BatchPartition, Vec<BatchItemResult>) {
    let mut by_id: BTreeMap<RequestId, BatchItemResult> = BTreeMap::new();
    let mut unmatched = Vec::new();
    for result in results {
        if plan.contains_key(&result.request_id) && !by_id.contains_key(&result.request_id) {
            by_id.insert(result.request_id, result);
        } else {
            unmatched.push(result);
        }
    }

    let mut partition = BatchPartition::default();
    for (request_id, loan) in plan {
        match by_id.remove(request_id) {
            Some(result) if result.is_success() => partition.succeeded.push(DisbursedLoan {
                loan: loan.clone(),
                receipt: result.receipt(),
            }),
            Some(result) => partition.failed.push(RowFailure {
                loan: loan.clone(),
                request_id: *request_id,
                detail: result.failure_detail(),
                status_code: result.status_code,
            }),
            None => partition.failed.push(RowFailure {
                loan: loan.clone(),
                request_id: *request_id,
                status_code: MISSING_RESULT_STATUS.to_string(),
                detail: Some("no result returned for this row".to_string()),
            }),
        }
    }
    (partition, unmatched)
}

/// Formats `date` with a ledger (Java-style) pattern such as `dd MMMM yyyy`.
///
/// Supports the day, month and year fields; other letters are copied through.
pub fn format_ledger_date(date: NaiveDate, pattern: &str) -> String {
    let mut strftime = String::new();
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let token = match (c, run) {
            ('d', 1) => Some("%-d"),
            ('d', _) => Some("%d"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            _ => None,
        };
        match token {
            Some(t) => strftime.push_str(t),
            None => {
                for _ in 0..run {
                    if c == '%' {
                        strftime.push_str("%%");
                    } else {
                        strftime.push(c);
                    }
                }
            }
        }
        i += run;
    }
    date.format(&strftime).to_string()
}
