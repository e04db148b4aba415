use crate::domain::loan::{LoanCandidate, LoanId, LoanStatus, StaffId};
use crate::error::{DisbursalError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a candidate CSV export.
#[derive(Debug, Deserialize)]
struct CandidateRecord {
    id: LoanId,
    #[serde(default)]
    account_no: String,
    #[serde(default)]
    client_name: String,
    #[serde(default)]
    product_name: String,
    principal: Decimal,
    #[serde(default = "default_waiting")]
    waiting_for_disbursal: bool,
    #[serde(default)]
    staff_id: Option<StaffId>,
    #[serde(default)]
    mobile_no: Option<String>,
}

fn default_waiting() -> bool {
    true
}

impl TryFrom<CandidateRecord> for LoanCandidate {
    type Error = DisbursalError;

    fn try_from(record: CandidateRecord) -> Result<Self> {
        Ok(Self {
            id: record.id,
            account_no: record.account_no,
            client_name: record.client_name,
            product_name: record.product_name,
            principal: record.principal.try_into()?,
            status: LoanStatus {
                waiting_for_disbursal: record.waiting_for_disbursal,
            },
            staff_id: record.staff_id,
            mobile_no: record.mobile_no.filter(|m| !m.is_empty()),
        })
    }
}

/// Reads loan candidates from a CSV source.
///
/// Expects a header row with `id`, `principal` and optionally `account_no`,
/// `client_name`, `product_name`, `waiting_for_disbursal`, `staff_id`,
/// `mobile_no`. Whitespace is trimmed and short rows are accepted.
pub struct CandidateReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CandidateReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily yields one candidate (or error) per data row.
    pub fn candidates(self) -> impl Iterator<Item = Result<LoanCandidate>> {
        self.reader
            .into_deserialize::<CandidateRecord>()
            .map(|result| result.map_err(DisbursalError::from).and_then(LoanCandidate::try_from))
    }
}
