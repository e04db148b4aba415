use crate::error::DisbursalError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger identifier of a loan account.
pub type LoanId = u64;

/// Ledger identifier of a staff member (loan officer).
pub type StaffId = u64;

/// A positive monetary amount, such as a loan principal.
///
/// Wraps `rust_decimal::Decimal` so that zero or negative principals are
/// rejected at the boundary instead of reaching the payment system.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, DisbursalError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(DisbursalError::InvalidAmount(format!(
                "Amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DisbursalError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle flags reported by the ledger for a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanStatus {
    #[serde(default)]
    pub waiting_for_disbursal: bool,
}

/// A loan account that may be picked for bulk disbursal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanCandidate {
    pub id: LoanId,
    #[serde(default)]
    pub account_no: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default, rename = "loanProductName")]
    pub product_name: String,
    pub principal: Amount,
    #[serde(default)]
    pub status: LoanStatus,
    /// Owning loan officer, if the ledger assigned one.
    #[serde(default, alias = "loanOfficerId")]
    pub staff_id: Option<StaffId>,
    /// Mobile-money number of the borrower; the B2C recipient.
    #[serde(default)]
    pub mobile_no: Option<String>,
}

impl LoanCandidate {
    pub fn is_waiting_for_disbursal(&self) -> bool {
        self.status.waiting_for_disbursal
    }
}

/// Narrows a raw loan listing to the rows that may enter a selection.
///
/// Only loans waiting for disbursal are kept. When `officer` is set, loans
/// owned by other staff are dropped as well, even if the source was already
/// asked to filter by staff.
pub fn eligible_candidates(
    loans: Vec<LoanCandidate>,
    officer: Option<StaffId>,
) -> Vec<LoanCandidate> {
    loans
        .into_iter()
        .filter(LoanCandidate::is_waiting_for_disbursal)
        .filter(|loan| match officer {
            Some(staff) => loan.staff_id == Some(staff),
            None => true,
        })
        .collect()
}


#[cfg(test)]
mod tests {
    use super::fixtures::loan;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(DisbursalError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-5.0)),
            Err(DisbursalError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_candidate_deserializes_ledger_shape() {
        let json = r#"{
            "id": 42,
            "accountNo": "000000042",
            "clientName": "Wanjiku Kamau",
            "loanProductName": "Starter",
            "principal": 15000.5,
            "status": { "id": 200, "waitingForDisbursal": true },
            "loanOfficerId": 3
        }"#;
        let candidate: LoanCandidate = serde_json::from_str(json).unwrap();

        assert_eq!(candidate.id, 42);
        assert_eq!(candidate.principal.value(), dec!(15000.5));
        assert!(candidate.is_waiting_for_disbursal());
        assert_eq!(candidate.staff_id, Some(3));
        assert_eq!(candidate.mobile_no, None);
    }

    #[test]
    fn test_candidate_rejects_zero_principal() {
        let json = r#"{ "id": 1, "principal": 0, "status": { "waitingForDisbursal": true } }"#;
        assert!(serde_json::from_str::<LoanCandidate>(json).is_err());
    }

    #[test]
    fn test_eligible_drops_loans_not_waiting() {
        let mut disbursed = loan(2);
        disbursed.status.waiting_for_disbursal = false;

        let kept = eligible_candidates(vec![loan(1), disbursed, loan(3)], None);
        let ids: Vec<_> = kept.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_eligible_applies_officer_filter() {
        let mut other_officer = loan(2);
        other_officer.staff_id = Some(99);
        let mut unassigned = loan(3);
        unassigned.staff_id = None;

        let kept = eligible_candidates(vec![loan(1), other_officer, unassigned], Some(7));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 1);
    }
}
