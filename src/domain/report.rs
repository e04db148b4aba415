use super::batch::RowFailure;
use super::transfer::TransferOutcome;

/// Final (or partial) account of one orchestration run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrchestrationReport {
    /// One line per transfer outcome, in arrival order.
    pub messages: Vec<String>,
    /// One line per batch row that was not disbursed, in request order.
    pub disbursement_messages: Vec<String>,
    /// Summary line; only present once the report is complete.
    pub terminal: Option<String>,
    /// False until every expected transfer outcome was recorded.
    pub complete: bool,
    pub transfers_expected: usize,
    pub transfers_succeeded: usize,
    pub transfers_failed: usize,
    pub disbursement_failures: usize,
}

impl OrchestrationReport {
    /// Every line the user should see, terminal line last.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.disbursement_messages
            .iter()
            .chain(self.messages.iter())
            .map(String::as_str)
            .chain(self.terminal.as_deref())
    }

    pub fn all_succeeded(&self) -> bool {
        self.complete && self.disbursement_failures == 0 && self.transfers_failed == 0
    }
}

/// Collects transfer outcomes as they settle.
#[derive(Debug, Clone, Default)]
pub struct StatusAggregator {
    expected: usize,
    outcomes: Vec<TransferOutcome>,
    disbursement_messages: Vec<String>,
}

impl StatusAggregator {
    pub fn new(expected: usize, row_failures: &[RowFailure]) -> Self {
        Self {
            expected,
            outcomes: Vec::with_capacity(expected),
            disbursement_messages: row_failures.iter().map(RowFailure::message).collect(),
        }
    }

    /// Records one outcome. Outcomes past `expected` are dropped and
    /// `false` is returned.
    pub fn record(&mut self, outcome: TransferOutcome) -> bool {
        if self.is_complete() {
            return false;
        }
        self.outcomes.push(outcome);
        true
    }

    pub fn recorded(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.len() >= self.expected
    }

    pub fn summary(&self) -> OrchestrationReport {
        let succeeded = self.outcomes.iter().filter(|o| o.succeeded).count();
        let failed = self.outcomes.len() - succeeded;
        let complete = self.is_complete();
        let disbursement_failures = self.disbursement_messages.len();

        OrchestrationReport {
            messages: self.outcomes.iter().map(TransferOutcome::message).collect(),
            disbursement_messages: self.disbursement_messages.clone(),
            terminal: complete.then(|| terminal_line(self.expected, failed, disbursement_failures)),
            complete,
            transfers_expected: self.expected,
            transfers_succeeded: succeeded,
            transfers_failed: failed,
            disbursement_failures,
        }
    }
}

fn terminal_line(total: usize, failed: usize, disbursement_failures: usize) -> String {
    if total == 0 {
        return format!(
            "No B2C transfers attempted; {disbursement_failures} disbursement(s) failed."
        );
    }

    let transfers = if failed == 0 {
        format!("All {total} B2C transfers completed.")
    } else {
        format!(
            "{} of {total} transfers succeeded; {failed} failed. Check per-item messages for details.",
            total.saturating_sub(failed)
        )
    };

    if disbursement_failures > 0 {
        format!("{disbursement_failures} disbursement(s) failed. {transfers}")
    } else {
        transfers
    }
}
