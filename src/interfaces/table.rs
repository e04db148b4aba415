use crate::domain::loan::{LoanCandidate, StaffId, eligible_candidates};
use crate::domain::selection::SelectionSet;

/// The loan disbursal table as a selection surface.
///
/// Holds the eligible loans in display order together with the user's
/// selection. Row positions are 0-based internally and 1-based in labels.
#[derive(Debug, Clone, Default)]
pub struct DisbursalTable {
    rows: Vec<LoanCandidate>,
    selection: SelectionSet,
    filter: String,
}

impl DisbursalTable {
    /// Builds the table from a raw listing, keeping only eligible loans.
    pub fn new(loans: Vec<LoanCandidate>, officer: Option<StaffId>) -> Self {
        let rows = eligible_candidates(loans, officer);
        let selection = SelectionSet::for_candidates(&rows);
        Self {
            rows,
            selection,
            filter: String::new(),
        }
    }

    /// Replaces the rows after a refresh; the selection starts over.
    pub fn replace_rows(&mut self, loans: Vec<LoanCandidate>, officer: Option<StaffId>) {
        self.rows = eligible_candidates(loans, officer);
        self.selection.reset(&self.rows);
    }

    pub fn rows(&self) -> &[LoanCandidate] {
        &self.rows
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    pub fn is_all_selected(&self) -> bool {
        self.selection.all_selected(&self.rows)
    }

    /// Selects every row unless all are selected, in which case clears.
    pub fn master_toggle(&mut self) {
        if self.is_all_selected() {
            self.selection.clear();
        } else {
            self.selection.select_all(&self.rows);
        }
    }

    /// Toggles the row at `position`; out-of-range positions are ignored.
    pub fn toggle_row(&mut self, position: usize) {
        if let Some(row) = self.rows.get(position) {
            self.selection.toggle(row);
        }
    }

    /// Selects the rows whose loan id is in `ids`; returns how many matched.
    pub fn select_ids(&mut self, ids: &[u64]) -> usize {
        let mut matched = 0;
        for row in &self.rows {
            if ids.contains(&row.id) {
                if !self.selection.is_selected(row) {
                    self.selection.toggle(row);
                }
                matched += 1;
            }
        }
        matched
    }

    /// Accessible label for the header checkbox (`None`) or a row checkbox.
    pub fn checkbox_label(&self, position: Option<usize>) -> String {
        match position {
            None => {
                let verb = if self.is_all_selected() { "deselect" } else { "select" };
                format!("{verb} all")
            }
            Some(position) => {
                let selected = self
                    .rows
                    .get(position)
                    .is_some_and(|row| self.selection.is_selected(row));
                let verb = if selected { "deselect" } else { "select" };
                format!("{verb} row {}", position + 1)
            }
        }
    }

    /// Sets the free-text filter; it is trimmed and matched case-insensitively.
    pub fn apply_filter(&mut self, text: &str) {
        self.filter = text.trim().to_lowercase();
    }

    /// Rows matching the current filter, with their table positions.
    pub fn visible_rows(&self) -> Vec<(usize, &LoanCandidate)> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, row)| self.matches(row))
            .collect()
    }

    fn matches(&self, row: &LoanCandidate) -> bool {
        if self.filter.is_empty() {
            return true;
        }
        [&row.client_name, &row.account_no, &row.product_name]
            .iter()
            .any(|field| field.to_lowercase().contains(&self.filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loan::fixtures::loan;

    fn table() -> DisbursalTable {
        DisbursalTable::new(vec![loan(1), loan(2), loan(3)], None)
    }

    #[test]
    fn test_master_toggle_round_trip() {
        let mut table = table();
        assert_eq!(table.checkbox_label(None), "select all");

        table.master_toggle();
        assert!(table.is_all_selected());
        assert_eq!(table.checkbox_label(None), "deselect all");

        table.master_toggle();
        assert!(table.selection().is_empty());
    }

    #[test]
    fn test_master_toggle_from_partial_selects_all() {
        let mut table = table();
        table.toggle_row(1);
        table.master_toggle();
        assert!(table.is_all_selected());
    }

    #[test]
    fn test_row_labels_are_one_based() {
        let mut table = table();
        table.toggle_row(0);
        assert_eq!(table.checkbox_label(Some(0)), "deselect row 1");
        assert_eq!(table.checkbox_label(Some(2)), "select row 3");
    }

    #[test]
    fn test_empty_table_is_never_all_selected() {
        let mut table = DisbursalTable::new(Vec::new(), None);
        assert!(!table.is_all_selected());
        table.master_toggle();
        assert!(!table.is_all_selected());
        assert_eq!(table.checkbox_label(None), "select all");
    }

    #[test]
    fn test_filter_does_not_touch_selection() {
        let mut table = table();
        table.master_toggle();
        table.apply_filter("  CLIENT 2 ");

        let visible = table.visible_rows();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].0, 1);
        assert_eq!(table.selection().len(), 3);
    }

    #[test]
    fn test_select_ids_and_refresh() {
        let mut table = table();
        assert_eq!(table.select_ids(&[3, 1, 42]), 2);
        let ids: Vec<_> = table.selection().selected().iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![1, 3]);

        table.replace_rows(vec![loan(4)], None);
        assert!(table.selection().is_empty());
        assert_eq!(table.rows().len(), 1);
    }
}
