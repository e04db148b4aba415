use super::loan::{LoanCandidate, LoanId};
use std::collections::HashMap;

/// The loans picked for a bulk action.
///
/// Membership is unique by loan id. `selected()` always yields members in the
/// order of the candidate listing the set was seeded from, so row labels and
/// batch request ids line up with what the user sees.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    members: Vec<LoanCandidate>,
    rank: HashMap<LoanId, usize>,
}

impl SelectionSet {
    /// Creates an empty selection with no known candidate order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty selection ordered after `candidates`.
    pub fn for_candidates(candidates: &[LoanCandidate]) -> Self {
        let mut set = Self::new();
        set.adopt_order(candidates);
        set
    }

    /// Drops every member and adopts the order of a fresh listing.
    pub fn reset(&mut self, candidates: &[LoanCandidate]) {
        self.members.clear();
        self.adopt_order(candidates);
    }

    /// Adds `item` if absent, removes it if present.
    ///
    /// Loans that are not waiting for disbursal never become members.
    pub fn toggle(&mut self, item: &LoanCandidate) {
        if let Some(pos) = self.position_of(item.id) {
            self.members.remove(pos);
        } else {
            self.insert(item);
        }
    }

    pub fn select_all(&mut self, candidates: &[LoanCandidate]) {
        self.adopt_order(candidates);
        for candidate in candidates {
            if !self.is_selected(candidate) {
                self.insert(candidate);
            }
        }
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub fn is_selected(&self, item: &LoanCandidate) -> bool {
        self.position_of(item.id).is_some()
    }

    /// True iff the selection holds exactly `candidates` and there is at least
    /// one of them. An empty listing is never "all selected".
    pub fn all_selected(&self, candidates: &[LoanCandidate]) -> bool {
        !candidates.is_empty()
            && self.members.len() == candidates.len()
            && candidates.iter().all(|c| self.is_selected(c))
    }

    pub fn selected(&self) -> &[LoanCandidate] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn adopt_order(&mut self, candidates: &[LoanCandidate]) {
        self.rank = candidates
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.id, idx))
            .collect();
        let rank = &self.rank;
        self.members
            .sort_by_key(|m| rank.get(&m.id).copied().unwrap_or(usize::MAX));
    }

    fn insert(&mut self, item: &LoanCandidate) {
        if !item.is_waiting_for_disbursal() {
            return;
        }
        let key = self.rank_of(item.id);
        let at = self
            .members
            .iter()
            .position(|m| self.rank_of(m.id) > key)
            .unwrap_or(self.members.len());
        self.members.insert(at, item.clone());
    }

    fn rank_of(&self, id: LoanId) -> usize {
        self.rank.get(&id).copied().unwrap_or(usize::MAX)
    }

    fn position_of(&self, id: LoanId) -> Option<usize> {
        self.members.iter().position(|m| m.id == id)
    }
}
