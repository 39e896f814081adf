//! Percentage allocations of the current voter across a round's proposals.
//!
//! Every question keeps a percentage and the integer weight derived from it,
//! `round(percentage / 100 * voter_weight)`. Both are written together, so a
//! reader holding a `&AllocationLedger` never sees one without the other.
//! Percentages never sum to more than 100.

use crate::{
    error::{
        Error,
        Result,
    },
    round::QuestionId,
    snapshot::VoterWeight,
    threshold::PassState,
};

pub const FULL_ALLOCATION: f64 = 100.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Allocation {
    pub percentage: f64,
    pub weight: u64,
}

/// Input bounds for one question.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AllocationLimits {
    /// Largest percentage the question can hold given the others.
    pub max: f64,
    /// Raising is disabled: either everything is allocated elsewhere or the
    /// proposal has already passed. Lowering is still allowed.
    pub locked: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AllocationLedger {
    voter_weight: VoterWeight,
    entries: Vec<(QuestionId, Allocation)>,
}

impl AllocationLedger {
    pub fn new<I, S>(question_ids: I, voter_weight: VoterWeight) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<QuestionId>,
    {
        let mut ledger = AllocationLedger {
            voter_weight,
            entries: Vec::new(),
        };
        ledger.reset(question_ids);
        ledger
    }

    /// Zeroes every question of a newly loaded round, dropping the old ones.
    pub fn reset<I, S>(&mut self, question_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<QuestionId>,
    {
        self.entries = question_ids
            .into_iter()
            .map(|id| (id.into(), Allocation::default()))
            .collect();
    }

    pub fn voter_weight(&self) -> VoterWeight {
        self.voter_weight
    }

    /// Rescales the stored weights for a different voter weight.
    pub fn set_voter_weight(&mut self, voter_weight: VoterWeight) {
        self.voter_weight = voter_weight;
        for (_, allocation) in self.entries.iter_mut() {
            allocation.weight = weight_for(allocation.percentage, voter_weight);
        }
    }

    /// Sets a question's percentage, clamped so the round total stays within
    /// 100. The question may take back its own previous share. Returns the
    /// stored percentage.
    pub fn allocate(&mut self, question_id: &str, requested: f64) -> Result<f64> {
        let others = self.total_percentage_except(question_id);
        let voter_weight = self.voter_weight;
        let allocation = self
            .entries
            .iter_mut()
            .find(|(id, _)| id == question_id)
            .map(|(_, allocation)| allocation)
            .ok_or_else(|| Error::UnknownQuestion(question_id.to_string()))?;

        let mut percentage = if requested.is_finite() { requested } else { 0.0 };
        let cap = FULL_ALLOCATION - others;
        if percentage > cap {
            percentage = cap;
        }
        if percentage < 0.0 {
            percentage = 0.0;
        }
        *allocation = Allocation {
            percentage,
            weight: weight_for(percentage, voter_weight),
        };
        Ok(percentage)
    }

    pub fn get(&self, question_id: &str) -> Option<Allocation> {
        self.entries
            .iter()
            .find(|(id, _)| id == question_id)
            .map(|(_, allocation)| *allocation)
    }

    pub fn percentage(&self, question_id: &str) -> f64 {
        self.get(question_id).map(|a| a.percentage).unwrap_or(0.0)
    }

    pub fn weight(&self, question_id: &str) -> u64 {
        self.get(question_id).map(|a| a.weight).unwrap_or(0)
    }

    pub fn total_percentage(&self) -> f64 {
        self.entries.iter().map(|(_, a)| a.percentage).sum()
    }

    pub fn remaining_percentage(&self) -> f64 {
        FULL_ALLOCATION - self.total_percentage()
    }

    /// Weights in question order.
    pub fn weights(&self) -> Vec<(QuestionId, u64)> {
        self.entries
            .iter()
            .map(|(id, allocation)| (id.clone(), allocation.weight))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Allocation)> {
        self.entries.iter().map(|(id, a)| (id.as_str(), a))
    }

    pub fn limits(&self, question_id: &str, pass_state: PassState) -> AllocationLimits {
        let own = self.percentage(question_id);
        AllocationLimits {
            max: FULL_ALLOCATION - self.total_percentage_except(question_id),
            locked: (self.total_percentage() >= FULL_ALLOCATION && own == 0.0)
                || pass_state.passed,
        }
    }

    fn total_percentage_except(&self, question_id: &str) -> f64 {
        self.entries
            .iter()
            .filter(|(id, _)| id != question_id)
            .map(|(_, a)| a.percentage)
            .sum()
    }
}

fn weight_for(percentage: f64, voter_weight: VoterWeight) -> u64 {
    (percentage / FULL_ALLOCATION * voter_weight.get() as f64).round() as u64
}
