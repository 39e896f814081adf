//! Rounding repair applied at submission time.
//!
//! Per question weights are rounded independently, so their sum can drift
//! from the voter's weight by a few units. The whole drift is moved onto a
//! single question; the first suitable one in question order takes it.

use crate::{
    round::QuestionId,
    snapshot::VoterWeight,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reconciliation {
    pub weights: Vec<(QuestionId, u64)>,
    /// Drift left over when no single question could absorb it. Positive
    /// means weight left unused.
    pub unresolved: i128,
}

impl Reconciliation {
    pub fn is_exact(&self) -> bool {
        self.unresolved == 0
    }

    pub fn total(&self) -> u64 {
        self.weights.iter().map(|(_, w)| *w).sum()
    }
}

pub fn reconcile(
    weights: Vec<(QuestionId, u64)>,
    voter_weight: VoterWeight,
) -> Reconciliation {
    let mut weights = weights;
    let sum: i128 = weights.iter().map(|(_, w)| *w as i128).sum();
    let difference = voter_weight.get() as i128 - sum;

    let adjusted = if difference < 0 {
        let excess = difference.unsigned_abs() as u64;
        weights
            .iter_mut()
            .find(|(_, w)| *w > excess)
            .map(|(_, w)| *w -= excess)
            .is_some()
    } else if difference > 0 {
        weights
            .iter_mut()
            .find(|(_, w)| *w > 0)
            .map(|(_, w)| *w += difference as u64)
            .is_some()
    } else {
        true
    };

    let unresolved = if adjusted { 0 } else { difference };
    if unresolved != 0 {
        log::warn!(
            "could not reconcile weights: {} unassigned against voter weight {}",
            unresolved,
            voter_weight.get()
        );
    }
    Reconciliation {
        weights,
        unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(values: &[u64]) -> Vec<(QuestionId, u64)> {
        values
            .iter()
            .enumerate()
            .map(|(i, w)| (format!("q{}", i), *w))
            .collect()
    }

    fn values(r: &Reconciliation) -> Vec<u64> {
        r.weights.iter().map(|(_, w)| *w).collect()
    }

    #[test]
    fn exact_sum_is_untouched() {
        let r = reconcile(weights(&[3, 4, 3]), VoterWeight::new(10));
        assert!(r.is_exact());
        assert_eq!(values(&r), vec![3, 4, 3]);
    }

    #[test]
    fn overcount_comes_off_the_first_large_enough_weight() {
        // 50/50 of 7 rounds to 4 + 4
        let r = reconcile(weights(&[0, 4, 4]), VoterWeight::new(7));
        assert!(r.is_exact());
        assert_eq!(values(&r), vec![0, 3, 4]);
        assert_eq!(r.total(), 7);
    }

    #[test]
    fn undercount_goes_to_the_first_nonzero_weight() {
        let r = reconcile(weights(&[0, 3, 3, 3]), VoterWeight::new(10));
        assert!(r.is_exact());
        assert_eq!(values(&r), vec![0, 4, 3, 3]);
    }

    #[test]
    fn only_one_question_is_adjusted() {
        let r = reconcile(weights(&[5, 5, 5]), VoterWeight::new(12));
        assert_eq!(values(&r), vec![2, 5, 5]);
        assert_eq!(r.total(), 12);
    }

    #[test]
    fn overcount_no_single_weight_can_absorb() {
        // every weight equals the excess, none strictly exceeds it
        let r = reconcile(weights(&[1, 1, 1]), VoterWeight::new(2));
        assert_eq!(r.unresolved, -1);
        assert_eq!(values(&r), vec![1, 1, 1]);
    }

    #[test]
    fn undercount_with_nothing_allocated() {
        let r = reconcile(weights(&[0, 0]), VoterWeight::new(5));
        assert_eq!(r.unresolved, 5);
        assert_eq!(r.total(), 0);
    }
}
