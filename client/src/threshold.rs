//! Pass state of a proposal against its funding threshold.

use crate::{
    round::Question,
    tally::OptionTallyIndex,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassState {
    /// Progress towards the threshold, capped at 100.
    pub percentage: f64,
    pub passed: bool,
}

impl PassState {
    /// A missing or non-positive threshold counts as already passed.
    pub fn evaluate(threshold: Option<f64>, count: u64) -> Self {
        let percentage = match threshold {
            Some(threshold) if threshold > 0.0 => {
                (count as f64 / threshold * 100.0).min(100.0)
            }
            _ => 100.0,
        };
        PassState {
            percentage,
            passed: percentage >= 100.0,
        }
    }
}

/// Tally of the question's primary option.
pub fn question_tally(question: &Question, index: &OptionTallyIndex) -> u64 {
    question
        .primary_option()
        .map(|option| index.count(&option.id))
        .unwrap_or(0)
}

pub fn question_pass_state(
    question: &Question,
    index: &OptionTallyIndex,
) -> PassState {
    PassState::evaluate(question.threshold(), question_tally(question, index))
}
