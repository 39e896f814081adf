//! Turning a finished allocation into a vote.

use crate::{
    allocation::AllocationLedger,
    error::{
        Error,
        Result,
    },
    reconcile::{
        reconcile,
        Reconciliation,
    },
    round::{
        Address,
        OptionId,
        Question,
        QuestionId,
        RoundId,
    },
    tally::OptionTallyIndex,
    threshold::question_pass_state,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Payload handed to the collaborator that casts the vote.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSubmission {
    pub round: RoundId,
    pub signer: Address,
    pub signature: String,
    /// Option picked per question, in question order.
    pub selected_option_indexes: Vec<u32>,
    /// Weight per question, in question order.
    pub weightings: Vec<u64>,
    /// The voter's full weight.
    pub weighting: u64,
}

impl VoteSubmission {
    /// Selected option of every question paired with the weight it receives.
    pub fn cast_options(&self, questions: &[Question]) -> Vec<(OptionId, u64)> {
        questions
            .iter()
            .zip(self.selected_option_indexes.iter().zip(&self.weightings))
            .filter_map(|(q, (index, weight))| {
                q.options
                    .get(*index as usize)
                    .map(|option| (option.id.clone(), *weight))
            })
            .collect()
    }
}

/// Refuses to go ahead when a question holding weight has passed according
/// to counts fetched for this submission.
pub fn check_not_passed(
    questions: &[Question],
    ledger: &AllocationLedger,
    fresh: &OptionTallyIndex,
) -> Result<()> {
    let passed: Vec<QuestionId> = questions
        .iter()
        .filter(|q| ledger.weight(&q.id) > 0)
        .filter(|q| question_pass_state(q, fresh).passed)
        .map(|q| q.id.clone())
        .collect();
    if passed.is_empty() {
        Ok(())
    } else {
        Err(Error::AlreadyPassed(passed))
    }
}

pub fn build_submission(
    round: RoundId,
    signer: Address,
    signature: String,
    questions: &[Question],
    ledger: &AllocationLedger,
) -> (VoteSubmission, Reconciliation) {
    let reconciliation = reconcile(ledger.weights(), ledger.voter_weight());
    let weightings = questions
        .iter()
        .map(|q| {
            reconciliation
                .weights
                .iter()
                .find(|(id, _)| *id == q.id)
                .map(|(_, w)| *w)
                .unwrap_or(0)
        })
        .collect();
    let submission = VoteSubmission {
        round,
        signer,
        signature,
        selected_option_indexes: vec![0; questions.len()],
        weightings,
        weighting: ledger.voter_weight().get(),
    };
    (submission, reconciliation)
}
