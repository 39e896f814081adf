use crate::{
    error::Result,
    round::{
        Address,
        OptionId,
        RoundId,
        VotingRoundGlobalState,
        VotingRoundMetadata,
    },
    snapshot::VoteGatingSnapshot,
    submit::VoteSubmission,
    tally::TallyCounts,
};
use async_trait::async_trait;

/// Everything the engine needs from the chain and the metadata store.
///
/// Lookups return `Ok(None)` when the thing asked for does not exist; the
/// session turns that into the matching not found error.
#[async_trait]
pub trait VotingRoundClient: Send + Sync {
    async fn fetch_voting_round_global_state(
        &self,
        round: RoundId,
    ) -> Result<Option<VotingRoundGlobalState>>;

    async fn fetch_voting_round_metadata(
        &self,
        cid: &str,
    ) -> Result<Option<VotingRoundMetadata>>;

    async fn fetch_voting_snapshot(
        &self,
        cid: &str,
    ) -> Result<Option<VoteGatingSnapshot>>;

    async fn fetch_tally_counts(
        &self,
        round: RoundId,
        metadata: &VotingRoundMetadata,
    ) -> Result<Option<TallyCounts>>;

    /// Option ids the voter cast, `None` if they have not voted.
    async fn fetch_voter_votes(
        &self,
        round: RoundId,
        voter: &Address,
        metadata: &VotingRoundMetadata,
        global_state: &VotingRoundGlobalState,
    ) -> Result<Option<Vec<OptionId>>>;

    async fn submit_vote(&self, submission: VoteSubmission) -> Result<()>;

    async fn close_voting_round(
        &self,
        round: RoundId,
        signer: &Address,
    ) -> Result<()>;
}
