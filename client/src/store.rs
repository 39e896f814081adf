//! A [`VotingRoundClient`] over a local directory of JSON documents.
//!
//! ```text
//! <root>/rounds/<round>.json            global state
//! <root>/ipfs/<cid>.json                round metadata and snapshots
//! <root>/tallies/<round>.json           tally counts
//! <root>/votes/<round>/<address>.json   option ids cast by a voter
//! ```

use crate::{
    client::VotingRoundClient,
    error::{
        Error,
        Result,
    },
    round::{
        Address,
        OptionId,
        RoundId,
        VotingRoundGlobalState,
        VotingRoundMetadata,
    },
    snapshot::VoteGatingSnapshot,
    submit::VoteSubmission,
    tally::{
        add_to_tally,
        TallyCounts,
    },
};
use async_std::fs;
use async_trait::async_trait;
use chrono::Utc;
use core::convert::TryFrom;
use libipld::cid::Cid;
use serde::{
    de::DeserializeOwned,
    Serialize,
};
use std::path::{
    Path,
    PathBuf,
};

#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn round_path(&self, round: RoundId) -> PathBuf {
        self.root.join("rounds").join(format!("{}.json", round))
    }

    fn document_path(&self, cid: &str) -> Result<PathBuf> {
        let cid = Cid::try_from(cid)
            .map_err(|_| Error::InvalidCid(cid.to_string()))?;
        Ok(self.root.join("ipfs").join(format!("{}.json", cid)))
    }

    fn tally_path(&self, round: RoundId) -> PathBuf {
        self.root.join("tallies").join(format!("{}.json", round))
    }

    fn votes_path(&self, round: RoundId, voter: &Address) -> PathBuf {
        self.root
            .join("votes")
            .join(round.to_string())
            .join(format!("{}.json", voter))
    }

    pub async fn put_global_state(
        &self,
        round: RoundId,
        state: &VotingRoundGlobalState,
    ) -> Result<()> {
        write_json(&self.round_path(round), state).await
    }

    /// Stores a document under a cid chosen by the caller.
    pub async fn put_document<T: Serialize>(
        &self,
        cid: &str,
        value: &T,
    ) -> Result<()> {
        write_json(&self.document_path(cid)?, value).await
    }

    pub async fn put_tally_counts(
        &self,
        round: RoundId,
        counts: &TallyCounts,
    ) -> Result<()> {
        write_json(&self.tally_path(round), counts).await
    }

    async fn metadata_for(
        &self,
        round: RoundId,
    ) -> Result<(VotingRoundGlobalState, VotingRoundMetadata)> {
        let state = self
            .fetch_voting_round_global_state(round)
            .await?
            .ok_or(Error::RoundNotFound(round))?;
        let metadata = self
            .fetch_voting_round_metadata(&state.metadata_ipfs_cid)
            .await?
            .ok_or_else(|| {
                Error::MetadataNotFound(state.metadata_ipfs_cid.clone())
            })?;
        Ok((state, metadata))
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, serde_json::to_vec_pretty(value)?).await?;
    Ok(())
}

#[async_trait]
impl VotingRoundClient for LocalStore {
    async fn fetch_voting_round_global_state(
        &self,
        round: RoundId,
    ) -> Result<Option<VotingRoundGlobalState>> {
        read_json(&self.round_path(round)).await
    }

    async fn fetch_voting_round_metadata(
        &self,
        cid: &str,
    ) -> Result<Option<VotingRoundMetadata>> {
        read_json(&self.document_path(cid)?).await
    }

    async fn fetch_voting_snapshot(
        &self,
        cid: &str,
    ) -> Result<Option<VoteGatingSnapshot>> {
        read_json(&self.document_path(cid)?).await
    }

    async fn fetch_tally_counts(
        &self,
        round: RoundId,
        _metadata: &VotingRoundMetadata,
    ) -> Result<Option<TallyCounts>> {
        read_json(&self.tally_path(round)).await
    }

    async fn fetch_voter_votes(
        &self,
        round: RoundId,
        voter: &Address,
        _metadata: &VotingRoundMetadata,
        _global_state: &VotingRoundGlobalState,
    ) -> Result<Option<Vec<OptionId>>> {
        read_json(&self.votes_path(round, voter)).await
    }

    async fn submit_vote(&self, submission: VoteSubmission) -> Result<()> {
        let (_, metadata) = self.metadata_for(submission.round).await?;
        let cast = submission.cast_options(&metadata.questions);
        let mut counts: TallyCounts =
            read_json(&self.tally_path(submission.round))
                .await?
                .unwrap_or_default();
        for (option_id, weight) in cast.iter().filter(|(_, w)| *w > 0) {
            add_to_tally(&mut counts, option_id, *weight);
        }
        let options: Vec<&OptionId> = cast.iter().map(|(id, _)| id).collect();
        let votes_path = self.votes_path(submission.round, &submission.signer);
        write_json(&votes_path, &options).await?;
        self.put_tally_counts(submission.round, &counts).await?;
        log::info!(
            "recorded vote of {} in round {}",
            submission.signer,
            submission.round
        );
        Ok(())
    }

    async fn close_voting_round(
        &self,
        round: RoundId,
        signer: &Address,
    ) -> Result<()> {
        let (mut state, metadata) = self.metadata_for(round).await?;
        if metadata.created.by != *signer {
            return Err(Error::NotRoundCreator(round))
        }
        state.close_time = Some(Utc::now());
        self.put_global_state(round, &state).await
    }
}
