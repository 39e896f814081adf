//! In-memory collaborator for tests and demos.
//!
//! Tallies can be changed between fetches to play the part of other voters,
//! and a fetch can be held open to finish after something else happened.

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
use async_std::{
    channel::{
        self,
        Receiver,
        Sender,
    },
    sync::Mutex,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;

/// Collaborator calls that can be held open.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Fetch {
    GlobalState,
    Tallies,
    VoterVotes,
}

/// Test side of a held fetch.
pub struct FetchGate {
    started: Receiver<()>,
    release: Sender<()>,
}

impl FetchGate {
    /// Resolves once the held fetch is waiting to be released.
    pub async fn started(&self) {
        let _ = self.started.recv().await;
    }

    /// Lets the held fetch read the mock state and return.
    pub async fn release(self) {
        let _ = self.release.send(()).await;
    }
}

#[derive(Default)]
struct MockState {
    global_states: HashMap<RoundId, VotingRoundGlobalState>,
    metadata: HashMap<String, VotingRoundMetadata>,
    snapshots: HashMap<String, VoteGatingSnapshot>,
    tallies: HashMap<RoundId, TallyCounts>,
    votes: HashMap<(RoundId, Address), Vec<OptionId>>,
    submissions: Vec<VoteSubmission>,
    tally_fetches: usize,
    fail_tallies: Option<String>,
    gates: HashMap<Fetch, (Sender<()>, Receiver<()>)>,
}

#[derive(Default)]
pub struct MockClient {
    state: Mutex<MockState>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a round, its metadata and optional snapshot.
    pub async fn insert_round(
        &self,
        round: RoundId,
        global_state: VotingRoundGlobalState,
        metadata: VotingRoundMetadata,
        snapshot: Option<VoteGatingSnapshot>,
    ) {
        let mut state = self.state.lock().await;
        if let (Some(cid), Some(snapshot)) =
            (metadata.vote_gating_snapshot_cid.clone(), snapshot)
        {
            state.snapshots.insert(cid, snapshot);
        }
        state
            .metadata
            .insert(global_state.metadata_ipfs_cid.clone(), metadata);
        state.global_states.insert(round, global_state);
    }

    pub async fn set_tally_counts(&self, round: RoundId, counts: TallyCounts) {
        self.state.lock().await.tallies.insert(round, counts);
    }

    pub async fn set_voter_votes(
        &self,
        round: RoundId,
        voter: Address,
        votes: Vec<OptionId>,
    ) {
        self.state.lock().await.votes.insert((round, voter), votes);
    }

    /// Makes every following tally fetch fail with `message`.
    pub async fn fail_tally_fetches(&self, message: Option<&str>) {
        self.state.lock().await.fail_tallies = message.map(str::to_string);
    }

    pub async fn submissions(&self) -> Vec<VoteSubmission> {
        self.state.lock().await.submissions.clone()
    }

    pub async fn tally_fetches(&self) -> usize {
        self.state.lock().await.tally_fetches
    }

    /// Holds the next `fetch` until the returned gate is released.
    pub async fn hold(&self, fetch: Fetch) -> FetchGate {
        let (started_tx, started_rx) = channel::bounded(1);
        let (release_tx, release_rx) = channel::bounded(1);
        self.state
            .lock()
            .await
            .gates
            .insert(fetch, (started_tx, release_rx));
        FetchGate {
            started: started_rx,
            release: release_tx,
        }
    }

    async fn pass_gate(&self, fetch: Fetch) {
        let gate = self.state.lock().await.gates.remove(&fetch);
        if let Some((started, release)) = gate {
            log::debug!("holding {:?} fetch", fetch);
            let _ = started.send(()).await;
            let _ = release.recv().await;
        }
    }
}

#[async_trait]
impl VotingRoundClient for MockClient {
    async fn fetch_voting_round_global_state(
        &self,
        round: RoundId,
    ) -> Result<Option<VotingRoundGlobalState>> {
        self.pass_gate(Fetch::GlobalState).await;
        Ok(self.state.lock().await.global_states.get(&round).cloned())
    }

    async fn fetch_voting_round_metadata(
        &self,
        cid: &str,
    ) -> Result<Option<VotingRoundMetadata>> {
        Ok(self.state.lock().await.metadata.get(cid).cloned())
    }

    async fn fetch_voting_snapshot(
        &self,
        cid: &str,
    ) -> Result<Option<VoteGatingSnapshot>> {
        Ok(self.state.lock().await.snapshots.get(cid).cloned())
    }

    async fn fetch_tally_counts(
        &self,
        round: RoundId,
        _metadata: &VotingRoundMetadata,
    ) -> Result<Option<TallyCounts>> {
        self.pass_gate(Fetch::Tallies).await;
        let mut state = self.state.lock().await;
        state.tally_fetches += 1;
        if let Some(message) = &state.fail_tallies {
            return Err(Error::Collaborator(message.clone()))
        }
        Ok(state.tallies.get(&round).cloned())
    }

    async fn fetch_voter_votes(
        &self,
        round: RoundId,
        voter: &Address,
        _metadata: &VotingRoundMetadata,
        _global_state: &VotingRoundGlobalState,
    ) -> Result<Option<Vec<OptionId>>> {
        self.pass_gate(Fetch::VoterVotes).await;
        Ok(self
            .state
            .lock()
            .await
            .votes
            .get(&(round, voter.clone()))
            .cloned())
    }

    async fn submit_vote(&self, submission: VoteSubmission) -> Result<()> {
        let mut state = self.state.lock().await;
        let cid = state
            .global_states
            .get(&submission.round)
            .map(|g| g.metadata_ipfs_cid.clone())
            .ok_or(Error::RoundNotFound(submission.round))?;
        let metadata = state
            .metadata
            .get(&cid)
            .cloned()
            .ok_or(Error::MetadataNotFound(cid))?;
        let cast = submission.cast_options(&metadata.questions);
        let counts = state.tallies.entry(submission.round).or_default();
        for (option_id, weight) in cast.iter().filter(|(_, w)| *w > 0) {
            add_to_tally(counts, option_id, *weight);
        }
        state.votes.insert(
            (submission.round, submission.signer.clone()),
            cast.into_iter().map(|(id, _)| id).collect(),
        );
        state.submissions.push(submission);
        Ok(())
    }

    async fn close_voting_round(
        &self,
        round: RoundId,
        _signer: &Address,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let global_state = state
            .global_states
            .get_mut(&round)
            .ok_or(Error::RoundNotFound(round))?;
        global_state.close_time = Some(Utc::now());
        Ok(())
    }
}
