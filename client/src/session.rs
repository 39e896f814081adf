//! The voting session: one voter looking at one round.
//!
//! All mutable state sits behind a single lock. Fetches run without holding
//! it and their results are applied only if the round (and, for per-voter
//! data, the address) they were started for is still the current one.

use crate::{
    allocation::{
        Allocation,
        AllocationLedger,
        AllocationLimits,
    },
    client::VotingRoundClient,
    config::Config,
    error::{
        Error,
        Result,
    },
    ordering::{
        order_questions,
        BaseOrder,
        FilterKind,
        FilterSet,
        OrderKey,
        SortMode,
    },
    round::{
        Address,
        OptionId,
        Question,
        RoundId,
        VotingRoundGlobalState,
        VotingRoundMetadata,
    },
    snapshot::{
        resolve_eligibility,
        Eligibility,
        VoteGatingSnapshot,
    },
    submit::{
        build_submission,
        check_not_passed,
        VoteSubmission,
    },
    tally::OptionTallyIndex,
    threshold::{
        question_pass_state,
        PassState,
    },
};
use async_std::sync::RwLock;
use chrono::{
    DateTime,
    Utc,
};
use rand::{
    rngs::StdRng,
    SeedableRng,
};
use std::sync::Arc;

/// A proposal ready to be rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct QuestionView {
    pub question: Question,
    pub tally: u64,
    pub pass_state: PassState,
    pub allocation: Allocation,
    pub allocation_limits: AllocationLimits,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VotingStatus {
    pub has_started: bool,
    pub has_ended: bool,
    pub has_closed: bool,
    pub has_voted: bool,
    pub can_vote: bool,
    pub can_submit: bool,
    pub is_creator: bool,
    pub can_close: bool,
    pub total_allocated: f64,
    pub remaining: f64,
}

struct LoadedRound {
    global_state: VotingRoundGlobalState,
    metadata: VotingRoundMetadata,
    snapshot: Option<VoteGatingSnapshot>,
}

type CurrentRound =
    (RoundId, Arc<VotingRoundMetadata>, Arc<VotingRoundGlobalState>);

struct SessionState {
    /// Bumped on every round load; fetches carry the value they started with.
    generation: u64,
    round: Option<RoundId>,
    global_state: Option<Arc<VotingRoundGlobalState>>,
    metadata: Option<Arc<VotingRoundMetadata>>,
    snapshot: Option<Arc<VoteGatingSnapshot>>,
    tallies: OptionTallyIndex,
    voter_votes: Option<Vec<OptionId>>,
    address: Option<Address>,
    eligibility: Eligibility,
    ledger: AllocationLedger,
    sort: SortMode,
    filters: FilterSet,
    base_order: BaseOrder,
    rng: StdRng,
    loading: bool,
    error: Option<String>,
}

impl SessionState {
    fn new(rng: StdRng) -> Self {
        SessionState {
            generation: 0,
            round: None,
            global_state: None,
            metadata: None,
            snapshot: None,
            tallies: OptionTallyIndex::default(),
            voter_votes: None,
            address: None,
            eligibility: Eligibility::ineligible(),
            ledger: AllocationLedger::default(),
            sort: SortMode::None,
            filters: FilterSet::default(),
            base_order: BaseOrder::default(),
            rng,
            loading: false,
            error: None,
        }
    }

    fn clear_round(&mut self) {
        self.round = None;
        self.global_state = None;
        self.metadata = None;
        self.snapshot = None;
        self.tallies = OptionTallyIndex::default();
        self.voter_votes = None;
        self.ledger.reset(Vec::<String>::new());
        self.base_order.clear();
        self.resolve_eligibility();
    }

    fn install(&mut self, round: RoundId, loaded: LoadedRound) {
        let key = OrderKey {
            round,
            metadata_cid: loaded.global_state.metadata_ipfs_cid.clone(),
        };
        self.ledger
            .reset(loaded.metadata.questions.iter().map(|q| q.id.clone()));
        self.base_order.get_or_shuffle(
            &key,
            loaded.metadata.questions.len(),
            &mut self.rng,
        );
        self.global_state = Some(Arc::new(loaded.global_state));
        self.metadata = Some(Arc::new(loaded.metadata));
        self.snapshot = loaded.snapshot.map(Arc::new);
        self.resolve_eligibility();
    }

    fn resolve_eligibility(&mut self) {
        self.eligibility = Eligibility::ineligible();
        self.eligibility = resolve_eligibility(
            self.snapshot.as_deref(),
            self.address.as_ref(),
        );
        self.ledger.set_voter_weight(self.eligibility.weight);
    }

    /// Keeps the message of `err` for display and hands it back.
    fn fail(&mut self, err: Error) -> Error {
        self.error = err.display_message();
        err
    }

    fn current(&self) -> Result<CurrentRound> {
        match (&self.round, &self.metadata, &self.global_state) {
            (Some(round), Some(metadata), Some(global_state)) => {
                Ok((*round, metadata.clone(), global_state.clone()))
            }
            _ => Err(Error::NoRoundLoaded),
        }
    }

    fn status_at(&self, now: DateTime<Utc>) -> VotingStatus {
        let total_allocated = self.ledger.total_percentage();
        let remaining = self.ledger.remaining_percentage();
        let (global_state, metadata) =
            match (&self.global_state, &self.metadata) {
                (Some(g), Some(m)) => (g, m),
                _ => {
                    return VotingStatus {
                        total_allocated,
                        remaining,
                        ..VotingStatus::default()
                    }
                }
            };
        let has_started = global_state.has_vote_started(now);
        let has_ended = global_state.has_vote_ended(now);
        let has_closed = global_state.has_closed();
        let has_voted = self.voter_votes.is_some();
        let can_vote = has_started && !has_ended && self.eligibility.eligible;
        let is_creator = self.address.as_ref() == Some(&metadata.created.by);
        VotingStatus {
            has_started,
            has_ended,
            has_closed,
            has_voted,
            can_vote,
            can_submit: can_vote
                && total_allocated >= 100.0
                && self.address.is_some()
                && self.eligibility.signature.is_some()
                && !has_voted,
            is_creator,
            can_close: is_creator && !has_closed,
            total_allocated,
            remaining,
        }
    }
}

pub struct VoteSession<C> {
    client: C,
    config: Config,
    state: RwLock<SessionState>,
}

impl<C: VotingRoundClient> VoteSession<C> {
    pub fn new(client: C, config: Config) -> Self {
        Self::with_rng(client, config, StdRng::from_entropy())
    }

    /// Session drawing its base orders from `rng`.
    pub fn with_rng(client: C, config: Config, rng: StdRng) -> Self {
        VoteSession {
            client,
            config,
            state: RwLock::new(SessionState::new(rng)),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub async fn round(&self) -> Option<RoundId> {
        self.state.read().await.round
    }

    pub async fn metadata(&self) -> Option<Arc<VotingRoundMetadata>> {
        self.state.read().await.metadata.clone()
    }

    pub async fn global_state(&self) -> Option<Arc<VotingRoundGlobalState>> {
        self.state.read().await.global_state.clone()
    }

    pub async fn address(&self) -> Option<Address> {
        self.state.read().await.address.clone()
    }

    pub async fn eligibility(&self) -> Eligibility {
        self.state.read().await.eligibility.clone()
    }

    pub async fn ledger(&self) -> AllocationLedger {
        self.state.read().await.ledger.clone()
    }

    pub async fn voter_votes(&self) -> Option<Vec<OptionId>> {
        self.state.read().await.voter_votes.clone()
    }

    pub async fn sort_mode(&self) -> SortMode {
        self.state.read().await.sort
    }

    pub async fn filters(&self) -> FilterSet {
        self.state.read().await.filters.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Message of the last failure, if it should be shown.
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    /// Keeps the failure message unless a newer round load started since
    /// `generation`.
    async fn record<T>(
        &self,
        generation: u64,
        result: Result<T>,
    ) -> Result<T> {
        match result {
            Err(err) => {
                let mut state = self.state.write().await;
                if state.generation == generation {
                    Err(state.fail(err))
                } else {
                    Err(err)
                }
            }
            ok => ok,
        }
    }

    async fn fetch_round(&self, round: RoundId) -> Result<LoadedRound> {
        let global_state = self
            .client
            .fetch_voting_round_global_state(round)
            .await?
            .ok_or(Error::RoundNotFound(round))?;
        let metadata = self
            .client
            .fetch_voting_round_metadata(&global_state.metadata_ipfs_cid)
            .await?
            .ok_or_else(|| {
                Error::MetadataNotFound(global_state.metadata_ipfs_cid.clone())
            })?;
        let snapshot = match &metadata.vote_gating_snapshot_cid {
            Some(cid) => {
                Some(
                    self.client
                        .fetch_voting_snapshot(cid)
                        .await?
                        .ok_or_else(|| Error::SnapshotNotFound(cid.clone()))?,
                )
            }
            None => None,
        };
        Ok(LoadedRound {
            global_state,
            metadata,
            snapshot,
        })
    }

    /// Replaces whatever round was loaded with `round`.
    pub async fn load_round(&self, round: RoundId) -> Result<()> {
        if self.config.is_hidden(round) {
            return Err(Error::HiddenRound(round))
        }
        let generation = {
            let mut state = self.state.write().await;
            state.generation += 1;
            state.clear_round();
            state.round = Some(round);
            state.loading = true;
            state.error = None;
            state.generation
        };
        log::info!("loading voting round {}", round);

        let fetched = self.fetch_round(round).await;
        {
            let mut state = self.state.write().await;
            if state.generation != generation {
                log::debug!("discarding stale load of round {}", round);
                return Err(Error::RoundChanged)
            }
            state.loading = false;
            let loaded = fetched.map_err(|err| state.fail(err))?;
            state.install(round, loaded);
        }

        self.refresh_tallies().await?;
        self.refresh_voter_votes().await?;
        log::info!("loaded voting round {}", round);
        Ok(())
    }

    /// Switches the connected wallet.
    pub async fn set_address(&self, address: Option<Address>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.address = address;
            state.voter_votes = None;
            state.resolve_eligibility();
        }
        self.refresh_voter_votes().await
    }

    pub async fn refresh_tallies(&self) -> Result<()> {
        let (generation, round, metadata) = {
            let state = self.state.read().await;
            let (round, metadata, _) = state.current()?;
            (state.generation, round, metadata)
        };
        let fetched = self.client.fetch_tally_counts(round, &metadata).await;
        let mut state = self.state.write().await;
        if state.generation != generation {
            log::debug!("discarding tallies of stale round {}", round);
            return Ok(())
        }
        let counts = fetched.map_err(|err| state.fail(err))?;
        state.tallies = OptionTallyIndex::from_counts(counts.as_ref());
        Ok(())
    }

    async fn refresh_voter_votes(&self) -> Result<()> {
        let (generation, round, metadata, global_state, address) = {
            let state = self.state.read().await;
            let (round, metadata, global_state) = match state.current() {
                Ok(current) => current,
                Err(_) => return Ok(()),
            };
            let address = match &state.address {
                Some(address) => address.clone(),
                None => return Ok(()),
            };
            (state.generation, round, metadata, global_state, address)
        };
        let fetched = self
            .client
            .fetch_voter_votes(round, &address, &metadata, &global_state)
            .await;
        let mut state = self.state.write().await;
        if state.generation != generation
            || state.address.as_ref() != Some(&address)
        {
            log::debug!("discarding cast votes fetched for {}", address);
            return Ok(())
        }
        state.voter_votes = fetched.map_err(|err| state.fail(err))?;
        Ok(())
    }

    /// Sets a proposal's percentage and returns what was stored.
    ///
    /// A locked proposal can only be lowered.
    pub async fn allocate(
        &self,
        question_id: &str,
        percentage: f64,
    ) -> Result<f64> {
        let mut state = self.state.write().await;
        let metadata = state.metadata.clone().ok_or(Error::NoRoundLoaded)?;
        let question = metadata
            .question(question_id)
            .ok_or_else(|| Error::UnknownQuestion(question_id.to_string()))?;
        let pass_state = question_pass_state(question, &state.tallies);
        let limits = state.ledger.limits(question_id, pass_state);
        let own = state.ledger.percentage(question_id);
        if limits.locked && percentage > own {
            return Err(Error::AllocationLocked(question_id.to_string()))
        }
        state.ledger.allocate(question_id, percentage)
    }

    pub async fn toggle_sort(&self) -> SortMode {
        let mut state = self.state.write().await;
        state.sort = state.sort.toggle();
        state.sort
    }

    pub async fn set_sort(&self, mode: SortMode) {
        self.state.write().await.sort = mode;
    }

    pub async fn toggle_filter(&self, kind: FilterKind, name: &str) {
        self.state.write().await.filters.toggle(kind, name);
    }

    /// Drops every filter and the sort.
    pub async fn clear_filters(&self) {
        let mut state = self.state.write().await;
        state.filters.clear();
        state.sort = SortMode::None;
    }

    pub async fn ordered_questions(&self) -> Result<Vec<QuestionView>> {
        let state = self.state.read().await;
        let metadata = state.metadata.as_ref().ok_or(Error::NoRoundLoaded)?;
        let ordered = order_questions(
            &metadata.questions,
            state.base_order.order(),
            &state.filters,
            state.sort,
            &state.tallies,
        )?;
        let views: Vec<QuestionView> = ordered
            .into_iter()
            .map(|q| {
                QuestionView {
                    question: q.question.clone(),
                    tally: q.tally,
                    pass_state: q.pass_state,
                    allocation: state
                        .ledger
                        .get(&q.question.id)
                        .unwrap_or_default(),
                    allocation_limits: state
                        .ledger
                        .limits(&q.question.id, q.pass_state),
                }
            })
            .collect();
        Ok(views)
    }

    pub async fn status(&self) -> VotingStatus {
        self.status_at(Utc::now()).await
    }

    pub async fn status_at(&self, now: DateTime<Utc>) -> VotingStatus {
        self.state.read().await.status_at(now)
    }

    /// Casts the current allocation as the connected address.
    ///
    /// Tallies are fetched again first; if a proposal holding weight has
    /// passed in the meantime nothing is sent and the new tallies replace the
    /// displayed ones.
    pub async fn submit(&self) -> Result<VoteSubmission> {
        let (generation, round, metadata, ledger, signer, signature) = {
            let state = self.state.read().await;
            if !state.status_at(Utc::now()).can_submit {
                return Err(Error::CannotSubmit)
            }
            let (round, metadata, _) = state.current()?;
            match (&state.address, &state.eligibility.signature) {
                (Some(address), Some(signature)) => {
                    (
                        state.generation,
                        round,
                        metadata,
                        state.ledger.clone(),
                        address.clone(),
                        signature.clone(),
                    )
                }
                _ => return Err(Error::CannotSubmit),
            }
        };

        let fetched = self.client.fetch_tally_counts(round, &metadata).await;
        {
            let mut state = self.state.write().await;
            if state.generation != generation
                || state.address.as_ref() != Some(&signer)
            {
                log::debug!("round or address changed while submitting");
                return Err(Error::RoundChanged)
            }
            let counts = fetched.map_err(|err| state.fail(err))?;
            let fresh = OptionTallyIndex::from_counts(counts.as_ref());
            let guard = check_not_passed(&metadata.questions, &ledger, &fresh);
            if let Err(err) = guard {
                log::warn!("refusing vote of {} in round {}: {}", signer, round, err);
                state.tallies = fresh;
                return Err(state.fail(err))
            }
        }

        let (submission, reconciliation) = build_submission(
            round,
            signer,
            signature,
            &metadata.questions,
            &ledger,
        );
        if !reconciliation.is_exact() {
            log::warn!(
                "submitting {} of {} votes",
                reconciliation.total(),
                ledger.voter_weight().get()
            );
        }
        let submitted = self.client.submit_vote(submission.clone()).await;
        self.record(generation, submitted).await?;
        log::info!("submitted vote of {} in round {}", submission.signer, round);

        self.refresh_tallies().await?;
        self.refresh_voter_votes().await?;
        Ok(submission)
    }

    /// Closes the loaded round as `signer`, then reloads it.
    pub async fn close_round(&self, signer: &Address) -> Result<()> {
        let (generation, (round, metadata, global_state)) = {
            let state = self.state.read().await;
            (state.generation, state.current()?)
        };
        if global_state.has_closed() {
            return Err(Error::RoundClosed(round))
        }
        if metadata.created.by != *signer {
            return Err(Error::NotRoundCreator(round))
        }
        let closed = self.client.close_voting_round(round, signer).await;
        self.record(generation, closed).await?;
        log::info!("closed voting round {}", round);
        self.load_round(round).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        mock::MockClient,
        round::{
            fixtures::question,
            Created,
        },
        snapshot::{
            SnapshotEntry,
            VoterWeight,
        },
        mock::Fetch,
        tally::TallyCount,
    };
    use async_std::task;
    use chrono::TimeZone;

    const ROUND: u64 = 7;
    const METADATA_CID: &str = "metadata";
    const SNAPSHOT_CID: &str = "snapshot";

    fn global_state() -> VotingRoundGlobalState {
        VotingRoundGlobalState {
            start_time: Utc.timestamp_opt(0, 0).unwrap(),
            end_time: Utc.timestamp_opt(4_000_000_000, 0).unwrap(),
            close_time: None,
            metadata_ipfs_cid: METADATA_CID.into(),
        }
    }

    fn metadata() -> VotingRoundMetadata {
        VotingRoundMetadata {
            id: "round".into(),
            title: "xGov".into(),
            description: None,
            information_url: None,
            vote_gating_snapshot_cid: Some(SNAPSHOT_CID.into()),
            questions: vec![
                question("a", 5.0, Some(10)),
                question("b", 1.0, Some(10)),
                question("c", 3.0, Some(10)),
            ],
            created: Created {
                by: "CREATOR".into(),
                at: None,
            },
        }
    }

    fn snapshot() -> VoteGatingSnapshot {
        VoteGatingSnapshot {
            title: None,
            snapshot: vec![
                SnapshotEntry {
                    address: "VOTER".into(),
                    signature: "sig".into(),
                    weight: Some(7.0),
                },
                SnapshotEntry {
                    address: "CREATOR".into(),
                    signature: "creator-sig".into(),
                    weight: None,
                },
            ],
        }
    }

    fn counts(counts: &[(&str, u64)]) -> Vec<TallyCount> {
        counts
            .iter()
            .map(|(id, count)| {
                TallyCount {
                    option_id: id.to_string(),
                    count: *count,
                }
            })
            .collect()
    }

    async fn session(config: Config) -> VoteSession<MockClient> {
        let _ = env_logger::try_init();
        let client = MockClient::new();
        client
            .insert_round(
                RoundId::new(ROUND),
                global_state(),
                metadata(),
                Some(snapshot()),
            )
            .await;
        VoteSession::with_rng(client, config, StdRng::seed_from_u64(3))
    }

    async fn loaded_as(address: &str) -> VoteSession<MockClient> {
        let session = session(Config::default()).await;
        session.set_address(Some(address.into())).await.unwrap();
        session.load_round(RoundId::new(ROUND)).await.unwrap();
        session
    }

    #[async_std::test]
    async fn loading_resolves_eligibility_and_resets_allocations() {
        let session = loaded_as("VOTER").await;
        let eligibility = session.eligibility().await;
        assert!(eligibility.eligible);
        assert_eq!(eligibility.signature.as_deref(), Some("sig"));
        assert_eq!(eligibility.weight, VoterWeight::new(7));

        let ledger = session.ledger().await;
        assert_eq!(ledger.weights().len(), 3);
        assert_eq!(ledger.total_percentage(), 0.0);
        assert_eq!(ledger.voter_weight(), VoterWeight::new(7));
        assert!(!session.is_loading().await);

        let status = session.status().await;
        assert!(status.can_vote);
        assert!(!status.can_submit);
        assert!(!status.is_creator);
    }

    #[async_std::test]
    async fn hidden_and_missing_rounds() {
        let config = Config::from_hidden_list("7").unwrap();
        let session = session(config).await;
        let err = session.load_round(RoundId::new(ROUND)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(session.round().await.is_none());

        let session = session_default().await;
        let err = session.load_round(RoundId::new(99)).await.unwrap_err();
        assert!(matches!(err, Error::RoundNotFound(_)));
        assert_eq!(
            session.error().await.as_deref(),
            Some("Could not retrieve voting round global state with appId: 99")
        );
        assert!(!session.is_loading().await);
    }

    async fn session_default() -> VoteSession<MockClient> {
        session(Config::default()).await
    }

    #[async_std::test]
    async fn switching_address_rescales_weights() {
        let session = loaded_as("VOTER").await;
        session.allocate("a", 50.0).await.unwrap();
        assert_eq!(session.ledger().await.weight("a"), 4);

        session.set_address(Some("CREATOR".into())).await.unwrap();
        let ledger = session.ledger().await;
        assert_eq!(ledger.percentage("a"), 50.0);
        assert_eq!(ledger.weight("a"), 1);
        assert!(session.status().await.is_creator);

        session.set_address(Some("STRANGER".into())).await.unwrap();
        let eligibility = session.eligibility().await;
        assert!(!eligibility.eligible);
        assert_eq!(eligibility.signature, None);
        assert_eq!(session.ledger().await.weight("a"), 0);
        assert!(!session.status().await.can_vote);
    }

    #[async_std::test]
    async fn passed_and_full_allocations_lock_inputs() {
        let session = loaded_as("VOTER").await;
        session
            .client()
            .set_tally_counts(RoundId::new(ROUND), counts(&[("b-yes", 10)]))
            .await;
        session.refresh_tallies().await.unwrap();
        assert!(matches!(
            session.allocate("b", 10.0).await,
            Err(Error::AllocationLocked(_))
        ));
        assert!(matches!(
            session.allocate("zz", 10.0).await,
            Err(Error::UnknownQuestion(_))
        ));

        assert_eq!(session.allocate("a", 100.0).await.unwrap(), 100.0);
        assert!(matches!(
            session.allocate("c", 10.0).await,
            Err(Error::AllocationLocked(_))
        ));
        // the holder of the full allocation can still give some back
        assert_eq!(session.allocate("a", 60.0).await.unwrap(), 60.0);
        assert_eq!(session.allocate("c", 90.0).await.unwrap(), 40.0);
    }

    #[async_std::test]
    async fn submits_reconciled_weights() {
        let session = loaded_as("VOTER").await;
        session.allocate("a", 50.0).await.unwrap();
        assert!(matches!(session.submit().await, Err(Error::CannotSubmit)));
        session.allocate("c", 50.0).await.unwrap();
        assert!(session.status().await.can_submit);

        let submission = session.submit().await.unwrap();
        assert_eq!(submission.signature, "sig");
        assert_eq!(submission.signer, Address::new("VOTER"));
        assert_eq!(submission.weightings, vec![3, 0, 4]);
        assert_eq!(submission.weighting, 7);
        assert_eq!(session.client().submissions().await.len(), 1);

        let status = session.status().await;
        assert!(status.has_voted);
        assert!(!status.can_submit);
        let views = session.ordered_questions().await.unwrap();
        let a = views.iter().find(|v| v.question.id == "a").unwrap();
        assert_eq!(a.tally, 3);
    }

    #[async_std::test]
    async fn refuses_a_proposal_that_passed_before_submitting() {
        let session = loaded_as("VOTER").await;
        session.allocate("a", 50.0).await.unwrap();
        session.allocate("b", 50.0).await.unwrap();

        // another voter pushes `b` over its threshold
        session
            .client()
            .set_tally_counts(RoundId::new(ROUND), counts(&[("b-yes", 12)]))
            .await;
        let fetches = session.client().tally_fetches().await;
        match session.submit().await {
            Err(Error::AlreadyPassed(ids)) => assert_eq!(ids, vec!["b"]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(session.client().tally_fetches().await, fetches + 1);
        assert!(session.client().submissions().await.is_empty());
        assert!(session.error().await.unwrap().contains("already passed"));

        let views = session.ordered_questions().await.unwrap();
        let last = views.last().unwrap();
        assert_eq!(last.question.id, "b");
        assert!(last.pass_state.passed);
        assert!(last.allocation_limits.locked);
    }

    #[async_std::test]
    async fn moving_weight_off_a_passed_proposal() {
        let session = loaded_as("VOTER").await;
        session.allocate("a", 50.0).await.unwrap();
        session.allocate("b", 50.0).await.unwrap();
        session
            .client()
            .set_tally_counts(RoundId::new(ROUND), counts(&[("b-yes", 12)]))
            .await;
        assert!(matches!(
            session.submit().await,
            Err(Error::AlreadyPassed(_))
        ));

        assert!(matches!(
            session.allocate("b", 60.0).await,
            Err(Error::AllocationLocked(_))
        ));
        assert_eq!(session.allocate("b", 0.0).await.unwrap(), 0.0);
        assert_eq!(session.allocate("a", 100.0).await.unwrap(), 100.0);
        assert!(matches!(
            session.allocate("b", 10.0).await,
            Err(Error::AllocationLocked(_))
        ));

        let submission = session.submit().await.unwrap();
        assert_eq!(submission.weightings, vec![7, 0, 0]);
        assert_eq!(session.client().submissions().await.len(), 1);
    }

    #[async_std::test]
    async fn transient_failures_keep_the_last_tallies() {
        let session = loaded_as("VOTER").await;
        session
            .client()
            .set_tally_counts(RoundId::new(ROUND), counts(&[("a-yes", 4)]))
            .await;
        session.refresh_tallies().await.unwrap();

        session.client().fail_tally_fetches(Some("timeout")).await;
        let err = session.refresh_tallies().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert_eq!(session.error().await.as_deref(), Some("Unexpected error"));
        let views = session.ordered_questions().await.unwrap();
        let a = views.iter().find(|v| v.question.id == "a").unwrap();
        assert_eq!(a.tally, 4);
    }

    #[async_std::test]
    async fn base_order_survives_sorting_and_filtering() {
        let session = loaded_as("VOTER").await;
        let ids = |views: Vec<QuestionView>| -> Vec<String> {
            views.into_iter().map(|v| v.question.id).collect()
        };
        let first = ids(session.ordered_questions().await.unwrap());
        assert_eq!(first.len(), 3);

        assert_eq!(session.toggle_sort().await, SortMode::Ascending);
        assert_eq!(
            ids(session.ordered_questions().await.unwrap()),
            vec!["b", "c", "a"]
        );
        session.toggle_filter(FilterKind::Category, "Education").await;
        assert!(session.ordered_questions().await.unwrap().is_empty());

        session.clear_filters().await;
        assert_eq!(session.sort_mode().await, SortMode::None);
        assert_eq!(ids(session.ordered_questions().await.unwrap()), first);
    }

    #[async_std::test]
    async fn only_the_creator_closes_a_round() {
        let session = loaded_as("VOTER").await;
        let err = session.close_round(&"VOTER".into()).await.unwrap_err();
        assert!(matches!(err, Error::NotRoundCreator(_)));

        session.set_address(Some("CREATOR".into())).await.unwrap();
        assert!(session.status().await.can_close);
        session.close_round(&"CREATOR".into()).await.unwrap();
        let status = session.status().await;
        assert!(status.has_closed);
        assert!(!status.can_close);
        assert!(matches!(
            session.close_round(&"CREATOR".into()).await,
            Err(Error::RoundClosed(_))
        ));
    }

    #[async_std::test]
    async fn voting_window() {
        let session = loaded_as("VOTER").await;
        let before = session.status_at(Utc.timestamp_opt(-1, 0).unwrap()).await;
        assert!(!before.has_started);
        assert!(!before.can_vote);
        let after = session
            .status_at(Utc.timestamp_opt(4_000_000_001, 0).unwrap())
            .await;
        assert!(after.has_ended);
        assert!(!after.can_vote);
    }

    async fn tally_of(session: &VoteSession<MockClient>, id: &str) -> u64 {
        session
            .ordered_questions()
            .await
            .unwrap()
            .into_iter()
            .find(|v| v.question.id == id)
            .map(|v| v.tally)
            .unwrap()
    }

    #[async_std::test]
    async fn a_superseded_load_changes_nothing() {
        let session = Arc::new(session_default().await);
        session
            .client()
            .insert_round(
                RoundId::new(8),
                global_state(),
                metadata(),
                Some(snapshot()),
            )
            .await;

        let gate = session.client().hold(Fetch::GlobalState).await;
        let stale = task::spawn({
            let session = session.clone();
            async move { session.load_round(RoundId::new(ROUND)).await }
        });
        gate.started().await;
        session.load_round(RoundId::new(8)).await.unwrap();
        gate.release().await;

        assert!(matches!(stale.await, Err(Error::RoundChanged)));
        assert_eq!(session.round().await, Some(RoundId::new(8)));
        assert!(session.metadata().await.is_some());
        assert!(!session.is_loading().await);
        assert_eq!(session.error().await, None);
    }

    #[async_std::test]
    async fn tallies_of_an_earlier_load_are_dropped() {
        let session = Arc::new(loaded_as("VOTER").await);
        let round = RoundId::new(ROUND);
        session
            .client()
            .set_tally_counts(round, counts(&[("a-yes", 2)]))
            .await;
        session.refresh_tallies().await.unwrap();

        for failure in &[None, Some("timeout")] {
            let gate = session.client().hold(Fetch::Tallies).await;
            let stale = task::spawn({
                let session = session.clone();
                async move { session.refresh_tallies().await }
            });
            gate.started().await;
            session.load_round(round).await.unwrap();
            session
                .client()
                .set_tally_counts(round, counts(&[("a-yes", 9)]))
                .await;
            session.client().fail_tally_fetches(*failure).await;
            gate.release().await;
            stale.await.unwrap();

            assert_eq!(tally_of(&session, "a").await, 2);
            assert_eq!(session.error().await, None);

            session.client().fail_tally_fetches(None).await;
            session
                .client()
                .set_tally_counts(round, counts(&[("a-yes", 2)]))
                .await;
        }
    }

    #[async_std::test]
    async fn cast_votes_of_a_previous_address_are_dropped() {
        let session = Arc::new(loaded_as("CREATOR").await);
        session
            .client()
            .set_voter_votes(
                RoundId::new(ROUND),
                "VOTER".into(),
                vec!["a-yes".into()],
            )
            .await;

        let gate = session.client().hold(Fetch::VoterVotes).await;
        let stale = task::spawn({
            let session = session.clone();
            async move { session.set_address(Some("VOTER".into())).await }
        });
        gate.started().await;
        session.set_address(Some("STRANGER".into())).await.unwrap();
        gate.release().await;
        stale.await.unwrap();

        assert_eq!(session.address().await, Some("STRANGER".into()));
        assert_eq!(session.voter_votes().await, None);
        assert!(!session.status().await.has_voted);
    }

    #[async_std::test]
    async fn switching_address_during_submit_sends_nothing() {
        let session = Arc::new(loaded_as("VOTER").await);
        session.allocate("a", 100.0).await.unwrap();

        let gate = session.client().hold(Fetch::Tallies).await;
        let submit = task::spawn({
            let session = session.clone();
            async move { session.submit().await }
        });
        gate.started().await;
        session.set_address(Some("CREATOR".into())).await.unwrap();
        gate.release().await;

        assert!(matches!(submit.await, Err(Error::RoundChanged)));
        assert!(session.client().submissions().await.is_empty());
        assert_eq!(session.error().await, None);
    }
}
