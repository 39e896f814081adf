mod allocation;
mod client;
mod config;
mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod ordering;
mod reconcile;
mod round;
mod session;
mod snapshot;
mod store;
mod submit;
mod tally;
mod threshold;

pub use allocation::{
    Allocation,
    AllocationLedger,
    AllocationLimits,
    FULL_ALLOCATION,
};
pub use client::VotingRoundClient;
pub use config::{
    Config,
    HIDDEN_ROUND_IDS_VAR,
};
pub use error::{
    Error,
    ErrorKind,
    Result,
};
#[cfg(any(test, feature = "mock"))]
pub use mock::{
    Fetch,
    FetchGate,
    MockClient,
};
pub use ordering::{
    order_questions,
    shuffled_indices,
    BaseOrder,
    FilterItem,
    FilterKind,
    FilterSet,
    OrderKey,
    OrderedQuestion,
    SortMode,
};
pub use reconcile::{
    reconcile,
    Reconciliation,
};
pub use round::{
    Address,
    Created,
    OptionId,
    Question,
    QuestionId,
    QuestionMetadata,
    QuestionOption,
    RoundId,
    VotingRoundGlobalState,
    VotingRoundMetadata,
};
pub use session::{
    QuestionView,
    VoteSession,
    VotingStatus,
};
pub use snapshot::{
    resolve_eligibility,
    Eligibility,
    SnapshotEntry,
    VoteGatingSnapshot,
    VoterWeight,
};
pub use store::LocalStore;
pub use submit::{
    build_submission,
    check_not_passed,
    VoteSubmission,
};
pub use tally::{
    add_to_tally,
    OptionTallyIndex,
    TallyCount,
    TallyCounts,
};
pub use threshold::{
    question_pass_state,
    question_tally,
    PassState,
};
