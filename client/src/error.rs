use crate::round::{
    QuestionId,
    RoundId,
};
use thiserror::Error;

/// Broad classes the caller reacts to differently.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Bad user input or a forbidden round id; entry is blocked rather than
    /// reported.
    Configuration,
    /// Round state, metadata or snapshot missing.
    NotFound,
    /// A question's metadata does not carry the expected fields.
    InvalidMetadata,
    /// A submission was refused before anything was sent.
    Blocked,
    /// Anything else raised while talking to a collaborator.
    Transient,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("The app id must be defined")]
    MissingRoundId,
    #[error("Invalid voting round id: {0}")]
    InvalidRoundId(String),
    #[error("Voting round {0} is hidden")]
    HiddenRound(RoundId),
    #[error("Unknown sort mode {0}, expected none, ascending or descending")]
    UnknownSortMode(String),
    #[error("Could not retrieve voting round global state with appId: {0}")]
    RoundNotFound(RoundId),
    #[error("Could not retrieve voting round metadata with cid: {0}")]
    MetadataNotFound(String),
    #[error("Could not retrieve voting snapshot with cid: {0}")]
    SnapshotNotFound(String),
    #[error("Invalid metadata: question {question} has no valid {field}")]
    InvalidMetadata {
        question: QuestionId,
        field: &'static str,
    },
    #[error("Unknown question {0}")]
    UnknownQuestion(QuestionId),
    #[error("Allocation for question {0} is locked")]
    AllocationLocked(QuestionId),
    #[error(
        "You are trying to vote for a proposal that has already passed. \
         Please reallocate your votes."
    )]
    AlreadyPassed(Vec<QuestionId>),
    #[error("Vote cannot be submitted yet")]
    CannotSubmit,
    #[error("Only the round creator can close voting round {0}")]
    NotRoundCreator(RoundId),
    #[error("Voting round {0} is already closed")]
    RoundClosed(RoundId),
    #[error("No voting round is loaded")]
    NoRoundLoaded,
    #[error("Voting round changed while the vote was being prepared")]
    RoundChanged,
    #[error("Invalid cid {0}")]
    InvalidCid(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Collaborator(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingRoundId
            | Error::InvalidRoundId(_)
            | Error::HiddenRound(_)
            | Error::UnknownSortMode(_) => ErrorKind::Configuration,
            Error::RoundNotFound(_)
            | Error::MetadataNotFound(_)
            | Error::SnapshotNotFound(_) => ErrorKind::NotFound,
            Error::InvalidMetadata { .. } => ErrorKind::InvalidMetadata,
            Error::UnknownQuestion(_)
            | Error::AllocationLocked(_)
            | Error::AlreadyPassed(_)
            | Error::CannotSubmit
            | Error::NotRoundCreator(_)
            | Error::RoundClosed(_)
            | Error::NoRoundLoaded
            | Error::RoundChanged => ErrorKind::Blocked,
            Error::InvalidCid(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Collaborator(_) => ErrorKind::Transient,
        }
    }

    /// Text to show the user, `None` when the caller should block entry
    /// instead of displaying anything.
    pub fn display_message(&self) -> Option<String> {
        match self.kind() {
            ErrorKind::Configuration => None,
            ErrorKind::Transient => {
                log::error!("{}", self);
                Some("Unexpected error".to_string())
            }
            _ => Some(self.to_string()),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
