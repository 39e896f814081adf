use thiserror::Error;
use xgov_client::RoundId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}", user_message(.0))]
    Client(#[from] xgov_client::Error),

    #[error("Failed to find data dir. Use `--path` to supply a suitable directory.")]
    DataDirNotFound,
    #[error("Invalid allocation `{0}`, expected <question>=<percentage>.")]
    InvalidAllocation(String),
    #[error("Voting round {0} is not available.")]
    RoundUnavailable(RoundId),
}

/// Configuration errors carry no display text, so their own text is used.
fn user_message(err: &xgov_client::Error) -> String {
    err.display_message().unwrap_or_else(|| err.to_string())
}

pub type Result<T> = core::result::Result<T, Error>;
