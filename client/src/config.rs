use crate::{
    error::Result,
    round::RoundId,
};

pub const HIDDEN_ROUND_IDS_VAR: &str = "XGOV_HIDDEN_VOTING_ROUND_IDS";

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    /// Rounds that must not be opened.
    pub hidden_round_ids: Vec<RoundId>,
}

impl Config {
    /// Reads the hidden round list from the environment. An unset variable
    /// hides nothing.
    pub fn from_env() -> Result<Self> {
        match std::env::var(HIDDEN_ROUND_IDS_VAR) {
            Ok(ids) => Self::from_hidden_list(&ids),
            Err(_) => Ok(Config::default()),
        }
    }

    /// Parses a comma separated list of round ids.
    pub fn from_hidden_list(ids: &str) -> Result<Self> {
        let hidden_round_ids = ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<RoundId>>>()?;
        Ok(Config { hidden_round_ids })
    }

    pub fn is_hidden(&self, round: RoundId) -> bool {
        self.hidden_round_ids.contains(&round)
    }
}
