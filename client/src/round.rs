//! Voting round data as published by the round creator.
//!
//! The engine only ever reads these types. They are created on chain and in
//! the metadata store and arrive here through a
//! [`VotingRoundClient`](crate::VotingRoundClient).

use crate::error::Error;
use chrono::{
    DateTime,
    Utc,
};
use core::{
    fmt,
    str::FromStr,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

pub type QuestionId = String;
pub type OptionId = String;

/// On-chain application id of a voting round.
#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize,
    Serialize,
)]
#[serde(transparent)]
pub struct RoundId(u64);

impl RoundId {
    pub fn new(id: u64) -> Self {
        RoundId(id)
    }
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RoundId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::MissingRoundId)
        }
        match s.parse::<u64>() {
            Ok(0) => Err(Error::MissingRoundId),
            Ok(id) => Ok(RoundId(id)),
            Err(_) => Err(Error::InvalidRoundId(s.to_string())),
        }
    }
}

/// Wallet address, compared byte for byte.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Address(address.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

/// Round state held by the voting application.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct VotingRoundGlobalState {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end_time: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub close_time: Option<DateTime<Utc>>,
    pub metadata_ipfs_cid: String,
}

impl VotingRoundGlobalState {
    pub fn has_vote_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time
    }
    pub fn has_vote_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }
    pub fn has_closed(&self) -> bool {
        self.close_time.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Created {
    pub by: Address,
    #[serde(default)]
    pub at: Option<String>,
}

/// Round description fetched from the metadata store.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingRoundMetadata {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub information_url: Option<String>,
    #[serde(default)]
    pub vote_gating_snapshot_cid: Option<String>,
    pub questions: Vec<Question>,
    pub created: Created,
}

impl VotingRoundMetadata {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<QuestionMetadata>,
    pub options: Vec<QuestionOption>,
}

impl Question {
    /// Only the first option carries a tally.
    pub fn primary_option(&self) -> Option<&QuestionOption> {
        self.options.first()
    }

    /// Anything but a finite number counts as no threshold.
    pub fn threshold(&self) -> Option<f64> {
        self.metadata
            .as_ref()
            .and_then(|m| m.threshold.as_ref())
            .and_then(Value::as_f64)
            .filter(|threshold| threshold.is_finite())
    }

    pub fn category(&self) -> Result<&str, Error> {
        self.metadata
            .as_ref()
            .and_then(|m| m.category.as_ref())
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid("category"))
    }

    pub fn focus_area(&self) -> Result<&str, Error> {
        self.metadata
            .as_ref()
            .and_then(|m| m.focus_area.as_ref())
            .and_then(Value::as_str)
            .ok_or_else(|| self.invalid("focus_area"))
    }

    pub fn ask(&self) -> Result<f64, Error> {
        self.metadata
            .as_ref()
            .and_then(|m| m.ask.as_ref())
            .and_then(Value::as_f64)
            .filter(|ask| !ask.is_nan())
            .ok_or_else(|| self.invalid("ask"))
    }

    fn invalid(&self, field: &'static str) -> Error {
        Error::InvalidMetadata {
            question: self.id.clone(),
            field,
        }
    }
}

/// Free form metadata written by the round creator. Fields are kept as raw
/// JSON so a badly typed field only fails the question that carries it, when
/// the typed accessors on [`Question`] are used.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct QuestionMetadata {
    #[serde(default)]
    pub category: Option<Value>,
    #[serde(default)]
    pub focus_area: Option<Value>,
    #[serde(default)]
    pub link: Option<Value>,
    #[serde(default)]
    pub threshold: Option<Value>,
    #[serde(default)]
    pub ask: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct QuestionOption {
    pub id: OptionId,
    pub label: String,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn question(id: &str, ask: f64, threshold: Option<u64>) -> Question {
        Question {
            id: id.to_string(),
            prompt: format!("Proposal {}", id),
            description: None,
            metadata: Some(QuestionMetadata {
                category: Some("Tools".into()),
                focus_area: Some("DeFi".into()),
                link: None,
                threshold: threshold.map(Value::from),
                ask: Some(ask.into()),
            }),
            options: vec![QuestionOption {
                id: format!("{}-yes", id),
                label: "Yes".to_string(),
            }],
        }
    }
}
