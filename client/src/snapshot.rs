//! Snapshot based eligibility.

use crate::round::Address;
use serde::{
    Deserialize,
    Serialize,
};

/// Voting capacity of a voter.
#[derive(
    Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct VoterWeight(u64);

impl VoterWeight {
    pub const ZERO: VoterWeight = VoterWeight(0);
    pub const ONE: VoterWeight = VoterWeight(1);

    pub fn new(weight: u64) -> Self {
        VoterWeight(weight)
    }
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Signed allow list published for a gated round.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct VoteGatingSnapshot {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub snapshot: Vec<SnapshotEntry>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SnapshotEntry {
    pub address: Address,
    pub signature: String,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl SnapshotEntry {
    /// Weight granted by this entry. Anything that is not a finite positive
    /// number grants a single vote.
    pub fn voter_weight(&self) -> VoterWeight {
        match self.weight {
            Some(w) if w.is_finite() && w > 0.0 => {
                VoterWeight((w.round() as u64).max(1))
            }
            _ => VoterWeight::ONE,
        }
    }
}

/// What the current voter may do in the current round.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Eligibility {
    pub eligible: bool,
    pub signature: Option<String>,
    pub weight: VoterWeight,
}

impl Eligibility {
    pub fn ineligible() -> Self {
        Eligibility::default()
    }
}

/// Looks the voter up in the snapshot. The first entry for an address wins.
pub fn resolve_eligibility(
    snapshot: Option<&VoteGatingSnapshot>,
    voter: Option<&Address>,
) -> Eligibility {
    let (snapshot, voter) = match (snapshot, voter) {
        (Some(snapshot), Some(voter)) => (snapshot, voter),
        _ => return Eligibility::ineligible(),
    };
    snapshot
        .snapshot
        .iter()
        .find(|entry| entry.address == *voter)
        .map(|entry| {
            Eligibility {
                eligible: true,
                signature: Some(entry.signature.clone()),
                weight: entry.voter_weight(),
            }
        })
        .unwrap_or_else(Eligibility::ineligible)
}
