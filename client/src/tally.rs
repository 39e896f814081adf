use crate::round::OptionId;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;

#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyCount {
    pub option_id: OptionId,
    pub count: u64,
}

/// Counts as returned by a single fetch. Never edited in place.
pub type TallyCounts = Vec<TallyCount>;

/// Per option lookup built from one [`TallyCounts`] fetch.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OptionTallyIndex(HashMap<OptionId, u64>);

impl OptionTallyIndex {
    /// A later record for the same option replaces an earlier one.
    pub fn from_counts(counts: Option<&TallyCounts>) -> Self {
        let counts = match counts {
            Some(counts) => counts,
            None => return OptionTallyIndex::default(),
        };
        OptionTallyIndex(
            counts
                .iter()
                .map(|c| (c.option_id.clone(), c.count))
                .collect(),
        )
    }

    pub fn count(&self, option_id: &str) -> u64 {
        self.0.get(option_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of every tallied option.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}

/// Adds `amount` to the option's record, appending one if it has none yet.
pub fn add_to_tally(counts: &mut TallyCounts, option_id: &str, amount: u64) {
    match counts.iter_mut().find(|c| c.option_id == option_id) {
        Some(record) => record.count += amount,
        None => {
            counts.push(TallyCount {
                option_id: option_id.to_string(),
                count: amount,
            })
        }
    }
}
