//! Display order of a round's proposals.
//!
//! A random base order is drawn once per round, then on every render the
//! list is filtered by category / focus area, optionally sorted by ask, and
//! finally passed proposals are moved to the bottom. Both sorts are stable.

use crate::{
    error::{
        Error,
        Result,
    },
    round::{
        Question,
        RoundId,
    },
    tally::OptionTallyIndex,
    threshold::{
        question_pass_state,
        question_tally,
        PassState,
    },
};
use core::{
    cmp::Ordering,
    fmt,
    str::FromStr,
};
use rand::Rng;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SortMode {
    None,
    Ascending,
    Descending,
}

impl Default for SortMode {
    fn default() -> Self {
        SortMode::None
    }
}

impl SortMode {
    /// Cycles between ascending and descending. Only a clear goes back to
    /// `None`.
    pub fn toggle(self) -> Self {
        match self {
            SortMode::Ascending => SortMode::Descending,
            SortMode::None | SortMode::Descending => SortMode::Ascending,
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortMode::None => "none",
            SortMode::Ascending => "ascending",
            SortMode::Descending => "descending",
        })
    }
}

impl FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(SortMode::None),
            "ascending" | "asc" => Ok(SortMode::Ascending),
            "descending" | "desc" => Ok(SortMode::Descending),
            other => Err(Error::UnknownSortMode(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterKind {
    Category,
    Focus,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterItem {
    pub kind: FilterKind,
    pub name: String,
}

impl FilterItem {
    fn matches(&self, category: &str, focus_area: &str) -> bool {
        match self.kind {
            FilterKind::Category => self.name == category,
            FilterKind::Focus => self.name == focus_area,
        }
    }
}

/// Active filter chips.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FilterSet(Vec<FilterItem>);

impl FilterSet {
    /// Adds the filter, or removes the active one carrying the same name.
    pub fn toggle(&mut self, kind: FilterKind, name: &str) {
        match self.0.iter().position(|item| item.name == name) {
            Some(pos) => {
                self.0.remove(pos);
            }
            None => {
                self.0.push(FilterItem {
                    kind,
                    name: name.to_string(),
                })
            }
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn items(&self) -> &[FilterItem] {
        &self.0
    }

    /// Fails on a question without a category or focus area, whether or not
    /// any filter is active.
    pub fn matches(&self, question: &Question) -> Result<bool> {
        let category = question.category()?;
        let focus_area = question.focus_area()?;
        Ok(self.0.is_empty()
            || self.0.iter().any(|item| item.matches(category, focus_area)))
    }
}

/// Fisher-Yates shuffle of `0..len`.
pub fn shuffled_indices<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Vec<usize> {
    let mut order: Vec<usize> = (0..len).collect();
    for i in (1..len).rev() {
        let j = rng.gen_range(0..=i);
        order.swap(i, j);
    }
    order
}

/// Identifies one load of a round's question list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderKey {
    pub round: RoundId,
    pub metadata_cid: String,
}

/// Random base order, redrawn only when the round's question list changes.
#[derive(Clone, Debug, Default)]
pub struct BaseOrder {
    key: Option<OrderKey>,
    order: Vec<usize>,
}

impl BaseOrder {
    pub fn get_or_shuffle<R: Rng + ?Sized>(
        &mut self,
        key: &OrderKey,
        len: usize,
        rng: &mut R,
    ) -> &[usize] {
        if self.key.as_ref() != Some(key) || self.order.len() != len {
            log::debug!("drawing base order for round {}", key.round);
            self.order = shuffled_indices(len, rng);
            self.key = Some(key.clone());
        }
        &self.order
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn clear(&mut self) {
        self.key = None;
        self.order.clear();
    }
}

/// A question with its derived tally state, in display position.
#[derive(Clone, Copy, Debug)]
pub struct OrderedQuestion<'a> {
    pub question: &'a Question,
    pub tally: u64,
    pub pass_state: PassState,
}

pub fn order_questions<'a>(
    questions: &'a [Question],
    base_order: &[usize],
    filters: &FilterSet,
    mode: SortMode,
    tallies: &OptionTallyIndex,
) -> Result<Vec<OrderedQuestion<'a>>> {
    let mut ordered = Vec::with_capacity(questions.len());
    for question in base_order.iter().filter_map(|i| questions.get(*i)) {
        if filters.matches(question)? {
            ordered.push(OrderedQuestion {
                question,
                tally: question_tally(question, tallies),
                pass_state: question_pass_state(question, tallies),
            });
        }
    }

    if mode != SortMode::None {
        let mut keyed = ordered
            .into_iter()
            .map(|q| q.question.ask().map(|ask| (ask, q)))
            .collect::<Result<Vec<_>>>()?;
        keyed.sort_by(|(a, _), (b, _)| {
            match mode {
                SortMode::Descending => b.total_cmp(a),
                _ => a.total_cmp(b),
            }
        });
        ordered = keyed.into_iter().map(|(_, q)| q).collect();
    }

    ordered.sort_by(|a, b| pin_passed(a.pass_state, b.pass_state));
    Ok(ordered)
}

fn pin_passed(a: PassState, b: PassState) -> Ordering {
    a.passed.cmp(&b.passed)
}
