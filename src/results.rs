//! Vote tally aggregation
//!
//! This module turns a poll's raw vote sets into the display-ready
//! summary that clients render: per-option counts and integer
//! percentages plus the overall total. Summaries are derived on demand
//! and never stored; the poll remains the single source of truth.

use serde::Serialize;

use super::poll::{Poll, Status};

/// The tally for a single answer option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    /// The option's stable positional identifier
    pub id: usize,
    /// The display text of the option
    pub text: String,
    /// Number of votes the option received
    pub votes: usize,
    /// Share of the total vote, rounded to a whole percent
    pub percentage: u8,
}

/// A display-ready snapshot of a poll's results
///
/// Computed from the current poll on every accepted vote and once more
/// at termination. Percentages are rounded independently per option, so
/// a three-way split may not sum to exactly 100; clients accept this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// The poll the summary was computed from
    pub id: super::poll::Id,
    /// The question text
    pub question: String,
    /// Per-option tallies, in option order
    pub options: Vec<OptionTally>,
    /// Total number of accepted votes across all options
    pub total_votes: usize,
    /// The poll's lifecycle state at the time of the snapshot
    pub status: Status,
}

impl Summary {
    /// Computes the result summary of a poll
    ///
    /// Pure with respect to the poll: no state is mutated or retained.
    /// With zero votes every option reports 0%.
    pub fn of(poll: &Poll) -> Self {
        let total_votes: usize = poll.options().iter().map(|option| option.votes().len()).sum();

        Self {
            id: poll.id(),
            question: poll.question().to_owned(),
            options: poll
                .options()
                .iter()
                .map(|option| {
                    let votes = option.votes().len();
                    OptionTally {
                        id: option.id(),
                        text: option.text().to_owned(),
                        votes,
                        percentage: if total_votes == 0 {
                            0
                        } else {
                            ((votes as f64 / total_votes as f64) * 100.0).round() as u8
                        },
                    }
                })
                .collect(),
            total_votes,
            status: poll.status(),
        }
    }
}
