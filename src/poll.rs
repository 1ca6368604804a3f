//! Poll data model and lifecycle
//!
//! This module defines the poll itself: its identifier, its ordered
//! answer options, its vote sets, and the small state machine it moves
//! through (`Created` → `Active` → `Ended`). The surrounding classroom
//! decides *when* transitions happen; this module guarantees they only
//! happen from valid states.

use std::{collections::HashSet, fmt::Display, str::FromStr, time::Duration};

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;
use web_time::SystemTime;

use super::roster::SessionId;

/// A unique identifier for a poll
///
/// Generated when the poll is created and carried on every result
/// snapshot and deadline alarm derived from it, so late timer firings
/// can be matched against the poll they belong to.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random poll ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random poll ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an ID from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The lifecycle state of a poll
///
/// A poll starts out `Created`, becomes `Active` once the teacher starts
/// it, and is `Ended` by the deadline, by the teacher, or by every
/// connected student having answered, whichever happens first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The poll exists but voting has not opened yet
    Created,
    /// Voting is open and the deadline is running
    Active,
    /// Voting is closed; the poll is part of history
    Ended,
}

/// Errors reported back to the requesting teacher
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A poll is currently collecting votes; it must end before a new
    /// one can be created
    #[error("a poll is currently active")]
    PollActive,
}

/// A single answer option within a poll
///
/// Option identity is its 0-based position in the poll's option list;
/// options are immutable once the poll is created. Votes are a set of
/// student session IDs, so a student can never be counted twice for the
/// same option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOption {
    /// The option's stable positional identifier
    id: usize,
    /// The display text of the option
    text: String,
    /// Session IDs of the students who picked this option
    votes: HashSet<SessionId>,
}

impl PollOption {
    /// The option's stable positional identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// The display text of the option
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The set of students who picked this option
    pub fn votes(&self) -> &HashSet<SessionId> {
        &self.votes
    }
}

type ValidationResult = garde::Result;

/// Validates that a question is non-empty after trimming and within the
/// configured length bound
fn validate_question(value: &str, _context: &()) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(garde::Error::new("question cannot be empty"));
    }
    if value.len() > crate::constants::poll::MAX_QUESTION_LENGTH {
        return Err(garde::Error::new(format!(
            "question is longer than {} characters",
            crate::constants::poll::MAX_QUESTION_LENGTH
        )));
    }
    Ok(())
}

/// A teacher's request to create a new poll
///
/// Option texts are deliberately not deduplicated or checked for
/// emptiness; the legacy clients send whatever the teacher typed and the
/// options render by position. A missing or zero time limit falls back
/// to the default at construction time.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRequest {
    /// The question to put to the students
    #[garde(custom(validate_question))]
    pub question: String,
    /// The answer options, in display order
    #[garde(length(min = 1, max = crate::constants::poll::MAX_OPTION_COUNT))]
    pub options: Vec<String>,
    /// Voting window in seconds; `None` or `0` selects the default
    #[garde(skip)]
    pub time_limit: Option<u64>,
}

/// One question-with-options unit subject to a single voting window
///
/// The poll owns its vote tallies. It moves through the `Status` state
/// machine exactly once and is pushed into the session history when it
/// ends.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poll {
    /// Unique identifier generated at creation
    id: Id,
    /// The question text
    question: String,
    /// The ordered answer options with their vote sets
    options: Vec<PollOption>,
    /// Length of the voting window
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    time_limit: Duration,
    /// Current lifecycle state
    status: Status,
    /// When the poll was created
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    created_at: SystemTime,
    /// When voting opened, unset until the poll is started
    #[serde_as(as = "Option<serde_with::TimestampMilliSeconds<i64>>")]
    start_time: Option<SystemTime>,
    /// When voting closed, set only on termination
    #[serde_as(as = "Option<serde_with::TimestampMilliSeconds<i64>>")]
    end_time: Option<SystemTime>,
}

impl Poll {
    /// Creates a new poll in the `Created` state from a validated request
    ///
    /// Options are numbered by their position in the request. A missing
    /// or zero `time_limit` is replaced with the default window.
    pub fn new(request: CreateRequest) -> Self {
        let CreateRequest {
            question,
            options,
            time_limit,
        } = request;

        Self {
            id: Id::new(),
            question,
            options: options
                .into_iter()
                .enumerate()
                .map(|(id, text)| PollOption {
                    id,
                    text,
                    votes: HashSet::new(),
                })
                .collect(),
            time_limit: Duration::from_secs(
                time_limit
                    .filter(|&seconds| seconds > 0)
                    .unwrap_or(crate::constants::poll::DEFAULT_TIME_LIMIT_SECONDS),
            ),
            status: Status::Created,
            created_at: SystemTime::now(),
            start_time: None,
            end_time: None,
        }
    }

    /// The poll's unique identifier
    pub fn id(&self) -> Id {
        self.id
    }

    /// The question text
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The ordered answer options
    pub fn options(&self) -> &[PollOption] {
        &self.options
    }

    /// The configured voting window
    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// The poll's current lifecycle state
    pub fn status(&self) -> Status {
        self.status
    }

    /// When voting opened, if it has
    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    /// When voting closed, if it has
    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    /// Opens the voting window
    ///
    /// Transitions to `Active` and stamps the start time. Returns `false`
    /// without touching anything if the poll is already active.
    pub fn activate(&mut self) -> bool {
        if self.status == Status::Active {
            return false;
        }
        self.status = Status::Active;
        self.start_time = Some(SystemTime::now());
        true
    }

    /// Closes the voting window
    ///
    /// Transitions to `Ended` and stamps the end time. Returns `false`
    /// without touching anything if the poll has already ended, which is
    /// what makes competing termination paths safe.
    pub fn finish(&mut self) -> bool {
        if self.status == Status::Ended {
            return false;
        }
        self.status = Status::Ended;
        self.end_time = Some(SystemTime::now());
        true
    }

    /// Records a student's vote for an option
    ///
    /// The vote is accepted only while the poll is `Active` and the
    /// option index exists; a repeat vote for the same option is a set
    /// no-op. Returns whether the vote was counted.
    ///
    /// # Arguments
    ///
    /// * `student` - The voting student's session ID
    /// * `option_id` - The positional identifier of the chosen option
    pub fn record_vote(&mut self, student: SessionId, option_id: usize) -> bool {
        if self.status != Status::Active {
            return false;
        }
        match self.options.get_mut(option_id) {
            Some(option) => option.votes.insert(student),
            None => false,
        }
    }

    /// The remaining voting time
    ///
    /// Computed as the time limit minus the elapsed time since voting
    /// opened, saturating at zero. Before the poll is started this is the
    /// full time limit, so late joiners see the whole window.
    pub fn time_left(&self) -> Duration {
        match self.start_time {
            Some(start) => self
                .time_limit
                .saturating_sub(start.elapsed().unwrap_or_default()),
            None => self.time_limit,
        }
    }
}
