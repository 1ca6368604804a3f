//! Student roster management
//!
//! This module tracks the students known to the session: who they are,
//! which connection currently carries them, and whether they have
//! answered the current poll. The roster is the sole writer of student
//! records; everything else reads through it.

use std::{
    collections::{HashMap, hash_map::Entry},
    fmt::Display,
    str::FromStr,
};

use itertools::Itertools;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

/// A student's stable session identifier
///
/// Supplied by the client and kept across reconnects, so the same
/// student maps to the same roster entry even when their transport
/// connection changes.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a session ID from its client-supplied string form
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The ID's string form
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A server-generated identifier for one transport connection
///
/// Connections are ephemeral: a student who reconnects gets a fresh
/// connection ID while keeping their session ID.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    /// Creates a new random connection ID (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConnectionId {
    /// Formats the ID as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ConnectionId {
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

/// Errors that can occur when adding students to the roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The session has reached the maximum number of tracked students
    #[error("maximum number of students reached")]
    RosterFull,
}

/// A student known to the session
///
/// The `answered` flag is `None` while no poll is active and `Some`
/// otherwise; it is reset for everyone when a poll starts and cleared
/// again when it ends.
#[derive(Debug, Clone, Serialize)]
pub struct Student {
    /// The student's stable session identifier
    id: SessionId,
    /// The student's display name, sanitized on join
    name: String,
    /// The connection currently carrying this student
    connection: ConnectionId,
    /// Whether the student's connection is live
    connected: bool,
    /// Whether the student has answered the current poll
    answered: Option<bool>,
}

impl Student {
    /// The student's stable session identifier
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The student's display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The connection currently carrying this student
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Whether the student's connection is live
    pub fn connected(&self) -> bool {
        self.connected
    }

    /// The student's answered flag for the current poll
    pub fn answered(&self) -> Option<bool> {
        self.answered
    }

    /// Whether the student has already answered the current poll
    pub fn has_answered(&self) -> bool {
        self.answered == Some(true)
    }
}

/// Cleans up a client-supplied display name before storage
///
/// Trims surrounding whitespace, caps the length, and censors
/// inappropriate content. Joining never fails on a bad name.
fn sanitize_name(name: &str) -> String {
    let name = rustrict::trim_whitespace(name);
    let name: String = name
        .chars()
        .take(crate::constants::roster::MAX_NAME_LENGTH)
        .collect();
    name.as_str().censor()
}

/// The live set of known students and their per-poll answered status
///
/// Entries are keyed by session ID, one per student; a rejoin with the
/// same ID updates the existing entry instead of forking a second one.
#[derive(Debug, Default)]
pub struct Roster {
    /// All known students keyed by their session ID
    students: HashMap<SessionId, Student>,
}

impl Roster {
    /// Adds or updates a student entry
    ///
    /// A fresh entry starts with `answered = Some(false)` when a poll is
    /// active and `None` otherwise. An existing entry keeps its answered
    /// flag while a poll is active, so a reconnect cannot re-enable
    /// voting; its name and connection are refreshed in place.
    ///
    /// # Arguments
    ///
    /// * `id` - The student's stable session identifier
    /// * `name` - The requested display name, sanitized before storage
    /// * `connection` - The connection carrying the join
    /// * `poll_active` - Whether a poll is currently collecting votes
    ///
    /// # Errors
    ///
    /// Returns `Error::RosterFull` if adding a new student would exceed
    /// the maximum roster size.
    pub fn join(
        &mut self,
        id: SessionId,
        name: &str,
        connection: ConnectionId,
        poll_active: bool,
    ) -> Result<(), Error> {
        let name = sanitize_name(name);

        let student_count = self.students.len();
        match self.students.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                let student = occupied.get_mut();
                student.name = name;
                student.connection = connection;
                student.connected = true;
                student.answered = match (poll_active, student.answered) {
                    (true, Some(previous)) => Some(previous),
                    (true, None) => Some(false),
                    (false, _) => None,
                };
            }
            Entry::Vacant(vacant) => {
                if student_count >= crate::constants::roster::MAX_STUDENT_COUNT {
                    return Err(Error::RosterFull);
                }
                vacant.insert(Student {
                    id,
                    name,
                    connection,
                    connected: true,
                    answered: poll_active.then_some(false),
                });
            }
        }

        Ok(())
    }

    /// Looks up a student by session ID
    pub fn get(&self, id: &SessionId) -> Option<&Student> {
        self.students.get(id)
    }

    /// Removes the student carried by a connection
    ///
    /// Used on transport disconnect: connections map to at most one
    /// student, and the whole entry goes away with the connection.
    ///
    /// # Returns
    ///
    /// The removed student, if the connection carried one.
    pub fn remove_by_connection(&mut self, connection: ConnectionId) -> Option<Student> {
        let id = self
            .students
            .values()
            .find(|student| student.connection == connection)
            .map(|student| student.id.clone())?;
        self.students.remove(&id)
    }

    /// Removes a student by session ID
    ///
    /// Used for teacher-initiated removal. A later rejoin with the same
    /// session ID is treated as a brand-new student.
    ///
    /// # Returns
    ///
    /// The removed student, if the ID was known.
    pub fn remove(&mut self, id: &SessionId) -> Option<Student> {
        self.students.remove(id)
    }

    /// Marks a student as having answered the current poll
    pub fn mark_answered(&mut self, id: &SessionId) {
        if let Some(student) = self.students.get_mut(id) {
            student.answered = Some(true);
        }
    }

    /// Resets every student's answered flag to `Some(false)`
    ///
    /// Called when a poll starts, so each voting window begins with a
    /// clean slate.
    pub fn reset_answers(&mut self) {
        for student in self.students.values_mut() {
            student.answered = Some(false);
        }
    }

    /// Clears every student's answered flag to `None`
    ///
    /// Called when a poll ends; `None` marks the no-active-poll state.
    pub fn clear_answers(&mut self) {
        for student in self.students.values_mut() {
            student.answered = None;
        }
    }

    /// Whether every connected student has answered the current poll
    ///
    /// Vacuously true for an empty roster; callers check this only after
    /// accepting a vote, so at least one student exists in practice.
    pub fn all_answered(&self) -> bool {
        self.students
            .values()
            .filter(|student| student.connected)
            .all(Student::has_answered)
    }

    /// The connections of all tracked students
    pub fn connections(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.students.values().map(|student| student.connection)
    }

    /// A display-ready list of all students, ordered by name
    pub fn students(&self) -> Vec<Student> {
        self.students
            .values()
            .cloned()
            .sorted_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)))
            .collect_vec()
    }

    /// The number of tracked students
    pub fn len(&self) -> usize {
        self.students.len()
    }

    /// Whether the roster has no students
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}
