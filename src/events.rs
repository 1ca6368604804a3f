//! The event protocol between clients and the session coordinator
//!
//! This module defines every message that crosses the transport:
//! incoming client events grouped by sender role, outgoing update and
//! synchronization messages with their audiences decided by the
//! classroom, and the deadline alarm the embedding runtime delivers back
//! after a delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use web_time::SystemTime;

use super::{
    poll::{CreateRequest, Poll},
    results::Summary,
    roster::{SessionId, Student},
};

/// Messages received from connected clients
///
/// Incoming messages are grouped by the sender's role. The coordinator
/// is deliberately permissive about who sends what: preconditions are
/// checked against session state, not against the connection's identity,
/// matching the legacy protocol.
#[derive(Debug, Deserialize, Clone, derive_more::From)]
pub enum IncomingMessage {
    /// Messages sent by the teacher client
    Teacher(IncomingTeacherMessage),
    /// Messages sent by student clients
    Student(IncomingStudentMessage),
    /// Chat messages, sent by anyone
    Chat(ChatMessage),
}

/// Messages that can be sent by the teacher client
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingTeacherMessage {
    /// Become the session's teacher and receive the full session state
    Join,
    /// Create a new poll; fails while another poll is collecting votes
    CreatePoll(CreateRequest),
    /// Open the current poll's voting window
    StartPoll,
    /// Close the current poll's voting window ahead of the deadline
    EndPoll,
    /// Forcibly remove a student from the session
    RemoveStudent {
        /// The session ID of the student to remove
        session_id: SessionId,
    },
}

/// Messages that can be sent by student clients
#[derive(Debug, Deserialize, Clone)]
pub enum IncomingStudentMessage {
    /// Enter the session (or reconnect to it) under a stable session ID
    Join {
        /// The student's display name
        name: String,
        /// The client-generated stable session identifier
        session_id: SessionId,
    },
    /// Vote for an option of the active poll
    SubmitAnswer {
        /// The voting student's session ID
        session_id: SessionId,
        /// The positional identifier of the chosen option
        option_id: usize,
    },
}

/// The role a chat message was sent under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SenderType {
    /// Sent from the teacher's chat box
    Teacher,
    /// Sent from a student's chat box
    Student,
}

/// A chat message as submitted by a client
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// The display name the message was sent under
    pub sender: String,
    /// The message text
    pub message: String,
    /// The sender's role
    pub sender_type: SenderType,
}

/// A chat message as relayed to everyone, stamped by the server
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct ChatBroadcast {
    /// The display name the message was sent under
    pub sender: String,
    /// The message text
    pub message: String,
    /// The sender's role
    pub sender_type: SenderType,
    /// Server receive time
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub timestamp: SystemTime,
}

impl ChatBroadcast {
    /// Stamps an incoming chat message with the server's receive time
    pub fn stamp(message: ChatMessage) -> Self {
        let ChatMessage {
            sender,
            message,
            sender_type,
        } = message;
        Self {
            sender,
            message,
            sender_type,
            timestamp: SystemTime::now(),
        }
    }
}

/// A poll bundled with its remaining voting time
///
/// Sent to joining students so late arrivals see how much of the window
/// is left; before the poll is started the remaining time is the full
/// window.
#[serde_with::serde_as]
#[derive(Debug, Clone, Serialize)]
pub struct CurrentPoll {
    /// The poll in its current state
    pub poll: Poll,
    /// Remaining voting time in seconds
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub time_left: Duration,
}

/// Full-state synchronization messages sent to a joining client
///
/// Sync messages carry everything the client needs to rebuild its view;
/// they go only to the connection that joined.
#[derive(Debug, Serialize, Clone)]
pub enum SyncMessage {
    /// Acknowledges a teacher join with the complete session state
    TeacherJoined {
        /// The poll currently occupying the session slot, if any
        current_poll: Option<Poll>,
        /// The current roster
        students: Vec<Student>,
        /// All previously terminated polls with their final tallies
        poll_history: Vec<Poll>,
    },
    /// Acknowledges a student join
    StudentJoined {
        /// The session ID the student joined under
        session_id: SessionId,
        /// The current poll with its remaining time, if one exists
        current_poll: Option<CurrentPoll>,
    },
}

/// Update messages sent to participants about session state changes
#[serde_with::serde_as]
#[derive(Debug, Serialize, Clone)]
pub enum UpdateMessage {
    /// A poll was created (sent to the requesting teacher)
    PollCreated(Poll),
    /// The current poll opened its voting window (students and teacher)
    PollStarted {
        /// The poll that started
        poll: Poll,
        /// The full voting window in seconds
        #[serde_as(as = "serde_with::DurationSeconds<u64>")]
        time_left: Duration,
    },
    /// Fresh tallies after an accepted vote (everyone)
    ResultsUpdated(Summary),
    /// The poll ended with these final tallies (everyone)
    PollEnded(Summary),
    /// A student joined; the roster changed (teacher only)
    StudentConnected {
        /// The updated roster
        students: Vec<Student>,
    },
    /// A student's connection dropped; the roster changed (teacher only)
    StudentDisconnected {
        /// The updated roster
        students: Vec<Student>,
    },
    /// A student was removed by the teacher; the roster changed (teacher only)
    StudentRemoved {
        /// The updated roster
        students: Vec<Student>,
    },
    /// A chat message relayed to everyone
    Chat(ChatBroadcast),
    /// The recipient was removed from the session (the student only,
    /// sent before their connection is closed)
    Kicked,
    /// A request failed; sent only to the connection that made it
    Error {
        /// Human-readable description of the failure
        message: String,
    },
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never
    /// happen with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never
    /// happen with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Alarm messages for timed events in the poll lifecycle
///
/// Scheduled by the classroom when a poll starts and delivered back by
/// the embedding runtime after the delay. Each alarm is tagged with the
/// poll it belongs to, so firings that outlive their poll are discarded
/// instead of terminating a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The voting window of a poll ran out
    PollDeadline {
        /// The poll the deadline was scheduled for
        poll: super::poll::Id,
    },
}
