//! Session state and event handling
//!
//! This module contains the classroom session object: the single owner
//! of the current poll, the poll history, the student roster, and the
//! teacher connection. It receives incoming client events, drives the
//! poll lifecycle, and fans out notifications to the right audience.
//!
//! All mutable state lives here and is touched only while an event or
//! alarm is being processed; callers are expected to serialize those
//! calls, which makes locking unnecessary. The poll deadline is the one
//! asynchronous input: it is scheduled as an [`AlarmMessage`] when a
//! poll starts and validated against the current poll's identity and
//! status when it fires, so a firing that outlives its poll is simply
//! discarded.

use std::time::Duration;

use garde::Validate;

use super::{
    events::{
        AlarmMessage, ChatBroadcast, CurrentPoll, IncomingMessage, IncomingStudentMessage,
        IncomingTeacherMessage, SyncMessage, UpdateMessage,
    },
    poll::{self, Poll, Status},
    results::Summary,
    roster::{ConnectionId, Roster, SessionId},
    session::Tunnel,
};

/// The complete state of one polling session
///
/// One classroom exists per server process: a single teacher, the
/// roster of students, at most one current poll, and the append-only
/// history of terminated polls. State survives for the lifetime of the
/// process only.
#[derive(Debug, Default)]
pub struct Classroom {
    /// The poll currently occupying the single poll slot, if any
    current_poll: Option<Poll>,
    /// Terminated polls with their final tallies, in termination order
    poll_history: Vec<Poll>,
    /// The student roster
    roster: Roster,
    /// The teacher singleton; a new teacher join replaces the previous
    /// connection, a teacher disconnect clears it
    teacher: Option<ConnectionId>,
}

impl Classroom {
    /// Creates an empty classroom
    pub fn new() -> Self {
        Self::default()
    }

    /// The poll currently occupying the session slot, if any
    pub fn current_poll(&self) -> Option<&Poll> {
        self.current_poll.as_ref()
    }

    /// The terminated polls, oldest first
    pub fn poll_history(&self) -> &[Poll] {
        &self.poll_history
    }

    /// The student roster
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// The connection currently acting as the teacher, if any
    pub fn teacher(&self) -> Option<ConnectionId> {
        self.teacher
    }

    /// Whether the current poll is collecting votes
    fn poll_active(&self) -> bool {
        self.current_poll
            .as_ref()
            .is_some_and(|poll| poll.status() == Status::Active)
    }

    // Outbound routing. Everything below the gateway goes through these
    // helpers; lifecycle and roster code never touches tunnels directly.

    /// Sends an update message to a single connection
    fn send_to<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        connection: ConnectionId,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        if let Some(tunnel) = tunnel_finder(connection) {
            tunnel.send_message(message);
        }
    }

    /// Sends a sync message to a single connection
    fn sync_to<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        connection: ConnectionId,
        message: &SyncMessage,
        tunnel_finder: F,
    ) {
        if let Some(tunnel) = tunnel_finder(connection) {
            tunnel.send_state(message);
        }
    }

    /// Sends an update message to the teacher, if one is connected
    fn send_to_teacher<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        if let Some(teacher) = self.teacher {
            self.send_to(teacher, message, tunnel_finder);
        }
    }

    /// Sends an update message to every student
    fn send_to_students<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        for connection in self.roster.connections() {
            self.send_to(connection, message, &tunnel_finder);
        }
    }

    /// Sends an update message to every participant
    fn send_to_all<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        self.send_to_students(message, &tunnel_finder);
        self.send_to_teacher(message, tunnel_finder);
    }

    /// Closes the tunnel of a connection, if it is still reachable
    fn close_connection<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &self,
        connection: ConnectionId,
        tunnel_finder: F,
    ) {
        if let Some(tunnel) = tunnel_finder(connection) {
            tunnel.close();
        }
    }

    // Inbound events

    /// Handles an incoming client event
    ///
    /// Events are validated against the current session state and either
    /// applied or dropped; only a poll-creation conflict produces an
    /// error message back to the sender. One event is fully processed
    /// before the next begins.
    ///
    /// # Arguments
    ///
    /// * `connection` - The connection the event arrived on
    /// * `message` - The incoming event
    /// * `schedule_message` - Function to schedule delayed alarm messages
    /// * `tunnel_finder` - Function to find communication tunnels by connection
    ///
    /// # Type Parameters
    ///
    /// * `T` - Type implementing the Tunnel trait for client communication
    /// * `F` - Function type for finding tunnels by connection ID
    /// * `S` - Function type for scheduling alarm messages
    pub fn receive_message<
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    >(
        &mut self,
        connection: ConnectionId,
        message: IncomingMessage,
        schedule_message: S,
        tunnel_finder: F,
    ) {
        match message {
            IncomingMessage::Teacher(message) => match message {
                IncomingTeacherMessage::Join => self.teacher_join(connection, tunnel_finder),
                IncomingTeacherMessage::CreatePoll(request) => {
                    self.create_poll(connection, request, tunnel_finder);
                }
                IncomingTeacherMessage::StartPoll => {
                    self.start_poll(connection, schedule_message, tunnel_finder);
                }
                IncomingTeacherMessage::EndPoll => self.end_current_poll(tunnel_finder),
                IncomingTeacherMessage::RemoveStudent { session_id } => {
                    self.remove_student(&session_id, tunnel_finder);
                }
            },
            IncomingMessage::Student(message) => match message {
                IncomingStudentMessage::Join { name, session_id } => {
                    self.student_join(connection, &name, session_id, tunnel_finder);
                }
                IncomingStudentMessage::SubmitAnswer {
                    session_id,
                    option_id,
                } => self.submit_answer(&session_id, option_id, tunnel_finder),
            },
            IncomingMessage::Chat(chat) => {
                self.send_to_all(
                    &UpdateMessage::Chat(ChatBroadcast::stamp(chat)),
                    tunnel_finder,
                );
            }
        }
    }

    /// Handles a scheduled alarm firing
    ///
    /// A deadline ends the current poll only when the alarm's poll ID
    /// matches the current poll and that poll is still active. Alarms
    /// are never cancelled when a poll ends early; a late firing fails
    /// this check and is discarded.
    ///
    /// # Arguments
    ///
    /// * `message` - The alarm message that fired
    /// * `tunnel_finder` - Function to find communication tunnels by connection
    pub fn receive_alarm<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        message: AlarmMessage,
        tunnel_finder: F,
    ) {
        match message {
            AlarmMessage::PollDeadline { poll } => {
                let relevant = self
                    .current_poll
                    .as_ref()
                    .is_some_and(|current| current.id() == poll && current.status() == Status::Active);
                if relevant {
                    log::info!("poll {poll} reached its deadline");
                    self.end_current_poll(tunnel_finder);
                } else {
                    log::trace!("discarding stale deadline for poll {poll}");
                }
            }
        }
    }

    /// Handles a transport-level disconnect
    ///
    /// Disconnection is a roster transition, not an error: the student
    /// carried by the connection is removed and the teacher is notified,
    /// or the teacher singleton is cleared if it was the teacher's
    /// connection.
    ///
    /// # Arguments
    ///
    /// * `connection` - The connection that dropped
    /// * `tunnel_finder` - Function to find communication tunnels by connection
    pub fn connection_lost<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        tunnel_finder: F,
    ) {
        if let Some(student) = self.roster.remove_by_connection(connection) {
            log::debug!("student {} disconnected", student.id());
            self.send_to_teacher(
                &UpdateMessage::StudentDisconnected {
                    students: self.roster.students(),
                },
                tunnel_finder,
            );
        }

        if self.teacher == Some(connection) {
            log::info!("teacher connection {connection} lost");
            self.teacher = None;
        }
    }

    /// Installs the connection as the session's teacher
    ///
    /// Replaces any previous teacher reference and answers with the
    /// complete session state: current poll, roster, and history.
    fn teacher_join<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        tunnel_finder: F,
    ) {
        self.teacher = Some(connection);
        log::info!("teacher joined on connection {connection}");

        self.sync_to(
            connection,
            &SyncMessage::TeacherJoined {
                current_poll: self.current_poll.clone(),
                students: self.roster.students(),
                poll_history: self.poll_history.clone(),
            },
            tunnel_finder,
        );
    }

    /// Adds a student to the roster and synchronizes their view
    ///
    /// The joining student is acknowledged with the current poll and its
    /// remaining time, so late arrivals can pick up a running vote; the
    /// teacher receives the updated roster.
    fn student_join<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        name: &str,
        session_id: SessionId,
        tunnel_finder: F,
    ) {
        if let Err(error) = self
            .roster
            .join(session_id.clone(), name, connection, self.poll_active())
        {
            log::warn!("dropping join for {session_id}: {error}");
            return;
        }
        log::debug!("student {session_id} joined on connection {connection}");

        let current_poll = self.current_poll.as_ref().map(|poll| CurrentPoll {
            poll: poll.clone(),
            time_left: poll.time_left(),
        });
        self.sync_to(
            connection,
            &SyncMessage::StudentJoined {
                session_id,
                current_poll,
            },
            &tunnel_finder,
        );

        self.send_to_teacher(
            &UpdateMessage::StudentConnected {
                students: self.roster.students(),
            },
            tunnel_finder,
        );
    }

    /// Creates a new poll in the session slot
    ///
    /// Rejected with an error to the sender while another poll is
    /// collecting votes. A poll that was created but never started is
    /// replaced, letting the teacher redraft before opening the vote.
    /// Requests that fail validation are dropped without acknowledgement.
    fn create_poll<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        connection: ConnectionId,
        request: poll::CreateRequest,
        tunnel_finder: F,
    ) {
        if self.poll_active() {
            self.send_to(
                connection,
                &UpdateMessage::Error {
                    message: poll::Error::PollActive.to_string(),
                },
                tunnel_finder,
            );
            return;
        }

        if let Err(report) = request.validate() {
            log::debug!("dropping invalid create request: {report}");
            return;
        }

        let poll = Poll::new(request);
        log::info!("poll {} created: {}", poll.id(), poll.question());
        self.send_to(connection, &UpdateMessage::PollCreated(poll.clone()), tunnel_finder);
        self.current_poll = Some(poll);
    }

    /// Opens the current poll's voting window
    ///
    /// A no-op when there is no poll or it is already active. On
    /// success: stamps the start time, resets every student's answered
    /// flag, schedules the deadline alarm, and announces the start to
    /// the students and the requesting teacher.
    fn start_poll<
        T: Tunnel,
        F: Fn(ConnectionId) -> Option<T>,
        S: FnMut(AlarmMessage, Duration),
    >(
        &mut self,
        connection: ConnectionId,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        let Some(poll) = self.current_poll.as_mut() else {
            return;
        };
        if !poll.activate() {
            return;
        }

        let poll_id = poll.id();
        let time_limit = poll.time_limit();
        let message = UpdateMessage::PollStarted {
            poll: poll.clone(),
            time_left: time_limit,
        };

        self.roster.reset_answers();
        schedule_message(AlarmMessage::PollDeadline { poll: poll_id }, time_limit);
        log::info!(
            "poll {poll_id} started with a {}s window",
            time_limit.as_secs()
        );

        self.send_to_students(&message, &tunnel_finder);
        self.send_to(connection, &message, tunnel_finder);
    }

    /// Records a student's vote for the active poll
    ///
    /// Silently ignored unless a poll is active, the student is known
    /// and has not answered yet, and the option exists. An accepted vote
    /// broadcasts fresh tallies to everyone, and ends the poll
    /// immediately once every connected student has answered.
    fn submit_answer<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        session_id: &SessionId,
        option_id: usize,
        tunnel_finder: F,
    ) {
        let Some(poll) = self.current_poll.as_mut() else {
            return;
        };
        if poll.status() != Status::Active {
            return;
        }
        match self.roster.get(session_id) {
            Some(student) if !student.has_answered() => {}
            _ => return,
        }
        if !poll.record_vote(session_id.clone(), option_id) {
            return;
        }

        let summary = Summary::of(poll);
        self.roster.mark_answered(session_id);
        log::debug!("student {session_id} voted for option {option_id}");

        self.send_to_all(&UpdateMessage::ResultsUpdated(summary), &tunnel_finder);

        if self.roster.all_answered() {
            self.end_current_poll(tunnel_finder);
        }
    }

    /// Removes a student at the teacher's request
    ///
    /// The student is told they were kicked before their tunnel is
    /// closed, so their client can show a terminal state; the teacher
    /// receives the shrunken roster.
    fn remove_student<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(
        &mut self,
        session_id: &SessionId,
        tunnel_finder: F,
    ) {
        let Some(student) = self.roster.remove(session_id) else {
            return;
        };
        log::info!("student {} removed by the teacher", student.id());

        self.send_to(student.connection(), &UpdateMessage::Kicked, &tunnel_finder);
        self.close_connection(student.connection(), &tunnel_finder);

        self.send_to_teacher(
            &UpdateMessage::StudentRemoved {
                students: self.roster.students(),
            },
            tunnel_finder,
        );
    }

    /// Terminates the current poll
    ///
    /// A no-op unless the current poll is active. All three termination
    /// triggers converge here: the teacher ending the poll, the last
    /// connected student answering, and the deadline alarm; whichever
    /// arrives first wins, and the later ones fail the status guard.
    /// The poll is stamped, snapshotted into history, and the final
    /// tallies broadcast to everyone.
    fn end_current_poll<T: Tunnel, F: Fn(ConnectionId) -> Option<T>>(&mut self, tunnel_finder: F) {
        if !self.poll_active() {
            return;
        }
        let Some(mut poll) = self.current_poll.take() else {
            return;
        };

        poll.finish();
        let summary = Summary::of(&poll);
        log::info!("poll {} ended with {} votes", poll.id(), summary.total_votes);

        self.poll_history.push(poll);
        self.roster.clear_answers();

        self.send_to_all(&UpdateMessage::PollEnded(summary), tunnel_finder);
    }
}
