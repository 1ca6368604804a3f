//! Communication session management
//!
//! This module defines the trait for tunneling messages between the
//! session coordinator and connected clients (the teacher and the
//! students). The tunnel abstraction allows for different communication
//! mechanisms while maintaining a consistent interface.

use super::events::{SyncMessage, UpdateMessage};

/// Trait for sending messages through a communication tunnel
///
/// This trait abstracts the communication mechanism used to send messages
/// to connected clients. Implementations might use WebSockets, Server-Sent
/// Events, or other real-time communication protocols.
pub trait Tunnel {
    /// Sends an update message to the client
    ///
    /// Update messages notify clients about changes that affect their
    /// current view of the session.
    ///
    /// # Arguments
    ///
    /// * `message` - The update message to send
    fn send_message(&self, message: &UpdateMessage);

    /// Sends a state synchronization message to the client
    ///
    /// Sync messages carry the full session view and are sent when a
    /// client joins, so its local state matches the server's.
    ///
    /// # Arguments
    ///
    /// * `state` - The synchronization message to send
    fn send_state(&self, state: &SyncMessage);

    /// Closes the communication tunnel
    ///
    /// This method is called when the client is forcibly disconnected or
    /// when the communication is no longer needed.
    fn close(self);
}
