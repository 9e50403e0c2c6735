//! Role bindings: which connection currently holds each participant slot.
//!
//! The session never writes to a socket. It pushes frames into the
//! connection's [`Outbox`], and a writer task owned by the connection
//! handler drains the queue in order. A failed push means that writer is
//! gone, which is how the session learns a connection died.

use quickchess_protocol::{ErrorCode, Role, ServerFrame, Side};
use quickchess_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::{AttachPolicy, SessionError};

/// An item queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Encode and send this frame.
    Frame(ServerFrame),
    /// Send this last frame, then close the connection.
    Close(ServerFrame),
}

/// Channel sender feeding one connection's writer task.
pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

/// The receiving end, drained by the writer task.
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

/// A connection's outbound queue, tagged with the connection it belongs to.
///
/// Cheap to clone. The session keeps one clone per bound role and the
/// connection handler keeps another for replies that only this connection
/// should see.
#[derive(Debug, Clone)]
pub struct Outbox {
    connection_id: ConnectionId,
    sender: OutboundSender,
}

impl Outbox {
    /// Wraps an existing sender.
    pub fn new(connection_id: ConnectionId, sender: OutboundSender) -> Self {
        Self {
            connection_id,
            sender,
        }
    }

    /// Creates an outbox together with the receiver its writer drains.
    pub fn channel(connection_id: ConnectionId) -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(connection_id, tx), rx)
    }

    /// Returns the connection this outbox feeds.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Queues a frame. Returns `false` if the writer has gone away.
    pub fn push(&self, frame: ServerFrame) -> bool {
        self.sender.send(Outbound::Frame(frame)).is_ok()
    }

    /// Queues a final frame followed by a close.
    pub fn close(&self, frame: ServerFrame) -> bool {
        self.sender.send(Outbound::Close(frame)).is_ok()
    }

    /// Returns `true` once the writer has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// One participant slot of a session.
#[derive(Debug)]
pub struct RoleBinding {
    role: Role,
    side: Side,
    outbox: Option<Outbox>,
    ever_attached: bool,
}

impl RoleBinding {
    /// Creates an empty slot playing `side`.
    pub fn new(role: Role, side: Side) -> Self {
        Self {
            role,
            side,
            outbox: None,
            ever_attached: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Returns the live outbox, if a connection holds the slot.
    pub fn outbox(&self) -> Option<&Outbox> {
        self.outbox.as_ref()
    }

    /// Returns `true` while a connection holds the slot.
    pub fn is_live(&self) -> bool {
        self.outbox.is_some()
    }

    /// Returns `true` if any connection has ever held the slot.
    pub fn ever_attached(&self) -> bool {
        self.ever_attached
    }

    /// Returns `true` if `connection_id` currently holds the slot.
    pub fn is_held_by(&self, connection_id: ConnectionId) -> bool {
        self.outbox
            .as_ref()
            .is_some_and(|o| o.connection_id() == connection_id)
    }

    /// Binds `outbox` to the slot.
    ///
    /// If the slot is occupied by a live connection, `policy` decides: under
    /// [`AttachPolicy::Evict`] the old outbox is returned so the caller can
    /// close it, under [`AttachPolicy::Reject`] the attach fails. An occupant
    /// whose writer already went away counts as vacant.
    pub fn attach(
        &mut self,
        outbox: Outbox,
        policy: AttachPolicy,
    ) -> Result<Option<Outbox>, SessionError> {
        let occupied = self.outbox.as_ref().is_some_and(|o| !o.is_closed());
        if occupied && policy == AttachPolicy::Reject {
            return Err(SessionError::AlreadyBound(self.role));
        }

        let previous = self.outbox.replace(outbox);
        self.ever_attached = true;
        Ok(previous.filter(|o| !o.is_closed()))
    }

    /// Clears the slot if `connection_id` holds it.
    ///
    /// Returns `false` when a different connection (or none) holds the slot,
    /// so a late detach from an evicted connection cannot clear its
    /// replacement.
    pub fn detach(&mut self, connection_id: ConnectionId) -> bool {
        if self.is_held_by(connection_id) {
            self.outbox = None;
            true
        } else {
            false
        }
    }

    /// Clears the slot unconditionally, returning the connection it held.
    pub(crate) fn clear(&mut self) -> Option<ConnectionId> {
        self.outbox.take().map(|o| o.connection_id())
    }
}

/// Both slots of a session, indexed by role.
#[derive(Debug)]
pub struct Bindings([RoleBinding; 2]);

impl Bindings {
    /// Creates both slots, with `RoleA` playing `side_a`.
    pub fn new(side_a: Side) -> Self {
        Self([
            RoleBinding::new(Role::A, side_a),
            RoleBinding::new(Role::B, side_a.opposite()),
        ])
    }

    pub fn get(&self, role: Role) -> &RoleBinding {
        &self.0[Self::index(role)]
    }

    pub fn get_mut(&mut self, role: Role) -> &mut RoleBinding {
        &mut self.0[Self::index(role)]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoleBinding> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RoleBinding> {
        self.0.iter_mut()
    }

    /// Returns `true` once both roles have been attached at least once.
    pub fn both_ever_attached(&self) -> bool {
        self.0.iter().all(RoleBinding::ever_attached)
    }

    /// Returns `true` when no slot holds a live connection.
    pub fn is_vacant(&self) -> bool {
        !self.0.iter().any(RoleBinding::is_live)
    }

    fn index(role: Role) -> usize {
        match role {
            Role::A => 0,
            Role::B => 1,
        }
    }
}

/// The frame sent to a connection that lost its slot to a newer one.
pub(crate) fn eviction_frame(role: Role) -> ServerFrame {
    ServerFrame::error(
        ErrorCode::Evicted,
        format!("another connection took over {role}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbox(id: u64) -> (Outbox, OutboundReceiver) {
        Outbox::channel(ConnectionId::new(id))
    }

    #[test]
    fn test_sides_are_opposite() {
        let bindings = Bindings::new(Side::Black);
        assert_eq!(bindings.get(Role::A).side(), Side::Black);
        assert_eq!(bindings.get(Role::B).side(), Side::White);
    }

    #[test]
    fn test_attach_empty_slot() {
        let mut binding = RoleBinding::new(Role::A, Side::White);
        let (o, _rx) = outbox(1);
        let evicted = binding.attach(o, AttachPolicy::Evict).unwrap();
        assert!(evicted.is_none());
        assert!(binding.is_held_by(ConnectionId::new(1)));
        assert!(binding.ever_attached());
    }

    #[test]
    fn test_evict_returns_previous_outbox() {
        let mut binding = RoleBinding::new(Role::A, Side::White);
        let (first, _rx1) = outbox(1);
        let (second, _rx2) = outbox(2);
        binding.attach(first, AttachPolicy::Evict).unwrap();

        let evicted = binding.attach(second, AttachPolicy::Evict).unwrap();
        assert_eq!(evicted.unwrap().connection_id(), ConnectionId::new(1));
        assert!(binding.is_held_by(ConnectionId::new(2)));
    }

    #[test]
    fn test_reject_keeps_live_occupant() {
        let mut binding = RoleBinding::new(Role::B, Side::Black);
        let (first, _rx1) = outbox(1);
        let (second, _rx2) = outbox(2);
        binding.attach(first, AttachPolicy::Reject).unwrap();

        let err = binding.attach(second, AttachPolicy::Reject).unwrap_err();
        assert_eq!(err, SessionError::AlreadyBound(Role::B));
        assert!(binding.is_held_by(ConnectionId::new(1)));
    }

    #[test]
    fn test_reject_replaces_dead_occupant() {
        let mut binding = RoleBinding::new(Role::B, Side::Black);
        let (first, rx1) = outbox(1);
        let (second, _rx2) = outbox(2);
        binding.attach(first, AttachPolicy::Reject).unwrap();
        drop(rx1);

        let evicted = binding.attach(second, AttachPolicy::Reject).unwrap();
        assert!(evicted.is_none());
        assert!(binding.is_held_by(ConnectionId::new(2)));
    }

    #[test]
    fn test_detach_ignores_other_connection() {
        let mut binding = RoleBinding::new(Role::A, Side::White);
        let (o, _rx) = outbox(2);
        binding.attach(o, AttachPolicy::Evict).unwrap();

        assert!(!binding.detach(ConnectionId::new(1)));
        assert!(binding.is_live());
        assert!(binding.detach(ConnectionId::new(2)));
        assert!(!binding.is_live());
        // Idempotent.
        assert!(!binding.detach(ConnectionId::new(2)));
    }

    #[test]
    fn test_push_fails_after_receiver_dropped() {
        let (o, rx) = outbox(1);
        assert!(o.push(ServerFrame::join()));
        drop(rx);
        assert!(!o.push(ServerFrame::join()));
        assert!(o.is_closed());
    }
}
