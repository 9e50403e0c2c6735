//! Session configuration.

use std::time::Duration;

/// What happens when a connection attaches to a role that already has a
/// live connection.
///
/// One policy applies to every session of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttachPolicy {
    /// The previous connection gets an `evicted` error frame and is closed,
    /// then the new connection takes the slot. Lets a player reload the
    /// page without being locked out.
    #[default]
    Evict,

    /// The new attach fails with `AlreadyBound` while the old one is live.
    Reject,
}

/// Configuration shared by every session a registry creates.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Policy for attaching to an occupied role.
    pub attach_policy: AttachPolicy,

    /// How long a session may sit with no attached connection before the
    /// registry drops it. `None` keeps sessions for the life of the process.
    pub idle_timeout: Option<Duration>,

    /// Capacity of each session actor's command channel. Callers wait when
    /// it is full.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            attach_policy: AttachPolicy::Evict,
            idle_timeout: None,
            command_buffer: 64,
        }
    }
}
