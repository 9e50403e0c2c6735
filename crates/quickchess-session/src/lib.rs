//! Session coordination for quickchess.
//!
//! A session is one game between two fixed roles. Each session runs as its
//! own actor task (see [`SessionHandle`]) that owns the position, the move
//! history and the two role bindings. The [`SessionRegistry`] creates
//! sessions and hands out handles to them.
//!
//! The crate never touches sockets. A connection takes part by attaching an
//! [`Outbox`]; the session queues frames on it and the connection's own
//! writer task delivers them.

mod arbiter;
mod binding;
mod broadcast;
mod config;
mod error;
mod registry;
mod session;

pub use arbiter::TurnArbiter;
pub use binding::{Bindings, Outbound, OutboundReceiver, OutboundSender, Outbox, RoleBinding};
pub use broadcast::Broadcaster;
pub use config::{AttachPolicy, SessionConfig};
pub use error::SessionError;
pub use registry::{CreatedSession, SessionRegistry};
pub use session::{AttachReceipt, RoleInfo, SessionHandle, SessionInfo, StateSnapshot};
