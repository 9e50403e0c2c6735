//! Fan-out of session frames to the attached connections.

use quickchess_protocol::{Role, ServerFrame};

use crate::binding::Bindings;

/// Delivers frames to every live binding of one session.
pub struct Broadcaster;

impl Broadcaster {
    /// Queues `frames`, in order, on every live connection.
    ///
    /// Absent roles are skipped. A connection whose writer has gone away is
    /// detached on the spot and the remaining participant gets a leave
    /// notice. Returns the roles that were detached.
    pub fn publish(bindings: &mut Bindings, frames: &[ServerFrame]) -> Vec<Role> {
        let mut departed = Vec::new();

        for binding in bindings.iter_mut() {
            let Some(outbox) = binding.outbox() else {
                continue;
            };
            let delivered = frames.iter().all(|frame| outbox.push(frame.clone()));
            if !delivered {
                if let Some(connection_id) = binding.clear() {
                    tracing::debug!(
                        role = %binding.role(),
                        %connection_id,
                        "delivery failed, detaching"
                    );
                }
                departed.push(binding.role());
            }
        }

        for role in &departed {
            Self::notify(bindings, role.counterpart(), ServerFrame::leave());
        }
        departed
    }

    /// Queues one frame for `role` if it is attached.
    ///
    /// Delivery failure here is logged and left for the next publish or
    /// detach to act on.
    pub fn notify(bindings: &Bindings, role: Role, frame: ServerFrame) {
        if let Some(outbox) = bindings.get(role).outbox() {
            if !outbox.push(frame) {
                tracing::debug!(
                    %role,
                    connection_id = %outbox.connection_id(),
                    "notice not delivered, writer gone"
                );
            }
        }
    }
}
