//! Per-connection handler: target parsing, attach, move routing.
//!
//! Each upgraded connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Parse the upgrade target into a role and a session ID
//!   2. Look the session up and attach this connection's outbox
//!   3. Loop: read move tokens and submit them to the session
//!   4. Detach on the way out
//!
//! Nothing here writes to the socket directly once attached. All outbound
//! frames (broadcasts from the session and error replies from this loop)
//! go through the outbox, and a dedicated writer task sends them in order.

use std::sync::Arc;

use quickchess_protocol::{Codec, ConnectTarget, ErrorCode, MoveToken, Role, ServerFrame};
use quickchess_rules::RulesAuthority;
use quickchess_session::{Outbound, OutboundReceiver, Outbox, SessionError, SessionHandle};
use quickchess_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::server::ServerState;
use crate::QuickchessError;

/// Drop guard that detaches the role if the handler exits without doing
/// so itself (for example on panic).
///
/// `Drop` is synchronous, so the detach runs in a fire-and-forget task.
struct DetachGuard {
    handle: SessionHandle,
    role: Role,
    connection_id: ConnectionId,
    armed: bool,
}

impl DetachGuard {
    async fn release(mut self) {
        self.armed = false;
        detach(&self.handle, self.role, self.connection_id).await;
    }
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let handle = self.handle.clone();
        let (role, connection_id) = (self.role, self.connection_id);
        tokio::spawn(async move {
            detach(&handle, role, connection_id).await;
        });
    }
}

async fn detach(handle: &SessionHandle, role: Role, connection_id: ConnectionId) {
    match handle.detach(role, connection_id).await {
        Ok(true) => {}
        Ok(false) => tracing::debug!(
            session_id = %handle.session_id(),
            %role,
            %connection_id,
            "role already released"
        ),
        Err(e) => tracing::debug!(
            session_id = %handle.session_id(),
            %role,
            %connection_id,
            error = %e,
            "detach failed"
        ),
    }
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn handle_connection<R, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<R, C>>,
) -> Result<(), QuickchessError>
where
    R: RulesAuthority,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, target = conn.target(), "handling new connection");

    // --- Step 1: target ---
    let target = match ConnectTarget::parse(conn.target()) {
        Ok(target) => target,
        Err(e) => {
            let frame = ServerFrame::error(ErrorCode::BadRequest, e.to_string());
            refuse(&conn, &state.codec, &frame).await;
            return Err(e.into());
        }
    };
    let ConnectTarget { role, session_id } = target;

    // --- Step 2: lookup + attach ---
    let handle = match state.registry.lookup(&session_id).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::debug!(%conn_id, %session_id, "unknown session");
            refuse(&conn, &state.codec, &ServerFrame::error(e.code(), e.to_string())).await;
            return Err(e.into());
        }
    };

    let (outbox, rx) = Outbox::channel(conn_id);
    let writer = tokio::spawn(write_loop(Arc::clone(&conn), rx, Arc::clone(&state)));

    let receipt = match handle.attach(role, outbox.clone()).await {
        Ok(receipt) => receipt,
        Err(e) => {
            tracing::warn!(%conn_id, %session_id, %role, error = %e, "attach refused");
            let _ = outbox.close(ServerFrame::error(e.code(), e.to_string()));
            drop(outbox);
            let _ = writer.await;
            return Err(e.into());
        }
    };
    tracing::info!(
        %conn_id,
        %session_id,
        %role,
        side = %receipt.side,
        status = %receipt.status,
        "connection attached"
    );
    let guard = DetachGuard {
        handle: handle.clone(),
        role,
        connection_id: conn_id,
        armed: true,
    };

    // --- Step 3: move loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, %session_id, %role, "connection closed");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, %session_id, %role, error = %e, "recv error");
                break;
            }
        };

        let token = match MoveToken::from_frame(&data) {
            Ok(Some(token)) => token,
            Ok(None) => continue,
            Err(e) => {
                let _ = outbox.push(ServerFrame::error(ErrorCode::BadRequest, e.to_string()));
                continue;
            }
        };

        match handle.submit_move(role, conn_id, token).await {
            Ok(_) => {}
            Err(e @ (SessionError::Unavailable(_) | SessionError::NotAttached(_))) => {
                tracing::debug!(%conn_id, %session_id, %role, error = %e, "connection no longer bound");
                let _ = outbox.push(ServerFrame::error(e.code(), e.to_string()));
                break;
            }
            Err(e) => {
                // Only the sender hears about a rejected move.
                if !outbox.push(ServerFrame::error(e.code(), e.to_string())) {
                    break;
                }
            }
        }
    }

    // --- Step 4: detach ---
    guard.release().await;
    drop(outbox);
    let _ = writer.await;
    Ok(())
}

/// Drains the outbox onto the socket until every sender is gone or a
/// close is requested, then closes the connection.
async fn write_loop<R, C>(
    conn: Arc<WebSocketConnection>,
    mut rx: OutboundReceiver,
    state: Arc<ServerState<R, C>>,
) where
    R: RulesAuthority,
    C: Codec,
{
    let conn_id = conn.id();
    while let Some(item) = rx.recv().await {
        let (frame, last) = match item {
            Outbound::Frame(frame) => (frame, false),
            Outbound::Close(frame) => (frame, true),
        };
        match state.codec.encode(&frame) {
            Ok(text) => {
                if let Err(e) = conn.send(&text).await {
                    tracing::debug!(%conn_id, error = %e, "send failed");
                    break;
                }
            }
            Err(e) => tracing::warn!(%conn_id, error = %e, "failed to encode frame"),
        }
        if last {
            break;
        }
    }
    // Dropping the receiver makes further pushes fail, which is how the
    // session notices this connection is gone.
    drop(rx);
    let _ = conn.close().await;
}

/// Sends one frame straight to a connection that never attached, then
/// closes it.
async fn refuse<C: Codec>(conn: &WebSocketConnection, codec: &C, frame: &ServerFrame) {
    if let Ok(text) = codec.encode(frame) {
        let _ = conn.send(&text).await;
    }
    let _ = conn.close().await;
}
