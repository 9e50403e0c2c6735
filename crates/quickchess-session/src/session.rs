//! Game session actor: an isolated Tokio task that owns one game.
//!
//! Every operation on a session (attach, detach, move submission) is a
//! command on the actor's channel. The actor handles one command at a
//! time, so two moves for the same session can never interleave, and the
//! frames it queues for a connection keep the order the commands were
//! processed in.

use std::time::Duration;

use quickchess_protocol::{
    ErrorCode, MoveToken, Outcome, Role, ServerFrame, SessionId, SessionStatus, Side,
};
use quickchess_rules::RulesAuthority;
use quickchess_transport::ConnectionId;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::arbiter::TurnArbiter;
use crate::binding::{eviction_frame, Bindings};
use crate::{Broadcaster, Outbox, SessionConfig, SessionError};

/// Commands sent to a session actor.
pub(crate) enum SessionCommand {
    Attach {
        role: Role,
        outbox: Outbox,
        reply: oneshot::Sender<Result<AttachReceipt, SessionError>>,
    },

    Detach {
        role: Role,
        connection_id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },

    SubmitMove {
        role: Role,
        connection_id: ConnectionId,
        token: MoveToken,
        reply: oneshot::Sender<Result<StateSnapshot, SessionError>>,
    },

    Snapshot {
        reply: oneshot::Sender<StateSnapshot>,
    },

    Info {
        reply: oneshot::Sender<SessionInfo>,
    },

    /// Stops the actor if the session is expired under `timeout` at the
    /// moment the command is processed. Replies whether it stopped.
    ExpireIfIdle {
        timeout: Duration,
        reply: oneshot::Sender<bool>,
    },

    Shutdown,
}

/// The observable game state at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Serialized position.
    pub fen: String,
    /// Every applied move, oldest first.
    pub moves: Vec<String>,
    /// The side whose move it is.
    pub turn: Side,
    /// Canonical strings of the moves `turn` may play.
    pub legal_moves: Vec<String>,
    pub status: SessionStatus,
    pub outcome: Option<Outcome>,
}

impl StateSnapshot {
    /// The frames that bring a participant up to date with this snapshot:
    /// the position, then the move history, then the outcome if the game
    /// has ended.
    pub fn frames(&self) -> Vec<ServerFrame> {
        let mut frames = vec![
            ServerFrame::Fen {
                content: self.fen.clone(),
            },
            ServerFrame::Moves {
                moves: self.moves.clone(),
            },
        ];
        if let Some(outcome) = self.outcome {
            frames.push(ServerFrame::game_over(outcome));
        }
        frames
    }
}

/// Returned to a connection that attached successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachReceipt {
    /// The side the attached role plays.
    pub side: Side,
    /// Session status after the attach.
    pub status: SessionStatus,
}

/// Per-role part of [`SessionInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleInfo {
    pub role: Role,
    pub side: Side,
    pub connected: bool,
}

/// Session metadata, without the position itself.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub roles: [RoleInfo; 2],
    pub move_count: usize,
    /// When the last connection left, or when the session was created if
    /// nobody has attached yet. `None` while anyone is attached.
    pub vacant_since: Option<Instant>,
}

impl SessionInfo {
    /// Returns the info for one role.
    pub fn role(&self, role: Role) -> RoleInfo {
        match role {
            Role::A => self.roles[0],
            Role::B => self.roles[1],
        }
    }

    /// Returns `true` if the session should be dropped under `timeout`.
    ///
    /// A vacant session expires once it has been vacant for `timeout`. A
    /// vacant session whose game has ended expires right away.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        match self.vacant_since {
            None => false,
            Some(_) if self.status.is_terminal() => true,
            Some(since) => since.elapsed() >= timeout,
        }
    }
}

/// Handle to a running session actor.
///
/// Cheap to clone: it is an `mpsc::Sender` and the session ID. The
/// registry holds one per session and every connection handler gets a
/// clone on lookup.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Binds a connection's outbox to `role`.
    ///
    /// On success the new connection has already been queued the current
    /// position and move history, and the other participant a join notice.
    pub async fn attach(
        &self,
        role: Role,
        outbox: Outbox,
    ) -> Result<AttachReceipt, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Attach {
            role,
            outbox,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.unavailable())?
    }

    /// Releases `role` if `connection_id` still holds it.
    ///
    /// Idempotent. Returns `true` if the slot was cleared by this call.
    pub async fn detach(
        &self,
        role: Role,
        connection_id: ConnectionId,
    ) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Detach {
            role,
            connection_id,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.unavailable())
    }

    /// Submits a move on behalf of the connection attached as `role`.
    ///
    /// On success the new state has been queued for every attached
    /// connection before this returns. On failure nothing changed and
    /// nothing was sent; the caller reports the error to the sender only.
    pub async fn submit_move(
        &self,
        role: Role,
        connection_id: ConnectionId,
        token: MoveToken,
    ) -> Result<StateSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::SubmitMove {
            role,
            connection_id,
            token,
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.unavailable())?
    }

    /// Returns the current position, history and status.
    pub async fn snapshot(&self) -> Result<StateSnapshot, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| self.unavailable())
    }

    /// Returns session metadata.
    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::Info { reply }).await?;
        rx.await.map_err(|_| self.unavailable())
    }

    /// Asks the actor to stop if it has sat vacant for `timeout`, or is
    /// vacant with the game over.
    ///
    /// The check and the stop happen inside the actor, so a connection
    /// that attaches first keeps the session alive.
    pub(crate) async fn expire_if_idle(&self, timeout: Duration) -> Result<bool, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(SessionCommand::ExpireIfIdle { timeout, reply })
            .await?;
        rx.await.map_err(|_| self.unavailable())
    }

    /// Stops the actor. Attached connections are sent a close.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(SessionCommand::Shutdown).await
    }

    async fn request(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.sender.send(cmd).await.map_err(|_| self.unavailable())
    }

    fn unavailable(&self) -> SessionError {
        SessionError::Unavailable(self.session_id.clone())
    }
}

/// The actor state. Lives inside its own task.
struct GameSession<R: RulesAuthority> {
    session_id: SessionId,
    status: SessionStatus,
    config: SessionConfig,
    arbiter: TurnArbiter<R>,
    bindings: Bindings,
    vacant_since: Option<Instant>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<R: RulesAuthority> GameSession<R> {
    async fn run(mut self) {
        tracing::info!(session_id = %self.session_id, "session actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SessionCommand::Attach {
                    role,
                    outbox,
                    reply,
                } => {
                    let _ = reply.send(self.handle_attach(role, outbox));
                }
                SessionCommand::Detach {
                    role,
                    connection_id,
                    reply,
                } => {
                    let _ = reply.send(self.handle_detach(role, connection_id));
                }
                SessionCommand::SubmitMove {
                    role,
                    connection_id,
                    token,
                    reply,
                } => {
                    let result = self.handle_submit(role, connection_id, &token);
                    let _ = reply.send(result);
                }
                SessionCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                SessionCommand::Info { reply } => {
                    let _ = reply.send(self.info());
                }
                SessionCommand::ExpireIfIdle { timeout, reply } => {
                    let expired = self.info().is_expired(timeout);
                    let _ = reply.send(expired);
                    if expired {
                        tracing::info!(session_id = %self.session_id, "session expired");
                        break;
                    }
                }
                SessionCommand::Shutdown => {
                    tracing::info!(session_id = %self.session_id, "session shutting down");
                    break;
                }
            }
        }

        for binding in self.bindings.iter() {
            if let Some(outbox) = binding.outbox() {
                let _ = outbox.close(ServerFrame::error(
                    ErrorCode::Unavailable,
                    format!("game {} has been closed", self.session_id),
                ));
            }
        }
        tracing::info!(session_id = %self.session_id, "session actor stopped");
    }

    fn handle_attach(
        &mut self,
        role: Role,
        outbox: Outbox,
    ) -> Result<AttachReceipt, SessionError> {
        let connection_id = outbox.connection_id();
        let binding = self.bindings.get_mut(role);
        let evicted = binding
            .attach(outbox.clone(), self.config.attach_policy)
            .inspect_err(|_| {
                tracing::debug!(
                    session_id = %self.session_id,
                    %role,
                    %connection_id,
                    "attach rejected, role already bound"
                );
            })?;
        let side = binding.side();

        if let Some(old) = evicted {
            tracing::warn!(
                session_id = %self.session_id,
                %role,
                old = %old.connection_id(),
                new = %connection_id,
                "evicting previous connection"
            );
            if !old.close(eviction_frame(role)) {
                tracing::debug!(
                    session_id = %self.session_id,
                    old = %old.connection_id(),
                    "evicted connection already gone"
                );
            }
        }

        let caught_up = self
            .snapshot()
            .frames()
            .into_iter()
            .all(|frame| outbox.push(frame));
        if !caught_up {
            tracing::debug!(
                session_id = %self.session_id,
                %role,
                %connection_id,
                "catch-up not delivered, writer gone"
            );
        }
        Broadcaster::notify(&self.bindings, role.counterpart(), ServerFrame::join());

        if self.status == SessionStatus::AwaitingOpponent
            && self.bindings.both_ever_attached()
        {
            self.status = SessionStatus::Active;
            tracing::info!(session_id = %self.session_id, "both players attached");
        }
        self.vacant_since = None;

        tracing::info!(
            session_id = %self.session_id,
            %role,
            %side,
            %connection_id,
            "player attached"
        );
        Ok(AttachReceipt {
            side,
            status: self.status,
        })
    }

    fn handle_detach(&mut self, role: Role, connection_id: ConnectionId) -> bool {
        if !self.bindings.get_mut(role).detach(connection_id) {
            return false;
        }
        tracing::info!(
            session_id = %self.session_id,
            %role,
            %connection_id,
            "player detached"
        );
        Broadcaster::notify(&self.bindings, role.counterpart(), ServerFrame::leave());
        self.mark_if_vacant();
        true
    }

    fn handle_submit(
        &mut self,
        role: Role,
        connection_id: ConnectionId,
        token: &MoveToken,
    ) -> Result<StateSnapshot, SessionError> {
        let binding = self.bindings.get(role);
        if !binding.is_held_by(connection_id) {
            tracing::debug!(
                session_id = %self.session_id,
                %role,
                %connection_id,
                "move from a connection that no longer holds the role"
            );
            return Err(SessionError::NotAttached(role));
        }
        let side = binding.side();

        let result = self.arbiter.submit(role, side, token);
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(
                    session_id = %self.session_id,
                    %role,
                    %token,
                    error = %err,
                    "move rejected"
                );
                return Err(err);
            }
        };

        tracing::debug!(session_id = %self.session_id, %role, %token, "move applied");
        if let Some(outcome) = outcome {
            self.status = SessionStatus::Terminated;
            tracing::info!(
                session_id = %self.session_id,
                ?outcome,
                moves = self.arbiter.history().len(),
                "game over"
            );
        }

        let snapshot = self.snapshot();
        let departed = Broadcaster::publish(&mut self.bindings, &snapshot.frames());
        if !departed.is_empty() {
            self.mark_if_vacant();
        }
        Ok(snapshot)
    }

    fn mark_if_vacant(&mut self) {
        if self.bindings.is_vacant() && self.vacant_since.is_none() {
            self.vacant_since = Some(Instant::now());
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            fen: self.arbiter.fen(),
            moves: self.arbiter.history().to_vec(),
            turn: self.arbiter.side_to_move(),
            legal_moves: self.arbiter.legal_moves(),
            status: self.status,
            outcome: self.arbiter.outcome(),
        }
    }

    fn info(&self) -> SessionInfo {
        let role_info = |role| {
            let binding = self.bindings.get(role);
            RoleInfo {
                role,
                side: binding.side(),
                connected: binding.is_live(),
            }
        };
        SessionInfo {
            session_id: self.session_id.clone(),
            status: self.status,
            roles: [role_info(Role::A), role_info(Role::B)],
            move_count: self.arbiter.history().len(),
            vacant_since: self.vacant_since,
        }
    }
}

/// Spawns a session actor with `RoleA` playing `side_a`.
pub(crate) fn spawn_session<R: RulesAuthority>(
    session_id: SessionId,
    side_a: Side,
    config: SessionConfig,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = GameSession::<R> {
        session_id: session_id.clone(),
        status: SessionStatus::AwaitingOpponent,
        config,
        arbiter: TurnArbiter::new(),
        bindings: Bindings::new(side_a),
        vacant_since: Some(Instant::now()),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    SessionHandle {
        session_id,
        sender: tx,
    }
}
