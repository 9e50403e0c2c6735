//! Session registry: creates sessions and routes connections to them.

use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::time::Duration;

use quickchess_protocol::{SessionId, Side, SideChoice};
use quickchess_rules::RulesAuthority;
use rand::Rng;
use rand::distr::Alphanumeric;
use tokio::sync::RwLock;

use crate::session::spawn_session;
use crate::{SessionConfig, SessionError, SessionHandle, SessionInfo};

/// Length of generated session IDs.
const SESSION_ID_LEN: usize = 8;

/// What [`SessionRegistry::create_session`] hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_id: SessionId,
    /// The side the creator (`RoleA`) plays.
    pub creator_side: Side,
}

struct Inner {
    sessions: HashMap<SessionId, SessionHandle>,
    /// Every ID ever handed out, including sessions since dropped.
    issued: HashSet<SessionId>,
}

/// Tracks every live session by ID.
///
/// Shared between the HTTP API and the connection handlers behind an
/// `Arc`. The lock guards the map only: it is held for inserts, lookups
/// and removals, never while talking to a session actor.
pub struct SessionRegistry<R: RulesAuthority> {
    inner: RwLock<Inner>,
    config: SessionConfig,
    _rules: PhantomData<fn() -> R>,
}

impl<R: RulesAuthority> SessionRegistry<R> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                sessions: HashMap::new(),
                issued: HashSet::new(),
            }),
            config,
            _rules: PhantomData,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Starts a new session in the initial position and registers it.
    ///
    /// The creator is `RoleA` and plays the requested side (a coin flip for
    /// [`SideChoice::Random`]). The session is fully set up before its ID
    /// becomes visible to lookups.
    pub async fn create_session(&self, choice: SideChoice) -> CreatedSession {
        let creator_side = resolve_side(choice);

        let mut inner = self.inner.write().await;
        let session_id = loop {
            let candidate = generate_session_id();
            if !inner.issued.contains(&candidate) {
                break candidate;
            }
        };
        inner.issued.insert(session_id.clone());

        let handle =
            spawn_session::<R>(session_id.clone(), creator_side, self.config.clone());
        inner.sessions.insert(session_id.clone(), handle);
        drop(inner);

        tracing::info!(%session_id, %creator_side, "session created");
        CreatedSession {
            session_id,
            creator_side,
        }
    }

    /// Returns a handle to the session, or `NotFound`.
    pub async fn lookup(&self, session_id: &SessionId) -> Result<SessionHandle, SessionError> {
        self.inner
            .read()
            .await
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))
    }

    /// Returns handles to every registered session, in no particular order.
    pub async fn handles(&self) -> Vec<SessionHandle> {
        self.inner.read().await.sessions.values().cloned().collect()
    }

    /// Collects info from every session that answers, sorted by ID.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let mut infos = Vec::new();
        for handle in self.handles().await {
            match handle.info().await {
                Ok(info) => infos.push(info),
                Err(e) => tracing::debug!(session_id = %handle.session_id(), error = %e, "skipping session"),
            }
        }
        infos.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        infos
    }

    /// Stops a session and forgets it. Its ID is never issued again.
    pub async fn remove(&self, session_id: &SessionId) -> Result<(), SessionError> {
        let handle = self
            .inner
            .write()
            .await
            .sessions
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.clone()))?;
        let _ = handle.shutdown().await;
        tracing::info!(%session_id, "session removed");
        Ok(())
    }

    /// Drops every session that [`SessionInfo::is_expired`] under `timeout`,
    /// plus any whose actor has stopped.
    ///
    /// Each actor decides for itself and stops before it is forgotten, so a
    /// session that gained a connection since the last look is kept.
    /// Returns the IDs that were removed.
    pub async fn expire_idle(&self, timeout: Duration) -> Vec<SessionId> {
        let mut expired = Vec::new();
        for handle in self.handles().await {
            match handle.expire_if_idle(timeout).await {
                Ok(true) => expired.push(handle.session_id().clone()),
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(session_id = %handle.session_id(), error = %e, "dropping stopped session");
                    expired.push(handle.session_id().clone());
                }
            }
        }

        if expired.is_empty() {
            return expired;
        }

        let mut inner = self.inner.write().await;
        for session_id in &expired {
            if inner.sessions.remove(session_id).is_some() {
                tracing::info!(%session_id, "idle session expired");
            }
        }
        expired
    }
}

fn resolve_side(choice: SideChoice) -> Side {
    match choice {
        SideChoice::White => Side::White,
        SideChoice::Black => Side::Black,
        SideChoice::Random => {
            if rand::rng().random_bool(0.5) {
                Side::White
            } else {
                Side::Black
            }
        }
    }
}

/// Generates a short random alphanumeric session ID.
fn generate_session_id() -> SessionId {
    let id: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(SESSION_ID_LEN)
        .map(char::from)
        .collect();
    SessionId::new(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_alphanumeric() {
        let id = generate_session_id();
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_explicit_side_choice_is_kept() {
        assert_eq!(resolve_side(SideChoice::White), Side::White);
        assert_eq!(resolve_side(SideChoice::Black), Side::Black);
    }

    #[test]
    fn test_random_side_choice_yields_both_sides() {
        let sides: HashSet<_> = (0..200)
            .map(|_| resolve_side(SideChoice::Random) == Side::White)
            .collect();
        assert_eq!(sides.len(), 2);
    }
}
