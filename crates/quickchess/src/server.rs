//! `QuickchessServer` builder and server loops.
//!
//! A server owns two listeners: the HTTP lifecycle API (create, join, list)
//! and the WebSocket listener that game connections attach through. Both
//! share one [`SessionRegistry`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use quickchess_protocol::{Codec, JsonCodec};
use quickchess_rules::RulesAuthority;
use quickchess_session::{SessionConfig, SessionRegistry};
use quickchess_transport::WebSocketListener;
use tokio::net::TcpListener;

use crate::handler::handle_connection;
use crate::QuickchessError;

/// How often the reaper looks for idle sessions, unless overridden.
const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<R: RulesAuthority, C: Codec> {
    pub(crate) registry: Arc<SessionRegistry<R>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a quickchess server.
///
/// # Example
///
/// ```rust,no_run
/// use quickchess::prelude::*;
///
/// # async fn run() -> Result<(), QuickchessError> {
/// let server = QuickchessServerBuilder::new()
///     .ws_bind("0.0.0.0:8081")
///     .http_bind("0.0.0.0:8080")
///     .build::<ChessRules>()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct QuickchessServerBuilder {
    ws_addr: String,
    http_addr: String,
    session_config: SessionConfig,
    reap_interval: Duration,
}

impl QuickchessServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            ws_addr: "127.0.0.1:8081".to_string(),
            http_addr: "127.0.0.1:8080".to_string(),
            session_config: SessionConfig::default(),
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }

    /// Sets the address game connections attach through.
    pub fn ws_bind(mut self, addr: &str) -> Self {
        self.ws_addr = addr.to_string();
        self
    }

    /// Sets the address of the HTTP lifecycle API.
    pub fn http_bind(mut self, addr: &str) -> Self {
        self.http_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets how often idle sessions are looked for. Only used when
    /// [`SessionConfig::idle_timeout`] is set.
    pub fn reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Binds both listeners. Uses `JsonCodec` for outbound frames.
    pub async fn build<R: RulesAuthority>(
        self,
    ) -> Result<QuickchessServer<R, JsonCodec>, QuickchessError> {
        let ws = WebSocketListener::bind(&self.ws_addr).await?;
        let http = TcpListener::bind(&self.http_addr).await?;
        tracing::info!(addr = %self.http_addr, "HTTP listener bound");

        let state = Arc::new(ServerState {
            registry: Arc::new(SessionRegistry::new(self.session_config)),
            codec: JsonCodec,
        });

        Ok(QuickchessServer {
            ws,
            http,
            state,
            reap_interval: self.reap_interval,
        })
    }
}

impl Default for QuickchessServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound quickchess server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct QuickchessServer<R: RulesAuthority, C: Codec> {
    ws: WebSocketListener,
    http: TcpListener,
    state: Arc<ServerState<R, C>>,
    reap_interval: Duration,
}

impl<R, C> QuickchessServer<R, C>
where
    R: RulesAuthority,
    C: Codec,
{
    /// Returns the address of the WebSocket listener.
    pub fn ws_addr(&self) -> std::io::Result<SocketAddr> {
        self.ws.local_addr()
    }

    /// Returns the address of the HTTP listener.
    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    /// Returns the registry shared by both listeners.
    pub fn registry(&self) -> Arc<SessionRegistry<R>> {
        Arc::clone(&self.state.registry)
    }

    /// Serves HTTP and WebSocket traffic until the process ends.
    ///
    /// Every accepted connection is upgraded and handled in its own task,
    /// so a slow handshake or a panicking handler affects only that
    /// connection.
    pub async fn run(self) -> Result<(), QuickchessError> {
        let router = crate::http::router(Arc::clone(&self.state.registry));
        let http = self.http;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http, router).await {
                tracing::error!(error = %e, "HTTP server stopped");
            }
        });

        if let Some(timeout) = self.state.registry.config().idle_timeout {
            tokio::spawn(reap_idle(
                Arc::clone(&self.state.registry),
                timeout,
                self.reap_interval,
            ));
        }

        tracing::info!("quickchess server running");

        loop {
            match self.ws.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let conn = match pending.upgrade().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::warn!(%peer, error = %e, "upgrade failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                %peer,
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Periodically drops sessions that have sat without connections.
async fn reap_idle<R: RulesAuthority>(
    registry: Arc<SessionRegistry<R>>,
    timeout: Duration,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
    loop {
        ticker.tick().await;
        let expired = registry.expire_idle(timeout).await;
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "reaped idle sessions");
        }
    }
}

#[cfg(test)]
mod tests {
    use quickchess_rules::ChessRules;

    use super::*;

    #[tokio::test]
    async fn test_builder_binds_both_listeners() {
        let server = QuickchessServerBuilder::new()
            .ws_bind("127.0.0.1:0")
            .http_bind("127.0.0.1:0")
            .build::<ChessRules>()
            .await
            .unwrap();

        let ws = server.ws_addr().unwrap();
        let http = server.http_addr().unwrap();
        assert_ne!(ws.port(), 0);
        assert_ne!(http.port(), 0);
        assert_ne!(ws.port(), http.port());
        assert!(server.registry().list().await.is_empty());
    }

    #[tokio::test]
    async fn test_build_fails_on_bad_address() {
        let result = QuickchessServerBuilder::default()
            .ws_bind("not an address")
            .build::<ChessRules>()
            .await;
        assert!(matches!(result, Err(QuickchessError::Transport(_))));
    }
}
