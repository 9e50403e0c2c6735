//! quickchess server binary.
//!
//! Configuration comes from the environment:
//!
//! - `QUICKCHESS_WS_ADDR` (default `0.0.0.0:8081`)
//! - `QUICKCHESS_HTTP_ADDR` (default `0.0.0.0:8080`)
//! - `QUICKCHESS_IDLE_TIMEOUT_SECS` (unset: sessions are never dropped)
//! - `QUICKCHESS_ATTACH_POLICY` (`evict` or `reject`, default `evict`)
//! - `RUST_LOG` (default `info`)

use std::time::Duration;

use quickchess::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), QuickchessError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let ws_addr = env_or("QUICKCHESS_WS_ADDR", "0.0.0.0:8081");
    let http_addr = env_or("QUICKCHESS_HTTP_ADDR", "0.0.0.0:8080");

    let idle_timeout = match std::env::var("QUICKCHESS_IDLE_TIMEOUT_SECS") {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(_) => {
                tracing::warn!(value = %raw, "ignoring invalid QUICKCHESS_IDLE_TIMEOUT_SECS");
                None
            }
        },
        Err(_) => None,
    };

    let attach_policy = match std::env::var("QUICKCHESS_ATTACH_POLICY").as_deref() {
        Ok("reject") => AttachPolicy::Reject,
        Ok("evict") | Err(_) => AttachPolicy::Evict,
        Ok(other) => {
            tracing::warn!(value = other, "unknown QUICKCHESS_ATTACH_POLICY, using evict");
            AttachPolicy::Evict
        }
    };

    let server = QuickchessServerBuilder::new()
        .ws_bind(&ws_addr)
        .http_bind(&http_addr)
        .session_config(SessionConfig {
            attach_policy,
            idle_timeout,
            ..SessionConfig::default()
        })
        .build::<ChessRules>()
        .await?;

    server.run().await
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
