//! # quickchess
//!
//! A server that coordinates two-player chess games. Players create and
//! join games over a small HTTP API, then each opens a WebSocket to
//! `/{player1|player2}/{game-id}` and sends moves as long algebraic
//! tokens (`e2e4`, `e7e8q`). The server checks turn order and legality,
//! and pushes the new position and move list to both players after every
//! accepted move.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quickchess::prelude::*;
//!
//! # async fn run() -> Result<(), QuickchessError> {
//! let server = QuickchessServerBuilder::new()
//!     .ws_bind("0.0.0.0:8081")
//!     .http_bind("0.0.0.0:8080")
//!     .build::<ChessRules>()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
pub mod http;
mod server;

pub use error::QuickchessError;
pub use server::{QuickchessServer, QuickchessServerBuilder};

/// Common imports for running a server.
pub mod prelude {
    pub use crate::http::ApiError;
    pub use crate::{QuickchessError, QuickchessServer, QuickchessServerBuilder};
    pub use quickchess_protocol::{
        ErrorCode, MoveToken, Outcome, Role, ServerFrame, SessionId, SessionStatus, Side,
        SideChoice,
    };
    pub use quickchess_rules::{ChessRules, RulesAuthority};
    pub use quickchess_session::{
        AttachPolicy, SessionConfig, SessionError, SessionHandle, SessionRegistry,
    };
}
