//! HTTP lifecycle API: create, join, list and inspect sessions.
//!
//! Playing happens over the WebSocket listener; this router only hands out
//! session IDs and reports on them.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use quickchess_protocol::{OutcomeKind, Role, SessionId, SessionStatus, Side, SideChoice};
use quickchess_rules::RulesAuthority;
use quickchess_session::{SessionError, SessionRegistry, StateSnapshot};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

/// Errors returned by the HTTP API, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request itself was malformed.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Session(SessionError::AlreadyBound(_)) => StatusCode::CONFLICT,
            ApiError::Session(SessionError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

#[derive(Debug, Deserialize)]
struct CreateChallenge {
    color: SideChoice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeCreated {
    game_id: SessionId,
    color: Side,
}

#[derive(Debug, Serialize)]
struct GameJoined {
    status: &'static str,
    color: Side,
}

#[derive(Debug, Serialize)]
struct GameSummary {
    id: SessionId,
    status: SessionStatus,
    moves: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GameState {
    fen: String,
    moves: Vec<String>,
    legal_moves: Vec<String>,
    turn: Side,
    status: SessionStatus,
    game_over: bool,
    outcome: Option<OutcomeKind>,
    winner: Option<Side>,
}

impl From<StateSnapshot> for GameState {
    fn from(snapshot: StateSnapshot) -> Self {
        Self {
            fen: snapshot.fen,
            moves: snapshot.moves,
            legal_moves: snapshot.legal_moves,
            turn: snapshot.turn,
            status: snapshot.status,
            game_over: snapshot.outcome.is_some(),
            outcome: snapshot.outcome.map(|o| o.kind()),
            winner: snapshot.outcome.and_then(|o| o.winner()),
        }
    }
}

#[derive(Debug, Serialize)]
struct PlayerSummary {
    role: Role,
    color: Side,
    connected: bool,
}

#[derive(Debug, Deserialize)]
struct PlayersQuery {
    #[serde(rename = "game-id")]
    game_id: Option<String>,
}

type Registry<R> = State<Arc<SessionRegistry<R>>>;

/// Builds the API router over a shared registry.
///
/// The legacy path spellings (`/create-challange`, `/get-games`,
/// `/get-players`) are served as aliases.
pub fn router<R: RulesAuthority>(registry: Arc<SessionRegistry<R>>) -> Router {
    Router::new()
        .route("/create-challenge", post(create_challenge::<R>))
        .route("/create-challange", post(create_challenge::<R>))
        .route("/joingame/{game_id}", get(join_game::<R>))
        .route("/games", get(list_games::<R>))
        .route("/get-games", get(list_games::<R>))
        .route("/games/{game_id}/state", get(game_state::<R>))
        .route("/players", get(list_players::<R>))
        .route("/get-players", get(list_players::<R>))
        .route("/ping", get(ping))
        .with_state(registry)
        .layer(CorsLayer::permissive())
}

async fn create_challenge<R: RulesAuthority>(
    State(registry): Registry<R>,
    body: Result<Json<CreateChallenge>, JsonRejection>,
) -> Result<Json<ChallengeCreated>, ApiError> {
    let Json(request) = body?;
    let created = registry.create_session(request.color).await;
    Ok(Json(ChallengeCreated {
        game_id: created.session_id,
        color: created.creator_side,
    }))
}

/// Tells the joiner which side they will play. Attaching happens over the
/// WebSocket as `player2`.
async fn join_game<R: RulesAuthority>(
    State(registry): Registry<R>,
    Path(game_id): Path<String>,
) -> Result<Json<GameJoined>, ApiError> {
    let info = registry.lookup(&SessionId::new(game_id)).await?.info().await?;
    Ok(Json(GameJoined {
        status: "game joined",
        color: info.role(Role::B).side,
    }))
}

async fn list_games<R: RulesAuthority>(State(registry): Registry<R>) -> Json<Vec<GameSummary>> {
    let games = registry
        .list()
        .await
        .into_iter()
        .map(|info| GameSummary {
            id: info.session_id,
            status: info.status,
            moves: info.move_count,
        })
        .collect();
    Json(games)
}

/// Position, history, legal replies and result of one game.
async fn game_state<R: RulesAuthority>(
    State(registry): Registry<R>,
    Path(game_id): Path<String>,
) -> Result<Json<GameState>, ApiError> {
    let snapshot = registry
        .lookup(&SessionId::new(game_id))
        .await?
        .snapshot()
        .await?;
    Ok(Json(snapshot.into()))
}

async fn list_players<R: RulesAuthority>(
    State(registry): Registry<R>,
    Query(query): Query<PlayersQuery>,
) -> Result<Json<Vec<PlayerSummary>>, ApiError> {
    let game_id = query
        .game_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::Validation("missing game-id".into()))?;
    let info = registry.lookup(&SessionId::new(game_id)).await?.info().await?;
    let players = info
        .roles
        .iter()
        .map(|r| PlayerSummary {
            role: r.role,
            color: r.side,
            connected: r.connected,
        })
        .collect();
    Ok(Json(players))
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "server running" }))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use quickchess_rules::ChessRules;
    use quickchess_session::SessionConfig;
    use tower::ServiceExt;

    use super::*;

    fn registry() -> Arc<SessionRegistry<ChessRules>> {
        Arc::new(SessionRegistry::new(SessionConfig::default()))
    }

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_create_challenge_returns_id_and_color() {
        let registry = registry();
        let (status, json) = call(
            router(Arc::clone(&registry)),
            post_json("/create-challenge", r#"{"color":"black"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["color"], "black");
        let id = json["gameId"].as_str().unwrap();
        assert!(registry.lookup(&SessionId::new(id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_challenge_legacy_path() {
        let (status, json) = call(
            router(registry()),
            post_json("/create-challange", r#"{"color":"random"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["color"] == "white" || json["color"] == "black");
    }

    #[tokio::test]
    async fn test_create_challenge_rejects_unknown_color() {
        let (status, json) = call(
            router(registry()),
            post_json("/create-challenge", r#"{"color":"purple"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn test_create_challenge_rejects_missing_body() {
        let (status, _) = call(router(registry()), post_json("/create-challenge", "")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_join_game_reports_opposite_color() {
        let registry = registry();
        let created = registry.create_session(SideChoice::White).await;

        let uri = format!("/joingame/{}", created.session_id);
        let (status, json) = call(router(registry), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "game joined");
        assert_eq!(json["color"], "black");
    }

    #[tokio::test]
    async fn test_join_unknown_game_is_404() {
        let (status, json) = call(router(registry()), get("/joingame/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "game nope not found");
    }

    #[tokio::test]
    async fn test_games_lists_sessions() {
        let registry = registry();
        let created = registry.create_session(SideChoice::White).await;

        let (status, json) = call(router(registry), get("/games")).await;
        assert_eq!(status, StatusCode::OK);
        let games = json.as_array().unwrap();
        assert_eq!(games.len(), 1);
        assert_eq!(games[0]["id"], created.session_id.as_str());
        assert_eq!(games[0]["status"], "awaiting_opponent");
        assert_eq!(games[0]["moves"], 0);
    }

    #[tokio::test]
    async fn test_game_state_of_new_game() {
        let registry = registry();
        let created = registry.create_session(SideChoice::White).await;

        let uri = format!("/games/{}/state", created.session_id);
        let (status, json) = call(router(registry), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json["fen"],
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        );
        assert_eq!(json["moves"], serde_json::json!([]));
        assert_eq!(json["legalMoves"].as_array().unwrap().len(), 20);
        assert_eq!(json["turn"], "white");
        assert_eq!(json["status"], "awaiting_opponent");
        assert_eq!(json["gameOver"], false);
        assert!(json["outcome"].is_null());
        assert!(json["winner"].is_null());
    }

    #[tokio::test]
    async fn test_game_state_after_checkmate() {
        use quickchess_protocol::MoveToken;
        use quickchess_session::Outbox;
        use quickchess_transport::ConnectionId;

        let registry = registry();
        let created = registry.create_session(SideChoice::White).await;
        let handle = registry.lookup(&created.session_id).await.unwrap();
        let (a, _rx_a) = Outbox::channel(ConnectionId::new(1));
        let (b, _rx_b) = Outbox::channel(ConnectionId::new(2));
        handle.attach(Role::A, a).await.unwrap();
        handle.attach(Role::B, b).await.unwrap();
        let plies = [
            (Role::A, 1, "f2f3"),
            (Role::B, 2, "e7e5"),
            (Role::A, 1, "g2g4"),
            (Role::B, 2, "d8h4"),
        ];
        for (role, conn, t) in plies {
            handle
                .submit_move(role, ConnectionId::new(conn), MoveToken::new(t))
                .await
                .unwrap();
        }

        let uri = format!("/games/{}/state", created.session_id);
        let (status, json) = call(router(registry), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["moves"], serde_json::json!(["f2f3", "e7e5", "g2g4", "d8h4"]));
        assert_eq!(json["turn"], "white");
        assert_eq!(json["status"], "terminated");
        assert_eq!(json["gameOver"], true);
        assert_eq!(json["outcome"], "checkmate");
        assert_eq!(json["winner"], "black");
        assert_eq!(json["legalMoves"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_game_state_unknown_game_is_404() {
        let (status, json) = call(router(registry()), get("/games/nope/state")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "game nope not found");
    }

    #[tokio::test]
    async fn test_players_lists_both_roles() {
        let registry = registry();
        let created = registry.create_session(SideChoice::Black).await;

        let uri = format!("/players?game-id={}", created.session_id);
        let (status, json) = call(router(registry), get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "player1", "color": "black", "connected": false},
                {"role": "player2", "color": "white", "connected": false},
            ])
        );
    }

    #[tokio::test]
    async fn test_players_requires_game_id() {
        let (status, _) = call(router(registry()), get("/players")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ping() {
        let (status, json) = call(router(registry()), get("/ping")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "server running");
    }
}
