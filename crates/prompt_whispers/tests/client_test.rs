//! Tests for the REST client against an in-process fake backend.

use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use prompt_whispers::{
    ApiErrorKind, ClientConfig, GamePhase, Lobby, Player, PromptCreate, RestGameClient,
};
use serde_json::{Value, json};

#[derive(Clone, Default)]
struct Backend {
    requests: Arc<Mutex<Vec<String>>>,
}

impl Backend {
    fn record(&self, line: String) {
        self.requests.lock().expect("requests lock").push(line);
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }
}

fn round_json(game_id: &str, state: &str) -> Value {
    json!({
        "gameId": game_id,
        "turns": [
            { "id": "t1", "type": "PROMPT", "content": "cat", "createdAt": "2024-01-15T10:00:00Z" }
        ],
        "gameState": state
    })
}

fn lobby_json(id: &str, started: bool) -> Value {
    let game_id = started.then_some("g1");
    json!({
        "id": id,
        "host": { "id": "u1", "email": "ada@example.com" },
        "players": [{ "id": "u1", "email": "ada@example.com" }],
        "gameId": game_id,
        "isGameStarted": started,
        "isGameFinished": false
    })
}

async fn get_round(State(b): State<Backend>, Path(id): Path<String>) -> Result<Json<Value>, StatusCode> {
    b.record(format!("GET /api/games/{}", id));
    if id == "missing" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(round_json(&id, "WAIT_FOR_PROMPTS")))
}

async fn delete_game(State(b): State<Backend>, Path(id): Path<String>) -> StatusCode {
    b.record(format!("DELETE /api/games/{}", id));
    StatusCode::OK
}

async fn get_game(State(b): State<Backend>, Path(id): Path<String>) -> Json<Value> {
    b.record(format!("GET /api/games/{}/all", id));
    Json(json!({
        "id": id,
        "players": [{ "id": "u1", "email": "ada@example.com" }],
        "rounds": [[]],
        "gameState": "REQUEST_NEW_PROMPTS"
    }))
}

async fn list_games(State(b): State<Backend>) -> Json<Value> {
    b.record("GET /api/games".to_string());
    Json(json!([
        { "id": "g1", "gameState": "FINISHED", "createdAt": "2024-01-01T00:00:00Z" },
        { "id": "g2", "gameState": "NEW" }
    ]))
}

async fn create_game(State(b): State<Backend>, Json(lobby): Json<Value>) -> Json<Value> {
    b.record(format!("POST /api/games lobby={}", lobby["id"].as_str().unwrap_or("?")));
    Json(round_json("g9", "REQUEST_NEW_PROMPTS"))
}

async fn submit_prompt(
    State(b): State<Backend>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
    b.record(format!("POST /api/games/{}/prompt {}", id, prompt));
    if prompt.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "empty prompt" })));
    }
    (StatusCode::OK, Json(round_json(&id, "WAIT_FOR_IMAGES")))
}

async fn generate_image(State(b): State<Backend>, Path(id): Path<String>) -> Json<Value> {
    b.record(format!("POST /api/games/{}/generateImage", id));
    Json(round_json(&id, "WAIT_FOR_IMAGES"))
}

async fn create_lobby(State(b): State<Backend>) -> Json<Value> {
    b.record("POST /api/lobbies".to_string());
    Json(lobby_json("l1", false))
}

async fn get_lobby(State(b): State<Backend>, Path(id): Path<String>) -> Json<Value> {
    b.record(format!("GET /api/lobbies/{}", id));
    Json(lobby_json(&id, true))
}

async fn join_lobby(State(b): State<Backend>, Path(id): Path<String>) -> Json<Value> {
    b.record(format!("PUT /api/lobbies/{}/join", id));
    Json(lobby_json(&id, false))
}

async fn leave_lobby(State(b): State<Backend>, Path(id): Path<String>) -> Json<Value> {
    b.record(format!("PUT /api/lobbies/{}/leave", id));
    Json(lobby_json(&id, false))
}

async fn delete_lobby(State(b): State<Backend>, Path(id): Path<String>) -> StatusCode {
    b.record(format!("DELETE /api/lobbies/{}", id));
    StatusCode::FORBIDDEN
}

async fn current_user(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if cookie != "SESSION=abc" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(json!({ "id": "u1", "email": "ada@example.com" })))
}

async fn spawn_backend() -> (String, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/games", get(list_games).post(create_game))
        .route("/api/games/{id}", get(get_round).delete(delete_game))
        .route("/api/games/{id}/all", get(get_game))
        .route("/api/games/{id}/prompt", post(submit_prompt))
        .route("/api/games/{id}/generateImage", post(generate_image))
        .route("/api/lobbies", post(create_lobby))
        .route("/api/lobbies/{id}", get(get_lobby).delete(delete_lobby))
        .route("/api/lobbies/{id}/join", put(join_lobby))
        .route("/api/lobbies/{id}/leave", put(leave_lobby))
        .route("/api/users", get(current_user))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });
    (format!("http://{}", addr), backend)
}

fn client(url: &str) -> RestGameClient {
    RestGameClient::new(&ClientConfig::new(url)).expect("Valid client")
}

#[tokio::test]
async fn test_game_endpoints() {
    let (url, backend) = spawn_backend().await;
    let client = client(&url);

    let round = client.get_round("g1").await.expect("Round");
    assert_eq!(*round.game_state(), GamePhase::WaitForPrompts);

    let game = client.get_game("g1").await.expect("Game");
    assert_eq!(*game.game_state(), GamePhase::RequestNewPrompts);
    assert!(game.is_initialized());

    let games = client.list_games().await.expect("Games");
    assert_eq!(games.len(), 2);
    assert!(games[1].created_at().is_none());

    client.delete_game("g1").await.expect("Deleted");

    assert_eq!(
        backend.requests(),
        vec![
            "GET /api/games/g1",
            "GET /api/games/g1/all",
            "GET /api/games",
            "DELETE /api/games/g1",
        ]
    );
}

#[tokio::test]
async fn test_prompt_then_image() {
    let (url, backend) = spawn_backend().await;
    let client = client(&url);

    let round = client
        .submit_prompt("g1", &PromptCreate::new("a potato king".to_string()))
        .await
        .expect("Accepted");
    assert_eq!(*round.game_state(), GamePhase::WaitForImages);
    client.generate_image("g1").await.expect("Generated");

    assert_eq!(
        backend.requests(),
        vec![
            "POST /api/games/g1/prompt a potato king",
            "POST /api/games/g1/generateImage",
        ]
    );
}

#[tokio::test]
async fn test_error_statuses_are_reported() {
    let (url, _backend) = spawn_backend().await;
    let client = client(&url);

    let err = client.get_round("missing").await.expect_err("Not found");
    assert!(err.is_not_found());

    let err = client
        .submit_prompt("g1", &PromptCreate::new(String::new()))
        .await
        .expect_err("Rejected");
    assert_eq!(err.kind, ApiErrorKind::Status(400));
    assert!(err.message.contains("empty prompt"));

    let err = client.delete_lobby("l1").await.expect_err("Forbidden");
    assert_eq!(err.kind, ApiErrorKind::Status(403));
}

#[tokio::test]
async fn test_lobby_endpoints() {
    let (url, backend) = spawn_backend().await;
    let client = client(&url);

    let lobby = client.create_lobby().await.expect("Lobby");
    assert!(!lobby.is_game_started());
    client.join_lobby("l1").await.expect("Joined");
    client.leave_lobby("l1").await.expect("Left");
    let started = client.get_lobby("l1").await.expect("Lobby");
    assert_eq!(started.game_id().as_deref(), Some("g1"));

    let host = Player::new("u1".to_string(), "ada@example.com".to_string());
    let lobby = Lobby::new("l1".to_string(), host.clone(), vec![host], None, false, false);
    let round = client.create_game(&lobby).await.expect("Game created");
    assert_eq!(round.game_id(), "g9");

    assert_eq!(
        backend.requests(),
        vec![
            "POST /api/lobbies",
            "PUT /api/lobbies/l1/join",
            "PUT /api/lobbies/l1/leave",
            "GET /api/lobbies/l1",
            "POST /api/games lobby=l1",
        ]
    );
}

#[tokio::test]
async fn test_session_cookie_is_forwarded() {
    let (url, _backend) = spawn_backend().await;

    let anonymous = client(&url);
    let err = anonymous.current_user().await.expect_err("Unauthorized");
    assert_eq!(err.kind, ApiErrorKind::Status(401));

    let config = ClientConfig::new(&url).with_session_cookie("SESSION=abc");
    let logged_in = RestGameClient::new(&config).expect("Valid client");
    let user = logged_in.current_user().await.expect("User");
    assert_eq!(user.id(), "u1");
    assert_eq!(user.display_name(), "ada@example.com");
}

#[tokio::test]
async fn test_unreachable_backend_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr = listener.local_addr().expect("Local address");
    drop(listener);

    let client = client(&format!("http://{}", addr));
    let err = client.get_game("g1").await.expect_err("Connection refused");
    assert_eq!(err.kind, ApiErrorKind::Transport);
}

#[test]
fn test_invalid_cookie_is_a_config_error() {
    let config = ClientConfig::new("http://localhost:8080").with_session_cookie("bad\ncookie");
    assert!(RestGameClient::new(&config).is_err());
}

#[tokio::test]
async fn test_image_generation_outlives_request_timeout() {
    async fn slow_image(Path(id): Path<String>) -> Json<Value> {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        Json(round_json(&id, "REQUEST_NEW_PROMPTS"))
    }
    async fn slow_round(Path(id): Path<String>) -> Json<Value> {
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        Json(round_json(&id, "WAIT_FOR_PROMPTS"))
    }
    let app = Router::new()
        .route("/api/games/{id}", get(slow_round))
        .route("/api/games/{id}/generateImage", post(slow_image));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    std::io::Write::write_all(
        &mut file,
        format!(
            "base_url = \"http://{}\"\nrequest_timeout_ms = 100\nimage_timeout_ms = 5000\n",
            addr
        )
        .as_bytes(),
    )
    .expect("Failed to write config");
    let config = ClientConfig::from_file(file.path()).expect("Valid config");
    let client = RestGameClient::new(&config).expect("Valid client");

    let err = client.get_round("g1").await.expect_err("Timed out");
    assert_eq!(err.kind, ApiErrorKind::Transport);

    let round = client.generate_image("g1").await.expect("Generated");
    assert_eq!(*round.game_state(), GamePhase::RequestNewPrompts);
}
