//! Tests for the lobby poll task.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use prompt_whispers::{
    ApiError, ApiErrorKind, Lobby, LobbyEvent, LobbyRole, LobbySource, LobbyWatcher, Player,
};
use tokio::sync::mpsc::UnboundedReceiver;

/// Serves queued lobbies in order, then repeats the last one.
#[derive(Clone, Default)]
struct FakeLobby {
    queue: Arc<Mutex<VecDeque<Result<Lobby, ApiError>>>>,
    last: Arc<Mutex<Option<Lobby>>>,
}

impl FakeLobby {
    fn with(lobbies: Vec<Result<Lobby, ApiError>>) -> Self {
        let source = Self::default();
        source.queue.lock().expect("queue lock").extend(lobbies);
        source
    }
}

#[async_trait::async_trait]
impl LobbySource for FakeLobby {
    async fn fetch_lobby(&self) -> Result<Lobby, ApiError> {
        let next = self.queue.lock().expect("queue lock").pop_front();
        let mut last = self.last.lock().expect("last lock");
        match next {
            Some(Ok(lobby)) => {
                *last = Some(lobby.clone());
                Ok(lobby)
            }
            Some(Err(e)) => Err(e),
            None => last
                .clone()
                .ok_or_else(|| ApiError::new(ApiErrorKind::Transport, "nothing queued")),
        }
    }
}

fn player(id: &str) -> Player {
    Player::new(id.to_string(), format!("{}@example.com", id))
}

fn lobby(players: &[&str], game_id: Option<&str>) -> Lobby {
    Lobby::new(
        "l1".to_string(),
        player("host"),
        players.iter().map(|id| player(id)).collect(),
        game_id.map(str::to_string),
        game_id.is_some(),
        false,
    )
}

async fn next(rx: &mut UnboundedReceiver<LobbyEvent>) -> LobbyEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event within timeout")
        .expect("watcher still running")
}

#[tokio::test]
async fn test_unchanged_lobby_is_reported_once() {
    let source = FakeLobby::with(vec![
        Ok(lobby(&["host"], None)),
        Ok(lobby(&["host"], None)),
        Ok(lobby(&["host"], None)),
        Ok(lobby(&["host", "guest"], None)),
        Ok(lobby(&["host", "guest"], Some("g1"))),
    ]);
    let (_watcher, mut rx) =
        LobbyWatcher::start(source, "guest".to_string(), Duration::from_millis(5));

    match next(&mut rx).await {
        LobbyEvent::Updated { lobby, role } => {
            assert_eq!(lobby.players().len(), 1);
            assert_eq!(role, LobbyRole::Visitor);
        }
        other => panic!("expected the first lobby, got {:?}", other),
    }

    match next(&mut rx).await {
        LobbyEvent::Updated { lobby, role } => {
            assert_eq!(lobby.players().len(), 2);
            assert_eq!(role, LobbyRole::Member);
        }
        other => panic!("expected the joined lobby, got {:?}", other),
    }

    assert_eq!(
        next(&mut rx).await,
        LobbyEvent::GameStarted {
            game_id: "g1".to_string()
        }
    );
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_fetch_failures_are_counted() {
    let source = FakeLobby::with(vec![
        Err(ApiError::status(500, "boom")),
        Err(ApiError::status(500, "boom")),
        Ok(lobby(&["host"], None)),
    ]);
    let (watcher, mut rx) =
        LobbyWatcher::start(source, "host".to_string(), Duration::from_millis(5));

    assert!(matches!(
        next(&mut rx).await,
        LobbyEvent::FetchFailed { consecutive: 1, .. }
    ));
    assert!(matches!(
        next(&mut rx).await,
        LobbyEvent::FetchFailed { consecutive: 2, .. }
    ));
    assert!(matches!(
        next(&mut rx).await,
        LobbyEvent::Updated {
            role: LobbyRole::Host,
            ..
        }
    ));

    assert!(watcher.is_running());
    watcher.stop().await;
}

#[tokio::test]
async fn test_started_lobby_without_game_id_keeps_watching() {
    let broken = Lobby::new(
        "l1".to_string(),
        player("host"),
        vec![player("host")],
        None,
        true,
        false,
    );
    let source = FakeLobby::with(vec![Ok(broken), Ok(lobby(&["host"], Some("g7")))]);
    let (_watcher, mut rx) =
        LobbyWatcher::start(source, "host".to_string(), Duration::from_millis(5));

    assert!(matches!(next(&mut rx).await, LobbyEvent::Updated { .. }));
    assert_eq!(
        next(&mut rx).await,
        LobbyEvent::GameStarted {
            game_id: "g7".to_string()
        }
    );
}

#[tokio::test]
async fn test_zero_interval_is_clamped() {
    let source = FakeLobby::with(vec![Ok(lobby(&["host"], None))]);
    let (watcher, mut rx) = LobbyWatcher::start(source, "host".to_string(), Duration::ZERO);

    assert!(matches!(next(&mut rx).await, LobbyEvent::Updated { .. }));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(watcher.is_running());
    watcher.stop().await;
}
