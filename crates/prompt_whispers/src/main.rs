//! Prompt Whispers - headless client
//!
//! Plays, watches and replays Prompt Whispers games against a backend.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use prompt_whispers::{
    ClientConfig, GameHistory, GamePoller, GameReplay, Lobby, LobbyAction, LobbyEvent,
    LobbyRole, LobbyWatcher, PlayerId, PollEvent, RestGameClient, RestLobbySource, RestSnapshotSource,
    RoundIndex, RoundStateReconciler, Turn, TurnContent, ViewState,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ClientConfig::load(Some(cli.config.as_path()))?;
    if let Some(url) = cli.url {
        config = config.with_env_overrides(|key| {
            (key == prompt_whispers::ENV_URL).then(|| url.clone())
        })?;
    }
    let client = RestGameClient::new(&config)?;

    match cli.command {
        Command::Play { game_id, player_id } => {
            let player_id = resolve_player(&client, player_id).await?;
            run_play(&client, &config, game_id, player_id).await
        }
        Command::Lobby {
            lobby_id,
            player_id,
        } => {
            let player_id = resolve_player(&client, player_id).await?;
            run_lobby(&client, &config, lobby_id, player_id).await
        }
        Command::Replay { game_id, tab } => run_replay(&client, &game_id, tab).await,
        Command::History => run_history(&client).await,
    }
}

/// Uses the given player ID, or asks the backend who is logged in.
async fn resolve_player(client: &RestGameClient, player_id: Option<String>) -> Result<PlayerId> {
    if let Some(id) = player_id {
        return Ok(id);
    }
    let user = client
        .current_user()
        .await
        .context("No --player-id given and the backend did not report a logged-in user")?;
    info!(player_id = %user.id(), name = %user.display_name(), "Logged in");
    Ok(user.id().clone())
}

/// Polls a game and answers prompt requests from stdin until it finishes.
#[instrument(skip(client, config))]
async fn run_play(
    client: &RestGameClient,
    config: &ClientConfig,
    game_id: String,
    player_id: PlayerId,
) -> Result<()> {
    info!("Joining game");
    let source = RestSnapshotSource::new(client.clone(), game_id.clone());
    let reconciler = RoundStateReconciler::new(player_id);
    let (poller, mut events) = GamePoller::start(source, reconciler, config.poll_interval());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    PollEvent::ViewChanged(view) => print_view(&view),
                    PollEvent::Paused(view) => {
                        print_view(&view);
                        println!("Enter your prompt (max {} characters):", prompt_whispers::MAX_PROMPT_CHARS);
                    }
                    PollEvent::FetchFailed { consecutive, message } => {
                        debug!(consecutive, message = %message, "Still waiting for the server");
                    }
                    PollEvent::SubmitFailed { message } => {
                        println!("Prompt not accepted: {}", message);
                    }
                    PollEvent::ImageRequestFailed { message } => {
                        println!("Prompt sent, but the image request failed: {}", message);
                    }
                    PollEvent::Finished(view) => {
                        print_view(&view);
                        println!("Game over! Replay it with: prompt_whispers replay --game-id {}", game_id);
                        break;
                    }
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(text) if text.trim() == "quit" => break,
                    Some(text) => {
                        if !poller.submit_prompt(text) {
                            warn!("Poller has stopped, prompt dropped");
                        }
                    }
                    None => {
                        info!("Input closed, watching only");
                        match watch_without_input(&mut events).await {
                            WatchEnd::Finished => {
                                println!("Game over! Replay it with: prompt_whispers replay --game-id {}", game_id);
                            }
                            WatchEnd::InputRequired => {
                                println!("A prompt is requested but input is closed, leaving the game");
                            }
                            WatchEnd::Closed => {}
                        }
                        break;
                    }
                }
            }
        }
    }

    poller.stop().await;
    Ok(())
}

/// Why watching without input ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchEnd {
    /// The game finished.
    Finished,
    /// The poller paused for a prompt nobody can type.
    InputRequired,
    /// The poller went away.
    Closed,
}

/// Prints views until the game ends or a prompt is requested.
async fn watch_without_input(events: &mut UnboundedReceiver<PollEvent>) -> WatchEnd {
    while let Some(event) = events.recv().await {
        match event {
            PollEvent::ViewChanged(view) => print_view(&view),
            PollEvent::Paused(view) => {
                print_view(&view);
                return WatchEnd::InputRequired;
            }
            PollEvent::Finished(view) => {
                print_view(&view);
                return WatchEnd::Finished;
            }
            PollEvent::FetchFailed { .. }
            | PollEvent::SubmitFailed { .. }
            | PollEvent::ImageRequestFailed { .. } => {}
        }
    }
    WatchEnd::Closed
}

fn print_view(view: &ViewState) {
    match view.round_index() {
        RoundIndex::NotReady => println!("[{}] waiting for the game to start...", view.phase()),
        RoundIndex::Ready(i) => println!(
            "[{}] round {} ({} turns, {} cycles done)",
            view.phase(),
            i + 1,
            view.active_turns().len(),
            view.completed_image_turns()
        ),
    }
    match view.last_image() {
        Some(turn) => println!("  image: {}", turn.content().as_str()),
        None if !*view.finished() => println!("  (no image yet)"),
        None => {}
    }
}

/// Watches a lobby and follows it into the game once it starts.
#[instrument(skip(client, config))]
async fn run_lobby(
    client: &RestGameClient,
    config: &ClientConfig,
    lobby_id: Option<String>,
    player_id: PlayerId,
) -> Result<()> {
    let lobby_id = match lobby_id {
        Some(id) => id,
        None => {
            let lobby = client.create_lobby().await?;
            println!("Created lobby {}", lobby.id());
            lobby.id().clone()
        }
    };

    let source = RestLobbySource::new(client.clone(), lobby_id.clone());
    let (watcher, mut events) =
        LobbyWatcher::start(source, player_id.clone(), config.poll_interval());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut latest: Option<(Lobby, LobbyRole)> = None;

    let game_id = loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(LobbyEvent::Updated { lobby, role }) => {
                        println!("Lobby {} ({} players):", lobby.id(), lobby.players().len());
                        for player in lobby.players() {
                            println!("  - {}", player.display_name());
                        }
                        let actions: Vec<String> = role.actions().iter().map(|a| a.to_string().to_lowercase()).collect();
                        println!("You are {}. Available: {}", role.to_string().to_lowercase(), actions.join(", "));
                        latest = Some((lobby, role));
                    }
                    Some(LobbyEvent::FetchFailed { consecutive, message }) => {
                        debug!(consecutive, message = %message, "Lobby fetch failed");
                    }
                    Some(LobbyEvent::GameStarted { game_id }) => break Some(game_id),
                    None => break None,
                }
            }
            line = lines.next_line() => {
                let Some(text) = line? else { break None };
                let Some((lobby, role)) = latest.as_ref() else {
                    println!("Lobby not loaded yet");
                    continue;
                };
                let action = match text.trim() {
                    "join" => LobbyAction::Join,
                    "leave" => LobbyAction::Leave,
                    "start" => LobbyAction::StartGame,
                    "quit" => break None,
                    other => {
                        println!("Unknown command: {}", other);
                        continue;
                    }
                };
                if !role.actions().contains(&action) {
                    println!("Cannot {} as {}", action, role);
                    continue;
                }
                match action {
                    LobbyAction::Join => { client.join_lobby(&lobby_id).await?; }
                    LobbyAction::Leave => { client.leave_lobby(&lobby_id).await?; }
                    LobbyAction::StartGame => {
                        let round = client.create_game(lobby).await?;
                        break Some(round.game_id().clone());
                    }
                }
            }
        }
    };

    watcher.stop().await;

    match game_id {
        Some(game_id) => {
            println!("Game {} started", game_id);
            run_play(client, config, game_id, player_id).await
        }
        None => Ok(()),
    }
}

/// Prints every round of a game, or one tab.
#[instrument(skip(client))]
async fn run_replay(client: &RestGameClient, game_id: &str, tab: Option<usize>) -> Result<()> {
    let mut replay = GameReplay::load(client, game_id).await?;
    let tabs: Vec<usize> = match tab {
        Some(t) => vec![replay.select_tab(t)],
        None => (0..replay.tabs().len()).collect(),
    };

    for index in tabs {
        replay.select_tab(index);
        let name = replay.tabs().get(index).map(|s| s.to_string()).unwrap_or_default();
        println!("== {}", name);
        for turn in replay.active_turns() {
            print_turn(turn);
        }
    }
    Ok(())
}

fn print_turn(turn: &Turn) {
    match turn.content() {
        TurnContent::Prompt(text) => println!("  prompt: {}", text),
        TurnContent::Image(url) => println!("  image:  {}", url),
    }
}

/// Lists the logged-in player's games.
#[instrument(skip(client))]
async fn run_history(client: &RestGameClient) -> Result<()> {
    let history = GameHistory::load(client).await?;
    if history.is_empty() {
        println!("No games yet");
    }
    for game in history.games() {
        let created = game
            .created_at()
            .as_ref()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}  {}", game.id(), game.game_state(), created);
    }
    Ok(())
}
