//! Snapshot builders shared by the integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use prompt_whispers::{Game, GamePhase, Player, Turn, TurnContent};

fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_700_000_000 + seconds, 0).expect("valid timestamp")
}

/// A prompt turn.
pub fn prompt(id: &str, text: &str) -> Turn {
    Turn::new(
        id.to_string(),
        TurnContent::Prompt(text.to_string()),
        None,
        at(0),
    )
}

/// An image turn.
pub fn image(id: &str, url: &str) -> Turn {
    Turn::new(
        id.to_string(),
        TurnContent::Image(url.to_string()),
        None,
        at(1),
    )
}

/// Players `p0`, `p1`, ...
pub fn players(count: usize) -> Vec<Player> {
    (0..count)
        .map(|i| Player::new(format!("p{}", i), format!("player{}@example.com", i)))
        .collect()
}

/// A game with `players.len()` players and the given rounds.
pub fn game(player_count: usize, rounds: Vec<Vec<Turn>>, phase: GamePhase) -> Game {
    Game::new("g1".to_string(), players(player_count), rounds, phase)
}

/// Rounds where round `i` holds `cycles` prompt/image pairs.
pub fn rounds_with_cycles(player_count: usize, cycles: usize) -> Vec<Vec<Turn>> {
    (0..player_count)
        .map(|r| {
            (0..cycles)
                .flat_map(|c| {
                    [
                        prompt(&format!("r{}p{}", r, c), "a prompt"),
                        image(&format!("r{}i{}", r, c), &format!("https://img/{}/{}", r, c)),
                    ]
                })
                .collect()
        })
        .collect()
}
