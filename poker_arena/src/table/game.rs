//! Contract for the external hand-rules engine.
//!
//! The table engine never deals cards or evaluates hands. For every hand it
//! builds [`GameOptions`] from the current seating, asks a [`GameBackend`] for
//! a [`HandEngine`], and forwards player actions to it. Each call returns the
//! engine's new [`GameState`]; the table reacts to the event symbol carried in
//! [`GameStatus::current_event`].

use super::{config::Rule, errors::TableError, models::Position};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Betting round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameRound {
    #[default]
    Preflop,
    Flop,
    Turn,
    River,
}

impl std::fmt::Display for GameRound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameRound::Preflop => write!(f, "preflop"),
            GameRound::Flop => write!(f, "flop"),
            GameRound::Turn => write!(f, "turn"),
            GameRound::River => write!(f, "river"),
        }
    }
}

/// Events emitted by the hand engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameEvent {
    Started,
    Initialized,
    Prepared,
    ReadyRequested,
    AnteRequested,
    BlindsRequested,
    RoundInitialized,
    RoundPrepared,
    RoundStarted,
    RoundClosed,
    GameCompleted,
    GameClosed,
}

impl GameEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameEvent::Started => "Started",
            GameEvent::Initialized => "Initialized",
            GameEvent::Prepared => "Prepared",
            GameEvent::ReadyRequested => "ReadyRequested",
            GameEvent::AnteRequested => "AnteRequested",
            GameEvent::BlindsRequested => "BlindsRequested",
            GameEvent::RoundInitialized => "RoundInitialized",
            GameEvent::RoundPrepared => "RoundPrepared",
            GameEvent::RoundStarted => "RoundStarted",
            GameEvent::RoundClosed => "RoundClosed",
            GameEvent::GameCompleted => "GameCompleted",
            GameEvent::GameClosed => "GameClosed",
        }
    }
}

impl std::fmt::Display for GameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameEvent {
    type Err = TableError;

    fn from_str(symbol: &str) -> Result<Self, Self::Err> {
        let event = match symbol {
            "Started" => GameEvent::Started,
            "Initialized" => GameEvent::Initialized,
            "Prepared" => GameEvent::Prepared,
            "ReadyRequested" => GameEvent::ReadyRequested,
            "AnteRequested" => GameEvent::AnteRequested,
            "BlindsRequested" => GameEvent::BlindsRequested,
            "RoundInitialized" => GameEvent::RoundInitialized,
            "RoundPrepared" => GameEvent::RoundPrepared,
            "RoundStarted" => GameEvent::RoundStarted,
            "RoundClosed" => GameEvent::RoundClosed,
            "GameCompleted" => GameEvent::GameCompleted,
            "GameClosed" => GameEvent::GameClosed,
            other => return Err(TableError::UnknownGameEvent(other.to_string())),
        };
        Ok(event)
    }
}

/// Hand engine rejections
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("action not allowed during {0}")]
    ActionNotAllowed(String),

    #[error("not player {0}'s turn")]
    NotPlayerTurn(usize),

    #[error("unknown game player {0}")]
    UnknownPlayer(usize),

    #[error("insufficient chips")]
    InsufficientChips,

    #[error("game already closed")]
    GameClosed,
}

/// Forced bets of a hand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSetting {
    pub dealer: i64,
    pub sb: i64,
    pub bb: i64,
}

/// Per-seat entry of [`GameOptions`], in dealer-first rotation order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePlayerSetting {
    pub bankroll: i64,
    pub positions: Vec<Position>,
}

/// Everything the hand engine needs to play one hand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOptions {
    pub rule: Rule,
    pub hole_cards_count: usize,
    pub required_hole_cards_count: usize,
    pub ante: i64,
    pub blind: BlindSetting,
    pub players: Vec<GamePlayerSetting>,
}

impl GameOptions {
    /// Deck and hole-card layout for a rule variant
    pub fn for_rule(rule: Rule) -> Self {
        let (hole_cards_count, required_hole_cards_count) = match rule {
            Rule::Default | Rule::ShortDeck => (2, 0),
            Rule::Omaha => (4, 2),
        };

        Self {
            rule,
            hole_cards_count,
            required_hole_cards_count,
            ante: 0,
            blind: BlindSetting::default(),
            players: Vec::new(),
        }
    }
}

/// Best hand of a player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combination {
    #[serde(rename = "type")]
    pub kind: String,
    pub cards: Vec<String>,
    pub power: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePlayerState {
    pub idx: usize,
    pub positions: Vec<Position>,
    pub bankroll: i64,
    pub initial_stack_size: i64,
    pub stack_size: i64,
    pub wager: i64,
    pub fold: bool,
    /// Voluntarily put chips in the pot
    pub vpip: bool,
    pub allowed_actions: Vec<String>,
    pub combination: Combination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatus {
    /// Event symbol, e.g. `ReadyRequested`
    pub current_event: String,
    pub round: GameRound,
    pub current_player: usize,
    pub current_raiser: Option<usize>,
    pub current_wager: i64,
    pub pot: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub idx: usize,
    #[serde(rename = "final")]
    pub final_chips: i64,
    pub changed: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub players: Vec<PlayerResult>,
}

/// Opaque hand state owned by the hand engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: String,
    pub players: Vec<GamePlayerState>,
    pub status: GameStatus,
    pub result: Option<GameResult>,
}

impl GameState {
    /// Parse the current event symbol
    pub fn event(&self) -> Result<GameEvent, TableError> {
        self.status.current_event.parse()
    }

    pub fn player(&self, idx: usize) -> Option<&GamePlayerState> {
        self.players.iter().find(|p| p.idx == idx)
    }
}

/// One running hand.
///
/// `idx` arguments are game player indexes, i.e. positions in the dealer-first
/// rotation passed through [`GameOptions::players`].
pub trait HandEngine: Send {
    fn start(&mut self) -> Result<GameState, GameError>;
    fn state(&self) -> &GameState;

    fn ready_for_all(&mut self) -> Result<GameState, GameError>;
    fn pay_ante(&mut self) -> Result<GameState, GameError>;
    fn pay_blinds(&mut self) -> Result<GameState, GameError>;

    fn ready(&mut self, idx: usize) -> Result<GameState, GameError>;
    fn pay(&mut self, idx: usize, chips: i64) -> Result<GameState, GameError>;
    fn pass(&mut self, idx: usize) -> Result<GameState, GameError>;
    fn fold(&mut self, idx: usize) -> Result<GameState, GameError>;
    fn check(&mut self, idx: usize) -> Result<GameState, GameError>;
    fn call(&mut self, idx: usize) -> Result<GameState, GameError>;
    fn allin(&mut self, idx: usize) -> Result<GameState, GameError>;
    fn bet(&mut self, idx: usize, chips: i64) -> Result<GameState, GameError>;
    fn raise(&mut self, idx: usize, chip_level: i64) -> Result<GameState, GameError>;
}

/// Factory producing a fresh [`HandEngine`] per hand
pub trait GameBackend: Send + Sync {
    fn create_game(&self, options: GameOptions) -> Box<dyn HandEngine>;
}
