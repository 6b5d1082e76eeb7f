//! Table configuration models.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rule variant handed to the hand-rules engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    #[default]
    Default,
    ShortDeck,
    Omaha,
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Default => write!(f, "default"),
            Rule::ShortDeck => write!(f, "short_deck"),
            Rule::Omaha => write!(f, "omaha"),
        }
    }
}

/// Competition mode a table runs under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Cash,
    Tournament,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Cash => write!(f, "cash"),
            Mode::Tournament => write!(f, "tournament"),
        }
    }
}

/// Immutable table metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Owning competition
    pub competition_id: String,

    pub rule: Rule,

    pub mode: Mode,

    /// Maximum table lifetime in seconds
    pub max_duration: i64,

    /// Number of seats
    pub table_max_seat_count: usize,

    /// Minimum participants needed to open a hand
    pub table_min_player_count: usize,

    pub min_chip_unit: i64,

    /// Seconds a player has to act
    pub action_time: i64,
}

impl Default for TableMeta {
    fn default() -> Self {
        Self {
            competition_id: String::new(),
            rule: Rule::Default,
            mode: Mode::Cash,
            max_duration: 3600,
            table_max_seat_count: 9,
            table_min_player_count: 2,
            min_chip_unit: 10,
            action_time: 10,
        }
    }
}

/// A player entering a table with chips, optionally at a reserved seat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlayer {
    pub player_id: String,
    pub redeem_chips: i64,
    pub seat: Option<usize>,
}

impl JoinPlayer {
    /// Player taking any free seat
    pub fn new(player_id: impl Into<String>, redeem_chips: i64) -> Self {
        Self {
            player_id: player_id.into(),
            redeem_chips,
            seat: None,
        }
    }
}

/// Setting used to create a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TableSetting {
    /// Table ID; a random one is generated when empty
    pub table_id: String,
    pub meta: TableMeta,
    /// Players seated on creation
    pub join_players: Vec<JoinPlayer>,
}

impl TableSetting {
    /// Validate setting
    pub fn validate(&self) -> Result<(), String> {
        if self.meta.table_max_seat_count == 0 {
            return Err("Table must have at least one seat".to_string());
        }

        if self.join_players.len() > self.meta.table_max_seat_count {
            return Err(format!(
                "{} join players exceed {} seats",
                self.join_players.len(),
                self.meta.table_max_seat_count
            ));
        }

        Ok(())
    }
}

/// Timing knobs of a table engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEngineOptions {
    /// Delay between a settled hand and the next open
    pub interval: Duration,

    /// Retries after a failed open before giving up
    pub open_game_retries: u32,

    /// Delay between open retries
    pub open_game_retry_delay: Duration,

    /// How long the join barrier waits before auto-joining players
    pub join_timeout: Duration,
}

impl Default for TableEngineOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(6),
            open_game_retries: 7,
            open_game_retry_delay: Duration::from_secs(3),
            join_timeout: Duration::from_secs(15),
        }
    }
}

impl TableEngineOptions {
    /// Validate options
    pub fn validate(&self) -> Result<(), String> {
        if self.join_timeout.is_zero() {
            return Err("Join timeout must be greater than zero".to_string());
        }

        if self.open_game_retries > 0 && self.open_game_retry_delay.is_zero() {
            return Err("Open game retry delay must be greater than zero".to_string());
        }

        Ok(())
    }
}
