//! Table state models and the canonical JSON snapshot.

use super::{
    config::{Rule, TableMeta},
    game::{GameRound, GameState},
};
use serde::{Deserialize, Serialize};

pub type TableId = String;
pub type PlayerId = String;

/// Table lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableStatus {
    #[default]
    #[serde(rename = "table_created")]
    Created,
    #[serde(rename = "table_pausing")]
    Pausing,
    #[serde(rename = "table_restoring")]
    Restoring,
    #[serde(rename = "table_balancing")]
    Balancing,
    #[serde(rename = "table_closed")]
    Closed,
    #[serde(rename = "table_game_opened")]
    GameOpened,
    #[serde(rename = "table_game_playing")]
    GamePlaying,
    #[serde(rename = "table_game_settled")]
    GameSettled,
    #[serde(rename = "table_game_standby")]
    GameStandby,
}

impl TableStatus {
    /// Statuses during which a hand's participant set is fixed
    pub fn is_in_hand(&self) -> bool {
        matches!(
            self,
            TableStatus::GameOpened | TableStatus::GamePlaying | TableStatus::GameSettled
        )
    }

    /// Statuses from which a new hand may be opened
    pub fn can_open_game(&self) -> bool {
        matches!(
            self,
            TableStatus::Created
                | TableStatus::GameStandby
                | TableStatus::Pausing
                | TableStatus::Balancing
                | TableStatus::Restoring
        )
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableStatus::Created => write!(f, "table_created"),
            TableStatus::Pausing => write!(f, "table_pausing"),
            TableStatus::Restoring => write!(f, "table_restoring"),
            TableStatus::Balancing => write!(f, "table_balancing"),
            TableStatus::Closed => write!(f, "table_closed"),
            TableStatus::GameOpened => write!(f, "table_game_opened"),
            TableStatus::GamePlaying => write!(f, "table_game_playing"),
            TableStatus::GameSettled => write!(f, "table_game_settled"),
            TableStatus::GameStandby => write!(f, "table_game_standby"),
        }
    }
}

/// Table position of a hand participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Unknown,
    Dealer,
    Sb,
    Bb,
    Ug,
    Ug2,
    Ug3,
    Mp,
    Mp2,
    Hj,
    Co,
}

/// Blind amounts pushed to the table; amounts are unset until the first update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableBlindState {
    /// 0 = never set, -1 = break
    pub level: i32,
    pub ante: Option<i64>,
    pub dealer: Option<i64>,
    pub sb: Option<i64>,
    pub bb: Option<i64>,
}

impl TableBlindState {
    pub fn new(level: i32, ante: i64, dealer: i64, sb: i64, bb: i64) -> Self {
        Self {
            level,
            ante: Some(ante),
            dealer: Some(dealer),
            sb: Some(sb),
            bb: Some(bb),
        }
    }

    pub fn is_set(&self) -> bool {
        self.level != 0
            && self.ante.is_some()
            && self.dealer.is_some()
            && self.sb.is_some()
            && self.bb.is_some()
    }

    pub fn is_breaking(&self) -> bool {
        self.level == -1
    }
}

/// Per-hand counters of one player
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlayerGameStatistics {
    pub action_times: u32,
    pub raise_times: u32,
    pub call_times: u32,
    pub check_times: u32,
    pub is_fold: bool,
    pub fold_round: Option<GameRound>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlayerState {
    pub player_id: PlayerId,
    pub seat: usize,
    pub positions: Vec<Position>,
    /// Eligible for the current hand
    pub is_participated: bool,
    /// Dead-button exclusion flag
    pub is_between_dealer_bb: bool,
    pub bankroll: i64,
    /// Has acknowledged joining
    pub is_in: bool,
    pub game_statistics: TablePlayerGameStatistics,
}

impl TablePlayerState {
    pub fn is_alive(&self) -> bool {
        self.bankroll > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableState {
    pub status: TableStatus,
    pub start_at: Option<i64>,
    /// Seat -> index into `player_states`
    pub seat_map: Vec<Option<usize>>,
    pub blind_state: TableBlindState,
    pub current_dealer_seat: Option<usize>,
    pub current_bb_seat: Option<usize>,
    pub player_states: Vec<TablePlayerState>,
    pub game_count: u32,
    /// Participants of the current hand, dealer first
    pub game_player_indexes: Vec<usize>,
    pub game_state: Option<GameState>,
}

/// Authoritative state of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub update_serial: u64,
    pub id: TableId,
    pub meta: TableMeta,
    pub state: TableState,
    pub update_at: i64,
}

impl Table {
    pub fn new(id: TableId, meta: TableMeta, now: i64) -> Self {
        let seat_map = vec![None; meta.table_max_seat_count];
        Self {
            update_serial: 0,
            id,
            meta,
            state: TableState {
                seat_map,
                ..TableState::default()
            },
            update_at: now,
        }
    }

    /// Serialize the canonical snapshot
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn rule(&self) -> Rule {
        self.meta.rule
    }

    pub fn find_player_index(&self, player_id: &str) -> Option<usize> {
        self.state
            .player_states
            .iter()
            .position(|p| p.player_id == player_id)
    }

    /// Position of a player-list index within the current hand's rotation
    pub fn find_game_player_index(&self, player_idx: usize) -> Option<usize> {
        self.state
            .game_player_indexes
            .iter()
            .position(|&idx| idx == player_idx)
    }

    pub fn alive_player_count(&self) -> usize {
        self.state
            .player_states
            .iter()
            .filter(|p| p.is_alive())
            .count()
    }

    /// Joined players that still have chips
    pub fn ready_player_count(&self) -> usize {
        self.state
            .player_states
            .iter()
            .filter(|p| p.is_in && p.is_alive())
            .count()
    }

    /// Break level, or too few players with chips to keep playing
    pub fn should_pause(&self) -> bool {
        self.state.blind_state.is_breaking()
            || self.alive_player_count() < self.meta.table_min_player_count
    }

    pub fn is_full(&self) -> bool {
        self.state.player_states.len() >= self.meta.table_max_seat_count
    }
}

/// Per-player action at the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerGameAction {
    Ready,
    Pay(i64),
    Pass,
    Fold,
    Check,
    Call,
    Allin,
    Bet(i64),
    Raise(i64),
}

impl PlayerGameAction {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerGameAction::Ready => "ready",
            PlayerGameAction::Pay(_) => "pay",
            PlayerGameAction::Pass => "pass",
            PlayerGameAction::Fold => "fold",
            PlayerGameAction::Check => "check",
            PlayerGameAction::Call => "call",
            PlayerGameAction::Allin => "allin",
            PlayerGameAction::Bet(_) => "bet",
            PlayerGameAction::Raise(_) => "raise",
        }
    }

    /// Actions that move the hand forward in a betting round
    pub fn is_wager(&self) -> bool {
        !matches!(
            self,
            PlayerGameAction::Ready | PlayerGameAction::Pay(_) | PlayerGameAction::Pass
        )
    }

    pub fn chips(&self) -> i64 {
        match self {
            PlayerGameAction::Pay(chips)
            | PlayerGameAction::Bet(chips)
            | PlayerGameAction::Raise(chips) => *chips,
            _ => 0,
        }
    }
}

/// Actions applied to every participant at once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAction {
    ReadyForAll,
    PayAnte,
    PayBlinds,
}

/// Record of a single wager action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePlayerGameAction {
    pub competition_id: String,
    pub table_id: TableId,
    pub game_id: String,
    pub game_count: u32,
    pub round: GameRound,
    pub update_at: i64,
    pub player_id: PlayerId,
    pub seat: usize,
    pub positions: Vec<Position>,
    pub action: String,
    pub chips: i64,
    pub bankroll: i64,
    pub wager: i64,
    pub pot: i64,
}
