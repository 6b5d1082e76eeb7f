//! Competition state models and the canonical JSON snapshot.

use crate::table::{
    JoinPlayer as TableJoinPlayer, Mode, PlayerId, Rule, Table, TableBlindState, TableId,
    TableMeta, TableSetting,
};
use serde::{Deserialize, Serialize};

pub type CompetitionId = String;

/// Final buy-in index meaning "stop buy-in immediately"
pub const UNSET_VALUE: i32 = -1;

/// Final buy-in index meaning "never stop buy-in"
pub const NO_STOP_BUY_IN_INDEX: i32 = -2;

/// Competition lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionStatus {
    #[default]
    Registering,
    DelayedBuyIn,
    StoppedBuyIn,
    End,
    AutoEnd,
    ForceEnd,
    Restoring,
}

impl CompetitionStatus {
    pub fn is_end(&self) -> bool {
        matches!(
            self,
            CompetitionStatus::End | CompetitionStatus::AutoEnd | CompetitionStatus::ForceEnd
        )
    }
}

impl std::fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompetitionStatus::Registering => write!(f, "registering"),
            CompetitionStatus::DelayedBuyIn => write!(f, "delayed_buy_in"),
            CompetitionStatus::StoppedBuyIn => write!(f, "stopped_buy_in"),
            CompetitionStatus::End => write!(f, "end"),
            CompetitionStatus::AutoEnd => write!(f, "auto_end"),
            CompetitionStatus::ForceEnd => write!(f, "force_end"),
            CompetitionStatus::Restoring => write!(f, "restoring"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompetitionPlayerStatus {
    #[default]
    Playing,
    ReBuyWaiting,
    Knockout,
    CashLeaving,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindLevel {
    /// -1 marks a break
    pub level: i32,
    pub sb: i64,
    pub bb: i64,
    pub ante: i64,
    /// Seconds
    pub duration: i64,
    pub allow_addon: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blind {
    pub id: String,
    pub initial_level: i32,
    #[serde(rename = "final_buy_in_level_idx")]
    pub final_buy_in_level_index: i32,
    pub dealer_blind_time: i64,
    pub levels: Vec<BlindLevel>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReBuySetting {
    pub max_time: u32,
    /// Seconds a busted player has to re-buy
    pub waiting_time: i64,
}

/// Immutable competition metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionMeta {
    pub blind: Blind,
    /// Seconds
    pub max_duration: i64,
    pub min_player_count: usize,
    pub max_player_count: usize,
    pub table_max_seat_count: usize,
    pub table_min_player_count: usize,
    pub rule: Rule,
    pub mode: Mode,
    pub re_buy_setting: ReBuySetting,
    pub action_time: i64,
    pub min_chip_unit: i64,
}

impl Default for CompetitionMeta {
    fn default() -> Self {
        Self {
            blind: Blind::default(),
            max_duration: 3600,
            min_player_count: 2,
            max_player_count: 9,
            table_max_seat_count: 9,
            table_min_player_count: 2,
            rule: Rule::Default,
            mode: Mode::Cash,
            re_buy_setting: ReBuySetting::default(),
            action_time: 10,
            min_chip_unit: 10,
        }
    }
}

/// Blind progression of a competition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindState {
    #[serde(rename = "final_buy_in_level_idx")]
    pub final_buy_in_level_index: i32,
    /// -1 until the blind clock starts
    pub current_level_index: i32,
    /// End timestamp of every level, 0 until the clock starts
    pub end_ats: Vec<i64>,
}

impl BlindState {
    /// Buy-in is closed for good
    pub fn is_stop_buy_in(&self) -> bool {
        match self.final_buy_in_level_index {
            NO_STOP_BUY_IN_INDEX => false,
            UNSET_VALUE => true,
            final_index => self.current_level_index > final_index,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionPlayer {
    pub player_id: PlayerId,
    #[serde(rename = "table_id")]
    pub current_table_id: Option<TableId>,
    #[serde(rename = "seat")]
    pub current_seat: Option<usize>,
    pub join_at: i64,

    pub status: CompetitionPlayerStatus,
    pub rank: Option<u32>,
    pub chips: i64,
    pub is_re_buying: bool,
    pub re_buy_end_at: Option<i64>,
    pub re_buy_times: u32,
    pub addon_times: u32,

    pub best_winning_pot_chips: i64,
    pub best_winning_combo: Vec<String>,
    pub best_winning_type: String,
    pub best_winning_power: i32,

    pub total_redeem_chips: i64,
    pub total_game_counts: u64,
    pub total_walk_times: u64,
    pub total_vpip_times: u64,
    pub total_fold_times: u64,
    pub total_preflop_fold_times: u64,
    pub total_flop_fold_times: u64,
    pub total_turn_fold_times: u64,
    pub total_river_fold_times: u64,
    pub total_action_times: u64,
    pub total_raise_times: u64,
    pub total_call_times: u64,
    pub total_check_times: u64,
    pub total_profit_times: u64,
}

impl CompetitionPlayer {
    /// Fresh player entering with `chips`
    pub fn new(player_id: PlayerId, table_id: Option<TableId>, chips: i64, join_at: i64) -> Self {
        Self {
            player_id,
            current_table_id: table_id,
            join_at,
            chips,
            total_redeem_chips: chips,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionRank {
    pub player_id: PlayerId,
    pub final_chips: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistic {
    pub total_buy_in_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionState {
    pub open_at: i64,
    pub disable_at: Option<i64>,
    pub start_at: Option<i64>,
    pub end_at: Option<i64>,
    pub blind_state: BlindState,
    pub players: Vec<CompetitionPlayer>,
    pub status: CompetitionStatus,
    pub tables: Vec<Table>,
    pub rankings: Vec<CompetitionRank>,
    pub statistic: Statistic,
}

/// Authoritative state of one competition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub update_serial: u64,
    pub id: CompetitionId,
    pub meta: CompetitionMeta,
    pub state: CompetitionState,
    pub update_at: i64,
}

impl Competition {
    /// Serialize the canonical snapshot
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn is_cash(&self) -> bool {
        self.meta.mode == Mode::Cash
    }

    pub fn is_end(&self) -> bool {
        self.state.status.is_end()
    }

    pub fn find_player_index(&self, player_id: &str) -> Option<usize> {
        self.state
            .players
            .iter()
            .position(|p| p.player_id == player_id)
    }

    pub fn find_player_mut(&mut self, player_id: &str) -> Option<&mut CompetitionPlayer> {
        self.state
            .players
            .iter_mut()
            .find(|p| p.player_id == player_id)
    }

    pub fn find_table_index(&self, table_id: &str) -> Option<usize> {
        self.state.tables.iter().position(|t| t.id == table_id)
    }

    /// Players still holding chips
    pub fn playing_player_count(&self) -> usize {
        self.state.players.iter().filter(|p| p.chips > 0).count()
    }

    pub fn is_stop_buy_in(&self) -> bool {
        self.state.blind_state.is_stop_buy_in()
    }

    /// Current blind level, or an empty level before the clock starts
    pub fn current_blind_level(&self) -> BlindLevel {
        usize::try_from(self.state.blind_state.current_level_index)
            .ok()
            .and_then(|idx| self.meta.blind.levels.get(idx))
            .cloned()
            .unwrap_or_default()
    }

    /// Blind amounts to push to tables
    pub fn current_blind_data(&self) -> TableBlindState {
        let level = self.current_blind_level();
        let dealer = if self.meta.blind.dealer_blind_time > 0 {
            level.ante * (self.meta.blind.dealer_blind_time - 1)
        } else {
            0
        };
        TableBlindState::new(level.level, level.ante, dealer, level.sb, level.bb)
    }

    pub fn is_breaking(&self) -> bool {
        self.current_blind_level().level == -1
    }

    /// Table setting derived from this competition's metadata
    pub fn table_setting(&self, setting: &CompetitionTableSetting) -> TableSetting {
        TableSetting {
            table_id: setting.table_id.clone(),
            meta: TableMeta {
                competition_id: self.id.clone(),
                rule: self.meta.rule,
                mode: self.meta.mode,
                max_duration: self.meta.max_duration,
                table_max_seat_count: self.meta.table_max_seat_count,
                table_min_player_count: self.meta.table_min_player_count,
                min_chip_unit: self.meta.min_chip_unit,
                action_time: self.meta.action_time,
            },
            join_players: setting.join_players.clone(),
        }
    }
}

/// Table created together with a competition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionTableSetting {
    pub table_id: TableId,
    pub join_players: Vec<TableJoinPlayer>,
}

/// Setting used to create a competition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionSetting {
    pub competition_id: CompetitionId,
    pub meta: CompetitionMeta,
    #[serde(rename = "start_game_at")]
    pub start_at: Option<i64>,
    #[serde(rename = "disable_game_at")]
    pub disable_at: i64,
    pub table_settings: Vec<CompetitionTableSetting>,
}

impl CompetitionSetting {
    /// Validate setting against the current time
    pub fn validate(&self, now: i64) -> Result<(), String> {
        if self.start_at.is_some_and(|start_at| start_at < now) {
            return Err("Start time is in the past".to_string());
        }

        if self.disable_at < now {
            return Err("Disable time is in the past".to_string());
        }

        if self.meta.blind.levels.is_empty() {
            return Err("Blind must have at least one level".to_string());
        }

        if let Some(table) = self
            .table_settings
            .iter()
            .find(|t| t.join_players.len() > self.meta.table_max_seat_count)
        {
            return Err(format!(
                "Table {} has more join players than {} seats",
                table.table_id, self.meta.table_max_seat_count
            ));
        }

        Ok(())
    }
}

/// Player buying in or re-buying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinPlayer {
    pub player_id: PlayerId,
    pub redeem_chips: i64,
}

impl JoinPlayer {
    pub fn new(player_id: impl Into<PlayerId>, redeem_chips: i64) -> Self {
        Self {
            player_id: player_id.into(),
            redeem_chips,
        }
    }
}
