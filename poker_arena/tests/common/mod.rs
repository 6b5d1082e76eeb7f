//! Shared fixtures: a scripted hand engine and competition builders.

#![allow(dead_code)]

use poker_arena::{
    CompetitionEvent, Manager,
    competition::{
        Blind, BlindLevel, Competition, CompetitionMeta, CompetitionPlayer, CompetitionSetting,
        CompetitionTableSetting, NativeTableManagerBackend, ReBuySetting,
    },
    config::EngineConfig,
    table::{
        GameBackend, GameError, GameOptions, GameState, HandEngine, Mode, Table, TableManager,
        game::{Combination, GamePlayerState, GameResult, GameRound, GameStatus, PlayerResult},
        models::Position,
    },
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Hand engine with fixed outcomes
///
/// Blinds are posted on start. Folding down to one player hands that player
/// the posted blinds. A call facing any all-in ends the hand: the caller takes
/// every all-in stack and the other live wagers.
pub struct ScriptedGame {
    state: GameState,
    folded: Vec<bool>,
    all_in: Vec<bool>,
}

impl ScriptedGame {
    pub fn new(options: GameOptions) -> Self {
        let players = options
            .players
            .iter()
            .enumerate()
            .map(|(idx, player)| {
                let wager = if player.positions.contains(&Position::Bb) {
                    options.blind.bb
                } else if player.positions.contains(&Position::Sb) {
                    options.blind.sb
                } else {
                    0
                }
                .min(player.bankroll);

                GamePlayerState {
                    idx,
                    positions: player.positions.clone(),
                    bankroll: player.bankroll,
                    initial_stack_size: player.bankroll,
                    stack_size: player.bankroll - wager,
                    wager,
                    ..GamePlayerState::default()
                }
            })
            .collect::<Vec<_>>();

        let count = players.len();
        let pot = players.iter().map(|p| p.wager).sum();
        Self {
            state: GameState {
                game_id: uuid::Uuid::new_v4().to_string(),
                players,
                status: GameStatus {
                    round: GameRound::Preflop,
                    pot,
                    ..GameStatus::default()
                },
                result: None,
            },
            folded: vec![false; count],
            all_in: vec![false; count],
        }
    }

    fn progress(&mut self) -> Result<GameState, GameError> {
        self.state.status.current_event = "RoundStarted".to_string();
        Ok(self.state.clone())
    }

    fn close(&mut self, winner: usize) -> Result<GameState, GameError> {
        let players = &mut self.state.players;
        let mut won = 0;
        let mut results = Vec::with_capacity(players.len());

        for player in players.iter() {
            if player.idx == winner {
                continue;
            }
            let lost = if self.all_in[player.idx] {
                player.bankroll
            } else {
                player.wager
            };
            won += lost;
            results.push(PlayerResult {
                idx: player.idx,
                final_chips: player.bankroll - lost,
                changed: -lost,
            });
        }

        if let Some(player) = players.get_mut(winner) {
            player.combination = Combination {
                kind: "pair".to_string(),
                cards: vec!["SA".to_string(), "HA".to_string()],
                power: 100,
            };
            results.push(PlayerResult {
                idx: winner,
                final_chips: player.bankroll + won,
                changed: won,
            });
        }
        results.sort_by_key(|r| r.idx);

        self.state.result = Some(GameResult { players: results });
        self.state.status.current_event = "GameClosed".to_string();
        Ok(self.state.clone())
    }

    fn live_players(&self) -> Vec<usize> {
        (0..self.folded.len()).filter(|&idx| !self.folded[idx]).collect()
    }
}

impl HandEngine for ScriptedGame {
    fn start(&mut self) -> Result<GameState, GameError> {
        self.progress()
    }
    fn state(&self) -> &GameState {
        &self.state
    }
    fn ready_for_all(&mut self) -> Result<GameState, GameError> {
        self.progress()
    }
    fn pay_ante(&mut self) -> Result<GameState, GameError> {
        self.progress()
    }
    fn pay_blinds(&mut self) -> Result<GameState, GameError> {
        self.progress()
    }
    fn ready(&mut self, _idx: usize) -> Result<GameState, GameError> {
        self.progress()
    }
    fn pay(&mut self, _idx: usize, _chips: i64) -> Result<GameState, GameError> {
        self.progress()
    }
    fn pass(&mut self, _idx: usize) -> Result<GameState, GameError> {
        self.progress()
    }
    fn fold(&mut self, idx: usize) -> Result<GameState, GameError> {
        self.folded[idx] = true;
        if let Some(player) = self.state.players.get_mut(idx) {
            player.fold = true;
        }
        match self.live_players().as_slice() {
            [winner] => self.close(*winner),
            _ => self.progress(),
        }
    }
    fn check(&mut self, _idx: usize) -> Result<GameState, GameError> {
        self.progress()
    }
    fn call(&mut self, idx: usize) -> Result<GameState, GameError> {
        if let Some(player) = self.state.players.get_mut(idx) {
            player.vpip = true;
        }
        if self.all_in.iter().any(|&a| a) {
            return self.close(idx);
        }
        self.progress()
    }
    fn allin(&mut self, idx: usize) -> Result<GameState, GameError> {
        self.all_in[idx] = true;
        if let Some(player) = self.state.players.get_mut(idx) {
            player.vpip = true;
            player.wager = player.bankroll;
            player.stack_size = 0;
        }
        self.state.status.current_raiser = Some(idx);
        self.progress()
    }
    fn bet(&mut self, _idx: usize, _chips: i64) -> Result<GameState, GameError> {
        self.progress()
    }
    fn raise(&mut self, idx: usize, _chip_level: i64) -> Result<GameState, GameError> {
        self.state.status.current_raiser = Some(idx);
        self.progress()
    }
}

pub struct ScriptedGames;

impl GameBackend for ScriptedGames {
    fn create_game(&self, options: GameOptions) -> Box<dyn HandEngine> {
        Box::new(ScriptedGame::new(options))
    }
}

/// Fast timings for tests
pub fn test_config(continue_interval: Duration) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.table.interval = continue_interval;
    config.table.open_game_retry_delay = Duration::from_millis(50);
    config.table.join_timeout = Duration::from_millis(150);
    config.competition.settle_delay = Duration::from_millis(10);
    config
}

pub fn blind_levels(durations: &[i64]) -> Vec<BlindLevel> {
    durations
        .iter()
        .zip(1..)
        .map(|(&duration, level)| BlindLevel {
            level,
            sb: 10 * i64::from(level),
            bb: 20 * i64::from(level),
            ante: 0,
            duration,
            allow_addon: false,
        })
        .collect()
}

/// Cash competition with a single 9-seat table
pub fn cash_setting(
    competition_id: &str,
    table_id: &str,
    min_player_count: usize,
    levels: Vec<BlindLevel>,
    final_buy_in_level_index: i32,
    re_buy_setting: ReBuySetting,
) -> CompetitionSetting {
    CompetitionSetting {
        competition_id: competition_id.to_string(),
        meta: CompetitionMeta {
            blind: Blind {
                id: "blind".to_string(),
                initial_level: 1,
                final_buy_in_level_index,
                dealer_blind_time: 0,
                levels,
            },
            min_player_count,
            table_min_player_count: 2,
            table_max_seat_count: 9,
            mode: Mode::Cash,
            re_buy_setting,
            ..CompetitionMeta::default()
        },
        start_at: None,
        disable_at: chrono::Utc::now().timestamp() + 3600,
        table_settings: vec![CompetitionTableSetting {
            table_id: table_id.to_string(),
            join_players: vec![],
        }],
    }
}

pub struct Harness {
    pub manager: Manager,
    pub tables: Arc<TableManager>,
    pub events: mpsc::UnboundedReceiver<CompetitionEvent>,
}

pub fn harness(config: EngineConfig) -> Harness {
    init_logger();
    let tables = Arc::new(TableManager::new(Arc::new(ScriptedGames)));
    let backend = Arc::new(NativeTableManagerBackend::new(tables.clone()));
    let (tx, events) = mpsc::unbounded_channel();
    Harness {
        manager: Manager::new(config, backend, tx),
        tables,
        events,
    }
}

/// Poll a table until `ready` holds or five seconds pass
pub async fn wait_for_table<F>(tables: &TableManager, table_id: &str, ready: F) -> Option<Table>
where
    F: Fn(&Table) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(table) = tables.table(table_id).await
                && ready(&table)
            {
                return table;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .ok()
}

/// Poll a competition until `ready` holds or five seconds pass
pub async fn wait_for_competition<F>(
    manager: &Manager,
    competition_id: &str,
    ready: F,
) -> Option<Competition>
where
    F: Fn(&Competition) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(competition) = manager.competition(competition_id).await
                && ready(&competition)
            {
                return competition;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .ok()
}

/// Player ids of the running hand, dealer first
pub fn hand_order(table: &Table) -> Vec<String> {
    table
        .state
        .game_player_indexes
        .iter()
        .filter_map(|&idx| table.state.player_states.get(idx))
        .map(|p| p.player_id.clone())
        .collect()
}

pub fn player<'a>(competition: &'a Competition, player_id: &str) -> Option<&'a CompetitionPlayer> {
    competition
        .state
        .players
        .iter()
        .find(|p| p.player_id == player_id)
}
