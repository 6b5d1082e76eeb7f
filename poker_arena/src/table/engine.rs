//! Single-writer table state machine.
//!
//! [`TableEngine`] owns a [`Table`] and the hand currently running on it.
//! Every mutation goes through `&mut self`; the [`TableActor`](super::TableActor)
//! owning the engine is the only caller, which serializes all player-table
//! and game operations.

use super::{
    config::TableSetting,
    errors::{TableError, TableResult},
    game::{GameBackend, GameEvent, GameOptions, GamePlayerSetting, GameState, HandEngine},
    models::{
        GroupAction, PlayerGameAction, PlayerId, Position, Table, TableBlindState,
        TablePlayerGameAction, TablePlayerGameStatistics, TablePlayerState, TableStatus,
    },
    seating,
};
use crate::table::config::JoinPlayer;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use uuid::Uuid;

/// Outcome of feeding a new game state into the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameProgress {
    /// Hand still running
    Progressed(GameEvent),
    /// Hand engine reported `GameClosed`
    Closed,
    /// Hand engine reported a symbol we cannot interpret
    Malformed(String),
}

/// What to do once the post-settlement delay elapses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextHand {
    Pause,
    Open,
    Idle,
}

/// Table state plus the running hand
pub struct TableEngine {
    table: Table,
    game: Option<Box<dyn HandEngine>>,
    backend: Arc<dyn GameBackend>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl TableEngine {
    /// Create a table, seating any players supplied with the setting
    ///
    /// # Arguments
    ///
    /// * `setting` - Table setting
    /// * `backend` - Hand engine factory
    ///
    /// # Returns
    ///
    /// * `TableResult<TableEngine>` - New engine, or `InvalidCreateSetting`
    pub fn create(setting: TableSetting, backend: Arc<dyn GameBackend>) -> TableResult<Self> {
        setting
            .validate()
            .map_err(TableError::InvalidCreateSetting)?;

        let id = if setting.table_id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            setting.table_id
        };

        let mut engine = Self {
            table: Table::new(id, setting.meta, now()),
            game: None,
            backend,
        };

        if !setting.join_players.is_empty() {
            engine.batch_add_players(&setting.join_players)?;
        }

        Ok(engine)
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Bump the update serial and return a snapshot for emission
    pub fn snapshot(&mut self) -> Table {
        self.table.update_serial += 1;
        self.table.update_at = now();
        self.table.clone()
    }

    pub fn pause(&mut self) {
        self.table.state.status = TableStatus::Pausing;
    }

    pub fn close(&mut self) {
        self.table.state.status = TableStatus::Closed;
        self.game = None;
    }

    pub fn mark_started(&mut self) {
        self.table.state.start_at = Some(now());
    }

    pub fn update_blind(&mut self, blind: TableBlindState) {
        self.table.state.blind_state = blind;
    }

    fn new_player_state(&self, player: &JoinPlayer, seat: usize) -> TablePlayerState {
        let state = &self.table.state;
        TablePlayerState {
            player_id: player.player_id.clone(),
            seat,
            positions: vec![Position::Unknown],
            is_participated: false,
            is_between_dealer_bb: seating::is_between_dealer_bb(
                seat,
                state.current_dealer_seat,
                state.current_bb_seat,
                self.table.rule(),
            ),
            bankroll: player.redeem_chips,
            is_in: false,
            game_statistics: TablePlayerGameStatistics::default(),
        }
    }

    /// Seat a batch of players, all or nothing
    ///
    /// Reserved seats must be empty; the rest are drawn at random.
    pub fn batch_add_players(&mut self, players: &[JoinPlayer]) -> TableResult<Vec<usize>> {
        let seat_count = self.table.meta.table_max_seat_count;
        let mut seat_map = self.table.state.seat_map.clone();

        for player in players {
            if self.table.find_player_index(&player.player_id).is_some() {
                return Err(TableError::InvalidAction);
            }

            if let Some(seat) = player.seat {
                if seat >= seat_count || seat_map[seat].is_some() {
                    return Err(TableError::SeatUnavailable);
                }
                // placeholder until the real index is known
                seat_map[seat] = Some(usize::MAX);
            }
        }

        let random_count = players.iter().filter(|p| p.seat.is_none()).count();
        let mut random_seats = seating::assign_seats(&seat_map, random_count)?.into_iter();

        let mut added = Vec::with_capacity(players.len());
        for player in players {
            let seat = match player.seat {
                Some(seat) => seat,
                None => random_seats.next().ok_or(TableError::NoEmptySeats)?,
            };

            let state = self.new_player_state(player, seat);
            let idx = self.table.state.player_states.len();
            self.table.state.player_states.push(state);
            self.table.state.seat_map[seat] = Some(idx);
            added.push(idx);
        }

        Ok(added)
    }

    /// Remove players and rebuild the seat map
    ///
    /// While a hand's participant set is fixed, the participant rotation is
    /// remapped onto the surviving players' new indexes.
    pub fn batch_remove_players(&mut self, player_ids: &[PlayerId]) {
        let leaving: HashSet<&str> = player_ids.iter().map(String::as_str).collect();
        let state = &mut self.table.state;

        let before = state.player_states.len();
        let old_players = std::mem::take(&mut state.player_states);
        let mut index_map: HashMap<usize, usize> = HashMap::new();
        for (old_idx, player) in old_players.into_iter().enumerate() {
            if leaving.contains(player.player_id.as_str()) {
                continue;
            }
            index_map.insert(old_idx, state.player_states.len());
            state.player_states.push(player);
        }

        if state.player_states.len() == before {
            return;
        }

        state.seat_map = vec![None; self.table.meta.table_max_seat_count];
        for (idx, player) in state.player_states.iter().enumerate() {
            state.seat_map[player.seat] = Some(idx);
        }

        if state.status.is_in_hand() {
            state.game_player_indexes = state
                .game_player_indexes
                .iter()
                .filter_map(|old_idx| index_map.get(old_idx).copied())
                .collect();
        }
    }

    /// Reserve a seat for a new player, or top up a returning one
    ///
    /// # Returns
    ///
    /// * `TableResult<(TablePlayerState, bool)>` - Player snapshot and whether it was newly seated
    pub fn player_reserve(&mut self, player: &JoinPlayer) -> TableResult<(TablePlayerState, bool)> {
        match self.table.find_player_index(&player.player_id) {
            None => {
                if self.table.is_full() {
                    return Err(TableError::NoEmptySeats);
                }

                let added = self.batch_add_players(std::slice::from_ref(player))?;
                let idx = added.first().copied().ok_or(TableError::NoEmptySeats)?;
                Ok((self.table.state.player_states[idx].clone(), true))
            }
            Some(idx) => {
                self.refresh_dead_button(idx);
                let state = &mut self.table.state.player_states[idx];
                state.bankroll += player.redeem_chips;
                Ok((state.clone(), false))
            }
        }
    }

    fn refresh_dead_button(&mut self, idx: usize) {
        let rule = self.table.rule();
        let dealer = self.table.state.current_dealer_seat;
        let bb = self.table.state.current_bb_seat;
        let player = &mut self.table.state.player_states[idx];
        player.is_between_dealer_bb = seating::is_between_dealer_bb(player.seat, dealer, bb, rule);
    }

    /// Mark a player as joined
    ///
    /// # Returns
    ///
    /// * `TableResult<bool>` - false if the player had already joined
    pub fn player_join(&mut self, player_id: &str) -> TableResult<bool> {
        let idx = self
            .table
            .find_player_index(player_id)
            .ok_or(TableError::PlayerNotFound)?;

        let player = &mut self.table.state.player_states[idx];
        if player.is_in {
            return Ok(false);
        }

        player.is_in = true;
        Ok(true)
    }

    pub fn player_redeem_chips(&mut self, player: &JoinPlayer) -> TableResult<()> {
        let idx = self
            .table
            .find_player_index(&player.player_id)
            .ok_or(TableError::PlayerNotFound)?;

        if self.table.state.player_states[idx].bankroll == 0 {
            self.refresh_dead_button(idx);
        }
        self.table.state.player_states[idx].bankroll += player.redeem_chips;
        Ok(())
    }

    /// Mark every seated player as joined; returns the ids that were pending
    pub fn mark_all_joined(&mut self) -> Vec<PlayerId> {
        self.table
            .state
            .player_states
            .iter_mut()
            .filter(|p| !p.is_in)
            .map(|p| {
                p.is_in = true;
                p.player_id.clone()
            })
            .collect()
    }

    pub fn pending_join_players(&self) -> Vec<PlayerId> {
        self.table
            .state
            .player_states
            .iter()
            .filter(|p| !p.is_in)
            .map(|p| p.player_id.clone())
            .collect()
    }

    /// First hand auto-start after the join barrier
    pub fn should_auto_start(&self) -> bool {
        let state = &self.table.state;
        state.game_count == 0
            && state.status == TableStatus::Created
            && state.blind_state.is_set()
    }

    /// Select participants, dealer and positions for the next hand
    ///
    /// Works on a copy; the table is untouched on failure.
    pub fn open_game(&mut self) -> TableResult<()> {
        let status = self.table.state.status;
        if !status.can_open_game() {
            return Err(TableError::InvalidTableStatus(status));
        }

        if !self.table.state.blind_state.is_set() {
            return Err(TableError::OpenGameFailed);
        }

        let mut table = self.table.clone();
        let min_players = table.meta.table_min_player_count;
        let state = &mut table.state;
        state.status = TableStatus::GameOpened;

        for player in state.player_states.iter_mut() {
            player.is_participated = if !player.is_in {
                false
            } else if player.is_participated {
                player.is_alive()
            } else {
                player.is_alive() && !player.is_between_dealer_bb
            };
        }

        let participants = state
            .player_states
            .iter()
            .filter(|p| p.is_participated)
            .count();
        if participants < min_players {
            // waive the dead-button rule for this hand
            for player in state.player_states.iter_mut() {
                if player.is_in && player.is_alive() {
                    player.is_participated = true;
                    player.is_between_dealer_bb = false;
                }
            }
        }

        let prev_dealer_seat = state.current_dealer_seat;
        let dealer_idx = seating::find_dealer_player_index(
            state.game_count,
            prev_dealer_seat,
            min_players,
            &state.player_states,
            &state.seat_map,
        )
        .ok_or(TableError::OpenGameFailed)?;
        let dealer_seat = state.player_states[dealer_idx].seat;

        if let Some(prev) = prev_dealer_seat {
            for player in state.player_states.iter_mut() {
                if player.is_between_dealer_bb
                    && player.is_in
                    && player.is_alive()
                    && seating::is_between_dealers(player.seat, prev, dealer_seat)
                {
                    player.is_between_dealer_bb = false;
                    player.is_participated = true;
                }
            }
        }

        let game_player_indexes =
            seating::find_game_player_indexes(dealer_seat, &state.seat_map, &state.player_states);
        if game_player_indexes.len() < min_players {
            return Err(TableError::OpenGameFailed);
        }

        let mut positions = seating::player_position_map(&game_player_indexes);
        for (idx, player) in state.player_states.iter_mut().enumerate() {
            if player.is_participated {
                player.positions = positions.remove(&idx).unwrap_or_default();
            }
        }

        state.game_count += 1;
        state.current_dealer_seat = Some(dealer_seat);
        state.current_bb_seat = seating::find_bb_seat(&state.player_states, &game_player_indexes);
        state.game_player_indexes = game_player_indexes;

        self.table = table;
        Ok(())
    }

    fn game_options(&self) -> GameOptions {
        let state = &self.table.state;
        let blind = state.blind_state;
        let mut options = GameOptions::for_rule(self.table.rule());
        options.ante = blind.ante.unwrap_or_default();
        options.blind.dealer = blind.dealer.unwrap_or_default();
        options.blind.sb = blind.sb.unwrap_or_default();
        options.blind.bb = blind.bb.unwrap_or_default();
        options.players = state
            .game_player_indexes
            .iter()
            .filter_map(|&idx| state.player_states.get(idx))
            .map(|p| GamePlayerSetting {
                bankroll: p.bankroll,
                positions: p.positions.clone(),
            })
            .collect();
        options
    }

    /// Hand the opened hand to the hand engine and start playing
    pub fn start_game(&mut self) -> TableResult<GameProgress> {
        if self.table.state.status != TableStatus::GameOpened {
            return Err(TableError::InvalidTableStatus(self.table.state.status));
        }

        let mut game = self.backend.create_game(self.game_options());
        let state = game.start()?;
        self.game = Some(game);
        self.table.state.status = TableStatus::GamePlaying;
        Ok(self.apply_game_state(state))
    }

    fn apply_game_state(&mut self, state: GameState) -> GameProgress {
        let event = state.event();
        self.table.state.game_state = Some(state);

        match event {
            Ok(GameEvent::GameClosed) => GameProgress::Closed,
            Ok(event) => GameProgress::Progressed(event),
            Err(TableError::UnknownGameEvent(symbol)) => GameProgress::Malformed(symbol),
            Err(other) => GameProgress::Malformed(other.to_string()),
        }
    }

    fn running_game(&mut self) -> TableResult<&mut Box<dyn HandEngine>> {
        if self.table.state.status != TableStatus::GamePlaying {
            return Err(TableError::InvalidGameAction);
        }
        self.game.as_mut().ok_or(TableError::InvalidGameAction)
    }

    pub fn group_action(&mut self, action: GroupAction) -> TableResult<GameProgress> {
        let game = self.running_game()?;
        let state = match action {
            GroupAction::ReadyForAll => game.ready_for_all(),
            GroupAction::PayAnte => game.pay_ante(),
            GroupAction::PayBlinds => game.pay_blinds(),
        }?;
        Ok(self.apply_game_state(state))
    }

    /// Apply one player's action to the running hand
    ///
    /// # Returns
    ///
    /// * `TableResult<(GameProgress, Option<TablePlayerGameAction>)>` - Progress and, for wagers, the action record
    pub fn player_action(
        &mut self,
        player_id: &str,
        action: PlayerGameAction,
    ) -> TableResult<(GameProgress, Option<TablePlayerGameAction>)> {
        if self.table.state.status != TableStatus::GamePlaying {
            return Err(TableError::InvalidGameAction);
        }

        let player_idx = self
            .table
            .find_player_index(player_id)
            .ok_or(TableError::PlayerNotFound)?;
        let game_idx = self
            .table
            .find_game_player_index(player_idx)
            .ok_or(TableError::InvalidGameAction)?;

        let game = self.running_game()?;
        let state = match action {
            PlayerGameAction::Ready => game.ready(game_idx),
            PlayerGameAction::Pay(chips) => game.pay(game_idx, chips),
            PlayerGameAction::Pass => game.pass(game_idx),
            PlayerGameAction::Fold => game.fold(game_idx),
            PlayerGameAction::Check => game.check(game_idx),
            PlayerGameAction::Call => game.call(game_idx),
            PlayerGameAction::Allin => game.allin(game_idx),
            PlayerGameAction::Bet(chips) => game.bet(game_idx, chips),
            PlayerGameAction::Raise(chips) => game.raise(game_idx, chips),
        }?;

        let is_raiser = state.status.current_raiser == Some(game_idx);
        let round = state.status.round;
        let stats = &mut self.table.state.player_states[player_idx].game_statistics;
        match action {
            PlayerGameAction::Bet(_) | PlayerGameAction::Allin => {
                stats.action_times += 1;
                if is_raiser {
                    stats.raise_times += 1;
                }
            }
            PlayerGameAction::Raise(_) => {
                stats.action_times += 1;
                stats.raise_times += 1;
            }
            PlayerGameAction::Call => {
                stats.action_times += 1;
                stats.call_times += 1;
            }
            PlayerGameAction::Check => {
                stats.action_times += 1;
                stats.check_times += 1;
            }
            PlayerGameAction::Fold => {
                stats.action_times += 1;
                stats.is_fold = true;
                stats.fold_round = Some(round);
            }
            PlayerGameAction::Ready | PlayerGameAction::Pay(_) | PlayerGameAction::Pass => {}
        }

        let record = action
            .is_wager()
            .then(|| self.action_record(player_idx, game_idx, action, &state));

        Ok((self.apply_game_state(state), record))
    }

    fn action_record(
        &self,
        player_idx: usize,
        game_idx: usize,
        action: PlayerGameAction,
        state: &GameState,
    ) -> TablePlayerGameAction {
        let player = &self.table.state.player_states[player_idx];
        let game_player = state.player(game_idx);
        TablePlayerGameAction {
            competition_id: self.table.meta.competition_id.clone(),
            table_id: self.table.id.clone(),
            game_id: state.game_id.clone(),
            game_count: self.table.state.game_count,
            round: state.status.round,
            update_at: now(),
            player_id: player.player_id.clone(),
            seat: player.seat,
            positions: player.positions.clone(),
            action: action.name().to_string(),
            chips: action.chips(),
            bankroll: game_player.map(|p| p.bankroll).unwrap_or(player.bankroll),
            wager: game_player.map(|p| p.wager).unwrap_or_default(),
            pot: state.status.pot,
        }
    }

    /// Copy final bankrolls back onto the seated players
    pub fn settle(&mut self) {
        let state = &mut self.table.state;
        state.status = TableStatus::GameSettled;

        if let Some(result) = state.game_state.as_ref().and_then(|gs| gs.result.as_ref()) {
            for player_result in &result.players {
                let Some(&idx) = state.game_player_indexes.get(player_result.idx) else {
                    continue;
                };
                if let Some(player) = state.player_states.get_mut(idx) {
                    player.bankroll = player_result.final_chips;
                }
            }
        }

        for player in state.player_states.iter_mut() {
            if !player.is_alive() {
                player.is_participated = false;
            }
        }
    }

    /// Clear per-hand data and wait for the next hand
    pub fn reset_for_next_hand(&mut self) {
        self.game = None;
        let state = &mut self.table.state;
        state.status = TableStatus::GameStandby;
        state.game_player_indexes.clear();
        state.game_state = None;
        for player in state.player_states.iter_mut() {
            player.positions = vec![Position::Unknown];
            player.game_statistics = TablePlayerGameStatistics::default();
        }
    }

    /// Decide what follows the post-settlement delay
    pub fn next_hand(&self) -> NextHand {
        let table = &self.table;
        if table.state.status == TableStatus::Closed {
            return NextHand::Idle;
        }

        if table.should_pause() {
            return NextHand::Pause;
        }

        if table.state.status == TableStatus::GameStandby
            && table.alive_player_count() >= table.meta.table_min_player_count
        {
            return NextHand::Open;
        }

        NextHand::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{
        config::{Rule, TableMeta},
        game::{GameError, GameResult, GameStatus, PlayerResult},
    };

    /// Hand engine that reports whatever state it was primed with
    struct StubGame {
        state: GameState,
    }

    impl StubGame {
        fn advance(&mut self, event: &str) -> Result<GameState, GameError> {
            self.state.status.current_event = event.to_string();
            Ok(self.state.clone())
        }
    }

    impl HandEngine for StubGame {
        fn start(&mut self) -> Result<GameState, GameError> {
            self.advance("ReadyRequested")
        }
        fn state(&self) -> &GameState {
            &self.state
        }
        fn ready_for_all(&mut self) -> Result<GameState, GameError> {
            self.advance("BlindsRequested")
        }
        fn pay_ante(&mut self) -> Result<GameState, GameError> {
            self.advance("BlindsRequested")
        }
        fn pay_blinds(&mut self) -> Result<GameState, GameError> {
            self.advance("RoundStarted")
        }
        fn ready(&mut self, _idx: usize) -> Result<GameState, GameError> {
            self.advance("ReadyRequested")
        }
        fn pay(&mut self, _idx: usize, _chips: i64) -> Result<GameState, GameError> {
            self.advance("BlindsRequested")
        }
        fn pass(&mut self, _idx: usize) -> Result<GameState, GameError> {
            self.advance("RoundStarted")
        }
        fn fold(&mut self, _idx: usize) -> Result<GameState, GameError> {
            self.advance("RoundStarted")
        }
        fn check(&mut self, _idx: usize) -> Result<GameState, GameError> {
            self.advance("RoundStarted")
        }
        fn call(&mut self, _idx: usize) -> Result<GameState, GameError> {
            self.advance("RoundStarted")
        }
        fn allin(&mut self, idx: usize) -> Result<GameState, GameError> {
            self.state.status.current_raiser = Some(idx);
            self.advance("RoundStarted")
        }
        fn bet(&mut self, _idx: usize, _chips: i64) -> Result<GameState, GameError> {
            self.advance("RoundStarted")
        }
        fn raise(&mut self, idx: usize, _chips: i64) -> Result<GameState, GameError> {
            self.state.status.current_raiser = Some(idx);
            self.advance("Bogus")
        }
    }

    struct StubBackend;

    impl GameBackend for StubBackend {
        fn create_game(&self, options: GameOptions) -> Box<dyn HandEngine> {
            Box::new(StubGame {
                state: GameState {
                    game_id: "g1".to_string(),
                    status: GameStatus::default(),
                    ..GameState::default()
                }
                .with_players(options.players.len()),
            })
        }
    }

    trait WithPlayers {
        fn with_players(self, count: usize) -> Self;
    }

    impl WithPlayers for GameState {
        fn with_players(mut self, count: usize) -> Self {
            self.players = (0..count)
                .map(|idx| crate::table::game::GamePlayerState {
                    idx,
                    ..Default::default()
                })
                .collect();
            self
        }
    }

    fn engine_with(players: &[(&str, i64)], min_players: usize, rule: Rule) -> TableEngine {
        let setting = TableSetting {
            table_id: "t1".to_string(),
            meta: TableMeta {
                table_min_player_count: min_players,
                rule,
                ..TableMeta::default()
            },
            join_players: players
                .iter()
                .map(|(id, chips)| JoinPlayer::new(*id, *chips))
                .collect(),
        };
        let mut engine = TableEngine::create(setting, Arc::new(StubBackend)).unwrap();
        engine.mark_all_joined();
        engine.update_blind(TableBlindState::new(1, 0, 0, 10, 20));
        engine
    }

    fn assert_seat_bijection(table: &Table) {
        for (seat, occupant) in table.state.seat_map.iter().enumerate() {
            if let Some(idx) = occupant {
                assert_eq!(table.state.player_states[*idx].seat, seat);
            }
        }
        for (idx, player) in table.state.player_states.iter().enumerate() {
            assert_eq!(table.state.seat_map[player.seat], Some(idx));
        }
    }

    #[test]
    fn test_create_seats_join_players() {
        let engine = engine_with(&[("a", 100), ("b", 100), ("c", 100)], 2, Rule::Default);
        let table = engine.table();
        assert_eq!(table.state.player_states.len(), 3);
        assert_eq!(table.state.blind_state.level, 1);
        assert_seat_bijection(table);
    }

    #[test]
    fn test_create_rejects_too_many_players() {
        let setting = TableSetting {
            table_id: String::new(),
            meta: TableMeta {
                table_max_seat_count: 1,
                ..TableMeta::default()
            },
            join_players: vec![JoinPlayer::new("a", 1), JoinPlayer::new("b", 1)],
        };
        assert!(matches!(
            TableEngine::create(setting, Arc::new(StubBackend)),
            Err(TableError::InvalidCreateSetting(_))
        ));
    }

    #[test]
    fn test_reserved_seat_must_be_empty() {
        let mut engine = engine_with(&[], 2, Rule::Default);
        let mut first = JoinPlayer::new("a", 100);
        first.seat = Some(4);
        engine.player_reserve(&first).unwrap();

        let mut second = JoinPlayer::new("b", 100);
        second.seat = Some(4);
        assert!(matches!(
            engine.player_reserve(&second),
            Err(TableError::SeatUnavailable)
        ));
        assert_eq!(engine.table().state.player_states.len(), 1);
    }

    #[test]
    fn test_reserve_on_full_table() {
        let setting = TableSetting {
            table_id: "t1".to_string(),
            meta: TableMeta {
                table_max_seat_count: 2,
                ..TableMeta::default()
            },
            join_players: vec![JoinPlayer::new("a", 1), JoinPlayer::new("b", 1)],
        };
        let mut engine = TableEngine::create(setting, Arc::new(StubBackend)).unwrap();
        assert!(matches!(
            engine.player_reserve(&JoinPlayer::new("c", 1)),
            Err(TableError::NoEmptySeats)
        ));
    }

    #[test]
    fn test_reserve_existing_player_adds_chips() {
        let mut engine = engine_with(&[("a", 100)], 2, Rule::Default);
        let (state, is_new) = engine.player_reserve(&JoinPlayer::new("a", 50)).unwrap();
        assert!(!is_new);
        assert_eq!(state.bankroll, 150);
    }

    #[test]
    fn test_join_is_idempotent() {
        let mut engine = engine_with(&[], 2, Rule::Default);
        engine.player_reserve(&JoinPlayer::new("a", 100)).unwrap();
        assert!(engine.player_join("a").unwrap());
        assert!(!engine.player_join("a").unwrap());
        assert!(matches!(
            engine.player_join("zz"),
            Err(TableError::PlayerNotFound)
        ));
    }

    #[test]
    fn test_open_game_assigns_positions() {
        let mut engine = engine_with(&[("a", 100), ("b", 100), ("c", 100)], 2, Rule::Default);
        engine.open_game().unwrap();

        let table = engine.table();
        assert_eq!(table.state.status, TableStatus::GameOpened);
        assert_eq!(table.state.game_count, 1);
        assert_eq!(table.state.game_player_indexes.len(), 3);

        let dealer_idx = table.state.game_player_indexes[0];
        assert_eq!(
            table.state.player_states[dealer_idx].positions,
            vec![Position::Dealer]
        );
        assert_eq!(
            table.state.current_dealer_seat,
            Some(table.state.player_states[dealer_idx].seat)
        );
        let bb_idx = table.state.game_player_indexes[2];
        assert_eq!(
            table.state.current_bb_seat,
            Some(table.state.player_states[bb_idx].seat)
        );
    }

    #[test]
    fn test_open_game_requires_blinds() {
        let mut engine = engine_with(&[("a", 100), ("b", 100)], 2, Rule::Default);
        engine.update_blind(TableBlindState::default());
        assert!(matches!(engine.open_game(), Err(TableError::OpenGameFailed)));
        assert_eq!(engine.table().state.status, TableStatus::Created);
    }

    #[test]
    fn test_open_game_fails_below_min_and_keeps_state() {
        let mut engine = engine_with(&[("a", 100), ("b", 0), ("c", 100)], 3, Rule::Default);
        let before = engine.table().clone();
        assert!(matches!(engine.open_game(), Err(TableError::OpenGameFailed)));
        assert_eq!(engine.table(), &before);
    }

    #[test]
    fn test_open_game_rejected_mid_hand() {
        let mut engine = engine_with(&[("a", 100), ("b", 100)], 2, Rule::Default);
        engine.open_game().unwrap();
        assert!(matches!(
            engine.open_game(),
            Err(TableError::InvalidTableStatus(TableStatus::GameOpened))
        ));
    }

    #[test]
    fn test_dead_button_player_waits_unless_below_minimum() {
        let mut engine = engine_with(&[("a", 100), ("b", 100), ("c", 100)], 2, Rule::Default);
        engine.open_game().unwrap();
        engine.settle();
        engine.reset_for_next_hand();

        // newcomer flagged between dealer and big blind sits the hand out
        let table = engine.table();
        let dealer = table.state.current_dealer_seat.unwrap();
        let bb = table.state.current_bb_seat.unwrap();
        let seat_map = table.state.seat_map.clone();
        let dead_seat = (0..seat_map.len())
            .find(|&s| seat_map[s].is_none() && seating::is_between_dealers(s, dealer, bb));

        if let Some(seat) = dead_seat {
            let mut newcomer = JoinPlayer::new("d", 100);
            newcomer.seat = Some(seat);
            engine.player_reserve(&newcomer).unwrap();
            engine.player_join("d").unwrap();
            assert!(engine.table().state.player_states[3].is_between_dealer_bb);

            engine.open_game().unwrap();
            let table = engine.table();
            let d = &table.state.player_states[3];
            let new_dealer = table.state.current_dealer_seat.unwrap();
            let passed = seating::is_between_dealers(seat, dealer, new_dealer);
            assert_eq!(d.is_participated, passed);
            assert_eq!(d.is_between_dealer_bb, !passed);
        }
    }

    #[test]
    fn test_player_action_updates_statistics() {
        let mut engine = engine_with(&[("a", 100), ("b", 100), ("c", 100)], 2, Rule::Default);
        engine.open_game().unwrap();
        engine.start_game().unwrap();
        assert_eq!(engine.table().state.status, TableStatus::GamePlaying);

        let table = engine.table();
        let ids: Vec<String> = table
            .state
            .game_player_indexes
            .iter()
            .map(|&idx| table.state.player_states[idx].player_id.clone())
            .collect();

        let (progress, record) = engine.player_action(&ids[0], PlayerGameAction::Fold).unwrap();
        assert_eq!(progress, GameProgress::Progressed(GameEvent::RoundStarted));
        assert_eq!(record.unwrap().action, "fold");

        engine.player_action(&ids[1], PlayerGameAction::Call).unwrap();
        engine.player_action(&ids[2], PlayerGameAction::Allin).unwrap();
        engine.player_action(&ids[1], PlayerGameAction::Check).unwrap();

        let players = &engine.table().state.player_states;
        let stats = |id: &str| {
            players
                .iter()
                .find(|p| p.player_id == id)
                .unwrap()
                .game_statistics
                .clone()
        };
        assert!(stats(ids[0].as_str()).is_fold);
        assert_eq!(stats(ids[0].as_str()).fold_round, Some(crate::table::game::GameRound::Preflop));
        assert_eq!(stats(ids[1].as_str()).call_times, 1);
        assert_eq!(stats(ids[1].as_str()).check_times, 1);
        assert_eq!(stats(ids[1].as_str()).action_times, 2);
        assert_eq!(stats(ids[2].as_str()).raise_times, 1);

        let (progress, _) = engine.player_action(&ids[2], PlayerGameAction::Raise(40)).unwrap();
        assert_eq!(progress, GameProgress::Malformed("Bogus".to_string()));
    }

    #[test]
    fn test_actions_rejected_outside_play() {
        let mut engine = engine_with(&[("a", 100), ("b", 100)], 2, Rule::Default);
        assert!(matches!(
            engine.player_action("a", PlayerGameAction::Fold),
            Err(TableError::InvalidGameAction)
        ));
        assert!(matches!(
            engine.group_action(GroupAction::ReadyForAll),
            Err(TableError::InvalidGameAction)
        ));
    }

    #[test]
    fn test_non_participant_action_rejected() {
        let mut engine = engine_with(&[("a", 100), ("b", 100), ("c", 0)], 2, Rule::Default);
        engine.open_game().unwrap();
        engine.start_game().unwrap();
        assert!(matches!(
            engine.player_action("c", PlayerGameAction::Check),
            Err(TableError::InvalidGameAction)
        ));
    }

    #[test]
    fn test_settle_copies_final_bankrolls() {
        let mut engine = engine_with(&[("a", 100), ("b", 100)], 2, Rule::Default);
        engine.open_game().unwrap();
        engine.start_game().unwrap();

        let loser_game_idx = 1;
        if let Some(gs) = engine.table.state.game_state.as_mut() {
            gs.result = Some(GameResult {
                players: vec![
                    PlayerResult {
                        idx: 0,
                        final_chips: 200,
                        changed: 100,
                    },
                    PlayerResult {
                        idx: loser_game_idx,
                        final_chips: 0,
                        changed: -100,
                    },
                ],
            });
        }
        engine.settle();

        let table = engine.table();
        assert_eq!(table.state.status, TableStatus::GameSettled);
        let loser = table.state.game_player_indexes[loser_game_idx];
        assert_eq!(table.state.player_states[loser].bankroll, 0);
        assert!(!table.state.player_states[loser].is_participated);

        engine.reset_for_next_hand();
        let table = engine.table();
        assert_eq!(table.state.status, TableStatus::GameStandby);
        assert!(table.state.game_player_indexes.is_empty());
        assert!(table.state.game_state.is_none());
        assert_eq!(engine.next_hand(), NextHand::Pause);
    }

    #[test]
    fn test_next_hand_opens_with_enough_players() {
        let mut engine = engine_with(&[("a", 100), ("b", 100)], 2, Rule::Default);
        engine.open_game().unwrap();
        engine.settle();
        engine.reset_for_next_hand();
        assert_eq!(engine.next_hand(), NextHand::Open);

        engine.update_blind(TableBlindState::new(-1, 0, 0, 0, 0));
        assert_eq!(engine.next_hand(), NextHand::Pause);
    }

    #[test]
    fn test_leave_remaps_game_player_indexes() {
        let mut engine = engine_with(
            &[("a", 100), ("b", 100), ("c", 100), ("d", 100)],
            2,
            Rule::Default,
        );
        engine.open_game().unwrap();

        let table = engine.table();
        let rotation: Vec<String> = table
            .state
            .game_player_indexes
            .iter()
            .map(|&idx| table.state.player_states[idx].player_id.clone())
            .collect();

        engine.batch_remove_players(&["b".to_string()]);

        let table = engine.table();
        assert_eq!(table.state.player_states.len(), 3);
        assert_seat_bijection(table);
        let remapped: Vec<String> = table
            .state
            .game_player_indexes
            .iter()
            .map(|&idx| table.state.player_states[idx].player_id.clone())
            .collect();
        let expected: Vec<String> = rotation.into_iter().filter(|id| id != "b").collect();
        assert_eq!(remapped, expected);
    }

    #[test]
    fn test_leave_outside_hand_keeps_index_list() {
        let mut engine = engine_with(&[("a", 100), ("b", 100), ("c", 100)], 2, Rule::Default);
        engine.batch_remove_players(&["a".to_string()]);
        let table = engine.table();
        assert_eq!(table.state.player_states.len(), 2);
        assert!(table.state.game_player_indexes.is_empty());
        assert_seat_bijection(table);
    }

    #[test]
    fn test_short_deck_never_flags_dead_button() {
        let mut engine = engine_with(&[("a", 100), ("b", 100), ("c", 100)], 2, Rule::ShortDeck);
        engine.open_game().unwrap();
        for seat in 0..9 {
            if engine.table().state.seat_map[seat].is_none() {
                let mut p = JoinPlayer::new(format!("n{}", seat), 100);
                p.seat = Some(seat);
                let (state, _) = engine.player_reserve(&p).unwrap();
                assert!(!state.is_between_dealer_bb);
            }
        }
    }
}
