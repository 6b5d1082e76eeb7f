//! Competition actor implementation with async message handling.

use super::{
    backend::TableManagerBackend,
    blind::BlindClock,
    cache::PlayerCacheStore,
    errors::{CompetitionError, CompetitionResult},
    messages::{CompetitionEvent, CompetitionMessage},
    models::{
        BlindState, Competition, CompetitionId, CompetitionPlayer, CompetitionPlayerStatus,
        CompetitionRank, CompetitionSetting, CompetitionState, CompetitionStatus,
        CompetitionTableSetting, JoinPlayer, NO_STOP_BUY_IN_INDEX, Statistic, UNSET_VALUE,
    },
    rank,
};
use crate::{
    config::EngineConfig,
    table::{
        self, PlayerId, Table, TableEvent, TableId, TablePlayerState, TableStatus,
        game::GameRound,
    },
    timer,
};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn secs(value: i64) -> Duration {
    Duration::from_secs(u64::try_from(value).unwrap_or(0))
}

/// Competition actor handle for sending messages
#[derive(Clone)]
pub struct CompetitionHandle {
    sender: mpsc::Sender<CompetitionMessage>,
    competition_id: CompetitionId,
}

impl CompetitionHandle {
    pub fn new(sender: mpsc::Sender<CompetitionMessage>, competition_id: CompetitionId) -> Self {
        Self {
            sender,
            competition_id,
        }
    }

    pub fn competition_id(&self) -> &str {
        &self.competition_id
    }

    /// True once the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CompetitionMessage,
    ) -> CompetitionResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| CompetitionError::ActorUnavailable)?;
        rx.await.map_err(|_| CompetitionError::ActorUnavailable)
    }

    async fn post(&self, message: CompetitionMessage) -> CompetitionResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| CompetitionError::ActorUnavailable)
    }

    pub async fn competition(&self) -> CompetitionResult<Competition> {
        self.request(|response| CompetitionMessage::GetCompetition { response })
            .await
    }

    /// Start the competition
    ///
    /// # Returns
    ///
    /// * `CompetitionResult<i64>` - Start timestamp
    pub async fn start(&self) -> CompetitionResult<i64> {
        self.request(|response| CompetitionMessage::Start { response })
            .await?
    }

    pub async fn player_buy_in(&self, player: JoinPlayer) -> CompetitionResult<()> {
        self.request(|response| CompetitionMessage::PlayerBuyIn { player, response })
            .await?
    }

    pub async fn player_cash_out(
        &self,
        table_id: TableId,
        player_id: PlayerId,
    ) -> CompetitionResult<()> {
        self.request(|response| CompetitionMessage::PlayerCashOut {
            table_id,
            player_id,
            response,
        })
        .await?
    }

    /// Settle with `status` and stop the actor
    pub async fn close(&self, status: CompetitionStatus) -> CompetitionResult<()> {
        self.request(|response| CompetitionMessage::Close { status, response })
            .await?
    }

    pub async fn update_table(&self, table: Table) -> CompetitionResult<()> {
        self.post(CompetitionMessage::TableUpdated { table }).await
    }

    pub async fn update_reserve_table_player_state(
        &self,
        table_id: TableId,
        player: TablePlayerState,
    ) -> CompetitionResult<()> {
        self.post(CompetitionMessage::TablePlayerReserved { table_id, player })
            .await
    }
}

/// Busted players of one settlement waiting to re-buy
struct ReBuyWindow {
    table_id: TableId,
    players: HashSet<PlayerId>,
    cancel: CancellationToken,
}

/// Resume deadline of one table for one break level
struct BreakResumeTask {
    cancel: CancellationToken,
    resumed: bool,
}

/// Competition actor owning a single competition
pub struct CompetitionActor {
    id: CompetitionId,

    competition: Competition,

    config: EngineConfig,

    backend: Arc<dyn TableManagerBackend>,

    cache: Arc<PlayerCacheStore>,

    /// Message inbox
    inbox: mpsc::Receiver<CompetitionMessage>,

    /// Own inbox, for deadlines and detached table calls
    sender: mpsc::WeakSender<CompetitionMessage>,

    /// Events of this competition's tables
    table_events: mpsc::UnboundedReceiver<TableEvent>,

    /// Event sink
    events: mpsc::UnboundedSender<CompetitionEvent>,

    /// Parent of every deadline this actor schedules
    timers: CancellationToken,

    /// Auto-start, auto-close and cash hard close
    lifecycle: CancellationToken,

    blind: BlindClock,

    re_buy_windows: HashMap<u64, ReBuyWindow>,

    /// Keyed by table and blind level index
    break_resumes: HashMap<(TableId, i32), BreakResumeTask>,

    /// Game count of the last settlement applied per table
    last_settled: HashMap<TableId, u32>,

    /// Tables with a detached open or start in flight
    pending_opens: HashSet<TableId>,

    generation: u64,

    closed: bool,
}

impl CompetitionActor {
    /// Create a competition and, in cash mode, its tables
    ///
    /// # Arguments
    ///
    /// * `setting` - Competition setting
    /// * `config` - Engine configuration; its table options go to every created table
    /// * `backend` - Table manager backend
    /// * `cache` - Player cache shared with other competitions
    /// * `events` - Sink for competition events
    ///
    /// # Returns
    ///
    /// * `CompetitionResult<(CompetitionActor, CompetitionHandle)>` - Actor to spawn and its handle
    pub async fn create(
        setting: CompetitionSetting,
        config: EngineConfig,
        backend: Arc<dyn TableManagerBackend>,
        cache: Arc<PlayerCacheStore>,
        events: mpsc::UnboundedSender<CompetitionEvent>,
    ) -> CompetitionResult<(Self, CompetitionHandle)> {
        let now = now();
        setting
            .validate(now)
            .map_err(CompetitionError::InvalidCreateSetting)?;
        config
            .validate()
            .map_err(|e| CompetitionError::InvalidCreateSetting(e.to_string()))?;

        let id = if setting.competition_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            setting.competition_id.clone()
        };

        let competition = Competition {
            update_serial: 0,
            id: id.clone(),
            meta: setting.meta.clone(),
            state: CompetitionState {
                open_at: now,
                disable_at: Some(setting.disable_at),
                start_at: setting.start_at,
                end_at: None,
                blind_state: BlindState {
                    final_buy_in_level_index: setting.meta.blind.final_buy_in_level_index,
                    current_level_index: UNSET_VALUE,
                    end_ats: vec![0; setting.meta.blind.levels.len()],
                },
                players: Vec::new(),
                status: CompetitionStatus::Registering,
                tables: Vec::new(),
                rankings: Vec::new(),
                statistic: Statistic::default(),
            },
            update_at: now,
        };

        let (sender, inbox) = mpsc::channel(100);
        let (table_sender, table_events) = mpsc::unbounded_channel();
        backend.subscribe(&id, table_sender);

        let timers = CancellationToken::new();
        let lifecycle = timers.child_token();
        let mut actor = Self {
            id: id.clone(),
            competition,
            config,
            backend,
            cache,
            inbox,
            sender: sender.downgrade(),
            table_events,
            events,
            timers,
            lifecycle,
            blind: BlindClock::new(),
            re_buy_windows: HashMap::new(),
            break_resumes: HashMap::new(),
            last_settled: HashMap::new(),
            pending_opens: HashSet::new(),
            generation: 0,
            closed: false,
        };

        if actor.competition.is_cash() {
            for table_setting in &setting.table_settings {
                if let Err(err) = actor.add_table(table_setting).await {
                    actor.abort_create().await;
                    return Err(err);
                }
            }
        }

        if let Some(start_at) = setting.start_at.filter(|&at| at > 0) {
            timer::schedule_at(
                start_at,
                actor.lifecycle.clone(),
                actor.sender.clone(),
                CompetitionMessage::AutoStart,
            );
        }
        timer::schedule_at(
            setting.disable_at,
            actor.lifecycle.clone(),
            actor.sender.clone(),
            CompetitionMessage::AutoClose,
        );

        log::info!(
            "Competition {} created ({} mode, {} table(s))",
            id,
            actor.competition.meta.mode,
            actor.competition.state.tables.len()
        );
        Ok((actor, CompetitionHandle::new(sender, id)))
    }

    async fn add_table(&mut self, setting: &CompetitionTableSetting) -> CompetitionResult<()> {
        let table_setting = self.competition.table_setting(setting);
        let table = self
            .backend
            .create_table(self.config.table.clone(), table_setting)
            .await?;
        self.competition.state.tables.push(table);
        Ok(())
    }

    /// Undo a partially created competition
    async fn abort_create(&mut self) {
        for table in &self.competition.state.tables {
            if let Err(err) = self.backend.close_table(&table.id).await {
                log::warn!("Failed to close table {}: {}", table.id, err);
            }
        }
        self.backend.unsubscribe(&self.id);
        self.timers.cancel();
    }

    /// Run the competition actor event loop
    pub async fn run(mut self) {
        log::info!("Competition {} starting", self.id);
        self.emit_updated();

        loop {
            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(message) => self.handle_message(message).await,
                    None => break,
                },
                Some(event) = self.table_events.recv() => self.handle_table_event(event).await,
            }

            if self.closed {
                break;
            }
        }

        self.timers.cancel();
        self.blind.stop();
        self.backend.unsubscribe(&self.id);
        log::info!("Competition {} stopped", self.id);
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Handle a competition message
    async fn handle_message(&mut self, message: CompetitionMessage) {
        match message {
            CompetitionMessage::GetCompetition { response } => {
                let _ = response.send(self.competition.clone());
            }

            CompetitionMessage::Start { response } => {
                let result = self.start_competition();
                if result.is_ok() {
                    self.start_ready_tables().await;
                }
                let _ = response.send(result);
            }

            CompetitionMessage::PlayerBuyIn { player, response } => {
                let result = self.player_buy_in(player).await;
                let _ = response.send(result);
            }

            CompetitionMessage::PlayerCashOut {
                table_id,
                player_id,
                response,
            } => {
                let result = self.player_cash_out(&table_id, player_id).await;
                let _ = response.send(result);
            }

            CompetitionMessage::Close { status, response } => {
                let result = self.close(status).await;
                let _ = response.send(result);
            }

            CompetitionMessage::TableUpdated { table } => self.update_table(table).await,

            CompetitionMessage::TablePlayerReserved { table_id, player } => {
                self.update_reserve_table_player_state(&table_id, &player);
            }

            CompetitionMessage::AutoStart => {
                if self.competition.state.status == CompetitionStatus::Registering {
                    match self.start_competition() {
                        Ok(_) => self.start_ready_tables().await,
                        Err(err) => self.emit_error("auto start", err),
                    }
                }
            }

            CompetitionMessage::AutoClose => {
                let state = &self.competition.state;
                if state.status == CompetitionStatus::Registering
                    && state.players.len() < self.competition.meta.min_player_count
                {
                    log::info!(
                        "Competition {} disabled with {} player(s)",
                        self.id,
                        state.players.len()
                    );
                    self.close_competition(CompetitionStatus::AutoEnd).await;
                }
            }

            CompetitionMessage::CashHardClose => self.cash_hard_close().await,

            CompetitionMessage::BlindLevelAdvanced { level_index } => {
                self.on_blind_level_advanced(level_index).await;
            }

            CompetitionMessage::ReBuyDeadline { generation } => {
                self.on_re_buy_deadline(generation).await;
            }

            CompetitionMessage::BreakResume {
                table_id,
                level_index,
            } => self.on_break_resume(table_id, level_index),

            CompetitionMessage::TableOpenFinished {
                table_id,
                context,
                error,
            } => {
                self.pending_opens.remove(&table_id);
                if let Some(error) = error {
                    self.emit_error(context, format!("table {}: {}", table_id, error));
                }
            }
        }
    }

    async fn handle_table_event(&mut self, event: TableEvent) {
        match event {
            TableEvent::Updated(table) => self.update_table(table).await,
            TableEvent::ErrorUpdated { table, error } => {
                log::warn!(
                    "Competition {}: table {} reported: {}",
                    self.id,
                    table.id,
                    error
                );
            }
            TableEvent::PlayerReserved {
                table_id, player, ..
            } => self.update_reserve_table_player_state(&table_id, &player),
            TableEvent::GamePlayerActionUpdated(action) => {
                log::debug!(
                    "Competition {}: {} {} at table {}",
                    self.id,
                    action.player_id,
                    action.action,
                    action.table_id
                );
            }
        }
    }

    fn start_competition(&mut self) -> CompetitionResult<i64> {
        if self.competition.state.status != CompetitionStatus::Registering {
            return Err(CompetitionError::StartRejected);
        }

        let now = now();
        self.activate_blind(now);

        let final_index = self.competition.meta.blind.final_buy_in_level_index;
        self.competition.state.status =
            if final_index == UNSET_VALUE || final_index < NO_STOP_BUY_IN_INDEX {
                CompetitionStatus::StoppedBuyIn
            } else {
                CompetitionStatus::DelayedBuyIn
            };
        self.competition.state.start_at = Some(now);

        self.lifecycle.cancel();
        self.lifecycle = self.timers.child_token();

        if self.competition.is_cash() {
            let max_duration = self.competition.meta.max_duration;
            self.competition.state.end_at = Some(now + max_duration);
            timer::schedule(
                secs(max_duration),
                self.lifecycle.clone(),
                self.sender.clone(),
                CompetitionMessage::CashHardClose,
            );
        } else {
            self.competition.state.end_at = None;
        }

        log::info!(
            "Competition {} started ({})",
            self.id,
            self.competition.state.status
        );
        self.emit_updated();
        Ok(now)
    }

    fn activate_blind(&mut self, now: i64) {
        if self.blind.is_running() {
            return;
        }

        let schedule = self.blind.start(
            &self.competition.meta.blind,
            now,
            &self.timers,
            self.sender.clone(),
            |level_index| CompetitionMessage::BlindLevelAdvanced { level_index },
        );

        let blind_state = &mut self.competition.state.blind_state;
        blind_state.current_level_index = schedule.current_level_index;
        blind_state.end_ats = schedule.end_ats;
    }

    /// Push the blind to every table and start those already waiting with enough players
    async fn start_ready_tables(&mut self) {
        let tables: Vec<(TableId, bool)> = self
            .competition
            .state
            .tables
            .iter()
            .map(|t| {
                let ready = t.state.status == TableStatus::Created
                    && t.ready_player_count() >= self.competition.meta.table_min_player_count;
                (t.id.clone(), ready)
            })
            .collect();

        for (table_id, ready) in tables {
            self.update_table_blind(&table_id).await;
            if ready {
                self.spawn_table_open(table_id, true, "start table game");
            }
        }
    }

    async fn update_table_blind(&mut self, table_id: &str) {
        let blind = self.competition.current_blind_data();
        if let Err(err) = self.backend.update_blind(table_id, blind).await {
            self.emit_error("update blind", err);
        }
    }

    /// Open (or start) a table's next hand without blocking the actor
    fn spawn_table_open(&mut self, table_id: TableId, start: bool, context: &'static str) {
        if !self.pending_opens.insert(table_id.clone()) {
            return;
        }

        let backend = self.backend.clone();
        let sender = self.sender.clone();
        tokio::spawn(async move {
            let result = if start {
                backend.start_table_game(&table_id).await
            } else {
                backend.table_game_open(&table_id).await
            };

            if let Some(sender) = sender.upgrade() {
                let _ = sender
                    .send(CompetitionMessage::TableOpenFinished {
                        table_id,
                        context,
                        error: result.err().map(|err| err.to_string()),
                    })
                    .await;
            }
        });
    }

    async fn player_buy_in(&mut self, player: JoinPlayer) -> CompetitionResult<()> {
        if player.redeem_chips <= 0 {
            return Err(CompetitionError::NoRedeemChips);
        }

        let player_idx = self.competition.find_player_index(&player.player_id);
        let is_buy_in = player_idx.is_none();

        if !matches!(
            self.competition.state.status,
            CompetitionStatus::Registering | CompetitionStatus::DelayedBuyIn
        ) {
            return Err(if is_buy_in {
                CompetitionError::BuyInRejected
            } else {
                CompetitionError::ReBuyRejected
            });
        }

        if self.competition.is_cash() {
            match player_idx {
                Some(idx) => {
                    if self.competition.state.players[idx].chips > 0 {
                        return Err(CompetitionError::ReBuyRejected);
                    }
                }
                None => {
                    let table = self
                        .competition
                        .state
                        .tables
                        .first()
                        .ok_or(CompetitionError::TableNotFound)?;
                    if table.is_full() {
                        return Err(CompetitionError::BuyInRejected);
                    }
                }
            }
        }

        let table_id = if self.competition.is_cash() {
            self.competition.state.tables.first().map(|t| t.id.clone())
        } else {
            None
        };

        let snapshot = match player_idx {
            None => {
                let join_at = now();
                let entry = CompetitionPlayer::new(
                    player.player_id.clone(),
                    table_id.clone(),
                    player.redeem_chips,
                    join_at,
                );
                self.cache
                    .insert(&self.id, &player.player_id, join_at, table_id.clone());
                self.competition.state.players.push(entry.clone());
                log::info!(
                    "Competition {}: player {} bought in with {} chips",
                    self.id,
                    player.player_id,
                    player.redeem_chips
                );
                entry
            }
            Some(idx) => {
                if self.cache.get(&self.id, &player.player_id).is_none() {
                    return Err(CompetitionError::PlayerNotFound);
                }

                let cp = &mut self.competition.state.players[idx];
                cp.status = CompetitionPlayerStatus::Playing;
                cp.chips = player.redeem_chips;
                cp.re_buy_times += 1;
                cp.is_re_buying = false;
                cp.re_buy_end_at = None;
                cp.total_redeem_chips += player.redeem_chips;
                if table_id.is_some() {
                    cp.current_table_id = table_id.clone();
                }
                let entry = cp.clone();

                self.cache.update(&self.id, &player.player_id, |cached| {
                    cached.re_buy_times = entry.re_buy_times;
                    if table_id.is_some() {
                        cached.table_id = table_id.clone();
                    }
                });
                self.clear_re_buy_window(&player.player_id);
                log::info!(
                    "Competition {}: player {} re-bought {} chips ({} re-buy(s))",
                    self.id,
                    player.player_id,
                    player.redeem_chips,
                    entry.re_buy_times
                );
                entry
            }
        };

        self.competition.state.statistic.total_buy_in_count += 1;
        self.emit_player(snapshot);
        self.emit_updated();

        if let Some(table_id) = table_id {
            let reserve = table::JoinPlayer::new(player.player_id.clone(), player.redeem_chips);
            if let Err(err) = self.backend.player_reserve(&table_id, reserve).await {
                self.emit_error(
                    "buy in reserve",
                    format!("player {}: {}", player.player_id, err),
                );
            }
        }

        Ok(())
    }

    async fn player_cash_out(&mut self, table_id: &str, player_id: PlayerId) -> CompetitionResult<()> {
        let idx = self
            .competition
            .find_player_index(&player_id)
            .ok_or(CompetitionError::LeaveRejected)?;
        if !self.competition.is_cash() {
            return Err(CompetitionError::LeaveRejected);
        }

        let snapshot = {
            let cp = &mut self.competition.state.players[idx];
            cp.status = CompetitionPlayerStatus::CashLeaving;
            cp.clone()
        };
        log::info!("Competition {}: player {} cashing out", self.id, player_id);
        self.emit_player(snapshot);

        let status = self.competition.state.status;
        let paused = matches!(
            status,
            CompetitionStatus::DelayedBuyIn | CompetitionStatus::StoppedBuyIn
        ) && self
            .competition
            .state
            .tables
            .first()
            .is_some_and(|t| t.state.status == TableStatus::Pausing);

        if status == CompetitionStatus::Registering || paused {
            self.cash_out_players(table_id, vec![player_id]).await;
            self.emit_updated();
        }

        Ok(())
    }

    async fn close(&mut self, status: CompetitionStatus) -> CompetitionResult<()> {
        if !status.is_end() {
            return Err(CompetitionError::InvalidEndStatus(status));
        }

        self.close_competition(status).await;
        self.closed = true;
        Ok(())
    }

    /// Settle with a terminal status and close every table
    async fn close_competition(&mut self, status: CompetitionStatus) {
        if self.competition.is_end() {
            return;
        }

        self.settle_competition(status);

        let table_ids: Vec<TableId> = self
            .competition
            .state
            .tables
            .iter()
            .map(|t| t.id.clone())
            .collect();
        for table_id in table_ids {
            if let Err(err) = self.backend.close_table(&table_id).await {
                log::warn!(
                    "Competition {}: failed to close table {}: {}",
                    self.id,
                    table_id,
                    err
                );
            }
        }
    }

    fn settle_competition(&mut self, status: CompetitionStatus) {
        if matches!(
            self.competition.state.status,
            CompetitionStatus::DelayedBuyIn | CompetitionStatus::StoppedBuyIn
        ) {
            let live = {
                let cache = &self.cache;
                let id = &self.id;
                rank::final_competition_rankings(&self.competition.state.players, |player_id| {
                    cache.get(id, player_id).map(|c| c.join_key())
                })
            };
            self.competition.state.rankings =
                rank::settle_rankings(&self.competition.state.rankings, &live);
        }

        self.competition.state.status = status;
        if self.competition.is_cash() {
            self.competition.state.end_at = Some(now());
        }

        self.blind.stop();
        self.lifecycle.cancel();
        for (_, window) in self.re_buy_windows.drain() {
            window.cancel.cancel();
        }
        for (_, task) in self.break_resumes.drain() {
            task.cancel.cancel();
        }

        self.emit_updated();

        let evicted = self.cache.remove_competition(&self.id);
        log::info!(
            "Competition {} ended with status {} ({} cached player(s) evicted)",
            self.id,
            status,
            evicted
        );
    }

    fn update_reserve_table_player_state(&mut self, table_id: &str, player: &TablePlayerState) {
        if self.competition.is_end() || self.cache.get(&self.id, &player.player_id).is_none() {
            return;
        }

        let Some(cp) = self.competition.find_player_mut(&player.player_id) else {
            return;
        };
        cp.current_seat = Some(player.seat);
        cp.current_table_id = Some(table_id.to_string());
        cp.status = CompetitionPlayerStatus::Playing;
        let snapshot = cp.clone();

        self.cache.update(&self.id, &player.player_id, |cached| {
            cached.table_id = Some(table_id.to_string());
        });
        log::info!(
            "Competition {}: player {} reserved at table {} seat {}",
            self.id,
            player.player_id,
            table_id,
            player.seat
        );
        self.emit_player(snapshot);
        self.emit_updated();
    }

    /// Store a table snapshot and react to its status
    async fn update_table(&mut self, table: Table) {
        let Some(idx) = self.competition.find_table_index(&table.id) else {
            return;
        };
        if self.competition.is_end() {
            return;
        }

        let is_new_settlement = table.state.status == TableStatus::GameSettled
            && self
                .last_settled
                .get(&table.id)
                .is_none_or(|&count| table.state.game_count > count);
        self.competition.state.tables[idx] = table.clone();

        match table.state.status {
            TableStatus::Created => self.on_table_created(&table).await,
            TableStatus::Pausing => self.on_table_pausing(&table),
            TableStatus::Closed => self.on_table_closed(&table.id).await,
            TableStatus::GameSettled => {
                if is_new_settlement {
                    self.last_settled
                        .insert(table.id.clone(), table.state.game_count);
                    self.settle_table(&table).await;
                } else {
                    log::debug!(
                        "Competition {}: game #{} of table {} already settled",
                        self.id,
                        table.state.game_count,
                        table.id
                    );
                }
            }
            TableStatus::Restoring
            | TableStatus::Balancing
            | TableStatus::GameOpened
            | TableStatus::GamePlaying
            | TableStatus::GameStandby => {}
        }
    }

    /// Cash tables start once enough joined players hold chips
    async fn on_table_created(&mut self, table: &Table) {
        if !self.competition.is_cash() || !self.can_start_cash() {
            return;
        }

        if let Err(err) = self.start_competition() {
            self.emit_error("cash auto start", err);
            return;
        }

        self.update_table_blind(&table.id).await;
        self.spawn_table_open(table.id.clone(), true, "cash auto start table game");
    }

    fn can_start_cash(&self) -> bool {
        if self.competition.state.status != CompetitionStatus::Registering {
            return false;
        }

        let ready: usize = self
            .competition
            .state
            .tables
            .iter()
            .map(|t| t.ready_player_count())
            .sum();
        ready >= self.competition.meta.min_player_count
    }

    fn on_table_pausing(&mut self, table: &Table) {
        if !self.competition.is_cash() {
            return;
        }

        if table.ready_player_count() >= self.competition.meta.table_min_player_count
            && !self.competition.is_breaking()
        {
            log::info!("Competition {}: reopening table {}", self.id, table.id);
            self.spawn_table_open(table.id.clone(), false, "reopen paused table");
        }
    }

    async fn on_table_closed(&mut self, table_id: &str) {
        self.break_resumes.retain(|(id, _), task| {
            if id == table_id {
                task.cancel.cancel();
                false
            } else {
                true
            }
        });
        self.last_settled.remove(table_id);
        self.pending_opens.remove(table_id);

        if let Some(idx) = self.competition.find_table_index(table_id) {
            self.competition.state.tables.remove(idx);
        }
        log::info!("Competition {}: table {} closed", self.id, table_id);
        self.emit_updated();

        if self.competition.state.tables.is_empty() {
            self.close_competition(CompetitionStatus::End).await;
        }
    }

    /// Apply a settled hand after the settle delay
    async fn settle_table(&mut self, table: &Table) {
        tokio::time::sleep(self.config.competition.settle_delay).await;
        if self.competition.is_end() {
            return;
        }

        self.update_player_records(table);
        self.handle_re_buy(table);
        if self.competition.is_cash() {
            self.handle_cash_table_settlement(&table.id).await;
        }
        self.handle_breaking(&table.id);
        self.emit_updated();

        if self.should_close_cash_table(table.state.start_at) {
            log::info!(
                "Competition {}: table {} reached its max duration",
                self.id,
                table.id
            );
            if let Err(err) = self.backend.close_table(&table.id).await {
                self.emit_error("close cash table", err);
            }
        }
    }

    fn should_close_cash_table(&self, table_start_at: Option<i64>) -> bool {
        self.competition.is_cash()
            && table_start_at
                .is_some_and(|start_at| now() > start_at + self.competition.meta.max_duration)
    }

    /// Accumulate hand statistics and write table ranks back onto players
    fn update_player_records(&mut self, table: &Table) {
        let state = &table.state;
        let participants: Vec<&TablePlayerState> = state
            .game_player_indexes
            .iter()
            .filter_map(|&idx| state.player_states.get(idx))
            .collect();

        let mut preflop_folds = 0;
        for player in &participants {
            let Some(cp) = self.competition.find_player_mut(&player.player_id) else {
                continue;
            };

            let stats = &player.game_statistics;
            cp.total_game_counts += 1;
            if stats.is_fold {
                cp.total_fold_times += 1;
                match stats.fold_round {
                    Some(GameRound::Preflop) => {
                        cp.total_preflop_fold_times += 1;
                        preflop_folds += 1;
                    }
                    Some(GameRound::Flop) => cp.total_flop_fold_times += 1,
                    Some(GameRound::Turn) => cp.total_turn_fold_times += 1,
                    Some(GameRound::River) => cp.total_river_fold_times += 1,
                    None => {}
                }
            }
            cp.total_action_times += u64::from(stats.action_times);
            cp.total_raise_times += u64::from(stats.raise_times);
            cp.total_call_times += u64::from(stats.call_times);
            cp.total_check_times += u64::from(stats.check_times);
        }

        if let Some(game_state) = &state.game_state
            && let Some(result) = &game_state.result
        {
            for player_result in result.players.iter().filter(|r| r.changed > 0) {
                let Some(player) = state
                    .game_player_indexes
                    .get(player_result.idx)
                    .and_then(|&idx| state.player_states.get(idx))
                else {
                    continue;
                };
                let Some(cp) = self.competition.find_player_mut(&player.player_id) else {
                    continue;
                };

                cp.total_profit_times += 1;

                let game_player = game_state.player(player_result.idx);
                if game_player.is_some_and(|p| p.vpip) {
                    cp.total_vpip_times += 1;
                }

                if state.current_bb_seat == Some(player.seat)
                    && player.game_statistics.action_times == 0
                    && preflop_folds + 1 == participants.len()
                {
                    cp.total_walk_times += 1;
                }

                if player_result.changed > cp.best_winning_pot_chips {
                    cp.best_winning_pot_chips = player_result.changed;
                }

                if let Some(game_player) = game_player
                    && game_player.combination.power >= cp.best_winning_power
                {
                    cp.best_winning_power = game_player.combination.power;
                    cp.best_winning_combo = game_player.combination.cards.clone();
                    cp.best_winning_type = game_player.combination.kind.clone();
                }
            }
        }

        let ranking = {
            let cache = &self.cache;
            let id = &self.id;
            rank::table_ranking_data(table, |player_id| {
                cache.get(id, player_id).map(|c| c.join_key())
            })
        };
        for data in ranking {
            let Some(cp) = self.competition.find_player_mut(&data.player_id) else {
                continue;
            };
            cp.rank = Some(data.rank);
            cp.chips = data.chips;
            let snapshot = cp.clone();
            self.emit_player(snapshot);
        }
    }

    /// Open a re-buy window for players busted in this hand
    fn handle_re_buy(&mut self, table: &Table) {
        if self.competition.is_stop_buy_in() {
            return;
        }

        let setting = self.competition.meta.re_buy_setting;
        let re_buy_end_at = now() + setting.waiting_time;

        let mut batch = HashSet::new();
        let mut updated = Vec::new();
        for player in table.state.player_states.iter().filter(|p| !p.is_alive()) {
            let Some(cp) = self.competition.find_player_mut(&player.player_id) else {
                continue;
            };
            if cp.is_re_buying || cp.re_buy_times >= setting.max_time {
                continue;
            }

            cp.status = CompetitionPlayerStatus::ReBuyWaiting;
            cp.is_re_buying = true;
            cp.re_buy_end_at = Some(re_buy_end_at);
            batch.insert(cp.player_id.clone());
            updated.push(cp.clone());
        }

        for player in updated {
            log::info!(
                "Competition {}: player {} may re-buy until {}",
                self.id,
                player.player_id,
                re_buy_end_at
            );
            self.emit_player(player);
        }

        if !self.competition.is_cash() || batch.is_empty() {
            return;
        }

        let generation = self.next_generation();
        let cancel = self.timers.child_token();
        timer::schedule(
            secs(setting.waiting_time),
            cancel.clone(),
            self.sender.clone(),
            CompetitionMessage::ReBuyDeadline { generation },
        );
        self.re_buy_windows.insert(
            generation,
            ReBuyWindow {
                table_id: table.id.clone(),
                players: batch,
                cancel,
            },
        );
    }

    /// Drop a player from every pending re-buy window
    fn clear_re_buy_window(&mut self, player_id: &str) {
        self.re_buy_windows.retain(|_, window| {
            window.players.remove(player_id);
            if window.players.is_empty() {
                window.cancel.cancel();
                false
            } else {
                true
            }
        });
    }

    /// Cash out every player of the window that is still without chips
    async fn on_re_buy_deadline(&mut self, generation: u64) {
        let Some(window) = self.re_buy_windows.remove(&generation) else {
            return;
        };
        if self.competition.is_end() {
            return;
        }

        let players = &self.competition.state.players;
        let leavers: Vec<PlayerId> = window
            .players
            .into_iter()
            .filter(|id| players.iter().any(|p| &p.player_id == id && p.chips <= 0))
            .collect();
        if leavers.is_empty() {
            return;
        }

        log::info!(
            "Competition {}: re-buy window closed, removing {:?}",
            self.id,
            leavers
        );
        self.cash_out_players(&window.table_id, leavers).await;
        self.emit_updated();
    }

    async fn handle_cash_table_settlement(&mut self, table_id: &str) {
        let leavers: Vec<PlayerId> = self
            .competition
            .state
            .players
            .iter()
            .filter(|p| p.status == CompetitionPlayerStatus::CashLeaving)
            .map(|p| p.player_id.clone())
            .collect();

        self.cash_out_players(table_id, leavers).await;
    }

    /// Remove players from their table, the cache and the player list
    async fn cash_out_players(&mut self, table_id: &str, player_ids: Vec<PlayerId>) {
        if player_ids.is_empty() {
            return;
        }

        if let Err(err) = self
            .backend
            .players_leave(table_id, player_ids.clone())
            .await
        {
            self.emit_error("cash out", format!("{:?}: {}", player_ids, err));
        }

        for player_id in &player_ids {
            if let Some(player) = self
                .competition
                .state
                .players
                .iter()
                .find(|p| &p.player_id == player_id)
                .cloned()
            {
                log::info!(
                    "Competition {}: player {} cashed out {} chips",
                    self.id,
                    player_id,
                    player.chips
                );
                let _ = self.events.send(CompetitionEvent::PlayerCashOut {
                    competition_id: self.id.clone(),
                    player,
                });
                self.cache.remove(&self.id, player_id);
            }
            self.clear_re_buy_window(player_id);
        }

        self.competition
            .state
            .players
            .retain(|p| !player_ids.contains(&p.player_id));
    }

    /// Schedule the end-of-break resume for a table, once per level
    fn handle_breaking(&mut self, table_id: &str) {
        if !self.competition.is_breaking() {
            return;
        }

        let blind_state = &self.competition.state.blind_state;
        let level_index = blind_state.current_level_index;
        let key = (table_id.to_string(), level_index);
        if self.break_resumes.contains_key(&key) {
            return;
        }

        let Some(end_at) = usize::try_from(level_index)
            .ok()
            .and_then(|idx| blind_state.end_ats.get(idx))
            .copied()
        else {
            return;
        };

        let cancel = self.timers.child_token();
        timer::schedule_at(
            end_at + 1,
            cancel.clone(),
            self.sender.clone(),
            CompetitionMessage::BreakResume {
                table_id: table_id.to_string(),
                level_index,
            },
        );
        log::debug!(
            "Competition {}: table {} resumes after break at {}",
            self.id,
            table_id,
            end_at + 1
        );
        self.break_resumes.insert(
            key,
            BreakResumeTask {
                cancel,
                resumed: false,
            },
        );
    }

    fn on_break_resume(&mut self, table_id: TableId, level_index: i32) {
        if self.competition.is_end() {
            return;
        }

        let key = (table_id, level_index);
        if !self.break_resumes.get(&key).is_some_and(|task| !task.resumed) {
            return;
        }

        let Some(idx) = self.competition.find_table_index(&key.0) else {
            return;
        };
        let table = &self.competition.state.tables[idx];
        if table.state.status != TableStatus::Pausing
            || table.alive_player_count() < table.meta.table_min_player_count
        {
            return;
        }

        if let Some(task) = self.break_resumes.get_mut(&key) {
            task.resumed = true;
        }
        log::info!(
            "Competition {}: resuming table {} after break",
            self.id,
            key.0
        );
        self.spawn_table_open(key.0, false, "resume game from breaking");
    }

    async fn on_blind_level_advanced(&mut self, level_index: i32) {
        if self.competition.is_end() {
            return;
        }

        self.competition.state.blind_state.current_level_index = level_index;
        log::info!(
            "Competition {} blind level index {}",
            self.id,
            level_index
        );

        let table_ids: Vec<TableId> = self
            .competition
            .state
            .tables
            .iter()
            .map(|t| t.id.clone())
            .collect();
        for table_id in &table_ids {
            self.update_table_blind(table_id).await;
            self.handle_breaking(table_id);
        }

        if self.competition.is_stop_buy_in()
            && self.competition.state.status != CompetitionStatus::StoppedBuyIn
        {
            self.competition.state.status = CompetitionStatus::StoppedBuyIn;
            log::info!("Competition {} stopped buy-in", self.id);
            self.knockout_re_buy_waiting_players();
        }

        self.emit_updated();
    }

    /// Knock out every busted player still waiting to re-buy
    fn knockout_re_buy_waiting_players(&mut self) {
        for player_id in rank::stop_buy_in_knockout_rankings(&self.competition.state.players) {
            if self.cache.get(&self.id, &player_id).is_none() {
                continue;
            }
            let Some(cp) = self.competition.find_player_mut(&player_id) else {
                continue;
            };

            cp.status = CompetitionPlayerStatus::Knockout;
            cp.is_re_buying = false;
            cp.re_buy_end_at = None;
            cp.current_seat = None;
            let snapshot = cp.clone();

            log::info!("Competition {}: player {} knocked out", self.id, player_id);
            self.emit_player(snapshot);
            self.competition.state.rankings.push(CompetitionRank {
                player_id,
                final_chips: 0,
            });
        }
    }

    /// Close the cash table at the competition's end time unless a hand is running
    async fn cash_hard_close(&mut self) {
        if self.competition.is_end() {
            return;
        }

        let Some(table) = self.competition.state.tables.first() else {
            return;
        };
        if matches!(
            table.state.status,
            TableStatus::GameOpened
                | TableStatus::GamePlaying
                | TableStatus::GameSettled
                | TableStatus::Closed
        ) {
            return;
        }

        let table_id = table.id.clone();
        log::info!(
            "Competition {} reached its end time, closing table {}",
            self.id,
            table_id
        );
        if let Err(err) = self.backend.close_table(&table_id).await {
            self.emit_error("end time close table", err);
        }
    }

    fn emit_updated(&mut self) {
        self.competition.update_serial += 1;
        self.competition.update_at = now();
        let _ = self
            .events
            .send(CompetitionEvent::Updated(self.competition.clone()));
    }

    fn emit_player(&self, player: CompetitionPlayer) {
        let _ = self.events.send(CompetitionEvent::PlayerUpdated {
            competition_id: self.id.clone(),
            player,
        });
    }

    fn emit_error(&self, context: &str, err: impl std::fmt::Display) {
        log::error!("Competition {}: {}: {}", self.id, context, err);
        let _ = self.events.send(CompetitionEvent::ErrorUpdated {
            competition: self.competition.clone(),
            error: format!("{}: {}", context, err),
        });
    }
}
