//! Table actor implementation with async message handling.

use super::{
    config::{JoinPlayer, TableEngineOptions},
    engine::{GameProgress, NextHand, TableEngine},
    errors::{TableError, TableResult},
    messages::{TableEvent, TableMessage},
    models::{
        GroupAction, PlayerGameAction, PlayerId, Table, TableBlindState, TableId,
        TablePlayerState, TableStatus,
    },
};
use crate::timer;
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

type Responder = oneshot::Sender<TableResult<()>>;

/// Table actor handle for sending messages
#[derive(Clone)]
pub struct TableHandle {
    sender: mpsc::Sender<TableMessage>,
    table_id: TableId,
}

impl TableHandle {
    /// Create a new table handle
    pub fn new(sender: mpsc::Sender<TableMessage>, table_id: TableId) -> Self {
        Self { sender, table_id }
    }

    /// Get table ID
    pub fn table_id(&self) -> &str {
        &self.table_id
    }

    /// True once the actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> TableMessage,
    ) -> TableResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| TableError::ActorUnavailable)?;
        rx.await.map_err(|_| TableError::ActorUnavailable)
    }

    pub async fn table(&self) -> TableResult<Table> {
        self.request(|response| TableMessage::GetTable { response })
            .await
    }

    pub async fn pause(&self) -> TableResult<()> {
        self.request(|response| TableMessage::Pause { response })
            .await?
    }

    pub async fn close(&self) -> TableResult<()> {
        self.request(|response| TableMessage::Close { response })
            .await?
    }

    pub async fn start_game(&self) -> TableResult<()> {
        self.request(|response| TableMessage::StartGame { response })
            .await?
    }

    /// Open the next hand; resolves after success or the last retry
    pub async fn open_game(&self) -> TableResult<()> {
        self.request(|response| TableMessage::OpenGame { response })
            .await?
    }

    pub async fn update_blind(&self, blind: TableBlindState) -> TableResult<()> {
        self.request(|response| TableMessage::UpdateBlind { blind, response })
            .await?
    }

    pub async fn player_reserve(&self, player: JoinPlayer) -> TableResult<TablePlayerState> {
        self.request(|response| TableMessage::PlayerReserve { player, response })
            .await?
    }

    pub async fn player_join(&self, player_id: PlayerId) -> TableResult<()> {
        self.request(|response| TableMessage::PlayerJoin {
            player_id,
            response,
        })
        .await?
    }

    pub async fn player_redeem_chips(&self, player: JoinPlayer) -> TableResult<()> {
        self.request(|response| TableMessage::PlayerRedeemChips { player, response })
            .await?
    }

    pub async fn players_leave(&self, player_ids: Vec<PlayerId>) -> TableResult<()> {
        self.request(|response| TableMessage::PlayersLeave {
            player_ids,
            response,
        })
        .await?
    }

    pub async fn player_action(
        &self,
        player_id: PlayerId,
        action: PlayerGameAction,
    ) -> TableResult<()> {
        self.request(|response| TableMessage::PlayerAction {
            player_id,
            action,
            response,
        })
        .await?
    }

    pub async fn group_action(&self, action: GroupAction) -> TableResult<()> {
        self.request(|response| TableMessage::GroupAction { action, response })
            .await?
    }
}

/// Players the join barrier is still waiting on
struct JoinBarrier {
    generation: u64,
    pending: HashSet<PlayerId>,
    cancel: CancellationToken,
}

/// Open-game request waiting for its next retry
struct PendingOpen {
    generation: u64,
    attempt: u32,
    response: Option<Responder>,
    cancel: CancellationToken,
}

/// Table actor owning a single table engine
pub struct TableActor {
    /// Table ID
    id: TableId,

    engine: TableEngine,

    options: TableEngineOptions,

    /// Message inbox
    inbox: mpsc::Receiver<TableMessage>,

    /// Own inbox, for deadlines
    sender: mpsc::WeakSender<TableMessage>,

    /// Event sink
    events: mpsc::UnboundedSender<TableEvent>,

    /// Parent of every deadline this actor schedules
    timers: CancellationToken,

    join_barrier: Option<JoinBarrier>,

    pending_open: Option<PendingOpen>,

    /// Post-settlement delay, tagged with the hand it follows
    continue_timer: Option<(u64, CancellationToken)>,

    generation: u64,

    closed: bool,
}

impl TableActor {
    /// Create a new table actor
    ///
    /// # Arguments
    ///
    /// * `engine` - Table state machine, already holding the created table
    /// * `options` - Timing options
    /// * `events` - Sink for table events
    ///
    /// # Returns
    ///
    /// * `(TableActor, TableHandle)` - Actor and handle for sending messages
    pub fn new(
        engine: TableEngine,
        options: TableEngineOptions,
        events: mpsc::UnboundedSender<TableEvent>,
    ) -> (Self, TableHandle) {
        let (sender, inbox) = mpsc::channel(100);
        let id = engine.table().id.clone();

        let actor = Self {
            id: id.clone(),
            engine,
            options,
            inbox,
            sender: sender.downgrade(),
            events,
            timers: CancellationToken::new(),
            join_barrier: None,
            pending_open: None,
            continue_timer: None,
            generation: 0,
            closed: false,
        };

        (actor, TableHandle::new(sender, id))
    }

    /// Run the table actor event loop
    pub async fn run(mut self) {
        log::info!("Table {} starting", self.id);

        self.emit_updated();
        self.start_join_barrier();

        while let Some(message) = self.inbox.recv().await {
            self.handle_message(message);

            if self.closed {
                break;
            }
        }

        self.timers.cancel();
        log::info!("Table {} stopped", self.id);
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Handle a table message
    fn handle_message(&mut self, message: TableMessage) {
        match message {
            TableMessage::GetTable { response } => {
                let _ = response.send(self.engine.table().clone());
            }

            TableMessage::Pause { response } => {
                self.engine.pause();
                log::info!("Table {} paused", self.id);
                self.emit_updated();
                let _ = response.send(Ok(()));
            }

            TableMessage::Close { response } => {
                self.close();
                let _ = response.send(Ok(()));
            }

            TableMessage::StartGame { response } => {
                self.engine.mark_started();
                self.emit_updated();
                self.request_open(Some(response));
            }

            TableMessage::OpenGame { response } => {
                self.request_open(Some(response));
            }

            TableMessage::UpdateBlind { blind, response } => {
                self.engine.update_blind(blind);
                log::debug!("Table {} blind level {}", self.id, blind.level);
                let _ = response.send(Ok(()));
            }

            TableMessage::PlayerReserve { player, response } => {
                let result = self.player_reserve(player);
                let _ = response.send(result);
            }

            TableMessage::PlayerJoin {
                player_id,
                response,
            } => {
                let result = self.player_join(&player_id);
                let _ = response.send(result);
            }

            TableMessage::PlayerRedeemChips { player, response } => {
                let result = self.engine.player_redeem_chips(&player);
                if result.is_ok() {
                    self.emit_updated();
                }
                let _ = response.send(result);
            }

            TableMessage::PlayersLeave {
                player_ids,
                response,
            } => {
                self.engine.batch_remove_players(&player_ids);
                if let Some(barrier) = self.join_barrier.as_mut() {
                    for player_id in &player_ids {
                        barrier.pending.remove(player_id);
                    }
                }
                log::info!("Table {}: players left {:?}", self.id, player_ids);
                self.emit_updated();
                let _ = response.send(Ok(()));
            }

            TableMessage::PlayerAction {
                player_id,
                action,
                response,
            } => {
                let result = self.player_action(&player_id, action);
                let _ = response.send(result);
            }

            TableMessage::GroupAction { action, response } => {
                let result = self
                    .engine
                    .group_action(action)
                    .map(|progress| self.on_game_progress(progress));
                let _ = response.send(result);
            }

            TableMessage::RetryOpenGame { generation } => {
                match self.pending_open.take() {
                    Some(pending) if pending.generation == generation => {
                        self.attempt_open(pending.attempt, pending.response);
                    }
                    other => self.pending_open = other,
                }
            }

            TableMessage::ContinueGame { generation } => {
                if matches!(self.continue_timer, Some((g, _)) if g == generation) {
                    self.continue_timer = None;
                    self.continue_game();
                }
            }

            TableMessage::JoinBarrierTimeout { generation } => {
                if matches!(self.join_barrier, Some(ref b) if b.generation == generation) {
                    log::debug!("Table {} join barrier timed out", self.id);
                    self.complete_join_barrier();
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(pending) = self.pending_open.take() {
            pending.cancel.cancel();
            if let Some(response) = pending.response {
                let _ = response.send(Err(TableError::OpenGameFailed));
            }
        }

        self.engine.close();
        self.closed = true;
        self.timers.cancel();
        log::info!("Table {} closed", self.id);
        self.emit_updated();
    }

    fn player_reserve(&mut self, player: JoinPlayer) -> TableResult<TablePlayerState> {
        let (state, is_new) = self.engine.player_reserve(&player)?;
        log::info!(
            "Table {}: player {} reserved seat {} with {} chips",
            self.id,
            state.player_id,
            state.seat,
            state.bankroll
        );

        if is_new {
            self.start_join_barrier();
        }

        let table = self.engine.snapshot();
        let _ = self.events.send(TableEvent::PlayerReserved {
            competition_id: table.meta.competition_id.clone(),
            table_id: table.id.clone(),
            player: state.clone(),
        });
        let _ = self.events.send(TableEvent::Updated(table));

        Ok(state)
    }

    fn player_join(&mut self, player_id: &str) -> TableResult<()> {
        if !self.engine.player_join(player_id)? {
            return Ok(());
        }

        log::info!("Table {}: player {} joined", self.id, player_id);
        self.emit_updated();

        if self.engine.table().state.status == TableStatus::Balancing
            && let Some(barrier) = self.join_barrier.as_mut()
        {
            barrier.pending.remove(player_id);
            if barrier.pending.is_empty() {
                self.complete_join_barrier();
            }
        }

        Ok(())
    }

    fn player_action(&mut self, player_id: &str, action: PlayerGameAction) -> TableResult<()> {
        let (progress, record) = self.engine.player_action(player_id, action)?;
        if let Some(record) = record {
            let _ = self.events.send(TableEvent::GamePlayerActionUpdated(record));
        }
        self.on_game_progress(progress);
        Ok(())
    }

    /// (Re)start the barrier over every player that has not joined yet
    fn start_join_barrier(&mut self) {
        if let Some(barrier) = self.join_barrier.take() {
            barrier.cancel.cancel();
        }

        let pending: HashSet<PlayerId> = self.engine.pending_join_players().into_iter().collect();
        if pending.is_empty() {
            return;
        }

        let generation = self.next_generation();
        let cancel = self.timers.child_token();
        timer::schedule(
            self.options.join_timeout,
            cancel.clone(),
            self.sender.clone(),
            TableMessage::JoinBarrierTimeout { generation },
        );

        log::debug!(
            "Table {} waiting for {} player(s) to join",
            self.id,
            pending.len()
        );
        self.join_barrier = Some(JoinBarrier {
            generation,
            pending,
            cancel,
        });
    }

    fn complete_join_barrier(&mut self) {
        if let Some(barrier) = self.join_barrier.take() {
            barrier.cancel.cancel();
        }

        let joined = self.engine.mark_all_joined();
        if !joined.is_empty() {
            log::info!("Table {}: auto-joined {:?}", self.id, joined);
            self.emit_updated();
        }

        if self.engine.should_auto_start() {
            self.engine.mark_started();
            self.emit_updated();
            self.request_open(None);
        }
    }

    /// Start an open attempt chain, superseding any chain still retrying
    fn request_open(&mut self, response: Option<Responder>) {
        if let Some(previous) = self.pending_open.take() {
            previous.cancel.cancel();
            if let Some(response) = previous.response {
                let _ = response.send(Err(TableError::OpenGameFailed));
            }
        }

        self.attempt_open(0, response);
    }

    fn attempt_open(&mut self, attempt: u32, response: Option<Responder>) {
        match self.engine.open_game() {
            Ok(()) => {
                log::info!(
                    "Table {} opened game #{}",
                    self.id,
                    self.engine.table().state.game_count
                );
                self.emit_updated();

                let result = self
                    .engine
                    .start_game()
                    .map(|progress| self.on_game_progress(progress));
                match response {
                    Some(response) => {
                        let _ = response.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            self.emit_error(&err);
                        }
                    }
                }
            }

            Err(TableError::OpenGameFailed) if attempt < self.options.open_game_retries => {
                log::warn!(
                    "Table {}: failed to open game, retry {} of {}",
                    self.id,
                    attempt + 1,
                    self.options.open_game_retries
                );

                let generation = self.next_generation();
                let cancel = self.timers.child_token();
                timer::schedule(
                    self.options.open_game_retry_delay,
                    cancel.clone(),
                    self.sender.clone(),
                    TableMessage::RetryOpenGame { generation },
                );
                self.pending_open = Some(PendingOpen {
                    generation,
                    attempt: attempt + 1,
                    response,
                    cancel,
                });
            }

            Err(err) => {
                log::error!("Table {}: open game failed: {}", self.id, err);
                match response {
                    Some(response) => {
                        let _ = response.send(Err(err));
                    }
                    None => self.emit_error(&err),
                }
            }
        }
    }

    fn on_game_progress(&mut self, progress: GameProgress) {
        match progress {
            GameProgress::Progressed(event) => {
                log::debug!("Table {} game event {}", self.id, event);
                self.emit_updated();
            }
            GameProgress::Closed => self.on_game_closed(),
            GameProgress::Malformed(symbol) => {
                self.emit_error(&TableError::UnknownGameEvent(symbol));
            }
        }
    }

    /// Settle the hand, reset for the next one, and wait before continuing
    fn on_game_closed(&mut self) {
        self.engine.settle();
        log::info!(
            "Table {} settled game #{}",
            self.id,
            self.engine.table().state.game_count
        );
        self.emit_updated();

        self.engine.reset_for_next_hand();

        if let Some((_, cancel)) = self.continue_timer.take() {
            cancel.cancel();
        }
        let generation = self.next_generation();
        let cancel = self.timers.child_token();
        timer::schedule(
            self.options.interval,
            cancel.clone(),
            self.sender.clone(),
            TableMessage::ContinueGame { generation },
        );
        self.continue_timer = Some((generation, cancel));
    }

    fn continue_game(&mut self) {
        match self.engine.next_hand() {
            NextHand::Pause => {
                self.engine.pause();
                log::info!("Table {} pausing", self.id);
                self.emit_updated();
            }
            NextHand::Open => self.request_open(None),
            NextHand::Idle => {}
        }
    }

    fn emit_updated(&mut self) {
        let table = self.engine.snapshot();
        let _ = self.events.send(TableEvent::Updated(table));
    }

    fn emit_error(&mut self, err: &TableError) {
        log::error!("Table {}: {}", self.id, err);
        let table = self.engine.snapshot();
        let _ = self.events.send(TableEvent::ErrorUpdated {
            table,
            error: err.to_string(),
        });
    }
}
