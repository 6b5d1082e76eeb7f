//! Contract between a competition and the tables it drives.

use crate::table::{
    JoinPlayer, PlayerId, Table, TableBlindState, TableEngineOptions, TableEvent, TableManager,
    TablePlayerState, TableResult, TableSetting,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Table operations a competition engine relies on
///
/// Events of every table created for a competition are delivered, as owned
/// snapshots, to the listener subscribed under that competition's id.
#[async_trait]
pub trait TableManagerBackend: Send + Sync {
    /// Route events of the competition's tables to `listener`
    fn subscribe(&self, competition_id: &str, listener: mpsc::UnboundedSender<TableEvent>);

    fn unsubscribe(&self, competition_id: &str);

    async fn create_table(
        &self,
        options: TableEngineOptions,
        setting: TableSetting,
    ) -> TableResult<Table>;

    async fn pause_table(&self, table_id: &str) -> TableResult<()>;

    async fn close_table(&self, table_id: &str) -> TableResult<()>;

    async fn start_table_game(&self, table_id: &str) -> TableResult<()>;

    async fn table_game_open(&self, table_id: &str) -> TableResult<()>;

    async fn update_blind(&self, table_id: &str, blind: TableBlindState) -> TableResult<()>;

    async fn player_reserve(
        &self,
        table_id: &str,
        player: JoinPlayer,
    ) -> TableResult<TablePlayerState>;

    async fn player_join(&self, table_id: &str, player_id: PlayerId) -> TableResult<()>;

    async fn player_redeem_chips(&self, table_id: &str, player: JoinPlayer) -> TableResult<()>;

    async fn players_leave(&self, table_id: &str, player_ids: Vec<PlayerId>) -> TableResult<()>;
}

/// In-process backend over a [`TableManager`]
pub struct NativeTableManagerBackend {
    manager: Arc<TableManager>,

    /// Competition id -> event listener
    listeners: Arc<DashMap<String, mpsc::UnboundedSender<TableEvent>>>,
}

impl NativeTableManagerBackend {
    pub fn new(manager: Arc<TableManager>) -> Self {
        Self {
            manager,
            listeners: Arc::new(DashMap::new()),
        }
    }

    pub fn table_manager(&self) -> &Arc<TableManager> {
        &self.manager
    }

    /// Forward one table's events to whichever competition subscribed to it
    fn spawn_router(&self, mut events: mpsc::UnboundedReceiver<TableEvent>) {
        let listeners = self.listeners.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let competition_id = event.competition_id().to_string();
                let delivered = match listeners.get(&competition_id) {
                    Some(listener) => listener.send(event).is_ok(),
                    None => continue,
                };

                if !delivered {
                    log::debug!("Dropping closed listener of competition {}", competition_id);
                    listeners.remove(&competition_id);
                }
            }
        });
    }
}

#[async_trait]
impl TableManagerBackend for NativeTableManagerBackend {
    fn subscribe(&self, competition_id: &str, listener: mpsc::UnboundedSender<TableEvent>) {
        self.listeners.insert(competition_id.to_string(), listener);
    }

    fn unsubscribe(&self, competition_id: &str) {
        self.listeners.remove(competition_id);
    }

    async fn create_table(
        &self,
        options: TableEngineOptions,
        setting: TableSetting,
    ) -> TableResult<Table> {
        let (tx, rx) = mpsc::unbounded_channel();
        let table = self.manager.create_table(options, setting, tx).await?;
        self.spawn_router(rx);
        Ok(table)
    }

    async fn pause_table(&self, table_id: &str) -> TableResult<()> {
        self.manager.pause_table(table_id).await
    }

    async fn close_table(&self, table_id: &str) -> TableResult<()> {
        self.manager.close_table(table_id).await
    }

    async fn start_table_game(&self, table_id: &str) -> TableResult<()> {
        self.manager.start_table_game(table_id).await
    }

    async fn table_game_open(&self, table_id: &str) -> TableResult<()> {
        self.manager.table_game_open(table_id).await
    }

    async fn update_blind(&self, table_id: &str, blind: TableBlindState) -> TableResult<()> {
        self.manager.update_blind(table_id, blind).await
    }

    async fn player_reserve(
        &self,
        table_id: &str,
        player: JoinPlayer,
    ) -> TableResult<TablePlayerState> {
        self.manager.player_reserve(table_id, player).await
    }

    async fn player_join(&self, table_id: &str, player_id: PlayerId) -> TableResult<()> {
        self.manager.player_join(table_id, player_id).await
    }

    async fn player_redeem_chips(&self, table_id: &str, player: JoinPlayer) -> TableResult<()> {
        self.manager.player_redeem_chips(table_id, player).await
    }

    async fn players_leave(&self, table_id: &str, player_ids: Vec<PlayerId>) -> TableResult<()> {
        self.manager.players_leave(table_id, player_ids).await
    }
}
