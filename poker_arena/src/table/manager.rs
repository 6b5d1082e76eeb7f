//! Table manager for spawning and managing multiple table actors.

use super::{
    actor::{TableActor, TableHandle},
    config::{JoinPlayer, TableEngineOptions, TableSetting},
    engine::TableEngine,
    errors::{TableError, TableResult},
    game::GameBackend,
    messages::TableEvent,
    models::{
        GroupAction, PlayerGameAction, PlayerId, Table, TableBlindState, TableId,
        TablePlayerState,
    },
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc};

/// Table manager for managing multiple table instances
pub struct TableManager {
    /// Hand engine factory shared by every table
    backend: Arc<dyn GameBackend>,

    /// Active table handles
    tables: Arc<RwLock<HashMap<TableId, TableHandle>>>,
}

impl TableManager {
    /// Create a new table manager
    ///
    /// # Arguments
    ///
    /// * `backend` - Hand engine factory
    ///
    /// # Returns
    ///
    /// * `TableManager` - New table manager instance
    pub fn new(backend: Arc<dyn GameBackend>) -> Self {
        Self {
            backend,
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create and spawn a new table
    ///
    /// # Arguments
    ///
    /// * `options` - Table timing options
    /// * `setting` - Table setting
    /// * `events` - Sink for the table's events
    ///
    /// # Returns
    ///
    /// * `TableResult<Table>` - Snapshot of the created table
    pub async fn create_table(
        &self,
        options: TableEngineOptions,
        setting: TableSetting,
        events: mpsc::UnboundedSender<TableEvent>,
    ) -> TableResult<Table> {
        options
            .validate()
            .map_err(TableError::InvalidCreateSetting)?;

        let engine = TableEngine::create(setting, self.backend.clone())?;
        let table = engine.table().clone();

        let mut tables = self.tables.write().await;
        if tables.get(&table.id).is_some_and(|handle| !handle.is_closed()) {
            return Err(TableError::InvalidCreateSetting(format!(
                "table {} already exists",
                table.id
            )));
        }

        let (actor, handle) = TableActor::new(engine, options, events);
        tables.insert(table.id.clone(), handle);
        drop(tables);

        tokio::spawn(async move {
            actor.run().await;
        });

        log::info!("Created table {}", table.id);
        Ok(table)
    }

    /// Get table handle
    pub async fn table_handle(&self, table_id: &str) -> TableResult<TableHandle> {
        let tables = self.tables.read().await;
        tables
            .get(table_id)
            .cloned()
            .ok_or_else(|| TableError::TableNotFound(table_id.to_string()))
    }

    pub async fn table(&self, table_id: &str) -> TableResult<Table> {
        self.table_handle(table_id).await?.table().await
    }

    /// Close a table and drop it from the registry
    pub async fn close_table(&self, table_id: &str) -> TableResult<()> {
        let handle = self.table_handle(table_id).await?;
        let result = handle.close().await;

        let mut tables = self.tables.write().await;
        tables.remove(table_id);
        drop(tables);

        log::info!("Removed table {}", table_id);
        result
    }

    pub async fn pause_table(&self, table_id: &str) -> TableResult<()> {
        self.table_handle(table_id).await?.pause().await
    }

    pub async fn start_table_game(&self, table_id: &str) -> TableResult<()> {
        self.table_handle(table_id).await?.start_game().await
    }

    pub async fn table_game_open(&self, table_id: &str) -> TableResult<()> {
        self.table_handle(table_id).await?.open_game().await
    }

    pub async fn update_blind(&self, table_id: &str, blind: TableBlindState) -> TableResult<()> {
        self.table_handle(table_id).await?.update_blind(blind).await
    }

    pub async fn player_reserve(
        &self,
        table_id: &str,
        player: JoinPlayer,
    ) -> TableResult<TablePlayerState> {
        self.table_handle(table_id)
            .await?
            .player_reserve(player)
            .await
    }

    pub async fn player_join(&self, table_id: &str, player_id: PlayerId) -> TableResult<()> {
        self.table_handle(table_id)
            .await?
            .player_join(player_id)
            .await
    }

    pub async fn player_redeem_chips(&self, table_id: &str, player: JoinPlayer) -> TableResult<()> {
        self.table_handle(table_id)
            .await?
            .player_redeem_chips(player)
            .await
    }

    pub async fn players_leave(&self, table_id: &str, player_ids: Vec<PlayerId>) -> TableResult<()> {
        self.table_handle(table_id)
            .await?
            .players_leave(player_ids)
            .await
    }

    pub async fn player_action(
        &self,
        table_id: &str,
        player_id: PlayerId,
        action: PlayerGameAction,
    ) -> TableResult<()> {
        self.table_handle(table_id)
            .await?
            .player_action(player_id, action)
            .await
    }

    pub async fn group_action(&self, table_id: &str, action: GroupAction) -> TableResult<()> {
        self.table_handle(table_id)
            .await?
            .group_action(action)
            .await
    }

    /// Get active table count
    pub async fn active_table_count(&self) -> usize {
        let tables = self.tables.read().await;
        tables.len()
    }

    /// Close every table
    pub async fn reset(&self) {
        let handles: Vec<TableHandle> = {
            let mut tables = self.tables.write().await;
            tables.drain().map(|(_, handle)| handle).collect()
        };

        for handle in handles {
            if let Err(e) = handle.close().await {
                log::warn!("Failed to close table {}: {}", handle.table_id(), e);
            }
        }
    }
}
