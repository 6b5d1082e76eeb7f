//! Competition manager for spawning and addressing competition actors.

use crate::{
    competition::{
        CompetitionActor, CompetitionError, CompetitionEvent, CompetitionHandle, CompetitionId,
        CompetitionResult, CompetitionSetting, CompetitionStatus, JoinPlayer,
        NativeTableManagerBackend, PlayerCacheStore, TableManagerBackend, models::Competition,
    },
    config::EngineConfig,
    table::{GameBackend, PlayerId, Table, TableId, TableManager, TablePlayerState},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc};

/// Registry of running competitions
pub struct Manager {
    config: EngineConfig,

    backend: Arc<dyn TableManagerBackend>,

    /// Player cache shared by every competition
    cache: Arc<PlayerCacheStore>,

    /// Sink for every competition's events
    events: mpsc::UnboundedSender<CompetitionEvent>,

    competitions: Arc<RwLock<HashMap<CompetitionId, CompetitionHandle>>>,
}

impl Manager {
    /// Create a new manager
    ///
    /// # Arguments
    ///
    /// * `config` - Engine configuration handed to every competition
    /// * `backend` - Table manager backend
    /// * `events` - Sink for competition events
    ///
    /// # Returns
    ///
    /// * `Manager` - New manager instance
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn TableManagerBackend>,
        events: mpsc::UnboundedSender<CompetitionEvent>,
    ) -> Self {
        Self {
            config,
            backend,
            cache: Arc::new(PlayerCacheStore::new()),
            events,
            competitions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Manager driving in-process tables built from `games`
    pub fn native(
        config: EngineConfig,
        games: Arc<dyn GameBackend>,
        events: mpsc::UnboundedSender<CompetitionEvent>,
    ) -> Self {
        let tables = Arc::new(TableManager::new(games));
        Self::new(
            config,
            Arc::new(NativeTableManagerBackend::new(tables)),
            events,
        )
    }

    pub fn cache(&self) -> &Arc<PlayerCacheStore> {
        &self.cache
    }

    /// Create and spawn a competition
    ///
    /// # Returns
    ///
    /// * `CompetitionResult<Competition>` - Snapshot of the created competition
    pub async fn create_competition(
        &self,
        setting: CompetitionSetting,
    ) -> CompetitionResult<Competition> {
        let mut competitions = self.competitions.write().await;
        if competitions
            .get(&setting.competition_id)
            .is_some_and(|handle| !handle.is_closed())
        {
            return Err(CompetitionError::InvalidCreateSetting(format!(
                "competition {} already exists",
                setting.competition_id
            )));
        }

        let (actor, handle) = CompetitionActor::create(
            setting,
            self.config.clone(),
            self.backend.clone(),
            self.cache.clone(),
            self.events.clone(),
        )
        .await?;

        tokio::spawn(async move {
            actor.run().await;
        });

        let competition = handle.competition().await?;
        competitions.insert(competition.id.clone(), handle);
        drop(competitions);

        log::info!("Created competition {}", competition.id);
        Ok(competition)
    }

    /// Get competition handle
    pub async fn competition_handle(
        &self,
        competition_id: &str,
    ) -> CompetitionResult<CompetitionHandle> {
        let competitions = self.competitions.read().await;
        competitions
            .get(competition_id)
            .cloned()
            .ok_or_else(|| CompetitionError::CompetitionNotFound(competition_id.to_string()))
    }

    pub async fn competition(&self, competition_id: &str) -> CompetitionResult<Competition> {
        self.competition_handle(competition_id)
            .await?
            .competition()
            .await
    }

    pub async fn start_competition(&self, competition_id: &str) -> CompetitionResult<i64> {
        self.competition_handle(competition_id).await?.start().await
    }

    pub async fn player_buy_in(
        &self,
        competition_id: &str,
        player: JoinPlayer,
    ) -> CompetitionResult<()> {
        self.competition_handle(competition_id)
            .await?
            .player_buy_in(player)
            .await
    }

    pub async fn player_cash_out(
        &self,
        competition_id: &str,
        table_id: TableId,
        player_id: PlayerId,
    ) -> CompetitionResult<()> {
        self.competition_handle(competition_id)
            .await?
            .player_cash_out(table_id, player_id)
            .await
    }

    /// Settle a competition with `status` and drop it from the registry
    pub async fn close_competition(
        &self,
        competition_id: &str,
        status: CompetitionStatus,
    ) -> CompetitionResult<()> {
        let handle = self.competition_handle(competition_id).await?;
        handle.close(status).await?;

        let mut competitions = self.competitions.write().await;
        competitions.remove(competition_id);
        drop(competitions);

        log::info!("Removed competition {}", competition_id);
        Ok(())
    }

    /// Deliver a table snapshot to the competition owning the table
    pub async fn update_table(&self, table: Table) -> CompetitionResult<()> {
        self.competition_handle(&table.meta.competition_id)
            .await?
            .update_table(table)
            .await
    }

    pub async fn update_reserve_table_player_state(
        &self,
        competition_id: &str,
        table_id: TableId,
        player: TablePlayerState,
    ) -> CompetitionResult<()> {
        self.competition_handle(competition_id)
            .await?
            .update_reserve_table_player_state(table_id, player)
            .await
    }

    /// Get count of registered competitions
    pub async fn active_competition_count(&self) -> usize {
        let competitions = self.competitions.read().await;
        competitions.values().filter(|h| !h.is_closed()).count()
    }

    /// Force-end every competition and clear the registry
    pub async fn reset(&self) {
        let mut competitions = self.competitions.write().await;
        for (competition_id, handle) in competitions.drain() {
            if let Err(err) = handle.close(CompetitionStatus::ForceEnd).await {
                log::warn!(
                    "Failed to force-end competition {}: {}",
                    competition_id,
                    err
                );
            }
        }
        log::info!("Manager reset");
    }
}
