//! Concurrent player cache keyed by competition and player identity.
//!
//! Entries hold no position in the competition's player list; callers always
//! resolve the player by id.

use super::models::CompetitionId;
use crate::table::{PlayerId, TableId};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCache {
    pub competition_id: CompetitionId,
    pub player_id: PlayerId,
    pub join_at: i64,
    /// Insertion order, breaks equal-second join ties
    pub join_seq: u64,
    pub re_buy_times: u32,
    pub table_id: Option<TableId>,
}

impl PlayerCache {
    /// Ordering key for join time, earlier first
    pub fn join_key(&self) -> (i64, u64) {
        (self.join_at, self.join_seq)
    }
}

/// Player cache shared by every competition of a manager
#[derive(Debug, Default)]
pub struct PlayerCacheStore {
    entries: DashMap<(CompetitionId, PlayerId), PlayerCache>,
    next_seq: AtomicU64,
}

impl PlayerCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a player's entry
    ///
    /// # Arguments
    ///
    /// * `competition_id` - Owning competition
    /// * `player_id` - Player identity
    /// * `join_at` - Join timestamp in Unix seconds
    /// * `table_id` - Table the player is seated at, if any
    ///
    /// # Returns
    ///
    /// * `PlayerCache` - The stored entry
    pub fn insert(
        &self,
        competition_id: &str,
        player_id: &str,
        join_at: i64,
        table_id: Option<TableId>,
    ) -> PlayerCache {
        let entry = PlayerCache {
            competition_id: competition_id.to_string(),
            player_id: player_id.to_string(),
            join_at,
            join_seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            re_buy_times: 0,
            table_id,
        };

        self.entries.insert(
            (competition_id.to_string(), player_id.to_string()),
            entry.clone(),
        );
        entry
    }

    pub fn get(&self, competition_id: &str, player_id: &str) -> Option<PlayerCache> {
        self.entries
            .get(&(competition_id.to_string(), player_id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Apply `f` to an entry in place; false if the entry is missing
    pub fn update<F>(&self, competition_id: &str, player_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut PlayerCache),
    {
        match self
            .entries
            .get_mut(&(competition_id.to_string(), player_id.to_string()))
        {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, competition_id: &str, player_id: &str) -> Option<PlayerCache> {
        self.entries
            .remove(&(competition_id.to_string(), player_id.to_string()))
            .map(|(_, entry)| entry)
    }

    /// Evict every entry of a competition
    ///
    /// # Returns
    ///
    /// * `usize` - Number of evicted entries
    pub fn remove_competition(&self, competition_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(id, _), _| id != competition_id);
        before.saturating_sub(self.entries.len())
    }

    pub fn competition_len(&self, competition_id: &str) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.key().0 == competition_id)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
