//! Blind-level clock.
//!
//! The clock owns no competition state. Starting it computes the level end
//! timestamps and schedules one deadline per later level; each deadline posts
//! the new level index back to the competition actor.

use super::models::Blind;
use crate::timer;
use tokio::{sync::mpsc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Level progression computed when the clock starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlindSchedule {
    pub current_level_index: i32,
    /// End timestamp of each level, 0 for levels skipped by the initial level
    pub end_ats: Vec<i64>,
}

/// Index of the configured initial level, falling back to the first level
pub fn initial_level_index(blind: &Blind) -> usize {
    blind
        .levels
        .iter()
        .position(|level| level.level == blind.initial_level)
        .unwrap_or(0)
}

/// End timestamps of every level when the clock starts at `start_index`
pub fn level_end_ats(blind: &Blind, start_index: usize, now: i64) -> Vec<i64> {
    let mut end_at = now;
    blind
        .levels
        .iter()
        .enumerate()
        .map(|(idx, level)| {
            if idx < start_index {
                return 0;
            }
            end_at += level.duration;
            end_at
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct BlindClock {
    cancel: Option<CancellationToken>,
}

impl BlindClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| !c.is_cancelled())
    }

    /// Start the clock, replacing any running one
    ///
    /// # Arguments
    ///
    /// * `blind` - Blind structure
    /// * `now` - Start timestamp in Unix seconds
    /// * `parent` - Parent token; cancelling it stops the clock
    /// * `target` - Inbox receiving level advances
    /// * `advanced` - Builds the message for a new level index
    ///
    /// # Returns
    ///
    /// * `BlindSchedule` - Starting level and level end timestamps
    pub fn start<M, F>(
        &mut self,
        blind: &Blind,
        now: i64,
        parent: &CancellationToken,
        target: mpsc::WeakSender<M>,
        advanced: F,
    ) -> BlindSchedule
    where
        M: Send + 'static,
        F: Fn(i32) -> M,
    {
        self.stop();

        if blind.levels.is_empty() {
            return BlindSchedule {
                current_level_index: -1,
                end_ats: Vec::new(),
            };
        }

        let start_index = initial_level_index(blind);
        let end_ats = level_end_ats(blind, start_index, now);

        let cancel = parent.child_token();
        let mut elapsed = 0;
        for idx in start_index + 1..blind.levels.len() {
            elapsed += blind.levels[idx - 1].duration;
            let Ok(level_index) = i32::try_from(idx) else {
                break;
            };
            timer::schedule(
                Duration::from_secs(u64::try_from(elapsed).unwrap_or(0)),
                cancel.clone(),
                target.clone(),
                advanced(level_index),
            );
        }

        log::debug!(
            "Blind {} started at level index {}",
            blind.id,
            start_index
        );
        self.cancel = Some(cancel);

        BlindSchedule {
            current_level_index: i32::try_from(start_index).unwrap_or(-1),
            end_ats,
        }
    }

    /// Cancel every pending level advance
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}
