//! Competition actor message and event types.

use super::{
    errors::CompetitionResult,
    models::{Competition, CompetitionPlayer, CompetitionStatus, JoinPlayer},
};
use crate::table::{PlayerId, Table, TableId, TablePlayerState};
use tokio::sync::oneshot;

/// Messages that can be sent to a CompetitionActor
#[derive(Debug)]
pub enum CompetitionMessage {
    GetCompetition {
        response: oneshot::Sender<Competition>,
    },

    /// Start the competition; replies with the start timestamp
    Start {
        response: oneshot::Sender<CompetitionResult<i64>>,
    },

    /// Buy in a new player or re-buy a busted one
    PlayerBuyIn {
        player: JoinPlayer,
        response: oneshot::Sender<CompetitionResult<()>>,
    },

    PlayerCashOut {
        table_id: TableId,
        player_id: PlayerId,
        response: oneshot::Sender<CompetitionResult<()>>,
    },

    /// Settle with a terminal status and stop the actor
    Close {
        status: CompetitionStatus,
        response: oneshot::Sender<CompetitionResult<()>>,
    },

    /// Table snapshot delivered from outside the backend subscription
    TableUpdated { table: Table },

    TablePlayerReserved {
        table_id: TableId,
        player: TablePlayerState,
    },

    /// Configured start time reached
    AutoStart,

    /// Disable time reached
    AutoClose,

    /// Cash competition reached its end time
    CashHardClose,

    BlindLevelAdvanced { level_index: i32 },

    /// Re-buy window deadline for one settlement batch
    ReBuyDeadline { generation: u64 },

    /// A break level ended for one table
    BreakResume { table_id: TableId, level_index: i32 },

    /// Detached table open or start finished
    TableOpenFinished {
        table_id: TableId,
        context: &'static str,
        error: Option<String>,
    },
}

/// Events published by a competition
#[derive(Debug, Clone)]
pub enum CompetitionEvent {
    /// New snapshot
    Updated(Competition),

    /// Asynchronous failure, with the snapshot at the time
    ErrorUpdated {
        competition: Competition,
        error: String,
    },

    PlayerUpdated {
        competition_id: String,
        player: CompetitionPlayer,
    },

    /// Player left with their chips
    PlayerCashOut {
        competition_id: String,
        player: CompetitionPlayer,
    },
}

impl CompetitionEvent {
    pub fn competition_id(&self) -> &str {
        match self {
            CompetitionEvent::Updated(competition)
            | CompetitionEvent::ErrorUpdated { competition, .. } => &competition.id,
            CompetitionEvent::PlayerUpdated { competition_id, .. }
            | CompetitionEvent::PlayerCashOut { competition_id, .. } => competition_id,
        }
    }
}
