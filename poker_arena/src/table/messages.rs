//! Table actor message and event types.

use super::{
    config::JoinPlayer,
    errors::TableResult,
    models::{
        GroupAction, PlayerGameAction, PlayerId, Table, TableBlindState, TableId,
        TablePlayerGameAction, TablePlayerState,
    },
};
use tokio::sync::oneshot;

/// Messages that can be sent to a TableActor
#[derive(Debug)]
pub enum TableMessage {
    /// Current snapshot
    GetTable {
        response: oneshot::Sender<Table>,
    },

    Pause {
        response: oneshot::Sender<TableResult<()>>,
    },

    /// Close the table and stop the actor
    Close {
        response: oneshot::Sender<TableResult<()>>,
    },

    /// Stamp the start time and open the first hand
    StartGame {
        response: oneshot::Sender<TableResult<()>>,
    },

    /// Open the next hand, retrying on failure
    OpenGame {
        response: oneshot::Sender<TableResult<()>>,
    },

    UpdateBlind {
        blind: TableBlindState,
        response: oneshot::Sender<TableResult<()>>,
    },

    /// Seat a new player or top up a seated one
    PlayerReserve {
        player: JoinPlayer,
        response: oneshot::Sender<TableResult<TablePlayerState>>,
    },

    /// Player acknowledges their seat
    PlayerJoin {
        player_id: PlayerId,
        response: oneshot::Sender<TableResult<()>>,
    },

    PlayerRedeemChips {
        player: JoinPlayer,
        response: oneshot::Sender<TableResult<()>>,
    },

    PlayersLeave {
        player_ids: Vec<PlayerId>,
        response: oneshot::Sender<TableResult<()>>,
    },

    PlayerAction {
        player_id: PlayerId,
        action: PlayerGameAction,
        response: oneshot::Sender<TableResult<()>>,
    },

    GroupAction {
        action: GroupAction,
        response: oneshot::Sender<TableResult<()>>,
    },

    /// Open-game retry deadline for the given attempt chain
    RetryOpenGame {
        generation: u64,
    },

    /// Post-settlement delay elapsed
    ContinueGame {
        generation: u64,
    },

    /// Join barrier deadline for the given barrier generation
    JoinBarrierTimeout {
        generation: u64,
    },
}

/// Events published by a table
#[derive(Debug, Clone)]
pub enum TableEvent {
    /// New snapshot
    Updated(Table),

    /// Asynchronous failure, with the snapshot at the time
    ErrorUpdated { table: Table, error: String },

    /// Player seated or topped up
    PlayerReserved {
        competition_id: String,
        table_id: TableId,
        player: TablePlayerState,
    },

    GamePlayerActionUpdated(TablePlayerGameAction),
}

impl TableEvent {
    /// Competition owning the table the event came from
    pub fn competition_id(&self) -> &str {
        match self {
            TableEvent::Updated(table) | TableEvent::ErrorUpdated { table, .. } => {
                &table.meta.competition_id
            }
            TableEvent::PlayerReserved { competition_id, .. } => competition_id,
            TableEvent::GamePlayerActionUpdated(action) => &action.competition_id,
        }
    }

    pub fn table_id(&self) -> &str {
        match self {
            TableEvent::Updated(table) | TableEvent::ErrorUpdated { table, .. } => &table.id,
            TableEvent::PlayerReserved { table_id, .. } => table_id,
            TableEvent::GamePlayerActionUpdated(action) => &action.table_id,
        }
    }
}
