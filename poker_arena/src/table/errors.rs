//! Table error types.

use super::{game::GameError, models::TableStatus};
use thiserror::Error;

/// Table errors
#[derive(Debug, Error)]
pub enum TableError {
    /// Not enough free seats for the requested players
    #[error("No empty seats available")]
    NoEmptySeats,

    #[error("Invalid table create setting: {0}")]
    InvalidCreateSetting(String),

    #[error("Player not found at table")]
    PlayerNotFound,

    /// Game action outside of a running hand, or by a non-participant
    #[error("Invalid game action")]
    InvalidGameAction,

    #[error("Invalid action")]
    InvalidAction,

    /// Reserved seat is taken or out of range
    #[error("Seat unavailable")]
    SeatUnavailable,

    /// Not enough eligible participants or blinds not set
    #[error("Failed to open game")]
    OpenGameFailed,

    #[error("Operation not allowed while table is {0}")]
    InvalidTableStatus(TableStatus),

    /// Hand engine reported an event symbol we do not know
    #[error("Unknown game event: {0}")]
    UnknownGameEvent(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    /// Table actor has stopped
    #[error("Table is closed")]
    ActorUnavailable,

    #[error("Game rejected action: {0}")]
    Game(#[from] GameError),
}

pub type TableResult<T> = Result<T, TableError>;
