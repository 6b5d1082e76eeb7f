//! Competition error types.

use super::models::CompetitionStatus;
use crate::table::TableError;
use thiserror::Error;

/// Competition errors
#[derive(Debug, Error)]
pub enum CompetitionError {
    #[error("Invalid competition create setting: {0}")]
    InvalidCreateSetting(String),

    #[error("Competition already started")]
    StartRejected,

    #[error("Not allowed to leave")]
    LeaveRejected,

    #[error("No redeem chips")]
    NoRedeemChips,

    #[error("Not allowed to buy in")]
    BuyInRejected,

    #[error("Not allowed to re-buy")]
    ReBuyRejected,

    #[error("Player not found")]
    PlayerNotFound,

    #[error("Table not found")]
    TableNotFound,

    #[error("Competition {0} not found")]
    CompetitionNotFound(String),

    /// Close requested with a non-terminal status
    #[error("{0} is not an end status")]
    InvalidEndStatus(CompetitionStatus),

    /// Competition actor has stopped
    #[error("Competition is closed")]
    ActorUnavailable,

    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

pub type CompetitionResult<T> = Result<T, CompetitionError>;
