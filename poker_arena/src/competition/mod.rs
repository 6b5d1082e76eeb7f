//! Competition module: one actor per competition.
//!
//! This module implements:
//! - Competition data model and JSON snapshot (`models`)
//! - CompetitionActor: single-writer lifecycle orchestration (buy-in, re-buy,
//!   knockout, cash-out, settlement, close)
//! - Blind-level clock (`blind`) and ranking (`rank`)
//! - PlayerCacheStore: identity-keyed player cache shared by competitions
//! - TableManagerBackend: the contract a competition drives its tables through
//!
//! ## Architecture
//!
//! A competition actor owns its `Competition` exclusively. Table events reach
//! it through the backend subscription, deadlines (auto-start, auto-close,
//! blind levels, re-buy windows, break resumes) post messages into its inbox,
//! and table calls that may block for seconds (opening a hand) run detached
//! and report back as messages. Every outbound event carries an owned snapshot.

pub mod actor;
pub mod backend;
pub mod blind;
pub mod cache;
pub mod errors;
pub mod messages;
pub mod models;
pub mod rank;

pub use actor::{CompetitionActor, CompetitionHandle};
pub use backend::{NativeTableManagerBackend, TableManagerBackend};
pub use cache::{PlayerCache, PlayerCacheStore};
pub use errors::{CompetitionError, CompetitionResult};
pub use messages::{CompetitionEvent, CompetitionMessage};
pub use models::{
    Blind, BlindLevel, BlindState, Competition, CompetitionId, CompetitionMeta,
    CompetitionPlayer, CompetitionPlayerStatus, CompetitionRank, CompetitionSetting,
    CompetitionState, CompetitionStatus, CompetitionTableSetting, JoinPlayer, ReBuySetting,
    Statistic,
};
