//! # Poker Arena
//!
//! Table and competition orchestration for multiplayer card-game sessions.
//!
//! The crate drives tables (seating, dealer rotation, per-hand state machine)
//! and competitions (buy-in, re-buy, knockout, cash-out, blind levels,
//! ranking) on top of an external hand-rules engine. Every table and every
//! competition is a single-writer actor; callers talk to them through handles
//! and receive owned snapshots as events.
//!
//! ## Core Modules
//!
//! - [`table`]: Seat/dealer allocation, table engine and table actors
//! - [`competition`]: Competition actors, blind clock, ranking, player cache
//!   and the table manager backend contract
//! - [`manager`]: Registry of running competitions
//! - [`config`]: Environment-driven engine configuration
//! - [`timer`]: Cancellable deadline tasks posting into actor inboxes
//!
//! ## Example
//!
//! ```ignore
//! use poker_arena::{EngineConfig, Manager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let manager = Manager::native(EngineConfig::from_env().unwrap(), Arc::new(MyHandEngines), events);
//!
//!     let competition = manager.create_competition(setting).await.unwrap();
//!     manager
//!         .player_buy_in(&competition.id, JoinPlayer::new("alice", 1000))
//!         .await
//!         .unwrap();
//! }
//! ```

/// Engine configuration.
pub mod config;
pub use config::{CompetitionEngineOptions, ConfigError, EngineConfig};

/// Deadline tasks.
pub mod timer;

/// Tables: seating, engine, actors.
pub mod table;

/// Competitions: lifecycle orchestration over tables.
pub mod competition;
pub use competition::{
    Competition, CompetitionError, CompetitionEvent, CompetitionResult, CompetitionSetting,
    CompetitionStatus, JoinPlayer,
};

/// Competition registry.
pub mod manager;
pub use manager::Manager;
