//! Table module: one actor per table.
//!
//! This module implements:
//! - Seat and dealer allocation (`seating`)
//! - TableEngine: single-writer table state machine
//! - TableActor: async actor owning one engine, its deadlines and join barrier
//! - TableManager: registry spawning and addressing table actors
//! - The contract of the external hand-rules engine (`game`)
//!
//! ## Architecture
//!
//! Each table runs in a separate Tokio task with an mpsc message inbox.
//! Deadlines (join barrier, open-game retry, post-settlement delay) are
//! spawned tasks that post back into that inbox, so every state change
//! happens on the actor's task. Table events go out on an unbounded channel.
//!
//! ## Example
//!
//! ```ignore
//! use poker_arena::table::{TableEngineOptions, TableManager, TableSetting};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = TableManager::new(Arc::new(MyHandEngines));
//!     let (events, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!
//!     let table = manager
//!         .create_table(TableEngineOptions::default(), TableSetting::default(), events)
//!         .await
//!         .unwrap();
//!
//!     manager.start_table_game(&table.id).await.unwrap();
//! }
//! ```

pub mod actor;
pub mod config;
pub mod engine;
pub mod errors;
pub mod game;
pub mod manager;
pub mod messages;
pub mod models;
pub mod seating;

pub use actor::{TableActor, TableHandle};
pub use config::{JoinPlayer, Mode, Rule, TableEngineOptions, TableMeta, TableSetting};
pub use engine::{GameProgress, NextHand, TableEngine};
pub use errors::{TableError, TableResult};
pub use game::{GameBackend, GameError, GameEvent, GameOptions, GameState, HandEngine};
pub use manager::TableManager;
pub use messages::{TableEvent, TableMessage};
pub use models::{
    GroupAction, PlayerGameAction, PlayerId, Position, Table, TableBlindState, TableId,
    TablePlayerGameAction, TablePlayerState, TableStatus,
};
