//! Tournament module for single-elimination bracket play.
//!
//! This module provides the bracket engine:
//! - Bracket construction with random seeding and byes
//! - Score recording and winner determination
//! - Winner advancement between rounds
//! - Completion detection and prize payouts
//! - Round-advance and completion notifications
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_decimal::Decimal;
//! use tournament_tracker::db::TextFileStore;
//! use tournament_tracker::notify::{SmtpConfig, SmtpNotifier};
//! use tournament_tracker::tournament::{EngineConfig, Tournament, TournamentEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(TextFileStore::open("./data")?);
//!     let notifier = Arc::new(SmtpNotifier::new(&SmtpConfig::from_env())?);
//!     let engine = TournamentEngine::new(store, notifier, EngineConfig::from_env());
//!
//!     let mut tournament = Tournament::new("Spring Open", Decimal::from(50));
//!     tournament.entered_teams = vec![/* teams from the store */];
//!
//!     let (tournament, _) = engine.create_bracket(tournament).await?;
//!     engine.alert_current_round(&tournament).await?;
//!     Ok(())
//! }
//! ```

pub mod bracket;
pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod prizes;

pub use config::EngineConfig;
pub use engine::{CompletionReport, TournamentEngine, UpdateSummary, parse_score};
pub use errors::{TournamentError, TournamentResult};
pub use models::{
    Matchup, MatchupEntry, MatchupEntryId, MatchupId, Person, PersonId, Prize, PrizeId, Team,
    TeamId, Tournament, TournamentId, UNSAVED_ID,
};
