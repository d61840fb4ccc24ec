//! # Tournament Tracker
//!
//! A single-elimination tournament bracket engine. Entrants are shuffled
//! into a bracket padded with byes up to the next power of two, scores are
//! recorded matchup by matchup, and winners advance automatically until a
//! champion emerges and prizes pay out from the entry-fee pool.
//!
//! ## Core Modules
//!
//! - [`tournament`]: entity models, bracket construction, the result engine,
//!   and prize payout rules
//! - [`db`]: interchangeable persistence backends (PostgreSQL and flat-file)
//!   behind the [`db::TournamentStore`] trait
//! - [`notify`]: round-advance and completion email notifications behind the
//!   [`notify::Notifier`] trait
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_decimal::Decimal;
//! use tournament_tracker::db::{TextFileStore, TournamentStore};
//! use tournament_tracker::notify::{SmtpConfig, SmtpNotifier};
//! use tournament_tracker::tournament::{EngineConfig, Tournament, TournamentEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(TextFileStore::open("./data")?);
//!     let notifier = Arc::new(SmtpNotifier::new(&SmtpConfig::from_env())?);
//!     let engine = TournamentEngine::new(store.clone(), notifier, EngineConfig::from_env());
//!
//!     let mut tournament = Tournament::new("Spring Open", Decimal::from(50));
//!     tournament.entered_teams = store.teams().await?;
//!
//!     let (mut tournament, _) = engine.create_bracket(tournament).await?;
//!     engine.alert_current_round(&tournament).await?;
//!
//!     // Score the first matchup of round 1 and let the winner advance.
//!     let matchup_id = tournament.rounds[0][0].id;
//!     engine.record_score(&mut tournament, matchup_id, 0, 2.0)?;
//!     engine.record_score(&mut tournament, matchup_id, 1, 1.0)?;
//!     let summary = engine.update_results(&mut tournament).await?;
//!     if let Some(report) = summary.completion {
//!         println!("champion: {}", report.champion.name);
//!     }
//!     Ok(())
//! }
//! ```

/// Persistence backends and the store trait.
pub mod db;
pub use db::{DatabaseConfig, PgTournamentStore, StoreError, TextFileStore, TournamentStore};

/// Notification composition and delivery.
pub mod notify;
pub use notify::{Notifier, NotifyError, SmtpConfig, SmtpNotifier};

/// Bracket engine, entity models, and prize rules.
pub mod tournament;
pub use tournament::{
    EngineConfig, Tournament, TournamentEngine, TournamentError, TournamentResult,
};
