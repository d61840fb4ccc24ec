//! Persistence backends for tournaments, teams, people, and prizes.
//!
//! Two interchangeable stores implement [`TournamentStore`]: a PostgreSQL
//! backend ([`sql::PgTournamentStore`]) and a line-oriented flat-file backend
//! ([`text::TextFileStore`]). The engine only sees the trait, so backends
//! can be swapped by dependency injection.

use crate::tournament::models::{Matchup, MatchupId, Person, Prize, Team, Tournament};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod sequence;
pub mod sql;
pub mod text;

pub use config::DatabaseConfig;
pub use sequence::IdSequence;
pub use sql::PgTournamentStore;
pub use text::TextFileStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be parsed back into a model
    #[error("Corrupt record in {file}: {reason}")]
    Corrupt { file: String, reason: String },

    /// A stored reference names an id that does not exist
    #[error("Unknown {kind} id: {id}")]
    UnknownId { kind: &'static str, id: i64 },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable storage for the tracker's entities.
///
/// `create_*` methods assign a unique id and return the stored model with
/// the id populated. List methods return fully hydrated models: teams carry
/// their members, tournaments carry teams, prizes, and the complete bracket.
#[async_trait]
pub trait TournamentStore: Send + Sync {
    /// Store a person and assign their id.
    async fn create_person(&self, person: Person) -> StoreResult<Person>;

    /// Store a team and assign its id. Members must already be stored.
    async fn create_team(&self, team: Team) -> StoreResult<Team>;

    /// Store a prize and assign its id.
    async fn create_prize(&self, prize: Prize) -> StoreResult<Prize>;

    /// Store a tournament with its full bracket, assigning ids to the
    /// tournament and every matchup and entry. Provisional parent-matchup
    /// references from the bracket builder are rewritten to durable ids.
    async fn create_tournament(&self, tournament: Tournament) -> StoreResult<Tournament>;

    /// All stored people.
    async fn people(&self) -> StoreResult<Vec<Person>>;

    /// All stored teams, members included.
    async fn teams(&self) -> StoreResult<Vec<Team>>;

    /// All stored prizes.
    async fn prizes(&self) -> StoreResult<Vec<Prize>>;

    /// All active tournaments, fully hydrated.
    async fn tournaments(&self) -> StoreResult<Vec<Tournament>>;

    /// Persist a matchup's winner and each entry's team and score. Unset
    /// winner or team references are stored as absent, not errors.
    async fn update_matchup(&self, matchup: &Matchup) -> StoreResult<()>;

    /// Mark a tournament inactive.
    async fn complete_tournament(&self, tournament: &Tournament) -> StoreResult<()>;
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Open a connection pool for the given configuration.
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database connection is healthy.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Replace the bracket's provisional matchup and entry ids with ids drawn
/// from the given allocators, rewriting parent references to match.
///
/// Rounds are renumbered in play order, so a parent reference always points
/// at a matchup renumbered earlier in the same pass.
pub(crate) fn renumber_bracket(
    rounds: &mut [Vec<Matchup>],
    mut next_matchup_id: impl FnMut() -> MatchupId,
    mut next_entry_id: impl FnMut() -> i64,
) -> StoreResult<()> {
    let mut durable_ids: HashMap<MatchupId, MatchupId> = HashMap::new();

    for matchup in rounds.iter_mut().flatten() {
        let durable = next_matchup_id();
        durable_ids.insert(matchup.id, durable);
        matchup.id = durable;
        for entry in &mut matchup.entries {
            entry.id = next_entry_id();
        }
    }

    for entry in rounds.iter_mut().flatten().flat_map(|m| &mut m.entries) {
        if let Some(provisional) = entry.parent_matchup_id {
            let durable = durable_ids
                .get(&provisional)
                .ok_or(StoreError::UnknownId {
                    kind: "matchup",
                    id: provisional,
                })?;
            entry.parent_matchup_id = Some(*durable);
        }
    }

    Ok(())
}
