//! Tournament error types.

use super::models::MatchupId;
use thiserror::Error;

/// Tournament errors
#[derive(Debug, Error)]
pub enum TournamentError {
    /// Fewer than two entrants supplied to the bracket builder
    #[error("A bracket needs at least two teams, got {0}")]
    InvalidEntrantCount(usize),

    /// A two-entry matchup has equal scores; tie games are not supported
    #[error("Tie games are not supported (matchup {matchup_id})")]
    UnsupportedTie { matchup_id: MatchupId },

    /// A score could not be read as a finite number
    #[error("Malformed score: {0:?}")]
    MalformedScore(String),

    /// No matchup with this id exists in the bracket
    #[error("Matchup not found: {0}")]
    MatchupNotFound(MatchupId),

    /// Entry index outside the matchup's entry list
    #[error("Matchup {matchup_id} has no entry at index {index}")]
    EntryOutOfRange { matchup_id: MatchupId, index: usize },

    /// The matchup already has a winner; winners never change
    #[error("Matchup {0} has already been decided")]
    MatchupDecided(MatchupId),

    /// An operation needed a built bracket and none was present
    #[error("Tournament has no bracket")]
    BracketNotBuilt,

    /// Persistence error, surfaced unmodified
    #[error("Store error: {0}")]
    Store(#[from] crate::db::StoreError),

    /// Notification error, surfaced unmodified
    #[error("Notification error: {0}")]
    Notify(#[from] crate::notify::NotifyError),
}

/// Result type for tournament operations
pub type TournamentResult<T> = Result<T, TournamentError>;
