//! Single-elimination bracket construction.
//!
//! Entrants are shuffled into a uniformly random order, padded with byes up
//! to the next power of two, and paired off round by round until a single
//! final matchup remains. Later-round matchups hold unresolved entries whose
//! parent links name the prior-round matchup feeding them.

use super::errors::{TournamentError, TournamentResult};
use super::models::{Matchup, MatchupEntry, Team};
use rand::seq::SliceRandom;

/// Build the full round structure for the given entrants.
///
/// Matchup ids assigned here are provisional (1-based within the bracket);
/// the store replaces them with durable ids when the tournament is created
/// and rewrites parent references to match.
///
/// # Errors
///
/// * `TournamentError::InvalidEntrantCount` - fewer than two teams
pub fn build_rounds(teams: &[Team]) -> TournamentResult<Vec<Vec<Matchup>>> {
    if teams.len() < 2 {
        return Err(TournamentError::InvalidEntrantCount(teams.len()));
    }

    let mut shuffled: Vec<Team> = teams.to_vec();
    shuffled.shuffle(&mut rand::rng());

    let rounds = round_count(shuffled.len());
    let byes = (1usize << rounds) - shuffled.len();
    log::debug!(
        "building bracket: {} teams, {} rounds, {} byes",
        shuffled.len(),
        rounds,
        byes
    );

    let mut next_id = 1;
    let mut all_rounds = vec![first_round(byes, shuffled, &mut next_id)];
    later_rounds(&mut all_rounds, rounds, &mut next_id);

    Ok(all_rounds)
}

/// Rounds needed for a field of this size: one per halving of the
/// next power of two at or above the team count.
fn round_count(team_count: usize) -> u32 {
    team_count.next_power_of_two().trailing_zeros().max(1)
}

fn first_round(mut byes: usize, teams: Vec<Team>, next_id: &mut i64) -> Vec<Matchup> {
    let mut round = Vec::new();
    let mut current = Matchup::default();

    for team in teams {
        current.entries.push(MatchupEntry::for_team(team));

        // A remaining bye closes the matchup at one entry; otherwise it
        // closes at two.
        if byes > 0 || current.entries.len() > 1 {
            current.round = 1;
            current.id = *next_id;
            *next_id += 1;
            round.push(std::mem::take(&mut current));

            if byes > 0 {
                byes -= 1;
            }
        }
    }

    round
}

/// Rounds after the first pair off the previous round's matchups; no byes
/// exist past round 1.
fn later_rounds(all_rounds: &mut Vec<Vec<Matchup>>, rounds: u32, next_id: &mut i64) {
    for round_number in 2..=rounds {
        let previous = all_rounds
            .last()
            .expect("round 1 is built before any later round");

        let round = previous
            .chunks(2)
            .map(|pair| {
                let matchup = Matchup {
                    id: *next_id,
                    entries: pair
                        .iter()
                        .map(|parent| MatchupEntry::from_parent(parent.id))
                        .collect(),
                    winner: None,
                    round: round_number,
                };
                *next_id += 1;
                matchup
            })
            .collect();

        all_rounds.push(round);
    }
}
