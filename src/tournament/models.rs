//! Entity models for tournaments, teams, matchups, and prizes.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Person ID type
pub type PersonId = i64;
/// Team ID type
pub type TeamId = i64;
/// Prize ID type
pub type PrizeId = i64;
/// Matchup ID type
pub type MatchupId = i64;
/// Matchup entry ID type
pub type MatchupEntryId = i64;
/// Tournament ID type
pub type TournamentId = i64;

/// Id carried by a model that has not been stored yet.
pub const UNSAVED_ID: i64 = 0;

/// One registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Person ID (0 until stored)
    pub id: PersonId,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email address (may be empty; only checked for plausibility at send time)
    pub email: String,
    /// Phone number (may be empty)
    pub phone: String,
}

impl Person {
    /// Create an unstored person.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            id: UNSAVED_ID,
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// Full display name, first name first.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A competing team and its roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Team ID (0 until stored)
    pub id: TeamId,
    /// Team name
    pub name: String,
    /// Roster, in registration order (non-empty)
    pub members: Vec<Person>,
}

impl Team {
    /// Create an unstored team.
    pub fn new(name: impl Into<String>, members: Vec<Person>) -> Self {
        Self {
            id: UNSAVED_ID,
            name: name.into(),
            members,
        }
    }
}

/// A prize awarded for finishing at a given place.
///
/// A well-formed prize carries either a fixed amount or a percentage of the
/// total entry income, not both. Payout calculation prefers the fixed amount
/// when both are nonzero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prize {
    /// Prize ID (0 until stored)
    pub id: PrizeId,
    /// Finishing place this prize rewards (1 = first)
    pub place_number: u32,
    /// Display name for the place ("Champion", "Runner-up", ...)
    pub place_name: String,
    /// Fixed payout amount (zero when the prize is percentage-based)
    pub amount: Decimal,
    /// Percentage of total entry income, 0-100 (zero when fixed-amount)
    pub percentage: Decimal,
}

impl Prize {
    /// Create an unstored fixed-amount prize.
    pub fn fixed(place_number: u32, place_name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: UNSAVED_ID,
            place_number,
            place_name: place_name.into(),
            amount,
            percentage: Decimal::ZERO,
        }
    }

    /// Create an unstored percentage-of-income prize.
    pub fn percentage_of_income(
        place_number: u32,
        place_name: impl Into<String>,
        percentage: Decimal,
    ) -> Self {
        Self {
            id: UNSAVED_ID,
            place_number,
            place_name: place_name.into(),
            amount: Decimal::ZERO,
            percentage,
        }
    }
}

/// One side of a matchup.
///
/// The competing team is unset while the entry waits on the winner of a
/// prior-round matchup. The parent link is unset only for round-1 entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupEntry {
    /// Entry ID (0 until stored)
    pub id: MatchupEntryId,
    /// The team filling this side, once known
    pub team: Option<Team>,
    /// Recorded score; 0 means not yet played
    pub score: f64,
    /// Prior-round matchup whose winner fills this entry
    pub parent_matchup_id: Option<MatchupId>,
}

impl MatchupEntry {
    /// Entry seeded directly with a team (round 1).
    pub fn for_team(team: Team) -> Self {
        Self {
            id: UNSAVED_ID,
            team: Some(team),
            score: 0.0,
            parent_matchup_id: None,
        }
    }

    /// Entry awaiting the winner of `parent` (rounds 2 and up).
    pub fn from_parent(parent: MatchupId) -> Self {
        Self {
            id: UNSAVED_ID,
            team: None,
            score: 0.0,
            parent_matchup_id: Some(parent),
        }
    }
}

/// One contest within a round: two entries, or a single entry for a bye.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    /// Matchup ID (provisional within the bracket until stored)
    pub id: MatchupId,
    /// One entry (bye) or two (contest)
    pub entries: Vec<MatchupEntry>,
    /// Winning team; never cleared once set
    pub winner: Option<Team>,
    /// 1-based round number
    pub round: u32,
}

impl Matchup {
    /// A bye has a single entry whose team advances without playing.
    pub fn is_bye(&self) -> bool {
        self.entries.len() == 1
    }

    /// Whether a winner has been recorded.
    pub fn is_decided(&self) -> bool {
        self.winner.is_some()
    }
}

/// A single-elimination tournament and its full bracket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    /// Tournament ID (0 until stored)
    pub id: TournamentId,
    /// Tournament name
    pub name: String,
    /// Entry fee collected per team
    pub entry_fee: Decimal,
    /// All entered teams
    pub entered_teams: Vec<Team>,
    /// Prizes on offer
    pub prizes: Vec<Prize>,
    /// Rounds in play order; each round is an ordered list of matchups
    pub rounds: Vec<Vec<Matchup>>,
    /// False once the tournament has completed
    pub active: bool,
}

impl Tournament {
    /// Create an unstored tournament with no bracket yet.
    pub fn new(name: impl Into<String>, entry_fee: Decimal) -> Self {
        Self {
            id: UNSAVED_ID,
            name: name.into(),
            entry_fee,
            entered_teams: Vec::new(),
            prizes: Vec::new(),
            rounds: Vec::new(),
            active: true,
        }
    }

    /// The earliest round containing an undecided matchup (1-based).
    ///
    /// Once every matchup has a winner this returns the last round's number
    /// rather than advancing past the end of the bracket.
    pub fn current_round(&self) -> u32 {
        let mut current = 1;
        for round in &self.rounds {
            if round.iter().all(Matchup::is_decided) {
                current += 1;
            } else {
                return current;
            }
        }
        self.rounds.len() as u32
    }

    /// Whether every matchup in every round has a winner.
    pub fn is_complete(&self) -> bool {
        !self.rounds.is_empty()
            && self
                .rounds
                .iter()
                .all(|round| round.iter().all(Matchup::is_decided))
    }

    /// The sole matchup of the last round, if the bracket has been built.
    pub fn final_matchup(&self) -> Option<&Matchup> {
        self.rounds.last().and_then(|round| round.first())
    }

    /// Look up a matchup anywhere in the bracket.
    pub fn matchup(&self, id: MatchupId) -> Option<&Matchup> {
        self.rounds.iter().flatten().find(|m| m.id == id)
    }

    /// Mutable lookup of a matchup anywhere in the bracket.
    pub fn matchup_mut(&mut self, id: MatchupId) -> Option<&mut Matchup> {
        self.rounds.iter_mut().flatten().find(|m| m.id == id)
    }

    /// Total entry income: entrant count times entry fee.
    pub fn total_income(&self) -> Decimal {
        Decimal::from(self.entered_teams.len() as i64) * self.entry_fee
    }

    /// The prize for a given finishing place, if one was offered.
    pub fn prize_for_place(&self, place_number: u32) -> Option<&Prize> {
        self.prizes.iter().find(|p| p.place_number == place_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn team(id: TeamId, name: &str) -> Team {
        Team {
            id,
            name: name.to_string(),
            members: vec![Person::new("Test", name, format!("{name}@example.com"), "")],
        }
    }

    fn decided(id: MatchupId, round: u32, winner: Team) -> Matchup {
        Matchup {
            id,
            entries: vec![MatchupEntry::for_team(winner.clone())],
            winner: Some(winner),
            round,
        }
    }

    fn undecided(id: MatchupId, round: u32) -> Matchup {
        Matchup {
            id,
            entries: vec![
                MatchupEntry::for_team(team(1, "A")),
                MatchupEntry::for_team(team(2, "B")),
            ],
            winner: None,
            round,
        }
    }

    #[test]
    fn test_current_round_starts_at_one() {
        let mut tournament = Tournament::new("Test", dec!(0));
        tournament.rounds = vec![vec![undecided(1, 1)], vec![undecided(2, 2)]];
        assert_eq!(tournament.current_round(), 1);
    }

    #[test]
    fn test_current_round_advances_past_decided_rounds() {
        let mut tournament = Tournament::new("Test", dec!(0));
        tournament.rounds = vec![vec![decided(1, 1, team(1, "A"))], vec![undecided(2, 2)]];
        assert_eq!(tournament.current_round(), 2);
        assert!(!tournament.is_complete());
    }

    #[test]
    fn test_current_round_caps_at_last_round_when_complete() {
        let mut tournament = Tournament::new("Test", dec!(0));
        tournament.rounds = vec![
            vec![decided(1, 1, team(1, "A"))],
            vec![decided(2, 2, team(1, "A"))],
        ];
        assert_eq!(tournament.current_round(), 2);
        assert!(tournament.is_complete());
    }

    #[test]
    fn test_empty_bracket_is_not_complete() {
        let tournament = Tournament::new("Test", dec!(0));
        assert!(!tournament.is_complete());
        assert!(tournament.final_matchup().is_none());
    }

    #[test]
    fn test_total_income() {
        let mut tournament = Tournament::new("Test", dec!(25.50));
        tournament.entered_teams = vec![team(1, "A"), team(2, "B"), team(3, "C")];
        assert_eq!(tournament.total_income(), dec!(76.50));
    }

    #[test]
    fn test_prize_for_place() {
        let mut tournament = Tournament::new("Test", dec!(10));
        tournament.prizes = vec![
            Prize::fixed(1, "Champion", dec!(100)),
            Prize::percentage_of_income(2, "Runner-up", dec!(25)),
        ];
        assert_eq!(tournament.prize_for_place(1).unwrap().amount, dec!(100));
        assert_eq!(tournament.prize_for_place(2).unwrap().percentage, dec!(25));
        assert!(tournament.prize_for_place(3).is_none());
    }

    #[test]
    fn test_matchup_lookup() {
        let mut tournament = Tournament::new("Test", dec!(0));
        tournament.rounds = vec![vec![undecided(7, 1)], vec![undecided(9, 2)]];
        assert_eq!(tournament.matchup(9).unwrap().round, 2);
        assert!(tournament.matchup(42).is_none());

        tournament.matchup_mut(7).unwrap().entries[0].score = 3.0;
        assert_eq!(tournament.matchup(7).unwrap().entries[0].score, 3.0);
    }

    #[test]
    fn test_bye_detection() {
        let bye = Matchup {
            id: 1,
            entries: vec![MatchupEntry::for_team(team(1, "A"))],
            winner: None,
            round: 1,
        };
        assert!(bye.is_bye());
        assert!(!undecided(2, 1).is_bye());
    }
}
