//! Result engine: winner determination, advancement, and completion.
//!
//! The engine owns no state of its own; it operates on a caller-held
//! [`Tournament`], persisting each touched matchup through the injected
//! store and requesting notifications through the injected notifier.
//! Callers serialize all scoring operations against one tournament --
//! there is no internal locking.

use super::bracket;
use super::config::EngineConfig;
use super::errors::{TournamentError, TournamentResult};
use super::models::{Matchup, MatchupId, Team, Tournament};
use super::prizes;
use crate::db::TournamentStore;
use crate::notify::{Notifier, messages};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::sync::Arc;

/// What one results pass changed.
#[derive(Debug, Clone, Default)]
pub struct UpdateSummary {
    /// Set when the pass moved play into a later round
    pub advanced_to_round: Option<u32>,
    /// Set when the pass decided the last matchup of the bracket
    pub completion: Option<CompletionReport>,
}

/// Outcome of a completed tournament.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    /// Winner of the final matchup
    pub champion: Team,
    /// The other finalist
    pub runner_up: Team,
    /// Payout owed to the champion (zero when no place-1 prize exists)
    pub champion_payout: Decimal,
    /// Payout owed to the runner-up (zero when no place-2 prize exists)
    pub runner_up_payout: Decimal,
}

/// Bracket scheduling engine.
#[derive(Clone)]
pub struct TournamentEngine {
    store: Arc<dyn TournamentStore>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl TournamentEngine {
    /// Create an engine over the given persistence and notification backends.
    pub fn new(
        store: Arc<dyn TournamentStore>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    /// Build and persist the bracket for a new tournament.
    ///
    /// The tournament's entered teams are shuffled and paired into rounds,
    /// the store assigns durable ids, and one results pass runs immediately
    /// so round-1 byes resolve without waiting for a score.
    ///
    /// # Errors
    ///
    /// * `TournamentError::InvalidEntrantCount` - fewer than two teams;
    ///   nothing is persisted
    pub async fn create_bracket(
        &self,
        mut tournament: Tournament,
    ) -> TournamentResult<(Tournament, UpdateSummary)> {
        tournament.rounds = bracket::build_rounds(&tournament.entered_teams)?;

        let mut tournament = self.store.create_tournament(tournament).await?;
        log::info!(
            "created tournament {} '{}' with {} rounds for {} teams",
            tournament.id,
            tournament.name,
            tournament.rounds.len(),
            tournament.entered_teams.len()
        );

        let summary = self.update_results(&mut tournament).await?;
        Ok((tournament, summary))
    }

    /// Record a score against one side of a matchup, in memory only.
    ///
    /// Call [`update_results`](Self::update_results) afterwards to determine
    /// winners and persist.
    pub fn record_score(
        &self,
        tournament: &mut Tournament,
        matchup_id: MatchupId,
        entry_index: usize,
        score: f64,
    ) -> TournamentResult<()> {
        if !score.is_finite() {
            return Err(TournamentError::MalformedScore(score.to_string()));
        }

        let matchup = tournament
            .matchup_mut(matchup_id)
            .ok_or(TournamentError::MatchupNotFound(matchup_id))?;
        if matchup.is_decided() {
            return Err(TournamentError::MatchupDecided(matchup_id));
        }

        let entry = matchup
            .entries
            .get_mut(entry_index)
            .ok_or(TournamentError::EntryOutOfRange {
                matchup_id,
                index: entry_index,
            })?;
        entry.score = score;
        Ok(())
    }

    /// Determine winners for every newly decidable matchup and advance them.
    ///
    /// Scans all rounds for undecided matchups that are byes or carry a
    /// nonzero score, marks their winners under the configured win rule,
    /// copies each winner into the downstream entries that wait on it, and
    /// persists everything touched. Repeated calls without new scores change
    /// nothing.
    ///
    /// A tie leaves its matchup unresolved but does not stop the pass; the
    /// remaining candidates are still processed and persisted, and the first
    /// `UnsupportedTie` is returned once the pass has finished.
    pub async fn update_results(
        &self,
        tournament: &mut Tournament,
    ) -> TournamentResult<UpdateSummary> {
        let starting_round = tournament.current_round();

        let candidates: Vec<MatchupId> = tournament
            .rounds
            .iter()
            .flatten()
            .filter(|m| {
                !m.is_decided() && (m.is_bye() || m.entries.iter().any(|e| e.score != 0.0))
            })
            .map(|m| m.id)
            .collect();

        let mut first_tie = None;
        let mut resolved: Vec<(MatchupId, Team)> = Vec::new();

        for id in candidates {
            let matchup = tournament
                .matchup_mut(id)
                .ok_or(TournamentError::MatchupNotFound(id))?;
            match mark_winner(matchup, self.config.higher_score_wins) {
                Ok(Some(winner)) => resolved.push((id, winner)),
                Ok(None) => {}
                Err(err @ TournamentError::UnsupportedTie { .. }) => {
                    log::warn!("matchup {id} is tied; leaving it unresolved");
                    first_tie.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        // Carry each winner into the entries waiting on its matchup.
        let mut advanced: Vec<MatchupId> = Vec::new();
        for (source_id, winner) in &resolved {
            for matchup in tournament.rounds.iter_mut().flatten() {
                let mut filled = false;
                for entry in &mut matchup.entries {
                    if entry.parent_matchup_id == Some(*source_id) {
                        entry.team = Some(winner.clone());
                        filled = true;
                    }
                }
                if filled && !advanced.contains(&matchup.id) {
                    advanced.push(matchup.id);
                }
            }
        }

        for id in advanced.iter().chain(resolved.iter().map(|(id, _)| id)) {
            let matchup = tournament
                .matchup(*id)
                .ok_or(TournamentError::MatchupNotFound(*id))?;
            self.store.update_matchup(matchup).await?;
        }

        let ending_round = tournament.current_round();
        let mut summary = UpdateSummary::default();

        if tournament.active && tournament.is_complete() {
            summary.completion = Some(self.complete_tournament(tournament).await?);
        } else if ending_round > starting_round {
            log::info!(
                "tournament {} advanced to round {ending_round}",
                tournament.id
            );
            summary.advanced_to_round = Some(ending_round);
            self.alert_current_round(tournament).await?;
        }

        match first_tie {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    }

    /// Email every member of every team playing in the current round.
    ///
    /// Each member whose address looks plausible gets a personal message
    /// naming the opposing team, or noting a bye when the matchup has no
    /// opponent. Implausible addresses are skipped silently.
    pub async fn alert_current_round(&self, tournament: &Tournament) -> TournamentResult<()> {
        let round_number = tournament.current_round();
        let Some(round) = tournament.rounds.get(round_number.saturating_sub(1) as usize) else {
            return Ok(());
        };

        for matchup in round {
            for entry in &matchup.entries {
                let Some(team) = &entry.team else { continue };
                let opponent = matchup
                    .entries
                    .iter()
                    .filter_map(|e| e.team.as_ref())
                    .find(|other| other.id != team.id);

                for person in &team.members {
                    if !messages::is_plausible_email(&person.email) {
                        log::debug!(
                            "skipping round alert for {}: implausible address",
                            person.full_name()
                        );
                        continue;
                    }

                    let (subject, body) = messages::round_message(&tournament.name, opponent);
                    self.notifier
                        .notify(&[person.email.clone()], &[], &subject, &body)
                        .await?;
                }
            }
        }

        Ok(())
    }

    /// Close out a finished tournament: persist the inactive flag, work out
    /// champion and runner-up payouts, and send the completion notice once
    /// to every entrant with a non-empty address.
    async fn complete_tournament(
        &self,
        tournament: &mut Tournament,
    ) -> TournamentResult<CompletionReport> {
        tournament.active = false;
        self.store.complete_tournament(tournament).await?;

        let final_matchup = tournament
            .final_matchup()
            .ok_or(TournamentError::BracketNotBuilt)?;
        let champion = final_matchup
            .winner
            .clone()
            .ok_or(TournamentError::BracketNotBuilt)?;
        let runner_up = final_matchup
            .entries
            .iter()
            .filter_map(|e| e.team.as_ref())
            .find(|team| team.id != champion.id)
            .cloned()
            .ok_or(TournamentError::BracketNotBuilt)?;

        // Only the first two places pay out; deeper placings would need
        // score comparisons across eliminated teams.
        let mut champion_payout = Decimal::ZERO;
        let mut runner_up_payout = Decimal::ZERO;
        if !tournament.prizes.is_empty() {
            let total_income = tournament.total_income();
            if let Some(prize) = tournament.prize_for_place(1) {
                champion_payout = prizes::payout(prize, total_income);
            }
            if let Some(prize) = tournament.prize_for_place(2) {
                runner_up_payout = prizes::payout(prize, total_income);
            }
        }

        let recipients: Vec<String> = tournament
            .entered_teams
            .iter()
            .flat_map(|team| &team.members)
            .map(|person| person.email.clone())
            .filter(|address| !address.is_empty())
            .collect();

        let (subject, body) = messages::completion_message(
            &tournament.name,
            &champion,
            champion_payout,
            &runner_up,
            runner_up_payout,
        );
        self.notifier.notify(&[], &recipients, &subject, &body).await?;

        log::info!(
            "tournament {} '{}' complete; champion: {}",
            tournament.id,
            tournament.name,
            champion.name
        );

        Ok(CompletionReport {
            champion,
            runner_up,
            champion_payout,
            runner_up_payout,
        })
    }
}

/// Parse operator-entered score text into a finite number.
///
/// Score validation belongs to the calling layer, but the engine never
/// stores a non-numeric score either way.
pub fn parse_score(input: &str) -> TournamentResult<f64> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|score| score.is_finite())
        .ok_or_else(|| TournamentError::MalformedScore(input.to_string()))
}

/// Set the matchup's winner under the given win rule.
///
/// A bye's sole entry wins unconditionally. Returns the winning team, or
/// `None` when the winning side has no team yet.
fn mark_winner(matchup: &mut Matchup, higher_score_wins: bool) -> TournamentResult<Option<Team>> {
    if matchup.is_bye() {
        matchup.winner = matchup.entries[0].team.clone();
        return Ok(matchup.winner.clone());
    }

    let winning_index = match matchup.entries[0].score.partial_cmp(&matchup.entries[1].score) {
        Some(Ordering::Greater) => usize::from(!higher_score_wins),
        Some(Ordering::Less) => usize::from(higher_score_wins),
        _ => {
            return Err(TournamentError::UnsupportedTie {
                matchup_id: matchup.id,
            });
        }
    };

    matchup.winner = matchup.entries[winning_index].team.clone();
    Ok(matchup.winner.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::MemoryStore;
    use crate::notify::mock::RecordingNotifier;
    use crate::tournament::models::{Person, Prize, Team};
    use rust_decimal_macros::dec;

    fn test_team(id: i64, members_per_team: usize) -> Team {
        let members = (0..members_per_team)
            .map(|m| {
                Person::new(
                    "Test",
                    format!("Person{id}_{m}"),
                    format!("test@person{id}x{m}.com"),
                    "",
                )
            })
            .collect();
        Team {
            id,
            name: format!("Team {id}"),
            members,
        }
    }

    fn test_tournament(team_count: usize, members_per_team: usize) -> Tournament {
        let mut tournament = Tournament::new("Test Open", dec!(100));
        tournament.entered_teams = (1..=team_count as i64)
            .map(|id| test_team(id, members_per_team))
            .collect();
        tournament
    }

    fn engine_with(higher_score_wins: bool) -> (TournamentEngine, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let engine = TournamentEngine::new(
            store.clone(),
            notifier.clone(),
            EngineConfig { higher_score_wins },
        );
        (engine, store, notifier)
    }

    /// Score every undecided two-entry matchup of the current round so that
    /// the lower team id wins under higher-score-wins.
    fn score_current_round(engine: &TournamentEngine, tournament: &mut Tournament) {
        let round = tournament.current_round() as usize - 1;
        let pending: Vec<i64> = tournament.rounds[round]
            .iter()
            .filter(|m| !m.is_decided() && m.entries.len() == 2)
            .map(|m| m.id)
            .collect();
        for id in pending {
            engine.record_score(tournament, id, 0, 2.0).unwrap();
            engine.record_score(tournament, id, 1, 1.0).unwrap();
        }
    }

    #[tokio::test]
    async fn test_create_bracket_round_counts() {
        let (engine, _, _) = engine_with(true);
        for (team_count, expected) in [(2, 1), (3, 2), (4, 2), (5, 3), (8, 3), (9, 4)] {
            let (tournament, _) = engine
                .create_bracket(test_tournament(team_count, 1))
                .await
                .unwrap();
            assert_eq!(tournament.rounds.len(), expected, "{team_count} teams");
            assert_eq!(tournament.rounds.last().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_create_bracket_rejects_single_entrant() {
        let (engine, store, _) = engine_with(true);
        let err = engine
            .create_bracket(test_tournament(1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, TournamentError::InvalidEntrantCount(1)));
        assert_eq!(store.tournaments().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_create_bracket_resolves_byes_immediately() {
        let (engine, _, _) = engine_with(true);
        let (tournament, _) = engine.create_bracket(test_tournament(3, 1)).await.unwrap();

        let byes: Vec<&Matchup> = tournament.rounds[0].iter().filter(|m| m.is_bye()).collect();
        assert_eq!(byes.len(), 1);
        let bye = byes[0];
        assert_eq!(bye.winner, bye.entries[0].team);

        // The bye's winner is already waiting in the final.
        let downstream = tournament.rounds[1][0]
            .entries
            .iter()
            .find(|e| e.parent_matchup_id == Some(bye.id))
            .unwrap();
        assert_eq!(downstream.team, bye.winner);
    }

    #[tokio::test]
    async fn test_update_results_marks_and_advances_winners() {
        let (engine, _, _) = engine_with(true);
        let (mut tournament, _) = engine.create_bracket(test_tournament(4, 1)).await.unwrap();

        let ids: Vec<i64> = tournament.rounds[0].iter().map(|m| m.id).collect();
        for id in &ids {
            engine.record_score(&mut tournament, *id, 0, 1.0).unwrap();
        }
        let summary = engine.update_results(&mut tournament).await.unwrap();

        assert!(tournament.rounds[0].iter().all(Matchup::is_decided));
        assert!(
            tournament.rounds[1][0]
                .entries
                .iter()
                .all(|e| e.team.is_some())
        );
        assert_eq!(summary.advanced_to_round, Some(2));
        assert!(summary.completion.is_none());
    }

    #[tokio::test]
    async fn test_round_advance_alerts_all_members_once() {
        let (engine, _, notifier) = engine_with(true);
        let (mut tournament, _) = engine.create_bracket(test_tournament(4, 2)).await.unwrap();

        score_current_round(&engine, &mut tournament);
        engine.update_results(&mut tournament).await.unwrap();

        // Two winning teams of two members each enter round 2.
        let sent = notifier.sent();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|message| message.to.len() == 1));
        assert!(
            sent.iter()
                .all(|message| message.subject.contains("new matchup"))
        );
    }

    #[tokio::test]
    async fn test_alert_current_round_initial_announcement() {
        let (engine, _, notifier) = engine_with(true);
        let (tournament, _) = engine.create_bracket(test_tournament(3, 1)).await.unwrap();

        engine.alert_current_round(&tournament).await.unwrap();

        // One message per member: two in the played matchup, one bye.
        let sent = notifier.sent();
        assert_eq!(sent.len(), 3);
        let bye_notices: Vec<_> = sent
            .iter()
            .filter(|message| message.subject.contains("bye week"))
            .collect();
        assert_eq!(bye_notices.len(), 1);
        assert!(bye_notices[0].body.contains("round off"));
        assert!(
            sent.iter()
                .filter(|message| message.subject.contains("new matchup"))
                .all(|message| message.body.contains("Competitor:"))
        );
    }

    #[tokio::test]
    async fn test_alert_skips_implausible_addresses() {
        let (engine, _, notifier) = engine_with(true);
        let mut tournament = test_tournament(3, 1);
        tournament.entered_teams[0].members[0].email = String::new();
        tournament.entered_teams[1].members[0].email = "test@person".to_string();
        tournament.entered_teams[2].members[0].email = "testperson.com".to_string();

        let (tournament, _) = engine.create_bracket(tournament).await.unwrap();
        engine.alert_current_round(&tournament).await.unwrap();

        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_update_results_is_idempotent() {
        let (engine, store, notifier) = engine_with(true);
        let (mut tournament, _) = engine.create_bracket(test_tournament(4, 1)).await.unwrap();

        score_current_round(&engine, &mut tournament);
        engine.update_results(&mut tournament).await.unwrap();

        let before = tournament.clone();
        let persisted = store.matchup_update_count().await;
        let notified = notifier.sent().len();

        let summary = engine.update_results(&mut tournament).await.unwrap();
        assert_eq!(tournament, before);
        assert_eq!(store.matchup_update_count().await, persisted);
        assert_eq!(notifier.sent().len(), notified);
        assert!(summary.advanced_to_round.is_none());
        assert!(summary.completion.is_none());
    }

    #[tokio::test]
    async fn test_higher_score_wins_rule() {
        let (engine, _, _) = engine_with(true);
        let (mut tournament, _) = engine.create_bracket(test_tournament(2, 1)).await.unwrap();

        let id = tournament.rounds[0][0].id;
        engine.record_score(&mut tournament, id, 0, 1.0).unwrap();
        engine.record_score(&mut tournament, id, 1, 0.0).unwrap();
        engine.update_results(&mut tournament).await.unwrap();

        let matchup = &tournament.rounds[0][0];
        assert_eq!(matchup.winner, matchup.entries[0].team);
    }

    #[tokio::test]
    async fn test_lower_score_wins_rule() {
        let (engine, _, _) = engine_with(false);
        let (mut tournament, _) = engine.create_bracket(test_tournament(2, 1)).await.unwrap();

        let id = tournament.rounds[0][0].id;
        engine.record_score(&mut tournament, id, 0, 3.0).unwrap();
        engine.record_score(&mut tournament, id, 1, 1.0).unwrap();
        engine.update_results(&mut tournament).await.unwrap();

        let matchup = &tournament.rounds[0][0];
        assert_eq!(matchup.winner, matchup.entries[1].team);
    }

    #[tokio::test]
    async fn test_tie_is_unsupported_and_leaves_matchup_unresolved() {
        let (engine, _, _) = engine_with(true);
        let (mut tournament, _) = engine.create_bracket(test_tournament(4, 1)).await.unwrap();

        let ids: Vec<i64> = tournament.rounds[0].iter().map(|m| m.id).collect();
        // First matchup ties; second has a clear winner.
        engine.record_score(&mut tournament, ids[0], 0, 2.0).unwrap();
        engine.record_score(&mut tournament, ids[0], 1, 2.0).unwrap();
        engine.record_score(&mut tournament, ids[1], 0, 1.0).unwrap();

        let err = engine.update_results(&mut tournament).await.unwrap_err();
        assert!(matches!(
            err,
            TournamentError::UnsupportedTie { matchup_id } if matchup_id == ids[0]
        ));

        // The tied matchup stays open; the clear one was still processed.
        assert!(!tournament.matchup(ids[0]).unwrap().is_decided());
        assert!(tournament.matchup(ids[1]).unwrap().is_decided());
    }

    #[tokio::test]
    async fn test_completion_two_team_tournament() {
        let (engine, store, notifier) = engine_with(true);
        let mut tournament = test_tournament(2, 1);
        tournament.prizes = vec![
            Prize::fixed(1, "Champion", dec!(120)),
            Prize::percentage_of_income(2, "Runner-up", dec!(50)),
        ];

        let (mut tournament, _) = engine.create_bracket(tournament).await.unwrap();
        let id = tournament.rounds[0][0].id;
        engine.record_score(&mut tournament, id, 0, 5.0).unwrap();
        engine.record_score(&mut tournament, id, 1, 3.0).unwrap();

        let summary = engine.update_results(&mut tournament).await.unwrap();
        let report = summary.completion.unwrap();

        let matchup = &tournament.rounds[0][0];
        assert_eq!(Some(&report.champion), matchup.entries[0].team.as_ref());
        assert_eq!(Some(&report.runner_up), matchup.entries[1].team.as_ref());
        assert_eq!(report.champion_payout, dec!(120));
        // 50% of 2 teams x 100 entry fee.
        assert_eq!(report.runner_up_payout, dec!(100));

        assert!(!tournament.active);
        assert_eq!(store.completed().await, vec![tournament.id]);

        // One bulk notice, both members blind-copied.
        let completion_notices: Vec<_> = notifier
            .sent()
            .into_iter()
            .filter(|message| message.subject.contains("has won"))
            .collect();
        assert_eq!(completion_notices.len(), 1);
        assert!(completion_notices[0].to.is_empty());
        assert_eq!(completion_notices[0].bcc.len(), 2);
    }

    #[tokio::test]
    async fn test_completion_skips_empty_addresses() {
        let (engine, _, notifier) = engine_with(true);
        let mut tournament = test_tournament(2, 1);
        tournament.entered_teams[0].members[0].email = String::new();

        let (mut tournament, _) = engine.create_bracket(tournament).await.unwrap();
        let id = tournament.rounds[0][0].id;
        engine.record_score(&mut tournament, id, 0, 1.0).unwrap();
        engine.update_results(&mut tournament).await.unwrap();

        let notices = notifier.sent();
        assert_eq!(notices.last().unwrap().bcc.len(), 1);
    }

    #[tokio::test]
    async fn test_bye_tournament_runs_to_completion() {
        let (engine, _, _) = engine_with(true);
        let (mut tournament, _) = engine.create_bracket(test_tournament(5, 1)).await.unwrap();

        let mut report = None;
        for _ in 0..tournament.rounds.len() {
            score_current_round(&engine, &mut tournament);
            let summary = engine.update_results(&mut tournament).await.unwrap();
            if let Some(completion) = summary.completion {
                report = Some(completion);
                break;
            }
        }

        let report = report.expect("tournament should complete");
        assert!(tournament.is_complete());
        assert_eq!(
            tournament.final_matchup().unwrap().winner.as_ref(),
            Some(&report.champion)
        );
    }

    #[tokio::test]
    async fn test_record_score_validation() {
        let (engine, _, _) = engine_with(true);
        let (mut tournament, _) = engine.create_bracket(test_tournament(2, 1)).await.unwrap();
        let id = tournament.rounds[0][0].id;

        assert!(matches!(
            engine.record_score(&mut tournament, id, 0, f64::NAN),
            Err(TournamentError::MalformedScore(_))
        ));
        assert!(matches!(
            engine.record_score(&mut tournament, 9999, 0, 1.0),
            Err(TournamentError::MatchupNotFound(9999))
        ));
        assert!(matches!(
            engine.record_score(&mut tournament, id, 2, 1.0),
            Err(TournamentError::EntryOutOfRange { index: 2, .. })
        ));

        engine.record_score(&mut tournament, id, 0, 1.0).unwrap();
        engine.update_results(&mut tournament).await.unwrap();
        assert!(matches!(
            engine.record_score(&mut tournament, id, 0, 2.0),
            Err(TournamentError::MatchupDecided(_))
        ));
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("3").unwrap(), 3.0);
        assert_eq!(parse_score(" 2.5 ").unwrap(), 2.5);
        assert!(matches!(
            parse_score("three"),
            Err(TournamentError::MalformedScore(_))
        ));
        assert!(matches!(
            parse_score("NaN"),
            Err(TournamentError::MalformedScore(_))
        ));
        assert!(matches!(
            parse_score(""),
            Err(TournamentError::MalformedScore(_))
        ));
    }
}
