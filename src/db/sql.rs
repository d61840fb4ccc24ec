//! PostgreSQL store built on sqlx.
//!
//! Ids come from `BIGSERIAL` columns via `INSERT .. RETURNING`, so
//! allocation is atomic at the storage layer even with several processes
//! pointed at one database.

use super::{StoreError, StoreResult, TournamentStore};
use crate::tournament::models::{
    Matchup, MatchupEntry, Person, Prize, Team, Tournament,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::collections::{BTreeMap, HashMap};

/// Idempotent schema, applied by [`PgTournamentStore::migrate`].
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS people (
        id BIGSERIAL PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS teams (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS team_members (
        team_id BIGINT NOT NULL REFERENCES teams(id),
        person_id BIGINT NOT NULL REFERENCES people(id),
        position INT NOT NULL,
        PRIMARY KEY (team_id, person_id)
    )",
    "CREATE TABLE IF NOT EXISTS prizes (
        id BIGSERIAL PRIMARY KEY,
        place_number INT NOT NULL,
        place_name TEXT NOT NULL,
        amount NUMERIC(12, 2) NOT NULL,
        percentage NUMERIC(5, 2) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tournaments (
        id BIGSERIAL PRIMARY KEY,
        name TEXT NOT NULL,
        entry_fee NUMERIC(12, 2) NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE TABLE IF NOT EXISTS tournament_entries (
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id),
        team_id BIGINT NOT NULL REFERENCES teams(id),
        position INT NOT NULL,
        PRIMARY KEY (tournament_id, team_id)
    )",
    "CREATE TABLE IF NOT EXISTS tournament_prizes (
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id),
        prize_id BIGINT NOT NULL REFERENCES prizes(id),
        PRIMARY KEY (tournament_id, prize_id)
    )",
    "CREATE TABLE IF NOT EXISTS matchups (
        id BIGSERIAL PRIMARY KEY,
        tournament_id BIGINT NOT NULL REFERENCES tournaments(id),
        round INT NOT NULL,
        winner_id BIGINT REFERENCES teams(id)
    )",
    "CREATE TABLE IF NOT EXISTS matchup_entries (
        id BIGSERIAL PRIMARY KEY,
        matchup_id BIGINT NOT NULL REFERENCES matchups(id),
        position INT NOT NULL,
        team_id BIGINT REFERENCES teams(id),
        score DOUBLE PRECISION NOT NULL DEFAULT 0,
        parent_matchup_id BIGINT REFERENCES matchups(id)
    )",
];

/// PostgreSQL implementation of [`TournamentStore`].
#[derive(Clone)]
pub struct PgTournamentStore {
    pool: PgPool,
}

impl PgTournamentStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create any missing tables.
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        log::info!("database schema is up to date");
        Ok(())
    }

    async fn load_teams(&self) -> StoreResult<Vec<Team>> {
        let people = load_people(&self.pool).await?;
        let people_by_id: HashMap<i64, &Person> =
            people.iter().map(|person| (person.id, person)).collect();

        let team_rows = sqlx::query("SELECT id, name FROM teams ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let member_rows = sqlx::query(
            "SELECT team_id, person_id FROM team_members ORDER BY team_id, position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut members_by_team: HashMap<i64, Vec<Person>> = HashMap::new();
        for row in member_rows {
            let team_id: i64 = row.get("team_id");
            let person_id: i64 = row.get("person_id");
            let person = people_by_id
                .get(&person_id)
                .ok_or(StoreError::UnknownId {
                    kind: "person",
                    id: person_id,
                })?;
            members_by_team
                .entry(team_id)
                .or_default()
                .push((*person).clone());
        }

        Ok(team_rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                Team {
                    id,
                    name: row.get("name"),
                    members: members_by_team.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Bracket for one tournament, as rounds of hydrated matchups.
    async fn load_rounds(
        &self,
        tournament_id: i64,
        teams: &[Team],
    ) -> StoreResult<Vec<Vec<Matchup>>> {
        let matchup_rows = sqlx::query(
            "SELECT id, round, winner_id FROM matchups
             WHERE tournament_id = $1 ORDER BY round, id",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        let entry_rows = sqlx::query(
            "SELECT e.id, e.matchup_id, e.team_id, e.score, e.parent_matchup_id
             FROM matchup_entries e
             JOIN matchups m ON m.id = e.matchup_id
             WHERE m.tournament_id = $1
             ORDER BY e.matchup_id, e.position",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await?;

        let mut entries_by_matchup: HashMap<i64, Vec<MatchupEntry>> = HashMap::new();
        for row in entry_rows {
            let matchup_id: i64 = row.get("matchup_id");
            let team = match row.get::<Option<i64>, _>("team_id") {
                Some(team_id) => Some(find_team(teams, team_id)?.clone()),
                None => None,
            };
            entries_by_matchup.entry(matchup_id).or_default().push(MatchupEntry {
                id: row.get("id"),
                team,
                score: row.get("score"),
                parent_matchup_id: row.get("parent_matchup_id"),
            });
        }

        let mut rounds: BTreeMap<u32, Vec<Matchup>> = BTreeMap::new();
        for row in matchup_rows {
            let id: i64 = row.get("id");
            let round = row.get::<i32, _>("round") as u32;
            let winner = match row.get::<Option<i64>, _>("winner_id") {
                Some(team_id) => Some(find_team(teams, team_id)?.clone()),
                None => None,
            };
            rounds.entry(round).or_default().push(Matchup {
                id,
                entries: entries_by_matchup.remove(&id).unwrap_or_default(),
                winner,
                round,
            });
        }

        Ok(rounds.into_values().collect())
    }
}

#[async_trait]
impl TournamentStore for PgTournamentStore {
    async fn create_person(&self, mut person: Person) -> StoreResult<Person> {
        let row = sqlx::query(
            "INSERT INTO people (first_name, last_name, email, phone)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(&person.first_name)
        .bind(&person.last_name)
        .bind(&person.email)
        .bind(&person.phone)
        .fetch_one(&self.pool)
        .await?;

        person.id = row.get("id");
        Ok(person)
    }

    async fn create_team(&self, mut team: Team) -> StoreResult<Team> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("INSERT INTO teams (name) VALUES ($1) RETURNING id")
            .bind(&team.name)
            .fetch_one(&mut *tx)
            .await?;
        team.id = row.get("id");

        for (position, member) in team.members.iter().enumerate() {
            sqlx::query(
                "INSERT INTO team_members (team_id, person_id, position) VALUES ($1, $2, $3)",
            )
            .bind(team.id)
            .bind(member.id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(team)
    }

    async fn create_prize(&self, mut prize: Prize) -> StoreResult<Prize> {
        let row = sqlx::query(
            "INSERT INTO prizes (place_number, place_name, amount, percentage)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(prize.place_number as i32)
        .bind(&prize.place_name)
        .bind(prize.amount)
        .bind(prize.percentage)
        .fetch_one(&self.pool)
        .await?;

        prize.id = row.get("id");
        Ok(prize)
    }

    async fn create_tournament(&self, mut tournament: Tournament) -> StoreResult<Tournament> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "INSERT INTO tournaments (name, entry_fee, active)
             VALUES ($1, $2, TRUE) RETURNING id",
        )
        .bind(&tournament.name)
        .bind(tournament.entry_fee)
        .fetch_one(&mut *tx)
        .await?;
        tournament.id = row.get("id");

        for (position, team) in tournament.entered_teams.iter().enumerate() {
            sqlx::query(
                "INSERT INTO tournament_entries (tournament_id, team_id, position)
                 VALUES ($1, $2, $3)",
            )
            .bind(tournament.id)
            .bind(team.id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        for prize in &tournament.prizes {
            sqlx::query(
                "INSERT INTO tournament_prizes (tournament_id, prize_id) VALUES ($1, $2)",
            )
            .bind(tournament.id)
            .bind(prize.id)
            .execute(&mut *tx)
            .await?;
        }

        // First pass stores the matchups and maps the builder's provisional
        // ids to database ids; the second stores entries with parent
        // references rewritten through that map.
        let tournament_id = tournament.id;
        let mut durable_ids: HashMap<i64, i64> = HashMap::new();
        for matchup in tournament.rounds.iter_mut().flatten() {
            let row = sqlx::query(
                "INSERT INTO matchups (tournament_id, round, winner_id)
                 VALUES ($1, $2, $3) RETURNING id",
            )
            .bind(tournament_id)
            .bind(matchup.round as i32)
            .bind(matchup.winner.as_ref().map(|team| team.id))
            .fetch_one(&mut *tx)
            .await?;
            let durable: i64 = row.get("id");
            durable_ids.insert(matchup.id, durable);
            matchup.id = durable;
        }

        for matchup in tournament.rounds.iter_mut().flatten() {
            let matchup_id = matchup.id;
            for (position, entry) in matchup.entries.iter_mut().enumerate() {
                if let Some(provisional) = entry.parent_matchup_id {
                    let durable =
                        durable_ids
                            .get(&provisional)
                            .copied()
                            .ok_or(StoreError::UnknownId {
                                kind: "matchup",
                                id: provisional,
                            })?;
                    entry.parent_matchup_id = Some(durable);
                }

                let row = sqlx::query(
                    "INSERT INTO matchup_entries
                         (matchup_id, position, team_id, score, parent_matchup_id)
                     VALUES ($1, $2, $3, $4, $5) RETURNING id",
                )
                .bind(matchup_id)
                .bind(position as i32)
                .bind(entry.team.as_ref().map(|team| team.id))
                .bind(entry.score)
                .bind(entry.parent_matchup_id)
                .fetch_one(&mut *tx)
                .await?;
                entry.id = row.get("id");
            }
        }

        tx.commit().await?;
        Ok(tournament)
    }

    async fn people(&self) -> StoreResult<Vec<Person>> {
        load_people(&self.pool).await
    }

    async fn teams(&self) -> StoreResult<Vec<Team>> {
        self.load_teams().await
    }

    async fn prizes(&self) -> StoreResult<Vec<Prize>> {
        let rows = sqlx::query(
            "SELECT id, place_number, place_name, amount, percentage FROM prizes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Prize {
                id: row.get("id"),
                place_number: row.get::<i32, _>("place_number") as u32,
                place_name: row.get("place_name"),
                amount: row.get::<Decimal, _>("amount"),
                percentage: row.get::<Decimal, _>("percentage"),
            })
            .collect())
    }

    async fn tournaments(&self) -> StoreResult<Vec<Tournament>> {
        let teams = self.load_teams().await?;
        let prizes = self.prizes().await?;

        let rows = sqlx::query(
            "SELECT id, name, entry_fee FROM tournaments WHERE active ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut tournaments = Vec::new();
        for row in rows {
            let id: i64 = row.get("id");

            let team_rows = sqlx::query(
                "SELECT team_id FROM tournament_entries
                 WHERE tournament_id = $1 ORDER BY position",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
            let entered_teams = team_rows
                .into_iter()
                .map(|row| find_team(&teams, row.get("team_id")).map(Team::clone))
                .collect::<StoreResult<Vec<_>>>()?;

            let prize_rows = sqlx::query(
                "SELECT prize_id FROM tournament_prizes WHERE tournament_id = $1",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
            let tournament_prizes = prize_rows
                .into_iter()
                .map(|row| {
                    let prize_id: i64 = row.get("prize_id");
                    prizes
                        .iter()
                        .find(|prize| prize.id == prize_id)
                        .cloned()
                        .ok_or(StoreError::UnknownId {
                            kind: "prize",
                            id: prize_id,
                        })
                })
                .collect::<StoreResult<Vec<_>>>()?;

            tournaments.push(Tournament {
                id,
                name: row.get("name"),
                entry_fee: row.get::<Decimal, _>("entry_fee"),
                entered_teams,
                prizes: tournament_prizes,
                rounds: self.load_rounds(id, &teams).await?,
                active: true,
            });
        }

        Ok(tournaments)
    }

    async fn update_matchup(&self, matchup: &Matchup) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE matchups SET winner_id = $1 WHERE id = $2")
            .bind(matchup.winner.as_ref().map(|team| team.id))
            .bind(matchup.id)
            .execute(&mut *tx)
            .await?;

        for entry in &matchup.entries {
            sqlx::query("UPDATE matchup_entries SET team_id = $1, score = $2 WHERE id = $3")
                .bind(entry.team.as_ref().map(|team| team.id))
                .bind(entry.score)
                .bind(entry.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn complete_tournament(&self, tournament: &Tournament) -> StoreResult<()> {
        sqlx::query("UPDATE tournaments SET active = FALSE WHERE id = $1")
            .bind(tournament.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

async fn load_people(pool: &PgPool) -> StoreResult<Vec<Person>> {
    let rows = sqlx::query(
        "SELECT id, first_name, last_name, email, phone FROM people ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| Person {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            phone: row.get("phone"),
        })
        .collect())
}

fn find_team(teams: &[Team], id: i64) -> StoreResult<&Team> {
    teams
        .iter()
        .find(|team| team.id == id)
        .ok_or(StoreError::UnknownId { kind: "team", id })
}
