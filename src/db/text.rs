//! Flat-file store backed by line-oriented text files.
//!
//! One file per entity kind, one record per line, comma-separated columns.
//! References are stored as id lists: pipes separate ids, carets separate
//! the matchups of one round inside a tournament record, and an empty
//! column stands for an unset optional reference. Field values must not
//! contain the separator characters; the tracker never generates any that
//! do.
//!
//! Updates rewrite the affected file wholesale. The store is built for a
//! single interactive operator; nothing here is safe under concurrent
//! writers.

use super::sequence::IdSequence;
use super::{StoreError, StoreResult, TournamentStore, renumber_bracket};
use crate::tournament::models::{
    Matchup, MatchupEntry, MatchupId, Person, Prize, Team, Tournament,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

const PEOPLE_FILE: &str = "people.csv";
const TEAMS_FILE: &str = "teams.csv";
const PRIZES_FILE: &str = "prizes.csv";
const TOURNAMENTS_FILE: &str = "tournaments.csv";
const MATCHUPS_FILE: &str = "matchups.csv";
const ENTRIES_FILE: &str = "matchup_entries.csv";

#[derive(Default)]
struct Sequences {
    people: IdSequence,
    teams: IdSequence,
    prizes: IdSequence,
    tournaments: IdSequence,
    matchups: IdSequence,
    entries: IdSequence,
}

/// Store persisting every entity kind to a text file under one directory.
pub struct TextFileStore {
    dir: PathBuf,
    ids: Mutex<Sequences>,
}

impl TextFileStore {
    /// Open (or initialize) a store rooted at `dir`.
    ///
    /// Creates the directory when missing and seeds each id sequence from
    /// the highest id already on disk.
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let store = Self {
            dir,
            ids: Mutex::new(Sequences::default()),
        };
        {
            let mut ids = store.ids.lock().unwrap();
            ids.people = IdSequence::starting_after(store.max_id_in(PEOPLE_FILE)?);
            ids.teams = IdSequence::starting_after(store.max_id_in(TEAMS_FILE)?);
            ids.prizes = IdSequence::starting_after(store.max_id_in(PRIZES_FILE)?);
            ids.tournaments = IdSequence::starting_after(store.max_id_in(TOURNAMENTS_FILE)?);
            ids.matchups = IdSequence::starting_after(store.max_id_in(MATCHUPS_FILE)?);
            ids.entries = IdSequence::starting_after(store.max_id_in(ENTRIES_FILE)?);
        }
        Ok(store)
    }

    /// Directory the store reads and writes under.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn load_lines(&self, file: &str) -> StoreResult<Vec<String>> {
        let path = self.dir.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Ok(fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn write_lines(&self, file: &str, lines: &[String]) -> StoreResult<()> {
        let mut contents = lines.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        fs::write(self.dir.join(file), contents)?;
        Ok(())
    }

    fn append_line(&self, file: &str, line: String) -> StoreResult<()> {
        let mut lines = self.load_lines(file)?;
        lines.push(line);
        self.write_lines(file, &lines)
    }

    /// Replace the record whose leading id column matches, keeping order.
    fn replace_line(&self, file: &str, id: i64, line: String, kind: &'static str) -> StoreResult<()> {
        let mut lines = self.load_lines(file)?;
        let prefix = format!("{id},");
        let slot = lines
            .iter_mut()
            .find(|existing| existing.starts_with(&prefix))
            .ok_or(StoreError::UnknownId { kind, id })?;
        *slot = line;
        self.write_lines(file, &lines)
    }

    fn max_id_in(&self, file: &str) -> StoreResult<i64> {
        let mut max = 0;
        for line in self.load_lines(file)? {
            let first = line.split(',').next().unwrap_or_default();
            max = max.max(parse_num::<i64>(first, file)?);
        }
        Ok(max)
    }

    fn load_people(&self) -> StoreResult<Vec<Person>> {
        self.load_lines(PEOPLE_FILE)?
            .iter()
            .map(|line| person_from_line(line))
            .collect()
    }

    fn load_teams(&self) -> StoreResult<Vec<Team>> {
        let people = self.load_people()?;
        self.load_lines(TEAMS_FILE)?
            .iter()
            .map(|line| team_from_line(line, &people))
            .collect()
    }

    fn load_prizes(&self) -> StoreResult<Vec<Prize>> {
        self.load_lines(PRIZES_FILE)?
            .iter()
            .map(|line| prize_from_line(line))
            .collect()
    }

    /// All matchups on disk, hydrated against the given teams.
    fn load_matchups(&self, teams: &[Team]) -> StoreResult<HashMap<MatchupId, Matchup>> {
        let mut entries: HashMap<i64, MatchupEntry> = HashMap::new();
        for line in self.load_lines(ENTRIES_FILE)? {
            let entry = entry_from_line(&line, teams)?;
            entries.insert(entry.id, entry);
        }

        let mut matchups = HashMap::new();
        for line in self.load_lines(MATCHUPS_FILE)? {
            let cols: Vec<&str> = line.split(',').collect();
            if cols.len() != 4 {
                return Err(corrupt(MATCHUPS_FILE, "expected 4 columns"));
            }
            let id = parse_num::<i64>(cols[0], MATCHUPS_FILE)?;
            let matchup_entries = split_ids(cols[1], MATCHUPS_FILE)?
                .into_iter()
                .map(|entry_id| {
                    entries.get(&entry_id).cloned().ok_or(StoreError::UnknownId {
                        kind: "matchup entry",
                        id: entry_id,
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;
            let winner = match opt_id(cols[2], MATCHUPS_FILE)? {
                Some(team_id) => Some(find_team(teams, team_id)?.clone()),
                None => None,
            };

            matchups.insert(
                id,
                Matchup {
                    id,
                    entries: matchup_entries,
                    winner,
                    round: parse_num(cols[3], MATCHUPS_FILE)?,
                },
            );
        }
        Ok(matchups)
    }
}

#[async_trait]
impl TournamentStore for TextFileStore {
    async fn create_person(&self, mut person: Person) -> StoreResult<Person> {
        let mut ids = self.ids.lock().unwrap();
        person.id = ids.people.next_id();
        self.append_line(PEOPLE_FILE, person_line(&person))?;
        Ok(person)
    }

    async fn create_team(&self, mut team: Team) -> StoreResult<Team> {
        let mut ids = self.ids.lock().unwrap();
        team.id = ids.teams.next_id();
        self.append_line(TEAMS_FILE, team_line(&team))?;
        Ok(team)
    }

    async fn create_prize(&self, mut prize: Prize) -> StoreResult<Prize> {
        let mut ids = self.ids.lock().unwrap();
        prize.id = ids.prizes.next_id();
        self.append_line(PRIZES_FILE, prize_line(&prize))?;
        Ok(prize)
    }

    async fn create_tournament(&self, mut tournament: Tournament) -> StoreResult<Tournament> {
        let mut ids = self.ids.lock().unwrap();
        tournament.id = ids.tournaments.next_id();

        // Draw every id up front; earlier rounds come first, so parent
        // references always name a matchup written in the same batch.
        let matchup_count: usize = tournament.rounds.iter().map(Vec::len).sum();
        let entry_count: usize = tournament
            .rounds
            .iter()
            .flatten()
            .map(|m| m.entries.len())
            .sum();
        let mut matchup_ids = (0..matchup_count)
            .map(|_| ids.matchups.next_id())
            .collect::<Vec<_>>()
            .into_iter();
        let mut entry_ids = (0..entry_count)
            .map(|_| ids.entries.next_id())
            .collect::<Vec<_>>()
            .into_iter();
        renumber_bracket(
            &mut tournament.rounds,
            move || matchup_ids.next().expect("preallocated matchup id"),
            move || entry_ids.next().expect("preallocated entry id"),
        )?;

        let mut entry_lines = self.load_lines(ENTRIES_FILE)?;
        let mut matchup_lines = self.load_lines(MATCHUPS_FILE)?;
        for matchup in tournament.rounds.iter().flatten() {
            for entry in &matchup.entries {
                entry_lines.push(entry_line(entry));
            }
            matchup_lines.push(matchup_line(matchup));
        }
        self.write_lines(ENTRIES_FILE, &entry_lines)?;
        self.write_lines(MATCHUPS_FILE, &matchup_lines)?;
        self.append_line(TOURNAMENTS_FILE, tournament_line(&tournament))?;

        Ok(tournament)
    }

    async fn people(&self) -> StoreResult<Vec<Person>> {
        self.load_people()
    }

    async fn teams(&self) -> StoreResult<Vec<Team>> {
        self.load_teams()
    }

    async fn prizes(&self) -> StoreResult<Vec<Prize>> {
        self.load_prizes()
    }

    async fn tournaments(&self) -> StoreResult<Vec<Tournament>> {
        let teams = self.load_teams()?;
        let prizes = self.load_prizes()?;
        let matchups = self.load_matchups(&teams)?;

        let mut tournaments = Vec::new();
        for line in self.load_lines(TOURNAMENTS_FILE)? {
            if let Some(tournament) = tournament_from_line(&line, &teams, &prizes, &matchups)? {
                tournaments.push(tournament);
            }
        }
        Ok(tournaments)
    }

    async fn update_matchup(&self, matchup: &Matchup) -> StoreResult<()> {
        self.replace_line(MATCHUPS_FILE, matchup.id, matchup_line(matchup), "matchup")?;
        for entry in &matchup.entries {
            self.replace_line(ENTRIES_FILE, entry.id, entry_line(entry), "matchup entry")?;
        }
        Ok(())
    }

    async fn complete_tournament(&self, tournament: &Tournament) -> StoreResult<()> {
        let mut closed = tournament.clone();
        closed.active = false;
        self.replace_line(
            TOURNAMENTS_FILE,
            closed.id,
            tournament_line(&closed),
            "tournament",
        )
    }
}

fn corrupt(file: &str, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        file: file.to_string(),
        reason: reason.into(),
    }
}

fn parse_num<T: FromStr>(value: &str, file: &str) -> StoreResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| corrupt(file, format!("unreadable number {value:?}")))
}

/// Pipe-separated id list; empty column means an empty list.
fn split_ids(value: &str, file: &str) -> StoreResult<Vec<i64>> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value.split('|').map(|id| parse_num(id, file)).collect()
}

/// Optional id column; empty means unset.
fn opt_id(value: &str, file: &str) -> StoreResult<Option<i64>> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_num(value, file).map(Some)
    }
}

fn join_ids(ids: impl Iterator<Item = i64>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join("|")
}

fn find_team(teams: &[Team], id: i64) -> StoreResult<&Team> {
    teams
        .iter()
        .find(|team| team.id == id)
        .ok_or(StoreError::UnknownId { kind: "team", id })
}

fn person_line(person: &Person) -> String {
    format!(
        "{},{},{},{},{}",
        person.id, person.first_name, person.last_name, person.email, person.phone
    )
}

fn person_from_line(line: &str) -> StoreResult<Person> {
    let cols: Vec<&str> = line.split(',').collect();
    if cols.len() != 5 {
        return Err(corrupt(PEOPLE_FILE, "expected 5 columns"));
    }
    Ok(Person {
        id: parse_num(cols[0], PEOPLE_FILE)?,
        first_name: cols[1].to_string(),
        last_name: cols[2].to_string(),
        email: cols[3].to_string(),
        phone: cols[4].to_string(),
    })
}

fn team_line(team: &Team) -> String {
    format!(
        "{},{},{}",
        team.id,
        team.name,
        join_ids(team.members.iter().map(|member| member.id))
    )
}

fn team_from_line(line: &str, people: &[Person]) -> StoreResult<Team> {
    let cols: Vec<&str> = line.split(',').collect();
    if cols.len() != 3 {
        return Err(corrupt(TEAMS_FILE, "expected 3 columns"));
    }
    let members = split_ids(cols[2], TEAMS_FILE)?
        .into_iter()
        .map(|person_id| {
            people
                .iter()
                .find(|person| person.id == person_id)
                .cloned()
                .ok_or(StoreError::UnknownId {
                    kind: "person",
                    id: person_id,
                })
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Team {
        id: parse_num(cols[0], TEAMS_FILE)?,
        name: cols[1].to_string(),
        members,
    })
}

fn prize_line(prize: &Prize) -> String {
    format!(
        "{},{},{},{},{}",
        prize.id, prize.place_number, prize.place_name, prize.amount, prize.percentage
    )
}

fn prize_from_line(line: &str) -> StoreResult<Prize> {
    let cols: Vec<&str> = line.split(',').collect();
    if cols.len() != 5 {
        return Err(corrupt(PRIZES_FILE, "expected 5 columns"));
    }
    Ok(Prize {
        id: parse_num(cols[0], PRIZES_FILE)?,
        place_number: parse_num(cols[1], PRIZES_FILE)?,
        place_name: cols[2].to_string(),
        amount: parse_num::<Decimal>(cols[3], PRIZES_FILE)?,
        percentage: parse_num::<Decimal>(cols[4], PRIZES_FILE)?,
    })
}

fn entry_line(entry: &MatchupEntry) -> String {
    format!(
        "{},{},{},{}",
        entry.id,
        entry.team.as_ref().map(|team| team.id.to_string()).unwrap_or_default(),
        entry.score,
        entry
            .parent_matchup_id
            .map(|id| id.to_string())
            .unwrap_or_default()
    )
}

fn entry_from_line(line: &str, teams: &[Team]) -> StoreResult<MatchupEntry> {
    let cols: Vec<&str> = line.split(',').collect();
    if cols.len() != 4 {
        return Err(corrupt(ENTRIES_FILE, "expected 4 columns"));
    }
    let team = match opt_id(cols[1], ENTRIES_FILE)? {
        Some(team_id) => Some(find_team(teams, team_id)?.clone()),
        None => None,
    };
    Ok(MatchupEntry {
        id: parse_num(cols[0], ENTRIES_FILE)?,
        team,
        score: parse_num(cols[2], ENTRIES_FILE)?,
        parent_matchup_id: opt_id(cols[3], ENTRIES_FILE)?,
    })
}

fn matchup_line(matchup: &Matchup) -> String {
    format!(
        "{},{},{},{}",
        matchup.id,
        join_ids(matchup.entries.iter().map(|entry| entry.id)),
        matchup.winner.as_ref().map(|team| team.id.to_string()).unwrap_or_default(),
        matchup.round
    )
}

fn tournament_line(tournament: &Tournament) -> String {
    let rounds = tournament
        .rounds
        .iter()
        .map(|round| {
            round
                .iter()
                .map(|matchup| matchup.id.to_string())
                .collect::<Vec<_>>()
                .join("^")
        })
        .collect::<Vec<_>>()
        .join("|");

    format!(
        "{},{},{},{},{},{},{}",
        tournament.id,
        tournament.name,
        tournament.entry_fee,
        join_ids(tournament.entered_teams.iter().map(|team| team.id)),
        join_ids(tournament.prizes.iter().map(|prize| prize.id)),
        rounds,
        if tournament.active { 1 } else { 0 }
    )
}

/// Hydrate one tournament record; inactive tournaments read as `None`.
fn tournament_from_line(
    line: &str,
    teams: &[Team],
    prizes: &[Prize],
    matchups: &HashMap<MatchupId, Matchup>,
) -> StoreResult<Option<Tournament>> {
    let cols: Vec<&str> = line.split(',').collect();
    if cols.len() != 7 {
        return Err(corrupt(TOURNAMENTS_FILE, "expected 7 columns"));
    }
    if cols[6] != "1" {
        return Ok(None);
    }

    let entered_teams = split_ids(cols[3], TOURNAMENTS_FILE)?
        .into_iter()
        .map(|team_id| find_team(teams, team_id).map(Team::clone))
        .collect::<StoreResult<Vec<_>>>()?;

    let tournament_prizes = split_ids(cols[4], TOURNAMENTS_FILE)?
        .into_iter()
        .map(|prize_id| {
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

    let mut rounds = Vec::new();
    if !cols[5].is_empty() {
        for round_text in cols[5].split('|') {
            let round = round_text
                .split('^')
                .map(|matchup_id| {
                    let id = parse_num::<i64>(matchup_id, TOURNAMENTS_FILE)?;
                    matchups.get(&id).cloned().ok_or(StoreError::UnknownId {
                        kind: "matchup",
                        id,
                    })
                })
                .collect::<StoreResult<Vec<_>>>()?;
            rounds.push(round);
        }
    }

    Ok(Some(Tournament {
        id: parse_num(cols[0], TOURNAMENTS_FILE)?,
        name: cols[1].to_string(),
        entry_fee: parse_num(cols[2], TOURNAMENTS_FILE)?,
        entered_teams,
        prizes: tournament_prizes,
        rounds,
        active: true,
    }))
}
