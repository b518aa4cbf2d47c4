use crate::app_dirs::AppDirs;
use crate::error::ExportError;
use crate::session::SessionSummary;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;
use std::convert::Infallible;
use std::io::Write;
use std::path::{Path, PathBuf};
use time_humanize::{Accuracy, HumanTime, Tense};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS players (
        name TEXT PRIMARY KEY,
        total_games INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        player TEXT NOT NULL REFERENCES players(name),
        played_at TEXT NOT NULL,
        total_points INTEGER NOT NULL,
        max_points INTEGER NOT NULL,
        round_count INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS rounds (
        session_id INTEGER NOT NULL REFERENCES sessions(id),
        round INTEGER NOT NULL,
        target_id INTEGER NOT NULL,
        guess_lat REAL,
        guess_lon REAL,
        target_lat REAL NOT NULL,
        target_lon REAL NOT NULL,
        distance_yards INTEGER,
        timed_out BOOLEAN NOT NULL,
        points INTEGER NOT NULL,
        elapsed_ms INTEGER NOT NULL,
        PRIMARY KEY (session_id, round)
    );

    CREATE INDEX IF NOT EXISTS idx_sessions_player ON sessions(player);
    CREATE INDEX IF NOT EXISTS idx_sessions_played_at ON sessions(played_at);
"#;

/// Timestamps are stored as fixed-width UTC text so they sort chronologically.
fn stored_time(at: &DateTime<Local>) -> String {
    at.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Destination for finished sessions.
pub trait ReportSink {
    type Error;

    fn record(&mut self, player: &str, summary: &SessionSummary) -> std::result::Result<(), Self::Error>;
}

/// Keeps summaries in memory; used for headless runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub sessions: Vec<(String, SessionSummary)>,
}

impl ReportSink for MemorySink {
    type Error = Infallible;

    fn record(&mut self, player: &str, summary: &SessionSummary) -> std::result::Result<(), Infallible> {
        self.sessions.push((player.to_string(), summary.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: i64,
    pub player: String,
    pub played_at: DateTime<Local>,
    pub total_points: u64,
    pub max_points: u64,
    pub round_count: usize,
    /// Place ids in round order, joined the same way as a game link.
    pub link: String,
}

impl SessionRecord {
    fn from_row(row: &Row<'_>) -> Result<Self> {
        let played_at: String = row.get(2)?;
        let played_at = DateTime::parse_from_rfc3339(&played_at)
            .map_err(|_| {
                rusqlite::Error::InvalidColumnType(
                    2,
                    "played_at".to_string(),
                    rusqlite::types::Type::Text,
                )
            })?
            .with_timezone(&Local);

        Ok(SessionRecord {
            id: row.get(0)?,
            player: row.get(1)?,
            played_at,
            total_points: row.get(3)?,
            max_points: row.get(4)?,
            round_count: row.get(5)?,
            link: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        })
    }

    /// e.g. "2 hours ago"
    pub fn played_ago(&self) -> String {
        let elapsed = (Local::now() - self.played_at).to_std().unwrap_or_default();
        HumanTime::from(elapsed).to_text_en(Accuracy::Rough, Tense::Past)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerTotals {
    pub player: String,
    pub games_played: u64,
    pub total_score: u64,
    pub best_score: u64,
    pub avg_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum_macros::Display)]
pub enum LeaderboardSort {
    TotalScore,
    GamesPlayed,
    AvgScore,
    BestScore,
}

impl LeaderboardSort {
    fn order_by(&self) -> &'static str {
        match self {
            LeaderboardSort::TotalScore => "total_score DESC",
            LeaderboardSort::GamesPlayed => "games_played DESC",
            LeaderboardSort::AvgScore => "avg_score DESC",
            LeaderboardSort::BestScore => "best_score DESC",
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportRow {
    session_id: i64,
    player: String,
    played_at: String,
    round: usize,
    target_id: u32,
    guess_lat: Option<f64>,
    guess_lon: Option<f64>,
    target_lat: f64,
    target_lon: f64,
    distance_yards: Option<u64>,
    timed_out: bool,
    points: u32,
}

/// Local store of finished sessions
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Open the history database at its default location
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("nuguessr_history.db"));
        Self::open(db_path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {}", e)),
                )
            })?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(HistoryDb { conn })
    }

    /// Store a finished session and bump the player's game counter.
    /// Returns the new session id.
    pub fn record_session(&mut self, player: &str, summary: &SessionSummary) -> Result<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO players (name, total_games) VALUES (?1, 1)
            ON CONFLICT(name) DO UPDATE SET total_games = total_games + 1
            "#,
            params![player],
        )?;

        tx.execute(
            r#"
            INSERT INTO sessions (player, played_at, total_points, max_points, round_count)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                player,
                stored_time(&summary.played_at),
                summary.total_points,
                summary.max_points,
                summary.round_count,
            ],
        )?;
        let session_id = tx.last_insert_rowid();

        for r in &summary.results {
            tx.execute(
                r#"
                INSERT INTO rounds
                (session_id, round, target_id, guess_lat, guess_lon, target_lat, target_lon,
                 distance_yards, timed_out, points, elapsed_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
                params![
                    session_id,
                    r.round,
                    r.target_id,
                    r.guess.map(|g| g.lat()),
                    r.guess.map(|g| g.lon()),
                    r.target.lat(),
                    r.target.lon(),
                    r.distance_yards,
                    r.timed_out,
                    r.points,
                    r.elapsed_ms,
                ],
            )?;
        }

        tx.commit()?;
        info!(
            "recorded session {session_id} for {player}: {} points",
            summary.total_points
        );
        Ok(session_id)
    }

    pub fn games_played(&self, player: &str) -> Result<u64> {
        let games: Option<u64> = self
            .conn
            .query_row(
                "SELECT total_games FROM players WHERE name = ?1",
                [player],
                |row| row.get(0),
            )
            .optional()?;
        Ok(games.unwrap_or(0))
    }

    /// Most recent sessions first
    pub fn recent_sessions(&self, player: Option<&str>, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.id, s.player, s.played_at, s.total_points, s.max_points, s.round_count,
                (SELECT GROUP_CONCAT(target_id, '-')
                 FROM (SELECT target_id FROM rounds WHERE session_id = s.id ORDER BY round))
            FROM sessions s
            WHERE ?1 IS NULL OR s.player = ?1
            ORDER BY s.played_at DESC, s.id DESC
            LIMIT ?2
            "#,
        )?;

        let records = stmt.query_map(params![player, limit as i64], SessionRecord::from_row)?;
        records.collect()
    }

    pub fn player_totals(&self, player: &str) -> Result<Option<PlayerTotals>> {
        Ok(self
            .leaderboard(LeaderboardSort::TotalScore, Some(player))?
            .into_iter()
            .find(|t| t.player == player))
    }

    /// Per-player aggregates. `filter` keeps players whose name contains it,
    /// ignoring case.
    pub fn leaderboard(&self, sort: LeaderboardSort, filter: Option<&str>) -> Result<Vec<PlayerTotals>> {
        let sql = format!(
            r#"
            SELECT p.name,
                p.total_games AS games_played,
                COALESCE(SUM(s.total_points), 0) AS total_score,
                COALESCE(MAX(s.total_points), 0) AS best_score,
                COALESCE(AVG(s.total_points), 0.0) AS avg_score
            FROM players p
            LEFT JOIN sessions s ON s.player = p.name
            WHERE ?1 IS NULL OR INSTR(LOWER(p.name), LOWER(?1)) > 0
            GROUP BY p.name
            ORDER BY {}, p.name
            "#,
            sort.order_by()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![filter], |row| {
            Ok(PlayerTotals {
                player: row.get(0)?,
                games_played: row.get(1)?,
                total_score: row.get(2)?,
                best_score: row.get(3)?,
                avg_score: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    /// Writes every recorded round as CSV. Returns the number of rows.
    pub fn export_csv<W: Write>(&self, writer: W) -> std::result::Result<usize, ExportError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.id, s.player, s.played_at, r.round, r.target_id, r.guess_lat, r.guess_lon,
                r.target_lat, r.target_lon, r.distance_yards, r.timed_out, r.points
            FROM rounds r
            JOIN sessions s ON s.id = r.session_id
            ORDER BY s.id, r.round
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ExportRow {
                session_id: row.get(0)?,
                player: row.get(1)?,
                played_at: row.get(2)?,
                round: row.get(3)?,
                target_id: row.get(4)?,
                guess_lat: row.get(5)?,
                guess_lon: row.get(6)?,
                target_lat: row.get(7)?,
                target_lon: row.get(8)?,
                distance_yards: row.get(9)?,
                timed_out: row.get(10)?,
                points: row.get(11)?,
            })
        })?;

        let mut csv = csv::Writer::from_writer(writer);
        let mut count = 0;
        for row in rows {
            csv.serialize(row?)?;
            count += 1;
        }
        csv.flush().map_err(csv::Error::from)?;
        Ok(count)
    }

    /// Remove all recorded history
    pub fn clear_all(&self) -> Result<()> {
        self.conn
            .execute_batch("DELETE FROM rounds; DELETE FROM sessions; DELETE FROM players;")
    }
}

impl ReportSink for HistoryDb {
    type Error = rusqlite::Error;

    fn record(&mut self, player: &str, summary: &SessionSummary) -> Result<()> {
        self.record_session(player, summary).map(|_| ())
    }
}
