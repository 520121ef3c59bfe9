use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::parse::{BallDoc, GradeDoc, InningsFeed, PlayerDoc, RoundDoc, SurfaceDoc, TeamDoc};

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            status TEXT,
            status_id INTEGER,
            team_a TEXT,
            team_b TEXT,
            season TEXT,
            match_type TEXT,
            match_type_id INTEGER,
            is_ball_by_ball INTEGER,
            result_text TEXT,
            round_id TEXT,
            grade_id TEXT,
            venue_id TEXT,
            start_datetime TEXT
        );

        CREATE TABLE IF NOT EXISTS teams (
            id TEXT,
            match_id TEXT,
            display_name TEXT,
            result_type_id INTEGER,
            result_type TEXT,
            won_toss INTEGER,
            batted_first INTEGER,
            is_home INTEGER,
            score_text TEXT,
            is_winner INTEGER,
            PRIMARY KEY (id, match_id)
        );

        CREATE TABLE IF NOT EXISTS players (
            id TEXT PRIMARY KEY,
            team_id TEXT,
            name TEXT,
            short_name TEXT,
            role TEXT
        );

        CREATE TABLE IF NOT EXISTS innings (
            id TEXT PRIMARY KEY,
            match_id TEXT,
            name TEXT,
            innings_close_type TEXT,
            innings_number INTEGER,
            innings_order INTEGER,
            batting_team_id TEXT,
            is_declared INTEGER,
            is_follow_on INTEGER,
            byes_runs INTEGER,
            leg_byes_runs INTEGER,
            no_balls INTEGER,
            wide_balls INTEGER,
            penalties INTEGER,
            total_extras INTEGER,
            overs_bowled REAL,
            runs_scored INTEGER,
            number_of_wickets_fallen INTEGER
        );

        CREATE TABLE IF NOT EXISTS ball_by_ball (
            id TEXT PRIMARY KEY,
            innings_id TEXT,
            innings_number INTEGER,
            innings_order INTEGER,
            innings_name TEXT,
            batting_team_id TEXT,
            progress_runs INTEGER,
            progress_wickets INTEGER,
            progress_score TEXT,
            striker_participant_id TEXT,
            striker_short_name TEXT,
            striker_runs_scored INTEGER,
            striker_balls_faced INTEGER,
            non_striker_participant_id TEXT,
            non_striker_short_name TEXT,
            non_striker_runs_scored INTEGER,
            non_striker_balls_faced INTEGER,
            bowler_participant_id TEXT,
            bowler_short_name TEXT,
            over_number INTEGER,
            ball_display_number INTEGER,
            ball_time TEXT,
            runs_bat INTEGER,
            wides INTEGER,
            no_balls INTEGER,
            leg_byes INTEGER,
            byes INTEGER,
            penalty_runs INTEGER,
            short_description TEXT,
            description TEXT,
            fetched_time TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_bbb_innings ON ball_by_ball(innings_id);

        CREATE TABLE IF NOT EXISTS rounds (
            id TEXT PRIMARY KEY,
            name TEXT,
            short_name TEXT
        );

        CREATE TABLE IF NOT EXISTS grades (
            id TEXT PRIMARY KEY,
            name TEXT
        );

        CREATE TABLE IF NOT EXISTS venues (
            id TEXT PRIMARY KEY,
            name TEXT,
            line1 TEXT,
            suburb TEXT,
            post_code TEXT,
            state_name TEXT,
            country TEXT,
            playing_surface_id TEXT
        );

        CREATE TABLE IF NOT EXISTS playing_surfaces (
            id TEXT PRIMARY KEY,
            name TEXT,
            latitude REAL,
            longitude REAL
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Wipe every table. Used when a new tracking session starts or ends.
pub fn clear_all(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM ball_by_ball;
        DELETE FROM innings;
        DELETE FROM teams;
        DELETE FROM players;
        DELETE FROM matches;
        DELETE FROM rounds;
        DELETE FROM grades;
        DELETE FROM venues;
        DELETE FROM playing_surfaces;
        "#,
    )
    .context("clear tables")?;
    Ok(())
}

// --- insert-if-absent writers -------------------------------------------------
//
// Natural-id keyed rows are immutable once written, so every writer below is
// INSERT OR IGNORE. The innings running totals are the one exception and have
// their own targeted UPDATE.

pub fn insert_match_if_absent(
    conn: &Connection,
    match_id: &str,
    season: &str,
    doc: &crate::parse::MatchSummaryDoc,
) -> Result<()> {
    let team_a = doc.teams.first().map(|t| t.id.as_str());
    let team_b = doc.teams.get(1).map(|t| t.id.as_str());
    conn.execute(
        r#"
        INSERT OR IGNORE INTO matches (
            id, status, status_id, team_a, team_b, season,
            match_type, match_type_id, is_ball_by_ball, result_text,
            round_id, grade_id, venue_id, start_datetime
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
        "#,
        params![
            match_id,
            doc.status,
            doc.status_id,
            team_a,
            team_b,
            season,
            doc.match_type,
            doc.match_type_id,
            doc.is_ball_by_ball.map(bool_to_i64),
            doc.result_text,
            doc.round.as_ref().map(|r| r.id.as_str()),
            doc.grade.as_ref().map(|g| g.id.as_str()),
            doc.venue.as_ref().map(|v| v.id.as_str()),
            doc.start_datetime,
        ],
    )
    .context("insert match")?;
    Ok(())
}

pub fn insert_team_if_absent(conn: &Connection, match_id: &str, team: &TeamDoc) -> Result<()> {
    conn.execute(
        r#"
        INSERT OR IGNORE INTO teams (
            id, match_id, display_name, result_type_id, result_type,
            won_toss, batted_first, is_home, score_text, is_winner
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            team.id,
            match_id,
            team.display_name,
            team.result_type_id,
            team.result_type,
            team.won_toss.map(bool_to_i64),
            team.batted_first.map(bool_to_i64),
            team.is_home.map(bool_to_i64),
            team.score_text,
            team.is_winner.map(bool_to_i64),
        ],
    )
    .context("insert team")?;
    Ok(())
}

pub fn insert_player_if_absent(conn: &Connection, team_id: &str, player: &PlayerDoc) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO players (id, team_id, name, short_name, role)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![player.id, team_id, player.name, player.short_name, player.role],
    )
    .context("insert player")?;
    Ok(())
}

pub fn insert_round_if_absent(conn: &Connection, round: &RoundDoc) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO rounds (id, name, short_name) VALUES (?1, ?2, ?3)",
        params![round.id, round.name, round.short_name],
    )
    .context("insert round")?;
    Ok(())
}

pub fn insert_grade_if_absent(conn: &Connection, grade: &GradeDoc) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO grades (id, name) VALUES (?1, ?2)",
        params![grade.id, grade.name],
    )
    .context("insert grade")?;
    Ok(())
}

pub fn insert_venue_if_absent(conn: &Connection, venue: &crate::parse::VenueDoc) -> Result<()> {
    conn.execute(
        r#"
        INSERT OR IGNORE INTO venues (
            id, name, line1, suburb, post_code, state_name, country, playing_surface_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            venue.id,
            venue.name,
            venue.line1,
            venue.suburb,
            venue.post_code,
            venue.state_name,
            venue.country,
            venue.playing_surface.as_ref().map(|s| s.id.as_str()),
        ],
    )
    .context("insert venue")?;
    Ok(())
}

pub fn insert_surface_if_absent(conn: &Connection, surface: &SurfaceDoc) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO playing_surfaces (id, name, latitude, longitude)
         VALUES (?1, ?2, ?3, ?4)",
        params![surface.id, surface.name, surface.latitude, surface.longitude],
    )
    .context("insert playing surface")?;
    Ok(())
}

pub fn insert_innings_if_absent(conn: &Connection, match_id: &str, inn: &InningsFeed) -> Result<()> {
    let Some(innings_id) = inn.id.as_deref() else {
        return Ok(());
    };
    conn.execute(
        r#"
        INSERT OR IGNORE INTO innings (
            id, match_id, name, innings_close_type, innings_number, innings_order,
            batting_team_id, is_declared, is_follow_on, byes_runs, leg_byes_runs,
            no_balls, wide_balls, penalties, total_extras, overs_bowled,
            runs_scored, number_of_wickets_fallen
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
        "#,
        params![
            innings_id,
            match_id,
            inn.name,
            inn.close_type,
            inn.number.unwrap_or(0),
            inn.order.unwrap_or(0),
            inn.batting_team_id,
            inn.is_declared.map(bool_to_i64).unwrap_or(0),
            inn.is_follow_on.map(bool_to_i64).unwrap_or(0),
            inn.byes_runs.unwrap_or(0),
            inn.leg_byes_runs.unwrap_or(0),
            inn.no_balls.unwrap_or(0),
            inn.wide_balls.unwrap_or(0),
            inn.penalties.unwrap_or(0),
            inn.total_extras.unwrap_or(0),
            inn.overs_bowled.unwrap_or(0.0),
            inn.runs_scored.unwrap_or(0),
            inn.wickets_fallen.unwrap_or(0),
        ],
    )
    .context("insert innings")?;
    Ok(())
}

/// The one mutation path in the schema: the live poller refreshes the running
/// totals of an innings it has already seen. Never inserts.
pub fn update_innings_summary(conn: &Connection, inn: &InningsFeed) -> Result<usize> {
    let Some(innings_id) = inn.id.as_deref() else {
        return Ok(0);
    };
    let changed = conn
        .execute(
            r#"
            UPDATE innings SET
                name = COALESCE(?2, name),
                innings_close_type = COALESCE(?3, innings_close_type),
                batting_team_id = COALESCE(?4, batting_team_id),
                overs_bowled = ?5,
                runs_scored = ?6,
                number_of_wickets_fallen = ?7
            WHERE id = ?1
            "#,
            params![
                innings_id,
                inn.name,
                inn.close_type,
                inn.batting_team_id,
                inn.overs_bowled.unwrap_or(0.0),
                inn.runs_scored.unwrap_or(0),
                inn.wickets_fallen.unwrap_or(0),
            ],
        )
        .context("update innings summary")?;
    Ok(changed)
}

pub fn delivery_exists(conn: &Connection, delivery_id: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT id FROM ball_by_ball WHERE id = ?1",
            params![delivery_id],
            |_| Ok(()),
        )
        .optional()
        .context("check delivery existence")?;
    Ok(found.is_some())
}

/// Write-once insert: callers must have checked [`delivery_exists`] first.
/// The innings metadata snapshot is denormalized onto the row.
pub fn insert_delivery(
    conn: &Connection,
    delivery_id: &str,
    inn: &InningsFeed,
    ball: &BallDoc,
    fetched_at: &str,
) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO ball_by_ball (
            id, innings_id, innings_number, innings_order, innings_name,
            batting_team_id, progress_runs, progress_wickets, progress_score,
            striker_participant_id, striker_short_name, striker_runs_scored, striker_balls_faced,
            non_striker_participant_id, non_striker_short_name,
            non_striker_runs_scored, non_striker_balls_faced,
            bowler_participant_id, bowler_short_name,
            over_number, ball_display_number, ball_time,
            runs_bat, wides, no_balls, leg_byes, byes, penalty_runs,
            short_description, description, fetched_time
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
            ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31
        )
        "#,
        params![
            delivery_id,
            inn.id,
            inn.number.unwrap_or(0),
            inn.order.unwrap_or(0),
            inn.name,
            inn.batting_team_id,
            ball.progress_runs.unwrap_or(0),
            ball.progress_wickets.unwrap_or(0),
            ball.progress_score,
            ball.striker_participant_id,
            ball.striker_short_name,
            ball.striker_runs_scored.unwrap_or(0),
            ball.striker_balls_faced.unwrap_or(0),
            ball.non_striker_participant_id,
            ball.non_striker_short_name,
            ball.non_striker_runs_scored.unwrap_or(0),
            ball.non_striker_balls_faced.unwrap_or(0),
            ball.bowler_participant_id,
            ball.bowler_short_name,
            ball.over_number.unwrap_or(0),
            ball.ball_display_number.unwrap_or(0),
            ball.ball_time,
            ball.runs_bat.unwrap_or(0),
            ball.wides.unwrap_or(0),
            ball.no_balls.unwrap_or(0),
            ball.leg_byes.unwrap_or(0),
            ball.byes.unwrap_or(0),
            ball.penalty_runs.unwrap_or(0),
            ball.short_description,
            ball.description,
            fetched_at,
        ],
    )
    .context("insert delivery")?;
    Ok(())
}

// --- readers ------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TeamRow {
    pub id: String,
    pub match_id: String,
    pub display_name: String,
    pub score_text: Option<String>,
    pub is_winner: Option<bool>,
}

/// Projection of a stored delivery carrying the fields the aggregators use.
#[derive(Debug, Clone, Default)]
pub struct DeliveryRow {
    pub id: String,
    pub innings_id: String,
    pub innings_number: i64,
    pub batting_team_id: Option<String>,
    pub over_number: i64,
    pub ball_display_number: i64,
    pub progress_wickets: i64,
    pub bowler_participant_id: Option<String>,
    pub bowler_short_name: Option<String>,
    pub runs_bat: i64,
    pub wides: i64,
    pub no_balls: i64,
    pub leg_byes: i64,
    pub byes: i64,
    pub penalty_runs: i64,
}

pub fn load_match_teams(conn: &Connection, match_id: &str) -> Result<Vec<TeamRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, match_id, display_name, score_text, is_winner
             FROM teams WHERE match_id = ?1 ORDER BY id ASC",
        )
        .context("prepare teams query")?;
    let rows = stmt
        .query_map(params![match_id], |row| {
            Ok(TeamRow {
                id: row.get(0)?,
                match_id: row.get(1)?,
                display_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                score_text: row.get(3)?,
                is_winner: row.get::<_, Option<i64>>(4)?.map(|v| v != 0),
            })
        })
        .context("query teams")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode team row")?);
    }
    Ok(out)
}

pub fn team_name_map(conn: &Connection, match_id: &str) -> Result<HashMap<String, String>> {
    Ok(load_match_teams(conn, match_id)?
        .into_iter()
        .map(|t| (t.id, t.display_name))
        .collect())
}

/// Full delivery set for a match in innings order, then over, then ball
/// display number. Every sequential scan relies on this ordering.
pub fn load_match_deliveries(conn: &Connection, match_id: &str) -> Result<Vec<DeliveryRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                bb.id, bb.innings_id, bb.innings_number, bb.batting_team_id,
                bb.over_number, bb.ball_display_number, bb.progress_wickets,
                bb.bowler_participant_id, bb.bowler_short_name,
                bb.runs_bat, bb.wides, bb.no_balls, bb.leg_byes, bb.byes, bb.penalty_runs
            FROM ball_by_ball bb
            JOIN innings i ON bb.innings_id = i.id
            WHERE i.match_id = ?1
            ORDER BY bb.innings_number ASC, bb.over_number ASC, bb.ball_display_number ASC
            "#,
        )
        .context("prepare deliveries query")?;
    let rows = stmt
        .query_map(params![match_id], |row| {
            Ok(DeliveryRow {
                id: row.get(0)?,
                innings_id: row.get(1)?,
                innings_number: row.get(2)?,
                batting_team_id: row.get(3)?,
                over_number: row.get(4)?,
                ball_display_number: row.get(5)?,
                progress_wickets: row.get(6)?,
                bowler_participant_id: row.get(7)?,
                bowler_short_name: row.get(8)?,
                runs_bat: row.get(9)?,
                wides: row.get(10)?,
                no_balls: row.get(11)?,
                leg_byes: row.get(12)?,
                byes: row.get(13)?,
                penalty_runs: row.get(14)?,
            })
        })
        .context("query deliveries")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode delivery row")?);
    }
    Ok(out)
}

pub fn delivery_count(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM ball_by_ball", [], |row| row.get(0))
        .context("count deliveries")
}

#[derive(Debug, Clone)]
pub struct InningsTotals {
    pub id: String,
    pub name: Option<String>,
    pub close_type: Option<String>,
    pub overs_bowled: f64,
    pub runs_scored: i64,
    pub wickets_fallen: i64,
}

pub fn load_innings_totals(conn: &Connection, innings_id: &str) -> Result<Option<InningsTotals>> {
    conn.query_row(
        "SELECT id, name, innings_close_type, overs_bowled, runs_scored, number_of_wickets_fallen
         FROM innings WHERE id = ?1",
        params![innings_id],
        |row| {
            Ok(InningsTotals {
                id: row.get(0)?,
                name: row.get(1)?,
                close_type: row.get(2)?,
                overs_bowled: row.get(3)?,
                runs_scored: row.get(4)?,
                wickets_fallen: row.get(5)?,
            })
        },
    )
    .optional()
    .context("load innings totals")
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}
