use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::fetch;
use crate::parse::{BallFeedDoc, InningsFeed, MatchSummaryDoc};
use crate::store;

/// Counters from one poll cycle, for logging and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollOutcome {
    pub innings_seen: usize,
    pub deliveries_inserted: usize,
    pub deliveries_skipped: usize,
    pub deliveries_dropped: usize,
}

/// Fan-out upsert of everything the match summary document references.
///
/// Each sub-entity is fault-isolated: a malformed venue must not stop the
/// teams or players from landing. Errors are logged and swallowed here; the
/// enclosing poll transaction still rolls back as a whole if it fails to
/// commit.
pub fn ingest_match_metadata(
    conn: &Connection,
    doc: &MatchSummaryDoc,
    match_id: &str,
    season: &str,
) {
    if let Some(round) = &doc.round
        && let Err(err) = store::insert_round_if_absent(conn, round)
    {
        warn!(match_id, "round insert failed: {err:#}");
    }
    if let Some(grade) = &doc.grade
        && let Err(err) = store::insert_grade_if_absent(conn, grade)
    {
        warn!(match_id, "grade insert failed: {err:#}");
    }
    if let Some(venue) = &doc.venue {
        if let Some(surface) = &venue.playing_surface
            && let Err(err) = store::insert_surface_if_absent(conn, surface)
        {
            warn!(match_id, "playing surface insert failed: {err:#}");
        }
        if let Err(err) = store::insert_venue_if_absent(conn, venue) {
            warn!(match_id, "venue insert failed: {err:#}");
        }
    }
    if let Err(err) = store::insert_match_if_absent(conn, match_id, season, doc) {
        warn!(match_id, "match insert failed: {err:#}");
    }
    for team in &doc.teams {
        if let Err(err) = store::insert_team_if_absent(conn, match_id, team) {
            warn!(match_id, team_id = %team.id, "team insert failed: {err:#}");
            continue;
        }
        for player in &team.players {
            if let Err(err) = store::insert_player_if_absent(conn, &team.id, player) {
                warn!(player_id = %player.id, "player insert failed: {err:#}");
            }
        }
    }
    // Innings shells occasionally ride along with the summary document.
    for inn in &doc.innings {
        if let Err(err) = store::insert_innings_if_absent(conn, match_id, inn) {
            warn!(match_id, "innings shell insert failed: {err:#}");
        }
    }
}

/// Insert every not-yet-seen delivery of one innings. A delivery whose id is
/// already stored is left untouched, so re-ingesting an overlapping feed is a
/// no-op for those rows. A delivery without an id cannot be deduplicated and
/// is dropped with a warning.
pub fn ingest_deliveries(
    conn: &Connection,
    inn: &InningsFeed,
    fetched_at: &str,
    outcome: &mut PollOutcome,
) {
    for ball in &inn.balls {
        let Some(ball_id) = ball.id.as_deref() else {
            warn!("delivery without id in feed, dropping");
            outcome.deliveries_dropped += 1;
            continue;
        };
        match store::delivery_exists(conn, ball_id) {
            Ok(true) => {
                outcome.deliveries_skipped += 1;
            }
            Ok(false) => match store::insert_delivery(conn, ball_id, inn, ball, fetched_at) {
                Ok(()) => {
                    debug!(ball_id, "stored new delivery");
                    outcome.deliveries_inserted += 1;
                }
                Err(err) => {
                    warn!(ball_id, "delivery insert failed: {err:#}");
                    outcome.deliveries_dropped += 1;
                }
            },
            Err(err) => {
                warn!(ball_id, "delivery existence check failed: {err:#}");
                outcome.deliveries_dropped += 1;
            }
        }
    }
}

/// Refresh the mutable innings fields from the latest feed snapshot.
pub fn refresh_innings_summary(conn: &Connection, inn: &InningsFeed) {
    match store::update_innings_summary(conn, inn) {
        Ok(0) => debug!(innings_id = ?inn.id, "innings summary update matched no row"),
        Ok(_) => {}
        Err(err) => warn!(innings_id = ?inn.id, "innings summary update failed: {err:#}"),
    }
}

/// Apply one already-fetched poll payload to the store. Split out of
/// [`poll_once`] so tests can drive fixture documents through the exact
/// ingestion path without a network.
pub fn apply_poll(
    conn: &Connection,
    summary: Option<&MatchSummaryDoc>,
    feed: &BallFeedDoc,
    match_id: &str,
    season: &str,
    fetched_at: &str,
) -> PollOutcome {
    let mut outcome = PollOutcome::default();

    if let Some(doc) = summary {
        ingest_match_metadata(conn, doc, match_id, season);
    }

    for inn in &feed.innings {
        if inn.id.is_none() {
            warn!(match_id, "innings without id in feed, skipping");
            continue;
        }
        outcome.innings_seen += 1;
        // Innings row must exist before its deliveries reference it.
        if let Err(err) = store::insert_innings_if_absent(conn, match_id, inn) {
            warn!(match_id, innings_id = ?inn.id, "innings insert failed: {err:#}");
            continue;
        }
        refresh_innings_summary(conn, inn);
        ingest_deliveries(conn, inn, fetched_at, &mut outcome);
    }

    outcome
}

/// One live-poll cycle: fetch both provider documents and merge them into the
/// store inside a single transaction.
///
/// A fetch failure is not an error (the feed flaps routinely mid-match); it
/// downgrades to "no update this cycle" and the next poll retries. The
/// existence checks make a retried poll resume exactly where the rolled-back
/// one stopped.
pub fn poll_once(conn: &mut Connection, match_id: &str, season: &str) -> Result<PollOutcome> {
    let summary = match fetch::fetch_match_summary(match_id) {
        Ok(doc) => Some(doc),
        Err(err) => {
            warn!(match_id, "match summary fetch failed: {err:#}");
            None
        }
    };
    let feed = match fetch::fetch_ball_feed(match_id) {
        Ok(feed) => feed,
        Err(err) => {
            warn!(match_id, "ball feed fetch failed, no update this cycle: {err:#}");
            return Ok(PollOutcome::default());
        }
    };
    if feed.innings.is_empty() {
        debug!(match_id, "ball feed empty, no update this cycle");
    }

    let fetched_at = Utc::now().to_rfc3339();
    let tx = conn.transaction().context("begin poll transaction")?;
    let outcome = apply_poll(&tx, summary.as_ref(), &feed, match_id, season, &fetched_at);
    tx.commit().context("commit poll transaction")?;

    info!(
        match_id,
        innings = outcome.innings_seen,
        inserted = outcome.deliveries_inserted,
        skipped = outcome.deliveries_skipped,
        "poll cycle committed"
    );
    Ok(outcome)
}
