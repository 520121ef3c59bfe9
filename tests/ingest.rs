use std::fs;
use std::path::PathBuf;

use pitchside::ingest::apply_poll;
use pitchside::parse::{BallDoc, BallFeedDoc, InningsFeed, parse_ball_feed_json, parse_match_summary_json};
use pitchside::store;

const MATCH_ID: &str = "0a1b2c3d-0000-4000-8000-000000000001";
const SEASON: &str = "2024/25";

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn seeded_conn() -> rusqlite::Connection {
    let conn = store::open_in_memory().expect("in-memory store");
    let summary = parse_match_summary_json(&read_fixture("match_summary.json")).unwrap();
    let feed = parse_ball_feed_json(&read_fixture("ball_feed.json")).unwrap();
    let outcome = apply_poll(
        &conn,
        Some(&summary),
        &feed,
        MATCH_ID,
        SEASON,
        "2024-11-09T03:42:00Z",
    );
    assert_eq!(outcome.deliveries_inserted, 12);
    conn
}

#[test]
fn first_poll_lands_metadata_and_deliveries() {
    let conn = seeded_conn();

    let teams = store::load_match_teams(&conn, MATCH_ID).unwrap();
    assert_eq!(teams.len(), 2);
    assert_eq!(teams[0].display_name, "Alpha CC");

    assert_eq!(store::delivery_count(&conn).unwrap(), 12);

    let totals = store::load_innings_totals(&conn, "inn-1")
        .unwrap()
        .expect("innings row present");
    assert_eq!(totals.runs_scored, 11);
    assert_eq!(totals.wickets_fallen, 1);
    assert!((totals.overs_bowled - 2.0).abs() < 1e-9);
}

#[test]
fn reingesting_the_same_feed_changes_nothing() {
    let conn = seeded_conn();
    let before: Vec<_> = store::load_match_deliveries(&conn, MATCH_ID)
        .unwrap()
        .into_iter()
        .map(|d| (d.id, d.over_number, d.ball_display_number, d.runs_bat))
        .collect();

    let feed = parse_ball_feed_json(&read_fixture("ball_feed.json")).unwrap();
    let outcome = apply_poll(&conn, None, &feed, MATCH_ID, SEASON, "2024-11-09T03:42:05Z");

    assert_eq!(outcome.deliveries_inserted, 0);
    assert_eq!(outcome.deliveries_skipped, 12);
    assert_eq!(store::delivery_count(&conn).unwrap(), 12);

    let after: Vec<_> = store::load_match_deliveries(&conn, MATCH_ID)
        .unwrap()
        .into_iter()
        .map(|d| (d.id, d.over_number, d.ball_display_number, d.runs_bat))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn superset_poll_appends_and_refreshes_totals_only() {
    let conn = seeded_conn();
    let before: Vec<_> = store::load_match_deliveries(&conn, MATCH_ID)
        .unwrap()
        .into_iter()
        .map(|d| (d.id, d.runs_bat, d.progress_wickets))
        .collect();

    let feed = parse_ball_feed_json(&read_fixture("ball_feed_superset.json")).unwrap();
    let outcome = apply_poll(&conn, None, &feed, MATCH_ID, SEASON, "2024-11-09T03:47:00Z");

    assert_eq!(outcome.deliveries_inserted, 6);
    assert_eq!(outcome.deliveries_skipped, 12);
    assert_eq!(store::delivery_count(&conn).unwrap(), 18);

    // Rows from the first poll are untouched by the overlapping re-feed.
    let after: Vec<_> = store::load_match_deliveries(&conn, MATCH_ID)
        .unwrap()
        .into_iter()
        .map(|d| (d.id, d.runs_bat, d.progress_wickets))
        .collect();
    assert_eq!(&after[..before.len()], before.as_slice());

    let totals = store::load_innings_totals(&conn, "inn-1").unwrap().unwrap();
    assert_eq!(totals.runs_scored, 12);
    assert!((totals.overs_bowled - 3.0).abs() < 1e-9);
}

#[test]
fn deliveries_without_ids_are_dropped_not_stored() {
    let conn = store::open_in_memory().unwrap();
    let feed = BallFeedDoc {
        innings: vec![InningsFeed {
            id: Some("inn-x".to_string()),
            number: Some(1),
            batting_team_id: Some("team-a".to_string()),
            balls: vec![
                BallDoc {
                    id: Some("keep-1".to_string()),
                    runs_bat: Some(1),
                    ..BallDoc::default()
                },
                BallDoc {
                    id: None,
                    runs_bat: Some(4),
                    ..BallDoc::default()
                },
            ],
            ..InningsFeed::default()
        }],
    };
    let outcome = apply_poll(&conn, None, &feed, MATCH_ID, SEASON, "2024-11-09T03:42:00Z");
    assert_eq!(outcome.deliveries_inserted, 1);
    assert_eq!(outcome.deliveries_dropped, 1);
    assert_eq!(store::delivery_count(&conn).unwrap(), 1);
}

#[test]
fn innings_without_ids_are_skipped() {
    let conn = store::open_in_memory().unwrap();
    let feed = BallFeedDoc {
        innings: vec![InningsFeed {
            id: None,
            balls: vec![BallDoc {
                id: Some("orphan-1".to_string()),
                ..BallDoc::default()
            }],
            ..InningsFeed::default()
        }],
    };
    let outcome = apply_poll(&conn, None, &feed, MATCH_ID, SEASON, "2024-11-09T03:42:00Z");
    assert_eq!(outcome.innings_seen, 0);
    assert_eq!(store::delivery_count(&conn).unwrap(), 0);
}

#[test]
fn clear_all_resets_every_table() {
    let conn = seeded_conn();
    store::clear_all(&conn).unwrap();
    assert_eq!(store::delivery_count(&conn).unwrap(), 0);
    assert!(store::load_match_teams(&conn, MATCH_ID).unwrap().is_empty());
    assert!(store::load_innings_totals(&conn, "inn-1").unwrap().is_none());
}
