use std::fs;
use std::path::PathBuf;

use pitchside::parse::{parse_ball_feed_json, parse_match_summary_json};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_match_summary_fixture() {
    let raw = read_fixture("match_summary.json");
    let doc = parse_match_summary_json(&raw).expect("fixture should parse");

    assert_eq!(doc.status.as_deref(), Some("In Progress"));
    assert_eq!(doc.status_id, Some(2));
    assert_eq!(doc.match_type.as_deref(), Some("T20"));
    assert_eq!(doc.is_ball_by_ball, Some(true));
    assert_eq!(doc.result_text, None);

    let round = doc.round.as_ref().expect("round present");
    assert_eq!(round.id, "round-5");
    assert_eq!(round.short_name.as_deref(), Some("R5"));
    assert_eq!(doc.grade.as_ref().map(|g| g.id.as_str()), Some("grade-1"));

    let venue = doc.venue.as_ref().expect("venue present");
    assert_eq!(venue.id, "venue-9");
    assert_eq!(venue.suburb.as_deref(), Some("Northgate"));
    let surface = venue.playing_surface.as_ref().expect("surface present");
    assert_eq!(surface.id, "surface-9a");
    assert!(surface.latitude.is_some_and(|lat| lat < 0.0));

    assert_eq!(doc.teams.len(), 2);
    assert_eq!(doc.teams[0].id, "team-a");
    assert_eq!(doc.teams[0].display_name.as_deref(), Some("Alpha CC"));
    assert_eq!(doc.teams[0].won_toss, Some(true));
    assert_eq!(doc.teams[0].players.len(), 2);
    assert_eq!(doc.teams[1].players[0].short_name.as_deref(), Some("A Singh"));
}

#[test]
fn parses_ball_feed_fixture() {
    let raw = read_fixture("ball_feed.json");
    let feed = parse_ball_feed_json(&raw).expect("fixture should parse");

    assert_eq!(feed.innings.len(), 1);
    let inn = &feed.innings[0];
    assert_eq!(inn.id.as_deref(), Some("inn-1"));
    assert_eq!(inn.number, Some(1));
    assert_eq!(inn.batting_team_id.as_deref(), Some("team-a"));
    assert_eq!(inn.runs_scored, Some(11));
    assert_eq!(inn.wickets_fallen, Some(1));
    assert_eq!(inn.balls.len(), 12);

    let first = &inn.balls[0];
    assert_eq!(first.id.as_deref(), Some("b-001"));
    assert_eq!(first.runs_bat, Some(6));
    assert_eq!(first.over_number, Some(0));
    assert_eq!(first.ball_display_number, Some(1));
    assert_eq!(first.bowler_participant_id.as_deref(), Some("p-b1"));

    let wicket_ball = &inn.balls[7];
    assert_eq!(wicket_ball.id.as_deref(), Some("b-008"));
    assert_eq!(wicket_ball.progress_wickets, Some(1));
}

#[test]
fn superset_feed_extends_the_base_feed() {
    let base = parse_ball_feed_json(&read_fixture("ball_feed.json")).unwrap();
    let superset = parse_ball_feed_json(&read_fixture("ball_feed_superset.json")).unwrap();

    let base_ids: Vec<_> = base.innings[0].balls.iter().filter_map(|b| b.id.clone()).collect();
    let superset_ids: Vec<_> = superset.innings[0]
        .balls
        .iter()
        .filter_map(|b| b.id.clone())
        .collect();
    assert_eq!(superset_ids.len(), 18);
    assert_eq!(&superset_ids[..base_ids.len()], base_ids.as_slice());
    assert_eq!(superset.innings[0].overs_bowled, Some(3.0));
}

#[test]
fn null_and_empty_documents_parse_empty() {
    assert!(parse_match_summary_json("null").unwrap().teams.is_empty());
    assert!(parse_match_summary_json("  ").unwrap().venue.is_none());
    assert!(parse_ball_feed_json("null").unwrap().innings.is_empty());
}
