use anyhow::{Context, Result};
use serde_json::Value;

/// Match metadata document: the `scores/matches/{id}` payload reduced to the
/// fields the store keeps. Everything is optional; the provider omits whole
/// sub-documents while a match is still being set up.
#[derive(Debug, Clone, Default)]
pub struct MatchSummaryDoc {
    pub status: Option<String>,
    pub status_id: Option<i64>,
    pub match_type: Option<String>,
    pub match_type_id: Option<i64>,
    pub is_ball_by_ball: Option<bool>,
    pub result_text: Option<String>,
    pub start_datetime: Option<String>,
    pub round: Option<RoundDoc>,
    pub grade: Option<GradeDoc>,
    pub venue: Option<VenueDoc>,
    pub teams: Vec<TeamDoc>,
    pub innings: Vec<InningsFeed>,
}

#[derive(Debug, Clone)]
pub struct RoundDoc {
    pub id: String,
    pub name: Option<String>,
    pub short_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GradeDoc {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VenueDoc {
    pub id: String,
    pub name: Option<String>,
    pub line1: Option<String>,
    pub suburb: Option<String>,
    pub post_code: Option<String>,
    pub state_name: Option<String>,
    pub country: Option<String>,
    pub playing_surface: Option<SurfaceDoc>,
}

#[derive(Debug, Clone)]
pub struct SurfaceDoc {
    pub id: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TeamDoc {
    pub id: String,
    pub display_name: Option<String>,
    pub result_type_id: Option<i64>,
    pub result_type: Option<String>,
    pub won_toss: Option<bool>,
    pub batted_first: Option<bool>,
    pub is_home: Option<bool>,
    pub score_text: Option<String>,
    pub is_winner: Option<bool>,
    pub players: Vec<PlayerDoc>,
}

#[derive(Debug, Clone)]
pub struct PlayerDoc {
    pub id: String,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub role: Option<String>,
}

/// Ball-list document: `scores/matches/{id}/balls`, one entry per innings.
#[derive(Debug, Clone, Default)]
pub struct BallFeedDoc {
    pub innings: Vec<InningsFeed>,
}

/// One innings as the feed reports it: the metadata snapshot that gets
/// denormalized onto every stored delivery, plus the delivery list itself.
#[derive(Debug, Clone, Default)]
pub struct InningsFeed {
    pub id: Option<String>,
    pub name: Option<String>,
    pub close_type: Option<String>,
    pub number: Option<i64>,
    pub order: Option<i64>,
    pub batting_team_id: Option<String>,
    pub is_declared: Option<bool>,
    pub is_follow_on: Option<bool>,
    pub byes_runs: Option<i64>,
    pub leg_byes_runs: Option<i64>,
    pub no_balls: Option<i64>,
    pub wide_balls: Option<i64>,
    pub penalties: Option<i64>,
    pub total_extras: Option<i64>,
    pub overs_bowled: Option<f64>,
    pub runs_scored: Option<i64>,
    pub wickets_fallen: Option<i64>,
    pub balls: Vec<BallDoc>,
}

/// One delivery event. Immutable once stored; the id is the dedup key.
#[derive(Debug, Clone, Default)]
pub struct BallDoc {
    pub id: Option<String>,
    pub progress_runs: Option<i64>,
    pub progress_wickets: Option<i64>,
    pub progress_score: Option<String>,
    pub striker_participant_id: Option<String>,
    pub striker_short_name: Option<String>,
    pub striker_runs_scored: Option<i64>,
    pub striker_balls_faced: Option<i64>,
    pub non_striker_participant_id: Option<String>,
    pub non_striker_short_name: Option<String>,
    pub non_striker_runs_scored: Option<i64>,
    pub non_striker_balls_faced: Option<i64>,
    pub bowler_participant_id: Option<String>,
    pub bowler_short_name: Option<String>,
    pub over_number: Option<i64>,
    pub ball_display_number: Option<i64>,
    pub ball_time: Option<String>,
    pub runs_bat: Option<i64>,
    pub wides: Option<i64>,
    pub no_balls: Option<i64>,
    pub leg_byes: Option<i64>,
    pub byes: Option<i64>,
    pub penalty_runs: Option<i64>,
    pub short_description: Option<String>,
    pub description: Option<String>,
}

pub fn parse_match_summary_json(raw: &str) -> Result<MatchSummaryDoc> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(MatchSummaryDoc::default());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid match summary json")?;
    Ok(build_match_summary(&root))
}

pub fn parse_ball_feed_json(raw: &str) -> Result<BallFeedDoc> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(BallFeedDoc::default());
    }
    let root: Value = serde_json::from_str(trimmed).context("invalid ball feed json")?;
    Ok(BallFeedDoc {
        innings: parse_innings_list(root.get("innings")),
    })
}

fn build_match_summary(root: &Value) -> MatchSummaryDoc {
    MatchSummaryDoc {
        status: pick_string(root, &["status"]),
        status_id: root.get("statusId").and_then(as_i64_any),
        match_type: pick_string(root, &["matchType"]),
        match_type_id: root.get("matchTypeId").and_then(as_i64_any),
        is_ball_by_ball: root.get("isBallByBall").and_then(as_bool_any),
        result_text: pick_string(root, &["resultText"]),
        start_datetime: pick_string(root, &["startDateTime", "startDatetime"]),
        round: root.get("round").and_then(parse_round),
        grade: root.get("grade").and_then(parse_grade),
        venue: root.get("venue").and_then(parse_venue),
        teams: root
            .get("teams")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(parse_team).collect())
            .unwrap_or_default(),
        innings: parse_innings_list(root.get("innings")),
    }
}

fn parse_round(v: &Value) -> Option<RoundDoc> {
    Some(RoundDoc {
        id: require_id(v)?,
        name: pick_string(v, &["name"]),
        short_name: pick_string(v, &["shortName"]),
    })
}

fn parse_grade(v: &Value) -> Option<GradeDoc> {
    Some(GradeDoc {
        id: require_id(v)?,
        name: pick_string(v, &["name"]),
    })
}

fn parse_venue(v: &Value) -> Option<VenueDoc> {
    Some(VenueDoc {
        id: require_id(v)?,
        name: pick_string(v, &["name"]),
        line1: pick_string(v, &["line1"]),
        suburb: pick_string(v, &["suburb"]),
        post_code: pick_string(v, &["postCode"]),
        state_name: pick_string(v, &["stateName"]),
        country: pick_string(v, &["country"]),
        playing_surface: v.get("playingSurface").and_then(parse_surface),
    })
}

fn parse_surface(v: &Value) -> Option<SurfaceDoc> {
    Some(SurfaceDoc {
        id: require_id(v)?,
        name: pick_string(v, &["name"]),
        latitude: v.get("latitude").and_then(as_f64_any),
        longitude: v.get("longitude").and_then(as_f64_any),
    })
}

fn parse_team(v: &Value) -> Option<TeamDoc> {
    Some(TeamDoc {
        id: require_id(v)?,
        display_name: pick_string(v, &["displayName", "name"]),
        result_type_id: v.get("resultTypeId").and_then(as_i64_any),
        result_type: pick_string(v, &["resultType"]),
        won_toss: v.get("wonToss").and_then(as_bool_any),
        batted_first: v.get("battedFirst").and_then(as_bool_any),
        is_home: v.get("isHome").and_then(as_bool_any),
        score_text: pick_string(v, &["scoreText"]),
        is_winner: v.get("isWinner").and_then(as_bool_any),
        players: v
            .get("players")
            .and_then(|p| p.as_array())
            .map(|arr| arr.iter().filter_map(parse_player).collect())
            .unwrap_or_default(),
    })
}

fn parse_player(v: &Value) -> Option<PlayerDoc> {
    Some(PlayerDoc {
        id: require_id(v)?,
        name: pick_string(v, &["name"]),
        short_name: pick_string(v, &["shortName"]),
        role: pick_string(v, &["role", "roles"]),
    })
}

fn parse_innings_list(v: Option<&Value>) -> Vec<InningsFeed> {
    v.and_then(|v| v.as_array())
        .map(|arr| arr.iter().map(parse_innings).collect())
        .unwrap_or_default()
}

fn parse_innings(v: &Value) -> InningsFeed {
    InningsFeed {
        id: pick_string(v, &["id"]),
        name: pick_string(v, &["inningsName", "name"]),
        close_type: pick_string(v, &["inningsCloseType"]),
        number: v.get("inningsNumber").and_then(as_i64_any),
        order: v.get("inningsOrder").and_then(as_i64_any),
        batting_team_id: pick_string(v, &["battingTeamId"]),
        is_declared: v.get("isDeclared").and_then(as_bool_any),
        is_follow_on: v.get("isFollowOn").and_then(as_bool_any),
        byes_runs: v.get("byesRuns").and_then(as_i64_any),
        leg_byes_runs: v.get("legByesRuns").and_then(as_i64_any),
        no_balls: v.get("noBalls").and_then(as_i64_any),
        wide_balls: v.get("wideBalls").and_then(as_i64_any),
        penalties: v.get("penalties").and_then(as_i64_any),
        total_extras: v.get("totalExtras").and_then(as_i64_any),
        overs_bowled: v.get("oversBowled").and_then(as_f64_any),
        runs_scored: v.get("runsScored").and_then(as_i64_any),
        wickets_fallen: v.get("numberOfWicketsFallen").and_then(as_i64_any),
        balls: v
            .get("balls")
            .and_then(|b| b.as_array())
            .map(|arr| arr.iter().map(parse_ball).collect())
            .unwrap_or_default(),
    }
}

fn parse_ball(v: &Value) -> BallDoc {
    BallDoc {
        id: pick_string(v, &["id"]),
        progress_runs: v.get("progressRuns").and_then(as_i64_any),
        progress_wickets: v.get("progressWickets").and_then(as_i64_any),
        progress_score: pick_string(v, &["progressScore"]),
        striker_participant_id: pick_string(v, &["strikerParticipantId"]),
        striker_short_name: pick_string(v, &["strikerShortName"]),
        striker_runs_scored: v.get("strikerRunsScored").and_then(as_i64_any),
        striker_balls_faced: v.get("strikerBallsFaced").and_then(as_i64_any),
        non_striker_participant_id: pick_string(v, &["nonStrikerParticipantId"]),
        non_striker_short_name: pick_string(v, &["nonStrikerShortName"]),
        non_striker_runs_scored: v.get("nonStrikerRunsScored").and_then(as_i64_any),
        non_striker_balls_faced: v.get("nonStrikerBallsFaced").and_then(as_i64_any),
        bowler_participant_id: pick_string(v, &["bowlerParticipantId"]),
        bowler_short_name: pick_string(v, &["bowlerShortName"]),
        over_number: v.get("overNumber").and_then(as_i64_any),
        ball_display_number: v.get("ballDisplayNumber").and_then(as_i64_any),
        ball_time: pick_string(v, &["ballTime"]),
        runs_bat: v.get("runsBat").and_then(as_i64_any),
        wides: v.get("wides").and_then(as_i64_any),
        no_balls: v.get("noBalls").and_then(as_i64_any),
        leg_byes: v.get("legByes").and_then(as_i64_any),
        byes: v.get("byes").and_then(as_i64_any),
        penalty_runs: v.get("penaltyRuns").and_then(as_i64_any),
        short_description: pick_string(v, &["shortDescription"]),
        description: pick_string(v, &["description"]),
    }
}

// Entities without a stable id cannot be keyed in the store; the whole
// sub-document is dropped rather than invented.
fn require_id(v: &Value) -> Option<String> {
    pick_string(v, &["id"])
}

fn pick_string(v: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        let Some(val) = v.get(*key) else {
            continue;
        };
        if let Some(s) = val.as_str() {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
            continue;
        }
        if let Some(n) = val.as_i64() {
            return Some(n.to_string());
        }
    }
    None
}

fn as_i64_any(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(f) = v.as_f64() {
        return Some(f as i64);
    }
    v.as_str()?.trim().parse::<i64>().ok()
}

fn as_f64_any(v: &Value) -> Option<f64> {
    if let Some(f) = v.as_f64() {
        return Some(f);
    }
    v.as_str()?.trim().parse::<f64>().ok()
}

fn as_bool_any(v: &Value) -> Option<bool> {
    if let Some(b) = v.as_bool() {
        return Some(b);
    }
    if let Some(n) = v.as_i64() {
        return Some(n != 0);
    }
    match v.as_str()?.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_documents_parse_empty() {
        assert!(parse_match_summary_json("null").unwrap().teams.is_empty());
        assert!(parse_ball_feed_json("").unwrap().innings.is_empty());
    }

    #[test]
    fn tolerant_coercions() {
        let v: Value = serde_json::from_str(r#"{"a": "7", "b": 1, "c": "true"}"#).unwrap();
        assert_eq!(v.get("a").and_then(as_i64_any), Some(7));
        assert_eq!(v.get("b").and_then(as_bool_any), Some(true));
        assert_eq!(v.get("c").and_then(as_bool_any), Some(true));
        assert_eq!(v.get("missing").and_then(as_i64_any), None);
    }

    #[test]
    fn ball_with_wrong_types_still_parses() {
        let v: Value = serde_json::from_str(
            r#"{"id": "b1", "runsBat": "4", "wides": null, "overNumber": 3.0}"#,
        )
        .unwrap();
        let ball = parse_ball(&v);
        assert_eq!(ball.id.as_deref(), Some("b1"));
        assert_eq!(ball.runs_bat, Some(4));
        assert_eq!(ball.wides, None);
        assert_eq!(ball.over_number, Some(3));
    }
}
