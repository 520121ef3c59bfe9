use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, ORIGIN, REFERER, USER_AGENT};

use crate::http_client::http_client;
use crate::parse::{self, BallFeedDoc, MatchSummaryDoc};

const API_BASE_URL: &str = "https://grassrootsapiproxy.cricket.com.au/scores";
const SITE_ORIGIN: &str = "https://play.cricket.com.au";

/// Extract the match identifier from a scorecard URL. The id is the
/// dash-separated hex segment after `/match/`, e.g.
/// `https://play.cricket.com.au/match/0af2...-9c/scorecard`.
pub fn extract_match_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/match/")?;
    let id = rest.split('/').next()?.trim();
    if id.is_empty() {
        return None;
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase() || c == '-')
    {
        return None;
    }
    Some(id.to_string())
}

pub fn fetch_match_summary(match_id: &str) -> Result<MatchSummaryDoc> {
    let url = format!("{API_BASE_URL}/matches/{match_id}?jsconfig=eccn%3Atrue");
    let body = fetch_body(&url)?;
    parse::parse_match_summary_json(&body)
}

pub fn fetch_ball_feed(match_id: &str) -> Result<BallFeedDoc> {
    let url = format!("{API_BASE_URL}/matches/{match_id}/balls?jsconfig=eccn%3Atrue");
    let body = fetch_body(&url)?;
    parse::parse_ball_feed_json(&body)
}

fn fetch_body(url: &str) -> Result<String> {
    let client = http_client()?;
    let resp = client
        .get(url)
        .header(USER_AGENT, "Mozilla/5.0")
        .header(ACCEPT, "*/*")
        .header(ORIGIN, SITE_ORIGIN)
        .header(REFERER, format!("{SITE_ORIGIN}/"))
        .send()
        .context("request failed")?;
    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }
    Ok(body)
}
