use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use pitchside::session::{SessionConfig, TrackingSession, poll_interval_from_env};
use pitchside::{fetch, ingest, partnership, phase, store};

const DEFAULT_DB_FILE: &str = "pitchside.db";
const DEFAULT_SEASON: &str = "2024/25";
const REPORT_TOP_N: usize = 3;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let url = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .ok_or_else(|| anyhow!("no match URL given"))?;
    let match_id = fetch::extract_match_id(url).ok_or_else(|| {
        anyhow!("could not extract a match id from {url:?} (expected a /match/<id>/ segment)")
    })?;

    let db_path = flag_value(&args, "--db")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));
    let season = flag_value(&args, "--season").unwrap_or_else(|| DEFAULT_SEASON.to_string());
    let once = args.iter().any(|a| a == "--once");

    if once {
        let mut conn = store::open_db(&db_path)?;
        let outcome = ingest::poll_once(&mut conn, &match_id, &season)?;
        println!(
            "Ingested {} new deliveries ({} already stored) across {} innings",
            outcome.deliveries_inserted, outcome.deliveries_skipped, outcome.innings_seen
        );
        print_report(&conn, &match_id)?;
        return Ok(());
    }

    let mut config = SessionConfig::new(db_path.clone(), match_id.clone(), season);
    if let Some(secs) = flag_value(&args, "--poll-secs").and_then(|v| v.parse::<u64>().ok()) {
        config.poll_interval = std::time::Duration::from_secs(secs.max(1));
    } else {
        config.poll_interval = poll_interval_from_env();
    }

    let session = TrackingSession::start(config).context("failed to start live tracking")?;
    println!("Tracking match {match_id}. Press Enter to stop.");

    let stdin = std::io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line).ok();

    // Print the final report before stop() clears the store.
    {
        let conn = store::open_db(&db_path)?;
        print_report(&conn, &match_id)?;
    }
    session.stop()?;
    Ok(())
}

fn print_report(conn: &rusqlite::Connection, match_id: &str) -> Result<()> {
    let teams = store::team_name_map(conn, match_id)?;
    let deliveries = store::load_match_deliveries(conn, match_id)?;
    println!(
        "\nMatch {match_id}: {} teams, {} deliveries stored",
        teams.len(),
        deliveries.len()
    );

    print_kpi_table("Batting KPIs", &phase::batting_phase_kpis(&deliveries, &teams));
    print_kpi_table("Bowling KPIs", &phase::bowling_phase_kpis(&deliveries, &teams));

    let segments = partnership::segment_deliveries(&deliveries);
    let pairs = partnership::aggregate_pairs(&segments);
    let ranked = partnership::rank_partnerships(&pairs);
    if ranked.is_empty() {
        println!("\nNo closed bowling partnerships yet.");
        return Ok(());
    }

    println!("\nBest bowling partnerships");
    for entry in partnership::best_partnerships(&ranked, REPORT_TOP_N) {
        print_partnership(entry);
    }
    println!("\nWorst bowling partnerships");
    for entry in partnership::worst_partnerships(&ranked, REPORT_TOP_N) {
        print_partnership(&entry);
    }
    Ok(())
}

fn print_kpi_table(title: &str, rows: &[phase::KpiRow]) {
    if rows.is_empty() {
        println!("\n{title}: no data yet");
        return;
    }
    println!("\n{title}");
    for row in rows {
        let team = if row.team_name.is_empty() {
            row.team_id.as_str()
        } else {
            row.team_name.as_str()
        };
        println!(
            "  {:<24} {:<10} {:<28} {:>8.2}",
            team,
            row.phase.label(),
            row.metric,
            row.value
        );
    }
}

fn print_partnership(entry: &partnership::RankedPartnership) {
    println!(
        "  {:<28} score={:.3} wickets={} dot%={:.1} economy={:.2} balls={}",
        entry.stats.label(),
        entry.composite,
        entry.stats.wickets,
        entry.stats.dot_ball_pct(),
        entry.stats.economy_rate(),
        entry.stats.balls
    );
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&format!("{flag}=")) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag {
            let next = args.get(idx + 1)?;
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}

fn print_usage() {
    println!("pitchside: live cricket ball-by-ball tracker");
    println!();
    println!("Usage: pitchside <match-url> [--db PATH] [--season NAME] [--poll-secs N] [--once]");
    println!();
    println!("  <match-url>    scorecard URL containing a /match/<id>/ segment");
    println!("  --db PATH      sqlite database file (default: {DEFAULT_DB_FILE})");
    println!("  --season NAME  season tag stored on the match row (default: {DEFAULT_SEASON})");
    println!("  --poll-secs N  live poll cadence in seconds (default: 5)");
    println!("  --once         single poll + report instead of live tracking");
}
