use std::collections::HashMap;

use tracing::warn;

use crate::store::DeliveryRow;

/// Match phases bucketed by over number. One policy only: the historical
/// queries once used a 0-9/10-39 split while the live view used 0-10/11-40;
/// the latter is the convention kept here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Powerplay,
    Middle,
    Death,
}

pub const POWERPLAY_LAST_OVER: i64 = 10;
pub const MIDDLE_LAST_OVER: i64 = 40;

impl Phase {
    pub fn of_over(over_number: i64) -> Phase {
        if over_number <= POWERPLAY_LAST_OVER {
            Phase::Powerplay
        } else if over_number <= MIDDLE_LAST_OVER {
            Phase::Middle
        } else {
            Phase::Death
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Powerplay => "Powerplay",
            Phase::Middle => "Middle",
            Phase::Death => "Death",
        }
    }
}

/// One KPI value for one team in one phase.
#[derive(Debug, Clone, PartialEq)]
pub struct KpiRow {
    pub team_id: String,
    pub team_name: String,
    pub phase: Phase,
    pub metric: &'static str,
    pub value: f64,
}

pub const METRIC_DOT_BALLS: &str = "Dot Balls %";
pub const METRIC_SINGLES: &str = "Singles %";
pub const METRIC_BOUNDARIES: &str = "Boundaries %";
pub const METRIC_BOUNDARIES_FL: &str = "Boundaries (First & Last) %";
pub const METRIC_STRIKE_RATE: &str = "Strike Rate";
pub const METRIC_RUN_RATE: &str = "Run Rate";
pub const METRIC_WICKETS_LOST: &str = "Wickets Lost";
pub const METRIC_ECONOMY_RATE: &str = "Economy Rate";

/// Per-delivery wicket indicator: 1 where `progress_wickets` rose relative to
/// the previous delivery of the same innings. The first delivery of an
/// innings has no predecessor; its own counter is taken as the evidence.
/// Input must already be in innings/over/ball order (see
/// `store::load_match_deliveries`).
pub fn wicket_indicators(deliveries: &[DeliveryRow]) -> Vec<i64> {
    let mut out = Vec::with_capacity(deliveries.len());
    let mut prev: Option<(&str, i64)> = None;
    for d in deliveries {
        let fell = match prev {
            Some((innings_id, prev_wickets)) if innings_id == d.innings_id => {
                (d.progress_wickets - prev_wickets).max(0)
            }
            // New innings: no previous row to diff against.
            _ => d.progress_wickets.max(0),
        };
        out.push(fell);
        prev = Some((d.innings_id.as_str(), d.progress_wickets));
    }
    out
}

#[derive(Debug, Default, Clone)]
struct PhaseBucket {
    balls: i64,
    dots: i64,
    singles: i64,
    boundaries: i64,
    boundaries_fl: i64,
    bat_runs: i64,
    total_runs: i64,
    legal_balls: i64,
    runs_conceded: i64,
    wickets: i64,
}

impl PhaseBucket {
    fn add(&mut self, d: &DeliveryRow, wicket_fell: i64) {
        self.balls += 1;
        if d.runs_bat == 0 && d.wides == 0 && d.no_balls == 0 {
            self.dots += 1;
        }
        if d.runs_bat == 1 {
            self.singles += 1;
        }
        if d.runs_bat == 4 || d.runs_bat == 6 {
            self.boundaries += 1;
            if d.ball_display_number == 1 || d.ball_display_number == 6 {
                self.boundaries_fl += 1;
            }
        }
        self.bat_runs += d.runs_bat;
        self.total_runs += d.runs_bat + d.wides + d.no_balls + d.leg_byes + d.byes + d.penalty_runs;
        if d.wides == 0 && d.no_balls == 0 {
            self.legal_balls += 1;
        }
        self.runs_conceded += d.runs_bat + d.wides + d.no_balls;
        self.wickets += wicket_fell;
    }

    fn pct(&self, count: i64) -> f64 {
        if self.balls == 0 {
            0.0
        } else {
            count as f64 / self.balls as f64 * 100.0
        }
    }

    fn strike_rate(&self) -> f64 {
        if self.balls == 0 {
            0.0
        } else {
            self.bat_runs as f64 / self.balls as f64 * 100.0
        }
    }

    fn run_rate(&self) -> f64 {
        if self.legal_balls == 0 {
            return 0.0;
        }
        let legal_overs = self.legal_balls as f64 / 6.0;
        self.total_runs as f64 / legal_overs
    }

    fn economy_rate(&self) -> f64 {
        if self.balls == 0 {
            0.0
        } else {
            self.runs_conceded as f64 / self.balls as f64 * 6.0
        }
    }
}

/// Batting KPIs per (team, phase), recomputed in full from the delivery set.
/// Empty input yields an empty vec.
pub fn batting_phase_kpis(
    deliveries: &[DeliveryRow],
    team_names: &HashMap<String, String>,
) -> Vec<KpiRow> {
    let wickets = wicket_indicators(deliveries);
    let mut buckets: HashMap<(String, Phase), PhaseBucket> = HashMap::new();
    for (d, fell) in deliveries.iter().zip(&wickets) {
        let Some(team_id) = d.batting_team_id.as_deref() else {
            continue;
        };
        buckets
            .entry((team_id.to_string(), Phase::of_over(d.over_number)))
            .or_default()
            .add(d, *fell);
    }
    emit_rows(buckets, team_names, Side::Batting)
}

/// Bowling-side mirror of the phase KPIs. The bowling team for a delivery is
/// "the other team" of the match; anything but exactly two teams degrades to
/// best-effort attribution with a warning.
pub fn bowling_phase_kpis(
    deliveries: &[DeliveryRow],
    team_names: &HashMap<String, String>,
) -> Vec<KpiRow> {
    if !deliveries.is_empty() && team_names.len() != 2 {
        warn!(
            teams = team_names.len(),
            "expected exactly 2 teams for bowling attribution, output is best-effort"
        );
    }
    let mut buckets: HashMap<(String, Phase), PhaseBucket> = HashMap::new();
    for d in deliveries {
        let Some(batting_id) = d.batting_team_id.as_deref() else {
            continue;
        };
        let Some(bowling_id) = other_team(team_names, batting_id) else {
            continue;
        };
        buckets
            .entry((bowling_id.to_string(), Phase::of_over(d.over_number)))
            .or_default()
            .add(d, 0);
    }
    emit_rows(buckets, team_names, Side::Bowling)
}

fn other_team<'a>(team_names: &'a HashMap<String, String>, batting_id: &str) -> Option<&'a str> {
    let mut ids: Vec<&str> = team_names
        .keys()
        .map(|k| k.as_str())
        .filter(|id| *id != batting_id)
        .collect();
    ids.sort_unstable();
    ids.first().copied()
}

enum Side {
    Batting,
    Bowling,
}

fn emit_rows(
    buckets: HashMap<(String, Phase), PhaseBucket>,
    team_names: &HashMap<String, String>,
    side: Side,
) -> Vec<KpiRow> {
    let mut keys: Vec<(String, Phase)> = buckets.keys().cloned().collect();
    keys.sort();

    let mut out = Vec::new();
    for (team_id, phase) in keys {
        let bucket = &buckets[&(team_id.clone(), phase)];
        let team_name = team_names.get(&team_id).cloned().unwrap_or_default();
        let mut push = |metric: &'static str, value: f64| {
            out.push(KpiRow {
                team_id: team_id.clone(),
                team_name: team_name.clone(),
                phase,
                metric,
                value,
            });
        };
        push(METRIC_DOT_BALLS, bucket.pct(bucket.dots));
        push(METRIC_SINGLES, bucket.pct(bucket.singles));
        push(METRIC_BOUNDARIES, bucket.pct(bucket.boundaries));
        push(METRIC_BOUNDARIES_FL, bucket.pct(bucket.boundaries_fl));
        match side {
            Side::Batting => {
                push(METRIC_STRIKE_RATE, bucket.strike_rate());
                push(METRIC_RUN_RATE, bucket.run_rate());
                push(METRIC_WICKETS_LOST, bucket.wickets as f64);
            }
            Side::Bowling => {
                push(METRIC_ECONOMY_RATE, bucket.economy_rate());
            }
        }
    }
    out
}
