use std::collections::BTreeMap;

use crate::store::DeliveryRow;

/// A contiguous run of deliveries closed at a bowler change. The transition
/// ball belongs to both the segment it closes and the one it opens, so
/// consecutive segments overlap by one delivery. The trailing spell of an
/// innings never sees a change and is therefore never closed; a known
/// limitation carried over from the source analysis, kept deliberately.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub innings_id: String,
    pub bowler1: String,
    pub bowler1_name: String,
    pub bowler2: String,
    pub bowler2_name: String,
    pub start_index: usize,
    pub end_index: usize,
    pub balls: i64,
    pub runs_conceded: i64,
    pub dot_balls: i64,
    pub wickets: i64,
}

/// Aggregated stats for one unordered bowler pair across every segment of the
/// match that the pair bowled through.
#[derive(Debug, Clone, PartialEq)]
pub struct PartnershipStats {
    pub bowler_a: String,
    pub bowler_a_name: String,
    pub bowler_b: String,
    pub bowler_b_name: String,
    pub segments: usize,
    pub balls: i64,
    pub runs_conceded: i64,
    pub dot_balls: i64,
    pub wickets: i64,
}

impl PartnershipStats {
    pub fn dot_ball_pct(&self) -> f64 {
        if self.balls == 0 {
            0.0
        } else {
            self.dot_balls as f64 / self.balls as f64 * 100.0
        }
    }

    pub fn economy_rate(&self) -> f64 {
        if self.balls == 0 {
            0.0
        } else {
            self.runs_conceded as f64 / self.balls as f64 * 6.0
        }
    }

    pub fn label(&self) -> String {
        format!("{} & {}", self.bowler_a_name, self.bowler_b_name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedPartnership {
    pub stats: PartnershipStats,
    pub composite: f64,
}

/// Close a segment at every bowler-change boundary within each innings of the
/// ordered delivery sequence. Deliveries without a bowler id cannot be
/// attributed and are skipped before scanning.
pub fn segment_deliveries(deliveries: &[DeliveryRow]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut innings_order: Vec<&str> = Vec::new();
    let mut by_innings: BTreeMap<&str, Vec<&DeliveryRow>> = BTreeMap::new();
    for d in deliveries {
        if d.bowler_participant_id.is_none() {
            continue;
        }
        if !by_innings.contains_key(d.innings_id.as_str()) {
            innings_order.push(d.innings_id.as_str());
        }
        by_innings.entry(d.innings_id.as_str()).or_default().push(d);
    }

    for innings_id in innings_order {
        let rows = &by_innings[innings_id];
        segment_one_innings(innings_id, rows, &mut segments);
    }
    segments
}

fn segment_one_innings(innings_id: &str, rows: &[&DeliveryRow], out: &mut Vec<Segment>) {
    if rows.len() < 2 {
        return;
    }
    fn bowler_id<'a>(d: &'a DeliveryRow) -> &'a str {
        d.bowler_participant_id.as_deref().unwrap_or_default()
    }
    let bowler_name = |d: &DeliveryRow| {
        d.bowler_short_name
            .clone()
            .unwrap_or_else(|| bowler_id(d).to_string())
    };

    let mut segment_start = 0usize;
    for i in 1..rows.len() {
        if bowler_id(rows[i]) == bowler_id(rows[i - 1]) {
            continue;
        }
        // Segment spans [segment_start, i] inclusive: the first ball of the
        // incoming bowler closes the outgoing pair's segment.
        let span = &rows[segment_start..=i];
        let mut runs_conceded = 0i64;
        let mut dot_balls = 0i64;
        for d in span {
            runs_conceded += d.runs_bat + d.wides + d.no_balls;
            if d.runs_bat == 0 && d.wides == 0 && d.no_balls == 0 {
                dot_balls += 1;
            }
        }
        out.push(Segment {
            innings_id: innings_id.to_string(),
            bowler1: bowler_id(rows[segment_start]).to_string(),
            bowler1_name: bowler_name(rows[segment_start]),
            bowler2: bowler_id(rows[i]).to_string(),
            bowler2_name: bowler_name(rows[i]),
            start_index: segment_start,
            end_index: i,
            balls: (i - segment_start + 1) as i64,
            runs_conceded,
            dot_balls,
            wickets: rows[i].progress_wickets - rows[segment_start].progress_wickets,
        });
        // Boundary ball starts the next segment too.
        segment_start = i;
    }
}

/// Fold segments into one row per unordered bowler pair, across every innings
/// of the match.
pub fn aggregate_pairs(segments: &[Segment]) -> Vec<PartnershipStats> {
    let mut pairs: BTreeMap<(String, String), PartnershipStats> = BTreeMap::new();
    for seg in segments {
        let (key, names) = if seg.bowler1 <= seg.bowler2 {
            (
                (seg.bowler1.clone(), seg.bowler2.clone()),
                (seg.bowler1_name.clone(), seg.bowler2_name.clone()),
            )
        } else {
            (
                (seg.bowler2.clone(), seg.bowler1.clone()),
                (seg.bowler2_name.clone(), seg.bowler1_name.clone()),
            )
        };
        let entry = pairs.entry(key.clone()).or_insert_with(|| PartnershipStats {
            bowler_a: key.0,
            bowler_a_name: names.0,
            bowler_b: key.1,
            bowler_b_name: names.1,
            segments: 0,
            balls: 0,
            runs_conceded: 0,
            dot_balls: 0,
            wickets: 0,
        });
        entry.segments += 1;
        entry.balls += seg.balls;
        entry.runs_conceded += seg.runs_conceded;
        entry.dot_balls += seg.dot_balls;
        entry.wickets += seg.wickets;
    }
    pairs.into_values().collect()
}

/// Score every pair on min-max normalized wickets, dot-ball% (higher better)
/// and economy rate (lower better, inverted), composite = unweighted mean.
/// Degenerate spreads (all values equal) normalize to 0 rather than divide by
/// zero. Sorted best-first.
pub fn rank_partnerships(stats: &[PartnershipStats]) -> Vec<RankedPartnership> {
    let wickets: Vec<f64> = stats.iter().map(|s| s.wickets as f64).collect();
    let dots: Vec<f64> = stats.iter().map(|s| s.dot_ball_pct()).collect();
    let econ: Vec<f64> = stats.iter().map(|s| s.economy_rate()).collect();

    let norm_wickets = min_max_normalize(&wickets, false);
    let norm_dots = min_max_normalize(&dots, false);
    let norm_econ = min_max_normalize(&econ, true);

    let mut ranked: Vec<RankedPartnership> = stats
        .iter()
        .enumerate()
        .map(|(i, s)| RankedPartnership {
            stats: s.clone(),
            composite: (norm_wickets[i] + norm_dots[i] + norm_econ[i]) / 3.0,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.composite
            .partial_cmp(&a.composite)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.stats.bowler_a.cmp(&b.stats.bowler_a))
    });
    ranked
}

pub fn best_partnerships(ranked: &[RankedPartnership], n: usize) -> &[RankedPartnership] {
    &ranked[..n.min(ranked.len())]
}

pub fn worst_partnerships(ranked: &[RankedPartnership], n: usize) -> Vec<RankedPartnership> {
    let start = ranked.len().saturating_sub(n);
    let mut out = ranked[start..].to_vec();
    out.reverse();
    out
}

fn min_max_normalize(values: &[f64], invert: bool) -> Vec<f64> {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().reduce(f64::max).unwrap_or(min);
    let span = max - min;
    values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                0.0
            } else if invert {
                1.0 - (v - min) / span
            } else {
                (v - min) / span
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeliveryRow;

    fn ball(innings: &str, idx: i64, bowler: &str, runs_bat: i64, wickets: i64) -> DeliveryRow {
        DeliveryRow {
            id: format!("{innings}-{idx}"),
            innings_id: innings.to_string(),
            innings_number: 1,
            over_number: idx / 6,
            ball_display_number: idx % 6 + 1,
            progress_wickets: wickets,
            bowler_participant_id: Some(bowler.to_string()),
            bowler_short_name: Some(bowler.to_uppercase()),
            runs_bat,
            ..DeliveryRow::default()
        }
    }

    #[test]
    fn boundary_ball_belongs_to_both_segments() {
        let bowlers = ["a", "a", "a", "b", "b", "c"];
        let rows: Vec<DeliveryRow> = bowlers
            .iter()
            .enumerate()
            .map(|(i, b)| ball("i1", i as i64, b, 1, 0))
            .collect();
        let segments = segment_deliveries(&rows);
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].start_index, segments[0].end_index), (0, 3));
        assert_eq!(segments[0].bowler1, "a");
        assert_eq!(segments[0].bowler2, "b");
        assert_eq!(segments[0].balls, 4);
        assert_eq!((segments[1].start_index, segments[1].end_index), (3, 5));
        assert_eq!(segments[1].bowler1, "b");
        assert_eq!(segments[1].bowler2, "c");
        assert_eq!(segments[1].balls, 3);
        // Trailing spell by "c" is not closed into a third segment.
    }

    #[test]
    fn segment_wickets_are_progress_deltas() {
        let rows = vec![
            ball("i1", 0, "a", 0, 0),
            ball("i1", 1, "a", 0, 1),
            ball("i1", 2, "b", 0, 2),
            ball("i1", 3, "c", 0, 2),
        ];
        let segments = segment_deliveries(&rows);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].wickets, 2);
        assert_eq!(segments[1].wickets, 0);
    }

    #[test]
    fn pair_key_is_unordered() {
        let first = vec![
            ball("i1", 0, "x", 0, 0),
            ball("i1", 1, "y", 0, 0),
            ball("i1", 2, "y", 0, 0),
        ];
        let second = vec![
            ball("i2", 0, "y", 2, 0),
            ball("i2", 1, "x", 2, 0),
            ball("i2", 2, "x", 2, 0),
        ];
        let mut rows = first;
        rows.extend(second);
        let stats = aggregate_pairs(&segment_deliveries(&rows));
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].bowler_a, "x");
        assert_eq!(stats[0].bowler_b, "y");
        assert_eq!(stats[0].segments, 2);
        assert_eq!(stats[0].balls, 4);
    }

    #[test]
    fn dot_ball_and_economy_derivations() {
        let stats = PartnershipStats {
            bowler_a: "a".into(),
            bowler_a_name: "A".into(),
            bowler_b: "b".into(),
            bowler_b_name: "B".into(),
            segments: 1,
            balls: 12,
            runs_conceded: 18,
            dot_balls: 6,
            wickets: 1,
        };
        assert!((stats.dot_ball_pct() - 50.0).abs() < 1e-9);
        assert!((stats.economy_rate() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_spread_normalizes_to_zero() {
        let make = |a: &str, b: &str| PartnershipStats {
            bowler_a: a.into(),
            bowler_a_name: a.into(),
            bowler_b: b.into(),
            bowler_b_name: b.into(),
            segments: 1,
            balls: 6,
            runs_conceded: 6,
            dot_balls: 3,
            wickets: 1,
        };
        let stats = vec![make("a", "b"), make("c", "d")];
        let ranked = rank_partnerships(&stats);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.composite == 0.0));
    }

    #[test]
    fn ranking_prefers_wickets_dots_and_low_economy() {
        let tight = PartnershipStats {
            bowler_a: "a".into(),
            bowler_a_name: "A".into(),
            bowler_b: "b".into(),
            bowler_b_name: "B".into(),
            segments: 2,
            balls: 24,
            runs_conceded: 12,
            dot_balls: 16,
            wickets: 3,
        };
        let loose = PartnershipStats {
            bowler_a: "c".into(),
            bowler_a_name: "C".into(),
            bowler_b: "d".into(),
            bowler_b_name: "D".into(),
            segments: 2,
            balls: 24,
            runs_conceded: 40,
            dot_balls: 2,
            wickets: 0,
        };
        let ranked = rank_partnerships(&[loose, tight]);
        assert_eq!(ranked[0].stats.bowler_a, "a");
        assert!((ranked[0].composite - 1.0).abs() < 1e-9);
        assert_eq!(best_partnerships(&ranked, 1)[0].stats.bowler_a, "a");
        assert_eq!(worst_partnerships(&ranked, 1)[0].stats.bowler_a, "c");
    }

    #[test]
    fn empty_input_is_empty_output() {
        assert!(segment_deliveries(&[]).is_empty());
        assert!(aggregate_pairs(&[]).is_empty());
        assert!(rank_partnerships(&[]).is_empty());
    }
}
