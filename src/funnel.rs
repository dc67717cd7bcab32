//! Funnel aggregation
//!
//! Accumulates per-label statistics (page views, dwell time, entrances, bounces,
//! exits) across a corpus of sessions. Accumulators are keyed by `ActionLabel`;
//! runtime labels outside the taxonomy are ignored. Aggregators merge by
//! summation, so a corpus can be folded in parallel and reduced.

use crate::taxonomy::{ActionLabel, FunnelStage, Taxonomy};
use crate::types::Session;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

const MICROS_PER_SECOND: i128 = 1_000_000;
const MICROS_PER_DAY: i128 = 86_400 * MICROS_PER_SECOND;

/// Counters for one taxonomy label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FunnelStat {
    /// Sessions in which the label occurs at least once
    pub page_views: u64,
    /// Sum of `action_length` over all occurrences, in seconds
    pub total_time: i64,
    pub entrances: u64,
    pub bounces: u64,
    pub exits: u64,
    pub sessions: u64,
}

impl FunnelStat {
    pub fn merge(&mut self, other: &FunnelStat) {
        self.page_views += other.page_views;
        self.total_time += other.total_time;
        self.entrances += other.entrances;
        self.bounces += other.bounces;
        self.exits += other.exits;
        self.sessions += other.sessions;
    }

    /// `bounces / sessions * 100`, bounded to [0, 100]
    pub fn bounce_rate(&self) -> f64 {
        if self.sessions == 0 {
            return 0.0;
        }
        (self.bounces as f64 / self.sessions as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// `exits / page_views * 100`
    pub fn exit_percent(&self) -> f64 {
        if self.page_views == 0 {
            return 0.0;
        }
        self.exits as f64 / self.page_views as f64 * 100.0
    }

    /// Average dwell time per page view, `"0:00"` when there are no page views
    pub fn average_time(&self) -> String {
        if self.page_views == 0 {
            return "0:00".to_string();
        }
        let total = self.total_time as i128 * MICROS_PER_SECOND;
        format_duration_micros(div_round_half_even(total, self.page_views as i128))
    }
}

/// One rendered line of the funnel report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelRow {
    #[serde(rename = "Action")]
    pub action: &'static str,
    #[serde(rename = "Stage")]
    pub stage: FunnelStage,
    #[serde(rename = "Page Views")]
    pub page_views: u64,
    #[serde(rename = "Avg. Time")]
    pub avg_time: String,
    #[serde(rename = "Entrances")]
    pub entrances: u64,
    #[serde(rename = "Bounce Rate")]
    pub bounce_rate: f64,
    #[serde(rename = "% Exit")]
    pub exit_percent: f64,
}

/// Per-label funnel accumulator over a session corpus
#[derive(Debug, Clone)]
pub struct FunnelAggregator<'t> {
    taxonomy: &'t Taxonomy,
    stats: BTreeMap<ActionLabel, FunnelStat>,
    sessions_observed: u64,
}

impl<'t> FunnelAggregator<'t> {
    /// Zero-initialized accumulator for every label of `taxonomy`
    pub fn new(taxonomy: &'t Taxonomy) -> Self {
        Self {
            taxonomy,
            stats: taxonomy
                .labels()
                .map(|label| (label, FunnelStat::default()))
                .collect(),
            sessions_observed: 0,
        }
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        self.taxonomy
    }

    pub fn sessions_observed(&self) -> u64 {
        self.sessions_observed
    }

    pub fn stat(&self, label: ActionLabel) -> Option<&FunnelStat> {
        self.stats.get(&label)
    }

    /// Fold one session into the counters
    pub fn observe(&mut self, session: &Session) {
        self.sessions_observed += 1;

        let is_bounce = session.is_bounce();
        let exit_label = session
            .actions
            .last()
            .and_then(|action| self.taxonomy.resolve(&action.action_label));

        let mut seen = BTreeSet::new();
        for action in &session.actions {
            let Some(label) = self.taxonomy.resolve(&action.action_label) else {
                continue;
            };
            let stat = self.stats.entry(label).or_default();
            stat.total_time += action.action_length;
            // Counted per occurrence, not per session
            if action.origin_action.is_empty() {
                stat.entrances += 1;
                stat.sessions += 1;
            }
            seen.insert(label);
        }

        for label in seen {
            let stat = self.stats.entry(label).or_default();
            stat.page_views += 1;
            if is_bounce {
                stat.bounces += 1;
            }
            if exit_label == Some(label) {
                stat.exits += 1;
            }
        }
    }

    /// Add another aggregator's counters into this one
    pub fn merge(&mut self, other: &FunnelAggregator<'_>) {
        self.sessions_observed += other.sessions_observed;
        for (label, stat) in &other.stats {
            self.stats.entry(*label).or_default().merge(stat);
        }
    }

    /// Rendered rows, one per taxonomy label in reporting order
    pub fn rows(&self) -> Vec<FunnelRow> {
        self.stats
            .iter()
            .filter_map(|(label, stat)| {
                let stage = self.taxonomy.stage(*label)?;
                Some(FunnelRow {
                    action: label.as_str(),
                    stage,
                    page_views: stat.page_views,
                    avg_time: stat.average_time(),
                    entrances: stat.entrances,
                    bounce_rate: stat.bounce_rate(),
                    exit_percent: stat.exit_percent(),
                })
            })
            .collect()
    }
}

/// Aggregate a corpus in parallel: each worker folds a private accumulator and
/// the partial results are merged by summation.
pub fn aggregate_funnel<'t>(sessions: &[Session], taxonomy: &'t Taxonomy) -> FunnelAggregator<'t> {
    let aggregator = sessions
        .par_iter()
        .fold(
            || FunnelAggregator::new(taxonomy),
            |mut acc, session| {
                acc.observe(session);
                acc
            },
        )
        .reduce(
            || FunnelAggregator::new(taxonomy),
            |mut left, right| {
                left.merge(&right);
                left
            },
        );

    info!(
        sessions = aggregator.sessions_observed(),
        labels = taxonomy.len(),
        "funnel aggregated"
    );
    aggregator
}

/// Render a duration as `H:MM:SS`, with `.ffffff` when there are microseconds
/// and a `N day(s), ` prefix past 24 hours
pub fn format_duration_micros(micros: i128) -> String {
    let days = micros.div_euclid(MICROS_PER_DAY);
    let rem = micros.rem_euclid(MICROS_PER_DAY);
    let seconds = rem / MICROS_PER_SECOND;
    let fraction = rem % MICROS_PER_SECOND;

    let mut clock = format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    );
    if fraction > 0 {
        clock.push_str(&format!(".{:06}", fraction));
    }

    match days {
        0 => clock,
        1 | -1 => format!("{} day, {}", days, clock),
        _ => format!("{} days, {}", days, clock),
    }
}

fn div_round_half_even(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator.div_euclid(denominator);
    let twice_remainder = 2 * numerator.rem_euclid(denominator);
    if twice_remainder > denominator || (twice_remainder == denominator && quotient % 2 != 0) {
        quotient + 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, Action};
    use pretty_assertions::assert_eq;

    fn action(label: &str, length: i64, origin: &str) -> Action {
        Action {
            action_id: 0,
            timestamp: parse_timestamp("2024-01-15 14:00:00").unwrap(),
            action_type: "action".to_string(),
            action_label: label.to_string(),
            action_length: length,
            params: String::new(),
            origin_action: origin.to_string(),
        }
    }

    fn session(actions: Vec<Action>) -> Session {
        let mut session = Session::new("s");
        for action in actions {
            session.push_action(action);
        }
        session
    }

    #[test]
    fn test_single_entrance() {
        let taxonomy = Taxonomy::standard();
        let mut aggregator = FunnelAggregator::new(&taxonomy);
        aggregator.observe(&session(vec![
            action("search", 0, ""),
            action("view_record", 5, "SearchHit"),
        ]));

        let search = aggregator.stat(ActionLabel::Search).unwrap();
        assert_eq!(search.entrances, 1);
        assert_eq!(search.sessions, 1);
        assert_eq!(search.page_views, 1);
        assert_eq!(search.exits, 0);

        let view = aggregator.stat(ActionLabel::ViewRecord).unwrap();
        assert_eq!(view.entrances, 0);
        assert_eq!(view.exits, 1);
        assert_eq!(view.total_time, 5);
        assert_eq!(view.average_time(), "0:00:05");
    }

    #[test]
    fn test_bounce_session() {
        let taxonomy = Taxonomy::standard();
        let mut aggregator = FunnelAggregator::new(&taxonomy);
        aggregator.observe(&session(vec![action("goto_home", 0, "")]));

        let stat = aggregator.stat(ActionLabel::GotoHome).unwrap();
        assert_eq!(stat.bounces, 1);
        assert_eq!(stat.bounce_rate(), 100.0);
        assert_eq!(stat.exit_percent(), 100.0);
    }

    #[test]
    fn test_bounce_rate_is_bounded() {
        let stat = FunnelStat {
            bounces: 3,
            sessions: 1,
            ..Default::default()
        };
        assert_eq!(stat.bounce_rate(), 100.0);
        assert_eq!(FunnelStat::default().bounce_rate(), 0.0);
    }

    #[test]
    fn test_repeated_label_counts_one_page_view() {
        let taxonomy = Taxonomy::standard();
        let mut aggregator = FunnelAggregator::new(&taxonomy);
        aggregator.observe(&session(vec![
            action("search", 0, ""),
            action("search", 3, ""),
            action("search", 4, "SearchHit"),
        ]));

        let stat = aggregator.stat(ActionLabel::Search).unwrap();
        assert_eq!(stat.page_views, 1);
        assert_eq!(stat.entrances, 2);
        assert_eq!(stat.sessions, 2);
        assert_eq!(stat.exits, 1);
        assert_eq!(stat.total_time, 7);
        assert_eq!(stat.average_time(), "0:00:07");
    }

    #[test]
    fn test_unknown_labels_are_ignored() {
        let taxonomy = Taxonomy::standard();
        let mut aggregator = FunnelAggregator::new(&taxonomy);
        aggregator.observe(&session(vec![action("click", 10, ""), action("searchterm_1", 2, "")]));

        assert_eq!(aggregator.rows().len(), 58);
        assert!(aggregator.rows().iter().all(|row| row.page_views == 0));
    }

    #[test]
    fn test_rows_without_page_views() {
        let taxonomy = Taxonomy::standard();
        let aggregator = FunnelAggregator::new(&taxonomy);
        let rows = aggregator.rows();
        assert_eq!(rows[0].action, "CTS_search");
        assert_eq!(rows[0].avg_time, "0:00");
        assert_eq!(rows[0].bounce_rate, 0.0);
        assert_eq!(rows[0].exit_percent, 0.0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let taxonomy = Taxonomy::standard();
        let sessions: Vec<Session> = (0..50)
            .map(|i| {
                if i % 3 == 0 {
                    session(vec![action("search", 0, "")])
                } else {
                    session(vec![
                        action("search", 0, ""),
                        action("view_record", i, "SearchHit"),
                        action("export_bib", 1, "RecordTab"),
                    ])
                }
            })
            .collect();

        let mut sequential = FunnelAggregator::new(&taxonomy);
        for s in &sessions {
            sequential.observe(s);
        }
        let parallel = aggregate_funnel(&sessions, &taxonomy);

        assert_eq!(parallel.sessions_observed(), 50);
        assert_eq!(parallel.rows(), sequential.rows());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration_micros(0), "0:00:00");
        assert_eq!(format_duration_micros(3_723_000_000), "1:02:03");
        assert_eq!(format_duration_micros(2_500_000), "0:00:02.500000");
        assert_eq!(format_duration_micros(90_000 * 1_000_000), "1 day, 1:00:00");
        assert_eq!(format_duration_micros(2 * 86_400 * 1_000_000), "2 days, 0:00:00");
        assert_eq!(format_duration_micros(-1_000_000), "-1 day, 23:59:59");
    }

    #[test]
    fn test_average_time_rounds_to_microseconds() {
        let stat = FunnelStat {
            page_views: 3,
            total_time: 10,
            ..Default::default()
        };
        assert_eq!(stat.average_time(), "0:00:03.333333");
    }
}
