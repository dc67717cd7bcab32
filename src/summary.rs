//! Corpus summary statistics
//!
//! Collects per-session samples (duration, query counts and lengths, term
//! diversity, operator share) and reduces them to mean / median / standard
//! deviation, plus the capped distributions used by plotting collaborators.

use crate::query_metrics::QueryMetrics;
use crate::types::Session;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default cap for the per-session query count distribution
pub const DEFAULT_QUERY_COUNT_CAP: usize = 10;
/// Default cap for the tokens-per-query distribution
pub const DEFAULT_TOKENS_PER_QUERY_CAP: usize = 20;

/// Caps applied to the plotted distributions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionCaps {
    pub query_count: usize,
    pub tokens_per_query: usize,
}

impl Default for DistributionCaps {
    fn default() -> Self {
        Self {
            query_count: DEFAULT_QUERY_COUNT_CAP,
            tokens_per_query: DEFAULT_TOKENS_PER_QUERY_CAP,
        }
    }
}

/// Mean, median and sample standard deviation of one metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricStats {
    pub mean: f64,
    pub median: f64,
    pub sd: f64,
}

impl MetricStats {
    /// All zero for empty input; `sd` is zero below two samples
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        let sd = if samples.len() > 1 {
            let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt()
        } else {
            0.0
        };

        Self { mean, median, sd }
    }
}

/// Raw per-session samples, mergeable across workers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryAccumulator {
    pub session_durations: Vec<f64>,
    pub query_counts: Vec<usize>,
    pub query_lengths_chars: Vec<usize>,
    pub query_lengths_terms: Vec<usize>,
    pub term_diversities: Vec<f64>,
    pub operator_shares: Vec<f64>,
    pub queries_to_tokens_ratios: Vec<f64>,
}

impl SummaryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, session: &Session) {
        let metrics = QueryMetrics::from_session(session);

        self.session_durations.push(session.duration_minutes());
        self.query_counts.push(metrics.query_count);
        self.term_diversities.push(metrics.term_diversity);
        self.operator_shares.push(metrics.operator_share);
        if let Some(ratio) = metrics.queries_to_tokens_ratio {
            self.queries_to_tokens_ratios.push(ratio);
        }
        self.query_lengths_chars.extend(metrics.lengths_chars);
        self.query_lengths_terms.extend(metrics.lengths_terms);
    }

    pub fn merge(&mut self, other: SummaryAccumulator) {
        self.session_durations.extend(other.session_durations);
        self.query_counts.extend(other.query_counts);
        self.query_lengths_chars.extend(other.query_lengths_chars);
        self.query_lengths_terms.extend(other.query_lengths_terms);
        self.term_diversities.extend(other.term_diversities);
        self.operator_shares.extend(other.operator_shares);
        self.queries_to_tokens_ratios
            .extend(other.queries_to_tokens_ratios);
    }

    pub fn sessions(&self) -> usize {
        self.session_durations.len()
    }

    pub fn finish(&self, caps: DistributionCaps) -> CorpusSummary {
        let average_minutes = MetricStats::from_samples(&self.session_durations).mean;

        CorpusSummary {
            sessions: self.sessions(),
            average_duration_hh_mm: minutes_to_hh_mm(average_minutes),
            session_duration: MetricStats::from_samples(&self.session_durations),
            query_count: MetricStats::from_samples(&as_f64(&self.query_counts)),
            query_length_chars: MetricStats::from_samples(&as_f64(&self.query_lengths_chars)),
            query_length_terms: MetricStats::from_samples(&as_f64(&self.query_lengths_terms)),
            term_diversity: MetricStats::from_samples(&self.term_diversities),
            operator_share: MetricStats::from_samples(&self.operator_shares),
            queries_to_tokens_ratio: MetricStats::from_samples(&self.queries_to_tokens_ratios),
            capped_query_counts: cap(&self.query_counts, caps.query_count),
            capped_tokens_per_query: cap(&self.query_lengths_terms, caps.tokens_per_query),
        }
    }
}

/// Summary of a session corpus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusSummary {
    pub sessions: usize,
    pub average_duration_hh_mm: String,
    /// Minutes
    pub session_duration: MetricStats,
    pub query_count: MetricStats,
    pub query_length_chars: MetricStats,
    pub query_length_terms: MetricStats,
    pub term_diversity: MetricStats,
    pub operator_share: MetricStats,
    pub queries_to_tokens_ratio: MetricStats,
    /// Query count per session, capped
    pub capped_query_counts: Vec<usize>,
    /// Tokens per query, capped
    pub capped_tokens_per_query: Vec<usize>,
}

impl CorpusSummary {
    /// Headline metrics in report order
    pub fn metrics(&self) -> [(&'static str, &MetricStats); 6] {
        [
            ("Session Duration (hh:mm)", &self.session_duration),
            ("Query Count", &self.query_count),
            ("Query Length (#chars)", &self.query_length_chars),
            ("Query Length (#terms)", &self.query_length_terms),
            ("Term Diversity", &self.term_diversity),
            ("Search Operators Share", &self.operator_share),
        ]
    }
}

/// Summarize a corpus, folding sessions in parallel
pub fn summarize(sessions: &[Session], caps: DistributionCaps) -> CorpusSummary {
    sessions
        .par_iter()
        .fold(SummaryAccumulator::new, |mut acc, session| {
            acc.observe(session);
            acc
        })
        .reduce(SummaryAccumulator::new, |mut left, right| {
            left.merge(right);
            left
        })
        .finish(caps)
}

/// Render minutes as zero-padded `hh:mm`
pub fn minutes_to_hh_mm(minutes: f64) -> String {
    let hours = (minutes / 60.0).floor() as i64;
    let rest = minutes.rem_euclid(60.0) as i64;
    format!("{:02}:{:02}", hours, rest)
}

fn as_f64(values: &[usize]) -> Vec<f64> {
    values.iter().map(|v| *v as f64).collect()
}

fn cap(values: &[usize], limit: usize) -> Vec<usize> {
    values.iter().map(|v| (*v).min(limit)).collect()
}
