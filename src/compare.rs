//! Side-by-side comparison of two session corpora
//!
//! Reports, per corpus, the session count, session length and actions per
//! session (mean / max / min) and the number of distinct users.

use crate::types::{Session, ANONYMOUS_USER_ID};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Mean, maximum and minimum of an integer metric; all zero for no samples
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RangeStats {
    pub mean: f64,
    pub max: i64,
    pub min: i64,
}

impl RangeStats {
    pub fn from_samples<I: IntoIterator<Item = i64>>(samples: I) -> Self {
        let mut count = 0usize;
        let mut sum = 0i128;
        let mut max = i64::MIN;
        let mut min = i64::MAX;
        for sample in samples {
            count += 1;
            sum += sample as i128;
            max = max.max(sample);
            min = min.min(sample);
        }
        if count == 0 {
            return Self::default();
        }
        Self {
            mean: sum as f64 / count as f64,
            max,
            min,
        }
    }
}

/// Shape of one corpus
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusProfile {
    pub sessions: usize,
    /// Seconds between start and end date
    pub session_length: RangeStats,
    pub actions_per_session: RangeStats,
    /// Distinct known user ids; anonymous sessions are not counted
    pub unique_users: usize,
}

impl CorpusProfile {
    pub fn from_sessions(sessions: &[Session]) -> Self {
        let users: BTreeSet<i64> = sessions
            .iter()
            .map(|s| s.user_id)
            .filter(|id| *id != ANONYMOUS_USER_ID)
            .collect();

        Self {
            sessions: sessions.len(),
            session_length: RangeStats::from_samples(sessions.iter().map(|s| s.session_length)),
            actions_per_session: RangeStats::from_samples(
                sessions.iter().map(|s| s.actions.len() as i64),
            ),
            unique_users: users.len(),
        }
    }
}

/// Profiles of two named corpora
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusComparison {
    pub left_name: String,
    pub left: CorpusProfile,
    pub right_name: String,
    pub right: CorpusProfile,
}

impl CorpusComparison {
    /// Plain-text report, one line per metric and corpus
    pub fn render_text(&self) -> String {
        let sides = [(&self.left_name, &self.left), (&self.right_name, &self.right)];
        let mut out = String::new();

        for (name, profile) in sides {
            let _ = writeln!(out, "Number of sessions in {}: {}", name, profile.sessions);
        }
        let ranges = [
            ("session length", [self.left.session_length, self.right.session_length]),
            (
                "actions per session",
                [self.left.actions_per_session, self.right.actions_per_session],
            ),
        ];
        let names = [&self.left_name, &self.right_name];
        for (label, stats) in ranges {
            for (name, range) in names.iter().zip(stats) {
                let _ = writeln!(out, "Average {} in {}: {:.2}", label, name, range.mean);
            }
            for (name, range) in names.iter().zip(stats) {
                let _ = writeln!(out, "Max {} in {}: {}", label, name, range.max);
            }
            for (name, range) in names.iter().zip(stats) {
                let _ = writeln!(out, "Min {} in {}: {}", label, name, range.min);
            }
        }
        for (name, profile) in sides {
            let _ = writeln!(out, "Number of unique users in {}: {}", name, profile.unique_users);
        }
        out
    }
}

/// Compare two loaded corpora
pub fn compare_corpora(
    left_name: impl Into<String>,
    left: &[Session],
    right_name: impl Into<String>,
    right: &[Session],
) -> CorpusComparison {
    CorpusComparison {
        left_name: left_name.into(),
        left: CorpusProfile::from_sessions(left),
        right_name: right_name.into(),
        right: CorpusProfile::from_sessions(right),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{parse_timestamp, Action};
    use pretty_assertions::assert_eq;

    fn session(id: &str, user_id: i64, offsets: &[i64]) -> Session {
        let start = parse_timestamp("2024-01-15 14:00:00").unwrap();
        let mut session = Session::new(id);
        session.user_id = user_id;
        for (i, offset) in offsets.iter().enumerate() {
            session.push_action(Action {
                action_id: i as i64,
                timestamp: start + chrono::Duration::seconds(*offset),
                action_type: "action".to_string(),
                action_label: "search".to_string(),
                action_length: 0,
                params: String::new(),
                origin_action: String::new(),
            });
        }
        session.recompute_length();
        session
    }

    #[test]
    fn test_profile() {
        let sessions = vec![
            session("a", 1, &[0, 30, 60]),
            session("b", 1, &[0]),
            session("c", 2, &[0, 90]),
            session("d", ANONYMOUS_USER_ID, &[0, 10, 20, 30]),
        ];
        let profile = CorpusProfile::from_sessions(&sessions);

        assert_eq!(profile.sessions, 4);
        assert_eq!(profile.session_length, RangeStats { mean: 45.0, max: 90, min: 0 });
        assert_eq!(profile.actions_per_session, RangeStats { mean: 2.5, max: 4, min: 1 });
        assert_eq!(profile.unique_users, 2);
    }

    #[test]
    fn test_empty_corpus_profile() {
        let profile = CorpusProfile::from_sessions(&[]);
        assert_eq!(profile, CorpusProfile::default());
    }

    #[test]
    fn test_compare_and_render() {
        let left = vec![session("a", 1, &[0, 30]), session("b", 2, &[0, 10])];
        let right = vec![session("x", 5, &[0, 60, 120])];
        let comparison = compare_corpora("Dataset 1", &left, "Dataset 2", &right);

        assert_eq!(comparison.left.sessions, 2);
        assert_eq!(comparison.right.session_length.max, 120);

        let text = comparison.render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0], "Number of sessions in Dataset 1: 2");
        assert_eq!(lines[1], "Number of sessions in Dataset 2: 1");
        assert_eq!(lines[2], "Average session length in Dataset 1: 20.00");
        assert_eq!(lines[5], "Max session length in Dataset 2: 120");
        assert_eq!(lines[8], "Average actions per session in Dataset 1: 2.00");
        assert_eq!(lines[15], "Number of unique users in Dataset 2: 1");
    }
}
