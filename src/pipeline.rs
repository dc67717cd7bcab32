//! Pipeline orchestration
//!
//! This module provides the public API for clickflow. It wires the stages
//! together: record parsing → event normalization → session building, and then
//! classification, query metrics, funnel aggregation and the corpus summary.

use crate::analysis::SessionAnalysis;
use crate::builder::SessionBuilder;
use crate::config::AnalysisConfig;
use crate::error::SessionError;
use crate::funnel::{aggregate_funnel, FunnelRow};
use crate::normalizer::EventNormalizer;
use crate::schema::{ParsedBatch, RawRecordAdapter};
use crate::summary::{summarize, CorpusSummary, DistributionCaps};
use crate::taxonomy::Taxonomy;
use crate::types::Session;
use rayon::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// Build finalized sessions from an NDJSON batch.
///
/// Malformed lines are skipped; sessions without a click are dropped. Sessions
/// are returned ordered by `session_id`.
///
/// # Example
/// ```ignore
/// let sessions = sessions_from_ndjson(ndjson);
/// ```
pub fn sessions_from_ndjson(ndjson: &str) -> Vec<Session> {
    let mut processor = SessionProcessor::new();
    processor.ingest_ndjson(ndjson);
    processor.finish()
}

/// Counts from one ingested batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub records: usize,
    pub skipped_lines: usize,
    /// Input files that could not be read or parsed
    pub failed_inputs: usize,
}

/// Layout of an input batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputFormat {
    /// JSON array when the first character is `[`, NDJSON otherwise
    #[default]
    Auto,
    Ndjson,
    Json,
}

/// Stateful processor for building sessions across several input batches.
///
/// Use this when one session's records are spread over multiple files.
pub struct SessionProcessor {
    builder: SessionBuilder,
    totals: IngestStats,
}

impl Default for SessionProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProcessor {
    /// Create a processor with the standard stop-word list
    pub fn new() -> Self {
        Self::with_normalizer(EventNormalizer::default())
    }

    pub fn with_normalizer(normalizer: EventNormalizer) -> Self {
        Self {
            builder: SessionBuilder::new(normalizer),
            totals: IngestStats::default(),
        }
    }

    pub fn with_config(config: &AnalysisConfig) -> Self {
        Self::with_normalizer(config.normalizer())
    }

    /// Ingest an NDJSON batch
    pub fn ingest_ndjson(&mut self, ndjson: &str) -> IngestStats {
        self.ingest_batch(RawRecordAdapter::parse_ndjson(ndjson))
    }

    /// Ingest a JSON array of records; the whole array must parse
    pub fn ingest_array(&mut self, json: &str) -> Result<IngestStats, SessionError> {
        let records = RawRecordAdapter::parse_array(json)?;
        Ok(self.ingest_batch(ParsedBatch {
            records,
            skipped: Vec::new(),
        }))
    }

    /// Ingest either a JSON array or NDJSON, detected from the first character
    pub fn ingest_input(&mut self, input: &str) -> Result<IngestStats, SessionError> {
        if input.trim_start().starts_with('[') {
            self.ingest_array(input)
        } else {
            Ok(self.ingest_ndjson(input))
        }
    }

    /// Ingest input text in the given layout
    pub fn ingest_str(&mut self, input: &str, format: InputFormat) -> Result<IngestStats, SessionError> {
        match format {
            InputFormat::Auto => self.ingest_input(input),
            InputFormat::Ndjson => Ok(self.ingest_ndjson(input)),
            InputFormat::Json => self.ingest_array(input),
        }
    }

    /// Read and ingest one input file
    pub fn ingest_file(&mut self, path: &Path, format: InputFormat) -> Result<IngestStats, SessionError> {
        let content = std::fs::read_to_string(path)?;
        let stats = self.ingest_str(&content, format)?;
        info!(
            input = %path.display(),
            records = stats.records,
            skipped_lines = stats.skipped_lines,
            "batch ingested"
        );
        Ok(stats)
    }

    /// Ingest several input files; a file that cannot be read or parsed is
    /// logged and skipped
    pub fn ingest_files<P: AsRef<Path>>(&mut self, paths: &[P], format: InputFormat) -> IngestStats {
        let mut stats = IngestStats::default();
        for path in paths {
            match self.ingest_file(path.as_ref(), format) {
                Ok(batch) => {
                    stats.records += batch.records;
                    stats.skipped_lines += batch.skipped_lines;
                }
                Err(e) => {
                    self.record_failed_input(path.as_ref(), &e);
                    stats.failed_inputs += 1;
                }
            }
        }
        stats
    }

    /// Count an input that could not be read or parsed
    pub fn record_failed_input(&mut self, path: &Path, error: &SessionError) {
        warn!(input = %path.display(), error = %error, "skipping input");
        self.totals.failed_inputs += 1;
    }

    fn ingest_batch(&mut self, batch: ParsedBatch) -> IngestStats {
        let stats = IngestStats {
            records: batch.records.len(),
            skipped_lines: batch.skipped.len(),
            failed_inputs: 0,
        };
        self.builder.ingest_batch(batch);
        self.totals.records += stats.records;
        self.totals.skipped_lines += stats.skipped_lines;
        stats
    }

    /// Totals over every batch ingested so far
    pub fn totals(&self) -> IngestStats {
        self.totals
    }

    /// Sessions seen so far, including those without a click
    pub fn pending_sessions(&self) -> usize {
        self.builder.len()
    }

    /// Finalize and return sessions with a click, ordered by `session_id`
    pub fn finish(self) -> Vec<Session> {
        info!(
            records = self.totals.records,
            skipped_lines = self.totals.skipped_lines,
            failed_inputs = self.totals.failed_inputs,
            "input exhausted"
        );
        self.builder.finish().into_values().collect()
    }
}

/// Everything computed over one corpus
#[derive(Debug, Clone)]
pub struct CorpusAnalysis {
    pub sessions: Vec<SessionAnalysis>,
    pub funnel: Vec<FunnelRow>,
    pub summary: CorpusSummary,
}

/// Classify and measure every session, then aggregate the funnel and summary
pub fn analyze_corpus(
    sessions: &[Session],
    taxonomy: &Taxonomy,
    caps: DistributionCaps,
) -> CorpusAnalysis {
    let analyses: Vec<SessionAnalysis> = sessions
        .par_iter()
        .map(SessionAnalysis::from_session)
        .collect();

    CorpusAnalysis {
        sessions: analyses,
        funnel: aggregate_funnel(sessions, taxonomy).rows(),
        summary: summarize(sessions, caps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionLabel;
    use pretty_assertions::assert_eq;

    fn sample_ndjson() -> &'static str {
        concat!(
            r#"{"session_id": "s1", "events": [{"cts": 1705327200000, "category": "SearchSubmit", "action": "search", "params": "climate"}, {"cts": 1705327205000, "category": "SearchHit", "action": "click"}]}"#,
            "\n",
            r#"{"session_id": "s2", "events": [{"cts": 1705327200000, "category": "PageView", "action": "load", "page_view_id": "p1"}]}"#,
            "\n",
            "this line is not json\n",
            r#"{"session_id": "s1", "events": [{"cts": 1705327265000, "category": "RecordTab", "action": "click"}]}"#,
            "\n",
        )
    }

    #[test]
    fn test_sessions_from_ndjson() {
        let sessions = sessions_from_ndjson(sample_ndjson());
        assert_eq!(sessions.len(), 1);

        let session = &sessions[0];
        assert_eq!(session.session_id, "s1");
        assert_eq!(session.actions.len(), 3);
        assert_eq!(session.session_length, 65);
        assert_eq!(session.actions[2].origin_action, "SearchHit");
    }

    #[test]
    fn test_processor_accumulates_batches() {
        let mut processor = SessionProcessor::new();
        let first = processor.ingest_ndjson(sample_ndjson());
        assert_eq!(first, IngestStats { records: 3, skipped_lines: 1, failed_inputs: 0 });

        let second = processor
            .ingest_input(
                r#"[{"session_id": "s2", "events": [{"cts": 1705327300000, "category": "SearchHit", "action": "click"}]}]"#,
            )
            .unwrap();
        assert_eq!(second.records, 1);
        assert_eq!(processor.totals(), IngestStats { records: 4, skipped_lines: 1, failed_inputs: 0 });
        assert_eq!(processor.pending_sessions(), 2);

        let sessions = processor.finish();
        let ids: Vec<_> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(sessions[1].session_length, 100);
    }

    #[test]
    fn test_failed_inputs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        let good = dir.path().join("good.ndjson");
        std::fs::write(&broken, "[not json").unwrap();
        std::fs::write(&good, sample_ndjson()).unwrap();
        let missing = dir.path().join("missing.ndjson");

        let mut processor = SessionProcessor::new();
        let stats = processor.ingest_files(&[broken, missing, good], InputFormat::Auto);
        assert_eq!(stats, IngestStats { records: 3, skipped_lines: 1, failed_inputs: 2 });
        assert_eq!(processor.totals().failed_inputs, 2);

        let sessions = processor.finish();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_id, "s1");
    }

    #[test]
    fn test_invalid_array_is_an_error() {
        let mut processor = SessionProcessor::new();
        assert!(processor.ingest_input("[not json").is_err());
    }

    #[test]
    fn test_analyze_corpus() {
        let sessions = sessions_from_ndjson(sample_ndjson());
        let taxonomy = Taxonomy::standard();
        let analysis = analyze_corpus(&sessions, &taxonomy, DistributionCaps::default());

        assert_eq!(analysis.sessions.len(), 1);
        assert_eq!(analysis.sessions[0].session_type, SessionLabel::Lookup);
        assert_eq!(analysis.funnel.len(), taxonomy.len());
        assert_eq!(analysis.summary.sessions, 1);

        let search = analysis.funnel.iter().find(|row| row.action == "search").unwrap();
        assert_eq!(search.page_views, 1);
        assert_eq!(search.entrances, 1);
    }

    #[test]
    fn test_logged_origin_limits_entrances() {
        let ndjson = concat!(
            r#"{"session_id": "e", "events": ["#,
            r#"{"cts": 1705327200000, "category": "action", "action": "search"}, "#,
            r#"{"cts": 1705327210000, "category": "SearchHit", "action": "click"}, "#,
            r#"{"cts": 1705327220000, "category": "action", "action": "search", "origin_action": "SearchHit"}, "#,
            r#"{"cts": 1705327230000, "category": "action", "action": "search", "origin_action": "SearchHit"}"#,
            "]}\n",
        );
        let sessions = sessions_from_ndjson(ndjson);
        let origins: Vec<_> = sessions[0]
            .actions
            .iter()
            .map(|a| a.origin_action.as_str())
            .collect();
        assert_eq!(origins, vec!["", "", "SearchHit", "SearchHit"]);

        let taxonomy = Taxonomy::standard();
        let funnel = aggregate_funnel(&sessions, &taxonomy).rows();
        let search = funnel.iter().find(|row| row.action == "search").unwrap();
        assert_eq!(search.entrances, 1);
        assert_eq!(search.page_views, 1);
    }

    #[test]
    fn test_empty_input() {
        assert!(sessions_from_ndjson("").is_empty());
        let analysis = analyze_corpus(&[], &Taxonomy::standard(), DistributionCaps::default());
        assert!(analysis.sessions.is_empty());
        assert_eq!(analysis.summary.average_duration_hh_mm, "00:00");
    }
}
