//! Report rendering
//!
//! Renders corpus results as the plain-text metrics summary, the funnel and
//! session-analysis CSV tables, and a JSON report stamped with producer metadata.

use crate::analysis::SessionAnalysis;
use crate::error::SessionError;
use crate::funnel::FunnelRow;
use crate::summary::CorpusSummary;
use crate::types::SessionLabel;
use crate::{CLICKFLOW_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;
use uuid::Uuid;

/// Version of the JSON report layout
pub const REPORT_VERSION: &str = "1.0.0";

/// Header of the funnel CSV table
pub const FUNNEL_CSV_HEADER: [&str; 6] = [
    "Action",
    "Page Views",
    "Avg. Time",
    "Entrances",
    "Bounce Rate",
    "% Exit",
];

/// Render the plain-text metrics summary
pub fn render_summary_text(summary: &CorpusSummary) -> String {
    let mut out = String::new();
    out.push_str("Session Metrics Summary:\n");
    out.push_str("========================\n");
    let _ = writeln!(
        out,
        "Average Session Duration (hh:mm): {}\n",
        summary.average_duration_hh_mm
    );

    for (name, stats) in summary.metrics() {
        let _ = writeln!(out, "{}:", name);
        let _ = writeln!(out, "  Mean    = {:.2}", stats.mean);
        let _ = writeln!(out, "  Median  = {:.2}", stats.median);
        let _ = writeln!(out, "  SD      = {:.2}\n", stats.sd);
    }
    out
}

/// Write the funnel table as CSV
pub fn write_funnel_csv<W: Write>(writer: W, rows: &[FunnelRow]) -> Result<(), SessionError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(FUNNEL_CSV_HEADER)?;
    for row in rows {
        wtr.write_record([
            row.action.to_string(),
            row.page_views.to_string(),
            row.avg_time.clone(),
            row.entrances.to_string(),
            format!("{:.2}%", row.bounce_rate),
            format!("{:.2}%", row.exit_percent),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct AnalysisCsvRow<'a> {
    session_id: &'a str,
    session_type: SessionLabel,
    search_depth: usize,
    results_pageviews: usize,
    search_duration: i64,
    percent_search_refinements: f64,
    query_length: usize,
}

/// Write session analysis rows as CSV
pub fn write_analysis_csv<W: Write>(
    writer: W,
    rows: &[SessionAnalysis],
) -> Result<(), SessionError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(AnalysisCsvRow {
            session_id: &row.session_id,
            session_type: row.session_type,
            search_depth: row.search_depth,
            results_pageviews: row.results_pageviews,
            search_duration: row.search_duration,
            percent_search_refinements: row.percent_search_refinements,
            query_length: row.query_length,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Producer metadata stamped on JSON reports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// JSON report for one corpus
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub dataset: String,
    pub computed_at_utc: String,
    pub summary: CorpusSummary,
    pub funnel: Vec<FunnelRow>,
    pub sessions: Vec<SessionAnalysis>,
}

/// Encoder for JSON reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create an encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(
        &self,
        dataset: &str,
        summary: CorpusSummary,
        funnel: Vec<FunnelRow>,
        sessions: Vec<SessionAnalysis>,
    ) -> AnalysisReport {
        AnalysisReport {
            report_version: REPORT_VERSION.to_string(),
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: CLICKFLOW_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            dataset: dataset.to_string(),
            computed_at_utc: Utc::now().to_rfc3339(),
            summary,
            funnel,
            sessions,
        }
    }

    pub fn encode_to_json(
        &self,
        dataset: &str,
        summary: CorpusSummary,
        funnel: Vec<FunnelRow>,
        sessions: Vec<SessionAnalysis>,
    ) -> Result<String, SessionError> {
        let report = self.encode(dataset, summary, funnel, sessions);
        serde_json::to_string_pretty(&report).map_err(SessionError::JsonError)
    }
}
