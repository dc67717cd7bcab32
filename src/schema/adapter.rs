//! Record parsing for NDJSON batches and JSON arrays
//!
//! A malformed line never aborts a batch: it is logged, recorded in the batch's
//! skip list, and the remaining lines are still parsed.

use crate::error::SessionError;
use crate::schema::raw_event::SessionRecord;
use tracing::warn;

/// A line that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    /// 1-based line number
    pub line: usize,
    pub error: String,
}

/// Result of parsing a batch
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub records: Vec<SessionRecord>,
    pub skipped: Vec<SkippedLine>,
}

/// Adapter for turning raw text into session records
pub struct RawRecordAdapter;

impl RawRecordAdapter {
    /// Parse a single JSON record
    pub fn parse_record(json: &str) -> Result<SessionRecord, SessionError> {
        serde_json::from_str(json).map_err(|e| SessionError::ParseError(e.to_string()))
    }

    /// Parse a JSON array of records
    pub fn parse_array(json: &str) -> Result<Vec<SessionRecord>, SessionError> {
        let records: Vec<SessionRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON, skipping blank and malformed lines
    pub fn parse_ndjson(ndjson: &str) -> ParsedBatch {
        let mut batch = ParsedBatch::default();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match Self::parse_record(trimmed) {
                Ok(record) => batch.records.push(record),
                Err(e) => {
                    warn!(line = line_num + 1, error = %e, "skipping malformed record");
                    batch.skipped.push(SkippedLine {
                        line: line_num + 1,
                        error: e.to_string(),
                    });
                }
            }
        }
        batch
    }
}
