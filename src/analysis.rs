//! Per-session analysis rows

use crate::classifier::classify;
use crate::types::{Session, SessionLabel};
use serde::Serialize;

const VIEW_RECORD_LABEL: &str = "view_record";
const RESULT_LIST_LABEL: &str = "resultlistids";

/// One row of the session analysis table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionAnalysis {
    pub session_id: String,
    pub session_type: SessionLabel,
    /// Number of `view_record` actions
    pub search_depth: usize,
    /// Result ids shown across `resultlistids` actions
    pub results_pageviews: usize,
    /// Seconds between the session bounds
    pub search_duration: i64,
    /// Searches issued after the first action
    pub search_refinements: usize,
    /// Refinements per viewed record
    pub percent_search_refinements: f64,
    /// Terms across extracted search terms
    pub query_length: usize,
}

impl SessionAnalysis {
    pub fn from_session(session: &Session) -> Self {
        let search_duration = match (session.start_date, session.end_date) {
            (Some(start), Some(end)) => (end - start).num_seconds(),
            _ => 0,
        };

        let mut search_depth = 0;
        let mut results_pageviews = 0;
        let mut search_refinements = 0;
        let mut query_length = 0;

        for (index, action) in session.actions.iter().enumerate() {
            let label = action.action_label.as_str();
            if label == VIEW_RECORD_LABEL {
                search_depth += 1;
            }
            if action.action_type == "extraction" && label.starts_with("searchterm_") {
                query_length += action.terms().count();
            }
            if index > 0
                && action.action_type == "action"
                && (label.starts_with("search") || label.starts_with("query"))
            {
                search_refinements += 1;
            }
            if label == RESULT_LIST_LABEL {
                results_pageviews += action.params.split(',').count();
            }
        }

        let percent_search_refinements = if search_depth > 0 {
            search_refinements as f64 / search_depth as f64
        } else {
            0.0
        };

        Self {
            session_id: session.session_id.clone(),
            session_type: classify(session),
            search_depth,
            results_pageviews,
            search_duration,
            search_refinements,
            percent_search_refinements,
            query_length,
        }
    }
}
