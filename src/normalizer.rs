//! Raw event normalization
//!
//! Converts raw events into canonical `Action` records. Timing and click-origin
//! facts depend on what came before in the same session, so that state lives in
//! an explicit per-session `SessionCursor` passed into every call.

use crate::error::SessionError;
use crate::query::{rewrite_embedded_queries, StopWords};
use crate::schema::{EventPayload, RawEvent};
use crate::types::Action;
use chrono::{DateTime, NaiveDateTime, Timelike};

/// Per-session normalization state
#[derive(Debug, Clone, Default)]
pub struct SessionCursor {
    /// Full-precision time of the previous event
    last_event_at: Option<NaiveDateTime>,
    /// Category of the most recent click
    last_click_type: Option<String>,
    has_click: bool,
}

impl SessionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any click has been normalized through this cursor
    pub fn has_click(&self) -> bool {
        self.has_click
    }

    pub fn last_click_type(&self) -> Option<&str> {
        self.last_click_type.as_deref()
    }
}

/// Normalizer for raw events
#[derive(Debug, Clone, Default)]
pub struct EventNormalizer {
    stop_words: StopWords,
}

impl EventNormalizer {
    /// Create a normalizer that rewrites embedded queries with `stop_words`
    pub fn new(stop_words: StopWords) -> Self {
        Self { stop_words }
    }

    /// Normalize one event, advancing `cursor`
    pub fn normalize(
        &self,
        event: &RawEvent,
        cursor: &mut SessionCursor,
    ) -> Result<Action, SessionError> {
        let event_at = DateTime::from_timestamp_millis(event.cts)
            .ok_or(SessionError::InvalidTimestamp(event.cts))?
            .naive_utc();
        let timestamp = event_at.with_nanosecond(0).unwrap_or(event_at);

        // Whole seconds, truncated; out-of-order events clamp to zero
        let action_length = cursor
            .last_event_at
            .map(|last| ((event_at - last).num_milliseconds() / 1000).max(0))
            .unwrap_or(0);
        cursor.last_event_at = Some(event_at);

        let params = self.decode_params(event);

        // Clicks take the previous click's type; everything else keeps the logged origin
        let logged_origin = event.logged_origin();
        let origin_action = if event.is_click() {
            cursor.has_click = true;
            cursor
                .last_click_type
                .replace(event.category.clone())
                .unwrap_or(logged_origin)
        } else {
            logged_origin
        };

        Ok(Action {
            action_id: event.cts,
            timestamp,
            action_type: event.category.clone(),
            action_label: event.action.clone(),
            action_length,
            params,
            origin_action,
        })
    }

    fn decode_params(&self, event: &RawEvent) -> String {
        match event.payload() {
            EventPayload::RecordMlt { record_ids } => record_ids.join(","),
            EventPayload::PageView { page_view_id } => page_view_id,
            EventPayload::AvailabilityClick { urls } => {
                rewrite_embedded_queries(urls, &self.stop_words)
            }
            EventPayload::Generic { params } => params,
        }
    }
}
