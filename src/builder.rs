//! Session reconstruction
//!
//! Groups session records by `session_id`, normalizes their events in arrival
//! order and tracks date bounds. A session may be split across several records;
//! they accumulate. Sessions without a click are dropped when the stream ends.

use crate::normalizer::{EventNormalizer, SessionCursor};
use crate::schema::{FlattenedSessionRecord, ParsedBatch, RawSessionRecord, SessionRecord};
use crate::types::{Session, ANONYMOUS_USER_ID};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// A session under construction with its normalization state
#[derive(Debug)]
struct PendingSession {
    session: Session,
    cursor: SessionCursor,
}

impl PendingSession {
    fn new(session_id: &str) -> Self {
        Self {
            session: Session::new(session_id),
            cursor: SessionCursor::new(),
        }
    }
}

/// Builder that turns a stream of records into finalized sessions
#[derive(Debug, Default)]
pub struct SessionBuilder {
    normalizer: EventNormalizer,
    pending: BTreeMap<String, PendingSession>,
}

impl SessionBuilder {
    pub fn new(normalizer: EventNormalizer) -> Self {
        Self {
            normalizer,
            pending: BTreeMap::new(),
        }
    }

    /// Number of sessions seen so far, clicked or not
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Ingest every record of a parsed batch
    pub fn ingest_batch(&mut self, batch: ParsedBatch) {
        for record in batch.records {
            self.ingest(record);
        }
    }

    /// Ingest one record of either shape
    pub fn ingest(&mut self, record: SessionRecord) {
        match record {
            SessionRecord::Events(record) => self.ingest_events(record),
            SessionRecord::Flattened(record) => self.ingest_flattened(record),
        }
    }

    /// Normalize and append a batch of raw events
    pub fn ingest_events(&mut self, record: RawSessionRecord) {
        let normalizer = &self.normalizer;
        let pending = Self::resolve(&mut self.pending, &record.session_id);

        for event in &record.events {
            match normalizer.normalize(event, &mut pending.cursor) {
                Ok(action) => pending.session.push_action(action),
                Err(e) => warn!(
                    session_id = %record.session_id,
                    cts = event.cts,
                    error = %e,
                    "skipping event"
                ),
            }
        }

        pending.session.recompute_length();
    }

    /// Append the actions of an already-flattened record verbatim
    pub fn ingest_flattened(&mut self, record: FlattenedSessionRecord) {
        let pending = Self::resolve(&mut self.pending, &record.session_id);
        let session = &mut pending.session;

        if session.user_id == ANONYMOUS_USER_ID && record.user_id >= 0 {
            session.user_id = record.user_id;
        }
        for bound in [record.start_date, record.end_date].into_iter().flatten() {
            session.widen(bound);
        }
        for action in record.actions {
            session.push_action(action);
        }

        session.recompute_length();
    }

    /// Finalize: drop sessions without a click and return the rest by id
    pub fn finish(self) -> BTreeMap<String, Session> {
        let total = self.pending.len();
        let sessions: BTreeMap<String, Session> = self
            .pending
            .into_iter()
            .filter(|(_, pending)| pending.session.has_click)
            .map(|(id, pending)| (id, pending.session))
            .collect();

        info!(
            total,
            kept = sessions.len(),
            dropped = total - sessions.len(),
            "finalized sessions"
        );
        sessions
    }

    fn resolve<'a>(
        pending: &'a mut BTreeMap<String, PendingSession>,
        session_id: &str,
    ) -> &'a mut PendingSession {
        pending.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session_id, "new session");
            PendingSession::new(session_id)
        })
    }
}

/// Build finalized sessions from a sequence of records (stateless, one-shot)
pub fn build_sessions<I>(records: I, normalizer: EventNormalizer) -> BTreeMap<String, Session>
where
    I: IntoIterator<Item = SessionRecord>,
{
    let mut builder = SessionBuilder::new(normalizer);
    for record in records {
        builder.ingest(record);
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::RawRecordAdapter;
    use crate::types::parse_timestamp;
    use pretty_assertions::assert_eq;

    fn build(ndjson: &str) -> BTreeMap<String, Session> {
        let mut builder = SessionBuilder::default();
        builder.ingest_batch(RawRecordAdapter::parse_ndjson(ndjson));
        builder.finish()
    }

    #[test]
    fn test_single_non_click_session_is_dropped() {
        let sessions = build(
            r#"{"session_id": "a", "events": [{"cts": 1705327200000, "category": "PageView", "action": "load", "page_view_id": "p1"}]}"#,
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_empty_event_session_is_dropped() {
        let sessions = build(r#"{"session_id": "a", "events": []}"#);
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_split_records_accumulate() {
        let sessions = build(concat!(
            r#"{"session_id": "a", "events": [{"cts": 1705327200000, "category": "SearchHit", "action": "click"}]}"#,
            "\n",
            r#"{"session_id": "b", "events": [{"cts": 1705327200000, "category": "PageView", "action": "load"}]}"#,
            "\n",
            r#"{"session_id": "a", "events": [{"cts": 1705327290000, "category": "RecordTab", "action": "click"}]}"#,
            "\n",
        ));

        assert_eq!(sessions.len(), 1);
        let session = &sessions["a"];
        assert_eq!(session.actions.len(), 2);
        assert_eq!(session.actions[1].action_length, 90);
        assert_eq!(session.actions[1].origin_action, "SearchHit");
        assert_eq!(session.session_length, 90);
        assert_eq!(session.user_id, -1);
    }

    #[test]
    fn test_bounds_follow_timestamps_not_insertion_order() {
        let sessions = build(
            r#"{"session_id": "a", "events": [
                {"cts": 1705327260000, "category": "SearchHit", "action": "click"},
                {"cts": 1705327200000, "category": "PageView", "action": "load"},
                {"cts": 1705327230000, "category": "PageView", "action": "load"}
            ]}"#
            .replace('\n', " ")
            .as_str(),
        );

        let session = &sessions["a"];
        assert_eq!(session.start_date, parse_timestamp("2024-01-15 14:00:00"));
        assert_eq!(session.end_date, parse_timestamp("2024-01-15 14:01:00"));
        assert_eq!(session.session_length, 60);
        assert!(session.start_date <= session.end_date);
    }

    #[test]
    fn test_events_with_invalid_timestamp_are_skipped() {
        let sessions = build(
            r#"{"session_id": "a", "events": [{"cts": 9223372036854775807, "category": "x", "action": "click"}, {"cts": 1705327200000, "category": "SearchHit", "action": "click"}]}"#,
        );
        assert_eq!(sessions["a"].actions.len(), 1);
    }

    #[test]
    fn test_flattened_record() {
        let sessions = build(
            r#"{"session_id": "f", "user_id": 7, "start_date": "2024-01-15 13:59:00", "end_date": "2024-01-15 14:00:00", "actions": [{"action_id": 1, "timestamp": "2024-01-15 14:00:30", "action_type": "GenericClick", "action_label": "click", "action_length": 0, "params": "", "origin_action": "SearchHit"}]}"#,
        );

        let session = &sessions["f"];
        assert_eq!(session.user_id, 7);
        assert_eq!(session.start_date, parse_timestamp("2024-01-15 13:59:00"));
        assert_eq!(session.end_date, parse_timestamp("2024-01-15 14:00:30"));
        assert_eq!(session.session_length, 90);
        assert_eq!(session.actions[0].origin_action, "SearchHit");
    }

    #[test]
    fn test_flattened_without_click_is_dropped() {
        let sessions = build(
            r#"{"session_id": "f", "actions": [{"timestamp": "2024-01-15 14:00:30", "action_type": "action", "action_label": "search"}]}"#,
        );
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_build_sessions_helper() {
        let records = RawRecordAdapter::parse_array(
            r#"[{"session_id": "a", "events": [{"cts": 1705327200000, "category": "SearchHit", "action": "click"}]}]"#,
        )
        .unwrap();
        let sessions = build_sessions(records, EventNormalizer::default());
        assert_eq!(sessions.len(), 1);
    }
}
