//! Core session types
//!
//! This module defines the canonical `Action` and `Session` records that flow
//! from the session builder into classification, query metrics and the funnel
//! aggregator, along with the fixed-width timestamp format they persist with.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp format used by persisted sessions and actions
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Action label that marks a click
pub const CLICK_LABEL: &str = "click";

/// User id recorded for anonymous sessions
pub const ANONYMOUS_USER_ID: i64 = -1;

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS`
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// One normalized user or system event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Opaque identifier (the source `cts` for normalized events)
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub action_id: i64,
    /// When the action happened, second precision
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    /// Event category, e.g. `PageView`, `extraction`, `action`
    pub action_type: String,
    /// Specific action name within the category
    pub action_label: String,
    /// Seconds since the previous action of the same session
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub action_length: i64,
    /// Category-dependent payload rendered as text
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub params: String,
    /// Category of the previous click in the session, empty if none
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub origin_action: String,
}

impl Action {
    pub fn is_click(&self) -> bool {
        self.action_label == CLICK_LABEL
    }

    /// Whitespace-separated terms of `params`
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.params.split_whitespace()
    }
}

/// One reconstructed user visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    /// `end_date - start_date` in whole seconds
    #[serde(default, deserialize_with = "lenient::i64_or_zero")]
    pub session_length: i64,
    #[serde(default = "anonymous_user", deserialize_with = "lenient::user_id")]
    pub user_id: i64,
    #[serde(default, with = "optional_timestamp_format")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(default, with = "optional_timestamp_format")]
    pub end_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Whether any action is a click; not persisted
    #[serde(skip)]
    pub has_click: bool,
}

fn anonymous_user() -> i64 {
    ANONYMOUS_USER_ID
}

impl Session {
    /// Create an empty anonymous session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            session_length: 0,
            user_id: ANONYMOUS_USER_ID,
            start_date: None,
            end_date: None,
            actions: Vec::new(),
            has_click: false,
        }
    }

    /// Append an action, widening the date bounds and the click flag
    pub fn push_action(&mut self, action: Action) {
        if action.is_click() {
            self.has_click = true;
        }
        self.widen(action.timestamp);
        self.actions.push(action);
    }

    /// Widen `start_date`/`end_date` so they include `ts`
    pub fn widen(&mut self, ts: NaiveDateTime) {
        if self.start_date.map_or(true, |start| ts < start) {
            self.start_date = Some(ts);
        }
        if self.end_date.map_or(true, |end| ts > end) {
            self.end_date = Some(ts);
        }
    }

    /// Recompute `session_length` once both bounds are known
    pub fn recompute_length(&mut self) {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            self.session_length = (end - start).num_seconds();
        }
    }

    /// Re-derive the click flag from the action list (for loaded sessions)
    pub fn refresh_click_flag(&mut self) {
        self.has_click = self.actions.iter().any(Action::is_click);
    }

    /// Duration between the date bounds in minutes, 0 if unknown
    pub fn duration_minutes(&self) -> f64 {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => (end - start).num_seconds() as f64 / 60.0,
            _ => 0.0,
        }
    }

    /// A bounce is a session with exactly one action
    pub fn is_bounce(&self) -> bool {
        self.actions.len() == 1
    }
}

/// Search strategy assigned to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionLabel {
    Exploratory,
    Lookup,
}

impl SessionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionLabel::Exploratory => "Exploratory",
            SessionLabel::Lookup => "Lookup",
        }
    }
}

impl fmt::Display for SessionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) mod timestamp_format {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}

pub(crate) mod optional_timestamp_format {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        ts: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match ts {
            Some(ts) => s.serialize_str(&format_timestamp(ts)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw))),
        }
    }
}

/// Deserializers that degrade malformed scalar fields to defaults
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Render a JSON value as payload text: strings verbatim, null as empty
    pub fn value_to_string(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn value_to_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
            _ => None,
        }
    }

    pub fn string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(value_to_string(&Value::deserialize(d)?))
    }

    pub fn i64_or_zero<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(value_to_i64(&Value::deserialize(d)?).unwrap_or(0))
    }

    pub fn user_id<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        Ok(value_to_i64(&Value::deserialize(d)?).unwrap_or(super::ANONYMOUS_USER_ID))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    fn action(label: &str, at: &str) -> Action {
        Action {
            action_id: 0,
            timestamp: ts(at),
            action_type: "action".to_string(),
            action_label: label.to_string(),
            action_length: 0,
            params: String::new(),
            origin_action: String::new(),
        }
    }

    #[test]
    fn test_session_serialization_omits_click_flag() {
        let mut session = Session::new("s-1");
        session.push_action(action("click", "2024-01-15 14:00:00"));
        session.recompute_length();

        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("has_click").is_none());
        assert_eq!(json["start_date"], "2024-01-15 14:00:00");
        assert_eq!(json["user_id"], -1);
        assert_eq!(json["actions"][0]["timestamp"], "2024-01-15 14:00:00");
    }

    #[test]
    fn test_widen_is_order_independent() {
        let mut session = Session::new("s-1");
        session.push_action(action("search", "2024-01-15 14:05:00"));
        session.push_action(action("search", "2024-01-15 14:00:00"));
        session.push_action(action("search", "2024-01-15 14:02:00"));
        session.recompute_length();

        assert_eq!(session.start_date, Some(ts("2024-01-15 14:00:00")));
        assert_eq!(session.end_date, Some(ts("2024-01-15 14:05:00")));
        assert_eq!(session.session_length, 300);
    }

    #[test]
    fn test_lenient_action_fields() {
        let json = r#"{
            "timestamp": "2024-01-15 14:00:00",
            "action_type": "extraction",
            "action_label": "searchterm_1",
            "action_length": 4.6,
            "params": {"Query": "cats"}
        }"#;

        let action: Action = serde_json::from_str(json).unwrap();
        assert_eq!(action.action_id, 0);
        assert_eq!(action.action_length, 5);
        assert_eq!(action.params, r#"{"Query":"cats"}"#);
        assert_eq!(action.origin_action, "");
    }

    #[test]
    fn test_session_deserialization_defaults() {
        let json = r#"{
            "session_id": "abc",
            "session_length": 12.0,
            "start_date": "2024-01-15 14:00:00",
            "end_date": "2024-01-15 14:00:12",
            "actions": []
        }"#;

        let session: Session = serde_json::from_str(json).unwrap();
        assert_eq!(session.user_id, ANONYMOUS_USER_ID);
        assert_eq!(session.session_length, 12);
        assert!((session.duration_minutes() - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_session_label_serialization() {
        let json = serde_json::to_string(&SessionLabel::Exploratory).unwrap();
        assert_eq!(json, "\"Exploratory\"");
        assert_eq!(SessionLabel::Lookup.to_string(), "Lookup");
    }
}
