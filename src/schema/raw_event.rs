//! Raw clickstream record schema
//!
//! Two record shapes arrive on the input side:
//! - event batches `{session_id, events: [...]}` as captured by the web application
//! - already-flattened sessions `{session_id, start_date, end_date, actions: [...]}`
//!
//! Event payloads vary by category; `EventPayload` gives each category its own
//! decoding rule instead of ad hoc field probing.

use crate::types::{
    lenient, optional_timestamp_format, Action, ANONYMOUS_USER_ID, CLICK_LABEL,
};
use chrono::NaiveDateTime;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Category whose events carry a list of recommended record ids
pub const RECORD_MLT_CATEGORY: &str = "RecordMLT";

/// Category whose events carry a page view identifier
pub const PAGE_VIEW_CATEGORY: &str = "PageView";

/// Category whose click events embed search URLs
pub const AVAILABILITY_BUTTON_CATEGORY: &str = "AvailabilityButton";

/// A single raw event as logged by the web application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvent {
    /// Client timestamp in epoch milliseconds
    #[serde(deserialize_with = "epoch_millis")]
    pub cts: i64,
    /// Event category (becomes `action_type`)
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub category: String,
    /// Event action (becomes `action_label`)
    #[serde(default, deserialize_with = "lenient::string_or_empty")]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_action: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_view_id: Option<Value>,
}

/// Category-specific payload of a raw event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload<'a> {
    /// "More like this" recommendations
    RecordMlt { record_ids: Vec<String> },
    /// Page load
    PageView { page_view_id: String },
    /// Availability button click with embedded search URLs
    AvailabilityClick { urls: Vec<&'a str> },
    /// Any other event; carries its raw `params`
    Generic { params: String },
}

impl RawEvent {
    pub fn is_click(&self) -> bool {
        self.action == CLICK_LABEL
    }

    /// Decode the category-specific payload
    pub fn payload(&self) -> EventPayload<'_> {
        match self.category.as_str() {
            RECORD_MLT_CATEGORY => EventPayload::RecordMlt {
                record_ids: self
                    .data_field("record_ids")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().map(lenient::value_to_string).collect())
                    .unwrap_or_default(),
            },
            PAGE_VIEW_CATEGORY => EventPayload::PageView {
                page_view_id: self
                    .page_view_id
                    .as_ref()
                    .map(lenient::value_to_string)
                    .unwrap_or_default(),
            },
            AVAILABILITY_BUTTON_CATEGORY if self.is_click() => EventPayload::AvailabilityClick {
                urls: ["url", "href"]
                    .iter()
                    .filter_map(|key| self.data_field(key).and_then(Value::as_str))
                    .collect(),
            },
            _ => EventPayload::Generic {
                params: self
                    .params
                    .as_ref()
                    .map(lenient::value_to_string)
                    .unwrap_or_default(),
            },
        }
    }

    /// Origin as logged by the web application ("" when absent)
    pub fn logged_origin(&self) -> String {
        self.origin_action
            .as_ref()
            .map(lenient::value_to_string)
            .unwrap_or_default()
    }

    fn data_field(&self, key: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get(key))
    }
}

/// A batch of raw events belonging to one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSessionRecord {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub session_id: String,
    pub events: Vec<RawEvent>,
}

/// An already-flattened session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlattenedSessionRecord {
    #[serde(deserialize_with = "lenient::string_or_empty")]
    pub session_id: String,
    #[serde(default = "anonymous_user", deserialize_with = "lenient::user_id")]
    pub user_id: i64,
    #[serde(default, with = "optional_timestamp_format")]
    pub start_date: Option<NaiveDateTime>,
    #[serde(default, with = "optional_timestamp_format")]
    pub end_date: Option<NaiveDateTime>,
    pub actions: Vec<Action>,
}

fn anonymous_user() -> i64 {
    ANONYMOUS_USER_ID
}

/// Any record accepted by the session builder
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionRecord {
    Events(RawSessionRecord),
    Flattened(FlattenedSessionRecord),
}

impl SessionRecord {
    pub fn session_id(&self) -> &str {
        match self {
            SessionRecord::Events(record) => &record.session_id,
            SessionRecord::Flattened(record) => &record.session_id,
        }
    }
}

fn epoch_millis<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(d)?;
    lenient::value_to_i64(&value)
        .ok_or_else(|| de::Error::custom(format!("invalid epoch milliseconds: {}", value)))
}
