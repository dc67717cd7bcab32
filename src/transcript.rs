//! Human-readable session transcripts
//!
//! One line per action:
//!
//! ```text
//! Time spent: 12 seconds; Action Type: extraction; Action Label: searchterm_1; Params: climate
//! ```
//!
//! The time is the gap from the previous action (from the session start for the
//! first one). Decoding is tolerant: lines that do not match are skipped, which
//! lets free text produced by a generator be read back.

use crate::types::{Action, Session, ANONYMOUS_USER_ID};
use chrono::{Duration, NaiveDateTime, Timelike};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn transcript_line_re() -> &'static Regex {
    static TRANSCRIPT_LINE_RE: OnceLock<Regex> = OnceLock::new();
    TRANSCRIPT_LINE_RE.get_or_init(|| {
        Regex::new(
            r"^Time spent: (\d+\.\d+|\d+) seconds; Action Type: (.*?); Action Label: (.*?)(?:; Params: (.*))?$",
        )
        .expect("valid transcript line regex")
    })
}

/// Encode a session as a transcript
pub fn encode_transcript(session: &Session) -> String {
    let Some(first) = session.actions.first() else {
        return String::new();
    };
    let mut previous = session.start_date.unwrap_or(first.timestamp);

    session
        .actions
        .iter()
        .map(|action| {
            // An out-of-order action gets a zero gap and does not move the clock back
            let gap = (action.timestamp - previous).num_seconds().max(0);
            previous = previous.max(action.timestamp);
            encode_line(gap, action)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn encode_line(gap: i64, action: &Action) -> String {
    let mut line = format!(
        "Time spent: {} seconds; Action Type: {}; Action Label: {}",
        gap, action.action_type, action.action_label
    );
    if !action.params.is_empty() {
        line.push_str("; Params: ");
        // Params must stay on their action's line
        line.extend(
            action
                .params
                .chars()
                .map(|c| if matches!(c, '\n' | '\r') { ' ' } else { c }),
        );
    }
    line
}

/// Decoder that rebuilds a session from a transcript and a known start date
#[derive(Debug, Clone)]
pub struct TranscriptDecoder {
    start_date: NaiveDateTime,
    session_id: String,
    user_id: i64,
    end_date: Option<NaiveDateTime>,
}

impl TranscriptDecoder {
    pub fn new(start_date: NaiveDateTime) -> Self {
        Self {
            start_date,
            session_id: String::new(),
            user_id: ANONYMOUS_USER_ID,
            end_date: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = user_id;
        self
    }

    /// Use a fixed end date instead of the last decoded timestamp
    pub fn with_end_date(mut self, end_date: NaiveDateTime) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn decode(&self, transcript: &str) -> Session {
        let mut session = Session::new(self.session_id.clone());
        session.user_id = self.user_id;

        let mut current = self.start_date;
        let mut previous_second = truncate_to_second(current);
        let mut skipped = 0usize;

        for line in transcript.trim().lines() {
            let Some(caps) = transcript_line_re().captures(line.trim()) else {
                skipped += 1;
                continue;
            };
            let Ok(seconds) = caps[1].parse::<f64>() else {
                skipped += 1;
                continue;
            };

            current += Duration::microseconds((seconds * 1_000_000.0).round() as i64);
            let timestamp = truncate_to_second(current);

            session.actions.push(Action {
                action_id: timestamp.and_utc().timestamp_millis(),
                timestamp,
                action_type: caps[2].to_string(),
                action_label: caps[3].to_string(),
                action_length: (timestamp - previous_second).num_seconds(),
                params: caps
                    .get(4)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
                origin_action: String::new(),
            });
            previous_second = timestamp;
        }

        if skipped > 0 {
            debug!(skipped, "skipped non-matching transcript lines");
        }

        session.start_date = Some(self.start_date);
        session.end_date = Some(self.end_date.unwrap_or_else(|| truncate_to_second(current)));
        session.session_length = (current - self.start_date).num_seconds();
        session.refresh_click_flag();
        session
    }
}

/// Decode a transcript that starts at `start_date`
pub fn decode_transcript(transcript: &str, start_date: NaiveDateTime) -> Session {
    TranscriptDecoder::new(start_date).decode(transcript)
}

fn truncate_to_second(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_nanosecond(0).unwrap_or(ts)
}
