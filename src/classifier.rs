//! Session classification
//!
//! Labels a finalized session "Exploratory" or "Lookup" from four sequence-level
//! signals. Classification reads only the action list.

use crate::types::{Action, Session, SessionLabel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const EXTRACTION_TYPE: &str = "extraction";
const SEARCH_TERM_PREFIX: &str = "searchterm";
const DOCUMENT_ID_LABEL: &str = "docid";

/// Signals that together decide the session label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationSignals {
    /// More than one extracted search term
    pub iterative: bool,
    /// The same extracted document id seen twice
    pub opportunistic: bool,
    /// More than one distinct action type
    pub multi_tactical: bool,
    /// Some adjacent pair of actions differs in type
    pub unsystematic: bool,
}

impl ClassificationSignals {
    /// Derive the signals from an ordered action list
    pub fn from_actions(actions: &[Action]) -> Self {
        let search_terms = actions
            .iter()
            .filter(|a| {
                a.action_type == EXTRACTION_TYPE && a.action_label.starts_with(SEARCH_TERM_PREFIX)
            })
            .count();

        let mut document_views = HashSet::new();
        let opportunistic = actions
            .iter()
            .filter(|a| a.action_type == EXTRACTION_TYPE && a.action_label == DOCUMENT_ID_LABEL)
            .any(|a| !document_views.insert(a.params.as_str()));

        let action_types: HashSet<&str> =
            actions.iter().map(|a| a.action_type.as_str()).collect();

        let unsystematic = actions
            .windows(2)
            .any(|pair| pair[0].action_type != pair[1].action_type);

        Self {
            iterative: search_terms > 1,
            opportunistic,
            multi_tactical: action_types.len() > 1,
            unsystematic,
        }
    }

    /// Exploratory iff every signal holds
    pub fn label(&self) -> SessionLabel {
        if self.iterative && self.opportunistic && self.multi_tactical && self.unsystematic {
            SessionLabel::Exploratory
        } else {
            SessionLabel::Lookup
        }
    }
}

/// Classify a session's search strategy
pub fn classify(session: &Session) -> SessionLabel {
    classify_actions(&session.actions)
}

pub fn classify_actions(actions: &[Action]) -> SessionLabel {
    ClassificationSignals::from_actions(actions).label()
}
