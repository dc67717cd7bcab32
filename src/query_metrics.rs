//! Query-level descriptive statistics for one session
//!
//! Query-bearing actions carry the query text in `params` (`query_form` and
//! `searchterm_1` .. `searchterm_4`). Query-issuing actions are those whose
//! label starts with `search`, plus every query-bearing action.

use crate::types::{Action, Session};
use serde::Serialize;
use std::collections::HashSet;

/// Labels whose `params` hold a query
pub const QUERY_BEARING_LABELS: [&str; 5] = [
    "query_form",
    "searchterm_1",
    "searchterm_2",
    "searchterm_3",
    "searchterm_4",
];

/// Substrings that mark an advanced search operator
pub const SEARCH_OPERATORS: [&str; 8] = ["AND", "OR", "NOT", "\"", "(", ")", "*", "?"];

const QUERY_ISSUING_PREFIX: &str = "search";

pub fn is_query_bearing(label: &str) -> bool {
    QUERY_BEARING_LABELS.contains(&label)
}

pub fn is_query_issuing(label: &str) -> bool {
    label.starts_with(QUERY_ISSUING_PREFIX) || is_query_bearing(label)
}

/// Whether `params` contains any advanced operator (plain substring match)
pub fn has_search_operator(params: &str) -> bool {
    SEARCH_OPERATORS.iter().any(|op| params.contains(op))
}

fn query_bearing(actions: &[Action]) -> impl Iterator<Item = &Action> {
    actions.iter().filter(|a| is_query_bearing(&a.action_label))
}

/// Number of query-issuing actions
pub fn count_queries(actions: &[Action]) -> usize {
    actions
        .iter()
        .filter(|a| is_query_issuing(&a.action_label))
        .count()
}

/// Character and term lengths of every query-bearing action, in order
pub fn query_lengths(actions: &[Action]) -> (Vec<usize>, Vec<usize>) {
    query_bearing(actions)
        .map(|a| (a.params.chars().count(), a.terms().count()))
        .unzip()
}

/// Whitespace token count of each query-bearing action
pub fn query_tokens(actions: &[Action]) -> Vec<usize> {
    query_bearing(actions).map(|a| a.terms().count()).collect()
}

/// Distinct terms divided by the number of query-bearing actions
pub fn term_diversity(actions: &[Action]) -> f64 {
    let mut terms = HashSet::new();
    let mut queries = 0usize;
    for action in query_bearing(actions) {
        queries += 1;
        terms.extend(action.terms());
    }
    if queries == 0 {
        return 0.0;
    }
    terms.len() as f64 / queries as f64
}

/// Percentage of query-issuing actions that use an advanced operator
pub fn operator_share(actions: &[Action]) -> f64 {
    let total = count_queries(actions);
    if total == 0 {
        return 0.0;
    }
    let with_operators = actions
        .iter()
        .filter(|a| is_query_issuing(&a.action_label) && has_search_operator(&a.params))
        .count();
    with_operators as f64 / total as f64 * 100.0
}

/// All query metrics of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetrics {
    pub query_count: usize,
    pub lengths_chars: Vec<usize>,
    pub lengths_terms: Vec<usize>,
    pub term_diversity: f64,
    pub operator_share: f64,
    pub total_tokens: usize,
    /// `query_count / total_tokens`, absent when there are no tokens
    pub queries_to_tokens_ratio: Option<f64>,
}

impl QueryMetrics {
    pub fn from_actions(actions: &[Action]) -> Self {
        let query_count = count_queries(actions);
        let (lengths_chars, lengths_terms) = query_lengths(actions);
        let total_tokens: usize = lengths_terms.iter().sum();

        Self {
            query_count,
            term_diversity: term_diversity(actions),
            operator_share: operator_share(actions),
            total_tokens,
            queries_to_tokens_ratio: (total_tokens > 0)
                .then(|| query_count as f64 / total_tokens as f64),
            lengths_chars,
            lengths_terms,
        }
    }

    pub fn from_session(session: &Session) -> Self {
        Self::from_actions(&session.actions)
    }
}
