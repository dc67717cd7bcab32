//! Search query extraction and rewriting
//!
//! Availability-button clicks embed the search that led to them in their URLs.
//! Queries are pulled from the `q`, `query` and `search` query-string parameters,
//! whitespace is collapsed and English stop-words are dropped.

use std::collections::HashSet;
use url::Url;

/// Query-string parameters that carry a search query, in extraction order
pub const QUERY_PARAMETERS: [&str; 3] = ["q", "query", "search"];

/// Base used to resolve relative URLs such as `/search?q=x`
const RELATIVE_BASE: &str = "http://localhost/";

/// English stop-word list
const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

/// A case-insensitive stop-word set
#[derive(Debug, Clone)]
pub struct StopWords {
    words: HashSet<String>,
}

impl Default for StopWords {
    fn default() -> Self {
        Self::english()
    }
}

impl StopWords {
    /// The standard English list
    pub fn english() -> Self {
        Self::from_words(ENGLISH_STOP_WORDS.iter().copied())
    }

    /// Build a set from arbitrary words
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Add more words to the set
    pub fn extend<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Drop stop-words from a query, keeping the remaining words in order
    pub fn rewrite(&self, query: &str) -> String {
        query
            .split_whitespace()
            .filter(|word| !self.contains(word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Collapse runs of whitespace into single spaces and trim
pub fn standardize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract search queries from the query strings of `urls`
///
/// Values are grouped by parameter name in `QUERY_PARAMETERS` order; blank values
/// are dropped. URLs that cannot be parsed contribute nothing.
pub fn extract_queries<'a, I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut queries = Vec::new();
    for raw in urls {
        let Some(url) = parse_url(raw) else {
            continue;
        };
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        for param in QUERY_PARAMETERS {
            queries.extend(
                pairs
                    .iter()
                    .filter(|(key, value)| key == param && !value.is_empty())
                    .map(|(_, value)| value.clone()),
            );
        }
    }
    queries
}

/// Extract, standardize and rewrite the queries embedded in `urls`, joined by commas
pub fn rewrite_embedded_queries<'a, I>(urls: I, stop_words: &StopWords) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    extract_queries(urls)
        .iter()
        .map(|query| stop_words.rewrite(&standardize_query(query)))
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_url(raw: &str) -> Option<Url> {
    Url::parse(raw).ok().or_else(|| {
        Url::parse(RELATIVE_BASE)
            .ok()
            .and_then(|base| base.join(raw).ok())
    })
}
