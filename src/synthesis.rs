//! Synthetic session generation
//!
//! The text generator is an opaque collaborator: it receives a prompt and returns
//! free text with no format guarantee. This module owns everything around that
//! call: remapping the seed session into taxonomy vocabulary, encoding it as a
//! transcript, building the prompt, and tolerantly decoding the reply.

use crate::error::SessionError;
use crate::taxonomy::{ActionLabel, Taxonomy};
use crate::transcript::{encode_transcript, TranscriptDecoder};
use crate::types::Session;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A prompt for the text generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Role and vocabulary instructions
    pub system: String,
    /// The concrete request
    pub user: String,
}

/// Opaque text-generation collaborator
pub trait TextGenerator {
    fn generate(&self, prompt: &Prompt) -> Result<String, SessionError>;
}

impl<F> TextGenerator for F
where
    F: Fn(&Prompt) -> Result<String, SessionError>,
{
    fn generate(&self, prompt: &Prompt) -> Result<String, SessionError> {
        self(prompt)
    }
}

/// Event category to candidate taxonomy labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMapping {
    candidates: BTreeMap<String, Vec<ActionLabel>>,
}

impl Default for CategoryMapping {
    fn default() -> Self {
        Self::standard()
    }
}

impl CategoryMapping {
    /// Mapping for the clickstream categories of the digital library
    pub fn standard() -> Self {
        use ActionLabel::*;

        let entries: [(&str, &[ActionLabel]); 22] = [
            ("AdvancedSearch", &[GotoAdvancedSearch, SearchAdvanced]),
            ("AvailabilityButton", &[GotoLocalAvailability]),
            ("Chaining", &[SearchChangeSorting, SearchChangeFacets, SearchChangeNohts]),
            ("ExternalLink", &[GotoGoogleBooks, GotoGoogleScholar]),
            ("FacetEvent", &[SearchChangeFacets]),
            ("GenericClick", &[GotoHome, Search]),
            ("GenericLink", &[GotoHome, Search]),
            ("GoogleBooksPreview", &[GotoGoogleBooks]),
            ("PageView", &[GotoHome]),
            ("PaginationClick", &[SearchChangePaging]),
            ("RecordAbstractToggle", &[ViewDescription]),
            ("RecordExport", &[ExportBib, ExportCite, ExportMail]),
            ("RecordMLT", &[ViewDocRec]),
            ("RecordOrderForm", &[]),
            ("RecordResultsScroller", &[SearchChangePaging]),
            ("RecordSave", &[SaveToMultipleFavorites, SaveSearch]),
            ("RecordTab", &[SearchChangeFacets]),
            ("SearchHit", &[Search]),
            ("SearchHit2", &[Search]),
            ("SearchSubmit", &[Search]),
            ("SocialNet", &[ExportSearchMail]),
            ("SpellingSuggestionClick", &[SearchChangeFacets]),
        ];

        Self::from_entries(
            entries
                .into_iter()
                .map(|(category, labels)| (category.to_string(), labels.to_vec())),
        )
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<ActionLabel>)>,
    {
        Self {
            candidates: entries.into_iter().collect(),
        }
    }

    pub fn candidates(&self, category: &str) -> &[ActionLabel] {
        self.candidates
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// First candidate label for `category`, `None` if unmapped or empty
    pub fn remap(&self, category: &str) -> Option<ActionLabel> {
        self.candidates(category).first().copied()
    }

    /// Copy of `session` with every mapped action type replaced by its label
    pub fn remap_session(&self, session: &Session) -> Session {
        let mut remapped = session.clone();
        for action in &mut remapped.actions {
            if let Some(label) = self.remap(&action.action_type) {
                action.action_type = label.as_str().to_string();
            }
        }
        remapped
    }
}

/// Inputs of one synthesis run
#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    pub seed: &'a Session,
    pub topic: &'a str,
    /// Start date of the generated session; defaults to the seed's
    pub start_date: Option<NaiveDateTime>,
    pub session_id: String,
}

/// Build the generator prompt for a seed transcript
pub fn build_prompt(topic: &str, transcript: &str, taxonomy: &Taxonomy) -> Prompt {
    let labels = taxonomy
        .labels()
        .map(|label| label.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let system = format!(
        "You generate synthetic user actions for an academic digital library, modeled on \
         recorded search and browsing sessions. Actions must be plausible for the given \
         search context. Available action labels: {}",
        labels
    );
    let user = format!(
        "Topic: {topic}\nReference session:\n{transcript}\n\
         Reply with the user's actions only, one per line, in the form:\n\
         Time spent: <seconds> seconds; Action Type: <action_type>; Action Label: <action_label>; Params: <params>\n\
         Stop once the information need is satisfied. Each search uses a single search term.",
    );

    Prompt { system, user }
}

/// Generate a synthetic session from a seed session
pub fn synthesize_session(
    request: &SynthesisRequest<'_>,
    mapping: &CategoryMapping,
    taxonomy: &Taxonomy,
    generator: &dyn TextGenerator,
) -> Result<Session, SessionError> {
    let start_date = request
        .start_date
        .or(request.seed.start_date)
        .ok_or_else(|| SessionError::MissingField("start_date".to_string()))?;

    let remapped = mapping.remap_session(request.seed);
    let transcript = encode_transcript(&remapped);
    let prompt = build_prompt(request.topic, &transcript, taxonomy);

    debug!(
        seed = %request.seed.session_id,
        topic = request.topic,
        actions = remapped.actions.len(),
        "requesting synthetic session"
    );
    let reply = generator.generate(&prompt)?;

    let session = TranscriptDecoder::new(start_date)
        .with_session_id(request.session_id.clone())
        .with_user_id(request.seed.user_id)
        .decode(&reply);

    info!(
        session_id = %session.session_id,
        actions = session.actions.len(),
        "synthetic session decoded"
    );
    Ok(session)
}
