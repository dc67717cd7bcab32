//! Action taxonomy
//!
//! Maps each known action label of the digital library to a funnel stage. The
//! label set is closed: `ActionLabel` enumerates it, and runtime labels outside it
//! are simply not part of the funnel. A `Taxonomy` is an immutable value built
//! once and handed to the aggregator, so tests can inject alternates.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Funnel stage of an action label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FunnelStage {
    #[serde(rename = "Access Point")]
    AccessPoint,
    Object,
    Lookup,
    Transactional,
    #[serde(rename = "Drop-off")]
    DropOff,
}

impl FunnelStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelStage::AccessPoint => "Access Point",
            FunnelStage::Object => "Object",
            FunnelStage::Lookup => "Lookup",
            FunnelStage::Transactional => "Transactional",
            FunnelStage::DropOff => "Drop-off",
        }
    }
}

impl fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! action_labels {
    ($($variant:ident => $label:literal),+ $(,)?) => {
        /// Action labels known to the funnel
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ActionLabel {
            $($variant),+
        }

        impl ActionLabel {
            /// Every label, in reporting order
            pub const ALL: &'static [ActionLabel] = &[$(ActionLabel::$variant),+];

            /// The label as it appears in session data
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ActionLabel::$variant => $label),+
                }
            }
        }

        impl FromStr for ActionLabel {
            type Err = SessionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok(ActionLabel::$variant),)+
                    other => Err(SessionError::UnknownActionLabel(other.to_string())),
                }
            }
        }
    };
}

action_labels! {
    CtsSearch => "CTS_search",
    CtsSelect => "CTS_select",
    DeleteComment => "delete_comment",
    ExportBib => "export_bib",
    ExportCite => "export_cite",
    ExportMail => "export_mail",
    ExportSearchMail => "export_search_mail",
    GotoAbout => "goto_about",
    GotoAdvancedSearch => "goto_advanced_search",
    GotoAdvancedSearchReconf => "goto_advanced_search_reconf",
    GotoContribute => "goto_contribute",
    GotoCreateAccount => "goto_create_account",
    GotoDeleteAccount => "goto_delete_account",
    GotoEditPassword => "goto_edit_password",
    GotoFavorites => "goto_favorites",
    GotoFulltext => "goto_fulltext",
    GotoGoogleBooks => "goto_google_books",
    GotoGoogleScholar => "goto_google_scholar",
    GotoHistory => "goto_history",
    GotoHome => "goto_home",
    GotoImpressum => "goto_impressum",
    GotoLastSearch => "goto_last_search",
    GotoLocalAvailability => "goto_local_availability",
    GotoLogin => "goto_login",
    GotoPartner => "goto_partner",
    GotoSofis => "goto_sofis",
    GotoTeam => "goto_team",
    GotoThesaurus => "goto_thesaurus",
    GotoTopicFeeds => "goto_topic-feeds",
    GotoTopicResearch => "goto_topic-research",
    GotoTopicResearchUnique => "goto_topic-research-unique",
    PurgeHistory => "purge_history",
    SaveSearch => "save_search",
    SaveSearchHistory => "save_search_history",
    SaveToMultipleFavorites => "save_to_multiple_favorites",
    Search => "search",
    SearchAdvanced => "search_advanced",
    SearchAsRss => "search_as_rss",
    SearchChangeFacets => "search_change_facets",
    SearchChangeNohts => "search_change_nohts",
    SearchChangeNohts2 => "search_change_nohts_2",
    SearchChangeOnlyFulltext => "search_change_only_fulltext",
    SearchChangeOnlyFulltext2 => "search_change_only_fulltext_2",
    SearchChangePaging => "search_change_paging",
    SearchChangeSorting => "search_change_sorting",
    SearchFromHistory => "search_from_history",
    SearchInstitution => "search_institution",
    SearchKeyword => "search_keyword",
    SearchPerson => "search_person",
    SearchThesaurus => "search_thesaurus",
    ToFavorites => "to_favorites",
    ViewCitation => "view_citation",
    ViewComment => "view_comment",
    ViewDescription => "view_description",
    ViewRecord => "view_record",
    ViewReferences => "view_references",
    ViewDocRec => "view_doc_rec",
    QueryForm => "query_form",
}

impl ActionLabel {
    /// Stage of this label in the standard taxonomy
    pub fn standard_stage(&self) -> FunnelStage {
        use ActionLabel::*;
        use FunnelStage::*;

        match self {
            DeleteComment | PurgeHistory => DropOff,
            ExportBib | ExportCite | ExportMail | ExportSearchMail | GotoFulltext
            | GotoGoogleBooks | GotoGoogleScholar | GotoLocalAvailability | ViewRecord
            | ViewDocRec => Object,
            GotoAbout | GotoImpressum | GotoPartner | GotoSofis | GotoTeam | ViewCitation
            | ViewComment | ViewDescription | ViewReferences => FunnelStage::Lookup,
            GotoCreateAccount | GotoDeleteAccount | GotoEditPassword | GotoLogin | SaveSearch
            | SaveSearchHistory | SaveToMultipleFavorites | ToFavorites => Transactional,
            _ => AccessPoint,
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable mapping from action label to funnel stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taxonomy {
    stages: BTreeMap<ActionLabel, FunnelStage>,
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::standard()
    }
}

impl Taxonomy {
    /// The digital library's standard taxonomy
    pub fn standard() -> Self {
        Self::from_entries(
            ActionLabel::ALL
                .iter()
                .map(|label| (*label, label.standard_stage())),
        )
    }

    /// Build a taxonomy from explicit entries
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (ActionLabel, FunnelStage)>,
    {
        Self {
            stages: entries.into_iter().collect(),
        }
    }

    /// Replace the stage of known labels; unknown label names are an error
    pub fn with_overrides(
        mut self,
        overrides: &BTreeMap<String, FunnelStage>,
    ) -> Result<Self, SessionError> {
        for (name, stage) in overrides {
            let label: ActionLabel = name.parse()?;
            self.stages.insert(label, *stage);
        }
        Ok(self)
    }

    /// Resolve a runtime label to a taxonomy entry, `None` if it is not covered
    pub fn resolve(&self, label: &str) -> Option<ActionLabel> {
        label
            .parse::<ActionLabel>()
            .ok()
            .filter(|parsed| self.stages.contains_key(parsed))
    }

    pub fn stage(&self, label: ActionLabel) -> Option<FunnelStage> {
        self.stages.get(&label).copied()
    }

    /// Covered labels in reporting order
    pub fn labels(&self) -> impl Iterator<Item = ActionLabel> + '_ {
        self.stages.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_taxonomy_covers_all_labels() {
        let taxonomy = Taxonomy::standard();
        assert_eq!(taxonomy.len(), 58);
        assert_eq!(taxonomy.stage(ActionLabel::Search), Some(FunnelStage::AccessPoint));
        assert_eq!(taxonomy.stage(ActionLabel::ViewRecord), Some(FunnelStage::Object));
        assert_eq!(taxonomy.stage(ActionLabel::GotoAbout), Some(FunnelStage::Lookup));
        assert_eq!(taxonomy.stage(ActionLabel::GotoLogin), Some(FunnelStage::Transactional));
        assert_eq!(taxonomy.stage(ActionLabel::PurgeHistory), Some(FunnelStage::DropOff));
        assert_eq!(taxonomy.stage(ActionLabel::QueryForm), Some(FunnelStage::AccessPoint));
    }

    #[test]
    fn test_label_round_trip() {
        for label in ActionLabel::ALL {
            assert_eq!(label.as_str().parse::<ActionLabel>().unwrap(), *label);
        }
        assert!("click".parse::<ActionLabel>().is_err());
    }

    #[test]
    fn test_labels_keep_reporting_order() {
        let labels: Vec<_> = Taxonomy::standard().labels().take(3).collect();
        assert_eq!(
            labels,
            vec![ActionLabel::CtsSearch, ActionLabel::CtsSelect, ActionLabel::DeleteComment]
        );
    }

    #[test]
    fn test_resolve_respects_injected_taxonomy() {
        let taxonomy = Taxonomy::from_entries([(ActionLabel::Search, FunnelStage::AccessPoint)]);
        assert_eq!(taxonomy.resolve("search"), Some(ActionLabel::Search));
        assert_eq!(taxonomy.resolve("view_record"), None);
        assert_eq!(taxonomy.resolve("not_a_label"), None);
    }

    #[test]
    fn test_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("view_record".to_string(), FunnelStage::Lookup);
        let taxonomy = Taxonomy::standard().with_overrides(&overrides).unwrap();
        assert_eq!(taxonomy.stage(ActionLabel::ViewRecord), Some(FunnelStage::Lookup));

        overrides.insert("view_recrod".to_string(), FunnelStage::Lookup);
        let result = Taxonomy::standard().with_overrides(&overrides);
        assert!(matches!(result, Err(SessionError::UnknownActionLabel(name)) if name == "view_recrod"));
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(
            serde_json::to_string(&FunnelStage::AccessPoint).unwrap(),
            "\"Access Point\""
        );
        let stage: FunnelStage = serde_json::from_str("\"Drop-off\"").unwrap();
        assert_eq!(stage, FunnelStage::DropOff);
    }
}
