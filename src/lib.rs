//! clickflow - Session reconstruction and search-behavior analytics
//!
//! clickflow turns raw digital-library clickstream batches into sessions and
//! behavioral statistics through a deterministic pipeline: record parsing →
//! event normalization → session building → classification and query metrics
//! → funnel aggregation and corpus summary.
//!
//! ## Modules
//!
//! - **Sessions**: parse raw records, normalize events, rebuild sessions
//! - **Analytics**: classify sessions, query metrics, funnel, corpus summary,
//!   side-by-side corpus comparison
//! - **Transcripts**: human-readable session encoding and synthetic sessions

pub mod analysis;
pub mod builder;
pub mod classifier;
pub mod compare;
pub mod config;
pub mod corpus;
pub mod error;
pub mod funnel;
pub mod normalizer;
pub mod pipeline;
pub mod query;
pub mod query_metrics;
pub mod report;
pub mod schema;
pub mod summary;
pub mod synthesis;
pub mod taxonomy;
pub mod transcript;
pub mod types;

pub use analysis::SessionAnalysis;
pub use builder::{build_sessions, SessionBuilder};
pub use classifier::{classify, ClassificationSignals};
pub use compare::{compare_corpora, CorpusComparison, CorpusProfile};
pub use config::AnalysisConfig;
pub use error::SessionError;
pub use funnel::{aggregate_funnel, FunnelAggregator, FunnelRow, FunnelStat};
pub use normalizer::{EventNormalizer, SessionCursor};
pub use pipeline::{
    analyze_corpus, sessions_from_ndjson, CorpusAnalysis, IngestStats, InputFormat, SessionProcessor,
};
pub use query_metrics::QueryMetrics;
pub use summary::{summarize, CorpusSummary, DistributionCaps};
pub use taxonomy::{ActionLabel, FunnelStage, Taxonomy};
pub use transcript::{decode_transcript, encode_transcript, TranscriptDecoder};
pub use types::{Action, Session, SessionLabel};

// Schema exports
pub use schema::{RawEvent, RawRecordAdapter, SessionRecord};

/// clickflow version embedded in JSON reports
pub const CLICKFLOW_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for JSON reports
pub const PRODUCER_NAME: &str = "clickflow";
