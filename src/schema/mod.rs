//! Clickstream input schema
//!
//! This module defines the raw event records captured by the web application and
//! the adapter that parses NDJSON batches of them.

mod adapter;
mod raw_event;

pub use adapter::*;
pub use raw_event::*;
