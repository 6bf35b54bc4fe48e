//! Activity Aggregation Engine: deterministic, rule-based.
//!
//! Classifies work-item change history, rolls items up into initiative and
//! sub-initiative nodes with risk scores, links pull requests to items, and
//! emits per-team weekly summaries as JSON and Markdown.
//!
//! No network, no DB; pure computation plus one watermark file.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod date;
pub mod engine;
pub mod error;
pub mod fields;
pub mod hierarchy;
pub mod links;
pub mod normalize;
pub mod risk;
pub mod state;
pub mod types;

pub use config::Config;
pub use date::DateRange;
pub use engine::Engine;
pub use error::EngineError;
pub use types::{ReportInput, ReportOutput, TeamSummary, WorkItem};
