//! Analysis orchestrator: turns stored artifacts plus a question into backend requests.
//!
//! The single-file path forwards one extracted payload (images travel as vision requests).
//! The multi-file path extracts every member, replaces failures with placeholders, truncates
//! each payload to the per-file budget, and issues exactly one combined call.

mod batch;
pub mod prompts;
mod service;
mod types;

pub use batch::{BatchLimits, TRUNCATION_MARKER, render_batch_prompt, truncate_content};
pub use service::{AnalysisApi, AnalysisService};
pub use types::{AnalysisEntry, AnalysisError, AnalysisRequest, EntryContent};
