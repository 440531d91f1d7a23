//! Pipeline output types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::TransportError;
use crate::message::Tokens;

/// One reply that reached send (or dry-run). Appended in source order,
/// never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ReportLine {
    #[serde(flatten)]
    pub tokens: Tokens,
    pub sent_at: DateTime<Utc>,
    pub recipient: String,
}

/// A transport failure that aborted the run. Report lines collected
/// before the failure are preserved and carried along.
#[derive(Debug, thiserror::Error)]
#[error("run aborted by transport failure: {source}")]
pub struct RunError {
    #[source]
    pub source: TransportError,
    pub report: Vec<ReportLine>,
}
