//! Per-message reply policy — ignore list and skip list.
//!
//! Ignore entries are substring patterns against the raw `From` header:
//! identity-based exclusion. Skip entries are exact `(from, date, subject)`
//! triples identifying messages already handled. Both end processing for a
//! message with no side effects; they differ only in log semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::message::Tokens;

/// An already-handled message, identified by its exact header triple.
/// This triple — not [`Tokens::hash`] — is the cross-run identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkipEntry {
    pub from: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub subject: String,
}

/// Outcome of the policy check. `Process` is the only state that
/// continues the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Compose and send a reply.
    Process,
    /// Sender matches the ignore list; no reply, no report line.
    Ignore { pattern: String },
    /// Message matches a skip-list entry; no reply, no report line.
    Skip,
}

impl Decision {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::Ignore { .. } => "ignore",
            Self::Skip => "skip",
        }
    }
}

/// Policy engine, built once per run from the configured lists.
pub struct FilterEngine {
    ignore: Vec<String>,
    skip: Vec<SkipEntry>,
}

impl FilterEngine {
    pub fn new(ignore: Vec<String>, skip: Vec<SkipEntry>) -> Self {
        Self { ignore, skip }
    }

    /// Decide whether a message gets a reply. Ignore patterns are checked
    /// first, then the skip list; matching is case-sensitive.
    pub fn decide(&self, tokens: &Tokens) -> Decision {
        if let Some(pattern) = self
            .ignore
            .iter()
            .find(|p| tokens.from.contains(p.as_str()))
        {
            debug!(from = %tokens.from, pattern = %pattern, "sender matches ignore list");
            return Decision::Ignore {
                pattern: pattern.clone(),
            };
        }

        let already_handled = self.skip.iter().any(|entry| {
            entry.from == tokens.from
                && entry.date == tokens.date
                && entry.subject == tokens.subject
        });
        if already_handled {
            debug!(from = %tokens.from, subject = %tokens.subject, "message matches skip list");
            return Decision::Skip;
        }

        Decision::Process
    }
}
