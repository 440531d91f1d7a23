//! Pipeline driver — sequences fetch → extract → filter → compose →
//! (send | dry-run) → report for each message in source order.
//!
//! Per-message states: Fetched → TokenExtracted → {Ignored | Skipped |
//! Composed} → {Sent | DryRun}. Ignored/Skipped are terminal with no
//! report line; Sent and DryRun each produce exactly one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use lettre::message::Mailbox;
use mail_parser::MessageParser;
use tracing::{debug, info, warn};

use crate::channels::{MailTransport, RawMail};
use crate::config::ReplyConfig;
use crate::error::{AssembleError, ConfigError, TransportError};
use crate::filter::{Decision, FilterEngine};
use crate::message::{Tokens, banner, compose};
use crate::outbound::{self, ThreadingHeaders};
use crate::pipeline::types::{ReportLine, RunError};

/// The mass-reply pipeline. Holds the immutable per-run configuration
/// and a cancellation flag checked between messages — never
/// mid-composition, so an in-flight reply is always fully sent or not
/// sent.
pub struct Pipeline {
    reply: ReplyConfig,
    filter: FilterEngine,
    fallback_from: Mailbox,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    /// `envelope_user` is the transport's own address, used as the reply
    /// `From` when no sender override is configured.
    pub fn new(
        reply: ReplyConfig,
        envelope_user: &str,
        cancel: Arc<AtomicBool>,
    ) -> Result<Self, ConfigError> {
        let fallback_from: Mailbox =
            envelope_user
                .parse()
                .map_err(|e: lettre::address::AddressError| ConfigError::InvalidValue {
                    key: "MASSREPLY_SMTP_USER".to_string(),
                    message: format!("not a mailbox address: {e}"),
                })?;
        let filter = FilterEngine::new(reply.ignore.clone(), reply.skip.clone());

        Ok(Self {
            reply,
            filter,
            fallback_from,
            cancel,
        })
    }

    /// Run the pipeline over `source`, sending through `transport`.
    ///
    /// Returns the ordered report, one line per reply sent (or dry-run).
    /// A transport failure aborts the run and carries the lines
    /// collected so far.
    pub fn run(
        &self,
        source: impl IntoIterator<Item = Result<RawMail, TransportError>>,
        transport: &mut dyn MailTransport,
    ) -> Result<Vec<ReportLine>, RunError> {
        let mut report = Vec::new();
        let parser = MessageParser::default();
        let dry_run = self.reply.dry_run;

        for fetched in source {
            if self.cancel.load(Ordering::Relaxed) {
                info!("cancellation requested, stopping between messages");
                break;
            }

            let raw = match fetched {
                Ok(raw) => raw,
                Err(source) => return Err(RunError { source, report }),
            };

            let Some(parsed) = parser.parse(raw.body.as_slice()) else {
                warn!(uid = %raw.uid, "unparsable message, skipping");
                continue;
            };

            let tokens = Tokens::extract(&parsed, Utc::now());

            match self.filter.decide(&tokens) {
                Decision::Ignore { pattern } => {
                    debug!(from = %tokens.from, pattern = %pattern, "ignoring sender");
                    continue;
                }
                Decision::Skip => {
                    debug!(
                        from = %tokens.from,
                        subject = %tokens.subject,
                        "skipping already-handled message"
                    );
                    continue;
                }
                Decision::Process => {}
            }

            debug!(
                from = %tokens.from,
                to = %tokens.to,
                reply_to = %tokens.reply_to,
                date = %tokens.date_text(),
                subject = %tokens.subject,
                "composing reply"
            );

            let assembled = banner::render(&tokens)
                .map_err(AssembleError::from)
                .and_then(|quote_banner| {
                    let body = compose::compose(&parsed, &quote_banner);
                    let threading = ThreadingHeaders::from_message(&parsed);
                    outbound::assemble(
                        &tokens,
                        &body,
                        &threading,
                        &self.reply,
                        &self.fallback_from,
                    )
                });

            let outbound_reply = match assembled {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(uid = %raw.uid, error = %e, "failed to assemble reply, skipping message");
                    continue;
                }
            };

            let recipient = outbound_reply.recipient.email.to_string();
            if dry_run {
                debug!(to = %recipient, "dry run, not sending");
            } else if let Err(source) =
                transport.send(&outbound_reply.recipient.email, &outbound_reply.formatted())
            {
                return Err(RunError { source, report });
            }

            report.push(ReportLine {
                tokens,
                sent_at: Utc::now(),
                recipient,
            });
        }

        info!(replies = report.len(), dry_run, "run complete");
        Ok(report)
    }
}
