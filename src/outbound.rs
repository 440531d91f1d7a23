//! Outbound reply assembly — recipient resolution, subject normalization,
//! threading headers, template substitution, and the MIME body.

use lettre::message::header::{Header, HeaderName, HeaderValue};
use lettre::message::{Mailbox, Message, MultiPart, SinglePart};

use crate::config::ReplyConfig;
use crate::error::AssembleError;
use crate::message::{ComposedBody, Tokens};
use crate::template;

/// Prefixes removed from the front of a subject before re-prefixing.
/// Matched literally — this exact casing list, not a case-insensitive
/// pattern.
const REPLY_PREFIXES: [&str; 3] = ["Re: ", "RE: ", "re: "];

/// Gap between the rendered reply template and the quoted original.
const BODY_SEPARATOR: &str = "\n\n\n";

// ── Threading headers ───────────────────────────────────────────────

/// Threading metadata carried over from the original message.
#[derive(Debug, Clone, Default)]
pub struct ThreadingHeaders {
    pub message_id: Option<String>,
    pub thread_topic: Option<String>,
    pub thread_index: Option<String>,
}

impl ThreadingHeaders {
    pub fn from_message(message: &mail_parser::Message<'_>) -> Self {
        Self {
            message_id: message.message_id().map(|id| format!("<{id}>")),
            thread_topic: header_text(message, "Thread-Topic"),
            thread_index: header_text(message, "Thread-Index"),
        }
    }
}

fn header_text(message: &mail_parser::Message<'_>, name: &'static str) -> Option<String> {
    message
        .header(name)
        .and_then(|value| value.as_text())
        .map(|text| text.to_string())
}

#[derive(Debug, Clone, PartialEq)]
struct ThreadTopic(String);

impl Header for ThreadTopic {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Thread-Topic")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ThreadIndex(String);

impl Header for ThreadIndex {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("Thread-Index")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.clone())
    }
}

// ── Assembly ────────────────────────────────────────────────────────

/// A fully assembled reply, ready for the transport.
pub struct OutboundReply {
    /// Resolved recipient (override > `Reply-To` > `From`).
    pub recipient: Mailbox,
    pub message: Message,
}

impl OutboundReply {
    /// Full RFC 5322 bytes for the transport.
    pub fn formatted(&self) -> Vec<u8> {
        self.message.formatted()
    }
}

/// Strip reply prefixes from the front of a subject and prepend exactly
/// one `RE: `. Idempotent: an already-normalized subject round-trips.
pub fn normalize_subject(subject: &str) -> String {
    let mut rest = subject;
    while let Some(stripped) = REPLY_PREFIXES.iter().find_map(|p| rest.strip_prefix(p)) {
        rest = stripped;
    }
    format!("RE: {rest}")
}

/// Pick the reply recipient. Strict precedence, no merging: configured
/// override, then the original `Reply-To`, then the original `From`.
pub fn resolve_recipient<'a>(override_target: Option<&'a str>, tokens: &'a Tokens) -> &'a str {
    if let Some(target) = override_target.filter(|t| !t.is_empty()) {
        target
    } else if !tokens.reply_to.is_empty() {
        &tokens.reply_to
    } else {
        &tokens.from
    }
}

/// Build the outbound reply for one message.
///
/// `fallback_from` (the transport's own address) is used when no sender
/// override is configured, since an RFC 5322 message requires `From`.
pub fn assemble(
    tokens: &Tokens,
    body: &ComposedBody,
    threading: &ThreadingHeaders,
    config: &ReplyConfig,
    fallback_from: &Mailbox,
) -> Result<OutboundReply, AssembleError> {
    let recipient_text = resolve_recipient(config.real_target.as_deref(), tokens);
    let recipient: Mailbox = recipient_text
        .parse()
        .map_err(|e: lettre::address::AddressError| AssembleError::Recipient {
            address: recipient_text.to_string(),
            message: e.to_string(),
        })?;

    let from = match non_empty(config.sender.as_deref()) {
        Some(sender) => parse_mailbox("From", sender)?,
        None => fallback_from.clone(),
    };

    let mut builder = Message::builder()
        .from(from)
        .to(recipient.clone())
        .subject(normalize_subject(&tokens.subject));

    if let Some(id) = &threading.message_id {
        builder = builder.in_reply_to(id.clone()).references(id.clone());
    }
    if let Some(topic) = &threading.thread_topic {
        builder = builder.header(ThreadTopic(topic.clone()));
    }
    if let Some(index) = &threading.thread_index {
        builder = builder.header(ThreadIndex(index.clone()));
    }
    if let Some(reply_to) = non_empty(config.reply_to.as_deref()) {
        builder = builder.reply_to(parse_mailbox("Reply-To", reply_to)?);
    }

    let mut text = template::render(&config.text_template, tokens)?;
    let mut html = template::render(&config.html_template, tokens)?;
    if let Some(quoted) = &body.text {
        text.push_str(BODY_SEPARATOR);
        text.push_str(quoted);
    }
    if let Some(quoted) = &body.html {
        html.push_str(BODY_SEPARATOR);
        html.push_str(quoted);
    }

    let message = builder.multipart(MultiPart::mixed().multipart(
        MultiPart::alternative()
            .singlepart(SinglePart::plain(text))
            .singlepart(SinglePart::html(html)),
    ))?;

    Ok(OutboundReply { recipient, message })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_mailbox(field: &'static str, value: &str) -> Result<Mailbox, AssembleError> {
    value
        .parse()
        .map_err(
            |e: lettre::address::AddressError| AssembleError::HeaderAddress {
                field,
                address: value.to_string(),
                message: e.to_string(),
            },
        )
}
