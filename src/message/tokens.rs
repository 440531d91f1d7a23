//! Token extraction — normalized header fields derived once per message.
//!
//! Extraction never fails: absent headers produce empty/`None` fields, and
//! a header that cannot be decoded falls back to its raw text so a message
//! is never dropped over a header-decoding issue.

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use mail_parser::Message;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Display name in front of an angle-bracket address.
static DISPLAY_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+)<.*>$").unwrap());

/// `Last, First` display-name form.
static LAST_FIRST: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(.+),(.+)").unwrap());

/// Quote characters stripped from display names, straight and curly.
const NAME_QUOTES: [char; 6] = ['"', '\'', '\u{201c}', '\u{201d}', '\u{2018}', '\u{2019}'];

/// Normalized header fields of one inbound message. Derived once, never
/// mutated; every downstream formatting step reads these as a
/// substitution context.
#[derive(Debug, Clone, Serialize)]
pub struct Tokens {
    /// Unfolded raw `From` header, empty when absent.
    pub from: String,
    /// Unfolded raw `To` header, empty when absent.
    pub to: String,
    /// Unfolded raw `Reply-To` header, empty when absent.
    pub reply_to: String,
    /// Parsed `Date` header; `None` when absent or unparsable.
    pub date: Option<DateTime<Utc>>,
    /// Fully decoded subject, encoded-words joined, CR/LF stripped.
    pub subject: String,
    /// Best-effort human name from `From`; `Last, First` reordered.
    pub sender_name: String,
    /// Short per-run identifier. Embeds the processing timestamp, so it is
    /// unique per run, not a content hash usable for cross-run dedup.
    pub hash: String,
}

impl Tokens {
    /// Derive tokens from a parsed message. `now` is the processing
    /// timestamp folded into [`Tokens::hash`].
    pub fn extract(message: &Message<'_>, now: DateTime<Utc>) -> Self {
        let from = raw_header(message, "From");
        let to = raw_header(message, "To");
        let reply_to = raw_header(message, "Reply-To");
        let date = message
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0));
        let subject = decode_subject(message);
        let sender_name = extract_sender_name(&from);
        let hash = short_hash(&from, date.as_ref(), &subject, now);

        Self {
            from,
            to,
            reply_to,
            date,
            subject,
            sender_name,
            hash,
        }
    }

    /// Substitution value for a template placeholder; `None` for names
    /// outside the defined set.
    pub fn placeholder(&self, name: &str) -> Option<String> {
        match name {
            "from" => Some(self.from.clone()),
            "date" => Some(self.date_text()),
            "to" => Some(self.to.clone()),
            "subject" => Some(self.subject.clone()),
            "replyto" => Some(self.reply_to.clone()),
            "sendername" => Some(self.sender_name.clone()),
            "hash" => Some(self.hash.clone()),
            _ => None,
        }
    }

    /// Human-readable date, empty when the header was absent or unparsable.
    pub fn date_text(&self) -> String {
        self.date.map(|d| d.to_rfc2822()).unwrap_or_default()
    }
}

/// Raw header value, unfolded and trimmed. Empty when the header is absent.
fn raw_header(message: &Message<'_>, name: &'static str) -> String {
    message
        .header_raw(name)
        .map(unfold)
        .unwrap_or_default()
}

/// Join a folded header value back onto one line.
fn unfold(raw: &str) -> String {
    raw.replace("\r\n", "").replace('\n', "").trim().to_string()
}

/// Decoded subject with CR/LF stripped. When the parser produced nothing
/// but a raw `Subject` header exists, the raw text is used instead.
fn decode_subject(message: &Message<'_>) -> String {
    let decoded = match message.subject() {
        Some(subject) => subject.to_string(),
        None => {
            let raw = raw_header(message, "Subject");
            if !raw.is_empty() {
                warn!(subject = %raw, "undecodable subject header, using raw text");
            }
            raw
        }
    };
    decoded.replace(['\n', '\r'], "")
}

/// Pull a display name out of a `From` header value.
///
/// `"Smith, John" <j@test>` becomes `John Smith`; a bare address yields
/// an empty string, never `None` downstream.
fn extract_sender_name(from: &str) -> String {
    let Some(caps) = DISPLAY_NAME.captures(from) else {
        return String::new();
    };

    let mut name: String = caps[1]
        .chars()
        .filter(|c| !NAME_QUOTES.contains(c))
        .collect();

    if let Some(parts) = LAST_FIRST.captures(&name) {
        let last = parts[1].trim();
        let first = parts[2].trim();
        name = format!("{first} {last}");
    }

    name.trim().to_string()
}

/// First 10 hex characters of a SHA-256 over the identity tuple plus the
/// processing timestamp.
fn short_hash(
    from: &str,
    date: Option<&DateTime<Utc>>,
    subject: &str,
    now: DateTime<Utc>,
) -> String {
    let date_text = date.map(|d| d.to_rfc2822()).unwrap_or_default();
    let digest = Sha256::digest(format!("{from}|{date_text}|{subject}|{now}").as_bytes());

    let mut hex = String::with_capacity(10);
    for byte in digest.iter().take(5) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use mail_parser::MessageParser;

    fn parse(raw: &str) -> Tokens {
        let owned = raw.as_bytes().to_vec();
        let message = MessageParser::default()
            .parse(owned.as_slice())
            .expect("parse");
        Tokens::extract(&message, Utc::now())
    }

    fn with_from(from: &str) -> String {
        format!("From: {from}\r\nSubject: test\r\n\r\nbody\r\n")
    }

    // ── Sender name ─────────────────────────────────────────────────

    #[test]
    fn sender_name_last_first_reordered() {
        let tokens = parse(&with_from("\"Smith, John\" <j@test>"));
        assert_eq!(tokens.sender_name, "John Smith");
    }

    #[test]
    fn sender_name_plain_display_name() {
        let tokens = parse(&with_from("\"Jane Doe\" <j@test>"));
        assert_eq!(tokens.sender_name, "Jane Doe");
    }

    #[test]
    fn sender_name_empty_without_angle_address() {
        let tokens = parse(&with_from("j@test"));
        assert_eq!(tokens.sender_name, "");
    }

    #[test]
    fn sender_name_strips_curly_quotes() {
        let tokens = parse(&with_from("\u{201c}Ada Lovelace\u{201d} <ada@test>"));
        assert_eq!(tokens.sender_name, "Ada Lovelace");
    }

    // ── Subject decoding ────────────────────────────────────────────

    #[test]
    fn subject_joins_encoded_words_across_charsets() {
        let raw = "From: a@test\r\nSubject: =?ISO-8859-1?Q?J=F8rn?=\r\n =?UTF-8?B?IMOYc3RnYWFyZA==?=\r\n\r\nbody\r\n";
        let tokens = parse(raw);
        assert_eq!(tokens.subject, "J\u{f8}rn \u{d8}stgaard");
        assert!(!tokens.subject.contains('\n'));
    }

    #[test]
    fn subject_empty_when_header_absent() {
        let tokens = parse("From: a@test\r\n\r\nbody\r\n");
        assert_eq!(tokens.subject, "");
    }

    // ── Date ────────────────────────────────────────────────────────

    #[test]
    fn date_parsed_to_utc() {
        let raw = "From: a@test\r\nDate: Tue, 01 Jul 2025 10:00:00 +0200\r\nSubject: x\r\n\r\nbody\r\n";
        let tokens = parse(raw);
        let date = tokens.date.expect("date");
        assert_eq!(date.timestamp(), 1751356800);
    }

    #[test]
    fn date_none_when_absent() {
        let tokens = parse("From: a@test\r\nSubject: x\r\n\r\nbody\r\n");
        assert!(tokens.date.is_none());
        assert_eq!(tokens.date_text(), "");
    }

    // ── Hash ────────────────────────────────────────────────────────

    #[test]
    fn hash_is_ten_hex_chars() {
        let tokens = parse(&with_from("a@test"));
        assert_eq!(tokens.hash.len(), 10);
        assert!(tokens.hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_varies_with_processing_time() {
        let owned = with_from("a@test").into_bytes();
        let message = MessageParser::default()
            .parse(owned.as_slice())
            .expect("parse");
        let now = Utc::now();
        let a = Tokens::extract(&message, now);
        let b = Tokens::extract(&message, now + chrono::Duration::seconds(1));
        assert_ne!(a.hash, b.hash);
    }

    // ── Placeholder context ─────────────────────────────────────────

    #[test]
    fn every_placeholder_key_is_present() {
        let tokens = parse(&with_from("a@test"));
        for key in crate::template::PLACEHOLDERS {
            assert!(tokens.placeholder(key).is_some(), "missing key {key}");
        }
        assert!(tokens.placeholder("bogus").is_none());
    }

    #[test]
    fn absent_headers_substitute_empty() {
        let tokens = parse("From: a@test\r\nSubject: x\r\n\r\nbody\r\n");
        assert_eq!(tokens.placeholder("to").as_deref(), Some(""));
        assert_eq!(tokens.placeholder("replyto").as_deref(), Some(""));
    }
}
