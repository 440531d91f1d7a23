//! MIME body composer — walks the parsed tree depth-first, strips
//! attachments, and quotes text/HTML parts under the rendered banner.
//!
//! The composer never mutates the parsed tree; it produces a fresh
//! [`ComposedBody`] from an immutable input.

use mail_parser::{ContentType, Message, MessagePart, MimeHeaders, PartType};
use tracing::warn;

use crate::message::Banner;

/// Quoted copy of the original message, per body format. Either side is
/// `None` when the original had no corresponding MIME part.
#[derive(Debug, Clone, Default)]
pub struct ComposedBody {
    pub text: Option<String>,
    pub html: Option<String>,
}

/// Build the quoted, attachment-stripped body for one message.
pub fn compose(message: &Message<'_>, banner: &Banner) -> ComposedBody {
    let mut body = ComposedBody::default();
    walk(message, 0, banner, &mut body);
    body
}

/// Depth-first traversal over every part, descending into nested
/// multiparts and embedded `message/rfc822` documents.
fn walk(message: &Message<'_>, part_id: usize, banner: &Banner, body: &mut ComposedBody) {
    let Some(part) = message.parts.get(part_id) else {
        return;
    };

    match &part.body {
        PartType::Multipart(children) => {
            for child in children {
                walk(message, *child as usize, banner, body);
            }
        }
        PartType::Message(nested) => walk(nested, 0, banner, body),
        _ => visit_leaf(part, banner, body),
    }
}

fn visit_leaf(part: &MessagePart<'_>, banner: &Banner, body: &mut ComposedBody) {
    // Attachments are replaced by a plain-text placeholder; the part's
    // disposition and encoding never reach the composed body.
    if is_attachment(part) {
        append_text(body, banner, &attachment_placeholder(part));
        return;
    }

    if part.is_encoding_problem {
        warn!("part payload could not be decoded, substituting placeholder");
        append_text(body, banner, &decoding_failure_placeholder(part));
        return;
    }

    match &part.body {
        PartType::Text(text) if is_plain_text(part) => {
            append_text(body, banner, text);
        }
        PartType::Html(html) => {
            append_html(body, banner, html);
        }
        _ => {}
    }
}

/// Disposition type `attachment`, any parameters.
fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .is_some_and(|cd| cd.c_type.eq_ignore_ascii_case("attachment"))
}

/// `text/plain`, or a text part with no declared content type.
fn is_plain_text(part: &MessagePart<'_>) -> bool {
    match part.content_type() {
        None => true,
        Some(ct) => {
            ct.c_type.eq_ignore_ascii_case("text")
                && ct
                    .c_subtype
                    .as_deref()
                    .is_none_or(|sub| sub.eq_ignore_ascii_case("plain"))
        }
    }
}

fn attachment_placeholder(part: &MessagePart<'_>) -> String {
    let filename = part.attachment_name().unwrap_or("unnamed");
    let content_type = part
        .content_type()
        .map(content_type_text)
        .unwrap_or_else(|| "application/octet-stream".to_string());
    format!(
        "Attachment removed: {filename} ({content_type}, {} bytes)",
        part.contents().len()
    )
}

fn decoding_failure_placeholder(part: &MessagePart<'_>) -> String {
    let content_type = part
        .content_type()
        .map(content_type_text)
        .unwrap_or_else(|| "unknown".to_string());
    format!("Undecodable part removed ({content_type})")
}

fn content_type_text(ct: &ContentType<'_>) -> String {
    match ct.c_subtype.as_deref() {
        Some(subtype) => format!("{}/{subtype}", ct.c_type),
        None => ct.c_type.to_string(),
    }
}

/// Append plain-text content; the first contribution seeds the body with
/// the text banner. Every piece is preceded by a newline.
fn append_text(body: &mut ComposedBody, banner: &Banner, content: &str) {
    let text = body.text.get_or_insert_with(|| banner.text.clone());
    text.push('\n');
    text.push_str(content);
}

/// Append HTML content wrapped in its own blockquote; the first
/// contribution seeds the body with the HTML banner.
fn append_html(body: &mut ComposedBody, banner: &Banner, content: &str) {
    let html = body.html.get_or_insert_with(|| banner.html.clone());
    html.push_str("<blockquote>");
    html.push_str(content);
    html.push_str("</blockquote>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Tokens;
    use chrono::Utc;
    use mail_parser::MessageParser;

    fn banner() -> Banner {
        Banner {
            html: "<hr/>HTML-BANNER\n".into(),
            text: "TEXT-BANNER\n".into(),
        }
    }

    fn compose_raw(raw: &[u8]) -> ComposedBody {
        let message = MessageParser::default().parse(raw).expect("parse");
        compose(&message, &banner())
    }

    #[test]
    fn plain_message_seeds_text_banner() {
        let raw = b"From: a@test\r\nSubject: x\r\nContent-Type: text/plain\r\n\r\nhello there\r\n";
        let body = compose_raw(raw);
        let text = body.text.expect("text");
        assert!(text.starts_with("TEXT-BANNER\n"));
        assert!(text.contains("hello there"));
        assert!(body.html.is_none());
    }

    #[test]
    fn alternative_message_fills_both_sides() {
        let raw = b"From: a@test\r\nMIME-Version: 1.0\r\n\
            Content-Type: multipart/alternative; boundary=\"b\"\r\n\r\n\
            --b\r\nContent-Type: text/plain\r\n\r\nplain copy\r\n\
            --b\r\nContent-Type: text/html\r\n\r\n<p>html copy</p>\r\n\
            --b--\r\n";
        let body = compose_raw(raw);
        assert!(body.text.unwrap().contains("plain copy"));
        let html = body.html.unwrap();
        assert!(html.starts_with("<hr/>HTML-BANNER"));
        assert!(html.contains("<blockquote><p>html copy</p></blockquote>"));
    }

    #[test]
    fn attachment_becomes_placeholder() {
        let payload = "y".repeat(256);
        let raw = format!(
            "From: a@test\r\nMIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n\
             --b\r\nContent-Type: text/plain\r\n\r\nsee attachment\r\n\
             --b\r\nContent-Type: application/pdf; name=\"report.pdf\"\r\n\
             Content-Disposition: attachment; filename=\"report.pdf\"\r\n\r\n\
             {payload}\r\n--b--\r\n"
        );
        let body = compose_raw(raw.as_bytes());
        let text = body.text.expect("text");
        assert!(text.contains("Attachment removed: report.pdf (application/pdf, 256 bytes)"));
        assert!(!text.contains("Content-Disposition"));
    }

    #[test]
    fn attachment_only_message_still_yields_text() {
        let raw = b"From: a@test\r\nMIME-Version: 1.0\r\n\
            Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n\
            --b\r\nContent-Type: application/zip; name=\"data.zip\"\r\n\
            Content-Disposition: attachment; filename=\"data.zip\"\r\n\r\n\
            zipbytes\r\n--b--\r\n";
        let body = compose_raw(raw);
        let text = body.text.expect("text");
        assert!(text.starts_with("TEXT-BANNER\n"));
        assert!(text.contains("Attachment removed: data.zip"));
        assert!(body.html.is_none());
    }

    #[test]
    fn empty_body_sides_stay_none() {
        let raw = b"From: a@test\r\nSubject: x\r\nContent-Type: application/json\r\n\r\n{}\r\n";
        let body = compose_raw(raw);
        assert!(body.text.is_none());
        assert!(body.html.is_none());
    }

    #[test]
    fn nested_multipart_parts_are_found() {
        let raw = b"From: a@test\r\nMIME-Version: 1.0\r\n\
            Content-Type: multipart/mixed; boundary=\"outer\"\r\n\r\n\
            --outer\r\nContent-Type: multipart/alternative; boundary=\"inner\"\r\n\r\n\
            --inner\r\nContent-Type: text/plain\r\n\r\ninner plain\r\n\
            --inner\r\nContent-Type: text/html\r\n\r\n<b>inner html</b>\r\n\
            --inner--\r\n\
            --outer--\r\n";
        let body = compose_raw(raw);
        assert!(body.text.unwrap().contains("inner plain"));
        assert!(body.html.unwrap().contains("<b>inner html</b>"));
    }

    #[test]
    fn every_text_part_is_appended_with_newline() {
        let raw = b"From: a@test\r\nMIME-Version: 1.0\r\n\
            Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n\
            --b\r\nContent-Type: text/plain\r\n\r\nfirst\r\n\
            --b\r\nContent-Type: text/plain\r\n\r\nsecond\r\n\
            --b--\r\n";
        let body = compose_raw(raw);
        let text = body.text.expect("text");
        assert!(text.contains("\nfirst"));
        assert!(text.contains("\nsecond"));
    }

    #[test]
    fn tokens_and_compose_work_on_the_same_parse() {
        let raw = b"From: \"Smith, John\" <j@test>\r\nSubject: hi\r\n\
            Content-Type: text/plain\r\n\r\nbody\r\n";
        let message = MessageParser::default().parse(raw.as_slice()).expect("parse");
        let tokens = Tokens::extract(&message, Utc::now());
        let body = compose(&message, &banner());
        assert_eq!(tokens.sender_name, "John Smith");
        assert!(body.text.unwrap().contains("body"));
    }
}
