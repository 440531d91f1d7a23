//! Quoting banner — the header block summarizing the original message,
//! prefixed to the quoted body in a reply.

use crate::error::TemplateError;
use crate::message::Tokens;
use crate::template;

/// Fixed HTML banner template. The text variant is derived from the
/// rendered HTML by stripping tags.
const BANNER_TEMPLATE: &str = "<hr/>\n\
    <strong>From:</strong> {from}<br/>\n\
    <strong>Date:</strong> {date}<br/>\n\
    <strong>To:</strong> {to}<br/>\n\
    <strong>Subject:</strong> {subject}<br/>\n\
    <br/>\n\
    <br/>\n";

/// Rendered banner pair, one variant per body format.
#[derive(Debug, Clone)]
pub struct Banner {
    pub html: String,
    pub text: String,
}

/// Render the banner for one message.
pub fn render(tokens: &Tokens) -> Result<Banner, TemplateError> {
    let html = template::render(BANNER_TEMPLATE, tokens)?;
    let text = strip_tags(&html);
    Ok(Banner { html, text })
}

/// Remove every `<...>` run. Conservative: literal angle brackets inside
/// token values are stripped along with markup.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tokens() -> Tokens {
        Tokens {
            from: "Alice <alice@example.com>".into(),
            to: "list@example.com".into(),
            reply_to: String::new(),
            date: Some(Utc.with_ymd_and_hms(2025, 7, 1, 10, 0, 0).unwrap()),
            subject: "hello".into(),
            sender_name: "Alice".into(),
            hash: "0123456789".into(),
        }
    }

    #[test]
    fn html_banner_lists_all_fields() {
        let banner = render(&tokens()).unwrap();
        assert!(banner.html.contains("<strong>From:</strong> Alice <alice@example.com><br/>"));
        assert!(banner.html.contains("<strong>Subject:</strong> hello<br/>"));
        assert!(banner.html.starts_with("<hr/>"));
    }

    #[test]
    fn text_banner_is_tag_free() {
        let banner = render(&tokens()).unwrap();
        assert!(!banner.text.contains('<'));
        assert!(banner.text.contains("From: Alice \n"));
        assert!(banner.text.contains("Subject: hello\n"));
    }

    #[test]
    fn null_date_renders_empty() {
        let mut tokens = tokens();
        tokens.date = None;
        let banner = render(&tokens).unwrap();
        assert!(banner.text.contains("Date: \n"));
    }

    #[test]
    fn strip_tags_removes_angle_runs() {
        assert_eq!(strip_tags("a <b>bold</b> c"), "a bold c");
        assert_eq!(strip_tags("addr <x@y> end"), "addr  end");
    }

    #[test]
    fn banner_template_uses_only_known_placeholders() {
        assert!(crate::template::validate(super::BANNER_TEMPLATE).is_ok());
    }
}
