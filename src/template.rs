//! Fixed-placeholder template substitution.
//!
//! Reply templates and the quoting banner use a closed set of named
//! placeholders filled from the per-message [`Tokens`]. Unknown names are
//! rejected, at load time via [`validate`] and again at render time.
//! `{{` and `}}` escape literal braces.

use crate::error::TemplateError;
use crate::message::Tokens;

/// The full set of recognized placeholder names.
pub const PLACEHOLDERS: [&str; 7] = [
    "from",
    "date",
    "to",
    "subject",
    "replyto",
    "sendername",
    "hash",
];

/// Check a template against the placeholder set without rendering it.
pub fn validate(template: &str) -> Result<(), TemplateError> {
    expand(template, |name| {
        PLACEHOLDERS.contains(&name).then(String::new)
    })
    .map(|_| ())
}

/// Render a template, substituting every placeholder from `tokens`.
/// Fields whose underlying header was absent substitute as empty strings.
pub fn render(template: &str, tokens: &Tokens) -> Result<String, TemplateError> {
    expand(template, |name| tokens.placeholder(name))
}

fn expand(
    template: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0usize;

    loop {
        let Some(pos) = rest.find(['{', '}']) else {
            out.push_str(rest);
            return Ok(out);
        };
        out.push_str(&rest[..pos]);
        let brace = rest.as_bytes()[pos];
        let after = &rest[pos + 1..];

        if brace == b'{' {
            if let Some(tail) = after.strip_prefix('{') {
                out.push('{');
                offset += pos + 2;
                rest = tail;
            } else {
                let end = after.find('}').ok_or(TemplateError::UnbalancedBrace {
                    position: offset + pos,
                })?;
                let name = &after[..end];
                let value = lookup(name).ok_or_else(|| TemplateError::UnknownPlaceholder {
                    name: name.to_string(),
                })?;
                out.push_str(&value);
                offset += pos + 1 + end + 1;
                rest = &after[end + 1..];
            }
        } else if let Some(tail) = after.strip_prefix('}') {
            out.push('}');
            offset += pos + 2;
            rest = tail;
        } else {
            return Err(TemplateError::UnbalancedBrace {
                position: offset + pos,
            });
        }
    }
}
