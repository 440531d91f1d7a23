//! Run configuration — immutable per run, built once from `MASSREPLY_*`
//! environment variables and passed explicitly to each component.

use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use secrecy::SecretString;

use crate::error::ConfigError;
use crate::filter::SkipEntry;
use crate::template;

const DEFAULT_IMAP_PORT: u16 = 993;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FOLDER: &str = "INBOX";
const DEFAULT_TEXT_TEMPLATE: &str = "reply.txt";
const DEFAULT_HTML_TEMPLATE: &str = "reply.html";

/// Mailbox to scan and the search window.
#[derive(Debug)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub folder: String,
    pub user: String,
    pub password: SecretString,
    /// Only messages sent on/after this date (IMAP `SENTSINCE`).
    pub sent_since: Option<NaiveDate>,
    /// Only messages sent before this date (IMAP `SENTBEFORE`).
    pub sent_before: Option<NaiveDate>,
    /// Only messages whose subject contains this text (IMAP `SUBJECT`).
    pub subject: Option<String>,
}

/// Server used to send the replies.
#[derive(Debug)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
}

/// Reply content and per-message policy.
#[derive(Debug, Clone)]
pub struct ReplyConfig {
    /// `From` header override; transport address when empty.
    pub sender: Option<String>,
    /// `Reply-To` header; unset when empty.
    pub reply_to: Option<String>,
    /// Plain-text reply template (placeholders per [`template`]).
    pub text_template: String,
    /// HTML reply template.
    pub html_template: String,
    /// Substring patterns against the raw `From` header.
    pub ignore: Vec<String>,
    /// Already-handled messages, matched as exact triples.
    pub skip: Vec<SkipEntry>,
    /// Perform everything except the final send.
    pub dry_run: bool,
    /// Send every reply here instead of the real recipients.
    pub real_target: Option<String>,
}

/// Everything one run needs.
#[derive(Debug)]
pub struct RunConfig {
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    pub reply: ReplyConfig,
}

impl RunConfig {
    /// Build config from `MASSREPLY_*` environment variables.
    ///
    /// Template values that point at readable files are replaced by the
    /// file contents; anything else is used verbatim as template text.
    /// Templates are validated against the placeholder set here, before
    /// any network session is opened.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_server = require_env("MASSREPLY_IMAP_HOST")?;
        let imap_user = require_env("MASSREPLY_IMAP_USER")?;
        let imap_password = require_env("MASSREPLY_IMAP_PASSWORD")?;

        let smtp_server = std::env::var("MASSREPLY_SMTP_HOST")
            .unwrap_or_else(|_| imap_server.replace("imap", "smtp"));
        let smtp_user =
            std::env::var("MASSREPLY_SMTP_USER").unwrap_or_else(|_| imap_user.clone());
        let smtp_password = std::env::var("MASSREPLY_SMTP_PASSWORD")
            .unwrap_or_else(|_| imap_password.clone());

        let imap = ImapConfig {
            server: imap_server,
            port: parse_env("MASSREPLY_IMAP_PORT", DEFAULT_IMAP_PORT)?,
            folder: std::env::var("MASSREPLY_IMAP_FOLDER")
                .unwrap_or_else(|_| DEFAULT_FOLDER.to_string()),
            user: imap_user,
            password: SecretString::from(imap_password),
            sent_since: optional_date("MASSREPLY_SENT_SINCE")?,
            sent_before: optional_date("MASSREPLY_SENT_BEFORE")?,
            subject: optional_env("MASSREPLY_SUBJECT"),
        };

        let smtp = SmtpConfig {
            server: smtp_server,
            port: parse_env("MASSREPLY_SMTP_PORT", DEFAULT_SMTP_PORT)?,
            user: smtp_user,
            password: SecretString::from(smtp_password),
        };

        let skip = match optional_env("MASSREPLY_SKIP_FILE") {
            Some(path) => load_skip_list(Path::new(&path))?,
            None => Vec::new(),
        };

        let reply = ReplyConfig {
            sender: optional_env("MASSREPLY_SENDER"),
            reply_to: optional_env("MASSREPLY_REPLY_TO"),
            text_template: load_template_value(
                &std::env::var("MASSREPLY_REPLY_TEXT")
                    .unwrap_or_else(|_| DEFAULT_TEXT_TEMPLATE.to_string()),
            )?,
            html_template: load_template_value(
                &std::env::var("MASSREPLY_REPLY_HTML")
                    .unwrap_or_else(|_| DEFAULT_HTML_TEMPLATE.to_string()),
            )?,
            ignore: split_list(&std::env::var("MASSREPLY_IGNORE").unwrap_or_default()),
            skip,
            dry_run: parse_bool(&std::env::var("MASSREPLY_DRY_RUN").unwrap_or_default()),
            real_target: optional_env("MASSREPLY_REAL_TARGET"),
        };

        validate_templates(&reply)?;

        Ok(Self { imap, smtp, reply })
    }
}

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

fn optional_date(key: &str) -> Result<Option<NaiveDate>, ConfigError> {
    match optional_env(key) {
        None => Ok(None),
        Some(value) => parse_date(&value)
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected YYYY-MM-DD: {e}"),
            }),
    }
}

/// `YYYY-MM-DD`.
pub fn parse_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
}

pub fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

/// Comma-separated list, trimmed, empties dropped.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A value that points at a readable file is replaced by the file
/// contents; anything else is template text used verbatim.
pub fn load_template_value(value: &str) -> Result<String, ConfigError> {
    let path = Path::new(value);
    if path.is_file() {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(value.to_string())
    }
}

/// JSON array of skip entries.
pub fn load_skip_list(path: &Path) -> Result<Vec<SkipEntry>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::SkipList {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::SkipList {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn validate_templates(reply: &ReplyConfig) -> Result<(), ConfigError> {
    template::validate(&reply.text_template).map_err(|source| ConfigError::Template {
        which: "replytxt".to_string(),
        source,
    })?;
    template::validate(&reply.html_template).map_err(|source| ConfigError::Template {
        which: "replyhtml".to_string(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn split_list_trims_and_drops_empties() {
        assert_eq!(
            split_list(" a@x , b@y ,, "),
            vec!["a@x".to_string(), "b@y".to_string()]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn parse_bool_accepts_common_forms() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool(" yes "));
        assert!(!parse_bool(""));
        assert!(!parse_bool("0"));
    }

    #[test]
    fn parse_date_iso_form() {
        let date = parse_date("2025-07-01").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert!(parse_date("01-07-2025").is_err());
    }

    #[test]
    fn template_value_loads_file_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Dear {{sendername}},").unwrap();
        let loaded = load_template_value(file.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded, "Dear {sendername},");
    }

    #[test]
    fn template_value_falls_back_to_verbatim_text() {
        let loaded = load_template_value("Thanks, {sendername}!").unwrap();
        assert_eq!(loaded, "Thanks, {sendername}!");
    }

    #[test]
    fn skip_list_loads_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"from":"a@test","date":"2025-07-01T10:00:00Z","subject":"s"}}]"#
        )
        .unwrap();
        let entries = load_skip_list(file.path()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].from, "a@test");
    }

    #[test]
    fn skip_list_missing_file_is_an_error() {
        let err = load_skip_list(Path::new("/nonexistent/skip.json")).unwrap_err();
        assert!(matches!(err, ConfigError::SkipList { .. }));
    }

    #[test]
    fn unknown_placeholder_is_rejected_at_load() {
        let reply = ReplyConfig {
            sender: None,
            reply_to: None,
            text_template: "hi {nope}".into(),
            html_template: "<p>hi</p>".into(),
            ignore: vec![],
            skip: vec![],
            dry_run: false,
            real_target: None,
        };
        assert!(matches!(
            validate_templates(&reply),
            Err(ConfigError::Template { .. })
        ));
    }
}
