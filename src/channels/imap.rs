//! IMAP source — TLS connect, search, lazy per-message fetch.
//!
//! A minimal blocking IMAP client over rustls, supporting only the
//! commands this pipeline needs: LOGIN, SELECT, SEARCH, FETCH, CLOSE,
//! LOGOUT. All I/O is blocking; the binary runs it under
//! `tokio::task::spawn_blocking`.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use chrono::NaiveDate;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::channels::RawMail;
use crate::config::ImapConfig;
use crate::error::TransportError;

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// Minimal blocking IMAP client.
pub struct ImapClient {
    stream: TlsStream,
    tag: u32,
}

/// One untagged response line, with the literal payload that followed it
/// when the line announced one (`{123}`).
struct ResponseLine {
    line: String,
    literal: Option<Vec<u8>>,
}

/// Untagged lines plus the tagged completion line.
struct Response {
    untagged: Vec<ResponseLine>,
    status: String,
}

impl ImapClient {
    /// Connect over TLS and read the server greeting.
    pub fn connect(server: &str, port: u16) -> Result<Self, TransportError> {
        let tcp = TcpStream::connect((server, port)).map_err(|e| TransportError::Connect {
            server: server.to_string(),
            message: e.to_string(),
        })?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        );
        let name = rustls::pki_types::ServerName::try_from(server.to_string()).map_err(|e| {
            TransportError::Tls {
                server: server.to_string(),
                message: e.to_string(),
            }
        })?;
        let conn =
            rustls::ClientConnection::new(tls_config, name).map_err(|e| TransportError::Tls {
                server: server.to_string(),
                message: e.to_string(),
            })?;

        let mut client = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            tag: 0,
        };
        let greeting = client.read_line()?;
        debug!(greeting = %greeting, "IMAP connected");
        Ok(client)
    }

    pub fn login(&mut self, user: &str, password: &str) -> Result<(), TransportError> {
        let response = self.command(&format!("LOGIN {} {}", quote(user), quote(password)))?;
        if !is_ok(&response.status) {
            return Err(TransportError::Auth {
                user: user.to_string(),
                message: response.status,
            });
        }
        Ok(())
    }

    /// Select a folder. `false` when the folder does not exist (IMAP NO);
    /// callers treat that as an empty mailbox, not a fatal error.
    pub fn select(&mut self, folder: &str) -> Result<bool, TransportError> {
        let response = self.command(&format!("SELECT {}", quote(folder)))?;
        Ok(is_ok(&response.status))
    }

    /// SEARCH with the given criteria; returns matching sequence numbers.
    pub fn search(&mut self, criteria: &str) -> Result<Vec<String>, TransportError> {
        let response = self.command(&format!("SEARCH {criteria}"))?;
        if !is_ok(&response.status) {
            return Err(TransportError::Protocol {
                command: "SEARCH".to_string(),
                message: response.status,
            });
        }

        let mut ids = Vec::new();
        for entry in &response.untagged {
            if let Some(rest) = entry.line.strip_prefix("* SEARCH") {
                ids.extend(rest.split_whitespace().map(str::to_string));
            }
        }
        Ok(ids)
    }

    /// Fetch the full RFC 822 body of one message.
    pub fn fetch_rfc822(&mut self, id: &str) -> Result<Vec<u8>, TransportError> {
        let response = self.command(&format!("FETCH {id} (RFC822)"))?;
        if !is_ok(&response.status) {
            return Err(TransportError::Protocol {
                command: format!("FETCH {id}"),
                message: response.status,
            });
        }

        response
            .untagged
            .into_iter()
            .find_map(|entry| entry.literal)
            .ok_or_else(|| TransportError::Protocol {
                command: format!("FETCH {id}"),
                message: "no message literal in FETCH response".to_string(),
            })
    }

    /// CLOSE the selected folder and LOGOUT.
    pub fn close(&mut self) -> Result<(), TransportError> {
        self.command("CLOSE")?;
        self.command("LOGOUT")?;
        Ok(())
    }

    /// Send a tagged command and collect the response up to the tagged
    /// completion line. Literal payloads are read in full as they are
    /// announced.
    fn command(&mut self, cmd: &str) -> Result<Response, TransportError> {
        self.tag += 1;
        let tag = format!("A{:04}", self.tag);
        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let mut untagged = Vec::new();
        loop {
            let line = self.read_line()?;
            if line.starts_with(&tag) {
                return Ok(Response {
                    untagged,
                    status: line,
                });
            }
            let literal = match literal_length(&line) {
                Some(len) => Some(self.read_exact_bytes(len)?),
                None => None,
            };
            untagged.push(ResponseLine { line, literal });
        }
    }

    fn read_line(&mut self) -> Result<String, TransportError> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(TransportError::ConnectionClosed),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        buf.truncate(buf.len() - 2);
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn read_exact_bytes(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Byte count of an IMAP literal announced at the end of a line.
fn literal_length(line: &str) -> Option<usize> {
    let rest = line.strip_suffix('}')?;
    let open = rest.rfind('{')?;
    rest[open + 1..].parse().ok()
}

/// `A0001 OK ...` → true; `NO`/`BAD` → false.
fn is_ok(status_line: &str) -> bool {
    status_line
        .split_whitespace()
        .nth(1)
        .is_some_and(|word| word.eq_ignore_ascii_case("OK"))
}

/// Quote an IMAP string, escaping backslashes and double quotes.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Build the SEARCH criteria from the configured window. Terms appear
/// only when configured; dates use the IMAP `DD-Mon-YYYY` form.
pub fn search_criteria(config: &ImapConfig) -> String {
    let mut terms = Vec::new();
    if let Some(subject) = &config.subject {
        terms.push(format!("SUBJECT {}", quote(subject)));
    }
    if let Some(since) = config.sent_since {
        terms.push(format!("SENTSINCE {}", imap_date(since)));
    }
    if let Some(before) = config.sent_before {
        terms.push(format!("SENTBEFORE {}", imap_date(before)));
    }

    if terms.is_empty() {
        "ALL".to_string()
    } else {
        terms.join(" ")
    }
}

fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

// ── Mailbox iterator ────────────────────────────────────────────────

/// A searched IMAP mailbox yielding matching messages lazily, one FETCH
/// per message. The session is released when the value is dropped, on
/// every exit path including early termination.
pub struct ImapMailbox {
    client: ImapClient,
    ids: std::vec::IntoIter<String>,
    failed: bool,
}

impl ImapMailbox {
    /// Connect, authenticate, select the folder and run the search.
    /// A non-existent folder logs a warning and yields no messages.
    pub fn open(config: &ImapConfig) -> Result<Self, TransportError> {
        debug!(
            server = %config.server,
            folder = %config.folder,
            user = %config.user,
            "connecting to IMAP"
        );
        let mut client = ImapClient::connect(&config.server, config.port)?;
        client.login(&config.user, config.password.expose_secret())?;

        let ids = if client.select(&config.folder)? {
            let criteria = search_criteria(config);
            debug!(criteria = %criteria, "searching mailbox");
            client.search(&criteria)?
        } else {
            warn!(folder = %config.folder, "folder does not exist");
            Vec::new()
        };

        debug!(count = ids.len(), "messages matching search");
        Ok(Self {
            client,
            ids: ids.into_iter(),
            failed: false,
        })
    }
}

impl Iterator for ImapMailbox {
    type Item = Result<RawMail, TransportError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let uid = self.ids.next()?;
        match self.client.fetch_rfc822(&uid) {
            Ok(body) => Some(Ok(RawMail { uid, body })),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for ImapMailbox {
    fn drop(&mut self) {
        if let Err(e) = self.client.close() {
            debug!(error = %e, "error closing IMAP session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn config() -> ImapConfig {
        ImapConfig {
            server: "imap.example.com".into(),
            port: 993,
            folder: "INBOX".into(),
            user: "robot@example.com".into(),
            password: SecretString::from("secret".to_string()),
            sent_since: None,
            sent_before: None,
            subject: None,
        }
    }

    #[test]
    fn criteria_defaults_to_all() {
        assert_eq!(search_criteria(&config()), "ALL");
    }

    #[test]
    fn criteria_includes_configured_terms_only() {
        let mut cfg = config();
        cfg.subject = Some("survey".into());
        cfg.sent_since = NaiveDate::from_ymd_opt(2020, 3, 1);
        assert_eq!(
            search_criteria(&cfg),
            "SUBJECT \"survey\" SENTSINCE 01-Mar-2020"
        );
    }

    #[test]
    fn criteria_dates_use_imap_form() {
        let mut cfg = config();
        cfg.sent_since = NaiveDate::from_ymd_opt(2019, 3, 1);
        cfg.sent_before = NaiveDate::from_ymd_opt(2020, 3, 21);
        assert_eq!(
            search_criteria(&cfg),
            "SENTSINCE 01-Mar-2019 SENTBEFORE 21-Mar-2020"
        );
    }

    #[test]
    fn literal_length_parses_announcement() {
        assert_eq!(literal_length("* 1 FETCH (RFC822 {2546}"), Some(2546));
        assert_eq!(literal_length("* SEARCH 1 2 3"), None);
        assert_eq!(literal_length("A0001 OK FETCH completed"), None);
    }

    #[test]
    fn status_line_ok_detection() {
        assert!(is_ok("A0002 OK LOGIN completed"));
        assert!(!is_ok("A0002 NO [AUTHENTICATIONFAILED] oops"));
        assert!(!is_ok("A0002 BAD unknown command"));
    }

    #[test]
    fn quoting_escapes_special_characters() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("pa\"ss"), "\"pa\\\"ss\"");
        assert_eq!(quote("back\\slash"), "\"back\\\\slash\"");
    }
}
