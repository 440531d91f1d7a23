//! Mail store and transport collaborators.

pub mod imap;
pub mod smtp;

pub use imap::ImapMailbox;
pub use smtp::SmtpSender;

use lettre::Address;

use crate::error::TransportError;

/// One message as fetched from the mail store — an opaque RFC 822
/// document, consumed read-only by the pipeline.
#[derive(Debug, Clone)]
pub struct RawMail {
    /// Store-assigned message id (IMAP sequence number).
    pub uid: String,
    /// Full RFC 822 bytes.
    pub body: Vec<u8>,
}

/// Outbound transport. The implementation owns the envelope sender
/// address; the pipeline never calls `send` in dry runs.
pub trait MailTransport {
    fn send(&mut self, to: &Address, message: &[u8]) -> Result<(), TransportError>;
}
