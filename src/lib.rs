//! massreply — mailbox auto-responder.
//!
//! Scans an IMAP folder for messages matching a time/subject window and
//! replies to every message not excluded by policy, quoting an
//! attachment-stripped copy of the original in plain text and HTML with
//! threading headers preserved.

pub mod channels;
pub mod config;
pub mod error;
pub mod filter;
pub mod message;
pub mod outbound;
pub mod pipeline;
pub mod template;
