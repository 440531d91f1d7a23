//! SMTP transport — STARTTLS relay via lettre, one session per run.

use lettre::transport::smtp::authentication::Credentials;
use lettre::address::Envelope;
use lettre::{Address, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{debug, info};

use crate::channels::MailTransport;
use crate::config::SmtpConfig;
use crate::error::TransportError;

/// Outbound SMTP sender. The connection is verified once at startup
/// (connect, STARTTLS, login) and the pooled session is reused for every
/// reply in the run. Dry runs perform the same verification; only the
/// final send is skipped, by the pipeline.
pub struct SmtpSender {
    transport: SmtpTransport,
    envelope_from: Address,
}

impl SmtpSender {
    pub fn connect(config: &SmtpConfig) -> Result<Self, TransportError> {
        let envelope_from: Address =
            config
                .user
                .parse()
                .map_err(|e: lettre::address::AddressError| TransportError::InvalidAddress {
                    address: config.user.clone(),
                    message: format!("SMTP user is not a usable envelope address: {e}"),
                })?;

        let credentials = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().to_string(),
        );
        let transport = SmtpTransport::starttls_relay(&config.server)
            .map_err(|e| TransportError::Connect {
                server: config.server.clone(),
                message: e.to_string(),
            })?
            .port(config.port)
            .credentials(credentials)
            .build();

        match transport.test_connection() {
            Ok(true) => debug!(server = %config.server, "SMTP connection verified"),
            Ok(false) => {
                return Err(TransportError::Connect {
                    server: config.server.clone(),
                    message: "connection test failed".to_string(),
                });
            }
            Err(e) => {
                return Err(TransportError::Connect {
                    server: config.server.clone(),
                    message: e.to_string(),
                });
            }
        }

        Ok(Self {
            transport,
            envelope_from,
        })
    }
}

impl MailTransport for SmtpSender {
    fn send(&mut self, to: &Address, message: &[u8]) -> Result<(), TransportError> {
        let envelope = Envelope::new(Some(self.envelope_from.clone()), vec![to.clone()])
            .map_err(|e| TransportError::Send {
                recipient: to.to_string(),
                message: e.to_string(),
            })?;

        self.transport
            .send_raw(&envelope, message)
            .map_err(|e| TransportError::Send {
                recipient: to.to_string(),
                message: e.to_string(),
            })?;

        info!(to = %to, "reply sent");
        Ok(())
    }
}
