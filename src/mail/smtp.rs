//! Outbound replies over SMTP (STARTTLS) via lettre.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use secrecy::ExposeSecret;

use super::{OutboundReply, ReplyTransport};
use crate::config::MailConfig;
use crate::error::SendError;

pub struct SmtpReplyTransport {
    transport: SmtpTransport,
}

impl SmtpReplyTransport {
    pub fn new(config: &MailConfig) -> Result<Self, SendError> {
        let creds = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::starttls_relay(&config.smtp_host)
            .map_err(|e| SendError::Transport(format!("SMTP relay error: {e}")))?
            .port(config.smtp_port)
            .credentials(creds)
            .build();

        Ok(Self { transport })
    }
}

impl ReplyTransport for SmtpReplyTransport {
    fn send(&self, reply: &OutboundReply) -> Result<(), SendError> {
        let message = reply.to_message()?;
        self.transport
            .send(&message)
            .map_err(|e| SendError::Transport(e.to_string()))?;
        tracing::debug!(to = %reply.to, "Reply submitted");
        Ok(())
    }
}
