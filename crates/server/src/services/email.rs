//! Email delivery service using lettre/SMTP.

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;

/// Email delivery service.
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    inbox: String,
}

impl EmailService {
    /// Create a new email service.
    ///
    /// `encryption` controls the SMTP transport mode:
    /// - `"starttls"` (default): Opportunistic STARTTLS on port 587
    /// - `"tls"`: Implicit TLS (SMTPS) on port 465
    /// - `"none"`: Unencrypted (for local dev only)
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        smtp_username: Option<&str>,
        smtp_password: Option<&str>,
        encryption: &str,
        from_email: String,
        inbox: String,
    ) -> Result<Self> {
        let mut builder = match encryption {
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
                .context("failed to create SMTP relay transport")?
                .port(smtp_port),
            "none" => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(smtp_host).port(smtp_port)
            }
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
                .context("failed to create SMTP STARTTLS transport")?
                .port(smtp_port),
        };

        if let (Some(user), Some(pass)) = (smtp_username, smtp_password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        Ok(Self {
            transport: builder.build(),
            from_email,
            inbox,
        })
    }

    /// Build the service from configuration. `None` when SMTP is not set up.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        let Some(host) = config.smtp_host.as_deref() else {
            return Ok(None);
        };

        Self::new(
            host,
            config.smtp_port,
            config.smtp_username.as_deref(),
            config.smtp_password.as_deref(),
            &config.smtp_encryption,
            config.mail_from.clone(),
            config.mail_to.clone(),
        )
        .map(Some)
    }

    /// Send a plain-text email.
    pub async fn send(
        &self,
        to: &str,
        reply_to: Option<&str>,
        subject: &str,
        body: &str,
    ) -> Result<()> {
        let mut builder = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .context("invalid from email address")?,
            )
            .to(to.parse().context("invalid recipient email address")?);

        if let Some(reply_to) = reply_to {
            builder = builder.reply_to(reply_to.parse().context("invalid reply-to address")?);
        }

        let email = builder
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("failed to send email")?;

        Ok(())
    }

    /// Forward a message to the shop inbox with the visitor as reply-to.
    pub async fn send_to_inbox(&self, reply_to: &str, subject: &str, body: &str) -> Result<()> {
        self.send(&self.inbox, Some(reply_to), subject, body).await
    }
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("from_email", &self.from_email)
            .field("inbox", &self.inbox)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn service(encryption: &str, port: u16) -> Result<EmailService> {
        EmailService::new(
            "nonexistent.invalid",
            port,
            None,
            None,
            encryption,
            "tienda@alahas.pe".to_string(),
            "ventas@alahas.pe".to_string(),
        )
    }

    #[test]
    fn construction_is_lazy_for_every_mode() {
        // No connection is attempted until the first send.
        assert!(service("starttls", 587).is_ok());
        assert!(service("tls", 465).is_ok());
        assert!(service("none", 25).is_ok());
    }
}
