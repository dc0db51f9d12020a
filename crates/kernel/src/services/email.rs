//! Outgoing mail: SMTP via lettre, or a logging fallback.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;

/// Sends plain-text mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP delivery.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
}

impl SmtpMailer {
    /// Create a mailer. `encryption` is `"starttls"` (default), `"tls"` or
    /// `"none"` (local development only).
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        smtp_username: Option<&str>,
        smtp_password: Option<&str>,
        encryption: &str,
        from_email: String,
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
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from_email
                    .parse()
                    .context("invalid from email address")?,
            )
            .to(to.parse().context("invalid recipient email address")?)
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
}

/// Logs messages instead of sending them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::info!(%to, %subject, "SMTP not configured; email not sent");
        Ok(())
    }
}

/// SMTP when a host is configured, otherwise [`LogMailer`].
pub fn from_config(config: &Config) -> Result<Box<dyn Mailer>> {
    let Some(host) = config.smtp_host.as_deref() else {
        return Ok(Box::new(LogMailer));
    };
    let mailer = SmtpMailer::new(
        host,
        config.smtp_port,
        config.smtp_username.as_deref(),
        config.smtp_password.as_deref(),
        &config.smtp_encryption,
        config.smtp_from_email.clone(),
    )?;
    Ok(Box::new(mailer))
}

/// Body of the password-reset message.
pub fn password_reset_message(reset_url: &str) -> String {
    format!(
        "You are receiving this email because you (or someone else) has requested \
         the reset of a password.\n\n\
         Please make a PUT request to:\n\n{reset_url}\n\n\
         This link will expire in 10 minutes."
    )
}
