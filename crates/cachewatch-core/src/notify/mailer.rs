use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::SmtpConfig;

use super::Digest;

/// Delivers a composed digest.
#[async_trait]
pub trait Mailer {
    async fn send(&self, digest: &Digest) -> Result<()>;
}

/// Sends digests through an authenticated STARTTLS submission server.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Invalid SMTP host {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: parse_mailbox(&config.username)?,
            to: parse_mailbox(&config.recipient)?,
        })
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .with_context(|| format!("Invalid email address {}", address))
}

/// Build a multipart/alternative message with plain text and HTML parts.
pub fn build_message(from: Mailbox, to: Mailbox, digest: &Digest) -> Result<Message> {
    Message::builder()
        .from(from)
        .to(to)
        .subject(digest.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            digest.text.clone(),
            digest.html.clone(),
        ))
        .context("Failed to build email message")
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, digest: &Digest) -> Result<()> {
        let message = build_message(self.from.clone(), self.to.clone(), digest)?;
        self.transport
            .send(message)
            .await
            .context("Failed to send email")?;
        info!(to = %self.to, subject = %digest.subject, "Email has been sent");
        Ok(())
    }
}
