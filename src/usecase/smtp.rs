use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::domain::{mail::MailMessage, user::Recipient};
use crate::usecase::contracts::Mailer;
use crate::usecase::error::MailError;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub use_tls: bool,
    pub timeout: Duration,
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| MailError::Address(format!("invalid from address: {}", e)))?;

        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::Transport(format!("SMTP relay error: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        tracing::info!(host = %config.host, port = config.port, tls = config.use_tls, "smtp mailer configured");
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

pub fn build_message(from: &Mailbox, to: &Recipient, mail: &MailMessage) -> Result<Message, MailError> {
    let address = to
        .email
        .parse()
        .map_err(|e| MailError::Address(format!("{}: {}", to.email, e)))?;

    Message::builder()
        .from(from.clone())
        .to(Mailbox::new(Some(to.name.clone()), address))
        .subject(mail.subject.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(mail.text_body())
        .map_err(|e| MailError::Build(e.to_string()))
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[tracing::instrument(skip(self, to, mail), fields(recipient_id = %to.id, subject = %mail.subject))]
    async fn send(&self, to: &Recipient, mail: &MailMessage) -> Result<(), MailError> {
        let message = build_message(&self.from, to, mail)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        tracing::debug!("mail sent");
        Ok(())
    }
}

/// Used when no SMTP host is configured: every mail delivery fails and is logged
/// by the worker, the other channels are unaffected.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _to: &Recipient, _mail: &MailMessage) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}
