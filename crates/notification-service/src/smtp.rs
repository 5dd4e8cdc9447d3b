use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{EmailChannel, NotificationConfig, NotificationError, ResultsEmail, SmtpTls};

pub struct SmtpChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpChannel {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_HOST not set".into()))?;
        let from_addr = config
            .sender_email
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SENDER_EMAIL not set".into()))?;

        let from: Mailbox = from_addr
            .parse()
            .map_err(|e| NotificationError::Config(format!("Invalid sender address: {}", e)))?;

        let mut builder = match config.smtp_tls {
            SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| NotificationError::Smtp(format!("SMTP transport error: {}", e)))?
        .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

/// Plain-text summary and HTML table as alternatives, CSV as an attachment.
pub(crate) fn build_message(from: &Mailbox, to: &str, email: &ResultsEmail) -> Result<Message, NotificationError> {
    let recipient: Mailbox = to
        .parse()
        .map_err(|e| NotificationError::Config(format!("Invalid recipient address '{}': {}", to, e)))?;

    let csv_type = ContentType::parse("text/csv")
        .map_err(|e| NotificationError::Smtp(format!("Invalid content type: {}", e)))?;
    let attachment = Attachment::new(email.filename.clone()).body(email.csv_attachment.clone(), csv_type);

    Message::builder()
        .from(from.clone())
        .to(recipient)
        .subject(&email.subject)
        .multipart(
            MultiPart::mixed()
                .multipart(MultiPart::alternative_plain_html(
                    email.summary_text.clone(),
                    email.html_body.clone(),
                ))
                .singlepart(attachment),
        )
        .map_err(|e| NotificationError::Smtp(format!("Failed to build email: {}", e)))
}

#[async_trait]
impl EmailChannel for SmtpChannel {
    async fn send(&self, email: &ResultsEmail, to: &str) -> Result<(), NotificationError> {
        let message = build_message(&self.from, to, email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Smtp(format!("Failed to send email: {}", e)))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}
