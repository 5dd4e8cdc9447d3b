mod resend;
mod smtp;
mod templates;

pub use resend::ResendChannel;
pub use smtp::SmtpChannel;
pub use templates::EmailTemplate;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use screener_core::{MacroSignal, ScreenerError, Verdict};
use screener_orchestrator::{summary_text, to_csv_bytes, ScreeningSession};

pub const ATTACHMENT_FILENAME: &str = "screening_results.csv";

/// A rendered screening report, ready for any channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsEmail {
    pub subject: String,
    /// One `TICKER: ✅/❌` line per verdict
    pub summary_text: String,
    pub html_body: String,
    pub csv_attachment: Vec<u8>,
    pub filename: String,
}

impl ResultsEmail {
    pub fn from_session(session: &ScreeningSession) -> Result<Self, NotificationError> {
        Self::from_verdicts(&session.verdicts, session.macro_signal.as_ref(), session.started_at)
    }

    pub fn from_verdicts(
        verdicts: &[Verdict],
        macro_signal: Option<&MacroSignal>,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, NotificationError> {
        if verdicts.is_empty() {
            return Err(NotificationError::NoResults);
        }

        let fits = verdicts.iter().filter(|v| v.fits_strategy).count();
        Ok(Self {
            subject: format!(
                "Stock Screener Results {} ({}/{} fit)",
                generated_at.format("%Y-%m-%d"),
                fits,
                verdicts.len()
            ),
            summary_text: summary_text(verdicts),
            html_body: EmailTemplate::render(verdicts, macro_signal, generated_at),
            csv_attachment: to_csv_bytes(verdicts)?,
            filename: ATTACHMENT_FILENAME.to_string(),
        })
    }
}

/// Trait for email delivery channels.
#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send(&self, email: &ResultsEmail, to: &str) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("No screening results to send")]
    NoResults,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Resend error: {0}")]
    Resend(String),
    #[error("Failed to build attachment: {0}")]
    Export(#[from] ScreenerError),
    #[error("Could not deliver to {}: {reason}", .recipients.join(", "))]
    Undelivered { recipients: Vec<String>, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

/// Email settings. Secrets only ever come from the environment.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub resend_api_key: Option<String>,
    pub sender_email: Option<String>,
    pub recipients: Vec<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_tls: SmtpTls,
}

impl NotificationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let recipients = get("NOTIFICATION_EMAIL_TO")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let smtp_tls = match get("SMTP_TLS").unwrap_or_default().to_lowercase().as_str() {
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            resend_api_key: get("RESEND_API_KEY"),
            sender_email: get("SENDER_EMAIL").or_else(|| get("SMTP_FROM_ADDRESS")),
            recipients,
            smtp_host: get("SMTP_HOST"),
            smtp_port: get("SMTP_PORT").and_then(|s| s.parse().ok()).unwrap_or(587),
            smtp_username: get("SMTP_USERNAME"),
            smtp_password: get("SMTP_PASSWORD"),
            smtp_tls,
        }
    }
}

/// Delivers a report through the first channel that accepts it.
pub struct NotificationService {
    channels: Vec<Box<dyn EmailChannel>>,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let mut channels: Vec<Box<dyn EmailChannel>> = Vec::new();

        if let (Some(key), Some(sender)) = (&config.resend_api_key, &config.sender_email) {
            match ResendChannel::new(key.clone(), sender.clone()) {
                Ok(channel) => {
                    tracing::info!("Email delivery enabled (Resend)");
                    channels.push(Box::new(channel));
                }
                Err(e) => tracing::warn!("Failed to initialize Resend channel: {}", e),
            }
        }

        if config.smtp_host.is_some() && config.sender_email.is_some() {
            match SmtpChannel::new(config) {
                Ok(channel) => {
                    tracing::info!("Email delivery enabled (SMTP)");
                    channels.push(Box::new(channel));
                }
                Err(e) => tracing::warn!("Failed to initialize SMTP channel: {}", e),
            }
        }

        if channels.is_empty() {
            tracing::info!("No email channels configured (set RESEND_API_KEY or SMTP_HOST, plus SENDER_EMAIL)");
        }

        Self { channels }
    }

    pub fn with_channels(channels: Vec<Box<dyn EmailChannel>>) -> Self {
        Self { channels }
    }

    pub fn has_channels(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Send to every recipient. Channels are tried in order per recipient.
    /// A recipient no channel could reach does not stop the others; all
    /// such addresses are reported together in `Undelivered`.
    pub async fn send_results(&self, email: &ResultsEmail, recipients: &[String]) -> Result<(), NotificationError> {
        if recipients.is_empty() {
            return Err(NotificationError::Config("no recipient address given".into()));
        }
        if self.channels.is_empty() {
            return Err(NotificationError::Config(
                "no email channel configured (set RESEND_API_KEY or SMTP_HOST, plus SENDER_EMAIL)".into(),
            ));
        }

        let mut failed = Vec::new();
        let mut last_error = None;

        for recipient in recipients {
            let mut delivered = false;
            for channel in &self.channels {
                match channel.send(email, recipient).await {
                    Ok(()) => {
                        tracing::info!("📬 Sent results to {} via {}", recipient, channel.name());
                        delivered = true;
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to send to {} via {}: {}", recipient, channel.name(), e);
                        last_error = Some(e);
                    }
                }
            }
            if !delivered {
                failed.push(recipient.clone());
            }
        }

        if failed.is_empty() {
            return Ok(());
        }
        Err(NotificationError::Undelivered {
            recipients: failed,
            reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn verdict(ticker: &str, fits: bool) -> Verdict {
        Verdict {
            ticker: ticker.to_string(),
            satisfied: if fits { 8 } else { 2 },
            effective: 10,
            fits_strategy: fits,
            checks: Vec::new(),
        }
    }

    struct RecordingChannel {
        name: &'static str,
        fail: bool,
        sent: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EmailChannel for RecordingChannel {
        async fn send(&self, _email: &ResultsEmail, to: &str) -> Result<(), NotificationError> {
            if self.fail || to.starts_with("bad") {
                return Err(NotificationError::Smtp("connection refused".into()));
            }
            self.sent.lock().unwrap().push(format!("{}:{}", self.name, to));
            Ok(())
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn sample_email() -> ResultsEmail {
        ResultsEmail::from_verdicts(&[verdict("KO", true), verdict("T", false)], None, Utc::now()).unwrap()
    }

    #[test]
    fn test_results_email_contents() {
        let email = sample_email();
        assert_eq!(email.summary_text, "KO: ✅\nT: ❌");
        assert!(email.subject.contains("(1/2 fit)"));
        assert_eq!(email.filename, "screening_results.csv");
        let csv = String::from_utf8(email.csv_attachment).unwrap();
        assert!(csv.starts_with("ticker,satisfied,effective,fits_strategy"));
        assert!(csv.contains("KO,8,10,true"));
    }

    #[test]
    fn test_empty_results_rejected() {
        let result = ResultsEmail::from_session(&ScreeningSession::new());
        assert!(matches!(result, Err(NotificationError::NoResults)));
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("RESEND_API_KEY", "re_123"),
            ("SMTP_FROM_ADDRESS", "screener@example.com"),
            ("NOTIFICATION_EMAIL_TO", "a@example.com, ,b@example.com"),
            ("SMTP_PORT", "not-a-port"),
            ("SMTP_TLS", "TLS"),
            ("SMTP_HOST", "  "),
        ]
        .into_iter()
        .collect();

        let config = NotificationConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.resend_api_key.as_deref(), Some("re_123"));
        assert_eq!(config.sender_email.as_deref(), Some("screener@example.com"));
        assert_eq!(config.recipients, vec!["a@example.com", "b@example.com"]);
        assert_eq!(config.smtp_port, 587);
        assert_eq!(config.smtp_tls, SmtpTls::Tls);
        assert!(config.smtp_host.is_none());
    }

    #[test]
    fn test_unconfigured_service_has_no_channels() {
        let service = NotificationService::new(&NotificationConfig::default());
        assert!(!service.has_channels());
    }

    #[tokio::test]
    async fn test_send_without_channels_is_config_error() {
        let service = NotificationService::with_channels(Vec::new());
        let result = service.send_results(&sample_email(), &["a@example.com".into()]).await;
        assert!(matches!(result, Err(NotificationError::Config(_))));
    }

    #[tokio::test]
    async fn test_falls_back_to_next_channel() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::with_channels(vec![
            Box::new(RecordingChannel { name: "broken", fail: true, sent: sent.clone() }),
            Box::new(RecordingChannel { name: "backup", fail: false, sent: sent.clone() }),
        ]);

        service
            .send_results(&sample_email(), &["a@example.com".into(), "b@example.com".into()])
            .await
            .unwrap();

        assert_eq!(*sent.lock().unwrap(), vec!["backup:a@example.com", "backup:b@example.com"]);
    }

    #[tokio::test]
    async fn test_all_channels_failing_returns_error() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::with_channels(vec![Box::new(RecordingChannel {
            name: "broken",
            fail: true,
            sent,
        })]);
        let result = service.send_results(&sample_email(), &["a@example.com".into()]).await;
        match result {
            Err(NotificationError::Undelivered { recipients, reason }) => {
                assert_eq!(recipients, vec!["a@example.com"]);
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_block_others() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = NotificationService::with_channels(vec![Box::new(RecordingChannel {
            name: "smtp",
            fail: false,
            sent: sent.clone(),
        })]);

        let result = service
            .send_results(
                &sample_email(),
                &["bad@x.com".into(), "good@example.com".into(), "bad2@x.com".into()],
            )
            .await;

        assert_eq!(*sent.lock().unwrap(), vec!["smtp:good@example.com"]);
        match result {
            Err(err @ NotificationError::Undelivered { .. }) => {
                assert_eq!(err.to_string(), "Could not deliver to bad@x.com, bad2@x.com: SMTP error: connection refused");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
