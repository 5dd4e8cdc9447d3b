use async_trait::async_trait;
use base64::Engine;
use serde::Serialize;
use std::time::Duration;

use crate::{EmailChannel, NotificationError, ResultsEmail};

const BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Serialize)]
struct ResendAttachment {
    filename: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
    attachments: Vec<ResendAttachment>,
}

/// Resend HTTP API channel (`POST /emails`).
pub struct ResendChannel {
    api_key: String,
    from: String,
    base_url: String,
    client: reqwest::Client,
}

impl ResendChannel {
    pub fn new(api_key: String, from: String) -> Result<Self, NotificationError> {
        if api_key.trim().is_empty() {
            return Err(NotificationError::Config("RESEND_API_KEY not set".into()));
        }
        if from.trim().is_empty() {
            return Err(NotificationError::Config("SENDER_EMAIL not set".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            api_key,
            from,
            base_url: BASE_URL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn payload<'a>(&'a self, email: &'a ResultsEmail, to: &'a str) -> ResendPayload<'a> {
        ResendPayload {
            from: &self.from,
            to: vec![to],
            subject: &email.subject,
            text: &email.summary_text,
            html: &email.html_body,
            attachments: vec![ResendAttachment {
                filename: email.filename.clone(),
                content: base64::engine::general_purpose::STANDARD.encode(&email.csv_attachment),
            }],
        }
    }
}

#[async_trait]
impl EmailChannel for ResendChannel {
    async fn send(&self, email: &ResultsEmail, to: &str) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(format!("{}/emails", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.payload(email, to))
            .send()
            .await
            .map_err(|e| NotificationError::Resend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Resend(format!("HTTP {}: {}", status, body)));
        }

        tracing::debug!("Resend accepted email for {}", to);
        Ok(())
    }

    fn name(&self) -> &str {
        "resend"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use screener_core::Verdict;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> ResultsEmail {
        let verdicts = vec![Verdict {
            ticker: "PG".into(),
            satisfied: 7,
            effective: 10,
            fits_strategy: true,
            checks: Vec::new(),
        }];
        ResultsEmail::from_verdicts(&verdicts, None, chrono::Utc::now()).unwrap()
    }

    #[test]
    fn test_empty_key_rejected() {
        let result = ResendChannel::new(" ".into(), "screener@example.com".into());
        assert!(matches!(result, Err(NotificationError::Config(_))));
    }

    #[tokio::test]
    async fn test_posts_base64_attachment() {
        let server = MockServer::start().await;
        let email = email();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&email.csv_attachment);

        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer re_test"))
            .and(body_partial_json(json!({
                "from": "screener@example.com",
                "to": ["investor@example.com"],
                "text": "PG: ✅",
                "attachments": [{ "filename": "screening_results.csv", "content": encoded }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "abc" })))
            .expect(1)
            .mount(&server)
            .await;

        let channel = ResendChannel::new("re_test".into(), "screener@example.com".into())
            .unwrap()
            .with_base_url(server.uri());
        channel.send(&email, "investor@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn test_http_error_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid from address"))
            .mount(&server)
            .await;

        let channel = ResendChannel::new("re_test".into(), "screener@example.com".into())
            .unwrap()
            .with_base_url(server.uri());
        let err = channel.send(&email(), "investor@example.com").await.unwrap_err();

        match err {
            NotificationError::Resend(msg) => {
                assert!(msg.contains("422"));
                assert!(msg.contains("invalid from address"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
