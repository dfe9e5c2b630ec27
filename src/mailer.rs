use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::DispatchError;
use crate::models::{Category, Learner};
use crate::retry::with_backoff;
use crate::templates;

/// Mailjet caps one send call at this many messages.
pub const MAX_MESSAGES_PER_CALL: usize = 50;

const MAILJET_SEND_URL: &str = "https://api.mailjet.com/v3.1/send";

/// Downstream consumer of a finished batch. The pipeline only knows this
/// seam, so tests can swap in a recording sink.
#[async_trait]
pub trait BatchSink: Send + Sync {
    async fn dispatch(&self, learners: &[Learner], category: Category)
        -> Result<(), DispatchError>;
}

pub struct MailjetSink {
    client: reqwest::Client,
    send_url: String,
    api_key: String,
    api_secret: String,
    origin_email: String,
    origin_name: String,
    retry: RetryPolicy,
    test_override: Option<String>,
}

impl MailjetSink {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::with_send_url(config, MAILJET_SEND_URL.to_string())
    }

    pub fn with_send_url(config: &Config, send_url: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let test_override = if config.test_mode {
            config.test_email.clone()
        } else {
            None
        };

        Ok(Self {
            client,
            send_url,
            api_key: config.mailjet_api_key.clone(),
            api_secret: config.mailjet_api_secret.clone(),
            origin_email: config.origin_email.clone(),
            origin_name: config.origin_name.clone(),
            retry: config.retry,
            test_override,
        })
    }

    fn message(&self, learner: &Learner, category: Category) -> Option<serde_json::Value> {
        let to_email = match &self.test_override {
            Some(address) => {
                info!(address, "test mode, overriding recipient");
                address.as_str()
            }
            None => match learner.email.as_deref() {
                Some(email) if !email.is_empty() => email,
                _ => {
                    warn!(id = ?learner.id, "learner has no email, skipping");
                    return None;
                }
            },
        };

        let name = display_name(learner);
        let template = templates::for_category(category);

        Some(json!({
            "From": { "Email": self.origin_email, "Name": self.origin_name },
            "To": [{ "Email": to_email, "Name": name }],
            "Subject": template.subject,
            "TextPart": template.render_text(&name),
            "HTMLPart": template.render_html(&name),
        }))
    }

    async fn send_chunk(&self, messages: &[serde_json::Value]) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(&self.send_url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&json!({ "Messages": messages }))
            .send()
            .await
            .map_err(DispatchError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Provider { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl BatchSink for MailjetSink {
    async fn dispatch(
        &self,
        learners: &[Learner],
        category: Category,
    ) -> Result<(), DispatchError> {
        let messages: Vec<serde_json::Value> = learners
            .iter()
            .filter_map(|learner| self.message(learner, category))
            .collect();

        for chunk in messages.chunks(MAX_MESSAGES_PER_CALL) {
            with_backoff(&self.retry, "mailjet send", || self.send_chunk(chunk))
                .await
                .map_err(|(err, attempts)| {
                    if err.is_transient() {
                        DispatchError::RetriesExhausted {
                            attempts,
                            source: Box::new(err),
                        }
                    } else {
                        err
                    }
                })?;
        }

        info!(
            category = %category,
            recipients = messages.len(),
            "reminder emails dispatched"
        );
        Ok(())
    }
}

/// Logging stand-in for the real sink, selected by `--dry-run`.
pub struct DryRunSink;

#[async_trait]
impl BatchSink for DryRunSink {
    async fn dispatch(
        &self,
        learners: &[Learner],
        category: Category,
    ) -> Result<(), DispatchError> {
        info!(
            category = %category,
            recipients = learners.len(),
            "[dry run] would send reminder emails"
        );
        Ok(())
    }
}

fn display_name(learner: &Learner) -> String {
    let name = learner.first_name.as_deref().unwrap_or("").trim();
    if name.is_empty() {
        warn!(id = ?learner.id, "learner has no firstName");
        return "there".to_string();
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "there".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;

    use super::*;

    fn test_config(test_mode: bool, test_email: Option<&str>) -> Config {
        Config {
            api_base: "http://unused".to_string(),
            api_username: "user".to_string(),
            api_password: "pass".to_string(),
            business_id: "biz".to_string(),
            mailjet_api_key: "key".to_string(),
            mailjet_api_secret: "secret".to_string(),
            origin_email: "noreply@example.com".to_string(),
            origin_name: "Support".to_string(),
            page_size: 500,
            batch_limit: 500,
            inactive_days: 14,
            low_score_threshold: 50.0,
            retry: RetryPolicy {
                max_attempts: 2,
                base: Duration::from_millis(1),
                cap: Duration::from_millis(2),
            },
            request_timeout: Duration::from_secs(5),
            test_mode,
            test_email: test_email.map(str::to_string),
        }
    }

    fn learner(id: &str) -> Learner {
        Learner {
            id: Some(id.to_string()),
            email: Some(format!("{id}@example.com")),
            first_name: Some("avery".to_string()),
            ..Learner::default()
        }
    }

    #[tokio::test]
    async fn chunks_at_provider_limit() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v3.1/send");
            then.status(200).json_body(serde_json::json!({"Messages": []}));
        });

        let config = test_config(false, None);
        let sink = MailjetSink::with_send_url(&config, server.url("/v3.1/send")).unwrap();

        let learners: Vec<Learner> = (0..120).map(|i| learner(&format!("l{i}"))).collect();
        sink.dispatch(&learners, Category::Inactive).await.unwrap();

        // 120 messages at 50 per call is three requests.
        mock.assert_hits(3);
    }

    #[tokio::test]
    async fn test_mode_overrides_every_recipient() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v3.1/send")
                .body_contains("override@example.com");
            then.status(200).json_body(serde_json::json!({"Messages": []}));
        });

        let config = test_config(true, Some("override@example.com"));
        let sink = MailjetSink::with_send_url(&config, server.url("/v3.1/send")).unwrap();

        sink.dispatch(&[learner("a"), learner("b")], Category::LowScore)
            .await
            .unwrap();
        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn provider_error_surfaces_as_dispatch_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v3.1/send");
            then.status(401).body("bad credentials");
        });

        let config = test_config(false, None);
        let sink = MailjetSink::with_send_url(&config, server.url("/v3.1/send")).unwrap();

        let err = sink
            .dispatch(&[learner("a")], Category::Inactive)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Provider { .. }));
    }

    #[tokio::test]
    async fn transient_provider_error_is_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v3.1/send");
            then.status(503);
        });

        let config = test_config(false, None);
        let sink = MailjetSink::with_send_url(&config, server.url("/v3.1/send")).unwrap();

        let err = sink
            .dispatch(&[learner("a")], Category::Inactive)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::RetriesExhausted { .. }));
        mock.assert_hits(2);
    }

    #[tokio::test]
    async fn learners_without_email_are_skipped() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/v3.1/send");
            then.status(200).json_body(serde_json::json!({"Messages": []}));
        });

        let config = test_config(false, None);
        let sink = MailjetSink::with_send_url(&config, server.url("/v3.1/send")).unwrap();

        let mut no_email = learner("a");
        no_email.email = None;
        sink.dispatch(&[no_email], Category::Inactive).await.unwrap();

        // Nothing to send, so no request was made.
        mock.assert_hits(0);
    }

    #[test]
    fn display_name_capitalizes_and_falls_back() {
        assert_eq!(display_name(&learner("a")), "Avery");
        let mut anon = learner("b");
        anon.first_name = None;
        assert_eq!(display_name(&anon), "there");
    }
}
