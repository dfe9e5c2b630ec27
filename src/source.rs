use async_stream::try_stream;
use futures::Stream;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::FetchError;
use crate::models::Learner;
use crate::retry::with_backoff;

/// Client for the LMS learner API: bearer-token auth plus page/limit
/// pagination over the learner collection.
pub struct LmsClient {
    client: reqwest::Client,
    api_base: String,
    username: String,
    password: String,
    business_id: String,
    retry: RetryPolicy,
}

impl LmsClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            username: config.api_username.clone(),
            password: config.api_password.clone(),
            business_id: config.business_id.clone(),
            retry: config.retry,
        })
    }

    /// Lazy stream of learners, one page at a time. Terminates on the first
    /// empty page. A non-transient failure ends the stream early (already
    /// consumed records stand); exhausting the retry budget on a transient
    /// failure yields a terminal error.
    pub fn stream_learners(
        &self,
        page_size: usize,
    ) -> impl Stream<Item = Result<Learner, FetchError>> + '_ {
        try_stream! {
            let token = self.bearer_token().await?;
            let mut page = 1u32;
            loop {
                let learners = match self.next_page(&token, page, page_size).await? {
                    Some(learners) => learners,
                    None => break,
                };
                let count = learners.len();
                for learner in learners {
                    yield learner;
                }
                debug!(page, count, "page consumed");
                page += 1;
            }
            info!(pages = page - 1, "learner stream exhausted");
        }
    }

    async fn bearer_token(&self) -> Result<String, FetchError> {
        with_backoff(&self.retry, "token fetch", || self.request_token())
            .await
            .map_err(|(err, attempts)| wrap_exhausted("token fetch", err, attempts))
    }

    async fn request_token(&self) -> Result<String, FetchError> {
        let response = self
            .client
            .post(format!("{}/token", self.api_base))
            .header("x-business-id", &self.business_id)
            .json(&serde_json::json!({
                "username": self.username,
                "password": self.password,
            }))
            .send()
            .await
            .map_err(|source| FetchError::Request {
                context: "token fetch",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                context: "token fetch",
                status,
            });
        }

        let body: Value = response.json().await.map_err(|source| FetchError::Request {
            context: "token fetch",
            source,
        })?;
        body.pointer("/data/access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(FetchError::MalformedTokenResponse)
    }

    /// Fetch one page with retries. `None` means the stream is done: either
    /// an empty page or a non-transient failure treated as early exhaustion.
    async fn next_page(
        &self,
        token: &str,
        page: u32,
        limit: usize,
    ) -> Result<Option<Vec<Learner>>, FetchError> {
        let attempt = with_backoff(&self.retry, "page fetch", || {
            self.fetch_page(token, page, limit)
        })
        .await;

        match attempt {
            Ok(learners) if learners.is_empty() => {
                info!(page, "no more learners, stopping");
                Ok(None)
            }
            Ok(learners) => Ok(Some(learners)),
            Err((err, _)) if !err.is_transient() => {
                warn!(page, error = %err, "non-transient fetch failure, ending stream early");
                Ok(None)
            }
            Err((err, attempts)) => Err(wrap_exhausted("page fetch", err, attempts)),
        }
    }

    async fn fetch_page(
        &self,
        token: &str,
        page: u32,
        limit: usize,
    ) -> Result<Vec<Learner>, FetchError> {
        let response = self
            .client
            .get(format!("{}/learners", self.api_base))
            .query(&[("page", page.to_string()), ("limit", limit.to_string())])
            .bearer_auth(token)
            .header("x-business-id", &self.business_id)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                context: "page fetch",
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                context: "page fetch",
                status,
            });
        }

        let body: Value = response.json().await.map_err(|source| FetchError::Request {
            context: "page fetch",
            source,
        })?;

        let raw = match body.pointer("/data/info").and_then(Value::as_array) {
            Some(items) => items.clone(),
            None => Vec::new(),
        };

        // Deserialize element by element so one malformed record is skipped
        // instead of losing the whole page.
        let mut learners = Vec::with_capacity(raw.len());
        for item in raw {
            match serde_json::from_value::<Learner>(item) {
                Ok(learner) => learners.push(learner),
                Err(err) => warn!(page, error = %err, "skipping malformed learner record"),
            }
        }
        Ok(learners)
    }
}

fn wrap_exhausted(context: &'static str, err: FetchError, attempts: u32) -> FetchError {
    if err.is_transient() {
        FetchError::RetriesExhausted {
            context,
            attempts,
            source: Box::new(err),
        }
    } else {
        err
    }
}
