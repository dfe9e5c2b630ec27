use std::time::Duration;

use anyhow::Context;

/// Exponential backoff schedule for transient upstream failures:
/// `base * 2^attempt`, capped.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(5),
            cap: Duration::from_secs(60),
        }
    }
}

/// Everything one run needs, resolved up front from env vars and CLI flags.
/// Passed into the pipeline explicitly so tests can construct their own.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub api_username: String,
    pub api_password: String,
    pub business_id: String,

    pub mailjet_api_key: String,
    pub mailjet_api_secret: String,
    pub origin_email: String,
    pub origin_name: String,

    pub page_size: usize,
    pub batch_limit: usize,
    pub inactive_days: i64,
    pub low_score_threshold: f64,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,

    pub test_mode: bool,
    pub test_email: Option<String>,
}

impl Config {
    pub fn from_env(
        page_size: usize,
        batch_limit: usize,
        inactive_days: i64,
        low_score_threshold: f64,
        retry: RetryPolicy,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(batch_limit > 0, "batch limit must be positive");
        anyhow::ensure!(page_size > 0, "page size must be positive");

        Ok(Self {
            api_base: require("LMS_API_URL")?,
            api_username: require("LMS_USERNAME")?,
            api_password: require("LMS_PASSWORD")?,
            business_id: require("LMS_BUSINESS_ID")?,
            mailjet_api_key: require("MAILJET_API_KEY")?,
            mailjet_api_secret: require("MAILJET_API_SECRET")?,
            origin_email: require("ORIGIN_EMAIL")?,
            origin_name: require("ORIGIN_NAME")?,
            page_size,
            batch_limit,
            inactive_days,
            low_score_threshold,
            retry,
            request_timeout: Duration::from_secs(30),
            test_mode: std::env::var("TEST_MODE").is_ok_and(|v| v == "1" || v == "true"),
            test_email: std::env::var("TEST_EMAIL_ADDRESS").ok(),
        })
    }
}

fn require(name: &'static str) -> anyhow::Result<String> {
    std::env::var(name).with_context(|| format!("{name} must be set"))
}
