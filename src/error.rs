use thiserror::Error;

/// Errors surfaced by the LMS record source.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {context} failed: {source}")]
    Request {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{context} returned HTTP {status}")]
    Status {
        context: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("token response missing data.access_token")]
    MalformedTokenResponse,
    #[error("gave up on {context} after {attempts} attempts: {source}")]
    RetriesExhausted {
        context: &'static str,
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },
}

impl FetchError {
    /// Transient failures are worth another attempt: timeouts, connection
    /// errors, and 5xx responses. Everything else (4xx above all) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request { source, .. } => source.is_timeout() || source.is_connect(),
            FetchError::Status { status, .. } => status.is_server_error(),
            FetchError::MalformedTokenResponse => false,
            FetchError::RetriesExhausted { .. } => false,
        }
    }

}

/// Errors surfaced by a batch sink. The pipeline catches these per batch.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("email provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("email provider returned HTTP {status}: {body}")]
    Provider {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("gave up on email dispatch after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<DispatchError>,
    },
}

impl DispatchError {
    pub fn is_transient(&self) -> bool {
        match self {
            DispatchError::Request(source) => source.is_timeout() || source.is_connect(),
            DispatchError::Provider { status, .. } => status.is_server_error(),
            DispatchError::RetriesExhausted { .. } => false,
        }
    }
}
