//! A model provider for OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use backoff::future::retry_notify;
use colloquy_model::{ErrorKind, ModelProvider, ModelProviderError, ModelRequest};
use mime::Mime;
use reqwest::{Client, StatusCode, header};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use proto::{ChatCompletion, ChatCompletionRequest, ErrorBody};
pub use response::OpenAIResponse;

/// Error type for [`OpenAIProvider`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    status: Option<StatusCode>,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status of the failed response, if there was one.
    #[inline]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} ({status})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// OpenAI-compatible model provider.
///
/// Requests go to the `/chat/completions` endpoint with function
/// definitions. Rate limits, server errors and connection failures are
/// retried with exponential backoff until the configured retry window
/// runs out.
#[derive(Clone, Debug)]
pub struct OpenAIProvider {
    client: Client,
    config: Arc<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Creates a new `OpenAIProvider` with the given configuration.
    #[inline]
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for OpenAIProvider {
    type Error = Error;
    type Response = OpenAIResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static {
        let openai_req = proto::create_request(req, &self.config);
        let client = self.client.clone();
        let config = Arc::clone(&self.config);

        async move {
            let policy = ExponentialBackoffBuilder::new()
                .with_max_elapsed_time(Some(config.retry_window))
                .build();
            let completion = retry_notify(
                policy,
                || send_once(&client, &config, &openai_req),
                |err: Error, wait: Duration| {
                    warn!("request failed, retrying in {wait:?}: {err}");
                },
            )
            .await?;
            Ok(OpenAIResponse::from_completion(completion))
        }
    }
}

async fn send_once(
    client: &Client,
    config: &OpenAIConfig,
    req: &ChatCompletionRequest,
) -> Result<ChatCompletion, backoff::Error<Error>> {
    trace!("sending a request to {}", config.base_url);
    let resp = client
        .post(format!("{}/chat/completions", config.base_url))
        .bearer_auth(&config.api_key)
        .header(header::ACCEPT, "application/json")
        .json(req)
        .send()
        .await
        .map_err(|err| {
            let retryable = err.is_connect() || err.is_timeout();
            let err = Error::new(format!("{err}"), ErrorKind::Other);
            if retryable {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            }
        })?;

    let status = resp.status();
    if !status.is_success() {
        let retry_after = resp
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = resp.text().await.unwrap_or_default();
        return Err(classify_failure(status, &body, retry_after));
    }

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let is_json = content_type
        .and_then(|v| v.parse().ok())
        .is_some_and(|m: Mime| m.subtype() == mime::JSON);
    if !is_json {
        return Err(backoff::Error::permanent(Error::new(
            format!("Unexpected content type: {content_type:?}"),
            ErrorKind::Other,
        )));
    }

    let completion: ChatCompletion = resp.json().await.map_err(|err| {
        backoff::Error::permanent(Error::new(format!("{err}"), ErrorKind::Other))
    })?;
    let moderated = completion
        .choices
        .first()
        .is_some_and(|choice| choice.finish_reason.as_deref() == Some("content_filter"));
    if moderated {
        return Err(backoff::Error::permanent(Error::new(
            "The completion was filtered",
            ErrorKind::Moderated,
        )));
    }
    Ok(completion)
}

fn classify_failure(
    status: StatusCode,
    body: &str,
    retry_after: Option<Duration>,
) -> backoff::Error<Error> {
    let (message, code) = match serde_json::from_str::<ErrorBody>(body) {
        Ok(body) => (body.error.message, body.error.code),
        Err(_) => (body.to_owned(), None),
    };
    let is_content_filter = code
        .as_ref()
        .and_then(|code| code.as_str())
        .is_some_and(|code| code == "content_filter");

    let kind = if status == StatusCode::TOO_MANY_REQUESTS {
        ErrorKind::RateLimitExceeded
    } else if is_content_filter {
        ErrorKind::Moderated
    } else {
        ErrorKind::Other
    };
    let err = Error {
        message,
        kind,
        status: Some(status),
    };

    if kind.is_transient() || status.is_server_error() {
        match retry_after {
            Some(duration) => backoff::Error::retry_after(err, duration),
            None => backoff::Error::transient(err),
        }
    } else {
        backoff::Error::permanent(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_transient(err: &backoff::Error<Error>) -> bool {
        matches!(err, backoff::Error::Transient { .. })
    }

    fn inner(err: backoff::Error<Error>) -> Error {
        match err {
            backoff::Error::Permanent(err) => err,
            backoff::Error::Transient { err, .. } => err,
        }
    }

    #[test]
    fn test_classify_failure() {
        let body = r#"{"error": {"message": "Slow down", "code": "rate_limit_exceeded"}}"#;
        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            body,
            Some(Duration::from_secs(2)),
        );
        assert!(is_transient(&err));
        let err = inner(err);
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        assert_eq!(err.message(), "Slow down");

        let err = classify_failure(StatusCode::BAD_GATEWAY, "upstream down", None);
        assert!(is_transient(&err));
        assert_eq!(inner(err).message(), "upstream down");

        let body = r#"{"error": {"message": "Filtered", "code": "content_filter"}}"#;
        let err = classify_failure(StatusCode::BAD_REQUEST, body, None);
        assert!(!is_transient(&err));
        assert_eq!(inner(err).kind(), ErrorKind::Moderated);

        let err = classify_failure(StatusCode::UNAUTHORIZED, "{}", None);
        assert!(!is_transient(&err));
        let err = inner(err);
        assert_eq!(err.kind(), ErrorKind::Other);
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
    }
}
