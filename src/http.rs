use crate::config::HttpConfig;
use backon::{BlockingRetryable, ExponentialBuilder};
use reqwest::blocking::{Client, Response};
use snafu::prelude::*;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors specific to the HTTP transport layer
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to build HTTP client: {message}"))]
    ClientBuild { message: String },

    #[snafu(display("HTTP request to {url} failed"))]
    Request { url: String, source: reqwest::Error },

    #[snafu(display("HTTP request to {url} returned retryable status {status}"))]
    RetryableStatus { url: String, status: u16 },
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// HTTP client wrapper with retry, user agent, proxy, and timeout support.
///
/// All registry traffic goes through this client: metadata queries, tarball
/// downloads, and search pages share one connection pool.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    client: Client,
    config: HttpConfig,
}

impl HttpClient {
    /// Build a new [`HttpClient`] with the given configuration.
    pub(crate) fn new(config: &HttpConfig) -> Result<Self> {
        let user_agent = format!("pkgmirror/{}", env!("CARGO_PKG_VERSION"));

        let mut builder = Client::builder()
            .user_agent(user_agent)
            .timeout(config.timeout)
            .connect_timeout(CONNECT_TIMEOUT);

        if let Some(ref proxy_url) = config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| Error::ClientBuild {
                message: format!("invalid proxy URL '{}': {}", proxy_url, e),
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(|e| Error::ClientBuild {
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Perform a GET request with retry on transient errors.
    ///
    /// Retries on 429 (rate limit), 5xx (server errors), and connection errors.
    /// Returns the response on success (including 4xx responses other than 429).
    pub(crate) fn get(&self, url: &str) -> Result<Response> {
        let backoff = self.build_backoff();
        let url_owned = url.to_string();

        let operation = || {
            let response = self
                .client
                .get(&url_owned)
                .send()
                .with_context(|_| RequestSnafu {
                    url: url_owned.clone(),
                })?;

            Self::classify_response(response, &url_owned)
        };

        operation
            .retry(backoff)
            .notify(|err, dur| {
                tracing::debug!("HTTP request failed, retrying in {:?}: {:?}", dur, err);
            })
            .call()
    }

    fn build_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.config.backoff_base)
            .with_max_delay(self.config.backoff_max)
            .with_max_times(self.config.retries)
            .with_jitter()
    }

    fn classify_response(response: Response, url: &str) -> Result<Response> {
        let status = response.status();

        // 429 Too Many Requests - retryable
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return RetryableStatusSnafu {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .fail();
        }

        // 5xx Server Errors - retryable
        if status.is_server_error() {
            return RetryableStatusSnafu {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .fail();
        }

        // All other responses (including 4xx other than 429) are returned as-is
        Ok(response)
    }
}
