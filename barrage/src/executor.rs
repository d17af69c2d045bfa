use barrage_core::{ConfigError, ErrorKind, RequestOutcome, DEFAULT_REQUEST_TIMEOUT};
use reqwest::Client;
use std::time::{Duration, Instant};
use url::Url;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

/// Issues one HTTP request per call and classifies the result.
///
/// The timer starts immediately before issuance and stops on a response or a
/// terminal failure, so latency is end-to-end. Transport failures (connection
/// refused, timeout, DNS, TLS) carry no latency sample; a non-success status
/// completed the round trip and keeps its measured latency.
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    target: Url,
    treat_status_as_error: bool,
    timeout: Option<Duration>,
}

impl HttpExecutor {
    pub fn new(target: &str) -> Result<Self, ConfigError> {
        let target = Url::parse(target)
            .map_err(|err| ConfigError::InvalidTarget(format!("{target}: {err}")))?;
        Ok(Self {
            client: Client::new(),
            target,
            treat_status_as_error: true,
            timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        })
    }

    /// Use a caller-configured client (timeouts, TLS setup, proxies).
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// When disabled, a non-success status is recorded as a success with its
    /// status code rather than as an [`ErrorKind::HttpStatus`] failure.
    pub fn treat_status_as_error(mut self, enabled: bool) -> Self {
        self.treat_status_as_error = enabled;
        self
    }

    /// Per-request timeout (default 30s). A request still outstanding at the
    /// deadline is classified as a transport failure. `None` disables the
    /// timeout, leaving attempts exposed to targets that never respond.
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn execute(&self) -> RequestOutcome {
        let mut request = self.client.get(self.target.clone());
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let start = Instant::now();
        match request.send().await {
            Ok(response) => {
                let latency = start.elapsed();
                let status = response.status();
                if status.is_success() || !self.treat_status_as_error {
                    trace!(status = status.as_u16(), ?latency, "attempt succeeded");
                    RequestOutcome::Success {
                        latency,
                        status: status.as_u16(),
                    }
                } else {
                    trace!(status = status.as_u16(), ?latency, "attempt rejected");
                    RequestOutcome::Failure {
                        latency: Some(latency),
                        kind: ErrorKind::HttpStatus(status.as_u16()),
                    }
                }
            }
            Err(err) => {
                trace!("attempt failed: {err}");
                RequestOutcome::Failure {
                    latency: None,
                    kind: ErrorKind::Network,
                }
            }
        }
    }
}
