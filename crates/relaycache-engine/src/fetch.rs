//! HTTP GET against the remote origin.

use std::sync::Arc;
use std::time::{Duration, Instant};

use relaycache_core::MetricTracer;
use reqwest::StatusCode;

use crate::error::{EngineError, FetchInfo, Result};
use crate::request::RequestTemplate;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Body and metadata of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub info: FetchInfo,
}

/// Issues resolved requests and reports latency to the tracer.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
    tracer: Arc<dyn MetricTracer>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration, tracer: Arc<dyn MetricTracer>) -> Self {
        Self {
            client,
            timeout,
            tracer,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends the request; only status 200 counts as success.
    pub async fn fetch(&self, request: RequestTemplate) -> Result<Fetched> {
        let url = request.url.to_string();
        let route = request.route().to_string();
        let started = Instant::now();

        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        let info = FetchInfo {
            remote_url: url.clone(),
            status_code: status.as_u16(),
        };

        tracing::debug!(request_url = %url, request_status = status.as_u16(), "remote fetch");

        if status != StatusCode::OK {
            self.tracer
                .backend_latency(&route, status.as_u16(), started.elapsed());
            return Err(EngineError::UpstreamStatus {
                info,
                status_text: status.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(&url, e))?;

        self.tracer
            .backend_latency(&route, status.as_u16(), started.elapsed());
        self.tracer.incr_backend_counter();

        Ok(Fetched {
            body: body.to_vec(),
            info,
        })
    }
}

fn transport_error(url: &str, err: reqwest::Error) -> EngineError {
    if err.is_timeout() {
        EngineError::Timeout {
            url: url.to_string(),
        }
    } else {
        EngineError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}
