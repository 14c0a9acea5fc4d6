//! Outbound HTTP access for every pipeline stage.
//!
//! Stages talk to [`HttpTransport`] rather than to reqwest directly so that
//! tests can substitute an in-memory transport. Only GET is ever issued.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;

/// User agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("iptvscan/", env!("CARGO_PKG_VERSION"));

/// Transport-level failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Body read failed: {0}")]
    Body(String),

    #[error("Request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Status and fully received body of a GET.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with [`TransportError::Status`] unless the status is 2xx.
    pub fn require_success(self) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status(self.status))
        }
    }

    /// Body as text, falling back to GBK when it is not valid UTF-8.
    pub fn text(&self) -> String {
        decode_text(&self.body)
    }
}

/// GET-only HTTP client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a GET and return only the status, without reading the body.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, TransportError>;

    /// Issue a GET and read the whole body.
    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport::probe`] bounded by `timeout` regardless of the transport.
pub async fn probe_within(
    transport: &dyn HttpTransport,
    url: &str,
    timeout: Duration,
) -> Result<u16, TransportError> {
    tokio::time::timeout(timeout, transport.probe(url, timeout))
        .await
        .unwrap_or(Err(TransportError::Timeout))
}

/// [`HttpTransport::get`] bounded by `timeout` regardless of the transport.
pub async fn get_within(
    transport: &dyn HttpTransport,
    url: &str,
    timeout: Duration,
) -> Result<HttpResponse, TransportError> {
    tokio::time::timeout(timeout, transport.get(url, timeout))
        .await
        .unwrap_or(Err(TransportError::Timeout))
}

/// Decode a payload as UTF-8, or as GBK if that fails.
pub fn decode_text(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::GBK.decode(body);
            text.into_owned()
        }
    }
}

/// Production transport backed by a shared reqwest connection pool.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .pool_max_idle_per_host(4)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, TransportError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        Ok(response.status().as_u16())
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<HttpResponse, TransportError> {
        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub mod fake {
    //! In-memory transport for tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    enum Route {
        Respond(u16, Bytes),
        Fail(TransportError),
        Hang,
    }

    /// Routes URLs to canned responses and records peak concurrency.
    pub struct FakeTransport {
        routes: HashMap<String, Route>,
        delay: Duration,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    struct InFlight<'a>(&'a AtomicUsize);

    impl Drop for InFlight<'_> {
        fn drop(&mut self) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self {
                routes: HashMap::new(),
                delay: Duration::ZERO,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        /// Delay every request by `delay` before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn respond(mut self, url: &str, status: u16, body: impl Into<Bytes>) -> Self {
            self.routes
                .insert(url.to_string(), Route::Respond(status, body.into()));
            self
        }

        pub fn fail(mut self, url: &str, error: TransportError) -> Self {
            self.routes.insert(url.to_string(), Route::Fail(error));
            self
        }

        /// Never answer `url`; only a caller-side timeout ends the request.
        pub fn hang(mut self, url: &str) -> Self {
            self.routes.insert(url.to_string(), Route::Hang);
            self
        }

        pub fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        async fn answer(&self, url: &str) -> Result<HttpResponse, TransportError> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let _guard = InFlight(&self.in_flight);
            self.peak.fetch_max(current, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match self.routes.get(url) {
                Some(Route::Respond(status, body)) => Ok(HttpResponse {
                    status: *status,
                    body: body.clone(),
                }),
                Some(Route::Fail(error)) => Err(error.clone()),
                Some(Route::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(TransportError::Timeout)
                }
                None => Err(TransportError::Connect("connection refused".to_string())),
            }
        }
    }

    #[async_trait]
    impl HttpTransport for FakeTransport {
        async fn probe(&self, url: &str, _timeout: Duration) -> Result<u16, TransportError> {
            self.answer(url).await.map(|r| r.status)
        }

        async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpResponse, TransportError> {
            self.answer(url).await
        }
    }
}
