//! Timed HTTP fetching -- the one network primitive every stage shares.
//!
//! All timing in the pipeline originates here: the latency and throughput
//! stages consume the elapsed wall-clock time reported by the fetcher
//! rather than timing around the call, so a test double can simulate any
//! link by returning whatever duration it likes.

use std::time::{Duration, Instant};

use anyhow::Result;
use bytes::Bytes;
use reqwest::Client;

/// A completed GET: the response body and how long the round trip took.
///
/// The clock covers everything from issuing the request to draining the
/// body, which is the figure the download workers fold into their totals.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub body: Bytes,
    pub elapsed: Duration,
}

/// Timed GET abstraction over the HTTP client.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url`, returning the full body plus elapsed wall-clock time.
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// Production fetcher backed by a shared [`reqwest::Client`].
///
/// Response status is deliberately not inspected: a completed response of
/// any status ticks the clock and delivers its body, which is what the
/// classic speedtest tools count.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher. A `timeout` of `None` leaves requests unbounded;
    /// a hung transfer then stalls its worker until the transport gives up.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait::async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let body = response.bytes().await?;
        let elapsed = start.elapsed();
        Ok(FetchResponse { body, elapsed })
    }
}
