use crate::error::Result;
use crate::query::PageQuery;
use crate::timing::{Phase, PhaseClock, TimedConnectLayer, TimedResolver, TimingObserver, TimingSample};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";

/// Raw response of one page request.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub timing: TimingSample,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issues one request. Transport failures are returned, never retried.
    async fn fetch(&self, url: &str, query: &PageQuery) -> Result<Fetched>;
}

/// POSTs page queries and times each request phase.
pub struct HttpFetcher {
    client: Client,
    clock: PhaseClock,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self> {
        let clock = PhaseClock::new();
        let observer: Arc<dyn TimingObserver> = Arc::new(clock.clone());

        let mut builder = Client::builder()
            .user_agent(user_agent)
            .dns_resolver(Arc::new(TimedResolver::new(observer.clone())))
            .connector_layer(TimedConnectLayer::new(observer));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            clock,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, query: &PageQuery) -> Result<Fetched> {
        log::debug!("POST {} skip={} count={}", url, query.skip(), query.count());

        self.clock.reset();
        self.clock.observe(Phase::RequestSent, Instant::now());
        let res = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(query)
            .send()
            .await?;
        self.clock.observe(Phase::FirstByte, Instant::now());

        let status = res.status();
        let timing = self.clock.sample(status.as_u16());
        if !status.is_success() {
            log::warn!("{} answered with HTTP {}", url, status);
        }

        let body = res.bytes().await?.to_vec();
        log::debug!("Body length: {} bytes", body.len());

        Ok(Fetched { body, timing })
    }
}
