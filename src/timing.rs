//! Per-request network phase timing.
//!
//! The HTTP client is built with two hooks that report into a
//! [`TimingObserver`]: a DNS resolver wrapper and a connector layer. The
//! fetcher itself marks when the request was handed to the client and when
//! the response headers arrived. [`PhaseClock`] folds those marks into a
//! [`TimingSample`].

use futures::future::BoxFuture;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RequestSent,
    DnsStart,
    DnsDone,
    ConnectStart,
    ConnectDone,
    FirstByte,
}

/// Receives phase marks from the transport hooks.
pub trait TimingObserver: Send + Sync {
    fn observe(&self, phase: Phase, at: Instant);
}

/// Network timing of a single request.
///
/// Phases the transport skipped (a pooled connection, an IP literal host)
/// are reported as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingSample {
    pub dns: Duration,
    pub connect: Duration,
    pub first_byte: Duration,
    pub total: Duration,
    pub status: u16,
}

impl TimingSample {
    pub fn dns_ms(&self) -> f64 {
        self.dns.as_millis() as f64
    }

    pub fn connect_ms(&self) -> f64 {
        self.connect.as_millis() as f64
    }

    pub fn first_byte_ms(&self) -> f64 {
        self.first_byte.as_millis() as f64
    }

    pub fn total_ms(&self) -> f64 {
        self.total.as_millis() as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PhaseMarks {
    request_sent: Option<Instant>,
    dns_start: Option<Instant>,
    dns_done: Option<Instant>,
    connect_start: Option<Instant>,
    connect_done: Option<Instant>,
    first_byte: Option<Instant>,
}

fn span(from: Option<Instant>, to: Option<Instant>) -> Duration {
    match (from, to) {
        (Some(from), Some(to)) => to.saturating_duration_since(from),
        _ => Duration::ZERO,
    }
}

impl PhaseMarks {
    fn sample(&self, status: u16) -> TimingSample {
        // The resolver runs inside the connector, so the connect phase starts
        // where DNS ended when both were observed.
        let connect_from = match (self.connect_start, self.dns_done) {
            (Some(start), Some(dns)) if dns >= start => Some(dns),
            (start, _) => start,
        };
        TimingSample {
            dns: span(self.dns_start, self.dns_done),
            connect: span(connect_from, self.connect_done),
            first_byte: span(self.request_sent, self.first_byte),
            total: span(self.request_sent, self.first_byte),
            status,
        }
    }
}

/// Shared mark board for one client. Requests are issued one at a time, so
/// the board is reset before each request and read after it.
#[derive(Debug, Clone, Default)]
pub struct PhaseClock {
    marks: Arc<Mutex<PhaseMarks>>,
}

impl PhaseClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        *self.lock() = PhaseMarks::default();
    }

    pub fn sample(&self, status: u16) -> TimingSample {
        self.lock().sample(status)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PhaseMarks> {
        self.marks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TimingObserver for PhaseClock {
    fn observe(&self, phase: Phase, at: Instant) {
        let mut marks = self.lock();
        let slot = match phase {
            Phase::RequestSent => &mut marks.request_sent,
            Phase::DnsStart => &mut marks.dns_start,
            Phase::DnsDone => &mut marks.dns_done,
            Phase::ConnectStart => &mut marks.connect_start,
            Phase::ConnectDone => &mut marks.connect_done,
            Phase::FirstByte => &mut marks.first_byte,
        };
        *slot = Some(at);
    }
}

/// DNS resolver that reports lookup start and end.
pub struct TimedResolver {
    observer: Arc<dyn TimingObserver>,
}

impl TimedResolver {
    pub fn new(observer: Arc<dyn TimingObserver>) -> Self {
        Self { observer }
    }
}

impl Resolve for TimedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let observer = self.observer.clone();
        let host = name.as_str().to_owned();
        Box::pin(async move {
            observer.observe(Phase::DnsStart, Instant::now());
            let lookup = tokio::net::lookup_host((host.as_str(), 0)).await;
            observer.observe(Phase::DnsDone, Instant::now());

            let resolved: Vec<SocketAddr> = match lookup {
                Ok(addrs) => addrs.collect(),
                Err(e) => return Err(BoxError::from(e)),
            };
            let addrs: Addrs = Box::new(resolved.into_iter());
            Ok::<Addrs, BoxError>(addrs)
        })
    }
}

/// Connector layer that reports connection establishment start and end.
#[derive(Clone)]
pub struct TimedConnectLayer {
    observer: Arc<dyn TimingObserver>,
}

impl TimedConnectLayer {
    pub fn new(observer: Arc<dyn TimingObserver>) -> Self {
        Self { observer }
    }
}

impl<S> Layer<S> for TimedConnectLayer {
    type Service = TimedConnect<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimedConnect {
            inner,
            observer: self.observer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TimedConnect<S> {
    inner: S,
    observer: Arc<dyn TimingObserver>,
}

impl<S, R> Service<R> for TimedConnect<S>
where
    S: Service<R>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<S::Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        let observer = self.observer.clone();
        observer.observe(Phase::ConnectStart, Instant::now());
        let connecting = self.inner.call(req);
        Box::pin(async move {
            let conn = connecting.await;
            observer.observe(Phase::ConnectDone, Instant::now());
            conn
        })
    }
}
