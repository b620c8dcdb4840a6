//! Exported gauge families.
//!
//! Every write is a plain `set` on the series named by its label tuple, so
//! the last write for a tuple wins and nothing is aggregated. Series that
//! stop being written keep their last value.

use crate::error::Result;
use crate::extractor::PriceRow;
use crate::timing::TimingSample;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

pub const SUBSYSTEM: &str = "external";

pub const URL_LABELS: [&str; 1] = ["url"];

pub const PRICE_LABELS: [&str; 10] = [
    "url",
    "cruiseid",
    "itinerary",
    "stateroomclass",
    "datelabel",
    "ship",
    "departureport",
    "days",
    "shipcode",
    "destinationcode",
];

/// The process-wide gauge set, registered in its own registry.
///
/// Cloning is cheap and every clone writes the same series.
#[derive(Clone)]
pub struct MetricSet {
    registry: Registry,
    url_status: GaugeVec,
    url_response_ms: GaugeVec,
    url_dns_ms: GaugeVec,
    url_first_byte_ms: GaugeVec,
    url_connect_time_ms: GaugeVec,
    price: GaugeVec,
}

fn gauge_vec(namespace: &str, name: &str, help: &str, labels: &[&str]) -> Result<GaugeVec> {
    let opts = Opts::new(name, help).namespace(namespace).subsystem(SUBSYSTEM);
    Ok(GaugeVec::new(opts, labels)?)
}

impl MetricSet {
    pub fn new(namespace: &str) -> Result<Self> {
        let registry = Registry::new();

        let url_status = gauge_vec(namespace, "proce", "Status of the URL as a integer value", &URL_LABELS)?;
        let url_response_ms = gauge_vec(
            namespace,
            "url_response_ms",
            "Response time in milliseconds it took for the URL to respond.",
            &URL_LABELS,
        )?;
        let url_dns_ms = gauge_vec(
            namespace,
            "url_dns_ms",
            "Response time in milliseconds it took for the DNS request to take place.",
            &URL_LABELS,
        )?;
        let url_first_byte_ms = gauge_vec(
            namespace,
            "url_first_byte_ms",
            "Response time in milliseconds it took to retrieve the first byte.",
            &URL_LABELS,
        )?;
        let url_connect_time_ms = gauge_vec(
            namespace,
            "url_connect_time_ms",
            "Response time in milliseconds it took to establish the initial connection.",
            &URL_LABELS,
        )?;
        let price = gauge_vec(namespace, "price", "cabin price with labels", &PRICE_LABELS)?;

        for gauge in [
            &url_status,
            &url_response_ms,
            &url_dns_ms,
            &url_first_byte_ms,
            &url_connect_time_ms,
            &price,
        ] {
            registry.register(Box::new(gauge.clone()))?;
        }

        Ok(Self {
            registry,
            url_status,
            url_response_ms,
            url_dns_ms,
            url_first_byte_ms,
            url_connect_time_ms,
            price,
        })
    }

    /// Registry handle for the exposition endpoint.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_timing(&self, url: &str, timing: &TimingSample) {
        let labels = [url];
        self.url_dns_ms.with_label_values(&labels).set(timing.dns_ms());
        self.url_connect_time_ms
            .with_label_values(&labels)
            .set(timing.connect_ms());
        self.url_response_ms.with_label_values(&labels).set(timing.total_ms());
        self.url_first_byte_ms
            .with_label_values(&labels)
            .set(timing.first_byte_ms());
        self.url_status
            .with_label_values(&labels)
            .set(f64::from(timing.status));
    }

    pub fn record_price(&self, row: &PriceRow) {
        self.price
            .with_label_values(&row.label_values())
            .set(row.price as f64);
    }

    /// Renders every family in the Prometheus text format.
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
