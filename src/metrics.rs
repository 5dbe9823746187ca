//! Prometheus counters for served requests and business events.

use metrics::{Counter, counter, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const RESPONSE_TIME: &str = "http_response_time_seconds";
pub const PVZ_CREATED: &str = "business_pvz_created_total";
pub const RECEPTIONS_CREATED: &str = "business_order_receptions_created_total";
pub const PRODUCTS_ADDED: &str = "business_products_added_total";

const RESPONSE_TIME_BUCKETS: [f64; 9] = [0.1, 0.3, 0.5, 0.7, 1.0, 1.5, 2.0, 3.0, 5.0];

/// Counts of successfully committed business operations.
///
/// Handles bind to the recorder installed when the value is built, so build
/// it after [`install_exporter`].
#[derive(Debug, Clone)]
pub struct BusinessMetrics {
    pvz_created: Counter,
    receptions_created: Counter,
    products_added: Counter,
}

impl Default for BusinessMetrics {
    fn default() -> Self {
        Self {
            pvz_created: counter!(PVZ_CREATED),
            receptions_created: counter!(RECEPTIONS_CREATED),
            products_added: counter!(PRODUCTS_ADDED),
        }
    }
}

impl BusinessMetrics {
    pub fn pvz_created(&self) {
        self.pvz_created.increment(1);
    }

    pub fn reception_created(&self) {
        self.receptions_created.increment(1);
    }

    pub fn product_added(&self) {
        self.products_added.increment(1);
    }
}

/// Counts one served request of any transport.
pub fn count_request() {
    counter!(REQUESTS_TOTAL).increment(1);
}

/// Counts one served HTTP request and records its latency.
pub fn observe_request(method: &str, path: &str, elapsed: Duration) {
    count_request();
    histogram!(RESPONSE_TIME, "method" => method.to_owned(), "path" => path.to_owned())
        .record(elapsed.as_secs_f64());
}

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(RESPONSE_TIME.to_owned()),
        &RESPONSE_TIME_BUCKETS,
    )
}

/// Installs the global recorder and serves `/metrics` on `addr`.
///
/// Must run inside a tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> Result<(), BuildError> {
    builder()?.with_http_listener(addr).install()?;
    info!(address = %addr, "serving metrics");
    Ok(())
}
