//! Prometheus exposition: HTTP request metrics plus the stored device series.
//!
//! Request metrics live in a registry owned by [`HttpMetrics`]. Device gauges
//! and counters are read from the usage store on every scrape and rendered
//! through a throwaway registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};

use smarthub_app::ports::{BusTransport, DeviceRepository, UsageStore};
use smarthub_domain::metric::{MetricsSnapshot, SeriesValue};

use crate::error::ApiError;
use crate::state::AppState;

/// Per-request counters and latency histogram.
pub struct HttpMetrics {
    registry: Registry,
    request_count: IntCounterVec,
    request_latency: HistogramVec,
}

impl HttpMetrics {
    /// # Errors
    ///
    /// Returns [`prometheus::Error`] if a collector cannot be registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let request_count = IntCounterVec::new(
            Opts::new("request_count", "Total Request Count"),
            &["method", "endpoint"],
        )?;
        let request_latency = HistogramVec::new(
            HistogramOpts::new("request_latency_seconds", "Request latency"),
            &["endpoint"],
        )?;

        registry.register(Box::new(request_count.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;

        Ok(Self {
            registry,
            request_count,
            request_latency,
        })
    }

    /// Count one request and record how long it took.
    pub fn observe(&self, method: &str, endpoint: &str, elapsed: Duration) {
        self.request_count
            .with_label_values(&[method, endpoint])
            .inc();
        self.request_latency
            .with_label_values(&[endpoint])
            .observe(elapsed.as_secs_f64());
    }

    /// Render request metrics and the device series in the text format.
    ///
    /// # Errors
    ///
    /// Returns [`prometheus::Error`] if a series has an invalid name or the
    /// encoder fails.
    pub fn render(&self, snapshot: &MetricsSnapshot) -> Result<String, prometheus::Error> {
        let devices = Registry::new();
        register_series(&devices, &snapshot.gauges, SeriesKind::Gauge)?;
        register_series(&devices, &snapshot.counters, SeriesKind::Counter)?;

        let mut families = self.registry.gather();
        families.extend(devices.gather());

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}

#[derive(Clone, Copy)]
enum SeriesKind {
    Gauge,
    Counter,
}

/// Register one collector per metric name. The first series of a name fixes
/// its label set; series with another label set are skipped.
fn register_series(
    registry: &Registry,
    series: &[SeriesValue],
    kind: SeriesKind,
) -> Result<(), prometheus::Error> {
    let mut by_name: BTreeMap<&str, Vec<&SeriesValue>> = BTreeMap::new();
    for value in series {
        by_name.entry(value.name.as_str()).or_default().push(value);
    }

    for (name, group) in by_name {
        let label_names: Vec<&str> = group[0].labels.keys().map(String::as_str).collect();
        let opts = Opts::new(name, format!("smarthub device series {name}"));
        let matching = group.iter().filter(|value| {
            value.labels.len() == label_names.len()
                && value
                    .labels
                    .keys()
                    .zip(&label_names)
                    .all(|(key, expected)| key == expected)
        });

        match kind {
            SeriesKind::Gauge => {
                let collector = GaugeVec::new(opts, &label_names)?;
                for value in matching {
                    let labels: Vec<&str> = value.labels.values().map(String::as_str).collect();
                    collector
                        .get_metric_with_label_values(&labels)?
                        .set(value.value);
                }
                registry.register(Box::new(collector))?;
            }
            SeriesKind::Counter => {
                let collector = CounterVec::new(opts, &label_names)?;
                for value in matching {
                    let labels: Vec<&str> = value.labels.values().map(String::as_str).collect();
                    collector
                        .get_metric_with_label_values(&labels)?
                        .inc_by(value.value.max(0.0));
                }
                registry.register(Box::new(collector))?;
            }
        }
    }
    Ok(())
}

/// Middleware recording [`HttpMetrics`] for every routed request.
///
/// The endpoint label is the route template, so device ids do not multiply
/// the series.
pub async fn track_requests(
    State(metrics): State<Arc<HttpMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |path| path.as_str().to_string());

    let start = Instant::now();
    let response = next.run(request).await;
    metrics.observe(&method, &endpoint, start.elapsed());
    response
}

/// Possible responses from the scrape endpoint.
pub enum MetricsResponse {
    Exposition(String),
    EncodingFailed,
}

impl IntoResponse for MetricsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Exposition(body) => {
                ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response()
            }
            Self::EncodingFailed => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// `GET /metrics`
///
/// # Errors
///
/// Returns [`ApiError`] if the usage store cannot be read.
pub async fn report<DR, US, BT>(
    State(state): State<AppState<DR, US, BT>>,
) -> Result<MetricsResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    let snapshot = state.analytics.metrics_snapshot().await?;
    match state.metrics.render(&snapshot) {
        Ok(body) => Ok(MetricsResponse::Exposition(body)),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            Ok(MetricsResponse::EncodingFailed)
        }
    }
}
