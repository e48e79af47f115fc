//! Usage analytics endpoint.

use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Duration;
use serde::Deserialize;

use smarthub_app::ports::{BusTransport, DeviceRepository, UsageStore};
use smarthub_domain::error::ValidationError;
use smarthub_domain::time::{Timestamp, now, parse_iso};
use smarthub_domain::usage::UsageReport;

use crate::error::ApiError;
use crate::state::AppState;

/// Window covered when the query names no bounds.
const DEFAULT_WINDOW_HOURS: i64 = 24;

/// Query string of the analytics endpoint. Both bounds are ISO 8601.
#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Possible responses from the analytics endpoint.
pub enum ReportResponse {
    Ok(Json<UsageReport>),
}

impl IntoResponse for ReportResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

fn parse_bound(name: &str, raw: Option<&str>) -> Result<Option<Timestamp>, ValidationError> {
    raw.map(|raw| {
        parse_iso(raw).ok_or_else(|| {
            ValidationError::single(format!(
                "'{name}' must be an ISO 8601 timestamp, got '{raw}' instead."
            ))
        })
    })
    .transpose()
}

impl AnalyticsQuery {
    /// Resolve the bounds, defaulting to the last day up to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when a bound does not parse.
    pub fn window(&self, now: Timestamp) -> Result<(Timestamp, Timestamp), ValidationError> {
        let from = parse_bound("from", self.from.as_deref());
        let to = parse_bound("to", self.to.as_deref());
        let (from, to) = match (from, to) {
            (Ok(from), Ok(to)) => (from, to),
            (Err(a), Err(b)) => {
                return Err(ValidationError::new(
                    a.violations.into_iter().chain(b.violations).collect(),
                ));
            }
            (Err(err), _) | (_, Err(err)) => return Err(err),
        };
        let to = to.unwrap_or(now);
        let from = from.unwrap_or(to - Duration::hours(DEFAULT_WINDOW_HOURS));
        Ok((from, to))
    }
}

/// `GET /api/devices/analytics?from=&to=`
pub async fn report<DR, US, BT>(
    State(state): State<AppState<DR, US, BT>>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<ReportResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    let current = now();
    let (from, to) = query.window(current)?;
    let report = state.analytics.compute_at(from, to, current).await?;
    Ok(ReportResponse::Ok(Json(report)))
}
