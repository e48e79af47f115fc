//! JSON REST API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod analytics;
#[allow(clippy::missing_errors_doc)]
pub mod devices;

use axum::Router;
use axum::routing::get;

use smarthub_app::ports::{BusTransport, DeviceRepository, UsageStore};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<DR, US, BT>() -> Router<AppState<DR, US, BT>>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    Router::new()
        .route("/ids", get(devices::list_ids::<DR, US, BT>))
        .route(
            "/devices",
            get(devices::list::<DR, US, BT>).post(devices::create::<DR, US, BT>),
        )
        .route(
            "/devices/analytics",
            get(analytics::report::<DR, US, BT>),
        )
        .route(
            "/devices/{id}",
            get(devices::get::<DR, US, BT>)
                .put(devices::update::<DR, US, BT>)
                .delete(devices::delete::<DR, US, BT>),
        )
}
