//! JSON REST handlers for devices.
//!
//! Every accepted change is published on the bus after the store write.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use smarthub_app::ports::{BusTransport, DeviceRepository, UsageStore};
use smarthub_domain::device::Device;
use smarthub_domain::id::DeviceId;
use smarthub_domain::sync::Method;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the ids endpoint.
pub enum ListIdsResponse {
    Ok(Json<Vec<DeviceId>>),
}

impl IntoResponse for ListIdsResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Device>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get and update endpoints.
pub enum DeviceResponse {
    Ok(Json<Device>),
}

impl IntoResponse for DeviceResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<Device>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// `GET /api/ids`
pub async fn list_ids<DR, US, BT>(
    State(state): State<AppState<DR, US, BT>>,
) -> Result<ListIdsResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    let ids = state.devices.list_ids().await?;
    Ok(ListIdsResponse::Ok(Json(ids)))
}

/// `GET /api/devices`
pub async fn list<DR, US, BT>(
    State(state): State<AppState<DR, US, BT>>,
) -> Result<ListResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    let devices = state.devices.list_devices().await?;
    Ok(ListResponse::Ok(Json(devices)))
}

/// `GET /api/devices/{id}`
pub async fn get<DR, US, BT>(
    State(state): State<AppState<DR, US, BT>>,
    Path(id): Path<DeviceId>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    let device = state.devices.get_device(&id).await?;
    Ok(DeviceResponse::Ok(Json(device)))
}

/// `POST /api/devices`
pub async fn create<DR, US, BT>(
    State(state): State<AppState<DR, US, BT>>,
    Json(document): Json<Value>,
) -> Result<CreateResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    let device = state.devices.create_device(&document).await?;
    state
        .sync
        .publish(&device.to_document(), &device.id, Method::Post)
        .await;
    Ok(CreateResponse::Created(Json(device)))
}

/// `PUT /api/devices/{id}`
///
/// The request body is a partial update; it is published as received.
pub async fn update<DR, US, BT>(
    State(state): State<AppState<DR, US, BT>>,
    Path(id): Path<DeviceId>,
    Json(document): Json<Value>,
) -> Result<DeviceResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    let device = state.devices.update_device(&id, &document).await?;
    state.sync.publish(&document, &id, Method::Update).await;
    Ok(DeviceResponse::Ok(Json(device)))
}

/// `DELETE /api/devices/{id}`
pub async fn delete<DR, US, BT>(
    State(state): State<AppState<DR, US, BT>>,
    Path(id): Path<DeviceId>,
) -> Result<DeleteResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    US: UsageStore + Send + Sync + 'static,
    BT: BusTransport + Send + Sync + 'static,
{
    state.devices.delete_device(&id).await?;
    state.sync.publish(&json!({}), &id, Method::Delete).await;
    Ok(DeleteResponse::NoContent)
}
