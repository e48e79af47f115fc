//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use smarthub_app::ports::DeviceRepository;
use smarthub_domain::device::{Device, DeviceChanges, DeviceKind, DeviceStatus, Parameters};
use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Device`].
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let kind: String = row.try_get("type")?;
        let room: String = row.try_get("room")?;
        let name: String = row.try_get("name")?;
        let status: String = row.try_get("status")?;
        let parameters: String = row.try_get("parameters")?;

        let kind = DeviceKind::from_str(&kind).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let status =
            DeviceStatus::from_str(&status).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let parameters: Parameters =
            serde_json::from_str(&parameters).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Device {
            id: DeviceId::new(id),
            kind,
            room,
            name,
            status,
            parameters,
        }))
    }
}

const INSERT: &str =
    "INSERT INTO devices (id, type, room, name, status, parameters) VALUES (?, ?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY id";
const SELECT_IDS: &str = "SELECT id FROM devices ORDER BY id";
const MERGE: &str = "UPDATE devices SET \
    room = COALESCE(?, room), \
    name = COALESCE(?, name), \
    status = COALESCE(?, status), \
    parameters = json_patch(parameters, ?) \
    WHERE id = ? RETURNING *";
const DELETE_BY_ID: &str = "DELETE FROM devices WHERE id = ?";

/// `SQLite`-backed device repository.
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn insert(&self, device: Device) -> impl Future<Output = Result<Device, SmartHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let parameters = serde_json::to_string(&device.parameters).map_err(StorageError::from)?;
            sqlx::query(INSERT)
                .bind(device.id.as_str())
                .bind(device.kind.as_str())
                .bind(&device.room)
                .bind(&device.name)
                .bind(device.status.as_str())
                .bind(parameters)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(device)
        }
    }

    fn get_by_id(
        &self,
        id: &DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, SmartHubError>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, SmartHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn list_ids(&self) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<(String,)> = sqlx::query_as(SELECT_IDS)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|(id,)| DeviceId::new(id)).collect())
        }
    }

    fn merge(
        &self,
        id: &DeviceId,
        changes: DeviceChanges,
    ) -> impl Future<Output = Result<Option<Device>, SmartHubError>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            let patch = serde_json::to_string(&changes.parameters).map_err(StorageError::from)?;
            let row: Option<Wrapper> = sqlx::query_as(MERGE)
                .bind(changes.room)
                .bind(changes.name)
                .bind(changes.status.map(DeviceStatus::as_str))
                .bind(patch)
                .bind(id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn delete(&self, id: &DeviceId) -> impl Future<Output = Result<bool, SmartHubError>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            let result = sqlx::query(DELETE_BY_ID)
                .bind(id)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() > 0)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteDeviceRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteDeviceRepository::new(db.pool().clone())
    }

    fn test_light() -> Device {
        Device::builder()
            .id("light-1")
            .kind(DeviceKind::Light)
            .room("Living Room")
            .name("Ceiling")
            .status(DeviceStatus::On)
            .parameter("brightness", 80)
            .parameter("color", "#FFAA00")
            .parameter("is_dimmable", true)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_round_trip_device_field_for_field() {
        let repo = setup().await;
        let device = test_light();

        repo.insert(device.clone()).await.unwrap();

        let fetched = repo.get_by_id(&device.id).await.unwrap().unwrap();
        assert_eq!(fetched, device);
    }

    #[tokio::test]
    async fn should_return_none_when_device_not_found() {
        let repo = setup().await;
        let result = repo.get_by_id(&DeviceId::from("missing")).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_reject_duplicate_id() {
        let repo = setup().await;
        repo.insert(test_light()).await.unwrap();

        let err = repo.insert(test_light()).await.unwrap_err();

        assert!(matches!(err, SmartHubError::Storage(_)));
    }

    #[tokio::test]
    async fn should_list_devices_and_ids_ordered_by_id() {
        let repo = setup().await;
        repo.insert(test_light()).await.unwrap();
        repo.insert(
            Device::builder()
                .id("curtain-1")
                .kind(DeviceKind::Curtain)
                .room("Bedroom")
                .name("Blackout")
                .parameter("position", 0)
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

        let all = repo.get_all().await.unwrap();
        let ids = repo.list_ids().await.unwrap();

        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id.as_str(), "curtain-1");
        assert_eq!(ids, vec![DeviceId::from("curtain-1"), DeviceId::from("light-1")]);
    }

    #[tokio::test]
    async fn should_merge_parameters_key_by_key() {
        let repo = setup().await;
        let device = test_light();
        repo.insert(device.clone()).await.unwrap();
        let changes =
            DeviceChanges::from_document(&json!({"status": "off", "parameters": {"brightness": 10}}))
                .unwrap();

        let merged = repo.merge(&device.id, changes).await.unwrap().unwrap();

        assert_eq!(merged.status, DeviceStatus::Off);
        assert_eq!(merged.room, "Living Room");
        assert_eq!(merged.parameter("brightness"), Some(&json!(10)));
        assert_eq!(merged.parameter("color"), Some(&json!("#FFAA00")));
        assert_eq!(repo.get_by_id(&device.id).await.unwrap(), Some(merged));
    }

    #[tokio::test]
    async fn should_match_in_memory_merge() {
        let repo = setup().await;
        let device = test_light();
        repo.insert(device.clone()).await.unwrap();
        let changes = DeviceChanges::from_document(
            &json!({"name": "Reading", "parameters": {"dynamic_color": false}}),
        )
        .unwrap();

        let merged = repo.merge(&device.id, changes.clone()).await.unwrap().unwrap();

        assert_eq!(merged, device.with_changes(&changes));
    }

    #[tokio::test]
    async fn should_return_none_when_merging_missing_device() {
        let repo = setup().await;
        let result = repo
            .merge(&DeviceId::from("missing"), DeviceChanges::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_delete_device_when_exists() {
        let repo = setup().await;
        let device = test_light();
        repo.insert(device.clone()).await.unwrap();

        assert!(repo.delete(&device.id).await.unwrap());
        assert!(!repo.delete(&device.id).await.unwrap());
        assert!(repo.get_by_id(&device.id).await.unwrap().is_none());
    }
}
