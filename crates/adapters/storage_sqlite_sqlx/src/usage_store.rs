//! `SQLite` implementation of the usage ports.
//!
//! Interval lists are rows ordered by `position`, counters are append-only
//! delta samples so that the increase over any window can be summed, and
//! gauges keep only their latest value per label set.

use std::collections::BTreeMap;
use std::future::Future;

use sqlx::SqlitePool;

use smarthub_app::ports::{
    CounterHistory, IntervalStore, MetricsSink, MetricsSource, SeenDevices,
};
use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;
use smarthub_domain::metric::{
    DeviceLabels, GaugeSample, MetricsSnapshot, SeriesValue, UsageCounter,
};
use smarthub_domain::time::Timestamp;
use smarthub_domain::usage::UsageWindow;

use crate::error::StorageError;

const PUSH_INTERVAL: &str = "INSERT INTO device_on_intervals (device_id, position, entry) \
    VALUES (?1, COALESCE((SELECT MAX(position) + 1 FROM device_on_intervals WHERE device_id = ?1), 0), ?2)";
const SELECT_INTERVALS: &str =
    "SELECT entry FROM device_on_intervals WHERE device_id = ? ORDER BY position";
const SELECT_TRACKED_DEVICES: &str =
    "SELECT DISTINCT device_id FROM device_on_intervals ORDER BY device_id";
const REPLACE_LAST_INTERVAL: &str = "UPDATE device_on_intervals SET entry = ?2 \
    WHERE device_id = ?1 \
    AND position = (SELECT MAX(position) FROM device_on_intervals WHERE device_id = ?1)";

const IS_SEEN: &str = "SELECT EXISTS(SELECT 1 FROM seen_devices WHERE device_id = ?)";
const MARK_SEEN: &str = "INSERT OR IGNORE INTO seen_devices (device_id) VALUES (?)";
const FORGET: &str = "DELETE FROM seen_devices WHERE device_id = ?";
const SELECT_SEEN: &str = "SELECT device_id FROM seen_devices ORDER BY device_id";

const INSERT_COUNTER_SAMPLE: &str = "INSERT INTO counter_samples \
    (counter, device_id, device_type, delta, recorded_at) VALUES (?, ?, ?, ?, ?)";
const SELECT_INCREASE: &str = "SELECT device_id, SUM(delta) FROM counter_samples \
    WHERE counter = ? AND recorded_at >= ? AND recorded_at < ? \
    GROUP BY device_id ORDER BY device_id";
const UPSERT_GAUGE: &str = "INSERT INTO gauges (name, labels, value, updated_at) VALUES (?, ?, ?, ?) \
    ON CONFLICT (name, labels) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

const SELECT_GAUGES: &str = "SELECT name, labels, value FROM gauges ORDER BY name, labels";
const SELECT_COUNTER_TOTALS: &str = "SELECT counter, device_id, device_type, SUM(delta) \
    FROM counter_samples GROUP BY counter, device_id, device_type \
    ORDER BY counter, device_id";

/// `SQLite`-backed usage store: intervals, seen markers, counters and gauges.
pub struct SqliteUsageStore {
    pool: SqlitePool,
}

impl SqliteUsageStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Canonical JSON form of a label set, keys sorted.
fn encode_labels(labels: &[(&'static str, String)]) -> Result<String, StorageError> {
    let labels: BTreeMap<&str, &str> = labels.iter().map(|(k, v)| (*k, v.as_str())).collect();
    Ok(serde_json::to_string(&labels)?)
}

impl IntervalStore for SqliteUsageStore {
    fn push_interval(
        &self,
        device_id: &DeviceId,
        entry: String,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.to_string();
        async move {
            sqlx::query(PUSH_INTERVAL)
                .bind(device_id)
                .bind(entry)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn intervals(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<Vec<String>, SmartHubError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.to_string();
        async move {
            let rows: Vec<(String,)> = sqlx::query_as(SELECT_INTERVALS)
                .bind(device_id)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().map(|(entry,)| entry).collect())
        }
    }

    fn devices_with_intervals(
        &self,
    ) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<(String,)> = sqlx::query_as(SELECT_TRACKED_DEVICES)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().map(|(id,)| DeviceId::new(id)).collect())
        }
    }

    fn replace_last_interval(
        &self,
        device_id: &DeviceId,
        entry: String,
    ) -> impl Future<Output = Result<bool, SmartHubError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.to_string();
        async move {
            let result = sqlx::query(REPLACE_LAST_INTERVAL)
                .bind(device_id)
                .bind(entry)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(result.rows_affected() > 0)
        }
    }
}

impl SeenDevices for SqliteUsageStore {
    fn is_seen(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<bool, SmartHubError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.to_string();
        async move {
            let (seen,): (bool,) = sqlx::query_as(IS_SEEN)
                .bind(device_id)
                .fetch_one(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(seen)
        }
    }

    fn mark_seen(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.to_string();
        async move {
            sqlx::query(MARK_SEEN)
                .bind(device_id)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn forget(
        &self,
        device_id: &DeviceId,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        let pool = self.pool.clone();
        let device_id = device_id.to_string();
        async move {
            sqlx::query(FORGET)
                .bind(device_id)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn seen_devices(&self) -> impl Future<Output = Result<Vec<DeviceId>, SmartHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<(String,)> = sqlx::query_as(SELECT_SEEN)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows.into_iter().map(|(id,)| DeviceId::new(id)).collect())
        }
    }
}

impl MetricsSink for SqliteUsageStore {
    fn increment_counter(
        &self,
        counter: UsageCounter,
        labels: &DeviceLabels,
        amount: f64,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        let pool = self.pool.clone();
        let device_id = labels.device_id.clone();
        let device_type = labels.device_type.as_str();
        async move {
            sqlx::query(INSERT_COUNTER_SAMPLE)
                .bind(counter.metric_name())
                .bind(device_id)
                .bind(device_type)
                .bind(amount)
                .bind(at.timestamp_millis())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn set_gauges(
        &self,
        samples: Vec<GaugeSample>,
        at: Timestamp,
    ) -> impl Future<Output = Result<(), SmartHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            for sample in samples {
                sqlx::query(UPSERT_GAUGE)
                    .bind(sample.name)
                    .bind(encode_labels(&sample.labels)?)
                    .bind(sample.value)
                    .bind(at.timestamp_millis())
                    .execute(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
            }
            tx.commit().await.map_err(StorageError::from)?;
            Ok(())
        }
    }
}

impl CounterHistory for SqliteUsageStore {
    fn increase(
        &self,
        counter: UsageCounter,
        window: UsageWindow,
    ) -> impl Future<Output = Result<Vec<(DeviceId, f64)>, SmartHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<(String, f64)> = sqlx::query_as(SELECT_INCREASE)
                .bind(counter.metric_name())
                .bind(window.from.timestamp_millis())
                .bind(window.to.timestamp_millis())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(rows
                .into_iter()
                .map(|(id, total)| (DeviceId::new(id), total))
                .collect())
        }
    }
}

impl MetricsSource for SqliteUsageStore {
    fn snapshot(&self) -> impl Future<Output = Result<MetricsSnapshot, SmartHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<(String, String, f64)> = sqlx::query_as(SELECT_GAUGES)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            let gauges = rows
                .into_iter()
                .map(|(name, labels, value)| {
                    let labels = serde_json::from_str(&labels).map_err(StorageError::from)?;
                    Ok(SeriesValue {
                        name,
                        labels,
                        value,
                    })
                })
                .collect::<Result<Vec<_>, SmartHubError>>()?;

            let rows: Vec<(String, String, String, f64)> = sqlx::query_as(SELECT_COUNTER_TOTALS)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;
            let counters = rows
                .into_iter()
                .map(|(name, device_id, device_type, value)| SeriesValue {
                    name,
                    labels: BTreeMap::from([
                        ("device_id".to_string(), device_id),
                        ("device_type".to_string(), device_type),
                    ]),
                    value,
                })
                .collect();

            Ok(MetricsSnapshot { gauges, counters })
        }
    }
}
