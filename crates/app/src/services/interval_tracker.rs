//! Interval tracker: keeps the ordered on-interval list of each device.

use std::sync::Arc;

use smarthub_domain::error::SmartHubError;
use smarthub_domain::id::DeviceId;
use smarthub_domain::interval::OnInterval;
use smarthub_domain::time::Timestamp;

use crate::ports::IntervalStore;

/// Opens and closes on-intervals. At most the last entry of a list is open.
pub struct IntervalTracker<S> {
    store: Arc<S>,
}

impl<S> Clone for IntervalTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: IntervalStore> IntervalTracker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append an open interval starting at `at`.
    ///
    /// Does nothing and returns `false` if the last interval is still open.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the interval store.
    #[tracing::instrument(skip(self))]
    pub async fn open(&self, device_id: &DeviceId, at: Timestamp) -> Result<bool, SmartHubError> {
        if self.open_interval(device_id).await?.is_some() {
            tracing::debug!(%device_id, "interval already open");
            return Ok(false);
        }
        self.store
            .push_interval(device_id, OnInterval::open(at).encode())
            .await?;
        Ok(true)
    }

    /// Close the last interval at `at` if it is open, returning it.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the interval store.
    #[tracing::instrument(skip(self))]
    pub async fn close(
        &self,
        device_id: &DeviceId,
        at: Timestamp,
    ) -> Result<Option<OnInterval>, SmartHubError> {
        let Some(open) = self.open_interval(device_id).await? else {
            tracing::debug!(%device_id, "no open interval to close");
            return Ok(None);
        };
        let closed = open.close(at);
        if !self
            .store
            .replace_last_interval(device_id, closed.encode())
            .await?
        {
            return Ok(None);
        }
        Ok(Some(closed))
    }

    /// The last interval of the device, if it is still open.
    ///
    /// A malformed last entry counts as closed.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the interval store.
    pub async fn open_interval(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<OnInterval>, SmartHubError> {
        let entries = self.store.intervals(device_id).await?;
        let Some(last) = entries.last() else {
            return Ok(None);
        };
        match OnInterval::decode(last) {
            Ok(interval) if interval.is_open() => Ok(Some(interval)),
            Ok(_) => Ok(None),
            Err(err) => {
                tracing::warn!(%device_id, error = %err, "skipping malformed interval entry");
                Ok(None)
            }
        }
    }

    /// Every readable interval of the device, oldest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the interval store.
    pub async fn intervals(&self, device_id: &DeviceId) -> Result<Vec<OnInterval>, SmartHubError> {
        let entries = self.store.intervals(device_id).await?;
        Ok(entries
            .iter()
            .filter_map(|entry| match OnInterval::decode(entry) {
                Ok(interval) => Some(interval),
                Err(err) => {
                    tracing::warn!(%device_id, error = %err, "skipping malformed interval entry");
                    None
                }
            })
            .collect())
    }
}
