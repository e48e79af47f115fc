//! Analytics service: per-device usage over a time window.

use std::collections::BTreeSet;
use std::sync::Arc;

use smarthub_domain::error::SmartHubError;
use smarthub_domain::metric::{MetricsSnapshot, UsageCounter};
use smarthub_domain::time::{Timestamp, now};
use smarthub_domain::usage::{UsageInputs, UsageReport, UsageWindow};

use crate::context::Context;
use crate::ports::UsageStore;
use crate::services::interval_tracker::IntervalTracker;

/// Computes usage reports from counter history and live interval state.
pub struct AnalyticsService<S> {
    store: Arc<S>,
    intervals: IntervalTracker<S>,
}

impl<S: UsageStore> AnalyticsService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            intervals: IntervalTracker::new(Arc::clone(&store)),
            store,
        }
    }

    /// Create the service from an initialised [`Context`].
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::NotInitialized`] if the context lacks a usage store.
    pub fn from_context<DR, BT>(context: &Context<DR, S, BT>) -> Result<Self, SmartHubError> {
        Ok(Self::new(Arc::clone(context.usage_store()?)))
    }

    /// Current value of every counter and gauge series.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the usage store.
    pub async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, SmartHubError> {
        self.store.snapshot().await
    }

    /// Usage between `from` and `to`, counting open intervals up to now.
    ///
    /// Open intervals are looked up for every device that has an interval
    /// list, a seen marker or counter samples, so a device whose list was
    /// written by another replica is still reported.
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::Validation`] if `from` is not before `to`, or a
    /// storage error.
    pub async fn compute_analytics(
        &self,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<UsageReport, SmartHubError> {
        self.compute_at(from, to, now()).await
    }

    /// Same as [`compute_analytics`](Self::compute_analytics) with an explicit
    /// current time.
    ///
    /// # Errors
    ///
    /// Returns [`SmartHubError::Validation`] if `from` is not before `to`, or a
    /// storage error.
    #[tracing::instrument(skip(self))]
    pub async fn compute_at(
        &self,
        from: Timestamp,
        to: Timestamp,
        now: Timestamp,
    ) -> Result<UsageReport, SmartHubError> {
        let window = UsageWindow::new(from, to)?;
        let usage_seconds = self
            .store
            .increase(UsageCounter::UsageSeconds, window)
            .await?;
        let on_events = self.store.increase(UsageCounter::OnEvents, window).await?;
        let known = self.store.seen_devices().await?;
        let tracked = self.store.devices_with_intervals().await?;

        let candidates: BTreeSet<_> = known
            .iter()
            .chain(&tracked)
            .chain(usage_seconds.iter().map(|(id, _)| id))
            .chain(on_events.iter().map(|(id, _)| id))
            .cloned()
            .collect();
        let mut open_intervals = Vec::new();
        for id in candidates {
            if let Some(interval) = self.intervals.open_interval(&id).await? {
                open_intervals.push((id, interval));
            }
        }

        tracing::debug!(
            devices = known.len(),
            open = open_intervals.len(),
            "computing usage report"
        );
        let inputs = UsageInputs {
            usage_seconds,
            on_events,
            open_intervals,
            known_devices: known.len(),
        };
        Ok(UsageReport::assemble(window, inputs, now))
    }
}
