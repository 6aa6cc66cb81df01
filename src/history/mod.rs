//! Rolling history buffer for time-series widgets.
//!
//! Keeps the most recent `N` samples of a live metric (network speed,
//! traffic) for chart display. `push` is pure: it returns a new buffer and
//! leaves the original untouched, so a buffer can live inside a
//! [`Snapshot`](crate::snapshot::Snapshot) and be replaced atomically.

use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default number of samples kept by time-series widgets.
pub const DEFAULT_CAPACITY: usize = 60;

/// One point of a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub timestamp: DateTime<Utc>,
    /// Metric name to value (e.g. `download_mbps`)
    pub fields: BTreeMap<String, f64>,
}

impl HistorySample {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Sample stamped with the current time.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn with_field(mut self, name: impl Into<String>, value: f64) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}

/// Fixed-capacity FIFO sequence, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingBuffer<S> {
    entries: VecDeque<S>,
    capacity: usize,
}

impl<S: Clone> RollingBuffer<S> {
    /// Creates an empty buffer. A capacity of zero is rejected.
    pub fn new(capacity: usize) -> Result<Self, SyncError> {
        if capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "rolling buffer capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Returns a new buffer holding `tail(self, N-1) + [sample]`.
    pub fn push(&self, sample: S) -> Self {
        let mut next = self.clone();
        next.push_in_place(sample);
        next
    }

    /// Owned variant of [`push`](Self::push) that reuses the allocation.
    pub fn pushed(mut self, sample: S) -> Self {
        self.push_in_place(sample);
        self
    }

    fn push_in_place(&mut self, sample: S) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(sample);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<&S> {
        self.entries.back()
    }

    /// Samples in insertion order (oldest first).
    pub fn iter(&self) -> impl Iterator<Item = &S> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<S> {
        self.entries.iter().cloned().collect()
    }
}

impl RollingBuffer<HistorySample> {
    /// Values of one metric across the window, oldest first. Samples
    /// missing the metric are skipped.
    pub fn series(&self, field: &str) -> Vec<(DateTime<Utc>, f64)> {
        self.entries
            .iter()
            .filter_map(|s| s.field(field).map(|v| (s.timestamp, v)))
            .collect()
    }

    /// Peak value of one metric across the window.
    pub fn peak(&self, field: &str) -> Option<f64> {
        self.entries
            .iter()
            .filter_map(|s| s.field(field))
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}
