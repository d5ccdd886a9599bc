//! Bounded log of recent location checks.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kv::{KvStore, LOCATION_HISTORY_KEY};
use crate::error::StorageError;
use crate::geo::LocationSample;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub within_radius: bool,
}

impl LocationRecord {
    pub fn from_sample(sample: &LocationSample, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            latitude: sample.latitude,
            longitude: sample.longitude,
            distance_meters: sample.distance_meters,
            within_radius: sample.within_radius,
        }
    }
}

/// Keeps the newest `capacity` checks under [`LOCATION_HISTORY_KEY`].
pub struct LocationHistory {
    store: Arc<dyn KvStore>,
    capacity: usize,
}

impl LocationHistory {
    pub fn new(store: Arc<dyn KvStore>, capacity: usize) -> Self {
        Self { store, capacity }
    }

    /// Oldest first.
    pub fn entries(&self) -> Result<Vec<LocationRecord>, StorageError> {
        match self.store.get(LOCATION_HISTORY_KEY)? {
            Some(json) => serde_json::from_str(&json).map_err(|source| StorageError::Corrupt {
                key: LOCATION_HISTORY_KEY.into(),
                source,
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Append and trim to capacity.
    pub fn record(&self, entry: LocationRecord) -> Result<(), StorageError> {
        let mut entries = self.entries()?;
        entries.push(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }
        let json = serde_json::to_string(&entries).map_err(|e| StorageError::Write {
            key: LOCATION_HISTORY_KEY.into(),
            message: e.to_string(),
        })?;
        self.store.set(LOCATION_HISTORY_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::MemoryStore;

    fn entry(i: u32) -> LocationRecord {
        LocationRecord {
            timestamp: Utc::now(),
            latitude: i as f64,
            longitude: 0.0,
            distance_meters: 1.0,
            within_radius: true,
        }
    }

    #[test]
    fn keeps_only_newest_entries() {
        let history = LocationHistory::new(Arc::new(MemoryStore::new()), 3);
        for i in 0..5 {
            history.record(entry(i)).unwrap();
        }
        let lats: Vec<f64> = history.entries().unwrap().iter().map(|e| e.latitude).collect();
        assert_eq!(lats, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn empty_history_is_empty() {
        let history = LocationHistory::new(Arc::new(MemoryStore::new()), 50);
        assert!(history.entries().unwrap().is_empty());
    }

    #[test]
    fn persisted_with_camel_case_keys() {
        let store = Arc::new(MemoryStore::new());
        let history = LocationHistory::new(store.clone(), 50);
        history.record(entry(1)).unwrap();
        let raw = store.get(LOCATION_HISTORY_KEY).unwrap().unwrap();
        assert!(raw.contains("distanceMeters"));
        assert!(raw.contains("withinRadius"));
    }
}
