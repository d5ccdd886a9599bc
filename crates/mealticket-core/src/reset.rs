//! Daily reset scheduler.
//!
//! Reopens eligibility at the start of each calendar day. The check runs
//! at process start and whenever the app comes back to the foreground;
//! there is no background timer.
//!
//! The sweep and the marker write form one logical unit. The marker is
//! written only after the sweep succeeded, so a failure at either step
//! leaves the marker stale and the next check repeats the (idempotent)
//! sweep.
//!
//! A clock that reads a day before the marker never sweeps, so pinning an
//! earlier date cannot clear tickets stamped later.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::DateFormats;
use crate::error::StorageError;
use crate::registry::StudentRegistry;
use crate::storage::kv::{KvStore, LAST_RESET_KEY};

/// Foreground state of the hosting process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

impl AppState {
    /// Does moving from `self` to `next` count as a resume?
    pub fn resumes_to(self, next: AppState) -> bool {
        self != AppState::Active && next == AppState::Active
    }
}

/// What a reset check did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ResetOutcome {
    /// Marker already equals today.
    UpToDate { today: String },
    Swept {
        previous: Option<String>,
        today: String,
        cleared: usize,
    },
    /// The clock reads a day before the marker. Nothing was swept.
    ClockBehind { marker: String, today: String },
}

pub struct DailyResetScheduler {
    store: Arc<dyn KvStore>,
    formats: DateFormats,
}

impl DailyResetScheduler {
    pub fn new(store: Arc<dyn KvStore>, formats: DateFormats) -> Self {
        Self { store, formats }
    }

    /// The persisted marker, if any.
    pub fn last_reset(&self) -> Result<Option<String>, StorageError> {
        self.store.get(LAST_RESET_KEY)
    }

    /// Compare the marker to today's date and sweep the registry if they
    /// differ.
    pub fn run(
        &self,
        registry: &StudentRegistry,
        now: &NaiveDateTime,
    ) -> Result<ResetOutcome, StorageError> {
        let today = self.formats.day(now);
        let previous = self.last_reset()?;
        if previous.as_deref() == Some(today.as_str()) {
            return Ok(ResetOutcome::UpToDate { today });
        }
        // Sweeping for an earlier day would clear tickets stamped later.
        if let Some(marker) = previous.as_deref() {
            if self
                .formats
                .parse_day(marker)
                .is_some_and(|day| day > now.date())
            {
                warn!(marker, today = %today, "clock is behind the reset marker, skipping sweep");
                return Ok(ResetOutcome::ClockBehind {
                    marker: marker.to_string(),
                    today,
                });
            }
        }

        let cleared = registry.reset_stale(&today)?;
        if let Err(e) = self.store.set(LAST_RESET_KEY, &today) {
            warn!(error = %e, "reset marker not saved, sweep will repeat");
            return Err(e);
        }
        info!(previous = ?previous, today = %today, cleared, "daily reset done");
        Ok(ResetOutcome::Swept {
            previous,
            today,
            cleared,
        })
    }

    /// Lifecycle hook. Runs the check only on a resume into the foreground.
    pub fn on_app_state(
        &self,
        registry: &StudentRegistry,
        previous: AppState,
        next: AppState,
        now: &NaiveDateTime,
    ) -> Result<Option<ResetOutcome>, StorageError> {
        if previous.resumes_to(next) {
            self.run(registry, now).map(Some)
        } else {
            Ok(None)
        }
    }
}
