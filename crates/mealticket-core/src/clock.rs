//! Wall-clock source and the recurring tick.
//!
//! All eligibility decisions read local wall time through [`Clock`] so tests
//! and the CLI can pin "now". The [`Ticker`] republishes the clock once per
//! period on a `watch` channel and stops when its handle is cancelled or
//! dropped.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDate, NaiveDateTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::ConfigError;

/// A source of local wall time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The device clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Validated chrono format strings for the persisted `date` and `time`
/// stamps. Stamps are compared as strings; only the reset marker is parsed
/// back, to detect a clock that went backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormats {
    date: String,
    time: String,
}

impl DateFormats {
    pub fn new(date: &str, time: &str) -> Result<Self, ConfigError> {
        check_format("format.date", date)?;
        check_format("format.time", time)?;
        Ok(Self {
            date: date.to_string(),
            time: time.to_string(),
        })
    }

    /// The calendar-day key for `now`, e.g. `25/09/2025`.
    pub fn day(&self, now: &NaiveDateTime) -> String {
        render(now, &self.date)
    }

    /// The time stamp for `now`, e.g. `15:02:11`.
    pub fn time(&self, now: &NaiveDateTime) -> String {
        render(now, &self.time)
    }

    /// Parse a day key back into a date. `None` if it was written with a
    /// different format.
    pub fn parse_day(&self, day: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(day, &self.date).ok()
    }
}

impl Default for DateFormats {
    fn default() -> Self {
        Self {
            date: "%d/%m/%Y".into(),
            time: "%H:%M:%S".into(),
        }
    }
}

fn check_format(key: &str, fmt: &str) -> Result<(), ConfigError> {
    if fmt.is_empty() || StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidValue {
            key: key.into(),
            message: format!("invalid format string '{fmt}'"),
        });
    }
    Ok(())
}

fn render(now: &NaiveDateTime, fmt: &str) -> String {
    let mut out = String::new();
    // Formats are validated on construction; a failure here leaves `out`
    // with whatever was written before the bad item.
    let _ = write!(out, "{}", now.format(fmt));
    out
}

/// Cancels the ticker on `cancel()` or drop.
pub struct TickerHandle {
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Periodic clock publisher.
pub struct Ticker;

impl Ticker {
    /// Default tick period.
    pub const PERIOD: Duration = Duration::from_secs(1);

    /// Spawn a task that publishes `clock.now()` every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> (TickerHandle, watch::Receiver<NaiveDateTime>) {
        let (tx, rx) = watch::channel(clock.now());
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if tx.send(clock.now()).is_err() {
                    // Every receiver is gone.
                    break;
                }
            }
        });
        (TickerHandle { task: Some(task) }, rx)
    }
}
