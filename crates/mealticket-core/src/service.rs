//! Ticket service.
//!
//! One instance per process, built from configuration plus an injected
//! store and clock. It owns the registry, the geofence verifier and the
//! daily reset scheduler, and answers "may this student redeem now" from
//! the verifier's latest status and the clock.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::clock::{Clock, Ticker, TickerHandle};
use crate::error::{CoreError, LocationError, RedeemError, Result, StorageError};
use crate::events::Event;
use crate::geo::{GeofenceVerifier, LocationSource, VerifierStatus};
use crate::redemption::{RedeemOutcome, RedemptionEngine, TicketStatus};
use crate::registry::{StudentRecord, StudentRegistry, TicketFilter};
use crate::reset::{AppState, DailyResetScheduler, ResetOutcome};
use crate::storage::{Config, KvStore, LocationHistory, LocationRecord};
use crate::window::WindowStatus;

pub struct TicketService {
    registry: StudentRegistry,
    verifier: GeofenceVerifier,
    scheduler: DailyResetScheduler,
    engine: RedemptionEngine,
    history: LocationHistory,
    clock: Arc<dyn Clock>,
    ticker: Option<TickerHandle>,
    startup_reset: ResetOutcome,
}

impl TicketService {
    /// Build the service and run the daily reset check once.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an unreadable registry, or a reset
    /// check that could not be persisted.
    pub fn open(config: &Config, store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let fence = config.geofence()?;
        let engine = RedemptionEngine::new(config.window()?, config.formats()?);
        let registry = StudentRegistry::load(Arc::clone(&store))?;
        let scheduler = DailyResetScheduler::new(Arc::clone(&store), engine.formats().clone());
        let history = LocationHistory::new(store, config.history.capacity);

        let startup_reset = scheduler.run(&registry, &clock.now())?;
        info!(
            students = registry.len(),
            window = %engine.window(),
            "ticket service ready"
        );

        Ok(Self {
            registry,
            verifier: GeofenceVerifier::new(fence, config.geofence.label.clone()),
            scheduler,
            engine,
            history,
            clock,
            ticker: None,
            startup_reset,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn registry(&self) -> &StudentRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &RedemptionEngine {
        &self.engine
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// What the reset check at `open` did.
    pub fn startup_reset(&self) -> &ResetOutcome {
        &self.startup_reset
    }

    pub fn find_by_code(&self, code: &str) -> Option<StudentRecord> {
        self.registry.find_by_code(code)
    }

    pub fn find_by_id(&self, id: &str) -> Option<StudentRecord> {
        self.registry.find_by_id(id)
    }

    pub fn list(&self, filter: TicketFilter) -> Vec<StudentRecord> {
        self.registry.list(filter)
    }

    pub fn ticket_status(&self, student_id: &str) -> Result<TicketStatus, RedeemError> {
        let record = self
            .registry
            .find_by_id(student_id)
            .ok_or_else(|| RedeemError::UnknownStudent(student_id.to_string()))?;
        Ok(self.engine.ticket_status(&record, &self.clock.now()))
    }

    pub fn window_status(&self) -> WindowStatus {
        self.engine.window().status(&self.clock.now())
    }

    pub fn location_status(&self) -> VerifierStatus {
        self.verifier.status()
    }

    pub fn location_history(&self) -> Result<Vec<LocationRecord>, StorageError> {
        self.history.entries()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<VerifierStatus> {
        self.verifier.subscribe()
    }

    pub fn subscribe_registry(&self) -> broadcast::Receiver<Event> {
        self.registry.subscribe()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Attempt a redemption now, using the verifier's latest status.
    pub fn attempt_redeem(&self, student_id: &str) -> Result<RedeemOutcome, RedeemError> {
        self.attempt_redeem_at(student_id, self.clock.now(), self.verifier.is_verified())
    }

    pub fn attempt_redeem_at(
        &self,
        student_id: &str,
        now: NaiveDateTime,
        location_verified: bool,
    ) -> Result<RedeemOutcome, RedeemError> {
        self.engine
            .attempt_redeem(&self.registry, student_id, now, location_verified)
    }

    /// Register a student. The name is trimmed; empty names and codes are
    /// rejected.
    pub fn register(&self, name: &str, code: &str) -> Result<StudentRecord> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::Validation {
                field: "name".into(),
                message: "must not be empty".into(),
            });
        }
        let code = code.trim();
        if code.is_empty() {
            return Err(CoreError::Validation {
                field: "code".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(self.registry.register(name, code)?)
    }

    pub fn remove(&self, student_id: &str) -> Result<Option<StudentRecord>, StorageError> {
        self.registry.remove(student_id)
    }

    /// Admin reset of every record.
    pub fn reset_all(&self) -> Result<usize, StorageError> {
        self.registry.reset_all()
    }

    /// Run the daily reset check against the current clock.
    pub fn run_daily_reset(&self) -> Result<ResetOutcome, StorageError> {
        self.scheduler.run(&self.registry, &self.clock.now())
    }

    /// Lifecycle hook; a resume into the foreground runs the reset check.
    pub fn on_app_state(
        &self,
        previous: AppState,
        next: AppState,
    ) -> Result<Option<ResetOutcome>, StorageError> {
        self.scheduler
            .on_app_state(&self.registry, previous, next, &self.clock.now())
    }

    /// One-shot location check. Samples are appended to the location
    /// history; a failed history write is logged and otherwise ignored.
    pub fn check_location_once(
        &self,
        source: &dyn LocationSource,
    ) -> Result<VerifierStatus, LocationError> {
        let status = self.verifier.check_once(source)?;
        if let Some(sample) = &status.sample {
            let record = LocationRecord::from_sample(sample, status.at);
            if let Err(e) = self.history.record(record) {
                warn!(error = %e, "location history not saved");
            }
        }
        Ok(status)
    }

    /// Must be called from within a tokio runtime.
    pub fn start_tracking(&mut self, source: &dyn LocationSource) -> Result<(), LocationError> {
        self.verifier.start_tracking(source)
    }

    pub fn stop_tracking(&mut self) {
        self.verifier.stop_tracking();
    }

    /// Publish the clock every [`Ticker::PERIOD`]. Replaces a running ticker.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_ticker(&mut self) -> watch::Receiver<NaiveDateTime> {
        let (handle, rx) = Ticker::start(Arc::clone(&self.clock), Ticker::PERIOD);
        self.ticker = Some(handle);
        rx
    }

    /// Stop tracking and the ticker.
    pub fn shutdown(&mut self) {
        self.verifier.stop_tracking();
        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
        info!("ticket service stopped");
    }
}
