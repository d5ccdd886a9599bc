//! # Mealticket Core Library
//!
//! This library decides whether a registered student may redeem today's
//! meal ticket right now. A redemption needs two independent conditions:
//! the device is within a configured radius of the canteen, and the local
//! time is inside the daily window. Each student redeems at most once per
//! calendar day, and a daily reset reopens eligibility.
//!
//! ## Architecture
//!
//! - **Geofence**: haversine distance and a verifier that turns a location
//!   stream into a live "verified" signal published over `watch`
//! - **Window**: pure minute-of-day checks plus a countdown status
//! - **Registry**: the only owner of durable student state, persisted as
//!   one JSON collection through a key-value store
//! - **Redemption**: the per-student, per-day state machine
//! - **Reset**: the daily sweep, run at start and on resume
//! - **Storage**: SQLite key-value store and TOML configuration
//!
//! ## Key Components
//!
//! - [`TicketService`]: facade owning registry, verifier and scheduler
//! - [`StudentRegistry`]: student records and their redemption stamps
//! - [`RedemptionEngine`]: eligibility checks and commit
//! - [`GeofenceVerifier`]: live location signal
//! - [`Config`]: application configuration management

pub mod clock;
pub mod code;
pub mod error;
pub mod events;
pub mod geo;
pub mod redemption;
pub mod registry;
pub mod reset;
pub mod service;
pub mod storage;
pub mod window;

pub use clock::{Clock, DateFormats, FixedClock, SystemClock, Ticker, TickerHandle};
pub use code::{CodeSupplier, RandomCodeSupplier};
pub use error::{ConfigError, CoreError, LocationError, RedeemError, StorageError};
pub use events::Event;
pub use geo::{
    haversine_distance, Coordinate, FenceState, Geofence, GeofenceVerifier, LocationSample,
    LocationSource, StaticLocationSource, VerifierStatus,
};
pub use redemption::{RedeemOutcome, RedemptionEngine, TicketStatus};
pub use registry::{MarkRedeemed, StudentRecord, StudentRegistry, TicketFilter};
pub use reset::{AppState, DailyResetScheduler, ResetOutcome};
pub use service::TicketService;
pub use storage::{Config, KvStore, LocationHistory, LocationRecord, MemoryStore, SqliteStore};
pub use window::{
    is_within_window, schedule_status, NamedWindow, ScheduleStatus, TimeWindow, WindowStatus,
};
