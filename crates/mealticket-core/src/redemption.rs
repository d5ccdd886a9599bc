//! Redemption state machine.
//!
//! Per student and calendar day:
//!
//! ```text
//! NotReceived -> RedeemedToday      (terminal until the daily reset)
//! ```
//!
//! An attempt is checked in a fixed order: known student, not already
//! redeemed today, location verified, inside the window. Only when all
//! hold is the redemption committed through the registry. Location and
//! time are evaluated at the moment of the attempt, so losing the
//! geofence or missing the window mid-session blocks the attempt.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::DateFormats;
use crate::error::RedeemError;
use crate::registry::{MarkRedeemed, StudentRecord, StudentRegistry};
use crate::window::TimeWindow;

/// Result of an eligible or denied attempt. Denials are expected outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RedeemOutcome {
    Redeemed { record: StudentRecord },
    AlreadyRedeemedToday { date: String, time: Option<String> },
    LocationNotVerified,
    OutsideTimeWindow { window: String },
}

impl RedeemOutcome {
    pub fn is_redeemed(&self) -> bool {
        matches!(self, RedeemOutcome::Redeemed { .. })
    }
}

/// A student's ticket state for today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    NotReceived,
    RedeemedToday,
}

/// Authorizes redemption attempts against a registry.
#[derive(Debug, Clone)]
pub struct RedemptionEngine {
    window: TimeWindow,
    formats: DateFormats,
}

impl RedemptionEngine {
    pub fn new(window: TimeWindow, formats: DateFormats) -> Self {
        Self { window, formats }
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }

    pub fn formats(&self) -> &DateFormats {
        &self.formats
    }

    /// Today's ticket state for `record`.
    pub fn ticket_status(&self, record: &StudentRecord, now: &NaiveDateTime) -> TicketStatus {
        if record.redeemed_on(&self.formats.day(now)) {
            TicketStatus::RedeemedToday
        } else {
            TicketStatus::NotReceived
        }
    }

    /// Try to redeem `student_id`'s ticket at `now`.
    ///
    /// Writes to the registry only when every check passes. A failed write
    /// leaves the student unredeemed and may be retried.
    pub fn attempt_redeem(
        &self,
        registry: &StudentRegistry,
        student_id: &str,
        now: NaiveDateTime,
        location_verified: bool,
    ) -> Result<RedeemOutcome, RedeemError> {
        let record = registry
            .find_by_id(student_id)
            .ok_or_else(|| RedeemError::UnknownStudent(student_id.to_string()))?;

        let today = self.formats.day(&now);
        if record.redeemed_on(&today) {
            debug!(student_id, "denied: already redeemed today");
            return Ok(RedeemOutcome::AlreadyRedeemedToday {
                date: today,
                time: record.time,
            });
        }

        if !location_verified {
            debug!(student_id, "denied: location not verified");
            return Ok(RedeemOutcome::LocationNotVerified);
        }

        if !self.window.is_open(&now) {
            debug!(student_id, window = %self.window, "denied: outside window");
            return Ok(RedeemOutcome::OutsideTimeWindow {
                window: self.window.to_string(),
            });
        }

        // The registry repeats the known/already-redeemed checks under its
        // lock; a concurrent attempt may have won since the lookup above.
        let time = self.formats.time(&now);
        match registry.mark_redeemed(student_id, &today, &time) {
            Ok(MarkRedeemed::Redeemed(record)) => Ok(RedeemOutcome::Redeemed { record }),
            Ok(MarkRedeemed::AlreadyRedeemed(record)) => {
                debug!(student_id, "denied: redeemed concurrently");
                Ok(RedeemOutcome::AlreadyRedeemedToday {
                    date: today,
                    time: record.time,
                })
            }
            Ok(MarkRedeemed::UnknownStudent) => {
                Err(RedeemError::UnknownStudent(student_id.to_string()))
            }
            Err(e) => Err(RedeemError::PersistenceFailed(e)),
        }
    }
}
