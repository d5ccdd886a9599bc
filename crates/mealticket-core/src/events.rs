use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Every committed registry change produces an Event.
/// Views subscribe to them to refresh their listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    StudentRegistered {
        student_id: String,
        name: String,
        at: DateTime<Utc>,
    },
    TicketRedeemed {
        student_id: String,
        date: String,
        time: String,
        at: DateTime<Utc>,
    },
    StudentRemoved {
        student_id: String,
        at: DateTime<Utc>,
    },
    /// Redemption flags were cleared, either by an admin reset or by the
    /// daily sweep.
    RegistryReset {
        cleared: usize,
        at: DateTime<Utc>,
    },
}
