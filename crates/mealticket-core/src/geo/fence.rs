//! Geofence verifier.
//!
//! Keeps a live "is the device inside the anchor radius" signal. Each
//! position update is measured against the anchor and published on a
//! `watch` channel; views subscribe to that channel instead of polling.
//!
//! ## State Transitions
//!
//! ```text
//! Loading -> (Verified | NotVerified)*    per update
//! Loading -> Denied                       permission refused, stream never starts
//! any     -> Unavailable                  provider failed mid-flight
//! any     -> Stopped                      stop_tracking with a live or sampled status
//! ```
//!
//! `Denied` and `Unavailable` are recoverable by calling `start_tracking`
//! again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::distance::Coordinate;
use super::source::{LocationSource, PermissionStatus};
use crate::error::LocationError;

/// A circular boundary around an anchor coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub anchor: Coordinate,
    pub radius_meters: f64,
}

impl Geofence {
    pub fn new(anchor: Coordinate, radius_meters: f64) -> Self {
        Self {
            anchor,
            radius_meters,
        }
    }

    /// Measure `position` against the anchor. Inclusive at the radius.
    pub fn evaluate(&self, position: Coordinate) -> LocationSample {
        let distance_meters = position.distance_to(&self.anchor);
        LocationSample {
            latitude: position.latitude,
            longitude: position.longitude,
            distance_meters,
            within_radius: distance_meters <= self.radius_meters,
        }
    }
}

/// The verifier's current observation. Never persisted by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    pub distance_meters: f64,
    pub within_radius: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FenceState {
    /// Waiting for the first position.
    Loading,
    Verified,
    NotVerified,
    /// Permission refused. Terminal until tracking is restarted.
    Denied,
    /// Provider failure.
    Unavailable,
    /// Tracking was stopped. The last sample is no longer trusted.
    Stopped,
}

/// Status published to subscribers after every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierStatus {
    pub state: FenceState,
    pub message: String,
    pub sample: Option<LocationSample>,
    pub at: DateTime<Utc>,
}

impl VerifierStatus {
    pub fn loading() -> Self {
        Self::new(FenceState::Loading, "Checking your location...".into(), None)
    }

    pub fn denied() -> Self {
        Self::new(FenceState::Denied, "Location permission denied.".into(), None)
    }

    pub fn unavailable(reason: &str) -> Self {
        Self::new(
            FenceState::Unavailable,
            format!("Could not get your location ({reason}). Check your GPS."),
            None,
        )
    }

    pub fn from_sample(sample: LocationSample, label: &str) -> Self {
        if sample.within_radius {
            Self::new(
                FenceState::Verified,
                format!("You are at the {label}!"),
                Some(sample),
            )
        } else {
            Self::new(
                FenceState::NotVerified,
                format!(
                    "You are not at the {label} ({:.0} m away). Move closer to redeem.",
                    sample.distance_meters
                ),
                Some(sample),
            )
        }
    }

    pub fn stopped() -> Self {
        Self::new(FenceState::Stopped, "Location tracking stopped.".into(), None)
    }

    fn new(state: FenceState, message: String, sample: Option<LocationSample>) -> Self {
        Self {
            state,
            message,
            sample,
            at: Utc::now(),
        }
    }

    pub fn is_verified(&self) -> bool {
        self.state == FenceState::Verified
    }

    pub fn is_loading(&self) -> bool {
        self.state == FenceState::Loading
    }
}

/// Maintains the live geofence signal for one anchor.
///
/// Owns at most one tracking task. Dropping the verifier stops tracking.
pub struct GeofenceVerifier {
    fence: Geofence,
    label: String,
    status: Arc<watch::Sender<VerifierStatus>>,
    tracking: Option<JoinHandle<()>>,
}

impl GeofenceVerifier {
    pub fn new(fence: Geofence, label: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(VerifierStatus::loading());
        Self {
            fence,
            label: label.into(),
            status: Arc::new(tx),
            tracking: None,
        }
    }

    pub fn fence(&self) -> &Geofence {
        &self.fence
    }

    /// Latest published status.
    pub fn status(&self) -> VerifierStatus {
        self.status.borrow().clone()
    }

    pub fn is_verified(&self) -> bool {
        self.status.borrow().is_verified()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<VerifierStatus> {
        self.status.subscribe()
    }

    /// Evaluate one position and publish the result.
    pub fn observe(&self, position: Coordinate) -> VerifierStatus {
        let status = evaluate(&self.fence, &self.label, position);
        self.status.send_replace(status.clone());
        status
    }

    /// One-shot check through `source.current_position()`.
    pub fn check_once(&self, source: &dyn LocationSource) -> Result<VerifierStatus, LocationError> {
        if source.request_permission() == PermissionStatus::Denied {
            self.status.send_replace(VerifierStatus::denied());
            return Err(LocationError::PermissionDenied);
        }
        match source.current_position() {
            Ok(position) => Ok(self.observe(position)),
            Err(e) => {
                self.publish_failure(&e);
                Err(e)
            }
        }
    }

    /// Begin consuming `source`'s position stream.
    ///
    /// Must be called from within a tokio runtime. Any previous tracking
    /// task is stopped first.
    pub fn start_tracking(&mut self, source: &dyn LocationSource) -> Result<(), LocationError> {
        self.stop_tracking();
        self.status.send_replace(VerifierStatus::loading());

        if source.request_permission() == PermissionStatus::Denied {
            warn!("location permission denied");
            self.status.send_replace(VerifierStatus::denied());
            return Err(LocationError::PermissionDenied);
        }

        let mut stream = match source.watch_position() {
            Ok(stream) => stream,
            Err(e) => {
                self.publish_failure(&e);
                return Err(e);
            }
        };

        let fence = self.fence;
        let label = self.label.clone();
        let status = Arc::clone(&self.status);
        info!(radius_m = fence.radius_meters, "geofence tracking started");
        self.tracking = Some(tokio::spawn(async move {
            while let Some(update) = stream.recv().await {
                match update {
                    Ok(position) => {
                        status.send_replace(evaluate(&fence, &label, position));
                    }
                    Err(e) => {
                        warn!(error = %e, "location stream failed");
                        status.send_replace(VerifierStatus::unavailable(&e.to_string()));
                        break;
                    }
                }
            }
            debug!("location stream closed");
        }));
        Ok(())
    }

    /// Release the stream subscription. Idempotent.
    ///
    /// A published sample stops counting as verified: without a live
    /// subscription nothing would ever update it.
    pub fn stop_tracking(&mut self) {
        let was_tracking = match self.tracking.take() {
            Some(handle) => {
                handle.abort();
                debug!("geofence tracking stopped");
                true
            }
            None => false,
        };
        self.status.send_if_modified(|status| {
            let stale = status.sample.is_some()
                || (was_tracking && status.state == FenceState::Loading);
            if stale {
                *status = VerifierStatus::stopped();
            }
            stale
        });
    }

    fn publish_failure(&self, error: &LocationError) {
        let status = match error {
            LocationError::PermissionDenied => VerifierStatus::denied(),
            LocationError::Unavailable(reason) => VerifierStatus::unavailable(reason),
        };
        warn!(error = %error, "location fix failed");
        self.status.send_replace(status);
    }
}

impl Drop for GeofenceVerifier {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}

fn evaluate(fence: &Geofence, label: &str, position: Coordinate) -> VerifierStatus {
    let sample = fence.evaluate(position);
    debug!(
        distance_m = sample.distance_meters,
        within = sample.within_radius,
        "geofence sample"
    );
    VerifierStatus::from_sample(sample, label)
}
