//! Location provider seam.
//!
//! The platform location service sits behind [`LocationSource`]. A stream of
//! positions is an mpsc receiver; dropping it releases the subscription.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::distance::Coordinate;
use crate::error::LocationError;

/// Stream of position updates. Closing the channel ends tracking.
pub type LocationStream = mpsc::Receiver<Result<Coordinate, LocationError>>;

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// A provider of device positions.
pub trait LocationSource: Send + Sync {
    /// Ask the user for foreground location access.
    fn request_permission(&self) -> PermissionStatus;

    /// One-shot position fix.
    fn current_position(&self) -> Result<Coordinate, LocationError>;

    /// Subscribe to a continuous stream of positions.
    fn watch_position(&self) -> Result<LocationStream, LocationError>;
}

/// A source pinned to a fixed coordinate.
///
/// Used to simulate presence at a location and by the CLI, where the
/// position is supplied on the command line.
#[derive(Debug, Clone)]
pub struct StaticLocationSource {
    position: Coordinate,
    permission: PermissionStatus,
}

impl StaticLocationSource {
    pub fn new(position: Coordinate) -> Self {
        Self {
            position,
            permission: PermissionStatus::Granted,
        }
    }

    /// A source whose permission request is always refused.
    pub fn denied() -> Self {
        Self {
            position: Coordinate::new(0.0, 0.0),
            permission: PermissionStatus::Denied,
        }
    }
}

impl LocationSource for StaticLocationSource {
    fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    fn current_position(&self) -> Result<Coordinate, LocationError> {
        match self.permission {
            PermissionStatus::Granted => Ok(self.position),
            PermissionStatus::Denied => Err(LocationError::PermissionDenied),
        }
    }

    fn watch_position(&self) -> Result<LocationStream, LocationError> {
        if self.permission == PermissionStatus::Denied {
            return Err(LocationError::PermissionDenied);
        }
        let (tx, rx) = mpsc::channel(1);
        // Capacity 1 and an empty buffer: this cannot fail.
        let _ = tx.try_send(Ok(self.position));
        Ok(rx)
    }
}

/// A source fed by the caller through a channel.
///
/// `watch_position` hands out the receiver once; later calls report the
/// provider as unavailable.
pub struct ChannelLocationSource {
    permission: PermissionStatus,
    fallback: Option<Coordinate>,
    receiver: std::sync::Mutex<Option<LocationStream>>,
}

impl ChannelLocationSource {
    /// Returns the source and the sender used to push positions into it.
    pub fn new(buffer: usize) -> (Self, mpsc::Sender<Result<Coordinate, LocationError>>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let source = Self {
            permission: PermissionStatus::Granted,
            fallback: None,
            receiver: std::sync::Mutex::new(Some(rx)),
        };
        (source, tx)
    }

    /// Position returned by `current_position`.
    pub fn with_fix(mut self, position: Coordinate) -> Self {
        self.fallback = Some(position);
        self
    }
}

impl LocationSource for ChannelLocationSource {
    fn request_permission(&self) -> PermissionStatus {
        self.permission
    }

    fn current_position(&self) -> Result<Coordinate, LocationError> {
        self.fallback
            .ok_or_else(|| LocationError::Unavailable("no position fix".into()))
    }

    fn watch_position(&self) -> Result<LocationStream, LocationError> {
        let mut guard = self
            .receiver
            .lock()
            .map_err(|_| LocationError::Unavailable("provider state poisoned".into()))?;
        guard
            .take()
            .ok_or_else(|| LocationError::Unavailable("stream already taken".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_source_yields_its_position() {
        let source = StaticLocationSource::new(Coordinate::new(1.0, 2.0));
        assert_eq!(source.request_permission(), PermissionStatus::Granted);
        assert_eq!(source.current_position().unwrap(), Coordinate::new(1.0, 2.0));
        let mut rx = source.watch_position().unwrap();
        assert_eq!(rx.try_recv().unwrap().unwrap(), Coordinate::new(1.0, 2.0));
    }

    #[test]
    fn denied_source_refuses_everything() {
        let source = StaticLocationSource::denied();
        assert_eq!(source.request_permission(), PermissionStatus::Denied);
        assert_eq!(
            source.current_position().unwrap_err(),
            LocationError::PermissionDenied
        );
        assert!(source.watch_position().is_err());
    }

    #[test]
    fn channel_source_hands_out_stream_once() {
        let (source, _tx) = ChannelLocationSource::new(4);
        assert!(source.watch_position().is_ok());
        assert!(matches!(
            source.watch_position(),
            Err(LocationError::Unavailable(_))
        ));
    }
}
