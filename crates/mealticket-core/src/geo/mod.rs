mod distance;
mod fence;
mod source;

pub use distance::{haversine_distance, Coordinate, EARTH_RADIUS_METERS};
pub use fence::{FenceState, Geofence, GeofenceVerifier, LocationSample, VerifierStatus};
pub use source::{
    ChannelLocationSource, LocationSource, LocationStream, PermissionStatus, StaticLocationSource,
};
