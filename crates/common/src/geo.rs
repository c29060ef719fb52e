//! Distance and time helpers for vehicle positions.
//!
//! # Conventions
//!
//! - Latitude: degrees north (-90 to 90)
//! - Longitude: degrees east (-180 to 180)
//! - Heading: degrees true (0-360, 0=north, 90=east)
//! - Distance: kilometres unless the function name says otherwise
//! - Speed: kilometres per hour

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Mean Earth radius in kilometres.
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Kilometres per statute mile.
const KM_PER_MILE: f64 = 1.609_344;

/// Returns true when both values are finite and inside the WGS-84 degree ranges.
pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite()
        && lng.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lng)
}

/// Great-circle distance between two `(lat, lng)` points using the haversine formula.
///
/// # Example
///
/// ```
/// use common::geo::haversine_km;
///
/// // London to Birmingham, roughly 163km as the crow flies
/// let d = haversine_km((51.5074, -0.1278), (52.4862, -1.8904));
/// assert!((d - 163.0).abs() < 2.0);
/// ```
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);

    // Clamp guards against a > 1.0 from floating point error on antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

pub fn km_to_miles(km: f64) -> f64 {
    km / KM_PER_MILE
}

/// Time to cover `distance_km` at a constant `speed_kph`.
///
/// Returns `None` for non-positive or non-finite speeds, a negative distance,
/// or a result too large to fit a `Duration`.
pub fn travel_time(distance_km: f64, speed_kph: f64) -> Option<Duration> {
    if !speed_kph.is_finite() || speed_kph <= 0.0 || !distance_km.is_finite() || distance_km < 0.0
    {
        return None;
    }
    let secs = distance_km / speed_kph * 3600.0;
    Duration::try_from_secs_f64(secs).ok()
}

/// Age of an observation relative to `now`. Observations in the future have zero age.
pub fn position_age(observed_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - observed_at).to_std().unwrap_or(Duration::ZERO)
}

pub fn is_stale(observed_at: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    position_age(observed_at, now) > max_age
}

/// Wrap any finite heading into `[0, 360)`.
pub fn normalize_heading(heading: f64) -> Option<f64> {
    if !heading.is_finite() {
        return None;
    }
    let wrapped = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    Some(if wrapped >= 360.0 { 0.0 } else { wrapped })
}
