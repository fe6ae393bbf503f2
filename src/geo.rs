use crate::error::AttendanceError;
use crate::models::{AuthorizedZone, Coordinate, LocationStatus, ZoneEvaluation};

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates, in meters.
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let phi_a = a.latitude.to_radians();
    let phi_b = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi_a.cos() * phi_b.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Distance from `current` to the zone center and whether that is within
/// the radius. The boundary counts as inside.
pub fn evaluate(
    current: &Coordinate,
    zone: &AuthorizedZone,
) -> Result<ZoneEvaluation, AttendanceError> {
    current.validate()?;
    zone.validate()?;

    let distance_meters = distance_meters(current, &zone.center);
    Ok(ZoneEvaluation {
        distance_meters,
        is_inside: distance_meters <= zone.radius_meters,
    })
}

/// Lifts a possibly-missing provider reading into a [`LocationStatus`].
/// A missing coordinate is reported as such and never evaluated.
pub fn location_status(
    current: Option<Coordinate>,
    zone: &AuthorizedZone,
) -> Result<LocationStatus, AttendanceError> {
    match current {
        None => Ok(LocationStatus::Unavailable),
        Some(coordinate) => {
            let evaluation = evaluate(&coordinate, zone)?;
            Ok(LocationStatus::Located {
                coordinate,
                evaluation,
            })
        }
    }
}

pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}
