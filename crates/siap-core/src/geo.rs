//! Great-circle distance on a spherical Earth.

/// Mean Earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two points given in degrees.
///
/// Always non-negative. The haversine term is clamped to `[0, 1]` so rounding
/// near antipodal points or the poles never feeds a value outside the domain
/// of `sqrt`/`atan2`.
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Latitude offset in degrees that corresponds to `meters` along a meridian.
pub fn meters_to_latitude_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_METERS).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(distance(-6.2, 106.816666, -6.2, 106.816666), 0.0);
        assert_eq!(distance(90.0, 0.0, 90.0, 0.0), 0.0);
    }

    #[test]
    fn symmetric() {
        let pairs = [
            ((-6.2, 106.816666), (-7.797068, 110.370529)),
            ((51.5074, -0.1278), (40.7128, -74.0060)),
            ((0.0, 179.9), (0.0, -179.9)),
        ];
        for ((a_lat, a_lon), (b_lat, b_lon)) in pairs {
            let ab = distance(a_lat, a_lon, b_lat, b_lon);
            let ba = distance(b_lat, b_lon, a_lat, a_lon);
            assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
        }
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance(0.0, 0.0, 1.0, 0.0);
        // 2πR / 360
        assert!((d - 111_194.93).abs() < 1.0, "got {d}");
    }

    #[test]
    fn antipodal_points_are_finite() {
        let d = distance(0.0, 0.0, 0.0, 180.0);
        assert!(d.is_finite());
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);

        let poles = distance(90.0, 0.0, -90.0, 0.0);
        assert!(poles.is_finite());
    }

    #[test]
    fn longitude_is_irrelevant_at_the_pole() {
        let d = distance(90.0, 0.0, 90.0, 135.0);
        assert!(d.abs() < 1e-6, "got {d}");
    }

    #[test]
    fn jakarta_two_hundred_meters_south() {
        let d = distance(-6.2, 106.816666, -6.2018, 106.816666);
        assert!((d - 200.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn latitude_offset_inverts_distance() {
        let dlat = meters_to_latitude_degrees(250.0);
        let d = distance(-6.2, 106.816666, -6.2 + dlat, 106.816666);
        assert!((d - 250.0).abs() < 1e-6, "got {d}");
    }
}
