//! Great-circle geometry for proximity detection
//!
//! Pure functions over WGS-ish degree coordinates. Everything upstream
//! validates with [`is_valid_coordinate`] before calling in here, so these
//! functions assume finite inputs.

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// The 16 compass points, clockwise from north
pub const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Haversine great-circle distance between two points, in kilometers.
///
/// Symmetric in its arguments and zero for identical points. The haversine
/// intermediate is clamped to [0, 1] so floating rounding near antipodal or
/// identical points can never push it outside the domain of `sqrt`/`atan2`.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Initial bearing from point 1 to point 2, in degrees within [0, 360).
pub fn bearing_degrees(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lon = (lon2 - lon1).to_radians();
    let y = d_lon.sin() * lat2.to_radians().cos();
    let x = lat1.to_radians().cos() * lat2.to_radians().sin()
        - lat1.to_radians().sin() * lat2.to_radians().cos() * d_lon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Nearest compass label for a bearing, on 22.5-degree sectors.
///
/// 360 wraps back to N.
pub fn bearing_to_compass(bearing: f64) -> &'static str {
    let index = (bearing.rem_euclid(360.0) / 22.5).round() as usize % 16;
    COMPASS_POINTS[index]
}

/// True when both values are finite and within latitude/longitude range.
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_zero_for_identical_points() {
        assert_eq!(distance_km(37.7749, -122.4194, 37.7749, -122.4194), 0.0);
        assert_eq!(distance_km(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (37.7749, -122.4194, 40.7128, -74.0060),
            (-33.8688, 151.2093, 51.5074, -0.1278),
            (89.9, 179.9, -89.9, -179.9),
        ];
        for (lat1, lon1, lat2, lon2) in pairs {
            let forward = distance_km(lat1, lon1, lat2, lon2);
            let back = distance_km(lat2, lon2, lat1, lon1);
            assert!(
                (forward - back).abs() <= 1e-9 * forward.max(1.0),
                "asymmetric: {forward} vs {back}"
            );
        }
    }

    #[test]
    fn distance_matches_known_values() {
        // SF downtown block, the canonical nearby-relative reading
        let d = distance_km(37.7749, -122.4194, 37.7750, -122.4195);
        assert!((d - 0.013).abs() < 0.002, "got {d}");

        // SF to NYC, roughly 4130 km
        let d = distance_km(37.7749, -122.4194, 40.7128, -74.0060);
        assert!((d - 4130.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn distance_is_never_negative_near_antipodes() {
        let d = distance_km(90.0, 0.0, -90.0, 0.0);
        assert!(d > 0.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1.0);
    }

    #[test]
    fn bearing_stays_in_range() {
        let points = [
            (0.0, 0.0, 10.0, 10.0),
            (10.0, 10.0, 0.0, 0.0),
            (37.7749, -122.4194, 37.7750, -122.4195),
            (-45.0, 170.0, -45.0, -170.0),
        ];
        for (lat1, lon1, lat2, lon2) in points {
            let b = bearing_degrees(lat1, lon1, lat2, lon2);
            assert!((0.0..360.0).contains(&b), "bearing out of range: {b}");
        }
    }

    #[test]
    fn bearing_due_north_and_east() {
        assert!((bearing_degrees(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9);
        assert!((bearing_degrees(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn compass_labels_round_to_nearest_sector() {
        assert_eq!(bearing_to_compass(0.0), "N");
        assert_eq!(bearing_to_compass(11.0), "N");
        assert_eq!(bearing_to_compass(11.3), "NNE");
        assert_eq!(bearing_to_compass(22.5), "NNE");
        assert_eq!(bearing_to_compass(45.0), "NE");
        assert_eq!(bearing_to_compass(90.0), "E");
        assert_eq!(bearing_to_compass(180.0), "S");
        assert_eq!(bearing_to_compass(270.0), "W");
        assert_eq!(bearing_to_compass(340.0), "NNW");
        assert_eq!(bearing_to_compass(355.0), "N");
        assert_eq!(bearing_to_compass(360.0), "N");
    }

    #[test]
    fn coordinate_validation_bounds() {
        assert!(is_valid_coordinate(0.0, 0.0));
        assert!(is_valid_coordinate(-90.0, 180.0));
        assert!(is_valid_coordinate(90.0, -180.0));
        assert!(!is_valid_coordinate(90.1, 0.0));
        assert!(!is_valid_coordinate(0.0, 200.0));
        assert!(!is_valid_coordinate(f64::NAN, 0.0));
        assert!(!is_valid_coordinate(0.0, f64::INFINITY));
    }
}
