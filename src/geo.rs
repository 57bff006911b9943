use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in meters used by the Haversine formula
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A GPS sample or a fixed point, in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

impl std::str::FromStr for Coordinate {
    type Err = String;

    /// Parses `"lat,lon"` (whitespace around either part is ignored)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("expected LAT,LON but got '{s}'"))?;
        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
        let longitude: f64 = lon
            .trim()
            .parse()
            .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;
        Ok(Self::new(latitude, longitude))
    }
}

/// Geographic boundary that gates attendance actions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeofenceArea {
    Circle {
        center: Coordinate,
        radius_meters: f64,
    },
    Box {
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeofenceError {
    #[error("geofence radius must be positive, got {0}")]
    NonPositiveRadius(f64),
    #[error("geofence {axis} range is empty: min {min} must be below max {max}")]
    EmptyRange {
        axis: &'static str,
        min: f64,
        max: f64,
    },
    #[error("geofence contains a non-finite value")]
    NonFinite,
}

impl GeofenceArea {
    pub fn circle(center: Coordinate, radius_meters: f64) -> Self {
        GeofenceArea::Circle {
            center,
            radius_meters,
        }
    }

    pub fn bounding_box(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Self {
        GeofenceArea::Box {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    /// Whether `point` falls inside the area (boundary inclusive)
    pub fn contains(&self, point: Coordinate) -> bool {
        match *self {
            GeofenceArea::Circle {
                center,
                radius_meters,
            } => is_inside_circle(point, center, radius_meters),
            GeofenceArea::Box {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => is_inside_box(point, lat_min, lat_max, lon_min, lon_max),
        }
    }

    /// Centre of the circle, or the midpoint of the box
    pub fn center(&self) -> Coordinate {
        match *self {
            GeofenceArea::Circle { center, .. } => center,
            GeofenceArea::Box {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => Coordinate::new((lat_min + lat_max) / 2.0, (lon_min + lon_max) / 2.0),
        }
    }

    pub fn validate(&self) -> Result<(), GeofenceError> {
        match *self {
            GeofenceArea::Circle {
                center,
                radius_meters,
            } => {
                if !(center.latitude.is_finite()
                    && center.longitude.is_finite()
                    && radius_meters.is_finite())
                {
                    return Err(GeofenceError::NonFinite);
                }
                if radius_meters <= 0.0 {
                    return Err(GeofenceError::NonPositiveRadius(radius_meters));
                }
                Ok(())
            }
            GeofenceArea::Box {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            } => {
                if [lat_min, lat_max, lon_min, lon_max]
                    .iter()
                    .any(|v| !v.is_finite())
                {
                    return Err(GeofenceError::NonFinite);
                }
                if lat_min >= lat_max {
                    return Err(GeofenceError::EmptyRange {
                        axis: "latitude",
                        min: lat_min,
                        max: lat_max,
                    });
                }
                if lon_min >= lon_max {
                    return Err(GeofenceError::EmptyRange {
                        axis: "longitude",
                        min: lon_min,
                        max: lon_max,
                    });
                }
                Ok(())
            }
        }
    }
}

/// Great-circle distance in meters (Haversine). NaN in, NaN out.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

pub fn is_inside_circle(point: Coordinate, center: Coordinate, radius_meters: f64) -> bool {
    distance_meters(point, center) <= radius_meters
}

/// Inclusive range check on each axis; no wraparound at ±180° longitude
pub fn is_inside_box(
    point: Coordinate,
    lat_min: f64,
    lat_max: f64,
    lon_min: f64,
    lon_max: f64,
) -> bool {
    (lat_min..=lat_max).contains(&point.latitude) && (lon_min..=lon_max).contains(&point.longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFICE: Coordinate = Coordinate {
        latitude: 37.42210,
        longitude: -122.08410,
    };

    /// Point due north of `from` at `meters` along the meridian
    fn north_of(from: Coordinate, meters: f64) -> Coordinate {
        let d_lat = (meters / EARTH_RADIUS_M).to_degrees();
        Coordinate::new(from.latitude + d_lat, from.longitude)
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(distance_meters(OFFICE, OFFICE), 0.0);
        let origin = Coordinate::new(0.0, 0.0);
        assert_eq!(distance_meters(origin, origin), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let pairs = [
            (OFFICE, Coordinate::new(37.43, -122.09)),
            (Coordinate::new(51.5074, -0.1278), Coordinate::new(48.8566, 2.3522)),
            (Coordinate::new(-33.86, 151.21), Coordinate::new(35.68, 139.69)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_meters(a, b), distance_meters(b, a));
        }
    }

    #[test]
    fn test_distance_known_value() {
        // London -> Paris is roughly 343.5 km on a 6371 km sphere
        let london = Coordinate::new(51.5074, -0.1278);
        let paris = Coordinate::new(48.8566, 2.3522);
        let d = distance_meters(london, paris);
        assert!((d - 343_556.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn test_distance_nan_propagates() {
        let bad = Coordinate::new(f64::NAN, 0.0);
        assert!(distance_meters(bad, OFFICE).is_nan());
    }

    #[test]
    fn test_circle_boundary_is_inclusive() {
        let at_200 = north_of(OFFICE, 200.0);
        let d = distance_meters(at_200, OFFICE);
        assert!((d - 200.0).abs() < 1e-6, "got {d}");

        // The exact boundary distance counts as inside
        assert!(is_inside_circle(at_200, OFFICE, d));
        assert!(is_inside_circle(at_200, OFFICE, 200.0));
        assert!(GeofenceArea::circle(OFFICE, 200.0).contains(at_200));
        assert!(is_inside_circle(north_of(OFFICE, 199.9), OFFICE, 200.0));
        assert!(!is_inside_circle(north_of(OFFICE, 201.0), OFFICE, 200.0));
    }

    #[test]
    fn test_box_is_inclusive_per_axis() {
        let inside =
            |lat, lon| is_inside_box(Coordinate::new(lat, lon), 37.0, 38.0, -123.0, -122.0);
        assert!(inside(37.5, -122.5));
        assert!(inside(37.0, -122.0));
        assert!(inside(38.0, -123.0));
        assert!(!inside(38.0001, -122.5));
        assert!(!inside(37.5, -121.9999));
    }

    #[test]
    fn test_area_contains_dispatches_on_variant() {
        let circle = GeofenceArea::circle(OFFICE, 200.0);
        assert!(circle.contains(north_of(OFFICE, 150.0)));
        assert!(!circle.contains(north_of(OFFICE, 250.0)));

        let rect = GeofenceArea::bounding_box(37.4210, 37.4232, -122.0852, -122.0830);
        assert!(rect.contains(OFFICE));
        assert!(!rect.contains(Coordinate::new(37.43, -122.0841)));
    }

    #[test]
    fn test_box_center_is_midpoint() {
        let rect = GeofenceArea::bounding_box(10.0, 12.0, 20.0, 24.0);
        assert_eq!(rect.center(), Coordinate::new(11.0, 22.0));
        assert_eq!(GeofenceArea::circle(OFFICE, 10.0).center(), OFFICE);
    }

    #[test]
    fn test_validate_rejects_bad_areas() {
        assert!(GeofenceArea::circle(OFFICE, 200.0).validate().is_ok());
        assert_eq!(
            GeofenceArea::circle(OFFICE, 0.0).validate(),
            Err(GeofenceError::NonPositiveRadius(0.0))
        );
        assert_eq!(
            GeofenceArea::circle(Coordinate::new(f64::NAN, 0.0), 5.0).validate(),
            Err(GeofenceError::NonFinite)
        );
        assert!(matches!(
            GeofenceArea::bounding_box(1.0, 1.0, 0.0, 1.0).validate(),
            Err(GeofenceError::EmptyRange { axis: "latitude", .. })
        ));
        assert!(matches!(
            GeofenceArea::bounding_box(0.0, 1.0, 2.0, 1.0).validate(),
            Err(GeofenceError::EmptyRange { axis: "longitude", .. })
        ));
    }

    #[test]
    fn test_coordinate_parse_and_display() {
        let c: Coordinate = " 37.4221 , -122.0841 ".parse().unwrap();
        assert_eq!(c, Coordinate::new(37.4221, -122.0841));
        assert_eq!(c.to_string(), "37.42210, -122.08410");
        assert!("37.4".parse::<Coordinate>().is_err());
        assert!("abc,1".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_area_serde_is_tagged() {
        let json = serde_json::to_value(GeofenceArea::circle(OFFICE, 200.0)).unwrap();
        assert_eq!(json["kind"], "circle");
        assert_eq!(json["radius_meters"], 200.0);

        let rect: GeofenceArea = serde_json::from_str(
            r#"{"kind":"box","lat_min":1.0,"lat_max":2.0,"lon_min":3.0,"lon_max":4.0}"#,
        )
        .unwrap();
        assert_eq!(rect, GeofenceArea::bounding_box(1.0, 2.0, 3.0, 4.0));
    }
}
