use serde::{Deserialize, Serialize};

use crate::error::PlannerError;
use crate::models::Coordinate;

const EARTH_RADIUS_KM: f64 = 6_371.0088;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Square box of `size_deg` degrees centred on `center`.
    pub fn around(center: Coordinate, size_deg: f64) -> Self {
        let half = size_deg / 2.0;
        Self {
            min_lon: center.lon - half,
            min_lat: center.lat - half,
            max_lon: center.lon + half,
            max_lat: center.lat + half,
        }
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        (self.min_lon..=self.max_lon).contains(&coord.lon)
            && (self.min_lat..=self.max_lat).contains(&coord.lat)
    }
}

fn require_path(path: &[Coordinate]) -> Result<(), PlannerError> {
    if path.len() < 2 {
        return Err(PlannerError::InvalidPath { points: path.len() });
    }
    Ok(())
}

/// Sum of great-circle distances between consecutive points, in km.
pub fn length_km(path: &[Coordinate]) -> Result<f64, PlannerError> {
    require_path(path)?;
    Ok(path.windows(2).map(|w| haversine_km(w[0], w[1])).sum())
}

pub fn bounding_box(path: &[Coordinate]) -> Result<BoundingBox, PlannerError> {
    require_path(path)?;
    let first = path[0];
    let init = BoundingBox {
        min_lon: first.lon,
        min_lat: first.lat,
        max_lon: first.lon,
        max_lat: first.lat,
    };
    Ok(path.iter().skip(1).fold(init, |bbox, c| BoundingBox {
        min_lon: bbox.min_lon.min(c.lon),
        min_lat: bbox.min_lat.min(c.lat),
        max_lon: bbox.max_lon.max(c.lon),
        max_lat: bbox.max_lat.max(c.lat),
    }))
}

/// Vertex at index `n / 2`. Only good enough for placing a label.
pub fn midpoint(path: &[Coordinate]) -> Result<Coordinate, PlannerError> {
    require_path(path)?;
    Ok(path[path.len() / 2])
}

pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lon: f64, lat: f64) -> Coordinate {
        Coordinate::new(lon, lat)
    }

    #[test]
    fn test_haversine_same_point() {
        let point = c(72.5, 23.0);
        assert_eq!(haversine_km(point, point), 0.0);
    }

    #[test]
    fn test_length_rejects_short_paths() {
        assert!(matches!(
            length_km(&[]),
            Err(PlannerError::InvalidPath { points: 0 })
        ));
        assert!(matches!(
            length_km(&[c(72.5, 23.0)]),
            Err(PlannerError::InvalidPath { points: 1 })
        ));
    }

    #[test]
    fn test_length_of_short_ahmedabad_segment() {
        let km = length_km(&[c(72.50, 23.00), c(72.51, 23.01)]).unwrap();
        assert!(km > 1.4 && km < 1.6, "got {km}");
    }

    #[test]
    fn test_length_accepts_repeated_points() {
        let km = length_km(&[c(72.5, 23.0), c(72.5, 23.0)]).unwrap();
        assert_eq!(km, 0.0);
    }

    #[test]
    fn test_bounding_box_spans_all_points() {
        let bbox = bounding_box(&[c(72.51, 23.00), c(72.49, 23.02), c(72.50, 22.99)]).unwrap();
        assert_eq!(bbox.min_lon, 72.49);
        assert_eq!(bbox.max_lon, 72.51);
        assert_eq!(bbox.min_lat, 22.99);
        assert_eq!(bbox.max_lat, 23.02);
    }

    #[test]
    fn test_midpoint_is_middle_vertex() {
        let path = [c(0.0, 0.0), c(1.0, 1.0), c(2.0, 2.0), c(3.0, 3.0)];
        assert_eq!(midpoint(&path).unwrap(), c(2.0, 2.0));
        assert_eq!(midpoint(&path[..3]).unwrap(), c(1.0, 1.0));
    }

    #[test]
    fn test_bbox_around_center() {
        let bbox = BoundingBox::around(c(10.0, 20.0), 0.002);
        assert!((bbox.max_lon - bbox.min_lon - 0.002).abs() < 1e-12);
        assert!(bbox.contains(c(10.0, 20.0)));
        assert!(!bbox.contains(c(10.01, 20.0)));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = Coordinate> {
            (-180.0..=180.0, -90.0..=90.0).prop_map(|(lon, lat)| Coordinate::new(lon, lat))
        }

        proptest! {
            #[test]
            fn prop_length_non_negative(path in prop::collection::vec(valid_coord(), 2..12)) {
                prop_assert!(length_km(&path).unwrap() >= 0.0);
            }

            #[test]
            fn prop_length_monotonic_when_appending(
                path in prop::collection::vec(valid_coord(), 2..10),
                extra in valid_coord()
            ) {
                let before = length_km(&path).unwrap();
                let mut extended = path.clone();
                extended.push(extra);
                let after = length_km(&extended).unwrap();
                prop_assert!(after + 1e-9 >= before);
            }

            #[test]
            fn prop_haversine_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
            }

            #[test]
            fn prop_bbox_contains_every_vertex(path in prop::collection::vec(valid_coord(), 2..12)) {
                let bbox = bounding_box(&path).unwrap();
                for coord in &path {
                    prop_assert!(bbox.contains(*coord));
                }
            }
        }
    }
}
