//! Length-only heuristics used until the analysis service answers.

use crate::error::PlannerError;
use crate::geometry;
use crate::models::{Coordinate, RoadType, RouteMetrics, VehicleCounts};

const VEHICLES_PER_KM: f64 = 500.0;
const TWO_WHEELER_SHARE: f64 = 0.45;
const FOUR_WHEELER_SHARE: f64 = 0.40;
const HEAVY_SHARE: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoadProperties {
    pub road_type: RoadType,
    pub width_m: f64,
    pub lanes: u32,
}

pub fn estimate_road_properties(length_km: f64) -> RoadProperties {
    let (road_type, width_m, lanes) = if length_km > 10.0 {
        (RoadType::Highway, 12.0, 4)
    } else if length_km > 5.0 {
        (RoadType::MainRoad, 10.0, 4)
    } else if length_km < 1.0 {
        (RoadType::LocalStreet, 5.0, 1)
    } else {
        (RoadType::UrbanRoad, 7.5, 2)
    };
    RoadProperties {
        road_type,
        width_m,
        lanes,
    }
}

/// Each share is rounded on its own, so the parts may not add up to `total`.
pub fn estimate_traffic_counts(length_km: f64) -> VehicleCounts {
    let total = round_count(VEHICLES_PER_KM * length_km);
    let share = |fraction: f64| round_count(total as f64 * fraction);
    VehicleCounts {
        total,
        two_wheeler: share(TWO_WHEELER_SHARE),
        four_wheeler: share(FOUR_WHEELER_SHARE),
        heavy: share(HEAVY_SHARE),
    }
}

/// Local metrics for a path, before any backend overlay.
pub fn local_metrics(path: &[Coordinate]) -> Result<RouteMetrics, PlannerError> {
    let length_km = geometry::length_km(path)?;
    let road = estimate_road_properties(length_km);
    Ok(RouteMetrics {
        length_km,
        point_count: path.len(),
        road_type: road.road_type,
        road_width_m: road.width_m,
        lanes: road.lanes,
        vehicle_counts: estimate_traffic_counts(length_km),
        estimated_time_min: None,
        surface: None,
        avg_speed_kmh: None,
    })
}

fn round_count(value: f64) -> u64 {
    value.max(0.0).round() as u64
}
