use serde::{Deserialize, Serialize};

/// WGS84 position, longitude first to match the map surface's `[lon, lat]`
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn offset(self, d_lon: f64, d_lat: f64) -> Self {
        Self {
            lon: self.lon + d_lon,
            lat: self.lat + d_lat,
        }
    }

    pub fn is_valid(self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lon, lat]: [f64; 2]) -> Self {
        Self { lon, lat }
    }
}

impl From<Coordinate> for [f64; 2] {
    fn from(coord: Coordinate) -> Self {
        [coord.lon, coord.lat]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub lat: f64,
    pub lon: f64,
}

/// Body of both `POST /routes/analyze` and `POST /routes/recommend`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAnalyzeRequest {
    pub start_lat: f64,
    pub start_lon: f64,
    pub end_lat: f64,
    pub end_lon: f64,
    #[serde(default)]
    pub waypoints: Vec<Waypoint>,
}

impl RouteAnalyzeRequest {
    /// Returns `None` for paths shorter than two points.
    pub fn from_path(path: &[Coordinate]) -> Option<Self> {
        let (first, last) = match path {
            [first, .., last] => (first, last),
            _ => return None,
        };
        let waypoints = path[1..path.len() - 1]
            .iter()
            .map(|c| Waypoint {
                lat: c.lat,
                lon: c.lon,
            })
            .collect();
        Some(Self {
            start_lat: first.lat,
            start_lon: first.lon,
            end_lat: last.lat,
            end_lon: last.lon,
            waypoints,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoadPropertiesPayload {
    #[serde(default)]
    pub road_type: Option<String>,
    #[serde(default)]
    pub road_width_m: Option<f64>,
    #[serde(default)]
    pub lanes: Option<u32>,
    #[serde(default)]
    pub surface_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrafficCountsPayload {
    #[serde(default)]
    pub total_vehicles: Option<u64>,
    #[serde(default)]
    pub two_wheeler: Option<u64>,
    #[serde(default)]
    pub four_wheeler: Option<u64>,
    #[serde(default)]
    pub heavy_vehicle: Option<u64>,
    #[serde(default)]
    pub avg_speed_kmh: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteAnalysisResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_points: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub road_properties: Option<RoadPropertiesPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_counts: Option<TrafficCountsPayload>,
}

/// One candidate geometry as returned by `POST /routes/recommend`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendedRoute {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub travel_time_min: Option<f64>,
    #[serde(default)]
    pub traffic_score: Option<f64>,
    #[serde(default)]
    pub emission_g: Option<f64>,
    #[serde(default)]
    pub rank: Option<u32>,
    #[serde(default)]
    pub turn_count: Option<u32>,
    #[serde(default)]
    pub road_classes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub routes: Vec<RecommendedRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(alias = "error", alias = "detail")]
    pub message: String,
}
