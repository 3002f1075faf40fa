use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use shared::Coordinate;

use crate::error::PlannerError;

/// A finalized selection: at least two coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RoutePath(Vec<Coordinate>);

impl RoutePath {
    pub fn new(points: Vec<Coordinate>) -> Result<Self, PlannerError> {
        if points.len() < 2 {
            return Err(PlannerError::InvalidPath {
                points: points.len(),
            });
        }
        Ok(Self(points))
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    pub fn start(&self) -> Coordinate {
        self.0[0]
    }

    pub fn end(&self) -> Coordinate {
        self.0[self.0.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadType {
    #[serde(rename = "Local Street")]
    LocalStreet,
    #[serde(rename = "Urban Road")]
    UrbanRoad,
    #[serde(rename = "Main Road")]
    MainRoad,
    Highway,
}

impl RoadType {
    pub fn label(self) -> &'static str {
        match self {
            RoadType::LocalStreet => "Local Street",
            RoadType::UrbanRoad => "Urban Road",
            RoadType::MainRoad => "Main Road",
            RoadType::Highway => "Highway",
        }
    }

    /// Accepts the service's display names ("Main Road") as well as
    /// compact spellings ("main_road", "MainRoad").
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "localstreet" => Some(RoadType::LocalStreet),
            "urbanroad" => Some(RoadType::UrbanRoad),
            "mainroad" => Some(RoadType::MainRoad),
            "highway" => Some(RoadType::Highway),
            _ => None,
        }
    }
}

impl fmt::Display for RoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleCounts {
    pub total: u64,
    pub two_wheeler: u64,
    pub four_wheeler: u64,
    pub heavy: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetrics {
    pub length_km: f64,
    pub point_count: usize,
    pub road_type: RoadType,
    pub road_width_m: f64,
    pub lanes: u32,
    pub vehicle_counts: VehicleCounts,
    /// Only ever filled in by the analysis service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_speed_kmh: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub id: String,
    pub name: String,
    pub coordinates: Vec<Coordinate>,
    pub distance_km: f64,
    pub travel_time_min: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_score: Option<f64>,
    pub emission_grams: f64,
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub streets: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Planned,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    pub name: String,
    pub status: ProjectStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub start_coordinate: Coordinate,
    pub end_coordinate: Coordinate,
    pub resource_allocation_summary: String,
    /// Serialized as `null` when no alternative was selected.
    pub emission_reduction_estimate: Option<f64>,
}
