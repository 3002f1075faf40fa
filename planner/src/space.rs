//! Checks whether the ground around a coordinate is free of buildings.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::PlannerError;
use crate::geometry::BoundingBox;
use crate::map::MapSurface;
use crate::models::Coordinate;

pub const BUILDING_LAYER: &str = "building";
const DEFAULT_BBOX_SIZE_DEG: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceAnalysis {
    pub coordinate: Coordinate,
    pub bounding_box: BoundingBox,
    pub building_count: usize,
    pub is_empty: bool,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SpaceAnalyzer {
    bbox_size_deg: f64,
}

impl Default for SpaceAnalyzer {
    fn default() -> Self {
        Self {
            bbox_size_deg: DEFAULT_BBOX_SIZE_DEG,
        }
    }
}

impl SpaceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bbox_size(&self) -> f64 {
        self.bbox_size_deg
    }

    pub fn set_bbox_size(&mut self, size_deg: f64) -> Result<(), PlannerError> {
        // also rejects NaN
        if !(size_deg > 0.0) {
            return Err(PlannerError::InvalidBoundingBoxSize(size_deg));
        }
        self.bbox_size_deg = size_deg;
        Ok(())
    }

    pub fn analyze(&self, map: &impl MapSurface, coordinate: Coordinate) -> Result<SpaceAnalysis, PlannerError> {
        let bounding_box = BoundingBox::around(coordinate, self.bbox_size_deg);
        let buildings = map.query_features(&bounding_box, BUILDING_LAYER)?;
        tracing::debug!(
            "{} building(s) around ({:.6}, {:.6})",
            buildings.len(),
            coordinate.lon,
            coordinate.lat
        );
        Ok(SpaceAnalysis {
            coordinate,
            bounding_box,
            building_count: buildings.len(),
            is_empty: buildings.is_empty(),
            analyzed_at: Utc::now(),
        })
    }

    /// Analyzes each coordinate in turn; failed ones are logged and left out.
    pub fn analyze_many(&self, map: &impl MapSurface, coordinates: &[Coordinate]) -> Vec<SpaceAnalysis> {
        coordinates
            .iter()
            .filter_map(|&coordinate| match self.analyze(map, coordinate) {
                Ok(analysis) => Some(analysis),
                Err(err) => {
                    tracing::error!(
                        "space analysis failed at ({}, {}): {err}",
                        coordinate.lon,
                        coordinate.lat
                    );
                    None
                }
            })
            .collect()
    }
}
