//! The map surface the planner draws on.
//!
//! Rendering is somebody else's job: the planner only needs to place and
//! restyle overlays by id, move the viewport and ask which features sit in a
//! box. [`HeadlessMap`] keeps all of that in memory for the CLI and tests.

use std::collections::HashMap;

use thiserror::Error;

use crate::geometry::BoundingBox;
use crate::models::Coordinate;

#[derive(Debug, Error, PartialEq)]
pub enum MapError {
    #[error("no overlay with id {0}")]
    UnknownOverlay(String),
    #[error("map style is not loaded yet")]
    StyleNotReady,
    #[error("map rejected the update: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub color: String,
    pub width: f32,
    pub opacity: f32,
}

impl LineStyle {
    pub fn new(color: impl Into<String>, width: f32, opacity: f32) -> Self {
        Self {
            color: color.into(),
            width,
            opacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineOverlay {
    pub id: String,
    pub coordinates: Vec<Coordinate>,
    pub label: Option<String>,
    /// Where the label goes; the surface picks a spot when `None`.
    pub label_anchor: Option<Coordinate>,
    pub style: LineStyle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointOverlay {
    pub id: String,
    pub coordinate: Coordinate,
    pub label: Option<String>,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    Line(LineOverlay),
    Point(PointOverlay),
}

impl Overlay {
    pub fn id(&self) -> &str {
        match self {
            Overlay::Line(line) => &line.id,
            Overlay::Point(point) => &point.id,
        }
    }
}

/// A rendered feature of the base map (e.g. a building footprint).
#[derive(Debug, Clone, PartialEq)]
pub struct MapFeature {
    pub id: String,
    pub layer: String,
    pub position: Coordinate,
}

/// Events the map surface delivers to whoever subscribed.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    Click(Coordinate),
    /// A vertex placed by the free-hand draw tool.
    VertexAdded(Coordinate),
    /// Double-click / Enter from the draw tool.
    DrawFinished,
    OverlayClicked(String),
    StyleReady,
}

pub trait MapSurface {
    fn upsert_line(&mut self, overlay: LineOverlay) -> Result<(), MapError>;
    fn upsert_point(&mut self, overlay: PointOverlay) -> Result<(), MapError>;
    /// Returns whether an overlay was actually removed.
    fn remove_overlay(&mut self, id: &str) -> Result<bool, MapError>;
    fn bring_to_front(&mut self, id: &str) -> Result<(), MapError>;
    fn query_features(&self, bbox: &BoundingBox, layer: &str) -> Result<Vec<MapFeature>, MapError>;
    fn fit_bounds(&mut self, bbox: &BoundingBox, padding_px: u32) -> Result<(), MapError>;
    fn is_style_ready(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct HeadlessMap {
    overlays: HashMap<String, Overlay>,
    /// Bottom to top.
    draw_order: Vec<String>,
    features: Vec<MapFeature>,
    viewport: Option<(BoundingBox, u32)>,
    style_loading: bool,
    rejecting: bool,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map whose style has not finished loading; line overlays are refused
    /// until [`HeadlessMap::finish_style_load`].
    pub fn loading() -> Self {
        Self {
            style_loading: true,
            ..Self::default()
        }
    }

    pub fn finish_style_load(&mut self) {
        self.style_loading = false;
    }

    /// Makes every overlay write fail, to simulate a broken renderer.
    pub fn set_rejecting(&mut self, rejecting: bool) {
        self.rejecting = rejecting;
    }

    pub fn add_feature(&mut self, feature: MapFeature) {
        self.features.push(feature);
    }

    pub fn overlay(&self, id: &str) -> Option<&Overlay> {
        self.overlays.get(id)
    }

    pub fn line(&self, id: &str) -> Option<&LineOverlay> {
        match self.overlays.get(id) {
            Some(Overlay::Line(line)) => Some(line),
            _ => None,
        }
    }

    pub fn overlay_ids(&self) -> &[String] {
        &self.draw_order
    }

    pub fn topmost(&self) -> Option<&str> {
        self.draw_order.last().map(String::as_str)
    }

    pub fn viewport(&self) -> Option<BoundingBox> {
        self.viewport.map(|(bbox, _)| bbox)
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    fn check_writable(&self) -> Result<(), MapError> {
        if self.rejecting {
            return Err(MapError::Rejected("renderer unavailable".into()));
        }
        Ok(())
    }

    fn insert(&mut self, overlay: Overlay) {
        let id = overlay.id().to_string();
        if self.overlays.insert(id.clone(), overlay).is_none() {
            self.draw_order.push(id);
        }
    }
}

impl MapSurface for HeadlessMap {
    fn upsert_line(&mut self, overlay: LineOverlay) -> Result<(), MapError> {
        self.check_writable()?;
        if self.style_loading {
            return Err(MapError::StyleNotReady);
        }
        self.insert(Overlay::Line(overlay));
        Ok(())
    }

    fn upsert_point(&mut self, overlay: PointOverlay) -> Result<(), MapError> {
        self.check_writable()?;
        self.insert(Overlay::Point(overlay));
        Ok(())
    }

    fn remove_overlay(&mut self, id: &str) -> Result<bool, MapError> {
        self.check_writable()?;
        let removed = self.overlays.remove(id).is_some();
        if removed {
            self.draw_order.retain(|existing| existing != id);
        }
        Ok(removed)
    }

    fn bring_to_front(&mut self, id: &str) -> Result<(), MapError> {
        self.check_writable()?;
        let pos = self
            .draw_order
            .iter()
            .position(|existing| existing == id)
            .ok_or_else(|| MapError::UnknownOverlay(id.to_string()))?;
        let id = self.draw_order.remove(pos);
        self.draw_order.push(id);
        Ok(())
    }

    fn query_features(&self, bbox: &BoundingBox, layer: &str) -> Result<Vec<MapFeature>, MapError> {
        if self.style_loading {
            return Err(MapError::StyleNotReady);
        }
        Ok(self
            .features
            .iter()
            .filter(|f| f.layer == layer && bbox.contains(f.position))
            .cloned()
            .collect())
    }

    fn fit_bounds(&mut self, bbox: &BoundingBox, padding_px: u32) -> Result<(), MapError> {
        self.check_writable()?;
        self.viewport = Some((*bbox, padding_px));
        Ok(())
    }

    fn is_style_ready(&self) -> bool {
        !self.style_loading
    }
}
