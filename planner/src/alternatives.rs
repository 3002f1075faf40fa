use serde::Serialize;

use crate::analysis::EMISSION_G_PER_KM;
use crate::map::LineStyle;
use crate::models::{Alternative, RouteMetrics};

/// Fill colours for alternative overlays, cycled by list position.
pub const PALETTE: [&str; 5] = ["#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6"];

const DEFAULT_WIDTH: f32 = 4.0;
const DEFAULT_OPACITY: f32 = 0.8;
const SELECTED_WIDTH: f32 = 6.0;
const SELECTED_OPACITY: f32 = 1.0;
const OVERLAY_PREFIX: &str = "alt-route-";

/// How an alternative compares to the drawn route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeComparison {
    pub id: String,
    pub rank: u32,
    pub distance_delta_km: f64,
    /// Negative when the alternative emits less than the drawn route.
    pub emission_delta_grams: f64,
    pub travel_time_min: f64,
}

/// Candidate routes for the current selection, in rank order, with at most
/// one of them selected.
#[derive(Debug, Default)]
pub struct AlternativesStore {
    alternatives: Vec<Alternative>,
    selected_id: Option<String>,
}

impl AlternativesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swaps in a new set. The previous selection never survives.
    pub fn replace(&mut self, mut alternatives: Vec<Alternative>) {
        alternatives.sort_by_key(|alt| alt.rank);
        self.alternatives = alternatives;
        self.selected_id = None;
    }

    pub fn clear(&mut self) {
        self.alternatives.clear();
        self.selected_id = None;
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    pub fn get(&self, id: &str) -> Option<&Alternative> {
        self.alternatives.iter().find(|alt| alt.id == id)
    }

    /// Looks up by id first, then by rank written as text, which is how
    /// list rows refer to alternatives.
    pub fn find(&self, key: &str) -> Option<&Alternative> {
        self.get(key).or_else(|| {
            let rank: u32 = key.trim().parse().ok()?;
            self.alternatives.iter().find(|alt| alt.rank == rank)
        })
    }

    pub fn recommended_id(&self) -> Option<&str> {
        self.alternatives.first().map(|alt| alt.id.as_str())
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn selected(&self) -> Option<&Alternative> {
        self.selected_id.as_deref().and_then(|id| self.get(id))
    }

    /// Marks `key` (id or rank) as the only selected alternative. Unknown
    /// keys leave the current selection alone.
    pub fn select(&mut self, key: &str) -> Option<&Alternative> {
        let id = self.find(key)?.id.clone();
        self.selected_id = Some(id);
        self.selected()
    }

    pub fn comparisons(&self, baseline: &RouteMetrics) -> Vec<AlternativeComparison> {
        let baseline_emission = baseline.length_km * EMISSION_G_PER_KM;
        self.alternatives
            .iter()
            .map(|alt| AlternativeComparison {
                id: alt.id.clone(),
                rank: alt.rank,
                distance_delta_km: alt.distance_km - baseline.length_km,
                emission_delta_grams: alt.emission_grams - baseline_emission,
                travel_time_min: alt.travel_time_min,
            })
            .collect()
    }

    pub fn overlay_id(alternative_id: &str) -> String {
        format!("{OVERLAY_PREFIX}{alternative_id}")
    }

    pub fn alternative_for_overlay(&self, overlay_id: &str) -> Option<&Alternative> {
        overlay_id
            .strip_prefix(OVERLAY_PREFIX)
            .and_then(|id| self.get(id))
    }

    pub fn style_for(position: usize, selected: bool) -> LineStyle {
        let color = PALETTE[position % PALETTE.len()];
        if selected {
            LineStyle::new(color, SELECTED_WIDTH, SELECTED_OPACITY)
        } else {
            LineStyle::new(color, DEFAULT_WIDTH, DEFAULT_OPACITY)
        }
    }
}
