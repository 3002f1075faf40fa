//! Traffic flow lines coloured by stability, with a pulse on unstable ones.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::PlannerConfig;
use crate::map::{LineOverlay, LineStyle, MapError, MapSurface};
use crate::models::Coordinate;

const OVERLAY_PREFIX: &str = "traffic-line-";
const LINE_WIDTH: f32 = 5.0;
const PULSE_STEP: f64 = 0.02;
const PULSE_MIN_OPACITY: f32 = 0.6;
const PULSE_MAX_OPACITY: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowStability {
    Stable,
    Unstable,
    Congested,
}

impl FlowStability {
    pub fn color(self) -> &'static str {
        match self {
            FlowStability::Stable => "#00FF00",
            FlowStability::Unstable => "#FFFF00",
            FlowStability::Congested => "#FF0000",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficLine {
    pub id: String,
    pub coordinates: Vec<Coordinate>,
    pub stability: FlowStability,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Opacity of an unstable line at `phase` in `[0, 1)`: 0.6 at the ends,
/// 1.0 at the midpoint.
pub fn pulse_opacity(phase: f64) -> f32 {
    let phase = phase.rem_euclid(1.0);
    let t = if phase < 0.5 { phase * 2.0 } else { (1.0 - phase) * 2.0 };
    PULSE_MIN_OPACITY + (PULSE_MAX_OPACITY - PULSE_MIN_OPACITY) * t as f32
}

pub fn advance_phase(phase: f64) -> f64 {
    (phase + PULSE_STEP) % 1.0
}

#[derive(Debug, Default)]
pub struct TrafficLineRenderer {
    lines: BTreeMap<String, TrafficLine>,
    phase: f64,
}

impl TrafficLineRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overlay_id(line_id: &str) -> String {
        format!("{OVERLAY_PREFIX}{line_id}")
    }

    pub fn get(&self, id: &str) -> Option<&TrafficLine> {
        self.lines.get(id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn add(&mut self, map: &mut impl MapSurface, line: TrafficLine) -> Result<(), MapError> {
        map.upsert_line(self.overlay_for(&line))?;
        self.lines.insert(line.id.clone(), line);
        Ok(())
    }

    /// Adds or replaces each line. Stops at the first map failure; lines
    /// before it stay rendered.
    pub fn update_many(
        &mut self,
        map: &mut impl MapSurface,
        lines: impl IntoIterator<Item = TrafficLine>,
    ) -> Result<(), MapError> {
        for line in lines {
            self.add(map, line)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, map: &mut impl MapSurface, id: &str) -> Result<Option<TrafficLine>, MapError> {
        if !self.lines.contains_key(id) {
            return Ok(None);
        }
        map.remove_overlay(&Self::overlay_id(id))?;
        Ok(self.lines.remove(id))
    }

    pub fn clear(&mut self, map: &mut impl MapSurface) -> Result<(), MapError> {
        for id in self.lines.keys() {
            map.remove_overlay(&Self::overlay_id(id))?;
        }
        self.lines.clear();
        Ok(())
    }

    /// Restyles unstable lines for the given pulse phase.
    pub fn apply_phase(&mut self, map: &mut impl MapSurface, phase: f64) -> Result<(), MapError> {
        self.phase = phase;
        for line in self.lines.values() {
            if line.stability == FlowStability::Unstable {
                map.upsert_line(self.overlay_for(line))?;
            }
        }
        Ok(())
    }

    /// Waits for the next phase from a [`PulseTicker`] and applies it.
    /// Returns `false` once the ticker has stopped.
    pub async fn follow(
        &mut self,
        map: &mut impl MapSurface,
        phases: &mut watch::Receiver<f64>,
    ) -> Result<bool, MapError> {
        if phases.changed().await.is_err() {
            return Ok(false);
        }
        let phase = *phases.borrow_and_update();
        self.apply_phase(map, phase)?;
        Ok(true)
    }

    /// Removes every overlay this renderer placed and forgets its lines.
    /// Any [`PulseTicker`] driving it belongs to the caller.
    pub fn destroy(&mut self, map: &mut impl MapSurface) {
        if let Err(err) = self.clear(map) {
            tracing::warn!("traffic lines could not be removed cleanly: {err}");
            self.lines.clear();
        }
        self.phase = 0.0;
    }

    fn overlay_for(&self, line: &TrafficLine) -> LineOverlay {
        let opacity = match line.stability {
            FlowStability::Unstable => pulse_opacity(self.phase),
            FlowStability::Stable | FlowStability::Congested => PULSE_MAX_OPACITY,
        };
        LineOverlay {
            id: Self::overlay_id(&line.id),
            coordinates: line.coordinates.clone(),
            label: None,
            label_anchor: None,
            style: LineStyle::new(line.stability.color(), LINE_WIDTH, opacity),
        }
    }
}

/// Publishes the pulse phase on a watch channel at a fixed interval.
///
/// The task is aborted when the ticker is dropped.
pub struct PulseTicker {
    handle: JoinHandle<()>,
}

impl PulseTicker {
    /// Must be called from within a tokio runtime.
    pub fn spawn(interval: Duration) -> (Self, watch::Receiver<f64>) {
        let (tx, rx) = watch::channel(0.0);
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut phase = 0.0;
            loop {
                ticker.tick().await;
                phase = advance_phase(phase);
                if tx.send(phase).is_err() {
                    tracing::debug!("pulse receivers gone, stopping ticker");
                    break;
                }
            }
        });
        (Self { handle }, rx)
    }

    /// Ticks at the configured `pulse_interval`.
    pub fn from_config(config: &PlannerConfig) -> (Self, watch::Receiver<f64>) {
        Self::spawn(config.pulse_interval)
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for PulseTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
