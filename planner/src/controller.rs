//! Interaction state machine for selecting a construction route.
//!
//! The controller is driven from one task: map events go through
//! [`RouteSelectionController::handle_event`] and results of background
//! analysis come back through [`RouteSelectionController::next_completion`].
//! Every selection gets a generation number; a result stamped with an older
//! generation is dropped on arrival.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::alternatives::{AlternativeComparison, AlternativesStore};
use crate::analysis::{AlternativeSource, AnalysisClient, AnalysisService, Recommendation};
use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::estimate::local_metrics;
use crate::geometry;
use crate::map::{LineOverlay, LineStyle, MapEvent, MapSurface, PointOverlay};
use crate::models::{Alternative, Coordinate, ProjectDraft, RouteMetrics, RoutePath};
use crate::project::ProjectDraftBuilder;

pub const ROUTE_OVERLAY_ID: &str = "selected-route";
const MARKER_PREFIX: &str = "click-marker-";
const MARKER_COLOR: &str = "#ff7f0e";
const ROUTE_COLOR: &str = "#3b82f6";

pub const HINT_IDLE: &str = "Click \"Draw Route\" then click points on the map to create a construction route.";
pub const HINT_DRAWING: &str = "Click on the map to add points. Double-click or press Enter to finish.";
pub const HINT_CLICK_START: &str = "Click the map to select START point, then click to select END point.";
pub const HINT_CLICK_END: &str = "Start point set. Click the map to set END point.";
pub const HINT_ROUTE_SELECTED: &str = "Route selected. View details below or create a project.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    Drawing,
    ClickSelect,
    RouteSelected,
}

/// What the side panel needs to redraw.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelUpdate {
    Hint(String),
    Metrics(RouteMetrics),
    Alternatives {
        alternatives: Vec<Alternative>,
        recommended_id: Option<String>,
        source: AlternativeSource,
    },
    AlternativeSelected(Alternative),
    Cleared,
}

/// A finished background request, stamped with the selection it was issued for.
#[derive(Debug)]
pub enum Completion {
    Analysis { generation: u64, metrics: RouteMetrics },
    Recommendation { generation: u64, recommendation: Recommendation },
}

impl Completion {
    pub fn generation(&self) -> u64 {
        match self {
            Completion::Analysis { generation, .. } | Completion::Recommendation { generation, .. } => *generation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Applied,
    Discarded,
}

struct Snapshot {
    state: SelectionState,
    path: Vec<Coordinate>,
    markers: Vec<String>,
    route: Option<RoutePath>,
    metrics: Option<RouteMetrics>,
}

pub struct RouteSelectionController<M, S> {
    map: M,
    client: Arc<AnalysisClient<S>>,
    config: PlannerConfig,
    state: SelectionState,
    path: Vec<Coordinate>,
    markers: Vec<String>,
    route: Option<RoutePath>,
    metrics: Option<RouteMetrics>,
    alternatives: AlternativesStore,
    /// Alternative overlay ids currently on the map.
    rendered: Vec<String>,
    render_pending: bool,
    generation: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    subscribers: Vec<mpsc::UnboundedSender<PanelUpdate>>,
}

impl<M: MapSurface, S: AnalysisService> RouteSelectionController<M, S> {
    pub fn new(map: M, service: S, config: PlannerConfig) -> Self {
        Self::with_client(map, Arc::new(AnalysisClient::new(service)), config)
    }

    pub fn with_client(map: M, client: Arc<AnalysisClient<S>>, config: PlannerConfig) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            map,
            client,
            config,
            state: SelectionState::Idle,
            path: Vec::new(),
            markers: Vec::new(),
            route: None,
            metrics: None,
            alternatives: AlternativesStore::new(),
            rendered: Vec::new(),
            render_pending: false,
            generation: 0,
            completions_tx,
            completions_rx,
            subscribers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PanelUpdate> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    /// The finished route, once the selection reached `RouteSelected`.
    pub fn route(&self) -> Option<&RoutePath> {
        self.route.as_ref()
    }

    pub fn metrics(&self) -> Option<&RouteMetrics> {
        self.metrics.as_ref()
    }

    pub fn alternatives(&self) -> &AlternativesStore {
        &self.alternatives
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn start_drawing(&mut self) {
        self.reset_selection();
        self.state = SelectionState::Drawing;
        self.publish(PanelUpdate::Hint(HINT_DRAWING.into()));
        tracing::info!("drawing mode started (generation {})", self.generation);
    }

    pub fn start_click_select(&mut self) {
        self.reset_selection();
        self.state = SelectionState::ClickSelect;
        self.publish(PanelUpdate::Hint(HINT_CLICK_START.into()));
        tracing::info!("click-select mode started (generation {})", self.generation);
    }

    /// Valid from any state.
    pub fn clear_route(&mut self) {
        self.reset_selection();
        self.state = SelectionState::Idle;
        self.publish(PanelUpdate::Cleared);
        self.publish(PanelUpdate::Hint(HINT_IDLE.into()));
        tracing::info!("route cleared");
    }

    /// Applies one map event. On failure the error is logged, the
    /// controller's own state rolls back and markers placed by the event are
    /// taken down again. Other map writes made before the failure stay.
    pub fn handle_event(&mut self, event: MapEvent) {
        let snapshot = self.snapshot();
        let result = match event {
            MapEvent::Click(coordinate) => self.on_click(coordinate),
            MapEvent::VertexAdded(coordinate) => self.on_vertex(coordinate),
            MapEvent::DrawFinished => self.on_draw_finished(),
            MapEvent::OverlayClicked(id) => {
                self.on_overlay_clicked(&id);
                Ok(())
            }
            MapEvent::StyleReady => {
                if self.render_pending {
                    tracing::debug!("map style ready, rendering deferred alternatives");
                    self.render_alternatives();
                }
                Ok(())
            }
        };

        if let Err(err) = result {
            tracing::error!("map event failed, keeping previous state: {err}");
            self.restore(snapshot);
        }
    }

    /// Waits for the next background result and applies it unless stale.
    pub async fn next_completion(&mut self) -> Option<CompletionOutcome> {
        let completion = self.completions_rx.recv().await?;
        Some(self.apply_completion(completion))
    }

    /// Applies every result that has already arrived. Returns how many were
    /// applied (stale ones are not counted).
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            if self.apply_completion(completion) == CompletionOutcome::Applied {
                applied += 1;
            }
        }
        applied
    }

    /// Selects by id or rank text, restyles the overlays and frames the
    /// selected alternative. Unknown keys change nothing.
    pub fn select_alternative(&mut self, key: &str) -> Option<Alternative> {
        let Some(selected) = self.alternatives.select(key).cloned() else {
            tracing::warn!("no alternative matches {key:?}");
            return None;
        };

        if !self.render_pending {
            if let Err(err) = self.highlight(&selected) {
                tracing::error!("could not highlight alternative {}: {err}", selected.id);
            }
        }
        self.publish(PanelUpdate::AlternativeSelected(selected.clone()));
        Some(selected)
    }

    pub fn alternative_details(&self, key: &str) -> Option<&Alternative> {
        self.alternatives.find(key)
    }

    pub fn comparisons(&self) -> Vec<AlternativeComparison> {
        self.metrics
            .as_ref()
            .map(|metrics| self.alternatives.comparisons(metrics))
            .unwrap_or_default()
    }

    pub fn project_draft(&self, name: Option<&str>, now: DateTime<Utc>) -> Result<ProjectDraft, PlannerError> {
        let (Some(route), Some(metrics)) = (self.route.as_ref(), self.metrics.as_ref()) else {
            return Err(PlannerError::NoCompletedRoute);
        };
        let mut builder = ProjectDraftBuilder::new(route, metrics).alternative(self.alternatives.selected());
        if let Some(name) = name {
            builder = builder.name(name);
        }
        Ok(builder.build(now))
    }

    fn on_click(&mut self, coordinate: Coordinate) -> Result<(), PlannerError> {
        if self.state != SelectionState::ClickSelect {
            return Ok(());
        }
        if !coordinate.is_valid() {
            tracing::warn!("ignoring click outside lon/lat range: {coordinate:?}");
            return Ok(());
        }

        let marker_id = format!("{MARKER_PREFIX}{}", self.path.len() + 1);
        let label = if self.path.is_empty() { "Start" } else { "End" };
        self.map.upsert_point(PointOverlay {
            id: marker_id.clone(),
            coordinate,
            label: Some(label.into()),
            color: MARKER_COLOR.into(),
        })?;
        if !self.markers.contains(&marker_id) {
            self.markers.push(marker_id);
        }
        self.path.push(coordinate);

        if self.path.len() == 1 {
            self.publish(PanelUpdate::Hint(HINT_CLICK_END.into()));
            return Ok(());
        }
        self.draw_route_line();
        self.enter_route_selected()
    }

    fn on_vertex(&mut self, coordinate: Coordinate) -> Result<(), PlannerError> {
        if self.state != SelectionState::Drawing {
            return Ok(());
        }
        if !coordinate.is_valid() {
            tracing::warn!("ignoring vertex outside lon/lat range: {coordinate:?}");
            return Ok(());
        }
        self.path.push(coordinate);
        if self.path.len() >= 2 {
            self.draw_route_line();
        }
        Ok(())
    }

    fn on_draw_finished(&mut self) -> Result<(), PlannerError> {
        if self.state != SelectionState::Drawing {
            return Ok(());
        }
        self.enter_route_selected()
    }

    fn on_overlay_clicked(&mut self, overlay_id: &str) {
        let alternative_id = self
            .alternatives
            .alternative_for_overlay(overlay_id)
            .map(|alt| alt.id.clone());
        if let Some(id) = alternative_id {
            self.select_alternative(&id);
        }
    }

    /// The route line is cosmetic; failing to draw it does not abort the
    /// selection.
    fn draw_route_line(&mut self) {
        let overlay = LineOverlay {
            id: ROUTE_OVERLAY_ID.into(),
            coordinates: self.path.clone(),
            label: None,
            label_anchor: None,
            style: LineStyle::new(ROUTE_COLOR, 4.0, 0.8),
        };
        if let Err(err) = self.map.upsert_line(overlay) {
            tracing::warn!("could not draw route line: {err}");
        }
    }

    fn enter_route_selected(&mut self) -> Result<(), PlannerError> {
        let route = RoutePath::new(self.path.clone())?;
        let metrics = local_metrics(route.points())?;

        self.generation += 1;
        self.state = SelectionState::RouteSelected;
        tracing::info!(
            "route selected: {} point(s), {:.2} km (generation {})",
            route.len(),
            metrics.length_km,
            self.generation
        );

        self.metrics = Some(metrics.clone());
        self.publish(PanelUpdate::Metrics(metrics));
        self.publish(PanelUpdate::Hint(HINT_ROUTE_SELECTED.into()));
        self.spawn_analysis(&route);
        self.route = Some(route);
        Ok(())
    }

    fn spawn_analysis(&self, route: &RoutePath) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime, keeping local metrics only");
            return;
        };
        let generation = self.generation;

        let client = Arc::clone(&self.client);
        let tx = self.completions_tx.clone();
        let points = route.points().to_vec();
        runtime.spawn(async move {
            match client.analyze(&points).await {
                Ok(metrics) => {
                    if tx.send(Completion::Analysis { generation, metrics }).is_err() {
                        tracing::debug!("controller gone, dropping analysis for generation {generation}");
                    }
                }
                Err(err) => tracing::error!("route analysis failed for generation {generation}: {err}"),
            }
        });

        let client = Arc::clone(&self.client);
        let tx = self.completions_tx.clone();
        let points = route.points().to_vec();
        runtime.spawn(async move {
            match client.recommend(&points).await {
                Ok(recommendation) => {
                    let completion = Completion::Recommendation {
                        generation,
                        recommendation,
                    };
                    if tx.send(completion).is_err() {
                        tracing::debug!("controller gone, dropping alternatives for generation {generation}");
                    }
                }
                Err(err) => tracing::error!("route recommendation failed for generation {generation}: {err}"),
            }
        });
    }

    fn check_fresh(&self, issued: u64) -> Result<(), PlannerError> {
        if issued != self.generation || self.state != SelectionState::RouteSelected {
            return Err(PlannerError::StaleResult {
                issued,
                current: self.generation,
            });
        }
        Ok(())
    }

    fn apply_completion(&mut self, completion: Completion) -> CompletionOutcome {
        if let Err(err) = self.check_fresh(completion.generation()) {
            tracing::debug!("discarding background result: {err}");
            return CompletionOutcome::Discarded;
        }

        match completion {
            Completion::Analysis { metrics, .. } => {
                self.metrics = Some(metrics.clone());
                self.publish(PanelUpdate::Metrics(metrics));
            }
            Completion::Recommendation { recommendation, .. } => {
                self.apply_recommendation(recommendation);
            }
        }
        CompletionOutcome::Applied
    }

    fn apply_recommendation(&mut self, recommendation: Recommendation) {
        self.remove_alternative_overlays();
        self.alternatives.replace(recommendation.alternatives);
        self.render_alternatives();

        let update = PanelUpdate::Alternatives {
            alternatives: self.alternatives.alternatives().to_vec(),
            recommended_id: self.alternatives.recommended_id().map(str::to_string),
            source: recommendation.source,
        };
        self.publish(update);
    }

    fn render_alternatives(&mut self) {
        if !self.map.is_style_ready() {
            tracing::debug!("map style not ready, deferring {} alternative(s)", self.alternatives.len());
            self.render_pending = true;
            return;
        }
        self.render_pending = false;

        let selected_id = self.alternatives.selected_id().map(str::to_string);
        for (position, alt) in self.alternatives.alternatives().iter().enumerate() {
            let selected = selected_id.as_deref() == Some(alt.id.as_str());
            let overlay = alternative_overlay(alt, position, selected);
            let overlay_id = overlay.id.clone();
            match self.map.upsert_line(overlay) {
                Ok(()) => {
                    if !self.rendered.contains(&overlay_id) {
                        self.rendered.push(overlay_id);
                    }
                }
                Err(err) => tracing::warn!("could not render alternative {}: {err}", alt.id),
            }
        }

        if let Some(id) = selected_id {
            if let Err(err) = self.frame_selected(&id) {
                tracing::warn!("could not frame selected alternative {id}: {err}");
            }
        }
    }

    fn highlight(&mut self, selected: &Alternative) -> Result<(), PlannerError> {
        for (position, alt) in self.alternatives.alternatives().iter().enumerate() {
            let overlay = alternative_overlay(alt, position, alt.id == selected.id);
            let overlay_id = overlay.id.clone();
            self.map.upsert_line(overlay)?;
            if !self.rendered.contains(&overlay_id) {
                self.rendered.push(overlay_id);
            }
        }
        self.frame_selected(&selected.id)
    }

    /// Raises the selected overlay and fits the viewport to it.
    fn frame_selected(&mut self, id: &str) -> Result<(), PlannerError> {
        self.map.bring_to_front(&AlternativesStore::overlay_id(id))?;
        if let Some(alt) = self.alternatives.get(id) {
            let bbox = geometry::bounding_box(&alt.coordinates)?;
            self.map.fit_bounds(&bbox, self.config.fit_padding_px)?;
        }
        Ok(())
    }

    /// Ids whose removal fails are kept so the next reset retries them.
    fn remove_alternative_overlays(&mut self) {
        let map = &mut self.map;
        self.rendered.retain(|id| match map.remove_overlay(id) {
            Ok(_) => false,
            Err(err) => {
                tracing::warn!("could not remove overlay {id}: {err}");
                true
            }
        });
    }

    /// Drops everything tied to the current selection and invalidates any
    /// request still in flight for it.
    fn reset_selection(&mut self) {
        self.generation += 1;

        if let Err(err) = self.map.remove_overlay(ROUTE_OVERLAY_ID) {
            tracing::warn!("could not remove route line: {err}");
        }
        let map = &mut self.map;
        self.markers.retain(|id| match map.remove_overlay(id) {
            Ok(_) => false,
            Err(err) => {
                tracing::warn!("could not remove marker {id}: {err}");
                true
            }
        });
        self.remove_alternative_overlays();

        self.path.clear();
        self.route = None;
        self.metrics = None;
        self.alternatives.clear();
        self.render_pending = false;
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            path: self.path.clone(),
            markers: self.markers.clone(),
            route: self.route.clone(),
            metrics: self.metrics.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        for id in self.markers.iter().filter(|id| !snapshot.markers.contains(id)) {
            if let Err(err) = self.map.remove_overlay(id) {
                tracing::warn!("could not take down marker {id}: {err}");
            }
        }
        self.state = snapshot.state;
        self.path = snapshot.path;
        self.markers = snapshot.markers;
        self.route = snapshot.route;
        self.metrics = snapshot.metrics;
    }

    fn publish(&mut self, update: PanelUpdate) {
        self.subscribers.retain(|tx| tx.send(update.clone()).is_ok());
    }
}

fn alternative_overlay(alt: &Alternative, position: usize, selected: bool) -> LineOverlay {
    LineOverlay {
        id: AlternativesStore::overlay_id(&alt.id),
        coordinates: alt.coordinates.clone(),
        label: Some(alt.rank.to_string()),
        label_anchor: geometry::midpoint(&alt.coordinates).ok(),
        style: AlternativesStore::style_for(position, selected),
    }
}
