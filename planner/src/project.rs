//! Turns a finished selection into the draft handed to project creation.

use chrono::{DateTime, Utc};

use crate::analysis::EMISSION_G_PER_KM;
use crate::models::{Alternative, ProjectDraft, ProjectStatus, RouteMetrics, RoutePath};

pub struct ProjectDraftBuilder<'a> {
    path: &'a RoutePath,
    metrics: &'a RouteMetrics,
    alternative: Option<&'a Alternative>,
    name: Option<String>,
    status: ProjectStatus,
    end_time: Option<DateTime<Utc>>,
}

impl<'a> ProjectDraftBuilder<'a> {
    pub fn new(path: &'a RoutePath, metrics: &'a RouteMetrics) -> Self {
        Self {
            path,
            metrics,
            alternative: None,
            name: None,
            status: ProjectStatus::Planned,
            end_time: None,
        }
    }

    pub fn alternative(mut self, alternative: Option<&'a Alternative>) -> Self {
        self.alternative = alternative;
        self
    }

    /// Blank names fall back to [`default_project_name`].
    pub fn name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.trim().is_empty() {
            None
        } else {
            Some(name.trim().to_string())
        };
        self
    }

    pub fn status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    pub fn end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    pub fn build(self, start_time: DateTime<Utc>) -> ProjectDraft {
        ProjectDraft {
            name: self
                .name
                .unwrap_or_else(|| default_project_name(self.metrics)),
            status: self.status,
            start_time,
            end_time: self.end_time,
            start_coordinate: self.path.start(),
            end_coordinate: self.path.end(),
            resource_allocation_summary: resource_allocation_summary(self.metrics, self.alternative),
            emission_reduction_estimate: emission_reduction_estimate(self.metrics, self.alternative),
        }
    }
}

pub fn default_project_name(metrics: &RouteMetrics) -> String {
    format!(
        "Construction Project - {} ({:.1} km)",
        metrics.road_type, metrics.length_km
    )
}

/// Baseline emission of the drawn route minus the alternative's. Negative
/// means the alternative is worse.
pub fn emission_reduction_estimate(
    metrics: &RouteMetrics,
    alternative: Option<&Alternative>,
) -> Option<f64> {
    let alternative = alternative?;
    let baseline = metrics.length_km * EMISSION_G_PER_KM;
    Some((baseline - alternative.emission_grams).round())
}

pub fn resource_allocation_summary(metrics: &RouteMetrics, alternative: Option<&Alternative>) -> String {
    let mut summary = format!(
        "{} lanes, {:.2} km {}",
        metrics.lanes, metrics.length_km, metrics.road_type
    );
    if let Some(alt) = alternative {
        summary.push_str(" | Alt: ");
        summary.push_str(&alternative_details(alt).join(" • "));
    }
    summary
}

fn alternative_details(alt: &Alternative) -> Vec<String> {
    let mut parts = vec![
        format!("{:.2} km", alt.distance_km),
        format!("{:.0} min", alt.travel_time_min),
        format!("{:.0}g CO₂", alt.emission_grams),
    ];
    if let Some(turns) = alt.turn_count {
        parts.push(format!("{turns} turns"));
    }
    if !alt.streets.is_empty() {
        parts.push(format!("Streets: {}", alt.streets.join(", ")));
    }
    parts
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::{Coordinate, RoadType, VehicleCounts};

    fn path() -> RoutePath {
        RoutePath::new(vec![Coordinate::new(72.50, 23.00), Coordinate::new(72.54, 23.03)]).unwrap()
    }

    fn metrics(length_km: f64) -> RouteMetrics {
        RouteMetrics {
            length_km,
            point_count: 2,
            road_type: RoadType::UrbanRoad,
            road_width_m: 7.5,
            lanes: 2,
            vehicle_counts: VehicleCounts::default(),
            estimated_time_min: None,
            surface: None,
            avg_speed_kmh: None,
        }
    }

    fn alternative(emission: f64) -> Alternative {
        Alternative {
            id: "mapbox-2".into(),
            name: "Route 2".into(),
            coordinates: path().points().to_vec(),
            distance_km: 6.4,
            travel_time_min: 14.0,
            traffic_score: Some(0.4),
            emission_grams: emission,
            rank: 2,
            turn_count: None,
            streets: Vec::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap()
    }

    #[test]
    fn worse_alternative_gives_negative_reduction() {
        let m = metrics(5.0);
        let alt = alternative(800.0);
        assert_eq!(emission_reduction_estimate(&m, Some(&alt)), Some(-200.0));
    }

    #[test]
    fn no_alternative_means_no_estimate() {
        assert_eq!(emission_reduction_estimate(&metrics(5.0), None), None);
    }

    #[test]
    fn summary_without_alternative() {
        assert_eq!(
            resource_allocation_summary(&metrics(1.5), None),
            "2 lanes, 1.50 km Urban Road"
        );
    }

    #[test]
    fn summary_omits_absent_fields() {
        let summary = resource_allocation_summary(&metrics(5.0), Some(&alternative(768.0)));
        assert_eq!(
            summary,
            "2 lanes, 5.00 km Urban Road | Alt: 6.40 km • 14 min • 768g CO₂"
        );
        assert!(!summary.contains("turns"));
        assert!(!summary.contains("Streets"));
    }

    #[test]
    fn summary_includes_turns_and_streets() {
        let mut alt = alternative(768.0);
        alt.turn_count = Some(7);
        alt.streets = vec!["primary".into(), "secondary".into()];
        let summary = resource_allocation_summary(&metrics(5.0), Some(&alt));
        assert!(summary.ends_with("• 7 turns • Streets: primary, secondary"));
    }

    #[test]
    fn builder_fills_defaults() {
        let p = path();
        let m = metrics(4.97);
        let draft = ProjectDraftBuilder::new(&p, &m).name("   ").build(now());
        assert_eq!(draft.name, "Construction Project - Urban Road (5.0 km)");
        assert_eq!(draft.status, ProjectStatus::Planned);
        assert_eq!(draft.start_coordinate, p.start());
        assert_eq!(draft.end_coordinate, p.end());
        assert_eq!(draft.emission_reduction_estimate, None);
        assert_eq!(draft.end_time, None);
    }

    #[test]
    fn draft_serializes_null_estimate() {
        let p = path();
        let m = metrics(2.0);
        let draft = ProjectDraftBuilder::new(&p, &m)
            .name("Relaying CG Road")
            .build(now());
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["name"], "Relaying CG Road");
        assert_eq!(json["status"], "planned");
        assert!(json["emissionReductionEstimate"].is_null());
        assert_eq!(json["startCoordinate"]["lon"], 72.5);
    }

    #[test]
    fn status_and_end_time_reach_the_json() {
        let p = path();
        let m = metrics(2.0);
        let end = Utc.with_ymd_and_hms(2026, 12, 1, 18, 0, 0).unwrap();
        let draft = ProjectDraftBuilder::new(&p, &m)
            .status(ProjectStatus::Active)
            .end_time(end)
            .build(now());
        assert_eq!(draft.status, ProjectStatus::Active);
        assert_eq!(draft.end_time, Some(end));

        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["endTime"], "2026-12-01T18:00:00Z");
        assert_eq!(json["startTime"], "2026-10-16T09:00:00Z");
    }
}
