//! Client side of the route analysis service.
//!
//! Both calls degrade to a local answer: `analyze` falls back to the
//! length-based estimate and `recommend` to three perturbed copies of the
//! drawn path. Transport problems are logged and never reach the caller.

use std::collections::HashSet;
use std::future::Future;

use rand::Rng;
use serde::de::DeserializeOwned;
use shared::{ApiError, RecommendResponse, RecommendedRoute, RouteAnalysisResponse, RouteAnalyzeRequest};

use crate::config::PlannerConfig;
use crate::error::PlannerError;
use crate::estimate::local_metrics;
use crate::geometry;
use crate::models::{Alternative, Coordinate, RoadType, RouteMetrics};

pub const ANALYZE_ENDPOINT: &str = "routes/analyze";
pub const RECOMMEND_ENDPOINT: &str = "routes/recommend";

/// Grams of CO₂ per km for an average vehicle.
pub const EMISSION_G_PER_KM: f64 = 120.0;
const MINUTES_PER_KM: f64 = 2.0;
const MOCK_ALTERNATIVES: usize = 3;
const MAX_MOCK_JITTER_DEG: f64 = 0.0005;

/// Transport to the analysis service.
///
/// Implementations only move bytes; fallback policy lives in
/// [`AnalysisClient`]. Tests substitute in-memory services here.
pub trait AnalysisService: Send + Sync + 'static {
    fn analyze(
        &self,
        req: &RouteAnalyzeRequest,
    ) -> impl Future<Output = Result<RouteAnalysisResponse, PlannerError>> + Send;

    fn recommend(
        &self,
        req: &RouteAnalyzeRequest,
    ) -> impl Future<Output = Result<RecommendResponse, PlannerError>> + Send;
}

pub struct HttpAnalysisService {
    client: reqwest::Client,
    config: PlannerConfig,
}

impl HttpAnalysisService {
    pub fn new(config: PlannerConfig) -> Result<Self, PlannerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        req: &RouteAnalyzeRequest,
    ) -> Result<T, PlannerError> {
        let url = self.config.endpoint(endpoint);
        tracing::debug!("POST {url} with {} waypoint(s)", req.waypoints.len());

        let response = self.client.post(&url).json(req).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            if let Ok(api_error) = serde_json::from_slice::<ApiError>(&body) {
                tracing::debug!("{endpoint} rejected the request: {}", api_error.message);
            }
            return Err(PlannerError::Status { endpoint, status });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl AnalysisService for HttpAnalysisService {
    async fn analyze(&self, req: &RouteAnalyzeRequest) -> Result<RouteAnalysisResponse, PlannerError> {
        self.post(ANALYZE_ENDPOINT, req).await
    }

    async fn recommend(&self, req: &RouteAnalyzeRequest) -> Result<RecommendResponse, PlannerError> {
        self.post(RECOMMEND_ENDPOINT, req).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlternativeSource {
    Service,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub alternatives: Vec<Alternative>,
    pub source: AlternativeSource,
}

pub struct AnalysisClient<S> {
    service: S,
}

impl<S: AnalysisService> AnalysisClient<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Local estimate, overlaid field by field with whatever the service
    /// returned. Only an invalid path is an error.
    pub async fn analyze(&self, path: &[Coordinate]) -> Result<RouteMetrics, PlannerError> {
        let local = local_metrics(path)?;
        let req = analyze_request(path)?;

        match self.service.analyze(&req).await {
            Ok(response) => {
                tracing::debug!("route analysis received from service");
                Ok(overlay_analysis(local, &response))
            }
            Err(err) => {
                tracing::warn!("route analysis unavailable, keeping local estimate: {err}");
                Ok(local)
            }
        }
    }

    pub async fn recommend(&self, path: &[Coordinate]) -> Result<Recommendation, PlannerError> {
        let req = analyze_request(path)?;

        match self.service.recommend(&req).await {
            Ok(response) => {
                let alternatives = alternatives_from_response(response);
                tracing::info!("{} alternative(s) received from service", alternatives.len());
                Ok(Recommendation {
                    alternatives,
                    source: AlternativeSource::Service,
                })
            }
            Err(err) => {
                tracing::warn!("route recommendation unavailable, generating mock alternatives: {err}");
                let alternatives = mock_alternatives(path, &mut rand::thread_rng())?;
                Ok(Recommendation {
                    alternatives,
                    source: AlternativeSource::Fallback,
                })
            }
        }
    }
}

fn analyze_request(path: &[Coordinate]) -> Result<RouteAnalyzeRequest, PlannerError> {
    RouteAnalyzeRequest::from_path(path).ok_or(PlannerError::InvalidPath {
        points: path.len(),
    })
}

/// Every field present in `response` wins over the local estimate.
pub fn overlay_analysis(mut metrics: RouteMetrics, response: &RouteAnalysisResponse) -> RouteMetrics {
    if let Some(distance) = response.distance_km {
        metrics.length_km = distance;
    }
    if let Some(minutes) = response.estimated_time_min {
        metrics.estimated_time_min = Some(minutes);
    }

    if let Some(props) = &response.road_properties {
        if let Some(label) = &props.road_type {
            match RoadType::from_label(label) {
                Some(road_type) => metrics.road_type = road_type,
                None => tracing::warn!("unknown road type {label:?} from service, keeping estimate"),
            }
        }
        if let Some(width) = props.road_width_m {
            metrics.road_width_m = width;
        }
        if let Some(lanes) = props.lanes {
            metrics.lanes = lanes;
        }
        if let Some(surface) = &props.surface_type {
            metrics.surface = Some(surface.clone());
        }
    }

    if let Some(counts) = &response.traffic_counts {
        let vehicles = &mut metrics.vehicle_counts;
        if let Some(total) = counts.total_vehicles {
            vehicles.total = total;
        }
        if let Some(n) = counts.two_wheeler {
            vehicles.two_wheeler = n;
        }
        if let Some(n) = counts.four_wheeler {
            vehicles.four_wheeler = n;
        }
        if let Some(n) = counts.heavy_vehicle {
            vehicles.heavy = n;
        }
        if let Some(speed) = counts.avg_speed_kmh {
            metrics.avg_speed_kmh = Some(speed);
        }
    }

    metrics
}

/// Maps service routes into alternatives ordered by rank. Routes without a
/// usable geometry are dropped; a repeated id gets the list position appended.
pub fn alternatives_from_response(response: RecommendResponse) -> Vec<Alternative> {
    let mut seen = HashSet::new();
    let mut alternatives: Vec<Alternative> = response
        .routes
        .into_iter()
        .enumerate()
        .filter_map(|(idx, route)| alternative_from_route(idx, route))
        .map(|mut alt| {
            if !seen.insert(alt.id.clone()) {
                let unique = format!("{}-{}", alt.id, seen.len() + 1);
                tracing::warn!("duplicate route id {:?} from service, using {unique:?}", alt.id);
                alt.id = unique.clone();
                seen.insert(unique);
            }
            alt
        })
        .collect();
    alternatives.sort_by_key(|alt| alt.rank);
    alternatives
}

fn alternative_from_route(idx: usize, route: RecommendedRoute) -> Option<Alternative> {
    let coordinates: Vec<Coordinate> = route.coordinates.into_iter().map(Coordinate::from).collect();
    let geodesic = match geometry::length_km(&coordinates) {
        Ok(km) => km,
        Err(err) => {
            tracing::warn!("dropping recommended route #{}: {err}", idx + 1);
            return None;
        }
    };

    let distance_km = route.distance_km.unwrap_or(geodesic);
    Some(Alternative {
        id: route.id.unwrap_or_else(|| format!("alt-{}", idx + 1)),
        name: route.name.unwrap_or_else(|| format!("Alt {}", idx + 1)),
        coordinates,
        distance_km,
        travel_time_min: route
            .travel_time_min
            .unwrap_or_else(|| (distance_km * MINUTES_PER_KM).round()),
        traffic_score: route.traffic_score.and_then(|score| {
            if score.is_nan() {
                tracing::warn!("route #{} has a NaN traffic score, ignoring it", idx + 1);
                return None;
            }
            if !(0.0..=1.0).contains(&score) {
                tracing::warn!("route #{} traffic score {score} outside [0, 1], clamping", idx + 1);
            }
            Some(score.clamp(0.0, 1.0))
        }),
        emission_grams: route
            .emission_g
            .unwrap_or_else(|| (distance_km * EMISSION_G_PER_KM).round()),
        rank: match route.rank {
            Some(0) => {
                tracing::warn!("route #{} has rank 0, using its list position", idx + 1);
                idx as u32 + 1
            }
            Some(rank) => rank,
            None => idx as u32 + 1,
        },
        turn_count: route.turn_count,
        streets: route.road_classes,
    })
}

/// Three jittered copies of `path`, ranked 1..=3.
///
/// Copy `i` moves every vertex by `(i - 1) * U[0, 0.0005]` degrees on each
/// axis, so the middle copy keeps the drawn geometry.
pub fn mock_alternatives(path: &[Coordinate], rng: &mut impl Rng) -> Result<Vec<Alternative>, PlannerError> {
    geometry::length_km(path)?;

    (0..MOCK_ALTERNATIVES)
        .map(|i| {
            let lane = i as f64 - 1.0;
            let coordinates: Vec<Coordinate> = path
                .iter()
                .map(|c| {
                    let d_lon = lane * rng.gen_range(0.0..=MAX_MOCK_JITTER_DEG);
                    let d_lat = lane * rng.gen_range(0.0..=MAX_MOCK_JITTER_DEG);
                    c.offset(d_lon, d_lat)
                })
                .collect();
            let distance_km = geometry::length_km(&coordinates)?;
            Ok(Alternative {
                id: format!("mock-{}", i + 1),
                name: format!("Alt {}", i + 1),
                coordinates,
                distance_km,
                travel_time_min: (distance_km * MINUTES_PER_KM).round(),
                traffic_score: Some(rng.gen::<f64>()),
                emission_grams: (rng.gen::<f64>() * 1000.0).round(),
                rank: i as u32 + 1,
                turn_count: None,
                streets: Vec::new(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rand::{SeedableRng, rngs::StdRng};
    use shared::{RoadPropertiesPayload, TrafficCountsPayload};

    use super::*;

    fn sample_path() -> Vec<Coordinate> {
        vec![
            Coordinate::new(72.50, 23.00),
            Coordinate::new(72.505, 23.006),
            Coordinate::new(72.51, 23.01),
        ]
    }

    struct FailingService {
        calls: AtomicUsize,
    }

    impl AnalysisService for FailingService {
        async fn analyze(&self, _: &RouteAnalyzeRequest) -> Result<RouteAnalysisResponse, PlannerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PlannerError::Status {
                endpoint: ANALYZE_ENDPOINT,
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            })
        }

        async fn recommend(&self, _: &RouteAnalyzeRequest) -> Result<RecommendResponse, PlannerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PlannerError::Decode("expected value at line 1 column 1".into()))
        }
    }

    struct FixedService {
        analysis: RouteAnalysisResponse,
        routes: Vec<RecommendedRoute>,
    }

    impl AnalysisService for FixedService {
        async fn analyze(&self, _: &RouteAnalyzeRequest) -> Result<RouteAnalysisResponse, PlannerError> {
            Ok(self.analysis.clone())
        }

        async fn recommend(&self, _: &RouteAnalyzeRequest) -> Result<RecommendResponse, PlannerError> {
            Ok(RecommendResponse {
                routes: self.routes.clone(),
            })
        }
    }

    #[test]
    fn overlay_is_per_field() {
        let local = local_metrics(&sample_path()).unwrap();
        let response = RouteAnalysisResponse {
            distance_km: Some(12.5),
            road_properties: Some(RoadPropertiesPayload {
                lanes: Some(6),
                ..Default::default()
            }),
            traffic_counts: Some(TrafficCountsPayload {
                heavy_vehicle: Some(42),
                ..Default::default()
            }),
            ..Default::default()
        };

        let merged = overlay_analysis(local.clone(), &response);
        assert_eq!(merged.length_km, 12.5);
        assert_eq!(merged.lanes, 6);
        // untouched fields keep the local estimate
        assert_eq!(merged.road_type, local.road_type);
        assert_eq!(merged.road_width_m, local.road_width_m);
        assert_eq!(merged.vehicle_counts.heavy, 42);
        assert_eq!(merged.vehicle_counts.total, local.vehicle_counts.total);
    }

    #[test]
    fn overlay_ignores_unknown_road_type() {
        let local = local_metrics(&sample_path()).unwrap();
        let response = RouteAnalysisResponse {
            road_properties: Some(RoadPropertiesPayload {
                road_type: Some("Expressway".into()),
                road_width_m: Some(14.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = overlay_analysis(local.clone(), &response);
        assert_eq!(merged.road_type, local.road_type);
        assert_eq!(merged.road_width_m, 14.0);
    }

    #[test]
    fn missing_numbers_are_derived_from_distance() {
        let response = RecommendResponse {
            routes: vec![RecommendedRoute {
                id: Some("r-1".into()),
                coordinates: vec![[72.50, 23.00], [72.51, 23.01]],
                distance_km: Some(5.0),
                ..Default::default()
            }],
        };
        let alts = alternatives_from_response(response);
        assert_eq!(alts.len(), 1);
        assert_eq!(alts[0].travel_time_min, 10.0);
        assert_eq!(alts[0].emission_grams, 600.0);
        assert_eq!(alts[0].traffic_score, None);
        assert_eq!(alts[0].rank, 1);
        assert_eq!(alts[0].name, "Alt 1");
    }

    #[test]
    fn out_of_range_route_fields_are_repaired() {
        let line = vec![[72.50, 23.00], [72.51, 23.01]];
        let response = RecommendResponse {
            routes: vec![
                RecommendedRoute {
                    id: Some("r".into()),
                    coordinates: line.clone(),
                    rank: Some(0),
                    traffic_score: Some(1.7),
                    ..Default::default()
                },
                RecommendedRoute {
                    id: Some("r".into()),
                    coordinates: line.clone(),
                    rank: Some(2),
                    traffic_score: Some(-0.2),
                    ..Default::default()
                },
                RecommendedRoute {
                    coordinates: line,
                    rank: Some(3),
                    traffic_score: Some(f64::NAN),
                    ..Default::default()
                },
            ],
        };
        let alts = alternatives_from_response(response);
        assert_eq!(alts.iter().map(|a| a.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(alts[0].traffic_score, Some(1.0));
        assert_eq!(alts[1].traffic_score, Some(0.0));
        assert_eq!(alts[2].traffic_score, None);

        let ids: HashSet<&str> = alts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(alts[0].id, "r");
    }

    #[test]
    fn routes_sorted_by_rank_and_degenerate_dropped() {
        let route = |id: &str, rank: u32, coords: Vec<[f64; 2]>| RecommendedRoute {
            id: Some(id.into()),
            coordinates: coords,
            rank: Some(rank),
            ..Default::default()
        };
        let line = vec![[72.50, 23.00], [72.51, 23.01]];
        let response = RecommendResponse {
            routes: vec![
                route("b", 2, line.clone()),
                route("broken", 3, vec![[72.5, 23.0]]),
                route("a", 1, line),
            ],
        };
        let ids: Vec<String> = alternatives_from_response(response)
            .into_iter()
            .map(|alt| alt.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn mock_alternatives_have_fixed_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let path = sample_path();
        let alts = mock_alternatives(&path, &mut rng).unwrap();
        assert_eq!(alts.len(), 3);
        assert_eq!(alts.iter().map(|a| a.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        for alt in &alts {
            assert_eq!(alt.coordinates.len(), path.len());
            assert!(alt.id.starts_with("mock-"));
        }
        // middle lane is not shifted
        assert_eq!(alts[1].coordinates, path);
    }

    #[test]
    fn mock_alternatives_reject_short_path() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(mock_alternatives(&[Coordinate::new(1.0, 1.0)], &mut rng).is_err());
    }

    #[tokio::test]
    async fn failed_analysis_returns_local_estimate() {
        let client = AnalysisClient::new(FailingService {
            calls: AtomicUsize::new(0),
        });
        let path = sample_path();
        let metrics = client.analyze(&path).await.unwrap();
        assert_eq!(metrics, local_metrics(&path).unwrap());
        assert_eq!(client.service().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_recommend_always_yields_three_ranked() {
        let client = AnalysisClient::new(FailingService {
            calls: AtomicUsize::new(0),
        });
        for _ in 0..5 {
            let rec = client.recommend(&sample_path()).await.unwrap();
            assert_eq!(rec.source, AlternativeSource::Fallback);
            let ranks: Vec<u32> = rec.alternatives.iter().map(|a| a.rank).collect();
            assert_eq!(ranks, vec![1, 2, 3]);
        }
    }

    #[tokio::test]
    async fn invalid_path_is_rejected_before_any_request() {
        let client = AnalysisClient::new(FailingService {
            calls: AtomicUsize::new(0),
        });
        let single = [Coordinate::new(72.5, 23.0)];
        assert!(matches!(
            client.analyze(&single).await,
            Err(PlannerError::InvalidPath { points: 1 })
        ));
        assert!(client.recommend(&single).await.is_err());
        assert_eq!(client.service().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_recommend_uses_service_routes() {
        let client = AnalysisClient::new(FixedService {
            analysis: RouteAnalysisResponse::default(),
            routes: vec![RecommendedRoute {
                id: Some("mapbox-1".into()),
                name: Some("Main Route".into()),
                coordinates: vec![[72.50, 23.00], [72.52, 23.02]],
                distance_km: Some(3.1),
                travel_time_min: Some(9.0),
                traffic_score: Some(0.25),
                emission_g: Some(372.0),
                rank: Some(1),
                turn_count: Some(4),
                road_classes: vec!["SG Highway".into()],
            }],
        });
        let rec = client.recommend(&sample_path()).await.unwrap();
        assert_eq!(rec.source, AlternativeSource::Service);
        assert_eq!(rec.alternatives.len(), 1);
        let alt = &rec.alternatives[0];
        assert_eq!(alt.id, "mapbox-1");
        assert_eq!(alt.turn_count, Some(4));
        assert_eq!(alt.streets, vec!["SG Highway".to_string()]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_mock_structure_independent_of_randomness(
                seed in any::<u64>(),
                n in 2usize..20
            ) {
                let path: Vec<Coordinate> = (0..n)
                    .map(|i| Coordinate::new(72.5 + i as f64 * 0.001, 23.0 + i as f64 * 0.001))
                    .collect();
                let alts = mock_alternatives(&path, &mut StdRng::seed_from_u64(seed)).unwrap();
                prop_assert_eq!(alts.len(), 3);
                for (i, alt) in alts.iter().enumerate() {
                    prop_assert_eq!(alt.rank, i as u32 + 1);
                    prop_assert_eq!(alt.coordinates.len(), n);
                    prop_assert!(alt.distance_km >= 0.0);
                }
            }
        }
    }
}
