use std::time::Duration;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use planner::models::Coordinate;
use planner::{HeadlessMap, HttpAnalysisService, MapEvent, PlannerConfig, PlannerError, RouteSelectionController, SelectionState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Free-hand: every point is a vertex
    Draw,
    /// First and last point only
    Click,
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Select a construction route, fetch alternatives and print the project draft"
)]
struct Args {
    /// Base URL of the analysis service (overrides BACKEND_API_URL)
    #[arg(long)]
    backend_url: Option<String>,

    /// Route as "lon,lat;lon,lat;..."
    #[arg(long)]
    path: String,

    #[arg(long, value_enum, default_value_t = Mode::Click)]
    mode: Mode,

    /// Alternative to select, by id or rank
    #[arg(long)]
    select: Option<String>,

    /// Project name; defaults to one derived from the route
    #[arg(long)]
    name: Option<String>,

    /// How long to wait for the analysis service
    #[arg(long, default_value_t = 3_000)]
    wait_ms: u64,
}

fn parse_path(raw: &str) -> Result<Vec<Coordinate>, String> {
    raw.split(';')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (lon, lat) = pair
                .split_once(',')
                .ok_or_else(|| format!("expected lon,lat but got {pair:?}"))?;
            let lon: f64 = lon.trim().parse().map_err(|err| format!("bad longitude {lon:?}: {err}"))?;
            let lat: f64 = lat.trim().parse().map_err(|err| format!("bad latitude {lat:?}: {err}"))?;
            Ok(Coordinate::new(lon, lat))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "planner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = PlannerConfig::from_env()?;
    if let Some(url) = &args.backend_url {
        config = config.with_backend_url(url.as_str());
    }
    let points = parse_path(&args.path)?;
    tracing::info!("{} point(s) against {}", points.len(), config.backend_url);

    let service = HttpAnalysisService::new(config.clone())?;
    let mut controller = RouteSelectionController::new(HeadlessMap::new(), service, config);

    match args.mode {
        Mode::Draw => {
            controller.start_drawing();
            for &point in &points {
                controller.handle_event(MapEvent::VertexAdded(point));
            }
            controller.handle_event(MapEvent::DrawFinished);
        }
        Mode::Click => {
            if points.len() > 2 {
                tracing::warn!("click mode uses only the first and last of {} points", points.len());
            }
            controller.start_click_select();
            for point in [points.first(), points.last()].into_iter().flatten() {
                controller.handle_event(MapEvent::Click(*point));
            }
        }
    }
    if controller.state() != SelectionState::RouteSelected {
        return Err(PlannerError::NoCompletedRoute.into());
    }

    let mut outstanding = 2;
    let waited = tokio::time::timeout(Duration::from_millis(args.wait_ms), async {
        while outstanding > 0 {
            if controller.next_completion().await.is_none() {
                break;
            }
            outstanding -= 1;
        }
    })
    .await;
    if waited.is_err() {
        tracing::warn!("gave up waiting for {outstanding} analysis result(s) after {} ms", args.wait_ms);
    }

    for cmp in controller.comparisons() {
        tracing::info!(
            "alternative #{} ({}): {:+.2} km, {:+.0} g CO₂, {:.0} min",
            cmp.rank,
            cmp.id,
            cmp.distance_delta_km,
            cmp.emission_delta_grams,
            cmp.travel_time_min
        );
    }
    if let Some(key) = &args.select {
        if controller.select_alternative(key).is_none() {
            tracing::warn!("alternative {key:?} not found, drafting without one");
        }
    }

    let draft = controller.project_draft(args.name.as_deref(), Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&draft)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_semicolon_separated_pairs() {
        let points = parse_path("72.5714,23.0225; 72.58,23.03;").unwrap();
        assert_eq!(points, vec![Coordinate::new(72.5714, 23.0225), Coordinate::new(72.58, 23.03)]);
        assert!(parse_path("72.5714;23.0225").is_err());
        assert!(parse_path("east,23.0").is_err());
    }
}
