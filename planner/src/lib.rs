pub mod alternatives;
pub mod analysis;
pub mod config;
pub mod controller;
pub mod error;
pub mod estimate;
pub mod geometry;
pub mod map;
pub mod models;
pub mod project;
pub mod space;
pub mod traffic_lines;

pub use analysis::{AnalysisClient, AnalysisService, HttpAnalysisService};
pub use config::PlannerConfig;
pub use controller::{PanelUpdate, RouteSelectionController, SelectionState};
pub use error::PlannerError;
pub use map::{HeadlessMap, MapEvent, MapSurface};
