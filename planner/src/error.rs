use thiserror::Error;

use crate::map::MapError;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("route path needs at least 2 points, got {points}")]
    InvalidPath { points: usize },
    #[error("analysis service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("analysis service answered {status} on {endpoint}")]
    Status {
        endpoint: &'static str,
        status: reqwest::StatusCode,
    },
    #[error("malformed analysis response: {0}")]
    Decode(String),
    #[error("result for selection {issued} arrived after selection {current} started")]
    StaleResult { issued: u64, current: u64 },
    #[error("Please draw a route on the map first.")]
    NoCompletedRoute,
    #[error("map surface error: {0}")]
    Map(#[from] MapError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("bounding box size must be greater than 0, got {0}")]
    InvalidBoundingBoxSize(f64),
}

impl From<serde_json::Error> for PlannerError {
    fn from(err: serde_json::Error) -> Self {
        PlannerError::Decode(err.to_string())
    }
}
