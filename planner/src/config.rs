use std::{env, time::Duration};

use crate::error::PlannerError;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8001";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
// ~50 pulse updates per second
const DEFAULT_PULSE_INTERVAL_MS: u64 = 20;
const DEFAULT_FIT_PADDING_PX: u32 = 60;

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub pulse_interval: Duration,
    pub fit_padding_px: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            pulse_interval: Duration::from_millis(DEFAULT_PULSE_INTERVAL_MS),
            fit_padding_px: DEFAULT_FIT_PADDING_PX,
        }
    }
}

impl PlannerConfig {
    /// Reads `BACKEND_API_URL`, `PLANNER_REQUEST_TIMEOUT_SECS` and
    /// `PLANNER_PULSE_INTERVAL_MS`, falling back to defaults for unset keys.
    pub fn from_env() -> Result<Self, PlannerError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PlannerError> {
        let mut config = Self::default();

        if let Some(url) = lookup("BACKEND_API_URL") {
            config = config.with_backend_url(url);
        }
        if let Some(raw) = lookup("PLANNER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(parse_u64("PLANNER_REQUEST_TIMEOUT_SECS", &raw)?);
        }
        if let Some(raw) = lookup("PLANNER_PULSE_INTERVAL_MS") {
            let millis = parse_u64("PLANNER_PULSE_INTERVAL_MS", &raw)?;
            if millis == 0 {
                return Err(PlannerError::Config(
                    "PLANNER_PULSE_INTERVAL_MS must be positive".into(),
                ));
            }
            config.pulse_interval = Duration::from_millis(millis);
        }

        Ok(config)
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.backend_url, path.trim_start_matches('/'))
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, PlannerError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| PlannerError::Config(format!("{key} must be an unsigned integer, got {raw:?}")))
}
