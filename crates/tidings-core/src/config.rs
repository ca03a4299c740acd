use std::time::Duration;

use crate::error::AppError;

/// Browser-like identification sent with every plain fetch.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

/// Timing and sizing knobs for the harvest pipeline.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Time between cycle starts.
    pub poll_interval: Duration,
    /// Bound on each plain HTTP fetch.
    pub fetch_timeout: Duration,
    /// Bound on waiting for a rendered page's marker element.
    pub render_timeout: Duration,
    pub user_agent: String,
    pub cbs_limit: usize,
    pub cnn_limit: usize,
    /// Read API default when the caller gives no limit.
    pub read_limit: usize,
    /// Read API ceiling.
    pub max_read_limit: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(5),
            render_timeout: Duration::from_secs(10),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cbs_limit: 15,
            cnn_limit: 30,
            read_limit: 50,
            max_read_limit: 200,
        }
    }
}

impl HarvestConfig {
    /// Read overrides from environment variables.
    ///
    /// - `TIDINGS_POLL_INTERVAL_SECS` (default 60)
    /// - `TIDINGS_FETCH_TIMEOUT_SECS` (default 5)
    /// - `TIDINGS_RENDER_TIMEOUT_SECS` (default 10)
    /// - `TIDINGS_USER_AGENT`
    /// - `TIDINGS_READ_LIMIT` (default 50)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let mut config = Self::default();

        if let Some(secs) = positive(&lookup, "TIDINGS_POLL_INTERVAL_SECS")? {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = positive(&lookup, "TIDINGS_FETCH_TIMEOUT_SECS")? {
            config.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = positive(&lookup, "TIDINGS_RENDER_TIMEOUT_SECS")? {
            config.render_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = positive(&lookup, "TIDINGS_READ_LIMIT")? {
            config.read_limit = (limit as usize).min(config.max_read_limit);
        }
        if let Some(agent) = lookup("TIDINGS_USER_AGENT").filter(|a| !a.trim().is_empty()) {
            config.user_agent = agent;
        }

        Ok(config)
    }

    /// Clamp a caller-supplied read limit into `[1, max_read_limit]`.
    pub fn read_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.read_limit)
            .clamp(1, self.max_read_limit)
    }
}

fn positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>, AppError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(AppError::ConfigError(format!("{key} must be at least 1"))),
        Ok(value) => Ok(Some(value)),
        Err(_) => Err(AppError::ConfigError(format!(
            "Invalid {key} '{raw}': must be a positive integer"
        ))),
    }
}
