use std::path::PathBuf;

use crate::history::DEFAULT_MAX_ROWS;
use crate::normalize::ConvergencePolicy;
use crate::notify::DEFAULT_TTL_MS;
use crate::retry::RetryConfig;

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the optimizer service (`/api/run/...`).
    pub backend_url: String,
    /// Base URL the page fragments and results snapshot are served from.
    pub ui_base_url: String,
    /// Read fragments from `{dir}/components/` instead of over HTTP.
    pub fragment_dir: Option<PathBuf>,
    pub results_path: String,
    pub listen_addr: String,
    pub max_table_rows: usize,
    pub convergence_fraction: f64,
    pub notify_ttl_ms: u64,
    pub http_timeout_secs: u64,
    pub retry_max: u32,
    pub retry_base_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            ui_base_url: "http://127.0.0.1:8000".to_string(),
            fragment_dir: None,
            results_path: "assets/results.json".to_string(),
            listen_addr: "127.0.0.1:8765".to_string(),
            max_table_rows: DEFAULT_MAX_ROWS,
            convergence_fraction: ConvergencePolicy::DEFAULT_FRACTION,
            notify_ttl_ms: DEFAULT_TTL_MS,
            http_timeout_secs: 120,
            retry_max: 3,
            retry_base_ms: 100,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        let backend_url = std::env::var("BACKEND_URL").unwrap_or(d.backend_url);
        Self {
            ui_base_url: std::env::var("UI_BASE_URL").unwrap_or_else(|_| backend_url.clone()),
            backend_url,
            fragment_dir: std::env::var("FRAGMENT_DIR").ok().map(PathBuf::from),
            results_path: std::env::var("RESULTS_PATH").unwrap_or(d.results_path),
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(d.listen_addr),
            max_table_rows: std::env::var("MAX_TABLE_ROWS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.max_table_rows),
            convergence_fraction: std::env::var("CONVERGENCE_FRACTION")
                .ok()
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|f| f.is_finite() && *f > 0.0 && *f <= 1.0)
                .unwrap_or(d.convergence_fraction),
            notify_ttl_ms: std::env::var("NOTIFY_TTL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.notify_ttl_ms),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.http_timeout_secs),
            retry_max: std::env::var("RETRY_MAX").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_max),
            retry_base_ms: std::env::var("RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_base_ms),
        }
    }

    pub fn convergence_policy(&self) -> ConvergencePolicy {
        ConvergencePolicy::new(self.convergence_fraction)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_max,
            base_delay_ms: self.retry_base_ms,
            ..Default::default()
        }
    }
}
