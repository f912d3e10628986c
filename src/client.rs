//! Calls to the optimizer service.

use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use crate::config::Config;
use crate::error::DashError;
use crate::logging::{self, v_str, Domain, ProfileScope};
use crate::normalize::{normalize_comparison, normalize_result, payload_error, AlgorithmResult, ComparisonResult};
use crate::params::RunParams;
use crate::retry::{retry_async, RetryConfig};

/// Result of one optimization run. A failed run never masquerades as a
/// zero-accuracy result.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(AlgorithmResult),
    Failed(String),
}

/// Join `path` onto `base`, treating `base` as a directory.
pub fn endpoint(base: &str, path: &str) -> Result<Url, DashError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    Ok(base.join(path.trim_start_matches('/'))?)
}

#[derive(Clone)]
pub struct OptimizerClient {
    client: Client,
    backend_url: String,
    ui_base_url: String,
    results_path: String,
    retry: RetryConfig,
}

impl OptimizerClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.http_timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            backend_url: config.backend_url.clone(),
            ui_base_url: config.ui_base_url.clone(),
            results_path: config.results_path.clone(),
            retry: config.retry_config(),
        }
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, DashError> {
        let url = endpoint(&self.backend_url, path)?;
        let resp = self.client.post(url).json(body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DashError::Http { status: status.as_u16() });
        }
        let payload: Value = resp.json().await?;
        if let Some(message) = payload_error(&payload) {
            return Err(DashError::Backend(message));
        }
        Ok(payload)
    }

    /// Run one optimizer. Runs are not idempotent and are never retried.
    pub async fn run(&self, params: &RunParams) -> RunOutcome {
        let algorithm = params.algorithm();
        let _scope = ProfileScope::with_context("client.run", &[("algorithm", v_str(algorithm.id()))]);
        logging::info(
            Domain::Client,
            "run_start",
            &[("algorithm", v_str(algorithm.id())), ("params", params.to_body())],
        );

        let path = format!("api/run/{}", algorithm.id());
        match self.post_json(&path, &params.to_body()).await {
            Ok(payload) => {
                let result = normalize_result(&payload);
                logging::info(
                    Domain::Client,
                    "run_complete",
                    &[
                        ("algorithm", v_str(algorithm.id())),
                        ("accuracy", json!(result.accuracy())),
                        ("iterations", json!(result.accuracy_history.len())),
                    ],
                );
                RunOutcome::Completed(result)
            }
            Err(err) => {
                logging::error(
                    Domain::Client,
                    "run_failed",
                    &[("algorithm", v_str(algorithm.id())), ("error", v_str(&err.to_string()))],
                );
                RunOutcome::Failed(err.to_string())
            }
        }
    }

    /// Run every optimizer with service defaults.
    pub async fn run_all(&self) -> Result<ComparisonResult, DashError> {
        let _scope = ProfileScope::new("client.run_all");
        let body = json!({"ga": {}, "pso": {}, "aco": {}, "tabu": {}});
        let payload = self.post_json("api/run/all", &body).await?;
        let comparison = normalize_comparison(&payload);
        logging::info(
            Domain::Client,
            "run_all_complete",
            &[
                ("algorithms", json!(comparison.algorithms.len())),
                ("best", json!(comparison.best().map(|(a, _)| a.id()))),
            ],
        );
        Ok(comparison)
    }

    /// Fetch the static snapshot of the last comparison, retrying transient failures.
    pub async fn fetch_results(&self) -> Result<ComparisonResult, DashError> {
        let url = endpoint(&self.ui_base_url, &self.results_path)?;
        let payload = retry_async(&self.retry, "fetch_results", || {
            let url = url.clone();
            async move {
                let resp = self.client.get(url).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(DashError::Http { status: status.as_u16() });
                }
                Ok(resp.json::<Value>().await?)
            }
        })
        .await?;
        Ok(normalize_comparison(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_treats_base_as_directory() {
        assert_eq!(
            endpoint("http://localhost:8000", "api/run/ga").unwrap().as_str(),
            "http://localhost:8000/api/run/ga"
        );
        assert_eq!(
            endpoint("http://localhost:8000/ui", "/components/home.html").unwrap().as_str(),
            "http://localhost:8000/ui/components/home.html"
        );
        assert_eq!(
            endpoint("http://localhost:8000/ui/", "assets/results.json").unwrap().as_str(),
            "http://localhost:8000/ui/assets/results.json"
        );
    }

    #[test]
    fn bad_base_url_is_a_transport_error() {
        let err = endpoint("not a url", "x").unwrap_err();
        assert!(matches!(err, DashError::Transport(_)));
    }

    #[tokio::test]
    async fn unreachable_service_fails_the_run() {
        let config = Config {
            backend_url: "http://127.0.0.1:9".to_string(),
            http_timeout_secs: 2,
            ..Config::default()
        };
        let client = OptimizerClient::new(&config);
        let outcome = client.run(&RunParams::defaults(crate::algorithm::Algorithm::Aco)).await;
        assert!(matches!(outcome, RunOutcome::Failed(_)));
    }
}
