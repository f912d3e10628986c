use serde_json::json;

use crate::algorithm::Algorithm;
use crate::chart::{comparison_bar_chart, convergence_chart, BarMetric, ChartRegistry};
use crate::error::DashError;
use crate::history::IterationTable;
use crate::logging::{self, Domain};
use crate::normalize::ComparisonResult;
use crate::pages::{PageController, RenderOptions};
use crate::render;
use crate::router::Page;

pub const ACCURACY_CHART: &str = "accuracy-chart-container";
pub const TIME_CHART: &str = "time-chart-container";
pub const CONVERGENCE_CHART: &str = "convergence-chart-container";

/// Side-by-side view of every optimizer.
#[derive(Debug, Default)]
pub struct ComparePage {
    comparison: Option<ComparisonResult>,
    last_failure: Option<String>,
    charts: ChartRegistry,
}

impl ComparePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comparison(&self) -> Option<&ComparisonResult> {
        self.comparison.as_ref()
    }

    /// Record a run-all result; returns the notification text on failure.
    pub fn apply_comparison(&mut self, outcome: Result<ComparisonResult, DashError>) -> Option<String> {
        match outcome {
            Ok(comparison) => {
                logging::info(
                    Domain::Render,
                    "comparison_applied",
                    &[("algorithms", json!(comparison.algorithms.len()))],
                );
                self.comparison = Some(comparison);
                self.last_failure = None;
                None
            }
            Err(err) => {
                let reason = err.to_string();
                let message = format!("Error running all algorithms: {}", reason);
                self.last_failure = Some(reason);
                Some(message)
            }
        }
    }

    fn dispose_all(&mut self) {
        for container in [ACCURACY_CHART, TIME_CHART, CONVERGENCE_CHART] {
            self.charts.dispose(container);
        }
    }
}

impl PageController for ComparePage {
    fn page(&self) -> Page {
        Page::Compare
    }

    fn needs_snapshot(&self) -> bool {
        self.comparison.is_none()
    }

    fn init(&mut self, snapshot: &ComparisonResult) {
        if self.comparison.is_none() && !snapshot.algorithms.is_empty() {
            self.comparison = Some(snapshot.clone());
        }
    }

    fn render(&mut self, options: &RenderOptions) -> String {
        let mut html = String::from(r#"<section class="comparison-section">"#);
        if let Some(reason) = &self.last_failure {
            html.push_str(&render::failure_banner(reason));
        }

        let comparison = match &self.comparison {
            Some(c) if !c.algorithms.is_empty() => c.clone(),
            _ => {
                self.dispose_all();
                html.push_str(r#"<p class="no-results">No comparison results yet. Run all algorithms to compare them.</p></section>"#);
                return html;
            }
        };

        html.push_str(r#"<div class="comparison-results">"#);
        for (algo, result) in &comparison.algorithms {
            html.push_str(&render::results_card(*algo, result, &options.policy));
        }
        html.push_str("</div>");

        let accuracy: Vec<(Algorithm, Option<f64>)> =
            comparison.algorithms.iter().map(|(a, r)| (*a, r.accuracy())).collect();
        let times: Vec<(Algorithm, Option<f64>)> = comparison
            .algorithms
            .iter()
            .map(|(a, r)| (*a, r.execution_time_secs.filter(|t| *t > 0.0)))
            .collect();
        let histories: Vec<(Algorithm, &[f64])> = comparison
            .algorithms
            .iter()
            .map(|(a, r)| (*a, r.accuracy_history.as_slice()))
            .collect();

        for (container, config) in [
            (ACCURACY_CHART, comparison_bar_chart(BarMetric::Accuracy, &accuracy)),
            (TIME_CHART, comparison_bar_chart(BarMetric::Time, &times)),
            (CONVERGENCE_CHART, convergence_chart(&histories)),
        ] {
            html.push_str(&render::chart_container(container, &config));
            self.charts.replace(container, config);
        }

        for (algo, result) in &comparison.algorithms {
            let rows = options.rows_for(result.accuracy_history.len());
            if let Some(table) = IterationTable::build(result, rows) {
                html.push_str(&format!(r#"<h4 class="{}-text">{}</h4>"#, algo.id(), algo.display_name()));
                html.push_str(&render::iteration_table(
                    &format!("compare-{}-iterations-table", algo.id()),
                    &table,
                    Some("/page/compare?rows=all"),
                ));
            }
        }

        html.push_str(r#"<div class="comparison-analysis">"#);
        html.push_str(&render::analysis(&comparison, &options.policy));
        html.push_str("</div></section>");
        html
    }

    fn charts(&self) -> &ChartRegistry {
        &self.charts
    }
}
