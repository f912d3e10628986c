use serde_json::json;

use crate::algorithm::Algorithm;
use crate::chart::{accuracy_line_chart, ChartRegistry};
use crate::client::RunOutcome;
use crate::error::ValidationError;
use crate::history::IterationTable;
use crate::logging::{self, v_str, Domain};
use crate::normalize::{AlgorithmResult, ComparisonResult};
use crate::pages::{PageController, RenderOptions};
use crate::params::{FormValues, RunParams};
use crate::render;
use crate::router::Page;

/// View state of one optimizer's page.
#[derive(Debug)]
pub struct AlgorithmPage {
    algorithm: Algorithm,
    result: Option<AlgorithmResult>,
    last_failure: Option<String>,
    charts: ChartRegistry,
}

impl AlgorithmPage {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            result: None,
            last_failure: None,
            charts: ChartRegistry::new(),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn result(&self) -> Option<&AlgorithmResult> {
        self.result.as_ref()
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn chart_container(&self) -> String {
        format!("{}-chart-container", self.algorithm.id())
    }

    pub fn table_container(&self) -> String {
        format!("{}-iterations-table", self.algorithm.id())
    }

    /// Validate a submitted form into run parameters.
    pub fn prepare(&self, form: &FormValues) -> Result<RunParams, ValidationError> {
        RunParams::from_form(self.algorithm, form)
    }

    /// Record a finished run. A failure keeps the previous result on screen
    /// and returns the notification text.
    pub fn apply_outcome(&mut self, outcome: RunOutcome) -> Option<String> {
        match outcome {
            RunOutcome::Completed(result) => {
                logging::info(
                    Domain::Render,
                    "result_applied",
                    &[
                        ("page", v_str(self.algorithm.id())),
                        ("iterations", json!(result.accuracy_history.len())),
                    ],
                );
                self.result = Some(result);
                self.last_failure = None;
                None
            }
            RunOutcome::Failed(reason) => {
                let message = format!("Error running {} optimization: {}", self.algorithm.id(), reason);
                self.last_failure = Some(reason);
                Some(message)
            }
        }
    }
}

impl PageController for AlgorithmPage {
    fn page(&self) -> Page {
        Page::for_algorithm(self.algorithm)
    }

    fn needs_snapshot(&self) -> bool {
        self.result.is_none()
    }

    fn init(&mut self, snapshot: &ComparisonResult) {
        if self.result.is_some() {
            return;
        }
        if let Some(result) = snapshot.get(self.algorithm) {
            self.result = Some(result.clone());
        }
    }

    fn render(&mut self, options: &RenderOptions) -> String {
        let algo = self.algorithm;
        let mut html = format!(r#"<section class="results-section" id="{}-results-section">"#, algo.id());

        if let Some(reason) = &self.last_failure {
            html.push_str(&render::failure_banner(reason));
        }

        let Some(result) = &self.result else {
            self.charts.dispose(&self.chart_container());
            html.push_str(r#"<p class="no-results">No results yet. Run the optimizer to see them here.</p></section>"#);
            return html;
        };

        html.push_str(&render::results_card(algo, result, &options.policy));

        let container = self.chart_container();
        if result.accuracy_history.is_empty() {
            self.charts.dispose(&container);
        } else {
            let label = format!("{} Accuracy", algo.short_name());
            let config = accuracy_line_chart(&result.accuracy_history, algo.color_token(), &label);
            html.push_str(&render::chart_container(&container, &config));
            self.charts.replace(&container, config);
        }

        let max_rows = options.rows_for(result.accuracy_history.len());
        if let Some(table) = IterationTable::build(result, max_rows) {
            let show_all = format!("/page/{}?rows=all", algo.id());
            html.push_str(&render::iteration_table(&self.table_container(), &table, Some(&show_all)));
        }

        html.push_str("</section>");
        html
    }

    fn charts(&self) -> &ChartRegistry {
        &self.charts
    }
}
