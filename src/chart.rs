//! Chart configurations in the chart library's JSON shape, and the registry
//! that keeps one live chart per container.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

use crate::algorithm::Algorithm;
use crate::indicators::smooth_trend;
use crate::logging::{self, v_str, Domain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
}

/// A single color, or one color per bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Paint {
    One(String),
    PerPoint(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    pub border_color: Paint,
    pub background_color: Paint,
    pub border_width: f64,
    pub fill: bool,
    pub tension: f64,
    pub point_radius: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Tooltip line, `{value}` replaced by the point value to 2 decimals.
    pub tooltip_label: String,
}

impl Dataset {
    pub fn tooltip_text(&self, value: f64) -> String {
        self.tooltip_label.replace("{value}", &format!("{:.2}", value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisTitle {
    pub display: bool,
    pub text: String,
}

/// Tick labels. `suffix` is appended by the page's chart boot script, which
/// installs the `callback` the chart library calls for each tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticks {
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    pub begin_at_zero: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub ticks: Ticks,
    pub title: AxisTitle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAxis {
    pub title: AxisTitle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scales {
    pub x: CategoryAxis,
    pub y: Axis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Interaction {
    pub mode: &'static str,
    pub intersect: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub display: bool,
    pub position: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tooltip {
    pub display_colors: bool,
    /// Title template, `{label}` replaced by the x label. Turned into
    /// `callbacks.title` by the boot script.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plugins {
    pub legend: Legend,
    pub tooltip: Tooltip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    pub responsive: bool,
    pub maintain_aspect_ratio: bool,
    pub interaction: Interaction,
    pub plugins: Plugins,
    pub scales: Scales,
}

impl ChartOptions {
    pub fn y(&self) -> &Axis {
        &self.scales.y
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartData,
    pub options: ChartOptions,
}

impl ChartConfig {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| json!(null))
    }

    pub fn tooltip_title(&self, label: &str) -> Option<String> {
        self.options
            .plugins
            .tooltip
            .title_template
            .as_ref()
            .map(|t| t.replace("{label}", label))
    }
}

fn iteration_labels(len: usize) -> Vec<String> {
    (1..=len).map(|i| i.to_string()).collect()
}

fn axis_title(text: &str) -> AxisTitle {
    AxisTitle { display: true, text: text.to_string() }
}

fn value_axis(max: Option<f64>, suggested_max: Option<f64>, suffix: &str, title: &str) -> Axis {
    Axis {
        begin_at_zero: true,
        suggested_max,
        max,
        ticks: Ticks { suffix: suffix.to_string() },
        title: axis_title(title),
    }
}

fn percent_axis(max: Option<f64>, suggested_max: Option<f64>) -> Axis {
    value_axis(max, suggested_max, "%", "Accuracy (%)")
}

fn options(show_legend: bool, tooltip_title: Option<&str>, x_title: &str, y: Axis) -> ChartOptions {
    ChartOptions {
        responsive: true,
        maintain_aspect_ratio: false,
        interaction: Interaction { mode: "index", intersect: false },
        plugins: Plugins {
            legend: Legend { display: show_legend, position: "top" },
            tooltip: Tooltip {
                display_colors: true,
                title_template: tooltip_title.map(str::to_string),
            },
        },
        scales: Scales { x: CategoryAxis { title: axis_title(x_title) }, y },
    }
}

/// Accuracy history as a percentage line with a smoothed trend overlay.
pub fn accuracy_line_chart(series: &[f64], color: &str, label: &str) -> ChartConfig {
    let percent: Vec<f64> = series.iter().map(|v| v * 100.0).collect();
    let trend = smooth_trend(&percent);

    let raw = Dataset {
        label: label.to_string(),
        data: percent,
        border_color: Paint::One(color.to_string()),
        background_color: Paint::One("transparent".to_string()),
        border_width: 1.5,
        fill: false,
        tension: 0.2,
        point_radius: 0.0,
        order: Some(1),
        tooltip_label: format!("{}: {{value}}%", label),
    };
    let smoothed = Dataset {
        label: format!("{} (Trend)", label),
        data: trend,
        border_color: Paint::One(color.to_string()),
        background_color: Paint::One(color.to_string()),
        border_width: 2.0,
        fill: true,
        tension: 0.4,
        point_radius: 0.0,
        order: Some(2),
        tooltip_label: "Trend: {value}%".to_string(),
    };

    ChartConfig {
        kind: ChartKind::Line,
        data: ChartData {
            labels: iteration_labels(series.len()),
            datasets: vec![raw, smoothed],
        },
        options: options(true, Some("Iteration {label}"), "Iteration", percent_axis(None, Some(100.0))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarMetric {
    Accuracy,
    Time,
}

/// One bar per algorithm. Missing values are drawn as zero.
pub fn comparison_bar_chart(metric: BarMetric, entries: &[(Algorithm, Option<f64>)]) -> ChartConfig {
    let (label, tooltip, y) = match metric {
        BarMetric::Accuracy => ("Accuracy (%)", "Accuracy: {value}%", percent_axis(Some(100.0), None)),
        BarMetric::Time => (
            "Execution Time (s)",
            "Time: {value}s",
            value_axis(None, None, "s", "Execution Time (s)"),
        ),
    };
    let data = entries
        .iter()
        .map(|(_, v)| match (metric, v) {
            (BarMetric::Accuracy, Some(a)) => a * 100.0,
            (BarMetric::Time, Some(t)) => *t,
            (_, None) => 0.0,
        })
        .collect();

    ChartConfig {
        kind: ChartKind::Bar,
        data: ChartData {
            labels: entries.iter().map(|(a, _)| a.display_name().to_string()).collect(),
            datasets: vec![Dataset {
                label: label.to_string(),
                data,
                border_color: Paint::PerPoint(entries.iter().map(|(a, _)| a.rgba(1.0)).collect()),
                background_color: Paint::PerPoint(entries.iter().map(|(a, _)| a.rgba(0.7)).collect()),
                border_width: 2.0,
                fill: false,
                tension: 0.0,
                point_radius: 0.0,
                order: None,
                tooltip_label: tooltip.to_string(),
            }],
        },
        options: options(false, None, "Algorithm", y),
    }
}

/// Every algorithm's accuracy history on one axis; empty histories are left out.
pub fn convergence_chart(histories: &[(Algorithm, &[f64])]) -> ChartConfig {
    let longest = histories.iter().map(|(_, h)| h.len()).max().unwrap_or(0);
    let datasets = histories
        .iter()
        .filter(|(_, h)| !h.is_empty())
        .map(|(algo, h)| Dataset {
            label: algo.display_name().to_string(),
            data: h.iter().map(|v| v * 100.0).collect(),
            border_color: Paint::One(algo.rgba(1.0)),
            background_color: Paint::One(algo.rgba(0.1)),
            border_width: 2.0,
            fill: false,
            tension: 0.3,
            point_radius: 0.0,
            order: None,
            tooltip_label: format!("{}: {{value}}%", algo.display_name()),
        })
        .collect();

    ChartConfig {
        kind: ChartKind::Line,
        data: ChartData { labels: iteration_labels(longest), datasets },
        options: options(true, Some("Iteration {label}"), "Iteration", percent_axis(None, Some(100.0))),
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Live charts keyed by container id.
#[derive(Debug, Default)]
pub struct ChartRegistry {
    live: BTreeMap<String, ChartConfig>,
    disposed: u64,
}

impl ChartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `config` to `container`, disposing whatever was bound there.
    /// Returns true when a previous chart was disposed.
    pub fn replace(&mut self, container: &str, config: ChartConfig) -> bool {
        let had_previous = self.dispose(container);
        logging::debug(
            Domain::Chart,
            "bind",
            &[("container", v_str(container)), ("points", json!(config.data.labels.len()))],
        );
        self.live.insert(container.to_string(), config);
        had_previous
    }

    pub fn dispose(&mut self, container: &str) -> bool {
        match self.live.remove(container) {
            Some(_) => {
                self.disposed += 1;
                logging::debug(Domain::Chart, "dispose", &[("container", v_str(container))]);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, container: &str) -> Option<&ChartConfig> {
        self.live.get(container)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn disposed_count(&self) -> u64 {
        self.disposed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChartConfig)> {
        self.live.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// `{container: config}` for every live chart.
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> =
            self.live.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_chart_has_raw_and_trend_series() {
        let chart = accuracy_line_chart(&[0.5, 0.7, 0.95], "var(--ga-color)", "Accuracy");
        assert_eq!(chart.kind, ChartKind::Line);
        assert_eq!(chart.data.labels, vec!["1", "2", "3"]);
        assert_eq!(chart.data.datasets.len(), 2);

        let raw = &chart.data.datasets[0];
        assert_eq!(raw.data, vec![50.0, 70.0, 95.0]);
        let trend = &chart.data.datasets[1];
        assert_eq!(trend.label, "Accuracy (Trend)");
        assert_eq!(trend.data.len(), 3);
        assert!((trend.data[0] - 60.0).abs() < 1e-9);

        assert!(chart.options.y().begin_at_zero);
        assert_eq!(chart.options.y().suggested_max, Some(100.0));
        assert_eq!(chart.tooltip_title("7").as_deref(), Some("Iteration 7"));
        assert_eq!(raw.tooltip_text(95.0), "Accuracy: 95.00%");
        assert_eq!(trend.tooltip_text(60.0), "Trend: 60.00%");
    }

    #[test]
    fn serializes_to_chart_library_shape() {
        let value = accuracy_line_chart(&[0.1], "red", "Accuracy").to_json();
        assert_eq!(value["type"], "line");
        let options = &value["options"];
        assert_eq!(options["maintainAspectRatio"], false);
        assert_eq!(options["interaction"]["mode"], "index");
        assert_eq!(options["scales"]["y"]["beginAtZero"], true);
        assert_eq!(options["scales"]["y"]["suggestedMax"], 100.0);
        assert!(options["scales"]["y"].get("max").is_none());
        assert_eq!(options["scales"]["y"]["ticks"]["suffix"], "%");
        assert_eq!(options["scales"]["x"]["title"]["text"], "Iteration");
        assert_eq!(options["plugins"]["legend"]["display"], true);
        assert_eq!(options["plugins"]["tooltip"]["titleTemplate"], "Iteration {label}");
        assert!(options.get("y").is_none());
        assert!(options.get("showLegend").is_none());
        assert_eq!(value["data"]["datasets"][0]["borderColor"], "red");
        assert_eq!(value["data"]["datasets"][0]["tooltipLabel"], "Accuracy: {value}%");
    }

    #[test]
    fn empty_series_yields_empty_chart() {
        let chart = accuracy_line_chart(&[], "red", "Accuracy");
        assert!(chart.data.labels.is_empty());
        assert!(chart.data.datasets.iter().all(|d| d.data.is_empty()));
    }

    #[test]
    fn accuracy_bars_cap_at_one_hundred() {
        let chart = comparison_bar_chart(
            BarMetric::Accuracy,
            &[(Algorithm::Ga, Some(0.91)), (Algorithm::Pso, None)],
        );
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.options.y().max, Some(100.0));
        assert!(!chart.options.plugins.legend.display);
        assert_eq!(chart.to_json()["options"]["scales"]["y"]["max"], 100.0);
        assert_eq!(chart.data.labels, vec!["Genetic Algorithm", "Particle Swarm Optimization"]);
        let bars = &chart.data.datasets[0];
        assert!((bars.data[0] - 91.0).abs() < 1e-9);
        assert_eq!(bars.data[1], 0.0);
        assert_eq!(
            bars.background_color,
            Paint::PerPoint(vec!["rgba(54, 162, 235, 0.7)".into(), "rgba(255, 99, 132, 0.7)".into()])
        );
    }

    #[test]
    fn time_bars_use_seconds() {
        let chart = comparison_bar_chart(BarMetric::Time, &[(Algorithm::Tabu, Some(3.25))]);
        assert_eq!(chart.options.y().ticks.suffix, "s");
        assert_eq!(chart.options.y().max, None);
        assert_eq!(chart.data.datasets[0].tooltip_text(3.25), "Time: 3.25s");
    }

    #[test]
    fn convergence_chart_spans_longest_history() {
        let ga: Vec<f64> = vec![0.1, 0.2, 0.3, 0.4];
        let pso: Vec<f64> = Vec::new();
        let aco: Vec<f64> = vec![0.5];
        let chart = convergence_chart(&[
            (Algorithm::Ga, ga.as_slice()),
            (Algorithm::Pso, pso.as_slice()),
            (Algorithm::Aco, aco.as_slice()),
        ]);
        assert_eq!(chart.data.labels.len(), 4);
        assert_eq!(chart.data.datasets.len(), 2);
        assert_eq!(chart.data.datasets[1].label, "Ant Colony Optimization");
    }

    #[test]
    fn registry_keeps_one_chart_per_container() {
        let mut registry = ChartRegistry::new();
        assert!(!registry.replace("ga-chart", accuracy_line_chart(&[0.1], "red", "Accuracy")));
        assert!(registry.replace("ga-chart", accuracy_line_chart(&[0.1, 0.2], "red", "Accuracy")));
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.disposed_count(), 1);
        assert_eq!(registry.get("ga-chart").unwrap().data.labels.len(), 2);

        registry.replace("other", accuracy_line_chart(&[0.3], "blue", "Accuracy"));
        assert_eq!(registry.live_count(), 2);
        assert!(registry.dispose("other"));
        assert!(!registry.dispose("other"));
        assert_eq!(registry.live_count(), 1);
        assert_eq!(registry.disposed_count(), 2);
    }
}
