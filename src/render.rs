//! HTML building blocks for page bodies.
//!
//! Everything that originates outside this crate (payload text, error
//! messages, fragment names) goes through [`escape`] before insertion.

use crate::algorithm::{general_recommendations, Algorithm};
use crate::chart::ChartConfig;
use crate::history::{Cell, IterationSummary, IterationTable};
use crate::normalize::{AlgorithmResult, ComparisonResult, ConvergencePolicy};
use crate::notify::{Notification, NotificationLevel};
use crate::router::Page;

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn error_block(title: &str, message: &str) -> String {
    format!(
        r#"<div class="error-message"><h3>{}</h3><p>{}</p></div>"#,
        escape(title),
        escape(message)
    )
}

pub fn failure_banner(reason: &str) -> String {
    format!(
        r#"<div class="run-failure">Last run failed: {}</div>"#,
        escape(reason)
    )
}

fn cell_html(tag: &str, cell: &Cell) -> String {
    match cell.marker {
        Some(m) => format!(r#"<{tag} class="{}">{}</{tag}>"#, m.css_class(), escape(&cell.text), tag = tag),
        None => format!("<{tag}>{}</{tag}>", escape(&cell.text), tag = tag),
    }
}

/// Accuracy, time and convergence for one run.
pub fn results_card(algorithm: Algorithm, result: &AlgorithmResult, policy: &ConvergencePolicy) -> String {
    let id = algorithm.id();
    format!(
        r#"<div class="results-card" id="{id}-results">
  <div class="result-item"><span class="result-label">Accuracy:</span> <span class="result-value" id="{id}-accuracy">{}</span></div>
  <div class="result-item"><span class="result-label">Execution Time:</span> <span class="result-value" id="{id}-time">{}</span></div>
  <div class="result-item"><span class="result-label">Convergence:</span> <span class="result-value" id="{id}-convergence">{}</span></div>
</div>
"#,
        result.accuracy_text(),
        result.time_text(),
        escape(&policy.describe(result)),
        id = id
    )
}

pub fn summary(summary: &IterationSummary) -> String {
    let mut html = String::from(r#"<div class="iteration-summary">"#);
    for (label, cell) in summary.lines() {
        let class = match cell.marker {
            Some(m) => format!("summary-value {}", m.css_class()),
            None => "summary-value".to_string(),
        };
        html.push_str(&format!(
            r#"<div class="summary-item"><span class="summary-label">{}:</span> <span class="{}">{}</span></div>"#,
            label,
            class,
            escape(&cell.text)
        ));
    }
    html.push_str("</div>");
    html
}

/// Iteration table with its summary. `show_all_href` is linked from the
/// "Show All Iterations" control when the table is truncated.
pub fn iteration_table(container_id: &str, table: &IterationTable, show_all_href: Option<&str>) -> String {
    let mut html = format!(
        r#"<div class="iteration-table-wrapper" id="{}"><div class="iteration-table-container"><table class="iteration-table"><thead><tr>"#,
        escape(container_id)
    );
    for header in &table.headers {
        html.push_str(&format!("<th>{}</th>", escape(header)));
    }
    html.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in &row.cells {
            html.push_str(&cell_html("td", cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table></div>");
    html.push_str(&summary(&table.summary));
    if let (true, Some(href)) = (table.truncated, show_all_href) {
        html.push_str(&format!(
            r#"<a class="btn btn-sm btn-outline-primary mt-2" href="{}">Show All Iterations</a>"#,
            escape(href)
        ));
    }
    html.push_str("</div>\n");
    html
}

/// Canvas plus the chart config as inline JSON for the page script.
pub fn chart_container(container_id: &str, config: &ChartConfig) -> String {
    // A literal "</" would end the script element early.
    let json = config.to_json().to_string().replace("</", "<\\/");
    format!(
        r#"<div class="chart-container" id="{id}"><canvas></canvas><script type="application/json" data-chart="{id}">{}</script></div>
"#,
        json,
        id = escape(container_id)
    )
}

pub fn notifications(items: &[Notification]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut html = String::from(r#"<div class="notifications">"#);
    for n in items {
        let class = match n.level {
            NotificationLevel::Error => "error-message",
            NotificationLevel::Info => "info-message",
        };
        html.push_str(&format!(
            r#"<div class="{}" data-ttl-ms="{}">{}</div>"#,
            class,
            n.ttl_ms,
            escape(&n.message)
        ));
    }
    html.push_str("</div>");
    html
}

// =============================================================================
// Comparison analysis
// =============================================================================

fn efficiency_text(result: &AlgorithmResult) -> String {
    match result.efficiency() {
        Some(e) => format!("{:.4}", e),
        None => "N/A".to_string(),
    }
}

pub fn analysis(comparison: &ComparisonResult, policy: &ConvergencePolicy) -> String {
    let best = comparison.best();
    let mut html = String::new();

    if let Some((algo, accuracy)) = best {
        html.push_str(&format!(
            r#"<div class="analysis-section"><h4>Best Performing Algorithm: <span class="{}-text">{}</span></h4><p>With an accuracy of {:.2}%</p></div>"#,
            algo.id(),
            algo.display_name(),
            accuracy * 100.0
        ));
    }

    html.push_str(
        r#"<div class="analysis-section"><h4>Performance Analysis</h4><div class="comparison-table-container"><table class="comparison-detail-table"><thead><tr><th>Algorithm</th><th>Accuracy</th><th>Execution Time</th><th>Convergence</th><th>Efficiency</th><th>Strengths</th><th>Weaknesses</th></tr></thead><tbody>"#,
    );
    for (algo, result) in &comparison.algorithms {
        let row_class = if best.map(|(b, _)| b) == Some(*algo) { "best-algorithm" } else { "" };
        html.push_str(&format!(
            r#"<tr class="{}"><td><span class="{}-text">{}</span></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
            row_class,
            algo.id(),
            algo.display_name(),
            result.accuracy_text(),
            result.time_text(),
            escape(&policy.describe(result)),
            efficiency_text(result),
            algo.strengths(),
            algo.weaknesses()
        ));
    }
    html.push_str("</tbody></table></div></div>");

    html.push_str(r#"<div class="analysis-section"><h4>Recommendations</h4>"#);
    match best {
        Some((algo, _)) => {
            html.push_str(&format!(
                r#"<p>Based on the results, <span class="{}-text">{}</span> performed best for this dataset and neural network architecture.</p><ul>"#,
                algo.id(),
                algo.display_name()
            ));
            for (title, text) in algo.recommendations() {
                html.push_str(&format!("<li><strong>{}:</strong> {}</li>", escape(title), text));
            }
            html.push_str("</ul><p><strong>General Recommendations:</strong></p><ul>");
            for (title, text) in general_recommendations(algo) {
                html.push_str(&format!("<li><strong>{}:</strong> {}</li>", title, text));
            }
            html.push_str("</ul>");
        }
        None => html.push_str("<p>No algorithm data available. Run the comparison to see recommendations.</p>"),
    }
    html.push_str("</div>\n");
    html
}

// =============================================================================
// Page shell
// =============================================================================

/// Binds every embedded config. Tick suffixes and tooltip templates are data
/// in the config; the callbacks the chart library calls are installed here.
const CHART_BOOT: &str = r#"<script>
document.querySelectorAll('script[data-chart]').forEach(function (el) {
  var cfg = JSON.parse(el.textContent);
  var y = cfg.options.scales.y;
  var suffix = y.ticks.suffix || '';
  y.ticks.callback = function (value) { return value + suffix; };
  var tooltip = cfg.options.plugins.tooltip;
  var titleTemplate = tooltip.titleTemplate;
  tooltip.callbacks = {
    label: function (ctx) {
      return ctx.dataset.tooltipLabel.replace('{value}', ctx.parsed.y.toFixed(2));
    }
  };
  if (titleTemplate) {
    tooltip.callbacks.title = function (items) {
      return titleTemplate.replace('{label}', items[0].label);
    };
  }
  var canvas = el.parentElement.querySelector('canvas');
  if (canvas && window.Chart) { new Chart(canvas, cfg); }
});
</script>"#;

/// Full document: navigation, page header, notifications, fragment and body.
pub fn page_shell(page: Page, fragment: &str, body: &str, notes: &[Notification]) -> String {
    let mut html = String::from(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Hybrid AI Optimization</title>
<script src="https://cdn.jsdelivr.net/npm/chart.js"></script>
</head>
<body>
<nav class="nav-links">"#,
    );
    for p in Page::ALL {
        let active = if p == page { r#" class="active""# } else { "" };
        html.push_str(&format!(
            r#"<a href="/page/{}" data-page="{}"{}>{}</a>"#,
            p.name(),
            p.name(),
            active,
            p.title()
        ));
    }
    html.push_str(&format!(
        r#"</nav>
<main class="main-content">
<header><h1 id="page-title">{}</h1><p id="page-description">{}</p></header>
{}
<div id="content-container">{}</div>
{}
</main>
{}
</body>
</html>
"#,
        page.title(),
        page.description(),
        notifications(notes),
        fragment,
        body,
        CHART_BOOT
    ));
    html
}

/// Shell around an inline error block, for navigations that failed.
pub fn error_page(error_html: &str, notes: &[Notification]) -> String {
    page_shell(Page::Home, error_html, "", notes)
}
