//! Iteration tables for optimizer runs.
//!
//! Long histories are down-sampled to a bounded number of rows: the first
//! and last few iterations plus an even spread of the middle.

use serde_json::Value;

use crate::normalize::AlgorithmResult;

pub const DEFAULT_MAX_ROWS: usize = 20;

/// Rows always shown at each end of a down-sampled table.
const EDGE_ROWS: usize = 5;

/// Indices of the iterations to display, ascending and without duplicates.
pub fn select_indices(len: usize, max_rows: usize) -> Vec<usize> {
    if len <= max_rows {
        return (0..len).collect();
    }

    let mut indices: Vec<usize> = (0..EDGE_ROWS.min(len)).collect();

    let middle = max_rows.saturating_sub(2 * EDGE_ROWS);
    if middle > 0 {
        let span = len.saturating_sub(2 * EDGE_ROWS) as f64;
        let step = span / (middle + 1) as f64;
        for k in 1..=middle {
            indices.push((EDGE_ROWS as f64 + k as f64 * step).floor() as usize);
        }
    }

    indices.extend(len.saturating_sub(EDGE_ROWS)..len);

    // Short series with a tiny budget overlap at the edges.
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Styling hint attached to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Positive,
    Negative,
}

impl Marker {
    pub fn for_delta(delta: f64) -> Self {
        if delta >= 0.0 {
            Marker::Positive
        } else {
            Marker::Negative
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            Marker::Positive => "positive-change",
            Marker::Negative => "negative-change",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub text: String,
    pub marker: Option<Marker>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), marker: None }
    }

    fn marked(text: impl Into<String>, marker: Marker) -> Self {
        Self { text: text.into(), marker: Some(marker) }
    }

    fn unavailable() -> Self {
        Self::plain("N/A")
    }
}

/// One displayed iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledRow {
    pub index: usize,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IterationTable {
    pub headers: Vec<String>,
    pub rows: Vec<SampledRow>,
    /// More iterations exist than are shown.
    pub truncated: bool,
    pub total: usize,
    pub summary: IterationSummary,
}

impl IterationTable {
    /// Build the table for a run; `None` when there is no accuracy history.
    pub fn build(result: &AlgorithmResult, max_rows: usize) -> Option<Self> {
        let accuracy = &result.accuracy_history;
        let summary = IterationSummary::from_series(accuracy)?;
        let fitness = &result.fitness_history;
        let diversity = &result.diversity_history;
        let params = &result.parameter_history;

        let param_keys: Vec<String> = params
            .first()
            .map(|first| first.keys().cloned().collect())
            .unwrap_or_default();

        let mut headers = vec!["Iteration".to_string(), "Accuracy".to_string(), "Change".to_string()];
        if !fitness.is_empty() {
            headers.push("Fitness".to_string());
        }
        if !diversity.is_empty() {
            headers.push("Diversity".to_string());
        }
        headers.extend(param_keys.iter().map(|k| column_title(k)));

        let rows = select_indices(accuracy.len(), max_rows)
            .into_iter()
            .map(|i| {
                let mut cells = vec![
                    Cell::plain((i + 1).to_string()),
                    Cell::plain(percent(accuracy[i])),
                    change_cell(accuracy, i),
                ];
                if !fitness.is_empty() {
                    cells.push(fitness_cell(fitness, i));
                }
                if !diversity.is_empty() {
                    cells.push(match diversity.get(i) {
                        Some(d) => Cell::plain(format!("{:.4}", d)),
                        None => Cell::unavailable(),
                    });
                }
                for key in &param_keys {
                    cells.push(match params.get(i).and_then(|p| p.get(key)) {
                        Some(v) => parameter_cell(v),
                        None => Cell::unavailable(),
                    });
                }
                SampledRow { index: i, cells }
            })
            .collect();

        Some(Self {
            headers,
            rows,
            truncated: accuracy.len() > max_rows,
            total: accuracy.len(),
            summary,
        })
    }
}

/// Header text for a parameter key: first letter upper-cased, `_` as space.
pub fn column_title(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>().replace('_', " "),
        None => String::new(),
    }
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn signed_percent(points: f64) -> String {
    if points >= 0.0 {
        format!("+{:.2}%", points)
    } else {
        format!("{:.2}%", points)
    }
}

fn change_cell(accuracy: &[f64], i: usize) -> Cell {
    if i == 0 {
        return Cell::plain("-");
    }
    let delta = (accuracy[i] - accuracy[i - 1]) * 100.0;
    Cell::marked(signed_percent(delta), Marker::for_delta(delta))
}

fn fitness_cell(fitness: &[f64], i: usize) -> Cell {
    let Some(current) = fitness.get(i) else {
        return Cell::unavailable();
    };
    let text = format!("{:.4}", current);
    match i.checked_sub(1).and_then(|p| fitness.get(p)) {
        Some(prev) if prev != current => Cell::marked(text, Marker::for_delta(current - prev)),
        _ => Cell::plain(text),
    }
}

fn parameter_cell(value: &Value) -> Cell {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => Cell::plain(format!("{:.4}", f)),
            None => Cell::plain(n.to_string()),
        },
        Value::String(s) => Cell::plain(s.clone()),
        Value::Null => Cell::unavailable(),
        other => Cell::plain(other.to_string()),
    }
}

// =============================================================================
// Summary
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct IterationSummary {
    pub initial: f64,
    pub last: f64,
    pub best: f64,
    /// Zero-based index of the first iteration reaching `best`.
    pub best_index: usize,
    pub total_iterations: usize,
}

impl IterationSummary {
    pub fn from_series(accuracy: &[f64]) -> Option<Self> {
        let initial = *accuracy.first()?;
        let last = *accuracy.last()?;
        let (best_index, best) = accuracy
            .iter()
            .copied()
            .enumerate()
            .fold((0, initial), |(bi, b), (i, v)| if v > b { (i, v) } else { (bi, b) });
        Some(Self {
            initial,
            last,
            best,
            best_index,
            total_iterations: accuracy.len(),
        })
    }

    /// Final minus initial accuracy, in percentage points.
    pub fn improvement(&self) -> f64 {
        (self.last - self.initial) * 100.0
    }

    /// Label/value pairs in display order, with a marker for the improvement.
    pub fn lines(&self) -> Vec<(&'static str, Cell)> {
        let improvement = self.improvement();
        vec![
            ("Initial Accuracy", Cell::plain(percent(self.initial))),
            ("Final Accuracy", Cell::plain(percent(self.last))),
            (
                "Best Accuracy",
                Cell::plain(format!("{} (iteration {})", percent(self.best), self.best_index + 1)),
            ),
            (
                "Total Improvement",
                Cell::marked(signed_percent(improvement), Marker::for_delta(improvement)),
            ),
            ("Total Iterations", Cell::plain(self.total_iterations.to_string())),
        ]
    }
}
