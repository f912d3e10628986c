//! Reconciles optimizer payloads into one view model.
//!
//! Payloads come from the optimizer service or the static results snapshot
//! and vary in shape: `final_accuracy` vs `best_accuracy`, history as a bare
//! array or as an object of named series, snake_case or camelCase keys.
//! Normalization never fails; anything missing or malformed becomes an
//! empty series or an unavailable value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::algorithm::Algorithm;

pub type ParameterRecord = Map<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmResult {
    pub best_accuracy: Option<f64>,
    pub final_accuracy: Option<f64>,
    pub execution_time_secs: Option<f64>,
    /// Convergence iteration as reported by the service.
    pub convergence_speed: Option<usize>,
    pub accuracy_history: Vec<f64>,
    pub fitness_history: Vec<f64>,
    pub diversity_history: Vec<f64>,
    pub parameter_history: Vec<ParameterRecord>,
}

impl AlgorithmResult {
    /// `final_accuracy` when reported, else `best_accuracy`.
    pub fn accuracy(&self) -> Option<f64> {
        self.final_accuracy.or(self.best_accuracy)
    }

    pub fn accuracy_text(&self) -> String {
        match self.accuracy() {
            Some(a) => format!("{:.2}%", a * 100.0),
            None => "N/A".to_string(),
        }
    }

    /// Zero or missing times render as unavailable.
    pub fn time_text(&self) -> String {
        match self.execution_time_secs {
            Some(t) if t > 0.0 => format!("{:.2}s", t),
            _ => "N/A".to_string(),
        }
    }

    /// Accuracy per second of execution, when both are known.
    pub fn efficiency(&self) -> Option<f64> {
        match (self.accuracy(), self.execution_time_secs) {
            (Some(a), Some(t)) if t > 0.0 => Some(a / t),
            _ => None,
        }
    }
}

/// Histories of one run, separated from the scalar fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryView {
    pub accuracy: Vec<f64>,
    pub fitness: Vec<f64>,
    pub diversity: Vec<f64>,
    pub parameters: Vec<ParameterRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub algorithms: BTreeMap<Algorithm, AlgorithmResult>,
    pub best_algorithm: Option<Algorithm>,
    pub best_accuracy: Option<f64>,
}

impl ComparisonResult {
    pub fn get(&self, algorithm: Algorithm) -> Option<&AlgorithmResult> {
        self.algorithms.get(&algorithm)
    }

    /// Backend-reported winner, else the highest resolved accuracy.
    pub fn best(&self) -> Option<(Algorithm, f64)> {
        if let Some(algo) = self.best_algorithm {
            let accuracy = self
                .best_accuracy
                .or_else(|| self.get(algo).and_then(|r| r.accuracy()))
                .unwrap_or(0.0);
            return Some((algo, accuracy));
        }
        self.algorithms
            .iter()
            .filter_map(|(algo, r)| r.accuracy().map(|a| (*algo, a)))
            .fold(None, |best: Option<(Algorithm, f64)>, (algo, a)| match best {
                Some((_, b)) if b >= a => best,
                _ => Some((algo, a)),
            })
    }
}

// =============================================================================
// Field access
// =============================================================================

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| obj.get(*n)).filter(|v| !v.is_null())
}

fn finite(v: &Value) -> Option<f64> {
    v.as_f64().filter(|f| f.is_finite())
}

fn number(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    field(obj, names).and_then(finite)
}

fn series(v: Option<&Value>) -> Vec<f64> {
    match v.and_then(Value::as_array) {
        Some(items) => items.iter().filter_map(finite).collect(),
        None => Vec::new(),
    }
}

fn records(v: Option<&Value>) -> Vec<ParameterRecord> {
    match v.and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .map(|item| item.as_object().cloned().unwrap_or_default())
            .collect(),
        None => Vec::new(),
    }
}

const ACCURACY_HISTORY: &[&str] = &["accuracy_history", "accuracyHistory"];
const FITNESS_HISTORY: &[&str] = &["fitness_history", "fitnessHistory"];
const DIVERSITY_HISTORY: &[&str] = &["diversity_history", "diversityHistory"];
const PARAMETER_HISTORY: &[&str] = &["parameter_history", "parameterHistory"];

fn history_from_object(obj: &Map<String, Value>) -> HistoryView {
    HistoryView {
        accuracy: series(field(obj, ACCURACY_HISTORY)),
        fitness: series(field(obj, FITNESS_HISTORY)),
        diversity: series(field(obj, DIVERSITY_HISTORY)),
        parameters: records(field(obj, PARAMETER_HISTORY)),
    }
}

/// Resolve a standalone history value: a bare numeric array (legacy) or an
/// object of named series.
pub fn normalize_history(value: &Value) -> HistoryView {
    match value {
        Value::Array(_) => HistoryView { accuracy: series(Some(value)), ..Default::default() },
        Value::Object(obj) => history_from_object(obj),
        _ => HistoryView::default(),
    }
}

/// Normalize one algorithm's payload.
pub fn normalize_result(value: &Value) -> AlgorithmResult {
    let Some(obj) = value.as_object() else {
        return AlgorithmResult::default();
    };

    // `accuracy_history` may itself be the detailed object; top-level series
    // fill whatever it does not carry.
    let nested = field(obj, ACCURACY_HISTORY)
        .filter(|v| v.is_object())
        .map(normalize_history);
    let top = history_from_object(obj);
    let history = match nested {
        Some(n) => HistoryView {
            accuracy: n.accuracy,
            fitness: if n.fitness.is_empty() { top.fitness } else { n.fitness },
            diversity: if n.diversity.is_empty() { top.diversity } else { n.diversity },
            parameters: if n.parameters.is_empty() { top.parameters } else { n.parameters },
        },
        None => top,
    };

    AlgorithmResult {
        best_accuracy: number(obj, &["best_accuracy", "bestAccuracy"]),
        final_accuracy: number(obj, &["final_accuracy", "finalAccuracy"]),
        execution_time_secs: number(
            obj,
            &["execution_time", "executionTime", "executionTimeSeconds", "execution_time_seconds"],
        ),
        convergence_speed: field(obj, &["convergence_speed", "convergenceSpeed"]).and_then(iteration_count),
        accuracy_history: history.accuracy,
        fitness_history: history.fitness,
        diversity_history: history.diversity,
        parameter_history: history.parameters,
    }
}

// The service has reported this both as a number and as a numeric string.
fn iteration_count(v: &Value) -> Option<usize> {
    match v {
        Value::Number(n) => n.as_u64().map(|n| n as usize).or_else(|| {
            n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as usize)
        }),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as usize),
        _ => None,
    }
}

/// Normalize a comparison payload: either the `{algorithms: {...}}` envelope
/// produced by a full run or a bare `{ga: ..., pso: ...}` map.
pub fn normalize_comparison(value: &Value) -> ComparisonResult {
    let Some(obj) = value.as_object() else {
        return ComparisonResult::default();
    };
    let per_algorithm = field(obj, &["algorithms"]).and_then(Value::as_object).unwrap_or(obj);

    let algorithms = Algorithm::ALL
        .iter()
        .filter_map(|algo| {
            per_algorithm
                .get(algo.id())
                .filter(|v| v.is_object())
                .map(|v| (*algo, normalize_result(v)))
        })
        .collect();

    ComparisonResult {
        algorithms,
        best_algorithm: field(obj, &["best_algorithm", "bestAlgorithm"])
            .and_then(Value::as_str)
            .and_then(Algorithm::parse),
        best_accuracy: number(obj, &["best_accuracy", "bestAccuracy"]),
    }
}

/// Backend-reported failure carried in an otherwise well-formed payload.
pub fn payload_error(value: &Value) -> Option<String> {
    let err = value.as_object()?.get("error")?;
    match err {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// =============================================================================
// Convergence
// =============================================================================

/// One threshold policy for every page that reports convergence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvergencePolicy {
    pub fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Reported by the optimizer service.
    Reported(usize),
    /// First iteration at or above the threshold.
    Reached(usize),
    /// Threshold never reached; carries the history length.
    NotReached(usize),
}

impl Convergence {
    pub fn iterations(&self) -> usize {
        match self {
            Convergence::Reported(n) | Convergence::Reached(n) | Convergence::NotReached(n) => *n,
        }
    }
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self { fraction: Self::DEFAULT_FRACTION }
    }
}

impl ConvergencePolicy {
    pub const DEFAULT_FRACTION: f64 = 0.9;

    pub fn new(fraction: f64) -> Self {
        Self { fraction }
    }

    pub fn threshold(&self, accuracy: f64) -> f64 {
        accuracy * self.fraction
    }

    /// Convergence iteration of a run; `None` when there is nothing to measure.
    pub fn evaluate(&self, result: &AlgorithmResult) -> Option<Convergence> {
        if let Some(n) = result.convergence_speed {
            return Some(Convergence::Reported(n));
        }
        let history = &result.accuracy_history;
        if history.is_empty() {
            return None;
        }
        let target = result
            .accuracy()
            .unwrap_or_else(|| history.iter().copied().fold(f64::NEG_INFINITY, f64::max));
        let threshold = self.threshold(target);
        Some(match history.iter().position(|acc| *acc >= threshold) {
            Some(i) => Convergence::Reached(i),
            None => Convergence::NotReached(history.len()),
        })
    }

    pub fn describe(&self, result: &AlgorithmResult) -> String {
        match self.evaluate(result) {
            Some(Convergence::Reported(n)) => n.to_string(),
            Some(c) => format!("{} iterations", c.iterations()),
            None => "N/A".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn final_accuracy_wins() {
        let r = normalize_result(&json!({"final_accuracy": 0.9, "best_accuracy": 0.8}));
        assert_eq!(r.accuracy(), Some(0.9));
        let r = normalize_result(&json!({"finalAccuracy": 0.9}));
        assert_eq!(r.accuracy(), Some(0.9));
    }

    #[test]
    fn best_accuracy_is_the_fallback() {
        let r = normalize_result(&json!({"best_accuracy": 0.8}));
        assert_eq!(r.accuracy(), Some(0.8));
        assert_eq!(r.accuracy_text(), "80.00%");
    }

    #[test]
    fn missing_accuracy_is_unavailable() {
        let r = normalize_result(&json!({"execution_time": 1.5}));
        assert_eq!(r.accuracy(), None);
        assert_eq!(r.accuracy_text(), "N/A");
        assert_eq!(r.time_text(), "1.50s");
    }

    #[test]
    fn non_numeric_accuracy_is_ignored() {
        let r = normalize_result(&json!({"final_accuracy": "high", "best_accuracy": 0.7}));
        assert_eq!(r.accuracy(), Some(0.7));
    }

    #[test]
    fn malformed_payloads_degrade_to_defaults() {
        assert_eq!(normalize_result(&json!("oops")), AlgorithmResult::default());
        assert_eq!(normalize_result(&json!(null)), AlgorithmResult::default());
        let r = normalize_result(&json!({"accuracy_history": "nope"}));
        assert!(r.accuracy_history.is_empty());
        assert_eq!(r.time_text(), "N/A");
    }

    #[test]
    fn bare_history_array() {
        let h = normalize_history(&json!([0.1, 0.5, 0.9]));
        assert_eq!(h.accuracy, vec![0.1, 0.5, 0.9]);
        assert!(h.fitness.is_empty());
        assert!(h.diversity.is_empty());
        assert!(h.parameters.is_empty());
    }

    #[test]
    fn detailed_history_object() {
        let payload = json!({
            "best_accuracy": 0.9,
            "accuracy_history": {
                "accuracy_history": [0.2, 0.4],
                "fitness_history": [1.0, 2.0],
                "parameter_history": [{"inertia": 0.7}, {"inertia": 0.6}]
            },
            "diversity_history": [0.5, 0.4]
        });
        let r = normalize_result(&payload);
        assert_eq!(r.accuracy_history, vec![0.2, 0.4]);
        assert_eq!(r.fitness_history, vec![1.0, 2.0]);
        assert_eq!(r.diversity_history, vec![0.5, 0.4]);
        assert_eq!(r.parameter_history.len(), 2);
        assert_eq!(r.parameter_history[1]["inertia"], json!(0.6));
    }

    #[test]
    fn non_numeric_history_entries_are_skipped() {
        let r = normalize_result(&json!({"accuracy_history": [0.1, null, "x", 0.3]}));
        assert_eq!(r.accuracy_history, vec![0.1, 0.3]);
    }

    #[test]
    fn comparison_envelope_and_bare_map() {
        let envelope = json!({
            "algorithms": {
                "ga": {"best_accuracy": 0.91, "accuracy_history": [0.5, 0.91]},
                "pso": {"final_accuracy": 0.88}
            },
            "best_algorithm": "ga",
            "best_accuracy": 0.91
        });
        let c = normalize_comparison(&envelope);
        assert_eq!(c.algorithms.len(), 2);
        assert_eq!(c.best(), Some((Algorithm::Ga, 0.91)));

        let bare = json!({
            "aco": {"best_accuracy": 0.6},
            "tabu": {"best_accuracy": 0.75}
        });
        let c = normalize_comparison(&bare);
        assert_eq!(c.best_algorithm, None);
        assert_eq!(c.best(), Some((Algorithm::Tabu, 0.75)));
    }

    #[test]
    fn none_best_algorithm_means_absent() {
        let c = normalize_comparison(&json!({"algorithms": {}, "best_algorithm": "None", "best_accuracy": 0.0}));
        assert_eq!(c.best_algorithm, None);
        assert_eq!(c.best(), None);
    }

    #[test]
    fn payload_error_detection() {
        assert_eq!(payload_error(&json!({"error": "boom"})), Some("boom".to_string()));
        assert_eq!(payload_error(&json!({"error": null})), None);
        assert_eq!(payload_error(&json!({"best_accuracy": 1.0})), None);
    }

    #[test]
    fn convergence_uses_default_ninety_percent() {
        let r = normalize_result(&json!({"best_accuracy": 1.0, "accuracy_history": [0.5, 0.85, 0.92, 1.0]}));
        let policy = ConvergencePolicy::default();
        assert_eq!(policy.evaluate(&r), Some(Convergence::Reached(2)));
        assert_eq!(policy.describe(&r), "2 iterations");
    }

    #[test]
    fn convergence_prefers_reported_value() {
        let r = normalize_result(&json!({"convergence_speed": "17", "accuracy_history": [0.1]}));
        assert_eq!(ConvergencePolicy::default().evaluate(&r), Some(Convergence::Reported(17)));
    }

    #[test]
    fn convergence_not_reached_reports_length() {
        let r = normalize_result(&json!({"final_accuracy": 1.0, "accuracy_history": [0.1, 0.2, 0.3]}));
        assert_eq!(ConvergencePolicy::new(0.99).evaluate(&r), Some(Convergence::NotReached(3)));
    }

    #[test]
    fn convergence_without_history_is_unavailable() {
        let r = normalize_result(&json!({"best_accuracy": 0.9}));
        assert_eq!(ConvergencePolicy::default().evaluate(&r), None);
        assert_eq!(ConvergencePolicy::default().describe(&r), "N/A");
    }

    #[test]
    fn efficiency_requires_positive_time() {
        let r = normalize_result(&json!({"best_accuracy": 0.8, "execution_time": 2.0}));
        assert_eq!(r.efficiency(), Some(0.4));
        let r = normalize_result(&json!({"best_accuracy": 0.8, "execution_time": 0}));
        assert_eq!(r.efficiency(), None);
    }
}
