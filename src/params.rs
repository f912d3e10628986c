//! Optimizer parameters collected from page forms.
//!
//! Values arrive as strings keyed by field name. A field that is missing
//! takes the optimizer service's default; a field that is present must parse
//! and pass its range check before any request is sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::algorithm::Algorithm;
use crate::error::ValidationError;
use crate::logging::{self, v_str, Domain};

pub type FormValues = HashMap<String, String>;

/// Decode an `application/x-www-form-urlencoded` body.
pub fn parse_form(body: &str) -> FormValues {
    url::form_urlencoded::parse(body.as_bytes()).into_owned().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaParams {
    pub population_size: i64,
    pub generations: i64,
    pub mutation_rate: f64,
    pub selection_method: String,
    pub crossover_method: String,
    pub elitism: i64,
}

impl Default for GaParams {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            mutation_rate: 0.1,
            selection_method: "tournament".to_string(),
            crossover_method: "single_point".to_string(),
            elitism: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PsoParams {
    pub swarm_size: i64,
    pub iterations: i64,
    pub inertia: f64,
    pub cognitive_coef: f64,
    pub social_coef: f64,
}

impl Default for PsoParams {
    fn default() -> Self {
        Self {
            swarm_size: 30,
            iterations: 100,
            inertia: 0.7,
            cognitive_coef: 1.5,
            social_coef: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcoParams {
    pub ant_count: i64,
    pub iterations: i64,
    pub pheromone_importance: f64,
    pub heuristic_importance: f64,
    pub evaporation_rate: f64,
    pub initial_pheromone: f64,
}

impl Default for AcoParams {
    fn default() -> Self {
        Self {
            ant_count: 20,
            iterations: 100,
            pheromone_importance: 1.0,
            heuristic_importance: 2.0,
            evaporation_rate: 0.5,
            initial_pheromone: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabuParams {
    pub iterations: i64,
    pub tabu_list_size: i64,
    pub neighborhood_size: i64,
    pub step_size: f64,
}

impl Default for TabuParams {
    fn default() -> Self {
        Self {
            iterations: 100,
            tabu_list_size: 10,
            neighborhood_size: 20,
            step_size: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunParams {
    Ga(GaParams),
    Pso(PsoParams),
    Aco(AcoParams),
    Tabu(TabuParams),
}

const POSITIVE_ITERATIONS: &str = "Number of iterations must be a positive number";

// =============================================================================
// Form access
// =============================================================================

struct Fields<'a> {
    form: &'a FormValues,
}

impl<'a> Fields<'a> {
    fn raw(&self, key: &str) -> Option<&'a str> {
        self.form.get(key).map(|v| v.trim())
    }

    fn number(&self, key: &'static str, default: f64, message: &str) -> Result<f64, ValidationError> {
        match self.raw(key) {
            None => Ok(default),
            Some(s) => s
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| ValidationError::new(key, message)),
        }
    }

    /// Integer fields accept a fractional value and truncate it.
    fn integer(&self, key: &'static str, default: i64, message: &str) -> Result<i64, ValidationError> {
        match self.raw(key) {
            None => Ok(default),
            Some(s) => match s.parse::<i64>() {
                Ok(n) => Ok(n),
                Err(_) => self.number(key, 0.0, message).map(|f| f.trunc() as i64),
            },
        }
    }

    fn text(&self, key: &str, default: &str) -> String {
        match self.raw(key) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => default.to_string(),
        }
    }
}

fn positive(field: &'static str, value: i64, message: &str) -> Result<(), ValidationError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ValidationError::new(field, message))
    }
}

fn non_negative(field: &'static str, value: f64, message: &str) -> Result<(), ValidationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new(field, message))
    }
}

fn unit_interval(field: &'static str, value: f64, message: &str) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(field, message))
    }
}

// =============================================================================
// Per-algorithm rules
// =============================================================================

impl GaParams {
    fn from_fields(f: &Fields<'_>) -> Result<Self, ValidationError> {
        let d = Self::default();
        Ok(Self {
            population_size: f.integer("population_size", d.population_size, "Population size must be a positive number")?,
            generations: f.integer("generations", d.generations, "Number of generations must be a positive number")?,
            mutation_rate: f.number("mutation_rate", d.mutation_rate, "Mutation rate must be a number between 0 and 1")?,
            selection_method: f.text("selection_method", &d.selection_method),
            crossover_method: f.text("crossover_method", &d.crossover_method),
            elitism: f.integer("elitism", d.elitism, "Elitism must be a non-negative number")?,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        positive("population_size", self.population_size, "Population size must be a positive number")?;
        positive("generations", self.generations, "Number of generations must be a positive number")?;
        unit_interval("mutation_rate", self.mutation_rate, "Mutation rate must be a number between 0 and 1")?;
        if self.elitism < 0 {
            return Err(ValidationError::new("elitism", "Elitism must be a non-negative number"));
        }
        Ok(())
    }
}

impl PsoParams {
    fn from_fields(f: &Fields<'_>) -> Result<Self, ValidationError> {
        let d = Self::default();
        Ok(Self {
            swarm_size: f.integer("swarm_size", d.swarm_size, "Swarm size must be a positive number")?,
            iterations: f.integer("iterations", d.iterations, POSITIVE_ITERATIONS)?,
            inertia: f.number("inertia", d.inertia, "Inertia weight must be a number between 0 and 1")?,
            cognitive_coef: f.number("cognitive_coef", d.cognitive_coef, "Cognitive coefficient must be a non-negative number")?,
            social_coef: f.number("social_coef", d.social_coef, "Social coefficient must be a non-negative number")?,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        positive("swarm_size", self.swarm_size, "Swarm size must be a positive number")?;
        positive("iterations", self.iterations, POSITIVE_ITERATIONS)?;
        unit_interval("inertia", self.inertia, "Inertia weight must be a number between 0 and 1")?;
        non_negative("cognitive_coef", self.cognitive_coef, "Cognitive coefficient must be a non-negative number")?;
        non_negative("social_coef", self.social_coef, "Social coefficient must be a non-negative number")
    }
}

impl AcoParams {
    fn from_fields(f: &Fields<'_>) -> Result<Self, ValidationError> {
        let d = Self::default();
        Ok(Self {
            ant_count: f.integer("ant_count", d.ant_count, "Ant count must be a positive number")?,
            iterations: f.integer("iterations", d.iterations, POSITIVE_ITERATIONS)?,
            pheromone_importance: f.number(
                "pheromone_importance",
                d.pheromone_importance,
                "Pheromone importance must be a non-negative number",
            )?,
            heuristic_importance: f.number(
                "heuristic_importance",
                d.heuristic_importance,
                "Heuristic importance must be a non-negative number",
            )?,
            evaporation_rate: f.number("evaporation_rate", d.evaporation_rate, "Evaporation rate must be a number between 0 and 1")?,
            initial_pheromone: f.number("initial_pheromone", d.initial_pheromone, "Initial pheromone must be a non-negative number")?,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        positive("ant_count", self.ant_count, "Ant count must be a positive number")?;
        positive("iterations", self.iterations, POSITIVE_ITERATIONS)?;
        non_negative("pheromone_importance", self.pheromone_importance, "Pheromone importance must be a non-negative number")?;
        non_negative("heuristic_importance", self.heuristic_importance, "Heuristic importance must be a non-negative number")?;
        unit_interval("evaporation_rate", self.evaporation_rate, "Evaporation rate must be a number between 0 and 1")?;
        non_negative("initial_pheromone", self.initial_pheromone, "Initial pheromone must be a non-negative number")
    }
}

impl TabuParams {
    fn from_fields(f: &Fields<'_>) -> Result<Self, ValidationError> {
        let d = Self::default();
        Ok(Self {
            iterations: f.integer("iterations", d.iterations, POSITIVE_ITERATIONS)?,
            tabu_list_size: f.integer("tabu_list_size", d.tabu_list_size, "Tabu list size must be a positive number")?,
            neighborhood_size: f.integer("neighborhood_size", d.neighborhood_size, "Neighborhood size must be a positive number")?,
            step_size: f.number("step_size", d.step_size, "Step size must be a positive number")?,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        positive("iterations", self.iterations, POSITIVE_ITERATIONS)?;
        positive("tabu_list_size", self.tabu_list_size, "Tabu list size must be a positive number")?;
        positive("neighborhood_size", self.neighborhood_size, "Neighborhood size must be a positive number")?;
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(ValidationError::new("step_size", "Step size must be a positive number"));
        }
        Ok(())
    }
}

impl RunParams {
    pub fn defaults(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Ga => RunParams::Ga(GaParams::default()),
            Algorithm::Pso => RunParams::Pso(PsoParams::default()),
            Algorithm::Aco => RunParams::Aco(AcoParams::default()),
            Algorithm::Tabu => RunParams::Tabu(TabuParams::default()),
        }
    }

    /// Parse and range-check one algorithm's form.
    pub fn from_form(algorithm: Algorithm, form: &FormValues) -> Result<Self, ValidationError> {
        let fields = Fields { form };
        let parsed = match algorithm {
            Algorithm::Ga => GaParams::from_fields(&fields).map(RunParams::Ga),
            Algorithm::Pso => PsoParams::from_fields(&fields).map(RunParams::Pso),
            Algorithm::Aco => AcoParams::from_fields(&fields).map(RunParams::Aco),
            Algorithm::Tabu => TabuParams::from_fields(&fields).map(RunParams::Tabu),
        };
        let result = parsed.and_then(|p| p.validate().map(|_| p));
        if let Err(err) = &result {
            logging::warn(
                Domain::Params,
                "rejected",
                &[
                    ("algorithm", v_str(algorithm.id())),
                    ("field", v_str(err.field)),
                    ("msg", v_str(&err.message)),
                ],
            );
        }
        result
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            RunParams::Ga(_) => Algorithm::Ga,
            RunParams::Pso(_) => Algorithm::Pso,
            RunParams::Aco(_) => Algorithm::Aco,
            RunParams::Tabu(_) => Algorithm::Tabu,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            RunParams::Ga(p) => p.validate(),
            RunParams::Pso(p) => p.validate(),
            RunParams::Aco(p) => p.validate(),
            RunParams::Tabu(p) => p.validate(),
        }
    }

    /// JSON request body for the optimizer service.
    pub fn to_body(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormValues {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_form_takes_service_defaults() {
        for algo in Algorithm::ALL {
            let params = RunParams::from_form(algo, &FormValues::new()).unwrap();
            assert_eq!(params, RunParams::defaults(algo));
            assert_eq!(params.algorithm(), algo);
        }
    }

    #[test]
    fn ga_body_uses_snake_case_fields() {
        let params = RunParams::from_form(
            Algorithm::Ga,
            &form(&[("population_size", "50"), ("generations", "10"), ("mutation_rate", "0.1"), ("elitism", "2")]),
        )
        .unwrap();
        let body = params.to_body();
        assert_eq!(body["population_size"], 50);
        assert_eq!(body["generations"], 10);
        assert_eq!(body["mutation_rate"], 0.1);
        assert_eq!(body["selection_method"], "tournament");
        assert_eq!(body["elitism"], 2);
    }

    #[test]
    fn rejects_non_positive_population() {
        let err = RunParams::from_form(Algorithm::Ga, &form(&[("population_size", "0")])).unwrap_err();
        assert_eq!(err.field, "population_size");
        assert_eq!(err.to_string(), "Population size must be a positive number");
    }

    #[test]
    fn unparseable_values_fail_with_the_range_message() {
        let err = RunParams::from_form(Algorithm::Ga, &form(&[("mutation_rate", "lots")])).unwrap_err();
        assert_eq!(err.to_string(), "Mutation rate must be a number between 0 and 1");
        let err = RunParams::from_form(Algorithm::Tabu, &form(&[("iterations", "")])).unwrap_err();
        assert_eq!(err.to_string(), "Number of iterations must be a positive number");
    }

    #[test]
    fn fractional_integers_truncate() {
        let params = RunParams::from_form(Algorithm::Pso, &form(&[("swarm_size", "12.9")])).unwrap();
        match params {
            RunParams::Pso(p) => assert_eq!(p.swarm_size, 12),
            other => panic!("unexpected {:?}", other),
        }
        let err = RunParams::from_form(Algorithm::Pso, &form(&[("swarm_size", "0.5")])).unwrap_err();
        assert_eq!(err.field, "swarm_size");
    }

    #[test]
    fn unit_interval_bounds_are_inclusive() {
        assert!(RunParams::from_form(Algorithm::Pso, &form(&[("inertia", "1")])).is_ok());
        assert!(RunParams::from_form(Algorithm::Pso, &form(&[("inertia", "0")])).is_ok());
        let err = RunParams::from_form(Algorithm::Pso, &form(&[("inertia", "1.01")])).unwrap_err();
        assert_eq!(err.to_string(), "Inertia weight must be a number between 0 and 1");
        let err = RunParams::from_form(Algorithm::Aco, &form(&[("evaporation_rate", "-0.1")])).unwrap_err();
        assert_eq!(err.to_string(), "Evaporation rate must be a number between 0 and 1");
    }

    #[test]
    fn non_finite_numbers_are_rejected() {
        let err = RunParams::from_form(Algorithm::Pso, &form(&[("social_coef", "inf")])).unwrap_err();
        assert_eq!(err.to_string(), "Social coefficient must be a non-negative number");
        let err = RunParams::from_form(Algorithm::Aco, &form(&[("heuristic_importance", "NaN")])).unwrap_err();
        assert_eq!(err.field, "heuristic_importance");
    }

    #[test]
    fn tabu_step_must_be_strictly_positive() {
        let err = RunParams::from_form(Algorithm::Tabu, &form(&[("step_size", "0")])).unwrap_err();
        assert_eq!(err.to_string(), "Step size must be a positive number");
        let err = RunParams::from_form(Algorithm::Tabu, &form(&[("tabu_list_size", "-3")])).unwrap_err();
        assert_eq!(err.to_string(), "Tabu list size must be a positive number");
    }

    #[test]
    fn negative_elitism_is_rejected() {
        assert!(RunParams::from_form(Algorithm::Ga, &form(&[("elitism", "0")])).is_ok());
        let err = RunParams::from_form(Algorithm::Ga, &form(&[("elitism", "-1")])).unwrap_err();
        assert_eq!(err.to_string(), "Elitism must be a non-negative number");
    }

    #[test]
    fn url_encoded_forms_decode() {
        let values = parse_form("population_size=80&selection_method=roulette+wheel&mutation_rate=0.25");
        assert_eq!(values.get("selection_method").map(String::as_str), Some("roulette wheel"));
        let params = RunParams::from_form(Algorithm::Ga, &values).unwrap();
        assert_eq!(params.to_body()["population_size"], 80);
    }
}
