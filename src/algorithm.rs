//! The four optimizers the dashboard knows about.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Ga,
    Pso,
    Aco,
    Tabu,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [Algorithm::Ga, Algorithm::Pso, Algorithm::Aco, Algorithm::Tabu];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Ga => "ga",
            Self::Pso => "pso",
            Self::Aco => "aco",
            Self::Tabu => "tabu",
        }
    }

    pub fn parse(id: &str) -> Option<Self> {
        match id {
            "ga" => Some(Self::Ga),
            "pso" => Some(Self::Pso),
            "aco" => Some(Self::Aco),
            "tabu" => Some(Self::Tabu),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ga => "Genetic Algorithm",
            Self::Pso => "Particle Swarm Optimization",
            Self::Aco => "Ant Colony Optimization",
            Self::Tabu => "Tabu Search",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Ga => "GA",
            Self::Pso => "PSO",
            Self::Aco => "ACO",
            Self::Tabu => "Tabu Search",
        }
    }

    /// CSS color token used by per-algorithm charts.
    pub fn color_token(&self) -> &'static str {
        match self {
            Self::Ga => "var(--ga-color)",
            Self::Pso => "var(--pso-color)",
            Self::Aco => "var(--aco-color)",
            Self::Tabu => "var(--tabu-color)",
        }
    }

    /// Fixed palette for comparison charts.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Self::Ga => (54, 162, 235),
            Self::Pso => (255, 99, 132),
            Self::Aco => (75, 192, 192),
            Self::Tabu => (153, 102, 255),
        }
    }

    pub fn rgba(&self, alpha: f64) -> String {
        let (r, g, b) = self.rgb();
        format!("rgba({}, {}, {}, {})", r, g, b, alpha)
    }

    pub fn strengths(&self) -> &'static str {
        match self {
            Self::Ga => "Good exploration, handles complex solution spaces well",
            Self::Pso => "Fast convergence, simple implementation, fewer parameters",
            Self::Aco => "Good for discrete problems, handles constraints well",
            Self::Tabu => "Avoids local optima, good for constrained problems",
        }
    }

    pub fn weaknesses(&self) -> &'static str {
        match self {
            Self::Ga => "Can be computationally expensive, may converge slowly",
            Self::Pso => "May get trapped in local optima, sensitive to parameter settings",
            Self::Aco => "Slower convergence, requires careful parameter tuning",
            Self::Tabu => "Memory intensive, parameter selection can be difficult",
        }
    }

    /// Tuning advice shown when this algorithm wins a comparison.
    pub fn recommendations(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Ga => &[
                ("Parameter Tuning", "Consider increasing the population size for better exploration and generations for more refinement."),
                ("Crossover & Mutation", "Experiment with different crossover methods and mutation rates to balance exploration and exploitation."),
                ("Selection Strategy", "Try different selection strategies like tournament or roulette wheel to see which works best."),
            ],
            Self::Pso => &[
                ("Parameter Tuning", "Adjust the cognitive and social coefficients to fine-tune the balance between exploration and exploitation."),
                ("Inertia Weight", "Consider using a decreasing inertia weight strategy to improve convergence."),
                ("Swarm Size", "Experiment with different swarm sizes to find the optimal balance between diversity and computation time."),
            ],
            Self::Aco => &[
                ("Parameter Tuning", "Adjust the pheromone importance and evaporation rate to improve performance."),
                ("Ant Count", "Increase the number of ants for better exploration of the solution space."),
                ("Pheromone Strategy", "Consider different pheromone update strategies to improve convergence."),
            ],
            Self::Tabu => &[
                ("Parameter Tuning", "Adjust the tabu list size and neighborhood size to balance between exploration and exploitation."),
                ("Step Size", "Experiment with different step sizes to find the optimal balance between exploration and exploitation."),
                ("Aspiration Criteria", "Consider implementing aspiration criteria to allow promising moves even if they are tabu."),
            ],
        }
    }
}

/// Advice appended after the per-algorithm recommendations.
pub fn general_recommendations(best: Algorithm) -> Vec<(&'static str, String)> {
    vec![
        (
            "Hybrid Approach",
            format!(
                "Consider combining {} with other algorithms to leverage their complementary strengths.",
                best.display_name()
            ),
        ),
        (
            "Neural Network Architecture",
            "Experiment with different neural network architectures to see if they work better with this optimization approach.".to_string(),
        ),
        (
            "Ensemble Methods",
            "Consider using an ensemble of the best-performing algorithms to improve overall performance.".to_string(),
        ),
    ]
}

/// Display name for an identifier that may not be a known algorithm.
pub fn display_name_for(id: &str) -> String {
    Algorithm::parse(id)
        .map(|a| a.display_name().to_string())
        .unwrap_or_else(|| id.to_string())
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown algorithm: {}", s))
    }
}
