//! View-model and hosting layer for a dashboard that runs and compares four
//! metaheuristic optimizers (GA, PSO, ACO, Tabu Search).

pub mod algorithm;
pub mod chart;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod history;
pub mod indicators;
pub mod logging;
pub mod normalize;
pub mod notify;
pub mod pages;
pub mod params;
pub mod render;
pub mod retry;
pub mod router;
pub mod server;
