//! Retention analytics for subscription gyms: member churn risk, revenue
//! forecasts, funnel bottlenecks, business stability and ranked interventions.
//!
//! Every entry point is a pure function of its inputs and an explicit `now`.

pub mod churn;
pub mod config;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod funnel;
pub mod models;
pub mod recommend;
pub mod report;
pub mod risk;
pub mod signals;
pub mod snapshot;
pub mod stability;

pub use config::EngineConfig;
pub use engine::{GymAnalysis, RetentionEngine};
pub use error::{EngineError, Result};
