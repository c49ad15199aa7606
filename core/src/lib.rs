//! Revenue lifecycle simulator.
//!
//! Generates a causally consistent B2B SaaS dataset (reps, leads, pipeline,
//! customers, usage, revenue movements, NPS, expansion) from a frozen
//! assumption set, persists it to SQLite, and derives the dashboard
//! analytics from the generated rows.

pub mod assumptions;
pub mod calendar;
pub mod context;
pub mod engine;
pub mod error;
pub mod model;
pub mod name_generator;
pub mod rng;
pub mod stage;
pub mod store;
pub mod types;

// Generation stages, in execution order.
pub mod sales_rep_stage;
pub mod lead_stage;
pub mod pipeline_stage;
pub mod customer_stage;
pub mod usage_stage;
pub mod marketing_stage;
pub mod mrr_stage;
pub mod nps_stage;
pub mod expansion_stage;
pub mod health_stage;

// Downstream consumers of a generated dataset.
pub mod metrics;
pub mod funnel_analytics;
pub mod revenue_analytics;
pub mod churn_analytics;
pub mod health_analytics;
pub mod scenario_simulator;
