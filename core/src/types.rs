//! Shared primitive types used across the generator.

use chrono::NaiveDate;

/// A calendar day inside the simulated horizon.
pub type SimDate = NaiveDate;

/// A stable, unique identifier for any generated entity.
pub type EntityId = String;

/// The canonical generation run identifier.
pub type RunId = String;

/// Length of one billing tick in days. Churn, MRR and expansion walks
/// all advance on this cadence.
pub const DAYS_PER_TICK: i64 = 30;
