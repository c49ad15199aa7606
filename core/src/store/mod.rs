//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Generation and analytics never execute SQL directly.
//!
//! A persist is all-or-nothing: schema reset and every table load run in
//! one transaction, so a failure leaves the previous contents untouched.

mod accounts;
mod checks;
mod pipeline;

use crate::{
    assumptions::AssumptionSet,
    context::Dataset,
    engine::RunInfo,
    error::GenResult,
};
use rusqlite::{params, Connection, OptionalExtension};

pub use checks::ContractReport;

const SCHEMA: &str = include_str!("../../../migrations/001_revenue_schema.sql");

/// Generated tables, in load order.
pub const TABLES: [&str; 10] = [
    "sales_reps",
    "leads",
    "opportunities",
    "stage_transitions",
    "customers",
    "usage_events",
    "marketing_spend",
    "mrr_movements",
    "nps_surveys",
    "expansion_opportunities",
];

pub struct RevenueStore {
    conn: Connection,
}

impl RevenueStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> GenResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: dashboards read while a new run is written.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GenResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Drop and recreate every table and index.
    pub fn reset_schema(&self) -> GenResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Replace the database contents with one generated run.
    pub fn persist(
        &self,
        run: &RunInfo,
        assumptions: &AssumptionSet,
        dataset: &Dataset,
    ) -> GenResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch(SCHEMA)?;

        tx.execute(
            "INSERT INTO generation_run (
                run_id, seed, generator_version, assumptions_version,
                horizon_start, horizon_end, assumptions_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.run_id,
                run.seed as i64,
                run.generator_version,
                run.assumptions_version,
                run.horizon.start,
                run.horizon.end,
                serde_json::to_string(assumptions)?,
            ],
        )?;

        pipeline::insert_sales_reps(&tx, &dataset.sales_reps)?;
        pipeline::insert_leads(&tx, &dataset.leads)?;
        pipeline::insert_opportunities(&tx, &dataset.opportunities)?;
        pipeline::insert_stage_transitions(&tx, &dataset.stage_transitions)?;
        accounts::insert_customers(&tx, &dataset.customers)?;
        accounts::insert_usage_events(&tx, &dataset.usage_events)?;
        pipeline::insert_marketing_spend(&tx, &dataset.marketing_spend)?;
        accounts::insert_mrr_movements(&tx, &dataset.mrr_movements)?;
        accounts::insert_nps_surveys(&tx, &dataset.nps_surveys)?;
        accounts::insert_expansion_opportunities(&tx, &dataset.expansion_opportunities)?;

        tx.commit()?;
        log::info!("Persisted {} ({} tables)", run.run_id, TABLES.len());
        Ok(())
    }

    /// Metadata of the run currently stored, if any.
    pub fn run_info(&self) -> GenResult<Option<RunInfo>> {
        let exists: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'generation_run'",
            [],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Ok(None);
        }
        let info = self
            .conn
            .query_row(
                "SELECT run_id, seed, generator_version, assumptions_version,
                        horizon_start, horizon_end
                 FROM generation_run LIMIT 1",
                [],
                |row| {
                    Ok(RunInfo {
                        run_id:              row.get(0)?,
                        seed:                row.get::<_, i64>(1)? as u64,
                        generator_version:   row.get(2)?,
                        assumptions_version: row.get(3)?,
                        horizon: crate::calendar::Horizon {
                            start: row.get(4)?,
                            end:   row.get(5)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(info)
    }
}
