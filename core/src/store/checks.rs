//! Read-side verification queries over a persisted run.

use super::{RevenueStore, TABLES};
use crate::{
    error::{GenError, GenResult},
    model::{Channel, CompanySize, Customer, CustomerStatus, HealthScore, Industry},
};
use rusqlite::{params, types::Type, Row};
use serde::Serialize;

/// Downstream contract checks. Every field is zero for a healthy run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    pub won_without_customer:     i64,
    pub won_without_new_movement: i64,
    pub negative_mrr_rows:        i64,
    pub orphaned_child_rows:      i64,
    pub status_mismatches:        i64,
    pub rows_outside_horizon:     i64,
}

impl ContractReport {
    pub fn is_clean(&self) -> bool {
        *self == ContractReport::default()
    }
}

impl RevenueStore {
    pub fn table_count(&self, table: &str) -> GenResult<i64> {
        if !TABLES.contains(&table) {
            return Err(GenError::Other(anyhow::anyhow!("unknown table '{table}'")));
        }
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn table_counts(&self) -> GenResult<Vec<(&'static str, i64)>> {
        TABLES
            .iter()
            .map(|&table| Ok((table, self.table_count(table)?)))
            .collect()
    }

    pub fn contract_report(&self) -> GenResult<ContractReport> {
        let count = |sql: &str| -> GenResult<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        let won_without_customer = count(
            "SELECT COUNT(*) FROM opportunities o
             WHERE o.is_won = 1
               AND NOT EXISTS (SELECT 1 FROM customers c WHERE c.opportunity_id = o.opportunity_id)",
        )?;
        let won_without_new_movement = count(
            "SELECT COUNT(*) FROM opportunities o
             WHERE o.is_won = 1
               AND NOT EXISTS (
                   SELECT 1 FROM customers c
                   JOIN mrr_movements m ON m.customer_id = c.customer_id
                   WHERE c.opportunity_id = o.opportunity_id AND m.movement_type = 'New'
               )",
        )?;
        let negative_mrr_rows = count(
            "SELECT (SELECT COUNT(*) FROM mrr_movements WHERE new_mrr < 0 OR previous_mrr < 0)
                  + (SELECT COUNT(*) FROM customers WHERE current_mrr < 0)",
        )?;
        let orphaned_child_rows = count(
            "SELECT (SELECT COUNT(*) FROM usage_events u
                     WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.customer_id = u.customer_id))
                  + (SELECT COUNT(*) FROM mrr_movements m
                     WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.customer_id = m.customer_id))
                  + (SELECT COUNT(*) FROM nps_surveys n
                     WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.customer_id = n.customer_id))
                  + (SELECT COUNT(*) FROM expansion_opportunities x
                     WHERE NOT EXISTS (SELECT 1 FROM customers c WHERE c.customer_id = x.customer_id))",
        )?;
        let status_mismatches = count(
            "SELECT COUNT(*) FROM customers
             WHERE (status = 'Churned') <> (churn_date IS NOT NULL)
                OR (status = 'Churned' AND current_mrr <> 0)
                OR (status = 'Active' AND current_mrr <= 0)
                OR churn_date < start_date",
        )?;
        let (start, end) = self.horizon_bounds()?;
        let rows_outside_horizon: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM leads WHERE created_date NOT BETWEEN ?1 AND ?2)
                  + (SELECT COUNT(*) FROM stage_transitions WHERE transition_date NOT BETWEEN ?1 AND ?2)
                  + (SELECT COUNT(*) FROM usage_events WHERE event_date NOT BETWEEN ?1 AND ?2)
                  + (SELECT COUNT(*) FROM mrr_movements WHERE movement_date NOT BETWEEN ?1 AND ?2)
                  + (SELECT COUNT(*) FROM nps_surveys WHERE survey_date NOT BETWEEN ?1 AND ?2)
                  + (SELECT COUNT(*) FROM expansion_opportunities
                     WHERE identified_date NOT BETWEEN ?1 AND ?2
                        OR closed_date NOT BETWEEN ?1 AND ?2)
                  + (SELECT COUNT(*) FROM customers WHERE churn_date > ?2)",
            params![start, end],
            |row| row.get(0),
        )?;

        Ok(ContractReport {
            won_without_customer,
            won_without_new_movement,
            negative_mrr_rows,
            orphaned_child_rows,
            status_mismatches,
            rows_outside_horizon,
        })
    }

    /// Customers as persisted, in id order.
    pub fn customers(&self) -> GenResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, opportunity_id, company_name, company_size, industry,
                    channel, start_date, status, churn_date, current_mrr, initial_mrr,
                    assigned_rep_id, latest_nps_score, health_score, churn_probability
             FROM customers ORDER BY customer_id",
        )?;
        let customers = stmt
            .query_map([], |row| {
                let health: Option<String> = row.get(13)?;
                Ok(Customer {
                    customer_id:       row.get(0)?,
                    opportunity_id:    row.get(1)?,
                    company_name:      row.get(2)?,
                    company_size:      parse_label(row, 3, CompanySize::parse)?,
                    industry:          parse_label(row, 4, Industry::parse)?,
                    channel:           parse_label(row, 5, Channel::parse)?,
                    start_date:        row.get(6)?,
                    status:            parse_label(row, 7, CustomerStatus::parse)?,
                    churn_date:        row.get(8)?,
                    current_mrr:       row.get(9)?,
                    initial_mrr:       row.get(10)?,
                    assigned_rep_id:   row.get(11)?,
                    latest_nps_score:  row.get(12)?,
                    health_score:      health.as_deref().and_then(HealthScore::parse),
                    churn_probability: row.get(14)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(customers)
    }

    fn horizon_bounds(&self) -> GenResult<(String, String)> {
        Ok(self.conn.query_row(
            "SELECT horizon_start, horizon_end FROM generation_run LIMIT 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }
}

fn parse_label<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized label '{raw}'").into(),
        )
    })
}
