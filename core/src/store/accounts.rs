use crate::{
    error::GenResult,
    model::{Customer, ExpansionOpportunity, MrrMovement, NpsSurvey, UsageEvent},
};
use rusqlite::{params, Connection};

// ── Customers ────────────────────────────────────────────────────────────

pub(super) fn insert_customers(conn: &Connection, customers: &[Customer]) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO customers (
            customer_id, opportunity_id, company_name, company_size, industry,
            channel, start_date, status, churn_date, current_mrr, initial_mrr,
            assigned_rep_id, latest_nps_score, health_score, churn_probability
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )?;
    for c in customers {
        stmt.execute(params![
            c.customer_id,
            c.opportunity_id,
            c.company_name,
            c.company_size.as_str(),
            c.industry.as_str(),
            c.channel.as_str(),
            c.start_date,
            c.status.as_str(),
            c.churn_date,
            c.current_mrr,
            c.initial_mrr,
            c.assigned_rep_id,
            c.latest_nps_score,
            c.health_score.map(|h| h.as_str()),
            c.churn_probability,
        ])?;
    }
    Ok(())
}

// ── Usage ────────────────────────────────────────────────────────────────

pub(super) fn insert_usage_events(conn: &Connection, events: &[UsageEvent]) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO usage_events (
            event_id, customer_id, event_date, logins, api_calls,
            reports_generated, team_members_active, integrations_used
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for e in events {
        stmt.execute(params![
            e.event_id,
            e.customer_id,
            e.event_date,
            e.logins,
            e.api_calls,
            e.reports_generated,
            e.team_members_active,
            e.integrations_used,
        ])?;
    }
    Ok(())
}

// ── Revenue ──────────────────────────────────────────────────────────────

pub(super) fn insert_mrr_movements(conn: &Connection, movements: &[MrrMovement]) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO mrr_movements (
            movement_id, customer_id, movement_date, movement_type,
            amount, previous_mrr, new_mrr
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for m in movements {
        stmt.execute(params![
            m.movement_id,
            m.customer_id,
            m.movement_date,
            m.movement_type.as_str(),
            m.amount,
            m.previous_mrr,
            m.new_mrr,
        ])?;
    }
    Ok(())
}

pub(super) fn insert_expansion_opportunities(
    conn: &Connection,
    expansions: &[ExpansionOpportunity],
) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO expansion_opportunities (
            expansion_id, customer_id, identified_date, opportunity_type,
            estimated_value, status, closed_date, actual_value
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for x in expansions {
        stmt.execute(params![
            x.expansion_id,
            x.customer_id,
            x.identified_date,
            x.opportunity_type.as_str(),
            x.estimated_value,
            x.status.as_str(),
            x.closed_date,
            x.actual_value,
        ])?;
    }
    Ok(())
}

// ── Surveys ──────────────────────────────────────────────────────────────

pub(super) fn insert_nps_surveys(conn: &Connection, surveys: &[NpsSurvey]) -> GenResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO nps_surveys (
            survey_id, customer_id, survey_date, score, response_text, responded
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    for s in surveys {
        stmt.execute(params![
            s.survey_id,
            s.customer_id,
            s.survey_date,
            s.score,
            s.response_text,
            s.responded,
        ])?;
    }
    Ok(())
}
